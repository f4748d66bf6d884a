//! Shared fixtures: a simulated toolchain and a throwaway project.

#![allow(dead_code)]

use kodegen_bundler_appcast::bundler::{
    ConfigFile, ReleaseConfig, ReleaseConfigBuilder, Result, ToolCommand, ToolOutput, ToolRunner,
};
use std::{
    collections::HashSet,
    path::{Path, PathBuf},
    sync::Mutex,
};
use tempfile::TempDir;

/// Simulates `hdiutil`, `osascript`, `SetFile`, `rsync`, `scp` and `ssh` on
/// the local filesystem and records every call.
///
/// - `hdiutil create` writes the image file
/// - `hdiutil attach` creates the mount point directory
/// - `hdiutil detach` removes it
/// - `hdiutil convert` writes the compressed image
/// - `rsync`/`scp` copy into the directory after `host:`
/// - `ssh ... "mv -f 'a' 'b'"` renames on that directory
#[derive(Debug, Default)]
pub struct FakeRunner {
    state: Mutex<State>,
}

#[derive(Debug, Default)]
struct State {
    log: Vec<ToolCommand>,
    busy_attaches: u32,
    busy_detaches: u32,
    stuck_detach: bool,
    fail_layout: bool,
    fail_convert: bool,
    fail_uploads: HashSet<String>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `n` attaches report "Resource busy".
    pub fn busy_attaches(self, n: u32) -> Self {
        self.state.lock().unwrap().busy_attaches = n;
        self
    }

    /// The next `n` detaches report "Resource busy".
    pub fn busy_detaches(self, n: u32) -> Self {
        self.state.lock().unwrap().busy_detaches = n;
        self
    }

    /// Every detach reports "Resource busy", even with `-force`.
    pub fn stuck_detach(self) -> Self {
        self.state.lock().unwrap().stuck_detach = true;
        self
    }

    pub fn fail_layout(self) -> Self {
        self.state.lock().unwrap().fail_layout = true;
        self
    }

    pub fn fail_convert(self) -> Self {
        self.state.lock().unwrap().fail_convert = true;
        self
    }

    /// Uploads of `file_name` fail.
    pub fn fail_upload(&self, file_name: &str) {
        self.state
            .lock()
            .unwrap()
            .fail_uploads
            .insert(file_name.to_string());
    }

    pub fn clear_upload_failures(&self) {
        self.state.lock().unwrap().fail_uploads.clear();
    }

    pub fn commands(&self) -> Vec<ToolCommand> {
        self.state.lock().unwrap().log.clone()
    }

    /// Recorded calls rendered as `program subcommand`, e.g. `hdiutil attach`.
    pub fn calls(&self) -> Vec<String> {
        self.commands()
            .iter()
            .map(|c| match c.program.as_str() {
                "hdiutil" => format!("hdiutil {}", c.args.first().map(String::as_str).unwrap_or("")),
                other => other.to_string(),
            })
            .collect()
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == call).count()
    }

    /// Scripts passed to `osascript -e`.
    pub fn scripts(&self) -> Vec<String> {
        self.commands()
            .into_iter()
            .filter(|c| c.program == "osascript")
            .filter_map(|c| c.flag_value("-e").map(String::from))
            .collect()
    }

    fn simulate(&self, command: &ToolCommand) -> ToolOutput {
        let mut state = self.state.lock().unwrap();
        state.log.push(command.clone());
        let args: Vec<&str> = command.args.iter().map(String::as_str).collect();

        match (command.program.as_str(), args.as_slice()) {
            ("hdiutil", ["create", ..]) => {
                let image = Path::new(args[args.len() - 1]);
                let volume = command.flag_value("-volname").unwrap_or_default();
                match std::fs::write(image, format!("UDRW:{}", volume)) {
                    Ok(()) => ToolOutput::ok(format!("created: {}", image.display())),
                    Err(e) => ToolOutput::failed(1, format!("hdiutil: create failed - {}", e)),
                }
            }
            ("hdiutil", ["attach", image, ..]) => {
                if state.busy_attaches > 0 {
                    state.busy_attaches -= 1;
                    return ToolOutput::failed(1, "hdiutil: attach failed - Resource busy");
                }
                if !Path::new(image).is_file() {
                    return ToolOutput::failed(1, "hdiutil: attach failed - No such file or directory");
                }
                let mount_point = command.flag_value("-mountpoint").unwrap_or_default();
                match std::fs::create_dir_all(mount_point) {
                    Ok(()) => ToolOutput::ok(format!("/dev/disk4s1\t{}", mount_point)),
                    Err(e) => ToolOutput::failed(1, e.to_string()),
                }
            }
            ("hdiutil", ["detach", mount_point, ..]) => {
                if state.stuck_detach {
                    return ToolOutput::failed(16, "hdiutil: couldn't unmount \"disk4\" - Resource busy");
                }
                if state.busy_detaches > 0 && !args.contains(&"-force") {
                    state.busy_detaches -= 1;
                    return ToolOutput::failed(16, "hdiutil: couldn't unmount \"disk4\" - Resource busy");
                }
                match std::fs::remove_dir_all(mount_point) {
                    Ok(()) => ToolOutput::ok("\"disk4\" ejected."),
                    Err(_) => ToolOutput::failed(1, "hdiutil: detach failed - No such file or directory"),
                }
            }
            ("hdiutil", ["convert", image, ..]) => {
                if state.fail_convert {
                    return ToolOutput::failed(1, "hdiutil: convert failed - not enough space");
                }
                let output = command.flag_value("-o").unwrap_or_default();
                match std::fs::read(image) {
                    Ok(mut bytes) => {
                        bytes.extend_from_slice(b":UDZO");
                        match std::fs::write(output, bytes) {
                            Ok(()) => ToolOutput::ok(format!("created: {}", output)),
                            Err(e) => ToolOutput::failed(1, e.to_string()),
                        }
                    }
                    Err(e) => ToolOutput::failed(1, format!("hdiutil: convert failed - {}", e)),
                }
            }
            ("osascript", _) => {
                if state.fail_layout {
                    ToolOutput::failed(1, "execution error: Finder got an error: Can't get disk \"MyApp\". (-1728)")
                } else {
                    ToolOutput::ok("")
                }
            }
            ("SetFile", _) => ToolOutput::ok(""),
            ("rsync", [.., local, dest]) => {
                let local = Path::new(local);
                let name = file_name(local);
                if state.fail_uploads.contains(&name) {
                    return ToolOutput::failed(23, "rsync error: some files/attrs were not transferred (code 23)");
                }
                let dir = remote_dir(dest);
                upload(local, &dir.join(&name), &dir.join(format!(".{}.rsync-tmp", name)))
            }
            ("scp", [.., local, dest]) => {
                let local = Path::new(local);
                let name = file_name(local);
                if state.fail_uploads.contains(&name) {
                    return ToolOutput::failed(1, "scp: Connection closed");
                }
                let remote = remote_dir(dest);
                match std::fs::copy(local, &remote) {
                    Ok(_) => ToolOutput::ok(""),
                    Err(e) => ToolOutput::failed(1, format!("scp: {}", e)),
                }
            }
            ("ssh", [.., script]) => {
                let quoted: Vec<&str> = script.split('\'').skip(1).step_by(2).collect();
                match quoted.as_slice() {
                    [from, to] if script.starts_with("mv -f ") => match std::fs::rename(from, to) {
                        Ok(()) => ToolOutput::ok(""),
                        Err(e) => ToolOutput::failed(1, format!("mv: {}", e)),
                    },
                    _ => ToolOutput::failed(127, format!("unexpected remote command: {}", script)),
                }
            }
            _ => ToolOutput::failed(127, format!("{}: command not found", command.program)),
        }
    }
}

impl ToolRunner for FakeRunner {
    async fn run(&self, command: &ToolCommand) -> Result<ToolOutput> {
        Ok(self.simulate(command))
    }
}

/// Delegates to a [`FakeRunner`] but never returns from calls matching
/// `stall_on` (as rendered by [`FakeRunner::calls`]).
pub struct StallingRunner {
    pub inner: FakeRunner,
    pub stall_on: &'static str,
}

impl ToolRunner for StallingRunner {
    async fn run(&self, command: &ToolCommand) -> Result<ToolOutput> {
        let call = match command.program.as_str() {
            "hdiutil" => format!("hdiutil {}", command.args.first().map(String::as_str).unwrap_or("")),
            other => other.to_string(),
        };
        if call == self.stall_on {
            std::future::pending::<()>().await;
        }
        self.inner.run(command).await
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Local path after `host:` in an rsync/scp destination.
fn remote_dir(dest: &str) -> PathBuf {
    PathBuf::from(dest.split_once(':').map(|(_, path)| path).unwrap_or(dest))
}

/// Copies to a temporary name and renames into place, like rsync does.
fn upload(local: &Path, dest: &Path, tmp: &Path) -> ToolOutput {
    let result = std::fs::copy(local, tmp).and_then(|_| std::fs::rename(tmp, dest));
    match result {
        Ok(()) => ToolOutput::ok(format!("sent {} bytes", std::fs::metadata(dest).map(|m| m.len()).unwrap_or(0))),
        Err(e) => ToolOutput::failed(11, format!("rsync: {}", e)),
    }
}

/// A built `MyApp` project in a temporary directory.
pub struct Project {
    pub dir: TempDir,
}

pub const RELEASE_NOTES: &str = "# What's new\n\n- Faster sync\n- Fixed a crash on launch\n";

pub const NOTES_TEMPLATE: &str =
    "<html><body><h1>MyApp</h1>{{release_notes}}</body></html>";

impl Project {
    /// Creates the project with a built bundle, release notes, a template,
    /// a background picture and an empty remote directory.
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();

        let contents = root.join("build/Release/MyApp.app/Contents");
        std::fs::create_dir_all(contents.join("MacOS")).unwrap();
        std::fs::write(contents.join("MacOS/MyApp"), b"\xca\xfe\xba\xbe").unwrap();
        std::fs::write(contents.join("Info.plist"), "<plist/>").unwrap();

        std::fs::write(root.join("release_notes.txt"), RELEASE_NOTES).unwrap();
        std::fs::write(root.join("release_notes_template.html"), NOTES_TEMPLATE).unwrap();
        std::fs::create_dir_all(root.join("assets")).unwrap();
        std::fs::write(root.join("assets/background.png"), b"\x89PNG").unwrap();
        std::fs::write(root.join("README.txt"), "Drag MyApp to Applications.").unwrap();
        std::fs::create_dir_all(root.join("remote")).unwrap();
        std::fs::create_dir_all(root.join("Volumes")).unwrap();

        Self { dir }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn remote(&self) -> PathBuf {
        self.root().join("remote")
    }

    /// `appcast.toml` for `version`, publishing with `transport`.
    pub fn config_toml(&self, version: &str, transport: &str) -> String {
        format!(
            r#"
name = "MyApp"
version = "{version}"
base_url = "https://downloads.example.com/myapp"
appcast_filename = "feed.xml"
minimum_system_version = "10.13"
mountpoint = "Volumes"
remote_dir = "{remote}"
user = "deploy"
transport = "{transport}"
transport_args = []

[retry]
attempts = 3
initial_delay_ms = 0
max_delay_ms = 0
settle_delay_ms = 0

[dmg]
background_file = "assets/background.png"

[[dmg.files]]
path = "README.txt"
position = [500, 65]

[[dmg.files]]
link = "https://example.com/myapp"
name = "Website"
position = [500, 180]
"#,
            remote = self.remote().display(),
        )
    }

    pub fn config(&self, version: &str) -> ReleaseConfig {
        self.config_with(version, "rsync")
    }

    pub fn config_with(&self, version: &str, transport: &str) -> ReleaseConfig {
        let file: ConfigFile = toml::from_str(&self.config_toml(version, transport)).unwrap();
        ReleaseConfigBuilder::new(self.root())
            .config_file(file)
            .build()
            .unwrap()
    }

    /// Config for `version` after `edit` changed the parsed file.
    pub fn config_edited(
        &self,
        version: &str,
        edit: impl FnOnce(&mut ConfigFile),
    ) -> Result<ReleaseConfig> {
        let mut file: ConfigFile = toml::from_str(&self.config_toml(version, "rsync")).unwrap();
        edit(&mut file);
        ReleaseConfigBuilder::new(self.root()).config_file(file).build()
    }

    /// Writes a stand-in compressed image of `len` bytes at the package path.
    pub fn write_dmg(&self, config: &ReleaseConfig, len: usize) {
        let path = config.package_path();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, vec![0x5a; len]).unwrap();
    }

    /// Writes `appcast.toml` for the CLI.
    pub fn write_config(&self, version: &str) {
        std::fs::write(
            self.root().join("appcast.toml"),
            self.config_toml(version, "rsync"),
        )
        .unwrap();
    }
}
