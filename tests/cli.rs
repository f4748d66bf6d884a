#![cfg(unix)]

mod common;

use assert_cmd::Command;
use common::Project;
use predicates::prelude::*;

const INFO_PLIST: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
	<key>CFBundleExecutable</key>
	<string>MyApp</string>
	<key>CFBundleVersion</key>
	<string>1.4</string>
	<key>SUFeedURL</key>
	<string>https://downloads.example.com/myapp/feed.xml</string>
</dict>
</plist>
"#;

fn cli(project: &Project) -> Command {
    let mut cmd = Command::cargo_bin("kodegen_bundler_appcast").unwrap();
    cmd.arg("-C").arg(project.root()).env_remove("BUILD_TYPE").env("RUST_LOG", "warn");
    cmd
}

#[test]
fn help_lists_stage_commands() {
    Command::cargo_bin("kodegen_bundler_appcast")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("dmg"))
        .stdout(predicate::str::contains("feed"))
        .stdout(predicate::str::contains("upload"))
        .stdout(predicate::str::contains("release"));
}

#[test]
fn version_current_prints_configured_version() {
    let project = Project::new();
    project.write_config("2.3.0");

    cli(&project)
        .args(["version", "current"])
        .assert()
        .success()
        .stdout("2.3.0\n");
}

#[test]
fn version_current_as_json() {
    let project = Project::new();
    project.write_config("2.3.0");

    cli(&project)
        .args(["--json", "version", "current"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""package": "MyApp-2.3.0.dmg""#));
}

#[test]
fn version_bump_rewrites_the_property_list() {
    let project = Project::new();
    std::fs::write(project.root().join("Info.plist"), INFO_PLIST).unwrap();

    cli(&project)
        .args(["version", "bump", "patch"])
        .assert()
        .success()
        .stdout("1.4.1\n");

    cli(&project)
        .args(["version", "current"])
        .assert()
        .success()
        .stdout("1.4.1\n");
}

#[test]
fn feed_records_a_prebuilt_image() {
    let project = Project::new();
    project.write_config("1.0.0");
    let config = project.config("1.0.0");
    project.write_dmg(&config, 512);

    cli(&project)
        .arg("feed")
        .assert()
        .success()
        .stdout(predicate::str::contains("latest 1.0.0"));

    let feed = std::fs::read_to_string(config.feed_path()).unwrap();
    assert!(feed.contains("length=\"512\""));
    assert!(config.release_notes_path().is_file());
}

#[test]
fn invalid_config_exits_with_config_code() {
    let project = Project::new();
    std::fs::write(project.root().join("appcast.toml"), "remote_directory = \"/srv\"\n").unwrap();

    cli(&project)
        .args(["version", "current"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("appcast.toml"));
}

#[test]
fn malformed_feed_exits_with_parse_code() {
    let project = Project::new();
    project.write_config("1.0.0");
    let config = project.config("1.0.0");
    project.write_dmg(&config, 512);
    std::fs::write(config.feed_path(), "<html></html>").unwrap();

    cli(&project).arg("feed").assert().code(4);
    assert_eq!(
        std::fs::read_to_string(config.feed_path()).unwrap(),
        "<html></html>"
    );
}

#[test]
fn upload_without_artifacts_exits_with_config_code() {
    let project = Project::new();
    project.write_config("1.0.0");

    cli(&project)
        .arg("upload")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("missing artifact"));
}

#[test]
fn path_like_build_type_is_rejected() {
    let project = Project::new();
    project.write_config("1.0.0");

    cli(&project)
        .args(["--build-type", "../Release", "version", "current"])
        .assert()
        .code(2);
}
