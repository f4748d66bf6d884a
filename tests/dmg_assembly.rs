#![cfg(unix)]

mod common;

use common::{FakeRunner, Project, StallingRunner};
use kodegen_bundler_appcast::bundler::{
    DmgAssembler, Error, LayoutApplier, LayoutPlan, Result,
    settings::{DmgLayout, FileEntry, FileSource, Position, ProjectType},
};
use std::{path::Path, sync::Mutex, time::Duration};

#[tokio::test]
async fn assemble_produces_compressed_image_and_cleans_up() {
    let project = Project::new();
    let config = project.config("1.0.0");
    let runner = FakeRunner::new();

    let image = DmgAssembler::new(&config, &runner).assemble().await.unwrap();

    assert_eq!(image.path, project.root().join("appcast/build/MyApp-1.0.0.dmg"));
    assert!(image.path.is_file());
    assert_eq!(image.size, std::fs::metadata(&image.path).unwrap().len());

    assert_eq!(
        runner.calls(),
        vec!["hdiutil create", "hdiutil attach", "osascript", "hdiutil detach", "hdiutil convert"]
    );

    assert!(!config.writable_image_path().exists());
    assert!(!config.staging_dir().exists());
    assert!(!config.volume_path().exists());
}

#[tokio::test]
async fn layout_script_places_every_entry() {
    let project = Project::new();
    let config = project.config("1.0.0");
    let runner = FakeRunner::new();

    DmgAssembler::new(&config, &runner).assemble().await.unwrap();

    let scripts = runner.scripts();
    assert_eq!(scripts.len(), 1);
    let script = &scripts[0];
    assert!(script.contains(r#"set position of item "MyApp.app" of container window to {175, 65}"#));
    assert!(script.contains(r#"set position of item "README.txt" of container window to {500, 65}"#));
    assert!(script.contains(r#"set position of item "Website.webloc" of container window to {500, 180}"#));
    assert!(script.contains(r#"set position of item "Applications" of container window to {347, 270}"#));
    assert!(script.contains(r#"file ".background:background.png""#));
}

#[tokio::test]
async fn stage_copies_bundle_and_writes_shortcuts() {
    let project = Project::new();
    let config = project.config("1.0.0");
    let runner = FakeRunner::new();
    let assembler = DmgAssembler::new(&config, &runner);

    let staging = assembler
        .stage(config.layout(), config.project_dir())
        .await
        .unwrap();

    let names: Vec<&str> = staging.entries().iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["MyApp.app", "README.txt", "Website.webloc", "Applications"]);

    let dir = staging.path();
    assert!(dir.join("MyApp.app/Contents/MacOS/MyApp").is_file());
    assert_eq!(
        std::fs::read_link(dir.join("Applications")).unwrap(),
        Path::new("/Applications")
    );
    let webloc = plist::Value::from_file(dir.join("Website.webloc")).unwrap();
    assert_eq!(
        webloc
            .as_dictionary()
            .and_then(|d| d.get("URL"))
            .and_then(plist::Value::as_string),
        Some("https://example.com/myapp")
    );
    assert!(runner.commands().is_empty());

    let dir = dir.to_path_buf();
    drop(staging);
    assert!(!dir.exists(), "an unused staging directory is removed on drop");
}

#[tokio::test]
async fn duplicate_names_fail_before_any_image_operation() {
    let project = Project::new();
    let config = project.config("1.0.0");
    let runner = FakeRunner::new();

    let layout = DmgLayout::new(
        vec![
            FileEntry::new(FileSource::StaticPath("README.txt".into()), Position::new(10, 10)),
            FileEntry::new(FileSource::StaticPath("README.txt".into()), Position::new(20, 20)),
        ],
        104,
        12,
    )
    .unwrap();

    let err = DmgAssembler::new(&config, &runner)
        .stage(&layout, config.project_dir())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Config(ref msg) if msg.contains("README.txt")), "{err}");
    assert!(runner.commands().is_empty());
    assert!(!config.writable_image_path().exists());
}

#[tokio::test]
async fn entry_named_applications_clashes_with_the_shortcut() {
    let project = Project::new();
    let config = project.config("1.0.0");
    let runner = FakeRunner::new();

    let layout = DmgLayout::new(
        vec![FileEntry::new(FileSource::StaticPath("README.txt".into()), Position::new(10, 10))
            .with_name("Applications")],
        104,
        12,
    )
    .unwrap()
    .with_applications_link(Some(Position::new(300, 300)));

    let err = DmgAssembler::new(&config, &runner)
        .stage(&layout, config.project_dir())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}

#[tokio::test]
async fn missing_source_is_a_config_error() {
    let project = Project::new();
    std::fs::remove_file(project.root().join("README.txt")).unwrap();
    let config = project.config("1.0.0");
    let runner = FakeRunner::new();

    let err = DmgAssembler::new(&config, &runner).assemble().await.unwrap_err();

    assert!(matches!(err, Error::Config(_)), "{err}");
    assert!(runner.commands().is_empty());
    assert!(!config.staging_dir().exists());
}

#[tokio::test]
async fn transient_busy_mount_and_unmount_are_retried() {
    let project = Project::new();
    let config = project.config("1.0.0");
    let runner = FakeRunner::new().busy_attaches(2).busy_detaches(1);

    DmgAssembler::new(&config, &runner).assemble().await.unwrap();

    assert_eq!(runner.count("hdiutil attach"), 3);
    assert_eq!(runner.count("hdiutil detach"), 2);
    assert_eq!(runner.count("hdiutil convert"), 1);
}

#[tokio::test]
async fn last_unmount_attempt_is_forced() {
    let project = Project::new();
    let config = project.config("1.0.0");
    let runner = FakeRunner::new().busy_detaches(10);

    DmgAssembler::new(&config, &runner).assemble().await.unwrap();

    let detaches: Vec<_> = runner
        .commands()
        .into_iter()
        .filter(|c| c.program == "hdiutil" && c.args[0] == "detach")
        .collect();
    assert_eq!(detaches.len(), 3);
    assert!(!detaches[1].args.contains(&"-force".to_string()));
    assert!(detaches[2].args.contains(&"-force".to_string()));
}

#[tokio::test]
async fn exhausted_mount_retries_report_busy_and_clean_up() {
    let project = Project::new();
    let config = project.config("1.0.0");
    let runner = FakeRunner::new().busy_attaches(10);

    let err = DmgAssembler::new(&config, &runner).assemble().await.unwrap_err();

    match err {
        Error::ResourceBusy { attempts, .. } => assert_eq!(attempts, 3),
        other => panic!("expected busy error, got {other}"),
    }
    assert_eq!(runner.count("hdiutil attach"), 3);
    assert!(!config.writable_image_path().exists());
    assert!(!config.staging_dir().exists());
}

#[tokio::test]
async fn stale_mount_point_counts_as_busy() {
    let project = Project::new();
    let config = project.config("1.0.0");
    std::fs::create_dir_all(config.volume_path()).unwrap();
    let runner = FakeRunner::new();

    let err = DmgAssembler::new(&config, &runner).assemble().await.unwrap_err();

    assert!(matches!(err, Error::ResourceBusy { .. }), "{err}");
    assert_eq!(runner.count("hdiutil attach"), 0);
}

#[tokio::test]
async fn stuck_unmount_gets_one_forced_retry_then_cleans_up() {
    let project = Project::new();
    let config = project.config("1.0.0");
    let runner = FakeRunner::new().stuck_detach();

    let err = DmgAssembler::new(&config, &runner).assemble().await.unwrap_err();

    assert!(matches!(err, Error::ResourceBusy { attempts: 3, .. }), "{err}");
    let detaches: Vec<_> = runner
        .commands()
        .into_iter()
        .filter(|c| c.program == "hdiutil" && c.args[0] == "detach")
        .collect();
    assert_eq!(detaches.len(), 4);
    assert!(detaches[3].args.contains(&"-force".to_string()));
    assert_eq!(runner.count("hdiutil convert"), 0);
    assert!(!config.writable_image_path().exists());
    assert!(!config.staging_dir().exists());
}

#[tokio::test]
async fn layout_failure_unmounts_and_deletes_intermediates() {
    let project = Project::new();
    let config = project.config("1.0.0");
    let runner = FakeRunner::new().fail_layout();

    let err = DmgAssembler::new(&config, &runner).assemble().await.unwrap_err();

    assert!(matches!(err, Error::Tool { ref tool, .. } if tool == "osascript"), "{err}");
    assert_eq!(runner.count("hdiutil detach"), 1);
    assert_eq!(runner.count("hdiutil convert"), 0);
    assert!(!config.volume_path().exists());
    assert!(!config.writable_image_path().exists());
    assert!(!config.staging_dir().exists());
    assert!(!config.package_path().exists());
}

#[tokio::test]
async fn conversion_failure_still_cleans_up() {
    let project = Project::new();
    let config = project.config("1.0.0");
    let runner = FakeRunner::new().fail_convert();

    let err = DmgAssembler::new(&config, &runner).assemble().await.unwrap_err();

    assert!(matches!(err, Error::Tool { .. }), "{err}");
    assert!(!config.writable_image_path().exists());
    assert!(!config.staging_dir().exists());
}

/// Records plans instead of scripting Finder.
#[derive(Debug, Default)]
struct RecordingLayout {
    plans: Mutex<Vec<LayoutPlan>>,
}

impl LayoutApplier for &RecordingLayout {
    async fn apply(&self, volume: &Path, plan: &LayoutPlan) -> Result<()> {
        assert!(volume.is_dir(), "layout applied to an unmounted volume");
        self.plans.lock().unwrap().push(plan.clone());
        Ok(())
    }
}

#[tokio::test]
async fn layout_mechanism_is_replaceable() {
    let project = Project::new();
    let config = project.config("1.0.0");
    let runner = FakeRunner::new();
    let recorder = RecordingLayout::default();

    DmgAssembler::new(&config, &runner)
        .with_applier(&recorder)
        .assemble()
        .await
        .unwrap();

    assert_eq!(runner.count("osascript"), 0);
    let plans = recorder.plans.lock().unwrap();
    assert_eq!(plans.len(), 1);
    assert_eq!(plans[0].volume_name, "MyApp");
    assert_eq!(plans[0].icon_size, 104);
    assert_eq!(plans[0].items.len(), 4);
    assert_eq!(plans[0].background.as_deref(), Some("background.png"));
}

/// Never finishes, like a Finder script waiting on a dialog.
struct StuckLayout;

impl LayoutApplier for StuckLayout {
    async fn apply(&self, _volume: &Path, _plan: &LayoutPlan) -> Result<()> {
        std::future::pending::<()>().await;
        Ok(())
    }
}

#[tokio::test]
async fn dropping_an_interrupted_build_removes_intermediates() {
    let project = Project::new();
    let config = project.config("1.0.0");
    let runner = FakeRunner::new();

    let assembler = DmgAssembler::new(&config, &runner).with_applier(StuckLayout);
    let assembly = assembler.assemble();
    let outcome = tokio::time::timeout(Duration::from_millis(200), assembly).await;

    assert!(outcome.is_err(), "assembly should still be waiting on the layout");
    assert!(!config.writable_image_path().exists());
    assert!(!config.staging_dir().exists());
    assert!(!config.package_path().exists());
}

async fn interrupt_while_waiting_on(call: &'static str) -> Project {
    let project = Project::new();
    let config = project.config("1.0.0");
    let runner = StallingRunner {
        inner: FakeRunner::new(),
        stall_on: call,
    };

    let assembler = DmgAssembler::new(&config, &runner);
    let assembly = assembler.assemble();
    let outcome = tokio::time::timeout(Duration::from_millis(200), assembly).await;

    assert!(outcome.is_err(), "assembly should still be waiting on {call}");
    project
}

#[tokio::test]
async fn interrupt_during_image_creation_removes_staging() {
    let project = interrupt_while_waiting_on("hdiutil create").await;
    let config = project.config("1.0.0");

    assert!(!config.staging_dir().exists());
    assert!(!config.writable_image_path().exists());
}

#[tokio::test]
async fn interrupt_during_mount_removes_staging_and_image() {
    let project = interrupt_while_waiting_on("hdiutil attach").await;
    let config = project.config("1.0.0");

    assert!(!config.staging_dir().exists());
    assert!(!config.writable_image_path().exists());
    assert!(!config.volume_path().exists());
    assert!(!config.package_path().exists());
}

#[tokio::test]
async fn applications_shortcut_gets_custom_icon() {
    let project = Project::new();
    let config = project
        .config_edited("1.0.0", |file| {
            file.dmg.applications_icon = Some("assets/apps.icns".into())
        })
        .unwrap();
    std::fs::create_dir_all(project.root().join("assets")).unwrap();
    std::fs::write(project.root().join("assets/apps.icns"), "icns").unwrap();
    let runner = FakeRunner::new();

    DmgAssembler::new(&config, &runner).assemble().await.unwrap();

    assert_eq!(runner.count("osascript"), 2);
    let applications = config.volume_path().join("Applications");
    let icon_script = runner
        .scripts()
        .into_iter()
        .find(|s| s.contains("setIcon:"))
        .unwrap();
    assert!(icon_script.contains(&format!(r#"forFile:"{}""#, applications.display())));
    assert!(icon_script.contains("assets/apps.icns"));
}

#[tokio::test]
async fn missing_applications_icon_is_skipped() {
    let project = Project::new();
    let config = project
        .config_edited("1.0.0", |file| {
            file.dmg.applications_icon = Some("assets/missing.icns".into())
        })
        .unwrap();
    let runner = FakeRunner::new();

    DmgAssembler::new(&config, &runner).assemble().await.unwrap();

    assert_eq!(runner.count("osascript"), 1);
    assert!(runner.scripts().iter().all(|s| !s.contains("setIcon:")));
}

#[test]
fn applications_icon_without_shortcut_is_rejected() {
    let project = Project::new();
    let err = project
        .config_edited("1.0.0", |file| {
            file.dmg.project_type = ProjectType::Custom;
            file.dmg.applications_icon = Some("assets/apps.icns".into());
        })
        .unwrap_err();
    assert!(matches!(err, Error::Config(ref msg) if msg.contains("applications_icon")), "{err}");
}
