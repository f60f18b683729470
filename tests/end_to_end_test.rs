//! End-to-end build of a customized image with a mock `lb`
//!
//! Covers the whole flow: configure command rendering, asset import into the
//! live-build tree, builder invocation, artifact collection with checksums and
//! the progress stream seen by a subscriber.

use livebuilder::pipeline::stages::{PACKAGE_LIST_PATH, SPLASH_DIR};
use livebuilder::process::{MockOutcome, MockRunner};
use livebuilder::progress::{EventKind, UpdateMode};
use livebuilder::{BuildConfig, ImageLabels, Orchestrator, PipelineState};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

const ISO_NAME: &str = "live-image-amd64.hybrid.iso";
const ISO_BYTES: &[u8] = b"not really an iso";

fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path
}

fn assets(dir: &Path) -> BuildConfig {
    let motd = write(dir, "motd", "/etc/motd\nWelcome to Rescue\nHave fun");
    let hook = write(
        dir,
        "hook",
        "config/hooks/live/0100-clean.hook.chroot\n#!/bin/sh\napt-get clean",
    );
    let bashrc = write(dir, "bashrc", "\nalias ll='ls -l'");
    write(
        dir,
        "bashrc.meta.json",
        r#"{"install_path": "/etc/skel/.bashrc"}"#,
    );
    let list = write(dir, "tools.list", "vim\ncurl");
    let splash = write(dir, "splash.png", "PNG");

    BuildConfig::default()
        .with_labels(ImageLabels {
            volume: "Rescue Disk".to_string(),
            ..ImageLabels::default()
        })
        .with_custom_file(motd)
        .with_custom_file(hook)
        .with_custom_file(bashrc)
        .with_package_list(list)
        .with_splash_image(splash)
}

#[tokio::test]
async fn test_full_build() {
    let inputs = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();

    let runner = Arc::new(MockRunner::new());
    runner.add_outcomes([
        MockOutcome::success().with_stdout("P: Updating config tree"),
        MockOutcome::success()
            .with_stdout("P: Building binary image")
            .with_file(ISO_NAME, ISO_BYTES),
    ]);

    let config = assets(inputs.path()).with_artifact_dir(out.path());
    let mut orchestrator = Orchestrator::with_runner(config, runner.clone());
    let mut sub = orchestrator.subscribe();

    let dir = orchestrator.build(Some(work.path())).await.unwrap();
    assert_eq!(dir, work.path());
    assert_eq!(orchestrator.state(), PipelineState::Done);

    // Commands
    let calls = runner.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].program(), "lb");
    assert_eq!(calls[0].argv[1], "config");
    assert!(calls[0].argv.contains(&"Rescue_Disk".to_string()));
    assert_eq!(calls[1].argv, vec!["lb", "build"]);
    assert!(calls.iter().all(|c| c.working_dir == work.path()));

    // Imported tree
    let read = |rel: &str| fs::read_to_string(work.path().join(rel)).unwrap();
    assert_eq!(read("etc/motd"), "Welcome to Rescue\nHave fun\n");
    assert_eq!(
        read("config/hooks/live/0100-clean.hook.chroot"),
        "#!/bin/sh\napt-get clean\n"
    );
    assert_eq!(read("etc/skel/.bashrc"), "alias ll='ls -l'\n");
    assert_eq!(read(PACKAGE_LIST_PATH), "vim\ncurl\n");
    assert_eq!(read(&format!("{}/splash.png", SPLASH_DIR)), "PNG");

    // Collected artifact and checksum
    let collected = out.path().join(ISO_NAME);
    assert_eq!(fs::read(&collected).unwrap(), ISO_BYTES);
    let digest = hex::encode(Sha256::digest(ISO_BYTES));
    let sidecar = fs::read_to_string(out.path().join(format!("{}.sha256", ISO_NAME))).unwrap();
    assert_eq!(sidecar, format!("{}  {}\n", digest, ISO_NAME));

    // Progress stream
    let events = sub.drain();
    let messages: Vec<&str> = events.iter().map(|e| e.message()).collect();
    assert!(messages.contains(&"P: Updating config tree\n"));
    assert!(messages.contains(&"P: Building binary image\n"));
    assert!(messages.contains(&"Import finished\n"));
    assert!(messages
        .iter()
        .any(|m| m.starts_with("Copying ") && m.contains(ISO_NAME)));

    let starts = events.iter().filter(|e| e.kind() == EventKind::Start);
    assert!(starts.clone().all(|e| e.mode() == UpdateMode::Replace));
    assert_eq!(starts.count(), 5);

    let last = events.last().unwrap();
    assert_eq!(last.kind(), EventKind::End);
    assert_eq!(last.mode(), UpdateMode::Append);
    assert_eq!(
        last.message(),
        format!("Build finished in {}\n", work.path().display())
    );
    assert_eq!(
        events.iter().filter(|e| e.kind() == EventKind::End).count(),
        1
    );
}

#[tokio::test]
async fn test_build_without_artifacts_succeeds() {
    let work = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let runner = Arc::new(MockRunner::new());

    let config = BuildConfig::default().with_artifact_dir(out.path());
    let mut orchestrator = Orchestrator::with_runner(config, runner);
    let mut sub = orchestrator.subscribe();

    orchestrator.build(Some(work.path())).await.unwrap();

    let events = sub.drain();
    assert!(events.iter().any(|e| e.message() == "No artifacts found\n"));
    assert_eq!(fs::read_dir(out.path()).unwrap().count(), 0);
}
