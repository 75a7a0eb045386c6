#![cfg(unix)]
#![allow(clippy::unwrap_used)] // Integration tests use unwrap for brevity

//! Sessions and reaping against real child processes.

use std::path::Path;
use std::process::{Child, Command};
use std::time::{Duration, SystemTime};

use tokio::sync::mpsc;
use tokio::time::Instant;

use vixen_core::process::platform::{for_process_group, for_strays};
use vixen_core::process::state_file::{SessionRecord, StateFile};
use vixen_core::process::{
    LaunchCommand, MatchQuery, PollBackoff, Reaper, SystemProcessTable, Terminator,
};
use vixen_core::supervisor::ShutdownReport;
use vixen_core::{Session, SessionConfig};

/// A long-running shell whose command line carries `marker`.
fn spawn_marked(marker: &str, dir: &Path) -> Child {
    Command::new("sh")
        .args(["-c", "while :; do sleep 0.1; done", marker])
        .current_dir(dir)
        .spawn()
        .unwrap()
}

fn unique_marker(name: &str) -> String {
    format!("vixen-test-{name}-{}", std::process::id())
}

fn config(command: LaunchCommand, dir: &Path, marker: &str) -> SessionConfig {
    SessionConfig {
        command,
        query: MatchQuery::substring(marker).in_directory(dir),
        grace_period: Duration::from_secs(2),
        force_wait: Duration::from_secs(2),
        backoff: PollBackoff::default(),
        state_file: StateFile::in_project(dir),
    }
}

#[tokio::test]
async fn reaper_terminates_every_matching_process() {
    let dir = tempfile::TempDir::new().unwrap();
    let marker = unique_marker("reap");
    let mut children: Vec<Child> = (0..3).map(|_| spawn_marked(&marker, dir.path())).collect();
    tokio::time::sleep(Duration::from_millis(200)).await;

    let table = SystemProcessTable;
    let signals = for_strays();
    let reaper = Reaper::new(
        &table,
        Terminator::new(signals.as_ref(), PollBackoff::default(), Duration::from_secs(2)),
    );

    let query = MatchQuery::substring(&marker);
    assert_eq!(reaper.reap_all(&query, Duration::from_secs(2)).await, 3);
    assert_eq!(reaper.reap_all(&query, Duration::from_secs(2)).await, 0);

    for child in &mut children {
        assert!(!child.wait().unwrap().success());
    }
}

#[tokio::test]
async fn nonexistent_executable_exits_with_launch_code() {
    let dir = tempfile::TempDir::new().unwrap();
    let marker = unique_marker("launch");
    let config = config(
        LaunchCommand::new("/nonexistent/vixen-bot", &[], dir.path()),
        dir.path(),
        &marker,
    );
    let (group, strays) = (for_process_group(), for_strays());
    let session = Session::new(&SystemProcessTable, group.as_ref(), strays.as_ref());
    let (_tx, mut rx) = mpsc::unbounded_channel();

    let exit = session.run(&config, &mut rx).await;

    assert_eq!(exit.code(), 2);
    assert!(exit.report().is_none());
    assert!(config.state_file.load().unwrap().is_none());
}

#[tokio::test]
async fn child_exit_code_is_passed_through() {
    let dir = tempfile::TempDir::new().unwrap();
    let marker = unique_marker("exit");
    let config = config(
        LaunchCommand::new("sh", &["-c", "exit 7"], dir.path()),
        dir.path(),
        &marker,
    );
    let (group, strays) = (for_process_group(), for_strays());
    let session = Session::new(&SystemProcessTable, group.as_ref(), strays.as_ref());
    let (_tx, mut rx) = mpsc::unbounded_channel();

    let exit = session.run(&config, &mut rx).await;

    assert_eq!(exit.code(), 7);
    assert!(matches!(exit.report(), Some(ShutdownReport::Natural(_))));
    assert!(config.state_file.load().unwrap().is_none());
}

#[tokio::test]
async fn interrupt_stops_bot_and_exits_zero() {
    let dir = tempfile::TempDir::new().unwrap();
    let marker = unique_marker("interrupt");
    let config = config(
        LaunchCommand::new(
            "sh",
            &["-c", "trap 'exit 0' INT; while :; do sleep 0.1; done"],
            dir.path(),
        ),
        dir.path(),
        &marker,
    );
    let (group, strays) = (for_process_group(), for_strays());
    let session = Session::new(&SystemProcessTable, group.as_ref(), strays.as_ref());
    let (tx, mut rx) = mpsc::unbounded_channel();

    let record_path = config.state_file.path().to_path_buf();
    let interrupter = tokio::spawn(async move {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !record_path.exists() && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
        tx.send(()).unwrap();
        tx
    });

    let start = Instant::now();
    let exit = session.run(&config, &mut rx).await;
    drop(interrupter.await.unwrap());

    assert_eq!(exit.code(), 0);
    assert_eq!(exit.report(), Some(&ShutdownReport::Graceful));
    assert!(start.elapsed() < Duration::from_secs(5));
    assert!(config.state_file.load().unwrap().is_none());
}

#[tokio::test]
async fn recorded_orphan_is_reaped_before_launch() {
    let dir = tempfile::TempDir::new().unwrap();
    let marker = unique_marker("orphan");
    let mut orphan = spawn_marked(&marker, dir.path());
    tokio::time::sleep(Duration::from_millis(200)).await;

    let config = config(
        LaunchCommand::new("sh", &["-c", "exit 0"], dir.path()),
        dir.path(),
        &marker,
    );
    config
        .state_file
        .save(&SessionRecord::new(
            orphan.id(),
            "npm run start",
            SystemTime::now(),
        ))
        .unwrap();

    let (group, strays) = (for_process_group(), for_strays());
    let session = Session::new(&SystemProcessTable, group.as_ref(), strays.as_ref());
    let (_tx, mut rx) = mpsc::unbounded_channel();

    let exit = session.run(&config, &mut rx).await;

    assert_eq!(exit.code(), 0);
    assert!(!orphan.wait().unwrap().success());
    assert!(config.state_file.load().unwrap().is_none());
}

#[tokio::test]
async fn interrupt_during_reap_skips_launch() {
    let dir = tempfile::TempDir::new().unwrap();
    let marker = unique_marker("early-interrupt");
    let launched = dir.path().join("launched");
    let config = config(
        LaunchCommand::new(
            "sh",
            &[
                "-c",
                "echo yes > launched; trap 'exit 0' INT; while :; do sleep 0.1; done",
            ],
            dir.path(),
        ),
        dir.path(),
        &marker,
    );
    let (group, strays) = (for_process_group(), for_strays());
    let session = Session::new(&SystemProcessTable, group.as_ref(), strays.as_ref());
    let (tx, mut rx) = mpsc::unbounded_channel();
    tx.send(()).unwrap();

    let exit = session.run(&config, &mut rx).await;

    assert_eq!(exit.code(), 0);
    assert!(exit.report().is_none());
    assert!(!launched.exists());
    assert!(config.state_file.load().unwrap().is_none());
}
