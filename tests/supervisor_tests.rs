#![cfg(unix)]

use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use ipcam_recorder::{ProcessSupervisor, RecorderConfig, RecorderError, SupervisorState};

fn script(body: &str) -> ProcessSupervisor {
    ProcessSupervisor::with_command("sh", ["-c", body])
}

fn wait_until(limit: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + limit;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    cond()
}

#[test]
fn test_start_then_stop_immediately() {
    let mut sup = script("exec sleep 30");
    sup.start().unwrap();
    sup.stop(Duration::ZERO).unwrap();

    assert!(!sup.is_running());
    assert_eq!(sup.current_filename(), None);
    assert_eq!(sup.state(), SupervisorState::Stopped);
}

#[test]
fn test_start_then_stop_without_encoder_binary() {
    let cfg = RecorderConfig {
        program: "/nonexistent/ffmpeg".into(),
        ..RecorderConfig::new("rtsp", "rtsp://127.0.0.1/live", "/tmp/ipcam-test")
    };
    let mut sup = ProcessSupervisor::new(&cfg).unwrap();

    sup.start().unwrap();
    std::thread::sleep(Duration::from_millis(100));
    let started = Instant::now();
    sup.stop(Duration::ZERO).unwrap();

    // the respawn backoff is interrupted, not waited out
    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(!sup.is_running());
}

#[test]
fn test_running_after_spawn() {
    let mut sup = script("exec sleep 30");
    sup.start().unwrap();

    assert!(wait_until(Duration::from_secs(5), || sup.state() == SupervisorState::Running));
    assert!(sup.is_running());

    sup.stop(Duration::ZERO).unwrap();
    assert!(!sup.is_running());
}

#[test]
fn test_stop_is_idempotent() {
    let mut sup = script("exec sleep 30");
    sup.stop(Duration::ZERO).unwrap();

    sup.start().unwrap();
    sup.stop(Duration::ZERO).unwrap();
    sup.stop(Duration::ZERO).unwrap();

    assert_eq!(sup.state(), SupervisorState::Stopped);
    assert_eq!(sup.current_filename(), None);
}

#[test]
fn test_segment_line_sets_current_filename() {
    let mut sup = script(
        "printf \"[segment @ 0x5581] Opening '/data/20240110/20240110-120000.mp4' for writing\\n\"; exec sleep 30",
    );
    sup.start().unwrap();

    assert!(wait_until(Duration::from_secs(5), || sup.current_filename().is_some()));
    assert_eq!(
        sup.current_filename(),
        Some(PathBuf::from("/data/20240110/20240110-120000.mp4"))
    );

    sup.stop(Duration::ZERO).unwrap();
    assert_eq!(sup.current_filename(), None);
}

#[test]
fn test_segment_line_without_path_is_ignored() {
    let mut sup = script(
        "printf '[segment @ 0x5581] Opening file for writing\\ndone\\n'; exec sleep 30",
    );
    let seen = Arc::new(Mutex::new(Vec::<String>::new()));
    {
        let seen = seen.clone();
        sup.set_line_observer(move |line| seen.lock().unwrap().push(line.to_string()));
    }
    sup.start().unwrap();

    assert!(wait_until(Duration::from_secs(5), || {
        seen.lock().unwrap().iter().any(|l| l == "done")
    }));
    assert_eq!(sup.current_filename(), None);
    assert_eq!(*seen.lock().unwrap(), vec!["done"]);

    sup.stop(Duration::ZERO).unwrap();
}

#[test]
fn test_progress_lines_reach_observer_once_rewritten() {
    let mut sup = script("printf 'frame=1\\rframe=2\\rframe=3\\n'; exec sleep 30");
    let seen = Arc::new(Mutex::new(Vec::<String>::new()));
    {
        let seen = seen.clone();
        sup.set_line_observer(move |line| seen.lock().unwrap().push(line.to_string()));
    }
    sup.start().unwrap();

    assert!(wait_until(Duration::from_secs(5), || !seen.lock().unwrap().is_empty()));
    sup.stop(Duration::ZERO).unwrap();

    assert_eq!(*seen.lock().unwrap(), vec!["frame=3"]);
}

#[test]
fn test_unexpected_exit_respawns() {
    let dir = tempfile::tempdir().unwrap();
    let runs = dir.path().join("runs");
    let body = format!("echo run >> '{}'; exit 1", runs.display());
    let mut sup = script(&body);
    sup.start().unwrap();

    let count = || {
        fs::read_to_string(&runs)
            .map(|s| s.lines().count())
            .unwrap_or(0)
    };
    assert!(wait_until(Duration::from_secs(10), || count() >= 2));

    sup.stop(Duration::ZERO).unwrap();
    let after_stop = count();
    std::thread::sleep(Duration::from_millis(3500));
    assert_eq!(count(), after_stop);
}

#[test]
fn test_restart_replaces_process() {
    let dir = tempfile::tempdir().unwrap();
    let runs = dir.path().join("runs");
    let body = format!("echo run >> '{}'; exec sleep 30", runs.display());
    let mut sup = script(&body);
    let count = || {
        fs::read_to_string(&runs)
            .map(|s| s.lines().count())
            .unwrap_or(0)
    };

    sup.start().unwrap();
    assert!(wait_until(Duration::from_secs(5), || count() == 1));

    sup.restart(Duration::from_secs(5)).unwrap();
    assert!(wait_until(Duration::from_secs(5), || count() == 2));
    assert!(wait_until(Duration::from_secs(5), || sup.is_running()));

    sup.stop(Duration::ZERO).unwrap();
}

/// Encoder stand-in that ignores SIGTERM; returns once the trap is in place.
fn start_stubborn() -> ProcessSupervisor {
    let mut sup = script("trap '' TERM; echo ready; exec sleep 30");
    let ready = Arc::new(Mutex::new(false));
    {
        let ready = ready.clone();
        sup.set_line_observer(move |line| {
            if line == "ready" {
                *ready.lock().unwrap() = true;
            }
        });
    }
    sup.start().unwrap();
    assert!(wait_until(Duration::from_secs(5), || *ready.lock().unwrap()));
    assert!(wait_until(Duration::from_secs(5), || sup.is_running()));
    sup
}

#[test]
fn test_stop_times_out_when_term_ignored() {
    let mut sup = start_stubborn();

    let err = sup.stop(Duration::from_secs(1)).unwrap_err();
    assert!(matches!(err, RecorderError::StallTimeout { .. }));
    assert!(!sup.is_running());
    assert!(matches!(sup.start(), Err(RecorderError::NotStopped)));

    // a later stop finishes the job
    sup.stop(Duration::ZERO).unwrap();
    assert_eq!(sup.state(), SupervisorState::Stopped);
    sup.start().unwrap();
    sup.stop(Duration::ZERO).unwrap();
}

#[test]
fn test_stop_force_kills_after_grace() {
    let mut sup = start_stubborn();

    let started = Instant::now();
    sup.stop(Duration::ZERO).unwrap();
    let took = started.elapsed();

    assert!(took >= Duration::from_secs(3));
    assert!(took < Duration::from_secs(10));
    assert!(!sup.is_running());
}
