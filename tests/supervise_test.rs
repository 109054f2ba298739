//! End-to-end supervision tests against real shell children.

use liverun::buffer::{OutputBuffer, Sequence};
use liverun::config::FailurePolicy;
use liverun::notify::ChangeNotifier;
use liverun::supervisor::{
    EchoConfig, ProcessUnit, RunGroup, RunSignals, StopHandle, Supervisor, SuperviseError,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

/// A unit that runs `sh -c <script>`; resolution picks `/bin/sh` because
/// the binary name is the path's final component under `bin_dir`.
fn shell_unit(script: &str, working_dir: &Path) -> ProcessUnit {
    ProcessUnit {
        name: "testrun".to_string(),
        path: PathBuf::from("scripts/sh"),
        bin_dir: PathBuf::from("/bin"),
        params: vec!["-c".to_string(), script.to_string()],
        working_dir: working_dir.to_path_buf(),
        echo: EchoConfig::default(),
    }
}

fn supervisor(unit: ProcessUnit, buffer: &Arc<OutputBuffer>) -> Supervisor {
    let (notifier, _changes) = ChangeNotifier::channel(64);
    Supervisor::new(unit, Arc::clone(buffer), notifier, FailurePolicy::Report)
}

async fn wait_for(mut cond: impl FnMut() -> bool) {
    for _ in 0..500 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met within 5s");
}

fn process_alive(pid: u32) -> bool {
    unsafe { libc::kill(pid as i32, 0) == 0 }
}

#[tokio::test]
async fn stop_signal_terminates_a_blocked_process() {
    let dir = tempfile::tempdir().unwrap();
    let buffer = Arc::new(OutputBuffer::new());
    let supervisor = supervisor(shell_unit("echo ready; sleep 30", dir.path()), &buffer);

    let group = RunGroup::new();
    let (stop, stop_rx) = StopHandle::pair();
    let (started_tx, started_rx) = oneshot::channel();
    let handle = tokio::spawn(supervisor.supervise(RunSignals {
        stop: stop_rx,
        started: started_tx,
        completion: group.token(),
    }));

    let pid = started_rx.await.expect("process should start");
    assert!(process_alive(pid));

    tokio::time::sleep(Duration::from_millis(100)).await;
    stop.stop();

    let result = handle.await.unwrap();
    assert!(result.is_ok());
    group.wait().await;

    assert!(!process_alive(pid));

    let buf = Arc::clone(&buffer);
    wait_for(move || buf.len(Sequence::Stdout) == 1).await;
    let out = buffer.snapshot(Sequence::Stdout);
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].text, "ready");
    let lifecycle: Vec<String> = buffer
        .snapshot(Sequence::Lifecycle)
        .into_iter()
        .map(|e| e.text)
        .collect();
    assert_eq!(lifecycle, vec!["Started", "Ended"]);
}

#[tokio::test]
async fn clean_exit_captures_every_line_on_both_streams() {
    let dir = tempfile::tempdir().unwrap();
    let buffer = Arc::new(OutputBuffer::new());
    let script = "printf 'a\\nb\\nc\\n'; printf 'x\\ny\\n' 1>&2";
    let supervisor = supervisor(shell_unit(script, dir.path()), &buffer);

    let group = RunGroup::new();
    let (stop, stop_rx) = StopHandle::pair();
    let (started_tx, _started_rx) = oneshot::channel();
    let result = supervisor
        .supervise(RunSignals {
            stop: stop_rx,
            started: started_tx,
            completion: group.token(),
        })
        .await;
    assert!(result.is_ok());
    drop(stop);
    group.wait().await;

    // the supervisor returns as soon as the first stream closes; the other
    // reader may still be draining
    let buf = Arc::clone(&buffer);
    wait_for(move || buf.len(Sequence::Stdout) == 3 && buf.len(Sequence::Stderr) == 2).await;

    let out = buffer.snapshot(Sequence::Stdout);
    let texts: Vec<&str> = out.iter().map(|e| e.text.as_str()).collect();
    assert_eq!(texts, vec!["a", "b", "c"]);
    for pair in out.windows(2) {
        assert!(pair[0].timestamp <= pair[1].timestamp);
    }
    assert_eq!(buffer.len(Sequence::Lifecycle), 2);
}

#[tokio::test]
async fn missing_executable_fails_startup_without_lifecycle_entries() {
    let dir = tempfile::tempdir().unwrap();
    let buffer = Arc::new(OutputBuffer::new());
    let unit = ProcessUnit {
        name: "ghost".to_string(),
        path: PathBuf::from("projects/ghost"),
        bin_dir: dir.path().to_path_buf(),
        params: Vec::new(),
        working_dir: dir.path().to_path_buf(),
        echo: EchoConfig::default(),
    };
    let supervisor = supervisor(unit, &buffer);

    let group = RunGroup::new();
    let (_stop, stop_rx) = StopHandle::pair();
    let (started_tx, started_rx) = oneshot::channel();
    let result = supervisor
        .supervise(RunSignals {
            stop: stop_rx,
            started: started_tx,
            completion: group.token(),
        })
        .await;

    assert!(matches!(result, Err(SuperviseError::Start { .. })));
    assert!(started_rx.await.is_err());
    assert_eq!(buffer.len(Sequence::Lifecycle), 0);
    // the completion token was still released
    group.wait().await;
}

#[tokio::test]
async fn file_echo_appends_timestamped_lines_for_the_whole_run() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("output.log");
    let buffer = Arc::new(OutputBuffer::new());
    let mut unit = shell_unit("echo one; echo two", dir.path());
    unit.echo = EchoConfig {
        console: false,
        file: Some(log_path.clone()),
    };
    let supervisor = supervisor(unit, &buffer);

    let group = RunGroup::new();
    let (_stop, stop_rx) = StopHandle::pair();
    let (started_tx, _started_rx) = oneshot::channel();
    supervisor
        .supervise(RunSignals {
            stop: stop_rx,
            started: started_tx,
            completion: group.token(),
        })
        .await
        .unwrap();
    group.wait().await;

    let path = log_path.clone();
    wait_for(move || {
        std::fs::read_to_string(&path)
            .map(|c| c.contains("one") && c.contains("two"))
            .unwrap_or(false)
    })
    .await;

    let content = std::fs::read_to_string(&log_path).unwrap();
    let lines: Vec<&str> = content.split("\r\n").filter(|l| !l.is_empty()).collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].ends_with(" : one"));
    assert!(lines[1].ends_with(" : two"));
    assert_eq!(lines[0].find(" : "), Some(19));
}

#[tokio::test]
async fn stderr_closing_also_ends_the_race() {
    let dir = tempfile::tempdir().unwrap();
    let buffer = Arc::new(OutputBuffer::new());
    // stderr closes while stdout stays open via the lingering subshell
    let script = "exec 2>&-; sleep 30";
    let supervisor = supervisor(shell_unit(script, dir.path()), &buffer);

    let group = RunGroup::new();
    let (_stop, stop_rx) = StopHandle::pair();
    let (started_tx, started_rx) = oneshot::channel();
    let handle = tokio::spawn(supervisor.supervise(RunSignals {
        stop: stop_rx,
        started: started_tx,
        completion: group.token(),
    }));

    let pid = started_rx.await.expect("process should start");
    let result = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("supervise should return once stderr closes")
        .unwrap();
    assert!(result.is_ok());
    group.wait().await;
    assert!(!process_alive(pid));
}
