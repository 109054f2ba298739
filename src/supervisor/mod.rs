//! Supervised execution of one long-running project binary.
//!
//! A supervised run owns the child process and two concurrent stream
//! readers, races external termination against stream closure, and
//! guarantees the child is dead by the time `supervise` returns.

mod stream;

use crate::buffer::{OutputBuffer, Sequence};
use crate::config::FailurePolicy;
use crate::notify::ChangeNotifier;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use thiserror::Error;
use tokio::process::Command;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

/// One managed execution: which binary to launch, where, and how to echo
/// its output.
#[derive(Debug, Clone)]
pub struct ProcessUnit {
    pub name: String,
    /// Project source path; the binary name is its final component.
    pub path: PathBuf,
    /// Directory the project's binary is installed under.
    pub bin_dir: PathBuf,
    pub params: Vec<String>,
    pub working_dir: PathBuf,
    pub echo: EchoConfig,
}

#[derive(Debug, Clone, Default)]
pub struct EchoConfig {
    /// Echo captured lines to the console log.
    pub console: bool,
    /// Append timestamped lines to this file for the run's duration.
    pub file: Option<PathBuf>,
}

impl ProcessUnit {
    /// Resolved executable: the project binary under `bin_dir`.
    pub fn executable(&self) -> PathBuf {
        match self.path.file_name() {
            Some(name) => self.bin_dir.join(name),
            None => self.bin_dir.clone(),
        }
    }
}

/// One-shot external termination request for a supervised run.
///
/// Dropping the handle without calling [`StopHandle::stop`] also counts as
/// a stop request, so an abandoned run cannot outlive its owner.
pub struct StopHandle {
    tx: oneshot::Sender<()>,
}

impl StopHandle {
    pub fn pair() -> (StopHandle, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        (StopHandle { tx }, rx)
    }

    /// Fires the termination signal. A run that already ended ignores it.
    pub fn stop(self) {
        let _ = self.tx.send(());
    }
}

/// Released (by drop) once a run has fully stopped; the parent coordinator
/// collects these through a [`RunGroup`].
pub struct CompletionToken {
    _tx: mpsc::Sender<()>,
}

impl CompletionToken {
    pub fn release(self) {}
}

/// Wait-group over completion tokens.
pub struct RunGroup {
    tx: mpsc::Sender<()>,
    rx: mpsc::Receiver<()>,
}

impl RunGroup {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel(1);
        Self { tx, rx }
    }

    pub fn token(&self) -> CompletionToken {
        CompletionToken {
            _tx: self.tx.clone(),
        }
    }

    /// Resolves once every token handed out has been released.
    pub async fn wait(mut self) {
        drop(self.tx);
        while self.rx.recv().await.is_some() {}
    }
}

impl Default for RunGroup {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-run signal endpoints handed to the supervisor.
pub struct RunSignals {
    /// External termination request.
    pub stop: oneshot::Receiver<()>,
    /// Reports the child pid once the process is live.
    pub started: oneshot::Sender<u32>,
    /// Released when the run has fully stopped.
    pub completion: CompletionToken,
}

#[derive(Debug, Error)]
pub enum SuperviseError {
    #[error("failed to start {name}: {source}")]
    Start {
        name: String,
        source: std::io::Error,
    },

    #[error("failed to capture {stream} of {name}")]
    Pipe { name: String, stream: &'static str },

    #[error("failed to stop {name}: {source}")]
    Kill {
        name: String,
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    Starting,
    Running,
    Stopping,
    Stopped,
}

/// Owns one child process's lifetime from launch to guaranteed termination.
pub struct Supervisor {
    unit: ProcessUnit,
    buffer: Arc<OutputBuffer>,
    notifier: ChangeNotifier,
    policy: FailurePolicy,
}

impl Supervisor {
    pub fn new(
        unit: ProcessUnit,
        buffer: Arc<OutputBuffer>,
        notifier: ChangeNotifier,
        policy: FailurePolicy,
    ) -> Self {
        Self {
            unit,
            buffer,
            notifier,
            policy,
        }
    }

    /// Runs the unit until the first of: external stop request, stdout
    /// closed, stderr closed. The race has no priority ordering, and the
    /// reader for the other stream may still be draining when this returns.
    /// On every post-spawn path the child is killed before returning.
    pub async fn supervise(self, signals: RunSignals) -> Result<(), SuperviseError> {
        let RunSignals {
            mut stop,
            started,
            completion,
        } = signals;

        let exe = self.unit.executable();
        self.transition(RunState::Starting);
        debug!(
            "launching {} ({} {})",
            self.unit.name,
            exe.display(),
            self.unit.params.join(" ")
        );

        let mut cmd = Command::new(&exe);
        cmd.args(&self.unit.params)
            .current_dir(&self.unit.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(source) => {
                error!("failed to start {}: {source}", self.unit.name);
                completion.release();
                return Err(SuperviseError::Start {
                    name: self.unit.name.clone(),
                    source,
                });
            }
        };

        let stdout = match child.stdout.take() {
            Some(stdout) => stdout,
            None => {
                return self
                    .startup_pipe_failure(child, completion, "stdout")
                    .await;
            }
        };
        let stderr = match child.stderr.take() {
            Some(stderr) => stderr,
            None => {
                return self
                    .startup_pipe_failure(child, completion, "stderr")
                    .await;
            }
        };

        let pid = child.id().unwrap_or_default();
        let _ = started.send(pid);
        self.transition(RunState::Running);
        info!("{} started (pid {pid})", self.unit.name);
        self.buffer.append(Sequence::Lifecycle, "Started");

        let sink = match &self.unit.echo.file {
            Some(path) => Some(stream::FileSink::open(path.clone(), self.policy).await),
            None => None,
        };

        let (out_done_tx, mut out_done) = oneshot::channel();
        let (err_done_tx, mut err_done) = oneshot::channel();
        tokio::spawn(stream::read_stream(
            stdout,
            self.stream_context(Sequence::Stdout, sink.clone()),
            out_done_tx,
        ));
        tokio::spawn(stream::read_stream(
            stderr,
            self.stream_context(Sequence::Stderr, sink),
            err_done_tx,
        ));

        tokio::select! {
            _ = &mut stop => debug!("{}: stop requested", self.unit.name),
            _ = &mut out_done => debug!("{}: stdout closed", self.unit.name),
            _ = &mut err_done => debug!("{}: stderr closed", self.unit.name),
        }
        self.transition(RunState::Stopping);

        let result = match child.kill().await {
            Ok(()) => Ok(()),
            Err(source) => {
                self.buffer
                    .append(Sequence::Lifecycle, format!("Failed to stop: {source}"));
                if self.policy == FailurePolicy::Abort {
                    eprintln!("fatal: failed to stop {}: {source}", self.unit.name);
                    std::process::exit(1);
                }
                Err(SuperviseError::Kill {
                    name: self.unit.name.clone(),
                    source,
                })
            }
        };

        self.buffer.append(Sequence::Lifecycle, "Ended");
        self.transition(RunState::Stopped);
        info!("{} ended", self.unit.name);
        self.notifier.notify();
        completion.release();
        result
    }

    fn stream_context(
        &self,
        source: Sequence,
        sink: Option<Arc<stream::FileSink>>,
    ) -> stream::StreamContext {
        stream::StreamContext {
            name: self.unit.name.clone(),
            source,
            buffer: Arc::clone(&self.buffer),
            notifier: self.notifier.clone(),
            console: self.unit.echo.console,
            sink,
        }
    }

    async fn startup_pipe_failure(
        &self,
        mut child: tokio::process::Child,
        completion: CompletionToken,
        which: &'static str,
    ) -> Result<(), SuperviseError> {
        error!("failed to capture {which} of {}", self.unit.name);
        let _ = child.kill().await;
        completion.release();
        Err(SuperviseError::Pipe {
            name: self.unit.name.clone(),
            stream: which,
        })
    }

    fn transition(&self, state: RunState) {
        debug!("{}: {state:?}", self.unit.name);
    }
}
