//! Line-oriented consumption of one child output stream.

use crate::buffer::{OutputBuffer, Sequence};
use crate::config::FailurePolicy;
use crate::notify::ChangeNotifier;
use chrono::Local;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::sync::{oneshot, Mutex};
use tracing::{info, warn};

/// Project output file, opened once per run and appended to for the run's
/// duration.
///
/// Under the `report` policy a write failure disables the sink and streaming
/// continues; `abort` keeps the legacy behavior of taking the host down.
pub(crate) struct FileSink {
    path: PathBuf,
    policy: FailurePolicy,
    file: Mutex<Option<File>>,
}

impl FileSink {
    pub(crate) async fn open(path: PathBuf, policy: FailurePolicy) -> Arc<Self> {
        let file = match OpenOptions::new().create(true).append(true).open(&path).await {
            Ok(file) => Some(file),
            Err(err) => {
                Self::report_failure(&path, policy, &err);
                None
            }
        };
        Arc::new(Self {
            path,
            policy,
            file: Mutex::new(file),
        })
    }

    pub(crate) async fn write_line(&self, text: &str) {
        let mut slot = self.file.lock().await;
        let Some(file) = slot.as_mut() else { return };
        let stamped = format!("{} : {text}\r\n", Local::now().format("%Y-%m-%d %H:%M:%S"));
        if let Err(err) = file.write_all(stamped.as_bytes()).await {
            Self::report_failure(&self.path, self.policy, &err);
            *slot = None;
        }
    }

    fn report_failure(path: &Path, policy: FailurePolicy, err: &std::io::Error) {
        if policy == FailurePolicy::Abort {
            eprintln!("fatal: output file {}: {err}", path.display());
            std::process::exit(1);
        }
        warn!(
            "output file {} unavailable, echo disabled: {err}",
            path.display()
        );
    }
}

/// Everything one stream reader needs besides the stream itself.
pub(crate) struct StreamContext {
    pub name: String,
    pub source: Sequence,
    pub buffer: Arc<OutputBuffer>,
    pub notifier: ChangeNotifier,
    pub console: bool,
    pub sink: Option<Arc<FileSink>>,
}

/// Reads `stream` line by line until it closes, appending each line to the
/// buffer sequence for `source` and echoing per configuration. Signals
/// `done` on EOF; that signal is one of the supervisor's three termination
/// race sources.
pub(crate) async fn read_stream<R>(stream: R, ctx: StreamContext, done: oneshot::Sender<()>)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(stream).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        ctx.buffer.append(ctx.source, &line);
        ctx.notifier.notify();
        if ctx.console {
            match ctx.source {
                Sequence::Stderr => warn!("{}: {line}", ctx.name),
                _ => info!("{}: {line}", ctx.name),
            }
        }
        if let Some(sink) = &ctx.sink {
            sink.write_line(&line).await;
        }
    }
    let _ = done.send(());
}
