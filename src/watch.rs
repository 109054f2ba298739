//! Multi-project watch session: the parent coordinator that owns supervised
//! runs, their stop signals, and the completion wait-group.

use crate::batch;
use crate::buffer::OutputBuffer;
use crate::config::{ProjectConfig, Settings};
use crate::error::{Error, Result};
use crate::notify::ChangeNotifier;
use crate::runner::{CommandRunner, TokioCommandRunner};
use crate::supervisor::{
    EchoConfig, ProcessUnit, RunGroup, RunSignals, StopHandle, Supervisor,
};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{error, info, trace, warn};

pub struct WatchSession {
    settings: Settings,
}

impl WatchSession {
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }

    /// Launches every configured project under supervision and blocks until
    /// all runs have fully stopped, either on their own or after Ctrl-C.
    pub async fn run(self) -> Result<()> {
        if self.settings.projects.is_empty() {
            return Err(Error::NoProjects);
        }

        let runner: Arc<dyn CommandRunner> = Arc::new(TokioCommandRunner);
        let (notifier, mut changes) = ChangeNotifier::channel(64);

        // Drain pings; a UI renderer would hook in here.
        tokio::spawn(async move {
            while changes.recv().await.is_some() {
                trace!("log buffers changed");
            }
        });

        let group = RunGroup::new();
        let mut stops = Vec::new();

        for project in &self.settings.projects {
            let buffer = Arc::new(OutputBuffer::new());

            let setup_errors =
                batch::run_all(runner.as_ref(), &project.setup, &project.path, &buffer).await;
            if let Some(err) = setup_errors.into_iter().next() {
                error!("{}: setup failed: {err}", project.name);
                continue;
            }

            let supervisor = Supervisor::new(
                self.unit_for(project),
                Arc::clone(&buffer),
                notifier.clone(),
                self.settings.on_failure,
            );

            let (stop, stop_rx) = StopHandle::pair();
            let (started_tx, started_rx) = oneshot::channel();
            let signals = RunSignals {
                stop: stop_rx,
                started: started_tx,
                completion: group.token(),
            };
            stops.push(stop);

            let name = project.name.clone();
            tokio::spawn(async move {
                if let Err(err) = supervisor.supervise(signals).await {
                    error!("{name}: {err}");
                }
            });

            match started_rx.await {
                Ok(pid) => info!("{} running (pid {pid})", project.name),
                Err(_) => warn!("{} did not start", project.name),
            }
        }

        if stops.is_empty() {
            return Err(Error::NothingStarted);
        }

        info!("watching {} project(s), Ctrl-C to stop", stops.len());

        let mut all_done = Box::pin(group.wait());
        tokio::select! {
            _ = &mut all_done => {
                info!("all runs ended");
                return Ok(());
            }
            _ = tokio::signal::ctrl_c() => {
                info!("stop requested");
                for stop in stops.drain(..) {
                    stop.stop();
                }
            }
        }
        all_done.await;
        info!("all runs stopped");
        Ok(())
    }

    fn unit_for(&self, project: &ProjectConfig) -> ProcessUnit {
        let file = project.streams.file.then(|| {
            project
                .output_file
                .clone()
                .unwrap_or_else(|| project.path.join("output.log"))
        });
        ProcessUnit {
            name: project.name.clone(),
            path: project.path.clone(),
            bin_dir: self.settings.toolchain.bin_dir.clone(),
            params: project.params.clone(),
            working_dir: project.path.clone(),
            echo: EchoConfig {
                console: project.streams.console,
                file,
            },
        }
    }
}
