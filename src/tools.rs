//! Fixed toolchain invocations with captured diagnostics.

use crate::buffer::{OutputBuffer, Sequence};
use crate::config::ToolchainConfig;
use crate::notify::ChangeNotifier;
use crate::runner::{CommandOutput, CommandRunner, CommandSpec, RunnerError};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    Build,
    Install,
    Test,
    Generate,
    Format,
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Tool::Build => "build",
            Tool::Install => "install",
            Tool::Test => "test",
            Tool::Generate => "generate",
            Tool::Format => "format",
        };
        f.write_str(name)
    }
}

/// Which captured stream carries a tool's diagnostics.
#[derive(Debug, Clone, Copy)]
enum Capture {
    Stderr,
    Combined,
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("{tool} exited with code {code}")]
    Exit {
        tool: Tool,
        code: i32,
        diagnostics: String,
    },

    #[error("failed to run {tool}: {source}")]
    Run { tool: Tool, source: RunnerError },
}

impl ToolError {
    /// Captured tool output, empty when the tool never ran.
    pub fn diagnostics(&self) -> &str {
        match self {
            ToolError::Exit { diagnostics, .. } => diagnostics,
            ToolError::Run { .. } => "",
        }
    }
}

/// Runs the fixed build-tool command set for one project directory.
///
/// Every failure appends its error text to the shared buffer's error
/// sequence, and every call fires the change notifier on the way out.
pub struct Toolchain {
    config: ToolchainConfig,
    buffer: Arc<OutputBuffer>,
    notifier: ChangeNotifier,
    runner: Arc<dyn CommandRunner>,
}

impl Toolchain {
    pub fn new(
        config: ToolchainConfig,
        buffer: Arc<OutputBuffer>,
        notifier: ChangeNotifier,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        Self {
            config,
            buffer,
            notifier,
            runner,
        }
    }

    pub async fn build(&self, dir: &Path) -> Result<(), ToolError> {
        let spec = CommandSpec::new(&self.config.program)
            .arg("build")
            .current_dir(dir);
        self.invoke(Tool::Build, spec, Capture::Stderr).await
    }

    /// The install target rides on the child command's environment only;
    /// nothing process-wide is mutated.
    pub async fn install(&self, dir: &Path) -> Result<(), ToolError> {
        let bin_dir = self.config.bin_dir.display().to_string();
        let spec = CommandSpec::new(&self.config.program)
            .arg("install")
            .env(&self.config.bin_dir_env, &bin_dir)
            .current_dir(dir);
        self.invoke(Tool::Install, spec, Capture::Stderr).await
    }

    pub async fn test(&self, dir: &Path) -> Result<(), ToolError> {
        let spec = CommandSpec::new(&self.config.program)
            .arg("test")
            .current_dir(dir);
        self.invoke(Tool::Test, spec, Capture::Combined).await
    }

    pub async fn generate(&self, dir: &Path) -> Result<(), ToolError> {
        let spec = CommandSpec::new(&self.config.program)
            .arg("generate")
            .current_dir(dir);
        self.invoke(Tool::Generate, spec, Capture::Combined).await
    }

    pub async fn format(&self, file: &Path, dir: &Path) -> Result<(), ToolError> {
        let spec = CommandSpec::new(&self.config.formatter)
            .args(&self.config.formatter_args)
            .arg(&file.display().to_string())
            .current_dir(dir);
        self.invoke(Tool::Format, spec, Capture::Combined).await
    }

    async fn invoke(&self, tool: Tool, spec: CommandSpec, capture: Capture) -> Result<(), ToolError> {
        tracing::debug!("invoking {tool}");
        let outcome = match self.runner.run(spec).await {
            Ok(output) if output.success() => Ok(()),
            Ok(output) => Err(ToolError::Exit {
                tool,
                code: output.exit_code.unwrap_or(-1),
                diagnostics: Self::diagnostics(&output, capture),
            }),
            Err(source) => Err(ToolError::Run { tool, source }),
        };
        if let Err(err) = &outcome {
            self.buffer.append(Sequence::Stderr, err.to_string());
        }
        self.notifier.notify();
        outcome
    }

    fn diagnostics(output: &CommandOutput, capture: Capture) -> String {
        match capture {
            Capture::Stderr => output.stderr.clone(),
            Capture::Combined => output.combined(),
        }
    }
}
