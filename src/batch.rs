//! Sequential execution of user-declared command lists.

use crate::buffer::{OutputBuffer, Sequence};
use crate::runner::{CommandRunner, CommandSpec, RunnerError};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("unparseable command {command:?}: {source}")]
    Parse {
        command: String,
        source: shell_words::ParseError,
    },

    #[error("empty command")]
    Empty,

    #[error("command {command:?} exited with code {code}")]
    Exit { command: String, code: i32 },

    #[error("command {command:?} failed: {source}")]
    Run {
        command: String,
        source: RunnerError,
    },
}

/// Runs `commands` in order, stopping at the first failure.
///
/// The failing command's error is appended to the buffer's error sequence
/// and collected into the returned list; commands after it are never
/// attempted, so the list holds at most one error.
///
/// Command strings are tokenized with shell rules, so quoted arguments
/// containing spaces survive as single argv entries.
pub async fn run_all(
    runner: &dyn CommandRunner,
    commands: &[String],
    working_dir: &Path,
    buffer: &OutputBuffer,
) -> Vec<BatchError> {
    let mut errors = Vec::new();
    for command in commands {
        if let Err(err) = run_one(runner, command, working_dir).await {
            buffer.append(Sequence::Stderr, err.to_string());
            errors.push(err);
            break;
        }
    }
    errors
}

async fn run_one(
    runner: &dyn CommandRunner,
    command: &str,
    working_dir: &Path,
) -> Result<(), BatchError> {
    let words = shell_words::split(command).map_err(|source| BatchError::Parse {
        command: command.to_string(),
        source,
    })?;
    let Some((program, args)) = words.split_first() else {
        return Err(BatchError::Empty);
    };

    debug!("running {command:?} in {}", working_dir.display());
    let spec = CommandSpec::new(program).args(args).current_dir(working_dir);
    let output = runner.run(spec).await.map_err(|source| BatchError::Run {
        command: command.to_string(),
        source,
    })?;

    if output.success() {
        Ok(())
    } else {
        Err(BatchError::Exit {
            command: command.to_string(),
            code: output.exit_code.unwrap_or(-1),
        })
    }
}
