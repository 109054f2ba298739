use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("supervision error: {0}")]
    Supervise(#[from] crate::supervisor::SuperviseError),

    #[error("tool error: {0}")]
    Tool(#[from] crate::tools::ToolError),

    #[error("command error: {0}")]
    Command(#[from] crate::batch::BatchError),

    #[error("no projects configured")]
    NoProjects,

    #[error("no project could be started")]
    NothingStarted,
}

pub type Result<T> = std::result::Result<T, Error>;
