//! TOML configuration: failure policy, toolchain, and project declarations.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = "liverun.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// How kill and output-sink failures escalate: `report` surfaces them as
/// ordinary errors, `abort` reproduces legacy fail-fast behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    #[default]
    Report,
    Abort,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub on_failure: FailurePolicy,
    pub toolchain: ToolchainConfig,
    #[serde(rename = "project")]
    pub projects: Vec<ProjectConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolchainConfig {
    /// Build tool driving the build/install/test/generate subcommands.
    pub program: String,
    pub formatter: String,
    pub formatter_args: Vec<String>,
    /// Install target directory; supervised binaries resolve under it.
    pub bin_dir: PathBuf,
    /// Environment variable the tool reads the install target from.
    pub bin_dir_env: String,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            program: "go".to_string(),
            formatter: "gofmt".to_string(),
            formatter_args: vec!["-s".to_string(), "-w".to_string(), "-e".to_string()],
            bin_dir: PathBuf::from("bin"),
            bin_dir_env: "GOBIN".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    pub name: String,
    /// Project directory; doubles as the run's working directory.
    pub path: PathBuf,
    /// Invocation parameters passed to the project binary.
    #[serde(default)]
    pub params: Vec<String>,
    /// Shell-style commands run before the project is launched.
    #[serde(default)]
    pub setup: Vec<String>,
    #[serde(default)]
    pub streams: StreamsConfig,
    /// Defaults to `<path>/output.log` when file echo is enabled.
    #[serde(default)]
    pub output_file: Option<PathBuf>,
}

/// Where captured lines get echoed, besides the shared buffer.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StreamsConfig {
    pub console: bool,
    pub file: bool,
}

impl Settings {
    /// Loads settings from `path`, or from `liverun.toml` in the working
    /// directory. With no explicit path and no default file, returns the
    /// built-in defaults.
    pub fn load(path: Option<&Path>) -> Result<Settings, ConfigError> {
        match path {
            Some(path) => Self::parse_file(path),
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.exists() {
                    Self::parse_file(default)
                } else {
                    Ok(Settings::default())
                }
            }
        }
    }

    fn parse_file(path: &Path) -> Result<Settings, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}
