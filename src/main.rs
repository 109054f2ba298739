use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error};

use liverun::batch;
use liverun::buffer::OutputBuffer;
use liverun::config::Settings;
use liverun::notify::ChangeNotifier;
use liverun::runner::TokioCommandRunner;
use liverun::tools::Toolchain;
use liverun::watch::WatchSession;

/// Supervise project binaries and toolchain commands
#[derive(Parser)]
#[command(name = "liverun")]
#[command(about = "Run and supervise project binaries with captured output", long_about = None)]
struct Cli {
    /// Enable verbose output (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to configuration file (default: liverun.toml)
    #[arg(short = 'c', long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Launch and supervise all configured projects (default command)
    Run,
    /// Build a project directory
    Build {
        #[arg(default_value = ".")]
        dir: PathBuf,
    },
    /// Install a project directory into the configured bin directory
    Install {
        #[arg(default_value = ".")]
        dir: PathBuf,
    },
    /// Run a project's tests
    Test {
        #[arg(default_value = ".")]
        dir: PathBuf,
    },
    /// Run a project's code generators
    Generate {
        #[arg(default_value = ".")]
        dir: PathBuf,
    },
    /// Format a source file
    Fmt {
        file: PathBuf,
        /// Directory to run the formatter in
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,
    },
    /// Run shell commands in order, stopping at the first failure
    Exec {
        /// Commands, each a single shell-style string
        #[arg(required = true)]
        commands: Vec<String>,
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_target(cli.verbose >= 2)
        .init();

    debug!("liverun started with verbosity level: {}", cli.verbose);

    if let Err(e) = run(cli).await {
        error!("Fatal error: {}", e);
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let settings = Settings::load(cli.config.as_deref())?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            WatchSession::new(settings).run().await?;
        }
        Commands::Exec { commands, dir } => {
            let buffer = OutputBuffer::new();
            let errors = batch::run_all(&TokioCommandRunner, &commands, &dir, &buffer).await;
            if let Some(err) = errors.into_iter().next() {
                anyhow::bail!(err);
            }
        }
        command => {
            let toolchain = Toolchain::new(
                settings.toolchain,
                Arc::new(OutputBuffer::new()),
                ChangeNotifier::disconnected(),
                Arc::new(TokioCommandRunner),
            );
            let outcome = match command {
                Commands::Build { dir } => toolchain.build(&dir).await,
                Commands::Install { dir } => toolchain.install(&dir).await,
                Commands::Test { dir } => toolchain.test(&dir).await,
                Commands::Generate { dir } => toolchain.generate(&dir).await,
                Commands::Fmt { file, dir } => toolchain.format(&file, &dir).await,
                Commands::Run | Commands::Exec { .. } => unreachable!(),
            };
            if let Err(err) = outcome {
                let diagnostics = err.diagnostics();
                if !diagnostics.is_empty() {
                    eprint!("{diagnostics}");
                }
                anyhow::bail!(err);
            }
        }
    }

    Ok(())
}
