//! Service supervisor (v1)
//!
//! ```text
//!   -c file.json / -c stdin / -C conf.d
//!        │
//!        ▼
//!   ┌──────────────┐    ┌──────────────┐    ┌──────────────────────────┐
//!   │ config       │───▶│ config       │───▶│ lifecycle::Supervisor    │
//!   │ loader       │    │ merge        │    │  create → start → wait   │
//!   └──────────────┘    └──────────────┘    │  SIGHUP   → check → swap  │
//!                                           │  SIGTERM  → close → exit  │
//!        SIGINT/SIGTERM/SIGHUP ────────────▶│  watchdog around close    │
//!        POST /reload, file changes ───────▶└────────────┬─────────────┘
//!                                                        ▼
//!                                               service::StatusService
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use service_supervisor::config::error::error_chain;
use service_supervisor::config::{read_config_and_merge, ConfigSources, ConfigWatcher};
use service_supervisor::lifecycle::{BoxError, OsSignals, Supervisor};
use service_supervisor::observability::{init_logging, LoggingConfig};
use service_supervisor::service::StatusService;

/// Used when neither `-c` nor `-C` is given.
const DEFAULT_CONFIG_PATH: &str = "config.json";

#[derive(Parser)]
#[command(name = "service-supervisor", version)]
#[command(about = "Run a service with signal driven reload and shutdown", long_about = None)]
struct Cli {
    /// Configuration file path, repeatable; "stdin" reads standard input
    #[arg(short = 'c', long = "config", global = true)]
    config: Vec<String>,

    /// Configuration directory path, repeatable
    #[arg(short = 'C', long = "config-directory", global = true)]
    config_directory: Vec<PathBuf>,

    /// Working directory
    #[arg(short = 'D', long = "directory", global = true)]
    directory: Option<PathBuf>,

    /// Disable color output
    #[arg(long, global = true)]
    disable_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run service
    Run {
        /// Reload when a configuration file changes
        #[arg(long)]
        watch: bool,
    },
    /// Check configuration
    Check,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let logging = LoggingConfig {
        disable_color: cli.disable_color,
        filter: None,
    };
    if let Err(e) = init_logging(&logging) {
        eprintln!("failed to initialise logging: {e}");
    }

    match execute(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %error_chain(&*err), "Fatal");
            ExitCode::FAILURE
        }
    }
}

async fn execute(cli: Cli) -> Result<(), BoxError> {
    if let Some(directory) = &cli.directory {
        std::env::set_current_dir(directory)?;
        tracing::debug!(directory = %directory.display(), "Changed working directory");
    }

    let mut sources = ConfigSources::new(cli.config, cli.config_directory);
    if sources.is_empty() {
        sources.paths.push(DEFAULT_CONFIG_PATH.to_string());
    }

    match cli.command {
        Commands::Check => {
            read_config_and_merge(&sources)?;
            tracing::info!("Configuration OK");
            Ok(())
        }
        Commands::Run { watch } => {
            let signals = OsSignals::subscribe()?;
            let mut supervisor = Supervisor::new(
                sources.clone(),
                CancellationToken::new(),
                StatusService::create,
                signals,
            )
            .disable_color(cli.disable_color);

            // keep the watcher alive for as long as the supervisor runs
            let _watcher = if watch {
                let (watcher, reload_rx) = ConfigWatcher::new(&sources);
                supervisor = supervisor.reload_trigger(reload_rx);
                Some(watcher.run()?)
            } else {
                None
            };

            supervisor.run().await?;
            tracing::info!("Shutdown complete");
            Ok(())
        }
    }
}
