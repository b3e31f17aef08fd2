//! Tonio CLI - drive the Tonio captions client from a terminal.

mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use output::OutputFormat;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tonio_client::{ClientError, ClientOptions, TonioClient};
use tonio_core::{init_logging, Config, Paths};
use tonio_identity::FirebaseIdentityProvider;
use tracing::{debug, warn};

/// Tonio CLI - report performance, interval and caption events.
#[derive(Parser)]
#[command(name = "tonio")]
#[command(about = "Tonio captions client")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text or json)
    #[arg(short, long, default_value = "json", global = true)]
    format: OutputFormat,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Base directory for config and logs (default: ~/.tonio)
    #[arg(long, env = "TONIO_HOME", global = true)]
    base_dir: Option<PathBuf>,

    /// Also write logs to stderr
    #[arg(long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in with the configured account
    SignIn,

    /// Sign out
    SignOut,

    /// Report the actual start of a performance
    StartPerformance {
        /// Performance ID
        performance_id: String,
    },

    /// Report the actual end of a performance
    EndPerformance {
        /// Performance ID
        performance_id: String,
    },

    /// Start an interval in a performance
    StartInterval {
        /// Performance ID
        performance_id: String,
    },

    /// End the current interval of a performance
    EndInterval {
        /// Performance ID
        performance_id: String,
    },

    /// Report that a caption is shown
    SendCaption {
        /// Performance ID
        performance_id: String,
        /// Caption ID
        caption_id: String,
    },

    /// Stream auth state changes until Ctrl+C
    WatchAuth,
}

impl Commands {
    fn needs_sign_in(&self) -> bool {
        !matches!(self, Commands::SignOut | Commands::WatchAuth)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let format = cli.format;

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            match error.downcast_ref::<ClientError>() {
                Some(client_error) => output::print_client_error(client_error, format),
                None => output::print_error(&format!("{:#}", error), format),
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let paths = match &cli.base_dir {
        Some(dir) => Paths::with_base_dir(dir.clone()),
        None => Paths::new()?,
    };

    let mut config = Config::load(&paths)?;
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }

    init_logging("tonio-cli", &config, &paths, cli.verbose)?;
    debug!(base_dir = %paths.base_dir().display(), "Configuration loaded");

    let client = TonioClient::new(
        ClientOptions::from_config(&config),
        Arc::new(FirebaseIdentityProvider::new()),
    );
    client.initialize().await?;

    let result = execute(&client, &config, &cli.command, cli.format).await;

    if let Err(e) = client.destroy().await {
        warn!("Failed to destroy Tonio client: {}", e);
    }

    result
}

async fn execute(
    client: &TonioClient,
    config: &Config,
    command: &Commands,
    format: OutputFormat,
) -> Result<()> {
    if command.needs_sign_in() {
        commands::sign_in(client, config).await?;
    }

    match command {
        Commands::SignIn => commands::show_sign_in(client, format).await,
        Commands::SignOut => commands::sign_out(client, format).await,
        Commands::StartPerformance { performance_id } => {
            commands::start_performance(client, performance_id, format).await
        }
        Commands::EndPerformance { performance_id } => {
            commands::end_performance(client, performance_id, format).await
        }
        Commands::StartInterval { performance_id } => {
            commands::start_interval(client, performance_id, format).await
        }
        Commands::EndInterval { performance_id } => {
            commands::end_interval(client, performance_id, format).await
        }
        Commands::SendCaption {
            performance_id,
            caption_id,
        } => commands::send_caption(client, performance_id, caption_id, format).await,
        Commands::WatchAuth => commands::watch_auth(client, config).await,
    }
}
