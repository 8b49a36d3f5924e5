//! chatrelay CLI — the main entry point.
//!
//! Commands:
//! - `run`     — Start the bot (default when no command is given)
//! - `status`  — Show the effective configuration

use std::path::PathBuf;

use chatrelay_config::AppConfig;
use clap::{Parser, Subcommand};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Registry, reload};

mod commands;

#[derive(Parser)]
#[command(
    name = "chatrelay",
    about = "chatrelay — Telegram to OpenRouter chat relay",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the configuration file
    #[arg(short, long, global = true, env = "CHATRELAY_CONFIG")]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true, env = "CHATRELAY_LOG_JSON")]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the bot
    Run,

    /// Show the effective configuration
    Status {
        /// Also check that the Telegram and OpenRouter APIs accept the credentials
        #[arg(long)]
        probe: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let log_filter = init_tracing(cli.verbose, cli.log_json);

    let config =
        AppConfig::load(cli.config.as_deref()).map_err(|e| format!("Failed to load config: {e}"))?;
    if config.bot.debug && !cli.verbose && std::env::var_os("RUST_LOG").is_none() {
        raise_to_debug(&log_filter);
    }

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => commands::run::run(config).await?,
        Commands::Status { probe } => commands::status::run(&config, probe).await?,
    }

    Ok(())
}

type LogFilter = reload::Handle<EnvFilter, Registry>;

/// Install the global subscriber. The returned handle lets the loaded config
/// raise the level afterwards.
fn init_tracing(verbose: bool, json: bool) -> LogFilter {
    let filter = if verbose { "debug" } else { "info" };
    let (filter, handle) = reload::Layer::new(
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
    );
    let fmt = tracing_subscriber::fmt::layer().with_target(false);
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry.with(fmt.json()).init();
    } else {
        registry.with(fmt).init();
    }
    handle
}

fn raise_to_debug(filter: &LogFilter) {
    if let Err(e) = filter.reload(EnvFilter::new("debug")) {
        tracing::warn!(error = %e, "Failed to raise log level");
    }
}
