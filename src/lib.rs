//! punchclock library root.
//! Exposes the lifecycle engine, the correction workflow, the presentation
//! timer, both stores, the CLI parser and the high-level `run()` function.

pub mod cli;
pub mod config;
pub mod core;
pub mod errors;
pub mod models;
pub mod store;
pub mod ui;
pub mod utils;

use clap::Parser;
use cli::commands::{self, AppContext};
use cli::parser::{Cli, Commands};
use config::Config;
use errors::AppResult;
use tracing_subscriber::EnvFilter;

/// Environment variable that overrides the configured log level.
pub const LOG_ENV: &str = "PUNCHCLOCK_LOG";

/// Diagnostics go to stderr so stdout stays parseable.
pub fn init_logging(default_level: &str) {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Central command dispatcher
pub async fn dispatch(cli: &Cli, cfg: &Config) -> AppResult<()> {
    match &cli.command {
        Commands::Init => return commands::init::handle(cli),
        Commands::Config { .. } => return commands::config::handle(&cli.command, cfg),
        _ => {}
    }

    let ctx = AppContext::open(cli, cfg)?;
    match &cli.command {
        Commands::In => commands::session::clock_in(&ctx).await,
        Commands::Out => commands::session::clock_out(&ctx).await,
        Commands::Break { action } => commands::breaks::handle(&ctx, action).await,
        Commands::Status { watch } => commands::session::status(&ctx, *watch).await,
        Commands::History { limit } => commands::session::history(&ctx, *limit).await,
        Commands::Breaks { session } => commands::breaks::list(&ctx, session).await,
        Commands::Correction { action } => commands::correction::handle(&ctx, action).await,
        Commands::Stats { period, date } => {
            commands::stats::handle(&ctx, *period, date.as_deref()).await
        }
        Commands::Autoclose { hours } => commands::session::autoclose(&ctx, *hours).await,
        Commands::Log { print, limit } => commands::log::handle(&ctx, *print, *limit).await,
        Commands::Init | Commands::Config { .. } => Ok(()),
    }
}

/// Entry point used by main.rs
pub async fn run() -> AppResult<()> {
    let cli = Cli::parse();

    let mut cfg = Config::load()?;
    if let Some(custom_db) = &cli.db {
        cfg.database = custom_db.clone();
    }

    init_logging(&cfg.log_level);
    tracing::debug!(database = %cfg.database, store = ?cfg.store, "configuration loaded");

    dispatch(&cli, &cfg).await
}
