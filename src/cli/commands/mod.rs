pub mod breaks;
pub mod config;
pub mod correction;
pub mod init;
pub mod log;
pub mod session;
pub mod stats;

use serde::Serialize;
use std::sync::Arc;

use crate::cli::parser::Cli;
use crate::config::{Config, StoreBackend};
use crate::core::{CorrectionWorkflow, LifecycleEngine, SystemClock};
use crate::errors::{AppError, AppResult};
use crate::models::{CorrectionId, SessionId, UserId};
use crate::store::{Store, open_store};

/// Everything a store-backed command needs.
pub struct AppContext {
    pub cfg: Config,
    pub store: Arc<dyn Store>,
    pub engine: Arc<LifecycleEngine>,
    pub workflow: CorrectionWorkflow,
    pub user: UserId,
    pub json: bool,
}

impl AppContext {
    pub fn open(cli: &Cli, cfg: &Config) -> AppResult<Self> {
        let mut cfg = cfg.clone();
        if cli.memory {
            cfg.store = StoreBackend::Memory;
        }

        let user = cli
            .user
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(UserId::from)
            .ok_or_else(|| AppError::Config("no acting user: pass --user or set $USER".into()))?;

        let store = open_store(&cfg)?;
        let engine = Arc::new(LifecycleEngine::from_config(
            Arc::clone(&store),
            Arc::new(SystemClock::new()),
            &cfg,
        ));
        let workflow =
            CorrectionWorkflow::new(Arc::clone(&engine)).allow_self_review(cfg.allow_self_review);

        tracing::debug!(backend = store.backend(), user = %user, "context ready");
        Ok(Self {
            cfg,
            store,
            engine,
            workflow,
            user,
            json: cli.json,
        })
    }
}

pub(crate) fn print_json<T: Serialize>(value: &T) -> AppResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub(crate) fn parse_session_id(raw: &str) -> AppResult<SessionId> {
    raw.trim()
        .parse()
        .map_err(|_| AppError::InvalidId(raw.to_string()))
}

pub(crate) fn parse_correction_id(raw: &str) -> AppResult<CorrectionId> {
    raw.trim()
        .parse()
        .map_err(|_| AppError::InvalidId(raw.to_string()))
}
