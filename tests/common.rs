#![allow(dead_code)]
use assert_cmd::{Command, cargo_bin_cmd};
use chrono::{DateTime, TimeZone, Utc};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use punchclock::core::{CorrectionWorkflow, EngineSettings, LifecycleEngine, ManualClock};
use punchclock::models::UserId;
use punchclock::store::{MemoryStore, SqliteStore, Store};

pub fn pc() -> Command {
    cargo_bin_cmd!("punchclock")
}

/// Fresh database path inside its own temp dir; keep the `TempDir` alive
/// for as long as the path is used.
pub fn setup_test_db() -> (TempDir, String) {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("punchclock.sqlite");
    (dir, path.to_string_lossy().to_string())
}

/// `pc --db <db> --test --user <user> <args…>`
pub fn pc_as(db: &str, user: &str, args: &[&str]) -> Command {
    let mut cmd = pc();
    cmd.args(["--db", db, "--test", "--user", user]).args(args);
    cmd
}

/// 2026-03-02 (a Monday) at `h:m:s` UTC.
pub fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, h, m, s).unwrap()
}

pub fn user(name: &str) -> UserId {
    UserId::from(name)
}

pub struct Harness {
    pub engine: Arc<LifecycleEngine>,
    pub clock: Arc<ManualClock>,
    pub store: Arc<dyn Store>,
}

impl Harness {
    pub fn new(store: Arc<dyn Store>, start: DateTime<Utc>) -> Self {
        Self::with_settings(store, start, EngineSettings::default())
    }

    pub fn with_settings(
        store: Arc<dyn Store>,
        start: DateTime<Utc>,
        settings: EngineSettings,
    ) -> Self {
        let clock = Arc::new(ManualClock::new(start));
        let engine = Arc::new(LifecycleEngine::new(
            Arc::clone(&store),
            clock.clone(),
            settings,
        ));
        Self {
            engine,
            clock,
            store,
        }
    }

    pub fn memory(start: DateTime<Utc>) -> Self {
        Self::new(Arc::new(MemoryStore::new()), start)
    }

    pub fn sqlite(start: DateTime<Utc>) -> Self {
        Self::new(
            Arc::new(SqliteStore::open_in_memory().expect("sqlite store")),
            start,
        )
    }

    pub fn workflow(&self) -> CorrectionWorkflow {
        CorrectionWorkflow::new(Arc::clone(&self.engine))
    }

    pub fn set(&self, t: DateTime<Utc>) {
        self.clock.set(t);
    }
}

/// Both store implementations, for tests that must hold for each.
pub fn harnesses(start: DateTime<Utc>) -> Vec<(&'static str, Harness)> {
    vec![
        ("memory", Harness::memory(start)),
        ("sqlite", Harness::sqlite(start)),
    ]
}

pub fn short_timeout() -> EngineSettings {
    EngineSettings {
        store_timeout: Duration::from_millis(50),
        conflict_retries: 3,
    }
}
