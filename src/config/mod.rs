use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::errors::{AppError, AppResult};

/// Which `Store` implementation backs the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Sqlite,
    Memory,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_database")]
    pub database: String,
    #[serde(default)]
    pub store: StoreBackend,
    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: u64,
    #[serde(default = "default_conflict_retries")]
    pub conflict_retries: u32,
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    #[serde(default = "default_auto_close_after_hours")]
    pub auto_close_after_hours: i64,
    #[serde(default)]
    pub allow_self_review: bool,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_database() -> String {
    Config::database_file().to_string_lossy().to_string()
}
fn default_store_timeout_ms() -> u64 {
    5_000
}
fn default_conflict_retries() -> u32 {
    3
}
fn default_tick_interval_ms() -> u64 {
    1_000
}
fn default_history_limit() -> usize {
    30
}
fn default_auto_close_after_hours() -> i64 {
    16
}
fn default_log_level() -> String {
    "warn".to_string()
}

/// Upper bound of the stale-session threshold, one leap year.
pub const MAX_AUTO_CLOSE_HOURS: i64 = 24 * 366;

/// Every key a complete configuration file carries.
const FIELDS: [&str; 9] = [
    "database",
    "store",
    "store_timeout_ms",
    "conflict_retries",
    "tick_interval_ms",
    "history_limit",
    "auto_close_after_hours",
    "allow_self_review",
    "log_level",
];

impl Default for Config {
    fn default() -> Self {
        Self {
            database: default_database(),
            store: StoreBackend::default(),
            store_timeout_ms: default_store_timeout_ms(),
            conflict_retries: default_conflict_retries(),
            tick_interval_ms: default_tick_interval_ms(),
            history_limit: default_history_limit(),
            auto_close_after_hours: default_auto_close_after_hours(),
            allow_self_review: false,
            log_level: default_log_level(),
        }
    }
}

impl Config {
    /// Return the standard configuration directory depending on the platform
    pub fn config_dir() -> PathBuf {
        if cfg!(target_os = "windows") {
            let appdata = env::var("APPDATA").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(appdata).join("punchclock")
        } else {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".punchclock")
        }
    }

    pub fn config_file() -> PathBuf {
        Self::config_dir().join("punchclock.conf")
    }

    pub fn database_file() -> PathBuf {
        Self::config_dir().join("punchclock.sqlite")
    }

    /// Load configuration from file, or defaults if there is none.
    pub fn load() -> AppResult<Self> {
        Self::load_from(&Self::config_file())
    }

    pub fn load_from(path: &Path) -> AppResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        let cfg: Config = serde_yaml::from_str(&content)?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> AppResult<()> {
        if self.store_timeout_ms == 0 {
            return Err(AppError::Config("store_timeout_ms must be positive".into()));
        }
        if self.tick_interval_ms == 0 {
            return Err(AppError::Config("tick_interval_ms must be positive".into()));
        }
        Self::auto_close_window(self.auto_close_after_hours)?;
        Ok(())
    }

    /// Keys absent from the YAML document at `path`.
    pub fn missing_fields(path: &Path) -> AppResult<Vec<&'static str>> {
        let content = fs::read_to_string(path)?;
        let doc: serde_yaml::Value = serde_yaml::from_str(&content)?;
        let map = doc.as_mapping();

        Ok(FIELDS
            .iter()
            .copied()
            .filter(|key| map.is_none_or(|m| !m.contains_key(*key)))
            .collect())
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn auto_close_after(&self) -> AppResult<chrono::Duration> {
        Self::auto_close_window(self.auto_close_after_hours)
    }

    /// Stale-session threshold of `hours`, within `1..=MAX_AUTO_CLOSE_HOURS`.
    pub fn auto_close_window(hours: i64) -> AppResult<chrono::Duration> {
        if !(1..=MAX_AUTO_CLOSE_HOURS).contains(&hours) {
            return Err(AppError::Config(format!(
                "auto-close threshold must be between 1 and {} hours, got {}",
                MAX_AUTO_CLOSE_HOURS, hours
            )));
        }
        chrono::Duration::try_hours(hours)
            .ok_or_else(|| AppError::Config(format!("{} hours is out of range", hours)))
    }

    /// Create the config directory and file. The database path is
    /// `custom_db` when given (relative names land in the config dir).
    ///
    /// With `is_test` nothing is written; the resolved config is returned.
    pub fn init_all(custom_db: Option<&str>, is_test: bool) -> AppResult<Self> {
        let dir = Self::config_dir();

        let db_path = match custom_db {
            Some(name) => {
                let p = Path::new(name);
                if p.is_absolute() {
                    p.to_path_buf()
                } else {
                    dir.join(p)
                }
            }
            None => Self::database_file(),
        };

        let config = Config {
            database: db_path.to_string_lossy().to_string(),
            ..Config::default()
        };

        if !is_test {
            fs::create_dir_all(&dir)?;
            let yaml = serde_yaml::to_string(&config)?;
            let mut file = fs::File::create(Self::config_file())?;
            file.write_all(yaml.as_bytes())?;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("punchclock.conf");
        fs::write(&path, "store: memory\nconflict_retries: 5\n").unwrap();

        let cfg = Config::load_from(&path).unwrap();
        assert_eq!(cfg.store, StoreBackend::Memory);
        assert_eq!(cfg.conflict_retries, 5);
        assert_eq!(cfg.history_limit, 30);
        assert!(!cfg.allow_self_review);

        let missing = Config::missing_fields(&path).unwrap();
        assert!(missing.contains(&"database"));
        assert!(!missing.contains(&"store"));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("punchclock.conf");
        fs::write(&path, "store_timeout_ms: 0\n").unwrap();
        assert!(matches!(Config::load_from(&path), Err(AppError::Config(_))));
    }

    #[test]
    fn auto_close_threshold_is_bounded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("punchclock.conf");
        fs::write(&path, "auto_close_after_hours: 3000000000\n").unwrap();
        assert!(matches!(Config::load_from(&path), Err(AppError::Config(_))));

        assert!(Config::auto_close_window(0).is_err());
        assert!(Config::auto_close_window(MAX_AUTO_CLOSE_HOURS + 1).is_err());
        assert_eq!(
            Config::auto_close_window(MAX_AUTO_CLOSE_HOURS).unwrap(),
            chrono::Duration::days(366)
        );
    }

    #[test]
    fn missing_file_yields_defaults() {
        let cfg = Config::load_from(Path::new("/nonexistent/punchclock.conf")).unwrap();
        assert_eq!(cfg.tick_interval(), Duration::from_secs(1));
    }
}
