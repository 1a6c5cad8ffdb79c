use crate::cli::parser::Cli;
use crate::config::Config;
use crate::errors::AppResult;
use crate::store::SqliteStore;
use crate::ui::messages::{info, success};

/// Handle the `init` command
///
/// Creates the config directory and file (skipped with `--test`), then
/// opens the SQLite database, which applies every pending migration.
pub fn handle(cli: &Cli) -> AppResult<()> {
    let cfg = Config::init_all(cli.db.as_deref(), cli.test)?;

    info("Initializing punchclock…");
    if !cli.test {
        info(format!("Config file : {}", Config::config_file().display()));
    }
    info(format!("Database    : {}", cfg.database));

    let store = SqliteStore::open(&cfg.database)?;

    success(format!("Database initialized at {}", store.path()));
    Ok(())
}
