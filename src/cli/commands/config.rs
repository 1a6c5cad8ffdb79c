use crate::cli::parser::Commands;
use crate::config::Config;
use crate::errors::AppResult;
use crate::ui::messages::{header, success, warning};

/// Handle the `config` subcommand
pub fn handle(cmd: &Commands, cfg: &Config) -> AppResult<()> {
    if let Commands::Config {
        print_config,
        check,
    } = cmd
    {
        if *print_config {
            header("Current configuration");
            println!("{}", serde_yaml::to_string(cfg)?);
        }

        if *check {
            let path = Config::config_file();
            if !path.exists() {
                warning(format!(
                    "No configuration file at {}; defaults are in use",
                    path.display()
                ));
                return Ok(());
            }

            let missing = Config::missing_fields(&path)?;
            if missing.is_empty() {
                success("Configuration file is complete");
            } else {
                warning(format!("Missing fields (defaults apply): {}", missing.join(", ")));
            }
        }
    }

    Ok(())
}
