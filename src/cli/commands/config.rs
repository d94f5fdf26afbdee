//! Config command - show or edit configuration

use crate::cli::args::{ConfigAction, ConfigArgs};
use crate::config::{Config, ConfigManager};
use crate::error::{ElyxError, ElyxResult};
use crate::ui::{self, UiContext};
use std::path::PathBuf;

const VALID_KEYS: &[&str] = &[
    "general.verbose",
    "general.log_format",
    "store.base_url",
    "store.api_token",
    "store.mutation_timeout_secs",
    "store.fetch_timeout_secs",
    "i18n.default_language",
    "i18n.language",
    "i18n.endpoint",
    "i18n.api_key",
    "i18n.timeout_secs",
    "i18n.dictionary_path",
];

/// Execute the config command
pub async fn execute(args: ConfigArgs, config: &Config, manager: &ConfigManager) -> ElyxResult<()> {
    match args.action {
        None | Some(ConfigAction::Show) => show_config(config)?,
        Some(ConfigAction::Path) => println!("{}", manager.path().display()),
        Some(ConfigAction::Init { force }) => init_config(manager, force).await?,
        Some(ConfigAction::Set { key, value }) => {
            let mut updated = config.clone();
            set_value(&mut updated, &key, &value)?;
            manager.save(&updated).await?;
            ui::step_ok(&UiContext::detect(), &format!("Set {} = {}", key, value));
        }
    }

    Ok(())
}

fn show_config(config: &Config) -> ElyxResult<()> {
    println!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

async fn init_config(manager: &ConfigManager, force: bool) -> ElyxResult<()> {
    let ctx = UiContext::detect();
    let path = manager.path();

    if path.exists() && !force {
        ui::step_warn_hint(
            &ctx,
            &format!("Config already exists at {}", path.display()),
            "Use --force to overwrite",
        );
        return Ok(());
    }

    manager.save(&Config::default()).await?;
    ui::step_ok(&ctx, &format!("Configuration initialized at {}", path.display()));
    Ok(())
}

/// Apply a dot-separated key to the configuration
fn set_value(config: &mut Config, key: &str, value: &str) -> ElyxResult<()> {
    let parts: Vec<&str> = key.split('.').collect();

    match parts.as_slice() {
        ["general", "verbose"] => config.general.verbose = parse_bool(value)?,
        ["general", "log_format"] => config.general.log_format = parse_log_format(value)?,

        ["store", "base_url"] => config.store.base_url = optional(value),
        ["store", "api_token"] => config.store.api_token = optional(value),
        ["store", "mutation_timeout_secs"] => {
            config.store.mutation_timeout_secs = parse_secs(value)?
        }
        ["store", "fetch_timeout_secs"] => config.store.fetch_timeout_secs = parse_secs(value)?,

        ["i18n", "default_language"] => config.i18n.default_language = value.trim().to_lowercase(),
        ["i18n", "language"] => config.i18n.language = value.trim().to_lowercase(),
        ["i18n", "endpoint"] => config.i18n.endpoint = optional(value),
        ["i18n", "api_key"] => config.i18n.api_key = optional(value),
        ["i18n", "timeout_secs"] => config.i18n.timeout_secs = parse_secs(value)?,
        ["i18n", "dictionary_path"] => config.i18n.dictionary_path = optional(value).map(PathBuf::from),

        _ => {
            return Err(ElyxError::User(format!(
                "Unknown config key: {}. Valid keys: {}",
                key,
                VALID_KEYS.join(", ")
            )))
        }
    }

    Ok(())
}

/// Empty string clears an optional value
fn optional(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

fn parse_bool(value: &str) -> ElyxResult<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ElyxError::User(format!(
            "Invalid boolean value: {}. Use true/false",
            value
        ))),
    }
}

fn parse_secs(value: &str) -> ElyxResult<u64> {
    match value.parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(secs),
        _ => Err(ElyxError::User(format!(
            "Invalid timeout: {}. Use a positive number of seconds",
            value
        ))),
    }
}

fn parse_log_format(value: &str) -> ElyxResult<String> {
    match value {
        "text" | "json" => Ok(value.to_string()),
        _ => Err(ElyxError::User(format!(
            "Invalid log format: {}. Use text or json",
            value
        ))),
    }
}
