//! Configuration schema for Elyx
//!
//! Configuration is stored at `~/.config/elyx/config.toml`

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Remote data store settings
    pub store: StoreConfig,

    /// Translation settings
    pub i18n: I18nConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Enable verbose logging
    pub verbose: bool,

    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            log_format: "text".to_string(),
        }
    }
}

/// Remote data store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// API root, e.g. `https://giftora.example/api`
    pub base_url: Option<String>,

    /// Bearer token sent with every request
    pub api_token: Option<String>,

    /// Bound on a remote write, after which it counts as failed
    pub mutation_timeout_secs: u64,

    /// Bound on a remote read
    pub fetch_timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_token: None,
            mutation_timeout_secs: 15,
            fetch_timeout_secs: 10,
        }
    }
}

/// Translation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct I18nConfig {
    /// Source language of UI text
    pub default_language: String,

    /// Active language
    pub language: String,

    /// Remote translation endpoint (optional)
    pub endpoint: Option<String>,

    /// Bearer token for the translation endpoint
    pub api_key: Option<String>,

    /// Bound on a remote translation call
    pub timeout_secs: u64,

    /// Extra phrase dictionary merged over the built-in one
    pub dictionary_path: Option<PathBuf>,
}

impl Default for I18nConfig {
    fn default() -> Self {
        Self {
            default_language: "en".to_string(),
            language: "en".to_string(),
            endpoint: None,
            api_key: None,
            timeout_secs: 5,
            dictionary_path: None,
        }
    }
}
