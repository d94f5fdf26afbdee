//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// Elyx - marketplace client core
///
/// Translates UI text through the memoized dictionary/remote pipeline and
/// reads or edits marketplace records through the optimistic cache.
#[derive(Parser, Debug)]
#[command(name = "elyx")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "ELYX_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Translate text into the active or given language
    Translate(TranslateArgs),

    /// List built-in and configured dictionary phrases
    Dictionary(DictionaryArgs),

    /// Read or edit records in the remote store
    Store(StoreArgs),

    /// Show or edit configuration
    Config(ConfigArgs),
}

/// Arguments for the translate command
#[derive(Parser, Debug)]
pub struct TranslateArgs {
    /// Text to translate (one line of output per argument)
    #[arg(required = true)]
    pub text: Vec<String>,

    /// Target language (defaults to i18n.language)
    #[arg(short, long)]
    pub lang: Option<String>,

    /// Only consult the local dictionary
    #[arg(long)]
    pub offline: bool,
}

/// Arguments for the dictionary command
#[derive(Parser, Debug)]
pub struct DictionaryArgs {
    /// Only show phrases for this language
    #[arg(short, long)]
    pub lang: Option<String>,
}

/// Arguments for the store command
#[derive(Parser, Debug)]
pub struct StoreArgs {
    /// Subcommand for store
    #[command(subcommand)]
    pub action: StoreAction,
}

/// Store subcommands
#[derive(Subcommand, Debug)]
pub enum StoreAction {
    /// Fetch one record
    Get {
        /// Collection name (e.g., projects)
        collection: String,
        /// Record id
        id: String,
    },

    /// Fetch a page of records
    List {
        /// Collection name
        collection: String,

        /// Page number (1-based)
        #[arg(long, default_value_t = 1)]
        page: u32,

        /// Page size
        #[arg(long, default_value_t = 20)]
        limit: u32,

        /// Exact-match filter (FIELD=VALUE), repeatable
        #[arg(short, long, value_parser = parse_key_value)]
        filter: Vec<(String, String)>,
    },

    /// Patch fields of a record
    Patch {
        /// Collection name
        collection: String,
        /// Record id
        id: String,
        /// Fields to set (FIELD=VALUE, VALUE parsed as JSON when possible)
        #[arg(required = true, value_parser = parse_key_value)]
        fields: Vec<(String, String)>,
    },

    /// Delete a record
    Delete {
        /// Collection name
        collection: String,
        /// Record id
        id: String,
    },
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., i18n.language)
        key: String,
        /// Value to set
        value: String,
    },
}

/// Parse a FIELD=VALUE pair
fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let pos = s
        .find('=')
        .ok_or_else(|| format!("invalid FIELD=VALUE format: no '=' found in '{s}'"))?;
    if pos == 0 {
        return Err(format!("invalid FIELD=VALUE format: empty field in '{s}'"));
    }
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}
