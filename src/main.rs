//! Elyx - marketplace client core
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use elyx::cli::{Cli, Commands};
use elyx::config::ConfigManager;
use elyx::error::ElyxResult;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> ElyxResult<()> {
    let cli = Cli::parse();

    let config_manager = match cli.config {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };
    let config = config_manager.load().await?;

    // 0 = warn, 1 = info, 2+ = debug; general.verbose counts as -v
    let level = match cli.verbose.max(u8::from(config.general.verbose)) {
        0 => "elyx=warn",
        1 => "elyx=info",
        _ => "elyx=debug",
    };
    init_logging(EnvFilter::new(level), &config.general.log_format);
    debug!("Loaded config from {}", config_manager.path().display());

    match cli.command {
        Commands::Translate(args) => elyx::cli::commands::translate(args, &config).await,
        Commands::Dictionary(args) => elyx::cli::commands::dictionary(args, &config).await,
        Commands::Store(args) => elyx::cli::commands::store(args, &config).await,
        Commands::Config(args) => {
            elyx::cli::commands::config(args, &config, &config_manager).await
        }
    }
}

fn init_logging(filter: EnvFilter, format: &str) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    if format == "json" {
        builder.json().init();
    } else {
        builder.without_time().init();
    }
}
