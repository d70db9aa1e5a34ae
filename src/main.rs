mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use deskboard::AppConfig;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let args = cli::Cli::parse();
    let config = AppConfig::load()?;
    init_logging(&config);

    let session = commands::Session::new(config, args.data_dir)?;
    match args.command {
        cli::Command::Board { action } => commands::board(&session, action),
        cli::Command::Column { action } => commands::column(&session, action),
        cli::Command::Card { action } => commands::card(&session, action),
        cli::Command::Notes { action } => commands::notes(&session, action),
        cli::Command::Canvas { action } => commands::canvas(&session, action),
        cli::Command::Export { path } => commands::export(&session, &path),
        cli::Command::Import { path } => commands::import(&session, &path),
    }
}

/// `RUST_LOG` wins over the config file; logs go to stderr so command output
/// stays clean.
fn init_logging(config: &AppConfig) {
    let fallback = config.log_level.as_deref().unwrap_or("warn");
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
