//! Kashi monitor command-line application library

pub mod cli;
pub mod commands;

use anyhow::Context;
use kashi_core::AppConfig;

use cli::{Cli, Command};

/// Install the global subscriber; logs go to stderr so stdout stays parseable
pub fn init_tracing() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("kashi_monitor=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .init();
    Ok(())
}

/// Build the configuration for the chosen network from the environment
pub fn load_config(cli: &Cli) -> AppConfig {
    let mut config = AppConfig::from_lookup(cli.network, |name| std::env::var(name).ok());
    if let Some(dir) = &cli.cache_dir {
        config.cache_dir = dir.clone();
    }
    config
}

/// Dispatch one sub-command
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(&cli);
    tracing::info!(network = %config.network.name, "Starting Kashi monitor");

    let network = cli.network;
    let result = match cli.command {
        Command::Optimize { snapshot } => commands::optimize::run(&snapshot),
        Command::Borrowers {
            snapshot,
            min_coverage,
        } => commands::borrowers::run(&snapshot, min_coverage),
        Command::Logs {
            address,
            topic0,
            address1,
            tx_hash,
            block,
        } => commands::logs::run(&config, &address, topic0, address1, tx_hash.zip(block)).await,
        Command::Pairs => commands::pairs::run(&config).await,
        Command::Networks => {
            commands::networks::run();
            Ok(())
        }
    };
    result.with_context(|| format!("{network} command failed"))
}
