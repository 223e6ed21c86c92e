use anyhow::Result;
use clap::Parser;

use sharedlm_local::cli::{self, Cli, Commands};
use sharedlm_local::Config;

fn main() -> Result<()> {
    let cli = Cli::parse();

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main(cli))
}

async fn async_main(cli: Cli) -> Result<()> {
    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .init();

    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Ask(args) => cli::ask::run(args, &config).await,
        Commands::Probe(args) => cli::probe::run(args, &config).await,
        Commands::Memory(args) => cli::memory::run(args, &config),
        Commands::Sync(args) => cli::sync::run(args, &config),
        Commands::Storage(args) => cli::storage::run(args, &config),
    }
}
