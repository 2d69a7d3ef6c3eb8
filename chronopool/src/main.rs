use clap::Parser;
use tracing::{error, info};

use chronopool::cli::{Cli, Commands};
use chronopool::config;
use chronopool::state::Runtime;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .json()
        .init();

    match cli.command.clone().unwrap_or(Commands::Run) {
        Commands::Run => {
            if let Err(err) = run(&cli).await {
                error!("{}", err);
                std::process::exit(1);
            }
        }
        Commands::Configcheck => match chronopool::cli::config_check(&cli.config, &cli.users) {
            Ok(()) => info!("configuration is valid"),
            Err(err) => {
                error!("{}", err);
                std::process::exit(1);
            }
        },
    }
}

async fn run(cli: &Cli) -> Result<(), chronopool::Error> {
    let loaded = config::load(&cli.config, &cli.users)?;
    info!(
        "starting with {} pool(s)",
        loaded.config.max_pool_id().map(|m| m + 1).unwrap_or(1)
    );

    let runtime = Runtime::new(loaded)?;
    runtime.launch();

    tokio::signal::ctrl_c().await.ok();
    info!("shutting down");
    runtime.shutdown();

    Ok(())
}
