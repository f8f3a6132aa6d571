mod cli;
mod commands;
mod config;
mod launch;
mod logging;

use clap::Parser;
use scout_logging::{scout_debug, scout_info};

use cli::{Cli, Command};

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::initialize(&cli.logging);

    let config = config::load(&cli.config);
    scout_debug!("using store directory {:?}", config.store_dir);

    match cli.command {
        Command::Sites => commands::sites(),
        Command::Extract { script, html, url } => commands::extract(script, &html, url.as_deref()),
        Command::Toggle { state } => commands::toggle(&config, state),
        Command::License { action } => commands::license(&config, action).await,
        Command::Trial { action } => commands::trial(&config, action).await,
        Command::Status => commands::status(&config).await,
        Command::Launch(args) => {
            scout_info!("launch requested");
            launch::run(&config, args).await
        }
    }
}
