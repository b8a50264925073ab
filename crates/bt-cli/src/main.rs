use std::io;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use bt_cli::commands::{catalog, edit, log, new, rm, start, status, stop, usage, watch};
use bt_cli::{CatalogAction, Cli, Commands, Config};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // try_init: tests may have installed a subscriber already
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    let Some(command) = &cli.command else {
        use clap::CommandFactory;
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    let config = Config::load_from(cli.config.as_deref()).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    let mut stdout = io::stdout().lock();
    match command {
        Commands::Start(args) => start::run(&mut stdout, args, &config).await?,
        Commands::New(args) => new::run(&mut stdout, args, &config).await?,
        Commands::Stop(args) => stop::run(&mut stdout, args, &config).await?,
        Commands::Log(args) => log::run(&mut stdout, args, &config).await?,
        Commands::Edit(args) => edit::run(&mut stdout, args, &config).await?,
        Commands::Rm(args) => rm::run(&mut stdout, args, &config).await?,
        Commands::Status => status::run(&mut stdout, &config).await?,
        Commands::Watch => watch::run(&mut stdout, &config).await?,
        Commands::Usage(args) => usage::run(&mut stdout, args, &config).await?,
        Commands::Catalog(CatalogAction::Import) => {
            catalog::import(io::stdin().lock(), &mut stdout, &config)?;
        }
    }

    Ok(())
}
