use std::io;
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use gauge_cli::commands::{chart, cylinder, import, record, replay, scan, status, summary};
use gauge_cli::{Cli, Commands, Config, Services};

/// Load config and open the database behind the pipeline services.
async fn open_services(config_path: Option<&Path>) -> Result<(Services, Config)> {
    let config = load_config(config_path)?;
    let services = Services::open(&config).await?;
    Ok((services, config))
}

fn load_config(config_path: Option<&Path>) -> Result<Config> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");
    Ok(config)
}

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

    let mut stdout = io::stdout().lock();
    let config_path = cli.config.as_deref();

    match &cli.command {
        Some(Commands::Cylinder(action)) => {
            let (services, _config) = open_services(config_path).await?;
            cylinder::run(&mut stdout, &services, action).await?;
        }
        Some(Commands::Record(args)) => {
            let (services, _config) = open_services(config_path).await?;
            record::run(&mut stdout, &services, args).await?;
        }
        Some(Commands::Import(args)) => {
            let (services, _config) = open_services(config_path).await?;
            import::run(&mut stdout, &services, args).await?;
        }
        Some(Commands::Replay) => {
            let (services, _config) = open_services(config_path).await?;
            replay::run(&mut stdout, &services).await?;
        }
        Some(Commands::Summary(args)) => {
            let (services, _config) = open_services(config_path).await?;
            summary::run(&mut stdout, &services, args).await?;
        }
        Some(Commands::Chart(args)) => {
            let (services, _config) = open_services(config_path).await?;
            chart::run(&mut stdout, &services, args).await?;
        }
        Some(Commands::Scan(args)) => {
            // Scanning never touches the database
            let config = load_config(config_path)?;
            scan::run(&mut stdout, &config, args)?;
        }
        Some(Commands::Status) => {
            let (services, config) = open_services(config_path).await?;
            status::run(&mut stdout, &services, &config).await?;
        }
        None => {
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
        }
    }

    Ok(())
}
