pub mod types;
pub mod config;
pub mod error;
pub mod data;
pub mod topology;
pub mod scale;
pub mod projection;
pub mod legend;
pub mod tooltip;
pub mod render;
pub mod server;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render the choropleth page to an HTML file
    Generate {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
    /// Serve the choropleth page and hover API
    Serve {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
    /// Download the remote datasets into the bundled data directory
    Vendor {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
        #[arg(short, long, value_name = "DIR", default_value = "data")]
        dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Generate { config } => {
            info!("Generating map with config: {:?}", config);
            let app_config = config::AppConfig::load_from_file(config)?;

            // 1. Load data (remote first, fallback copies otherwise)
            let datasets = data::load_datasets(&app_config).await?;

            // 2. Decode geometry and build the scale
            let map = render::Choropleth::new(&datasets, &app_config.render)?;

            // 3. Draw and write the page
            render::generate_page(&app_config, &map)?;

            info!("Generation complete!");
        }
        Commands::Serve { config } => {
            info!("Serving map with config: {:?}", config);
            let app_config = config::AppConfig::load_from_file(config)?;

            let datasets = data::load_datasets(&app_config).await?;
            let map = render::Choropleth::new(&datasets, &app_config.render)?;

            server::start_server(app_config, map).await?;
        }
        Commands::Vendor { config, dir } => {
            let app_config = config::AppConfig::load_from_file(config)?;
            data::vendor_datasets(&app_config, dir).await?;
            info!("Datasets written to {:?}, rebuild to bundle them", dir);
        }
    }

    Ok(())
}
