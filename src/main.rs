pub mod types;
pub mod config;
pub mod topology;
pub mod data;
pub mod coordinator;
pub mod color;
pub mod projection;
pub mod tiles;
pub mod filter;
pub mod scene;
pub mod sync;
pub mod app;
pub mod calendar;
pub mod index;
pub mod page;
pub mod server;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
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
    /// Render one view of the map to a standalone HTML file
    Render {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
        #[arg(short, long, value_name = "FILE", default_value = "map.html")]
        out: PathBuf,
        #[arg(long)]
        lat: Option<f64>,
        #[arg(long)]
        lon: Option<f64>,
        #[arg(long)]
        zoom: Option<u8>,
        /// Show only this crime category, as if its legend row was clicked
        #[arg(long)]
        category: Option<String>,
    },
    /// Serve the interactive map
    Serve {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Render { config, out, lat, lon, zoom, category } => {
            info!(config = ?config, "Rendering map");
            let app_config = config::AppConfig::load_from_file(&config)?;
            let colors = Arc::new(color::CategoryColorMap::from_config(&app_config.categories)?);
            info!(categories = colors.len(), "Category colors ready");

            // 1. Load both datasets, then draw once
            let mut session = app::MapSession::new(&app_config, colors);
            session.load(&app_config.input).await?;

            // 2. Move to the requested view and filter
            let view = *session.viewport();
            session.set_view(
                lat.unwrap_or(view.center_lat),
                lon.unwrap_or(view.center_lon),
                zoom.unwrap_or(view.zoom),
            );
            if let Some(category) = category {
                session.handle(app::MapEvent::LegendClick(category));
            }

            // 3. Write the page, error state included
            let html = page::render_page(&session, &app_config.tiles);
            std::fs::write(&out, html)
                .with_context(|| format!("Failed to write page: {:?}", out))?;
            info!(out = ?out, "Wrote map page");

            if let Some(message) = session.error() {
                bail!("Map data failed to load: {}", message);
            }
        }
        Commands::Serve { config } => {
            info!(config = ?config, "Serving map");
            let app_config = config::AppConfig::load_from_file(&config)?;
            let colors = Arc::new(color::CategoryColorMap::from_config(&app_config.categories)?);

            server::start_server(app_config, colors).await?;
        }
    }

    Ok(())
}
