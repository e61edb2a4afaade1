//! Portal Server
//!
//! Axum server streaming narrated location tours, plus the notes, catalog
//! and search endpoints the frontend uses. The same binary ships a small CLI
//! for consuming a tour and for building the search index.

mod api;
mod cli;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use portal_core::catalog::CatalogClient;
use portal_core::config::PortalConfig;
use portal_core::narration::NarrationPipeline;
use portal_core::notes::NotesStore;
use portal_core::search::{HttpEmbedder, SearchService};
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Application state
pub struct AppState {
    pub pipeline: NarrationPipeline,
    pub notes: NotesStore,
    pub catalog: CatalogClient,
    /// Present only when an index was built beforehand
    pub search: Option<SearchService>,
    pub config: PortalConfig,
}

pub type SharedState = Arc<AppState>;

#[derive(Parser, Clone)]
#[command(author, version, about = "Portal - streaming interdimensional tour guide")]
struct Args {
    #[command(subcommand)]
    command: Option<CliCommand>,
}

#[derive(Subcommand, Clone)]
enum CliCommand {
    /// Start the portal server (default)
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8000")]
        port: u16,
    },
    /// Take a narrated tour of one location through a running server
    Tour {
        /// Catalog id of the location
        #[arg(short, long)]
        location_id: String,
        /// Base URL of the portal server
        #[arg(short, long, default_value = "http://127.0.0.1:8000")]
        server: String,
    },
    /// Fetch the catalog, embed it and save the search index
    Index,
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "portal_server=info,portal_core=info,tower_http=info".into()),
        )
        .with(fmt::layer())
        .init();
}

pub async fn run_server(config: PortalConfig, port: u16) -> anyhow::Result<()> {
    let pipeline = NarrationPipeline::from_models(&config.narrator, &config.evaluator)
        .context("Failed to configure narration models")?;

    let notes = NotesStore::open(&config.database_path).with_context(|| {
        format!(
            "Failed to open notes database at {}",
            config.database_path.display()
        )
    })?;

    let catalog = CatalogClient::new(config.catalog_url.clone());
    let search = load_search(&config).await;

    let state: SharedState = Arc::new(AppState {
        pipeline,
        notes,
        catalog,
        search,
        config,
    });

    let app = api::router(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    tracing::info!("Portal server running at http://{}", addr);
    tracing::info!("   Narration: POST /api/v1/narration");
    tracing::info!("   Locations: /api/v1/locations, /by-ids");
    tracing::info!("   Notes:     /api/v1/notes, /bulk, /:character_id");
    tracing::info!("   Search:    POST /api/v1/search");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Search stays disabled when the index or the embedding key is missing
async fn load_search(config: &PortalConfig) -> Option<SearchService> {
    if !config.index_path.exists() {
        tracing::warn!(
            "No search index at {}; run `portal index` to enable search",
            config.index_path.display()
        );
        return None;
    }

    let embedder = match HttpEmbedder::from_env(config.embeddings.clone()) {
        Ok(embedder) => Arc::new(embedder),
        Err(e) => {
            tracing::warn!("Search disabled: {}", e);
            return None;
        }
    };

    match SearchService::load(embedder, &config.index_path).await {
        Ok(service) => Some(service),
        Err(e) => {
            tracing::warn!("Search disabled, failed to load index: {}", e);
            None
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let args = Args::parse();
    let config = PortalConfig::load()
        .await
        .context("Failed to load .portal/config.json")?;

    match args.command {
        Some(CliCommand::Tour {
            location_id,
            server,
        }) => cli::tour(&config, &location_id, &server).await,
        Some(CliCommand::Index) => cli::build_index(&config).await,
        Some(CliCommand::Serve { port }) => run_server(config, port).await,
        None => run_server(config, 8000).await,
    }
}
