//! petfinder-api - Lost-and-found pet reporting service
//!
//! Serves the PetFinder HTTP API: image upload, sighting reports matched
//! against open alerts, and pet alert management.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use petfinder_api::images::ImageStore;
use petfinder_api::store::DocumentStore;
use petfinder_api::{build_router, AppState};
use petfinder_common::config::{ensure_root_folder, resolve_root_folder, ServiceConfig};
use tracing::{error, info, warn};

/// Command-line arguments for petfinder-api
#[derive(Parser, Debug)]
#[command(name = "petfinder-api")]
#[command(about = "PetFinder lost-and-found pet service")]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long, env = "PETFINDER_CONFIG")]
    config: Option<PathBuf>,

    /// Root folder holding the database and uploaded images
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// HTTP port, overriding the configured one
    #[arg(short, long, env = "PETFINDER_PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!(
        "Starting PetFinder API (petfinder-api) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let args = Args::parse();

    let mut config = ServiceConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(port) = args.port {
        config.port = port;
    }

    let root_folder = resolve_root_folder(args.root_folder.as_deref(), &config);
    let db_path = ensure_root_folder(&root_folder)?;
    info!("Root folder: {}", root_folder.display());
    info!("Database path: {}", db_path.display());

    let store = match DocumentStore::connect(&db_path).await {
        Ok(store) => {
            info!("✓ Connected to database");
            store
        }
        Err(e) => {
            error!("Failed to connect to database: {}", e);
            return Err(e.into());
        }
    };

    let images = ImageStore::new(root_folder.join("images"), config.public_base_url());
    let state = AppState::from_config(&config, store, images)?;

    info!("Matcher: {}", matcher_summary(&state)?);
    if !state.embedder.is_enabled() {
        warn!("No embedding service configured; sightings will carry no embeddings");
    }
    if !state.notifier.is_enabled() {
        info!("Push notifications disabled");
    }

    let app = build_router(state);

    let addr = config.listen_addr();
    info!("Listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn matcher_summary(state: &AppState) -> Result<String> {
    let matcher = state
        .matcher
        .lock()
        .map_err(|_| anyhow::anyhow!("Matcher lock poisoned"))?;
    Ok(matcher.describe())
}

