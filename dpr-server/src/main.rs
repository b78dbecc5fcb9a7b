//! dpr-server - privacy pattern recommendation service
//!
//! Loads the problem and pattern taxonomies once at startup, then serves quiz
//! and exploration sessions over HTTP.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use dpr_common::config::{
    CompiledDefaults, DataFolderInitializer, DataFolderResolver, TomlConfig,
};
use dpr_server::backend::snapshot::SnapshotSource;
use dpr_server::backend::sparql::SparqlClient;
use dpr_server::backend::CatalogueSource;
use dpr_server::catalogue::Catalogue;
use dpr_server::store::SavedItemStore;
use dpr_server::{build_router, spawn_session_cleanup, AppState};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for dpr-server
///
/// Data folder and config file also honour `DPR_DATA_FOLDER` and `DPR_CONFIG`.
#[derive(Parser, Debug)]
#[command(name = "dpr-server")]
#[command(about = "Privacy pattern recommendation and exploration service")]
#[command(version)]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Folder holding saved items
    #[arg(short, long)]
    data_folder: Option<PathBuf>,

    /// Address to listen on
    #[arg(short, long, env = "DPR_LISTEN")]
    listen: Option<SocketAddr>,

    /// Serve the catalogue from a JSON snapshot instead of the graph store
    #[arg(long, env = "DPR_SNAPSHOT")]
    snapshot: Option<PathBuf>,

    /// SPARQL query endpoint of the graph store
    #[arg(long, env = "DPR_SPARQL_ENDPOINT")]
    sparql_endpoint: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let resolver = DataFolderResolver::new("server")
        .with_cli_data_folder(args.data_folder.clone())
        .with_cli_config_file(args.config.clone());
    let config_path = resolver.config_file_path();
    let config = TomlConfig::load_or_default(config_path.as_deref())
        .context("Failed to load configuration")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("dpr_server={0},dpr_common={0},tower_http=info", config.logging.level)
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting dpr-server v{}", env!("CARGO_PKG_VERSION"));
    if let Some(path) = &config_path {
        info!("Config file: {}", path.display());
    }

    let data_folder = resolver.resolve_data_folder(&config);
    let initializer = DataFolderInitializer::new(data_folder);
    initializer
        .ensure_directory_exists()
        .context("Failed to create data folder")?;
    let saved = SavedItemStore::open(&initializer.saved_items_path());

    let defaults = CompiledDefaults::for_current_platform();
    let mut backend = config.backend.clone();
    if args.snapshot.is_some() {
        backend.snapshot_path = args.snapshot.clone();
    }

    let source: Arc<dyn CatalogueSource> = match &backend.snapshot_path {
        Some(path) => Arc::new(
            SnapshotSource::from_file(path)
                .with_context(|| format!("Failed to read snapshot {}", path.display()))?,
        ),
        None => {
            let endpoint = args
                .sparql_endpoint
                .clone()
                .or_else(|| backend.sparql_endpoint.clone())
                .unwrap_or(defaults.sparql_endpoint);
            info!("SPARQL endpoint: {}", endpoint);
            Arc::new(
                SparqlClient::new(&endpoint, &backend.pattern_root)
                    .context("Failed to create SPARQL client")?,
            )
        }
    };

    if !source.health_check().await {
        warn!("Catalogue source {} is not reachable; starting with what it returns", source.name());
    }
    let catalogue = Catalogue::load(source.as_ref(), &backend).await;

    let addr: SocketAddr = match args.listen {
        Some(addr) => addr,
        None => config
            .server
            .listen_addr
            .as_deref()
            .unwrap_or(&defaults.listen_addr)
            .parse()
            .context("Invalid listen address")?,
    };

    let state = AppState::new(catalogue, source, saved, config.server.clone());
    spawn_session_cleanup(state.clone(), std::time::Duration::from_secs(300));
    let app = build_router(state);

    info!("Starting HTTP server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
