//! DocGate server
//!
//! Serves JSON document collections as a HAL REST API.

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use docgate_persistence::ClientCell;
use docgate_rest::{ServerConfig, create_app_with_config, init_logging};
use tracing::info;

#[cfg(feature = "sqlite")]
use docgate_persistence::backends::sqlite::SqliteStore;

/// Opens the SQLite store named by the server configuration.
#[cfg(feature = "sqlite")]
fn create_sqlite_store(config: &ServerConfig) -> anyhow::Result<SqliteStore> {
    let db_path = config.database_path();
    info!(database = %db_path, "Initializing SQLite store");

    let store = if db_path == ":memory:" {
        SqliteStore::in_memory()?
    } else {
        SqliteStore::open(db_path)?
    };

    Ok(store)
}

/// Starts the Axum HTTP server.
async fn serve(app: axum::Router, config: &ServerConfig) -> anyhow::Result<()> {
    let addr = config.socket_addr();
    info!(address = %addr, "Server listening");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::parse();
    init_logging(&config.log_level);

    if let Err(errors) = config.validate() {
        for error in &errors {
            eprintln!("Configuration error: {}", error);
        }
        std::process::exit(1);
    }

    info!(
        port = config.port,
        host = %config.host,
        coll_etag_policy = ?config.coll_etag_policy,
        doc_etag_policy = ?config.doc_etag_policy,
        "Starting DocGate"
    );

    start_sqlite(config).await
}

/// Starts the server over the SQLite store.
#[cfg(feature = "sqlite")]
async fn start_sqlite(config: ServerConfig) -> anyhow::Result<()> {
    let client: ClientCell<SqliteStore> = ClientCell::new();
    let store: Arc<SqliteStore> = client.connect(create_sqlite_store(&config)?).await?;
    let app = create_app_with_config(store, config.clone());
    serve(app, &config).await
}

/// Fallback when sqlite feature is not enabled.
#[cfg(not(feature = "sqlite"))]
async fn start_sqlite(_config: ServerConfig) -> anyhow::Result<()> {
    anyhow::bail!(
        "The sqlite store requires the 'sqlite' feature. \
         Build with: cargo build -p docgate --features sqlite"
    )
}
