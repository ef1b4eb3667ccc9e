use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info};

use banco_clientes::{
    config::{Config, StorageKind},
    db,
    service::ClientService,
    store::{ClientStore, MemoryClientStore, PgClientStore},
    telemetry,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init();

    let config = Config::from_env()?;

    let store: Arc<dyn ClientStore> = match config.storage {
        StorageKind::Postgres => {
            let pool = db::connect(&config.database)
                .await
                .context("failed to connect to the database")?;
            Arc::new(PgClientStore::new(pool))
        }
        StorageKind::Memory => Arc::new(MemoryClientStore::new()),
    };

    store
        .init_tables()
        .await
        .context("failed to initialize tables")?;

    let service = ClientService::new(store.clone());
    let app = banco_clientes::app(service);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port))
        .await
        .with_context(|| format!("failed to bind port {}", config.port))?;

    info!(port = config.port, storage = ?config.storage, "server running");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    store.close().await;
    info!("server stopped");

    Ok(())
}

async fn shutdown_signal() {
    signal_received(tokio::signal::ctrl_c().await);
}

/// Logs a failed signal listener; the server then shuts down right away.
fn signal_received(result: std::io::Result<()>) -> bool {
    match result {
        Ok(()) => {
            info!("shutdown signal received");
            true
        }
        Err(err) => {
            error!(error = %err, "failed to listen for shutdown signal");
            false
        }
    }
}
