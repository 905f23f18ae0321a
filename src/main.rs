//! Connector runner
//!
//! 1. `.env` + logging
//! 2. `config.yaml` (or `CONNECTORS_CONFIG`)
//! 3. ConnectorManager: start every connector and its streams
//! 4. Ctrl+C cancels the shared token and waits for the tasks

use std::path::Path;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use perp_connectors::adapters::ConnectorManager;
use perp_connectors::config::{config_path, init_logging, load_config};

/// How long to wait for connector tasks after cancellation
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // =========================================================================
    // 1. Environment + logging
    // =========================================================================
    dotenvy::dotenv().ok();
    init_logging();

    info!("=== Perpetual connectors ===");

    // =========================================================================
    // 2. Configuration
    // =========================================================================
    let path = config_path();
    let config = load_config(Path::new(&path))?;
    info!(
        path = %path,
        connectors = config.connectors.len(),
        "Configuration loaded"
    );

    // =========================================================================
    // 3. Connectors
    // =========================================================================
    let cancel = CancellationToken::new();
    let manager = ConnectorManager::new(&config, cancel.clone());
    let handles = manager.start_all();

    // =========================================================================
    // 4. Wait for Ctrl+C, then shut down
    // =========================================================================
    info!("Press Ctrl+C to shutdown");
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");
    cancel.cancel();

    for (id, handle) in handles {
        match tokio::time::timeout(SHUTDOWN_GRACE, handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(connector = %id, error = %e, "Connector task panicked"),
            Err(_) => warn!(connector = %id, "Connector did not stop in time"),
        }
    }

    info!("Shutdown complete");
    Ok(())
}
