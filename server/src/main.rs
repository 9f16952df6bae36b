use std::sync::Arc;

use accessgate_core::{GatewayConfig, SqliteStore, VendorClient};
use accessgate_server::AppState;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    accessgate_server::init_tracing();

    let config = GatewayConfig::from_env_file(".env")?;
    let store = SqliteStore::open(&config.server.database_path)?;
    let vendor = VendorClient::new(&config.vendor)?;
    let state = AppState::new(store, Arc::new(vendor), &config.vendor.org_index_code);

    let addr = format!("0.0.0.0:{}", config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(%addr, vendor = %config.vendor.base_url, "gateway listening");
    accessgate_server::run(listener, state).await?;
    Ok(())
}
