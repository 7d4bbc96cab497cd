//! Runs the Getaway server.
//!
//! Environment:
//! - `GETAWAY_BIND`: listen address, default `127.0.0.1:8080`
//! - `GETAWAY_CONFIG_PATH`: game config document, default `config/game.json`
//! - `RUST_LOG`: log filter, default `info`

use std::sync::Arc;

use getaway::prelude::*;
use getaway::DEFAULT_BIND;
use tracing_subscriber::EnvFilter;

const BIND_ENV: &str = "GETAWAY_BIND";

#[tokio::main]
async fn main() -> Result<(), GetawayError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let bind = std::env::var(BIND_ENV).unwrap_or_else(|_| DEFAULT_BIND.to_string());
    let server = GetawayServerBuilder::new()
        .bind(&bind)
        .config(ConfigStore::from_env())
        .build(Arc::new(InMemoryEscrow::default()))
        .await?;

    tracing::info!(addr = %server.local_addr()?, "listening");
    server.run().await
}
