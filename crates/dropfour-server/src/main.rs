//! Dropfour server binary.
//!
//! Environment:
//! - `DROPFOUR_BIND`: listen address, default `0.0.0.0:8080`
//! - `RUST_LOG`: tracing filter, default `info`

use dropfour::prelude::*;
use tracing_subscriber::EnvFilter;

const DEFAULT_BIND: &str = "0.0.0.0:8080";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let bind = std::env::var("DROPFOUR_BIND").unwrap_or_else(|_| DEFAULT_BIND.to_string());

    let server = DropfourServer::builder()
        .bind(&bind)
        .protocol_config(ProtocolConfig::default())
        .build(MemoryStore::new(), TracingAnalytics)
        .await?;
    tracing::info!(addr = %server.local_addr()?, "listening");

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        })
        .await?;

    tracing::info!("server stopped");
    Ok(())
}
