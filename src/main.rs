//! officegate server binary.

use std::net::SocketAddr;

use tokio::net::TcpListener;

use officegate::{api, config, AppState, Error, Result};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = config::init();
    officegate::init_tracing(config.logging.json);
    tracing::info!(
        "Starting officegate on {}:{} (root domain {})",
        config.server.host,
        config.server.port,
        config.gateway.root_domain
    );

    // Initialize application state
    let state = AppState::new().await?;
    tracing::info!(
        upstreams = state.proxy.upstreams().count(),
        "Application state initialized"
    );

    let app = api::router(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| Error::InvalidInput(format!("Invalid listen address: {}", e)))?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .map_err(|e| Error::Internal(e.to_string()))?;

    Ok(())
}
