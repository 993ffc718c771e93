//! Web server using Axum.

use std::net::SocketAddr;

use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::router::{create_app_router, AGENT_WS_PATH};
use super::AppState;
use crate::error::{Error, Result};

/// Web server configuration.
pub struct WebServerConfig {
    pub port: u16,
    pub host: String,
}

impl Default for WebServerConfig {
    fn default() -> Self {
        Self {
            port: 8666,
            host: "0.0.0.0".to_string(),
        }
    }
}

/// Run the web server until `shutdown` fires.
pub async fn run_server(
    config: WebServerConfig,
    state: AppState,
    shutdown: CancellationToken,
) -> Result<()> {
    let app = create_app_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| Error::Web(format!("Invalid address: {}", e)))?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Matrix listening on ws://{}{}", addr, AGENT_WS_PATH);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move { shutdown.cancelled().await })
    .await?;

    tracing::info!("Web server stopped");
    Ok(())
}
