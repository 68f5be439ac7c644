mod configuration;
mod error;
mod routes;
mod state;

use converse::providers::converse::ConverseProvider;
use converse::router::InvocationRouter;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let settings = configuration::Settings::new()?;

    // The transport client is built once and shared by every invocation
    let provider = ConverseProvider::new(settings.provider_config())?;
    let router = InvocationRouter::new(Arc::new(provider), settings.router_settings());
    let state = state::AppState {
        router: Arc::new(router),
    };

    // Create router with CORS support
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = routes::configure(state).layer(cors);

    // Run server
    let listener = tokio::net::TcpListener::bind(settings.server.socket_addr()?).await?;
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
