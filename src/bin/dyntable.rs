//! Server binary: loads DB config from the environment, builds the pool and
//! schema catalog, and mounts the common and table CRUD routes.

use axum::Router;
use dyntable::{common_routes, table_routes, AppState, DbConfig};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;
use tracing_subscriber::EnvFilter;

const MAX_BODY_BYTES: usize = 1024 * 1024;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("dyntable=info")),
        )
        .init();

    let config = DbConfig::from_env()?;
    let pool = config.connect().await?;
    let state = AppState::new(pool);

    let app = Router::new()
        .merge(common_routes(state.clone()))
        .nest("/api/v1", table_routes(state))
        .layer(ServiceBuilder::new().layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES)));

    let port: u16 = std::env::var("PORT").ok().and_then(|p| p.parse().ok()).unwrap_or(3000);
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
