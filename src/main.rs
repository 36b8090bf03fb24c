use axum::{routing::get, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use protocol_api_rust::auth;
use protocol_api_rust::config;
use protocol_api_rust::database::manager::DatabaseManager;
use protocol_api_rust::database::models::{Protocol, ProtocolSchema};
use protocol_api_rust::handlers::{crud, system};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, PUBLIC_KEY, etc.
    let _ = dotenvy::dotenv();

    let config = config::init()?;

    tracing_subscriber::fmt::init();
    tracing::info!("starting protocol API in {:?} mode", config.environment);

    auth::init(&config.security.public_key_pem)
        .map_err(|e| anyhow::anyhow!("PUBLIC_KEY is not a usable RSA public key: {e}"))?;

    DatabaseManager::migrate().await?;

    let bind_addr = format!("0.0.0.0:{}", config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("protocol API listening on http://{}", bind_addr);

    axum::serve(listener, app()).await?;
    Ok(())
}

fn app() -> Router {
    Router::new()
        // Public
        .route("/", get(system::root))
        .route("/health", get(system::health))
        .route("/auth/check", get(system::auth_check))
        // Resource groups: same generic route set for both
        .nest("/protocols", crud::resource_routes::<Protocol>())
        .nest("/protocolschemas", crud::resource_routes::<ProtocolSchema>())
        // Global middleware
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
