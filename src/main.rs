//! renderiq-gateway server entry point.
//!
//! Starts the Axum HTTP server with the render, credit, and gallery
//! endpoints, choosing the PostgreSQL or in-memory persistence backend
//! from the environment.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use renderiq_gateway::api;
use renderiq_gateway::app_state::AppState;
use renderiq_gateway::config::GatewayConfig;
use renderiq_gateway::domain::ModelRegistry;
use renderiq_gateway::generation::HttpGenerationClient;
use renderiq_gateway::persistence::{
    Authenticator, CreditLedger, MemoryPersistence, PostgresPersistence, RenderStore,
    Subscriptions,
};
use renderiq_gateway::service::RenderService;
use renderiq_gateway::storage::LocalArtifactStore;

type Backends = (
    Arc<dyn CreditLedger>,
    Arc<dyn RenderStore>,
    Arc<dyn Subscriptions>,
    Arc<dyn Authenticator>,
);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = GatewayConfig::from_env().map_err(|e| anyhow::anyhow!(e.to_string()))?;
    tracing::info!(addr = %config.listen_addr, "starting renderiq-gateway");

    // Choose the persistence backend
    let (ledger, store, subscriptions, authenticator) = build_backends(&config).await?;

    // Build the provider and storage adapters
    let generation = Arc::new(HttpGenerationClient::new(
        config.provider_base_url.clone(),
        config.provider_api_key.clone(),
        Duration::from_secs(config.provider_timeout_secs),
    )?);
    std::fs::create_dir_all(&config.storage_root)?;
    let artifacts = Arc::new(LocalArtifactStore::new(
        config.storage_root.clone(),
        config.public_base_url.clone(),
    )?);

    // Build the service layer
    let registry = ModelRegistry::new();
    let render_service = Arc::new(RenderService::new(
        registry,
        Arc::clone(&ledger),
        Arc::clone(&store),
        subscriptions,
        generation,
        artifacts,
    ));

    // Build application state
    let app_state = AppState {
        render_service,
        ledger,
        store,
        authenticator,
        registry,
    };

    // Build router
    let app = Router::new()
        .merge(api::build_router())
        .nest_service("/files", ServeDir::new(&config.storage_root))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app).await?;

    Ok(())
}

/// Connects to PostgreSQL when configured, falling back to the
/// in-memory backend for local development.
async fn build_backends(config: &GatewayConfig) -> anyhow::Result<Backends> {
    if let Some(url) = &config.database_url {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
            .connect(url)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;

        let persistence = Arc::new(PostgresPersistence::new(pool, config.default_free_credits));
        tracing::info!("using PostgreSQL persistence");
        return Ok((
            Arc::clone(&persistence) as Arc<dyn CreditLedger>,
            Arc::clone(&persistence) as Arc<dyn RenderStore>,
            Arc::clone(&persistence) as Arc<dyn Subscriptions>,
            persistence as Arc<dyn Authenticator>,
        ));
    }

    let persistence = Arc::new(MemoryPersistence::new(config.default_free_credits));
    tracing::warn!("DATABASE_URL not set; using in-memory persistence (state is not durable)");

    if let Some(token) = &config.dev_api_token {
        let user_id = uuid::Uuid::new_v4();
        persistence.insert_api_key(token.clone(), user_id).await;
        tracing::info!(%user_id, "seeded development API token");
    }

    Ok((
        Arc::clone(&persistence) as Arc<dyn CreditLedger>,
        Arc::clone(&persistence) as Arc<dyn RenderStore>,
        Arc::clone(&persistence) as Arc<dyn Subscriptions>,
        persistence as Arc<dyn Authenticator>,
    ))
}
