use std::error::Error;
use std::sync::Arc;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use makerhub_api::{
    auth::{PgUserStore, TokenService},
    config::{AppConfig, DEFAULT_LOG_FILTER},
    create_router, db, telemetry,
    tutorials::PgTutorialStore,
    AppState,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    let config = AppConfig::from_env()?;
    telemetry::init(&config.log_filter, DEFAULT_LOG_FILTER);

    tracing::info!("MakerHub API - Starting...");
    tracing::debug!("Configuration: {:?}", config.tokens);

    tracing::info!("Connecting to database...");
    let pool = db::create_pool(&config.database_url).await?;
    db::run_migrations(&pool).await?;

    let state = AppState::new(
        Arc::new(PgUserStore::new(pool.clone())),
        Arc::new(PgTutorialStore::new(pool)),
        Arc::new(TokenService::new(&config.tokens)),
        config.body_limit,
    );

    // Configure CORS to allow all origins, methods, and headers
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(state)?.layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(cors),
    );

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("MakerHub API is running on http://{}", addr);
    tracing::info!("Swagger UI available at http://{}/swagger-ui", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
