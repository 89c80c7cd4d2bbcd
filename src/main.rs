use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};

use rust_lead_research::config::Config;
use rust_lead_research::db::Database;
use rust_lead_research::db_storage::PgLeadStorage;
use rust_lead_research::gateway_client::{
    GatewayCompanyIntelProvider, GatewaySourceAdapter, GatewayVerificationProvider,
};
use rust_lead_research::handlers::{self, AppState};
use rust_lead_research::obs;
use rust_lead_research::pipeline::ResearchCoordinator;
use rust_lead_research::rate_limiter::CallLimiter;
use rust_lead_research::verification::DnsMailRouteResolver;

/// Builds the research coordinator from configuration.
///
/// Gateway endpoints become source adapters and verification providers in declaration
/// order. Results are persisted to Postgres.
fn build_coordinator(config: &Config, db: &Database) -> anyhow::Result<ResearchCoordinator> {
    let limiter = Arc::new(CallLimiter::from_settings(&config.pipeline));
    let store = Arc::new(PgLeadStorage::new(db.pool.clone()));
    let mail_routes = Arc::new(DnsMailRouteResolver::new());

    let mut coordinator =
        ResearchCoordinator::new(config.pipeline.clone(), limiter, store, mail_routes);

    for endpoint in &config.source_gateways {
        let adapter = GatewaySourceAdapter::new(endpoint, config.gateway_token.clone())?;
        tracing::info!("✓ Source adapter initialized: {} ({})", endpoint.name, endpoint.url);
        coordinator = coordinator.with_source(Arc::new(adapter));
    }
    if config.source_gateways.is_empty() {
        tracing::warn!("SOURCE_GATEWAYS not set, research runs will discover nothing");
    }

    for endpoint in &config.verification_gateways {
        let provider = GatewayVerificationProvider::new(endpoint, config.gateway_token.clone())?;
        tracing::info!("✓ Verification provider initialized: {}", endpoint.name);
        coordinator = coordinator.with_verification_provider(Arc::new(provider));
    }

    if let Some(url) = &config.company_intel_url {
        let provider = GatewayCompanyIntelProvider::new(url, config.gateway_token.clone())?;
        tracing::info!("✓ Company intelligence initialized: {}", url);
        coordinator = coordinator.with_company_intel(Arc::new(provider));
    }

    Ok(coordinator)
}

/// Main entry point for the application.
///
/// Initializes tracing, configuration, the database and the research coordinator,
/// then serves the HTTP surface.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    obs::init_tracing();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize database connection pool
    let db = Database::new(&config.database_url).await?;
    db.ensure_schema().await?;
    tracing::info!("Database connection pool established");

    let coordinator = build_coordinator(&config, &db)?;

    // Build application state
    let app_state = Arc::new(AppState {
        config: config.clone(),
        coordinator: Arc::new(coordinator),
    });

    // Configure rate limiter: 10 requests/second per IP, burst of 20
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(10)
            .burst_size(20)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .ok_or_else(|| anyhow::anyhow!("Invalid rate limiter configuration"))?,
    );

    // Build protected routes with security layers
    let protected_routes = Router::new()
        .route("/api/v1/research", post(handlers::run_research))
        .route(
            "/api/v1/campaigns/:id/leads",
            get(handlers::get_campaign_leads),
        )
        .layer(
            ServiceBuilder::new()
                // Request size limit: 5MB max payload
                .layer(RequestBodyLimitLayer::new(5 * 1024 * 1024))
                // Rate limiting: 10 req/sec per IP, burst of 20
                .layer(GovernorLayer {
                    config: governor_conf,
                }),
        );

    // Health check bypasses rate limiting
    let app = Router::new()
        .route("/health", get(handlers::health))
        .merge(protected_routes)
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;

    Ok(())
}
