use axum::{
    routing::{delete, get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use credit_funding_api::admin_handler;
use credit_funding_api::catalog::{requirement_text_mismatches, FUNDING_CATALOG};
use credit_funding_api::config::Config;
use credit_funding_api::db::Database;
use credit_funding_api::handlers::{self, AppState};
use credit_funding_api::notifier::AdminNotifier;
use credit_funding_api::rate_limit::{RateLimitBackend, RateLimitPolicy};
use credit_funding_api::storage::PgStorage;

/// Main entry point for the application.
///
/// Initializes tracing, configuration, the database pool, rate limiters and
/// the optional admin notifier, then starts the Axum server.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "credit_funding_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!("Configuration loaded successfully");

    // Initialize database connection pool
    let db = Database::new(&config.database_url).await?;
    tracing::info!("Database connection pool established");

    for mismatch in requirement_text_mismatches(FUNDING_CATALOG) {
        tracing::warn!("Funding catalog: {}", mismatch);
    }

    let million_mode_limiter = RateLimitBackend::new(
        config.rate_limit_store,
        &db.pool,
        RateLimitPolicy::per_hour(config.million_mode_rate_limit_per_hour),
    );
    let dispute_limiter = RateLimitBackend::new(
        config.rate_limit_store,
        &db.pool,
        RateLimitPolicy::per_hour(config.dispute_rate_limit_per_hour),
    );
    tracing::info!("Rate limiters initialized ({:?} store)", config.rate_limit_store);

    let notifier = match config.notify.as_ref() {
        Some(notify) => match AdminNotifier::new(notify) {
            Ok(client) => {
                tracing::info!("✓ Admin notifier initialized: {}", notify.base_url);
                Some(client)
            }
            Err(e) => {
                tracing::error!("Failed to initialize admin notifier: {}", e);
                None
            }
        },
        None => None,
    };

    // Build application state
    let app_state = Arc::new(AppState {
        storage: PgStorage::new(db.pool.clone()),
        config: config.clone(),
        million_mode_limiter,
        dispute_limiter,
        notifier,
    });

    // Configure rate limiter: 10 requests/second per IP, burst of 20
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(10)
            .burst_size(20)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .ok_or_else(|| anyhow::anyhow!("Invalid governor configuration"))?,
    );

    // Build protected routes with security layers
    let protected_routes = Router::new()
        .route(
            "/api/v1/funding/probability",
            post(handlers::calculate_probability),
        )
        .route("/api/v1/users/:user_id/profile", get(handlers::get_profile))
        .route(
            "/api/v1/users/:user_id/tradelines",
            get(handlers::list_tradelines).post(handlers::add_tradeline),
        )
        .route(
            "/api/v1/users/:user_id/tradelines/:tradeline_id",
            delete(handlers::delete_tradeline),
        )
        .route("/api/v1/users/:user_id/scores", post(handlers::add_score))
        .route("/api/v1/users/:user_id/inquiries", post(handlers::add_inquiry))
        .route(
            "/api/v1/users/:user_id/funding-timeline",
            get(handlers::get_timeline).post(handlers::recalculate_timeline),
        )
        .route("/api/v1/users/:user_id/consents", post(handlers::record_consent))
        .route(
            "/api/v1/users/:user_id/million-mode",
            post(handlers::activate_million_mode),
        )
        .route("/api/v1/users/:user_id/disputes", post(handlers::create_dispute))
        .route(
            "/api/v1/users/:user_id/disputes/:dispute_id/submit",
            post(handlers::submit_dispute),
        )
        .route(
            "/api/v1/users/:user_id/actions/:action_id/submit",
            post(handlers::submit_action),
        )
        // Admin review queue
        .route("/api/v1/admin/approvals", get(admin_handler::list_approvals))
        .route(
            "/api/v1/admin/approvals/:approval_id/decision",
            post(admin_handler::decide_approval),
        )
        .layer(
            ServiceBuilder::new()
                // Request size limit: 1MB max payload
                .layer(RequestBodyLimitLayer::new(1024 * 1024))
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

    // Peer address is the fallback key for the per-IP limiter
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
