//! Application setup and server configuration.

use std::sync::Arc;

use axum::{
    extract::Extension,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        Method,
    },
    routing::{get, post},
    Router,
};
use chrono::Duration;
use sqlx::PgPool;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use twilio::TwilioOptions;

use crate::config::Config;
use crate::domains::builder::{BuilderTokenService, PostgresSessionStore};
use crate::domains::messaging::{
    PostgresInteractionStore, PostgresScheduledMessageStore, PostgresTemplateRegistry,
};
use crate::kernel::{ServerDeps, TwilioGateway};
use crate::server::routes::{exchange_token_handler, health_handler, process_messages_handler};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub deps: Arc<ServerDeps>,
}

/// Build the Axum application router
///
/// Returns (Router, Arc<ServerDeps>) - deps are needed for scheduled tasks.
pub fn build_app(pool: PgPool, config: &Config) -> (Router, Arc<ServerDeps>) {
    // System-wide Twilio sender; per-brand api_settings rows override it
    let system_twilio = TwilioOptions {
        account_sid: config.twilio_account_sid.clone(),
        auth_token: config.twilio_auth_token.clone(),
        whatsapp_number: config.twilio_whatsapp_number.clone(),
    };

    let gateway = Arc::new(TwilioGateway::new(
        pool.clone(),
        system_twilio,
        Duration::minutes(config.credential_cache_ttl_minutes),
    ));

    let token_service = Arc::new(BuilderTokenService::new(
        &config.jwt_secret,
        config.jwt_issuer.clone(),
    ));

    let deps = Arc::new(ServerDeps::new(
        pool.clone(),
        Arc::new(PostgresScheduledMessageStore::new(pool.clone())),
        Arc::new(PostgresTemplateRegistry::new(pool.clone())),
        Arc::new(PostgresInteractionStore::new(pool.clone())),
        gateway,
        Arc::new(PostgresSessionStore::new(pool.clone())),
        token_service,
        config.dispatcher_policy(),
    ));

    let app_state = AppState {
        db_pool: pool,
        deps: deps.clone(),
    };

    // CORS configuration - the exchange endpoint is called from embedded
    // builder pages on brand domains
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE]);

    // Rate limiting for the public exchange endpoint
    // Prevents brute-forcing leaked initial URLs
    let rate_limit_config = std::sync::Arc::new(
        GovernorConfigBuilder::default()
            .per_second(10) // Base rate: 10 requests per second
            .burst_size(20) // Allow bursts up to 20
            .use_headers() // Extract IP from X-Forwarded-For header
            .finish()
            .expect("Rate limiter configuration is valid and should never fail"),
    );

    let rate_limit_layer = GovernorLayer {
        config: rate_limit_config,
    };

    let builder_routes = Router::new()
        .route("/builder/session/exchange", post(exchange_token_handler))
        .layer(rate_limit_layer);

    let app = Router::new()
        // Internal dispatcher trigger (also driven by the in-process cron)
        .route("/internal/messages/process", post(process_messages_handler))
        .merge(builder_routes)
        // Health check (no rate limit)
        .route("/health", get(health_handler))
        // Middleware layers (applied in reverse order - last added runs first)
        .layer(Extension(app_state))
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    (app, deps)
}
