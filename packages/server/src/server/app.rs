//! Application setup and server configuration.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use axum::{
    extract::Extension,
    http::{header::CONTENT_TYPE, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use sqlx::PgPool;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::kernel::ServerDeps;
use crate::server::routes::{
    accept_link_handler, advance_request_handler, create_request_handler, health_handler,
    list_all_requests_handler, list_client_requests_handler, offer_history_handler,
    reject_link_handler, respond_handler, sweep_handler,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub deps: Arc<ServerDeps>,
    /// Only used by the health check; `None` when running on in-memory stores
    pub db_pool: Option<PgPool>,
}

impl AppState {
    pub fn new(deps: ServerDeps, db_pool: Option<PgPool>) -> Self {
        Self {
            deps: Arc::new(deps),
            db_pool,
        }
    }
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE]);

    if allowed_origins.is_empty() {
        return cors.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    cors.allow_origin(AllowOrigin::list(origins))
}

/// Build the Axum application router
pub fn build_app(state: AppState, allowed_origins: &[String]) -> Router {
    Router::new()
        // Customer intake and dashboard
        .route(
            "/api/requests",
            post(create_request_handler).get(list_client_requests_handler),
        )
        .route("/api/requests/:id/advance", post(advance_request_handler))
        .route("/api/requests/:id/matches", get(offer_history_handler))
        // Admin dashboard
        .route("/api/admin/requests", get(list_all_requests_handler))
        // Offer links (emailed / pushed to professionals)
        .route("/api/matches/:id/accept", get(accept_link_handler))
        .route("/api/matches/:id/reject", get(reject_link_handler))
        .route("/api/matches/:id/respond", post(respond_handler))
        // Expiry sweep trigger for external schedulers
        .route("/api/matches/sweep", post(sweep_handler))
        .route("/health", get(health_handler))
        .layer(Extension(state))
        .layer(cors_layer(allowed_origins))
        .layer(TraceLayer::new_for_http())
}

/// Per-IP rate limiting: 10 requests per second with bursts up to 20.
///
/// Needs the peer address, so the router must be served with
/// `into_make_service_with_connect_info::<SocketAddr>()`.
pub fn with_rate_limit(router: Router) -> Result<Router> {
    let config = GovernorConfigBuilder::default()
        .per_second(10)
        .burst_size(20)
        .use_headers()
        .finish()
        .ok_or_else(|| anyhow!("Invalid rate limiter configuration"))?;

    Ok(router.layer(GovernorLayer {
        config: Arc::new(config),
    }))
}
