//! # certichain-api — Axum API Service for CertiChain
//!
//! Institutions register, sign in, assemble issuance and revocation calls
//! for their wallets, and publish signed documents. Anyone can verify a
//! credential.
//!
//! ## API Surface
//!
//! | Prefix | Module | Access |
//! |--------|--------|--------|
//! | `/v1/registration/*` | [`routes::registration`] | public, rate limited |
//! | `/v1/session/login` | [`routes::session`] | public, rate limited |
//! | `/v1/session/logout` | [`routes::session`] | session |
//! | `/v1/credentials/*` | [`routes::credentials`] | session |
//! | `/v1/documents/*` | [`routes::documents`] | session |
//! | `/v1/institutions/me` | [`routes::institutions`] | session |
//! | `/v1/verify*` | [`routes::verification`] | public |
//! | `/v1/certificates/{id}` | [`routes::certificates`] | public |
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! TraceLayer → MetricsMiddleware → [RateLimit | Auth] → Handler
//! ```
//!
//! ## OpenAPI
//!
//! Generated via utoipa derive macros, served at `/openapi.json`.

pub mod auth;
pub mod db;
pub mod documents;
pub mod error;
pub mod extractors;
pub mod issuance;
pub mod middleware;
pub mod openapi;
pub mod password;
pub mod registration;
pub mod revocation;
pub mod routes;
pub mod session;
pub mod signature_cache;
pub mod state;
pub mod upstream;
pub mod verification;

use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::middleware::rate_limit::{RateLimitConfig, RateLimiter};
use crate::state::AppState;

pub use crate::state::{AppConfig, Collaborators};

/// Uploaded PDFs and bundle files are capped at this size.
const MAX_BODY_BYTES: usize = 20 * 1024 * 1024;

/// Assemble the application router, with rate limits from the environment.
pub fn app(state: AppState) -> Router {
    app_with_limits(state, RateLimitConfig::from_env())
}

/// Assemble the application router.
///
/// Health probes, `/metrics` and `/openapi.json` are unauthenticated.
pub fn app_with_limits(state: AppState, limits: RateLimitConfig) -> Router {
    let limiter = RateLimiter::new(limits);

    // Unauthenticated credential endpoints.
    let throttled = Router::new()
        .merge(routes::registration::router())
        .merge(routes::session::router())
        .layer(from_fn(middleware::rate_limit::rate_limit_middleware))
        .layer(axum::Extension(limiter));

    let public = Router::new()
        .merge(routes::verification::router())
        .merge(routes::certificates::router())
        .merge(openapi::router());

    let protected = Router::new()
        .merge(routes::session::protected_router())
        .merge(routes::credentials::router())
        .merge(routes::documents::router())
        .merge(routes::institutions::router())
        .route_layer(from_fn_with_state(state.clone(), auth::auth_middleware));

    let ops = Router::new()
        .route("/health/liveness", get(liveness))
        .route("/health/readiness", get(readiness))
        .route("/metrics", get(prometheus_metrics));

    Router::new()
        .merge(ops)
        .merge(throttled)
        .merge(public)
        .merge(protected)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(from_fn(middleware::metrics::metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Liveness probe: 200 while the process is running.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness probe: 200 once the institution store answers.
async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    match state.institutions.health_check().await {
        Ok(()) => (StatusCode::OK, "ready"),
        Err(e) => {
            tracing::warn!(error = %e, "readiness check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "institution store unavailable")
        }
    }
}

/// Prometheus text exposition of the recorded metrics.
async fn prometheus_metrics(State(state): State<AppState>) -> impl IntoResponse {
    match &state.metrics {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            "metrics recorder not installed".to_string(),
        ),
    }
}
