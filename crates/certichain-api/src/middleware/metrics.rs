//! # HTTP Metrics
//!
//! Records request counts, latency and error counts through the `metrics`
//! facade. The Prometheus recorder is installed by the binary; without one
//! (as in tests) the macros are no-ops.

use std::time::Instant;

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;

/// Middleware that records per-request metrics.
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let method = request.method().as_str().to_string();
    let started = Instant::now();

    let response = next.run(request).await;

    let status = response.status();
    let status_label = status.as_u16().to_string();
    metrics::counter!(
        "certichain_http_requests_total",
        "method" => method.clone(),
        "status" => status_label.clone()
    )
    .increment(1);
    metrics::histogram!("certichain_http_request_duration_seconds", "method" => method)
        .record(started.elapsed().as_secs_f64());
    if status.is_client_error() || status.is_server_error() {
        metrics::counter!("certichain_http_errors_total", "status" => status_label).increment(1);
    }

    response
}
