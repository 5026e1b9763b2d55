//! Prometheus metrics endpoint and HTTP request tracking middleware.
//!
//! This module provides:
//! - A `/metrics` endpoint that returns Prometheus-formatted metrics
//! - Middleware for tracking HTTP request counts and durations
//! - Counters for the account flows (registration, login, verification)

use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::{MatchedPath, State},
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::Arc;
use std::time::Instant;

use crate::AppState;

// Metric names as constants for consistency
pub const HTTP_REQUESTS_TOTAL: &str = "http_requests_total";
pub const HTTP_REQUEST_DURATION_SECONDS: &str = "http_request_duration_seconds";
pub const REGISTRATIONS_TOTAL: &str = "registrations_total";
pub const LOGINS_TOTAL: &str = "logins_total";
pub const VERIFICATIONS_TOTAL: &str = "verifications_total";
pub const GATE_REJECTIONS_TOTAL: &str = "gate_rejections_total";
pub const USERS_TOTAL: &str = "users_total";
pub const SESSIONS_TOTAL: &str = "sessions_total";

/// Initialize the Prometheus metrics recorder and return a handle for rendering metrics.
///
/// This should be called once during application startup.
pub fn init_metrics() -> Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install Prometheus recorder")?;

    // Register metric descriptions
    describe_counter!(
        HTTP_REQUESTS_TOTAL,
        "Total number of HTTP requests received"
    );
    describe_histogram!(
        HTTP_REQUEST_DURATION_SECONDS,
        "HTTP request duration in seconds"
    );
    describe_counter!(REGISTRATIONS_TOTAL, "Accounts registered");
    describe_counter!(
        LOGINS_TOTAL,
        "Login attempts by outcome (success/not_found/bad_password/unverified)"
    );
    describe_counter!(
        VERIFICATIONS_TOTAL,
        "OTP verification attempts by outcome (success/invalid)"
    );
    describe_counter!(
        GATE_REJECTIONS_TOTAL,
        "Requests rejected by the auth gate, by response status"
    );
    describe_gauge!(USERS_TOTAL, "Registered accounts by status");
    describe_gauge!(SESSIONS_TOTAL, "Stored login sessions");

    Ok(handle)
}

/// GET /metrics - Returns Prometheus-formatted metrics.
///
/// This endpoint is accessible without authentication.
pub async fn metrics_endpoint(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    update_gauge_metrics(&state).await;

    match state.metrics_handle.as_ref() {
        Some(h) => (StatusCode::OK, h.render()),
        None => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Metrics not initialized".to_string(),
        ),
    }
}

/// Refresh the account and session gauges from the database
async fn update_gauge_metrics(state: &AppState) {
    if let Ok(rows) =
        sqlx::query_as::<_, (String, i64)>("SELECT status, COUNT(*) FROM users GROUP BY status")
            .fetch_all(&state.db)
            .await
    {
        for (status, count) in rows {
            gauge!(USERS_TOTAL, "status" => status).set(count as f64);
        }
    }

    if let Ok(count) = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM sessions")
        .fetch_one(&state.db)
        .await
    {
        gauge!(SESSIONS_TOTAL).set(count as f64);
    }
}

/// Middleware to track HTTP request metrics.
///
/// Records:
/// - `http_requests_total` counter with method, path, and status labels
/// - `http_request_duration_seconds` histogram with method and path labels
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();

    // Matched route template (/product/:id) keeps label cardinality bounded
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|mp| mp.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    let method = request.method().to_string();

    let response = next.run(request).await;

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    counter!(HTTP_REQUESTS_TOTAL, "method" => method.clone(), "path" => path.clone(), "status" => status).increment(1);
    histogram!(HTTP_REQUEST_DURATION_SECONDS, "method" => method, "path" => path).record(duration);

    response
}

pub fn record_registration() {
    counter!(REGISTRATIONS_TOTAL).increment(1);
}

/// Record a login attempt with its outcome
pub fn record_login(outcome: &'static str) {
    counter!(LOGINS_TOTAL, "outcome" => outcome).increment(1);
}

/// Record an OTP verification attempt with its outcome
pub fn record_verification(outcome: &'static str) {
    counter!(VERIFICATIONS_TOTAL, "outcome" => outcome).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_names() {
        // Ensure metric names follow Prometheus naming conventions
        assert!(HTTP_REQUESTS_TOTAL.contains("_total"));
        assert!(LOGINS_TOTAL.ends_with("_total"));
        assert!(GATE_REJECTIONS_TOTAL.ends_with("_total"));
        assert!(HTTP_REQUEST_DURATION_SECONDS.contains("_seconds"));
    }
}
