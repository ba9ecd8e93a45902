//! Unauthenticated health-check endpoint.

/// `GET /healthz` — liveness probe.
pub async fn health() -> &'static str {
    "OK"
}
