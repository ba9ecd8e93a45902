//! HTTP route handlers.
//!
//! | Method | Path              | Description                              |
//! |--------|-------------------|------------------------------------------|
//! | GET    | `/healthz`        | Liveness probe, fixed `OK` body          |
//! | GET    | `/version`        | `{"version": "<crate version>"}`         |
//! | GET    | `/nodes?org=<a>`  | Node names via the knife fallback chain  |

pub mod health;
pub mod nodes;
pub mod version;

use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

use crate::AppState;

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health::health))
        .route("/version", get(version::version))
        .route("/nodes", get(nodes::list_nodes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
