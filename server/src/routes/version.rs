use axum::Json;
use serde_json::{json, Value};

/// `GET /version` — build version.
pub async fn version() -> Json<Value> {
    Json(json!({ "version": env!("CARGO_PKG_VERSION") }))
}
