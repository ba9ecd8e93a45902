//! Node listing endpoint.
//!
//! `GET /nodes` answers with a JSON array of node names. The optional `org`
//! query parameter is an alias resolved like every other caller-supplied
//! alias; without it the default alias applies. In knife-only mode (no API
//! credentials) the alias is ignored and knife answers directly.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct NodesQuery {
    pub org: Option<String>,
}

/// `GET /nodes` — node names for one organization.
///
/// Unknown aliases (and a missing alias with no default) are 400s. A client
/// that cannot be constructed for the requested org is a 500 naming the org;
/// knife is not consulted since it cannot answer for a specific org. Total
/// failure of the fallback chain is a 500 carrying the combined error text.
pub async fn list_nodes(
    State(state): State<AppState>,
    Query(query): Query<NodesQuery>,
) -> Result<Json<Vec<String>>, (StatusCode, String)> {
    let client = match &state.resolver {
        None => None,
        Some(resolver) => match resolver.resolve_client(query.org.as_deref()).await {
            Ok((org, client)) => {
                tracing::debug!(org = %org, "listing nodes");
                Some(client)
            }
            Err(e) if e.is_caller_error() => {
                return Err((StatusCode::BAD_REQUEST, e.to_string()));
            }
            Err(e) => {
                tracing::error!(error = %e, "org client unavailable");
                return Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()));
            }
        },
    };

    state
        .nodes
        .list_nodes(client.as_deref())
        .await
        .map(Json)
        .map_err(|e| {
            tracing::error!(error = %e, "node listing failed");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        })
}
