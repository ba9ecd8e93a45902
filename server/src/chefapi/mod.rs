//! Chef Infra Server API access.
//!
//! [`InventoryClient`] is the capability every tool and route talks to: one
//! method per resource type, each returning a value or a [`ClientError`].
//! [`ChefClient`] is the production implementation over `reqwest`, signing
//! each request with [`RequestSigner`].
//!
//! [`NodeLister`] is split out on its own so the node fallback chain can be
//! fed anything that lists nodes, including test stubs.

mod client;
mod signing;

pub use client::{ChefClient, ChefClientFactory};
pub use signing::{canonical_request, load_key_material, RequestSigner, SERVER_API_VERSION};

#[cfg(test)]
pub(crate) use signing::TEST_KEY_PEM;

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

/// Errors returned by inventory client methods and client construction.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Transport error (connection refused, timeout, DNS failure, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// The server returned a non-2xx HTTP status.
    #[error("Chef server error (HTTP {status}): {message}")]
    Status { status: u16, message: String },
    /// The response body was not what the endpoint documents.
    #[error("Protocol error: {0}")]
    Protocol(String),
    /// Private key could not be read or parsed.
    #[error("Key error: {0}")]
    Key(String),
    /// The base URL could not be used to build request URLs.
    #[error("Invalid endpoint '{url}': {reason}")]
    Endpoint { url: String, reason: String },
}

impl ClientError {
    /// Returns `true` if the error is an HTTP 404 Not Found response.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::Status { status: 404, .. })
    }
}

/// Accumulated result of a search across all pages.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchResult {
    pub total: u64,
    pub start: u64,
    pub rows: Vec<Value>,
}

/// Anything that can list node names.
#[async_trait]
pub trait NodeLister: Send + Sync {
    async fn list_nodes(&self) -> Result<Vec<String>, ClientError>;
}

/// One method per upstream resource type.
///
/// Org-scoped operations act on the organization the client was built for;
/// user operations only make sense on a root (server-scope) client.
#[async_trait]
pub trait InventoryClient: NodeLister {
    /// Base endpoint all requests are resolved against (with trailing slash).
    fn base_url(&self) -> &str;

    async fn get_node(&self, name: &str) -> Result<Value, ClientError>;
    async fn list_roles(&self) -> Result<Vec<String>, ClientError>;
    async fn get_role(&self, name: &str) -> Result<Value, ClientError>;
    async fn list_users(&self) -> Result<Vec<String>, ClientError>;
    async fn get_user(&self, name: &str) -> Result<Value, ClientError>;
    async fn list_cookbooks(&self) -> Result<Vec<String>, ClientError>;
    async fn get_cookbook(&self, name: &str) -> Result<Value, ClientError>;
    async fn list_data_bags(&self) -> Result<Vec<String>, ClientError>;
    async fn list_data_bag_items(&self, bag: &str) -> Result<Vec<String>, ClientError>;
    async fn get_data_bag_item(&self, bag: &str, item: &str) -> Result<Value, ClientError>;
    async fn list_environments(&self) -> Result<Vec<String>, ClientError>;
    async fn get_environment(&self, name: &str) -> Result<Value, ClientError>;
    async fn search(&self, index: &str, query: &str) -> Result<SearchResult, ClientError>;
    async fn partial_search(
        &self,
        index: &str,
        query: &str,
        keys: &HashMap<String, Vec<String>>,
    ) -> Result<SearchResult, ClientError>;
}
