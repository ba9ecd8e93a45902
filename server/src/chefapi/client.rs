//! HTTP client for Chef Infra Server REST endpoints.
//!
//! [`ChefClient`] wraps `reqwest::Client` and provides typed methods for each
//! endpoint the tools need. Object endpoints return `serde_json::Value`; list
//! endpoints return sorted names.
//!
//! ## Authentication
//!
//! Every request is signed with the client's RSA key (see
//! [`RequestSigner`](super::RequestSigner)).
//!
//! ## Error handling
//!
//! Non-2xx responses are parsed for an `error` field in the JSON body (Chef
//! sends `{"error": ["message"]}`). If parsing fails, the raw body is returned
//! as the error message.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Method, Url};
use serde_json::Value;

use super::signing::{load_key_material, RequestSigner};
use super::{ClientError, InventoryClient, NodeLister, SearchResult};
use crate::orgs::ClientFactory;

/// Rows requested per search page.
const SEARCH_PAGE_ROWS: u64 = 1000;

/// Chef client version advertised to the server.
const CHEF_VERSION: &str = "18.4.2";

/// HTTP client scoped to one Chef endpoint (root or `/organizations/<org>`).
pub struct ChefClient {
    http: reqwest::Client,
    base_url: Url,
    base_url_str: String,
    signer: RequestSigner,
}

impl ChefClient {
    /// Create a client for `base_url` authenticating as `user`.
    ///
    /// `key_path_or_inline` is either a path to the PEM private key or the PEM
    /// contents themselves.
    pub fn new(user: &str, key_path_or_inline: &str, base_url: &str) -> Result<Self, ClientError> {
        let pem = load_key_material(key_path_or_inline)?;
        let signer = RequestSigner::from_pem(user, &pem)?;
        Self::with_signer(signer, base_url)
    }

    /// Create a client from an already-parsed signer.
    pub fn with_signer(signer: RequestSigner, base_url: &str) -> Result<Self, ClientError> {
        // Trailing slash so relative joins stay under the org path
        let base_url_str = ensure_trailing_slash(base_url);
        let base_url = Url::parse(&base_url_str).map_err(|e| ClientError::Endpoint {
            url: base_url_str.clone(),
            reason: e.to_string(),
        })?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::Endpoint {
                url: base_url_str,
                reason: "URL cannot be a base".to_string(),
            });
        }

        let mut default_headers = reqwest::header::HeaderMap::new();
        default_headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/json"),
        );
        default_headers.insert(
            reqwest::header::HeaderName::from_static("x-chef-version"),
            reqwest::header::HeaderValue::from_static(CHEF_VERSION),
        );
        let http = reqwest::Client::builder()
            .default_headers(default_headers)
            .user_agent(concat!("chef-mcp/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        tracing::debug!(base_url = %base_url_str, user = %signer.user(), "chef client initialized");
        Ok(Self {
            http,
            base_url,
            base_url_str,
            signer,
        })
    }

    /// Build an absolute URL from path segments (each segment is percent-encoded).
    fn url(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ClientError::Endpoint {
                url: self.base_url_str.clone(),
                reason: "URL cannot be a base".to_string(),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn request(
        &self,
        method: Method,
        url: Url,
        body: Option<Vec<u8>>,
    ) -> Result<Value, ClientError> {
        let payload = body.unwrap_or_default();
        let headers = self
            .signer
            .sign(method.as_str(), url.path(), &payload, Utc::now());

        tracing::debug!(%method, url = %url, "chef request");
        let mut req = self.http.request(method, url);
        for (name, value) in headers {
            req = req.header(name, value);
        }
        if !payload.is_empty() {
            req = req
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(payload);
        }
        let resp = req.send().await?;
        Self::handle_response(resp).await
    }

    async fn get(&self, segments: &[&str]) -> Result<Value, ClientError> {
        let url = self.url(segments)?;
        self.request(Method::GET, url, None).await
    }

    async fn list(&self, segments: &[&str]) -> Result<Vec<String>, ClientError> {
        let value = self.get(segments).await?;
        object_keys(&value)
    }

    /// Run a search, following pages until `total` rows are collected.
    async fn search_pages(
        &self,
        index: &str,
        query: &str,
        keys: Option<&HashMap<String, Vec<String>>>,
    ) -> Result<SearchResult, ClientError> {
        let body = keys
            .map(serde_json::to_vec)
            .transpose()
            .map_err(|e| ClientError::Protocol(format!("encode partial search keys: {e}")))?;
        let method = if body.is_some() {
            Method::POST
        } else {
            Method::GET
        };

        let mut result = SearchResult::default();
        let mut start = 0u64;
        loop {
            let mut url = self.url(&["search", index])?;
            url.query_pairs_mut()
                .append_pair("q", query)
                .append_pair("start", &start.to_string())
                .append_pair("rows", &SEARCH_PAGE_ROWS.to_string());

            let page = self.request(method.clone(), url, body.clone()).await?;
            let total = page["total"]
                .as_u64()
                .ok_or_else(|| ClientError::Protocol("search response missing 'total'".into()))?;
            let rows = match page.get("rows") {
                Some(Value::Array(rows)) => rows.clone(),
                _ => {
                    return Err(ClientError::Protocol(
                        "search response missing 'rows'".into(),
                    ))
                }
            };

            if start == 0 {
                result.start = page["start"].as_u64().unwrap_or(0);
            }
            result.total = total;
            let fetched = rows.len() as u64;
            result.rows.extend(rows);
            start += fetched;
            if fetched == 0 || result.rows.len() as u64 >= total {
                break;
            }
        }
        tracing::debug!(index, query, total = result.total, rows = result.rows.len(), "search complete");
        Ok(result)
    }

    /// JSON body on success, [`ClientError::Status`] with the server's message otherwise.
    async fn handle_response(resp: reqwest::Response) -> Result<Value, ClientError> {
        let status = resp.status();
        let body = resp.text().await?;

        if status.is_success() {
            serde_json::from_str(&body)
                .map_err(|e| ClientError::Protocol(format!("Invalid JSON from server: {e}")))
        } else {
            Err(ClientError::Status {
                status: status.as_u16(),
                message: error_message(&body),
            })
        }
    }
}

#[async_trait]
impl NodeLister for ChefClient {
    async fn list_nodes(&self) -> Result<Vec<String>, ClientError> {
        self.list(&["nodes"]).await
    }
}

#[async_trait]
impl InventoryClient for ChefClient {
    fn base_url(&self) -> &str {
        &self.base_url_str
    }

    async fn get_node(&self, name: &str) -> Result<Value, ClientError> {
        self.get(&["nodes", name]).await
    }

    async fn list_roles(&self) -> Result<Vec<String>, ClientError> {
        self.list(&["roles"]).await
    }

    async fn get_role(&self, name: &str) -> Result<Value, ClientError> {
        self.get(&["roles", name]).await
    }

    async fn list_users(&self) -> Result<Vec<String>, ClientError> {
        let value = self.get(&["users"]).await?;
        // Older servers answer with [{"user": {"username": ..}}]
        if let Value::Array(entries) = &value {
            let mut names: Vec<String> = entries
                .iter()
                .filter_map(|e| e["user"]["username"].as_str().map(String::from))
                .collect();
            names.sort();
            return Ok(names);
        }
        object_keys(&value)
    }

    async fn get_user(&self, name: &str) -> Result<Value, ClientError> {
        self.get(&["users", name]).await
    }

    async fn list_cookbooks(&self) -> Result<Vec<String>, ClientError> {
        self.list(&["cookbooks"]).await
    }

    async fn get_cookbook(&self, name: &str) -> Result<Value, ClientError> {
        self.get(&["cookbooks", name]).await
    }

    async fn list_data_bags(&self) -> Result<Vec<String>, ClientError> {
        self.list(&["data"]).await
    }

    async fn list_data_bag_items(&self, bag: &str) -> Result<Vec<String>, ClientError> {
        self.list(&["data", bag]).await
    }

    async fn get_data_bag_item(&self, bag: &str, item: &str) -> Result<Value, ClientError> {
        self.get(&["data", bag, item]).await
    }

    async fn list_environments(&self) -> Result<Vec<String>, ClientError> {
        self.list(&["environments"]).await
    }

    async fn get_environment(&self, name: &str) -> Result<Value, ClientError> {
        self.get(&["environments", name]).await
    }

    async fn search(&self, index: &str, query: &str) -> Result<SearchResult, ClientError> {
        self.search_pages(index, query, None).await
    }

    async fn partial_search(
        &self,
        index: &str,
        query: &str,
        keys: &HashMap<String, Vec<String>>,
    ) -> Result<SearchResult, ClientError> {
        self.search_pages(index, query, Some(keys)).await
    }
}

/// Builds [`ChefClient`]s from process-wide credentials.
///
/// The key is read and parsed once, up front, so building a client never
/// touches the filesystem.
pub struct ChefClientFactory {
    signer: RequestSigner,
}

impl ChefClientFactory {
    pub fn new(user: &str, key_path_or_inline: &str) -> Result<Self, ClientError> {
        let pem = load_key_material(key_path_or_inline)?;
        Ok(Self::from_signer(RequestSigner::from_pem(user, &pem)?))
    }

    pub fn from_signer(signer: RequestSigner) -> Self {
        Self { signer }
    }
}

impl ClientFactory for ChefClientFactory {
    fn build(&self, base_url: &str) -> Result<Arc<dyn InventoryClient>, ClientError> {
        let client = ChefClient::with_signer(self.signer.clone(), base_url)?;
        Ok(Arc::new(client))
    }
}

/// Names from a Chef list response (`{"name": "url", ...}`), sorted.
fn object_keys(value: &Value) -> Result<Vec<String>, ClientError> {
    let map = value
        .as_object()
        .ok_or_else(|| ClientError::Protocol(format!("expected JSON object, got {value}")))?;
    let mut names: Vec<String> = map.keys().cloned().collect();
    names.sort();
    Ok(names)
}

/// Extract a readable message from a Chef error body.
fn error_message(body: &str) -> String {
    match serde_json::from_str::<Value>(body) {
        Ok(v) => match &v["error"] {
            Value::String(s) => s.clone(),
            Value::Array(items) => items
                .iter()
                .map(|i| i.as_str().map_or_else(|| i.to_string(), String::from))
                .collect::<Vec<_>>()
                .join("; "),
            _ => body.to_string(),
        },
        Err(_) => body.to_string(),
    }
}

fn ensure_trailing_slash(s: &str) -> String {
    if s.is_empty() || s.ends_with('/') {
        s.to_string()
    } else {
        format!("{s}/")
    }
}
