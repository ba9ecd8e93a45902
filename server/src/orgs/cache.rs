//! Per-organization client cache.
//!
//! One [`InventoryClient`] per organization for the life of the process.
//! Entries are created on first use and never evicted or refreshed; picking
//! up rotated credentials or a moved endpoint takes a restart.
//!
//! The lookup, the construction and the insert all happen under one lock, so
//! concurrent first use of an organization builds exactly one client. A
//! failed construction is not cached; the next call retries.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tokio::sync::Mutex;

use super::ResolveError;
use crate::chefapi::{ClientError, InventoryClient};

/// Builds a client scoped to one base endpoint.
pub trait ClientFactory: Send + Sync {
    fn build(&self, base_url: &str) -> Result<Arc<dyn InventoryClient>, ClientError>;
}

struct CachedClient {
    client: Arc<dyn InventoryClient>,
    base_url: String,
}

/// Lazily built, shared clients keyed by organization name.
pub struct OrgClientCache {
    root_url: String,
    factory: Arc<dyn ClientFactory>,
    clients: Mutex<HashMap<String, CachedClient>>,
}

impl OrgClientCache {
    /// `root_url` is the server root, without any `/organizations/<org>` part.
    pub fn new(root_url: &str, factory: Arc<dyn ClientFactory>) -> Self {
        Self {
            root_url: root_url.trim_end_matches('/').to_string(),
            factory,
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Endpoint for an organization under the root URL.
    pub fn org_url(&self, org: &str) -> String {
        format!("{}/organizations/{}", self.root_url, org)
    }

    /// Get the cached client for `org` (not an alias), building it on first use.
    pub async fn get(&self, org: &str) -> Result<Arc<dyn InventoryClient>, ResolveError> {
        if org.is_empty() {
            tracing::debug!("org client requested with empty organization");
            return Err(ResolveError::EmptyOrganization);
        }

        let mut clients = self.clients.lock().await;
        if let Some(cached) = clients.get(org) {
            tracing::debug!(org, "org client cache hit");
            return Ok(Arc::clone(&cached.client));
        }

        let org_url = self.org_url(org);
        tracing::debug!(org, org_url = %org_url, root_url = %self.root_url, "creating org client");
        let client = self.factory.build(&org_url).map_err(|source| {
            tracing::warn!(org, error = %source, "org client creation failed");
            ResolveError::Client {
                org: org.to_string(),
                source,
            }
        })?;

        clients.insert(
            org.to_string(),
            CachedClient {
                client: Arc::clone(&client),
                base_url: client.base_url().to_string(),
            },
        );
        Ok(client)
    }

    /// Copy of the current `org -> base URL` mapping.
    pub async fn snapshot(&self) -> BTreeMap<String, String> {
        self.clients
            .lock()
            .await
            .iter()
            .map(|(org, cached)| (org.clone(), cached.base_url.clone()))
            .collect()
    }
}
