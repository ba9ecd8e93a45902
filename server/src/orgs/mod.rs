//! Organization resolution.
//!
//! Callers name an organization by alias (or not at all). [`OrgResolver`]
//! turns that into a real organization name via the [`OrgAliases`] table and
//! hands back the shared client for it from the [`OrgClientCache`].
//!
//! ## Resolution rules
//!
//! 1. An empty alias is replaced by the configured default alias; with no
//!    default the call fails.
//! 2. With no alias table at all, the alias is used literally as the
//!    organization name (single-org deployments).
//! 3. Otherwise the alias must be present in the table.

mod aliases;
mod cache;

pub use aliases::{parse_alias_spec, OrgAliases};
pub use cache::{ClientFactory, OrgClientCache};

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::chefapi::{ChefClientFactory, ClientError, InventoryClient};

/// Why an alias could not be turned into a usable client.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("org alias required (no default configured)")]
    NoDefault,
    #[error("unknown org alias '{0}'")]
    UnknownAlias(String),
    #[error("organization name required")]
    EmptyOrganization,
    #[error("failed to initialize client for org '{org}': {source}")]
    Client {
        org: String,
        #[source]
        source: ClientError,
    },
}

impl ResolveError {
    /// Caller mistakes, as opposed to server-side failures.
    pub fn is_caller_error(&self) -> bool {
        !matches!(self, ResolveError::Client { .. })
    }
}

/// Alias table plus client cache.
pub struct OrgResolver {
    aliases: Arc<OrgAliases>,
    cache: OrgClientCache,
}

impl OrgResolver {
    pub fn new(aliases: Arc<OrgAliases>, cache: OrgClientCache) -> Self {
        Self { aliases, cache }
    }

    /// Resolver backed by real Chef clients built from shared credentials.
    ///
    /// Fails when the key cannot be read or parsed.
    pub fn with_credentials(
        aliases: Arc<OrgAliases>,
        root_url: &str,
        user: &str,
        key_path_or_inline: &str,
    ) -> Result<Self, ClientError> {
        let factory = Arc::new(ChefClientFactory::new(user, key_path_or_inline)?);
        Ok(Self::new(aliases, OrgClientCache::new(root_url, factory)))
    }

    pub fn aliases(&self) -> &OrgAliases {
        &self.aliases
    }

    /// Map an alias (empty for "use the default") to an organization name.
    pub fn resolve(&self, alias: &str) -> Result<String, ResolveError> {
        let alias = if alias.is_empty() {
            let default = self.aliases.default_alias().ok_or(ResolveError::NoDefault)?;
            tracing::info!(default_alias = %default, "org alias empty; using default alias");
            default
        } else {
            alias
        };

        if self.aliases.is_empty() {
            tracing::debug!(alias, "no alias map configured; treating alias as org name");
            return Ok(alias.to_string());
        }

        let org = self
            .aliases
            .get(alias)
            .ok_or_else(|| ResolveError::UnknownAlias(alias.to_string()))?;
        tracing::debug!(alias, org, "resolved org alias");
        Ok(org.to_string())
    }

    /// Shared client for an organization name (not an alias).
    pub async fn client_for(&self, org: &str) -> Result<Arc<dyn InventoryClient>, ResolveError> {
        self.cache.get(org).await
    }

    /// [`resolve`](Self::resolve) then [`client_for`](Self::client_for).
    pub async fn resolve_client(
        &self,
        alias: Option<&str>,
    ) -> Result<(String, Arc<dyn InventoryClient>), ResolveError> {
        let alias = alias.unwrap_or("");
        let org = self.resolve(alias).inspect_err(|e| {
            tracing::warn!(alias, error = %e, "org resolution failed");
        })?;
        let client = self.client_for(&org).await?;
        Ok((org, client))
    }

    /// Currently cached `org -> base URL` entries.
    pub async fn snapshot(&self) -> BTreeMap<String, String> {
        self.cache.snapshot().await
    }
}
