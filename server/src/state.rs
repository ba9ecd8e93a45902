//! Shared application state passed to every handler via Axum's `State` extractor.

use std::sync::Arc;

use crate::chefapi::ClientError;
use crate::config::{Config, ServeMode};
use crate::knife::KnifeRunner;
use crate::nodes::FallbackNodeLister;
use crate::orgs::OrgResolver;

/// Shared application state for the HTTP server.
#[derive(Clone)]
pub struct AppState {
    /// Alias resolution and per-org clients. `None` in knife-only mode.
    pub resolver: Option<Arc<OrgResolver>>,
    /// API-first node listing with the knife fallback.
    pub nodes: Arc<FallbackNodeLister>,
}

impl AppState {
    pub fn new(resolver: Option<Arc<OrgResolver>>, nodes: Arc<FallbackNodeLister>) -> Self {
        Self { resolver, nodes }
    }

    /// Wire up the production collaborators for a validated configuration.
    ///
    /// An unusable key drops to knife-only serving when the fallback is
    /// enabled and is an error otherwise.
    pub fn from_config(config: &Config, mode: ServeMode) -> Result<Self, ClientError> {
        let resolver = match mode {
            ServeMode::Api => match OrgResolver::with_credentials(
                Arc::new(config.aliases()),
                &config.chef.server_url,
                &config.chef.user,
                &config.chef.key_path,
            ) {
                Ok(resolver) => Some(Arc::new(resolver)),
                Err(e) if config.knife.fallback => {
                    tracing::warn!(error = %e, "Chef API client init failed; relying on knife fallback");
                    None
                }
                Err(e) => return Err(e),
            },
            ServeMode::KnifeOnly => None,
        };
        let nodes = Arc::new(FallbackNodeLister::new(
            Arc::new(KnifeRunner::new(config.knife.bin.clone())),
            config.knife.fallback,
        ));
        Ok(Self::new(resolver, nodes))
    }
}
