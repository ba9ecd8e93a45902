//! In-memory collaborators for the dispatcher and tool tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use chef_mcp::chefapi::{ClientError, InventoryClient, NodeLister, SearchResult};
use chef_mcp::knife::{KnifeError, ToolRunner};
use chef_mcp::nodes::FallbackNodeLister;
use chef_mcp::orgs::{ClientFactory, OrgAliases, OrgClientCache, OrgResolver};

use crate::tools::ToolContext;

/// Echoes its base URL into every object it returns.
pub struct StubInventory {
    base_url: String,
    node_failure: Option<String>,
}

impl StubInventory {
    pub const ROOT_URL: &'static str = "https://chef.example.com/";

    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            node_failure: None,
        }
    }

    fn object(&self, name: &str) -> Value {
        json!({ "name": name, "base_url": self.base_url })
    }
}

#[async_trait]
impl NodeLister for StubInventory {
    async fn list_nodes(&self) -> Result<Vec<String>, ClientError> {
        match &self.node_failure {
            Some(message) => Err(ClientError::Status {
                status: 500,
                message: message.clone(),
            }),
            None => Ok(vec!["web1".to_string(), "web2".to_string()]),
        }
    }
}

#[async_trait]
impl InventoryClient for StubInventory {
    fn base_url(&self) -> &str {
        &self.base_url
    }
    async fn get_node(&self, name: &str) -> Result<Value, ClientError> {
        Ok(self.object(name))
    }
    async fn list_roles(&self) -> Result<Vec<String>, ClientError> {
        Ok(vec!["base".to_string()])
    }
    async fn get_role(&self, name: &str) -> Result<Value, ClientError> {
        Ok(self.object(name))
    }
    async fn list_users(&self) -> Result<Vec<String>, ClientError> {
        Ok(vec!["alice".to_string()])
    }
    async fn get_user(&self, name: &str) -> Result<Value, ClientError> {
        Ok(self.object(name))
    }
    async fn list_cookbooks(&self) -> Result<Vec<String>, ClientError> {
        Ok(vec!["nginx".to_string()])
    }
    async fn get_cookbook(&self, name: &str) -> Result<Value, ClientError> {
        Ok(self.object(name))
    }
    async fn list_data_bags(&self) -> Result<Vec<String>, ClientError> {
        Ok(vec!["secrets".to_string()])
    }
    async fn list_data_bag_items(&self, _bag: &str) -> Result<Vec<String>, ClientError> {
        Ok(vec!["db".to_string()])
    }
    async fn get_data_bag_item(&self, _bag: &str, item: &str) -> Result<Value, ClientError> {
        Ok(self.object(item))
    }
    async fn list_environments(&self) -> Result<Vec<String>, ClientError> {
        Ok(vec!["_default".to_string()])
    }
    async fn get_environment(&self, name: &str) -> Result<Value, ClientError> {
        Ok(self.object(name))
    }
    async fn search(&self, _index: &str, _query: &str) -> Result<SearchResult, ClientError> {
        Ok(SearchResult {
            total: 1,
            start: 0,
            rows: vec![self.object("web1")],
        })
    }
    async fn partial_search(
        &self,
        _index: &str,
        _query: &str,
        keys: &HashMap<String, Vec<String>>,
    ) -> Result<SearchResult, ClientError> {
        Ok(SearchResult {
            total: 1,
            start: 0,
            rows: vec![json!(keys)],
        })
    }
}

/// Builds [`StubInventory`] clients, or fails the way it was told to.
#[derive(Default)]
pub struct StubFactory {
    build_failure: Option<String>,
    node_failure: Option<String>,
}

impl StubFactory {
    /// Every build fails with a key error carrying `message`.
    pub fn failing(message: &str) -> Self {
        Self {
            build_failure: Some(message.to_string()),
            ..Self::default()
        }
    }

    /// Builds succeed but node listing fails with `message`.
    pub fn failing_nodes(message: &str) -> Self {
        Self {
            node_failure: Some(message.to_string()),
            ..Self::default()
        }
    }
}

impl ClientFactory for StubFactory {
    fn build(&self, base_url: &str) -> Result<Arc<dyn InventoryClient>, ClientError> {
        if let Some(message) = &self.build_failure {
            return Err(ClientError::Key(message.clone()));
        }
        Ok(Arc::new(StubInventory {
            base_url: base_url.to_string(),
            node_failure: self.node_failure.clone(),
        }))
    }
}

/// Counts invocations; prints one node unless built with [`CountingRunner::failing`].
#[derive(Default)]
pub struct CountingRunner {
    pub calls: AtomicUsize,
    failure: Option<String>,
}

impl CountingRunner {
    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Self::default()
        }
    }
}

#[async_trait]
impl ToolRunner for CountingRunner {
    async fn run(&self, _args: &[&str]) -> Result<String, KnifeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.failure {
            Some(message) => Err(KnifeError::Failed {
                bin: "knife".to_string(),
                status: "exit status: 1".to_string(),
                output: message.clone(),
            }),
            None => Ok("knife-node\n".to_string()),
        }
    }
}

/// Tool context over stub clients, plus the knife runner for call counting.
pub fn context(
    alias_spec: &str,
    default_alias: Option<&str>,
    fallback: bool,
) -> (ToolContext, Arc<CountingRunner>) {
    context_with(
        alias_spec,
        default_alias,
        fallback,
        StubFactory::default(),
        CountingRunner::default(),
    )
}

/// [`context`] with a chosen factory and knife runner.
pub fn context_with(
    alias_spec: &str,
    default_alias: Option<&str>,
    fallback: bool,
    factory: StubFactory,
    runner: CountingRunner,
) -> (ToolContext, Arc<CountingRunner>) {
    let aliases = Arc::new(OrgAliases::from_spec(
        alias_spec,
        default_alias.map(String::from),
    ));
    let cache = OrgClientCache::new(StubInventory::ROOT_URL, Arc::new(factory));
    let resolver = Arc::new(OrgResolver::new(aliases, cache));
    let runner = Arc::new(runner);
    let nodes = Arc::new(FallbackNodeLister::new(runner.clone(), fallback));
    let root: Arc<dyn InventoryClient> = Arc::new(StubInventory::new(StubInventory::ROOT_URL));
    (ToolContext::new(resolver, root, nodes), runner)
}
