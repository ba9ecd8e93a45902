//! Stubs shared by the unit tests in this crate.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::chefapi::{ClientError, InventoryClient, NodeLister, SearchResult};
use crate::knife::{KnifeError, ToolRunner};
use crate::orgs::ClientFactory;

/// In-memory inventory: a fixed node list or a fixed failure.
pub struct StubClient {
    base_url: String,
    nodes: Result<Vec<String>, String>,
    pub node_calls: AtomicUsize,
}

impl StubClient {
    pub fn new(base_url: &str, nodes: Vec<&str>) -> Self {
        Self {
            base_url: base_url.to_string(),
            nodes: Ok(nodes.into_iter().map(String::from).collect()),
            node_calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(base_url: &str, message: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            nodes: Err(message.to_string()),
            node_calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl NodeLister for StubClient {
    async fn list_nodes(&self) -> Result<Vec<String>, ClientError> {
        self.node_calls.fetch_add(1, Ordering::SeqCst);
        self.nodes
            .clone()
            .map_err(|message| ClientError::Status {
                status: 500,
                message,
            })
    }
}

#[async_trait]
impl InventoryClient for StubClient {
    fn base_url(&self) -> &str {
        &self.base_url
    }
    async fn get_node(&self, name: &str) -> Result<Value, ClientError> {
        Ok(json!({ "name": name }))
    }
    async fn list_roles(&self) -> Result<Vec<String>, ClientError> {
        Ok(vec![])
    }
    async fn get_role(&self, name: &str) -> Result<Value, ClientError> {
        Ok(json!({ "name": name }))
    }
    async fn list_users(&self) -> Result<Vec<String>, ClientError> {
        Ok(vec![])
    }
    async fn get_user(&self, name: &str) -> Result<Value, ClientError> {
        Ok(json!({ "username": name }))
    }
    async fn list_cookbooks(&self) -> Result<Vec<String>, ClientError> {
        Ok(vec![])
    }
    async fn get_cookbook(&self, name: &str) -> Result<Value, ClientError> {
        Ok(json!({ "cookbook_name": name }))
    }
    async fn list_data_bags(&self) -> Result<Vec<String>, ClientError> {
        Ok(vec![])
    }
    async fn list_data_bag_items(&self, _bag: &str) -> Result<Vec<String>, ClientError> {
        Ok(vec![])
    }
    async fn get_data_bag_item(&self, _bag: &str, item: &str) -> Result<Value, ClientError> {
        Ok(json!({ "id": item }))
    }
    async fn list_environments(&self) -> Result<Vec<String>, ClientError> {
        Ok(vec![])
    }
    async fn get_environment(&self, name: &str) -> Result<Value, ClientError> {
        Ok(json!({ "name": name }))
    }
    async fn search(&self, _index: &str, _query: &str) -> Result<SearchResult, ClientError> {
        Ok(SearchResult::default())
    }
    async fn partial_search(
        &self,
        _index: &str,
        _query: &str,
        _keys: &HashMap<String, Vec<String>>,
    ) -> Result<SearchResult, ClientError> {
        Ok(SearchResult::default())
    }
}

/// Counts constructions; optionally fails the first few or sleeps while building.
#[derive(Default)]
pub struct CountingFactory {
    pub builds: AtomicUsize,
    fail_first: usize,
    delay: Option<Duration>,
    nodes: Vec<String>,
    node_failure: Option<String>,
}

impl CountingFactory {
    pub fn failing_first(n: usize) -> Self {
        Self {
            fail_first: n,
            ..Self::default()
        }
    }

    pub fn slow() -> Self {
        Self {
            delay: Some(Duration::from_millis(20)),
            ..Self::default()
        }
    }

    pub fn with_nodes(nodes: &[&str]) -> Self {
        Self {
            nodes: nodes.iter().map(|n| (*n).to_string()).collect(),
            ..Self::default()
        }
    }

    /// Builds clients whose node listing fails with `message`.
    pub fn failing_nodes(message: &str) -> Self {
        Self {
            node_failure: Some(message.to_string()),
            ..Self::default()
        }
    }
}

impl ClientFactory for CountingFactory {
    fn build(&self, base_url: &str) -> Result<Arc<dyn InventoryClient>, ClientError> {
        let n = self.builds.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        if n < self.fail_first {
            return Err(ClientError::Key("bad key".to_string()));
        }
        if let Some(message) = &self.node_failure {
            return Ok(Arc::new(StubClient::failing(base_url, message)));
        }
        let nodes = self.nodes.iter().map(String::as_str).collect();
        Ok(Arc::new(StubClient::new(base_url, nodes)))
    }
}

/// Returns canned output (or failure) and counts invocations.
pub struct StubRunner {
    output: Result<String, String>,
    pub calls: AtomicUsize,
    pub last_args: std::sync::Mutex<Vec<String>>,
}

impl StubRunner {
    pub fn ok(output: &str) -> Self {
        Self {
            output: Ok(output.to_string()),
            calls: AtomicUsize::new(0),
            last_args: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            output: Err(message.to_string()),
            calls: AtomicUsize::new(0),
            last_args: std::sync::Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ToolRunner for StubRunner {
    async fn run(&self, args: &[&str]) -> Result<String, KnifeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_args.lock().unwrap() = args.iter().map(|a| (*a).to_string()).collect();
        self.output.clone().map_err(|output| KnifeError::Failed {
            bin: "knife".to_string(),
            status: "exit status: 1".to_string(),
            output,
        })
    }
}
