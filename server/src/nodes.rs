//! Node listing with a `knife` fallback.
//!
//! The API client is asked first. Its answer is final whenever the call
//! succeeds, even with zero nodes. Only when there is no client, or the call
//! failed, does `knife node list` run. If that fails too, one error carries
//! both messages. With the fallback disabled, an absent or failing client
//! yields an empty list rather than an error.

use std::sync::Arc;

use crate::chefapi::NodeLister;
use crate::knife::ToolRunner;

/// Arguments for the fallback invocation.
pub const KNIFE_NODE_LIST: [&str; 2] = ["node", "list"];

#[derive(Debug, thiserror::Error)]
pub enum NodeListError {
    #[error("{}", fallback_message(.primary.as_deref(), .secondary))]
    FallbackExhausted {
        primary: Option<String>,
        secondary: String,
    },
}

fn fallback_message(primary: Option<&str>, secondary: &str) -> String {
    let mut msg = "knife failed".to_string();
    if let Some(p) = primary {
        msg.push_str("; apiErr=");
        msg.push_str(p);
    }
    msg.push_str(" knifeErr=");
    msg.push_str(secondary);
    msg
}

/// API-first node lister with an optional `knife` fallback.
pub struct FallbackNodeLister {
    runner: Arc<dyn ToolRunner>,
    fallback_enabled: bool,
}

impl FallbackNodeLister {
    pub fn new(runner: Arc<dyn ToolRunner>, fallback_enabled: bool) -> Self {
        Self {
            runner,
            fallback_enabled,
        }
    }

    /// List node names from `primary`, falling back to `knife node list`.
    pub async fn list_nodes<L>(&self, primary: Option<&L>) -> Result<Vec<String>, NodeListError>
    where
        L: NodeLister + ?Sized,
    {
        let mut api_err = None;
        if let Some(client) = primary {
            match client.list_nodes().await {
                Ok(nodes) => {
                    tracing::debug!(count = nodes.len(), "node list from api");
                    return Ok(nodes);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "api node listing failed");
                    api_err = Some(e.to_string());
                }
            }
        }

        if !self.fallback_enabled {
            tracing::debug!("knife fallback disabled; returning empty node list");
            return Ok(Vec::new());
        }

        match self.runner.run(&KNIFE_NODE_LIST).await {
            Ok(out) => {
                let nodes = parse_node_lines(&out);
                tracing::info!(count = nodes.len(), "node list from knife fallback");
                Ok(nodes)
            }
            Err(e) => Err(NodeListError::FallbackExhausted {
                primary: api_err,
                secondary: e.to_string(),
            }),
        }
    }
}

/// One node per non-empty line of `knife node list` output.
pub fn parse_node_lines(output: &str) -> Vec<String> {
    output
        .replace("\r\n", "\n")
        .trim()
        .split('\n')
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chefapi::InventoryClient;
    use crate::test_support::{StubClient, StubRunner};
    use std::sync::atomic::Ordering;

    fn lister(runner: &Arc<StubRunner>, enabled: bool) -> FallbackNodeLister {
        FallbackNodeLister::new(runner.clone(), enabled)
    }

    #[tokio::test]
    async fn api_success_skips_knife() {
        let runner = Arc::new(StubRunner::ok("k1\n"));
        let api = StubClient::new("https://chef/organizations/a/", vec!["a", "b"]);
        let nodes = lister(&runner, true).list_nodes(Some(&api)).await.unwrap();
        assert_eq!(nodes, vec!["a", "b"]);
        assert_eq!(api.node_calls.load(Ordering::SeqCst), 1);
        assert_eq!(runner.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn api_empty_success_is_final() {
        let runner = Arc::new(StubRunner::ok("k1\n"));
        let api = StubClient::new("https://chef/organizations/a/", vec![]);
        let nodes = lister(&runner, true).list_nodes(Some(&api)).await.unwrap();
        assert!(nodes.is_empty());
        assert_eq!(runner.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn api_failure_uses_knife_lines() {
        let runner = Arc::new(StubRunner::ok("x\n\ny\n"));
        let api = StubClient::failing("https://chef/organizations/a/", "boom");
        let nodes = lister(&runner, true).list_nodes(Some(&api)).await.unwrap();
        assert_eq!(nodes, vec!["x", "y"]);
        assert_eq!(api.node_calls.load(Ordering::SeqCst), 1);
        assert_eq!(*runner.last_args.lock().unwrap(), vec!["node", "list"]);
    }

    #[tokio::test]
    async fn no_api_uses_knife() {
        let runner = Arc::new(StubRunner::ok("k1\r\nk2\r\n"));
        let nodes = lister(&runner, true)
            .list_nodes(None::<&dyn NodeLister>)
            .await
            .unwrap();
        assert_eq!(nodes, vec!["k1", "k2"]);
        assert_eq!(runner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn both_failures_are_reported() {
        let runner = Arc::new(StubRunner::failing("knife fail"));
        let api = StubClient::failing("https://chef/organizations/a/", "api fail");
        let err = lister(&runner, true)
            .list_nodes(Some(&api))
            .await
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("api fail"), "{msg}");
        assert!(msg.contains("knife fail"), "{msg}");
        assert!(msg.find("apiErr=").unwrap() < msg.find("knifeErr=").unwrap());
    }

    #[tokio::test]
    async fn knife_failure_without_api_has_no_api_part() {
        let runner = Arc::new(StubRunner::failing("knife fail"));
        let err = lister(&runner, true)
            .list_nodes(None::<&dyn NodeLister>)
            .await
            .unwrap_err();
        let msg = err.to_string();
        assert!(!msg.contains("apiErr="));
        assert!(msg.contains("knifeErr="));
    }

    #[tokio::test]
    async fn disabled_fallback_degrades_to_empty() {
        let runner = Arc::new(StubRunner::ok("k1\n"));
        let api = StubClient::failing("https://chef/organizations/a/", "api fail");
        let l = lister(&runner, false);
        assert!(l.list_nodes(Some(&api)).await.unwrap().is_empty());
        assert_eq!(api.node_calls.load(Ordering::SeqCst), 1);
        assert!(l
            .list_nodes(None::<&dyn NodeLister>)
            .await
            .unwrap()
            .is_empty());
        assert_eq!(runner.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn works_through_inventory_trait_object() {
        let runner = Arc::new(StubRunner::ok(""));
        let api: Arc<dyn InventoryClient> =
            Arc::new(StubClient::new("https://chef/organizations/a/", vec!["n1"]));
        let nodes = lister(&runner, true)
            .list_nodes(Some(api.as_ref()))
            .await
            .unwrap();
        assert_eq!(nodes, vec!["n1"]);
    }

    #[test]
    fn parse_lines_trims_block_and_drops_blanks() {
        assert_eq!(parse_node_lines("\n  a\n\nb\r\n\r\n"), vec!["a", "b"]);
        assert_eq!(parse_node_lines("web1\n  web2  \n"), vec!["web1", "  web2"]);
        assert!(parse_node_lines("").is_empty());
        assert!(parse_node_lines("\n\r\n").is_empty());
    }
}
