//! MCP tool definitions and handlers.
//!
//! Each tool is described by a [`ToolDefinition`] (returned by
//! [`definitions`]) and handled by [`ToolContext::call`], which decodes the
//! arguments into the tool's own type, resolves the organization and calls
//! the inventory client.
//!
//! ## Tool categories
//!
//! **Organization tools**: `listOrgAliases`, `listOrgClients`
//!
//! **Org-scoped tools** (optional `org` alias, default alias otherwise):
//! - `listNodes` (API first, knife fallback), `getNode`
//! - `listRoles`, `getRole`, `listCookbooks`, `getCookbook`
//! - `listDataBags`, `listDataBagItems`, `getDataBagItem`
//! - `listEnvironments`, `getEnvironment`, `search`, `partialSearch`
//!
//! **Server-scope tools** (root client): `listUsers`, `getUser`

use std::collections::HashMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::value::RawValue;
use serde_json::{json, Map, Value};

use chef_mcp::chefapi::{ClientError, InventoryClient};
use chef_mcp::nodes::{FallbackNodeLister, NodeListError};
use chef_mcp::orgs::{OrgResolver, ResolveError};

use crate::protocol::{ToolDefinition, INVALID_PARAMS, METHOD_NOT_FOUND, TOOL_ERROR};

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),
    #[error("invalid arguments for {tool}: {source}")]
    InvalidArguments {
        tool: String,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Upstream(#[from] ClientError),
    #[error(transparent)]
    Nodes(#[from] NodeListError),
}

impl ToolError {
    /// JSON-RPC error code for this failure.
    pub fn code(&self) -> i64 {
        match self {
            ToolError::UnknownTool(_) => METHOD_NOT_FOUND,
            ToolError::InvalidArguments { .. } => INVALID_PARAMS,
            ToolError::Resolve(_) | ToolError::Upstream(_) | ToolError::Nodes(_) => TOOL_ERROR,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct OrgArgs {
    #[serde(default)]
    org: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NamedArgs {
    name: String,
    #[serde(default)]
    org: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BagArgs {
    bag: String,
    #[serde(default)]
    org: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BagItemArgs {
    bag: String,
    item: String,
    #[serde(default)]
    org: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchArgs {
    index: String,
    query: String,
    #[serde(default)]
    org: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PartialSearchArgs {
    index: String,
    query: String,
    keys: HashMap<String, Vec<String>>,
    #[serde(default)]
    org: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UserArgs {
    name: String,
}

/// Everything a tool handler needs, passed in at construction.
pub struct ToolContext {
    resolver: Arc<OrgResolver>,
    /// Server-scope client for user endpoints.
    root: Arc<dyn InventoryClient>,
    nodes: Arc<FallbackNodeLister>,
}

impl ToolContext {
    pub fn new(
        resolver: Arc<OrgResolver>,
        root: Arc<dyn InventoryClient>,
        nodes: Arc<FallbackNodeLister>,
    ) -> Self {
        Self {
            resolver,
            root,
            nodes,
        }
    }

    /// Run a tool and return its structured output.
    pub async fn call(&self, name: &str, arguments: Option<&RawValue>) -> Result<Value, ToolError> {
        tracing::debug!(
            tool = name,
            input = arguments.map_or("{}", RawValue::get),
            "tool call start"
        );
        let result = self.dispatch(name, arguments).await;
        match &result {
            Ok(_) => tracing::info!(tool = name, "tool call success"),
            Err(e) => tracing::warn!(tool = name, error = %e, "tool call error"),
        }
        result
    }

    async fn dispatch(&self, name: &str, raw: Option<&RawValue>) -> Result<Value, ToolError> {
        match name {
            "listOrgAliases" => {
                let aliases = self.resolver.aliases();
                let mut out = Map::new();
                out.insert("aliases".into(), json!(aliases.to_sorted()));
                if let Some(default) = aliases.default_alias() {
                    out.insert("default".into(), json!(default));
                }
                Ok(Value::Object(out))
            }
            "listOrgClients" => Ok(json!({ "clients": self.resolver.snapshot().await })),
            "listNodes" => {
                let args: OrgArgs = decode(name, raw)?;
                self.list_nodes(args.org.as_deref()).await
            }
            "getNode" => {
                let args: NamedArgs = decode(name, raw)?;
                let (org, client) = self.org_client(args.org.as_deref()).await?;
                let node = client.get_node(&args.name).await?;
                tracing::info!(org = %org, name = %args.name, "getNode");
                Ok(json!({ "node": node }))
            }
            "listRoles" => {
                let args: OrgArgs = decode(name, raw)?;
                let (org, client) = self.org_client(args.org.as_deref()).await?;
                let roles = client.list_roles().await?;
                tracing::info!(org = %org, count = roles.len(), "listRoles");
                Ok(json!({ "roles": roles }))
            }
            "getRole" => {
                let args: NamedArgs = decode(name, raw)?;
                let (_, client) = self.org_client(args.org.as_deref()).await?;
                Ok(json!({ "role": client.get_role(&args.name).await? }))
            }
            "listUsers" => {
                let users = self.root.list_users().await?;
                tracing::info!(count = users.len(), "listUsers");
                Ok(json!({ "users": users }))
            }
            "getUser" => {
                let args: UserArgs = decode(name, raw)?;
                Ok(json!({ "user": self.root.get_user(&args.name).await? }))
            }
            "listCookbooks" => {
                let args: OrgArgs = decode(name, raw)?;
                let (_, client) = self.org_client(args.org.as_deref()).await?;
                Ok(json!({ "cookbooks": client.list_cookbooks().await? }))
            }
            "getCookbook" => {
                let args: NamedArgs = decode(name, raw)?;
                let (_, client) = self.org_client(args.org.as_deref()).await?;
                Ok(json!({ "cookbook": client.get_cookbook(&args.name).await? }))
            }
            "listDataBags" => {
                let args: OrgArgs = decode(name, raw)?;
                let (_, client) = self.org_client(args.org.as_deref()).await?;
                Ok(json!({ "dataBags": client.list_data_bags().await? }))
            }
            "listDataBagItems" => {
                let args: BagArgs = decode(name, raw)?;
                let (_, client) = self.org_client(args.org.as_deref()).await?;
                let items = client.list_data_bag_items(&args.bag).await?;
                Ok(json!({ "bag": args.bag, "items": items }))
            }
            "getDataBagItem" => {
                let args: BagItemArgs = decode(name, raw)?;
                let (_, client) = self.org_client(args.org.as_deref()).await?;
                Ok(json!({ "item": client.get_data_bag_item(&args.bag, &args.item).await? }))
            }
            "listEnvironments" => {
                let args: OrgArgs = decode(name, raw)?;
                let (_, client) = self.org_client(args.org.as_deref()).await?;
                Ok(json!({ "environments": client.list_environments().await? }))
            }
            "getEnvironment" => {
                let args: NamedArgs = decode(name, raw)?;
                let (_, client) = self.org_client(args.org.as_deref()).await?;
                Ok(json!({ "environment": client.get_environment(&args.name).await? }))
            }
            "search" => {
                let args: SearchArgs = decode(name, raw)?;
                let (org, client) = self.org_client(args.org.as_deref()).await?;
                let res = client.search(&args.index, &args.query).await?;
                tracing::info!(
                    org = %org,
                    index = %args.index,
                    query = %args.query,
                    total = res.total,
                    rows = res.rows.len(),
                    "search"
                );
                Ok(json!(res))
            }
            "partialSearch" => {
                let args: PartialSearchArgs = decode(name, raw)?;
                let (_, client) = self.org_client(args.org.as_deref()).await?;
                let res = client
                    .partial_search(&args.index, &args.query, &args.keys)
                    .await?;
                Ok(json!(res))
            }
            _ => Err(ToolError::UnknownTool(name.to_string())),
        }
    }

    async fn org_client(
        &self,
        alias: Option<&str>,
    ) -> Result<(String, Arc<dyn InventoryClient>), ToolError> {
        Ok(self.resolver.resolve_client(alias).await?)
    }

    /// Node listing goes through the fallback chain once the org's client
    /// exists. Resolution and construction failures are returned as is.
    async fn list_nodes(&self, alias: Option<&str>) -> Result<Value, ToolError> {
        let (org, client) = self.org_client(alias).await?;
        tracing::debug!(org = %org, "listNodes");
        let nodes = self.nodes.list_nodes(Some(&*client)).await?;
        tracing::info!(count = nodes.len(), "listNodes");
        Ok(json!({ "nodes": nodes }))
    }
}

/// Decode tool arguments; absent or `null` arguments decode as `{}`.
fn decode<T: DeserializeOwned>(tool: &str, raw: Option<&RawValue>) -> Result<T, ToolError> {
    let text = match raw.map(RawValue::get) {
        None => "{}",
        Some(t) if t.trim() == "null" => "{}",
        Some(t) => t,
    };
    serde_json::from_str(text).map_err(|source| ToolError::InvalidArguments {
        tool: tool.to_string(),
        source,
    })
}

fn schema(properties: &[(&str, &str, &str)], required: &[&str]) -> Value {
    let props: Map<String, Value> = properties
        .iter()
        .map(|(name, ty, description)| {
            (
                (*name).to_string(),
                json!({ "type": ty, "description": description }),
            )
        })
        .collect();
    json!({
        "type": "object",
        "properties": props,
        "required": required,
    })
}

const ORG: (&str, &str, &str) = (
    "org",
    "string",
    "Organization alias. Omit to use the default alias.",
);

fn tool(name: &'static str, description: &'static str, input_schema: Value) -> ToolDefinition {
    ToolDefinition {
        name,
        description,
        input_schema,
    }
}

/// All tool definitions, in a stable order.
pub fn definitions() -> Vec<ToolDefinition> {
    let bag = ("bag", "string", "Data bag name.");
    let index = (
        "index",
        "string",
        "Search index: node, role, client, environment or a data bag name.",
    );
    let query = ("query", "string", "Chef search query, e.g. `role:web`.");

    vec![
        tool(
            "listOrgAliases",
            "List configured Chef organization aliases and the default alias.",
            schema(&[], &[]),
        ),
        tool(
            "listOrgClients",
            "Show initialized organization clients (org -> base URL).",
            schema(&[], &[]),
        ),
        tool(
            "listNodes",
            "List Chef node names within an organization. Falls back to `knife node list` when the API is unavailable.",
            schema(&[ORG], &[]),
        ),
        tool(
            "getNode",
            "Get a single Chef node by name (org-scoped).",
            schema(&[("name", "string", "Node name."), ORG], &["name"]),
        ),
        tool("listRoles", "List Chef role names (org-scoped).", schema(&[ORG], &[])),
        tool(
            "getRole",
            "Get a single Chef role by name (org-scoped).",
            schema(&[("name", "string", "Role name."), ORG], &["name"]),
        ),
        tool("listUsers", "List Chef user names (server-scope).", schema(&[], &[])),
        tool(
            "getUser",
            "Get a single Chef user by name (server-scope).",
            schema(&[("name", "string", "User name.")], &["name"]),
        ),
        tool(
            "listCookbooks",
            "List cookbook names (org-scoped).",
            schema(&[ORG], &[]),
        ),
        tool(
            "getCookbook",
            "Get a cookbook with its available versions (org-scoped).",
            schema(&[("name", "string", "Cookbook name."), ORG], &["name"]),
        ),
        tool("listDataBags", "List data bag names (org-scoped).", schema(&[ORG], &[])),
        tool(
            "listDataBagItems",
            "List item ids in a data bag (org-scoped).",
            schema(&[bag, ORG], &["bag"]),
        ),
        tool(
            "getDataBagItem",
            "Get a single data bag item (org-scoped).",
            schema(
                &[bag, ("item", "string", "Data bag item id."), ORG],
                &["bag", "item"],
            ),
        ),
        tool(
            "listEnvironments",
            "List environment names (org-scoped).",
            schema(&[ORG], &[]),
        ),
        tool(
            "getEnvironment",
            "Get a single environment by name (org-scoped).",
            schema(&[("name", "string", "Environment name."), ORG], &["name"]),
        ),
        tool(
            "search",
            "Execute a Chef search (org-scoped) and return all matching rows.",
            schema(&[index, query, ORG], &["index", "query"]),
        ),
        tool(
            "partialSearch",
            "Execute a Chef partial search returning only the requested attribute paths.",
            schema(
                &[
                    index,
                    query,
                    (
                        "keys",
                        "object",
                        "Result key -> attribute path, e.g. {\"ip\": [\"ipaddress\"]}.",
                    ),
                    ORG,
                ],
                &["index", "query", "keys"],
            ),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{context, context_with, CountingRunner, StubFactory, StubInventory};
    use std::sync::atomic::Ordering;

    fn raw(s: &str) -> Box<RawValue> {
        RawValue::from_string(s.to_string()).unwrap()
    }

    #[test]
    fn definitions_are_unique_objects() {
        let defs = definitions();
        assert_eq!(defs.len(), 17);
        let mut names: Vec<_> = defs.iter().map(|d| d.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), defs.len());
        for d in &defs {
            assert_eq!(d.input_schema["type"], "object", "{}", d.name);
        }
    }

    #[tokio::test]
    async fn every_defined_tool_is_dispatched() {
        let (ctx, _) = context("qa=qa1", Some("qa"), true);
        for def in definitions() {
            let args = match def.name {
                "getDataBagItem" => r#"{"bag":"b","item":"i"}"#,
                "listDataBagItems" => r#"{"bag":"b"}"#,
                "search" => r#"{"index":"node","query":"*:*"}"#,
                "partialSearch" => r#"{"index":"node","query":"*:*","keys":{"n":["name"]}}"#,
                n if n.starts_with("get") => r#"{"name":"x"}"#,
                _ => "{}",
            };
            let res = ctx.call(def.name, Some(&raw(args))).await;
            assert!(res.is_ok(), "{}: {:?}", def.name, res.err());
        }
    }

    #[tokio::test]
    async fn unknown_tool() {
        let (ctx, _) = context("", None, true);
        let err = ctx.call("deleteEverything", None).await.unwrap_err();
        assert_eq!(err.code(), METHOD_NOT_FOUND);
        assert!(err.to_string().contains("deleteEverything"));
    }

    #[tokio::test]
    async fn missing_required_argument_is_invalid_params() {
        let (ctx, _) = context("qa=qa1", Some("qa"), true);
        let err = ctx.call("getNode", Some(&raw("{}"))).await.unwrap_err();
        assert_eq!(err.code(), INVALID_PARAMS);
    }

    #[tokio::test]
    async fn null_arguments_are_empty() {
        let (ctx, _) = context("qa=qa1", Some("qa"), true);
        assert!(ctx.call("listRoles", Some(&raw("null"))).await.is_ok());
    }

    #[tokio::test]
    async fn alias_errors_are_tool_errors() {
        let (ctx, _) = context("qa=qa1", None, true);
        let err = ctx.call("listRoles", None).await.unwrap_err();
        assert_eq!(err.code(), TOOL_ERROR);
        assert!(err.to_string().contains("no default configured"));

        let err = ctx
            .call("getNode", Some(&raw(r#"{"name":"n","org":"nope"}"#)))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("unknown org alias 'nope'"));
    }

    #[tokio::test]
    async fn list_org_aliases() {
        let (ctx, _) = context("qa=qa1, prod = fireamp_classic", Some("prod"), true);
        let out = ctx.call("listOrgAliases", None).await.unwrap();
        assert_eq!(
            out,
            json!({
                "aliases": { "prod": "fireamp_classic", "qa": "qa1" },
                "default": "prod",
            })
        );
    }

    #[tokio::test]
    async fn org_clients_appear_after_use() {
        let (ctx, _) = context("qa=qa1", Some("qa"), true);
        assert_eq!(
            ctx.call("listOrgClients", None).await.unwrap(),
            json!({ "clients": {} })
        );
        ctx.call("listRoles", None).await.unwrap();
        assert_eq!(
            ctx.call("listOrgClients", None).await.unwrap(),
            json!({ "clients": { "qa1": "https://chef.example.com/organizations/qa1" } })
        );
    }

    #[tokio::test]
    async fn list_nodes_uses_api_first() {
        let (ctx, runner) = context("qa=qa1", Some("qa"), true);
        let out = ctx.call("listNodes", None).await.unwrap();
        assert_eq!(out, json!({ "nodes": ["web1", "web2"] }));
        assert_eq!(runner.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn list_nodes_alias_error_skips_knife() {
        let (ctx, runner) = context("qa=qa1", None, true);
        let err = ctx
            .call("listNodes", Some(&raw(r#"{"org":"nope"}"#)))
            .await
            .unwrap_err();
        assert_eq!(err.code(), TOOL_ERROR);
        assert!(err.to_string().contains("nope"));
        assert_eq!(runner.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn list_nodes_reports_client_construction_failure() {
        let (ctx, runner) = context_with(
            "qa=qa1",
            Some("qa"),
            true,
            StubFactory::failing("bad key"),
            CountingRunner::default(),
        );
        let err = ctx.call("listNodes", None).await.unwrap_err();
        assert_eq!(err.code(), TOOL_ERROR);
        assert!(err.to_string().contains("qa1"), "{err}");
        assert!(err.to_string().contains("bad key"), "{err}");
        assert_eq!(runner.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn list_nodes_falls_back_to_knife_when_api_fails() {
        let (ctx, runner) = context_with(
            "qa=qa1",
            Some("qa"),
            true,
            StubFactory::failing_nodes("api down"),
            CountingRunner::default(),
        );
        let out = ctx.call("listNodes", None).await.unwrap();
        assert_eq!(out, json!({ "nodes": ["knife-node"] }));
        assert_eq!(runner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn list_nodes_exhausted_fallback_carries_both_errors() {
        let (ctx, _) = context_with(
            "qa=qa1",
            Some("qa"),
            true,
            StubFactory::failing_nodes("api down"),
            CountingRunner::failing("knife fail"),
        );
        let err = ctx.call("listNodes", None).await.unwrap_err();
        assert_eq!(err.code(), TOOL_ERROR);
        let msg = err.to_string();
        assert!(msg.contains("apiErr="), "{msg}");
        assert!(msg.contains("api down"), "{msg}");
        assert!(msg.contains("knife fail"), "{msg}");
    }

    #[tokio::test]
    async fn list_nodes_without_fallback_is_empty() {
        let (ctx, runner) = context_with(
            "qa=qa1",
            Some("qa"),
            false,
            StubFactory::failing_nodes("api down"),
            CountingRunner::default(),
        );
        let out = ctx.call("listNodes", None).await.unwrap();
        assert_eq!(out, json!({ "nodes": [] }));
        assert_eq!(runner.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn get_node_routes_to_resolved_org() {
        let (ctx, _) = context("qa=qa1", Some("qa"), true);
        let out = ctx
            .call("getNode", Some(&raw(r#"{"name":"web1","org":"qa"}"#)))
            .await
            .unwrap();
        assert_eq!(
            out["node"],
            json!({ "name": "web1", "base_url": "https://chef.example.com/organizations/qa1" })
        );
    }

    #[tokio::test]
    async fn users_use_root_client() {
        let (ctx, _) = context("qa=qa1", Some("qa"), true);
        let out = ctx
            .call("getUser", Some(&raw(r#"{"name":"alice"}"#)))
            .await
            .unwrap();
        assert_eq!(out["user"]["base_url"], StubInventory::ROOT_URL);
    }

    #[tokio::test]
    async fn partial_search_passes_keys() {
        let (ctx, _) = context("", Some("acme"), true);
        let out = ctx
            .call(
                "partialSearch",
                Some(&raw(
                    r#"{"index":"node","query":"role:web","keys":{"ip":["ipaddress"]}}"#,
                )),
            )
            .await
            .unwrap();
        assert_eq!(out["rows"][0], json!({ "ip": ["ipaddress"] }));
        assert_eq!(out["total"], 1);
    }
}
