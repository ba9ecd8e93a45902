#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::unused_async)]
#![allow(clippy::implicit_hasher)]
#![allow(clippy::redundant_closure_for_method_calls)]

//! chef-mcp library: the pieces shared by the HTTP and stdio servers.
//!
//! - `config` — TOML + env-var configuration and startup validation
//! - `chefapi` — signed Chef Server API client and the inventory traits
//! - `orgs` — org alias table, resolver, per-org client cache
//! - `knife` — `knife` subprocess invocation
//! - `nodes` — API-first node listing with the knife fallback
//! - `routes` — HTTP route handlers (`/healthz`, `/version`, `/nodes`)

pub mod chefapi;
pub mod config;
pub mod knife;
pub mod nodes;
pub mod orgs;
pub mod routes;
pub mod state;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export key types at crate root for convenience.
pub use chefapi::{ChefClient, ClientError, InventoryClient, NodeLister};
pub use config::Config;
pub use nodes::FallbackNodeLister;
pub use orgs::{OrgAliases, OrgResolver};
pub use state::AppState;
