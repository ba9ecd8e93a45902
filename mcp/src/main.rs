//! # mcp-chef
//!
//! MCP (Model Context Protocol) server exposing Chef Infra Server inventory.
//! Runs as a stdio JSON-RPC server, launched by an AI agent host.
//!
//! ## Architecture
//!
//! ```text
//! main.rs      — entry point, config validation, client wiring
//! config.rs    — CLI flags and stderr logging
//! framing.rs   — newline / Content-Length message framing
//! protocol.rs  — JSON-RPC envelope and MCP payload types
//! mcp.rs       — dispatcher and read loop
//! tools.rs     — tool definitions and handlers
//! ```

mod config;
mod framing;
mod mcp;
mod protocol;
mod tools;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use chef_mcp::chefapi::ChefClientFactory;
use chef_mcp::knife::KnifeRunner;
use chef_mcp::orgs::{ClientFactory, OrgClientCache};
use chef_mcp::{Config, FallbackNodeLister, OrgResolver};

use config::Cli;
use mcp::{Dispatcher, Stop};
use tools::ToolContext;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    let mut cfg = match Config::load(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("mcp-chef: configuration error: {e}");
            std::process::exit(1);
        }
    };
    if cli.verbose {
        cfg.logging.debug = true;
    }
    config::init_tracing(cfg.log_level());

    if let Err(e) = cfg.validate_for_api() {
        error!("configuration invalid: {e}");
        std::process::exit(1);
    }

    let aliases = Arc::new(cfg.aliases());
    info!(
        version = env!("CARGO_PKG_VERSION"),
        root_url = %cfg.chef.server_url,
        aliases = aliases.len(),
        default_alias = aliases.default_alias().unwrap_or(""),
        "mcp-chef starting"
    );

    let factory = match ChefClientFactory::new(&cfg.chef.user, &cfg.chef.key_path) {
        Ok(f) => Arc::new(f),
        Err(e) => {
            error!("failed to load Chef API key: {e}");
            std::process::exit(1);
        }
    };

    // Root client only serves server-scope endpoints (users).
    let root = match factory.build(&cfg.chef.server_url) {
        Ok(c) => c,
        Err(e) => {
            error!("failed to init root Chef API client: {e}");
            std::process::exit(1);
        }
    };
    info!(base_url = %root.base_url(), user = %cfg.chef.user, "root client initialized");

    let cache = OrgClientCache::new(&cfg.chef.server_url, factory);
    let resolver = Arc::new(OrgResolver::new(aliases, cache));
    let nodes = Arc::new(FallbackNodeLister::new(
        Arc::new(KnifeRunner::new(cfg.knife.bin.clone())),
        cfg.knife.fallback,
    ));
    let dispatcher = Dispatcher::new(ToolContext::new(resolver, root, nodes));

    let served = tokio::select! {
        res = mcp::run_stdio(&dispatcher) => res,
        () = shutdown_signal() => {
            info!("signal received; stopping");
            return;
        }
    };

    match served {
        Ok(Stop::Eof) => info!("mcp server stopped (EOF)"),
        Ok(Stop::Exit) => {
            info!("mcp server stopped (exit)");
            std::process::exit(0);
        }
        Err(e) => {
            error!("mcp server stopped with error: {e}");
            std::process::exit(1);
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        if let Ok(mut sigterm) =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        {
            tokio::select! {
                _ = ctrl_c => {}
                _ = sigterm.recv() => {}
            }
            return;
        }
    }
    ctrl_c.await.ok();
}
