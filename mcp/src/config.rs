//! Command-line arguments and logging setup for mcp-chef.
//!
//! Everything else comes from [`chef_mcp::Config`]: an optional TOML file
//! (`--config`, or `chef-mcp.toml` in the working directory) overridden by
//! the `CHEF_*` / `KNIFE_*` environment variables.

use std::path::PathBuf;

use clap::Parser;

/// CLI arguments parsed by `clap`.
#[derive(Parser)]
#[command(name = "mcp-chef", version, about = "MCP server for Chef Infra Server inventory")]
pub struct Cli {
    /// Path to TOML config file.
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Debug logging (same as CHEF_DEBUG=1).
    #[arg(long, short)]
    pub verbose: bool,
}

/// Install the tracing subscriber on stderr; stdout carries the protocol.
///
/// `RUST_LOG` wins over `level`.
pub fn init_tracing(level: &str) {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| level.to_string());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}
