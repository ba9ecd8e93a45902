#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! # chef-mcp
//!
//! HTTP front end for Chef Server node inventory.
//!
//! ## API surface
//!
//! | Method | Path              | Description                              |
//! |--------|-------------------|------------------------------------------|
//! | GET    | `/healthz`        | Liveness probe                           |
//! | GET    | `/version`        | Build version                            |
//! | GET    | `/nodes?org=<a>`  | Node names (API first, knife fallback)   |
//!
//! Without complete API credentials the server runs knife-only, provided
//! the knife fallback is enabled.

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use chef_mcp::config::{Config, ServeMode};
use chef_mcp::{routes, AppState};

/// HTTP front end for Chef Server node inventory.
#[derive(Parser)]
#[command(name = "chef-mcp", version)]
struct Cli {
    /// Path to TOML config file.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Listen address, overriding config and environment.
    #[arg(long)]
    listen: Option<String>,
    /// Debug logging.
    #[arg(long, short)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let mut config = match Config::load(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("chef-mcp: configuration error: {e}");
            std::process::exit(1);
        }
    };
    if let Some(listen) = cli.listen {
        config.server.listen = listen;
    }
    if cli.verbose {
        config.logging.debug = true;
    }

    // Initialize tracing
    let log_filter =
        std::env::var("RUST_LOG").unwrap_or_else(|_| config.log_level().to_string());
    tracing_subscriber::fmt().with_env_filter(log_filter).init();

    let mode = match config.validate_for_http() {
        Ok(mode) => mode,
        Err(e) => {
            error!("configuration error: {e}");
            std::process::exit(1);
        }
    };

    info!(
        version = env!("CARGO_PKG_VERSION"),
        listen = %config.server.listen,
        knife_fallback = config.knife.fallback,
        "chef-mcp starting"
    );
    if mode == ServeMode::KnifeOnly {
        warn!("Chef API credentials incomplete; operating with knife fallback only");
    }

    let listen = &config.server.listen;
    let state = match AppState::from_config(&config, mode) {
        Ok(s) => s,
        Err(e) => {
            error!("failed to init Chef API client: {e}");
            std::process::exit(1);
        }
    };
    let app = routes::router(state);

    let listener = match TcpListener::bind(listen.as_str()).await {
        Ok(l) => l,
        Err(e) => {
            error!("failed to bind {listen}: {e}");
            std::process::exit(1);
        }
    };

    info!("Server ready");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("server error: {e}");
        std::process::exit(1);
    }

    info!("shutdown complete");
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received SIGINT"),
                    _ = sigterm.recv() => info!("Received SIGTERM"),
                }
            }
            Err(e) => {
                warn!("failed to register SIGTERM handler: {e}");
                ctrl_c.await.ok();
                info!("Received SIGINT");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received SIGINT");
    }
}
