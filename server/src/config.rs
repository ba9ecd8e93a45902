//! Configuration loading and defaults.
//!
//! Configuration is resolved in order of precedence (highest wins):
//!
//! 1. **Environment variables** — `CHEF_SERVER_URL`, `CHEF_USER`,
//!    `CHEF_KEY_PATH`, `CHEF_ORG_ALIASES`, `CHEF_DEFAULT_ORG_ALIAS`,
//!    `KNIFE_FALLBACK`, `KNIFE_BIN`, `CHEF_DEBUG`, `CHEF_MCP_LISTEN`, `PORT`
//! 2. **Config file** — path via `--config <path>`, or `chef-mcp.toml` in CWD
//! 3. **Compiled defaults** — see each field's default value below
//!
//! The TOML file mirrors the struct hierarchy:
//!
//! ```toml
//! [chef]
//! server_url = "https://chef.example.com"   # no /organizations/<org> part
//! user = "automation"
//! key_path = "/etc/chef/automation.pem"     # or an inline PEM block
//! org_aliases = "qa=qa1,prod=fireamp_classic"
//! # org_aliases = { qa = "qa1", prod = "fireamp_classic" }
//! default_org_alias = "prod"
//!
//! [knife]
//! fallback = true
//! bin = "knife"
//!
//! [server]
//! listen = "0.0.0.0:8080"
//!
//! [logging]
//! level = "info"
//! debug = false
//! ```

use std::collections::HashMap;
use std::path::Path;

use reqwest::Url;
use serde::Deserialize;

use crate::orgs::{parse_alias_spec, OrgAliases};

/// Config file looked up in the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "chef-mcp.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid value '{value}' for {name} (expected true/false)")]
    InvalidFlag { name: &'static str, value: String },
    #[error("missing required setting: {0}")]
    Missing(&'static str),
    #[error("invalid server URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("default org alias '{0}' is not in the alias table")]
    UnknownDefaultAlias(String),
    #[error("no Chef credentials configured and knife fallback disabled")]
    NoBackend,
}

/// Top-level configuration, deserialized from TOML.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub chef: ChefConfig,
    #[serde(default)]
    pub knife: KnifeConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Upstream server, credentials and organization aliases.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChefConfig {
    /// Root endpoint, e.g. `https://chef.example.com`.
    #[serde(default)]
    pub server_url: String,
    #[serde(default)]
    pub user: String,
    /// Path to the PEM key, or the PEM itself.
    #[serde(default)]
    pub key_path: String,
    #[serde(default)]
    pub org_aliases: AliasSpec,
    pub default_org_alias: Option<String>,
}

/// Alias table as written in the file: the textual spec or a TOML table.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AliasSpec {
    Text(String),
    Table(HashMap<String, String>),
}

impl Default for AliasSpec {
    fn default() -> Self {
        AliasSpec::Text(String::new())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct KnifeConfig {
    /// Fall back to `knife node list` when the API cannot list nodes (default true).
    #[serde(default = "default_fallback")]
    pub fallback: bool,
    /// Executable to run (default `knife`).
    #[serde(default = "default_knife_bin")]
    pub bin: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Socket address for the HTTP binary (default `0.0.0.0:8080`).
    #[serde(default = "default_listen")]
    pub listen: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// tracing filter level (default `info`). Overridden by `RUST_LOG` env var.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Verbose logging; forces the level to `debug`.
    #[serde(default)]
    pub debug: bool,
}

/// How the HTTP binary serves `/nodes`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServeMode {
    /// API client first, knife fallback per configuration.
    Api,
    /// No credentials: every listing goes through knife.
    KnifeOnly,
}

fn default_fallback() -> bool {
    true
}
fn default_knife_bin() -> String {
    "knife".to_string()
}
fn default_listen() -> String {
    "0.0.0.0:8080".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for KnifeConfig {
    fn default() -> Self {
        Self {
            fallback: default_fallback(),
            bin: default_knife_bin(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            debug: false,
        }
    }
}

/// Parse a boolean flag value; `None` for anything unrecognized.
pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn flag(name: &'static str, value: String) -> Result<bool, ConfigError> {
    parse_flag(&value).ok_or(ConfigError::InvalidFlag { name, value })
}

impl Config {
    /// Load from the process environment. See [`Config::load_with`].
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with(path, |name| std::env::var(name).ok())
    }

    /// Load with the precedence chain: env vars > file > defaults.
    ///
    /// If `path` is `Some`, that file must exist. Otherwise `chef-mcp.toml` in
    /// the current directory is used when present. `lookup` supplies
    /// environment variables; empty values count as unset.
    pub fn load_with<F>(path: Option<&Path>, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Config::default(),
        };
        config.apply_env(|name| lookup(name).filter(|v| !v.trim().is_empty()))?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let display = path.display().to_string();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: display.clone(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: display,
            source,
        })
    }

    fn apply_env<F>(&mut self, var: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = var("CHEF_SERVER_URL") {
            self.chef.server_url = v.trim().to_string();
        }
        if let Some(v) = var("CHEF_USER") {
            self.chef.user = v.trim().to_string();
        }
        if let Some(v) = var("CHEF_KEY_PATH") {
            self.chef.key_path = v;
        }
        if let Some(v) = var("CHEF_ORG_ALIASES") {
            self.chef.org_aliases = AliasSpec::Text(v);
        }
        if let Some(v) = var("CHEF_DEFAULT_ORG_ALIAS") {
            self.chef.default_org_alias = Some(v.trim().to_string());
        }
        if let Some(v) = var("KNIFE_FALLBACK") {
            self.knife.fallback = flag("KNIFE_FALLBACK", v)?;
        }
        if let Some(v) = var("KNIFE_BIN") {
            self.knife.bin = v;
        }
        if let Some(v) = var("CHEF_DEBUG") {
            self.logging.debug = flag("CHEF_DEBUG", v)?;
        }
        if let Some(v) = var("CHEF_MCP_LISTEN") {
            self.server.listen = v;
        } else if let Some(port) = var("PORT") {
            self.server.listen = format!("0.0.0.0:{}", port.trim());
        }
        Ok(())
    }

    /// Effective tracing level.
    pub fn log_level(&self) -> &str {
        if self.logging.debug {
            "debug"
        } else {
            &self.logging.level
        }
    }

    /// All of URL, user and key are set.
    pub fn has_credentials(&self) -> bool {
        !self.chef.server_url.is_empty()
            && !self.chef.user.is_empty()
            && !self.chef.key_path.trim().is_empty()
    }

    /// The alias table with its default alias.
    pub fn aliases(&self) -> OrgAliases {
        let map = match &self.chef.org_aliases {
            AliasSpec::Text(spec) => parse_alias_spec(spec),
            AliasSpec::Table(table) => table
                .iter()
                .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
                .filter(|(k, v)| !k.is_empty() && !v.is_empty())
                .collect(),
        };
        OrgAliases::new(map, self.chef.default_org_alias.clone())
    }

    /// Requirements for the stdio server, which always talks to the API.
    pub fn validate_for_api(&self) -> Result<(), ConfigError> {
        if self.chef.server_url.is_empty() {
            return Err(ConfigError::Missing("CHEF_SERVER_URL"));
        }
        if self.chef.user.is_empty() {
            return Err(ConfigError::Missing("CHEF_USER"));
        }
        if self.chef.key_path.trim().is_empty() {
            return Err(ConfigError::Missing("CHEF_KEY_PATH"));
        }
        validate_root_url(&self.chef.server_url)?;
        self.validate_default_alias()
    }

    /// Requirements for the HTTP server, which can run on knife alone.
    pub fn validate_for_http(&self) -> Result<ServeMode, ConfigError> {
        if self.has_credentials() {
            validate_root_url(&self.chef.server_url)?;
            self.validate_default_alias()?;
            Ok(ServeMode::Api)
        } else if self.knife.fallback {
            Ok(ServeMode::KnifeOnly)
        } else {
            Err(ConfigError::NoBackend)
        }
    }

    fn validate_default_alias(&self) -> Result<(), ConfigError> {
        let aliases = self.aliases();
        match aliases.default_alias() {
            Some(d) if !aliases.is_empty() && aliases.get(d).is_none() => {
                Err(ConfigError::UnknownDefaultAlias(d.to_string()))
            }
            _ => Ok(()),
        }
    }
}

/// The root endpoint must be an absolute http(s) URL with no organization segment.
pub fn validate_root_url(raw: &str) -> Result<(), ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidUrl {
        url: raw.to_string(),
        reason: reason.to_string(),
    };
    let url = Url::parse(raw).map_err(|e| invalid(&e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid("scheme must be http or https"));
    }
    if url.cannot_be_a_base() {
        return Err(invalid("not a base URL"));
    }
    let has_org_segment = url
        .path_segments()
        .is_some_and(|mut segments| segments.any(|s| s == "organizations"));
    if has_org_segment {
        return Err(invalid(
            "must be the server root, without /organizations/<org>",
        ));
    }
    Ok(())
}
