//! Caller-facing organization aliases.
//!
//! The alias spec is accepted in two encodings:
//!
//! - a JSON object: `{"qa": "qa1", "prod": "fireamp_classic"}`
//! - comma-separated pairs: `qa=qa1, prod = fireamp_classic`
//!
//! Malformed pairs in the second form are dropped, never fatal.

use std::collections::{BTreeMap, HashMap};

/// Parse an alias spec into an `alias -> organization` map.
///
/// The JSON form is tried first; on failure the comma-separated form is
/// used. Duplicate aliases resolve last-write-wins.
pub fn parse_alias_spec(spec: &str) -> HashMap<String, String> {
    let spec = spec.trim();
    if spec.is_empty() {
        return HashMap::new();
    }
    if let Ok(map) = serde_json::from_str::<HashMap<String, String>>(spec) {
        return map;
    }

    let mut map = HashMap::new();
    for token in spec.split(',') {
        let Some((alias, org)) = token.split_once('=') else {
            continue;
        };
        let (alias, org) = (alias.trim(), org.trim());
        if alias.is_empty() || org.is_empty() {
            continue;
        }
        map.insert(alias.to_string(), org.to_string());
    }
    map
}

/// Immutable alias table plus the optional default alias.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrgAliases {
    map: HashMap<String, String>,
    default_alias: Option<String>,
}

impl OrgAliases {
    /// Build from an already-parsed map. An empty default counts as none.
    pub fn new(map: HashMap<String, String>, default_alias: Option<String>) -> Self {
        Self {
            map,
            default_alias: default_alias.filter(|d| !d.trim().is_empty()),
        }
    }

    /// Build from an alias spec string (see [`parse_alias_spec`]).
    pub fn from_spec(spec: &str, default_alias: Option<String>) -> Self {
        Self::new(parse_alias_spec(spec), default_alias)
    }

    pub fn get(&self, alias: &str) -> Option<&str> {
        self.map.get(alias).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn default_alias(&self) -> Option<&str> {
        self.default_alias.as_deref()
    }

    /// Sorted copy of the mapping, for display.
    pub fn to_sorted(&self) -> BTreeMap<String, String> {
        self.map
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Canonical JSON encoding; parses back to the same mapping.
    pub fn to_spec(&self) -> String {
        serde_json::to_string(&self.to_sorted()).unwrap_or_else(|_| "{}".to_string())
    }
}
