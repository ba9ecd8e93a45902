//! `knife` command invocation.
//!
//! The node fallback chain shells out to `knife` when the API is unusable.
//! [`ToolRunner`] is the seam: [`KnifeRunner`] runs the real binary, tests
//! substitute canned output.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

#[derive(Debug, thiserror::Error)]
pub enum KnifeError {
    /// The binary could not be started (not installed, not executable, ...).
    #[error("failed to run {bin}: {source}")]
    Spawn {
        bin: String,
        #[source]
        source: std::io::Error,
    },
    /// The command ran but exited unsuccessfully.
    #[error("{bin} failed ({status}): {output}")]
    Failed {
        bin: String,
        status: String,
        output: String,
    },
}

/// Runs an external command and returns its combined output.
#[async_trait]
pub trait ToolRunner: Send + Sync {
    async fn run(&self, args: &[&str]) -> Result<String, KnifeError>;
}

/// Invokes the `knife` binary (or the configured replacement).
pub struct KnifeRunner {
    bin: String,
}

impl KnifeRunner {
    pub fn new(bin: impl Into<String>) -> Self {
        Self { bin: bin.into() }
    }
}

impl Default for KnifeRunner {
    fn default() -> Self {
        Self::new("knife")
    }
}

#[async_trait]
impl ToolRunner for KnifeRunner {
    /// Stdout followed by stderr, like a shell `2>&1` without interleaving.
    async fn run(&self, args: &[&str]) -> Result<String, KnifeError> {
        tracing::debug!(bin = %self.bin, ?args, "running knife");
        let output = Command::new(&self.bin)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| KnifeError::Spawn {
                bin: self.bin.clone(),
                source,
            })?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        if output.status.success() {
            Ok(combined)
        } else {
            Err(KnifeError::Failed {
                bin: self.bin.clone(),
                status: output.status.to_string(),
                output: combined.trim().to_string(),
            })
        }
    }
}
