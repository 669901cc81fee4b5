//! Subprocess adapter for local AI CLIs (`claude`, `codex`, ...).
//!
//! The prompt is appended as the final argument after the configured base
//! args, so `claude` with base args `["-p"]` and `codex` with `["exec"]`
//! both fit. Sampling options have no CLI equivalent and are ignored here.

use anyhow::Context;
use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::providers::{GenerationOptions, TextProvider};

/// A provider backed by an executable on PATH.
pub struct CommandProvider {
    name: String,
    binary: String,
    base_args: Vec<String>,
}

impl CommandProvider {
    pub fn new(
        name: impl Into<String>,
        binary: impl Into<String>,
        base_args: Vec<String>,
    ) -> Self {
        Self {
            name: name.into(),
            binary: binary.into(),
            base_args,
        }
    }
}

#[async_trait]
impl TextProvider for CommandProvider {
    fn name(&self) -> &str {
        &self.name
    }

    /// Probe by running `<binary> --version`. Any spawn error or non-zero
    /// exit means not available.
    async fn is_available(&self) -> bool {
        match Command::new(&self.binary).arg("--version").output().await {
            Ok(out) => out.status.success(),
            Err(err) => {
                debug!(provider = %self.name, binary = %self.binary, err = %err, "probe failed");
                false
            }
        }
    }

    async fn generate_text(
        &self,
        prompt: &str,
        _options: &GenerationOptions,
    ) -> anyhow::Result<String> {
        let mut cmd = Command::new(&self.binary);
        cmd.args(&self.base_args)
            .arg(prompt)
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            // The executor abandons timed-out calls by dropping this future;
            // the child must not outlive it.
            .kill_on_drop(true);

        let out = cmd.output().await.with_context(|| {
            format!(
                "failed to spawn `{}` — is it installed and on PATH?",
                self.binary
            )
        })?;

        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr);
            anyhow::bail!(
                "`{}` exited with {}: {}",
                self.binary,
                out.status,
                stderr.trim()
            );
        }

        Ok(String::from_utf8_lossy(&out.stdout).into_owned())
    }
}
