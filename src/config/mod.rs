//! Configuration layering for the siteforge CLI.
//!
//! Priority (highest to lowest): CLI flag / `SITEFORGE_*` env var, then
//! `{data_dir}/config.toml`, then built-in defaults. The built-in provider
//! lineup (claude CLI, codex CLI, an OpenAI-compatible endpoint) is fully
//! overridable per `[provider.<name>]` section.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::error;

use crate::workflow::{IntentThresholds, WorkflowConfig};

// ─── Provider profiles ────────────────────────────────────────────────────────

/// Which adapter a `[provider.<name>]` section configures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// A local executable (`claude`, `codex`, ...) driven per call.
    Command,
    /// An OpenAI-compatible chat-completions endpoint.
    OpenaiCompat,
}

fn default_true() -> bool {
    true
}

/// Per-provider configuration (`[provider.<name>]` in config.toml).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderProfile {
    pub kind: ProviderKind,
    /// Selection priority; lower is preferred.
    pub priority: u32,
    /// Disabled providers are never registered.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Binary name or path (`kind = "command"`).
    pub command: Option<String>,
    /// Arguments placed before the prompt (`kind = "command"`).
    #[serde(default)]
    pub args: Vec<String>,
    /// Endpoint base URL (`kind = "openai_compat"`), e.g. `https://api.openai.com/v1`.
    pub base_url: Option<String>,
    /// Model ID sent in the request body (`kind = "openai_compat"`).
    pub model: Option<String>,
    /// Environment variable holding the API key. Unset = no Authorization header.
    pub api_key_env: Option<String>,
    /// Per-provider deadline in seconds; unset falls back to the executor default.
    pub timeout_secs: Option<u64>,
    /// Default max tokens when the call does not supply one.
    pub max_tokens: Option<u32>,
}

impl ProviderProfile {
    fn command(priority: u32, command: &str, args: &[&str]) -> Self {
        Self {
            kind: ProviderKind::Command,
            priority,
            enabled: true,
            command: Some(command.to_string()),
            args: args.iter().map(|s| s.to_string()).collect(),
            base_url: None,
            model: None,
            api_key_env: None,
            timeout_secs: None,
            max_tokens: None,
        }
    }

    fn openai_compat(priority: u32, base_url: &str, model: &str, api_key_env: &str) -> Self {
        Self {
            kind: ProviderKind::OpenaiCompat,
            priority,
            enabled: true,
            command: None,
            args: Vec::new(),
            base_url: Some(base_url.to_string()),
            model: Some(model.to_string()),
            api_key_env: Some(api_key_env.to_string()),
            timeout_secs: None,
            max_tokens: None,
        }
    }
}

/// The built-in lineup used when config.toml has no `[provider.*]` sections.
fn default_providers() -> HashMap<String, ProviderProfile> {
    HashMap::from([
        (
            "claude".to_string(),
            ProviderProfile::command(0, "claude", &["-p"]),
        ),
        (
            "codex".to_string(),
            ProviderProfile::command(1, "codex", &["exec"]),
        ),
        (
            "openai".to_string(),
            ProviderProfile::openai_compat(
                2,
                "https://api.openai.com/v1",
                "gpt-4o-mini",
                "OPENAI_API_KEY",
            ),
        ),
    ])
}

// ─── TOML config file ─────────────────────────────────────────────────────────

/// `{data_dir}/config.toml` — all fields are optional overrides.
#[derive(Deserialize, Default)]
struct TomlConfig {
    /// Log level filter string, e.g. "debug", "info,siteforge=trace" (default: "info").
    log: Option<String>,
    /// Log output format: "pretty" (default) | "json".
    log_format: Option<String>,
    /// Per-provider sections (`[provider.claude]`, ...). Any section present
    /// replaces the whole built-in lineup.
    provider: Option<HashMap<String, ProviderProfile>>,
    /// Workflow parameters (`[workflow]`).
    workflow: Option<WorkflowConfig>,
    /// Intent action cutoffs (`[intent]`).
    intent: Option<IntentThresholds>,
}

fn load_toml(data_dir: &Path) -> Option<TomlConfig> {
    let path = data_dir.join("config.toml");
    let contents = std::fs::read_to_string(&path).ok()?;
    match toml::from_str::<TomlConfig>(&contents) {
        Ok(cfg) => Some(cfg),
        Err(e) => {
            error!(path = %path.display(), err = %e, "failed to parse config.toml — using defaults");
            None
        }
    }
}

// ─── AppConfig ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub log: String,
    /// "pretty" | "json".
    pub log_format: String,
    /// Provider name → profile; drives registry construction.
    pub providers: HashMap<String, ProviderProfile>,
    pub workflow: WorkflowConfig,
    pub intent: IntentThresholds,
}

impl AppConfig {
    /// Build config from CLI/env args + optional TOML file.
    ///
    /// Priority (highest to lowest):
    ///   1. CLI / env — passed as `Some(value)` from clap
    ///   2. TOML file at `{data_dir}/config.toml`
    ///   3. Built-in defaults
    pub fn new(data_dir: Option<PathBuf>, log: Option<String>) -> Self {
        let data_dir = data_dir.unwrap_or_else(default_data_dir);
        let toml = load_toml(&data_dir).unwrap_or_default();

        let log = log.or(toml.log).unwrap_or_else(|| "info".to_string());
        let log_format = std::env::var("SITEFORGE_LOG_FORMAT")
            .ok()
            .filter(|s| !s.is_empty())
            .or(toml.log_format)
            .unwrap_or_else(|| "pretty".to_string());

        let providers = toml.provider.unwrap_or_else(default_providers);
        let workflow = toml.workflow.unwrap_or_default();
        let intent = toml.intent.unwrap_or_default();

        Self {
            data_dir,
            log,
            log_format,
            providers,
            workflow,
            intent,
        }
    }

    /// Where the daily message journal lives.
    pub fn logs_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }

    /// Per-provider deadlines for the failover engine, from `timeout_secs`.
    pub fn profile_deadlines(&self) -> HashMap<String, Duration> {
        self.providers
            .iter()
            .filter_map(|(name, p)| {
                p.timeout_secs
                    .map(|secs| (name.clone(), Duration::from_secs(secs)))
            })
            .collect()
    }

    /// Per-provider default max tokens, applied when a call supplies none.
    pub fn profile_max_tokens(&self) -> HashMap<String, u32> {
        self.providers
            .iter()
            .filter_map(|(name, p)| p.max_tokens.map(|tokens| (name.clone(), tokens)))
            .collect()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log: "info".to_string(),
            log_format: "pretty".to_string(),
            providers: default_providers(),
            workflow: WorkflowConfig::default(),
            intent: IntentThresholds::default(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    #[cfg(target_os = "macos")]
    {
        // ~/Library/Application Support/siteforge
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join("siteforge");
        }
    }
    #[cfg(target_os = "linux")]
    {
        // $XDG_DATA_HOME/siteforge or ~/.local/share/siteforge
        if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
            return PathBuf::from(xdg).join("siteforge");
        }
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home)
                .join(".local")
                .join("share")
                .join("siteforge");
        }
    }
    #[cfg(target_os = "windows")]
    {
        // %APPDATA%\siteforge
        if let Ok(appdata) = std::env::var("APPDATA") {
            return PathBuf::from(appdata).join("siteforge");
        }
    }
    // Fallback
    PathBuf::from(".siteforge")
}

// ─── Tests ────────────────────────────────────────────────────────────────────
