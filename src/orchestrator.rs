//! Facade over the provider orchestration core.
//!
//! Owns the registry and the failover engine, wires them up from
//! configuration, and exposes the two inbound operations the CLI consumes:
//! raw text generation and normalized component generation. The provider
//! lineup banner is logged exactly once per orchestrator instance, gated by
//! an instance field rather than anything process-wide.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{bail, Context};
use tracing::{info, warn};

use crate::config::{AppConfig, ProviderKind, ProviderProfile};
use crate::providers::adapters::{CommandProvider, OpenAiCompatProvider};
use crate::providers::failover::{FailoverEngine, FailoverError};
use crate::providers::registry::ProviderRegistry;
use crate::providers::{selector, Generation, GenerationRequest, TextProvider};
use crate::response::{self, ParsedPayload};

/// A normalized generation: the parsed payload plus who produced it.
#[derive(Debug, Clone)]
pub struct ComponentGeneration {
    pub payload: ParsedPayload,
    pub provider: String,
}

pub struct Orchestrator {
    registry: Arc<ProviderRegistry>,
    failover: FailoverEngine,
    banner_logged: AtomicBool,
}

pub type SharedOrchestrator = Arc<Orchestrator>;

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator").finish_non_exhaustive()
    }
}

impl Orchestrator {
    pub fn new(registry: ProviderRegistry) -> Self {
        let registry = Arc::new(registry);
        let failover = FailoverEngine::new(Arc::clone(&registry));
        Self {
            registry,
            failover,
            banner_logged: AtomicBool::new(false),
        }
    }

    /// Build the registry from the configured provider profiles.
    ///
    /// Disabled profiles are skipped. A profile that is missing the fields
    /// its kind requires is a configuration error, not a runtime failure.
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let mut registry = ProviderRegistry::new();
        for (name, profile) in &config.providers {
            if !profile.enabled {
                continue;
            }
            registry.register(profile.priority, build_adapter(name, profile)?);
        }

        let registry = Arc::new(registry);
        let failover = FailoverEngine::new(Arc::clone(&registry))
            .with_profile_deadlines(config.profile_deadlines())
            .with_profile_max_tokens(config.profile_max_tokens());
        Ok(Self {
            registry,
            failover,
            banner_logged: AtomicBool::new(false),
        })
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// One orchestrated call through the failover pipeline. The provider
    /// override is read from `SITEFORGE_PROVIDER` at call time.
    pub async fn generate_text(
        &self,
        request: GenerationRequest,
    ) -> Result<Generation, FailoverError> {
        let override_name = selector::override_from_env();
        self.generate_text_with(request, override_name.as_deref())
            .await
    }

    /// [`generate_text`] with an explicit override (CLI flag) instead of the
    /// environment lookup.
    pub async fn generate_text_with(
        &self,
        request: GenerationRequest,
        explicit_override: Option<&str>,
    ) -> Result<Generation, FailoverError> {
        self.log_lineup_once();
        self.failover.run(&request, explicit_override).await
    }

    /// One orchestrated call, normalized into a code payload. Truncated
    /// output is surfaced as a warning, never blocked.
    pub async fn generate_component(
        &self,
        request: GenerationRequest,
        explicit_override: Option<&str>,
    ) -> Result<ComponentGeneration, FailoverError> {
        let generation = self.generate_text_with(request, explicit_override).await?;
        let payload = response::parse(&generation.text);
        if payload.was_truncated {
            warn!(
                provider = %generation.provider,
                "response was truncated and repaired"
            );
        }
        Ok(ComponentGeneration {
            payload,
            provider: generation.provider,
        })
    }

    fn log_lineup_once(&self) {
        if self.banner_logged.swap(true, Ordering::Relaxed) {
            return;
        }
        info!(
            providers = %self.registry.names().join(", "),
            "provider lineup"
        );
    }
}

fn build_adapter(name: &str, profile: &ProviderProfile) -> anyhow::Result<Arc<dyn TextProvider>> {
    match profile.kind {
        ProviderKind::Command => {
            let Some(command) = &profile.command else {
                bail!("provider `{name}`: kind = \"command\" requires a `command` field");
            };
            Ok(Arc::new(CommandProvider::new(
                name,
                command,
                profile.args.clone(),
            )))
        }
        ProviderKind::OpenaiCompat => {
            let Some(base_url) = &profile.base_url else {
                bail!("provider `{name}`: kind = \"openai_compat\" requires a `base_url` field");
            };
            let Some(model) = &profile.model else {
                bail!("provider `{name}`: kind = \"openai_compat\" requires a `model` field");
            };
            let api_key = profile
                .api_key_env
                .as_ref()
                .and_then(|var| std::env::var(var).ok())
                .filter(|key| !key.is_empty());
            let adapter = OpenAiCompatProvider::new(name, base_url, model, api_key)
                .with_context(|| format!("provider `{name}`: adapter construction failed"))?;
            Ok(Arc::new(adapter))
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::providers::GenerationOptions;
    use async_trait::async_trait;

    struct Canned(&'static str, &'static str);

    #[async_trait]
    impl TextProvider for Canned {
        fn name(&self) -> &str {
            self.0
        }

        async fn is_available(&self) -> bool {
            true
        }

        async fn generate_text(
            &self,
            _prompt: &str,
            _options: &GenerationOptions,
        ) -> anyhow::Result<String> {
            Ok(self.1.to_string())
        }
    }

    fn orchestrator_with(providers: Vec<(u32, &'static str, &'static str)>) -> Orchestrator {
        let mut registry = ProviderRegistry::new();
        for (priority, name, answer) in providers {
            registry.register(priority, Arc::new(Canned(name, answer)));
        }
        Orchestrator::new(registry)
    }

    #[test]
    fn default_config_builds_the_full_lineup() {
        let orchestrator = Orchestrator::from_config(&AppConfig::default()).unwrap();
        assert_eq!(
            orchestrator.registry().names(),
            vec!["claude", "codex", "openai"]
        );
    }

    #[test]
    fn disabled_providers_are_not_registered() {
        let mut config = AppConfig::default();
        config.providers.get_mut("codex").unwrap().enabled = false;

        let orchestrator = Orchestrator::from_config(&config).unwrap();
        assert_eq!(orchestrator.registry().names(), vec!["claude", "openai"]);
    }

    #[test]
    fn a_command_profile_without_a_command_is_rejected() {
        let mut config = AppConfig::default();
        config.providers.get_mut("claude").unwrap().command = None;

        let err = Orchestrator::from_config(&config).unwrap_err();
        assert!(err.to_string().contains("`claude`"));
    }

    #[tokio::test]
    async fn generate_text_routes_through_failover() {
        let orchestrator = orchestrator_with(vec![(0, "fast", "hello from fast")]);
        let generation = orchestrator
            .generate_text(GenerationRequest::new("hi"))
            .await
            .unwrap();
        assert_eq!(generation.provider, "fast");
        assert_eq!(generation.text, "hello from fast");
    }

    #[tokio::test]
    async fn generate_component_normalizes_the_response() {
        let orchestrator = orchestrator_with(vec![(
            0,
            "fast",
            "Here you go:\n```js\nconsole.log(1);\n```\nDone.",
        )]);
        let component = orchestrator
            .generate_component(GenerationRequest::new("hi"), None)
            .await
            .unwrap();
        assert_eq!(component.payload.code, "console.log(1);");
        assert!(!component.payload.was_truncated);
        assert_eq!(component.provider, "fast");
    }

    #[tokio::test]
    async fn explicit_override_beats_priority() {
        let orchestrator = orchestrator_with(vec![
            (0, "primary", "from primary"),
            (1, "pinned", "from pinned"),
        ]);
        let generation = orchestrator
            .generate_text_with(GenerationRequest::new("hi"), Some("pinned"))
            .await
            .unwrap();
        assert_eq!(generation.provider, "pinned");
    }
}
