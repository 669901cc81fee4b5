//! Priority-ordered provider registry.
//!
//! Built once at startup from configuration, then shared read-only across the
//! orchestrator. Lower priority values are preferred; entries with equal
//! priority keep their registration order.

use std::sync::Arc;

use tracing::debug;

use super::TextProvider;

/// One registered backend with its selection priority.
#[derive(Clone)]
pub struct RegisteredProvider {
    pub priority: u32,
    pub provider: Arc<dyn TextProvider>,
}

/// Registry of all configured providers, kept sorted by ascending priority.
#[derive(Default)]
pub struct ProviderRegistry {
    entries: Vec<RegisteredProvider>,
}

pub type SharedProviderRegistry = Arc<ProviderRegistry>;

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider under the given priority.
    ///
    /// Names are unique: registering a provider whose name matches an existing
    /// entry replaces that entry. The sort is stable, so equal priorities
    /// preserve registration order.
    pub fn register(&mut self, priority: u32, provider: Arc<dyn TextProvider>) {
        let name = provider.name().to_string();
        self.entries.retain(|e| e.provider.name() != name);
        self.entries.push(RegisteredProvider { priority, provider });
        self.entries.sort_by_key(|e| e.priority);
        debug!(provider = %name, priority, "provider registered");
    }

    /// All providers in ascending priority order.
    pub fn in_priority_order(&self) -> impl Iterator<Item = &RegisteredProvider> {
        self.entries.iter()
    }

    /// Look up a provider by its exact name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn TextProvider>> {
        self.entries
            .iter()
            .find(|e| e.provider.name() == name)
            .map(|e| Arc::clone(&e.provider))
    }

    /// Registered names, in priority order.
    pub fn names(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|e| e.provider.name().to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::GenerationOptions;
    use async_trait::async_trait;

    struct FakeProvider {
        name: &'static str,
    }

    #[async_trait]
    impl TextProvider for FakeProvider {
        fn name(&self) -> &str {
            self.name
        }

        async fn is_available(&self) -> bool {
            true
        }

        async fn generate_text(
            &self,
            _prompt: &str,
            _options: &GenerationOptions,
        ) -> anyhow::Result<String> {
            Ok(String::new())
        }
    }

    fn fake(name: &'static str) -> Arc<dyn TextProvider> {
        Arc::new(FakeProvider { name })
    }

    #[test]
    fn orders_by_ascending_priority() {
        let mut registry = ProviderRegistry::new();
        registry.register(2, fake("http"));
        registry.register(0, fake("claude"));
        registry.register(1, fake("codex"));

        assert_eq!(registry.names(), vec!["claude", "codex", "http"]);
    }

    #[test]
    fn equal_priorities_keep_registration_order() {
        let mut registry = ProviderRegistry::new();
        registry.register(1, fake("first"));
        registry.register(1, fake("second"));
        registry.register(0, fake("zeroth"));

        assert_eq!(registry.names(), vec!["zeroth", "first", "second"]);
    }

    #[test]
    fn reregistering_a_name_replaces_the_entry() {
        let mut registry = ProviderRegistry::new();
        registry.register(0, fake("claude"));
        registry.register(5, fake("claude"));

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.names(), vec!["claude"]);
    }

    #[test]
    fn get_finds_exact_name_only() {
        let mut registry = ProviderRegistry::new();
        registry.register(0, fake("claude"));

        assert!(registry.get("claude").is_some());
        assert!(registry.get("clau").is_none());
        assert!(registry.get("CLAUDE").is_none());
    }
}
