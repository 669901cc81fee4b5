//! Provider selection: explicit override first, then priority-order scan.
//!
//! Selection is probe-driven. The override environment variable is read at
//! every invocation rather than cached, so an operator can repoint a running
//! workflow between calls.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, warn};

use super::registry::ProviderRegistry;
use super::TextProvider;

/// Environment variable naming a provider to pin, bypassing priority order.
pub const PROVIDER_OVERRIDE_ENV: &str = "SITEFORGE_PROVIDER";

/// Read the provider override from the environment. Empty values count as unset.
pub fn override_from_env() -> Option<String> {
    match std::env::var(PROVIDER_OVERRIDE_ENV) {
        Ok(name) if !name.trim().is_empty() => Some(name.trim().to_string()),
        _ => None,
    }
}

/// Pick the provider for a single call.
///
/// If `explicit_override` names a registered provider whose probe passes, it
/// wins regardless of priority. Otherwise providers are scanned in ascending
/// priority order and the first available one is returned. `None` means no
/// provider is usable right now — a reportable condition, not an error.
pub async fn select(
    registry: &ProviderRegistry,
    explicit_override: Option<&str>,
) -> Option<Arc<dyn TextProvider>> {
    select_excluding(registry, explicit_override, &HashSet::new()).await
}

/// [`select`], skipping providers whose names appear in `excluded`.
///
/// The failover loop uses this to guarantee it never re-attempts a provider
/// that already failed within the same top-level call. An excluded override
/// falls through to the normal scan, same as an unavailable one.
pub async fn select_excluding(
    registry: &ProviderRegistry,
    explicit_override: Option<&str>,
    excluded: &HashSet<String>,
) -> Option<Arc<dyn TextProvider>> {
    if let Some(name) = explicit_override {
        if excluded.contains(name) {
            debug!(provider = %name, "override excluded for this call, scanning by priority");
        } else {
            match registry.get(name) {
                Some(provider) => {
                    if provider.is_available().await {
                        debug!(provider = %name, "explicit override selected");
                        return Some(provider);
                    }
                    warn!(provider = %name, "override provider unavailable, scanning by priority");
                }
                None => {
                    warn!(provider = %name, "override names an unregistered provider, ignoring");
                }
            }
        }
    }

    for entry in registry.in_priority_order() {
        let name = entry.provider.name();
        if excluded.contains(name) {
            continue;
        }
        if entry.provider.is_available().await {
            debug!(provider = %name, priority = entry.priority, "provider selected");
            return Some(Arc::clone(&entry.provider));
        }
        debug!(provider = %name, "provider probe failed, trying next");
    }

    None
}
