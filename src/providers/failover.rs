//! Sequential failover across providers: first success wins.
//!
//! Composes the selector and the bounded executor in an explicit loop over an
//! exclusion set. Every iteration bars at least one more provider name, so a
//! call terminates in at most `registry.len()` attempts. There is no parallel
//! fan-out; at most one provider call is in flight at any time.

use std::collections::HashMap;
use std::collections::HashSet;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::registry::SharedProviderRegistry;
use super::{executor, selector, FailureKind, Generation, GenerationRequest, ProviderFailure};

/// Raised only when a whole top-level call is out of options.
#[derive(Debug, thiserror::Error)]
pub enum FailoverError {
    #[error("no text providers are registered")]
    NoProvidersRegistered,
    #[error("all providers failed: {}", describe_attempts(attempts))]
    AllProvidersFailed { attempts: Vec<ProviderFailure> },
}

fn describe_attempts(attempts: &[ProviderFailure]) -> String {
    if attempts.is_empty() {
        return "none were available".to_string();
    }
    attempts
        .iter()
        .map(|a| format!("{} ({})", a.provider, a.kind))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Drives one generation call through the provider lineup.
pub struct FailoverEngine {
    registry: SharedProviderRegistry,
    /// Per-provider deadline overrides from configuration profiles.
    profile_deadlines: HashMap<String, Duration>,
    /// Per-provider default max tokens, used when the call supplies none.
    profile_max_tokens: HashMap<String, u32>,
}

impl FailoverEngine {
    pub fn new(registry: SharedProviderRegistry) -> Self {
        Self {
            registry,
            profile_deadlines: HashMap::new(),
            profile_max_tokens: HashMap::new(),
        }
    }

    pub fn with_profile_deadlines(mut self, deadlines: HashMap<String, Duration>) -> Self {
        self.profile_deadlines = deadlines;
        self
    }

    pub fn with_profile_max_tokens(mut self, max_tokens: HashMap<String, u32>) -> Self {
        self.profile_max_tokens = max_tokens;
        self
    }

    /// Run one call with no pre-excluded providers.
    pub async fn run(
        &self,
        request: &GenerationRequest,
        explicit_override: Option<&str>,
    ) -> Result<Generation, FailoverError> {
        self.run_with_exclusions(request, explicit_override, HashSet::new())
            .await
    }

    /// Run one call, never attempting any provider named in `excluded`.
    ///
    /// Failure policy per attempt: `RateLimited` bars the provider for the
    /// rest of this call only (it stays eligible on the next top-level call);
    /// every other kind bars it for this call too. An answer that is empty or
    /// whitespace counts as `Malformed`. First success returns immediately.
    pub async fn run_with_exclusions(
        &self,
        request: &GenerationRequest,
        explicit_override: Option<&str>,
        mut excluded: HashSet<String>,
    ) -> Result<Generation, FailoverError> {
        if self.registry.is_empty() {
            return Err(FailoverError::NoProvidersRegistered);
        }

        // Rate-limited names live in their own set so the caller-supplied
        // exclusions keep their cross-call meaning.
        let mut rate_limited: HashSet<String> = HashSet::new();
        let mut attempts: Vec<ProviderFailure> = Vec::new();

        loop {
            let barred: HashSet<String> = excluded.union(&rate_limited).cloned().collect();
            let Some(provider) =
                selector::select_excluding(&self.registry, explicit_override, &barred).await
            else {
                break;
            };

            let name = provider.name().to_string();
            let profile_deadline = self.profile_deadlines.get(&name).copied();

            // Profile defaults fill in for options the call left unset.
            let mut attempt = request.clone();
            if attempt.options.max_tokens.is_none() {
                attempt.options.max_tokens = self.profile_max_tokens.get(&name).copied();
            }

            match executor::execute(provider.as_ref(), &attempt, profile_deadline).await {
                Ok(generation) if generation.text.trim().is_empty() => {
                    warn!(provider = %name, "empty response, treating as malformed");
                    attempts.push(ProviderFailure::new(
                        FailureKind::Malformed,
                        &name,
                        "provider returned an empty response",
                    ));
                    excluded.insert(name);
                }
                Ok(generation) => {
                    info!(
                        provider = %name,
                        failed_attempts = attempts.len(),
                        "generation succeeded"
                    );
                    return Ok(generation);
                }
                Err(failure) => {
                    if failure.kind == FailureKind::RateLimited {
                        debug!(provider = %name, "rate limited, skipping for this call only");
                        rate_limited.insert(name);
                    } else {
                        debug!(provider = %name, kind = %failure.kind, "excluding for this call");
                        excluded.insert(name);
                    }
                    attempts.push(failure);
                }
            }
        }

        warn!(
            attempted = attempts.len(),
            "every provider is excluded or unavailable"
        );
        Err(FailoverError::AllProvidersFailed { attempts })
    }
}
