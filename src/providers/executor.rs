//! Bounded execution of a single provider call.
//!
//! Races the call against a deadline timer. If the timer fires first the
//! call's future is dropped and a `Timeout` failure is produced. Abandonment
//! is logical only: if the backend has no cancellation primitive the
//! underlying work may keep running, which is a documented best-effort
//! limitation (subprocess adapters reap their child on drop).

use std::time::Duration;

use tracing::{debug, warn};

use super::{
    classify_error_message, FailureKind, Generation, GenerationOptions, GenerationRequest,
    ProviderFailure, TextProvider,
};

/// Conservative fallback deadline when neither the call nor the provider
/// profile supplies one.
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(120);

/// Effective deadline for one call: per-call option, then profile, then default.
pub fn resolve_deadline(options: &GenerationOptions, profile: Option<Duration>) -> Duration {
    options.timeout.or(profile).unwrap_or(DEFAULT_DEADLINE)
}

/// Run one provider call under a deadline.
///
/// Success wraps the text with the provider's name. Provider errors are
/// classified into a [`ProviderFailure`]; a fired deadline becomes
/// [`FailureKind::Timeout`]. Worst-case latency per attempt is bounded by the
/// deadline regardless of how the backend behaves.
pub async fn execute(
    provider: &dyn TextProvider,
    request: &GenerationRequest,
    profile_deadline: Option<Duration>,
) -> Result<Generation, ProviderFailure> {
    let deadline = resolve_deadline(&request.options, profile_deadline);
    let name = provider.name().to_string();
    debug!(provider = %name, deadline_secs = deadline.as_secs(), "executing provider call");

    let call = provider.generate_text(&request.prompt, &request.options);
    match tokio::time::timeout(deadline, call).await {
        Ok(Ok(text)) => Ok(Generation {
            text,
            provider: name,
        }),
        Ok(Err(err)) => {
            let message = format!("{err:#}");
            let kind = classify_error_message(&message);
            warn!(provider = %name, kind = %kind, err = %message, "provider call failed");
            Err(ProviderFailure::new(kind, name, message))
        }
        Err(_) => {
            warn!(
                provider = %name,
                deadline_secs = deadline.as_secs(),
                "provider call exceeded deadline, abandoning"
            );
            Err(ProviderFailure::new(
                FailureKind::Timeout,
                name,
                format!("no response within {}s", deadline.as_secs()),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::time::Instant;

    struct NeverResolves;

    #[async_trait]
    impl TextProvider for NeverResolves {
        fn name(&self) -> &str {
            "stalled"
        }

        async fn is_available(&self) -> bool {
            true
        }

        async fn generate_text(
            &self,
            _prompt: &str,
            _options: &GenerationOptions,
        ) -> anyhow::Result<String> {
            std::future::pending().await
        }
    }

    struct Answers(&'static str);

    #[async_trait]
    impl TextProvider for Answers {
        fn name(&self) -> &str {
            "quick"
        }

        async fn is_available(&self) -> bool {
            true
        }

        async fn generate_text(
            &self,
            _prompt: &str,
            _options: &GenerationOptions,
        ) -> anyhow::Result<String> {
            Ok(self.0.to_string())
        }
    }

    struct RateLimits;

    #[async_trait]
    impl TextProvider for RateLimits {
        fn name(&self) -> &str {
            "limited"
        }

        async fn is_available(&self) -> bool {
            true
        }

        async fn generate_text(
            &self,
            _prompt: &str,
            _options: &GenerationOptions,
        ) -> anyhow::Result<String> {
            anyhow::bail!("HTTP 429: rate limit exceeded")
        }
    }

    fn request_with_timeout(ms: u64) -> GenerationRequest {
        GenerationRequest::with_options(
            "hello",
            GenerationOptions {
                timeout: Some(Duration::from_millis(ms)),
                ..Default::default()
            },
        )
    }

    #[tokio::test]
    async fn deadline_bounds_a_stalled_provider() {
        let started = Instant::now();
        let result = execute(&NeverResolves, &request_with_timeout(50), None).await;

        let failure = result.unwrap_err();
        assert_eq!(failure.kind, FailureKind::Timeout);
        assert_eq!(failure.provider, "stalled");
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn success_carries_the_provider_name() {
        let result = execute(&Answers("generated"), &GenerationRequest::new("hi"), None)
            .await
            .unwrap();
        assert_eq!(result.text, "generated");
        assert_eq!(result.provider, "quick");
    }

    #[tokio::test]
    async fn provider_errors_are_classified() {
        let failure = execute(&RateLimits, &GenerationRequest::new("hi"), None)
            .await
            .unwrap_err();
        assert_eq!(failure.kind, FailureKind::RateLimited);
    }

    #[test]
    fn deadline_resolution_prefers_call_then_profile_then_default() {
        let call = GenerationOptions {
            timeout: Some(Duration::from_secs(10)),
            ..Default::default()
        };
        assert_eq!(
            resolve_deadline(&call, Some(Duration::from_secs(30))),
            Duration::from_secs(10)
        );
        assert_eq!(
            resolve_deadline(&GenerationOptions::default(), Some(Duration::from_secs(30))),
            Duration::from_secs(30)
        );
        assert_eq!(
            resolve_deadline(&GenerationOptions::default(), None),
            DEFAULT_DEADLINE
        );
    }
}
