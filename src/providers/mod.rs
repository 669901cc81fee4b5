//! Text-generation provider contract, failure taxonomy, and orchestration layers.
//!
//! Every backend — a local AI CLI, an OpenAI-compatible HTTP endpoint — is
//! collapsed behind the single [`TextProvider`] capability trait. The
//! orchestration layers above it (`selector`, `executor`, `failover`) depend
//! only on this contract, never on a specific backend's wire format.

pub mod adapters;
pub mod executor;
pub mod failover;
pub mod registry;
pub mod selector;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

// ─── Request / result types ───────────────────────────────────────────────────

/// Tuning knobs for a single generation call.
///
/// All fields are optional; unset fields fall back to the provider profile
/// and then to built-in defaults.
#[derive(Debug, Clone, Default)]
pub struct GenerationOptions {
    /// Sampling temperature forwarded to the backend.
    pub temperature: Option<f32>,
    /// Maximum tokens to generate.
    pub max_tokens: Option<u32>,
    /// Per-call deadline. `None` = profile timeout, else [`executor::DEFAULT_DEADLINE`].
    pub timeout: Option<Duration>,
}

/// One generation request, constructed per orchestrated call.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub prompt: String,
    pub options: GenerationOptions,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            options: GenerationOptions::default(),
        }
    }

    pub fn with_options(prompt: impl Into<String>, options: GenerationOptions) -> Self {
        Self {
            prompt: prompt.into(),
            options,
        }
    }
}

/// The successful outcome of one orchestrated call: the generated text and
/// the name of the provider that produced it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Generation {
    pub text: String,
    pub provider: String,
}

// ─── Failure taxonomy ─────────────────────────────────────────────────────────

/// Why a single provider attempt failed.
///
/// The failover loop keys its exclusion policy off this: `RateLimited`
/// providers are skipped for the rest of the current call but stay eligible
/// for future calls; every other kind excludes the provider for the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The deadline fired before the backend answered.
    Timeout,
    /// The backend reported a rate limit (429-class).
    RateLimited,
    /// The backend reported exhausted funds or quota (402-class).
    PaymentRequired,
    /// The backend could not be reached or errored outright.
    Unavailable,
    /// The backend answered, but with nothing usable (empty response).
    Malformed,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::RateLimited => write!(f, "rate_limited"),
            FailureKind::PaymentRequired => write!(f, "payment_required"),
            FailureKind::Unavailable => write!(f, "unavailable"),
            FailureKind::Malformed => write!(f, "malformed"),
        }
    }
}

/// A classified failure from one provider attempt.
///
/// Collected by the failover loop; the full ordered list is surfaced to the
/// caller when every provider has been exhausted.
#[derive(Debug, Clone, Serialize, thiserror::Error)]
#[serde(rename_all = "camelCase")]
#[error("{provider}: {kind}: {message}")]
pub struct ProviderFailure {
    pub kind: FailureKind,
    pub provider: String,
    pub message: String,
}

impl ProviderFailure {
    pub fn new(
        kind: FailureKind,
        provider: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            provider: provider.into(),
            message: message.into(),
        }
    }
}

/// Classify an adapter error message into a [`FailureKind`].
///
/// Backends report rate limits and billing problems as free-form text (CLI
/// stderr, HTTP error bodies), so classification is message sniffing —
/// structured markers first, then provider-specific phrasings, then
/// `Unavailable` as the catch-all.
pub fn classify_error_message(message: &str) -> FailureKind {
    let lower = message.to_lowercase();

    // Structured markers (highest confidence).
    if lower.contains("\"type\":\"rate_limit_error\"")
        || lower.contains("status: 429")
        || lower.contains("http 429")
        || lower.contains("status\":429")
    {
        return FailureKind::RateLimited;
    }
    if lower.contains("status: 402") || lower.contains("http 402") || lower.contains("status\":402")
    {
        return FailureKind::PaymentRequired;
    }

    // Provider phrasings.
    if lower.contains("rate limit") || lower.contains("rate_limit") || lower.contains("too many requests")
    {
        return FailureKind::RateLimited;
    }
    if lower.contains("payment required")
        || lower.contains("insufficient funds")
        || lower.contains("insufficient credit")
        || lower.contains("quota exceeded")
        || lower.contains("billing")
    {
        return FailureKind::PaymentRequired;
    }

    FailureKind::Unavailable
}

// ─── Capability contract ──────────────────────────────────────────────────────

/// Common interface every backend adapter must satisfy.
///
/// The orchestration core depends only on this contract. Availability probes
/// must swallow their own errors: a probe that cannot reach the backend
/// returns `false`, it never propagates.
#[async_trait]
pub trait TextProvider: Send + Sync {
    /// Stable provider name, used for selection, logging, and failure reports.
    fn name(&self) -> &str;

    /// Cheap availability probe. `false` on any internal error.
    async fn is_available(&self) -> bool;

    /// Run one generation turn. Errors are free-form here; the failover loop
    /// classifies them via [`classify_error_message`].
    async fn generate_text(&self, prompt: &str, options: &GenerationOptions)
        -> anyhow::Result<String>;
}

// ─── Tests ────────────────────────────────────────────────────────────────────
