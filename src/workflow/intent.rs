// SPDX-License-Identifier: MIT
//! Intent resolution: score a stage's output and propose the next action.
//!
//! Confidence is an additive heuristic in [0.0, 1.0] — approximate by
//! design, not a correctness oracle. The score gains weight from evidence
//! that the output is substantial:
//!
//! | Signal                               | Weight |
//! |--------------------------------------|--------|
//! | Substantial length (≥ 200 chars)     | +0.30  |
//! |   (moderate length, ≥ 60 chars)      | +0.15  |
//! | Multi-line structure (≥ 3 lines)     | +0.20  |
//! | Code fence or declaration present    | +0.30  |
//! | No refusal phrasing                  | +0.20  |
//! | Echoes the prompt verbatim           | −0.40  |
//!
//! The action thresholds are configuration, not constants: the defaults
//! (0.3 / 0.6 / 0.8) have no calibration data behind them and are meant to
//! be tuned per deployment.

use serde::{Deserialize, Serialize};

use super::ExecutionContext;

// ─── Types ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentAction {
    /// Advance to the next stage.
    Continue,
    /// Retry the same stage with an augmented prompt.
    Refine,
    /// The workflow may terminate successfully.
    Complete,
}

impl std::fmt::Display for IntentAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IntentAction::Continue => write!(f, "continue"),
            IntentAction::Refine => write!(f, "refine"),
            IntentAction::Complete => write!(f, "complete"),
        }
    }
}

/// A scored judgment of one stage output. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Intent {
    pub action: IntentAction,
    /// Confidence in [0.0, 1.0].
    pub confidence: f32,
    /// Human-readable list of the signals that fired.
    pub reason: String,
    /// Suggested improvements, used to augment the prompt on `Refine`.
    pub next_steps: Vec<String>,
}

fn default_refine_below() -> f32 {
    0.3
}

fn default_advance_above() -> f32 {
    0.6
}

fn default_complete_above() -> f32 {
    0.8
}

/// Action cutoffs. Tunable configuration with uncalibrated defaults.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct IntentThresholds {
    /// Below this the stage retries with an augmented prompt.
    #[serde(default = "default_refine_below")]
    pub refine_below: f32,
    /// A `Continue` above this also triggers the next agent.
    #[serde(default = "default_advance_above")]
    pub advance_above: f32,
    /// Above this the workflow may terminate successfully.
    #[serde(default = "default_complete_above")]
    pub complete_above: f32,
}

impl Default for IntentThresholds {
    fn default() -> Self {
        Self {
            refine_below: default_refine_below(),
            advance_above: default_advance_above(),
            complete_above: default_complete_above(),
        }
    }
}

// ─── Resolver ─────────────────────────────────────────────────────────────────

/// Scores stage outputs against the configured stage sequence. Synchronous,
/// no AI calls.
pub struct IntentResolver {
    agents: Vec<String>,
    thresholds: IntentThresholds,
}

impl IntentResolver {
    pub fn new(agents: Vec<String>, thresholds: IntentThresholds) -> Self {
        Self { agents, thresholds }
    }

    pub fn thresholds(&self) -> &IntentThresholds {
        &self.thresholds
    }

    /// Score `output` and propose the next action.
    pub fn analyze(&self, output: &str, ctx: &ExecutionContext) -> Intent {
        let trimmed = output.trim();
        if trimmed.is_empty() {
            return Intent {
                action: IntentAction::Refine,
                confidence: 0.0,
                reason: "empty output".to_string(),
                next_steps: vec!["produce a non-empty response to the stage prompt".to_string()],
            };
        }

        let mut confidence = 0.0_f32;
        let mut signals: Vec<&'static str> = Vec::new();
        let mut next_steps: Vec<String> = Vec::new();

        // ── Signal 1: substantial content ─────────────────────────────────────
        if trimmed.len() >= 200 {
            confidence += 0.30;
            signals.push("substantial length");
        } else if trimmed.len() >= 60 {
            confidence += 0.15;
            signals.push("moderate length");
            next_steps.push("expand the output with more detail".to_string());
        } else {
            next_steps.push("expand the output with more detail".to_string());
        }

        // ── Signal 2: multi-line structure ────────────────────────────────────
        if trimmed.lines().count() >= 3 {
            confidence += 0.20;
            signals.push("multi-line structure");
        } else {
            next_steps.push("structure the output across multiple lines".to_string());
        }

        // ── Signal 3: code presence ───────────────────────────────────────────
        if looks_like_code(trimmed) {
            confidence += 0.30;
            signals.push("contains code");
        } else {
            next_steps.push("include a fenced code block".to_string());
        }

        // ── Signal 4: no refusal phrasing ─────────────────────────────────────
        if contains_refusal(trimmed) {
            next_steps.push("answer the request directly instead of refusing".to_string());
        } else {
            confidence += 0.20;
            signals.push("no refusal phrasing");
        }

        // ── Signal 5: prompt echo ─────────────────────────────────────────────
        if !ctx.user_prompt.trim().is_empty() && trimmed == ctx.user_prompt.trim() {
            confidence -= 0.40;
            signals.push("echoes the prompt verbatim");
            next_steps.push("produce new content rather than restating the request".to_string());
        }

        let confidence = confidence.clamp(0.0, 1.0);
        let action = if confidence < self.thresholds.refine_below {
            IntentAction::Refine
        } else if confidence > self.thresholds.complete_above {
            IntentAction::Complete
        } else {
            IntentAction::Continue
        };

        let reason = if signals.is_empty() {
            "no quality signals fired".to_string()
        } else {
            format!("signals: {}", signals.join(", "))
        };

        Intent {
            action,
            confidence,
            reason,
            next_steps,
        }
    }

    /// True when the workflow should hand off to the next stage.
    pub fn should_trigger_next_agent(&self, intent: &Intent) -> bool {
        match intent.action {
            IntentAction::Complete => true,
            IntentAction::Continue => intent.confidence > self.thresholds.advance_above,
            IntentAction::Refine => false,
        }
    }

    /// First configured stage with no output yet; `None` when all are done.
    pub fn next_agent(&self, ctx: &ExecutionContext) -> Option<&str> {
        self.agents
            .iter()
            .find(|a| !ctx.previous_outputs.contains_key(a.as_str()))
            .map(String::as_str)
    }
}

fn looks_like_code(text: &str) -> bool {
    if text.contains("```") || text.contains("=>") || text.contains("</") {
        return true;
    }
    text.lines().any(|line| {
        let line = line.trim_start();
        line.starts_with("function ")
            || line.starts_with("class ")
            || line.starts_with("const ")
            || line.starts_with("let ")
            || line.starts_with("import ")
            || line.starts_with("export ")
    })
}

fn contains_refusal(text: &str) -> bool {
    let lower = text.to_lowercase();
    ["i cannot", "i can't", "i am unable", "i'm unable", "as an ai"]
        .iter()
        .any(|phrase| lower.contains(phrase))
}

// ─── Tests ────────────────────────────────────────────────────────────────────
