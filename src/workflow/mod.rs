// SPDX-License-Identifier: MIT
//! Bounded multi-stage agent workflow.
//!
//! A workflow runs a configured sequence of named stages ("agents") against
//! one user prompt. The engine executes stages through the [`StageRunner`]
//! seam, the intent resolver scores each output to decide the next
//! transition, and the coordinator keeps the ordered message log, mirrored
//! to a best-effort daily journal.

pub mod coordinator;
pub mod engine;
pub mod intent;
pub mod journal;
pub mod stage;

pub use coordinator::{AgentMessage, MessageKind, WorkflowCoordinator};
pub use engine::{WorkflowEngine, WorkflowReport, WorkflowState};
pub use intent::{Intent, IntentAction, IntentResolver, IntentThresholds};
pub use journal::MessageJournal;
pub use stage::StageRunner;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

fn default_agents() -> Vec<String> {
    ["planner", "implementer", "reviewer"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_retry_limit() -> u32 {
    2
}

fn default_auto_transition() -> bool {
    true
}

/// Immutable workflow parameters, supplied once at workflow start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Stage names, executed in this order.
    #[serde(default = "default_agents")]
    pub agents: Vec<String>,
    /// Retry budget shared across the whole run, not per stage.
    #[serde(default = "default_retry_limit")]
    pub retry_limit: u32,
    /// When false the engine stops after the first stage completes.
    #[serde(default = "default_auto_transition")]
    pub auto_transition: bool,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            agents: default_agents(),
            retry_limit: default_retry_limit(),
            auto_transition: default_auto_transition(),
        }
    }
}

/// Rolling context threaded by value through the engine. Each stage reads it
/// and produces a new context with its own output merged in.
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    pub user_prompt: String,
    /// Stage name → the output that stage produced.
    pub previous_outputs: HashMap<String, String>,
    pub retry_count: u32,
}

impl ExecutionContext {
    pub fn new(user_prompt: impl Into<String>) -> Self {
        Self {
            user_prompt: user_prompt.into(),
            previous_outputs: HashMap::new(),
            retry_count: 0,
        }
    }

    /// New context with `stage`'s output merged in.
    pub fn with_output(mut self, stage: &str, output: impl Into<String>) -> Self {
        self.previous_outputs.insert(stage.to_string(), output.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_to_three_stage_pipeline() {
        let config = WorkflowConfig::default();
        assert_eq!(config.agents, vec!["planner", "implementer", "reviewer"]);
        assert_eq!(config.retry_limit, 2);
        assert!(config.auto_transition);
    }

    #[test]
    fn empty_toml_section_fills_every_default() {
        let config: WorkflowConfig = toml::from_str("").unwrap();
        assert_eq!(config.agents.len(), 3);
        assert_eq!(config.retry_limit, 2);
    }

    #[test]
    fn with_output_merges_without_touching_the_prompt() {
        let ctx = ExecutionContext::new("build a landing page")
            .with_output("planner", "1. hero section")
            .with_output("implementer", "<html/>");

        assert_eq!(ctx.user_prompt, "build a landing page");
        assert_eq!(ctx.previous_outputs.len(), 2);
        assert_eq!(
            ctx.previous_outputs.get("planner").map(String::as_str),
            Some("1. hero section")
        );
    }
}
