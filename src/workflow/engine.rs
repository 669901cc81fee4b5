// SPDX-License-Identifier: MIT
//! Workflow engine state machine.
//!
//! `Idle -> Executing -> {Transitioning | Retrying | Completed | Failed}`,
//! with `Transitioning -> Executing` and `Retrying -> Executing` making
//! `Executing` re-entrant. Terminal states: `Completed`, `Failed`. Total
//! stage invocations are hard-capped at `agents.len() * 2`, independent of
//! the retry budget.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::coordinator::{AgentMessage, MessageKind, WorkflowCoordinator};
use super::intent::{IntentAction, IntentResolver, IntentThresholds};
use super::journal::MessageJournal;
use super::stage::StageRunner;
use super::{ExecutionContext, WorkflowConfig};

/// Name the engine signs coordinator messages with.
pub const WORKFLOW_ACTOR: &str = "workflow";

// ─── States and report ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    Idle,
    Executing,
    Transitioning,
    Retrying,
    Completed,
    Failed,
}

impl std::fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            WorkflowState::Idle => "idle",
            WorkflowState::Executing => "executing",
            WorkflowState::Transitioning => "transitioning",
            WorkflowState::Retrying => "retrying",
            WorkflowState::Completed => "completed",
            WorkflowState::Failed => "failed",
        };
        write!(f, "{name}")
    }
}

/// What a finished run produced.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowReport {
    pub state: WorkflowState,
    /// Stage name → output, for every stage that completed.
    pub outputs: HashMap<String, String>,
    pub retry_count: u32,
    pub invocations: u32,
    /// True when the run completed, or failed but still produced something.
    pub success: bool,
}

// ─── Engine ───────────────────────────────────────────────────────────────────

pub struct WorkflowEngine {
    config: WorkflowConfig,
    resolver: IntentResolver,
    coordinator: WorkflowCoordinator,
    runner: Arc<dyn StageRunner>,
    state: WorkflowState,
}

impl WorkflowEngine {
    pub fn new(
        config: WorkflowConfig,
        thresholds: IntentThresholds,
        runner: Arc<dyn StageRunner>,
    ) -> Self {
        let resolver = IntentResolver::new(config.agents.clone(), thresholds);
        let coordinator = WorkflowCoordinator::new(config.agents.clone());
        Self {
            config,
            resolver,
            coordinator,
            runner,
            state: WorkflowState::Idle,
        }
    }

    /// Mirror every coordinator message to a daily journal.
    pub fn with_journal(mut self, journal: MessageJournal) -> Self {
        self.coordinator = self.coordinator.with_journal(journal);
        self
    }

    pub fn state(&self) -> WorkflowState {
        self.state
    }

    pub fn coordinator(&self) -> &WorkflowCoordinator {
        &self.coordinator
    }

    /// Drive the stage sequence to a terminal state and report.
    pub async fn run(&mut self, user_prompt: &str) -> WorkflowReport {
        if self.config.agents.is_empty() {
            warn!("workflow has no stages configured");
            self.state = WorkflowState::Failed;
            return WorkflowReport {
                state: self.state,
                outputs: HashMap::new(),
                retry_count: 0,
                invocations: 0,
                success: false,
            };
        }

        let max_invocations = (self.config.agents.len() * 2) as u32;
        let original_task = user_prompt.to_string();
        let mut ctx = ExecutionContext::new(user_prompt);
        // Refinements rewrite the prompt from this base so it never grows
        // unboundedly across retries of the same stage.
        let mut stage_base = ctx.user_prompt.clone();
        let mut stage_idx = 0usize;
        let mut invocations = 0u32;

        loop {
            if invocations >= max_invocations {
                warn!(
                    invocations,
                    cap = max_invocations,
                    "invocation cap reached, ending run with partial outputs"
                );
                self.state = WorkflowState::Completed;
                break;
            }
            self.state = WorkflowState::Executing;
            invocations += 1;
            let agent = self.config.agents[stage_idx].clone();
            debug!(stage = %agent, invocation = invocations, "executing stage");

            self.coordinator
                .send(AgentMessage::draft(
                    WORKFLOW_ACTOR,
                    &agent,
                    MessageKind::Request,
                    &ctx.user_prompt,
                ))
                .await;

            let output = match self.runner.run_stage(&agent, &ctx).await {
                Ok(output) => output,
                Err(err) => {
                    let rendered = format!("{err:#}");
                    warn!(stage = %agent, err = %rendered, "stage execution failed");
                    self.coordinator
                        .send(AgentMessage::draft(
                            &agent,
                            WORKFLOW_ACTOR,
                            MessageKind::Error,
                            &rendered,
                        ))
                        .await;
                    if ctx.retry_count < self.config.retry_limit {
                        ctx.retry_count += 1;
                        self.state = WorkflowState::Retrying;
                        continue;
                    }
                    self.state = WorkflowState::Failed;
                    break;
                }
            };

            ctx = ctx.with_output(&agent, output.clone());
            let intent = self.resolver.analyze(&output, &ctx);
            info!(
                stage = %agent,
                action = %intent.action,
                confidence = intent.confidence,
                "stage output scored"
            );
            self.coordinator
                .send(AgentMessage::draft(
                    &agent,
                    WORKFLOW_ACTOR,
                    MessageKind::Completion,
                    &output,
                ))
                .await;

            if self.config.auto_transition && self.resolver.should_trigger_next_agent(&intent) {
                let next = self.resolver.next_agent(&ctx).map(str::to_string);
                match next {
                    None => {
                        self.state = WorkflowState::Completed;
                        break;
                    }
                    Some(next) => {
                        ctx.user_prompt = transition_prompt(&original_task, &next);
                        stage_base = ctx.user_prompt.clone();
                        stage_idx = self
                            .config
                            .agents
                            .iter()
                            .position(|a| a == &next)
                            .unwrap_or(stage_idx);
                        self.state = WorkflowState::Transitioning;
                        continue;
                    }
                }
            }

            if intent.action == IntentAction::Refine && ctx.retry_count < self.config.retry_limit {
                ctx.retry_count += 1;
                ctx.user_prompt = refine_prompt(&stage_base, &intent.next_steps);
                self.state = WorkflowState::Retrying;
                continue;
            }

            // Refine budget spent, or a Continue not strong enough to advance:
            // the run ends with whatever has been accumulated.
            self.state = WorkflowState::Completed;
            break;
        }

        let success = self.state == WorkflowState::Completed || !ctx.previous_outputs.is_empty();
        info!(
            state = %self.state,
            invocations,
            retries = ctx.retry_count,
            outputs = ctx.previous_outputs.len(),
            success,
            "workflow finished"
        );
        WorkflowReport {
            state: self.state,
            outputs: ctx.previous_outputs,
            retry_count: ctx.retry_count,
            invocations,
            success,
        }
    }
}

fn transition_prompt(original_task: &str, next_agent: &str) -> String {
    format!("{original_task}\n\nBuild on the completed stages and continue as the `{next_agent}` stage.")
}

fn refine_prompt(stage_base: &str, next_steps: &[String]) -> String {
    if next_steps.is_empty() {
        return format!("{stage_base}\n\nThe previous answer was not good enough. Improve it.");
    }
    let steps = next_steps
        .iter()
        .map(|s| format!("- {s}"))
        .collect::<Vec<_>>()
        .join("\n");
    format!("{stage_base}\n\nThe previous answer was not good enough. Address these points:\n{steps}")
}

// ─── Tests ────────────────────────────────────────────────────────────────────
