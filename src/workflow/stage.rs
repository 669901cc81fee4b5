// SPDX-License-Identifier: MIT
//! The seam between the workflow engine and whatever executes a stage.

use anyhow::Result;
use async_trait::async_trait;

use crate::orchestrator::SharedOrchestrator;
use crate::providers::GenerationRequest;

use super::ExecutionContext;

/// Common interface for anything that can run one pipeline stage.
///
/// The engine depends only on this contract; production routes through the
/// provider orchestrator, tests inject scripted stubs.
#[async_trait]
pub trait StageRunner: Send + Sync {
    /// Run the named stage against the current context and return its output.
    async fn run_stage(&self, agent: &str, ctx: &ExecutionContext) -> Result<String>;
}

/// Production runner: formats a role prompt for the stage and routes it
/// through the orchestrator's failover pipeline.
pub struct GenerationStageRunner {
    orchestrator: SharedOrchestrator,
}

impl GenerationStageRunner {
    pub fn new(orchestrator: SharedOrchestrator) -> Self {
        Self { orchestrator }
    }
}

#[async_trait]
impl StageRunner for GenerationStageRunner {
    async fn run_stage(&self, agent: &str, ctx: &ExecutionContext) -> Result<String> {
        let prompt = stage_prompt(agent, ctx);
        let generation = self
            .orchestrator
            .generate_text(GenerationRequest::new(prompt))
            .await?;
        Ok(generation.text)
    }
}

/// Role prompt for one stage: a role line, the task, and the outputs of the
/// stages that already ran.
pub fn stage_prompt(agent: &str, ctx: &ExecutionContext) -> String {
    let role = match agent {
        "planner" => "You are the planner. Break the task into concrete build steps.",
        "implementer" => "You are the implementer. Produce complete, runnable code for the plan.",
        "reviewer" => "You are the reviewer. Check the work so far and fix any problems you find.",
        other => {
            return format!(
                "You are the `{other}` stage of a site-scaffolding pipeline.\n\nTask: {}{}",
                ctx.user_prompt,
                prior_outputs_block(ctx)
            );
        }
    };
    format!("{role}\n\nTask: {}{}", ctx.user_prompt, prior_outputs_block(ctx))
}

fn prior_outputs_block(ctx: &ExecutionContext) -> String {
    if ctx.previous_outputs.is_empty() {
        return String::new();
    }
    let mut block = String::from("\n\nWork from earlier stages:");
    // Sorted for a stable prompt; HashMap iteration order is arbitrary.
    let mut stages: Vec<_> = ctx.previous_outputs.iter().collect();
    stages.sort_by(|a, b| a.0.cmp(b.0));
    for (stage, output) in stages {
        block.push_str(&format!("\n--- {stage} ---\n{output}"));
    }
    block
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_roles_get_their_own_instructions() {
        let ctx = ExecutionContext::new("build a blog");
        let prompt = stage_prompt("planner", &ctx);
        assert!(prompt.contains("You are the planner"));
        assert!(prompt.contains("Task: build a blog"));
        assert!(!prompt.contains("earlier stages"));
    }

    #[test]
    fn unknown_roles_fall_back_to_a_generic_line() {
        let ctx = ExecutionContext::new("build a blog");
        let prompt = stage_prompt("stylist", &ctx);
        assert!(prompt.contains("`stylist` stage"));
    }

    #[test]
    fn prior_outputs_are_appended_in_stable_order() {
        let ctx = ExecutionContext::new("build a blog")
            .with_output("planner", "1. posts page")
            .with_output("implementer", "<html/>");
        let prompt = stage_prompt("reviewer", &ctx);

        let planner_at = prompt.find("--- planner ---").unwrap();
        let implementer_at = prompt.find("--- implementer ---").unwrap();
        assert!(implementer_at < planner_at, "sorted alphabetically");
        assert!(prompt.contains("1. posts page"));
    }
}
