//! siteforge — provider orchestration and bounded agent workflows for
//! AI-assisted web scaffolding.
//!
//! Two independent cores:
//!
//! - [`providers`] + [`response`] + [`orchestrator`]: select among
//!   interchangeable text-generation backends, bound each call with a
//!   deadline, fail over sequentially on classified errors, and normalize
//!   free-form model output into a usable code payload.
//! - [`workflow`]: a retryable multi-stage pipeline whose transitions are
//!   decided by heuristically scored intents, with an append-only message
//!   log mirrored to a daily journal.

pub mod config;
pub mod orchestrator;
pub mod providers;
pub mod response;
pub mod workflow;

pub use orchestrator::{Orchestrator, SharedOrchestrator};
