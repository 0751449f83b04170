//! Orchestration layer for releases
//!
//! This module sequences the release pipeline and talks to the CI system
//! about the workflow run that builds a release.

pub mod release_orchestrator;
pub mod workflow_run;

pub use release_orchestrator::ReleaseOrchestrator;
pub use workflow_run::{WorkflowRunResolver, DEFAULT_GRACE_PERIOD};
