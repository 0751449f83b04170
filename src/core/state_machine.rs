//! Stage tracking for a release pipeline execution
//!
//! Stages only move forward. Any stage may be skipped (a supplied run ID
//! skips tagging, a prerelease goes from tagging to success) but none may be
//! revisited. The history is kept in memory and returned with the report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Pipeline stage
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReleaseStage {
    Initial,
    Tagging,
    AwaitingRun,
    RetrievingArtifacts,
    Publishing,
    Success,
    Failed,
}

impl ReleaseStage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }
}

impl fmt::Display for ReleaseStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Initial => "initial",
            Self::Tagging => "tagging",
            Self::AwaitingRun => "awaiting run",
            Self::RetrievingArtifacts => "retrieving artifacts",
            Self::Publishing => "publishing",
            Self::Success => "success",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// State transition
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StageTransition {
    pub from: ReleaseStage,
    pub to: ReleaseStage,
    pub timestamp: DateTime<Utc>,
}

/// Forward-only stage tracker
#[derive(Debug, Clone)]
pub struct ReleaseStateMachine {
    current: ReleaseStage,
    transitions: Vec<StageTransition>,
}

impl Default for ReleaseStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl ReleaseStateMachine {
    pub fn new() -> Self {
        Self {
            current: ReleaseStage::Initial,
            transitions: Vec::new(),
        }
    }

    pub fn current(&self) -> ReleaseStage {
        self.current
    }

    pub fn transitions(&self) -> &[StageTransition] {
        &self.transitions
    }

    /// Whether `to` may follow the current stage
    pub fn can_transition(&self, to: ReleaseStage) -> bool {
        !self.current.is_terminal() && to > self.current
    }

    /// Move to `to`; returns `false` (and stays put) when the move would go
    /// backwards or leave a terminal stage
    pub fn transition(&mut self, to: ReleaseStage) -> bool {
        if !self.can_transition(to) {
            return false;
        }
        debug!(from = %self.current, to = %to, "stage transition");
        self.transitions.push(StageTransition {
            from: self.current,
            to,
            timestamp: Utc::now(),
        });
        self.current = to;
        true
    }

    /// Stage the pipeline was in when it failed, if it failed
    pub fn failed_during(&self) -> Option<ReleaseStage> {
        match self.transitions.last() {
            Some(last) if last.to == ReleaseStage::Failed => Some(last.from),
            _ => None,
        }
    }
}
