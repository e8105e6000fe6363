//! Core run types for the orchestration loop.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique run identifier.
pub type RunId = Uuid;

/// Terminal status of a run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// The current agent answered without calling a tool.
    Completed,
    /// A fatal condition: unknown agent, provider failure.
    Failed,
    /// Stopped through a cancel handle or [`crate::Engine::stop`].
    Canceled,
    /// The step ceiling was reached before a plain answer.
    MaxStepsExceeded,
}

/// Result of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub status: RunStatus,
    /// Model invocations made by the run.
    pub steps: usize,
    /// The answer that ended the run, when it completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub finished_at: DateTime<Utc>,
}

impl RunResult {
    fn new(status: RunStatus, steps: usize) -> Self {
        Self {
            status,
            steps,
            final_text: None,
            error: None,
            finished_at: Utc::now(),
        }
    }

    pub fn completed(steps: usize, text: impl Into<String>) -> Self {
        Self {
            final_text: Some(text.into()),
            ..Self::new(RunStatus::Completed, steps)
        }
    }

    pub fn canceled(steps: usize) -> Self {
        Self::new(RunStatus::Canceled, steps)
    }

    pub fn failed(steps: usize, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::new(RunStatus::Failed, steps)
        }
    }

    pub fn max_steps_exceeded(steps: usize, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::new(RunStatus::MaxStepsExceeded, steps)
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == RunStatus::Completed
    }
}
