//! Execution domain model.
//!
//! One execution is a single agent invocation against one work item,
//! possibly retried several times by the execution controller.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::work_item::WorkItemId;

/// Why an attempt did not succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    /// The account hit its usage limit; retrying before reset is pointless
    UsageLimitExceeded,
    /// The agent's upstream reported it was overloaded
    Overload,
    /// Upstream connectivity failed (503, connection resets)
    TransientNetwork,
    /// Nothing happened but the diagnostic stream carried errors
    SilentFailure,
    /// Credentials were rejected
    FatalAuth,
    /// Any other failing run
    ProcessFailed,
}

impl FailureClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UsageLimitExceeded => "usage_limit_exceeded",
            Self::Overload => "overload",
            Self::TransientNetwork => "transient_network",
            Self::SilentFailure => "silent_failure",
            Self::FatalAuth => "fatal_auth",
            Self::ProcessFailed => "process_failed",
        }
    }

    /// Classes the controller may retry, subject to their policy.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Overload | Self::TransientNetwork)
    }

    /// Auth failures must not trigger automatic tracker comments.
    pub fn allows_tracker_comments(&self) -> bool {
        !matches!(self, Self::FatalAuth)
    }
}

impl fmt::Display for FailureClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One try of the agent inside an execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attempt {
    pub item_id: WorkItemId,
    /// 1-based
    pub attempt_number: u32,
    pub failure_class: Option<FailureClass>,
    /// Wait applied after this attempt before the next one; 0 when none
    pub backoff_delay_ms: u64,
}

/// What the agent should do.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskPayload {
    pub prompt: String,
    pub system_prompt: String,
    pub model: String,
}

/// Everything an execution needs to know about the item it runs against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemContext {
    pub item_id: WorkItemId,
    pub owner: String,
    pub repo: String,
    pub item_number: u64,
    pub branch: String,
    pub working_dir: PathBuf,
    pub payload: TaskPayload,
    /// Session to resume instead of starting fresh
    pub resume_session_id: Option<String>,
}

/// Outcome of one execution, after all retries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub success: bool,
    pub session_id: Option<String>,
    pub limit_reached: bool,
    pub limit_reset_time: Option<String>,
    pub message_count: u64,
    pub tool_use_count: u64,
    pub failure_class: Option<FailureClass>,
    /// Total cost reported by the agent, in US dollars
    pub cost_estimate_usd: Option<f64>,
    /// Final textual result or error message from the agent
    pub result_text: Option<String>,
    pub attempts: Vec<Attempt>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl ExecutionResult {
    pub fn total_backoff_ms(&self) -> u64 {
        self.attempts.iter().map(|a| a.backoff_delay_ms).sum()
    }
}
