//! Structured output of a coding agent process.

use serde::{Deserialize, Serialize};

/// One item yielded by a running agent process.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentOutput {
    /// A stdout line that parsed as a structured event
    Event(AgentEvent),
    /// A stdout line that was not structured
    Raw(String),
    /// A stderr line
    Diagnostic(String),
    /// The process exited; always the last item
    Exited { code: Option<i32> },
}

/// A structured event from the agent's stdout stream.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentEvent {
    /// Durable session identity, when the event carries one
    pub session_id: Option<String>,
    pub kind: AgentEventKind,
    /// The original line, kept for the session transcript
    pub raw: String,
}

/// What a structured event reports.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentEventKind {
    /// Session bookkeeping (`system`, `init`)
    System,
    /// An assistant turn with its text blocks and number of tool calls
    Assistant { texts: Vec<String>, tool_uses: u32 },
    /// A bare `message` event
    Message,
    /// A bare `tool_use` event
    ToolUse,
    /// A user turn, usually tool results
    User,
    /// Free text emitted outside an assistant turn
    Text(String),
    /// An error event
    Error(String),
    /// The terminal result object
    Result(AgentResult),
    /// Any other event type
    Other(String),
}

/// Terminal result payload reported by the agent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentResult {
    #[serde(default)]
    pub is_error: bool,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub total_cost_usd: Option<f64>,
}

impl AgentEventKind {
    /// Whether the event counts as a message for silent-failure detection.
    pub fn is_message(&self) -> bool {
        matches!(self, Self::Assistant { .. } | Self::Message)
    }

    pub fn tool_uses(&self) -> u32 {
        match self {
            Self::Assistant { tool_uses, .. } => *tool_uses,
            Self::ToolUse => 1,
            _ => 0,
        }
    }
}
