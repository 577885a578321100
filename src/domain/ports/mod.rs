//! Port trait definitions (Hexagonal Architecture)
//!
//! This module defines async trait interfaces that infrastructure adapters must implement:
//! - IssueTracker: backlog, comments and pull requests
//! - VersionControl: local working copies
//! - AgentProcess: the coding agent
//!
//! These traits keep the orchestration engine independent of GitHub, git and
//! the agent CLI.

pub mod agent_process;
pub mod issue_tracker;
pub mod version_control;

pub use agent_process::{AgentProcess, AgentRun};
pub use issue_tracker::{IssueTracker, NewPullRequest};
pub use version_control::VersionControl;
