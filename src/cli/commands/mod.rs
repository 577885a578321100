//! CLI command implementations.

pub mod run;
pub mod solve;

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::application::{
    ControllerConfig, ExecutionController, ExitReporter, IssueSolver, SessionMode, SolverConfig,
};
use crate::domain::models::Config;
use crate::domain::ports::IssueTracker;
use crate::infrastructure::agent::{ClaudeCodeAgent, ClaudeCodeConfig};
use crate::infrastructure::git::GitCli;
use crate::infrastructure::github::GithubClient;

/// Wire the GitHub, git and agent adapters into a solver.
pub(crate) fn build_solver(
    config: &Config,
    exit_reporter: Arc<ExitReporter>,
    session_mode: SessionMode,
) -> Result<(Arc<dyn IssueTracker>, IssueSolver)> {
    let tracker: Arc<dyn IssueTracker> = Arc::new(
        GithubClient::from_env(&config.github.api_base).context("creating GitHub client")?,
    );
    let agent = Arc::new(ClaudeCodeAgent::new(ClaudeCodeConfig::from(&config.agent)));
    let controller = ExecutionController::new(agent, ControllerConfig::from(&config.retry));
    let solver = IssueSolver::new(
        Arc::clone(&tracker),
        Arc::new(GitCli::new()),
        controller,
        exit_reporter,
        SolverConfig::from(config),
        session_mode,
    );
    Ok((tracker, solver))
}

