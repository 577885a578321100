//! `issuehive solve`: one issue in the foreground.

use std::sync::Arc;

use anyhow::Result;
use console::style;
use tracing::warn;

use super::build_solver;
use crate::application::{wait_for_termination, ExitReason, ExitReporter, SessionMode, SolveOutcome};
use crate::cli::output::TableFormatter;
use crate::cli::types::SolveArgs;
use crate::domain::models::{Config, IssueRef};

pub async fn execute(
    args: SolveArgs,
    config: Config,
    exit_reporter: Arc<ExitReporter>,
    json: bool,
) -> Result<ExitReason> {
    let issue = IssueRef::parse(&args.issue)?;
    let (_, solver) = build_solver(&config, exit_reporter, SessionMode::Reporting)?;

    // Dropping the solve future drops the agent run, which stops the child.
    let outcome = tokio::select! {
        outcome = solver.solve(&issue, args.resume.as_deref()) => outcome?,
        reason = wait_for_termination() => {
            warn!(?reason, issue = %issue, "interrupted, abandoning attempt");
            return Ok(reason);
        }
    };

    match outcome {
        SolveOutcome::Completed(result) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("{}", TableFormatter::new().format_execution_result(&result));
            }
            Ok(if result.success {
                ExitReason::Completed
            } else {
                ExitReason::Failed
            })
        }
        SolveOutcome::Skipped { reason } => {
            if json {
                println!("{}", serde_json::json!({ "skipped": true, "reason": reason }));
            } else {
                println!("{} {reason}", style("skipped:").yellow().bold());
            }
            Ok(ExitReason::Completed)
        }
    }
}
