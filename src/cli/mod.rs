//! Command line interface.

pub mod commands;
pub mod output;
pub mod types;

pub use types::{Cli, Commands, RunArgs, SolveArgs};

use console::style;

/// Print a command error to stderr, as JSON when requested.
pub fn handle_error(err: &anyhow::Error, json: bool) {
    if json {
        let body = serde_json::json!({
            "error": err.to_string(),
            "chain": err.chain().skip(1).map(ToString::to_string).collect::<Vec<_>>(),
        });
        eprintln!("{body}");
    } else {
        eprintln!("{} {err:#}", style("error:").red().bold());
    }
}
