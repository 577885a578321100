//! CLI type definitions
//!
//! This module contains clap command structures that define the CLI interface.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "issuehive")]
#[command(about = "issuehive - run a coding agent against labelled GitHub issues", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Read configuration from this file instead of .issuehive/
    #[arg(short, long, global = true, env = "ISSUEHIVE_CONFIG_FILE")]
    pub config: Option<PathBuf>,

    /// Override the log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Output results as JSON
    #[arg(short, long, global = true)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Watch for labelled issues and solve them with a pool of workers
    Run(RunArgs),

    /// Solve a single issue in the foreground
    Solve(SolveArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Poll once, wait for the queue to drain, then exit
    #[arg(long)]
    pub once: bool,

    /// Number of concurrent workers
    #[arg(short = 'n', long)]
    pub concurrency: Option<usize>,

    /// Attempts driven per issue before it is considered done
    #[arg(long)]
    pub attempts_per_item: Option<u32>,

    /// Issue label to watch
    #[arg(short, long)]
    pub label: Option<String>,

    /// Repository owner (user or organization)
    #[arg(short, long)]
    pub owner: Option<String>,

    /// Repository name; omit to watch every repository of the owner
    #[arg(short, long)]
    pub repo: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct SolveArgs {
    /// Issue reference: owner/repo#N or an issue URL
    pub issue: String,

    /// Resume a previous agent session
    #[arg(long)]
    pub resume: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_flags() {
        let cli = Cli::parse_from([
            "issuehive", "run", "--once", "-n", "4", "--label", "bot", "--owner", "acme",
        ]);
        match cli.command {
            Commands::Run(args) => {
                assert!(args.once);
                assert_eq!(args.concurrency, Some(4));
                assert_eq!(args.label.as_deref(), Some("bot"));
                assert_eq!(args.owner.as_deref(), Some("acme"));
                assert_eq!(args.repo, None);
            }
            Commands::Solve(_) => panic!("expected run"),
        }
    }

    #[test]
    fn test_parse_solve_with_global_flags() {
        let cli = Cli::parse_from([
            "issuehive",
            "solve",
            "acme/widgets#7",
            "--resume",
            "sess-1",
            "--json",
            "--log-level",
            "debug",
        ]);
        assert!(cli.json);
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        match cli.command {
            Commands::Solve(args) => {
                assert_eq!(args.issue, "acme/widgets#7");
                assert_eq!(args.resume.as_deref(), Some("sess-1"));
            }
            Commands::Run(_) => panic!("expected solve"),
        }
    }
}
