//! Version control adapter driving the `git` CLI through `tokio::process`.

pub mod git_cli;

pub use git_cli::GitCli;
