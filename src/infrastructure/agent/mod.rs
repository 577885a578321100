//! Coding agent backends
//!
//! The Claude Code CLI runs as a child process (`tokio::process`) and is
//! stopped with SIGTERM through `nix`.

pub mod claude_code;
pub mod stream_parser;

pub use claude_code::{ClaudeCodeAgent, ClaudeCodeConfig};
pub use stream_parser::parse_output_line;
