//! Infrastructure layer module
//!
//! This module contains all infrastructure adapters and external integrations:
//! - GitHub issue tracker client
//! - git CLI working copies
//! - Claude Code agent process
//! - Configuration management
//! - Logging infrastructure
//!
//! Infrastructure implementations satisfy the port traits defined in the domain layer.

pub mod agent;
pub mod config;
pub mod git;
pub mod github;
pub mod logging;
