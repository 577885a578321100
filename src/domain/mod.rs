//! Domain layer for issuehive
//!
//! This module contains the work item, execution and feedback models and the
//! ports the orchestration engine talks through.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{DomainError, DomainResult};
