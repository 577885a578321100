//! GitHub issue tracker adapter
//!
//! REST for issues, pull requests, checks and reviews; GraphQL for marking
//! pull requests ready. Requests are throttled with `governor`.

pub mod client;
pub mod errors;
pub mod models;

pub use client::{GithubClient, GithubClientConfig};
pub use errors::GithubApiError;
