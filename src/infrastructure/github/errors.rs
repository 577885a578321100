use reqwest::StatusCode;
use thiserror::Error;

use crate::domain::errors::DomainError;

/// Errors that can occur when talking to the GitHub API
#[derive(Error, Debug)]
pub enum GithubApiError {
    /// Invalid request parameters (HTTP 400, 422)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Invalid or missing token (HTTP 401)
    #[error("Authentication failed - check GITHUB_TOKEN")]
    Unauthorized,

    /// Permission denied or secondary rate limit (HTTP 403)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Resource not found (HTTP 404)
    #[error("Resource not found")]
    NotFound,

    /// Rate limit exceeded (HTTP 429)
    #[error("Rate limit exceeded - too many requests")]
    RateLimitExceeded,

    /// Server error (HTTP 5xx)
    #[error("Server error ({0}): {1}")]
    ServerError(StatusCode, String),

    /// Network or connection error
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// GraphQL request answered with errors
    #[error("GraphQL error: {0}")]
    GraphQl(String),

    /// Unknown or unexpected status
    #[error("Unknown error ({0}): {1}")]
    UnknownError(StatusCode, String),
}

impl GithubApiError {
    /// Map a non-success status and its body to an error.
    pub fn from_status(status: StatusCode, body: String) -> Self {
        match status.as_u16() {
            400 | 422 => Self::InvalidRequest(body),
            401 => Self::Unauthorized,
            403 => Self::Forbidden(body),
            404 => Self::NotFound,
            429 => Self::RateLimitExceeded,
            500..=599 => Self::ServerError(status, body),
            _ => Self::UnknownError(status, body),
        }
    }

    /// Returns true if this error is transient and should be retried
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RateLimitExceeded | Self::ServerError(_, _) | Self::NetworkError(_)
        )
    }

    /// Convert into the domain error for `operation`.
    pub fn into_domain(self, operation: &str) -> DomainError {
        DomainError::integration(operation, self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            GithubApiError::from_status(StatusCode::UNPROCESSABLE_ENTITY, "x".into()),
            GithubApiError::InvalidRequest(_)
        ));
        assert!(matches!(
            GithubApiError::from_status(StatusCode::UNAUTHORIZED, String::new()),
            GithubApiError::Unauthorized
        ));
        assert!(matches!(
            GithubApiError::from_status(StatusCode::BAD_GATEWAY, String::new()),
            GithubApiError::ServerError(StatusCode::BAD_GATEWAY, _)
        ));
    }

    #[test]
    fn test_transient_errors() {
        assert!(GithubApiError::RateLimitExceeded.is_transient());
        assert!(
            GithubApiError::ServerError(StatusCode::SERVICE_UNAVAILABLE, String::new())
                .is_transient()
        );
        assert!(!GithubApiError::NotFound.is_transient());
        assert!(!GithubApiError::Forbidden("nope".into()).is_transient());
    }

    #[test]
    fn test_into_domain_keeps_operation() {
        let err = GithubApiError::NotFound.into_domain("get_issue");
        assert!(err.to_string().contains("get_issue"));
    }
}
