//! Domain errors for the issuehive system.

use thiserror::Error;

/// Domain-level errors that can occur while solving work items.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Invalid work item id: {0}")]
    InvalidItemId(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// A collaborator call (issue tracker, version control) failed.
    #[error("{operation} failed: {message}")]
    Integration { operation: String, message: String },

    /// The invoking identity may not act on the repository.
    #[error("Access denied for {repository}: {reason}")]
    AccessDenied { repository: String, reason: String },

    #[error("Agent process error: {0}")]
    AgentProcess(String),

    #[error("Session log error: {0}")]
    SessionLog(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DomainError {
    /// Build an [`DomainError::Integration`] for a named collaborator operation.
    pub fn integration(operation: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Integration {
            operation: operation.into(),
            message: message.to_string(),
        }
    }
}

pub type DomainResult<T> = Result<T, DomainError>;

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integration_error_message() {
        let err = DomainError::integration("list_issue_comments", "404 Not Found");
        assert_eq!(err.to_string(), "list_issue_comments failed: 404 Not Found");
    }

    #[test]
    fn test_access_denied_message() {
        let err = DomainError::AccessDenied {
            repository: "acme/widgets".to_string(),
            reason: "repository is archived".to_string(),
        };
        assert!(err.to_string().contains("acme/widgets"));
        assert!(err.to_string().contains("archived"));
    }
}
