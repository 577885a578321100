//! Failure classification for one agent attempt.
//!
//! [`classify`] is a pure function over what was observed while the attempt
//! streamed. Precedence: usage limit, overload, transient network, silent
//! failure, auth, then any other failing run.

use crate::domain::models::FailureClass;

use super::usage_limit::is_usage_limit_error;

/// Everything observed during one attempt that matters for classification.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttemptEvidence {
    /// Non-zero exit or an error result payload
    pub failed: bool,
    pub exit_code: Option<i32>,
    /// The terminal result payload had `is_error` set
    pub result_is_error: bool,
    pub result_text: Option<String>,
    /// Last text-ish thing the agent said (text, error, raw line, error result)
    pub last_message: String,
    /// Assistant text blocks seen in the stream
    pub assistant_texts: Vec<String>,
    /// Error-shaped diagnostic lines
    pub diagnostic_errors: Vec<String>,
    pub message_count: u64,
    pub tool_use_count: u64,
}

/// A substring conjunction: every fragment must be present.
type Pattern = &'static [&'static str];

/// Overload as it shows up in assistant text blocks. Stricter than
/// [`OVERLOAD_PATTERNS`]: agents quote error names while editing code.
pub const STREAMED_OVERLOAD_PATTERNS: &[Pattern] = &[&["API Error: 500", "api_error", "Overloaded"]];

/// Overload as the last message of a failing run.
pub const OVERLOAD_PATTERNS: &[Pattern] = &[
    &["API Error: 500", "Overloaded"],
    &["api_error", "Overloaded"],
    &["overloaded_error"],
];

pub const NETWORK_PATTERNS: &[Pattern] = &[
    &["API Error: 503"],
    &["503", "upstream connect error"],
    &["503", "remote connection failure"],
];

pub const AUTH_PATTERNS: &[Pattern] = &[
    &["Invalid API key"],
    &["authentication_error"],
    &["Please run /login"],
    &["OAuth token has expired"],
    &["\"type\":\"forbidden\""],
];

/// Fragments that make a diagnostic line look like an error.
const ERROR_SHAPED: &[&str] = &["Error:", "error", "failed"];

fn matches_any(text: &str, patterns: &[Pattern]) -> bool {
    patterns
        .iter()
        .any(|fragments| fragments.iter().all(|f| text.contains(f)))
}

pub fn is_overload(text: &str) -> bool {
    matches_any(text, OVERLOAD_PATTERNS)
}

pub fn is_streamed_overload(text: &str) -> bool {
    matches_any(text, STREAMED_OVERLOAD_PATTERNS)
}

pub fn is_transient_network(text: &str) -> bool {
    matches_any(text, NETWORK_PATTERNS)
}

pub fn is_auth_failure(text: &str) -> bool {
    matches_any(text, AUTH_PATTERNS)
}

/// Whether a diagnostic line counts as an error. Lines starting with a
/// warning sign never do, even when they mention "failed".
pub fn is_error_shaped_diagnostic(line: &str) -> bool {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('⚠') {
        return false;
    }
    ERROR_SHAPED.iter().any(|f| trimmed.contains(f))
}

/// Classify an attempt; `None` means it succeeded.
pub fn classify(evidence: &AttemptEvidence) -> Option<FailureClass> {
    let limit_in_result = evidence.result_is_error
        && evidence
            .result_text
            .as_deref()
            .is_some_and(is_usage_limit_error);
    if limit_in_result || (evidence.failed && is_usage_limit_error(&evidence.last_message)) {
        return Some(FailureClass::UsageLimitExceeded);
    }

    let overload_streamed = evidence.assistant_texts.iter().any(|t| is_streamed_overload(t));
    if overload_streamed || (evidence.failed && is_overload(&evidence.last_message)) {
        return Some(FailureClass::Overload);
    }

    let network_streamed = evidence
        .assistant_texts
        .iter()
        .any(|t| is_transient_network(t));
    if network_streamed || (evidence.failed && is_transient_network(&evidence.last_message)) {
        return Some(FailureClass::TransientNetwork);
    }

    if !evidence.failed
        && !evidence.diagnostic_errors.is_empty()
        && evidence.message_count == 0
        && evidence.tool_use_count == 0
    {
        return Some(FailureClass::SilentFailure);
    }

    if !evidence.failed {
        return None;
    }

    let auth = is_auth_failure(&evidence.last_message)
        || evidence.diagnostic_errors.iter().any(|l| is_auth_failure(l));
    if auth {
        return Some(FailureClass::FatalAuth);
    }

    Some(FailureClass::ProcessFailed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failed_with(message: &str) -> AttemptEvidence {
        AttemptEvidence {
            failed: true,
            exit_code: Some(1),
            last_message: message.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_pattern_tables() {
        assert!(is_overload(r#"API Error: 500 {"type":"error","error":{"type":"api_error","message":"Overloaded"}}"#));
        assert!(!is_overload("API Error: 500 Internal"));
        assert!(is_transient_network("API Error: 503 Service Unavailable"));
        assert!(is_transient_network("503 upstream connect error or disconnect/reset"));
        assert!(!is_transient_network("upstream connect error"));
        assert!(is_auth_failure("Invalid API key · Please run /login"));
    }

    #[test]
    fn test_warning_lines_are_not_errors() {
        assert!(!is_error_shaped_diagnostic(
            "⚠️  [BashTool] Pre-flight check is taking longer than expected, failed requests?"
        ));
        assert!(is_error_shaped_diagnostic("Error: kill EPERM"));
        assert!(is_error_shaped_diagnostic("request failed"));
        assert!(!is_error_shaped_diagnostic("all good"));
        assert!(!is_error_shaped_diagnostic("   "));
    }

    #[test]
    fn test_success_is_unclassified() {
        let evidence = AttemptEvidence {
            exit_code: Some(0),
            message_count: 3,
            ..Default::default()
        };
        assert_eq!(classify(&evidence), None);
    }

    #[test]
    fn test_usage_limit_from_error_result() {
        let evidence = AttemptEvidence {
            failed: true,
            result_is_error: true,
            result_text: Some("Session limit reached ∙ resets 10am".to_string()),
            ..Default::default()
        };
        assert_eq!(classify(&evidence), Some(FailureClass::UsageLimitExceeded));
    }

    #[test]
    fn test_usage_limit_beats_overload() {
        let mut evidence = failed_with("You've hit your usage limit");
        evidence.assistant_texts = vec!["API Error: 500 api_error Overloaded".to_string()];
        assert_eq!(classify(&evidence), Some(FailureClass::UsageLimitExceeded));
    }

    #[test]
    fn test_overload_in_stream_even_with_clean_exit() {
        let evidence = AttemptEvidence {
            assistant_texts: vec!["API Error: 500 api_error Overloaded".to_string()],
            message_count: 1,
            ..Default::default()
        };
        assert_eq!(classify(&evidence), Some(FailureClass::Overload));
    }

    #[test]
    fn test_streamed_overload_needs_full_error_shape() {
        for text in [
            "I added retry handling for the overloaded_error response type.",
            "Mapped api_error to a retry when the body says Overloaded.",
            "API Error: 500 while Overloaded",
        ] {
            let evidence = AttemptEvidence {
                exit_code: Some(0),
                message_count: 5,
                tool_use_count: 3,
                assistant_texts: vec![text.to_string()],
                ..Default::default()
            };
            assert_eq!(classify(&evidence), None, "{text}");
        }
        assert!(is_streamed_overload(
            r#"API Error: 500 {"type":"error","error":{"type":"api_error","message":"Overloaded"}}"#
        ));
    }

    #[test]
    fn test_overloaded_error_in_failing_run() {
        let evidence = failed_with(r#"{"type":"overloaded_error","message":"Overloaded"}"#);
        assert_eq!(classify(&evidence), Some(FailureClass::Overload));
    }

    #[test]
    fn test_network_from_last_message() {
        let evidence = failed_with("503 remote connection failure");
        assert_eq!(classify(&evidence), Some(FailureClass::TransientNetwork));
    }

    #[test]
    fn test_silent_failure_with_exit_zero() {
        let evidence = AttemptEvidence {
            exit_code: Some(0),
            diagnostic_errors: vec!["Error: kill EPERM".to_string()],
            ..Default::default()
        };
        assert_eq!(classify(&evidence), Some(FailureClass::SilentFailure));
    }

    #[test]
    fn test_no_silent_failure_when_work_happened() {
        let evidence = AttemptEvidence {
            exit_code: Some(0),
            diagnostic_errors: vec!["Error: something".to_string()],
            tool_use_count: 2,
            ..Default::default()
        };
        assert_eq!(classify(&evidence), None);
    }

    #[test]
    fn test_auth_failure() {
        let evidence = failed_with("Invalid API key · Please run /login");
        assert_eq!(classify(&evidence), Some(FailureClass::FatalAuth));
    }

    #[test]
    fn test_other_failures() {
        let evidence = failed_with("context_length_exceeded");
        assert_eq!(classify(&evidence), Some(FailureClass::ProcessFailed));
    }
}
