//! Usage-limit detection for coding agent output.
//!
//! Agents report exhausted quotas in free text ("Session limit reached ∙
//! resets 5am", "try again at 12:16 PM"). This module recognises those texts,
//! pulls out the reset time and renders the message posted to the user.

use std::sync::LazyLock;

use regex::{Captures, Regex};

/// Lower-case fragments that mark a usage-limit message.
const USAGE_LIMIT_PATTERNS: &[&str] = &[
    "you've hit your usage limit",
    "hit your usage limit",
    "you have exceeded your rate limit",
    "usage limit reached",
    "usage limit exceeded",
    "rate_limit_exceeded",
    "rate limit exceeded",
    "limit reached",
    "limit has been reached",
    "session limit reached",
    "weekly limit reached",
    "daily limit reached",
    "monthly limit reached",
    "billing hard limit",
    "please try again at",
    "available again at",
    "resets",
];

fn compile(pattern: &str) -> Option<Regex> {
    Regex::new(pattern).ok()
}

static TRY_AGAIN_AT: LazyLock<Option<Regex>> =
    LazyLock::new(|| compile(r"(?i)try again at ([0-9]{1,2}:[0-9]{2}\s*[AP]M)"));
static AVAILABLE_AT: LazyLock<Option<Regex>> =
    LazyLock::new(|| compile(r"(?i)available at ([0-9]{1,2}:[0-9]{2}\s*[AP]M)"));
static RESET_AT: LazyLock<Option<Regex>> =
    LazyLock::new(|| compile(r"(?i)reset at ([0-9]{1,2}:[0-9]{2}\s*[AP]M)"));
static RESETS_HOUR: LazyLock<Option<Regex>> =
    LazyLock::new(|| compile(r"(?i)resets(?:\s+at)?\s+([0-9]{1,2})\s*([AP]M)"));
static RESETS_HOUR_MINUTE: LazyLock<Option<Regex>> =
    LazyLock::new(|| compile(r"(?i)resets(?:\s+at)?\s+([0-9]{1,2}:[0-9]{2})\s*([AP]M)"));
static RESETS_24H: LazyLock<Option<Regex>> =
    LazyLock::new(|| compile(r"(?i)resets(?:\s+at)?\s+([0-2]?[0-9]):([0-5][0-9])\b"));
static RESETS_COMPACT: LazyLock<Option<Regex>> =
    LazyLock::new(|| compile(r"(?i)resets(?:\s+at)?\s*([0-9]{1,2})(?::([0-9]{2}))?\s*([ap]m)"));
static BARE_TIME: LazyLock<Option<Regex>> =
    LazyLock::new(|| compile(r"(?i)\b([0-9]{1,2}:[0-9]{2})\s*([AP]M)\b"));
static WHITESPACE: LazyLock<Option<Regex>> = LazyLock::new(|| compile(r"\s+"));

fn captures<'t>(re: &LazyLock<Option<Regex>>, text: &'t str) -> Option<Captures<'t>> {
    re.as_ref().and_then(|re| re.captures(text))
}

/// Whether `message` reads like a usage-limit error.
pub fn is_usage_limit_error(message: &str) -> bool {
    let lower = message.to_lowercase();
    USAGE_LIMIT_PATTERNS.iter().any(|p| lower.contains(p))
}

/// Reset time in `H:MM AM|PM` form, if the message names one.
pub fn extract_reset_time(message: &str) -> Option<String> {
    let normalized = match WHITESPACE.as_ref() {
        Some(ws) => ws.replace_all(message, " ").into_owned(),
        None => message.to_string(),
    };
    let text = normalized.as_str();

    for re in [&TRY_AGAIN_AT, &AVAILABLE_AT, &RESET_AT] {
        if let Some(caps) = captures(re, text) {
            return Some(caps[1].to_string());
        }
    }
    if let Some(caps) = captures(&RESETS_HOUR, text) {
        return Some(format!("{}:00 {}", &caps[1], caps[2].to_uppercase()));
    }
    if let Some(caps) = captures(&RESETS_HOUR_MINUTE, text) {
        return Some(format!("{} {}", &caps[1], caps[2].to_uppercase()));
    }
    if let Some(caps) = captures(&RESETS_24H, text) {
        let hour: u32 = caps[1].parse().ok()?;
        let (hour, meridiem) = match hour {
            0 => (12, "AM"),
            1..=11 => (hour, "AM"),
            12 => (12, "PM"),
            _ => (hour - 12, "PM"),
        };
        return Some(format!("{hour}:{} {meridiem}", &caps[2]));
    }
    if let Some(caps) = captures(&RESETS_COMPACT, text) {
        let minute = caps.get(2).map_or("00", |m| m.as_str());
        return Some(format!("{}:{minute} {}", &caps[1], caps[3].to_uppercase()));
    }
    captures(&BARE_TIME, text).map(|caps| format!("{} {}", &caps[1], caps[2].to_uppercase()))
}

/// What a usage-limit message says.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageLimitInfo {
    pub is_usage_limit: bool,
    pub reset_time: Option<String>,
}

pub fn detect_usage_limit(message: &str) -> UsageLimitInfo {
    let is_usage_limit = is_usage_limit_error(message);
    UsageLimitInfo {
        is_usage_limit,
        reset_time: if is_usage_limit {
            extract_reset_time(message)
        } else {
            None
        },
    }
}

/// Lines explaining the limit and how to resume once it resets.
pub fn format_usage_limit_message(
    tool: &str,
    reset_time: Option<&str>,
    session_id: Option<&str>,
    resume_command: Option<&str>,
) -> Vec<String> {
    let mut lines = vec![
        String::new(),
        "⏳ Usage Limit Reached!".to_string(),
        String::new(),
        format!("Your {tool} usage limit has been reached."),
    ];
    match reset_time {
        Some(time) => lines.push(format!("The limit will reset at: {time}")),
        None => lines.push("Please wait for the limit to reset.".to_string()),
    }
    if let (Some(session_id), Some(command)) = (session_id, resume_command) {
        lines.push(String::new());
        lines.push(format!("📌 Session ID: {session_id}"));
        lines.push(String::new());
        lines.push("To resume this session after the limit resets, run:".to_string());
        lines.push(format!("   {command}"));
    }
    lines.push(String::new());
    lines
}
