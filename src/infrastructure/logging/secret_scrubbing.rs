use regex::{Captures, Regex};
use std::fmt;

/// Redacts credentials from text before it leaves the process
/// (tracker comments, diagnostics).
#[derive(Clone)]
pub struct SecretScrubber {
    rules: Vec<(Regex, Replacement)>,
}

#[derive(Clone, Copy)]
enum Replacement {
    Fixed(&'static str),
    /// Keep the field name, redact the value
    KeepKey,
}

const RULES: &[(&str, Replacement)] = &[
    // Anthropic API keys: sk-ant-api03-...
    (r"sk-ant-[a-zA-Z0-9\-_]{8,}", Replacement::Fixed("[API_KEY_REDACTED]")),
    // GitHub tokens: classic, OAuth, app and fine-grained
    (r"\b(?:gh[pousr]_[A-Za-z0-9]{20,}|github_pat_[A-Za-z0-9_]{20,})", Replacement::Fixed("[GITHUB_TOKEN_REDACTED]")),
    // Bearer tokens in Authorization headers
    (r"Bearer\s+[a-zA-Z0-9\-_\.]+", Replacement::Fixed("Bearer [TOKEN_REDACTED]")),
    // key/value fields
    (r#"["']?(?:api_key|apikey|token|secret)["']?\s*[:=]\s*["']?[a-zA-Z0-9\-_\.]{8,}["']?"#, Replacement::KeepKey),
    (r#"["']?password["']?\s*[:=]\s*["']?[^"'\s,}]+["']?"#, Replacement::Fixed("password=[REDACTED]")),
];

impl SecretScrubber {
    pub fn new() -> Self {
        Self {
            rules: RULES
                .iter()
                .filter_map(|(pattern, replacement)| {
                    Regex::new(pattern).ok().map(|re| (re, *replacement))
                })
                .collect(),
        }
    }

    /// Scrub a message of sensitive data
    pub fn scrub(&self, message: &str) -> String {
        let mut scrubbed = message.to_string();
        for (re, replacement) in &self.rules {
            scrubbed = match replacement {
                Replacement::Fixed(text) => re.replace_all(&scrubbed, *text).into_owned(),
                Replacement::KeepKey => re
                    .replace_all(&scrubbed, |caps: &Captures| {
                        let full_match = &caps[0];
                        match full_match.find(|c: char| c == ':' || c == '=') {
                            Some(pos) => format!("{}{}[REDACTED]", &full_match[..pos], &full_match[pos..=pos]),
                            None => "[REDACTED]".to_string(),
                        }
                    })
                    .into_owned(),
            };
        }
        scrubbed
    }
}

impl Default for SecretScrubber {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SecretScrubber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretScrubber")
            .field("rules", &self.rules.len())
            .finish()
    }
}
