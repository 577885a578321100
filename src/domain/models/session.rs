/// Domain model for one agent session.
///
/// A session starts with a provisional, time-derived log artifact and is
/// keyed by the durable id once the agent reports it.
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

/// Whether the session's artifact still lives under its provisional name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// Durable id not yet known
    Provisional,
    /// Artifact lives at `<durable id>.log`
    Durable,
}

/// Per-attempt session bookkeeping.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    /// Artifact path used until the durable id is known
    pub provisional_log_handle: PathBuf,
    pub durable_id: Option<String>,
    pub cost_estimate: Option<f64>,
    pub status: SessionStatus,
    pub started_at: DateTime<Utc>,
}

impl Session {
    /// A fresh session with a time-derived artifact in `log_dir`.
    pub fn provisional(log_dir: &Path, now: DateTime<Utc>) -> Self {
        Self {
            provisional_log_handle: log_dir.join(provisional_file_name(now)),
            durable_id: None,
            cost_estimate: None,
            status: SessionStatus::Provisional,
            started_at: now,
        }
    }

    /// A resumed session whose durable id is already known.
    pub fn resumed(log_dir: &Path, durable_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            provisional_log_handle: durable_log_path(log_dir, durable_id),
            durable_id: Some(durable_id.to_string()),
            cost_estimate: None,
            status: SessionStatus::Durable,
            started_at: now,
        }
    }
}

/// `solve-<timestamp>.log`, with characters unsafe in file names replaced.
pub fn provisional_file_name(now: DateTime<Utc>) -> String {
    format!("solve-{}.log", now.format("%Y-%m-%dT%H-%M-%S-%3fZ"))
}

pub fn durable_log_path(log_dir: &Path, durable_id: &str) -> PathBuf {
    log_dir.join(format!("{durable_id}.log"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_provisional_name_is_time_derived() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 5).unwrap();
        assert_eq!(provisional_file_name(now), "solve-2024-05-01T12-30-05-000Z.log");
    }

    #[test]
    fn test_resumed_session_is_durable() {
        let session = Session::resumed(Path::new("/tmp/logs"), "abc", Utc::now());
        assert_eq!(session.status, SessionStatus::Durable);
        assert_eq!(session.provisional_log_handle, PathBuf::from("/tmp/logs/abc.log"));
    }
}
