//! Core types for czds-dl

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// URL identifying one downloadable zone file for the current run
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ZoneLink(pub String);

impl ZoneLink {
    /// Create a new ZoneLink
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    /// Get the URL as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short zone name derived from the URL basename, used for logging and
    /// the failure summary (e.g. `https://.../czds/downloads/xyz.zone` -> `xyz.zone`).
    ///
    /// Falls back to the full URL when the path has no basename.
    pub fn name(&self) -> &str {
        self.0
            .rsplit('/')
            .next()
            .filter(|segment| !segment.is_empty())
            .unwrap_or(&self.0)
    }
}

impl std::fmt::Display for ZoneLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ZoneLink {
    fn from(url: String) -> Self {
        Self(url)
    }
}

/// Lifecycle state of one download task
///
/// Transitions: `Pending -> InFlight -> {Done, Failed}`. The only re-entry
/// to `Pending` is the single automatic retry after a token refresh.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Waiting in the queue, not yet claimed by a worker
    Pending,
    /// Claimed by a worker, transfer in progress
    InFlight,
    /// Transfer (and decompression, when enabled) completed
    Done,
    /// Terminal failure, reason recorded in the summary
    Failed,
}

impl TaskStatus {
    /// Returns true for the two terminal states
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Done | TaskStatus::Failed)
    }
}

/// Output format for the zone request report
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    /// Native tabular format as served by the API
    #[default]
    Csv,
    /// JSON array of objects keyed by the header row
    Json,
}

impl ReportFormat {
    /// File extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Csv => "csv",
            ReportFormat::Json => "json",
        }
    }
}

impl std::fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.extension())
    }
}

/// Access status of one zone request in the report
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    /// Request approved, zone downloadable
    Approved,
    /// Request denied by the registry
    Denied,
    /// Approval lapsed
    Expired,
    /// Awaiting registry decision
    Pending,
    /// Approval withdrawn
    Revoked,
}

impl std::fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ReportStatus::Approved => "approved",
            ReportStatus::Denied => "denied",
            ReportStatus::Expired => "expired",
            ReportStatus::Pending => "pending",
            ReportStatus::Revoked => "revoked",
        };
        write!(f, "{s}")
    }
}

impl FromStr for ReportStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "approved" => Ok(ReportStatus::Approved),
            "denied" => Ok(ReportStatus::Denied),
            "expired" => Ok(ReportStatus::Expired),
            "pending" => Ok(ReportStatus::Pending),
            "revoked" => Ok(ReportStatus::Revoked),
            _ => Err(format!("unknown report status: {s}")),
        }
    }
}

/// One failed download in the run summary
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FailedDownload {
    /// Zone name (URL basename) of the failed resource
    pub zone: String,
    /// Why the task failed
    pub reason: String,
}

/// Aggregate result of a download run
///
/// Produced after every task has settled. Partial or total failure is still
/// a completed run; the orchestrator never errors out over task failures.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DownloadSummary {
    /// Number of tasks that finished `Done`
    pub done: usize,
    /// Every failed task with its reason, grouped stably by status
    pub failed: Vec<FailedDownload>,
}

impl DownloadSummary {
    /// Total number of tasks that reached a terminal state
    pub fn total(&self) -> usize {
        self.done + self.failed.len()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn zone_link_name_is_url_basename() {
        let link = ZoneLink::new("https://czds-api.icann.org/czds/downloads/xyz.zone");
        assert_eq!(link.name(), "xyz.zone");
    }

    #[test]
    fn zone_link_name_falls_back_to_full_url() {
        let link = ZoneLink::new("https://czds-api.icann.org/");
        assert_eq!(link.name(), "https://czds-api.icann.org/");
    }

    #[test]
    fn report_status_round_trip() {
        for status in [
            ReportStatus::Approved,
            ReportStatus::Denied,
            ReportStatus::Expired,
            ReportStatus::Pending,
            ReportStatus::Revoked,
        ] {
            let parsed = ReportStatus::from_str(&status.to_string()).unwrap();
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn report_status_is_case_insensitive() {
        assert_eq!(
            ReportStatus::from_str("Approved").unwrap(),
            ReportStatus::Approved
        );
        assert_eq!(
            ReportStatus::from_str("REVOKED").unwrap(),
            ReportStatus::Revoked
        );
    }

    #[test]
    fn report_status_rejects_unknown_values() {
        assert!(ReportStatus::from_str("escalated").is_err());
        assert!(ReportStatus::from_str("").is_err());
    }

    #[test]
    fn terminal_states() {
        assert!(TaskStatus::Done.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(!TaskStatus::InFlight.is_terminal());
    }
}
