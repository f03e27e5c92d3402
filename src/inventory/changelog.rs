use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::inventory::normalize_identity;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeAction {
    Added,
    Modified,
    Removed,
    Other(String),
}

impl ChangeAction {
    pub fn parse_lossy(raw: &str) -> Self {
        let normalized = raw.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "added" | "add" | "created" | "create" | "new" | "deployed" => Self::Added,
            "modified" | "modify" | "changed" | "edited" | "updated" | "reconfigured" => {
                Self::Modified
            }
            "removed" | "remove" | "deleted" | "delete" => Self::Removed,
            _ => Self::Other(normalized),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeLogEntry {
    pub timestamp: DateTime<Utc>,
    pub object_type: String,
    pub action: ChangeAction,
    pub subject: String,
    pub detail: String,
}

impl ChangeLogEntry {
    pub fn subject_key(&self) -> String {
        normalize_identity(&self.subject)
    }

    /// Entries without an object type are assumed to describe workloads.
    pub fn is_workload_entry(&self, workload_types: &[String]) -> bool {
        let object_type = self.object_type.trim();
        object_type.is_empty()
            || workload_types
                .iter()
                .any(|t| t.trim().eq_ignore_ascii_case(object_type))
    }

    pub fn mentions_any(&self, keywords: &[String]) -> bool {
        let detail = self.detail.to_lowercase();
        keywords
            .iter()
            .map(|k| k.trim().to_lowercase())
            .any(|k| !k.is_empty() && detail.contains(&k))
    }
}

/// Half-open window `(until - lookback, until]` in which change-log entries are considered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LookbackWindow {
    pub until: DateTime<Utc>,
    pub lookback: Duration,
}

impl LookbackWindow {
    pub fn ending_at(until: DateTime<Utc>, lookback: Duration) -> Self {
        Self { until, lookback }
    }

    /// Lower bound of the window, pinned to the earliest representable instant when the
    /// lookback reaches past it.
    pub fn since(&self) -> DateTime<Utc> {
        self.until
            .checked_sub_signed(self.lookback)
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at > self.since() && at <= self.until
    }

    pub fn hours(&self) -> i64 {
        self.lookback.num_hours()
    }
}

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%d/%m/%Y %H:%M:%S",
];

/// Accepts RFC 3339 or a handful of zone-less layouts, which are read as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}
