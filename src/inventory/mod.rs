pub mod changelog;
pub mod schema;
pub mod source;

use std::fmt::{Display, Formatter};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub use changelog::{ChangeAction, ChangeLogEntry};
pub use schema::Table;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Volume {
    pub name: String,
    pub capacity_gb: f64,
    pub provisioned_gb: f64,
    pub cluster: String,
    pub environment: String,
    #[serde(rename = "type")]
    pub volume_type: String,
}

impl Volume {
    pub fn free_space_gb(&self) -> f64 {
        self.capacity_gb - self.provisioned_gb
    }

    /// Provisioned space as a percentage of capacity; 0 for a zero-capacity volume.
    pub fn utilization_pct(&self) -> f64 {
        if self.capacity_gb <= 0.0 {
            return 0.0;
        }
        self.provisioned_gb / self.capacity_gb * 100.0
    }

    /// Strictly greater: a volume provisioned exactly to capacity is still compliant.
    pub fn is_overcommitted(&self) -> bool {
        self.provisioned_gb > self.capacity_gb
    }

    pub fn overcommit_gb(&self) -> f64 {
        (self.provisioned_gb - self.capacity_gb).max(0.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PowerState {
    On,
    Off,
}

impl PowerState {
    /// Anything that is not recognisably "off" counts as running, so unknown states
    /// are scored as active workloads.
    pub fn parse_lossy(raw: &str) -> Self {
        let normalized = raw.trim().to_ascii_lowercase().replace(['_', '-', ' '], "");
        match normalized.as_str() {
            "off" | "poweredoff" | "stopped" | "false" | "0" => Self::Off,
            _ => Self::On,
        }
    }
}

impl Display for PowerState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::On => write!(f, "on"),
            Self::Off => write!(f, "off"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Workload {
    pub name: String,
    pub provisioned_gb: f64,
    pub power_state: PowerState,
    #[serde(default)]
    pub criticality: String,
    pub volume: String,
    #[serde(default)]
    pub cpu_count: f64,
    #[serde(default)]
    pub memory_gb: f64,
    #[serde(default)]
    pub cluster: Option<String>,
}

impl Workload {
    pub fn is_powered_on(&self) -> bool {
        self.power_state == PowerState::On
    }

    pub fn identity_key(&self) -> String {
        normalize_identity(&self.name)
    }
}

pub fn normalize_identity(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// A fully materialised inventory. Every engine operation is a pure function of one of these.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InventorySnapshot {
    pub captured_at: DateTime<Utc>,
    pub volumes: Vec<Volume>,
    pub workloads: Vec<Workload>,
    #[serde(default)]
    pub change_log: Vec<ChangeLogEntry>,
}

impl InventorySnapshot {
    pub fn new(
        captured_at: DateTime<Utc>,
        volumes: Vec<Volume>,
        workloads: Vec<Workload>,
        change_log: Vec<ChangeLogEntry>,
    ) -> Self {
        Self {
            captured_at,
            volumes,
            workloads,
            change_log,
        }
    }

    pub fn volume(&self, name: &str) -> Option<&Volume> {
        self.volumes.iter().find(|v| v.name == name)
    }

    pub fn overcommitted(&self) -> impl Iterator<Item = &Volume> {
        self.volumes.iter().filter(|v| v.is_overcommitted())
    }

    /// Cluster a workload is accounted to: its own column when present, otherwise the
    /// cluster of the volume it lives on.
    pub fn workload_cluster<'a>(&'a self, workload: &'a Workload) -> Option<&'a str> {
        match workload.cluster.as_deref() {
            Some(cluster) if !cluster.trim().is_empty() => Some(cluster),
            _ => self.volume(&workload.volume).map(|v| v.cluster.as_str()),
        }
    }

    pub fn fingerprint(&self) -> String {
        let canonical = serde_json::to_string(self).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::{snapshot, volume, workload};
    use super::PowerState;

    #[test]
    fn provisioned_equal_to_capacity_is_not_overcommitted() {
        let exact = volume("ds-exact", 100.0, 100.0, "c1");
        assert!(!exact.is_overcommitted());
        assert!((exact.utilization_pct() - 100.0).abs() < 1e-9);

        let over = volume("ds-over", 100.0, 100.5, "c1");
        assert!(over.is_overcommitted());
        assert!((over.overcommit_gb() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn zero_capacity_reports_zero_utilization() {
        let empty = volume("ds-zero", 0.0, 10.0, "c1");
        assert_eq!(empty.utilization_pct(), 0.0);
        assert!(empty.is_overcommitted());
    }

    #[test]
    fn parses_power_states_leniently() {
        assert_eq!(PowerState::parse_lossy("poweredOff"), PowerState::Off);
        assert_eq!(PowerState::parse_lossy(" Powered Off "), PowerState::Off);
        assert_eq!(PowerState::parse_lossy("poweredOn"), PowerState::On);
        assert_eq!(PowerState::parse_lossy("suspended"), PowerState::On);
        assert_eq!(PowerState::parse_lossy(""), PowerState::On);
    }

    #[test]
    fn workload_cluster_falls_back_to_volume() {
        let mut pinned = workload("vm-b", 10.0, PowerState::On, "ds-a");
        pinned.cluster = Some("c9".to_string());
        let snap = snapshot(
            vec![volume("ds-a", 100.0, 50.0, "c1")],
            vec![workload("vm-a", 10.0, PowerState::On, "ds-a"), pinned],
        );
        assert_eq!(snap.workload_cluster(&snap.workloads[0]), Some("c1"));
        assert_eq!(snap.workload_cluster(&snap.workloads[1]), Some("c9"));
    }

    #[test]
    fn fingerprint_is_stable_for_identical_content() {
        let a = snapshot(vec![volume("ds-a", 100.0, 50.0, "c1")], Vec::new());
        let b = a.clone();
        assert_eq!(a.fingerprint(), b.fingerprint());

        let c = snapshot(vec![volume("ds-a", 100.0, 51.0, "c1")], Vec::new());
        assert_ne!(a.fingerprint(), c.fingerprint());
    }
}
