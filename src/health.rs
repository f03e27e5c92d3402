//! Cluster resource accounting and per-volume capacity overview.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::inventory::{normalize_identity, InventorySnapshot, Workload};

const GB_PER_TB: f64 = 1024.0;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClusterPolicy {
    pub physical_cpu_cores: f64,
    pub physical_memory_tb: f64,
    #[serde(default = "default_ratio")]
    pub cpu_overcommit_ratio: f64,
    #[serde(default = "default_ratio")]
    pub memory_overcommit_ratio: f64,
}

impl ClusterPolicy {
    pub fn max_cpu(&self) -> f64 {
        self.physical_cpu_cores * self.cpu_overcommit_ratio
    }

    pub fn max_memory_gb(&self) -> f64 {
        self.physical_memory_tb * GB_PER_TB * self.memory_overcommit_ratio
    }
}

fn default_ratio() -> f64 {
    1.0
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ClusterAnalysis {
    pub cluster: String,
    pub workload_count: usize,
    pub powered_on: usize,
    pub powered_off: usize,
    pub total_cpu: f64,
    pub total_memory_gb: f64,
    pub total_disk_tb: f64,
    pub policy_applied: bool,
    pub max_cpu: f64,
    pub max_memory_gb: f64,
    pub cpu_utilization_pct: f64,
    pub memory_utilization_pct: f64,
}

fn percent_of(total: f64, max: f64) -> f64 {
    if max == 0.0 {
        0.0
    } else {
        total / max * 100.0
    }
}

/// CPU and memory count powered-on workloads only; disk counts every workload.
pub fn analyze_cluster<'w>(
    cluster: &str,
    workloads: impl IntoIterator<Item = &'w Workload>,
    policy: Option<&ClusterPolicy>,
) -> ClusterAnalysis {
    let mut analysis = ClusterAnalysis {
        cluster: cluster.to_string(),
        ..ClusterAnalysis::default()
    };
    let mut disk_gb = 0.0;
    for workload in workloads {
        analysis.workload_count += 1;
        disk_gb += workload.provisioned_gb;
        if workload.is_powered_on() {
            analysis.powered_on += 1;
            analysis.total_cpu += workload.cpu_count;
            analysis.total_memory_gb += workload.memory_gb;
        } else {
            analysis.powered_off += 1;
        }
    }
    analysis.total_disk_tb = disk_gb / GB_PER_TB;

    if let Some(policy) = policy {
        analysis.policy_applied = true;
        analysis.max_cpu = policy.max_cpu();
        analysis.max_memory_gb = policy.max_memory_gb();
        analysis.cpu_utilization_pct = percent_of(analysis.total_cpu, analysis.max_cpu);
        analysis.memory_utilization_pct =
            percent_of(analysis.total_memory_gb, analysis.max_memory_gb);
    }
    analysis
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ClusterHealth {
    pub clusters: Vec<ClusterAnalysis>,
    pub warnings: Vec<String>,
}

/// Analyzes every cluster that hosts at least one workload, in cluster-key order. Cluster
/// names and policy keys match trimmed and case-insensitively, as in placement; each group
/// is labelled with the first spelling seen.
pub fn analyze_clusters(
    snapshot: &InventorySnapshot,
    policies: &BTreeMap<String, ClusterPolicy>,
) -> ClusterHealth {
    let mut grouped: BTreeMap<String, (&str, Vec<&Workload>)> = BTreeMap::new();
    for workload in &snapshot.workloads {
        let cluster = snapshot.workload_cluster(workload).unwrap_or("").trim();
        grouped
            .entry(normalize_identity(cluster))
            .or_insert_with(|| (cluster, Vec::new()))
            .1
            .push(workload);
    }

    let mut health = ClusterHealth::default();
    for (key, (cluster, members)) in grouped {
        let policy = policies
            .iter()
            .find(|(name, _)| normalize_identity(name) == key)
            .map(|(_, policy)| policy);
        if policy.is_none() {
            let label = if cluster.is_empty() { "(unassigned)" } else { cluster };
            health
                .warnings
                .push(format!("no overcommit policy configured for cluster {label}"));
        }
        health
            .clusters
            .push(analyze_cluster(cluster, members, policy));
    }
    health
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VolumeUtilization {
    pub name: String,
    pub cluster: String,
    pub environment: String,
    #[serde(rename = "type")]
    pub volume_type: String,
    pub capacity_gb: f64,
    pub provisioned_gb: f64,
    pub free_gb: f64,
    pub utilization_pct: f64,
    pub overcommitted: bool,
}

/// Every volume, most utilized first; equal utilization keeps inventory order.
pub fn capacity_overview(snapshot: &InventorySnapshot) -> Vec<VolumeUtilization> {
    let mut rows = snapshot
        .volumes
        .iter()
        .map(|v| VolumeUtilization {
            name: v.name.clone(),
            cluster: v.cluster.clone(),
            environment: v.environment.clone(),
            volume_type: v.volume_type.clone(),
            capacity_gb: v.capacity_gb,
            provisioned_gb: v.provisioned_gb,
            free_gb: v.free_space_gb(),
            utilization_pct: v.utilization_pct(),
            overcommitted: v.is_overcommitted(),
        })
        .collect::<Vec<_>>();
    rows.sort_by(|a, b| b.utilization_pct.total_cmp(&a.utilization_pct));
    rows
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::{analyze_cluster, analyze_clusters, capacity_overview, ClusterPolicy};
    use crate::inventory::fixtures::{snapshot, volume, workload};
    use crate::inventory::PowerState;

    fn policy() -> ClusterPolicy {
        ClusterPolicy {
            physical_cpu_cores: 16.0,
            physical_memory_tb: 0.5,
            cpu_overcommit_ratio: 4.0,
            memory_overcommit_ratio: 1.5,
        }
    }

    #[test]
    fn powered_off_workloads_only_count_toward_disk() {
        let workloads = vec![
            workload("vm-1", 512.0, PowerState::On, "ds-01"),
            workload("vm-2", 512.0, PowerState::Off, "ds-01"),
            workload("vm-3", 1024.0, PowerState::On, "ds-01"),
        ];
        let analysis = analyze_cluster("c1", &workloads, Some(&policy()));
        assert_eq!(analysis.workload_count, 3);
        assert_eq!(analysis.powered_on, 2);
        assert_eq!(analysis.powered_off, 1);
        assert_eq!(analysis.total_cpu, 4.0);
        assert_eq!(analysis.total_memory_gb, 16.0);
        assert!((analysis.total_disk_tb - 2.0).abs() < 1e-9);
        assert_eq!(analysis.max_cpu, 64.0);
        assert_eq!(analysis.max_memory_gb, 768.0);
        assert!((analysis.cpu_utilization_pct - 6.25).abs() < 1e-9);
        assert!((analysis.memory_utilization_pct - 16.0 / 768.0 * 100.0).abs() < 1e-9);
    }

    #[test]
    fn zero_capacity_policy_yields_zero_utilization() {
        let workloads = vec![workload("vm-1", 10.0, PowerState::On, "ds-01")];
        let empty = ClusterPolicy {
            physical_cpu_cores: 0.0,
            physical_memory_tb: 0.0,
            cpu_overcommit_ratio: 4.0,
            memory_overcommit_ratio: 1.0,
        };
        let analysis = analyze_cluster("c1", &workloads, Some(&empty));
        assert!(analysis.policy_applied);
        assert_eq!(analysis.cpu_utilization_pct, 0.0);
        assert_eq!(analysis.memory_utilization_pct, 0.0);
    }

    #[test]
    fn missing_policy_warns_and_reports_zero() {
        let snap = snapshot(
            vec![volume("ds-01", 100.0, 50.0, "c1"), volume("ds-02", 100.0, 50.0, "c2")],
            vec![
                workload("vm-1", 10.0, PowerState::On, "ds-01"),
                workload("vm-2", 10.0, PowerState::On, "ds-02"),
            ],
        );
        let policies = BTreeMap::from([("c1".to_string(), policy())]);
        let health = analyze_clusters(&snap, &policies);
        assert_eq!(health.clusters.len(), 2);
        assert!(health.clusters[0].policy_applied);
        assert!(!health.clusters[1].policy_applied);
        assert_eq!(health.clusters[1].cpu_utilization_pct, 0.0);
        assert_eq!(
            health.warnings,
            vec!["no overcommit policy configured for cluster c2".to_string()]
        );
    }

    #[test]
    fn cluster_spelling_differences_share_one_group_and_policy() {
        let snap = snapshot(
            vec![volume("ds-01", 100.0, 50.0, "C1"), volume("ds-02", 100.0, 50.0, " c1 ")],
            vec![
                workload("vm-1", 10.0, PowerState::On, "ds-01"),
                workload("vm-2", 10.0, PowerState::Off, "ds-02"),
            ],
        );
        let policies = BTreeMap::from([("c1".to_string(), policy())]);
        let health = analyze_clusters(&snap, &policies);
        assert_eq!(health.clusters.len(), 1);
        assert_eq!(health.clusters[0].cluster, "C1");
        assert_eq!(health.clusters[0].workload_count, 2);
        assert!(health.clusters[0].policy_applied);
        assert!(health.warnings.is_empty());
    }

    #[test]
    fn overview_sorts_by_utilization() {
        let snap = snapshot(
            vec![
                volume("ds-low", 100.0, 10.0, "c1"),
                volume("ds-full", 100.0, 100.0, "c1"),
                volume("ds-over", 100.0, 130.0, "c1"),
            ],
            Vec::new(),
        );
        let rows = capacity_overview(&snap);
        let names = rows.iter().map(|r| r.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["ds-over", "ds-full", "ds-low"]);
        assert!(rows[0].overcommitted);
        assert!(!rows[1].overcommitted);
        assert!((rows[0].utilization_pct - 130.0).abs() < 1e-9);
    }
}
