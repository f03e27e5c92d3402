use std::collections::HashSet;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::inventory::changelog::LookbackWindow;
use crate::inventory::{ChangeAction, ChangeLogEntry, Workload};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiagnosisSettings {
    #[serde(default = "default_lookback_hours")]
    pub lookback_hours: u32,
    /// Change-log object types that describe workloads.
    #[serde(default = "default_workload_types")]
    pub workload_types: Vec<String>,
    /// Detail-text markers of a provisioned-size change.
    #[serde(default = "default_size_keywords")]
    pub size_keywords: Vec<String>,
}

impl DiagnosisSettings {
    pub fn lookback(&self) -> Duration {
        Duration::hours(i64::from(self.lookback_hours))
    }
}

impl Default for DiagnosisSettings {
    fn default() -> Self {
        Self {
            lookback_hours: default_lookback_hours(),
            workload_types: default_workload_types(),
            size_keywords: default_size_keywords(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CauseDiagnosis {
    pub new_workloads: usize,
    pub disk_modifications: usize,
}

impl CauseDiagnosis {
    pub fn is_attributable(&self) -> bool {
        self.new_workloads > 0 || self.disk_modifications > 0
    }

    pub fn summary(&self) -> Option<String> {
        if !self.is_attributable() {
            return None;
        }
        let mut parts = Vec::new();
        if self.new_workloads > 0 {
            parts.push(plural(self.new_workloads, "new workload", "new workloads"));
        }
        if self.disk_modifications > 0 {
            parts.push(plural(
                self.disk_modifications,
                "disk-size change",
                "disk-size changes",
            ));
        }
        Some(parts.join(" and "))
    }
}

fn plural(count: usize, one: &str, many: &str) -> String {
    if count == 1 {
        format!("{count} {one}")
    } else {
        format!("{count} {many}")
    }
}

/// Counts change-log events inside `window` that touch workloads now living on `volume`.
pub fn diagnose(
    volume: &str,
    workloads: &[Workload],
    change_log: &[ChangeLogEntry],
    window: &LookbackWindow,
    settings: &DiagnosisSettings,
) -> CauseDiagnosis {
    let residents = workloads
        .iter()
        .filter(|w| w.volume == volume)
        .map(Workload::identity_key)
        .collect::<HashSet<_>>();

    let mut diagnosis = CauseDiagnosis::default();
    if residents.is_empty() {
        return diagnosis;
    }

    let relevant = change_log.iter().filter(|entry| {
        window.contains(entry.timestamp)
            && entry.is_workload_entry(&settings.workload_types)
            && residents.contains(&entry.subject_key())
    });
    for entry in relevant {
        match entry.action {
            ChangeAction::Added => diagnosis.new_workloads += 1,
            ChangeAction::Modified if entry.mentions_any(&settings.size_keywords) => {
                diagnosis.disk_modifications += 1
            }
            _ => {}
        }
    }
    diagnosis
}

/// Sentence form used in reports, `None` when nothing in the window explains the overrun.
pub fn describe(diagnosis: &CauseDiagnosis, window: &LookbackWindow) -> Option<String> {
    diagnosis
        .summary()
        .map(|summary| format!("{summary} in the last {}h", window.hours()))
}

fn default_lookback_hours() -> u32 {
    24
}

fn default_workload_types() -> Vec<String> {
    vec![
        "vm".to_string(),
        "virtualmachine".to_string(),
        "workload".to_string(),
    ]
}

fn default_size_keywords() -> Vec<String> {
    vec!["provisioned".to_string(), "disk size".to_string()]
}
