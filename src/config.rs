use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::diagnosis::DiagnosisSettings;
use crate::health::ClusterPolicy;
use crate::rules::MigrationRule;
use crate::scoring::ScoringPolicy;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub inventory: InventoryConfig,
    #[serde(default)]
    pub scoring: ScoringPolicy,
    #[serde(default)]
    pub exclusions: ExclusionsConfig,
    #[serde(default)]
    pub diagnosis: DiagnosisSettings,
    #[serde(default)]
    pub rules: Vec<MigrationRule>,
    #[serde(default)]
    pub clusters: BTreeMap<String, ClusterPolicy>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryConfig {
    /// Directory holding volumes.csv, workloads.csv and an optional changes.csv.
    #[serde(default = "default_inventory_dir")]
    pub dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExclusionsConfig {
    /// Volumes whose names contain any of these are never chosen as destinations.
    #[serde(default = "default_exclusion_keywords")]
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub inventory_dir: Option<String>,
    pub lookback_hours: Option<u32>,
}

impl Config {
    pub fn default_path() -> PathBuf {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        home.join(".config/datastore-rebalancer/config.toml")
    }

    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(|p| p.to_path_buf())
            .unwrap_or_else(Self::default_path);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read_to_string(&path)
            .with_context(|| format!("failed reading config: {}", path.display()))?;
        Self::parse(&data).with_context(|| format!("failed parsing TOML config: {}", path.display()))
    }

    pub fn parse(data: &str) -> Result<Self> {
        Ok(toml::from_str(data)?)
    }

    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(dir) = overrides.inventory_dir {
            self.inventory.dir = dir;
        }
        if let Some(hours) = overrides.lookback_hours {
            self.diagnosis.lookback_hours = hours;
        }
    }

    pub fn write_template(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed creating config directory: {}", parent.display())
            })?;
        }
        fs::write(path, Self::default_template())
            .with_context(|| format!("failed writing config template: {}", path.display()))
    }

    pub fn resolved_inventory_dir(&self) -> PathBuf {
        expand_tilde(&self.inventory.dir)
    }

    /// Volume types that appear in the rule list more than once. Only the first is used.
    pub fn shadowed_rules(&self) -> Vec<String> {
        let mut seen = Vec::new();
        let mut shadowed = Vec::new();
        for rule in &self.rules {
            let key = rule.source_type.trim().to_lowercase();
            if seen.contains(&key) {
                if !shadowed.contains(&key) {
                    shadowed.push(key);
                }
            } else {
                seen.push(key);
            }
        }
        shadowed
    }

    pub fn default_template() -> String {
        let template = r#"[inventory]
dir = "~/.local/share/datastore-rebalancer/inventory"

[exclusions]
keywords = ["local", "template", "iso"]

[diagnosis]
lookback_hours = 24
workload_types = ["vm", "virtualmachine", "workload"]
size_keywords = ["provisioned", "disk size"]

[scoring]
active_penalty = 5.0
unknown_criticality_penalty = 2.0
low_risk_tiers = ["LOW", "DEV", "TEST"]
unused_markers = ["unused", "decommission"]

[scoring.criticality_penalties]
LOW = 0.0
DEV = 0.0
TEST = 0.0
MEDIUM = 2.0
HIGH = 4.0
CRITICAL = 5.0

# Destination types are tried in order; the first one with room wins.
[[rules]]
source_type = "ssd"
alias = "flash"
destinations = ["ssd", "hybrid"]

[[rules]]
source_type = "hdd"
destinations = ["hdd", "hybrid"]

# [clusters.cluster-a]
# physical_cpu_cores = 128
# physical_memory_tb = 2.0
# cpu_overcommit_ratio = 4.0
# memory_overcommit_ratio = 1.2
"#;
        template.to_string()
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            inventory: InventoryConfig::default(),
            scoring: ScoringPolicy::default(),
            exclusions: ExclusionsConfig::default(),
            diagnosis: DiagnosisSettings::default(),
            rules: Vec::new(),
            clusters: BTreeMap::new(),
        }
    }
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            dir: default_inventory_dir(),
        }
    }
}

impl Default for ExclusionsConfig {
    fn default() -> Self {
        Self {
            keywords: default_exclusion_keywords(),
        }
    }
}

fn default_inventory_dir() -> String {
    "~/.local/share/datastore-rebalancer/inventory".to_string()
}

fn default_exclusion_keywords() -> Vec<String> {
    vec!["local".to_string(), "template".to_string(), "iso".to_string()]
}
