use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::inventory::{PowerState, Workload};

pub const DORMANT_SCORE: u8 = 99;

/// How risky it is to move a workload, from safest to riskiest.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum RiskTier {
    PoweredOff,
    MarkedUnused,
    NonProduction,
    Production,
}

impl RiskTier {
    pub fn justification(self) -> &'static str {
        match self {
            Self::PoweredOff => "very low risk, powered off",
            Self::MarkedUnused => "very low risk, indicated as unused",
            Self::NonProduction => "low risk, non-production",
            Self::Production => "moderate risk, active production workload",
        }
    }
}

impl Display for RiskTier {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.justification())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoringPolicy {
    #[serde(default = "default_active_penalty")]
    pub active_penalty: f64,
    #[serde(default = "default_unknown_criticality_penalty")]
    pub unknown_criticality_penalty: f64,
    /// Upper-cased criticality tier to penalty.
    #[serde(default = "default_criticality_penalties")]
    pub criticality_penalties: BTreeMap<String, f64>,
    /// Tiers treated as non-production. Empty criticality always counts as low risk.
    #[serde(default = "default_low_risk_tiers")]
    pub low_risk_tiers: Vec<String>,
    #[serde(default = "default_unused_markers")]
    pub unused_markers: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkloadScore {
    pub score: u8,
    pub tier: RiskTier,
}

impl ScoringPolicy {
    pub fn score(&self, workload: &Workload) -> WorkloadScore {
        let tier = self.justify(workload);
        let score = match tier {
            RiskTier::PoweredOff | RiskTier::MarkedUnused => DORMANT_SCORE,
            RiskTier::NonProduction | RiskTier::Production => {
                let raw = 100.0
                    - self.active_penalty
                    - self.criticality_penalty(&workload.criticality);
                raw.clamp(0.0, 100.0).round() as u8
            }
        };
        WorkloadScore { score, tier }
    }

    /// Risk tier from workload properties alone; never looks at the numeric score.
    pub fn justify(&self, workload: &Workload) -> RiskTier {
        if workload.power_state == PowerState::Off {
            return RiskTier::PoweredOff;
        }
        if self.is_marked_unused(&workload.name) {
            return RiskTier::MarkedUnused;
        }
        let criticality = normalize_criticality(&workload.criticality);
        if criticality.is_empty()
            || self
                .low_risk_tiers
                .iter()
                .any(|tier| normalize_criticality(tier) == criticality)
        {
            RiskTier::NonProduction
        } else {
            RiskTier::Production
        }
    }

    pub fn criticality_penalty(&self, criticality: &str) -> f64 {
        let key = normalize_criticality(criticality);
        self.criticality_penalties
            .iter()
            .find(|(tier, _)| normalize_criticality(tier) == key)
            .map(|(_, penalty)| *penalty)
            .unwrap_or(self.unknown_criticality_penalty)
    }

    fn is_marked_unused(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        self.unused_markers
            .iter()
            .map(|m| m.trim().to_lowercase())
            .any(|m| !m.is_empty() && name.contains(&m))
    }
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self {
            active_penalty: default_active_penalty(),
            unknown_criticality_penalty: default_unknown_criticality_penalty(),
            criticality_penalties: default_criticality_penalties(),
            low_risk_tiers: default_low_risk_tiers(),
            unused_markers: default_unused_markers(),
        }
    }
}

fn normalize_criticality(raw: &str) -> String {
    raw.trim().to_uppercase()
}

fn default_active_penalty() -> f64 {
    5.0
}

fn default_unknown_criticality_penalty() -> f64 {
    2.0
}

fn default_criticality_penalties() -> BTreeMap<String, f64> {
    BTreeMap::from([
        ("LOW".to_string(), 0.0),
        ("DEV".to_string(), 0.0),
        ("TEST".to_string(), 0.0),
        ("MEDIUM".to_string(), 2.0),
        ("HIGH".to_string(), 4.0),
        ("CRITICAL".to_string(), 5.0),
    ])
}

fn default_low_risk_tiers() -> Vec<String> {
    vec!["LOW".to_string(), "DEV".to_string(), "TEST".to_string()]
}

fn default_unused_markers() -> Vec<String> {
    vec!["unused".to_string(), "decommission".to_string()]
}
