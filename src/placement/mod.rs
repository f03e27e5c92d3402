pub mod planner;
pub mod selector;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::inventory::PowerState;
use crate::scoring::RiskTier;

/// Why no destination could be found for a workload.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum DestinationError {
    #[error("no other volume in cluster {cluster}")]
    NoCandidateInCluster { cluster: String },

    #[error("no volume in cluster {cluster} belongs to environment {environment}")]
    NoCandidateInEnvironment { cluster: String, environment: String },

    #[error("no volume in cluster {cluster} has more than {required_gb:.1} GB free")]
    InsufficientFreeSpace { cluster: String, required_gb: f64 },

    #[error("no volume in cluster {cluster} meets the environment, free-space and exclusion constraints together")]
    ExcludedByPolicy { cluster: String },

    #[error("no destination satisfies the migration rule for type {source_type}")]
    NoRuleMatch {
        cluster: String,
        source_type: String,
        preferred: Vec<String>,
    },
}

impl DestinationError {
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::NoCandidateInCluster { .. } => "no_candidate_in_cluster",
            Self::NoCandidateInEnvironment { .. } => "no_candidate_in_environment",
            Self::InsufficientFreeSpace { .. } => "insufficient_free_space",
            Self::ExcludedByPolicy { .. } => "excluded_by_policy",
            Self::NoRuleMatch { .. } => "no_rule_match",
        }
    }

    /// Operator-facing next step for this failure.
    pub fn suggestion(&self) -> String {
        match self {
            Self::NoCandidateInCluster { cluster } => {
                format!("add a datastore to cluster {cluster}")
            }
            Self::NoCandidateInEnvironment {
                cluster,
                environment,
            } => format!("add a {environment} datastore to cluster {cluster}"),
            Self::InsufficientFreeSpace {
                cluster,
                required_gb,
            } => format!(
                "provision additional capacity of at least {required_gb:.0} GB in cluster {cluster}"
            ),
            Self::ExcludedByPolicy { cluster } => format!(
                "review the exclusion keywords and environment assignments, or provision a datastore in cluster {cluster}"
            ),
            Self::NoRuleMatch {
                cluster,
                source_type,
                preferred,
            } => match preferred.first() {
                Some(wanted) => {
                    format!("provision additional capacity of type {wanted} in cluster {cluster}")
                }
                None => format!("review the migration rule for type {source_type}"),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlannedMove {
    pub workload: String,
    pub provisioned_gb: f64,
    pub power_state: PowerState,
    pub criticality: String,
    pub score: u8,
    pub tier: RiskTier,
    pub justification: String,
}

/// Destination volume name to the workloads moving there, both in selection order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MigrationPlan {
    pub destinations: IndexMap<String, Vec<PlannedMove>>,
}

impl MigrationPlan {
    pub fn assign(&mut self, destination: impl Into<String>, planned: PlannedMove) {
        self.destinations
            .entry(destination.into())
            .or_default()
            .push(planned);
    }

    pub fn is_empty(&self) -> bool {
        self.destinations.is_empty()
    }

    pub fn move_count(&self) -> usize {
        self.destinations.values().map(Vec::len).sum()
    }

    pub fn total_gb(&self) -> f64 {
        self.destinations
            .values()
            .flatten()
            .map(|m| m.provisioned_gb)
            .sum()
    }

    pub fn assigned_gb(&self, destination: &str) -> f64 {
        self.destinations
            .get(destination)
            .map(|moves| moves.iter().map(|m| m.provisioned_gb).sum())
            .unwrap_or(0.0)
    }

    pub fn moves(&self) -> impl Iterator<Item = (&str, &PlannedMove)> {
        self.destinations
            .iter()
            .flat_map(|(dest, moves)| moves.iter().map(move |m| (dest.as_str(), m)))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UnplacedWorkload {
    pub workload: String,
    pub provisioned_gb: f64,
    pub reason: DestinationError,
    pub suggestion: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlanOutcome {
    pub source: String,
    pub target_gb: f64,
    /// Size of the greedy selection, placed or not.
    pub selected_gb: f64,
    pub plan: MigrationPlan,
    pub unplaced: Vec<UnplacedWorkload>,
}

impl PlanOutcome {
    pub fn planned_gb(&self) -> f64 {
        self.plan.total_gb()
    }

    pub fn shortfall_gb(&self) -> f64 {
        (self.target_gb - self.planned_gb()).max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::{DestinationError, MigrationPlan, PlannedMove};
    use crate::inventory::PowerState;
    use crate::scoring::RiskTier;

    fn planned(name: &str, size: f64) -> PlannedMove {
        PlannedMove {
            workload: name.to_string(),
            provisioned_gb: size,
            power_state: PowerState::Off,
            criticality: String::new(),
            score: 99,
            tier: RiskTier::PoweredOff,
            justification: RiskTier::PoweredOff.justification().to_string(),
        }
    }

    #[test]
    fn plan_keeps_insertion_order() {
        let mut plan = MigrationPlan::default();
        plan.assign("ds-b", planned("vm-1", 10.0));
        plan.assign("ds-a", planned("vm-2", 5.0));
        plan.assign("ds-b", planned("vm-3", 2.5));

        let order = plan.moves().map(|(d, m)| (d, m.workload.as_str())).collect::<Vec<_>>();
        assert_eq!(order, vec![("ds-b", "vm-1"), ("ds-b", "vm-3"), ("ds-a", "vm-2")]);
        assert_eq!(plan.move_count(), 3);
        assert!((plan.total_gb() - 17.5).abs() < 1e-9);
        assert!((plan.assigned_gb("ds-b") - 12.5).abs() < 1e-9);
        assert_eq!(plan.assigned_gb("ds-z"), 0.0);
    }

    #[test]
    fn errors_carry_codes_and_suggestions() {
        let err = DestinationError::NoRuleMatch {
            cluster: "c1".to_string(),
            source_type: "nvme".to_string(),
            preferred: vec!["nvme".to_string(), "ssd".to_string()],
        };
        assert_eq!(err.reason_code(), "no_rule_match");
        assert_eq!(
            err.suggestion(),
            "provision additional capacity of type nvme in cluster c1"
        );

        let err = DestinationError::InsufficientFreeSpace {
            cluster: "c1".to_string(),
            required_gb: 42.0,
        };
        assert_eq!(
            err.to_string(),
            "no volume in cluster c1 has more than 42.0 GB free"
        );
    }
}
