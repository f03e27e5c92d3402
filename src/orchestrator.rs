use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::Config;
use crate::diagnosis::{describe, diagnose, CauseDiagnosis, DiagnosisSettings};
use crate::inventory::changelog::LookbackWindow;
use crate::inventory::{InventorySnapshot, Volume};
use crate::placement::planner::{build_plan, rank_workloads, PlanContext};
use crate::placement::{MigrationPlan, PlanOutcome, UnplacedWorkload};
use crate::rules::{MigrationRule, RuleResolver};
use crate::scoring::{RiskTier, ScoringPolicy};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReportEntry {
    pub volume: Volume,
    pub utilization_pct: f64,
    pub target_gb: f64,
    pub planned_gb: f64,
    pub shortfall_gb: f64,
    pub diagnosis: Option<String>,
    pub cause: CauseDiagnosis,
    pub plan: MigrationPlan,
    pub unplaced: Vec<UnplacedWorkload>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CapacityStatus {
    AllWithinCapacity,
    Overcommitted { entries: Vec<ReportEntry> },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CapacityReport {
    pub snapshot_fingerprint: String,
    pub captured_at: DateTime<Utc>,
    pub volumes_checked: usize,
    pub status: CapacityStatus,
    pub warnings: Vec<String>,
}

impl CapacityReport {
    pub fn is_all_within_capacity(&self) -> bool {
        matches!(self.status, CapacityStatus::AllWithinCapacity)
    }

    pub fn entries(&self) -> &[ReportEntry] {
        match &self.status {
            CapacityStatus::AllWithinCapacity => &[],
            CapacityStatus::Overcommitted { entries } => entries,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoredWorkload {
    pub workload: String,
    pub provisioned_gb: f64,
    pub score: u8,
    pub tier: RiskTier,
    pub justification: String,
}

/// Entry point of the engine. Holds only configuration; every call is a pure function of
/// the snapshot it is given.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    resolver: RuleResolver,
    exclusions: Vec<String>,
    scoring: ScoringPolicy,
    diagnosis: DiagnosisSettings,
}

impl Orchestrator {
    pub fn new(
        rules: Vec<MigrationRule>,
        exclusions: Vec<String>,
        scoring: ScoringPolicy,
        diagnosis: DiagnosisSettings,
    ) -> Self {
        Self {
            resolver: RuleResolver::new(rules),
            exclusions,
            scoring,
            diagnosis,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.rules.clone(),
            config.exclusions.keywords.clone(),
            config.scoring.clone(),
            config.diagnosis.clone(),
        )
    }

    fn context(&self) -> PlanContext<'_> {
        PlanContext {
            resolver: &self.resolver,
            exclusions: &self.exclusions,
            scoring: &self.scoring,
        }
    }

    pub fn window(&self, snapshot: &InventorySnapshot) -> LookbackWindow {
        LookbackWindow::ending_at(snapshot.captured_at, self.diagnosis.lookback())
    }

    pub fn plan_volume(&self, snapshot: &InventorySnapshot, volume: &Volume) -> PlanOutcome {
        build_plan(
            volume,
            &snapshot.volumes,
            &snapshot.workloads,
            &self.context(),
        )
    }

    /// Workloads on `volume` in the order the planner would consider them.
    pub fn score_volume(&self, snapshot: &InventorySnapshot, volume: &Volume) -> Vec<ScoredWorkload> {
        rank_workloads(volume, &snapshot.workloads, &self.scoring)
            .into_iter()
            .map(|(workload, scored)| ScoredWorkload {
                workload: workload.name.clone(),
                provisioned_gb: workload.provisioned_gb,
                score: scored.score,
                tier: scored.tier,
                justification: scored.tier.justification().to_string(),
            })
            .collect()
    }

    pub fn run(&self, snapshot: &InventorySnapshot) -> CapacityReport {
        let window = self.window(snapshot);
        let mut warnings = Vec::new();
        let mut entries = Vec::new();

        for volume in snapshot.overcommitted() {
            if self.resolver.resolve(&volume.volume_type).is_none() {
                push_unique(
                    &mut warnings,
                    format!(
                        "no migration rule for volume type '{}'; destinations for {} are ranked by free space only",
                        volume.volume_type, volume.name
                    ),
                );
            }

            let cause = diagnose(
                &volume.name,
                &snapshot.workloads,
                &snapshot.change_log,
                &window,
                &self.diagnosis,
            );
            let outcome = self.plan_volume(snapshot, volume);
            info!(
                "{}: {:.1} GB over capacity, {} moves planned for {:.1} GB",
                volume.name,
                outcome.target_gb,
                outcome.plan.move_count(),
                outcome.planned_gb()
            );
            entries.push(ReportEntry {
                volume: volume.clone(),
                utilization_pct: volume.utilization_pct(),
                target_gb: outcome.target_gb,
                planned_gb: outcome.planned_gb(),
                shortfall_gb: outcome.shortfall_gb(),
                diagnosis: describe(&cause, &window),
                cause,
                plan: outcome.plan,
                unplaced: outcome.unplaced,
            });
        }

        if !entries.is_empty() && snapshot.change_log.is_empty() {
            warnings.push("change log is empty; over-commitment causes were not diagnosed".to_string());
        }
        for message in &warnings {
            warn!("{message}");
        }

        let status = if entries.is_empty() {
            info!("all {} volumes within capacity", snapshot.volumes.len());
            CapacityStatus::AllWithinCapacity
        } else {
            CapacityStatus::Overcommitted { entries }
        };

        CapacityReport {
            snapshot_fingerprint: snapshot.fingerprint(),
            captured_at: snapshot.captured_at,
            volumes_checked: snapshot.volumes.len(),
            status,
            warnings,
        }
    }
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new(
            Vec::new(),
            Vec::new(),
            ScoringPolicy::default(),
            DiagnosisSettings::default(),
        )
    }
}

fn push_unique(warnings: &mut Vec<String>, message: String) {
    if !warnings.contains(&message) {
        warnings.push(message);
    }
}
