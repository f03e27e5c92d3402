use tracing::debug;

use crate::inventory::{Volume, Workload};
use crate::placement::selector::{same_cluster, select_destination};
use crate::placement::{MigrationPlan, PlanOutcome, PlannedMove, UnplacedWorkload};
use crate::rules::RuleResolver;
use crate::scoring::{ScoringPolicy, WorkloadScore};

pub struct PlanContext<'a> {
    pub resolver: &'a RuleResolver,
    pub exclusions: &'a [String],
    pub scoring: &'a ScoringPolicy,
}

/// Private copy of the destination volumes for one plan. Reservations raise a copy's
/// provisioned size so later selections see the reduced free space.
#[derive(Debug, Clone)]
pub struct WorkingPool {
    volumes: Vec<Volume>,
}

impl WorkingPool {
    pub fn for_source(source: &Volume, volumes: &[Volume]) -> Self {
        let volumes = volumes
            .iter()
            .filter(|v| v.name != source.name)
            .filter(|v| same_cluster(source, v))
            .cloned()
            .collect();
        Self { volumes }
    }

    pub fn volumes(&self) -> &[Volume] {
        &self.volumes
    }

    pub fn reserve(&mut self, destination: &str, size_gb: f64) {
        if let Some(volume) = self.volumes.iter_mut().find(|v| v.name == destination) {
            volume.provisioned_gb += size_gb;
        }
    }
}

/// Number of leading entries whose running total first reaches `target_gb`, or all of them
/// when the total never gets there.
pub fn greedy_prefix_len(sizes: impl IntoIterator<Item = f64>, target_gb: f64) -> usize {
    if target_gb <= 0.0 {
        return 0;
    }
    let mut total = 0.0;
    let mut count = 0;
    for size in sizes {
        count += 1;
        total += size;
        if total >= target_gb {
            break;
        }
    }
    count
}

/// Workloads on `source`, safest first. Equal scores keep inventory order.
pub fn rank_workloads<'w>(
    source: &Volume,
    workloads: &'w [Workload],
    scoring: &ScoringPolicy,
) -> Vec<(&'w Workload, WorkloadScore)> {
    let mut ranked = workloads
        .iter()
        .filter(|w| w.volume == source.name)
        .map(|w| (w, scoring.score(w)))
        .collect::<Vec<_>>();
    ranked.sort_by(|a, b| b.1.score.cmp(&a.1.score));
    ranked
}

pub fn build_plan(
    source: &Volume,
    volumes: &[Volume],
    workloads: &[Workload],
    ctx: &PlanContext<'_>,
) -> PlanOutcome {
    let target_gb = source.overcommit_gb();
    let ranked = rank_workloads(source, workloads, ctx.scoring);
    let take = greedy_prefix_len(ranked.iter().map(|(w, _)| w.provisioned_gb), target_gb);
    let selected = &ranked[..take];
    let selected_gb = selected.iter().map(|(w, _)| w.provisioned_gb).sum::<f64>();

    let mut pool = WorkingPool::for_source(source, volumes);
    let mut plan = MigrationPlan::default();
    let mut unplaced = Vec::new();

    for (workload, scored) in selected {
        match select_destination(
            source,
            workload.provisioned_gb,
            pool.volumes(),
            ctx.resolver,
            ctx.exclusions,
        ) {
            Ok(destination) => {
                let destination = destination.name.clone();
                pool.reserve(&destination, workload.provisioned_gb);
                let tier = ctx.scoring.justify(workload);
                debug!(
                    "{} ({:.1} GB, score {}) -> {}",
                    workload.name, workload.provisioned_gb, scored.score, destination
                );
                plan.assign(
                    destination,
                    PlannedMove {
                        workload: workload.name.clone(),
                        provisioned_gb: workload.provisioned_gb,
                        power_state: workload.power_state,
                        criticality: workload.criticality.clone(),
                        score: scored.score,
                        tier,
                        justification: tier.justification().to_string(),
                    },
                );
            }
            Err(reason) => {
                debug!("{} left on {}: {reason}", workload.name, source.name);
                unplaced.push(UnplacedWorkload {
                    workload: workload.name.clone(),
                    provisioned_gb: workload.provisioned_gb,
                    suggestion: reason.suggestion(),
                    reason,
                });
            }
        }
    }

    PlanOutcome {
        source: source.name.clone(),
        target_gb,
        selected_gb,
        plan,
        unplaced,
    }
}

#[cfg(test)]
mod tests {
    use super::{build_plan, greedy_prefix_len, rank_workloads, PlanContext, WorkingPool};
    use crate::inventory::fixtures::{typed_volume, volume, workload};
    use crate::inventory::PowerState;
    use crate::rules::RuleResolver;
    use crate::scoring::ScoringPolicy;

    #[test]
    fn prefix_stops_once_target_is_reached() {
        assert_eq!(greedy_prefix_len([10.0, 10.0, 10.0], 20.0), 2);
        assert_eq!(greedy_prefix_len([25.0, 10.0], 20.0), 1);
        assert_eq!(greedy_prefix_len([5.0, 5.0], 20.0), 2);
        assert_eq!(greedy_prefix_len(Vec::new(), 20.0), 0);
        assert_eq!(greedy_prefix_len([5.0], 0.0), 0);
    }

    #[test]
    fn ranking_is_safety_first_and_stable() {
        let source = volume("ds-src", 100.0, 150.0, "c1");
        let mut prod = workload("vm-prod", 10.0, PowerState::On, "ds-src");
        prod.criticality = "HIGH".to_string();
        let workloads = vec![
            prod,
            workload("vm-on-a", 10.0, PowerState::On, "ds-src"),
            workload("vm-off", 10.0, PowerState::Off, "ds-src"),
            workload("vm-on-b", 10.0, PowerState::On, "ds-src"),
            workload("vm-elsewhere", 10.0, PowerState::Off, "ds-other"),
        ];
        let ranked = rank_workloads(&source, &workloads, &ScoringPolicy::default());
        let names = ranked.iter().map(|(w, _)| w.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["vm-off", "vm-on-a", "vm-on-b", "vm-prod"]);
    }

    #[test]
    fn single_powered_off_workload_covers_target() {
        let source = volume("ds-src", 100.0, 120.0, "c1");
        let volumes = vec![
            source.clone(),
            volume("ds-small", 100.0, 70.0, "c1"),
            volume("ds-big", 500.0, 100.0, "c1"),
        ];
        let workloads = vec![
            workload("vm-active", 95.0, PowerState::On, "ds-src"),
            workload("vm-idle", 25.0, PowerState::Off, "ds-src"),
        ];
        let scoring = ScoringPolicy::default();
        let resolver = RuleResolver::default();
        let ctx = PlanContext {
            resolver: &resolver,
            exclusions: &[],
            scoring: &scoring,
        };

        let outcome = build_plan(&source, &volumes, &workloads, &ctx);
        assert!((outcome.target_gb - 20.0).abs() < 1e-9);
        assert_eq!(outcome.plan.move_count(), 1);
        let moves = &outcome.plan.destinations["ds-big"];
        assert_eq!(moves[0].workload, "vm-idle");
        assert_eq!(moves[0].score, 99);
        assert_eq!(moves[0].justification, "very low risk, powered off");
        assert!(outcome.planned_gb() >= outcome.target_gb);
        assert_eq!(outcome.shortfall_gb(), 0.0);
        assert!(outcome.unplaced.is_empty());
    }

    #[test]
    fn working_pool_prevents_overfilling_one_destination() {
        let source = volume("ds-src", 100.0, 190.0, "c1");
        let volumes = vec![
            source.clone(),
            volume("ds-a", 100.0, 50.0, "c1"),
            volume("ds-b", 100.0, 60.0, "c1"),
        ];
        let workloads = (0..3)
            .map(|i| workload(&format!("vm-{i}"), 30.0, PowerState::Off, "ds-src"))
            .collect::<Vec<_>>();
        let scoring = ScoringPolicy::default();
        let resolver = RuleResolver::default();
        let ctx = PlanContext {
            resolver: &resolver,
            exclusions: &[],
            scoring: &scoring,
        };

        let outcome = build_plan(&source, &volumes, &workloads, &ctx);
        // 50 GB free on ds-a, 40 GB on ds-b: one 30 GB workload fits on each.
        assert_eq!(outcome.plan.move_count(), 2);
        for original in &volumes[1..] {
            assert!(outcome.plan.assigned_gb(&original.name) <= original.free_space_gb());
        }
        assert_eq!(outcome.unplaced.len(), 1);
        assert_eq!(outcome.unplaced[0].workload, "vm-2");
        assert_eq!(outcome.unplaced[0].reason.reason_code(), "insufficient_free_space");
        assert!((outcome.shortfall_gb() - 30.0).abs() < 1e-9);
    }

    #[test]
    fn unreachable_target_uses_whole_list() {
        let source = volume("ds-src", 10.0, 100.0, "c1");
        let volumes = vec![source.clone(), volume("ds-a", 1000.0, 0.0, "c1")];
        let workloads = vec![
            workload("vm-1", 20.0, PowerState::On, "ds-src"),
            workload("vm-2", 30.0, PowerState::Off, "ds-src"),
        ];
        let scoring = ScoringPolicy::default();
        let resolver = RuleResolver::default();
        let ctx = PlanContext {
            resolver: &resolver,
            exclusions: &[],
            scoring: &scoring,
        };

        let outcome = build_plan(&source, &volumes, &workloads, &ctx);
        assert!((outcome.selected_gb - 50.0).abs() < 1e-9);
        let order = outcome.plan.moves().map(|(_, m)| m.workload.as_str()).collect::<Vec<_>>();
        assert_eq!(order, vec!["vm-2", "vm-1"]);
        assert!((outcome.shortfall_gb() - 40.0).abs() < 1e-9);
    }

    #[test]
    fn pool_is_limited_to_source_cluster() {
        let source = typed_volume("ds-src", 100.0, 120.0, "ssd");
        let volumes = vec![
            source.clone(),
            volume("ds-far", 1000.0, 0.0, "c2"),
            volume("ds-near", 100.0, 0.0, "c1"),
            volume("ds-spelled", 100.0, 0.0, " C1 "),
        ];
        let pool = WorkingPool::for_source(&source, &volumes);
        let names = pool.volumes().iter().map(|v| v.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["ds-near", "ds-spelled"]);

        let mut pool = pool;
        pool.reserve("ds-near", 40.0);
        assert!((pool.volumes()[0].free_space_gb() - 60.0).abs() < 1e-9);
        assert!((volumes[2].free_space_gb() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn compliant_source_has_zero_target_and_no_moves() {
        let source = volume("ds-src", 100.0, 60.0, "c1");
        let volumes = vec![source.clone(), volume("ds-a", 1000.0, 0.0, "c1")];
        let workloads = vec![workload("vm-1", 60.0, PowerState::Off, "ds-src")];
        let scoring = ScoringPolicy::default();
        let resolver = RuleResolver::default();
        let ctx = PlanContext {
            resolver: &resolver,
            exclusions: &[],
            scoring: &scoring,
        };

        let outcome = build_plan(&source, &volumes, &workloads, &ctx);
        assert_eq!(outcome.target_gb, 0.0);
        assert!(outcome.plan.is_empty());
        assert!(outcome.unplaced.is_empty());
        assert_eq!(outcome.shortfall_gb(), 0.0);
    }

    #[test]
    fn no_destination_yields_empty_plan() {
        let source = volume("ds-src", 100.0, 120.0, "c1");
        let workloads = vec![workload("vm-1", 25.0, PowerState::Off, "ds-src")];
        let scoring = ScoringPolicy::default();
        let resolver = RuleResolver::default();
        let ctx = PlanContext {
            resolver: &resolver,
            exclusions: &[],
            scoring: &scoring,
        };

        let outcome = build_plan(&source, &[source.clone()], &workloads, &ctx);
        assert!(outcome.plan.is_empty());
        assert_eq!(outcome.unplaced[0].reason.reason_code(), "no_candidate_in_cluster");
        assert_eq!(outcome.unplaced[0].suggestion, "add a datastore to cluster c1");
    }
}
