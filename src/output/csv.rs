use anyhow::Result;

use crate::health::VolumeUtilization;
use crate::orchestrator::CapacityReport;
use crate::placement::{MigrationPlan, PlanOutcome, UnplacedWorkload};

const MOVE_HEADER: [&str; 8] = [
    "source",
    "destination",
    "workload",
    "provisioned_gb",
    "power_state",
    "score",
    "justification",
    "reason",
];

fn write_moves(
    writer: &mut csv::Writer<Vec<u8>>,
    source: &str,
    plan: &MigrationPlan,
    unplaced: &[UnplacedWorkload],
) -> Result<()> {
    for (destination, planned) in plan.moves() {
        writer.write_record([
            source.to_string(),
            destination.to_string(),
            planned.workload.clone(),
            format!("{:.2}", planned.provisioned_gb),
            planned.power_state.to_string(),
            planned.score.to_string(),
            planned.justification.clone(),
            String::new(),
        ])?;
    }
    for item in unplaced {
        writer.write_record([
            source.to_string(),
            String::new(),
            item.workload.clone(),
            format!("{:.2}", item.provisioned_gb),
            String::new(),
            String::new(),
            String::new(),
            item.reason.reason_code().to_string(),
        ])?;
    }
    Ok(())
}

/// One row per planned or unplaced workload across every over-committed volume.
pub fn report_to_csv(report: &CapacityReport) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record(MOVE_HEADER)?;
    for entry in report.entries() {
        write_moves(&mut writer, &entry.volume.name, &entry.plan, &entry.unplaced)?;
    }
    let data = writer.into_inner()?;
    Ok(String::from_utf8_lossy(&data).to_string())
}

pub fn plan_to_csv(outcome: &PlanOutcome) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record(MOVE_HEADER)?;
    write_moves(&mut writer, &outcome.source, &outcome.plan, &outcome.unplaced)?;
    let data = writer.into_inner()?;
    Ok(String::from_utf8_lossy(&data).to_string())
}

pub fn capacity_to_csv(rows: &[VolumeUtilization]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record([
        "volume",
        "cluster",
        "environment",
        "type",
        "capacity_gb",
        "provisioned_gb",
        "free_gb",
        "utilization_pct",
        "overcommitted",
    ])?;
    for row in rows {
        writer.write_record([
            row.name.clone(),
            row.cluster.clone(),
            row.environment.clone(),
            row.volume_type.clone(),
            format!("{:.2}", row.capacity_gb),
            format!("{:.2}", row.provisioned_gb),
            format!("{:.2}", row.free_gb),
            format!("{:.2}", row.utilization_pct),
            row.overcommitted.to_string(),
        ])?;
    }
    let data = writer.into_inner()?;
    Ok(String::from_utf8_lossy(&data).to_string())
}
