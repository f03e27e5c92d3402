use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color, ContentArrangement, Row, Table};

use crate::health::{ClusterHealth, VolumeUtilization};
use crate::orchestrator::{CapacityReport, ScoredWorkload};
use crate::placement::{MigrationPlan, PlanOutcome, UnplacedWorkload};

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn moves_table(plan: &MigrationPlan, unplaced: &[UnplacedWorkload]) -> Table {
    let mut table = new_table();
    table.set_header(vec![
        "Destination",
        "Workload",
        "Size (GB)",
        "Power",
        "Criticality",
        "Score",
        "Justification",
    ]);
    for (destination, planned) in plan.moves() {
        table.add_row(vec![
            destination.to_string(),
            planned.workload.clone(),
            format!("{:.1}", planned.provisioned_gb),
            planned.power_state.to_string(),
            if planned.criticality.is_empty() {
                "-".to_string()
            } else {
                planned.criticality.clone()
            },
            planned.score.to_string(),
            planned.justification.clone(),
        ]);
    }
    for item in unplaced {
        table.add_row(Row::from(vec![
            Cell::new("UNPLACED").fg(Color::Red),
            Cell::new(&item.workload),
            Cell::new(format!("{:.1}", item.provisioned_gb)),
            Cell::new("-"),
            Cell::new("-"),
            Cell::new("-"),
            Cell::new(format!("{} ({})", item.reason, item.suggestion)),
        ]));
    }
    table
}

pub fn render_plan_table(outcome: &PlanOutcome) -> String {
    let mut out = moves_table(&outcome.plan, &outcome.unplaced).to_string();
    out.push_str(&format!(
        "\n{}: target {:.1} GB, planned {:.1} GB, shortfall {:.1} GB",
        outcome.source,
        outcome.target_gb,
        outcome.planned_gb(),
        outcome.shortfall_gb()
    ));
    out
}

pub fn render_report_table(report: &CapacityReport) -> String {
    let mut out = format!(
        "Snapshot {} captured {} ({} volumes)\n",
        &report.snapshot_fingerprint[..12.min(report.snapshot_fingerprint.len())],
        report.captured_at.to_rfc3339(),
        report.volumes_checked
    );
    if report.is_all_within_capacity() {
        out.push_str("All volumes are within capacity.\n");
    }

    for entry in report.entries() {
        out.push_str(&format!(
            "\n{} [{} / {}] {:.1}% utilized, {:.1} GB over capacity\n",
            entry.volume.name,
            entry.volume.cluster,
            entry.volume.volume_type,
            entry.utilization_pct,
            entry.target_gb
        ));
        if let Some(diagnosis) = &entry.diagnosis {
            out.push_str(&format!("Likely cause: {diagnosis}\n"));
        }
        out.push_str(&moves_table(&entry.plan, &entry.unplaced).to_string());
        out.push_str(&format!(
            "\nPlanned {:.1} GB, shortfall {:.1} GB\n",
            entry.planned_gb, entry.shortfall_gb
        ));
    }

    for warning in &report.warnings {
        out.push_str(&format!("\nwarning: {warning}"));
    }
    out
}

pub fn render_capacity_table(rows: &[VolumeUtilization]) -> String {
    let mut table = new_table();
    table.set_header(vec![
        "Volume",
        "Cluster",
        "Env",
        "Type",
        "Capacity (GB)",
        "Provisioned (GB)",
        "Free (GB)",
        "Utilization",
    ]);
    for row in rows {
        let utilization = format!("{:.1}%", row.utilization_pct);
        let utilization_cell = if row.overcommitted {
            Cell::new(utilization).fg(Color::Red)
        } else {
            Cell::new(utilization).fg(Color::Green)
        };
        table.add_row(Row::from(vec![
            Cell::new(&row.name),
            Cell::new(&row.cluster),
            Cell::new(&row.environment),
            Cell::new(&row.volume_type),
            Cell::new(format!("{:.1}", row.capacity_gb)),
            Cell::new(format!("{:.1}", row.provisioned_gb)),
            Cell::new(format!("{:.1}", row.free_gb)),
            utilization_cell,
        ]));
    }
    table.to_string()
}

pub fn render_clusters_table(health: &ClusterHealth) -> String {
    let mut table = new_table();
    table.set_header(vec![
        "Cluster",
        "Workloads",
        "On / Off",
        "vCPU",
        "Memory (GB)",
        "Disk (TB)",
        "CPU Util",
        "Memory Util",
    ]);
    for c in &health.clusters {
        let (cpu, memory) = if c.policy_applied {
            (
                format!("{:.1}% of {:.0}", c.cpu_utilization_pct, c.max_cpu),
                format!("{:.1}% of {:.0}", c.memory_utilization_pct, c.max_memory_gb),
            )
        } else {
            ("-".to_string(), "-".to_string())
        };
        table.add_row(vec![
            if c.cluster.is_empty() {
                "(unassigned)".to_string()
            } else {
                c.cluster.clone()
            },
            c.workload_count.to_string(),
            format!("{} / {}", c.powered_on, c.powered_off),
            format!("{:.0}", c.total_cpu),
            format!("{:.1}", c.total_memory_gb),
            format!("{:.2}", c.total_disk_tb),
            cpu,
            memory,
        ]);
    }
    let mut out = table.to_string();
    for warning in &health.warnings {
        out.push_str(&format!("\nwarning: {warning}"));
    }
    out
}

pub fn render_scores_table(items: &[ScoredWorkload]) -> String {
    let mut table = new_table();
    table.set_header(vec!["Rank", "Workload", "Size (GB)", "Score", "Justification"]);
    for (idx, item) in items.iter().enumerate() {
        table.add_row(vec![
            (idx + 1).to_string(),
            item.workload.clone(),
            format!("{:.1}", item.provisioned_gb),
            item.score.to_string(),
            item.justification.clone(),
        ]);
    }
    table.to_string()
}
