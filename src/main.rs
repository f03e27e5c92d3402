use std::path::PathBuf;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use datastore_rebalancer::config::{Config, ConfigOverrides};
use datastore_rebalancer::health::{
    analyze_clusters, capacity_overview, ClusterHealth, VolumeUtilization,
};
use datastore_rebalancer::inventory::changelog::parse_timestamp;
use datastore_rebalancer::inventory::source::{load_snapshot, CsvDirectorySource};
use datastore_rebalancer::inventory::{InventorySnapshot, Volume};
use datastore_rebalancer::orchestrator::{CapacityReport, Orchestrator, ScoredWorkload};
use datastore_rebalancer::output::csv::{capacity_to_csv, plan_to_csv, report_to_csv};
use datastore_rebalancer::output::json::render_json;
use datastore_rebalancer::output::table::{
    render_capacity_table, render_clusters_table, render_plan_table, render_report_table,
    render_scores_table,
};
use datastore_rebalancer::placement::PlanOutcome;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

#[derive(Debug, Parser)]
#[command(
    name = "datastore-rebalancer",
    about = "Finds over-committed datastores and plans workload migrations off them"
)]
struct Cli {
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Directory with volumes.csv, workloads.csv and optionally changes.csv.
    #[arg(short, long)]
    inventory: Option<String>,
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,
    /// Capture time of the inventory; defaults to the current time.
    #[arg(long)]
    now: Option<String>,
    #[arg(long = "lookback-hours")]
    lookback_hours: Option<u32>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Every over-committed volume with its diagnosis and migration plan.
    Report,
    Plan {
        #[arg(long)]
        volume: String,
    },
    /// Utilization of every volume.
    Capacity,
    Clusters,
    Scores {
        #[arg(long)]
        volume: String,
    },
    Config {
        #[arg(long)]
        init: bool,
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let mut config = Config::load(Some(&config_path))?;
    config.apply_overrides(ConfigOverrides {
        inventory_dir: cli.inventory.clone(),
        lookback_hours: cli.lookback_hours,
    });

    if matches!(cli.command, Commands::Config { .. }) {
        return handle_config_command(&cli.command, &config, &config_path);
    }
    for source_type in config.shadowed_rules() {
        warn!("migration rule for type '{source_type}' declared more than once, using the first");
    }

    let captured_at = resolve_now(cli.now.as_deref())?;
    let source = CsvDirectorySource::new(config.resolved_inventory_dir());
    let snapshot = load_snapshot(&source, captured_at).await?;
    let engine = Orchestrator::from_config(&config);

    match &cli.command {
        Commands::Report => {
            let report = engine.run(&snapshot);
            print_report(&report, cli.output)?;
        }
        Commands::Plan { volume } => {
            let volume = find_volume(&snapshot, volume)?;
            if !volume.is_overcommitted() {
                info!("{} is within capacity, nothing to move", volume.name);
            }
            let outcome = engine.plan_volume(&snapshot, volume);
            print_plan(&outcome, cli.output)?;
        }
        Commands::Capacity => {
            let rows = capacity_overview(&snapshot);
            print_capacity(&rows, cli.output)?;
        }
        Commands::Clusters => {
            let health = analyze_clusters(&snapshot, &config.clusters);
            print_clusters(&health, cli.output)?;
        }
        Commands::Scores { volume } => {
            let volume = find_volume(&snapshot, volume)?;
            let scored = engine.score_volume(&snapshot, volume);
            print_scores(&scored, cli.output)?;
        }
        Commands::Config { .. } => {}
    }

    Ok(())
}

fn resolve_now(raw: Option<&str>) -> Result<DateTime<Utc>> {
    match raw {
        Some(raw) => parse_timestamp(raw).ok_or_else(|| anyhow!("invalid --now timestamp: {raw}")),
        None => Ok(Utc::now()),
    }
}

fn find_volume<'s>(snapshot: &'s InventorySnapshot, name: &str) -> Result<&'s Volume> {
    snapshot
        .volume(name)
        .ok_or_else(|| anyhow!("volume {name} not found in inventory"))
}

fn handle_config_command(command: &Commands, config: &Config, config_path: &PathBuf) -> Result<()> {
    let Commands::Config { init, show } = command else {
        return Ok(());
    };
    if *init {
        Config::write_template(config_path)?;
        println!("Wrote config template to {}", config_path.display());
    }
    if *show || !*init {
        println!("{}", render_json(config)?);
    }
    Ok(())
}

fn print_report(report: &CapacityReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => println!("{}", render_report_table(report)),
        OutputFormat::Json => println!("{}", render_json(report)?),
        OutputFormat::Csv => println!("{}", report_to_csv(report)?),
    }
    Ok(())
}

fn print_plan(outcome: &PlanOutcome, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => println!("{}", render_plan_table(outcome)),
        OutputFormat::Json => println!("{}", render_json(outcome)?),
        OutputFormat::Csv => println!("{}", plan_to_csv(outcome)?),
    }
    Ok(())
}

fn print_capacity(rows: &[VolumeUtilization], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => println!("{}", render_capacity_table(rows)),
        OutputFormat::Json => println!("{}", render_json(rows)?),
        OutputFormat::Csv => println!("{}", capacity_to_csv(rows)?),
    }
    Ok(())
}

fn print_clusters(health: &ClusterHealth, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => println!("{}", render_clusters_table(health)),
        OutputFormat::Json => println!("{}", render_json(health)?),
        OutputFormat::Csv => {
            warn!("CSV output for clusters not implemented, using JSON");
            println!("{}", render_json(health)?);
        }
    }
    Ok(())
}

fn print_scores(scored: &[ScoredWorkload], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => println!("{}", render_scores_table(scored)),
        OutputFormat::Json => println!("{}", render_json(scored)?),
        OutputFormat::Csv => {
            warn!("CSV output for scores not implemented, using JSON");
            println!("{}", render_json(scored)?);
        }
    }
    Ok(())
}
