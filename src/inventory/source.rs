use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::inventory::schema::{bind_change_log, bind_volumes, bind_workloads, Table};
use crate::inventory::InventorySnapshot;

#[async_trait]
pub trait InventorySource: Send + Sync {
    fn describe(&self) -> String;
    async fn volumes(&self) -> Result<Table>;
    async fn workloads(&self) -> Result<Table>;
    /// `None` when the source keeps no change history.
    async fn change_log(&self) -> Result<Option<Table>>;
}

/// Reads `volumes.csv`, `workloads.csv` and, if present, `changes.csv` from one directory.
#[derive(Debug, Clone)]
pub struct CsvDirectorySource {
    root: PathBuf,
}

pub const VOLUMES_FILE: &str = "volumes.csv";
pub const WORKLOADS_FILE: &str = "workloads.csv";
pub const CHANGES_FILE: &str = "changes.csv";

impl CsvDirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    async fn read_table(&self, file: &str) -> Result<Table> {
        let path = self.root.join(file);
        let data = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("failed reading inventory file: {}", path.display()))?;
        parse_csv(&data).with_context(|| format!("failed parsing CSV: {}", path.display()))
    }
}

#[async_trait]
impl InventorySource for CsvDirectorySource {
    fn describe(&self) -> String {
        format!("csv:{}", self.root.display())
    }

    async fn volumes(&self) -> Result<Table> {
        self.read_table(VOLUMES_FILE).await
    }

    async fn workloads(&self) -> Result<Table> {
        self.read_table(WORKLOADS_FILE).await
    }

    async fn change_log(&self) -> Result<Option<Table>> {
        if !exists(&self.root.join(CHANGES_FILE)).await {
            debug!("no {CHANGES_FILE} in {}", self.root.display());
            return Ok(None);
        }
        self.read_table(CHANGES_FILE).await.map(Some)
    }
}

async fn exists(path: &Path) -> bool {
    tokio::fs::metadata(path).await.is_ok()
}

pub fn parse_csv(data: &str) -> Result<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(data.as_bytes());
    let headers = reader
        .headers()?
        .iter()
        .map(|h| h.to_string())
        .collect::<Vec<_>>();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(|c| c.to_string()).collect());
    }
    Ok(Table::new(headers, rows))
}

/// Reads every table from `source` and binds it into one immutable snapshot.
pub async fn load_snapshot(
    source: &dyn InventorySource,
    captured_at: DateTime<Utc>,
) -> Result<InventorySnapshot> {
    let volumes = bind_volumes(&source.volumes().await?)?;
    let workloads = bind_workloads(&source.workloads().await?)?;
    let change_log = match source.change_log().await? {
        Some(table) => bind_change_log(&table)?,
        None => Vec::new(),
    };
    info!(
        "loaded {} volumes, {} workloads, {} change-log entries from {}",
        volumes.len(),
        workloads.len(),
        change_log.len(),
        source.describe()
    );
    Ok(InventorySnapshot::new(
        captured_at,
        volumes,
        workloads,
        change_log,
    ))
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::{load_snapshot, parse_csv, CsvDirectorySource, CHANGES_FILE, VOLUMES_FILE, WORKLOADS_FILE};
    use crate::error::EngineError;

    #[test]
    fn parses_ragged_csv() {
        let table = parse_csv("name, capacity_gb ,provisioned_gb\nds-01, 100 ,120\nds-02,50\n")
            .expect("csv should parse");
        assert_eq!(table.headers, vec!["name", "capacity_gb", "provisioned_gb"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0][1], "100");
        assert_eq!(table.rows[1].len(), 2);
    }

    #[test]
    fn loads_snapshot_from_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(
            dir.path().join(VOLUMES_FILE),
            "name,capacity_gb,provisioned_gb,cluster,environment,type\nds-01,100,120,c1,prod,ssd\n",
        )
        .expect("write volumes");
        std::fs::write(
            dir.path().join(WORKLOADS_FILE),
            "name,provisioned_gb,volume,power_state\napp-01,25,ds-01,off\n",
        )
        .expect("write workloads");

        let source = CsvDirectorySource::new(dir.path());
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let snapshot = tokio_test::block_on(load_snapshot(&source, at)).expect("snapshot");
        assert_eq!(snapshot.volumes.len(), 1);
        assert_eq!(snapshot.workloads.len(), 1);
        assert!(snapshot.change_log.is_empty());
        assert_eq!(snapshot.captured_at, at);

        std::fs::write(
            dir.path().join(CHANGES_FILE),
            "timestamp,action,subject\n2024-04-30T20:00:00Z,added,app-01\n",
        )
        .expect("write changes");
        let snapshot = tokio_test::block_on(load_snapshot(&source, at)).expect("snapshot");
        assert_eq!(snapshot.change_log.len(), 1);
    }

    #[test]
    fn missing_schema_field_surfaces_engine_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join(VOLUMES_FILE), "name,capacity_gb\nds-01,100\n")
            .expect("write volumes");
        std::fs::write(
            dir.path().join(WORKLOADS_FILE),
            "name,provisioned_gb,volume\napp-01,25,ds-01\n",
        )
        .expect("write workloads");

        let source = CsvDirectorySource::new(dir.path());
        let err = tokio_test::block_on(load_snapshot(&source, Utc::now())).unwrap_err();
        assert_eq!(
            err.downcast_ref::<EngineError>(),
            Some(&EngineError::MissingField {
                table: "volumes",
                field: "provisioned_gb"
            })
        );
    }
}
