//! Binds header-named inventory tables to typed records.
//!
//! Column positions are resolved once per table. Required columns that cannot be found fail
//! the whole bind; optional columns and unparseable cells degrade to empty values.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::EngineError;
use crate::inventory::changelog::parse_timestamp;
use crate::inventory::{ChangeAction, ChangeLogEntry, PowerState, Volume, Workload};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    pub fn from_str_rows(headers: &[&str], rows: &[&[&str]]) -> Self {
        Self {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: rows
                .iter()
                .map(|row| row.iter().map(|c| c.to_string()).collect())
                .collect(),
        }
    }
}

struct Field {
    name: &'static str,
    aliases: &'static [&'static str],
}

const VOLUME_NAME: Field = Field {
    name: "name",
    aliases: &["name", "datastore", "datastore_name", "volume", "volume_name"],
};
const VOLUME_CAPACITY: Field = Field {
    name: "capacity_gb",
    aliases: &["capacity_gb", "capacity", "capacity_(gb)", "total_gb"],
};
const VOLUME_PROVISIONED: Field = Field {
    name: "provisioned_gb",
    aliases: &["provisioned_gb", "provisioned", "provisioned_(gb)", "allocated_gb"],
};
const VOLUME_CLUSTER: Field = Field {
    name: "cluster",
    aliases: &["cluster", "cluster_name"],
};
const VOLUME_ENVIRONMENT: Field = Field {
    name: "environment",
    aliases: &["environment", "env"],
};
const VOLUME_TYPE: Field = Field {
    name: "type",
    aliases: &["type", "volume_type", "datastore_type", "tier"],
};

const WORKLOAD_NAME: Field = Field {
    name: "name",
    aliases: &["name", "vm", "vm_name", "workload"],
};
const WORKLOAD_PROVISIONED: Field = Field {
    name: "provisioned_gb",
    aliases: &["provisioned_gb", "provisioned", "provisioned_(gb)", "disk_gb"],
};
const WORKLOAD_VOLUME: Field = Field {
    name: "volume",
    aliases: &["volume", "datastore", "datastore_name", "volume_name"],
};
const WORKLOAD_POWER: Field = Field {
    name: "power_state",
    aliases: &["power_state", "power", "state"],
};
const WORKLOAD_CRITICALITY: Field = Field {
    name: "criticality",
    aliases: &["criticality", "tier", "priority"],
};
const WORKLOAD_CPU: Field = Field {
    name: "cpu_count",
    aliases: &["cpu_count", "cpu", "vcpu", "cpus"],
};
const WORKLOAD_MEMORY: Field = Field {
    name: "memory_gb",
    aliases: &["memory_gb", "memory", "memory_(gb)", "ram_gb"],
};
const WORKLOAD_CLUSTER: Field = Field {
    name: "cluster",
    aliases: &["cluster", "cluster_name"],
};

const LOG_TIMESTAMP: Field = Field {
    name: "timestamp",
    aliases: &["timestamp", "time", "date", "created_at"],
};
const LOG_ACTION: Field = Field {
    name: "action",
    aliases: &["action", "event", "change"],
};
const LOG_SUBJECT: Field = Field {
    name: "subject",
    aliases: &["subject", "name", "object", "object_name"],
};
const LOG_OBJECT_TYPE: Field = Field {
    name: "object_type",
    aliases: &["object_type", "type", "kind"],
};
const LOG_DETAIL: Field = Field {
    name: "detail",
    aliases: &["detail", "details", "description", "message"],
};

pub fn normalize_header(raw: &str) -> String {
    raw.trim().to_lowercase().replace([' ', '-'], "_")
}

struct HeaderIndex {
    table: &'static str,
    positions: HashMap<String, usize>,
}

impl HeaderIndex {
    fn new(table: &'static str, headers: &[String]) -> Self {
        let mut positions = HashMap::new();
        for (idx, header) in headers.iter().enumerate() {
            positions.entry(normalize_header(header)).or_insert(idx);
        }
        Self { table, positions }
    }

    fn locate(&self, field: &Field) -> Option<usize> {
        field
            .aliases
            .iter()
            .find_map(|alias| self.positions.get(*alias).copied())
    }

    fn require(&self, field: &Field) -> Result<usize, EngineError> {
        self.locate(field).ok_or(EngineError::MissingField {
            table: self.table,
            field: field.name,
        })
    }
}

fn text(row: &[String], idx: Option<usize>) -> &str {
    idx.and_then(|i| row.get(i)).map(|c| c.trim()).unwrap_or("")
}

fn number(row: &[String], idx: Option<usize>) -> f64 {
    let sanitized = text(row, idx).replace([',', '_'], "");
    sanitized
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

pub fn bind_volumes(table: &Table) -> Result<Vec<Volume>, EngineError> {
    let index = HeaderIndex::new("volumes", &table.headers);
    let name = index.require(&VOLUME_NAME)?;
    let capacity = index.require(&VOLUME_CAPACITY)?;
    let provisioned = index.require(&VOLUME_PROVISIONED)?;
    let cluster = index.locate(&VOLUME_CLUSTER);
    let environment = index.locate(&VOLUME_ENVIRONMENT);
    let volume_type = index.locate(&VOLUME_TYPE);

    let mut seen = HashSet::new();
    let mut volumes = Vec::with_capacity(table.rows.len());
    for (row_no, row) in table.rows.iter().enumerate() {
        let volume_name = text(row, Some(name));
        if volume_name.is_empty() {
            debug!("skipping volume row {row_no}: empty name");
            continue;
        }
        if !seen.insert(volume_name.to_string()) {
            return Err(EngineError::DuplicateVolume(volume_name.to_string()));
        }
        volumes.push(Volume {
            name: volume_name.to_string(),
            capacity_gb: number(row, Some(capacity)).max(0.0),
            provisioned_gb: number(row, Some(provisioned)).max(0.0),
            cluster: text(row, cluster).to_string(),
            environment: text(row, environment).to_string(),
            volume_type: text(row, volume_type).to_string(),
        });
    }
    Ok(volumes)
}

pub fn bind_workloads(table: &Table) -> Result<Vec<Workload>, EngineError> {
    let index = HeaderIndex::new("workloads", &table.headers);
    let name = index.require(&WORKLOAD_NAME)?;
    let provisioned = index.require(&WORKLOAD_PROVISIONED)?;
    let volume = index.require(&WORKLOAD_VOLUME)?;
    let power = index.locate(&WORKLOAD_POWER);
    let criticality = index.locate(&WORKLOAD_CRITICALITY);
    let cpu = index.locate(&WORKLOAD_CPU);
    let memory = index.locate(&WORKLOAD_MEMORY);
    let cluster = index.locate(&WORKLOAD_CLUSTER);

    let mut workloads = Vec::with_capacity(table.rows.len());
    for (row_no, row) in table.rows.iter().enumerate() {
        let workload_name = text(row, Some(name));
        if workload_name.is_empty() {
            debug!("skipping workload row {row_no}: empty name");
            continue;
        }
        let workload_cluster = text(row, cluster);
        workloads.push(Workload {
            name: workload_name.to_string(),
            provisioned_gb: number(row, Some(provisioned)).max(0.0),
            power_state: PowerState::parse_lossy(text(row, power)),
            criticality: text(row, criticality).to_string(),
            volume: text(row, Some(volume)).to_string(),
            cpu_count: number(row, cpu).max(0.0),
            memory_gb: number(row, memory).max(0.0),
            cluster: (!workload_cluster.is_empty()).then(|| workload_cluster.to_string()),
        });
    }
    Ok(workloads)
}

pub fn bind_change_log(table: &Table) -> Result<Vec<ChangeLogEntry>, EngineError> {
    let index = HeaderIndex::new("change_log", &table.headers);
    let timestamp = index.require(&LOG_TIMESTAMP)?;
    let action = index.require(&LOG_ACTION)?;
    let subject = index.require(&LOG_SUBJECT)?;
    let object_type = index.locate(&LOG_OBJECT_TYPE);
    let detail = index.locate(&LOG_DETAIL);

    let mut entries = Vec::with_capacity(table.rows.len());
    for (row_no, row) in table.rows.iter().enumerate() {
        let Some(at) = parse_timestamp(text(row, Some(timestamp))) else {
            debug!("skipping change-log row {row_no}: unreadable timestamp");
            continue;
        };
        entries.push(ChangeLogEntry {
            timestamp: at,
            object_type: text(row, object_type).to_string(),
            action: ChangeAction::parse_lossy(text(row, Some(action))),
            subject: text(row, Some(subject)).to_string(),
            detail: text(row, detail).to_string(),
        });
    }
    Ok(entries)
}
