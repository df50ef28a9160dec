//! Doctor – integrity report over the current state and its wiring.

use crate::catalog::is_built_in;
use crate::context::AppContext;
use crate::model::Snapshot;
use crate::sync::SyncStats;
use crate::types::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Instant;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IntegrityReport {
    pub vehicles: usize,
    pub logs: usize,
    pub custom_items: usize,
    /// Log ids whose vehicle no longer exists.
    pub orphaned_vehicle_logs: Vec<String>,
    /// Log ids whose maintenance item no longer exists.
    pub orphaned_item_logs: Vec<String>,
    /// Custom items with neither a distance nor a time interval.
    pub items_without_interval: Vec<String>,
    pub duplicate_ids: Vec<String>,
}

impl IntegrityReport {
    pub fn is_clean(&self) -> bool {
        self.orphaned_vehicle_logs.is_empty()
            && self.orphaned_item_logs.is_empty()
            && self.items_without_interval.is_empty()
            && self.duplicate_ids.is_empty()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DoctorReport {
    pub today: String,
    pub data_file: Option<String>,
    pub data_file_exists: bool,
    pub sync: Option<SyncStats>,
    pub integrity: IntegrityReport,
}

/// Run the doctor check and return a full report as a CommandResult.
///
/// Integrity problems make the result `fail`; the report is attached
/// either way.
pub fn run_doctor(ctx: &AppContext) -> CommandResult {
    let run_id = new_run_id();
    let start = Instant::now();

    let report = gather_report(ctx);
    let clean = report.integrity.is_clean();
    if !clean {
        tracing::warn!(
            orphaned_vehicle_logs = report.integrity.orphaned_vehicle_logs.len(),
            orphaned_item_logs = report.integrity.orphaned_item_logs.len(),
            "integrity problems found"
        );
    }

    let mut r = result_ok("doctor", "store", &run_id, start.elapsed().as_millis() as u64);
    if !clean {
        r.status = Status::Fail;
    }
    r.data = Some(serde_json::to_value(&report).unwrap_or_default());
    r
}

fn gather_report(ctx: &AppContext) -> DoctorReport {
    let file = ctx.data_file();
    DoctorReport {
        today: ctx.today().to_string(),
        data_file: file.map(|f| f.path().display().to_string()),
        data_file_exists: file.is_some_and(|f| ctx.fs().exists(f.path())),
        sync: ctx.sync().map(|s| s.stats()),
        integrity: check_integrity(&ctx.store().snapshot()),
    }
}

pub fn check_integrity(snapshot: &Snapshot) -> IntegrityReport {
    let vehicle_ids: HashSet<&str> = snapshot.vehicles.iter().map(|v| v.id.as_str()).collect();
    let custom_ids: HashSet<&str> = snapshot.custom_items.iter().map(|i| i.id.as_str()).collect();

    let mut report = IntegrityReport {
        vehicles: snapshot.vehicles.len(),
        logs: snapshot.logs.len(),
        custom_items: snapshot.custom_items.len(),
        ..Default::default()
    };

    for log in &snapshot.logs {
        if !vehicle_ids.contains(log.vehicle_id.as_str()) {
            report.orphaned_vehicle_logs.push(log.id.clone());
        }
        if !is_built_in(&log.item_id) && !custom_ids.contains(log.item_id.as_str()) {
            report.orphaned_item_logs.push(log.id.clone());
        }
    }

    report.items_without_interval = snapshot
        .custom_items
        .iter()
        .filter(|i| !i.has_interval())
        .map(|i| i.id.clone())
        .collect();

    let mut seen = HashSet::new();
    let all_ids = snapshot
        .vehicles
        .iter()
        .map(|v| &v.id)
        .chain(snapshot.logs.iter().map(|l| &l.id))
        .chain(snapshot.custom_items.iter().map(|i| &i.id));
    for id in all_ids {
        if !seen.insert(id.as_str()) || is_built_in(id) {
            report.duplicate_ids.push(id.clone());
        }
    }

    report
}
