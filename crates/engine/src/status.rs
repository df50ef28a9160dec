//! Status engine – derives due/overdue state for every catalog item of a
//! vehicle from its service history.
//!
//! Everything here is a pure function of its inputs; "today" is passed in
//! by the caller so results are reproducible.

use crate::catalog::full_catalog;
use crate::model::{LogEntry, MaintenanceItem, Snapshot, Vehicle};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Share of the interval below which an item is flagged as due soon.
const WARNING_FRACTION: f64 = 0.25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaintenanceStatus {
    Ok,
    Warning,
    Overdue,
    Unknown,
}

impl MaintenanceStatus {
    pub fn label(&self) -> &'static str {
        match self {
            MaintenanceStatus::Ok => "OK",
            MaintenanceStatus::Warning => "Due Soon",
            MaintenanceStatus::Overdue => "Overdue",
            MaintenanceStatus::Unknown => "No Record",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusRecord {
    pub item: MaintenanceItem,
    pub last_service: Option<LogEntry>,
    pub km_remaining: Option<i64>,
    pub months_remaining: Option<i64>,
    pub status: MaintenanceStatus,
}

/// Compute one status record per catalog item, in catalog order.
///
/// Logs for other vehicles, or referencing items outside `catalog`, are
/// ignored. When several logs share the latest date, the one recorded
/// first wins, matching the newest-first order of the service history.
pub fn compute_status(
    vehicle: &Vehicle,
    catalog: &[MaintenanceItem],
    logs: &[LogEntry],
    today: NaiveDate,
) -> Vec<StatusRecord> {
    catalog
        .iter()
        .map(|item| {
            let last = logs
                .iter()
                .filter(|l| l.vehicle_id == vehicle.id && l.item_id == item.id)
                .rev()
                .max_by_key(|l| l.date);
            item_status(vehicle, item, last, today)
        })
        .collect()
}

fn item_status(
    vehicle: &Vehicle,
    item: &MaintenanceItem,
    last: Option<&LogEntry>,
    today: NaiveDate,
) -> StatusRecord {
    let Some(last) = last else {
        return StatusRecord {
            item: item.clone(),
            last_service: None,
            km_remaining: None,
            months_remaining: None,
            status: MaintenanceStatus::Unknown,
        };
    };

    let km_remaining = item
        .km_interval()
        .map(|interval| km_remaining(interval, vehicle.current_km, last.km_at_service));
    let months_remaining = item
        .month_interval()
        .map(|interval| interval as i64 - elapsed_months(last.date, today));

    let status = classify(item, km_remaining, months_remaining);

    StatusRecord {
        item: item.clone(),
        last_service: Some(last.clone()),
        km_remaining,
        months_remaining,
        status,
    }
}

/// `interval - (current - at_service)`, saturated to the `i64` range so
/// out-of-range odometer or interval values cannot wrap or overflow.
fn km_remaining(interval: u64, current_km: u64, at_service: u64) -> i64 {
    let remaining = interval as i128 - (current_km as i128 - at_service as i128);
    remaining.clamp(i64::MIN as i128, i64::MAX as i128) as i64
}

/// Whole calendar months between two dates, from year/month only.
///
/// Day-of-month is ignored on purpose: a service on Jan 31 counts as one
/// month old on Feb 1.
pub fn elapsed_months(from: NaiveDate, to: NaiveDate) -> i64 {
    (to.year() as i64 - from.year() as i64) * 12 + (to.month() as i64 - from.month() as i64)
}

// Distance checks run before time checks at each severity.
fn classify(
    item: &MaintenanceItem,
    km_remaining: Option<i64>,
    months_remaining: Option<i64>,
) -> MaintenanceStatus {
    if km_remaining.is_some_and(|km| km <= 0) {
        return MaintenanceStatus::Overdue;
    }
    if months_remaining.is_some_and(|m| m <= 0) {
        return MaintenanceStatus::Overdue;
    }
    if let (Some(km), Some(interval)) = (km_remaining, item.km_interval()) {
        if (km as f64) < interval as f64 * WARNING_FRACTION {
            return MaintenanceStatus::Warning;
        }
    }
    if let (Some(m), Some(interval)) = (months_remaining, item.month_interval()) {
        if (m as f64) < interval as f64 * WARNING_FRACTION {
            return MaintenanceStatus::Warning;
        }
    }
    MaintenanceStatus::Ok
}

/// Status of every catalog item for one vehicle of the snapshot.
/// Returns an empty list when the vehicle does not exist.
pub fn status_for_vehicle(
    snapshot: &Snapshot,
    vehicle_id: &str,
    today: NaiveDate,
) -> Vec<StatusRecord> {
    match snapshot.vehicle(vehicle_id) {
        Some(vehicle) => {
            let catalog = full_catalog(&snapshot.custom_items);
            compute_status(vehicle, &catalog, &snapshot.logs, today)
        }
        None => Vec::new(),
    }
}

// ---------------------------------------------------------------------------
// Dashboard aggregates
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlaggedItem {
    pub vehicle_id: String,
    pub vehicle_name: String,
    #[serde(flatten)]
    pub record: StatusRecord,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub overdue: usize,
    pub warning: usize,
    pub unknown: usize,
    pub ok: usize,
}

impl StatusCounts {
    fn tally(&mut self, status: MaintenanceStatus) {
        match status {
            MaintenanceStatus::Overdue => self.overdue += 1,
            MaintenanceStatus::Warning => self.warning += 1,
            MaintenanceStatus::Unknown => self.unknown += 1,
            MaintenanceStatus::Ok => self.ok += 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleSummary {
    pub vehicle_id: String,
    pub name: String,
    pub current_km: u64,
    pub counts: StatusCounts,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub counts: StatusCounts,
    pub overdue: Vec<FlaggedItem>,
    pub warning: Vec<FlaggedItem>,
    pub unknown: Vec<FlaggedItem>,
    pub vehicles: Vec<VehicleSummary>,
}

/// Status of every (vehicle, item) pair, partitioned for the dashboard.
pub fn dashboard(snapshot: &Snapshot, today: NaiveDate) -> Dashboard {
    let catalog = full_catalog(&snapshot.custom_items);
    let mut out = Dashboard::default();

    for vehicle in &snapshot.vehicles {
        let mut counts = StatusCounts::default();
        for record in compute_status(vehicle, &catalog, &snapshot.logs, today) {
            counts.tally(record.status);
            out.counts.tally(record.status);
            let bucket = match record.status {
                MaintenanceStatus::Overdue => &mut out.overdue,
                MaintenanceStatus::Warning => &mut out.warning,
                MaintenanceStatus::Unknown => &mut out.unknown,
                MaintenanceStatus::Ok => continue,
            };
            bucket.push(FlaggedItem {
                vehicle_id: vehicle.id.clone(),
                vehicle_name: vehicle.name.clone(),
                record,
            });
        }
        out.vehicles.push(VehicleSummary {
            vehicle_id: vehicle.id.clone(),
            name: vehicle.name.clone(),
            current_km: vehicle.current_km,
            counts,
        });
    }

    out
}
