//! Domain records: vehicles, maintenance items, service logs and the
//! snapshot that groups them.
//!
//! Field names are camelCase on the wire so the persisted file and the
//! sync payload keep the `{ vehicles, logs, customItems }` shape.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Vehicles
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vehicle {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub make: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub year: Option<i32>,
    /// Odometer reading in kilometers.
    #[serde(default)]
    pub current_km: u64,
}

/// Fields supplied when registering a vehicle; the Store assigns the id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleDraft {
    pub name: String,
    #[serde(default)]
    pub make: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub current_km: u64,
}

/// Partial update merged into an existing vehicle.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub make: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub current_km: Option<u64>,
}

impl Vehicle {
    pub fn apply(&mut self, update: VehicleUpdate) {
        if let Some(name) = update.name {
            self.name = name;
        }
        if let Some(make) = update.make {
            self.make = make;
        }
        if let Some(model) = update.model {
            self.model = model;
        }
        if let Some(year) = update.year {
            self.year = Some(year);
        }
        if let Some(km) = update.current_km {
            self.current_km = km;
        }
    }
}

// ---------------------------------------------------------------------------
// Maintenance items
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaintenanceItem {
    pub id: String,
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub interval_km: Option<u64>,
    #[serde(default)]
    pub interval_months: Option<u32>,
    #[serde(default)]
    pub is_custom: bool,
}

impl MaintenanceItem {
    /// Distance interval, treating zero as unset.
    pub fn km_interval(&self) -> Option<u64> {
        self.interval_km.filter(|km| *km > 0)
    }

    /// Time interval, treating zero as unset.
    pub fn month_interval(&self) -> Option<u32> {
        self.interval_months.filter(|m| *m > 0)
    }

    pub fn has_interval(&self) -> bool {
        self.km_interval().is_some() || self.month_interval().is_some()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemDraft {
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub interval_km: Option<u64>,
    #[serde(default)]
    pub interval_months: Option<u32>,
}

pub const DEFAULT_CUSTOM_CATEGORY: &str = "Other";

// ---------------------------------------------------------------------------
// Service log
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub id: String,
    pub vehicle_id: String,
    pub item_id: String,
    pub date: NaiveDate,
    pub km_at_service: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogDraft {
    pub vehicle_id: String,
    pub item_id: String,
    pub date: NaiveDate,
    pub km_at_service: u64,
    #[serde(default)]
    pub notes: Option<String>,
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// The complete user state. Immutable once handed out by the Store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(default)]
    pub vehicles: Vec<Vehicle>,
    #[serde(default)]
    pub logs: Vec<LogEntry>,
    #[serde(default)]
    pub custom_items: Vec<MaintenanceItem>,
}

impl Snapshot {
    pub fn vehicle(&self, id: &str) -> Option<&Vehicle> {
        self.vehicles.iter().find(|v| v.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.vehicles.is_empty() && self.logs.is_empty() && self.custom_items.is_empty()
    }
}

/// Remote state as fetched during the initial pull. Collections absent
/// from the payload leave the local ones untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialSnapshot {
    #[serde(default)]
    pub vehicles: Option<Vec<Vehicle>>,
    #[serde(default)]
    pub logs: Option<Vec<LogEntry>>,
    #[serde(default)]
    pub custom_items: Option<Vec<MaintenanceItem>>,
}

impl PartialSnapshot {
    pub fn merge_into(self, base: &Snapshot) -> Snapshot {
        Snapshot {
            vehicles: self.vehicles.unwrap_or_else(|| base.vehicles.clone()),
            logs: self.logs.unwrap_or_else(|| base.logs.clone()),
            custom_items: self.custom_items.unwrap_or_else(|| base.custom_items.clone()),
        }
    }
}
