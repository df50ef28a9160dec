//! Store – the single source of truth for vehicles, logs and custom items.
//!
//! State lives in an immutable [`Snapshot`] behind an `Arc`. Every mutation
//! builds a new snapshot and swaps it in under a short write lock, so
//! readers holding an older `Arc` are never affected.

use crate::catalog::{full_catalog, is_built_in};
use crate::model::*;
use std::sync::{Arc, PoisonError, RwLock};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("vehicle not found: {0}")]
    VehicleNotFound(String),
    #[error("maintenance item not found: {0}")]
    ItemNotFound(String),
    #[error("log entry not found: {0}")]
    LogNotFound(String),
    #[error("built-in item cannot be deleted: {0}")]
    BuiltInItem(String),
    #[error("invalid input: {0}")]
    Invalid(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Default)]
pub struct Store {
    current: RwLock<Arc<Snapshot>>,
}

impl Store {
    pub fn new(snapshot: Snapshot) -> Self {
        Self {
            current: RwLock::new(Arc::new(snapshot)),
        }
    }

    /// The current state. Cheap; callers may hold it as long as they like.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the whole state (initial pull, file reload).
    pub fn replace(&self, snapshot: Snapshot) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(snapshot);
    }

    /// Built-in items followed by custom items.
    pub fn catalog(&self) -> Vec<MaintenanceItem> {
        full_catalog(&self.snapshot().custom_items)
    }

    /// Log entries newest first, optionally for a single vehicle.
    pub fn logs_for(&self, vehicle_id: Option<&str>) -> Vec<LogEntry> {
        let snap = self.snapshot();
        let mut logs: Vec<LogEntry> = snap
            .logs
            .iter()
            .filter(|l| vehicle_id.map_or(true, |id| l.vehicle_id == id))
            .cloned()
            .collect();
        logs.sort_by(|a, b| b.date.cmp(&a.date));
        logs
    }

    // -----------------------------------------------------------------------
    // Vehicles
    // -----------------------------------------------------------------------

    pub fn add_vehicle(&self, draft: VehicleDraft) -> StoreResult<Vehicle> {
        let name = required(&draft.name, "vehicle name")?;
        let vehicle = Vehicle {
            id: new_id(),
            name,
            make: draft.make.trim().to_string(),
            model: draft.model.trim().to_string(),
            year: draft.year,
            current_km: draft.current_km,
        };
        self.mutate(|snap| {
            snap.vehicles.push(vehicle.clone());
            Ok(())
        })?;
        tracing::info!(vehicle_id = %vehicle.id, name = %vehicle.name, "vehicle added");
        Ok(vehicle)
    }

    pub fn update_vehicle(&self, id: &str, update: VehicleUpdate) -> StoreResult<Vehicle> {
        if let Some(name) = &update.name {
            required(name, "vehicle name")?;
        }
        self.mutate(|snap| {
            let vehicle = snap
                .vehicles
                .iter_mut()
                .find(|v| v.id == id)
                .ok_or_else(|| StoreError::VehicleNotFound(id.to_string()))?;
            vehicle.apply(update);
            Ok(vehicle.clone())
        })
    }

    /// Remove a vehicle and every log recorded against it.
    pub fn delete_vehicle(&self, id: &str) -> StoreResult<()> {
        let removed_logs = self.mutate(|snap| {
            let before = snap.vehicles.len();
            snap.vehicles.retain(|v| v.id != id);
            if snap.vehicles.len() == before {
                return Err(StoreError::VehicleNotFound(id.to_string()));
            }
            let logs_before = snap.logs.len();
            snap.logs.retain(|l| l.vehicle_id != id);
            Ok(logs_before - snap.logs.len())
        })?;
        tracing::info!(vehicle_id = %id, removed_logs, "vehicle deleted");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Service log
    // -----------------------------------------------------------------------

    pub fn add_log(&self, draft: LogDraft) -> StoreResult<LogEntry> {
        let entry = LogEntry {
            id: new_id(),
            vehicle_id: draft.vehicle_id,
            item_id: draft.item_id,
            date: draft.date,
            km_at_service: draft.km_at_service,
            notes: draft
                .notes
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty()),
        };
        self.mutate(|snap| {
            if snap.vehicle(&entry.vehicle_id).is_none() {
                return Err(StoreError::VehicleNotFound(entry.vehicle_id.clone()));
            }
            let known_item = is_built_in(&entry.item_id)
                || snap.custom_items.iter().any(|i| i.id == entry.item_id);
            if !known_item {
                return Err(StoreError::ItemNotFound(entry.item_id.clone()));
            }
            snap.logs.push(entry.clone());
            Ok(())
        })?;
        tracing::info!(
            log_id = %entry.id,
            vehicle_id = %entry.vehicle_id,
            item_id = %entry.item_id,
            "service logged"
        );
        Ok(entry)
    }

    pub fn delete_log(&self, id: &str) -> StoreResult<()> {
        self.mutate(|snap| {
            let before = snap.logs.len();
            snap.logs.retain(|l| l.id != id);
            if snap.logs.len() == before {
                return Err(StoreError::LogNotFound(id.to_string()));
            }
            Ok(())
        })
    }

    // -----------------------------------------------------------------------
    // Custom items
    // -----------------------------------------------------------------------

    pub fn add_custom_item(&self, draft: ItemDraft) -> StoreResult<MaintenanceItem> {
        let name = required(&draft.name, "item name")?;
        let category = draft
            .category
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| DEFAULT_CUSTOM_CATEGORY.to_string());
        let item = MaintenanceItem {
            id: new_id(),
            name,
            category,
            interval_km: draft.interval_km.filter(|km| *km > 0),
            interval_months: draft.interval_months.filter(|m| *m > 0),
            is_custom: true,
        };
        if !item.has_interval() {
            return Err(StoreError::Invalid(
                "at least one of intervalKm or intervalMonths is required".into(),
            ));
        }
        self.mutate(|snap| {
            snap.custom_items.push(item.clone());
            Ok(())
        })?;
        tracing::info!(item_id = %item.id, name = %item.name, "custom item added");
        Ok(item)
    }

    /// Remove a custom item and every log referencing it.
    pub fn delete_custom_item(&self, id: &str) -> StoreResult<()> {
        if is_built_in(id) {
            return Err(StoreError::BuiltInItem(id.to_string()));
        }
        self.mutate(|snap| {
            let before = snap.custom_items.len();
            snap.custom_items.retain(|i| i.id != id);
            if snap.custom_items.len() == before {
                return Err(StoreError::ItemNotFound(id.to_string()));
            }
            snap.logs.retain(|l| l.item_id != id);
            Ok(())
        })
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    /// Copy-on-write update. The new snapshot is published only when `f`
    /// succeeds.
    fn mutate<T>(&self, f: impl FnOnce(&mut Snapshot) -> StoreResult<T>) -> StoreResult<T> {
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = Snapshot::clone(&guard);
        let out = f(&mut next)?;
        *guard = Arc::new(next);
        Ok(out)
    }
}

fn required(value: &str, field: &str) -> StoreResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(StoreError::Invalid(format!("{} is required", field)));
    }
    Ok(trimmed.to_string())
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
