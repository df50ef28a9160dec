//! Command registry and the built-in store/status commands.
//!
//! Commands are registered by name and invoked with JSON input/output.

use crate::context::AppContext;
use crate::model::*;
use crate::status;
use crate::store::StoreError;
use crate::traits::CapError;
use crate::types::*;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Instant;

/// Signature for all engine commands.
pub type CommandHandler = fn(Value, &AppContext) -> Result<Value, CommandError>;

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("storage: {0}")]
    Storage(#[from] CapError),
}

impl CommandError {
    pub fn error_code(&self) -> ErrorCode {
        match self {
            CommandError::InvalidInput(_) => ErrorCode::InvalidInput,
            CommandError::NotFound(_) => ErrorCode::NotFound,
            CommandError::Forbidden(_) => ErrorCode::Forbidden,
            CommandError::Storage(CapError::PermissionDenied(_)) => ErrorCode::PermissionDenied,
            CommandError::Storage(_) => ErrorCode::IoError,
        }
    }
}

impl From<StoreError> for CommandError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::VehicleNotFound(_)
            | StoreError::ItemNotFound(_)
            | StoreError::LogNotFound(_) => CommandError::NotFound(e.to_string()),
            StoreError::BuiltInItem(_) => CommandError::Forbidden(e.to_string()),
            StoreError::Invalid(m) => CommandError::InvalidInput(m),
        }
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

pub struct CommandRegistry {
    handlers: HashMap<String, CommandHandler>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        let mut reg = Self {
            handlers: HashMap::new(),
        };
        reg.register("list_vehicles", cmd_list_vehicles);
        reg.register("add_vehicle", cmd_add_vehicle);
        reg.register("update_vehicle", cmd_update_vehicle);
        reg.register("delete_vehicle", cmd_delete_vehicle);
        reg.register("list_logs", cmd_list_logs);
        reg.register("add_log", cmd_add_log);
        reg.register("delete_log", cmd_delete_log);
        reg.register("catalog", cmd_catalog);
        reg.register("add_custom_item", cmd_add_custom_item);
        reg.register("delete_custom_item", cmd_delete_custom_item);
        reg.register("status", cmd_status);
        reg.register("dashboard", cmd_dashboard);
        reg
    }

    pub fn register(&mut self, name: &str, handler: CommandHandler) {
        self.handlers.insert(name.to_string(), handler);
    }

    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(|s| s.as_str()).collect();
        names.sort();
        names
    }

    /// Execute a command by name and return a full CommandResult.
    pub fn execute(&self, name: &str, args: Value, ctx: &AppContext) -> CommandResult {
        let run_id = new_run_id();
        let start = Instant::now();

        let handler = match self.handlers.get(name) {
            Some(h) => h,
            None => {
                return result_err(
                    "call",
                    name,
                    &run_id,
                    start.elapsed().as_millis() as u64,
                    ErrorCode::InvalidInput,
                    format!("unknown command: {}", name),
                );
            }
        };

        match handler(args, ctx) {
            Ok(data) => {
                let mut r = result_ok("call", name, &run_id, start.elapsed().as_millis() as u64);
                r.data = Some(data);
                r
            }
            Err(e) => {
                tracing::debug!(command = name, error = %e, "command failed");
                result_err(
                    "call",
                    name,
                    &run_id,
                    start.elapsed().as_millis() as u64,
                    e.error_code(),
                    e.to_string(),
                )
            }
        }
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Arg helpers
// ---------------------------------------------------------------------------

fn parse_args<T: DeserializeOwned>(args: Value) -> Result<T, CommandError> {
    serde_json::from_value(args).map_err(|e| CommandError::InvalidInput(e.to_string()))
}

fn str_field<'a>(args: &'a Value, key: &str) -> Result<&'a str, CommandError> {
    args.get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| CommandError::InvalidInput(format!("missing '{}' string field", key)))
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<Value, CommandError> {
    serde_json::to_value(value).map_err(|e| CommandError::InvalidInput(e.to_string()))
}

// ===========================================================================
// Vehicles
// ===========================================================================

/// `list_vehicles` – returns `{ "vehicles": [...] }`.
fn cmd_list_vehicles(_args: Value, ctx: &AppContext) -> Result<Value, CommandError> {
    let snap = ctx.store().snapshot();
    Ok(serde_json::json!({ "vehicles": to_json(&snap.vehicles)? }))
}

/// `add_vehicle` – Args: `{ "name", "make"?, "model"?, "year"?, "currentKm"? }`
fn cmd_add_vehicle(args: Value, ctx: &AppContext) -> Result<Value, CommandError> {
    let draft: VehicleDraft = parse_args(args)?;
    let vehicle = ctx.store().add_vehicle(draft)?;
    ctx.persist()?;
    to_json(&vehicle)
}

/// `update_vehicle` – Args: `{ "id", ...fields to change }`
fn cmd_update_vehicle(args: Value, ctx: &AppContext) -> Result<Value, CommandError> {
    let id = str_field(&args, "id")?.to_string();
    let update: VehicleUpdate = parse_args(args)?;
    let vehicle = ctx.store().update_vehicle(&id, update)?;
    ctx.persist()?;
    to_json(&vehicle)
}

/// `delete_vehicle` – Args: `{ "id" }`. Also removes the vehicle's logs.
fn cmd_delete_vehicle(args: Value, ctx: &AppContext) -> Result<Value, CommandError> {
    let id = str_field(&args, "id")?;
    ctx.store().delete_vehicle(id)?;
    ctx.persist()?;
    Ok(serde_json::json!({ "deleted": id }))
}

// ===========================================================================
// Service log
// ===========================================================================

/// `list_logs` – Args: `{ "vehicleId"? }`. Newest first, with the vehicle
/// and item names resolved.
fn cmd_list_logs(args: Value, ctx: &AppContext) -> Result<Value, CommandError> {
    let filter = args.get("vehicleId").and_then(|v| v.as_str());
    let snap = ctx.store().snapshot();
    let catalog = ctx.store().catalog();

    let logs: Vec<Value> = ctx
        .store()
        .logs_for(filter)
        .into_iter()
        .map(|log| -> Result<Value, CommandError> {
            let item_name = catalog
                .iter()
                .find(|i| i.id == log.item_id)
                .map_or("Unknown Service", |i| i.name.as_str())
                .to_string();
            let vehicle_name = snap
                .vehicle(&log.vehicle_id)
                .map_or("Unknown Vehicle", |v| v.name.as_str())
                .to_string();
            let mut entry = to_json(&log)?;
            entry["itemName"] = Value::String(item_name);
            entry["vehicleName"] = Value::String(vehicle_name);
            Ok(entry)
        })
        .collect::<Result<_, CommandError>>()?;

    Ok(serde_json::json!({ "logs": logs }))
}

/// `add_log` – Args: `{ "vehicleId", "itemId", "date"?, "kmAtService"?, "notes"? }`
///
/// `date` defaults to today and `kmAtService` to the vehicle's current
/// odometer reading.
fn cmd_add_log(mut args: Value, ctx: &AppContext) -> Result<Value, CommandError> {
    let vehicle_id = str_field(&args, "vehicleId")?.to_string();
    let obj = args
        .as_object_mut()
        .ok_or_else(|| CommandError::InvalidInput("args must be an object".into()))?;

    if !obj.contains_key("date") {
        obj.insert("date".into(), Value::String(ctx.today().to_string()));
    }
    if !obj.contains_key("kmAtService") {
        let vehicle = ctx.store().snapshot().vehicle(&vehicle_id).cloned();
        let km = vehicle
            .ok_or_else(|| CommandError::NotFound(format!("vehicle not found: {}", vehicle_id)))?
            .current_km;
        obj.insert("kmAtService".into(), Value::from(km));
    }

    let draft: LogDraft = parse_args(args)?;
    let entry = ctx.store().add_log(draft)?;
    ctx.persist()?;
    to_json(&entry)
}

/// `delete_log` – Args: `{ "id" }`
fn cmd_delete_log(args: Value, ctx: &AppContext) -> Result<Value, CommandError> {
    let id = str_field(&args, "id")?;
    ctx.store().delete_log(id)?;
    ctx.persist()?;
    Ok(serde_json::json!({ "deleted": id }))
}

// ===========================================================================
// Catalog
// ===========================================================================

/// `catalog` – built-in items followed by custom items.
fn cmd_catalog(_args: Value, ctx: &AppContext) -> Result<Value, CommandError> {
    Ok(serde_json::json!({ "items": to_json(&ctx.store().catalog())? }))
}

/// `add_custom_item` – Args: `{ "name", "category"?, "intervalKm"?, "intervalMonths"? }`
fn cmd_add_custom_item(args: Value, ctx: &AppContext) -> Result<Value, CommandError> {
    let draft: ItemDraft = parse_args(args)?;
    let item = ctx.store().add_custom_item(draft)?;
    ctx.persist()?;
    to_json(&item)
}

/// `delete_custom_item` – Args: `{ "id" }`. Also removes logs for the item.
fn cmd_delete_custom_item(args: Value, ctx: &AppContext) -> Result<Value, CommandError> {
    let id = str_field(&args, "id")?;
    ctx.store().delete_custom_item(id)?;
    ctx.persist()?;
    Ok(serde_json::json!({ "deleted": id }))
}

// ===========================================================================
// Status
// ===========================================================================

/// `status` – Args: `{ "vehicleId" }`. Unknown vehicles yield no records.
fn cmd_status(args: Value, ctx: &AppContext) -> Result<Value, CommandError> {
    let vehicle_id = str_field(&args, "vehicleId")?;
    let snap = ctx.store().snapshot();
    let records = status::status_for_vehicle(&snap, vehicle_id, ctx.today());
    Ok(serde_json::json!({
        "vehicleId": vehicle_id,
        "today": ctx.today().to_string(),
        "records": to_json(&records)?,
    }))
}

/// `dashboard` – overdue / due-soon / unrecorded items across all vehicles.
fn cmd_dashboard(_args: Value, ctx: &AppContext) -> Result<Value, CommandError> {
    let snap = ctx.store().snapshot();
    to_json(&status::dashboard(&snap, ctx.today()))
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::FixedClock;
    use chrono::NaiveDate;
    use serde_json::json;

    fn ctx() -> AppContext {
        AppContext::in_memory().with_clock(Box::new(FixedClock(
            NaiveDate::from_ymd_opt(2025, 6, 15).unwrap(),
        )))
    }

    fn call(reg: &CommandRegistry, ctx: &AppContext, name: &str, args: Value) -> Value {
        let r = reg.execute(name, args, ctx);
        assert_eq!(r.status, Status::Pass, "{} failed: {:?}", name, r.error);
        r.data.unwrap()
    }

    #[test]
    fn test_unknown_command() {
        let ctx = ctx();
        let reg = CommandRegistry::new();
        let result = reg.execute("nonexistent", json!({}), &ctx);
        assert_eq!(result.status, Status::Error);
        assert_eq!(result.error.unwrap().code, ErrorCode::InvalidInput);
    }

    #[test]
    fn test_list_commands() {
        let reg = CommandRegistry::new();
        let names = reg.list();
        assert!(names.contains(&"status"));
        assert!(names.contains(&"dashboard"));
        assert!(names.contains(&"add_log"));
    }

    #[test]
    fn test_vehicle_lifecycle() {
        let ctx = ctx();
        let reg = CommandRegistry::new();

        let v = call(&reg, &ctx, "add_vehicle", json!({ "name": "Civic", "currentKm": 19000 }));
        let id = v["id"].as_str().unwrap().to_string();

        let updated = call(&reg, &ctx, "update_vehicle", json!({ "id": id, "currentKm": 21000 }));
        assert_eq!(updated["currentKm"], 21000);

        let listed = call(&reg, &ctx, "list_vehicles", json!({}));
        assert_eq!(listed["vehicles"].as_array().unwrap().len(), 1);

        call(&reg, &ctx, "delete_vehicle", json!({ "id": id }));
        let again = reg.execute("delete_vehicle", json!({ "id": id }), &ctx);
        assert_eq!(again.error.unwrap().code, ErrorCode::NotFound);
    }

    #[test]
    fn test_add_log_defaults_and_status() {
        let ctx = ctx();
        let reg = CommandRegistry::new();
        let v = call(&reg, &ctx, "add_vehicle", json!({ "name": "Civic", "currentKm": 10000 }));
        let vid = v["id"].as_str().unwrap().to_string();

        let log = call(
            &reg,
            &ctx,
            "add_log",
            json!({ "vehicleId": vid, "itemId": "engine-oil-filter" }),
        );
        assert_eq!(log["date"], "2025-06-15");
        assert_eq!(log["kmAtService"], 10000);

        call(&reg, &ctx, "update_vehicle", json!({ "id": vid, "currentKm": 19000 }));
        let status = call(&reg, &ctx, "status", json!({ "vehicleId": vid }));
        let oil = status["records"]
            .as_array()
            .unwrap()
            .iter()
            .find(|r| r["item"]["id"] == "engine-oil-filter")
            .unwrap();
        assert_eq!(oil["kmRemaining"], 1000);
        assert_eq!(oil["status"], "warning");
    }

    #[test]
    fn test_status_for_unknown_vehicle_is_empty() {
        let ctx = ctx();
        let reg = CommandRegistry::new();
        let status = call(&reg, &ctx, "status", json!({ "vehicleId": "ghost" }));
        assert!(status["records"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_custom_item_commands() {
        let ctx = ctx();
        let reg = CommandRegistry::new();

        let bad = reg.execute("add_custom_item", json!({ "name": "Wipers" }), &ctx);
        assert_eq!(bad.error.unwrap().code, ErrorCode::InvalidInput);

        let item = call(
            &reg,
            &ctx,
            "add_custom_item",
            json!({ "name": "Wipers", "intervalMonths": 6 }),
        );
        assert_eq!(item["isCustom"], true);
        let catalog = call(&reg, &ctx, "catalog", json!({}));
        assert_eq!(catalog["items"].as_array().unwrap().len(), 18);

        let builtin = reg.execute("delete_custom_item", json!({ "id": "gear-oil" }), &ctx);
        assert_eq!(builtin.error.unwrap().code, ErrorCode::Forbidden);
        call(&reg, &ctx, "delete_custom_item", json!({ "id": item["id"] }));
    }

    #[test]
    fn test_list_logs_resolves_names() {
        let ctx = ctx();
        let reg = CommandRegistry::new();
        let v = call(&reg, &ctx, "add_vehicle", json!({ "name": "Civic" }));
        call(
            &reg,
            &ctx,
            "add_log",
            json!({
                "vehicleId": v["id"],
                "itemId": "air-filter",
                "date": "2025-01-02",
                "kmAtService": 5
            }),
        );
        let logs = call(&reg, &ctx, "list_logs", json!({ "vehicleId": v["id"] }));
        assert_eq!(logs["logs"][0]["itemName"], "Air filter");
        assert_eq!(logs["logs"][0]["vehicleName"], "Civic");
    }

    #[test]
    fn test_dashboard_command() {
        let ctx = ctx();
        let reg = CommandRegistry::new();
        call(&reg, &ctx, "add_vehicle", json!({ "name": "Civic" }));
        let dash = call(&reg, &ctx, "dashboard", json!({}));
        assert_eq!(dash["counts"]["unknown"], 17);
        assert_eq!(dash["vehicles"][0]["name"], "Civic");
    }
}
