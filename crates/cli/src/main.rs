//! `autocarectl` – command-line client for the AutoCare maintenance tracker.
//!
//! Every subcommand goes through the engine's command registry, so the
//! output envelope and exit codes are the same as `call` and the daemon.

mod serve;

use clap::{Parser, Subcommand};
use engine::platform::{ReqwestSync, DEFAULT_SYNC_TIMEOUT};
use engine::sync::SyncScheduler;
use engine::types::*;
use engine::{AppContext, CommandRegistry, CommandResult};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

// ===========================================================================
// CLI definition
// ===========================================================================

#[derive(Parser)]
#[command(
    name = "autocarectl",
    version,
    about = "Track vehicle maintenance from the command line"
)]
struct Cli {
    /// Local data file mirrored on every change.
    #[arg(long, global = true, default_value = "autocare-data.json")]
    data: PathBuf,

    /// Base URL of an autocare-server to sync with (e.g. http://nas:5174).
    #[arg(long, global = true)]
    sync_url: Option<String>,

    /// Delay before pushing changes to the sync server.
    #[arg(long, global = true, default_value_t = 1000)]
    debounce_ms: u64,

    /// Output as JSON instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List vehicles.
    Vehicles,

    /// Add a vehicle.
    AddVehicle {
        name: String,
        #[arg(long)]
        make: Option<String>,
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        year: Option<i32>,
        /// Current odometer reading.
        #[arg(long)]
        km: Option<u64>,
    },

    /// Change fields of an existing vehicle.
    UpdateVehicle {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        make: Option<String>,
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        year: Option<i32>,
        #[arg(long)]
        km: Option<u64>,
    },

    /// Delete a vehicle and all of its service records.
    DeleteVehicle {
        id: String,
        /// Skip the confirmation prompt.
        #[arg(long)]
        yes: bool,
    },

    /// Show service history, newest first.
    Logs {
        /// Only show records for this vehicle.
        #[arg(long)]
        vehicle: Option<String>,
    },

    /// Record a service.
    LogService {
        vehicle: String,
        item: String,
        /// Service date (YYYY-MM-DD); defaults to today.
        #[arg(long)]
        date: Option<chrono::NaiveDate>,
        /// Odometer at service; defaults to the vehicle's current reading.
        #[arg(long)]
        km: Option<u64>,
        #[arg(long)]
        notes: Option<String>,
    },

    /// Delete a service record.
    DeleteLog { id: String },

    /// List built-in and custom maintenance items.
    Catalog,

    /// Add a custom maintenance item.
    AddItem {
        name: String,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        interval_km: Option<u64>,
        #[arg(long)]
        interval_months: Option<u32>,
    },

    /// Delete a custom maintenance item and its service records.
    DeleteItem {
        id: String,
        #[arg(long)]
        yes: bool,
    },

    /// Maintenance status of every item for one vehicle.
    Status { vehicle: String },

    /// Overdue, due-soon and unrecorded items across all vehicles.
    Dashboard,

    /// Check the data file for integrity problems.
    Doctor {
        /// Write result JSON to this path.
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Invoke a backend command by name with JSON args.
    Call {
        /// Command name (e.g. "status", "add_log").
        cmd: String,
        #[arg(long, default_value = "{}")]
        args: String,
    },

    /// Run a scripted scenario from a YAML file against an empty store.
    RunScenario { file: PathBuf },

    /// Fetch state from the sync server.
    Pull,

    /// Upload the local state to the sync server now.
    Push,

    /// Start daemon mode over a Unix socket.
    Serve {
        #[arg(long)]
        socket: PathBuf,
    },
}

// ===========================================================================
// Main
// ===========================================================================

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let json = cli.json;
    let registry = CommandRegistry::new();

    let ctx = match build_context(&cli) {
        Ok(ctx) => ctx,
        Err(r) => {
            output_result(&r, json);
            return;
        }
    };

    let auto_pull = !matches!(
        cli.command,
        Commands::Pull | Commands::Push | Commands::RunScenario { .. }
    );
    if auto_pull && ctx.sync().is_some() {
        if let Err(e) = ctx.pull_remote().await {
            tracing::warn!(error = %e, "initial sync failed, using local data");
        }
    }

    let result = match cli.command {
        Commands::Vehicles => registry.execute("list_vehicles", json!({}), &ctx),
        Commands::AddVehicle {
            name,
            make,
            model,
            year,
            km,
        } => registry.execute(
            "add_vehicle",
            compact(json!({
                "name": name,
                "make": make,
                "model": model,
                "year": year,
                "currentKm": km,
            })),
            &ctx,
        ),
        Commands::UpdateVehicle {
            id,
            name,
            make,
            model,
            year,
            km,
        } => registry.execute(
            "update_vehicle",
            compact(json!({
                "id": id,
                "name": name,
                "make": make,
                "model": model,
                "year": year,
                "currentKm": km,
            })),
            &ctx,
        ),
        Commands::DeleteVehicle { id, yes } => {
            let what = format!("vehicle {} and all of its service records", id);
            if confirm_delete(&what, yes) {
                registry.execute("delete_vehicle", json!({ "id": id }), &ctx)
            } else {
                cancelled("delete_vehicle")
            }
        }
        Commands::Logs { vehicle } => {
            registry.execute("list_logs", compact(json!({ "vehicleId": vehicle })), &ctx)
        }
        Commands::LogService {
            vehicle,
            item,
            date,
            km,
            notes,
        } => registry.execute(
            "add_log",
            compact(json!({
                "vehicleId": vehicle,
                "itemId": item,
                "date": date,
                "kmAtService": km,
                "notes": notes,
            })),
            &ctx,
        ),
        Commands::DeleteLog { id } => registry.execute("delete_log", json!({ "id": id }), &ctx),
        Commands::Catalog => registry.execute("catalog", json!({}), &ctx),
        Commands::AddItem {
            name,
            category,
            interval_km,
            interval_months,
        } => registry.execute(
            "add_custom_item",
            compact(json!({
                "name": name,
                "category": category,
                "intervalKm": interval_km,
                "intervalMonths": interval_months,
            })),
            &ctx,
        ),
        Commands::DeleteItem { id, yes } => {
            let what = format!("maintenance item {} and its service records", id);
            if confirm_delete(&what, yes) {
                registry.execute("delete_custom_item", json!({ "id": id }), &ctx)
            } else {
                cancelled("delete_custom_item")
            }
        }
        Commands::Status { vehicle } => {
            registry.execute("status", json!({ "vehicleId": vehicle }), &ctx)
        }
        Commands::Dashboard => registry.execute("dashboard", json!({}), &ctx),
        Commands::Doctor { out } => {
            let r = engine::doctor::run_doctor(&ctx);
            if let Some(ref path) = out {
                write_result_file(path, &r);
            }
            r
        }
        Commands::Call { cmd, args } => match serde_json::from_str::<Value>(&args) {
            Ok(args) => registry.execute(&cmd, args, &ctx),
            Err(e) => result_err(
                "call",
                &cmd,
                &new_run_id(),
                0,
                ErrorCode::InvalidInput,
                format!("invalid JSON args: {}", e),
            ),
        },
        Commands::Pull => engine::remote::run_remote("pull", &ctx).await,
        Commands::Push => engine::remote::run_remote("push", &ctx).await,
        Commands::Serve { socket } => {
            serve::run_daemon(socket, ctx, registry).await;
            return;
        }
        Commands::RunScenario { file } => {
            cmd_run_scenario(&file, json, &registry);
            return;
        }
    };

    // Changes queued by a mutation must reach the server before we exit.
    if let Some(sync) = ctx.sync() {
        sync.flush().await;
    }
    output_result(&result, json);
}

fn build_context(cli: &Cli) -> Result<AppContext, CommandResult> {
    let ctx = AppContext::open(&cli.data);
    let Some(url) = &cli.sync_url else {
        return Ok(ctx);
    };
    match ReqwestSync::new(url, DEFAULT_SYNC_TIMEOUT) {
        Ok(transport) => {
            let delay = Duration::from_millis(cli.debounce_ms);
            Ok(ctx.with_sync(SyncScheduler::new(Arc::new(transport), delay)))
        }
        Err(e) => Err(result_err(
            "sync",
            url,
            &new_run_id(),
            0,
            ErrorCode::InvalidInput,
            format!("cannot set up sync client: {}", e),
        )),
    }
}

/// Drop null fields so optional flags fall back to command defaults.
fn compact(mut args: Value) -> Value {
    if let Some(obj) = args.as_object_mut() {
        obj.retain(|_, v| !v.is_null());
    }
    args
}

fn confirm_delete(what: &str, yes: bool) -> bool {
    if yes {
        return true;
    }
    dialoguer::Confirm::new()
        .with_prompt(format!("Delete {}?", what))
        .default(false)
        .interact()
        .unwrap_or(false)
}

fn cancelled(command: &str) -> CommandResult {
    result_skip("call", command, &new_run_id(), 0, "cancelled by user")
}

// ===========================================================================
// Scenarios
// ===========================================================================

fn cmd_run_scenario(file: &Path, json: bool, registry: &CommandRegistry) {
    let yaml = match std::fs::read_to_string(file) {
        Ok(s) => s,
        Err(e) => {
            let r = result_err(
                "run-scenario",
                &file.display().to_string(),
                &new_run_id(),
                0,
                ErrorCode::IoError,
                format!("cannot read scenario file: {}", e),
            );
            output_result(&r, json);
            return;
        }
    };

    let scenario = match engine::scenario::load_scenario(&yaml) {
        Ok(s) => s,
        Err(e) => {
            let r = result_err(
                "run-scenario",
                &file.display().to_string(),
                &new_run_id(),
                0,
                ErrorCode::InvalidInput,
                e,
            );
            output_result(&r, json);
            return;
        }
    };

    let ctx = engine::scenario::prepare_context(&scenario, AppContext::in_memory());
    let scenario_result = engine::scenario::run_scenario(&scenario, &ctx, registry);

    if json {
        let j = serde_json::to_string_pretty(&scenario_result).unwrap_or_default();
        println!("{}", j);
    } else {
        println!(
            "Scenario: {}",
            scenario_result.name.as_deref().unwrap_or("<unnamed>")
        );
        println!("Overall: {:?}", scenario_result.overall_status);
        for (i, sr) in scenario_result.step_results.iter().enumerate() {
            println!(
                "  Step {}: {} -> {:?} ({}ms)",
                i, sr.target, sr.status, sr.timing_ms.total
            );
        }
    }

    if scenario_result.overall_status != Status::Pass {
        std::process::exit(1);
    }
}

// ===========================================================================
// Output helpers
// ===========================================================================

fn output_result(result: &CommandResult, json: bool) {
    if json {
        let j = serde_json::to_string_pretty(result).unwrap_or_default();
        println!("{}", j);
    } else {
        print_human(result);
    }

    let code = result.status.exit_code();
    if code != 0 {
        std::process::exit(code);
    }
}

fn print_human(r: &CommandResult) {
    let status_icon = match r.status {
        Status::Pass => "PASS",
        Status::Fail => "FAIL",
        Status::Skip => "SKIP",
        Status::Error => "ERROR",
    };

    println!("[{}] {} {}", status_icon, r.command, r.target);
    if let Some(ref err) = r.error {
        println!("  error:  {} – {}", err.code, err.message);
    }

    let Some(ref data) = r.data else {
        return;
    };
    match r.target.as_str() {
        "status" => print_status_table(data),
        "dashboard" => print_dashboard(data),
        _ => {
            if let Ok(s) = serde_json::to_string_pretty(data) {
                for line in s.lines() {
                    println!("  {}", line);
                }
            }
        }
    }
}

fn print_status_table(data: &Value) {
    let records = data["records"].as_array().cloned().unwrap_or_default();
    if records.is_empty() {
        println!("  no such vehicle");
        return;
    }
    println!("  as of {}", data["today"].as_str().unwrap_or("?"));
    for rec in &records {
        println!(
            "  {:<8} {:<32} km: {:>8}  months: {:>4}  last: {}",
            rec["status"].as_str().unwrap_or("?").to_uppercase(),
            rec["item"]["name"].as_str().unwrap_or("?"),
            remaining(&rec["kmRemaining"]),
            remaining(&rec["monthsRemaining"]),
            rec["lastService"]["date"].as_str().unwrap_or("never"),
        );
    }
}

fn print_dashboard(data: &Value) {
    let counts = &data["counts"];
    println!(
        "  overdue: {}  due soon: {}  no record: {}  ok: {}",
        counts["overdue"], counts["warning"], counts["unknown"], counts["ok"]
    );
    for (label, key) in [("OVERDUE", "overdue"), ("DUE SOON", "warning")] {
        for item in data[key].as_array().into_iter().flatten() {
            println!(
                "  {:<8} {:<20} {}",
                label,
                item["vehicleName"].as_str().unwrap_or("?"),
                item["item"]["name"].as_str().unwrap_or("?"),
            );
        }
    }
}

fn remaining(v: &Value) -> String {
    v.as_i64().map(|n| n.to_string()).unwrap_or_else(|| "-".into())
}

fn write_result_file(path: &Path, result: &CommandResult) {
    let j = serde_json::to_string_pretty(result).unwrap_or_default();
    if let Err(e) = std::fs::write(path, &j) {
        eprintln!(
            "warning: failed to write result to {}: {}",
            path.display(),
            e
        );
    }
}
