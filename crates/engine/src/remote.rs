//! Explicit remote operations – pull and push against the sync endpoint,
//! reported as timed CommandResults.

use crate::context::AppContext;
use crate::traits::CapError;
use crate::types::*;
use std::collections::HashMap;
use std::time::Instant;

/// Run a remote operation by name ("pull" or "push").
pub async fn run_remote(name: &str, ctx: &AppContext) -> CommandResult {
    match name {
        "pull" => remote_pull(ctx).await,
        "push" => remote_push(ctx).await,
        _ => result_err(
            "sync",
            name,
            &new_run_id(),
            0,
            ErrorCode::InvalidInput,
            format!("unknown sync operation: {} (available: pull, push)", name),
        ),
    }
}

fn not_configured(target: &str, run_id: &str, start: Instant) -> CommandResult {
    result_skip(
        "sync",
        target,
        run_id,
        start.elapsed().as_millis() as u64,
        "no sync endpoint configured",
    )
}

// ---------------------------------------------------------------------------
// Pull
// ---------------------------------------------------------------------------

async fn remote_pull(ctx: &AppContext) -> CommandResult {
    let run_id = new_run_id();
    let start = Instant::now();
    let mut steps = HashMap::new();

    let Some(sync) = ctx.sync() else {
        return not_configured("pull", &run_id, start);
    };

    let t0 = Instant::now();
    let fetched = ctx.pull_remote().await;
    steps.insert("fetch_merge".into(), t0.elapsed().as_millis() as u64);

    match fetched {
        Ok(changed) => {
            let snap = ctx.store().snapshot();
            let mut r = result_ok("sync", "pull", &run_id, start.elapsed().as_millis() as u64);
            r.timing_ms.steps = steps;
            r.data = Some(serde_json::json!({
                "endpoint": sync.transport().endpoint(),
                "changed": changed,
                "vehicles": snap.vehicles.len(),
                "logs": snap.logs.len(),
                "custom_items": snap.custom_items.len(),
            }));
            r
        }
        Err(e) => remote_err("pull", &run_id, start, steps, e),
    }
}

// ---------------------------------------------------------------------------
// Push
// ---------------------------------------------------------------------------

async fn remote_push(ctx: &AppContext) -> CommandResult {
    let run_id = new_run_id();
    let start = Instant::now();
    let mut steps = HashMap::new();

    let Some(sync) = ctx.sync() else {
        return not_configured("push", &run_id, start);
    };

    let snapshot = ctx.store().snapshot();
    let t0 = Instant::now();
    let pushed = sync.push_now(&snapshot).await;
    steps.insert("upload".into(), t0.elapsed().as_millis() as u64);

    match pushed {
        Ok(()) => {
            let mut r = result_ok("sync", "push", &run_id, start.elapsed().as_millis() as u64);
            r.timing_ms.steps = steps;
            r.data = Some(serde_json::json!({
                "endpoint": sync.transport().endpoint(),
                "vehicles": snapshot.vehicles.len(),
                "logs": snapshot.logs.len(),
                "custom_items": snapshot.custom_items.len(),
            }));
            r
        }
        Err(e) => remote_err("push", &run_id, start, steps, e),
    }
}

fn remote_err(
    target: &str,
    run_id: &str,
    start: Instant,
    steps: HashMap<String, u64>,
    err: CapError,
) -> CommandResult {
    let code = match &err {
        CapError::Timeout => ErrorCode::Timeout,
        CapError::Network(_) => ErrorCode::NetworkError,
        CapError::Rejected(_) => ErrorCode::RemoteRejected,
        CapError::PermissionDenied(_) => ErrorCode::PermissionDenied,
        CapError::Io(_) => ErrorCode::IoError,
        CapError::InvalidData(_) => ErrorCode::InvalidData,
    };
    let mut r = result_err(
        "sync",
        target,
        run_id,
        start.elapsed().as_millis() as u64,
        code,
        format!("{} failed: {}", target, err),
    );
    r.timing_ms.steps = steps;
    if let (CapError::Rejected(http_status), Some(info)) = (&err, r.error.as_mut()) {
        info.details = serde_json::json!({ "httpStatus": http_status });
    }
    r
}
