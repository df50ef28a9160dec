//! Scenario runner – execute scripted flows from YAML files.

use crate::commands::CommandRegistry;
use crate::context::AppContext;
use crate::platform::FixedClock;
use crate::types::*;
use serde_json::Value;
use std::collections::HashMap;

/// Load a scenario from a YAML string.
pub fn load_scenario(yaml: &str) -> Result<Scenario, String> {
    serde_yaml::from_str(yaml).map_err(|e| format!("failed to parse scenario YAML: {}", e))
}

/// Pin the context clock to the scenario's `today`, if it sets one.
pub fn prepare_context(scenario: &Scenario, ctx: AppContext) -> AppContext {
    match scenario.today {
        Some(day) => ctx.with_clock(Box::new(FixedClock(day))),
        None => ctx,
    }
}

/// Execute a scenario and return the overall result.
///
/// Steps run in order and keep going after a failed expectation so the
/// report shows every step.
pub fn run_scenario(
    scenario: &Scenario,
    ctx: &AppContext,
    registry: &CommandRegistry,
) -> ScenarioResult {
    let mut step_results = Vec::new();
    let mut overall = Status::Pass;
    let mut saved: HashMap<String, String> = HashMap::new();

    for (i, step) in scenario.steps.iter().enumerate() {
        let args = substitute(&step.args, &saved);
        let mut r = registry.execute(&step.call, args, ctx);

        let actual_status = serde_json::to_value(r.status)
            .ok()
            .and_then(|v| v.as_str().map(String::from))
            .unwrap_or_default();
        if actual_status != step.expect_status {
            tracing::warn!(
                step = i,
                expected = %step.expect_status,
                actual = %actual_status,
                "scenario step status mismatch"
            );
            overall = Status::Fail;
        }

        let mismatches = check_expectations(&step.expect, r.data.as_ref());
        if !mismatches.is_empty() {
            tracing::warn!(step = i, call = %step.call, "scenario step data mismatch");
            overall = Status::Fail;
            if r.status == Status::Pass {
                r.status = Status::Fail;
            }
            let data = r.data.get_or_insert_with(|| Value::Object(Default::default()));
            if let Some(obj) = data.as_object_mut() {
                obj.insert("mismatches".into(), Value::from(mismatches));
            }
        }

        if let Some(name) = &step.save_as {
            match r.data.as_ref().and_then(|d| d.get("id")).and_then(Value::as_str) {
                Some(id) => {
                    saved.insert(name.clone(), id.to_string());
                }
                None => {
                    tracing::warn!(step = i, name = %name, "step returned no id to save");
                    overall = Status::Fail;
                }
            }
        }

        step_results.push(r);
    }

    ScenarioResult {
        name: scenario.name.clone(),
        overall_status: overall,
        step_results,
    }
}

/// Replace `$name` strings with ids saved by earlier steps.
fn substitute(value: &Value, saved: &HashMap<String, String>) -> Value {
    match value {
        Value::String(s) => match s.strip_prefix('$').and_then(|name| saved.get(name)) {
            Some(id) => Value::String(id.clone()),
            None => value.clone(),
        },
        Value::Array(items) => Value::Array(items.iter().map(|v| substitute(v, saved)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), substitute(v, saved)))
                .collect(),
        ),
        _ => value.clone(),
    }
}

fn check_expectations(expect: &HashMap<String, Value>, data: Option<&Value>) -> Vec<String> {
    let mut mismatches: Vec<String> = expect
        .iter()
        .filter_map(|(pointer, want)| {
            let got = data.and_then(|d| d.pointer(pointer));
            match got {
                Some(got) if got == want => None,
                Some(got) => Some(format!("{}: expected {}, got {}", pointer, want, got)),
                None => Some(format!("{}: expected {}, got nothing", pointer, want)),
            }
        })
        .collect();
    mismatches.sort();
    mismatches
}
