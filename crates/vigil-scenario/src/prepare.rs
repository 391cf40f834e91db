//! The default action prepare hook.

use tracing::warn;
use vigil_protocol::Value;

use crate::{Action, Result, Scenario, types};

/// Prepare an action for execution: substitute `$(var)` templates in
/// every string field, compute timed parameters, and resolve `repeat`.
///
/// Runs before every execution, so each repeat iteration re-expands the
/// restored parameter structure against fresh variables.
pub(crate) fn default_prepare(scenario: &mut Scenario, action: &mut Action) -> Result<()> {
    scenario.update_well_known_vars();

    for (_, value) in action.structure_mut().iter_mut() {
        match value {
            Value::Str(s) | Value::Raw(s) => {
                *s = scenario.substitute_in_string(s)?;
            }
            _ => {}
        }
    }

    if let Some(ty) = types::find(action.type_name()) {
        let timed: Vec<&'static str> = ty
            .parameters
            .iter()
            .filter(|p| p.types.ends_with("(time)"))
            .map(|p| p.name)
            .collect();
        for field in timed {
            if let Err(e) = scenario.get_action_time(action, field) {
                // The execute handler decides whether the parameter was
                // required; prepare only pre-computes.
                warn!(field, "could not compute timed parameter: {}", e);
            }
        }
    }

    if action.repeat > 0 {
        return Ok(());
    }
    let repeat = match action.structure().get("repeat") {
        None => return Ok(()),
        Some(value) => value.clone(),
    };
    let computed = match repeat {
        Value::Int(i) => i as i32,
        Value::Double(d) => d as i32,
        other => match other.as_str() {
            Some(expr) => {
                let vars = scenario.vars.clone();
                let value = timexpr::eval(expr, &|name| vars.get_double(name))?;
                value as i32
            }
            None => return Ok(()),
        },
    };
    action.repeat = computed;
    action
        .structure
        .set("repeat", Value::Int(i64::from(computed)));
    action
        .main_structure
        .set("repeat", Value::Int(i64::from(computed)));
    Ok(())
}
