//! Element-targeting actions: `set-property`, `set-vars`,
//! `emit-signal`, rank and registry tweaks, debug thresholds.

use std::sync::Arc;

use tracing::error;
use vigil_pipeline::Element;
use vigil_report::{Reporter, issue::ids};

use crate::{Action, ExecuteResult, Scenario, bus::element_has_klass};

/// Resolve `target-element-name` to a single element. The pipeline
/// itself is addressable by its own name.
pub(crate) fn target_element(
    scenario: &mut Scenario,
    action: &Action,
) -> Option<Arc<dyn Element>> {
    let pipeline = scenario.pipeline()?;
    let name = action.structure().get_str("target-element-name")?;
    if pipeline.name() == name {
        return Some(pipeline as Arc<dyn Element>);
    }
    let found = pipeline.by_name(name);
    if found.is_none() {
        error!("target element with given name ({}) not found", name);
    }
    found
}

/// Resolve `target-element-klass` / `target-element-factory-name` to
/// every matching element, the pipeline included.
fn target_elements_by_klass_or_factory(
    scenario: &mut Scenario,
    action: &Action,
) -> Vec<Arc<dyn Element>> {
    let Some(pipeline) = scenario.pipeline() else {
        return Vec::new();
    };
    let klass = action.structure().get_str("target-element-klass");
    let factory = action.structure().get_str("target-element-factory-name");
    if klass.is_none() && factory.is_none() {
        return Vec::new();
    }

    let mut result: Vec<Arc<dyn Element>> = Vec::new();
    let pipeline_element: Arc<dyn Element> = Arc::clone(&pipeline) as Arc<dyn Element>;
    let matches = |element: &Arc<dyn Element>| {
        klass.map(|k| element_has_klass(element.as_ref(), k)).unwrap_or(false)
            || factory.map(|f| element.factory_name() == f).unwrap_or(false)
    };
    if matches(&pipeline_element) {
        result.push(pipeline_element);
    }
    for element in pipeline.elements() {
        if matches(&element) && !result.iter().any(|e| e.name() == element.name()) {
            result.push(element);
        }
    }
    result
}

pub(crate) fn execute_set_property(scenario: &mut Scenario, action: &mut Action) -> ExecuteResult {
    let targets: Vec<Arc<dyn Element>> =
        if action.structure().has_field("target-element-name") {
            match target_element(scenario, action) {
                Some(target) => vec![target],
                None => return ExecuteResult::Error,
            }
        } else {
            let targets = target_elements_by_klass_or_factory(scenario, action);
            if targets.is_empty() {
                return ExecuteResult::Error;
            }
            targets
        };

    let Some(property) = action.structure().get_str("property-name").map(str::to_string) else {
        return ExecuteResult::Error;
    };
    let Some(value) = action.structure().get("property-value").cloned() else {
        return ExecuteResult::Error;
    };

    let mut result = ExecuteResult::Ok;
    for target in targets {
        if let Err(e) = target.set_property(&property, &value) {
            scenario.report(
                ids::SCENARIO_ACTION_EXECUTION_ERROR,
                format!(
                    "Could not set property '{}' on element '{}': {}",
                    property,
                    target.name(),
                    e
                ),
            );
            result = ExecuteResult::ErrorReported;
            continue;
        }
        // Verify by re-reading; elements are allowed to clamp but not to
        // silently ignore.
        let read_back = target.property(&property);
        if read_back.as_ref() != Some(&value) {
            scenario.report(
                ids::SCENARIO_ACTION_EXECUTION_ERROR,
                format!(
                    "Property '{}' on element '{}' was set to {} but reads back as {}",
                    property,
                    target.name(),
                    value,
                    read_back.map(|v| v.to_string()).unwrap_or_else(|| "<nothing>".to_string())
                ),
            );
            result = ExecuteResult::ErrorReported;
        }
    }
    result
}

pub(crate) fn execute_set_vars(scenario: &mut Scenario, action: &mut Action) -> ExecuteResult {
    for (field, value) in action.structure().iter() {
        scenario.vars.set(field, value.clone());
    }
    ExecuteResult::Ok
}

pub(crate) fn execute_emit_signal(scenario: &mut Scenario, action: &mut Action) -> ExecuteResult {
    let Some(target) = target_element(scenario, action) else {
        return ExecuteResult::Error;
    };
    let Some(signal_name) = action.structure().get_str("signal-name") else {
        return ExecuteResult::Error;
    };
    // Signals with arguments are not supported yet; no use case so far.
    match target.emit_signal(signal_name) {
        Ok(()) => ExecuteResult::Ok,
        Err(e) => {
            error!("could not emit signal {}: {}", signal_name, e);
            ExecuteResult::Error
        }
    }
}

pub(crate) fn execute_set_rank(scenario: &mut Scenario, action: &mut Action) -> ExecuteResult {
    let Some(name) = action
        .structure()
        .get_str("feature-name")
        .or_else(|| action.structure().get_str("name"))
        .map(str::to_string)
    else {
        error!("could not find the name of the plugin feature(s) to tweak");
        return ExecuteResult::Error;
    };
    let Some(rank) = action
        .structure()
        .get_uint("rank")
        .and_then(|r| u32::try_from(r).ok())
    else {
        error!("could not get rank to set on {}", name);
        return ExecuteResult::Error;
    };
    let Some(registry) = scenario.feature_registry() else {
        error!("no feature registry installed, cannot set rank of {}", name);
        return ExecuteResult::Error;
    };
    if registry.set_rank(&name, rank) {
        ExecuteResult::Ok
    } else {
        error!("could not find {}", name);
        ExecuteResult::Error
    }
}

pub(crate) fn execute_disable_plugin(scenario: &mut Scenario, action: &mut Action) -> ExecuteResult {
    let Some(plugin_name) = action.structure().get_str("plugin-name").map(str::to_string) else {
        return ExecuteResult::Error;
    };
    let Some(registry) = scenario.feature_registry() else {
        scenario.report(
            ids::SCENARIO_ACTION_EXECUTION_ERROR,
            format!(
                "Could not find plugin to disable: {} (no feature registry installed)",
                plugin_name
            ),
        );
        return ExecuteResult::ErrorReported;
    };
    if !registry.remove_plugin(&plugin_name) {
        scenario.report(
            ids::SCENARIO_ACTION_EXECUTION_ERROR,
            format!("Could not find plugin to disable: {}", plugin_name),
        );
        return ExecuteResult::ErrorReported;
    }
    scenario
        .runner_ref()
        .sink()
        .write_text(&format!("Disabling plugin \"{}\"\n", plugin_name));
    ExecuteResult::Ok
}

pub(crate) fn execute_set_debug_threshold(
    _scenario: &mut Scenario,
    action: &mut Action,
) -> ExecuteResult {
    let threshold = match action.structure().get_str("debug-threshold") {
        Some(spec) => spec.to_string(),
        None => match action.structure().get_int("debug-threshold") {
            Some(level) => level.to_string(),
            None => return ExecuteResult::Error,
        },
    };
    let reset = action.structure().get_bool("reset").unwrap_or(true);
    let _ = logging::set_threshold(&threshold, reset);
    ExecuteResult::Ok
}
