//! Remaining built-ins: `eos`, `dot-pipeline`, `description`.

use tracing::debug;
use vigil_pipeline::{DotDetails, Event};

use crate::{Action, ExecuteResult, Scenario};

pub(crate) fn execute_eos(scenario: &mut Scenario, action: &mut Action) -> ExecuteResult {
    let Some(pipeline) = scenario.pipeline_or_report(action) else {
        return ExecuteResult::ErrorReported;
    };
    debug!(playback_time = ?action.playback_time(), "sending EOS to pipeline");
    if pipeline.send_event(Event::Eos) {
        ExecuteResult::Ok
    } else {
        ExecuteResult::Error
    }
}

pub(crate) fn execute_dot_pipeline(scenario: &mut Scenario, action: &mut Action) -> ExecuteResult {
    let Some(pipeline) = scenario.pipeline_or_report(action) else {
        return ExecuteResult::ErrorReported;
    };
    let details = action
        .structure()
        .get_int("details")
        .map(|d| DotDetails(d as i32))
        .unwrap_or_default();
    let dot_name = match action.structure().get_str("name") {
        Some(name) => format!("vigil.action.{}", name),
        None => "vigil.action.unnamed".to_string(),
    };
    pipeline.dump_dot(&dot_name, details);
    ExecuteResult::Ok
}

/// `description` structures are fully handled by the loader; executing
/// one (e.g. through `sub-action`) is a no-op.
pub(crate) fn execute_description(_scenario: &mut Scenario, _action: &mut Action) -> ExecuteResult {
    ExecuteResult::Ok
}
