//! The `seek` action.

use vigil_pipeline::{SeekFlags, SeekType};

use crate::{Action, ExecuteResult, Scenario, scenario::SeekSpec};

pub(crate) fn execute_seek(scenario: &mut Scenario, action: &mut Action) -> ExecuteResult {
    let start = match scenario.get_action_time(action, "start") {
        Ok(Some(start)) => Some(start),
        // `start` is mandatory; no value means the expression failed.
        Ok(None) | Err(_) => return ExecuteResult::Error,
    };

    let rate = action.structure().get_double("rate").unwrap_or(1.0);
    let flags = match action.structure().get_str("flags") {
        Some(spec) => match spec.parse::<SeekFlags>() {
            Ok(flags) => flags,
            Err(_) => return ExecuteResult::Error,
        },
        None => SeekFlags::empty(),
    };
    let start_type = parse_seek_type(action, "start_type").unwrap_or(SeekType::Set);
    let stop_type = parse_seek_type(action, "stop_type").unwrap_or(SeekType::Set);
    let stop = match scenario.get_action_time(action, "stop") {
        Ok(stop) => stop,
        Err(_) => return ExecuteResult::Error,
    };

    scenario.execute_seek(
        action,
        SeekSpec {
            rate,
            flags,
            start_type,
            start,
            stop_type,
            stop,
        },
    )
}

fn parse_seek_type(action: &Action, field: &str) -> Option<SeekType> {
    action
        .structure()
        .get_str(field)
        .and_then(|s| s.parse().ok())
}
