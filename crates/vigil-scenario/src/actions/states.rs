//! State-changing actions: `set-state`, `play`, `pause`, `stop`.

use std::time::Duration;

use tracing::{debug, info};
use vigil_pipeline::{BusMessage, State, StateChange};
use vigil_report::{Reporter, issue::ids};

use crate::{Action, ExecuteResult, Scenario};

pub(crate) fn execute_set_state(scenario: &mut Scenario, action: &mut Action) -> ExecuteResult {
    let Some(state) = action
        .structure()
        .get_str("state")
        .and_then(|s| s.parse::<State>().ok())
    else {
        return ExecuteResult::Error;
    };
    let Some(pipeline) = scenario.pipeline_or_report(action) else {
        return ExecuteResult::ErrorReported;
    };

    scenario.target_state = state;
    scenario.changing_state = true;
    scenario.seeked_in_pause = false;

    match pipeline.set_state(state) {
        StateChange::Failure => {
            scenario.changing_state = false;
            scenario.report(
                ids::STATE_CHANGE_FAILURE,
                format!("Failed to set state to {}", state),
            );
            ExecuteResult::Error
        }
        StateChange::Async => {
            scenario.needs_async_done = true;
            ExecuteResult::Async
        }
        StateChange::Success | StateChange::NoPreroll => {
            scenario.changing_state = false;
            ExecuteResult::Ok
        }
    }
}

pub(crate) fn execute_play(scenario: &mut Scenario, action: &mut Action) -> ExecuteResult {
    debug!("playing back");
    action.structure_mut().set("state", "playing");
    execute_set_state(scenario, action)
}

pub(crate) fn execute_pause(scenario: &mut Scenario, action: &mut Action) -> ExecuteResult {
    let duration = match scenario.get_action_time(action, "duration") {
        Ok(duration) => duration.unwrap_or(Duration::ZERO),
        Err(_) => return ExecuteResult::Error,
    };
    action.structure_mut().set("state", "paused");
    info!(duration = ?duration, "pausing");

    let result = execute_set_state(scenario, action);
    if result != ExecuteResult::Error && !duration.is_zero() {
        let handle = scenario.handle();
        tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            handle.restore_playing();
        });
    }
    result
}

pub(crate) fn execute_stop(scenario: &mut Scenario, action: &mut Action) -> ExecuteResult {
    let Some(pipeline) = scenario.pipeline_or_report(action) else {
        return ExecuteResult::ErrorReported;
    };

    if let Some((_, token)) = scenario.wait_parked.take() {
        token.cancel();
    }
    scenario.check_dropped();
    pipeline.post(BusMessage::RequestState { state: State::Null });
    scenario.stopped = true;
    ExecuteResult::Ok
}
