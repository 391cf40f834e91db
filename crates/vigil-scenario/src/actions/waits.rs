//! The `wait` action: timed, signal-based and message-based waits.

use std::env;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::{Action, ExecuteResult, Scenario, actions::props};

/// Environment variable scaling every timed wait; `0` skips waits.
pub const WAIT_MULTIPLIER_ENV: &str = "VIGIL_SCENARIO_WAIT_MULTIPLIER";

pub(crate) fn execute_wait(scenario: &mut Scenario, action: &mut Action) -> ExecuteResult {
    if action.structure().has_field("signal-name") {
        execute_wait_for_signal(scenario, action)
    } else if action.structure().has_field("message-type") {
        execute_wait_for_message(scenario, action)
    } else {
        execute_timed_wait(scenario, action)
    }
}

fn wait_multiplier() -> f64 {
    let Ok(spec) = env::var(WAIT_MULTIPLIER_ENV) else {
        return 1.0;
    };
    match spec.parse::<f64>() {
        Ok(multiplier) => multiplier,
        Err(_) => {
            error!("could not parse the wait multiplier `{}`", spec);
            1.0
        }
    }
}

fn execute_timed_wait(scenario: &mut Scenario, action: &mut Action) -> ExecuteResult {
    let multiplier = wait_multiplier();
    if multiplier == 0.0 {
        info!("I have been told not to wait...");
        return ExecuteResult::Ok;
    }

    let Ok(Some(duration)) = scenario.get_action_time(action, "duration") else {
        return ExecuteResult::Error;
    };
    let scaled = duration.mul_f64(multiplier);

    let token = CancellationToken::new();
    scenario.wait_parked = Some((action.number(), token.clone()));

    let handle = scenario.handle();
    let id = action.number();
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::time::sleep(scaled) => handle.action_done(id),
            _ = token.cancelled() => {}
        }
    });
    ExecuteResult::Async
}

fn execute_wait_for_signal(scenario: &mut Scenario, action: &mut Action) -> ExecuteResult {
    let Some(signal_name) = action
        .structure()
        .get_str("signal-name")
        .map(str::to_string)
    else {
        error!("no signal-name given for wait action");
        return ExecuteResult::Error;
    };
    let Some(target) = props::target_element(scenario, action) else {
        return ExecuteResult::Error;
    };

    scenario
        .runner_ref()
        .sink()
        .write_text(&format!("Waiting for '{}' signal\n", signal_name));

    let handle = scenario.handle();
    let id = action.number();
    if target
        .connect_signal_once(&signal_name, Box::new(move || handle.action_done(id)))
        .is_err()
    {
        return ExecuteResult::Error;
    }
    scenario.signal_wait = Some(id);
    ExecuteResult::Async
}

fn execute_wait_for_message(scenario: &mut Scenario, action: &mut Action) -> ExecuteResult {
    let Some(message_type) = action
        .structure()
        .get_str("message-type")
        .map(str::to_string)
    else {
        return ExecuteResult::Error;
    };
    scenario
        .runner_ref()
        .sink()
        .write_text(&format!("Waiting for '{}' message\n", message_type));
    scenario.message_wait = Some(message_type);
    ExecuteResult::Async
}
