//! App-source actions: `appsrc-push`, `appsrc-eos`, `flush`.

use std::fs;

use vigil_pipeline::{Buffer, Event, FlowReturn, State};
use vigil_protocol::Value;
use vigil_report::{Reporter, issue::ids};

use crate::{Action, ExecuteResult, Scenario, actions::props};

pub(crate) fn execute_appsrc_push(scenario: &mut Scenario, action: &mut Action) -> ExecuteResult {
    // The buffer only flows if the pipeline accepts data (>= PAUSED);
    // below that it is merely enqueued, so don't block the main queue.
    let wait = scenario.target_state() >= State::Paused;

    let Some(target) = props::target_element(scenario, action) else {
        scenario.report(
            ids::SCENARIO_ACTION_EXECUTION_ERROR,
            format!("No element found for action: {}", action.structure()),
        );
        return ExecuteResult::ErrorReported;
    };

    let Some(file_name) = action.structure().get_str("file-name").map(str::to_string) else {
        scenario.report(
            ids::SCENARIO_ACTION_EXECUTION_ERROR,
            format!("Missing file-name property: {}", action.structure()),
        );
        return ExecuteResult::ErrorReported;
    };

    let offset = action.structure().get_uint("offset").unwrap_or(0) as usize;
    // `size=-1` and an absent `size` both mean "whole file minus offset".
    let size = action
        .structure()
        .get("size")
        .and_then(Value::as_int)
        .filter(|s| *s >= 0)
        .map(|s| s as usize);

    let contents = match fs::read(&file_name) {
        Ok(contents) => contents,
        Err(e) => {
            scenario.report(
                ids::SCENARIO_ACTION_EXECUTION_ERROR,
                format!(
                    "Could not open file for action: {}. Error: {}",
                    action.structure(),
                    e
                ),
            );
            return ExecuteResult::ErrorReported;
        }
    };
    let end = size
        .map(|s| (offset + s).min(contents.len()))
        .unwrap_or(contents.len());
    if offset > contents.len() {
        scenario.report(
            ids::SCENARIO_ACTION_EXECUTION_ERROR,
            format!(
                "Offset {} is past the end of {} ({} bytes)",
                offset,
                file_name,
                contents.len()
            ),
        );
        return ExecuteResult::ErrorReported;
    }
    let payload = contents[offset..end].to_vec();

    if let Some(caps) = action.structure().get_str("caps") {
        let _ = target.set_caps(caps);
    }

    // Completion is observed at the peer pad so "done" means the
    // downstream chain actually accepted the buffer.
    let peer = target.static_pad("src").and_then(|p| p.peer());
    let Some(peer) = peer else {
        scenario.report(
            ids::SCENARIO_ACTION_EXECUTION_ERROR,
            format!("Action failed, pad not linked: {}", action.structure()),
        );
        return ExecuteResult::ErrorReported;
    };
    let handle = scenario.handle();
    let id = action.number();
    peer.wrap_chain(Box::new(move |_| handle.action_done(id)));

    match target.push_buffer(Buffer::from_bytes(payload)) {
        Ok(FlowReturn::Ok) => {
            if wait {
                ExecuteResult::Async
            } else {
                scenario.runner_ref().sink().write_text(
                    "Pipeline is not ready to push buffers, interlacing appsrc-push action...\n",
                );
                ExecuteResult::Interlaced
            }
        }
        _ => {
            scenario.report(
                ids::SCENARIO_ACTION_EXECUTION_ERROR,
                format!("push-buffer signal failed in action: {}", action.structure()),
            );
            ExecuteResult::ErrorReported
        }
    }
}

pub(crate) fn execute_appsrc_eos(scenario: &mut Scenario, action: &mut Action) -> ExecuteResult {
    let Some(target) = props::target_element(scenario, action) else {
        scenario.report(
            ids::SCENARIO_ACTION_EXECUTION_ERROR,
            format!("No element found for action: {}", action.structure()),
        );
        return ExecuteResult::ErrorReported;
    };
    match target.end_of_stream() {
        Ok(FlowReturn::Ok) => ExecuteResult::Ok,
        _ => {
            scenario.report(
                ids::SCENARIO_ACTION_EXECUTION_ERROR,
                format!(
                    "Failed to emit end-of-stream signal for action: {}",
                    action.structure()
                ),
            );
            ExecuteResult::ErrorReported
        }
    }
}

pub(crate) fn execute_flush(scenario: &mut Scenario, action: &mut Action) -> ExecuteResult {
    let Some(target) = props::target_element(scenario, action) else {
        scenario.report(
            ids::SCENARIO_ACTION_EXECUTION_ERROR,
            format!("No element found for action: {}", action.structure()),
        );
        return ExecuteResult::ErrorReported;
    };
    let reset_time = action.structure().get_bool("reset-time").unwrap_or(true);

    if !target.send_event(Event::FlushStart) {
        scenario.report(
            ids::SCENARIO_ACTION_EXECUTION_ERROR,
            "FLUSH_START event was not handled".to_string(),
        );
        return ExecuteResult::ErrorReported;
    }
    if !target.send_event(Event::FlushStop { reset_time }) {
        scenario.report(
            ids::SCENARIO_ACTION_EXECUTION_ERROR,
            "FLUSH_STOP event was not handled".to_string(),
        );
        return ExecuteResult::ErrorReported;
    }
    ExecuteResult::Ok
}
