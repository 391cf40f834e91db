//! The `check-last-sample` action.

use sha1::{Digest, Sha1};
use vigil_pipeline::Element;
use vigil_report::{Reporter, issue::ids};

use crate::{Action, ExecuteResult, Scenario};

/// Whether a sink matches the action's selectors. With no selector at
/// all, any element carrying a last sample matches.
fn sink_matches(
    element: &dyn Element,
    name: Option<&str>,
    factory: Option<&str>,
    caps: Option<&str>,
) -> bool {
    if name.is_none() && factory.is_none() && caps.is_none() {
        return element.last_sample().is_some();
    }
    if let Some(name) = name {
        if element.name() == name {
            return true;
        }
    }
    if let Some(factory) = factory {
        if element.factory_name() == factory {
            return true;
        }
    }
    if let Some(caps) = caps {
        let pad_caps = element
            .static_pad("sink")
            .and_then(|p| p.current_caps());
        if pad_caps.as_deref() == Some(caps) {
            return true;
        }
    }
    false
}

pub(crate) fn execute_check_last_sample(
    scenario: &mut Scenario,
    action: &mut Action,
) -> ExecuteResult {
    let Some(pipeline) = scenario.pipeline_or_report(action) else {
        return ExecuteResult::ErrorReported;
    };
    let name = action.structure().get_str("sink-name").map(str::to_string);
    let factory = action
        .structure()
        .get_str("sink-factory-name")
        .map(str::to_string);
    let caps = action
        .structure()
        .get_str("sinkpad-caps")
        .map(str::to_string);

    let mut sink: Option<std::sync::Arc<dyn Element>> = None;
    for element in pipeline.elements() {
        if !sink_matches(
            element.as_ref(),
            name.as_deref(),
            factory.as_deref(),
            caps.as_deref(),
        ) {
            continue;
        }
        if let Some(previous) = &sink {
            scenario.report(
                ids::SCENARIO_ACTION_EXECUTION_ERROR,
                format!(
                    "Could not \"check-last-sample\" as several elements were found from \
                     describing string: '{}' ({} and {} match)",
                    action.structure(),
                    previous.name(),
                    element.name()
                ),
            );
            return ExecuteResult::ErrorReported;
        }
        sink = Some(element);
    }
    let Some(sink) = sink else {
        scenario.report(
            ids::SCENARIO_ACTION_EXECUTION_ERROR,
            format!(
                "Could not \"check-last-sample\" as no sink was found from description: '{}'",
                action.structure()
            ),
        );
        return ExecuteResult::ErrorReported;
    };

    let Some(sample) = sink.last_sample() else {
        scenario.report(
            ids::SCENARIO_ACTION_EXECUTION_ERROR,
            format!(
                "Could not \"check-last-sample\" as {} 'last-sample' property is NULL. MAKE \
                 SURE THE 'enable-last-sample' PROPERTY IS SET TO 'TRUE'!",
                sink.name()
            ),
        );
        return ExecuteResult::ErrorReported;
    };

    let digest = Sha1::digest(&sample.buffer.data);
    let checksum: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
    let expected = action.structure().get_str("checksum").unwrap_or("");
    if checksum != expected {
        scenario.report(
            ids::SCENARIO_ACTION_EXECUTION_ERROR,
            format!(
                "Last buffer checksum '{}' is different than the expected one: '{}'",
                checksum, expected
            ),
        );
        return ExecuteResult::ErrorReported;
    }
    ExecuteResult::Ok
}
