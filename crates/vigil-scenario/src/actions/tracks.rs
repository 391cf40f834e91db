//! The `switch-track` action, in its three pipeline flavors.

use std::sync::Arc;

use tracing::{error, warn};
use vigil_pipeline::{
    BufferFlags, Element, Event, PipelineFlavor, ProbeData, ProbeReturn, ProbeType, State,
    StreamInfo, StreamType,
};
use vigil_protocol::Value;
use vigil_report::{Reporter, issue::ids};

use crate::{Action, ExecuteResult, Scenario};

pub(crate) fn execute_switch_track(scenario: &mut Scenario, action: &mut Action) -> ExecuteResult {
    let Some(pipeline) = scenario.pipeline_or_report(action) else {
        return ExecuteResult::ErrorReported;
    };
    match pipeline.flavor() {
        PipelineFlavor::Playbin3 => switch_track_pb3(scenario, action),
        PipelineFlavor::Playbin => switch_track_pb(scenario, action),
        PipelineFlavor::Plain => switch_track_default(scenario, action),
    }
}

/// Parse the `index` field: bare integers are absolute, `+N`/`-N`
/// strings are relative to the current track. Defaults to `+1`.
fn parse_index(action: &Action) -> (i32, bool) {
    match action.structure().get("index") {
        None => {
            warn!("no index given, defaulting to +1");
            (1, true)
        }
        Some(Value::Int(i)) => (*i as i32, false),
        Some(value) => match value.as_str() {
            Some(spec) => {
                let relative = spec.starts_with('+') || spec.starts_with('-');
                (spec.parse::<i32>().unwrap_or(1), relative)
            }
            None => (1, true),
        },
    }
}

fn track_type(action: &Action) -> StreamType {
    action
        .structure()
        .get_str("type")
        .and_then(|t| t.parse().ok())
        .unwrap_or(StreamType::Audio)
}

/// Caps prefixes identifying a track type on an input-selector.
fn caps_match_type(caps: &str, track: StreamType) -> bool {
    match track {
        StreamType::Audio => caps.starts_with("audio/"),
        StreamType::Video => {
            caps.starts_with("video/") && !caps.starts_with("video/x-dvd-subpicture")
        }
        StreamType::Text => {
            caps.starts_with("text/")
                || caps.starts_with("subtitle/")
                || caps.starts_with("video/x-dvd-subpicture")
        }
    }
}

/// Plain pipelines: find the input-selector serving the track type and
/// switch its active pad, parking on a buffer probe until DISCONT.
fn switch_track_default(scenario: &mut Scenario, action: &mut Action) -> ExecuteResult {
    let Some(pipeline) = scenario.pipeline() else {
        return ExecuteResult::Error;
    };
    let wanted = track_type(action);

    let selector: Option<Arc<dyn Element>> = pipeline.elements().into_iter().find(|element| {
        element.factory_name() == "input-selector"
            && element
                .static_pad("src")
                .and_then(|p| p.current_caps())
                .map(|caps| caps_match_type(&caps, wanted))
                .unwrap_or(false)
    });
    let Some(selector) = selector else {
        error!("no input-selector found for track type {}", wanted);
        return ExecuteResult::Error;
    };

    let sink_pads = selector.sink_pads();
    let pad_count = sink_pads.len() as i32;
    let (mut index, relative) = parse_index(action);
    if relative {
        if pad_count == 0 {
            scenario.report(
                ids::SCENARIO_ACTION_EXECUTION_ERROR,
                format!(
                    "Trying to execute a relative {} for {} track when there is no track of \
                     this type available on current stream.",
                    action.type_name(),
                    wanted
                ),
            );
            return ExecuteResult::Error;
        }
        let current = selector
            .property("active-pad")
            .and_then(|v| v.as_str().map(str::to_string))
            .and_then(|active| sink_pads.iter().position(|p| p.name() == active))
            .unwrap_or(0) as i32;
        index = (current + index).rem_euclid(pad_count);
    }
    let Some(new_pad) = sink_pads.get(index as usize) else {
        error!("no sink pad with index {}", index);
        return ExecuteResult::Error;
    };

    let mut result = ExecuteResult::Ok;
    if pipeline.state() == State::Playing && pipeline.pending_state().is_none() {
        if let Some(src_pad) = selector.static_pad("src") {
            let handle = scenario.handle();
            let id = action.number();
            let _ = src_pad.add_probe(
                ProbeType::Buffer,
                Box::new(move |data| {
                    if let ProbeData::Buffer(buffer) = data {
                        if buffer.flags.contains(BufferFlags::DISCONT) {
                            handle.action_done(id);
                            return ProbeReturn::Remove;
                        }
                    }
                    ProbeReturn::Ok
                }),
            );
            result = ExecuteResult::Async;
        }
    }

    if selector
        .set_property("active-pad", &Value::Str(new_pad.name()))
        .is_err()
    {
        return ExecuteResult::Error;
    }
    result
}

/// Playbin pipelines: toggle flags and `current-*` properties, parking
/// on a stream-start probe on the new track's combiner pad.
fn switch_track_pb(scenario: &mut Scenario, action: &mut Action) -> ExecuteResult {
    let Some(pipeline) = scenario.pipeline() else {
        return ExecuteResult::Error;
    };
    let wanted = track_type(action);
    let type_flag: i64 = match wanted {
        StreamType::Video => 1,
        StreamType::Audio => 2,
        StreamType::Text => 4,
    };
    let current_field = format!("current-{}", wanted);

    let mut flags = pipeline
        .property("flags")
        .and_then(|v| v.as_int())
        .unwrap_or(0);
    let track_count = pipeline
        .property(&format!("n-{}", wanted))
        .and_then(|v| v.as_int())
        .unwrap_or(0) as i32;
    let current = pipeline
        .property(&current_field)
        .and_then(|v| v.as_int())
        .map(|c| if c == -1 { 0 } else { c as i32 })
        .unwrap_or(0);

    let disabling = action.structure().has_field("disable");
    let index;
    if disabling {
        flags &= !type_flag;
        index = -1;
        scenario
            .runner_ref()
            .sink()
            .write_text(&format!("Disabling track type {}\n", wanted));
    } else {
        let (raw_index, relative) = parse_index(action);
        if relative {
            if track_count == 0 {
                scenario.report(
                    ids::SCENARIO_ACTION_EXECUTION_ERROR,
                    format!(
                        "Trying to execute a relative {} for {} track when there is no track \
                         of this type available on current stream.",
                        action.type_name(),
                        wanted
                    ),
                );
                return ExecuteResult::Error;
            }
            index = (current + raw_index).rem_euclid(track_count);
        } else {
            index = raw_index;
        }
    }

    let mut result = ExecuteResult::Ok;
    if !disabling {
        scenario.runner_ref().sink().write_text(&format!(
            "Switching to track number: {} (from {})\n",
            index, current
        ));
        flags |= type_flag;

        if pipeline.state() == State::Playing && pipeline.pending_state().is_none() {
            let probe_pad = pipeline.track_pad(wanted, index);
            match probe_pad {
                Some(pad) => {
                    let handle = scenario.handle();
                    let id = action.number();
                    let _ = pad.add_probe(
                        ProbeType::EventDownstream,
                        Box::new(move |data| {
                            if let ProbeData::Event(Event::StreamStart { .. }) = data {
                                handle.action_done(id);
                                return ProbeReturn::Remove;
                            }
                            ProbeReturn::Ok
                        }),
                    );
                    result = ExecuteResult::Async;
                }
                None => result = ExecuteResult::Error,
            }
        }
    }

    if pipeline
        .set_property("flags", &Value::Int(flags))
        .is_err()
        || pipeline
            .set_property(&current_field, &Value::Int(i64::from(index)))
            .is_err()
    {
        return ExecuteResult::Error;
    }
    result
}

/// Stream-aware pipelines: emit a select-streams event carrying the
/// expected new selection and park until `streams-selected`.
fn switch_track_pb3(scenario: &mut Scenario, action: &mut Action) -> ExecuteResult {
    let Some(pipeline) = scenario.pipeline() else {
        return ExecuteResult::Error;
    };

    let collection = pipeline.stream_collection();
    if collection.is_empty() {
        scenario.report(
            ids::SCENARIO_ACTION_EXECUTION_ERROR,
            "No stream collection message received on the bus, can not switch track.".to_string(),
        );
        return ExecuteResult::ErrorReported;
    }
    let selected = pipeline.selected_streams();
    if selected.is_empty() {
        scenario.report(
            ids::SCENARIO_ACTION_EXECUTION_ERROR,
            "No streams selected message received on the bus".to_string(),
        );
        return ExecuteResult::ErrorReported;
    }

    let wanted = track_type(action);
    let new_streams = if action.structure().has_field("disable") {
        scenario
            .runner_ref()
            .sink()
            .write_text(&format!("Disabling track type {}\n", wanted));
        disable_stream(&selected, wanted)
    } else {
        let (index, relative) = parse_index(action);
        switch_stream(scenario, &collection, &selected, wanted, index, relative)
    };

    scenario.pending_switch_track = Some((action.number(), new_streams.clone()));
    if !pipeline.send_event(Event::SelectStreams {
        streams: new_streams,
    }) {
        scenario.pending_switch_track = None;
        scenario.report(
            ids::SCENARIO_ACTION_EXECUTION_ERROR,
            "select-streams event not handled".to_string(),
        );
        return ExecuteResult::ErrorReported;
    }

    if scenario.target_state() > State::Paused {
        ExecuteResult::Async
    } else {
        ExecuteResult::Interlaced
    }
}

/// All currently selected stream ids except those of `track`.
fn disable_stream(selected: &[StreamInfo], track: StreamType) -> Vec<String> {
    selected
        .iter()
        .filter(|s| s.stream_type != track)
        .map(|s| s.id.clone())
        .collect()
}

/// Build the new selection with the `track` stream switched by `index`.
fn switch_stream(
    scenario: &mut Scenario,
    collection: &[StreamInfo],
    selected: &[StreamInfo],
    track: StreamType,
    index: i32,
    relative: bool,
) -> Vec<String> {
    let mut result: Vec<String> = selected
        .iter()
        .filter(|s| s.stream_type != track)
        .map(|s| s.id.clone())
        .collect();
    let current_stream = selected.iter().find(|s| s.stream_type == track);

    let typed: Vec<&StreamInfo> = collection
        .iter()
        .filter(|s| s.stream_type == track)
        .collect();
    let stream_count = typed.len() as i32;
    if stream_count == 0 {
        error!("no streams available of the required type");
        return result;
    }

    let current = current_stream
        .and_then(|cur| typed.iter().position(|s| s.id == cur.id))
        .unwrap_or(0) as i32;
    let target = if relative {
        (current + index).rem_euclid(stream_count)
    } else {
        index.rem_euclid(stream_count)
    };

    let stream = typed[target as usize];
    scenario.runner_ref().sink().write_text(&format!(
        "Switching from stream {} to {}\n",
        current_stream.map(|s| s.id.as_str()).unwrap_or(""),
        stream.id
    ));
    result.push(stream.id.clone());
    result
}
