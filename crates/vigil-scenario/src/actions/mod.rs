//! The built-in action catalog.
//!
//! One [`ActionType`] per entry, with the parameter schemas surfaced in
//! documentation output. Implementations live in the submodules, grouped
//! by concern.

mod appsrc;
mod checks;
mod misc;
pub(crate) mod props;
mod seek;
mod states;
mod tracks;
mod waits;

pub use waits::WAIT_MULTIPLIER_ENV;

use crate::types::{ActionParameter, ActionType, ActionTypeFlags};

const PLAYBACK_TIME_VARIABLES: &str = "position: The current position in the stream\n\
                                       duration: The duration of the stream";

/// Build the full built-in catalog.
#[allow(clippy::too_many_lines, reason = "one entry per built-in action type")]
pub(crate) fn builtin_types() -> Vec<ActionType> {
    let core = |name: &str,
                description: &str,
                flags: ActionTypeFlags,
                parameters: Vec<ActionParameter>,
                execute: crate::types::ExecuteFunc| {
        ActionType {
            name: name.to_string(),
            implementer_namespace: "core".to_string(),
            description: description.to_string(),
            flags,
            parameters,
            prepare: None,
            execute,
        }
    };

    vec![
        core(
            "description",
            "Describes the scenario, is-config, handles-states and pipeline-name all live here",
            ActionTypeFlags::CONFIG,
            vec![
                ActionParameter {
                    name: "summary",
                    description: "A human-readable summary of what the scenario does",
                    mandatory: false,
                    types: "string",
                    possible_variables: None,
                    default: Some("'Nothing'"),
                },
                ActionParameter {
                    name: "is-config",
                    description: "Whether the scenario is a config only scenario",
                    mandatory: false,
                    types: "boolean",
                    possible_variables: None,
                    default: Some("false"),
                },
                ActionParameter {
                    name: "handles-states",
                    description: "Whether the scenario handles pipeline state changes from the \
                                  beginning; in that case the application should not set the \
                                  state of the pipeline to anything",
                    mandatory: false,
                    types: "boolean",
                    possible_variables: None,
                    default: Some("false"),
                },
                ActionParameter {
                    name: "pipeline-name",
                    description: "The name (glob) of pipelines the scenario applies to",
                    mandatory: false,
                    types: "string",
                    possible_variables: None,
                    default: None,
                },
                ActionParameter {
                    name: "max-latency",
                    description: "The maximum latency in nanoseconds the pipeline is allowed to \
                                  report",
                    mandatory: false,
                    types: "double, string (time)",
                    possible_variables: None,
                    default: None,
                },
                ActionParameter {
                    name: "max-dropped",
                    description: "The maximum number of dropped buffers",
                    mandatory: false,
                    types: "int",
                    possible_variables: None,
                    default: None,
                },
            ],
            misc::execute_description,
        ),
        core(
            "seek",
            "Seeks into the stream. This is an example of a seek happening when the stream \
             reaches 5 seconds or 1 eighth of its duration and seeks to 10s or 2 eighths of its \
             duration:\n  seek, playback-time=\"min(5.0, (duration/8))\", \
             start=\"min(10, 2*(duration/8))\", flags=accurate+flush",
            ActionTypeFlags::ASYNC | ActionTypeFlags::NEEDS_CLOCK,
            vec![
                ActionParameter {
                    name: "start",
                    description: "The starting value of the seek",
                    mandatory: true,
                    types: "double or string (time)",
                    possible_variables: Some(PLAYBACK_TIME_VARIABLES),
                    default: None,
                },
                ActionParameter {
                    name: "flags",
                    description: "The flags of the seek, in symbolic form (flush+accurate)",
                    mandatory: true,
                    types: "string",
                    possible_variables: None,
                    default: None,
                },
                ActionParameter {
                    name: "rate",
                    description: "The rate of the seek",
                    mandatory: false,
                    types: "double",
                    possible_variables: None,
                    default: Some("1.0"),
                },
                ActionParameter {
                    name: "start_type",
                    description: "The interpretation of the start value (none, set, end)",
                    mandatory: false,
                    types: "string",
                    possible_variables: None,
                    default: Some("set"),
                },
                ActionParameter {
                    name: "stop_type",
                    description: "The interpretation of the stop value (none, set, end)",
                    mandatory: false,
                    types: "string",
                    possible_variables: None,
                    default: Some("set"),
                },
                ActionParameter {
                    name: "stop",
                    description: "The stop value of the seek",
                    mandatory: false,
                    types: "double or string (time)",
                    possible_variables: Some(PLAYBACK_TIME_VARIABLES),
                    default: None,
                },
            ],
            seek::execute_seek,
        ),
        core(
            "set-state",
            "Changes the state of the pipeline to any state in {null, ready, paused, playing}",
            ActionTypeFlags::ASYNC,
            vec![ActionParameter {
                name: "state",
                description: "The state to which the pipeline should transition",
                mandatory: true,
                types: "string",
                possible_variables: None,
                default: None,
            }],
            states::execute_set_state,
        ),
        core(
            "play",
            "Puts the pipeline to PLAYING",
            ActionTypeFlags::ASYNC,
            Vec::new(),
            states::execute_play,
        ),
        core(
            "pause",
            "Puts the pipeline to PAUSED, optionally going back to PLAYING after `duration`",
            ActionTypeFlags::ASYNC | ActionTypeFlags::NEEDS_CLOCK,
            vec![ActionParameter {
                name: "duration",
                description: "Wall-clock time to stay paused before going back to playing",
                mandatory: false,
                types: "double or string (time)",
                possible_variables: None,
                default: Some("0.0"),
            }],
            states::execute_pause,
        ),
        core(
            "stop",
            "Stops the execution of the scenario. Happens automatically at end of stream",
            ActionTypeFlags::NO_EXECUTION_NOT_FATAL,
            vec![ActionParameter {
                name: "generated-after-eos",
                description: "Whether this stop was synthesized by the engine after EOS",
                mandatory: false,
                types: "boolean",
                possible_variables: None,
                default: Some("false"),
            }],
            states::execute_stop,
        ),
        core(
            "eos",
            "Sends an EOS event to the pipeline",
            ActionTypeFlags::empty(),
            Vec::new(),
            misc::execute_eos,
        ),
        core(
            "switch-track",
            "The 'switch-track' command can be used to switch tracks. The 'type' argument \
             selects which track type to change (audio, video or text). The 'index' argument \
             selects which track of this type to use: it can be an absolute index or a relative \
             one ('+1' for the next track, '-1' for the previous one)",
            ActionTypeFlags::ASYNC | ActionTypeFlags::INTERLACED,
            vec![
                ActionParameter {
                    name: "type",
                    description: "Selects which track type to change",
                    mandatory: false,
                    types: "string",
                    possible_variables: None,
                    default: Some("audio"),
                },
                ActionParameter {
                    name: "index",
                    description: "Absolute or relative ('+1'/'-1') track index",
                    mandatory: false,
                    types: "string or int",
                    possible_variables: None,
                    default: Some("+1"),
                },
                ActionParameter {
                    name: "disable",
                    description: "Disable the track type instead of switching",
                    mandatory: false,
                    types: "boolean",
                    possible_variables: None,
                    default: None,
                },
            ],
            tracks::execute_switch_track,
        ),
        core(
            "wait",
            "Waits for a duration, a signal emission or a bus message",
            ActionTypeFlags::ASYNC,
            vec![
                ActionParameter {
                    name: "duration",
                    description: "The duration to wait, scaled by the wait multiplier",
                    mandatory: false,
                    types: "double or string (time)",
                    possible_variables: Some(PLAYBACK_TIME_VARIABLES),
                    default: None,
                },
                ActionParameter {
                    name: "target-element-name",
                    description: "The name of the element to connect the signal to",
                    mandatory: false,
                    types: "string",
                    possible_variables: None,
                    default: None,
                },
                ActionParameter {
                    name: "signal-name",
                    description: "The signal to wait for",
                    mandatory: false,
                    types: "string",
                    possible_variables: None,
                    default: None,
                },
                ActionParameter {
                    name: "message-type",
                    description: "The name of the bus message to wait for",
                    mandatory: false,
                    types: "string",
                    possible_variables: None,
                    default: None,
                },
            ],
            waits::execute_wait,
        ),
        core(
            "dot-pipeline",
            "Dumps the pipeline topology to a dot file",
            ActionTypeFlags::empty(),
            vec![
                ActionParameter {
                    name: "name",
                    description: "The name suffix of the dot file",
                    mandatory: false,
                    types: "string",
                    possible_variables: None,
                    default: None,
                },
                ActionParameter {
                    name: "details",
                    description: "The detail mask for the dump",
                    mandatory: false,
                    types: "int",
                    possible_variables: None,
                    default: Some("-1"),
                },
            ],
            misc::execute_dot_pipeline,
        ),
        core(
            "set-property",
            "Sets a property on an element (by name) or on all elements matching a klass or \
             factory name. Without a playback time the action may run as soon as a matching \
             element appears in the pipeline",
            ActionTypeFlags::CAN_EXECUTE_ON_ADDITION | ActionTypeFlags::CAN_BE_OPTIONAL,
            vec![
                ActionParameter {
                    name: "target-element-name",
                    description: "The name of the element on which to set the property",
                    mandatory: false,
                    types: "string",
                    possible_variables: None,
                    default: None,
                },
                ActionParameter {
                    name: "target-element-klass",
                    description: "The klass of the elements on which to set the property",
                    mandatory: false,
                    types: "string",
                    possible_variables: None,
                    default: None,
                },
                ActionParameter {
                    name: "target-element-factory-name",
                    description: "The factory name of the elements on which to set the property",
                    mandatory: false,
                    types: "string",
                    possible_variables: None,
                    default: None,
                },
                ActionParameter {
                    name: "property-name",
                    description: "The name of the property to set",
                    mandatory: true,
                    types: "string",
                    possible_variables: None,
                    default: None,
                },
                ActionParameter {
                    name: "property-value",
                    description: "The value to set the property to",
                    mandatory: true,
                    types: "any",
                    possible_variables: None,
                    default: None,
                },
            ],
            props::execute_set_property,
        ),
        core(
            "set-rank",
            "Changes the rank of a plugin feature, or of all features of a plugin",
            ActionTypeFlags::CONFIG,
            vec![
                ActionParameter {
                    name: "name",
                    description: "The name of the plugin feature (or plugin) to tweak",
                    mandatory: true,
                    types: "string",
                    possible_variables: None,
                    default: None,
                },
                ActionParameter {
                    name: "rank",
                    description: "The rank to set",
                    mandatory: true,
                    types: "int",
                    possible_variables: None,
                    default: None,
                },
            ],
            props::execute_set_rank,
        ),
        core(
            "set-feature-rank",
            "Changes the rank of a plugin feature",
            ActionTypeFlags::CONFIG,
            vec![
                ActionParameter {
                    name: "feature-name",
                    description: "The name of the feature to tweak",
                    mandatory: true,
                    types: "string",
                    possible_variables: None,
                    default: None,
                },
                ActionParameter {
                    name: "rank",
                    description: "The rank to set",
                    mandatory: true,
                    types: "int",
                    possible_variables: None,
                    default: None,
                },
            ],
            props::execute_set_rank,
        ),
        core(
            "set-debug-threshold",
            "Sets the log threshold, as with the environment filter syntax",
            ActionTypeFlags::DOESNT_NEED_PIPELINE,
            vec![
                ActionParameter {
                    name: "debug-threshold",
                    description: "The threshold directive to apply",
                    mandatory: true,
                    types: "string or int",
                    possible_variables: None,
                    default: None,
                },
                ActionParameter {
                    name: "reset",
                    description: "Whether the threshold replaces the current one instead of \
                                  extending it",
                    mandatory: false,
                    types: "boolean",
                    possible_variables: None,
                    default: Some("true"),
                },
            ],
            props::execute_set_debug_threshold,
        ),
        core(
            "set-vars",
            "Copies its fields into the scenario variables map; variables persist for the \
             scenario lifetime",
            ActionTypeFlags::DOESNT_NEED_PIPELINE,
            Vec::new(),
            props::execute_set_vars,
        ),
        core(
            "emit-signal",
            "Emits a signal (without arguments) on an element",
            ActionTypeFlags::empty(),
            vec![
                ActionParameter {
                    name: "target-element-name",
                    description: "The name of the element to emit the signal on",
                    mandatory: true,
                    types: "string",
                    possible_variables: None,
                    default: None,
                },
                ActionParameter {
                    name: "signal-name",
                    description: "The name of the signal to emit",
                    mandatory: true,
                    types: "string",
                    possible_variables: None,
                    default: None,
                },
            ],
            props::execute_emit_signal,
        ),
        core(
            "appsrc-push",
            "Pushes a buffer sourced from a file into an appsrc element; completion is \
             observed at the peer pad so it matches actual downstream acceptance. `size=-1` \
             and an absent `size` both mean the whole file minus `offset`",
            ActionTypeFlags::ASYNC | ActionTypeFlags::INTERLACED,
            vec![
                ActionParameter {
                    name: "target-element-name",
                    description: "The name of the appsrc to push the buffer into",
                    mandatory: true,
                    types: "string",
                    possible_variables: None,
                    default: None,
                },
                ActionParameter {
                    name: "file-name",
                    description: "The file whose bytes become the buffer",
                    mandatory: true,
                    types: "string",
                    possible_variables: None,
                    default: None,
                },
                ActionParameter {
                    name: "offset",
                    description: "Byte offset into the file",
                    mandatory: false,
                    types: "uint64",
                    possible_variables: None,
                    default: Some("0"),
                },
                ActionParameter {
                    name: "size",
                    description: "Number of bytes to push; -1 or absent means the whole file \
                                  minus offset",
                    mandatory: false,
                    types: "int64",
                    possible_variables: None,
                    default: Some("-1"),
                },
                ActionParameter {
                    name: "caps",
                    description: "Caps to set on the appsrc before pushing",
                    mandatory: false,
                    types: "string",
                    possible_variables: None,
                    default: None,
                },
            ],
            appsrc::execute_appsrc_push,
        ),
        core(
            "appsrc-eos",
            "Signals end-of-stream on an appsrc element",
            ActionTypeFlags::empty(),
            vec![ActionParameter {
                name: "target-element-name",
                description: "The name of the appsrc to end",
                mandatory: true,
                types: "string",
                possible_variables: None,
                default: None,
            }],
            appsrc::execute_appsrc_eos,
        ),
        core(
            "flush",
            "Sends flush-start then flush-stop to an element",
            ActionTypeFlags::empty(),
            vec![
                ActionParameter {
                    name: "target-element-name",
                    description: "The name of the element to flush",
                    mandatory: true,
                    types: "string",
                    possible_variables: None,
                    default: None,
                },
                ActionParameter {
                    name: "reset-time",
                    description: "Whether the flush resets running time",
                    mandatory: false,
                    types: "boolean",
                    possible_variables: None,
                    default: Some("true"),
                },
            ],
            appsrc::execute_flush,
        ),
        core(
            "disable-plugin",
            "Removes a plugin from the registry",
            ActionTypeFlags::empty(),
            vec![ActionParameter {
                name: "plugin-name",
                description: "The name of the plugin to remove",
                mandatory: true,
                types: "string",
                possible_variables: None,
                default: None,
            }],
            props::execute_disable_plugin,
        ),
        core(
            "check-last-sample",
            "Checks the SHA-1 of the last sample rendered by a sink against a checksum",
            ActionTypeFlags::INTERLACED,
            vec![
                ActionParameter {
                    name: "sink-name",
                    description: "The name of the sink to check",
                    mandatory: false,
                    types: "string",
                    possible_variables: None,
                    default: None,
                },
                ActionParameter {
                    name: "sink-factory-name",
                    description: "The factory name of the sink to check",
                    mandatory: false,
                    types: "string",
                    possible_variables: None,
                    default: None,
                },
                ActionParameter {
                    name: "sinkpad-caps",
                    description: "The caps negotiated on the sink's pad",
                    mandatory: false,
                    types: "string",
                    possible_variables: None,
                    default: None,
                },
                ActionParameter {
                    name: "checksum",
                    description: "The expected SHA-1 of the last sample's buffer",
                    mandatory: true,
                    types: "string",
                    possible_variables: None,
                    default: None,
                },
            ],
            checks::execute_check_last_sample,
        ),
    ]
}
