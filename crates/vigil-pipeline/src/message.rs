//! Messages delivered on the pipeline bus.

use std::time::Duration;

use crate::{State, StreamInfo};

/// A message posted on the pipeline bus.
///
/// The scenario engine subscribes to the bus and reduces these into
/// engine state transitions; `wait, message-type=...` actions match on
/// [`BusMessage::type_name`].
#[derive(Debug, Clone, PartialEq)]
pub enum BusMessage {
    /// A state change or seek has fully settled.
    AsyncDone,
    /// A state transition completed somewhere in the pipeline.
    StateChanged {
        /// True when the pipeline itself (not a child) changed state.
        from_pipeline: bool,
        /// Previous state.
        old: State,
        /// New state.
        new: State,
        /// Remaining pending state, if the transition continues.
        pending: Option<State>,
    },
    /// End of stream reached.
    Eos,
    /// A fatal error was posted.
    Error {
        /// Human-readable error text.
        message: String,
    },
    /// Buffering progress.
    Buffering {
        /// Fill level, 0-100.
        percent: u8,
    },
    /// A new set of streams was selected.
    StreamsSelected {
        /// The selected streams.
        streams: Vec<StreamInfo>,
    },
    /// The pipeline latency changed and should be re-queried.
    Latency,
    /// Quality-of-service statistics.
    Qos {
        /// Total dropped buffers, when known.
        dropped: Option<u64>,
    },
    /// Someone asks the host to move the pipeline to a state.
    RequestState {
        /// The requested state.
        state: State,
    },
    /// An element appeared in the pipeline (recursively).
    ElementAdded {
        /// Name of the new element.
        name: String,
    },
    /// A stream-position update (informational).
    Position {
        /// Current position.
        position: Duration,
    },
}

impl BusMessage {
    /// The symbolic message name used by message-type waits.
    pub fn type_name(&self) -> &'static str {
        match self {
            BusMessage::AsyncDone => "async-done",
            BusMessage::StateChanged { .. } => "state-changed",
            BusMessage::Eos => "eos",
            BusMessage::Error { .. } => "error",
            BusMessage::Buffering { .. } => "buffering",
            BusMessage::StreamsSelected { .. } => "streams-selected",
            BusMessage::Latency => "latency",
            BusMessage::Qos { .. } => "qos",
            BusMessage::RequestState { .. } => "request-state",
            BusMessage::ElementAdded { .. } => "element-added",
            BusMessage::Position { .. } => "position",
        }
    }
}
