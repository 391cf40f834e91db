//! The capability traits the engine drives a pipeline through.

use std::{sync::Arc, time::Duration};

use tokio::sync::mpsc::UnboundedReceiver;
use vigil_protocol::Value;

use crate::{
    Buffer, BusMessage, DotDetails, Event, Latency, Result, Sample, State, StateChange, StreamInfo,
    StreamType,
};

/// Identifier of an installed pad probe.
pub type ProbeId = u64;

/// Identifier of a connected signal handler.
pub type SignalHandlerId = u64;

/// What a probe observes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeType {
    /// Buffers flowing through the pad.
    Buffer,
    /// Downstream events flowing through the pad.
    EventDownstream,
}

/// Data handed to a probe callback.
#[derive(Debug)]
pub enum ProbeData<'a> {
    /// A buffer passed the pad.
    Buffer(&'a Buffer),
    /// An event passed the pad.
    Event(&'a Event),
}

/// Whether a probe stays installed after firing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeReturn {
    /// Keep the probe.
    Ok,
    /// Remove the probe.
    Remove,
}

/// Callback invoked from pipeline streaming threads.
///
/// Probes must never run engine logic directly; completion is signalled
/// back through the engine's control channel.
pub type ProbeCallback = Box<dyn FnMut(&ProbeData<'_>) -> ProbeReturn + Send>;

/// One-shot signal handler.
pub type SignalCallback = Box<dyn FnOnce() + Send>;

/// One-shot chain wrapper: runs when the pad accepts its next buffer,
/// after the downstream chain call returned.
pub type ChainWrapper = Box<dyn FnOnce(&Buffer) + Send>;

/// A pad on an element.
pub trait Pad: Send + Sync {
    /// Pad name (`src`, `sink`, `sink_0`, ...).
    fn name(&self) -> String;

    /// The linked peer pad, if any.
    fn peer(&self) -> Option<Arc<dyn Pad>>;

    /// Currently negotiated caps, serialized.
    fn current_caps(&self) -> Option<String>;

    /// Install a probe; the callback may fire on any streaming thread.
    fn add_probe(&self, probe_type: ProbeType, callback: ProbeCallback) -> ProbeId;

    /// Remove a probe installed with [`Pad::add_probe`].
    fn remove_probe(&self, id: ProbeId);

    /// Install a one-shot chain wrapper observing actual downstream
    /// acceptance of the next buffer.
    fn wrap_chain(&self, wrapper: ChainWrapper);
}

/// An element inside the pipeline.
pub trait Element: Send + Sync {
    /// Instance name.
    fn name(&self) -> String;

    /// Factory the element was created from.
    fn factory_name(&self) -> String;

    /// Slash-separated klass metadata (`Source/File`, `Sink/Video`, ...).
    fn klass(&self) -> String;

    /// Write a property.
    fn set_property(&self, property: &str, value: &Value) -> Result<()>;

    /// Read a property back.
    fn property(&self, property: &str) -> Option<Value>;

    /// Look up a static pad by name.
    fn static_pad(&self, name: &str) -> Option<Arc<dyn Pad>>;

    /// All sink pads, in pad order.
    fn sink_pads(&self) -> Vec<Arc<dyn Pad>>;

    /// Send an event to this element. Returns false when unhandled.
    fn send_event(&self, event: Event) -> bool;

    /// Emit an argument-less signal by name.
    fn emit_signal(&self, signal: &str) -> Result<()>;

    /// Connect a one-shot handler; it detaches after firing.
    fn connect_signal_once(&self, signal: &str, callback: SignalCallback)
    -> Result<SignalHandlerId>;

    /// Detach a handler that has not fired yet.
    fn disconnect_signal(&self, id: SignalHandlerId);

    /// The last sample a sink has rendered, when the element keeps one.
    fn last_sample(&self) -> Option<Sample> {
        None
    }

    /// Push a buffer into an app-source element.
    fn push_buffer(&self, buffer: Buffer) -> Result<crate::FlowReturn> {
        let _ = buffer;
        Err(crate::Error::Unsupported("push-buffer"))
    }

    /// Signal end-of-stream on an app-source element.
    fn end_of_stream(&self) -> Result<crate::FlowReturn> {
        Err(crate::Error::Unsupported("end-of-stream"))
    }

    /// Override the element's output caps (app-source elements).
    fn set_caps(&self, caps: &str) -> Result<()> {
        let _ = caps;
        Err(crate::Error::Unsupported("set-caps"))
    }
}

/// How the pipeline exposes track switching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PipelineFlavor {
    /// A plain pipeline; tracks switch through input-selector elements.
    #[default]
    Plain,
    /// A playbin-style pipeline driven by flags/current-* properties.
    Playbin,
    /// A stream-aware pipeline driven by select-streams events.
    Playbin3,
}

/// The pipeline itself. A pipeline is also an element (it has a name and
/// properties of its own, and events can be sent to it).
pub trait Pipeline: Element {
    /// How track switching works on this pipeline.
    fn flavor(&self) -> PipelineFlavor {
        PipelineFlavor::Plain
    }

    /// Current state.
    fn state(&self) -> State;

    /// State still being transitioned to, if any.
    fn pending_state(&self) -> Option<State>;

    /// Request a state change.
    fn set_state(&self, state: State) -> StateChange;

    /// Current stream position.
    fn query_position(&self) -> Option<Duration>;

    /// Total stream duration.
    fn query_duration(&self) -> Option<Duration>;

    /// Playback rate of the current segment.
    fn query_segment_rate(&self) -> f64 {
        1.0
    }

    /// Current pipeline latency.
    fn query_latency(&self) -> Option<Latency>;

    /// Post a message on the bus on behalf of the engine.
    fn post(&self, message: BusMessage);

    /// Subscribe to the bus. Every subscriber sees every message.
    fn subscribe(&self) -> UnboundedReceiver<BusMessage>;

    /// All elements, recursively.
    fn elements(&self) -> Vec<Arc<dyn Element>>;

    /// Look up an element by instance name, recursively.
    fn by_name(&self, name: &str) -> Option<Arc<dyn Element>>;

    /// Write a topology snapshot named `name` to the dot-dump directory.
    fn dump_dot(&self, name: &str, details: DotDetails);

    /// The full stream collection, when the pipeline is stream-aware.
    fn stream_collection(&self) -> Vec<StreamInfo> {
        Vec::new()
    }

    /// The currently selected streams, when the pipeline is stream-aware.
    fn selected_streams(&self) -> Vec<StreamInfo> {
        Vec::new()
    }

    /// The combiner pad for track `index` of `track_type` (playbin-style
    /// pipelines; `get-audio-pad` and friends).
    fn track_pad(&self, track_type: StreamType, index: i32) -> Option<Arc<dyn Pad>> {
        let _ = (track_type, index);
        None
    }
}
