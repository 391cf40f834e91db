//! Narrow capability traits for driving an externally-owned media pipeline.
//!
//! The scenario engine's contract with the pipeline is deliberately small:
//! position/duration/latency queries, event sending, state changes, bus
//! subscription, recursive element iteration, pad probes, signal plumbing
//! and property access. Each concern is one trait method so a test harness
//! can provide an in-memory stand-in — see [`mock`] — and run engine tests
//! without a real pipeline.
#![warn(missing_docs)]

mod error;
mod event;
mod message;
pub mod mock;
mod registry;
mod state;
mod traits;

pub use error::{Error, Result};
pub use event::{
    Buffer, BufferFlags, DotDetails, Event, FlowReturn, Latency, Sample, SeekFlags, SeekType,
    StreamInfo, StreamType,
};
pub use message::BusMessage;
pub use registry::FeatureRegistry;
pub use state::{State, StateChange};
pub use traits::{
    ChainWrapper, Element, Pad, Pipeline, PipelineFlavor, ProbeCallback, ProbeData, ProbeId,
    ProbeReturn, ProbeType, SignalCallback, SignalHandlerId,
};
