//! In-memory pipeline used by the engine test suites.
//!
//! [`MockPipeline`] implements the full capability surface with plain
//! state behind mutexes: tests (and embedding hosts prototyping
//! scenarios) construct a pipeline, add [`MockElement`]s with pads and
//! properties, then drive position and data flow by hand. State changes
//! and seeks post the bus messages a real pipeline would, so the engine
//! sees an honest message stream.

use std::{
    collections::HashMap,
    sync::{
        Arc, Weak,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::Duration,
};

use parking_lot::Mutex;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tracing::trace;
use vigil_protocol::Value;

use crate::{
    Buffer, BusMessage, ChainWrapper, DotDetails, Element, Error, Event, FlowReturn, Latency, Pad,
    Pipeline, PipelineFlavor, ProbeCallback, ProbeData, ProbeId, ProbeReturn, ProbeType, Result,
    Sample, SeekType, SignalCallback, SignalHandlerId, State, StateChange, StreamInfo, StreamType,
};

/// A pad with probe and chain-wrapper support.
pub struct MockPad {
    name: String,
    caps: Mutex<Option<String>>,
    peer: Mutex<Option<Weak<MockPad>>>,
    probes: Mutex<Vec<(ProbeId, ProbeType, ProbeCallback)>>,
    chain_wrappers: Mutex<Vec<ChainWrapper>>,
    next_probe: AtomicU64,
}

impl MockPad {
    /// Create an unlinked pad.
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            caps: Mutex::new(None),
            peer: Mutex::new(None),
            probes: Mutex::new(Vec::new()),
            chain_wrappers: Mutex::new(Vec::new()),
            next_probe: AtomicU64::new(1),
        })
    }

    /// Link two pads as peers of each other.
    pub fn link(a: &Arc<Self>, b: &Arc<Self>) {
        *a.peer.lock() = Some(Arc::downgrade(b));
        *b.peer.lock() = Some(Arc::downgrade(a));
    }

    /// Set the negotiated caps.
    pub fn set_caps(&self, caps: impl Into<String>) {
        *self.caps.lock() = Some(caps.into());
    }

    /// Push a buffer "through" this pad: probes fire first, then any
    /// chain wrappers observe the completed chain call.
    pub fn deliver_buffer(&self, buffer: &Buffer) {
        self.run_probes(ProbeType::Buffer, &ProbeData::Buffer(buffer));
        let wrappers: Vec<ChainWrapper> = std::mem::take(&mut *self.chain_wrappers.lock());
        for wrapper in wrappers {
            wrapper(buffer);
        }
    }

    /// Push a downstream event through this pad.
    pub fn deliver_event(&self, event: &Event) {
        self.run_probes(ProbeType::EventDownstream, &ProbeData::Event(event));
    }

    fn run_probes(&self, probe_type: ProbeType, data: &ProbeData<'_>) {
        let mut probes = self.probes.lock();
        probes.retain_mut(|(_, ty, cb)| *ty != probe_type || cb(data) == ProbeReturn::Ok);
    }
}

impl Pad for MockPad {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn peer(&self) -> Option<Arc<dyn Pad>> {
        self.peer
            .lock()
            .as_ref()
            .and_then(Weak::upgrade)
            .map(|p| p as Arc<dyn Pad>)
    }

    fn current_caps(&self) -> Option<String> {
        self.caps.lock().clone()
    }

    fn add_probe(&self, probe_type: ProbeType, callback: ProbeCallback) -> ProbeId {
        let id = self.next_probe.fetch_add(1, Ordering::Relaxed);
        self.probes.lock().push((id, probe_type, callback));
        id
    }

    fn remove_probe(&self, id: ProbeId) {
        self.probes.lock().retain(|(pid, _, _)| *pid != id);
    }

    fn wrap_chain(&self, wrapper: ChainWrapper) {
        self.chain_wrappers.lock().push(wrapper);
    }
}

/// An element with properties, pads, signals and an optional last sample.
pub struct MockElement {
    name: String,
    factory: String,
    klass: String,
    properties: Mutex<HashMap<String, Value>>,
    pads: Mutex<Vec<Arc<MockPad>>>,
    signals: Mutex<Vec<(SignalHandlerId, String, SignalCallback)>>,
    next_signal: AtomicU64,
    emitted: Mutex<Vec<String>>,
    last_sample: Mutex<Option<Sample>>,
    handled_events: Mutex<Vec<Event>>,
    pushed: Mutex<Vec<Buffer>>,
    eos_signalled: AtomicBool,
}

impl MockElement {
    /// Create an element with the given identity.
    pub fn new(
        name: impl Into<String>,
        factory: impl Into<String>,
        klass: impl Into<String>,
    ) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            factory: factory.into(),
            klass: klass.into(),
            properties: Mutex::new(HashMap::new()),
            pads: Mutex::new(Vec::new()),
            signals: Mutex::new(Vec::new()),
            next_signal: AtomicU64::new(1),
            emitted: Mutex::new(Vec::new()),
            last_sample: Mutex::new(None),
            handled_events: Mutex::new(Vec::new()),
            pushed: Mutex::new(Vec::new()),
            eos_signalled: AtomicBool::new(false),
        })
    }

    /// Add a pad to the element.
    pub fn add_pad(&self, pad: Arc<MockPad>) {
        self.pads.lock().push(pad);
    }

    /// Seed a property without going through validation.
    pub fn insert_property(&self, name: impl Into<String>, value: Value) {
        let _ = self.properties.lock().insert(name.into(), value);
    }

    /// Install the sample returned by `last_sample`.
    pub fn set_last_sample(&self, sample: Sample) {
        *self.last_sample.lock() = Some(sample);
    }

    /// Signals emitted so far, in order.
    pub fn emitted_signals(&self) -> Vec<String> {
        self.emitted.lock().clone()
    }

    /// Buffers pushed through `push_buffer`, in order.
    pub fn pushed_buffers(&self) -> Vec<Buffer> {
        self.pushed.lock().clone()
    }

    /// Whether `end_of_stream` has been signalled.
    pub fn saw_eos_signal(&self) -> bool {
        self.eos_signalled.load(Ordering::Relaxed)
    }

    /// Events this element swallowed.
    pub fn handled_events(&self) -> Vec<Event> {
        self.handled_events.lock().clone()
    }

    /// Fire any connected handlers for `signal`, detaching them.
    fn fire_signal(&self, signal: &str) {
        let handlers: Vec<SignalCallback> = {
            let mut signals = self.signals.lock();
            let mut fired = Vec::new();
            let mut kept = Vec::new();
            for (id, name, cb) in signals.drain(..) {
                if name == signal {
                    fired.push(cb);
                } else {
                    kept.push((id, name, cb));
                }
            }
            *signals = kept;
            fired
        };
        for handler in handlers {
            handler();
        }
    }
}

impl Element for MockElement {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn factory_name(&self) -> String {
        self.factory.clone()
    }

    fn klass(&self) -> String {
        self.klass.clone()
    }

    fn set_property(&self, property: &str, value: &Value) -> Result<()> {
        let mut props = self.properties.lock();
        if !props.contains_key(property) {
            return Err(Error::NoSuchProperty {
                element: self.name.clone(),
                property: property.to_string(),
            });
        }
        let _ = props.insert(property.to_string(), value.clone());
        Ok(())
    }

    fn property(&self, property: &str) -> Option<Value> {
        self.properties.lock().get(property).cloned()
    }

    fn static_pad(&self, name: &str) -> Option<Arc<dyn Pad>> {
        self.pads
            .lock()
            .iter()
            .find(|p| p.name == name)
            .map(|p| Arc::clone(p) as Arc<dyn Pad>)
    }

    fn sink_pads(&self) -> Vec<Arc<dyn Pad>> {
        self.pads
            .lock()
            .iter()
            .filter(|p| p.name.starts_with("sink"))
            .map(|p| Arc::clone(p) as Arc<dyn Pad>)
            .collect()
    }

    fn send_event(&self, event: Event) -> bool {
        self.handled_events.lock().push(event);
        true
    }

    fn emit_signal(&self, signal: &str) -> Result<()> {
        self.emitted.lock().push(signal.to_string());
        self.fire_signal(signal);
        Ok(())
    }

    fn connect_signal_once(
        &self,
        signal: &str,
        callback: SignalCallback,
    ) -> Result<SignalHandlerId> {
        let id = self.next_signal.fetch_add(1, Ordering::Relaxed);
        self.signals.lock().push((id, signal.to_string(), callback));
        Ok(id)
    }

    fn disconnect_signal(&self, id: SignalHandlerId) {
        self.signals.lock().retain(|(sid, _, _)| *sid != id);
    }

    fn last_sample(&self) -> Option<Sample> {
        self.last_sample.lock().clone()
    }

    fn push_buffer(&self, buffer: Buffer) -> Result<FlowReturn> {
        self.pushed.lock().push(buffer.clone());
        // Route through the peer so its probes and chain wrappers see the
        // buffer like a real chain call would.
        let peer = self
            .pads
            .lock()
            .iter()
            .find(|p| p.name == "src")
            .and_then(|src| src.peer.lock().clone())
            .and_then(|weak| weak.upgrade());
        match peer {
            Some(peer) => {
                peer.deliver_buffer(&buffer);
                Ok(FlowReturn::Ok)
            }
            None => Ok(FlowReturn::NotLinked),
        }
    }

    fn end_of_stream(&self) -> Result<FlowReturn> {
        self.eos_signalled.store(true, Ordering::Relaxed);
        self.emitted.lock().push("end-of-stream".to_string());
        Ok(FlowReturn::Ok)
    }

    fn set_caps(&self, caps: &str) -> Result<()> {
        let _ = self
            .properties
            .lock()
            .insert("caps".to_string(), Value::Str(caps.to_string()));
        Ok(())
    }
}

/// Internal mutable pipeline state.
struct PipelineState {
    current: State,
    pending: Option<State>,
}

/// An in-memory pipeline.
pub struct MockPipeline {
    name: String,
    flavor: PipelineFlavor,
    properties: Mutex<HashMap<String, Value>>,
    state: Mutex<PipelineState>,
    position: Mutex<Option<Duration>>,
    duration: Mutex<Option<Duration>>,
    rate: Mutex<f64>,
    latency: Mutex<Option<Latency>>,
    async_state_changes: AtomicBool,
    fail_next_state_change: AtomicBool,
    accept_seeks: AtomicBool,
    seeks_never_settle: AtomicBool,
    elements: Mutex<Vec<Arc<MockElement>>>,
    streams: Mutex<Vec<StreamInfo>>,
    selected: Mutex<Vec<StreamInfo>>,
    track_pads: Mutex<HashMap<(StreamType, i32), Arc<MockPad>>>,
    subscribers: Mutex<Vec<UnboundedSender<BusMessage>>>,
    dot_dumps: Mutex<Vec<String>>,
    sent_events: Mutex<Vec<Event>>,
}

impl MockPipeline {
    /// Create a pipeline with the given name and default behavior:
    /// synchronous state changes, seeks accepted, no media loaded.
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Self::build(name, PipelineFlavor::Plain)
    }

    /// Create a stream-aware (`playbin3`-flavored) pipeline.
    pub fn new_playbin3(name: impl Into<String>) -> Arc<Self> {
        Self::build(name, PipelineFlavor::Playbin3)
    }

    /// Create a `playbin`-flavored pipeline (flags/current-* properties).
    pub fn new_playbin(name: impl Into<String>) -> Arc<Self> {
        Self::build(name, PipelineFlavor::Playbin)
    }

    fn build(name: impl Into<String>, flavor: PipelineFlavor) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            flavor,
            properties: Mutex::new(HashMap::new()),
            state: Mutex::new(PipelineState {
                current: State::Null,
                pending: None,
            }),
            position: Mutex::new(None),
            duration: Mutex::new(None),
            rate: Mutex::new(1.0),
            latency: Mutex::new(None),
            async_state_changes: AtomicBool::new(false),
            fail_next_state_change: AtomicBool::new(false),
            accept_seeks: AtomicBool::new(true),
            seeks_never_settle: AtomicBool::new(false),
            elements: Mutex::new(Vec::new()),
            streams: Mutex::new(Vec::new()),
            selected: Mutex::new(Vec::new()),
            track_pads: Mutex::new(HashMap::new()),
            subscribers: Mutex::new(Vec::new()),
            dot_dumps: Mutex::new(Vec::new()),
            sent_events: Mutex::new(Vec::new()),
        })
    }

    /// Make subsequent `set_state` calls complete asynchronously: the
    /// call returns [`StateChange::Async`] and the matching
    /// `state-changed` + `async-done` messages are queued on the bus.
    pub fn set_async_state_changes(&self, on: bool) {
        self.async_state_changes.store(on, Ordering::Relaxed);
    }

    /// Make the next `set_state` call fail.
    pub fn fail_next_state_change(&self) {
        self.fail_next_state_change.store(true, Ordering::Relaxed);
    }

    /// Refuse (or accept again) seek events.
    pub fn set_accept_seeks(&self, on: bool) {
        self.accept_seeks.store(on, Ordering::Relaxed);
    }

    /// Accept seeks without ever posting the `async-done` that settles
    /// them (a pipeline that swallows the seek).
    pub fn set_seeks_never_settle(&self, on: bool) {
        self.seeks_never_settle.store(on, Ordering::Relaxed);
    }

    /// Load "media": sets duration and rewinds to zero.
    pub fn set_media(&self, duration: Duration) {
        *self.duration.lock() = Some(duration);
        *self.position.lock() = Some(Duration::ZERO);
    }

    /// Force the reported position.
    pub fn set_position(&self, position: Duration) {
        *self.position.lock() = Some(position);
    }

    /// Advance the reported position by `delta` (test clock).
    pub fn advance(&self, delta: Duration) {
        let mut pos = self.position.lock();
        if let Some(p) = pos.as_mut() {
            *p += delta;
        }
    }

    /// Install the latency reported by `query_latency`.
    pub fn set_latency(&self, latency: Latency) {
        *self.latency.lock() = Some(latency);
    }

    /// Add an element to the (flat) graph and announce it on the bus.
    pub fn add_element(&self, element: Arc<MockElement>) {
        let name = element.name();
        self.elements.lock().push(element);
        self.post(BusMessage::ElementAdded { name });
    }

    /// Install the stream collection and initial selection.
    pub fn set_streams(&self, collection: Vec<StreamInfo>, selected: Vec<StreamInfo>) {
        *self.streams.lock() = collection;
        *self.selected.lock() = selected;
    }

    /// Register the combiner pad for a playbin-style track.
    pub fn set_track_pad(&self, track_type: StreamType, index: i32, pad: Arc<MockPad>) {
        let _ = self.track_pads.lock().insert((track_type, index), pad);
    }

    /// Seed a pipeline-level property (playbin `flags`, `n-audio`, ...).
    pub fn insert_property(&self, name: impl Into<String>, value: Value) {
        let _ = self.properties.lock().insert(name.into(), value);
    }

    /// Names passed to `dump_dot` so far.
    pub fn dot_dumps(&self) -> Vec<String> {
        self.dot_dumps.lock().clone()
    }

    /// Every event sent to the pipeline, in order.
    pub fn sent_events(&self) -> Vec<Event> {
        self.sent_events.lock().clone()
    }

    fn apply_seek(&self, event: &Event) {
        let Event::Seek {
            rate,
            start_type,
            start,
            ..
        } = event
        else {
            return;
        };
        *self.rate.lock() = *rate;
        if *start_type == SeekType::Set
            && let Some(start) = start
        {
            *self.position.lock() = Some(*start);
        }
    }
}

impl Element for MockPipeline {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn factory_name(&self) -> String {
        match self.flavor {
            PipelineFlavor::Plain => "pipeline".to_string(),
            PipelineFlavor::Playbin => "playbin".to_string(),
            PipelineFlavor::Playbin3 => "playbin3".to_string(),
        }
    }

    fn klass(&self) -> String {
        "Generic/Bin".to_string()
    }

    fn set_property(&self, property: &str, value: &Value) -> Result<()> {
        let mut props = self.properties.lock();
        if !props.contains_key(property) {
            return Err(Error::NoSuchProperty {
                element: self.name.clone(),
                property: property.to_string(),
            });
        }
        let _ = props.insert(property.to_string(), value.clone());
        Ok(())
    }

    fn property(&self, property: &str) -> Option<Value> {
        self.properties.lock().get(property).cloned()
    }

    fn static_pad(&self, _name: &str) -> Option<Arc<dyn Pad>> {
        None
    }

    fn sink_pads(&self) -> Vec<Arc<dyn Pad>> {
        Vec::new()
    }

    fn send_event(&self, event: Event) -> bool {
        self.sent_events.lock().push(event.clone());
        match &event {
            Event::Seek { .. } => {
                if !self.accept_seeks.load(Ordering::Relaxed) {
                    return false;
                }
                self.apply_seek(&event);
                if !self.seeks_never_settle.load(Ordering::Relaxed) {
                    self.post(BusMessage::AsyncDone);
                }
                true
            }
            Event::Eos => {
                self.post(BusMessage::Eos);
                true
            }
            Event::SelectStreams { streams } => {
                let collection = self.streams.lock().clone();
                let new_selected: Vec<StreamInfo> = collection
                    .into_iter()
                    .filter(|s| streams.contains(&s.id))
                    .collect();
                *self.selected.lock() = new_selected.clone();
                self.post(BusMessage::StreamsSelected {
                    streams: new_selected,
                });
                true
            }
            Event::FlushStart | Event::FlushStop { .. } | Event::StreamStart { .. } => true,
        }
    }

    fn emit_signal(&self, signal: &str) -> Result<()> {
        trace!(pipeline = %self.name, signal, "emit_signal on pipeline");
        Ok(())
    }

    fn connect_signal_once(
        &self,
        _signal: &str,
        _callback: SignalCallback,
    ) -> Result<SignalHandlerId> {
        Err(Error::Unsupported("connect-signal"))
    }

    fn disconnect_signal(&self, _id: SignalHandlerId) {}
}

impl Pipeline for MockPipeline {
    fn flavor(&self) -> PipelineFlavor {
        self.flavor
    }

    fn state(&self) -> State {
        self.state.lock().current
    }

    fn pending_state(&self) -> Option<State> {
        self.state.lock().pending
    }

    fn set_state(&self, state: State) -> StateChange {
        if self.fail_next_state_change.swap(false, Ordering::Relaxed) {
            return StateChange::Failure;
        }
        let old = {
            let mut guard = self.state.lock();
            let old = guard.current;
            guard.current = state;
            guard.pending = None;
            old
        };
        self.post(BusMessage::StateChanged {
            from_pipeline: true,
            old,
            new: state,
            pending: None,
        });
        if self.async_state_changes.load(Ordering::Relaxed) {
            self.post(BusMessage::AsyncDone);
            StateChange::Async
        } else {
            StateChange::Success
        }
    }

    fn query_position(&self) -> Option<Duration> {
        *self.position.lock()
    }

    fn query_duration(&self) -> Option<Duration> {
        *self.duration.lock()
    }

    fn query_segment_rate(&self) -> f64 {
        *self.rate.lock()
    }

    fn query_latency(&self) -> Option<Latency> {
        *self.latency.lock()
    }

    fn post(&self, message: BusMessage) {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| tx.send(message.clone()).is_ok());
    }

    fn subscribe(&self) -> UnboundedReceiver<BusMessage> {
        let (tx, rx) = unbounded_channel();
        self.subscribers.lock().push(tx);
        rx
    }

    fn elements(&self) -> Vec<Arc<dyn Element>> {
        self.elements
            .lock()
            .iter()
            .map(|e| Arc::clone(e) as Arc<dyn Element>)
            .collect()
    }

    fn by_name(&self, name: &str) -> Option<Arc<dyn Element>> {
        self.elements
            .lock()
            .iter()
            .find(|e| e.name == name)
            .map(|e| Arc::clone(e) as Arc<dyn Element>)
    }

    fn dump_dot(&self, name: &str, _details: DotDetails) {
        self.dot_dumps.lock().push(name.to_string());
    }

    fn stream_collection(&self) -> Vec<StreamInfo> {
        self.streams.lock().clone()
    }

    fn selected_streams(&self) -> Vec<StreamInfo> {
        self.selected.lock().clone()
    }

    fn track_pad(&self, track_type: StreamType, index: i32) -> Option<Arc<dyn Pad>> {
        self.track_pads
            .lock()
            .get(&(track_type, index))
            .map(|p| Arc::clone(p) as Arc<dyn Pad>)
    }
}

/// A feature registry backed by a map, for config-action tests.
#[derive(Default)]
pub struct MockRegistry {
    ranks: Mutex<HashMap<String, u32>>,
    removed: Mutex<Vec<String>>,
}

impl MockRegistry {
    /// Create a registry that knows the given feature names.
    pub fn with_features(features: &[&str]) -> Arc<Self> {
        let registry = Self::default();
        {
            let mut ranks = registry.ranks.lock();
            for feature in features {
                let _ = ranks.insert((*feature).to_string(), 128);
            }
        }
        Arc::new(registry)
    }

    /// Current rank of a feature.
    pub fn rank(&self, name: &str) -> Option<u32> {
        self.ranks.lock().get(name).copied()
    }

    /// Plugins removed so far.
    pub fn removed(&self) -> Vec<String> {
        self.removed.lock().clone()
    }
}

impl crate::FeatureRegistry for MockRegistry {
    fn set_rank(&self, name: &str, rank: u32) -> bool {
        let mut ranks = self.ranks.lock();
        match ranks.get_mut(name) {
            Some(slot) => {
                *slot = rank;
                true
            }
            None => false,
        }
    }

    fn remove_plugin(&self, name: &str) -> bool {
        let known = self.ranks.lock().remove(name).is_some();
        if known {
            self.removed.lock().push(name.to_string());
        }
        known
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SeekFlags;

    #[test]
    fn state_changes_post_messages() {
        let pipeline = MockPipeline::new("p");
        let mut bus = pipeline.subscribe();

        assert_eq!(pipeline.set_state(State::Paused), StateChange::Success);
        match bus.try_recv().unwrap() {
            BusMessage::StateChanged { old, new, .. } => {
                assert_eq!(old, State::Null);
                assert_eq!(new, State::Paused);
            }
            other => panic!("unexpected message {:?}", other),
        }

        pipeline.set_async_state_changes(true);
        assert_eq!(pipeline.set_state(State::Playing), StateChange::Async);
        assert!(matches!(
            bus.try_recv().unwrap(),
            BusMessage::StateChanged { .. }
        ));
        assert!(matches!(bus.try_recv().unwrap(), BusMessage::AsyncDone));
    }

    #[test]
    fn seek_updates_position_and_posts_async_done() {
        let pipeline = MockPipeline::new("p");
        pipeline.set_media(Duration::from_secs(10));
        let mut bus = pipeline.subscribe();

        let handled = pipeline.send_event(Event::Seek {
            rate: 1.0,
            flags: SeekFlags::FLUSH | SeekFlags::ACCURATE,
            start_type: SeekType::Set,
            start: Some(Duration::from_secs(5)),
            stop_type: SeekType::None,
            stop: None,
        });
        assert!(handled);
        assert_eq!(pipeline.query_position(), Some(Duration::from_secs(5)));
        assert!(matches!(bus.try_recv().unwrap(), BusMessage::AsyncDone));

        pipeline.set_accept_seeks(false);
        assert!(!pipeline.send_event(Event::Seek {
            rate: 1.0,
            flags: SeekFlags::empty(),
            start_type: SeekType::Set,
            start: Some(Duration::ZERO),
            stop_type: SeekType::None,
            stop: None,
        }));
    }

    #[test]
    fn probes_and_chain_wrappers_fire() {
        let src = MockPad::new("src");
        let sink = MockPad::new("sink");
        MockPad::link(&src, &sink);

        let hits = Arc::new(AtomicU64::new(0));
        let hits_probe = Arc::clone(&hits);
        let _ = sink.add_probe(
            ProbeType::Buffer,
            Box::new(move |_| {
                let _ = hits_probe.fetch_add(1, Ordering::Relaxed);
                ProbeReturn::Remove
            }),
        );
        let hits_chain = Arc::clone(&hits);
        sink.wrap_chain(Box::new(move |_| {
            let _ = hits_chain.fetch_add(10, Ordering::Relaxed);
        }));

        sink.deliver_buffer(&Buffer::from_bytes(vec![1, 2, 3]));
        assert_eq!(hits.load(Ordering::Relaxed), 11);

        // Probe removed itself, wrapper was one-shot.
        sink.deliver_buffer(&Buffer::from_bytes(vec![4]));
        assert_eq!(hits.load(Ordering::Relaxed), 11);
    }

    #[test]
    fn select_streams_narrows_selection() {
        let pipeline = MockPipeline::new_playbin3("p");
        pipeline.set_streams(
            vec![
                StreamInfo::new("a0", StreamType::Audio),
                StreamInfo::new("a1", StreamType::Audio),
                StreamInfo::new("v0", StreamType::Video),
            ],
            vec![
                StreamInfo::new("a0", StreamType::Audio),
                StreamInfo::new("v0", StreamType::Video),
            ],
        );
        let mut bus = pipeline.subscribe();

        assert!(pipeline.send_event(Event::SelectStreams {
            streams: vec!["a1".into(), "v0".into()],
        }));
        match bus.try_recv().unwrap() {
            BusMessage::StreamsSelected { streams } => {
                let ids: Vec<&str> = streams.iter().map(|s| s.id.as_str()).collect();
                assert_eq!(ids, vec!["a1", "v0"]);
            }
            other => panic!("unexpected message {:?}", other),
        }
    }

    #[test]
    fn signals_are_one_shot() {
        let element = MockElement::new("src0", "appsrc", "Source/Generic");
        let fired = Arc::new(AtomicU64::new(0));
        let fired_cb = Arc::clone(&fired);
        let _ = element
            .connect_signal_once("need-data", Box::new(move || {
                let _ = fired_cb.fetch_add(1, Ordering::Relaxed);
            }))
            .unwrap();

        element.emit_signal("need-data").unwrap();
        element.emit_signal("need-data").unwrap();
        assert_eq!(fired.load(Ordering::Relaxed), 1);
    }
}
