//! Reduction of pipeline bus messages into engine state.

use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info};
use vigil_pipeline::{BusMessage, Element, State, StreamInfo};
use vigil_protocol::Structure;
use vigil_report::{Reporter, issue::ids};

use crate::{
    Action, ActionState, ActionTypeFlags, Scenario,
    scenario::EngineMsg,
    types,
};

/// Whether an action requests a pipeline state when executed.
fn action_sets_state(action: &Action) -> bool {
    matches!(action.type_name(), "set-state" | "play" | "pause")
}

impl Scenario {
    /// Reduce one bus message. `rx` is the engine control channel, used
    /// to drain in-flight completions before terminal diagnostics.
    pub(crate) fn handle_bus_message(
        &mut self,
        message: BusMessage,
        rx: &mut UnboundedReceiver<EngineMsg>,
    ) {
        match &message {
            BusMessage::AsyncDone => self.handle_async_done(),
            BusMessage::StateChanged {
                from_pipeline,
                old,
                new,
                ..
            } if *from_pipeline => self.handle_state_changed(*old, *new),
            BusMessage::Eos => {
                self.handle_terminal(false, rx);
            }
            BusMessage::Error { message } => {
                debug!("error on the bus: {}", message);
                self.handle_terminal(true, rx);
            }
            BusMessage::Buffering { percent } => {
                self.buffering = *percent < 100;
                if !self.buffering {
                    self.execute_next_action();
                }
            }
            BusMessage::StreamsSelected { streams } => self.handle_streams_selected(streams),
            BusMessage::Latency => self.check_latency(),
            BusMessage::Qos { dropped } => {
                if let Some(dropped) = dropped {
                    self.dropped = Some(*dropped);
                }
            }
            BusMessage::ElementAdded { name } => {
                let name = name.clone();
                self.handle_element_added(&name);
            }
            _ => {}
        }

        self.check_message_wait(&message);
    }

    /// Unpark a `wait, message-type=...` action matching this message.
    fn check_message_wait(&mut self, message: &BusMessage) {
        let matches = self
            .message_wait
            .as_deref()
            .map(|wanted| wanted == message.type_name())
            .unwrap_or(false);
        if !matches {
            return;
        }
        self.message_wait = None;
        self.runner().sink().write_text("Stop waiting for message\n");
        if let Some(id) = self.actions.front().map(Action::number) {
            self.handle_action_done(id);
        }
        self.execute_next_action();
    }

    fn handle_async_done(&mut self) {
        self.tick_started = true;
        if let Some(seek) = self.last_seek.take() {
            self.update_segment_from_seek(&seek);
            if self.target_state == State::Paused {
                self.seeked_in_pause = true;
            }
            if let Some(id) = self.actions.front().map(Action::number) {
                self.handle_action_done(id);
            }
        } else if self.needs_async_done {
            self.needs_async_done = false;
            let head_completes = self
                .actions
                .front()
                .map(|a| action_sets_state(a) && a.state() == ActionState::Async)
                .unwrap_or(false);
            if head_completes && !self.changing_state {
                if let Some(id) = self.actions.front().map(Action::number) {
                    self.handle_action_done(id);
                }
            }
        }
        self.execute_next_action();
    }

    fn handle_state_changed(&mut self, old: State, new: State) {
        self.tick_started = true;
        if self.changing_state && self.target_state == new {
            self.changing_state = false;
            let head_completes = self
                .actions
                .front()
                .map(|a| action_sets_state(a) && a.state() == ActionState::Async)
                .unwrap_or(false);
            if head_completes && !self.needs_async_done {
                if let Some(id) = self.actions.front().map(Action::number) {
                    self.handle_action_done(id);
                }
            }
        }

        if old == State::Ready && new == State::Paused {
            self.execute_next_action();
        }
        // A pipeline only re-posts latency when reaching PLAYING under
        // async handling, so check it explicitly here.
        if new == State::Playing {
            self.check_latency();
        }
    }

    /// The EOS / error termination path.
    ///
    /// Completions posted by pipeline threads before this message must
    /// settle first, or an action that actually finished would show up
    /// in the leftover diagnostic; draining the control channel here is
    /// the channelized equivalent of the EOS-handling lock.
    fn handle_terminal(&mut self, is_error: bool, rx: &mut UnboundedReceiver<EngineMsg>) {
        let mut backlog = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            match msg {
                EngineMsg::ActionDone { id } => self.handle_action_done(id),
                other => backlog.push(other),
            }
        }

        if !is_error {
            self.got_eos = true;
            if self.message_wait.is_some() {
                if self.actions.len() > 1 {
                    debug!("waiting for a message with further actions queued, letting it a chance");
                    for msg in backlog {
                        self.handle_engine_msg(msg);
                    }
                    return;
                }
                // The last action waits for a message; EOS itself may be
                // the one it wants.
                self.check_message_wait(&BusMessage::Eos);
            }
        }

        let leftovers = self.collect_leftovers();
        if !leftovers.is_empty() {
            let position = self
                .pipeline()
                .and_then(|p| p.query_position())
                .map(|p| format!("{:.3}s", p.as_secs_f64()))
                .unwrap_or_else(|| "unknown".to_string());
            let listing: String = leftovers
                .iter()
                .map(|s| format!("\n{:20}{}", "", s))
                .collect();
            self.report(
                ids::SCENARIO_NOT_ENDED,
                format!(
                    "{} actions were not executed: {} (position: {})",
                    leftovers.len(),
                    listing,
                    position
                ),
            );
        }

        debug!("got EOS; generating 'stop' action");
        self.synthesize_stop();

        for msg in backlog {
            self.handle_engine_msg(msg);
        }
    }

    /// Drain every queue, keeping descriptions of actions whose
    /// non-execution is a defect.
    fn collect_leftovers(&mut self) -> Vec<String> {
        let mut leftovers = Vec::new();
        let drained: Vec<Action> = self
            .actions
            .drain(..)
            .chain(self.interlaced.drain(..))
            .chain(self.on_addition.drain(..))
            .collect();
        for action in drained {
            let flags = types::find(action.type_name())
                .map(|t| t.flags)
                .unwrap_or_default();
            if flags.contains(ActionTypeFlags::NO_EXECUTION_NOT_FATAL)
                || action.state() == ActionState::Ok
                || action.optional
            {
                continue;
            }
            leftovers.push(action.structure().to_string());
        }
        leftovers
    }

    /// Build and execute the synthesized `stop` action.
    fn synthesize_stop(&mut self) {
        let structure = match Structure::parse("stop, generated-after-eos=true;") {
            Ok(structure) => structure,
            Err(e) => {
                tracing::error!("could not build the synthesized stop action: {}", e);
                self.stopped = true;
                return;
            }
        };
        let number = self.next_action_number();
        let mut stop = Action::new(structure, number);
        let _ = self.execute_action(&mut stop);
    }

    fn handle_streams_selected(&mut self, streams: &[StreamInfo]) {
        info!(count = streams.len(), "streams selected");
        let Some((id, expected)) = self.pending_switch_track.take() else {
            return;
        };

        if expected.len() != streams.len() {
            self.report(
                ids::SCENARIO_ACTION_EXECUTION_ERROR,
                format!(
                    "Was expecting {} selected streams but got {}",
                    expected.len(),
                    streams.len()
                ),
            );
        } else {
            for stream_id in &expected {
                if !streams.iter().any(|s| &s.id == stream_id) {
                    self.report(
                        ids::SCENARIO_ACTION_EXECUTION_ERROR,
                        format!("Stream {} has not been activated", stream_id),
                    );
                }
            }
        }
        self.handle_action_done(id);
    }

    /// Run matching on-addition actions for a newly-appeared element.
    fn handle_element_added(&mut self, name: &str) {
        let Some(pipeline) = self.pipeline() else {
            return;
        };
        let Some(element) = pipeline.by_name(name) else {
            return;
        };

        let mut index = 0;
        while index < self.on_addition.len() {
            let runnable = {
                let action = &self.on_addition[index];
                action.playback_time().is_none()
                    && action.type_name() == "set-property"
                    && element_matches_target(element.as_ref(), action.structure())
            };
            if !runnable {
                index += 1;
                continue;
            }
            let mut action = self.on_addition.remove(index);
            debug!(action = %action.structure(), element = name, "executing on-addition action");
            let result = self.execute_action(&mut action);
            if result == crate::ExecuteResult::Error {
                // Keep it around; a later element may satisfy it.
                self.on_addition.insert(index, action);
                index += 1;
            }
        }
        self.check_done();
    }
}

/// Whether an element matches an action's target description
/// (`target-element-name`, `target-element-klass`,
/// `target-element-factory-name`).
pub(crate) fn element_matches_target(element: &dyn Element, structure: &Structure) -> bool {
    if let Some(name) = structure.get_str("target-element-name") {
        if element.name() == name {
            return true;
        }
    }
    if let Some(klass) = structure.get_str("target-element-klass") {
        if element_has_klass(element, klass) {
            return true;
        }
    }
    if let Some(factory) = structure.get_str("target-element-factory-name") {
        if element.factory_name() == factory {
            return true;
        }
    }
    false
}

/// Whether every `/`-separated part of `klass` appears in the element's
/// klass metadata.
pub(crate) fn element_has_klass(element: &dyn Element, klass: &str) -> bool {
    let element_klass = element.klass();
    let have: Vec<&str> = element_klass.split('/').collect();
    klass.split('/').all(|wanted| have.contains(&wanted))
}
