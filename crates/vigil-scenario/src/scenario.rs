//! The scenario object and its execution engine.
//!
//! The engine is single-task cooperative: the tick, action dispatch, bus
//! reduction and every `set_done` all run inside [`Scenario::run`]'s
//! select loop. Pipeline worker threads (probes, chain wrappers, signal
//! handlers, timers) never touch engine state; they signal completion
//! through a [`ScenarioHandle`], which enqueues onto the engine task.

use std::{
    collections::VecDeque,
    sync::{Arc, Weak},
    time::Duration,
};

use tokio::{
    sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel},
    time::{Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use vigil_pipeline::{BusMessage, Pipeline, SeekFlags, SeekType, State};
use vigil_protocol::{ActionDoneFrame, ActionFrame, Structure, Value};
use vigil_report::{Reporter, Runner, issue::ids};

use crate::{
    Action, ActionState, ActionTypeFlags, Error, ExecuteResult, Result, loader, types,
};

/// Default action-execution tick interval.
const DEFAULT_EXECUTION_INTERVAL: Duration = Duration::from_millis(10);

/// Default allowed deviation between requested and observed post-seek
/// position.
const DEFAULT_SEEK_TOLERANCE: Duration = Duration::from_millis(50);

/// Messages arriving on the engine task's control channel.
#[derive(Debug)]
pub(crate) enum EngineMsg {
    /// An asynchronous action finished (`set_done`).
    ActionDone {
        /// Action number of the completed action.
        id: u32,
    },
    /// A `pause` action's duration elapsed; go back to playing.
    RestorePlaying,
    /// Run the tick logic now.
    ForceTick,
    /// Leave the run loop.
    Stop,
}

/// Cloneable handle used by completion sites living on other threads.
#[derive(Clone)]
pub struct ScenarioHandle {
    tx: UnboundedSender<EngineMsg>,
}

impl ScenarioHandle {
    /// Mark an action as done; the transition runs on the engine task.
    pub fn action_done(&self, id: u32) {
        let _ = self.tx.send(EngineMsg::ActionDone { id });
    }

    /// Wake the engine for an extra tick.
    pub fn force_tick(&self) {
        let _ = self.tx.send(EngineMsg::ForceTick);
    }

    /// Ask the engine loop to exit.
    pub fn stop(&self) {
        let _ = self.tx.send(EngineMsg::Stop);
    }

    pub(crate) fn restore_playing(&self) {
        let _ = self.tx.send(EngineMsg::RestorePlaying);
    }
}

/// The last seek sent to the pipeline, kept until `async-done` commits
/// its segment to scenario state.
#[derive(Debug, Clone)]
pub(crate) struct SeekSpec {
    pub(crate) rate: f64,
    pub(crate) flags: SeekFlags,
    pub(crate) start_type: SeekType,
    pub(crate) start: Option<Duration>,
    pub(crate) stop_type: SeekType,
    pub(crate) stop: Option<Duration>,
}

/// A loaded scenario bound to a pipeline, plus all engine state.
pub struct Scenario {
    name: String,
    pipeline: Weak<dyn Pipeline>,
    runner: Arc<Runner>,
    registry: Option<Arc<dyn vigil_pipeline::FeatureRegistry>>,

    tx: UnboundedSender<EngineMsg>,
    rx: Option<UnboundedReceiver<EngineMsg>>,
    bus: Option<UnboundedReceiver<BusMessage>>,

    pub(crate) vars: Structure,
    pub(crate) actions: VecDeque<Action>,
    pub(crate) interlaced: Vec<Action>,
    pub(crate) on_addition: Vec<Action>,

    pub(crate) description: Option<Structure>,
    pub(crate) handles_state: bool,
    pub(crate) pipeline_name_filter: Option<String>,

    pub(crate) target_state: State,
    pub(crate) last_seek: Option<SeekSpec>,
    pub(crate) seek_flags: SeekFlags,
    pub(crate) segment_start: Duration,
    pub(crate) segment_stop: Option<Duration>,
    pub(crate) seek_tolerance: Duration,

    pub(crate) buffering: bool,
    pub(crate) got_eos: bool,
    pub(crate) changing_state: bool,
    pub(crate) needs_async_done: bool,
    pub(crate) seeked_in_pause: bool,

    pub(crate) pending_switch_track: Option<(u32, Vec<String>)>,
    pub(crate) message_wait: Option<String>,
    pub(crate) wait_parked: Option<(u32, CancellationToken)>,
    pub(crate) signal_wait: Option<u32>,

    pub(crate) max_latency: Option<Duration>,
    pub(crate) max_dropped: Option<u64>,
    pub(crate) dropped: Option<u64>,

    execution_interval: Duration,
    execute_on_idle: bool,
    pub(crate) tick_started: bool,
    pub(crate) num_actions: u32,
    pub(crate) stopped: bool,
    done_announced: bool,
}

impl std::fmt::Debug for Scenario {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scenario").field("name", &self.name).finish_non_exhaustive()
    }
}

impl Reporter for Scenario {
    fn reporter_name(&self) -> String {
        self.name.clone()
    }

    fn runner(&self) -> Arc<Runner> {
        Arc::clone(&self.runner)
    }
}

impl Scenario {
    /// Load `scenario_name` and bind it to `pipeline`.
    ///
    /// `scenario_name` is a colon-separated list of scenario names or
    /// paths; at most one of them may be an action scenario. Load
    /// failures are fatal (nothing executes).
    pub fn attach(
        pipeline: Arc<dyn Pipeline>,
        runner: Arc<Runner>,
        scenario_name: &str,
    ) -> Result<Self> {
        types::ensure_builtins();
        vigil_report::issue::init();

        let (tx, rx) = unbounded_channel();
        let mut scenario = Self {
            name: scenario_name.to_string(),
            pipeline: Arc::downgrade(&pipeline),
            runner,
            registry: None,
            tx,
            rx: Some(rx),
            bus: None,
            vars: Structure::new("vars"),
            actions: VecDeque::new(),
            interlaced: Vec::new(),
            on_addition: Vec::new(),
            description: None,
            handles_state: false,
            pipeline_name_filter: None,
            target_state: State::Playing,
            last_seek: None,
            seek_flags: SeekFlags::empty(),
            segment_start: Duration::ZERO,
            segment_stop: None,
            seek_tolerance: DEFAULT_SEEK_TOLERANCE,
            buffering: false,
            got_eos: false,
            changing_state: false,
            needs_async_done: false,
            seeked_in_pause: false,
            pending_switch_track: None,
            message_wait: None,
            wait_parked: None,
            signal_wait: None,
            max_latency: None,
            max_dropped: None,
            dropped: None,
            execution_interval: DEFAULT_EXECUTION_INTERVAL,
            execute_on_idle: false,
            tick_started: false,
            num_actions: 0,
            stopped: false,
            done_announced: false,
        };

        loader::load(&mut scenario, scenario_name)?;

        // A scenario that handles states starts driving right away;
        // otherwise the first pipeline activity on the bus arms the tick.
        scenario.tick_started = scenario.handles_state;

        if let Some(filter) = scenario.pipeline_name_filter.clone() {
            let actual = pipeline.name();
            if !glob_match(&filter, &actual) {
                return Err(Error::PipelineMismatch {
                    expected: filter,
                    actual,
                });
            }
        }

        scenario.bus = Some(pipeline.subscribe());

        scenario.runner.sink().write_text(&format!(
            "\n=========================================\n\
             Running scenario {} on pipeline {}\
             \n=========================================\n",
            scenario_name,
            pipeline.name()
        ));

        Ok(scenario)
    }

    /// Handle for completion sites on other threads.
    pub fn handle(&self) -> ScenarioHandle {
        ScenarioHandle {
            tx: self.tx.clone(),
        }
    }

    /// Install the host's plugin-feature registry (rank actions).
    pub fn set_feature_registry(&mut self, registry: Arc<dyn vigil_pipeline::FeatureRegistry>) {
        self.registry = Some(registry);
    }

    /// The installed plugin-feature registry, if any.
    pub fn feature_registry(&self) -> Option<Arc<dyn vigil_pipeline::FeatureRegistry>> {
        self.registry.clone()
    }

    /// Always dispatch from the tick instead of fast-chaining
    /// synchronous actions.
    pub fn set_execute_on_idle(&mut self, on: bool) {
        self.execute_on_idle = on;
    }

    /// Change the tick interval. Zero means idle-rate (1 ms).
    pub fn set_execution_interval(&mut self, interval: Duration) {
        self.execution_interval = interval;
    }

    /// Change the allowed deviation between requested and observed
    /// post-seek positions.
    pub fn set_seek_tolerance(&mut self, tolerance: Duration) {
        self.seek_tolerance = tolerance;
    }

    /// Whether the scenario handles pipeline states itself.
    pub fn handles_state(&self) -> bool {
        self.handles_state
    }

    /// The scenario-level description structure, when one was given.
    pub fn description(&self) -> Option<&Structure> {
        self.description.as_ref()
    }

    /// Last requested pipeline state.
    pub fn target_state(&self) -> State {
        self.target_state
    }

    /// The runner reports are routed to.
    pub fn runner_ref(&self) -> &Arc<Runner> {
        &self.runner
    }

    /// Number of not-yet-finished main-queue actions.
    pub fn pending_actions(&self) -> usize {
        self.actions.len()
    }

    /// Number of actions parked on the interlaced list.
    pub fn interlaced_pending(&self) -> usize {
        self.interlaced.len()
    }

    /// Number of actions waiting for a matching element to appear.
    pub fn on_addition_pending(&self) -> usize {
        self.on_addition.len()
    }

    /// The scenario variables map.
    pub fn variables(&self) -> &Structure {
        &self.vars
    }

    /// True when every queue is empty or only optional actions remain.
    pub fn is_done(&self) -> bool {
        let only_optional = |actions: &[Action]| actions.iter().all(|a| a.optional);
        self.actions.iter().all(|a| a.optional)
            && only_optional(&self.interlaced)
            && only_optional(&self.on_addition)
    }

    /// Define or replace a scenario variable.
    pub fn set_var(&mut self, name: &str, value: Value) {
        self.vars.set(name, value);
    }

    /// The bound pipeline, unless the host dropped it.
    pub fn pipeline(&self) -> Option<Arc<dyn Pipeline>> {
        self.pipeline.upgrade()
    }

    pub(crate) fn next_action_number(&mut self) -> u32 {
        let number = self.num_actions;
        self.num_actions += 1;
        number
    }

    /// Drive the scenario until it stops (a `stop` action ran, the host
    /// asked through the handle, or every channel closed). Returns the
    /// scenario for inspection.
    pub async fn run(mut self) -> Self {
        let mut rx = self.rx.take().expect("run() consumes the control channel");
        let mut bus = match self.bus.take() {
            Some(bus) => bus,
            None => {
                warn!("no bus subscription, scenario cannot run");
                return self;
            }
        };

        let interval = if self.execution_interval.is_zero() {
            // Idle-rate scheduling; modelled as the smallest real tick.
            Duration::from_millis(1)
        } else {
            self.execution_interval
        };
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        while !self.stopped {
            tokio::select! {
                biased;
                msg = rx.recv() => match msg {
                    Some(msg) => self.handle_engine_msg(msg),
                    None => break,
                },
                msg = bus.recv() => match msg {
                    Some(msg) => self.handle_bus_message(msg, &mut rx),
                    None => break,
                },
                _ = ticker.tick() => {
                    self.runner.sink().flush_remote();
                    self.execute_next_action();
                }
            }
        }
        self
    }

    pub(crate) fn handle_engine_msg(&mut self, msg: EngineMsg) {
        match msg {
            EngineMsg::ActionDone { id } => self.handle_action_done(id),
            EngineMsg::RestorePlaying => self.restore_playing(),
            EngineMsg::ForceTick => self.execute_next_action(),
            EngineMsg::Stop => self.stopped = true,
        }
    }

    fn restore_playing(&mut self) {
        let Some(pipeline) = self.pipeline() else {
            tracing::error!("no pipeline set anymore, cannot go back to playing");
            return;
        };
        self.runner.sink().write_text("Back to playing\n");
        if pipeline.set_state(State::Playing) == vigil_pipeline::StateChange::Failure {
            self.report(
                ids::STATE_CHANGE_FAILURE,
                "Failed to set state to playing".to_string(),
            );
            self.target_state = State::Playing;
        }
    }

    /// True while a gate condition forbids dispatching.
    fn gates_hold(&self) -> bool {
        self.buffering || self.changing_state || self.needs_async_done
    }

    /// True while a wait action has parked the queue.
    fn waiting(&self) -> bool {
        self.wait_parked.is_some() || self.signal_wait.is_some() || self.message_wait.is_some()
    }

    /// The main tick: decide whether the head action is due, dispatch
    /// it, and fast-chain synchronous completions.
    pub(crate) fn execute_next_action(&mut self) {
        loop {
            if self.stopped || !self.tick_started || self.gates_hold() || self.waiting() {
                return;
            }

            let head_state = self.actions.front().map(|a| (a.state, a.repeat));
            match head_state {
                None => {
                    self.check_done();
                    return;
                }
                Some((ActionState::InProgress, _)) => return,
                Some((ActionState::Ok, repeat)) if repeat <= 0 => {
                    let done = self.actions.pop_front().expect("head exists");
                    info!(action = %done.type_name, number = done.number,
                        "action done, moving to the next one");
                    if !self.parse_next_playback_time() {
                        return;
                    }
                    if self.actions.is_empty() {
                        self.check_done();
                    }
                    continue;
                }
                Some((ActionState::Async, _)) => {
                    self.check_head_timeout();
                    return;
                }
                Some(_) => {}
            }

            let Some((position, rate)) = self.check_position() else {
                return;
            };
            if !self.should_execute(position, rate) {
                return;
            }

            let mut action = self.actions.pop_front().expect("head exists");
            self.seeked_in_pause = false;
            debug!(action = %action.type_name, position = ?position, "executing");

            let mut result = self.execute_action(&mut action);
            if result == ExecuteResult::Error {
                self.report(
                    ids::SCENARIO_ACTION_EXECUTION_ERROR,
                    format!("Could not execute {}", action.structure),
                );
            }
            if action.repeat > 0 && !action.is_subaction() {
                action.repeat -= 1;
            }
            if result == ExecuteResult::Ok {
                result = self.execute_sub_action(&mut action);
            }
            action.state = result.into();

            match result {
                ExecuteResult::Async => {
                    self.actions.push_front(action);
                    return;
                }
                ExecuteResult::Interlaced => self.interlaced.push(action),
                ExecuteResult::Ok if action.repeat > 0 => {
                    // Another iteration pending; stays at the head.
                    self.actions.push_front(action);
                }
                _ => {}
            }

            if !self.parse_next_playback_time() {
                return;
            }
            if self.actions.is_empty() {
                self.check_done();
            }
            if self.execute_on_idle {
                debug!("executing only on idle, waiting for next dispatch");
                return;
            }
        }
    }

    /// Raise the once-per-action timeout diagnostic for a stuck head.
    fn check_head_timeout(&mut self) {
        let Some(head) = self.actions.front_mut() else {
            return;
        };
        let (Some(timeout), Some(started)) = (head.timeout, head.started_at) else {
            return;
        };
        let elapsed = started.elapsed();
        if elapsed <= timeout || head.timeout_reported {
            return;
        }
        head.timeout_reported = true;
        let description = head.structure.to_string();
        self.report(
            ids::SCENARIO_ACTION_TIMEOUT,
            format!(
                "Action {} timed out after: {:.3}s",
                description,
                elapsed.as_secs_f64()
            ),
        );
    }

    /// Run prepare + execute for an action detached from the queues.
    pub(crate) fn execute_action(&mut self, action: &mut Action) -> ExecuteResult {
        let Some(ty) = types::find(&action.type_name) else {
            self.report(
                ids::SCENARIO_ACTION_EXECUTION_ERROR,
                format!("Action type {} not found", action.type_name),
            );
            return ExecuteResult::ErrorReported;
        };

        let prepare = ty.prepare.unwrap_or(crate::prepare::default_prepare);
        if let Err(e) = prepare(self, action) {
            tracing::error!(action = %action.structure, "action could not be prepared: {}", e);
            return ExecuteResult::Error;
        }

        self.print_action(action);

        action.started_at = Some(Instant::now());
        action.state = ActionState::InProgress;
        let result = (ty.execute)(self, action);

        if !action.structure.has_field("sub-action") {
            action.reset_structure();
            if result == ExecuteResult::Async {
                action.executing_last_subaction = true;
            }
        }
        result
    }

    /// Emit the action frame and the "Executing" trace, once per
    /// execution.
    fn print_action(&mut self, action: &mut Action) {
        if action.printed {
            return;
        }
        action.printed = true;
        self.runner.sink().send_frame(&ActionFrame::new(
            &action.type_name,
            action.playback_time.map(|t| t.as_secs_f64()),
            action.structure.to_json(),
        ));
        self.runner
            .sink()
            .write_text(&format!("\nExecuting {}", action.render_block()));
    }

    /// Process a `sub-action` field after a successful execute.
    pub(crate) fn execute_sub_action(&mut self, action: &mut Action) -> ExecuteResult {
        if action.executing_last_subaction {
            action.executing_last_subaction = false;
            return ExecuteResult::Ok;
        }

        let sub_structure = match action.structure.get("sub-action") {
            None => return ExecuteResult::Ok,
            Some(Value::Structure(s)) => (**s).clone(),
            Some(value) => match value.as_str().map(Structure::parse) {
                Some(Ok(s)) => s,
                _ => {
                    self.report(
                        ids::SCENARIO_FILE_MALFORMED,
                        format!("Sub action of {} could not be parsed", action.structure),
                    );
                    return ExecuteResult::Error;
                }
            },
        };

        if let Err(e) = self.fill_subaction(action, sub_structure) {
            self.report(
                ids::SCENARIO_ACTION_EXECUTION_ERROR,
                format!("Sub action could not be filled: {}", e),
            );
            return ExecuteResult::Error;
        }

        if action.playback_time.is_none() {
            action.printed = false;
            return self.execute_action(action);
        }
        ExecuteResult::Ok
    }

    /// Replace an action's live structure with a sub-action structure.
    fn fill_subaction(&mut self, action: &mut Action, structure: Structure) -> Result<()> {
        let type_name = structure.name().to_string();
        if types::find(&type_name).is_none() {
            return Err(Error::UnknownActionType(type_name));
        }
        action.type_name = type_name;
        action.name = structure.get_str("name").unwrap_or("").to_string();
        action.structure = structure;
        action.playback_time = self.get_action_time(action, "playback-time")?;
        Ok(())
    }

    /// Parse the playback time of the new head action, when pending.
    /// Failure is fatal for the scenario.
    pub(crate) fn parse_next_playback_time(&mut self) -> bool {
        let needs = self
            .actions
            .front()
            .map(|a| a.needs_playback_parsing)
            .unwrap_or(false);
        if !needs {
            return true;
        }
        let mut action = self.actions.pop_front().expect("head exists");
        action.needs_playback_parsing = false;
        let parsed = self.get_action_time(&mut action, "playback-time");
        match parsed {
            Ok(time) => {
                action.playback_time = time;
                self.actions.push_front(action);
                true
            }
            Err(e) => {
                let structure = action.structure.to_string();
                self.actions.push_front(action);
                self.report(
                    ids::SCENARIO_FILE_MALFORMED,
                    format!(
                        "Could not parse playback-time on structure: {} ({})",
                        structure, e
                    ),
                );
                self.stopped = true;
                false
            }
        }
    }

    /// Refresh the `position` and `duration` variables from the
    /// pipeline.
    pub(crate) fn update_well_known_vars(&mut self) {
        self.vars.remove("position");
        self.vars.remove("duration");
        let Some(pipeline) = self.pipeline() else {
            return;
        };
        let duration = pipeline
            .query_duration()
            .map(|d| d.as_secs_f64())
            .unwrap_or(f64::MAX);
        self.vars.set("duration", duration);
        match pipeline.query_position() {
            Some(position) => self.vars.set("position", position.as_secs_f64()),
            None => warn!("could not query position"),
        }
    }

    /// Substitute `$(name)` templates in a string using the variables
    /// map. Numeric variables substitute to their own name so that the
    /// expression evaluator resolves them with full precision.
    pub(crate) fn substitute_in_string(&self, input: &str) -> Result<String> {
        let vars = &self.vars;
        let lookup = |name: &str| -> Option<String> {
            let value = vars.get(name)?;
            if value.as_double().is_some() && !value.is_string() {
                Some(name.to_string())
            } else {
                value.as_str().map(str::to_string)
            }
        };
        Ok(timexpr::substitute(input, &lookup)?)
    }

    /// Compute a timed parameter of an action.
    ///
    /// Doubles are seconds; strings are expressions over the variables
    /// map (refreshed first); a value of -1 means "none". Computed
    /// expressions are written back into the structure as nanoseconds.
    pub(crate) fn get_action_time(
        &mut self,
        action: &mut Action,
        field: &str,
    ) -> Result<Option<Duration>> {
        let value = match action.structure.get(field) {
            None => return Ok(None),
            Some(value) => value.clone(),
        };
        match value {
            Value::UInt(ns) => Ok(Some(Duration::from_nanos(ns))),
            Value::Int(secs) => {
                if secs < 0 {
                    Ok(None)
                } else {
                    Ok(Some(Duration::from_secs(secs as u64)))
                }
            }
            Value::Double(secs) => {
                if secs < 0.0 {
                    Ok(None)
                } else {
                    Ok(Some(Duration::from_secs_f64(secs)))
                }
            }
            Value::Str(expr) | Value::Raw(expr) => {
                self.update_well_known_vars();
                let substituted = self.substitute_in_string(&expr)?;
                let vars = self.vars.clone();
                let lookup = |name: &str| vars.get_double(name);
                let computed = timexpr::eval(&substituted, &lookup)?;
                if computed == -1.0 {
                    Ok(None)
                } else {
                    let time = Duration::from_secs_f64(computed.max(0.0));
                    action
                        .structure
                        .set(field, Value::UInt(time.as_nanos() as u64));
                    Ok(Some(time))
                }
            }
            _ => Ok(None),
        }
    }

    /// Query position/rate and run the position sanity checks. `None`
    /// means "do not dispatch on this tick".
    fn check_position(&mut self) -> Option<(Option<Duration>, f64)> {
        let Some(pipeline) = self.pipeline() else {
            return Some((None, 1.0));
        };

        let position = pipeline.query_position();
        let duration = pipeline.query_duration();
        let head_is_timed = self
            .actions
            .front()
            .map(|a| a.playback_time.is_some())
            .unwrap_or(false);

        if position.is_none() && pipeline.state() >= State::Paused && head_is_timed {
            debug!("position unknown, cannot decide whether the head action is due");
            return None;
        }

        let rate = pipeline.query_segment_rate();

        if let (Some(pos), Some(dur)) = (position, duration) {
            if !self.got_eos && pos > dur {
                self.report(
                    ids::QUERY_POSITION_SUPERIOR_DURATION,
                    format!(
                        "Reported position {:.3}s > reported duration {:.3}s",
                        pos.as_secs_f64(),
                        dur.as_secs_f64()
                    ),
                );
                return Some((position, rate));
            }
        }

        let start_with_tolerance = self.segment_start.saturating_sub(self.seek_tolerance);
        let stop_with_tolerance = self.segment_stop.map(|s| s + self.seek_tolerance);
        if let Some(pos) = position {
            let above_stop = stop_with_tolerance.map(|s| pos > s).unwrap_or(false);
            let below_accurate_start =
                self.seek_flags.contains(SeekFlags::ACCURATE) && pos < start_with_tolerance;
            if above_stop || below_accurate_start {
                self.report(
                    ids::QUERY_POSITION_OUT_OF_SEGMENT,
                    format!(
                        "Current position {:.3}s not in the expected range [{:.3}s -- {}]",
                        pos.as_secs_f64(),
                        start_with_tolerance.as_secs_f64(),
                        stop_with_tolerance
                            .map(|s| format!("{:.3}s", s.as_secs_f64()))
                            .unwrap_or_else(|| "unbounded".to_string()),
                    ),
                );
            }

            if self.seeked_in_pause && self.seek_flags.contains(SeekFlags::ACCURATE) {
                let above = pos >= self.segment_start + self.seek_tolerance;
                let below = pos < start_with_tolerance;
                if above || below {
                    self.seeked_in_pause = false;
                    self.report(
                        ids::EVENT_SEEK_RESULT_POSITION_WRONG,
                        format!(
                            "Reported position after accurate seek in PAUSED state should be \
                             exactly what the user asked for. Position {:.3}s is not the \
                             expected one: {:.3}s",
                            pos.as_secs_f64(),
                            self.segment_start.as_secs_f64()
                        ),
                    );
                }
            }
        }

        Some((position, rate))
    }

    /// Decide whether the head action is due now.
    fn should_execute(&mut self, position: Option<Duration>, rate: f64) -> bool {
        let Some(head) = self.actions.front() else {
            return false;
        };
        let type_name = head.type_name.clone();
        let playback_time = head.playback_time;

        let Some(pipeline) = self.pipeline() else {
            let flags = types::find(&type_name)
                .map(|t| t.flags)
                .unwrap_or_default();
            if !flags.contains(ActionTypeFlags::DOESNT_NEED_PIPELINE) {
                self.report(
                    ids::SCENARIO_ACTION_EXECUTION_ERROR,
                    format!(
                        "Trying to execute a {} action after the pipeline has been destroyed \
                         but the type has not been marked as safe without a pipeline",
                        type_name
                    ),
                );
                self.stopped = true;
                return false;
            }
            if playback_time.is_some() {
                self.report(
                    ids::SCENARIO_ACTION_EXECUTION_ERROR,
                    format!(
                        "Trying to execute action {} with a playback time after the pipeline \
                         has been destroyed",
                        type_name
                    ),
                );
                return false;
            }
            return true;
        };

        if self.got_eos {
            debug!("just got EOS, executing next action regardless of playback time");
            self.got_eos = false;
            return true;
        }
        if pipeline.state() < State::Paused {
            return true;
        }
        let Some(t) = playback_time else {
            return true;
        };
        if rate > 0.0 {
            position.map(|p| p >= t).unwrap_or(true)
        } else {
            position.map(|p| p <= t).unwrap_or(true)
        }
    }

    /// `set_done` landing on the engine task.
    pub(crate) fn handle_action_done(&mut self, id: u32) {
        self.tick_started = true;
        if let Some(index) = self.interlaced.iter().position(|a| a.number == id) {
            let mut action = self.interlaced.remove(index);
            self.finish_action(&mut action);
            if action.state == ActionState::Async {
                // A sub-action went asynchronous again.
                self.interlaced.push(action);
                return;
            }
            self.execute_next_action();
            return;
        }

        let head_matches = self
            .actions
            .front()
            .map(|a| a.number == id)
            .unwrap_or(false);
        if !head_matches {
            trace!(id, "stale set_done, ignoring");
            return;
        }

        if self
            .wait_parked
            .as_ref()
            .map(|(wid, _)| *wid == id)
            .unwrap_or(false)
        {
            self.wait_parked = None;
            self.runner.sink().write_text("Stop waiting\n");
        }
        if self.signal_wait == Some(id) {
            self.signal_wait = None;
            self.runner.sink().write_text("Stop waiting for signal\n");
        }

        let mut action = self.actions.pop_front().expect("head checked");
        self.finish_action(&mut action);
        let still_async = action.state == ActionState::Async;
        self.actions.push_front(action);
        if !still_async {
            self.execute_next_action();
        }
    }

    /// Emit the action-done frame and run any sub-action chain.
    fn finish_action(&mut self, action: &mut Action) {
        let duration = action
            .started_at
            .take()
            .map(|t| t.elapsed())
            .unwrap_or_default();
        self.runner
            .sink()
            .send_frame(&ActionDoneFrame::new(&action.type_name, duration.as_secs_f64()));
        self.runner.sink().write_text(&format!(
            "  -> Action {} done (duration: {:.6}s)\n",
            action.type_name,
            duration.as_secs_f64()
        ));
        let result = self.execute_sub_action(action);
        action.state = result.into();
    }

    /// Announce completion once every queue holds only optional work.
    pub(crate) fn check_done(&mut self) {
        if self.done_announced || !self.is_done() {
            return;
        }
        self.done_announced = true;
        info!(scenario = %self.name, "scenario done");
    }

    /// The bound pipeline, or an execution-error report.
    pub(crate) fn pipeline_or_report(
        &mut self,
        action: &Action,
    ) -> Option<Arc<dyn Pipeline>> {
        match self.pipeline() {
            Some(pipeline) => Some(pipeline),
            None => {
                self.report(
                    ids::SCENARIO_ACTION_EXECUTION_ERROR,
                    format!(
                        "Can't execute a '{}' action after the pipeline has been destroyed",
                        action.type_name
                    ),
                );
                None
            }
        }
    }

    /// Send a seek, recording it as the pending seek on success.
    pub(crate) fn execute_seek(
        &mut self,
        action: &mut Action,
        seek: SeekSpec,
    ) -> ExecuteResult {
        let Some(pipeline) = self.pipeline_or_report(action) else {
            return ExecuteResult::ErrorReported;
        };

        let event = vigil_pipeline::Event::Seek {
            rate: seek.rate,
            flags: seek.flags,
            start_type: seek.start_type,
            start: seek.start,
            stop_type: seek.stop_type,
            stop: seek.stop,
        };
        if pipeline.send_event(event) {
            self.seek_flags = seek.flags;
            self.last_seek = Some(seek);
            ExecuteResult::Async
        } else {
            self.report(
                ids::EVENT_SEEK_NOT_HANDLED,
                format!(
                    "Could not execute seek: '(position {:?}), {} (num {}, missing repeat: {}), \
                     seeking to: {:?} stop: {:?} Rate {}'",
                    action.playback_time,
                    action.name,
                    action.number,
                    action.repeat,
                    seek.start,
                    seek.stop,
                    seek.rate
                ),
            );
            ExecuteResult::ErrorReported
        }
    }

    /// Commit a completed seek's segment to scenario state.
    pub(crate) fn update_segment_from_seek(&mut self, seek: &SeekSpec) {
        if seek.start_type == SeekType::Set {
            self.segment_start = seek.start.unwrap_or(Duration::ZERO);
        }
        if seek.stop_type == SeekType::Set {
            self.segment_stop = seek.stop;
        }
    }

    /// Compare the dropped-buffer count against the configured budget.
    pub(crate) fn check_dropped(&mut self) {
        let (Some(max), Some(dropped)) = (self.max_dropped, self.dropped) else {
            return;
        };
        debug!(dropped, max, "number of dropped buffers");
        if dropped > max {
            self.report(
                ids::CONFIG_TOO_MANY_BUFFERS_DROPPED,
                format!(
                    "Too many buffers have been dropped: {} (max allowed: {})",
                    dropped, max
                ),
            );
        }
    }

    /// Query pipeline latency and enforce the configured maximum.
    pub(crate) fn check_latency(&mut self) {
        let Some(pipeline) = self.pipeline() else {
            return;
        };
        let Some(latency) = pipeline.query_latency() else {
            self.report(
                ids::SCENARIO_ACTION_EXECUTION_ERROR,
                "Failed to perform LATENCY query".to_string(),
            );
            return;
        };
        debug!(min = ?latency.min, max_allowed = ?self.max_latency, "pipeline latency");
        if let Some(max) = self.max_latency {
            if latency.min > max {
                self.report(
                    ids::CONFIG_LATENCY_TOO_HIGH,
                    format!(
                        "Pipeline latency is too high: {:.3}s (max allowed {:.3}s)",
                        latency.min.as_secs_f64(),
                        max.as_secs_f64()
                    ),
                );
            }
        }
    }
}

/// Minimal `*`/`?` glob matching for `pipeline-name` filters.
fn glob_match(pattern: &str, input: &str) -> bool {
    fn inner(p: &[u8], s: &[u8]) -> bool {
        match (p.first(), s.first()) {
            (None, None) => true,
            (Some(b'*'), _) => {
                inner(&p[1..], s) || (!s.is_empty() && inner(p, &s[1..]))
            }
            (Some(b'?'), Some(_)) => inner(&p[1..], &s[1..]),
            (Some(a), Some(b)) if a == b => inner(&p[1..], &s[1..]),
            _ => false,
        }
    }
    inner(pattern.as_bytes(), input.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glob_matching() {
        assert!(glob_match("pipeline0", "pipeline0"));
        assert!(glob_match("pipe*", "pipeline0"));
        assert!(glob_match("*line?", "pipeline0"));
        assert!(!glob_match("decoder*", "pipeline0"));
        assert!(glob_match("*", ""));
    }
}
