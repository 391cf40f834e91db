//! The action object: one instantiated unit of scripted work.

use std::{fmt, time::Duration};

use tokio::time::Instant;
use vigil_protocol::Structure;

/// What an execute handler reports back to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecuteResult {
    /// Completed synchronously.
    Ok,
    /// Completion will arrive through `set_done`; the action blocks the
    /// main queue until then.
    Async,
    /// Initiated; completion arrives later but the main queue continues.
    Interlaced,
    /// Failed; the engine raises the execution-error report.
    Error,
    /// Failed and the handler already raised a report.
    ErrorReported,
}

/// Execution state of an action.
///
/// `None → InProgress → {Ok, Async, Interlaced, Error, ErrorReported}`;
/// `Async`/`Interlaced` later settle to a terminal state. Terminal states
/// never regress, except that a repeating action returns to `InProgress`
/// for its next iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActionState {
    /// Not dispatched yet.
    #[default]
    None,
    /// Execute handler running.
    InProgress,
    /// Awaiting `set_done`.
    Async,
    /// Moved aside; completes later.
    Interlaced,
    /// Completed.
    Ok,
    /// Failed.
    Error,
    /// Failed, report already raised.
    ErrorReported,
}

impl From<ExecuteResult> for ActionState {
    fn from(result: ExecuteResult) -> Self {
        match result {
            ExecuteResult::Ok => ActionState::Ok,
            ExecuteResult::Async => ActionState::Async,
            ExecuteResult::Interlaced => ActionState::Interlaced,
            ExecuteResult::Error => ActionState::Error,
            ExecuteResult::ErrorReported => ActionState::ErrorReported,
        }
    }
}

/// One instantiated action.
///
/// `structure` is the live parameter set (post variable expansion,
/// possibly replaced by a sub-action); `main_structure` is the original,
/// used to restore parameters after each iteration.
pub struct Action {
    pub(crate) type_name: String,
    pub(crate) name: String,
    pub(crate) structure: Structure,
    pub(crate) main_structure: Structure,
    pub(crate) playback_time: Option<Duration>,
    pub(crate) needs_playback_parsing: bool,
    pub(crate) timeout: Option<Duration>,
    pub(crate) repeat: i32,
    pub(crate) number: u32,
    pub(crate) state: ActionState,
    pub(crate) optional: bool,
    pub(crate) printed: bool,
    pub(crate) executing_last_subaction: bool,
    pub(crate) timeout_reported: bool,
    pub(crate) started_at: Option<Instant>,
}

impl Action {
    /// Build an action around a parsed structure. Field interpretation
    /// (playback time, timeout, optional) is the loader's job.
    pub(crate) fn new(structure: Structure, number: u32) -> Self {
        let name = structure.get_str("name").unwrap_or("").to_string();
        Self {
            type_name: structure.name().to_string(),
            name,
            main_structure: structure.clone(),
            structure,
            playback_time: None,
            needs_playback_parsing: false,
            timeout: None,
            repeat: -1,
            number,
            state: ActionState::None,
            optional: false,
            printed: false,
            executing_last_subaction: false,
            timeout_reported: false,
            started_at: None,
        }
    }

    /// The action type name (key into the action-type registry).
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Optional user-given action name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Monotonic allocation number.
    pub fn number(&self) -> u32 {
        self.number
    }

    /// Current execution state.
    pub fn state(&self) -> ActionState {
        self.state
    }

    /// The live parameter structure.
    pub fn structure(&self) -> &Structure {
        &self.structure
    }

    /// Mutable access to the live parameter structure.
    pub fn structure_mut(&mut self) -> &mut Structure {
        &mut self.structure
    }

    /// Scheduled stream position, when the action is position-gated.
    pub fn playback_time(&self) -> Option<Duration> {
        self.playback_time
    }

    /// True while the action is running a sub-action rather than its
    /// original structure.
    pub fn is_subaction(&self) -> bool {
        self.structure != self.main_structure
    }

    /// Restore the original parameter structure (end of an iteration).
    pub(crate) fn reset_structure(&mut self) {
        self.structure = self.main_structure.clone();
        self.printed = false;
        self.name = self.structure.get_str("name").unwrap_or("").to_string();
    }

    /// Render the "Executing" block: optional sub-action/repeat markers,
    /// the type name, then one line per field (`sub-action` and `repeat`
    /// excluded).
    pub(crate) fn render_block(&self) -> String {
        let mut out = String::new();
        if self.is_subaction() {
            out.push_str("(subaction)");
        }
        if let Some(total) = self.structure.get_int("repeat") {
            let total = total as i32;
            out.push_str(&format!("({}/{})", total - self.repeat + 1, total));
        }
        out.push_str(self.structure.name());
        out.push_str(" ( ");
        let mut any = false;
        for (field, value) in self.structure.iter() {
            if field == "sub-action" || field == "repeat" {
                continue;
            }
            any = true;
            out.push_str(&format!("\n    - {}={}", field, value));
        }
        if any {
            out.push_str("\n)\n");
        } else {
            out.push_str(")\n");
        }
        out
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("type", &self.type_name)
            .field("number", &self.number)
            .field("state", &self.state)
            .field("playback_time", &self.playback_time)
            .field("repeat", &self.repeat)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subaction_detection() {
        let structure = Structure::parse("seek, start=1.0;").unwrap();
        let mut action = Action::new(structure, 0);
        assert!(!action.is_subaction());

        action.structure = Structure::parse("pause;").unwrap();
        assert!(action.is_subaction());

        action.reset_structure();
        assert!(!action.is_subaction());
    }

    #[test]
    fn render_block_skips_internal_fields() {
        let structure =
            Structure::parse("seek, start=1.0, repeat=3, sub-action=\"pause;\";").unwrap();
        let mut action = Action::new(structure, 0);
        action.repeat = 3;
        let block = action.render_block();
        assert!(block.starts_with("(1/3)seek ( "));
        assert!(block.contains("- start=1"));
        assert!(!block.contains("sub-action"));
        assert!(!block.contains("- repeat"));
    }
}
