//! The action-type registry.
//!
//! An action type couples a name with a parameter schema, behavior
//! flags, and prepare/execute handlers. The registry is process-wide:
//! built-ins install once, lazily; hosts may register additional types
//! (a re-registration replaces the previous definition of that name).

use std::sync::{Arc, OnceLock, RwLock};

use bitflags::bitflags;

use crate::{Action, ExecuteResult, Result, Scenario, actions};

bitflags! {
    /// Behavior bits of an action type.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ActionTypeFlags: u32 {
        /// Executes at load time, never queued.
        const CONFIG = 1 << 0;
        /// Needs a running clock (advisory, used by tooling).
        const NEEDS_CLOCK = 1 << 1;
        /// May return [`ExecuteResult::Async`].
        const ASYNC = 1 << 2;
        /// May return [`ExecuteResult::Interlaced`].
        const INTERLACED = 1 << 3;
        /// Executable after the pipeline is gone.
        const DOESNT_NEED_PIPELINE = 1 << 4;
        /// Accepts `optional=true`.
        const CAN_BE_OPTIONAL = 1 << 5;
        /// May run when a matching element appears instead of at a
        /// stream position.
        const CAN_EXECUTE_ON_ADDITION = 1 << 6;
        /// Leaving this action un-executed at terminal exit is fine.
        const NO_EXECUTION_NOT_FATAL = 1 << 7;
        /// Fully handled while loading configs.
        const HANDLED_IN_CONFIG = 1 << 8;
        /// Needs execution synchronized to the pipeline clock (advisory).
        const NEEDS_CLOCK_SYNC = 1 << 9;
    }
}

/// Schema of one action parameter.
#[derive(Debug, Clone, Copy)]
pub struct ActionParameter {
    /// Field name.
    pub name: &'static str,
    /// What the parameter does.
    pub description: &'static str,
    /// Load fails when a mandatory parameter is absent.
    pub mandatory: bool,
    /// Type hint; a hint ending in `(time)` makes the default prepare
    /// parse the field as a clock time (doubles are seconds, strings are
    /// expressions over the scenario variables).
    pub types: &'static str,
    /// Variables usable inside the parameter's expressions.
    pub possible_variables: Option<&'static str>,
    /// Default literal, shown in documentation.
    pub default: Option<&'static str>,
}

/// Execute handler: runs on the engine task with the action detached
/// from the queues.
pub type ExecuteFunc = fn(&mut Scenario, &mut Action) -> ExecuteResult;

/// Prepare handler; `None` selects the default prepare (variable
/// substitution, time parsing, repeat computation).
pub type PrepareFunc = fn(&mut Scenario, &mut Action) -> Result<()>;

/// A registered action kind.
pub struct ActionType {
    /// Type name (structure head token).
    pub name: String,
    /// Who registered the type.
    pub implementer_namespace: String,
    /// What the action does.
    pub description: String,
    /// Behavior bits.
    pub flags: ActionTypeFlags,
    /// Ordered parameter schema.
    pub parameters: Vec<ActionParameter>,
    /// Prepare hook override.
    pub prepare: Option<PrepareFunc>,
    /// Execute hook.
    pub execute: ExecuteFunc,
}

impl ActionType {
    /// Whether the schema names `parameter`.
    pub fn has_parameter(&self, parameter: &str) -> bool {
        self.parameters.iter().any(|p| p.name == parameter)
    }

    /// True for config types, which execute at load.
    pub fn is_config(&self) -> bool {
        self.flags
            .intersects(ActionTypeFlags::CONFIG | ActionTypeFlags::HANDLED_IN_CONFIG)
    }
}

fn registry() -> &'static RwLock<Vec<Arc<ActionType>>> {
    static REGISTRY: OnceLock<RwLock<Vec<Arc<ActionType>>>> = OnceLock::new();
    REGISTRY.get_or_init(|| RwLock::new(Vec::new()))
}

/// Install the built-in catalog (idempotent).
pub fn ensure_builtins() {
    static INIT: OnceLock<()> = OnceLock::new();
    INIT.get_or_init(|| {
        for ty in actions::builtin_types() {
            register(ty);
        }
    });
}

/// Register an action type, replacing any previous type of that name.
pub fn register(action_type: ActionType) -> Arc<ActionType> {
    let ty = Arc::new(action_type);
    let mut types = registry().write().expect("action type registry poisoned");
    types.retain(|t| t.name != ty.name);
    types.push(Arc::clone(&ty));
    ty
}

/// Look up an action type by name.
pub fn find(name: &str) -> Option<Arc<ActionType>> {
    ensure_builtins();
    registry()
        .read()
        .expect("action type registry poisoned")
        .iter()
        .find(|t| t.name == name)
        .cloned()
}

/// Names of all registered types, for documentation output.
pub fn type_names() -> Vec<String> {
    ensure_builtins();
    registry()
        .read()
        .expect("action type registry poisoned")
        .iter()
        .map(|t| t.name.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ExecuteResult;

    fn noop(_: &mut Scenario, _: &mut Action) -> ExecuteResult {
        ExecuteResult::Ok
    }

    #[test]
    fn builtins_are_present() {
        for name in [
            "seek",
            "set-state",
            "play",
            "pause",
            "stop",
            "eos",
            "switch-track",
            "wait",
            "dot-pipeline",
            "set-property",
            "set-rank",
            "set-feature-rank",
            "set-debug-threshold",
            "set-vars",
            "emit-signal",
            "appsrc-push",
            "appsrc-eos",
            "flush",
            "disable-plugin",
            "check-last-sample",
            "description",
        ] {
            assert!(find(name).is_some(), "missing built-in `{}`", name);
        }
        assert!(find("teleport").is_none());
    }

    #[test]
    fn registration_replaces_by_name() {
        let first = register(ActionType {
            name: "custom-test-action".into(),
            implementer_namespace: "tests".into(),
            description: "first".into(),
            flags: ActionTypeFlags::empty(),
            parameters: Vec::new(),
            prepare: None,
            execute: noop,
        });
        assert_eq!(find("custom-test-action").unwrap().description, "first");
        let _ = register(ActionType {
            name: "custom-test-action".into(),
            implementer_namespace: "tests".into(),
            description: "second".into(),
            flags: ActionTypeFlags::empty(),
            parameters: Vec::new(),
            prepare: None,
            execute: noop,
        });
        assert_eq!(find("custom-test-action").unwrap().description, "second");
        assert_eq!(first.description, "first");
    }

    #[test]
    fn schema_queries() {
        let seek = find("seek").unwrap();
        assert!(seek.has_parameter("start"));
        assert!(!seek.has_parameter("volume"));
        assert!(seek.flags.contains(ActionTypeFlags::ASYNC));
        assert!(find("description").unwrap().is_config());
    }
}
