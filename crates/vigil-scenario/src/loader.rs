//! Scenario file loading.
//!
//! A scenario file is UTF-8 text: one structure per logical line, `#`
//! comments, backslash-newline continuation. `description` carries
//! scenario metadata, `include` pulls in another file, anything else is
//! an action looked up in the type registry. Config actions execute
//! immediately; `can-execute-on-addition` actions without a playback
//! time may route to the on-addition queue; everything else lands on
//! the main queue in file order.

use std::{
    env, fs,
    path::{Path, PathBuf},
    sync::OnceLock,
    time::Duration,
};

use regex::Regex;
use tracing::{debug, info};
use vigil_protocol::Structure;

use crate::{Action, ActionTypeFlags, Error, Result, Scenario, types};

/// Environment variable listing extra scenario search directories.
pub const SCENARIOS_PATH_ENV: &str = "VIGIL_SCENARIOS_PATH";

/// File suffix appended to bare scenario names.
pub const SCENARIO_SUFFIX: &str = ".scenario";

#[cfg(unix)]
const PATH_SEPARATOR: char = ':';
#[cfg(not(unix))]
const PATH_SEPARATOR: char = ';';

/// Load `scenario_name` (a colon-separated list of names or paths) into
/// `scenario`. At most one of the parts may be an action scenario.
pub(crate) fn load(scenario: &mut Scenario, scenario_name: &str) -> Result<()> {
    let mut found_actions = false;
    for part in scenario_name.split(':').filter(|p| !p.is_empty()) {
        let path = resolve(part, None).ok_or_else(|| Error::NotFound(part.to_string()))?;
        let had_actions_before = scenario.num_actions;
        load_file(scenario, &path)?;

        let is_config = scenario.num_actions == had_actions_before;
        if !is_config {
            if found_actions {
                return Err(Error::MultipleActionScenarios);
            }
            found_actions = true;
        }
    }
    Ok(())
}

/// Resolve a scenario name to an existing file.
///
/// Resolution order: the literal path, then (with the `.scenario`
/// suffix appended when missing) the directory of the including file,
/// each `VIGIL_SCENARIOS_PATH` entry, the local `data/scenarios`
/// directory, the user data directory, and the system data directory.
fn resolve(name: &str, relative_to: Option<&Path>) -> Option<PathBuf> {
    let literal = PathBuf::from(name);
    if literal.is_file() {
        return Some(literal);
    }

    let file_name = if name.ends_with(SCENARIO_SUFFIX) {
        name.to_string()
    } else {
        format!("{}{}", name, SCENARIO_SUFFIX)
    };

    let mut dirs: Vec<PathBuf> = Vec::new();
    if let Some(base) = relative_to.and_then(Path::parent) {
        dirs.push(base.to_path_buf());
    }
    if let Ok(spec) = env::var(SCENARIOS_PATH_ENV) {
        dirs.extend(
            spec.split(PATH_SEPARATOR)
                .filter(|d| !d.is_empty())
                .map(PathBuf::from),
        );
    }
    dirs.push(PathBuf::from("data/scenarios"));
    if let Some(data) = dirs::data_dir() {
        dirs.push(data.join("vigil").join("scenarios"));
    }
    dirs.push(PathBuf::from("/usr/share/vigil/scenarios"));

    for dir in dirs {
        let candidate = dir.join(&file_name);
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    None
}

fn clean_regex() -> &'static Regex {
    // Joins continuation lines and strips comments in one pass.
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\\\r?\n|#[^\n]*").expect("static regex"))
}

/// Split file contents into logical structure lines.
fn logical_lines(contents: &str) -> Vec<String> {
    let cleaned = clean_regex().replace_all(contents, "");
    cleaned
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

fn load_file(scenario: &mut Scenario, path: &Path) -> Result<()> {
    debug!("loading scenario file {}", path.display());
    let contents = fs::read_to_string(path).map_err(|source| Error::Io {
        file: path.display().to_string(),
        source,
    })?;

    for line in logical_lines(&contents) {
        let structure = Structure::parse(&line).map_err(|e| Error::Malformed {
            file: path.display().to_string(),
            message: e.to_string(),
        })?;

        match structure.name() {
            "description" => apply_description(scenario, &structure)?,
            "include" => {
                let location =
                    structure
                        .get_str("location")
                        .ok_or_else(|| Error::MissingParameter {
                            field: "location".to_string(),
                            structure: structure.to_string(),
                        })?;
                let included = resolve(location, Some(path))
                    .ok_or_else(|| Error::NotFound(location.to_string()))?;
                load_file(scenario, &included)?;
            }
            _ => queue_structure(scenario, structure)?,
        }
    }
    Ok(())
}

/// Apply scenario-level metadata from a `description` structure.
fn apply_description(scenario: &mut Scenario, structure: &Structure) -> Result<()> {
    scenario.handles_state = structure.get_bool("handles-states").unwrap_or(false);
    if !scenario.handles_state {
        scenario.target_state = vigil_pipeline::State::Playing;
    }
    if let Some(name) = structure.get_str("pipeline-name") {
        scenario.pipeline_name_filter = Some(name.to_string());
    }
    scenario.max_latency = read_time_field(structure, "max-latency");
    if let Some(max_dropped) = structure.get_uint("max-dropped") {
        scenario.max_dropped = Some(max_dropped);
    }
    scenario.description = Some(structure.clone());
    Ok(())
}

/// Read a literal time field: doubles are seconds, unsigned integers
/// are nanoseconds.
fn read_time_field(structure: &Structure, field: &str) -> Option<Duration> {
    match structure.get(field)? {
        vigil_protocol::Value::UInt(ns) => Some(Duration::from_nanos(*ns)),
        value => value
            .as_double()
            .filter(|d| *d >= 0.0)
            .map(Duration::from_secs_f64),
    }
}

/// Validate a parsed action structure and route it to the right queue.
fn queue_structure(scenario: &mut Scenario, structure: Structure) -> Result<()> {
    let type_name = structure.name().to_string();
    let Some(ty) = types::find(&type_name) else {
        if structure.has_field("optional-action-type") {
            info!(
                "action type {} not found but marked as not mandatory",
                type_name
            );
            return Ok(());
        }
        return Err(Error::UnknownActionType(type_name));
    };

    for parameter in &ty.parameters {
        if parameter.mandatory && !structure.has_field(parameter.name) {
            return Err(Error::MissingParameter {
                field: parameter.name.to_string(),
                structure: structure.to_string(),
            });
        }
    }

    let as_config = structure.get_bool("as-config").unwrap_or(false);
    if ty.is_config() || as_config {
        let mut action = Action::new(structure, 0);
        let _ = scenario.execute_action(&mut action);
        return Ok(());
    }

    let number = scenario.next_action_number();
    let mut action = Action::new(structure, number);

    // Playback time: a double is parsed now, an expression string when
    // the action reaches the queue head (variables must be fresh).
    let playback_value = action
        .structure
        .get("playback-time")
        .or_else(|| action.structure.get("playback_time"))
        .cloned();
    match playback_value {
        Some(value) if value.is_string() => action.needs_playback_parsing = true,
        Some(value) => {
            action.playback_time = value
                .as_double()
                .filter(|d| *d >= 0.0)
                .map(Duration::from_secs_f64);
        }
        None => {}
    }

    action.timeout = read_time_field(&action.structure, "timeout");

    if let Some(optional) = action.structure.get_bool("optional") {
        if !ty.flags.contains(ActionTypeFlags::CAN_BE_OPTIONAL) {
            return Err(Error::CannotBeOptional(action.type_name.clone()));
        }
        action.optional = optional;
    }

    let can_execute_on_addition = ty.flags.contains(ActionTypeFlags::CAN_EXECUTE_ON_ADDITION)
        && action.playback_time.is_none()
        && !action.needs_playback_parsing
        && scenario.actions.iter().all(|a| a.playback_time.is_none());

    if can_execute_on_addition {
        scenario.on_addition.push(action);
    } else {
        scenario.actions.push_back(action);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logical_line_splitting() {
        let text = "seek, start=0.0, \\\n    flags=flush # trailing comment\n\
                    # full comment line\n\
                    \n\
                    pause;\n";
        let lines = logical_lines(text);
        assert_eq!(lines.len(), 2);
        let seek = Structure::parse(&lines[0]).unwrap();
        assert_eq!(seek.name(), "seek");
        assert_eq!(seek.get_double("start"), Some(0.0));
        assert_eq!(seek.get_str("flags"), Some("flush"));
        assert_eq!(lines[1], "pause;");
    }

    #[test]
    fn comment_at_eof_is_stripped() {
        let lines = logical_lines("eos;\n# no trailing newline");
        assert_eq!(lines, vec!["eos;"]);
    }
}
