//! Scenario loading and validation tests.

use std::{path::PathBuf, sync::Arc, time::Duration};

use tempfile::TempDir;
use vigil_pipeline::mock::{MockPipeline, MockRegistry};
use vigil_report::{Runner, SharedBuffer, Sink};
use vigil_scenario::{Error, Scenario};

fn write_scenario(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, contents).expect("write scenario file");
    path
}

fn runner() -> Arc<Runner> {
    Runner::new(Sink::with_output(Box::new(SharedBuffer::new())))
}

fn pipeline() -> Arc<MockPipeline> {
    let pipeline = MockPipeline::new("pipeline0");
    pipeline.set_media(Duration::from_secs(10));
    pipeline
}

#[test]
fn loads_actions_in_file_order() {
    let dir = TempDir::new().unwrap();
    let path = write_scenario(
        &dir,
        "basic.scenario",
        "description, summary=\"three steps\", handles-states=true\n\
         pause, playback-time=1.0\n\
         play\n\
         eos\n",
    );
    let scenario = Scenario::attach(pipeline(), runner(), path.to_str().unwrap()).unwrap();
    assert_eq!(scenario.pending_actions(), 3);
    assert!(scenario.handles_state());
    assert_eq!(
        scenario.description().unwrap().get_str("summary"),
        Some("three steps")
    );
}

#[test]
fn missing_mandatory_parameter_is_fatal() {
    let dir = TempDir::new().unwrap();
    // seek requires both start and flags.
    let path = write_scenario(&dir, "bad.scenario", "seek, start=1.0\n");
    let err = Scenario::attach(pipeline(), runner(), path.to_str().unwrap()).unwrap_err();
    match err {
        Error::MissingParameter { field, .. } => assert_eq!(field, "flags"),
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn unknown_action_type_is_fatal_unless_optional() {
    let dir = TempDir::new().unwrap();
    let path = write_scenario(&dir, "unknown.scenario", "frobnicate, amount=11\n");
    assert!(matches!(
        Scenario::attach(pipeline(), runner(), path.to_str().unwrap()),
        Err(Error::UnknownActionType(t)) if t == "frobnicate"
    ));

    let path = write_scenario(
        &dir,
        "optional.scenario",
        "frobnicate, amount=11, optional-action-type=true\n\
         eos\n",
    );
    let scenario = Scenario::attach(pipeline(), runner(), path.to_str().unwrap()).unwrap();
    assert_eq!(scenario.pending_actions(), 1);
}

#[test]
fn malformed_lines_are_fatal() {
    let dir = TempDir::new().unwrap();
    let path = write_scenario(&dir, "garbled.scenario", "seek start=###\n");
    assert!(matches!(
        Scenario::attach(pipeline(), runner(), path.to_str().unwrap()),
        Err(Error::Malformed { .. })
    ));
}

#[test]
fn includes_resolve_relative_to_the_including_file() {
    let dir = TempDir::new().unwrap();
    let _shared = write_scenario(&dir, "shared.scenario", "set-vars, from-include=1\n");
    let path = write_scenario(
        &dir,
        "main.scenario",
        "include, location=shared\n\
         eos\n",
    );
    let scenario = Scenario::attach(pipeline(), runner(), path.to_str().unwrap()).unwrap();
    assert_eq!(scenario.pending_actions(), 2);
}

#[test]
fn missing_include_is_fatal() {
    let dir = TempDir::new().unwrap();
    let path = write_scenario(&dir, "main.scenario", "include, location=nowhere\n");
    assert!(matches!(
        Scenario::attach(pipeline(), runner(), path.to_str().unwrap()),
        Err(Error::NotFound(name)) if name == "nowhere"
    ));
}

#[test]
fn at_most_one_action_scenario_per_run() {
    let dir = TempDir::new().unwrap();
    let first = write_scenario(&dir, "first.scenario", "eos\n");
    let second = write_scenario(&dir, "second.scenario", "eos\n");
    let spec = format!("{}:{}", first.display(), second.display());
    assert!(matches!(
        Scenario::attach(pipeline(), runner(), &spec),
        Err(Error::MultipleActionScenarios)
    ));
}

#[test]
fn config_scenarios_layer_on_top_of_an_action_scenario() {
    let dir = TempDir::new().unwrap();
    let config = write_scenario(
        &dir,
        "ranks.scenario",
        "description, is-config=true\n\
         set-rank, name=baddec, rank=0\n",
    );
    let action = write_scenario(&dir, "run.scenario", "eos\n");
    let spec = format!("{}:{}", config.display(), action.display());

    let pipeline = pipeline();
    let scenario = Scenario::attach(pipeline, runner(), &spec).unwrap();
    assert_eq!(scenario.pending_actions(), 1);
}

#[test]
fn config_actions_execute_at_load() {
    let dir = TempDir::new().unwrap();
    let path = write_scenario(
        &dir,
        "rank_config.scenario",
        "set-rank, name=baddec, rank=0\n\
         eos\n",
    );
    // The registry is installed post-attach in normal embeddings; here
    // the config action runs at load without one, which only logs.
    let scenario = Scenario::attach(pipeline(), runner(), path.to_str().unwrap()).unwrap();
    assert_eq!(scenario.pending_actions(), 1);

    let registry = MockRegistry::with_features(&["baddec"]);
    assert_eq!(registry.rank("baddec"), Some(128));
    let mut scenario = scenario;
    scenario.set_feature_registry(registry);
    assert!(scenario.feature_registry().is_some());
}

#[test]
fn set_property_without_playback_time_routes_to_on_addition() {
    let dir = TempDir::new().unwrap();
    let path = write_scenario(
        &dir,
        "routing.scenario",
        "set-property, target-element-name=sink0, property-name=sync, property-value=false\n\
         eos\n",
    );
    let scenario = Scenario::attach(pipeline(), runner(), path.to_str().unwrap()).unwrap();
    assert_eq!(scenario.on_addition_pending(), 1);
    assert_eq!(scenario.pending_actions(), 1);
}

#[test]
fn set_property_after_a_timed_action_stays_on_the_main_queue() {
    let dir = TempDir::new().unwrap();
    let path = write_scenario(
        &dir,
        "routing2.scenario",
        "pause, playback-time=1.0\n\
         set-property, target-element-name=sink0, property-name=sync, property-value=false\n",
    );
    let scenario = Scenario::attach(pipeline(), runner(), path.to_str().unwrap()).unwrap();
    assert_eq!(scenario.on_addition_pending(), 0);
    assert_eq!(scenario.pending_actions(), 2);
}

#[test]
fn pipeline_name_filter_rejects_other_pipelines() {
    let dir = TempDir::new().unwrap();
    let path = write_scenario(
        &dir,
        "filtered.scenario",
        "description, pipeline-name=encoder*\n\
         eos\n",
    );
    assert!(matches!(
        Scenario::attach(pipeline(), runner(), path.to_str().unwrap()),
        Err(Error::PipelineMismatch { .. })
    ));

    let matching = MockPipeline::new("encoder7");
    let path = write_scenario(
        &dir,
        "filtered2.scenario",
        "description, pipeline-name=encoder*\n\
         eos\n",
    );
    assert!(Scenario::attach(matching, runner(), path.to_str().unwrap()).is_ok());
}

#[test]
fn optional_flag_needs_a_capable_type() {
    let dir = TempDir::new().unwrap();
    let path = write_scenario(&dir, "opt.scenario", "eos, optional=true\n");
    assert!(matches!(
        Scenario::attach(pipeline(), runner(), path.to_str().unwrap()),
        Err(Error::CannotBeOptional(t)) if t == "eos"
    ));

    let path = write_scenario(
        &dir,
        "opt_ok.scenario",
        "set-property, target-element-name=sink0, property-name=sync, property-value=false, \
         optional=true, playback-time=1.0\n",
    );
    assert!(Scenario::attach(pipeline(), runner(), path.to_str().unwrap()).is_ok());
}

#[test]
fn continuation_and_comments() {
    let dir = TempDir::new().unwrap();
    let path = write_scenario(
        &dir,
        "continued.scenario",
        "# a scenario with continuations\n\
         seek, playback-time=0.0, \\\n\
         \u{20}    start=1.0, \\\n\
         \u{20}    flags=flush # inline comment\n\
         eos\n",
    );
    let scenario = Scenario::attach(pipeline(), runner(), path.to_str().unwrap()).unwrap();
    assert_eq!(scenario.pending_actions(), 2);
}
