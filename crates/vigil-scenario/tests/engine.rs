//! End-to-end engine tests against the in-memory pipeline.

use std::{io::Read, net::TcpListener, path::PathBuf, sync::Arc, time::Duration};

use tempfile::TempDir;
use vigil_pipeline::{
    BusMessage, Element, Event, Latency, Pipeline, SeekFlags, State, StreamInfo, StreamType,
    mock::{MockElement, MockPad, MockPipeline},
};
use vigil_protocol::{Value, decode_frames};
use vigil_report::{Runner, SharedBuffer, Sink};
use vigil_scenario::Scenario;

fn write_scenario(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, contents).expect("write scenario file");
    path
}

fn buffered_runner() -> (Arc<Runner>, SharedBuffer) {
    let buffer = SharedBuffer::new();
    let runner = Runner::new(Sink::with_output(Box::new(buffer.clone())));
    (runner, buffer)
}

fn playing_pipeline(duration_secs: u64) -> Arc<MockPipeline> {
    let pipeline = MockPipeline::new("pipeline0");
    pipeline.set_media(Duration::from_secs(duration_secs));
    pipeline.set_latency(Latency {
        min: Duration::ZERO,
        max: None,
        live: false,
    });
    let _ = pipeline.set_state(State::Playing);
    pipeline
}

#[tokio::test(start_paused = true)]
async fn synchronous_actions_dispatch_in_order() {
    let dir = TempDir::new().unwrap();
    let path = write_scenario(
        &dir,
        "ordered.scenario",
        "description, handles-states=true\n\
         set-vars, first=1\n\
         set-vars, second=2\n\
         set-vars, third=3\n\
         stop;\n",
    );
    let pipeline = playing_pipeline(10);
    let (runner, buffer) = buffered_runner();

    let scenario =
        Scenario::attach(pipeline, Arc::clone(&runner), path.to_str().unwrap()).unwrap();
    let scenario = scenario.run().await;

    let output = buffer.contents();
    let first = output.find("first=1").expect("first executed");
    let second = output.find("second=2").expect("second executed");
    let third = output.find("third=3").expect("third executed");
    assert!(first < second && second < third);
    assert_eq!(scenario.pending_actions(), 0);
    assert_eq!(runner.criticals(), 0);
    assert_eq!(scenario.variables().get_int("second"), Some(2));
}

#[tokio::test(start_paused = true)]
async fn playback_time_gates_execution() {
    let dir = TempDir::new().unwrap();
    let path = write_scenario(
        &dir,
        "gated.scenario",
        "description, handles-states=true\n\
         set-vars, playback-time=1.0, mark=done\n",
    );
    let pipeline = playing_pipeline(10);
    let (runner, buffer) = buffered_runner();

    let scenario =
        Scenario::attach(Arc::clone(&pipeline) as Arc<dyn Pipeline>, runner, path.to_str().unwrap())
            .unwrap();
    let handle = scenario.handle();
    let engine = tokio::spawn(scenario.run());

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!buffer.contents().contains("mark=done"), "executed too early");

    pipeline.set_position(Duration::from_secs(1));
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(buffer.contents().contains("mark=done"), "never executed");

    handle.stop();
    let scenario = engine.await.unwrap();
    assert_eq!(scenario.pending_actions(), 0);
}

#[tokio::test(start_paused = true)]
async fn stuck_async_action_times_out_once_and_stays_queued() {
    let dir = TempDir::new().unwrap();
    let path = write_scenario(
        &dir,
        "timeout.scenario",
        "description, handles-states=true\n\
         seek, start=0.0, flags=flush, timeout=2.0\n",
    );
    let pipeline = playing_pipeline(10);
    pipeline.set_seeks_never_settle(true);
    let (runner, buffer) = buffered_runner();

    let scenario =
        Scenario::attach(pipeline, Arc::clone(&runner), path.to_str().unwrap()).unwrap();
    let handle = scenario.handle();
    let engine = tokio::spawn(scenario.run());

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert!(!buffer.contents().contains("timed out"));

    tokio::time::sleep(Duration::from_millis(3000)).await;
    let output = buffer.contents();
    assert_eq!(
        output.matches("the execution of an action timed out").count(),
        1,
        "expected exactly one timeout report:\n{}",
        output
    );

    handle.stop();
    let scenario = engine.await.unwrap();
    // The action still blocks the queue.
    assert_eq!(scenario.pending_actions(), 1);
    assert_eq!(runner.criticals(), 1);
}

#[tokio::test(start_paused = true)]
async fn eos_with_pending_actions_reports_once_and_stops() {
    let dir = TempDir::new().unwrap();
    let path = write_scenario(
        &dir,
        "unended.scenario",
        "description, handles-states=true\n\
         seek, playback-time=1000.0, start=0.0, flags=flush\n",
    );
    let pipeline = playing_pipeline(10);
    let (runner, buffer) = buffered_runner();

    let scenario = Scenario::attach(
        Arc::clone(&pipeline) as Arc<dyn Pipeline>,
        Arc::clone(&runner),
        path.to_str().unwrap(),
    )
    .unwrap();
    let engine = tokio::spawn(scenario.run());

    tokio::time::sleep(Duration::from_millis(50)).await;
    pipeline.post(BusMessage::Eos);

    let scenario = engine.await.unwrap();
    let output = buffer.contents();
    assert_eq!(
        output.matches("actions were not executed").count(),
        1,
        "expected exactly one not-ended diagnostic:\n{}",
        output
    );
    assert!(output.contains("seek"), "diagnostic must name the seek");
    assert_eq!(output.matches("Executing stop").count(), 1);
    assert_eq!(scenario.pending_actions(), 0);
    assert!(runner.criticals() >= 1);
}

#[tokio::test(start_paused = true)]
async fn clean_eos_generates_stop_without_diagnostics() {
    let dir = TempDir::new().unwrap();
    let path = write_scenario(
        &dir,
        "pause_play.scenario",
        "description, handles-states=true\n\
         pause, playback-time=1.0, duration=0.5\n\
         play\n\
         wait, duration=1.0\n\
         eos\n",
    );
    let pipeline = playing_pipeline(10);
    pipeline.set_async_state_changes(true);
    pipeline.set_position(Duration::from_secs(1));
    let (runner, buffer) = buffered_runner();

    let scenario =
        Scenario::attach(pipeline, Arc::clone(&runner), path.to_str().unwrap()).unwrap();
    let scenario = scenario.run().await;

    let output = buffer.contents();
    assert!(output.contains("Executing pause"));
    assert!(output.contains("Executing play"));
    assert!(output.contains("Executing eos"));
    assert!(output.contains("Back to playing"));
    assert!(!output.contains("actions were not executed"));
    assert_eq!(runner.criticals(), 0);
    assert_eq!(scenario.pending_actions(), 0);
}

#[tokio::test(start_paused = true)]
async fn seek_expressions_resolve_against_pipeline_variables() {
    let dir = TempDir::new().unwrap();
    let path = write_scenario(
        &dir,
        "expr_seek.scenario",
        "description, handles-states=true\n\
         seek, start=\"min(5.0, duration/8)\", flags=accurate+flush\n\
         stop;\n",
    );
    let pipeline = playing_pipeline(8);
    let (runner, _buffer) = buffered_runner();

    let scenario = Scenario::attach(
        Arc::clone(&pipeline) as Arc<dyn Pipeline>,
        runner,
        path.to_str().unwrap(),
    )
    .unwrap();
    let _ = scenario.run().await;

    let seeks: Vec<Event> = pipeline
        .sent_events()
        .into_iter()
        .filter(|e| matches!(e, Event::Seek { .. }))
        .collect();
    assert_eq!(seeks.len(), 1);
    match &seeks[0] {
        Event::Seek { start, flags, .. } => {
            assert_eq!(*start, Some(Duration::from_secs(1)));
            assert!(flags.contains(SeekFlags::ACCURATE | SeekFlags::FLUSH));
        }
        _ => unreachable!(),
    }
}

#[tokio::test(start_paused = true)]
async fn accurate_seek_in_pause_verifies_position() {
    let dir = TempDir::new().unwrap();
    let path = write_scenario(
        &dir,
        "paused_seek.scenario",
        "description, handles-states=true\n\
         set-state, state=paused\n\
         seek, start=10.0, flags=accurate+flush\n\
         set-vars, playback-time=20.0, never=1\n",
    );
    let pipeline = playing_pipeline(30);
    let (runner, buffer) = buffered_runner();

    let scenario = Scenario::attach(
        Arc::clone(&pipeline) as Arc<dyn Pipeline>,
        runner,
        path.to_str().unwrap(),
    )
    .unwrap();
    let handle = scenario.handle();
    let engine = tokio::spawn(scenario.run());

    tokio::time::sleep(Duration::from_millis(100)).await;
    // The pipeline lies about the post-seek position.
    pipeline.set_position(Duration::from_millis(10_200));
    tokio::time::sleep(Duration::from_millis(100)).await;

    handle.stop();
    let _ = engine.await.unwrap();
    let output = buffer.contents();
    assert_eq!(
        output.matches("position after a seek is wrong").count(),
        1,
        "expected exactly one wrong-position report:\n{}",
        output
    );
}

#[tokio::test(start_paused = true)]
async fn switch_track_on_stream_aware_pipeline() {
    let dir = TempDir::new().unwrap();
    let path = write_scenario(
        &dir,
        "switch.scenario",
        "description, handles-states=true\n\
         switch-track, type=audio, index=\"+1\"\n\
         stop;\n",
    );
    let pipeline = MockPipeline::new_playbin3("pipeline0");
    pipeline.set_media(Duration::from_secs(10));
    pipeline.set_latency(Latency {
        min: Duration::ZERO,
        max: None,
        live: false,
    });
    let _ = pipeline.set_state(State::Playing);
    pipeline.set_streams(
        vec![
            StreamInfo::new("audio-0", StreamType::Audio),
            StreamInfo::new("audio-1", StreamType::Audio),
            StreamInfo::new("video-0", StreamType::Video),
        ],
        vec![
            StreamInfo::new("audio-0", StreamType::Audio),
            StreamInfo::new("video-0", StreamType::Video),
        ],
    );
    let (runner, buffer) = buffered_runner();

    let scenario = Scenario::attach(
        Arc::clone(&pipeline) as Arc<dyn Pipeline>,
        Arc::clone(&runner),
        path.to_str().unwrap(),
    )
    .unwrap();
    let _ = scenario.run().await;

    let selected: Vec<String> = pipeline
        .selected_streams()
        .into_iter()
        .map(|s| s.id)
        .collect();
    assert!(selected.contains(&"audio-1".to_string()));
    assert!(selected.contains(&"video-0".to_string()));
    assert!(!selected.contains(&"audio-0".to_string()));
    assert_eq!(runner.criticals(), 0, "output:\n{}", buffer.contents());
}

#[tokio::test(start_paused = true)]
async fn wait_parks_until_signal_fires() {
    let dir = TempDir::new().unwrap();
    let path = write_scenario(
        &dir,
        "wait_signal.scenario",
        "description, handles-states=true\n\
         wait, target-element-name=src0, signal-name=need-data\n\
         stop;\n",
    );
    let pipeline = playing_pipeline(10);
    let src = MockElement::new("src0", "appsrc", "Source/Generic");
    pipeline.add_element(Arc::clone(&src));
    let (runner, buffer) = buffered_runner();

    let scenario = Scenario::attach(
        Arc::clone(&pipeline) as Arc<dyn Pipeline>,
        runner,
        path.to_str().unwrap(),
    )
    .unwrap();
    let engine = tokio::spawn(scenario.run());

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(
        !buffer.contents().contains("Stop waiting for signal"),
        "wait resumed without the signal"
    );

    src.emit_signal("need-data").unwrap();
    let scenario = engine.await.unwrap();

    let output = buffer.contents();
    assert_eq!(output.matches("Stop waiting for signal").count(), 1);
    assert_eq!(output.matches("Action wait done").count(), 1);
    assert_eq!(scenario.pending_actions(), 0);
}

#[tokio::test(start_paused = true)]
async fn timed_wait_resumes_after_duration() {
    let dir = TempDir::new().unwrap();
    let path = write_scenario(
        &dir,
        "wait_timer.scenario",
        "description, handles-states=true\n\
         wait, duration=1.0\n\
         stop;\n",
    );
    let pipeline = playing_pipeline(10);
    let (runner, buffer) = buffered_runner();

    let scenario =
        Scenario::attach(pipeline, runner, path.to_str().unwrap()).unwrap();
    let scenario = scenario.run().await;

    assert!(buffer.contents().contains("Stop waiting"));
    assert_eq!(scenario.pending_actions(), 0);
}

#[tokio::test(start_paused = true)]
async fn on_addition_actions_run_when_element_appears() {
    let dir = TempDir::new().unwrap();
    let path = write_scenario(
        &dir,
        "on_addition.scenario",
        "description, handles-states=true\n\
         set-property, target-element-factory-name=fakesink, property-name=sync, \
         property-value=false\n\
         set-vars, playback-time=1000.0, never=1\n",
    );
    let pipeline = playing_pipeline(10);
    let (runner, _buffer) = buffered_runner();

    let scenario = Scenario::attach(
        Arc::clone(&pipeline) as Arc<dyn Pipeline>,
        runner,
        path.to_str().unwrap(),
    )
    .unwrap();
    assert_eq!(scenario.on_addition_pending(), 1);
    let handle = scenario.handle();
    let engine = tokio::spawn(scenario.run());

    tokio::time::sleep(Duration::from_millis(50)).await;
    let sink = MockElement::new("sink0", "fakesink", "Sink/Generic");
    sink.insert_property("sync", Value::Bool(true));
    pipeline.add_element(Arc::clone(&sink));
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(sink.property("sync"), Some(Value::Bool(false)));

    handle.stop();
    let scenario = engine.await.unwrap();
    assert_eq!(scenario.on_addition_pending(), 0);
}

#[tokio::test(start_paused = true)]
async fn appsrc_push_completes_on_downstream_acceptance() {
    let dir = TempDir::new().unwrap();
    let media = dir.path().join("payload.bin");
    std::fs::write(&media, b"0123456789").unwrap();
    let path = write_scenario(
        &dir,
        "push.scenario",
        &format!(
            "description, handles-states=true\n\
             appsrc-push, target-element-name=src0, file-name=\"{}\", offset=2, size=4\n\
             stop;\n",
            media.display()
        ),
    );

    let pipeline = playing_pipeline(10);
    let src = MockElement::new("src0", "appsrc", "Source/Generic");
    let src_pad = MockPad::new("src");
    let sink_pad = MockPad::new("sink");
    MockPad::link(&src_pad, &sink_pad);
    src.add_pad(src_pad);
    pipeline.add_element(Arc::clone(&src));
    let (runner, buffer) = buffered_runner();

    let scenario = Scenario::attach(
        Arc::clone(&pipeline) as Arc<dyn Pipeline>,
        Arc::clone(&runner),
        path.to_str().unwrap(),
    )
    .unwrap();
    let scenario = scenario.run().await;

    let pushed = src.pushed_buffers();
    assert_eq!(pushed.len(), 1);
    assert_eq!(pushed[0].data, b"2345");
    assert!(buffer.contents().contains("Action appsrc-push done"));
    assert_eq!(runner.criticals(), 0);
    assert_eq!(scenario.pending_actions(), 0);
}

#[tokio::test(start_paused = true)]
async fn remote_stream_carries_action_frames_in_order() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let dir = TempDir::new().unwrap();
    let path = write_scenario(
        &dir,
        "frames.scenario",
        "description, handles-states=true\n\
         seek, playback-time=0.5, start=\"min(5.0, duration/8)\", flags=accurate+flush\n\
         seek, playback-time=3.0, start=10.0, flags=accurate+flush\n\
         stop;\n",
    );
    let pipeline = playing_pipeline(40);
    pipeline.set_position(Duration::from_millis(500));

    let mut sink = Sink::with_output(Box::new(SharedBuffer::new()));
    sink.connect_remote(&format!("tcp://{}", addr), "session-uuid").unwrap();
    let runner = Runner::new(sink);

    let scenario =
        Scenario::attach(pipeline, Arc::clone(&runner), path.to_str().unwrap()).unwrap();
    let _ = scenario.run().await;
    runner.sink().flush_remote();

    let (mut conn, _) = listener.accept().unwrap();
    conn.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
    let mut bytes = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        match conn.read(&mut chunk) {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                bytes.extend_from_slice(&chunk[..n]);
                if let Ok(frames) = decode_frames(&bytes) {
                    let dones = frames
                        .iter()
                        .filter(|f| f["type"] == "action-done")
                        .count();
                    if dones >= 2 {
                        break;
                    }
                }
            }
        }
    }

    let frames = decode_frames(&bytes).unwrap();
    assert_eq!(frames[0]["uuid"], "session-uuid");
    let kinds: Vec<(String, String)> = frames[1..]
        .iter()
        .map(|f| {
            (
                f["type"].as_str().unwrap_or_default().to_string(),
                f["action-type"].as_str().unwrap_or_default().to_string(),
            )
        })
        .collect();
    // Each seek settles (async-done) before the next one dispatches.
    let seek_events: Vec<&(String, String)> =
        kinds.iter().filter(|(_, a)| a == "seek").collect();
    assert_eq!(seek_events.len(), 4, "frames: {:?}", kinds);
    assert_eq!(seek_events[0].0, "action");
    assert_eq!(seek_events[1].0, "action-done");
    assert_eq!(seek_events[2].0, "action");
    assert_eq!(seek_events[3].0, "action-done");
}

#[tokio::test(start_paused = true)]
async fn buffering_gates_the_queue() {
    let dir = TempDir::new().unwrap();
    let path = write_scenario(
        &dir,
        "buffering.scenario",
        "description, handles-states=true\n\
         set-vars, mark=1\n\
         stop;\n",
    );
    let pipeline = playing_pipeline(10);
    let (runner, buffer) = buffered_runner();

    let scenario = Scenario::attach(
        Arc::clone(&pipeline) as Arc<dyn Pipeline>,
        runner,
        path.to_str().unwrap(),
    )
    .unwrap();
    // Buffering starts before the first tick.
    pipeline.post(BusMessage::Buffering { percent: 20 });
    let engine = tokio::spawn(scenario.run());

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!buffer.contents().contains("mark=1"), "executed while buffering");

    pipeline.post(BusMessage::Buffering { percent: 100 });
    let scenario = engine.await.unwrap();
    assert!(buffer.contents().contains("mark=1"));
    assert_eq!(scenario.pending_actions(), 0);
}
