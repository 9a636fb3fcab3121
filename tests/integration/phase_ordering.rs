//! Phase barriers and progress events, observed through the event bus

use crate::integration::test_utils::{model_tree, test_factory, StudyArea};
use geest::config::QueueConfig;
use geest::progress::{EventRecorder, ProgressBus, ProgressEvent};
use geest::{Phase, RunMode, WorkflowQueueManager};
use std::time::Duration;

fn seq_of<'a>(events: impl IntoIterator<Item = &'a ProgressEvent>) -> Vec<u64> {
    events.into_iter().map(|e| e.seq).collect()
}

fn phase_event<'a>(recorder: &'a EventRecorder, event_type: &'a str, phase: &str) -> &'a ProgressEvent {
    recorder
        .of_type(event_type)
        .find(|e| e.data["phase"] == phase)
        .unwrap()
}

#[tokio::test]
async fn each_phase_waits_for_the_previous_one() {
    let area = StudyArea::two_parts();
    let mut tree = model_tree();
    let (bus, rx) = ProgressBus::new_pair();
    let mut recorder = EventRecorder::new(rx);
    let manager = WorkflowQueueManager::new(
        QueueConfig { pool_size: 2 },
        test_factory(Duration::from_millis(20)),
        area.context(),
    )
    .with_progress(bus);

    let summary = manager.run(&mut tree, RunMode::All, &[]).await.unwrap();
    assert_eq!(summary.completed(), 5);
    recorder.drain();

    let events = recorder.events();
    assert_eq!(events.first().unwrap().event_type, "run_started");
    assert_eq!(events.last().unwrap().event_type, "run_completed");
    assert_eq!(events.last().unwrap().data["canceled"], false);

    let started: Vec<String> = recorder
        .of_type("phase_started")
        .map(|e| e.data["phase"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(started, vec!["indicators", "factors", "dimensions", "analysis"]);

    let phases = ["indicators", "factors", "dimensions", "analysis"];
    for pair in phases.windows(2) {
        let done = phase_event(&recorder, "phase_completed", pair[0]);
        let next = phase_event(&recorder, "phase_started", pair[1]);
        assert!(done.seq < next.seq, "{} must finish before {} starts", pair[0], pair[1]);
    }

    let indicators_done = phase_event(&recorder, "phase_completed", "indicators").seq;
    for subject in ["#3", "#4"] {
        let finished = seq_of(
            recorder
                .for_subject(subject)
                .filter(|e| e.event_type == "node_finished"),
        );
        assert_eq!(finished.len(), 1);
        assert!(finished[0] < indicators_done);
    }

    // recorded timings agree: every child ends before its parent starts
    let time = |id: &str, key: &str| {
        let node = tree.find(id).unwrap();
        tree.attribute(node, key)
            .and_then(|v| v.as_str())
            .unwrap()
            .to_string()
    };
    for (child, parent) in [
        ("water", "workplace"),
        ("roads", "workplace"),
        ("workplace", "contextual"),
        ("contextual", "analysis"),
    ] {
        assert!(
            time(child, "execution_end_time") <= time(parent, "execution_start_time"),
            "{} must end before {} starts",
            child,
            parent
        );
    }
}

#[tokio::test]
async fn node_events_follow_the_workflow_lifecycle() {
    let area = StudyArea::two_parts();
    let mut tree = model_tree();
    let (bus, rx) = ProgressBus::new_pair();
    let mut recorder = EventRecorder::new(rx);
    let manager = WorkflowQueueManager::new(
        QueueConfig::default(),
        test_factory(Duration::ZERO),
        area.context(),
    )
    .with_progress(bus);

    manager
        .run(&mut tree, RunMode::All, &[Phase::Indicators])
        .await
        .unwrap();
    recorder.drain();

    let water: Vec<&ProgressEvent> = recorder.for_subject("#3").collect();
    let types: Vec<&str> = water.iter().map(|e| e.event_type.as_str()).collect();
    assert_eq!(
        types,
        vec![
            "node_queued",
            "node_started",
            "node_progress",
            "node_progress",
            "node_finished"
        ]
    );
    assert_eq!(water[0].data["node_id"], "water");
    assert_eq!(water[2].data["progress"], 50.0);
    assert_eq!(water[3].data["progress"], 100.0);
    assert_eq!(water[4].data["success"], true);
    assert!(water[4].data["result_file"]
        .as_str()
        .unwrap()
        .ends_with("water_final_combined.grid"));
}

#[test]
fn requested_phases_run_in_model_order() {
    let area = StudyArea::two_parts();
    let mut tree = model_tree();
    let summary = WorkflowQueueManager::new(
        QueueConfig::default(),
        test_factory(Duration::ZERO),
        area.context(),
    )
    .run_foreground(
        &mut tree,
        RunMode::All,
        &[Phase::Factors, Phase::Indicators, Phase::Factors],
    )
    .unwrap();

    let order: Vec<Phase> = summary.phases.iter().map(|p| p.phase).collect();
    assert_eq!(order, vec![Phase::Indicators, Phase::Factors]);
    assert_eq!(summary.failed(), 0);
}
