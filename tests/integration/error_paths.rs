//! Construction failures and how they surface on the tree

use crate::integration::test_utils::{model_json, model_tree, test_factory, StudyArea};
use geest::config::QueueConfig;
use geest::error::{BackendError, GridError, WorkflowError};
use geest::store::default_store_path;
use geest::tree::{NodeStatus, ResultTree};
use geest::workflow::{AggregationProducer, Production, ProductionMode, Workflow};
use geest::{Phase, RunMode, WorkflowQueueManager};
use std::time::Duration;

fn aggregation_workflow(
    tree: &ResultTree,
    context: geest::WorkflowContext,
) -> Result<Workflow, WorkflowError> {
    let snapshot = tree.snapshot(tree.find("workplace").unwrap());
    let producer = AggregationProducer::new(&snapshot);
    Workflow::new(
        snapshot,
        context,
        "Factor Aggregation",
        Production::new(ProductionMode::Aggregate, producer),
    )
}

#[test]
fn missing_working_directory_is_a_configuration_error() {
    let area = StudyArea::two_parts();
    let tree = model_tree();
    let mut context = area.context();
    context.working_directory = area.working_directory().join("gone");

    let err = aggregation_workflow(&tree, context).unwrap_err();
    match err {
        WorkflowError::Configuration(message) => {
            assert!(message.contains("working directory"), "{}", message)
        }
        other => panic!("expected a configuration error, got {other}"),
    }
}

#[test]
fn missing_tile_store_is_a_configuration_error() {
    let area = StudyArea::two_parts();
    let tree = model_tree();
    let store_path = default_store_path(area.working_directory());
    std::fs::rename(&store_path, area.working_directory().join("moved.db")).unwrap();

    let err = aggregation_workflow(&tree, area.context()).unwrap_err();
    match err {
        WorkflowError::Configuration(message) => {
            assert!(message.contains("tile store"), "{}", message)
        }
        other => panic!("expected a configuration error, got {other}"),
    }
}

#[test]
fn unusable_cell_size_is_rejected_before_any_tile() {
    let area = StudyArea::two_parts();
    let tree = model_tree();
    for cell_size in [0.0, -1.0, f64::NAN] {
        let mut context = area.context();
        context.grid.cell_size = cell_size;

        let err = aggregation_workflow(&tree, context).unwrap_err();
        assert!(
            matches!(
                err,
                WorkflowError::Backend(BackendError::Grid(GridError::InvalidCellSize(_)))
            ),
            "{cell_size}: {err}"
        );
    }
    assert!(!area.working_directory().join("contextual").exists());
}

#[test]
fn factory_surfaces_configuration_errors_through_the_queue() {
    let area = StudyArea::two_parts();
    let mut tree = model_tree();
    let mut context = area.context();
    context.working_directory = area.working_directory().join("gone");

    let summary = WorkflowQueueManager::new(
        QueueConfig::default(),
        test_factory(Duration::ZERO),
        context,
    )
    .run_foreground(&mut tree, RunMode::All, &[Phase::Indicators])
    .unwrap();

    let indicators = summary.phase(Phase::Indicators).unwrap();
    assert_eq!((indicators.queued, indicators.failed), (0, 2));
    let water = tree.find("water").unwrap();
    assert_eq!(tree.status(water), NodeStatus::Error);
    assert_eq!(tree.node(water).result_text(), "Water Workflow Error");
}

#[test]
fn unknown_mode_marks_the_node_as_failed() {
    let area = StudyArea::two_parts();
    let mut document = model_json();
    document["dimensions"][0]["factors"][0]["layers"][1]["analysis_mode"] =
        serde_json::json!("use_osm_roads");
    let mut tree = ResultTree::from_json(&document).unwrap();

    let summary = WorkflowQueueManager::new(
        QueueConfig::default(),
        test_factory(Duration::ZERO),
        area.context(),
    )
    .run_foreground(&mut tree, RunMode::All, &[Phase::Indicators, Phase::Factors])
    .unwrap();

    let roads = tree.find("roads").unwrap();
    assert_eq!(tree.status(roads), NodeStatus::Error);
    let error = tree
        .attribute(roads, "error")
        .and_then(|v| v.as_str())
        .unwrap();
    assert_eq!(
        error,
        "No workflow for indicator with analysis mode 'use_osm_roads'"
    );
    assert!(!area
        .working_directory()
        .join("contextual/workplace/roads")
        .exists());

    // water still ran; the factor cannot aggregate its failed required sibling
    assert_eq!(tree.status(tree.find("water").unwrap()), NodeStatus::Completed);
    let indicators = summary.phase(Phase::Indicators).unwrap();
    assert_eq!((indicators.completed, indicators.failed), (1, 1));
    assert_eq!(summary.phase(Phase::Factors).unwrap().failed, 1);
}
