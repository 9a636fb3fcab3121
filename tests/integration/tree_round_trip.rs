//! Model documents survive load, run, save and reload

use crate::integration::test_utils::{model_json, test_factory, StudyArea};
use geest::config::QueueConfig;
use geest::tree::{NodeRole, NodeStatus, ResultTree};
use geest::{Phase, RunMode, WorkflowQueueManager};
use serde_json::{json, Value};
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn unknown_attributes_and_key_order_survive_a_save() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("model.json");
    let document = json!({
        "analysis_name": "Kigali",
        "description": "kept verbatim",
        "dimensions": [{
            "id": "Contextual",
            "guid": "f00d",
            "factors": [],
            "dimension_weighting": 1.0
        }],
        "analysis_cell_size_m": 100
    });

    let tree = ResultTree::from_json(&document).unwrap();
    tree.save(&path).unwrap();

    let saved: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(saved, document);
    let keys: Vec<&String> = saved.as_object().unwrap().keys().collect();
    assert_eq!(
        keys,
        vec!["analysis_name", "description", "dimensions", "analysis_cell_size_m"]
    );
    let dimension_keys: Vec<&String> = saved["dimensions"][0].as_object().unwrap().keys().collect();
    assert_eq!(
        dimension_keys,
        vec!["id", "guid", "factors", "dimension_weighting"]
    );
}

#[test]
fn run_results_are_written_back_and_reload() {
    let area = StudyArea::two_parts();
    let path = area.working_directory().join("model.json");
    std::fs::write(&path, serde_json::to_string_pretty(&model_json()).unwrap()).unwrap();

    let mut tree = ResultTree::load(&path).unwrap();
    WorkflowQueueManager::new(
        QueueConfig::default(),
        test_factory(Duration::ZERO),
        area.context(),
    )
    .run_foreground(&mut tree, RunMode::All, &[Phase::Indicators])
    .unwrap();
    tree.save(&path).unwrap();

    let reloaded = ResultTree::load(&path).unwrap();
    let water = reloaded.find("water").unwrap();
    assert_eq!(reloaded.status(water), NodeStatus::Completed);
    assert!(reloaded.node(water).result_file().unwrap().ends_with("water_final_combined.grid"));
    assert!(reloaded.attribute(water, "execution_start_time").is_some());
    assert_eq!(
        reloaded.attribute(water, "tile_values"),
        Some(&json!([3, 5]))
    );
    assert_eq!(reloaded.nodes_with_role(NodeRole::Indicator).len(), 2);
    assert_eq!(reloaded.status(reloaded.find("workplace").unwrap()), NodeStatus::NotRun);
}

#[test]
fn full_rerun_clears_previous_results_first() {
    let area = StudyArea::two_parts();
    let mut tree = ResultTree::from_json(&model_json()).unwrap();
    let workplace = tree.find("workplace").unwrap();
    tree.set_attribute(workplace, "result", json!("Factor Aggregation Workflow Completed"))
        .unwrap();
    tree.set_attribute(workplace, "result_file", json!("/stale/workplace.grid"))
        .unwrap();

    WorkflowQueueManager::new(
        QueueConfig::default(),
        test_factory(Duration::ZERO),
        area.context(),
    )
    .run_foreground(&mut tree, RunMode::All, &[Phase::Indicators])
    .unwrap();

    assert_eq!(tree.status(workplace), NodeStatus::NotRun);
    assert!(tree.node(workplace).result_file().is_none());
}

#[test]
fn legacy_weights_are_read_and_updated() {
    let mut tree = ResultTree::from_json(&json!({
        "dimensions": [{
            "id": "accessibility",
            "factors": [
                {"id": "a", "factor_weighting": "0.25"},
                {"id": "b", "factor_weighting": 0.75}
            ]
        }]
    }))
    .unwrap();
    let a = tree.find("a").unwrap();
    assert_eq!(tree.weight(a), 0.25);

    tree.set_weight(a, 0.5);
    assert_eq!(tree.attribute(a, "factor_weighting"), Some(&json!(0.5)));
    assert_eq!(tree.attribute(a, "weight"), Some(&json!(0.5)));
}
