//! Factor aggregation over real indicator outputs

use crate::integration::test_utils::{model_tree, test_factory, StudyArea};
use geest::config::QueueConfig;
use geest::raster::read_raster;
use geest::tree::{NodeStatus, ResultTree};
use geest::{Phase, RunMode, WorkflowQueueManager};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::time::Duration;

fn manager(area: &StudyArea) -> WorkflowQueueManager {
    WorkflowQueueManager::new(
        QueueConfig::default(),
        test_factory(Duration::ZERO),
        area.context(),
    )
}

fn run_indicators(area: &StudyArea, tree: &mut ResultTree) {
    let summary = manager(area)
        .run_foreground(tree, RunMode::All, &[Phase::Indicators])
        .unwrap();
    assert_eq!(summary.completed(), 2);
}

fn masked_tile(area: &StudyArea, indicator: &str, index: usize) -> PathBuf {
    area.working_directory()
        .join("contextual")
        .join("workplace")
        .join(indicator)
        .join(format!("{}_masked_{}.grid", indicator, index))
}

fn workplace_raster(tree: &ResultTree) -> geest::raster::Raster {
    let workplace = tree.find("workplace").unwrap();
    read_raster(Path::new(tree.node(workplace).result_file().unwrap())).unwrap()
}

#[test]
fn weights_scale_each_child() {
    let area = StudyArea::two_parts();
    let mut tree = model_tree();
    let water = tree.find("water").unwrap();
    let roads = tree.find("roads").unwrap();
    tree.set_weight(water, 0.8);
    tree.set_weight(roads, 0.2);
    run_indicators(&area, &mut tree);

    manager(&area)
        .run_foreground(&mut tree, RunMode::Incomplete, &[Phase::Factors])
        .unwrap();

    let raster = workplace_raster(&tree);
    let west = raster.value_at(0, 0).unwrap();
    let east = raster.value_at(1, 0).unwrap();
    assert!((west - 2.6).abs() < 1e-5, "west = {}", west);
    assert!((east - 4.2).abs() < 1e-5, "east = {}", east);
}

#[test]
fn incomplete_mode_keeps_finished_indicators() {
    let area = StudyArea::two_parts();
    let mut tree = model_tree();
    run_indicators(&area, &mut tree);
    let water = tree.find("water").unwrap();
    let before = tree.attribute(water, "execution_end_time").cloned();

    let summary = manager(&area)
        .run_foreground(&mut tree, RunMode::Incomplete, &[Phase::Indicators, Phase::Factors])
        .unwrap();

    assert_eq!(summary.phase(Phase::Indicators).unwrap().skipped, 2);
    assert_eq!(summary.phase(Phase::Factors).unwrap().completed, 1);
    assert_eq!(tree.attribute(water, "execution_end_time").cloned(), before);
}

#[test]
fn required_child_missing_a_tile_fails_the_factor() {
    let area = StudyArea::two_parts();
    let mut tree = model_tree();
    run_indicators(&area, &mut tree);
    std::fs::remove_file(masked_tile(&area, "roads", 1)).unwrap();

    manager(&area)
        .run_foreground(&mut tree, RunMode::Incomplete, &[Phase::Factors])
        .unwrap();

    let workplace = tree.find("workplace").unwrap();
    assert_eq!(tree.status(workplace), NodeStatus::Error);
    let error = tree
        .attribute(workplace, "error")
        .and_then(|v| v.as_str())
        .unwrap();
    assert!(error.contains("'roads' has no masked raster for tile 1"), "{}", error);
}

#[test]
fn optional_child_missing_a_tile_contributes_nothing_there() {
    let area = StudyArea::two_parts();
    let mut tree = model_tree();
    let roads = tree.find("roads").unwrap();
    tree.set_attribute(roads, "required", json!(false)).unwrap();
    run_indicators(&area, &mut tree);
    std::fs::remove_file(masked_tile(&area, "roads", 1)).unwrap();

    manager(&area)
        .run_foreground(&mut tree, RunMode::Incomplete, &[Phase::Factors])
        .unwrap();

    let raster = workplace_raster(&tree);
    assert_eq!(raster.value_at(0, 0), Some(2.0));
    assert_eq!(raster.value_at(1, 0), Some(2.5));
}

#[test]
fn factor_without_indicator_results_fails() {
    let area = StudyArea::two_parts();
    let mut tree = model_tree();

    let summary = manager(&area)
        .run_foreground(&mut tree, RunMode::All, &[Phase::Factors])
        .unwrap();

    assert_eq!(summary.failed(), 1);
    let workplace = tree.find("workplace").unwrap();
    assert_eq!(tree.status(workplace), NodeStatus::Error);
    assert_eq!(
        tree.node(workplace).result_text(),
        "Factor Aggregation Workflow Error"
    );
    assert!(!area
        .working_directory()
        .join("contextual")
        .join("workplace")
        .join("workplace_final_combined.grid")
        .exists());
}

fn workplace_error(tree: &ResultTree) -> String {
    let workplace = tree.find("workplace").unwrap();
    tree.attribute(workplace, "error")
        .and_then(|v| v.as_str())
        .unwrap()
        .to_string()
}

#[test]
fn canceled_required_child_fails_the_factor() {
    let area = StudyArea::two_parts();
    let mut tree = model_tree();
    let roads = tree.find("roads").unwrap();
    let indicators = manager(&area);
    indicators.cancel_node(roads);
    indicators
        .run_foreground(&mut tree, RunMode::All, &[Phase::Indicators])
        .unwrap();
    assert_eq!(tree.status(roads), NodeStatus::Canceled);

    let summary = manager(&area)
        .run_foreground(&mut tree, RunMode::Incomplete, &[Phase::Factors])
        .unwrap();

    assert_eq!(summary.failed(), 1);
    let workplace = tree.find("workplace").unwrap();
    assert_eq!(tree.status(workplace), NodeStatus::Error);
    let error = workplace_error(&tree);
    assert!(error.starts_with("Aggregation input error"), "{}", error);
    assert!(error.contains("'roads'") && error.contains("Canceled"), "{}", error);

    let error_file = tree
        .attribute(workplace, "error_file")
        .and_then(|v| v.as_str())
        .unwrap();
    assert!(error_file.ends_with("error.txt"));
    let contents = std::fs::read_to_string(error_file).unwrap();
    assert!(contents.contains("Factor Aggregation failed for node 'workplace'"));
    assert!(contents.contains("'roads'"));
    // nothing was merged before the input check failed
    assert!(!area
        .working_directory()
        .join("contextual/workplace/workplace_aggregated_0.grid")
        .exists());
}

#[test]
fn canceled_child_with_leftover_outputs_is_still_missing() {
    let area = StudyArea::two_parts();
    let mut tree = model_tree();
    run_indicators(&area, &mut tree);
    let roads = tree.find("roads").unwrap();
    // a later canceled attempt leaves the earlier mosaic and tiles on disk
    tree.set_result_text(roads, "Fixed Values Workflow Canceled");
    assert!(tree.node(roads).result_file().is_some());
    assert!(masked_tile(&area, "roads", 0).exists());

    manager(&area)
        .run_foreground(&mut tree, RunMode::Incomplete, &[Phase::Factors])
        .unwrap();

    let workplace = tree.find("workplace").unwrap();
    assert_eq!(tree.status(workplace), NodeStatus::Error);
    assert!(workplace_error(&tree).contains("status Canceled"));
}

#[test]
fn canceled_optional_child_is_left_out() {
    let area = StudyArea::two_parts();
    let mut tree = model_tree();
    run_indicators(&area, &mut tree);
    let roads = tree.find("roads").unwrap();
    tree.set_attribute(roads, "required", json!(false)).unwrap();
    tree.set_result_text(roads, "Fixed Values Workflow Canceled");

    manager(&area)
        .run_foreground(&mut tree, RunMode::Incomplete, &[Phase::Factors])
        .unwrap();

    // water alone at weight 0.5
    let raster = workplace_raster(&tree);
    assert_eq!(raster.value_at(0, 0), Some(1.5));
    assert_eq!(raster.value_at(1, 0), Some(2.5));
}
