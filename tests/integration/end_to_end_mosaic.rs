//! Full runs over the two-part study area, checked cell by cell

use crate::integration::test_utils::{model_tree, test_factory, StudyArea, FAILING_MODE};
use geest::backend::GeoBackend;
use geest::backend::NativeBackend;
use geest::config::QueueConfig;
use geest::raster::{read_raster, NODATA};
use geest::tree::NodeStatus;
use geest::workflow::ERROR_FILE_NAME;
use geest::{Phase, RunMode, WorkflowQueueManager};
use serde_json::json;
use std::path::Path;
use std::time::Duration;

fn manager(area: &StudyArea) -> WorkflowQueueManager {
    WorkflowQueueManager::new(
        QueueConfig::default(),
        test_factory(Duration::ZERO),
        area.context(),
    )
}

#[test]
fn indicator_mosaic_keeps_each_tile_inside_its_part() {
    let area = StudyArea::two_parts();
    let mut tree = model_tree();
    let summary = manager(&area)
        .run_foreground(&mut tree, RunMode::All, &[Phase::Indicators])
        .unwrap();
    assert_eq!(summary.completed(), 2);

    let water = tree.find("water").unwrap();
    assert_eq!(tree.status(water), NodeStatus::Completed);
    assert_eq!(
        tree.node(water).result_text(),
        "Fixed Values Workflow Completed"
    );
    let result_file = tree.node(water).result_file().unwrap().to_string();
    assert_eq!(
        Path::new(&result_file),
        area.working_directory()
            .join("contextual")
            .join("workplace")
            .join("water")
            .join("water_final_combined.grid")
    );

    let mosaic = read_raster(Path::new(&result_file)).unwrap();
    assert_eq!(mosaic.value_at(0, 0), Some(3.0));
    assert_eq!(mosaic.value_at(1, 0), Some(5.0));
    assert_eq!(mosaic.value_at(-1, 0), None);
    assert_eq!(mosaic.value_at(0, 1), None);
    assert_eq!(mosaic.value_at(2, 0), None);
    assert_eq!(mosaic.data_cells(), 2);
    assert_eq!(mosaic.nodata, NODATA);
}

#[test]
fn full_run_aggregates_up_to_the_analysis() {
    let area = StudyArea::two_parts();
    let mut tree = model_tree();
    let summary = manager(&area)
        .run_foreground(&mut tree, RunMode::All, &[])
        .unwrap();
    assert_eq!(summary.failed(), 0);
    assert_eq!(summary.completed(), 5);
    assert!(!summary.canceled);

    let backend = NativeBackend::new();
    for id in ["workplace", "contextual", "analysis"] {
        let node = tree.find(id).unwrap();
        assert_eq!(tree.status(node), NodeStatus::Completed, "{}", id);
        let raster = backend
            .read_raster(Path::new(tree.node(node).result_file().unwrap()))
            .unwrap();
        // 0.5 * water + 0.5 * roads, carried unchanged through single-child parents
        assert_eq!(raster.value_at(0, 0), Some(2.0), "{}", id);
        assert_eq!(raster.value_at(1, 0), Some(3.0), "{}", id);
        assert_eq!(raster.data_cells(), 2, "{}", id);
    }

    let analysis = tree.find("analysis").unwrap();
    assert_eq!(
        tree.node(analysis).result_text(),
        "Analysis Aggregation Workflow Completed"
    );
    assert!(area
        .working_directory()
        .join("analysis")
        .join("analysis_final_combined.grid")
        .exists());
}

#[test]
fn failing_indicator_writes_error_file_and_blocks_required_parent() {
    let area = StudyArea::two_parts();
    let mut tree = model_tree();
    let roads = tree.find("roads").unwrap();
    tree.set_attribute(roads, "analysis_mode", json!(FAILING_MODE))
        .unwrap();

    let summary = manager(&area)
        .run_foreground(&mut tree, RunMode::All, &[])
        .unwrap();

    assert_eq!(tree.status(roads), NodeStatus::Error);
    assert_eq!(
        tree.node(roads).result_text(),
        "Failing Indicator Workflow Error"
    );
    let error_file = area
        .working_directory()
        .join("contextual")
        .join("workplace")
        .join("roads")
        .join(ERROR_FILE_NAME);
    let contents = std::fs::read_to_string(&error_file).unwrap();
    assert!(contents.contains("source layer unreadable"));
    assert!(contents.contains("Tile 0 failed"));
    assert_eq!(
        tree.attribute(roads, "error_file").and_then(|v| v.as_str()),
        Some(error_file.to_string_lossy().as_ref())
    );

    // roads is required, so its factor cannot aggregate
    let workplace = tree.find("workplace").unwrap();
    assert_eq!(tree.status(workplace), NodeStatus::Error);
    let indicators = summary.phase(Phase::Indicators).unwrap();
    assert_eq!((indicators.completed, indicators.failed), (1, 1));
}

#[test]
fn optional_failed_child_is_left_out_of_the_sum() {
    let area = StudyArea::two_parts();
    let mut tree = model_tree();
    let roads = tree.find("roads").unwrap();
    tree.set_attribute(roads, "analysis_mode", json!(FAILING_MODE))
        .unwrap();
    tree.set_attribute(roads, "required", json!(false)).unwrap();

    manager(&area)
        .run_foreground(&mut tree, RunMode::All, &[Phase::Indicators, Phase::Factors])
        .unwrap();

    let workplace = tree.find("workplace").unwrap();
    assert_eq!(tree.status(workplace), NodeStatus::Completed);
    let raster = read_raster(Path::new(tree.node(workplace).result_file().unwrap())).unwrap();
    assert_eq!(raster.value_at(0, 0), Some(1.5));
    assert_eq!(raster.value_at(1, 0), Some(2.5));
}

#[test]
fn excluded_indicator_is_skipped_and_ignored_by_parent() {
    let area = StudyArea::two_parts();
    let mut tree = model_tree();
    let roads = tree.find("roads").unwrap();
    tree.set_attribute(roads, "analysis_mode", json!("Do Not Use"))
        .unwrap();

    let summary = manager(&area)
        .run_foreground(&mut tree, RunMode::All, &[Phase::Indicators, Phase::Factors])
        .unwrap();

    assert_eq!(tree.status(roads), NodeStatus::Excluded);
    assert_eq!(summary.phase(Phase::Indicators).unwrap().skipped, 1);
    let workplace = tree.find("workplace").unwrap();
    let raster = read_raster(Path::new(tree.node(workplace).result_file().unwrap())).unwrap();
    assert_eq!(raster.value_at(0, 0), Some(1.5));
}

#[test]
fn default_index_score_covers_the_whole_study_area() {
    let area = StudyArea::two_parts();
    let mut tree = model_tree();
    let water = tree.find("water").unwrap();
    tree.set_attribute(water, "analysis_mode", json!("Use Default Index Score"))
        .unwrap();
    tree.set_attribute(water, "default_index_score", json!(80))
        .unwrap();

    manager(&area)
        .run_foreground(&mut tree, RunMode::All, &[Phase::Indicators])
        .unwrap();

    assert_eq!(tree.status(water), NodeStatus::Completed);
    let raster = read_raster(Path::new(tree.node(water).result_file().unwrap())).unwrap();
    assert_eq!(raster.value_at(0, 0), Some(4.0));
    assert_eq!(raster.value_at(1, 0), Some(4.0));
    assert_eq!(raster.data_cells(), 2);
}
