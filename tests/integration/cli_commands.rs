//! CLI routes end to end: prepare, tiles, validate, run and status

use geest::cli::{Commands, RunContext};
use geest::features::{Feature, FeatureSet, Geometry};
use geest::geometry::{BBox, Point, Polygon};
use geest::raster::read_raster;
use geest::tree::{NodeStatus, ResultTree};
use geest::{ApiError, GeestConfig, RunMode};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn context(dir: &TempDir) -> RunContext {
    let mut config = GeestConfig::default();
    config.working_directory = dir.path().to_path_buf();
    config.grid.cell_size = 1.0;
    RunContext::with_config(dir.path().to_path_buf(), config)
}

fn write_areas(dir: &Path) -> PathBuf {
    let mut west = Feature::new(Geometry::Polygon(Polygon::rectangle(&BBox::new(
        0.0, 0.0, 1.0, 1.0,
    ))));
    west.properties.insert("name".to_string(), json!("west"));
    let east = Feature::new(Geometry::Polygon(Polygon::rectangle(&BBox::new(
        1.0, 0.0, 2.0, 1.0,
    ))));
    let marker = Feature::new(Geometry::Point(Point::new(0.5, 0.5)));
    let path = dir.join("areas.json");
    FeatureSet::new(vec![west, east, marker]).save(&path).unwrap();
    path
}

fn write_model(dir: &Path) -> PathBuf {
    let model = json!({
        "analysis_name": "CLI Analysis",
        "dimensions": [{
            "id": "contextual",
            "weight": 1.0,
            "factors": [{
                "id": "workplace",
                "weight": 1.0,
                "layers": [
                    {"id": "water", "weight": 0.5, "analysis_mode": "use_default_index_score", "default_index_score": 100},
                    {"id": "roads", "weight": 0.5, "analysis_mode": "use_default_index_score", "default_index_score": 40},
                    {"id": "osm", "weight": 0.0, "analysis_mode": "Do Not Use"}
                ]
            }]
        }]
    });
    let path = dir.join("model.json");
    std::fs::write(&path, serde_json::to_string_pretty(&model).unwrap()).unwrap();
    path
}

fn prepare(dir: &TempDir, force: bool) -> Result<String, ApiError> {
    context(dir).execute(&Commands::Prepare {
        areas: write_areas(dir.path()),
        cell_size: None,
        force,
    })
}

#[test]
fn prepare_builds_store_from_polygon_features() {
    let dir = TempDir::new().unwrap();
    let output = prepare(&dir, false).unwrap();
    assert!(output.contains("Prepared 2 tile(s)"), "{}", output);

    let tiles = context(&dir).execute(&Commands::Tiles).unwrap();
    assert!(tiles.contains("west"));
    assert!(tiles.contains("part_1"));
    assert!(tiles.contains("100.0%"));
}

#[test]
fn prepare_refuses_to_replace_without_force() {
    let dir = TempDir::new().unwrap();
    prepare(&dir, false).unwrap();
    assert!(matches!(prepare(&dir, false), Err(ApiError::ConfigError(_))));
    assert!(prepare(&dir, true).is_ok());
}

#[test]
fn tiles_without_store_reports_missing_store() {
    let dir = TempDir::new().unwrap();
    let err = context(&dir).execute(&Commands::Tiles).unwrap_err();
    assert!(matches!(err, ApiError::StorageError(_)), "{}", err);
}

#[test]
fn run_then_status_reports_scored_model() {
    let dir = TempDir::new().unwrap();
    prepare(&dir, false).unwrap();
    let model = write_model(dir.path());

    let output = context(&dir)
        .execute(&Commands::Run {
            mode: RunMode::All,
            phases: Vec::new(),
            model: None,
            foreground: false,
        })
        .unwrap();
    assert!(output.contains("indicators"));
    assert!(output.contains("Run completed"), "{}", output);

    let tree = ResultTree::load(&model).unwrap();
    let workplace = tree.find("workplace").unwrap();
    assert_eq!(tree.status(workplace), NodeStatus::Completed);
    let raster = read_raster(Path::new(tree.node(workplace).result_file().unwrap())).unwrap();
    assert_eq!(raster.value_at(0, 0), Some(3.5));
    assert_eq!(raster.value_at(1, 0), Some(3.5));

    let status = context(&dir)
        .execute(&Commands::Status {
            format: "json".to_string(),
            model: None,
        })
        .unwrap();
    let rows: Vec<Value> = serde_json::from_str(&status).unwrap();
    assert_eq!(rows.len(), 6);
    assert!(rows
        .iter()
        .filter(|r| r["id"] != "osm")
        .all(|r| r["status"] == "Completed"));
    assert_eq!(rows[5]["status"], "Excluded");
}

#[test]
fn foreground_run_matches_pool_run() {
    let dir = TempDir::new().unwrap();
    prepare(&dir, false).unwrap();
    let model = write_model(dir.path());

    context(&dir)
        .execute(&Commands::Run {
            mode: RunMode::All,
            phases: Vec::new(),
            model: Some(model.clone()),
            foreground: true,
        })
        .unwrap();

    let tree = ResultTree::load(&model).unwrap();
    let analysis = tree.find("analysis").unwrap();
    let raster = read_raster(Path::new(tree.node(analysis).result_file().unwrap())).unwrap();
    assert_eq!(raster.value_at(0, 0), Some(3.5));
    assert_eq!(raster.data_cells(), 2);
}

#[test]
fn validate_flags_weights_and_unknown_modes() {
    let dir = TempDir::new().unwrap();
    let model = dir.path().join("model.json");
    std::fs::write(
        &model,
        serde_json::to_string(&json!({
            "dimensions": [{
                "id": "contextual",
                "factors": [{
                    "id": "workplace",
                    "layers": [
                        {"id": "water", "weight": 0.3, "analysis_mode": "use_default_index_score"},
                        {"id": "roads", "weight": 0.3, "analysis_mode": "use_osm_roads"}
                    ]
                }]
            }]
        }))
        .unwrap(),
    )
    .unwrap();

    let output = context(&dir)
        .execute(&Commands::Validate { model: None })
        .unwrap();
    assert!(output.contains("workplace"), "{}", output);
    assert!(output.contains("use_osm_roads"), "{}", output);
    assert!(!output.contains("Model is valid"));
}
