//! Built-in indicator workflows.

use crate::error::WorkflowError;
use crate::features::{Feature, FeatureSet, Geometry};
use crate::raster::Raster;
use crate::store::TileStore;
use crate::tree::NodeSnapshot;
use crate::workflow::context::WorkflowContext;
use crate::workflow::factory::IndicatorPlugin;
use crate::workflow::{Production, ProductionMode, TileInput, TileProducer, TileRequest};
use serde_json::Value;
use std::path::{Path, PathBuf};

pub const DEFAULT_INDEX_SCORE_MODE: &str = "use_default_index_score";
pub const RASTER_LAYER_MODE: &str = "use_raster_layer";

/// Highest value on the score scale.
pub const MAX_SCORE: f32 = 5.0;

/// Scores the whole study area with the node's `default_index_score` (a percentage),
/// mapped onto the 0-5 scale.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultIndexScore;

impl DefaultIndexScore {
    /// `floor(percent / 100 * 5)`
    pub fn scale(percent: f64) -> f32 {
        ((percent / 100.0) * f64::from(MAX_SCORE)).floor() as f32
    }
}

impl IndicatorPlugin for DefaultIndexScore {
    fn name(&self) -> &str {
        "Default Index Score"
    }

    fn build(
        &self,
        node: &NodeSnapshot,
        context: &WorkflowContext,
    ) -> Result<Production, WorkflowError> {
        let percent = node.number_attr("default_index_score").ok_or_else(|| {
            WorkflowError::Configuration(format!(
                "indicator '{}' has no numeric default_index_score",
                node.id
            ))
        })?;
        if !(0.0..=100.0).contains(&percent) {
            return Err(WorkflowError::Configuration(format!(
                "default_index_score {} of '{}' is outside 0-100",
                percent, node.id
            )));
        }
        let features = study_area_features(&context.store)?;
        Ok(Production::new(
            ProductionMode::Features(features),
            ConstantBurn {
                value: Self::scale(percent),
            },
        ))
    }
}

/// The study-area parts as polygon features carrying their part name.
fn study_area_features(store: &TileStore) -> Result<FeatureSet, WorkflowError> {
    let features = store
        .parts()?
        .into_iter()
        .map(|part| {
            let mut feature = Feature::new(Geometry::Polygon(part.polygon));
            feature
                .properties
                .insert("name".to_string(), Value::from(part.name));
            feature
        })
        .collect();
    Ok(FeatureSet::new(features))
}

#[derive(Debug)]
struct ConstantBurn {
    value: f32,
}

impl TileProducer for ConstantBurn {
    fn produce(&mut self, request: &TileRequest<'_>) -> Result<PathBuf, WorkflowError> {
        let TileInput::Features(features) = request.input else {
            return Err(WorkflowError::Configuration(
                "default index score expects feature input".to_string(),
            ));
        };
        let output = request.output_path("indicator");
        Ok(request
            .backend
            .rasterize(features, &request.tile.bbox, None, self.value, &output)?)
    }
}

/// Scores with an existing raster on the shared grid, clamped to the 0-5 scale.
///
/// The source comes from the node's `raster_layer` attribute; relative paths resolve
/// against the working directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct RasterLayer;

impl RasterLayer {
    pub fn source_path(node: &NodeSnapshot, working_directory: &Path) -> Option<PathBuf> {
        let raw = node.str_attr("raster_layer")?;
        let path = PathBuf::from(raw);
        Some(if path.is_absolute() {
            path
        } else {
            working_directory.join(path)
        })
    }
}

impl IndicatorPlugin for RasterLayer {
    fn name(&self) -> &str {
        "Raster Layer"
    }

    fn build(
        &self,
        node: &NodeSnapshot,
        context: &WorkflowContext,
    ) -> Result<Production, WorkflowError> {
        let source = Self::source_path(node, &context.working_directory).ok_or_else(|| {
            WorkflowError::Configuration(format!("indicator '{}' has no raster_layer", node.id))
        })?;
        if !source.is_file() {
            return Err(WorkflowError::Configuration(format!(
                "raster layer {:?} of '{}' does not exist",
                source, node.id
            )));
        }
        Ok(Production::new(ProductionMode::Raster(source), ClampToScale))
    }
}

#[derive(Debug)]
struct ClampToScale;

impl TileProducer for ClampToScale {
    fn produce(&mut self, request: &TileRequest<'_>) -> Result<PathBuf, WorkflowError> {
        let TileInput::Raster(subset) = request.input else {
            return Err(WorkflowError::Configuration(
                "raster layer expects raster input".to_string(),
            ));
        };
        let raster = request.backend.read_raster(subset)?;
        let nodata = raster.nodata;
        let data = raster.data.mapv(|v| {
            if v.is_nan() || v == nodata {
                v
            } else {
                v.clamp(0.0, MAX_SCORE)
            }
        });
        let clamped = Raster::from_array(raster.extent, nodata, data)?;
        let output = request.output_path("indicator");
        Ok(request.backend.write_raster(&clamped, &output)?)
    }
}
