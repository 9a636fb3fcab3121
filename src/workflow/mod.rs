//! Per-node workflows.
//!
//! A [`Workflow`] runs one tree node over every tile of the study area: subset the input
//! to the tile, produce an unmasked raster, mask it to the tile's clip geometry, and
//! finally mosaic the masked tiles into the node's result. What "produce" means is the
//! [`TileProducer`] chosen by the [`WorkflowFactory`].

pub mod aggregation;
pub mod base;
pub mod cancel;
pub mod context;
pub mod factory;
pub mod indicators;

pub use aggregation::{weighted_combination, AggregationProducer};
pub use base::{Workflow, WorkflowOutcome, ERROR_FILE_NAME};
pub use cancel::CancellationHandle;
pub use context::WorkflowContext;
pub use factory::{IndicatorPlugin, WorkflowFactory};
pub use indicators::{DefaultIndexScore, RasterLayer};

use crate::backend::GeoBackend;
use crate::error::WorkflowError;
use crate::features::FeatureSet;
use crate::store::Tile;
use std::path::{Path, PathBuf};

/// How a node obtains its per-tile input; fixed when the workflow is built.
#[derive(Debug, Clone)]
pub enum ProductionMode {
    /// Vector features, subset to each tile's bounding box
    Features(FeatureSet),
    /// A raster on the shared grid, windowed to each tile's bounding box
    Raster(PathBuf),
    /// Children's per-tile results
    Aggregate,
}

impl ProductionMode {
    pub fn label(&self) -> &'static str {
        match self {
            ProductionMode::Features(_) => "features",
            ProductionMode::Raster(_) => "raster",
            ProductionMode::Aggregate => "aggregate",
        }
    }
}

/// Input handed to the producer for one tile.
#[derive(Debug, Clone)]
pub enum TileInput {
    Features(FeatureSet),
    Raster(PathBuf),
    Aggregate,
}

/// Everything a producer may use for one tile.
pub struct TileRequest<'a> {
    pub tile: &'a Tile,
    pub input: &'a TileInput,
    /// The node's private directory; producers write nowhere else
    pub output_dir: &'a Path,
    pub layer_id: &'a str,
    pub backend: &'a dyn GeoBackend,
}

impl TileRequest<'_> {
    /// `<output_dir>/<layer_id>_<kind>_<tile index>.grid`
    pub fn output_path(&self, kind: &str) -> PathBuf {
        self.output_dir
            .join(format!("{}_{}_{}.grid", self.layer_id, kind, self.tile.index))
    }
}

/// The node-specific production step.
///
/// Implementations return the path of an unmasked raster for the requested tile, on the
/// shared grid, with values on the 0-5 scale or the nodata sentinel. They must not write
/// to the tile store.
pub trait TileProducer: Send {
    /// Runs once before the first tile.
    fn prepare(&mut self, _context: &WorkflowContext) -> Result<(), WorkflowError> {
        Ok(())
    }

    fn produce(&mut self, request: &TileRequest<'_>) -> Result<PathBuf, WorkflowError>;
}

/// A producer together with its input mode.
pub struct Production {
    pub mode: ProductionMode,
    pub producer: Box<dyn TileProducer>,
}

impl Production {
    pub fn new(mode: ProductionMode, producer: impl TileProducer + 'static) -> Self {
        Self {
            mode,
            producer: Box::new(producer),
        }
    }
}
