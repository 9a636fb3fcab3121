//! Weighted aggregation of child results.
//!
//! Factors, dimensions and the analysis node all combine their children the same way,
//! tile by tile:
//!
//! 1. composite the children (later data wins) to find the union footprint;
//! 2. take presence = 1 where the composite has data, 0 elsewhere;
//! 3. fill each child with 0 where it lacks data inside the footprint;
//! 4. output = presence × Σ wᵢ·filledᵢ, nodata outside the footprint.
//!
//! A child that contributes nowhere else never lowers a cell outside the footprint, and a
//! cell where only some children have data is still scored.

use crate::error::{BackendError, WorkflowError};
use crate::raster::{Raster, NODATA};
use crate::tree::{ChildSnapshot, NodeSnapshot, NodeStatus};
use crate::workflow::context::WorkflowContext;
use crate::workflow::{TileProducer, TileRequest};
use ndarray::{Array2, Zip};
use std::path::PathBuf;
use tracing::{debug, warn};

/// Weighted sum of `layers` over their union footprint.
///
/// All layers must share a grid; they may cover different extents.
pub fn weighted_combination(layers: &[(Raster, f64)]) -> Result<Raster, BackendError> {
    let refs: Vec<&Raster> = layers.iter().map(|(raster, _)| raster).collect();
    let merged = Raster::composite(&refs)?;
    let extent = merged.extent;

    let presence: Array2<bool> = merged.data.mapv(|v| !merged.is_nodata(v));
    let mut sum = Array2::<f64>::zeros(presence.dim());

    for (raster, weight) in layers {
        let aligned = raster.window(&extent)?;
        Zip::from(&mut sum)
            .and(&aligned.data)
            .and(&presence)
            .for_each(|acc, value, present| {
                if *present && !aligned.is_nodata(*value) {
                    *acc += weight * f64::from(*value);
                }
            });
    }

    let data = Zip::from(&sum)
        .and(&presence)
        .map_collect(|acc, present| if *present { *acc as f32 } else { NODATA });
    Raster::from_array(extent, NODATA, data)
}

#[derive(Debug, Clone)]
struct WeightedInput {
    id: String,
    layer_id: String,
    directory: PathBuf,
    weight: f64,
    required: bool,
}

/// Producer for factor, dimension and analysis nodes.
#[derive(Debug)]
pub struct AggregationProducer {
    node_id: String,
    children: Vec<ChildSnapshot>,
    inputs: Vec<WeightedInput>,
}

impl AggregationProducer {
    pub fn new(node: &NodeSnapshot) -> Self {
        Self {
            node_id: node.id.clone(),
            children: node.children.clone(),
            inputs: Vec::new(),
        }
    }

    /// Number of children that will contribute, after `prepare`.
    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }

    fn resolve_inputs(&self) -> Result<Vec<WeightedInput>, WorkflowError> {
        let mut inputs = Vec::new();
        for child in &self.children {
            if child.status == NodeStatus::Excluded {
                debug!(node = %self.node_id, child = %child.id, "Skipping excluded child");
                continue;
            }
            let usable = child.status == NodeStatus::Completed
                && child.result_file.as_ref().map_or(false, |p| p.exists());
            if !usable {
                if child.required {
                    return Err(WorkflowError::AggregationInput(format!(
                        "required child '{}' of '{}' has no usable result (status {})",
                        child.id, self.node_id, child.status
                    )));
                }
                warn!(node = %self.node_id, child = %child.id, status = %child.status, "Skipping optional child without a result");
                continue;
            }
            let directory = child
                .result_file
                .as_ref()
                .and_then(|p| p.parent())
                .map(PathBuf::from)
                .unwrap_or_default();
            inputs.push(WeightedInput {
                id: child.id.clone(),
                layer_id: child.layer_id.clone(),
                directory,
                weight: child.weight,
                required: child.required,
            });
        }
        if inputs.is_empty() {
            return Err(WorkflowError::AggregationInput(format!(
                "'{}' has no usable children to aggregate",
                self.node_id
            )));
        }
        Ok(inputs)
    }
}

impl TileProducer for AggregationProducer {
    fn prepare(&mut self, _context: &WorkflowContext) -> Result<(), WorkflowError> {
        self.inputs = self.resolve_inputs()?;
        Ok(())
    }

    fn produce(&mut self, request: &TileRequest<'_>) -> Result<PathBuf, WorkflowError> {
        let index = request.tile.index;
        // every input is checked before any raster is read
        let mut sources = Vec::with_capacity(self.inputs.len());
        for input in &self.inputs {
            let path = input
                .directory
                .join(format!("{}_masked_{}.grid", input.layer_id, index));
            if path.exists() {
                sources.push((path, input.weight));
            } else if input.required {
                return Err(WorkflowError::AggregationInput(format!(
                    "required child '{}' has no masked raster for tile {}",
                    input.id, index
                )));
            } else {
                warn!(node = %self.node_id, child = %input.id, tile = index, "Optional child has no raster for tile");
            }
        }

        let mut layers = Vec::with_capacity(sources.len());
        for (path, weight) in &sources {
            layers.push((request.backend.read_raster(path)?, *weight));
        }

        let combined = if layers.is_empty() {
            Raster::empty(request.tile.bbox)
        } else {
            weighted_combination(&layers)?.window(&request.tile.bbox)?
        };
        let output = request.output_path("aggregated");
        Ok(request.backend.write_raster(&combined, &output)?)
    }
}
