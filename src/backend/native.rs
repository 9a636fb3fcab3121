//! Pure-Rust backend working on `.grid` rasters.

use crate::backend::GeoBackend;
use crate::error::BackendError;
use crate::features::{FeatureSet, Geometry};
use crate::geometry::{BBox, MultiPolygon};
use crate::grid::AlignedBBox;
use crate::raster::{self, Raster};
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, Copy, Default)]
pub struct NativeBackend;

impl NativeBackend {
    pub fn new() -> Self {
        Self
    }
}

impl GeoBackend for NativeBackend {
    fn subset_features(&self, features: &FeatureSet, bbox: &BBox) -> Result<FeatureSet, BackendError> {
        let selected = features
            .features
            .iter()
            .filter(|f| f.geometry.bbox().map_or(false, |b| b.intersects(bbox)))
            .cloned()
            .collect();
        Ok(FeatureSet::new(selected))
    }

    fn subset_raster(
        &self,
        source: &Path,
        extent: &AlignedBBox,
        output: &Path,
    ) -> Result<PathBuf, BackendError> {
        let source = self.read_raster(source)?;
        let window = source.window(extent)?;
        self.write_raster(&window, output)
    }

    fn rasterize(
        &self,
        features: &FeatureSet,
        extent: &AlignedBBox,
        field: Option<&str>,
        default_value: f32,
        output: &Path,
    ) -> Result<PathBuf, BackendError> {
        let mut out = Raster::empty(*extent);
        for feature in &features.features {
            let value = field
                .and_then(|f| feature.number(f))
                .map(|v| v as f32)
                .unwrap_or(default_value);
            match &feature.geometry {
                Geometry::Point(p) => {
                    let grid = extent.grid;
                    let col = ((p.x - grid.origin_x) / grid.cell_size).floor() as i64;
                    let row = ((p.y - grid.origin_y) / grid.cell_size).floor() as i64;
                    if let Some(idx) = extent.array_index(col, row) {
                        out.data[idx] = value;
                    }
                }
                Geometry::Polygon(poly) => {
                    let Some(poly_bbox) = poly.bbox() else {
                        continue;
                    };
                    if !poly_bbox.intersects(&extent.to_bbox()) {
                        continue;
                    }
                    for ((r, c), cell) in out.data.indexed_iter_mut() {
                        if poly.overlaps_cell(&extent.cell_bbox(r, c)) {
                            *cell = value;
                        }
                    }
                }
            }
        }
        self.write_raster(&out, output)
    }

    fn mask(&self, input: &Path, clip: &MultiPolygon, output: &Path) -> Result<PathBuf, BackendError> {
        let mut raster = self.read_raster(input)?;
        let nodata = raster.nodata;
        let extent = raster.extent;
        let mut kept = 0usize;
        for ((r, c), value) in raster.data.indexed_iter_mut() {
            if clip.contains(&extent.cell_center(r, c)) {
                kept += 1;
            } else {
                *value = nodata;
            }
        }
        debug!(input = %input.display(), kept_cells = kept, "Masked raster to clip geometry");
        self.write_raster(&raster, output)
    }

    fn mosaic(&self, inputs: &[PathBuf], output: &Path) -> Result<PathBuf, BackendError> {
        if inputs.is_empty() {
            return Err(BackendError::Raster("mosaic needs at least one input".to_string()));
        }
        let rasters = inputs
            .iter()
            .map(|p| self.read_raster(p))
            .collect::<Result<Vec<_>, _>>()?;
        let refs: Vec<&Raster> = rasters.iter().collect();
        let merged = Raster::composite(&refs)?;
        debug!(
            inputs = inputs.len(),
            width = merged.extent.width(),
            height = merged.extent.height(),
            "Mosaicked rasters"
        );
        self.write_raster(&merged, output)
    }

    fn read_raster(&self, path: &Path) -> Result<Raster, BackendError> {
        Ok(raster::read_raster(path)?)
    }

    fn write_raster(&self, raster: &Raster, path: &Path) -> Result<PathBuf, BackendError> {
        raster::write_raster(raster, path)?;
        Ok(path.to_path_buf())
    }
}
