//! Geoprocessing capability interface.
//!
//! Workflows never touch raster or vector primitives directly; they go through a
//! [`GeoBackend`]. [`NativeBackend`] is the in-process implementation on the shared grid.

pub mod native;

pub use native::NativeBackend;

use crate::error::BackendError;
use crate::features::FeatureSet;
use crate::geometry::{BBox, MultiPolygon};
use crate::grid::AlignedBBox;
use crate::raster::Raster;
use std::path::{Path, PathBuf};

pub trait GeoBackend: Send + Sync {
    /// Features whose geometry intersects `bbox`.
    fn subset_features(&self, features: &FeatureSet, bbox: &BBox) -> Result<FeatureSet, BackendError>;

    /// Window of the raster at `source` covering `extent`, written to `output`.
    fn subset_raster(
        &self,
        source: &Path,
        extent: &AlignedBBox,
        output: &Path,
    ) -> Result<PathBuf, BackendError>;

    /// Burn `features` onto a raster over `extent`.
    ///
    /// Each feature burns the value of its `field` property when given and numeric,
    /// otherwise `default_value`. Cells no feature touches are nodata.
    fn rasterize(
        &self,
        features: &FeatureSet,
        extent: &AlignedBBox,
        field: Option<&str>,
        default_value: f32,
        output: &Path,
    ) -> Result<PathBuf, BackendError>;

    /// Copy of `input` with every cell whose centre falls outside `clip` set to nodata.
    fn mask(&self, input: &Path, clip: &MultiPolygon, output: &Path) -> Result<PathBuf, BackendError>;

    /// Compose `inputs` into one raster over the union of their extents, without
    /// resampling.
    fn mosaic(&self, inputs: &[PathBuf], output: &Path) -> Result<PathBuf, BackendError>;

    fn read_raster(&self, path: &Path) -> Result<Raster, BackendError>;

    fn write_raster(&self, raster: &Raster, path: &Path) -> Result<PathBuf, BackendError>;
}
