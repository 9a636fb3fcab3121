//! In-memory rasters on the shared grid.
//!
//! A raster is an [`AlignedBBox`] plus an `f32` array with one value per cell; array row 0
//! is the top row. Cells holding the nodata sentinel (or NaN) carry no data.

pub mod io;

pub use io::{read_raster, write_raster};

use crate::error::BackendError;
use crate::grid::AlignedBBox;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Nodata sentinel used for every raster the engine writes.
pub const NODATA: f32 = -9999.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Raster {
    pub extent: AlignedBBox,
    pub nodata: f32,
    pub data: Array2<f32>,
}

impl Raster {
    /// Raster over `extent` with every cell set to `value`.
    pub fn filled(extent: AlignedBBox, value: f32) -> Self {
        Self {
            extent,
            nodata: NODATA,
            data: Array2::from_elem((extent.height(), extent.width()), value),
        }
    }

    /// Raster over `extent` holding no data.
    pub fn empty(extent: AlignedBBox) -> Self {
        Self::filled(extent, NODATA)
    }

    pub fn from_array(extent: AlignedBBox, nodata: f32, data: Array2<f32>) -> Result<Self, BackendError> {
        if data.dim() != (extent.height(), extent.width()) {
            return Err(BackendError::Raster(format!(
                "array shape {:?} does not match extent {}x{}",
                data.dim(),
                extent.height(),
                extent.width()
            )));
        }
        Ok(Self {
            extent,
            nodata,
            data,
        })
    }

    pub fn is_nodata(&self, value: f32) -> bool {
        value.is_nan() || value == self.nodata
    }

    /// Value at grid cell `(col, row)`, `None` outside the extent or on nodata.
    pub fn value_at(&self, col: i64, row: i64) -> Option<f32> {
        let (r, c) = self.extent.array_index(col, row)?;
        let value = self.data[[r, c]];
        if self.is_nodata(value) {
            None
        } else {
            Some(value)
        }
    }

    /// Number of cells carrying data.
    pub fn data_cells(&self) -> usize {
        self.data.iter().filter(|v| !self.is_nodata(**v)).count()
    }

    /// Copy of this raster restricted (or extended) to `extent`; cells outside the source
    /// become nodata. No resampling: both extents must share a grid.
    pub fn window(&self, extent: &AlignedBBox) -> Result<Raster, BackendError> {
        ensure_same_grid(&self.extent, extent)?;
        let mut out = Raster {
            extent: *extent,
            nodata: NODATA,
            data: Array2::from_elem((extent.height(), extent.width()), NODATA),
        };
        for ((r, c), value) in out.data.indexed_iter_mut() {
            let (col, row) = extent.grid_index(r, c);
            if let Some(v) = self.value_at(col, row) {
                *value = v;
            }
        }
        Ok(out)
    }

    /// Composite `layers` over the union of their extents.
    ///
    /// Later layers overwrite earlier ones wherever they carry data; nodata never
    /// overwrites anything.
    pub fn composite(layers: &[&Raster]) -> Result<Raster, BackendError> {
        let first = layers
            .first()
            .ok_or_else(|| BackendError::Raster("nothing to composite".to_string()))?;
        let mut extent = first.extent;
        for layer in &layers[1..] {
            ensure_same_grid(&first.extent, &layer.extent)?;
            extent = extent.union(&layer.extent);
        }
        let mut out = Raster::empty(extent);
        for layer in layers {
            for ((r, c), value) in layer.data.indexed_iter() {
                if layer.is_nodata(*value) {
                    continue;
                }
                let (col, row) = layer.extent.grid_index(r, c);
                if let Some(idx) = extent.array_index(col, row) {
                    out.data[idx] = *value;
                }
            }
        }
        Ok(out)
    }
}

pub(crate) fn ensure_same_grid(a: &AlignedBBox, b: &AlignedBBox) -> Result<(), BackendError> {
    if a.same_grid(b) {
        return Ok(());
    }
    if a.grid.cell_size != b.grid.cell_size {
        return Err(BackendError::ExtentMismatch(format!(
            "mixed cell sizes {} and {}",
            a.grid.cell_size, b.grid.cell_size
        )));
    }
    Err(BackendError::ExtentMismatch(format!(
        "grids with origins ({}, {}) and ({}, {}) are not aligned",
        a.grid.origin_x, a.grid.origin_y, b.grid.origin_x, b.grid.origin_y
    )))
}
