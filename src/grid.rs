//! Global grid definition and bounding-box alignment.
//!
//! Every raster produced anywhere in a run lives on the same grid: one origin and one cell
//! size for the whole study area. Aligned extents are stored as integer cell indices so
//! their edges are exact multiples of the cell size by construction.

use crate::error::GridError;
use crate::geometry::{BBox, MultiPolygon, Point, Polygon};
use serde::{Deserialize, Serialize};

/// Process-wide grid: origin and cell size, fixed per study area.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    pub origin_x: f64,
    pub origin_y: f64,
    pub cell_size: f64,
}

impl GridSpec {
    pub fn new(origin_x: f64, origin_y: f64, cell_size: f64) -> Result<Self, GridError> {
        validate_cell_size(cell_size)?;
        Ok(Self {
            origin_x,
            origin_y,
            cell_size,
        })
    }

    /// Reject a spec whose cell size came from an unchecked source.
    pub fn validate(&self) -> Result<(), GridError> {
        validate_cell_size(self.cell_size)
    }

    /// Align `bbox` to this grid (see [`align`]).
    pub fn align(&self, bbox: &BBox) -> Result<AlignedBBox, GridError> {
        align(bbox, self.cell_size, (self.origin_x, self.origin_y))
    }

    /// Square covered by cell `(col, row)`.
    pub fn cell_bbox(&self, col: i64, row: i64) -> BBox {
        BBox::new(
            self.origin_x + col as f64 * self.cell_size,
            self.origin_y + row as f64 * self.cell_size,
            self.origin_x + (col + 1) as f64 * self.cell_size,
            self.origin_y + (row + 1) as f64 * self.cell_size,
        )
    }

    /// Every cell whose square shares interior area with `polygon`, row-major from the
    /// bottom row.
    pub fn cells_covering(&self, polygon: &Polygon) -> Vec<(i64, i64)> {
        let Some(bbox) = polygon.bbox() else {
            return Vec::new();
        };
        let col_min = ((bbox.min_x - self.origin_x) / self.cell_size).floor() as i64;
        let col_max = ((bbox.max_x - self.origin_x) / self.cell_size).ceil() as i64;
        let row_min = ((bbox.min_y - self.origin_y) / self.cell_size).floor() as i64;
        let row_max = ((bbox.max_y - self.origin_y) / self.cell_size).ceil() as i64;

        let mut cells = Vec::new();
        for row in row_min..row_max {
            for col in col_min..col_max {
                if polygon.overlaps_cell(&self.cell_bbox(col, row)) {
                    cells.push((col, row));
                }
            }
        }
        cells
    }

    /// Polygon expanded to whole grid cells.
    ///
    /// Runs of adjacent cells in a row are merged into one rectangle.
    pub fn clip_geometry(&self, polygon: &Polygon) -> MultiPolygon {
        let cells = self.cells_covering(polygon);
        let mut parts = Vec::new();
        let mut iter = cells.into_iter().peekable();
        while let Some((start_col, row)) = iter.next() {
            let mut end_col = start_col;
            while let Some(&(next_col, next_row)) = iter.peek() {
                if next_row == row && next_col == end_col + 1 {
                    end_col = next_col;
                    iter.next();
                } else {
                    break;
                }
            }
            let first = self.cell_bbox(start_col, row);
            let last = self.cell_bbox(end_col, row);
            parts.push(Polygon::rectangle(&first.union(&last)));
        }
        MultiPolygon::new(parts)
    }
}

/// Bounding box snapped to the grid, held as an index range `[col_min, col_max)` by
/// `[row_min, row_max)` relative to the origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlignedBBox {
    pub grid: GridSpec,
    pub col_min: i64,
    pub row_min: i64,
    pub col_max: i64,
    pub row_max: i64,
}

impl AlignedBBox {
    pub fn min_x(&self) -> f64 {
        self.grid.origin_x + self.col_min as f64 * self.grid.cell_size
    }

    pub fn max_x(&self) -> f64 {
        self.grid.origin_x + self.col_max as f64 * self.grid.cell_size
    }

    pub fn min_y(&self) -> f64 {
        self.grid.origin_y + self.row_min as f64 * self.grid.cell_size
    }

    pub fn max_y(&self) -> f64 {
        self.grid.origin_y + self.row_max as f64 * self.grid.cell_size
    }

    pub fn cell_size(&self) -> f64 {
        self.grid.cell_size
    }

    /// Width in cells.
    pub fn width(&self) -> usize {
        (self.col_max - self.col_min).max(0) as usize
    }

    /// Height in cells.
    pub fn height(&self) -> usize {
        (self.row_max - self.row_min).max(0) as usize
    }

    pub fn to_bbox(&self) -> BBox {
        BBox::new(self.min_x(), self.min_y(), self.max_x(), self.max_y())
    }

    /// Grid indices `(col, row)` of the raster cell at array position `(r, c)`.
    ///
    /// Array row 0 is the top (largest y) row.
    pub fn grid_index(&self, r: usize, c: usize) -> (i64, i64) {
        (self.col_min + c as i64, self.row_max - 1 - r as i64)
    }

    /// Array position of grid cell `(col, row)` when it lies inside this extent.
    pub fn array_index(&self, col: i64, row: i64) -> Option<(usize, usize)> {
        if col < self.col_min || col >= self.col_max || row < self.row_min || row >= self.row_max {
            return None;
        }
        Some(((self.row_max - 1 - row) as usize, (col - self.col_min) as usize))
    }

    pub fn cell_center(&self, r: usize, c: usize) -> Point {
        let (col, row) = self.grid_index(r, c);
        Point::new(
            self.grid.origin_x + (col as f64 + 0.5) * self.grid.cell_size,
            self.grid.origin_y + (row as f64 + 0.5) * self.grid.cell_size,
        )
    }

    pub fn cell_bbox(&self, r: usize, c: usize) -> BBox {
        let (col, row) = self.grid_index(r, c);
        self.grid.cell_bbox(col, row)
    }

    /// Smallest extent holding both boxes. Both must share a grid.
    pub fn union(&self, other: &AlignedBBox) -> AlignedBBox {
        AlignedBBox {
            grid: self.grid,
            col_min: self.col_min.min(other.col_min),
            row_min: self.row_min.min(other.row_min),
            col_max: self.col_max.max(other.col_max),
            row_max: self.row_max.max(other.row_max),
        }
    }

    pub fn same_grid(&self, other: &AlignedBBox) -> bool {
        self.grid == other.grid
    }
}

fn validate_cell_size(cell_size: f64) -> Result<(), GridError> {
    if !cell_size.is_finite() || cell_size <= 0.0 {
        return Err(GridError::InvalidCellSize(cell_size));
    }
    Ok(())
}

/// Align `bbox` to the grid defined by `cell_size` and `origin`.
///
/// Cell indices covering `bbox` are found with floor/ceil on `(coord - origin) / cell_size`,
/// then the range is padded by exactly one cell on all four sides. Neighbouring tiles share
/// the origin, so their grids agree along shared edges.
pub fn align(bbox: &BBox, cell_size: f64, origin: (f64, f64)) -> Result<AlignedBBox, GridError> {
    validate_cell_size(cell_size)?;
    if !bbox.is_valid() {
        return Err(GridError::InvalidBBox(format!("{:?}", bbox)));
    }
    let (origin_x, origin_y) = origin;
    let col_min = ((bbox.min_x - origin_x) / cell_size).floor() as i64 - 1;
    let col_max = ((bbox.max_x - origin_x) / cell_size).ceil() as i64 + 1;
    let row_min = ((bbox.min_y - origin_y) / cell_size).floor() as i64 - 1;
    let row_max = ((bbox.max_y - origin_y) / cell_size).ceil() as i64 + 1;
    Ok(AlignedBBox {
        grid: GridSpec {
            origin_x,
            origin_y,
            cell_size,
        },
        col_min,
        row_min,
        col_max,
        row_max,
    })
}
