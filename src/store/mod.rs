//! Study-area tile store
//!
//! Persisted container of the study area's parts: one overall bounding box, one aligned
//! bounding box, polygon and clip polygon per part, and a uniform grid layer. The store is
//! written once by the preparation step ([`TileStoreBuilder`]) and is read-only for every
//! workflow afterwards.

pub mod builder;
pub mod persistence;

pub use builder::TileStoreBuilder;
pub use persistence::TileStore;

use crate::geometry::{BBox, MultiPolygon, Polygon};
use crate::grid::AlignedBBox;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Layer holding the single overall bounding-box record
pub const BBOX_LAYER: &str = "study_area_bbox";
/// Layer holding one aligned bounding box per part
pub const BBOXES_LAYER: &str = "study_area_bboxes";
/// Layer holding one polygon per part
pub const POLYGONS_LAYER: &str = "study_area_polygons";
/// Layer holding one clip polygon per part
pub const CLIP_POLYGONS_LAYER: &str = "study_area_clip_polygons";
/// Layer holding sequentially numbered grid cells
pub const GRID_LAYER: &str = "study_area_grid";
pub(crate) const META_TREE: &str = "study_area_meta";

/// Location of the store inside a working directory.
pub fn default_store_path(working_directory: &Path) -> PathBuf {
    working_directory.join("study_area").join("study_area.db")
}

/// One part of the study area, as stored in the polygons layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartRecord {
    pub name: String,
    pub polygon: Polygon,
}

/// One cell of the uniform grid layer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridCellRecord {
    pub id: u64,
    pub col: i64,
    pub row: i64,
}

/// Summary of the overall study area.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StudyAreaBounds {
    pub bbox: BBox,
    pub part_count: u64,
}

/// A unit of work for every node workflow: one part of the study area.
///
/// Produced by [`crate::area_iterator::AreaIterator`]; immutable.
#[derive(Debug, Clone, PartialEq)]
pub struct Tile {
    /// Zero-based position in the store's insertion order
    pub index: usize,
    pub name: String,
    pub area: Polygon,
    /// Area expanded to whole grid cells
    pub clip: MultiPolygon,
    pub bbox: AlignedBBox,
    /// `(index + 1) / count * 100`
    pub progress: f64,
}

pub(crate) fn sequence_key(index: u64) -> [u8; 8] {
    index.to_be_bytes()
}
