//! Sled-backed persistence for the tile store

use crate::error::StorageError;
use crate::geometry::MultiPolygon;
use crate::grid::{AlignedBBox, GridSpec};
use crate::store::{
    sequence_key, GridCellRecord, PartRecord, StudyAreaBounds, BBOXES_LAYER, BBOX_LAYER,
    CLIP_POLYGONS_LAYER, GRID_LAYER, META_TREE, POLYGONS_LAYER,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};

const GRID_SPEC_KEY: &[u8] = b"grid_spec";
const BOUNDS_KEY: &[u8] = b"bounds";

/// Handle to an opened tile store.
///
/// Cloning is cheap; every clone shares the same database.
#[derive(Clone)]
pub struct TileStore {
    db: sled::Db,
    path: PathBuf,
    grid: GridSpec,
    bounds: StudyAreaBounds,
}

impl std::fmt::Debug for TileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileStore")
            .field("path", &self.path)
            .field("grid", &self.grid)
            .field("bounds", &self.bounds)
            .finish()
    }
}

impl TileStore {
    /// Open an existing store.
    ///
    /// Fails with [`StorageError::StoreNotFound`] when the path is missing or does not hold
    /// a complete store.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Err(StorageError::StoreNotFound {
                path,
                reason: "path does not exist".to_string(),
            });
        }
        let db = sled::open(&path).map_err(|e| StorageError::StoreNotFound {
            path: path.clone(),
            reason: format!("failed to open sled database: {}", e),
        })?;
        Self::from_db(db, path)
    }

    /// Wrap an already opened database, validating its metadata.
    pub(crate) fn from_db(db: sled::Db, path: PathBuf) -> Result<Self, StorageError> {
        let malformed = |reason: String| StorageError::StoreNotFound {
            path: path.clone(),
            reason,
        };
        let meta = open_tree(&db, META_TREE)?;
        let grid: GridSpec = read_value(&meta, GRID_SPEC_KEY)?
            .ok_or_else(|| malformed("missing grid specification".to_string()))?;
        grid.validate()
            .map_err(|e| malformed(format!("invalid grid specification: {}", e)))?;
        let bbox_tree = open_tree(&db, BBOX_LAYER)?;
        let bounds: StudyAreaBounds = read_value(&bbox_tree, BOUNDS_KEY)?
            .ok_or_else(|| malformed("missing study area bounding box".to_string()))?;

        for layer in [BBOXES_LAYER, POLYGONS_LAYER, CLIP_POLYGONS_LAYER] {
            let count = open_tree(&db, layer)?.len() as u64;
            if count != bounds.part_count {
                return Err(malformed(format!(
                    "layer {} holds {} records, expected {}",
                    layer, count, bounds.part_count
                )));
            }
        }

        Ok(Self {
            db,
            path,
            grid,
            bounds,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn grid(&self) -> GridSpec {
        self.grid
    }

    pub fn bounds(&self) -> StudyAreaBounds {
        self.bounds
    }

    /// Number of study-area parts (tiles).
    pub fn part_count(&self) -> usize {
        self.bounds.part_count as usize
    }

    pub fn part(&self, index: u64) -> Result<Option<PartRecord>, StorageError> {
        read_value(&self.tree(POLYGONS_LAYER)?, &sequence_key(index))
    }

    pub fn part_bbox(&self, index: u64) -> Result<Option<AlignedBBox>, StorageError> {
        read_value(&self.tree(BBOXES_LAYER)?, &sequence_key(index))
    }

    pub fn clip_polygon(&self, index: u64) -> Result<Option<MultiPolygon>, StorageError> {
        read_value(&self.tree(CLIP_POLYGONS_LAYER)?, &sequence_key(index))
    }

    /// Every part in insertion order.
    pub fn parts(&self) -> Result<Vec<PartRecord>, StorageError> {
        let tree = self.tree(POLYGONS_LAYER)?;
        let mut parts = Vec::with_capacity(tree.len());
        for item in tree.iter() {
            let (_, value) = item.map_err(|e| {
                StorageError::other(format!("Failed to iterate study area polygons: {}", e))
            })?;
            parts.push(decode(&value)?);
        }
        Ok(parts)
    }

    /// Every grid cell in id order.
    pub fn grid_cells(&self) -> Result<Vec<GridCellRecord>, StorageError> {
        let tree = self.tree(GRID_LAYER)?;
        let mut cells = Vec::with_capacity(tree.len());
        for item in tree.iter() {
            let (_, value) = item.map_err(|e| {
                StorageError::other(format!("Failed to iterate study area grid: {}", e))
            })?;
            cells.push(decode(&value)?);
        }
        Ok(cells)
    }

    pub(crate) fn tree(&self, name: &str) -> Result<sled::Tree, StorageError> {
        open_tree(&self.db, name)
    }

    pub fn flush(&self) -> Result<(), StorageError> {
        self.db
            .flush()
            .map_err(|e| StorageError::other(format!("Failed to flush tile store: {}", e)))?;
        Ok(())
    }
}

pub(crate) fn open_tree(db: &sled::Db, name: &str) -> Result<sled::Tree, StorageError> {
    db.open_tree(name)
        .map_err(|e| StorageError::other(format!("Failed to open layer {}: {}", name, e)))
}

pub(crate) fn read_value<T: DeserializeOwned>(
    tree: &sled::Tree,
    key: &[u8],
) -> Result<Option<T>, StorageError> {
    match tree
        .get(key)
        .map_err(|e| StorageError::other(format!("Failed to read record: {}", e)))?
    {
        Some(value) => Ok(Some(decode(&value)?)),
        None => Ok(None),
    }
}

pub(crate) fn write_value<T: Serialize>(
    tree: &sled::Tree,
    key: &[u8],
    value: &T,
) -> Result<(), StorageError> {
    let bytes = bincode::serialize(value)
        .map_err(|e| StorageError::invalid_data(format!("Failed to serialize record: {}", e)))?;
    tree.insert(key, bytes)
        .map_err(|e| StorageError::other(format!("Failed to write record: {}", e)))?;
    Ok(())
}

pub(crate) fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StorageError> {
    bincode::deserialize(bytes)
        .map_err(|e| StorageError::invalid_data(format!("Failed to deserialize record: {}", e)))
}

pub(crate) fn write_meta(
    db: &sled::Db,
    grid: &GridSpec,
    bounds: &StudyAreaBounds,
) -> Result<(), StorageError> {
    write_value(&open_tree(db, META_TREE)?, GRID_SPEC_KEY, grid)?;
    write_value(&open_tree(db, BBOX_LAYER)?, BOUNDS_KEY, bounds)
}
