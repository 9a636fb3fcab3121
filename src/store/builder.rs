//! Preparation-time writer for the tile store.
//!
//! Parts are appended in call order; that order is the tile order every workflow sees.

use crate::error::{ApiError, StorageError};
use crate::geometry::{BBox, Polygon};
use crate::grid::GridSpec;
use crate::store::persistence::{open_tree, write_meta, write_value, TileStore};
use crate::store::{
    sequence_key, GridCellRecord, PartRecord, StudyAreaBounds, BBOXES_LAYER,
    CLIP_POLYGONS_LAYER, GRID_LAYER, POLYGONS_LAYER,
};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub struct TileStoreBuilder {
    db: sled::Db,
    path: PathBuf,
    grid: GridSpec,
    bbox: Option<BBox>,
    part_count: u64,
    cells: BTreeSet<(i64, i64)>,
}

impl TileStoreBuilder {
    /// Create a fresh store at `path`. Fails if a store already exists there.
    pub fn create<P: AsRef<Path>>(path: P, grid: GridSpec) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        if path.exists() {
            return Err(StorageError::InvalidPath(format!(
                "Tile store already exists at {}",
                path.display()
            )));
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = sled::open(&path)
            .map_err(|e| StorageError::other(format!("Failed to create tile store: {}", e)))?;
        Ok(Self {
            db,
            path,
            grid,
            bbox: None,
            part_count: 0,
            cells: BTreeSet::new(),
        })
    }

    /// Append one part of the study area.
    pub fn add_part(&mut self, name: impl Into<String>, polygon: Polygon) -> Result<u64, ApiError> {
        let name = name.into();
        let part_bbox = polygon.bbox().ok_or_else(|| {
            ApiError::ConfigError(format!("Study area part '{}' has no vertices", name))
        })?;
        let aligned = self.grid.align(&part_bbox)?;
        let clip = self.grid.clip_geometry(&polygon);
        let index = self.part_count;
        let key = sequence_key(index);

        for (col, row) in self.grid.cells_covering(&polygon) {
            self.cells.insert((row, col));
        }

        write_value(&open_tree(&self.db, BBOXES_LAYER)?, &key, &aligned)?;
        write_value(
            &open_tree(&self.db, POLYGONS_LAYER)?,
            &key,
            &PartRecord {
                name: name.clone(),
                polygon,
            },
        )?;
        write_value(&open_tree(&self.db, CLIP_POLYGONS_LAYER)?, &key, &clip)?;

        self.bbox = Some(match self.bbox {
            Some(existing) => existing.union(&part_bbox),
            None => part_bbox,
        });
        self.part_count += 1;
        debug!(part = %name, index, clip_parts = clip.polygons.len(), "Added study area part");
        Ok(index)
    }

    /// Write the overall bounding box and grid layer, then hand back a read handle.
    pub fn finish(self) -> Result<TileStore, ApiError> {
        let bbox = self.bbox.ok_or_else(|| {
            ApiError::ConfigError("Study area has no parts; nothing to store".to_string())
        })?;

        let grid_tree = open_tree(&self.db, GRID_LAYER)?;
        for (id, (row, col)) in self.cells.iter().enumerate() {
            let id = id as u64;
            write_value(
                &grid_tree,
                &sequence_key(id),
                &GridCellRecord {
                    id,
                    col: *col,
                    row: *row,
                },
            )?;
        }

        let bounds = StudyAreaBounds {
            bbox,
            part_count: self.part_count,
        };
        write_meta(&self.db, &self.grid, &bounds)?;
        self.db
            .flush()
            .map_err(|e| StorageError::other(format!("Failed to flush tile store: {}", e)))?;

        info!(
            path = %self.path.display(),
            parts = self.part_count,
            grid_cells = self.cells.len(),
            cell_size = self.grid.cell_size,
            "Tile store written"
        );
        Ok(TileStore::from_db(self.db, self.path)?)
    }
}
