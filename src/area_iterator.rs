//! Lazy, restartable iteration over the tiles of a study area.

use crate::error::StorageError;
use crate::geometry::MultiPolygon;
use crate::grid::AlignedBBox;
use crate::store::persistence::decode;
use crate::store::{
    PartRecord, Tile, TileStore, BBOXES_LAYER, CLIP_POLYGONS_LAYER, POLYGONS_LAYER,
};

/// Produces [`Tile`]s from a [`TileStore`] in insertion order.
///
/// Every call to [`AreaIterator::iter`] re-reads the store layers, so iterating twice yields
/// the same sequence. The iterator never writes.
#[derive(Debug, Clone)]
pub struct AreaIterator {
    store: TileStore,
}

impl AreaIterator {
    pub fn new(store: &TileStore) -> Self {
        Self {
            store: store.clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.store.part_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> Result<Tiles, StorageError> {
        Ok(Tiles {
            polygons: self.store.tree(POLYGONS_LAYER)?.iter(),
            bboxes: self.store.tree(BBOXES_LAYER)?,
            clips: self.store.tree(CLIP_POLYGONS_LAYER)?,
            total: self.len(),
            position: 0,
        })
    }
}

/// One pass over the store; see [`AreaIterator::iter`].
pub struct Tiles {
    polygons: sled::Iter,
    bboxes: sled::Tree,
    clips: sled::Tree,
    total: usize,
    position: usize,
}

impl Tiles {
    fn read_tile(&self, key: &[u8], part: PartRecord) -> Result<Tile, StorageError> {
        let bbox: AlignedBBox = self.lookup(&self.bboxes, key, BBOXES_LAYER)?;
        let clip: MultiPolygon = self.lookup(&self.clips, key, CLIP_POLYGONS_LAYER)?;
        let index = self.position;
        Ok(Tile {
            index,
            name: part.name,
            area: part.polygon,
            clip,
            bbox,
            progress: (index + 1) as f64 / self.total as f64 * 100.0,
        })
    }

    fn lookup<T: serde::de::DeserializeOwned>(
        &self,
        tree: &sled::Tree,
        key: &[u8],
        layer: &str,
    ) -> Result<T, StorageError> {
        let value = tree
            .get(key)
            .map_err(|e| StorageError::other(format!("Failed to read {}: {}", layer, e)))?
            .ok_or_else(|| {
                StorageError::invalid_data(format!(
                    "Layer {} has no record for tile {}",
                    layer, self.position
                ))
            })?;
        decode(&value)
    }
}

impl Iterator for Tiles {
    type Item = Result<Tile, StorageError>;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.polygons.next()?;
        let result = item
            .map_err(|e| StorageError::other(format!("Failed to iterate study area: {}", e)))
            .and_then(|(key, value)| {
                let part: PartRecord = decode(&value)?;
                self.read_tile(&key, part)
            });
        self.position += 1;
        Some(result)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.total.saturating_sub(self.position);
        (remaining, Some(remaining))
    }
}
