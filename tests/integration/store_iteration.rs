//! Tile store layout and iteration order

use crate::integration::test_utils::StudyArea;
use geest::error::StorageError;
use geest::geometry::Point;
use geest::store::{default_store_path, Tile, TileStore};
use geest::AreaIterator;

#[test]
fn tiles_come_back_in_insertion_order() {
    let area = StudyArea::two_parts();
    let tiles: Vec<Tile> = AreaIterator::new(&area.store)
        .iter()
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();

    assert_eq!(tiles.len(), 2);
    assert_eq!(tiles[0].name, "west");
    assert_eq!(tiles[1].name, "east");
    assert_eq!(tiles[0].index, 0);
    assert_eq!(tiles[1].index, 1);
    assert_eq!(tiles[0].progress, 50.0);
    assert_eq!(tiles[1].progress, 100.0);
}

#[test]
fn tile_extents_are_padded_and_aligned() {
    let area = StudyArea::two_parts();
    let west = AreaIterator::new(&area.store).iter().unwrap().next().unwrap().unwrap();

    assert_eq!((west.bbox.col_min, west.bbox.col_max), (-1, 2));
    assert_eq!((west.bbox.row_min, west.bbox.row_max), (-1, 2));
    assert_eq!(west.bbox.cell_size(), 1.0);
    assert!(west.clip.contains(&Point::new(0.5, 0.5)));
    assert!(!west.clip.contains(&Point::new(1.5, 0.5)));
}

#[test]
fn reopened_store_matches_built_store() {
    let area = StudyArea::two_parts();
    let path = area.store.path().to_path_buf();
    let grid = area.store.grid();
    let StudyArea { dir, store } = area;
    drop(store);

    let reopened = TileStore::open(&path).unwrap();
    assert_eq!(reopened.part_count(), 2);
    assert_eq!(reopened.grid(), grid);
    assert_eq!(reopened.bounds().bbox.max_x, 2.0);
    assert_eq!(path, default_store_path(dir.path()));
}

#[test]
fn missing_store_is_reported() {
    let dir = tempfile::TempDir::new().unwrap();
    let err = TileStore::open(default_store_path(dir.path())).unwrap_err();
    assert!(matches!(err, StorageError::StoreNotFound { .. }));
}

#[test]
fn iterator_len_matches_part_count() {
    let area = StudyArea::two_parts();
    let iterator = AreaIterator::new(&area.store);
    assert_eq!(iterator.len(), 2);
    assert!(!iterator.is_empty());
    assert_eq!(iterator.iter().unwrap().size_hint(), (2, Some(2)));
}

#[test]
fn iterating_twice_replays_the_same_tiles() {
    let area = StudyArea::two_parts();
    let iterator = AreaIterator::new(&area.store);
    let first: Vec<Tile> = iterator.iter().unwrap().collect::<Result<_, _>>().unwrap();
    let second: Vec<Tile> = iterator.iter().unwrap().collect::<Result<_, _>>().unwrap();
    assert_eq!(first, second);
}
