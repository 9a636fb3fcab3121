//! Property-based tests for grid alignment

use geest::geometry::BBox;
use geest::grid::{align, GridSpec};
use geest::Phase;
use proptest::prelude::*;

fn on_grid(value: f64, origin: f64, cell_size: f64) -> bool {
    let steps = (value - origin) / cell_size;
    (steps - steps.round()).abs() < 1e-6
}

/// Aligned edges sit on the grid and the aligned box covers the input with one cell of
/// padding on every side.
#[test]
fn test_align_snaps_and_pads() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(
            &(
                -1.0e4..1.0e4f64,
                -1.0e4..1.0e4f64,
                0.0..500.0f64,
                0.0..500.0f64,
                0.5..250.0f64,
                -100.0..100.0f64,
                -100.0..100.0f64,
            ),
            |(min_x, min_y, w, h, cell_size, origin_x, origin_y)| {
                let bbox = BBox::new(min_x, min_y, min_x + w, min_y + h);
                let aligned = align(&bbox, cell_size, (origin_x, origin_y)).unwrap();

                assert!(on_grid(aligned.min_x(), origin_x, cell_size));
                assert!(on_grid(aligned.max_x(), origin_x, cell_size));
                assert!(on_grid(aligned.min_y(), origin_y, cell_size));
                assert!(on_grid(aligned.max_y(), origin_y, cell_size));

                let eps = cell_size * 1e-9;
                assert!(aligned.min_x() + cell_size <= bbox.min_x + eps);
                assert!(aligned.max_x() - cell_size >= bbox.max_x - eps);
                assert!(aligned.min_y() + cell_size <= bbox.min_y + eps);
                assert!(aligned.max_y() - cell_size >= bbox.max_y - eps);
                assert!(aligned.width() >= 2 && aligned.height() >= 2);

                Ok(())
            },
        )
        .unwrap();
}

/// Neighbouring tiles aligned on one grid land on the same cell lattice.
#[test]
fn test_neighbouring_tiles_share_the_lattice() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(
            &(0.0..1000.0f64, 1.0..300.0f64, 1.0..300.0f64, 1.0..50.0f64),
            |(split, left_w, right_w, cell_size)| {
                let grid = GridSpec::new(0.0, 0.0, cell_size).unwrap();
                let left = grid
                    .align(&BBox::new(split - left_w, 0.0, split, 10.0))
                    .unwrap();
                let right = grid
                    .align(&BBox::new(split, 0.0, split + right_w, 10.0))
                    .unwrap();

                assert!(left.same_grid(&right));
                let union = left.union(&right);
                assert_eq!(union.col_min, left.col_min);
                assert_eq!(union.col_max, right.col_max);
                // the shared edge is inside both padded extents
                assert!(left.max_x() > split && right.min_x() < split);

                Ok(())
            },
        )
        .unwrap();
}

/// Requested phases always come back sorted, deduplicated and non-empty.
#[test]
fn test_phase_order_is_canonical() {
    let mut runner = proptest::test_runner::TestRunner::default();
    let phase = prop_oneof![
        Just(Phase::Indicators),
        Just(Phase::Factors),
        Just(Phase::Dimensions),
        Just(Phase::Analysis),
    ];

    runner
        .run(&prop::collection::vec(phase, 0..8), |requested| {
            let ordered = Phase::ordered(&requested);
            assert!(!ordered.is_empty());
            assert!(ordered.windows(2).all(|w| w[0] < w[1]));
            assert_eq!(Phase::ordered(&ordered), ordered);
            for p in &requested {
                assert!(ordered.contains(p));
            }
            Ok(())
        })
        .unwrap();
}
