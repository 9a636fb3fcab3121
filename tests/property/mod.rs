//! Property-based test modules

mod grid_alignment;
