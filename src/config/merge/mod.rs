//! Layer ordering and defaults.

pub mod merge_policy;
