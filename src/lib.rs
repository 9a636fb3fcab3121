//! geest: tiled, weighted multi-criteria scoring of a study area
//!
//! A hierarchical model (analysis → dimensions → factors → indicators) scores every cell
//! of a shared raster grid on a 0-5 scale. Indicators produce rasters; every parent is a
//! weighted combination of its children. Work runs tile by tile over the parts of the
//! study area, phase by phase from the leaves up.

pub mod area_iterator;
pub mod backend;
pub mod cli;
pub mod config;
pub mod error;
pub mod features;
pub mod geometry;
pub mod grid;
pub mod logging;
pub mod progress;
pub mod queue;
pub mod raster;
pub mod store;
pub mod tree;
pub mod workflow;

pub use area_iterator::AreaIterator;
pub use config::{ConfigLoader, GeestConfig};
pub use error::ApiError;
pub use grid::{align, AlignedBBox, GridSpec};
pub use queue::{Phase, RunMode, RunSummary, WorkflowQueueManager};
pub use store::{Tile, TileStore, TileStoreBuilder};
pub use tree::{NodeId, NodeRole, NodeStatus, ResultTree};
pub use workflow::{Workflow, WorkflowContext, WorkflowFactory};
