//! Error types for the study-area scoring engine.

use std::path::PathBuf;
use thiserror::Error;

/// Storage-related errors (tile store, raster files)
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Tile store not found or unreadable at {path:?}: {reason}")]
    StoreNotFound { path: PathBuf, reason: String },

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Storage I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl StorageError {
    pub(crate) fn other(message: impl Into<String>) -> Self {
        StorageError::IoError(std::io::Error::new(
            std::io::ErrorKind::Other,
            message.into(),
        ))
    }

    pub(crate) fn invalid_data(message: impl Into<String>) -> Self {
        StorageError::IoError(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            message.into(),
        ))
    }
}

/// Grid alignment errors
#[derive(Debug, Error, PartialEq)]
pub enum GridError {
    #[error("Invalid cell size: {0} (must be finite and greater than zero)")]
    InvalidCellSize(f64),

    #[error("Invalid bounding box: {0}")]
    InvalidBBox(String),
}

/// Errors raised by the geoprocessing backend
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Raster operation failed: {0}")]
    Raster(String),

    #[error("Geometry operation failed: {0}")]
    Geometry(String),

    #[error("Extent mismatch: {0}")]
    ExtentMismatch(String),

    #[error("Grid error: {0}")]
    Grid(#[from] GridError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Errors raised while constructing or executing a node workflow
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Tile {index} failed")]
    TileProcessing {
        index: usize,
        #[source]
        source: Box<WorkflowError>,
    },

    #[error("Aggregation input error: {0}")]
    AggregationInput(String),

    #[error("No workflow for {role} with analysis mode '{mode}'")]
    UnknownMode { role: String, mode: String },

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Indicator error: {0}")]
    Indicator(#[from] anyhow::Error),
}

impl WorkflowError {
    /// Wrap an error raised while processing tile `index`.
    ///
    /// Aggregation input errors are left as they are so callers can still match on them.
    pub fn at_tile(index: usize) -> impl Fn(WorkflowError) -> WorkflowError {
        move |err| match err {
            err @ WorkflowError::AggregationInput(_) => err,
            err @ WorkflowError::TileProcessing { .. } => err,
            other => WorkflowError::TileProcessing {
                index,
                source: Box::new(other),
            },
        }
    }
}

/// Errors raised while loading, editing, or saving the result tree
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Invalid model document: {0}")]
    InvalidModel(String),

    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Model I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Model JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Top-level errors surfaced by the library facade and the CLI
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),

    #[error("Model error: {0}")]
    ModelError(#[from] ModelError),

    #[error("Workflow error: {0}")]
    WorkflowError(#[from] WorkflowError),

    #[error("Backend error: {0}")]
    BackendError(#[from] BackendError),

    #[error("Scheduler error: {0}")]
    SchedulerError(String),
}

impl From<config::ConfigError> for ApiError {
    fn from(err: config::ConfigError) -> Self {
        ApiError::ConfigError(err.to_string())
    }
}

impl From<GridError> for ApiError {
    fn from(err: GridError) -> Self {
        ApiError::ConfigError(err.to_string())
    }
}
