//! Configuration
//!
//! Layered configuration: built-in defaults, the global file, workspace files, then
//! `GEEST__SECTION__KEY` environment variables. The loaded [`GeestConfig`] is passed
//! explicitly into the queue and workflows; nothing reads configuration globally.

use crate::error::{ApiError, GridError};
use crate::grid::GridSpec;
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

mod facade;
mod merge;
mod sources;

pub use facade::ConfigLoader;
pub use sources::global_file::global_config_path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeestConfig {
    /// Directory holding the model, the study-area store and every workflow output
    #[serde(default = "default_working_directory")]
    pub working_directory: PathBuf,

    #[serde(default)]
    pub grid: GridConfig,

    #[serde(default)]
    pub queue: QueueConfig,

    #[serde(default)]
    pub run: RunConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_working_directory() -> PathBuf {
    PathBuf::from(".")
}

impl Default for GeestConfig {
    fn default() -> Self {
        Self {
            working_directory: default_working_directory(),
            grid: GridConfig::default(),
            queue: QueueConfig::default(),
            run: RunConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Shared analysis grid
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridConfig {
    #[serde(default = "default_cell_size")]
    pub cell_size: f64,
    #[serde(default)]
    pub origin_x: f64,
    #[serde(default)]
    pub origin_y: f64,
}

fn default_cell_size() -> f64 {
    100.0
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            cell_size: default_cell_size(),
            origin_x: 0.0,
            origin_y: 0.0,
        }
    }
}

impl GridConfig {
    pub fn to_spec(&self) -> Result<GridSpec, GridError> {
        GridSpec::new(self.origin_x, self.origin_y, self.cell_size)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Workflows running at once
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
}

fn default_pool_size() -> usize {
    1
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            pool_size: default_pool_size(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Log every node attribute before its workflow runs
    #[serde(default)]
    pub verbose: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    Grid(String),
    Queue(String),
    System(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Grid(msg) => write!(f, "Grid: {}", msg),
            ValidationError::Queue(msg) => write!(f, "Queue: {}", msg),
            ValidationError::System(msg) => write!(f, "System: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl GeestConfig {
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if let Err(e) = self.grid.to_spec() {
            errors.push(ValidationError::Grid(e.to_string()));
        }
        if !self.grid.origin_x.is_finite() || !self.grid.origin_y.is_finite() {
            errors.push(ValidationError::Grid("origin must be finite".to_string()));
        }
        if self.queue.pool_size == 0 {
            errors.push(ValidationError::Queue(
                "pool_size must be at least 1".to_string(),
            ));
        }
        if self.working_directory.as_os_str().is_empty() {
            errors.push(ValidationError::System(
                "working_directory cannot be empty".to_string(),
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// [`GeestConfig::validate`] folded into one error.
    pub fn validated(self) -> Result<Self, ApiError> {
        self.validate().map_err(|errors| {
            let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            ApiError::ConfigError(format!(
                "Configuration validation failed:\n{}",
                messages.join("\n")
            ))
        })?;
        Ok(self)
    }
}
