//! Built-in defaults, the lowest configuration layer.

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError};

/// Create a builder with every default set; later sources override these.
pub fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default("working_directory", ".")?
        .set_default("grid.cell_size", 100.0)?
        .set_default("grid.origin_x", 0.0)?
        .set_default("grid.origin_y", 0.0)?
        .set_default("queue.pool_size", 1)?
        .set_default("run.verbose", false)
}
