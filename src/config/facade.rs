//! Entry points for loading configuration.

use crate::config::merge::merge_policy;
use crate::config::sources::{environment, global_file, workspace_file};
use crate::config::GeestConfig;
use config::{ConfigError, File};
use std::path::Path;
use tracing::debug;

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load every layer for `workspace_root`. A relative working directory resolves
    /// against `workspace_root`.
    pub fn load(workspace_root: &Path) -> Result<GeestConfig, ConfigError> {
        let builder = merge_policy::builder_with_defaults()?;
        let builder = global_file::add_to_builder(builder)?;
        let builder = workspace_file::add_to_builder(builder, workspace_root)?;
        let builder = environment::add_to_builder(builder);

        let mut config: GeestConfig = builder.build()?.try_deserialize()?;
        if config.working_directory.is_relative() {
            let joined = workspace_root.join(&config.working_directory);
            config.working_directory = dunce::canonicalize(&joined).unwrap_or(joined);
        }
        debug!(
            working_directory = %config.working_directory.display(),
            cell_size = config.grid.cell_size,
            pool_size = config.queue.pool_size,
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Defaults plus a single file.
    pub fn load_from_file(path: &Path) -> Result<GeestConfig, ConfigError> {
        let builder = merge_policy::builder_with_defaults()?;
        let mut config: GeestConfig = builder
            .add_source(File::from(path))
            .build()?
            .try_deserialize()?;
        if config.working_directory.is_relative() {
            if let Some(parent) = path.parent() {
                config.working_directory = parent.join(&config.working_directory);
            }
        }
        Ok(config)
    }
}
