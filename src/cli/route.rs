//! CLI route: single route table and run context.

use crate::area_iterator::AreaIterator;
use crate::backend::NativeBackend;
use crate::cli::parse::Commands;
use crate::cli::presentation::{
    format_run_summary, format_status_json, format_status_text, format_tiles_text,
    format_validation_text,
};
use crate::config::{ConfigLoader, GeestConfig};
use crate::error::{ApiError, StorageError};
use crate::features::{FeatureSet, Geometry};
use crate::queue::{Phase, RunMode, WorkflowQueueManager};
use crate::store::{default_store_path, Tile, TileStore, TileStoreBuilder};
use crate::tree::{NodeStatus, ResultTree};
use crate::workflow::{WorkflowContext, WorkflowFactory};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

pub const DEFAULT_MODEL_FILE: &str = "model.json";

/// Runtime context for CLI execution: workspace and loaded configuration.
pub struct RunContext {
    workspace_root: PathBuf,
    config: GeestConfig,
    verbose: bool,
}

impl RunContext {
    /// Load configuration from `config_path` when given, else the layered sources for
    /// `workspace_root`.
    pub fn new(workspace_root: PathBuf, config_path: Option<PathBuf>) -> Result<Self, ApiError> {
        let config = match config_path {
            Some(ref path) => ConfigLoader::load_from_file(path)?,
            None => ConfigLoader::load(&workspace_root)?,
        };
        Ok(Self::with_config(workspace_root, config.validated()?))
    }

    pub fn with_config(workspace_root: PathBuf, config: GeestConfig) -> Self {
        let verbose = config.run.verbose;
        Self {
            workspace_root,
            config,
            verbose,
        }
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose |= verbose;
        self
    }

    pub fn config(&self) -> &GeestConfig {
        &self.config
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    pub fn working_directory(&self) -> &Path {
        &self.config.working_directory
    }

    /// Execute a CLI command via the route table.
    pub fn execute(&self, command: &Commands) -> Result<String, ApiError> {
        info!(command = command.name(), "Executing command");
        match command {
            Commands::Run {
                mode,
                phases,
                model,
                foreground,
            } => self.run(*mode, phases, model.as_deref(), *foreground),
            Commands::Status { format, model } => self.status(format, model.as_deref()),
            Commands::Validate { model } => self.validate(model.as_deref()),
            Commands::Tiles => self.tiles(),
            Commands::Prepare {
                areas,
                cell_size,
                force,
            } => self.prepare(areas, *cell_size, *force),
        }
    }

    fn model_path(&self, model: Option<&Path>) -> PathBuf {
        match model {
            Some(path) if path.is_absolute() => path.to_path_buf(),
            Some(path) => self.workspace_root.join(path),
            None => self.working_directory().join(DEFAULT_MODEL_FILE),
        }
    }

    fn open_store(&self) -> Result<TileStore, ApiError> {
        Ok(TileStore::open(default_store_path(self.working_directory()))?)
    }

    fn run(
        &self,
        mode: RunMode,
        phases: &[Phase],
        model: Option<&Path>,
        foreground: bool,
    ) -> Result<String, ApiError> {
        let model_path = self.model_path(model);
        let mut tree = ResultTree::load(&model_path)?;
        let store = self.open_store()?;
        let context = WorkflowContext::new(
            self.working_directory(),
            store,
            Arc::new(NativeBackend::new()),
        )
        .with_verbose(self.verbose);
        let manager = WorkflowQueueManager::new(
            self.config.queue,
            Arc::new(WorkflowFactory::new()),
            context,
        );

        let result = if foreground {
            manager.run_foreground(&mut tree, mode, phases)
        } else {
            let rt = tokio::runtime::Runtime::new().map_err(|e| {
                ApiError::SchedulerError(format!("Failed to create tokio runtime: {}", e))
            })?;
            rt.block_on(manager.run(&mut tree, mode, phases))
        };

        // results gathered before a scheduler failure are still worth keeping
        tree.save(&model_path)?;
        let summary = result?;
        Ok(format_run_summary(&summary))
    }

    fn status(&self, format: &str, model: Option<&Path>) -> Result<String, ApiError> {
        let tree = ResultTree::load(&self.model_path(model))?;
        match format {
            "json" => format_status_json(&tree),
            "text" => Ok(format_status_text(&tree)),
            other => Err(ApiError::ConfigError(format!(
                "Invalid format: {} (must be 'text' or 'json')",
                other
            ))),
        }
    }

    fn validate(&self, model: Option<&Path>) -> Result<String, ApiError> {
        let tree = ResultTree::load(&self.model_path(model))?;
        let factory = WorkflowFactory::new();
        let issues = tree.weight_sum_issues();
        let unsupported: Vec<String> = tree
            .preorder()
            .into_iter()
            .filter(|id| tree.status(*id) != NodeStatus::Excluded)
            .filter_map(|id| {
                let node = tree.node(id);
                let mode = node.analysis_mode();
                if factory.supports(node.role, &mode) {
                    None
                } else {
                    Some(format!(
                        "{} '{}': no workflow for analysis mode '{}'",
                        node.role,
                        node.id(),
                        mode
                    ))
                }
            })
            .collect();
        Ok(format_validation_text(&issues, &unsupported))
    }

    fn tiles(&self) -> Result<String, ApiError> {
        let store = self.open_store()?;
        let tiles = AreaIterator::new(&store)
            .iter()?
            .collect::<Result<Vec<Tile>, StorageError>>()?;
        Ok(format_tiles_text(&tiles))
    }

    fn prepare(&self, areas: &Path, cell_size: Option<f64>, force: bool) -> Result<String, ApiError> {
        let mut grid_config = self.config.grid;
        if let Some(cell_size) = cell_size {
            grid_config.cell_size = cell_size;
        }
        let grid = grid_config.to_spec()?;

        let path = default_store_path(self.working_directory());
        if path.exists() {
            if !force {
                return Err(ApiError::ConfigError(format!(
                    "Tile store already exists at {} (use --force to replace it)",
                    path.display()
                )));
            }
            std::fs::remove_dir_all(&path).map_err(StorageError::from)?;
        }

        let features = FeatureSet::load(areas)?;
        let mut builder = TileStoreBuilder::create(&path, grid)?;
        for (i, feature) in features.features.into_iter().enumerate() {
            let name = feature
                .properties
                .get("name")
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| format!("part_{}", i));
            match feature.geometry {
                Geometry::Polygon(polygon) => {
                    builder.add_part(name, polygon)?;
                }
                Geometry::Point(_) => {
                    warn!(feature = i, "Skipping point feature; study areas are polygons");
                }
            }
        }
        let store = builder.finish()?;
        Ok(format!(
            "Prepared {} tile(s) at {}",
            store.part_count(),
            store.path().display()
        ))
    }
}
