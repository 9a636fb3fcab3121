//! The per-node tile loop: subset, produce, mask, mosaic.

use crate::area_iterator::AreaIterator;
use crate::error::{BackendError, StorageError, WorkflowError};
use crate::progress::event::now_rfc3339;
use crate::store::Tile;
use crate::tree::node::{canceled_text, completed_text, error_text};
use crate::tree::{NodeSnapshot, NodeStatus, NodeUpdate};
use crate::workflow::context::WorkflowContext;
use crate::workflow::{Production, ProductionMode, TileInput, TileProducer, TileRequest};
use std::backtrace::Backtrace;
use std::error::Error as _;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Name of the diagnostic file a failed workflow leaves in its directory.
pub const ERROR_FILE_NAME: &str = "error.txt";

/// Final state of one run plus the update to apply to the tree.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowOutcome {
    pub status: NodeStatus,
    pub update: NodeUpdate,
}

impl WorkflowOutcome {
    pub fn succeeded(&self) -> bool {
        self.status == NodeStatus::Completed
    }
}

enum RunEnd {
    Completed(PathBuf),
    Canceled,
}

/// One node's workflow, built by [`crate::workflow::WorkflowFactory`].
///
/// States run `Created -> Running -> {Completed, Error, Canceled}`; a workflow is
/// executed at most once.
pub struct Workflow {
    node: NodeSnapshot,
    context: WorkflowContext,
    name: String,
    mode: ProductionMode,
    producer: Box<dyn TileProducer>,
    directory: PathBuf,
}

impl std::fmt::Debug for Workflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workflow")
            .field("node", &self.node.id)
            .field("name", &self.name)
            .field("mode", &self.mode.label())
            .field("directory", &self.directory)
            .finish()
    }
}

impl Workflow {
    pub fn new(
        node: NodeSnapshot,
        context: WorkflowContext,
        name: impl Into<String>,
        production: Production,
    ) -> Result<Self, WorkflowError> {
        if !context.working_directory.is_dir() {
            return Err(WorkflowError::Configuration(format!(
                "working directory {:?} does not exist",
                context.working_directory
            )));
        }
        if !context.store.path().exists() {
            return Err(WorkflowError::Configuration(format!(
                "tile store {:?} does not exist",
                context.store.path()
            )));
        }
        context.grid.validate().map_err(BackendError::from)?;
        let directory = node
            .path
            .iter()
            .fold(context.working_directory.clone(), |dir, seg| dir.join(seg));
        Ok(Self {
            node,
            context,
            name: name.into(),
            mode: production.mode,
            producer: production.producer,
            directory,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn node(&self) -> &NodeSnapshot {
        &self.node
    }

    /// The node's private working subdirectory.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Run the node over every tile. `progress` receives the percentage after each tile.
    ///
    /// Never panics on a workflow failure; failures come back as an `Error` outcome with
    /// an `error.txt` beside the node's outputs.
    pub fn execute(mut self, progress: &mut dyn FnMut(f64)) -> WorkflowOutcome {
        let start = now_rfc3339();
        info!(
            node = %self.node.id,
            workflow = %self.name,
            mode = self.mode.label(),
            directory = %self.directory.display(),
            "Workflow started"
        );
        if self.context.verbose {
            for (key, value) in &self.node.attributes {
                info!(node = %self.node.id, key = %key, value = %value, "Node attribute");
            }
        }

        let result = self.run(progress);
        let end = now_rfc3339();

        let node_id = self.node.node_id;
        match result {
            Ok(RunEnd::Completed(output)) => {
                info!(
                    node = %self.node.id,
                    workflow = %self.name,
                    output = %output.display(),
                    "Workflow completed"
                );
                WorkflowOutcome {
                    status: NodeStatus::Completed,
                    update: NodeUpdate {
                        node_id,
                        status: NodeStatus::Completed,
                        result: completed_text(&self.name),
                        result_file: output.to_string_lossy().into_owned(),
                        error: String::new(),
                        error_file: None,
                        execution_start_time: Some(start),
                        execution_end_time: Some(end),
                    },
                }
            }
            Ok(RunEnd::Canceled) => {
                info!(node = %self.node.id, workflow = %self.name, "Workflow canceled");
                WorkflowOutcome {
                    status: NodeStatus::Canceled,
                    update: NodeUpdate {
                        execution_start_time: Some(start),
                        execution_end_time: Some(end),
                        ..NodeUpdate::canceled(node_id, canceled_text(&self.name))
                    },
                }
            }
            Err(err) => {
                let message = error_chain(&err);
                error!(node = %self.node.id, workflow = %self.name, error = %message, "Workflow failed");
                let error_file = self.write_error_file(&end, &message);
                WorkflowOutcome {
                    status: NodeStatus::Error,
                    update: NodeUpdate {
                        error_file: error_file.map(|p| p.to_string_lossy().into_owned()),
                        execution_start_time: Some(start),
                        execution_end_time: Some(end),
                        ..NodeUpdate::failed(node_id, error_text(&self.name), message)
                    },
                }
            }
        }
    }

    fn run(&mut self, progress: &mut dyn FnMut(f64)) -> Result<RunEnd, WorkflowError> {
        fs::create_dir_all(&self.directory).map_err(StorageError::from)?;
        let stale = self.directory.join(ERROR_FILE_NAME);
        if stale.exists() {
            fs::remove_file(&stale).map_err(StorageError::from)?;
        }

        self.producer.prepare(&self.context)?;

        let tiles = AreaIterator::new(&self.context.store);
        let mut masked = Vec::with_capacity(tiles.len());
        for tile in tiles.iter()? {
            let tile = tile?;
            if self.context.cancel.is_canceled() {
                debug!(node = %self.node.id, tile = tile.index, "Cancel observed before tile");
                return Ok(RunEnd::Canceled);
            }
            let index = tile.index;
            let path = self
                .process_tile(&tile)
                .map_err(WorkflowError::at_tile(index))?;
            masked.push(path);
            progress(tile.progress);
        }

        if self.context.cancel.is_canceled() {
            return Ok(RunEnd::Canceled);
        }
        if masked.is_empty() {
            return Err(WorkflowError::Configuration(
                "tile store holds no tiles".to_string(),
            ));
        }

        let output = self
            .directory
            .join(format!("{}_final_combined.grid", self.node.layer_id));
        self.context.backend.mosaic(&masked, &output)?;
        Ok(RunEnd::Completed(output))
    }

    fn process_tile(&mut self, tile: &Tile) -> Result<PathBuf, WorkflowError> {
        let backend = self.context.backend.as_ref();
        let layer_id = self.node.layer_id.as_str();

        let input = match &self.mode {
            ProductionMode::Features(features) => {
                TileInput::Features(backend.subset_features(features, &tile.bbox.to_bbox())?)
            }
            ProductionMode::Raster(source) => {
                let out = self
                    .directory
                    .join(format!("{}_subset_{}.grid", layer_id, tile.index));
                TileInput::Raster(backend.subset_raster(source, &tile.bbox, &out)?)
            }
            ProductionMode::Aggregate => TileInput::Aggregate,
        };

        let request = TileRequest {
            tile,
            input: &input,
            output_dir: &self.directory,
            layer_id,
            backend,
        };
        let produced = self.producer.produce(&request)?;

        let masked = self
            .directory
            .join(format!("{}_masked_{}.grid", layer_id, tile.index));
        backend.mask(&produced, &tile.clip, &masked)?;
        debug!(node = %self.node.id, tile = tile.index, output = %masked.display(), "Tile masked");
        Ok(masked)
    }

    fn write_error_file(&self, timestamp: &str, message: &str) -> Option<PathBuf> {
        let path = self.directory.join(ERROR_FILE_NAME);
        let contents = format!(
            "{timestamp}\n{name} failed for node '{node}'\n\n{message}\n\nBacktrace:\n{trace}\n",
            name = self.name,
            node = self.node.id,
            trace = Backtrace::force_capture(),
        );
        let written = fs::create_dir_all(&self.directory).and_then(|_| fs::write(&path, contents));
        match written {
            Ok(()) => Some(path),
            Err(e) => {
                warn!(node = %self.node.id, error = %e, "Failed to write error file");
                None
            }
        }
    }
}

/// `err` followed by each of its sources, one per line. A cause whose text the previous
/// line already ends with is not repeated.
fn error_chain(err: &WorkflowError) -> String {
    let mut message = err.to_string();
    let mut last = message.clone();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !last.ends_with(&text) {
            message.push_str("\n  caused by: ");
            message.push_str(&text);
            last = text;
        }
        source = cause.source();
    }
    message
}
