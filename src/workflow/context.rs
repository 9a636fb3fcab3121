//! Inputs shared by every workflow of a run.

use crate::backend::GeoBackend;
use crate::grid::GridSpec;
use crate::store::TileStore;
use crate::workflow::cancel::CancellationHandle;
use std::path::PathBuf;
use std::sync::Arc;

/// Working directory, read-only tile store, global grid, backend and the node's cancel
/// flag.
#[derive(Clone)]
pub struct WorkflowContext {
    pub working_directory: PathBuf,
    pub store: TileStore,
    pub grid: GridSpec,
    pub backend: Arc<dyn GeoBackend>,
    pub cancel: CancellationHandle,
    /// Log every node attribute before running
    pub verbose: bool,
}

impl WorkflowContext {
    pub fn new(
        working_directory: impl Into<PathBuf>,
        store: TileStore,
        backend: Arc<dyn GeoBackend>,
    ) -> Self {
        let grid = store.grid();
        Self {
            working_directory: working_directory.into(),
            store,
            grid,
            backend,
            cancel: CancellationHandle::new(),
            verbose: false,
        }
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Same context with a different cancel flag.
    pub fn with_cancel(&self, cancel: CancellationHandle) -> Self {
        Self {
            cancel,
            ..self.clone()
        }
    }
}

impl std::fmt::Debug for WorkflowContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowContext")
            .field("working_directory", &self.working_directory)
            .field("store", &self.store)
            .field("grid", &self.grid)
            .field("verbose", &self.verbose)
            .finish()
    }
}
