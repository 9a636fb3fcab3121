//! Phase-batched workflow scheduling.
//!
//! The manager turns each node of a phase into a [`Workflow`], dispatches them in FIFO
//! order onto a bounded worker pool, and applies every outcome to the tree itself. Workers
//! never touch the tree; they report through [`QueueMessage`]s.

pub mod phase;

pub use phase::{Phase, RunMode};

use crate::config::QueueConfig;
use crate::error::ApiError;
use crate::progress::event::{
    NODE_CANCELED, NODE_FINISHED, NODE_PROGRESS, NODE_QUEUED, NODE_STARTED, PHASE_COMPLETED,
    PHASE_STARTED, RUN_COMPLETED, RUN_STARTED,
};
use crate::progress::{NodeEventData, PhaseEventData, ProgressBus, RunEventData};
use crate::tree::node::{canceled_text, error_text, RESULT_QUEUED, RESULT_RUNNING};
use crate::tree::{NodeId, NodeStatus, NodeUpdate, ResultTree};
use crate::workflow::{CancellationHandle, Workflow, WorkflowContext, WorkflowFactory, WorkflowOutcome};
use futures::stream::{FuturesUnordered, StreamExt};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, info, warn};

const RUN_SUBJECT: &str = "run";

/// Worker-to-owner messages.
#[derive(Debug)]
pub enum QueueMessage {
    Started { node_id: NodeId },
    Progress { node_id: NodeId, percent: f64 },
    Finished { outcome: WorkflowOutcome },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhaseSummary {
    pub phase: Phase,
    pub queued: usize,
    pub completed: usize,
    pub failed: usize,
    pub canceled: usize,
    pub skipped: usize,
}

impl PhaseSummary {
    fn new(phase: Phase) -> Self {
        Self {
            phase,
            queued: 0,
            completed: 0,
            failed: 0,
            canceled: 0,
            skipped: 0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub phases: Vec<PhaseSummary>,
    /// Whether cancel-all stopped the run
    pub canceled: bool,
}

impl RunSummary {
    pub fn completed(&self) -> usize {
        self.phases.iter().map(|p| p.completed).sum()
    }

    pub fn failed(&self) -> usize {
        self.phases.iter().map(|p| p.failed).sum()
    }

    pub fn canceled_nodes(&self) -> usize {
        self.phases.iter().map(|p| p.canceled).sum()
    }

    pub fn phase(&self, phase: Phase) -> Option<&PhaseSummary> {
        self.phases.iter().find(|p| p.phase == phase)
    }
}

/// Cancels queued or running workflows from any thread.
///
/// Canceling a node that has not been queued yet marks it so its workflow is canceled as
/// soon as it is created. Requests made between runs apply to the next run; every run
/// leaves the canceller clear when it ends.
#[derive(Debug, Clone, Default)]
pub struct QueueCanceller {
    all: Arc<Mutex<CancellationHandle>>,
    nodes: Arc<Mutex<HashMap<NodeId, CancellationHandle>>>,
    pending: Arc<Mutex<HashSet<NodeId>>>,
}

impl QueueCanceller {
    pub fn cancel_node(&self, node_id: NodeId) {
        match self.nodes.lock().get(&node_id) {
            Some(handle) => handle.cancel(),
            None => {
                self.pending.lock().insert(node_id);
            }
        }
        debug!(node_id = %node_id, "Node cancel requested");
    }

    /// Cancel every running workflow and stop dispatching new ones.
    pub fn cancel_all(&self) {
        self.all.lock().cancel();
        info!("Cancel all requested");
    }

    pub fn all_canceled(&self) -> bool {
        self.all.lock().is_canceled()
    }

    /// Drop every cancel request: a fresh run-level flag, no node handles, nothing pending.
    pub fn reset(&self) {
        *self.all.lock() = CancellationHandle::new();
        self.nodes.lock().clear();
        self.pending.lock().clear();
    }

    fn handle_for(&self, node_id: NodeId) -> CancellationHandle {
        let handle = self.all.lock().child();
        if self.pending.lock().remove(&node_id) {
            handle.cancel();
        }
        self.nodes.lock().insert(node_id, handle.clone());
        handle
    }
}

struct Job {
    node_id: NodeId,
    workflow: Workflow,
    cancel: CancellationHandle,
}

pub struct WorkflowQueueManager {
    config: QueueConfig,
    factory: Arc<WorkflowFactory>,
    context: WorkflowContext,
    progress: Option<ProgressBus>,
    canceller: QueueCanceller,
}

impl WorkflowQueueManager {
    pub fn new(config: QueueConfig, factory: Arc<WorkflowFactory>, context: WorkflowContext) -> Self {
        Self {
            config,
            factory,
            context,
            progress: None,
            canceller: QueueCanceller::default(),
        }
    }

    pub fn with_progress(mut self, bus: ProgressBus) -> Self {
        self.progress = Some(bus);
        self
    }

    pub fn canceller(&self) -> QueueCanceller {
        self.canceller.clone()
    }

    pub fn cancel_node(&self, node_id: NodeId) {
        self.canceller.cancel_node(node_id);
    }

    pub fn cancel_all(&self) {
        self.canceller.cancel_all();
    }

    /// Run `phases` (all four when empty) on the worker pool.
    pub async fn run(
        &self,
        tree: &mut ResultTree,
        mode: RunMode,
        phases: &[Phase],
    ) -> Result<RunSummary, ApiError> {
        let phases = self.begin_run(tree, mode, phases);
        let mut summary = RunSummary::default();
        for phase in phases {
            if self.canceller.all_canceled() {
                summary.canceled = true;
                break;
            }
            let (mut phase_summary, jobs) = self.plan_phase(tree, mode, phase);
            let (tx, mut rx) = mpsc::unbounded_channel();
            let dispatcher = tokio::spawn(dispatch(
                jobs,
                Arc::new(Semaphore::new(self.config.pool_size.max(1))),
                tx,
            ));
            while let Some(message) = rx.recv().await {
                self.apply_message(tree, &mut phase_summary, message);
            }
            if let Err(e) = dispatcher.await {
                self.canceller.reset();
                return Err(ApiError::SchedulerError(format!("dispatcher failed: {e}")));
            }
            self.finish_phase(&phase_summary);
            summary.phases.push(phase_summary);
        }
        summary.canceled |= self.canceller.all_canceled();
        self.finish_run(mode, &summary);
        Ok(summary)
    }

    /// Run the same queue inline on the caller's thread, one workflow at a time.
    pub fn run_foreground(
        &self,
        tree: &mut ResultTree,
        mode: RunMode,
        phases: &[Phase],
    ) -> Result<RunSummary, ApiError> {
        let phases = self.begin_run(tree, mode, phases);
        let mut summary = RunSummary::default();
        for phase in phases {
            if self.canceller.all_canceled() {
                summary.canceled = true;
                break;
            }
            let (mut phase_summary, jobs) = self.plan_phase(tree, mode, phase);
            for job in jobs {
                let Job {
                    node_id,
                    workflow,
                    cancel,
                } = job;
                if cancel.is_canceled() {
                    let outcome = canceled_before_start(node_id, &workflow);
                    self.apply_message(tree, &mut phase_summary, QueueMessage::Finished { outcome });
                    continue;
                }
                self.apply_message(tree, &mut phase_summary, QueueMessage::Started { node_id });
                let mut progress = |percent: f64| self.emit_progress(tree_node_label(node_id), percent);
                let outcome = workflow.execute(&mut progress);
                self.apply_message(tree, &mut phase_summary, QueueMessage::Finished { outcome });
            }
            self.finish_phase(&phase_summary);
            summary.phases.push(phase_summary);
        }
        summary.canceled |= self.canceller.all_canceled();
        self.finish_run(mode, &summary);
        Ok(summary)
    }

    fn begin_run(&self, tree: &mut ResultTree, mode: RunMode, phases: &[Phase]) -> Vec<Phase> {
        let phases = Phase::ordered(phases);
        info!(mode = mode.as_str(), phases = ?phases, pool_size = self.config.pool_size, "Run started");
        if mode == RunMode::All {
            tree.clear_all_results();
        }
        self.emit(
            RUN_SUBJECT,
            RUN_STARTED,
            &RunEventData {
                mode: mode.as_str().to_string(),
                phases: phases.iter().map(|p| p.as_str().to_string()).collect(),
                canceled: None,
            },
        );
        phases
    }

    /// Build workflows for every runnable node of `phase`, in tree order.
    fn plan_phase(
        &self,
        tree: &mut ResultTree,
        mode: RunMode,
        phase: Phase,
    ) -> (PhaseSummary, VecDeque<Job>) {
        let mut summary = PhaseSummary::new(phase);
        let mut jobs = VecDeque::new();
        for node_id in tree.nodes_with_role(phase.role()) {
            if tree.status(node_id) == NodeStatus::Excluded {
                summary.skipped += 1;
                continue;
            }
            if mode == RunMode::Incomplete && tree.node(node_id).result_file().is_some() {
                summary.skipped += 1;
                continue;
            }
            let cancel = self.canceller.handle_for(node_id);
            let context = self.context.with_cancel(cancel.clone());
            match self.factory.create(tree.snapshot(node_id), context) {
                Ok(workflow) => {
                    tree.set_result_text(node_id, RESULT_QUEUED);
                    summary.queued += 1;
                    self.emit(
                        tree_node_label(node_id),
                        NODE_QUEUED,
                        &node_event(tree, node_id),
                    );
                    jobs.push_back(Job {
                        node_id,
                        workflow,
                        cancel,
                    });
                }
                Err(err) => {
                    warn!(node_id = %node_id, phase = %phase, error = %err, "Workflow could not be created");
                    let name = tree.node(node_id).display_name();
                    let update = NodeUpdate::failed(node_id, error_text(&name), err.to_string());
                    tree.apply_update(&update);
                    summary.failed += 1;
                    self.emit(
                        tree_node_label(node_id),
                        NODE_FINISHED,
                        &NodeEventData {
                            success: Some(false),
                            error: Some(err.to_string()),
                            ..node_event(tree, node_id)
                        },
                    );
                }
            }
        }
        info!(phase = %phase, queued = summary.queued, skipped = summary.skipped, failed = summary.failed, "Phase started");
        self.emit(
            RUN_SUBJECT,
            PHASE_STARTED,
            &PhaseEventData {
                phase: phase.as_str().to_string(),
                queued: summary.queued,
                completed: None,
                failed: None,
                canceled: None,
                skipped: Some(summary.skipped),
            },
        );
        (summary, jobs)
    }

    /// The single place tree state changes while a phase runs.
    fn apply_message(&self, tree: &mut ResultTree, summary: &mut PhaseSummary, message: QueueMessage) {
        match message {
            QueueMessage::Started { node_id } => {
                tree.set_result_text(node_id, RESULT_RUNNING);
                self.emit(tree_node_label(node_id), NODE_STARTED, &node_event(tree, node_id));
            }
            QueueMessage::Progress { node_id, percent } => {
                self.emit_progress(tree_node_label(node_id), percent);
            }
            QueueMessage::Finished { outcome } => {
                let node_id = outcome.update.node_id;
                tree.apply_update(&outcome.update);
                let base = node_event(tree, node_id);
                match outcome.status {
                    NodeStatus::Canceled => {
                        summary.canceled += 1;
                        self.emit(tree_node_label(node_id), NODE_CANCELED, &base);
                    }
                    status => {
                        let success = status == NodeStatus::Completed;
                        if success {
                            summary.completed += 1;
                        } else {
                            summary.failed += 1;
                        }
                        self.emit(
                            tree_node_label(node_id),
                            NODE_FINISHED,
                            &NodeEventData {
                                success: Some(success),
                                result_file: Some(outcome.update.result_file.clone())
                                    .filter(|f| !f.is_empty()),
                                error: Some(outcome.update.error.clone()).filter(|e| !e.is_empty()),
                                ..base
                            },
                        );
                    }
                }
            }
        }
    }

    fn finish_phase(&self, summary: &PhaseSummary) {
        info!(
            phase = %summary.phase,
            completed = summary.completed,
            failed = summary.failed,
            canceled = summary.canceled,
            skipped = summary.skipped,
            "Phase completed"
        );
        self.emit(
            RUN_SUBJECT,
            PHASE_COMPLETED,
            &PhaseEventData {
                phase: summary.phase.as_str().to_string(),
                queued: summary.queued,
                completed: Some(summary.completed),
                failed: Some(summary.failed),
                canceled: Some(summary.canceled),
                skipped: Some(summary.skipped),
            },
        );
    }

    fn finish_run(&self, mode: RunMode, summary: &RunSummary) {
        self.canceller.reset();
        info!(
            completed = summary.completed(),
            failed = summary.failed(),
            canceled = summary.canceled,
            "Run completed"
        );
        self.emit(
            RUN_SUBJECT,
            RUN_COMPLETED,
            &RunEventData {
                mode: mode.as_str().to_string(),
                phases: summary.phases.iter().map(|p| p.phase.as_str().to_string()).collect(),
                canceled: Some(summary.canceled),
            },
        );
    }

    fn emit_progress(&self, subject: String, percent: f64) {
        if let Some(bus) = &self.progress {
            bus.emit_data(subject, NODE_PROGRESS, &serde_json::json!({ "progress": percent }));
        }
    }

    fn emit<T: Serialize>(&self, subject: impl Into<String>, event_type: &str, data: &T) {
        if let Some(bus) = &self.progress {
            bus.emit_data(subject, event_type, data);
        }
    }
}

fn tree_node_label(node_id: NodeId) -> String {
    node_id.to_string()
}

fn node_event(tree: &ResultTree, node_id: NodeId) -> NodeEventData {
    NodeEventData {
        node_id: tree.node(node_id).id(),
        role: tree.node(node_id).role.as_str().to_string(),
        progress: None,
        success: None,
        result_file: None,
        error: None,
    }
}

fn canceled_before_start(node_id: NodeId, workflow: &Workflow) -> WorkflowOutcome {
    WorkflowOutcome {
        status: NodeStatus::Canceled,
        update: NodeUpdate::canceled(node_id, canceled_text(workflow.name())),
    }
}

/// Feed `jobs` to the pool in FIFO order. Each job waits for a permit; jobs canceled before
/// they get one are reported without running.
async fn dispatch(
    mut jobs: VecDeque<Job>,
    semaphore: Arc<Semaphore>,
    tx: mpsc::UnboundedSender<QueueMessage>,
) {
    let mut running = FuturesUnordered::new();
    while let Some(job) = jobs.pop_front() {
        let permit = match Arc::clone(&semaphore).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                warn!("Worker pool closed; canceling remaining jobs");
                let outcome = canceled_before_start(job.node_id, &job.workflow);
                let _ = tx.send(QueueMessage::Finished { outcome });
                continue;
            }
        };
        if job.cancel.is_canceled() {
            let outcome = canceled_before_start(job.node_id, &job.workflow);
            let _ = tx.send(QueueMessage::Finished { outcome });
            continue;
        }

        let Job {
            node_id, workflow, ..
        } = job;
        let name = workflow.name().to_string();
        let worker_tx = tx.clone();
        let handle = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            let _ = worker_tx.send(QueueMessage::Started { node_id });
            let progress_tx = worker_tx.clone();
            let mut progress = move |percent: f64| {
                let _ = progress_tx.send(QueueMessage::Progress { node_id, percent });
            };
            let outcome = workflow.execute(&mut progress);
            let _ = worker_tx.send(QueueMessage::Finished { outcome });
        });
        running.push(async move { (node_id, name, handle.await) });
    }

    while let Some((node_id, name, joined)) = running.next().await {
        if let Err(e) = joined {
            warn!(node_id = %node_id, error = %e, "Workflow task panicked");
            let outcome = WorkflowOutcome {
                status: NodeStatus::Error,
                update: NodeUpdate::failed(node_id, error_text(&name), format!("workflow task failed: {e}")),
            };
            let _ = tx.send(QueueMessage::Finished { outcome });
        }
    }
}
