//! Event schema for run progress.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const RUN_STARTED: &str = "run_started";
pub const RUN_COMPLETED: &str = "run_completed";
pub const PHASE_STARTED: &str = "phase_started";
pub const PHASE_COMPLETED: &str = "phase_completed";
pub const NODE_QUEUED: &str = "node_queued";
pub const NODE_STARTED: &str = "node_started";
pub const NODE_PROGRESS: &str = "node_progress";
pub const NODE_FINISHED: &str = "node_finished";
pub const NODE_CANCELED: &str = "node_canceled";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub ts: String,
    /// Node id, or the run label for run and phase events
    pub subject: String,
    pub seq: u64,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: Value,
}

#[derive(Debug, Clone)]
pub struct ProgressEnvelope {
    pub ts: String,
    pub subject: String,
    pub event_type: String,
    pub data: Value,
}

impl ProgressEnvelope {
    pub fn with_now(subject: impl Into<String>, event_type: impl Into<String>, data: Value) -> Self {
        Self {
            ts: now_rfc3339(),
            subject: subject.into(),
            event_type: event_type.into(),
            data,
        }
    }
}

impl ProgressEvent {
    pub fn from_envelope(envelope: ProgressEnvelope, seq: u64) -> Self {
        Self {
            ts: envelope.ts,
            subject: envelope.subject,
            seq,
            event_type: envelope.event_type,
            data: envelope.data,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunEventData {
    pub mode: String,
    pub phases: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub canceled: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseEventData {
    pub phase: String,
    pub queued: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub canceled: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeEventData {
    pub node_id: String,
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub(crate) fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Nanos, true)
}
