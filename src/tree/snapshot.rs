//! Immutable views of tree nodes handed to workflows, and the update records workflows
//! send back.

use crate::tree::node::{NodeId, NodeRole, NodeStatus};
use serde_json::{Map, Value};
use std::path::PathBuf;

/// What an aggregating parent needs to know about one child.
#[derive(Debug, Clone, PartialEq)]
pub struct ChildSnapshot {
    pub node_id: NodeId,
    pub id: String,
    pub layer_id: String,
    pub role: NodeRole,
    pub weight: f64,
    pub required: bool,
    pub status: NodeStatus,
    pub result_file: Option<PathBuf>,
}

/// Copy of a node's state at the moment its workflow is built.
#[derive(Debug, Clone)]
pub struct NodeSnapshot {
    pub node_id: NodeId,
    pub id: String,
    /// File-name stem for this node's rasters
    pub layer_id: String,
    pub role: NodeRole,
    pub name: String,
    pub analysis_mode: String,
    pub attributes: Map<String, Value>,
    /// Directory segments from the root (dimension/factor/indicator)
    pub path: Vec<String>,
    pub children: Vec<ChildSnapshot>,
    pub status: NodeStatus,
}

impl NodeSnapshot {
    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    pub fn str_attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    pub fn number_attr(&self, key: &str) -> Option<f64> {
        match self.attributes.get(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

/// Outcome of one workflow run, applied to the tree by its single owner.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeUpdate {
    pub node_id: NodeId,
    pub status: NodeStatus,
    pub result: String,
    pub result_file: String,
    pub error: String,
    pub error_file: Option<String>,
    pub execution_start_time: Option<String>,
    pub execution_end_time: Option<String>,
}

impl NodeUpdate {
    /// Error update for a node whose workflow could not be built or started.
    pub fn failed(node_id: NodeId, result: String, error: String) -> Self {
        Self {
            node_id,
            status: NodeStatus::Error,
            result,
            result_file: String::new(),
            error,
            error_file: None,
            execution_start_time: None,
            execution_end_time: None,
        }
    }

    /// Canceled update for a node that never started.
    pub fn canceled(node_id: NodeId, result: String) -> Self {
        Self {
            node_id,
            status: NodeStatus::Canceled,
            result,
            result_file: String::new(),
            error: String::new(),
            error_file: None,
            execution_start_time: None,
            execution_end_time: None,
        }
    }
}
