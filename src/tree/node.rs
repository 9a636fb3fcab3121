//! Result tree node types and attribute helpers

use crate::error::ModelError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use unicode_normalization::UnicodeNormalization;

/// Index of a node in its [`crate::tree::ResultTree`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub usize);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeRole {
    Analysis,
    Dimension,
    Factor,
    Indicator,
}

impl NodeRole {
    pub fn as_str(self) -> &'static str {
        match self {
            NodeRole::Analysis => "analysis",
            NodeRole::Dimension => "dimension",
            NodeRole::Factor => "factor",
            NodeRole::Indicator => "indicator",
        }
    }

    /// JSON key holding this role's children.
    pub fn children_key(self) -> Option<&'static str> {
        match self {
            NodeRole::Analysis => Some("dimensions"),
            NodeRole::Dimension => Some("factors"),
            NodeRole::Factor => Some("layers"),
            NodeRole::Indicator => None,
        }
    }

    pub fn child_role(self) -> Option<NodeRole> {
        match self {
            NodeRole::Analysis => Some(NodeRole::Dimension),
            NodeRole::Dimension => Some(NodeRole::Factor),
            NodeRole::Factor => Some(NodeRole::Indicator),
            NodeRole::Indicator => None,
        }
    }

    /// Older documents store weights under role-specific keys.
    pub fn legacy_weight_key(self) -> Option<&'static str> {
        match self {
            NodeRole::Analysis => None,
            NodeRole::Dimension => Some("dimension_weighting"),
            NodeRole::Factor => Some("factor_weighting"),
            NodeRole::Indicator => Some("indicator_weighting"),
        }
    }
}

impl std::fmt::Display for NodeRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Externally observed node status, derived from attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeStatus {
    NotRun,
    Queued,
    Running,
    Completed,
    Error,
    Canceled,
    Excluded,
}

impl NodeStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            NodeStatus::NotRun => "NotRun",
            NodeStatus::Queued => "Queued",
            NodeStatus::Running => "Running",
            NodeStatus::Completed => "Completed",
            NodeStatus::Error => "Error",
            NodeStatus::Canceled => "Canceled",
            NodeStatus::Excluded => "Excluded",
        }
    }

    pub fn glyph(self) -> &'static str {
        match self {
            NodeStatus::NotRun => "x",
            NodeStatus::Queued => "…",
            NodeStatus::Running => "…",
            NodeStatus::Completed => "✔",
            NodeStatus::Error => "!",
            NodeStatus::Canceled => "⊘",
            NodeStatus::Excluded => "-",
        }
    }
}

impl std::fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub const RESULT_NOT_RUN: &str = "Not Run";
pub const RESULT_QUEUED: &str = "Queued";
pub const RESULT_RUNNING: &str = "Running";

pub fn completed_text(workflow_name: &str) -> String {
    format!("{} Workflow Completed", workflow_name)
}

pub fn error_text(workflow_name: &str) -> String {
    format!("{} Workflow Error", workflow_name)
}

pub fn canceled_text(workflow_name: &str) -> String {
    format!("{} Workflow Canceled", workflow_name)
}

/// Normalise an analysis mode: lowercase, curly quotes and apostrophes dropped, spaces and
/// dashes to underscores.
pub fn normalize_mode(mode: &str) -> String {
    mode.nfc()
        .collect::<String>()
        .trim()
        .to_lowercase()
        .chars()
        .filter(|c| *c != '\'' && *c != '\u{2019}')
        .map(|c| if c == ' ' || c == '-' { '_' } else { c })
        .collect()
}

pub fn is_excluded_mode(mode: &str) -> bool {
    matches!(normalize_mode(mode).as_str(), "do_not_use" | "dont_use" | "exclude")
}

/// Directory segment for a node id: NFC, lowercase, anything but letters, digits and `_`
/// becomes `_`. Ids that leave nothing but underscores are rejected.
pub fn path_segment(id: &str) -> Result<String, ModelError> {
    let segment: String = id
        .nfc()
        .collect::<String>()
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect();
    if segment.trim_matches('_').is_empty() {
        return Err(ModelError::InvalidModel(format!(
            "node id '{}' does not name a usable directory",
            id
        )));
    }
    Ok(segment)
}

/// Derive a status from attribute values.
pub fn derive_status(analysis_mode: &str, result: &str) -> NodeStatus {
    if is_excluded_mode(analysis_mode) {
        return NodeStatus::Excluded;
    }
    let result = result.trim_end();
    if result.ends_with(" Workflow Error") {
        NodeStatus::Error
    } else if result.ends_with(" Workflow Canceled") {
        NodeStatus::Canceled
    } else if result.ends_with(" Workflow Completed") {
        NodeStatus::Completed
    } else if result == RESULT_RUNNING {
        NodeStatus::Running
    } else if result == RESULT_QUEUED {
        NodeStatus::Queued
    } else {
        NodeStatus::NotRun
    }
}

/// Weight from a JSON value: numbers and numeric strings; anything else is `None`.
pub fn parse_weight(value: &Value) -> Option<f64> {
    let weight = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    weight.filter(|w| w.is_finite())
}

/// One node of the result tree.
#[derive(Debug, Clone)]
pub struct TreeNode {
    pub role: NodeRole,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    /// Every attribute of the node except the children array
    pub attributes: Map<String, Value>,
    /// Position of the children key in the original document, when it was present
    pub(crate) children_slot: Option<usize>,
    /// Directory segment, kept in step with `id`/`name`
    pub(crate) segment: String,
}

impl TreeNode {
    pub fn str_attr(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(Value::as_str)
    }

    /// Node id: `id`, then `name`; the analysis root is always `analysis`.
    pub fn id(&self) -> String {
        if self.role == NodeRole::Analysis {
            return "analysis".to_string();
        }
        self.str_attr("id")
            .or_else(|| self.str_attr("name"))
            .unwrap_or("")
            .to_string()
    }

    pub fn display_name(&self) -> String {
        let keys: &[&str] = match self.role {
            NodeRole::Analysis => &["analysis_name", "name"],
            _ => &["name", "id"],
        };
        keys.iter()
            .find_map(|k| self.str_attr(k).filter(|s| !s.is_empty()))
            .map(str::to_string)
            .unwrap_or_else(|| self.id())
    }

    pub fn analysis_mode(&self) -> String {
        self.str_attr("analysis_mode").unwrap_or("").to_string()
    }

    pub fn result_text(&self) -> &str {
        self.str_attr("result").unwrap_or("")
    }

    pub fn result_file(&self) -> Option<&str> {
        self.str_attr("result_file").filter(|s| !s.is_empty())
    }

    /// `required` defaults to true; accepts booleans and "true"/"false" strings.
    pub fn required(&self) -> bool {
        match self.attributes.get("required") {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => !s.trim().eq_ignore_ascii_case("false"),
            _ => true,
        }
    }

    /// Raw weight, `None` when unset or unparsable.
    pub fn declared_weight(&self) -> Option<f64> {
        if let Some(w) = self.attributes.get("weight").and_then(parse_weight) {
            return Some(w);
        }
        self.role
            .legacy_weight_key()
            .and_then(|k| self.attributes.get(k))
            .and_then(parse_weight)
    }

    /// Weight used for aggregation; unset or invalid weights count as 1.0.
    pub fn weight(&self) -> f64 {
        self.declared_weight().unwrap_or(1.0)
    }

    pub fn status(&self) -> NodeStatus {
        derive_status(&self.analysis_mode(), self.result_text())
    }
}
