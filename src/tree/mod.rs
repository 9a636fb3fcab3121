//! Result Tree
//!
//! The four-level model (analysis → dimensions → factors → indicators) held as an arena.
//! Each node keeps its full attribute map so documents round-trip unchanged; status is
//! derived from attributes rather than stored.

pub mod node;
pub mod snapshot;
pub mod weights;

pub use node::{NodeId, NodeRole, NodeStatus, TreeNode};
pub use snapshot::{ChildSnapshot, NodeSnapshot, NodeUpdate};
pub use weights::WeightIssue;

use crate::error::ModelError;
use node::{path_segment, RESULT_NOT_RUN};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Attributes reset by [`ResultTree::clear_results`].
const RESULT_KEYS: [&str; 6] = [
    "result",
    "result_file",
    "error",
    "error_file",
    "execution_start_time",
    "execution_end_time",
];

/// Arena-backed result tree. Node ids index into this tree only; passing an id from
/// another tree panics.
#[derive(Debug, Clone)]
pub struct ResultTree {
    nodes: Vec<TreeNode>,
}

impl ResultTree {
    pub fn from_json(value: &Value) -> Result<Self, ModelError> {
        let root = value
            .as_object()
            .ok_or_else(|| ModelError::InvalidModel("root must be a JSON object".to_string()))?;
        let mut tree = ResultTree { nodes: Vec::new() };
        tree.build(root, NodeRole::Analysis, None)?;
        Ok(tree)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ModelError> {
        let value: Value = serde_json::from_str(raw)?;
        Self::from_json(&value)
    }

    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn save(&self, path: &Path) -> Result<(), ModelError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let raw = serde_json::to_string_pretty(&self.to_json())?;
        std::fs::write(path, raw)?;
        Ok(())
    }

    fn build(
        &mut self,
        object: &Map<String, Value>,
        role: NodeRole,
        parent: Option<NodeId>,
    ) -> Result<NodeId, ModelError> {
        let children_key = role.children_key();
        let mut attributes = Map::new();
        let mut children_slot = None;
        let mut child_values: &[Value] = &[];

        for (key, value) in object {
            if Some(key.as_str()) == children_key {
                children_slot = Some(attributes.len());
                child_values = value.as_array().map(Vec::as_slice).ok_or_else(|| {
                    ModelError::InvalidModel(format!("'{}' must be an array", key))
                })?;
            } else {
                attributes.insert(key.clone(), value.clone());
            }
        }

        let id = NodeId(self.nodes.len());
        let mut node = TreeNode {
            role,
            parent,
            children: Vec::new(),
            attributes,
            children_slot,
            segment: String::new(),
        };
        node.segment = path_segment(&node.id())?;
        self.nodes.push(node);

        if let Some(child_role) = role.child_role() {
            for (i, child) in child_values.iter().enumerate() {
                let child_object = child.as_object().ok_or_else(|| {
                    ModelError::InvalidModel(format!(
                        "{} {} of '{}' must be an object",
                        child_role,
                        i,
                        self.nodes[id.0].id()
                    ))
                })?;
                let child_id = self.build(child_object, child_role, Some(id))?;
                self.nodes[id.0].children.push(child_id);
            }
        }
        Ok(id)
    }

    pub fn to_json(&self) -> Value {
        self.node_json(self.root())
    }

    fn node_json(&self, id: NodeId) -> Value {
        let node = &self.nodes[id.0];
        let children = || {
            Value::Array(
                node.children
                    .iter()
                    .map(|child| self.node_json(*child))
                    .collect(),
            )
        };
        let mut out = Map::new();
        let key = node.role.children_key();
        let mut emitted = false;
        for (position, (k, v)) in node.attributes.iter().enumerate() {
            if let (Some(key), Some(slot)) = (key, node.children_slot) {
                if slot == position {
                    out.insert(key.to_string(), children());
                    emitted = true;
                }
            }
            out.insert(k.clone(), v.clone());
        }
        if let Some(key) = key {
            if !emitted && (node.children_slot.is_some() || !node.children.is_empty()) {
                out.insert(key.to_string(), children());
            }
        }
        Value::Object(out)
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: NodeId) -> Option<&TreeNode> {
        self.nodes.get(id.0)
    }

    pub fn node(&self, id: NodeId) -> &TreeNode {
        &self.nodes[id.0]
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    /// Every node in document order (pre-order).
    pub fn preorder(&self) -> Vec<NodeId> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![self.root()];
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.children(id).iter().rev().copied());
        }
        out
    }

    pub fn nodes_with_role(&self, role: NodeRole) -> Vec<NodeId> {
        self.preorder()
            .into_iter()
            .filter(|id| self.node(*id).role == role)
            .collect()
    }

    /// Look a node up by id (compared after directory normalisation).
    pub fn find(&self, id: &str) -> Option<NodeId> {
        let wanted = path_segment(id).ok()?;
        self.preorder()
            .into_iter()
            .find(|n| self.node(*n).segment == wanted)
    }

    pub fn attribute(&self, id: NodeId, key: &str) -> Option<&Value> {
        self.nodes[id.0].attributes.get(key)
    }

    /// Set one attribute. Changing `id` or `name` re-derives the node's directory
    /// segment and is refused when the new id cannot name a directory.
    pub fn set_attribute(
        &mut self,
        id: NodeId,
        key: impl Into<String>,
        value: Value,
    ) -> Result<(), ModelError> {
        let key = key.into();
        let node = &mut self.nodes[id.0];
        if node.role.children_key() == Some(key.as_str()) {
            return Err(ModelError::InvalidModel(format!(
                "'{}' holds child nodes and cannot be set as an attribute",
                key
            )));
        }
        if key == "id" || key == "name" {
            let mut renamed = node.clone();
            renamed.attributes.insert(key.clone(), value.clone());
            node.segment = path_segment(&renamed.id())?;
        }
        node.attributes.insert(key, value);
        Ok(())
    }

    pub fn weight(&self, id: NodeId) -> f64 {
        self.nodes[id.0].weight()
    }

    /// Set `weight`, plus the legacy weighting key when the document uses one.
    pub fn set_weight(&mut self, id: NodeId, weight: f64) {
        let node = &mut self.nodes[id.0];
        node.attributes.insert("weight".to_string(), Value::from(weight));
        if let Some(legacy) = node.role.legacy_weight_key() {
            if node.attributes.contains_key(legacy) {
                node.attributes.insert(legacy.to_string(), Value::from(weight));
            }
        }
    }

    pub fn status(&self, id: NodeId) -> NodeStatus {
        self.nodes[id.0].status()
    }

    pub fn layer_id(&self, id: NodeId) -> String {
        self.nodes[id.0].segment.clone()
    }

    /// Directory segments from the root down to `id`; the analysis node is `analysis`.
    pub fn path_to_root(&self, id: NodeId) -> Vec<String> {
        if self.nodes[id.0].role == NodeRole::Analysis {
            return vec!["analysis".to_string()];
        }
        let mut segments = Vec::new();
        let mut current = Some(id);
        while let Some(node_id) = current {
            let node = &self.nodes[node_id.0];
            if node.role == NodeRole::Analysis {
                break;
            }
            segments.push(node.segment.clone());
            current = node.parent;
        }
        segments.reverse();
        segments
    }

    /// Private working subdirectory for a node.
    pub fn workflow_directory(&self, id: NodeId, working_directory: &Path) -> PathBuf {
        self.path_to_root(id)
            .iter()
            .fold(working_directory.to_path_buf(), |dir, seg| dir.join(seg))
    }

    pub fn snapshot(&self, id: NodeId) -> NodeSnapshot {
        let node = &self.nodes[id.0];
        let children = node
            .children
            .iter()
            .map(|child_id| {
                let child = &self.nodes[child_id.0];
                ChildSnapshot {
                    node_id: *child_id,
                    id: child.id(),
                    layer_id: self.layer_id(*child_id),
                    role: child.role,
                    weight: child.weight(),
                    required: child.required(),
                    status: child.status(),
                    result_file: child.result_file().map(PathBuf::from),
                }
            })
            .collect();
        NodeSnapshot {
            node_id: id,
            id: node.id(),
            layer_id: self.layer_id(id),
            role: node.role,
            name: node.display_name(),
            analysis_mode: node.analysis_mode(),
            attributes: node.attributes.clone(),
            path: self.path_to_root(id),
            children,
            status: node.status(),
        }
    }

    /// Apply a workflow outcome. Only the tree owner calls this.
    pub fn apply_update(&mut self, update: &NodeUpdate) {
        let attrs = &mut self.nodes[update.node_id.0].attributes;
        attrs.insert("result".to_string(), Value::from(update.result.clone()));
        attrs.insert(
            "result_file".to_string(),
            Value::from(update.result_file.clone()),
        );
        attrs.insert("error".to_string(), Value::from(update.error.clone()));
        attrs.insert(
            "error_file".to_string(),
            update
                .error_file
                .clone()
                .map(Value::from)
                .unwrap_or(Value::Null),
        );
        if let Some(start) = &update.execution_start_time {
            attrs.insert("execution_start_time".to_string(), Value::from(start.clone()));
        }
        if let Some(end) = &update.execution_end_time {
            attrs.insert("execution_end_time".to_string(), Value::from(end.clone()));
        }
    }

    pub fn set_result_text(&mut self, id: NodeId, text: &str) {
        self.nodes[id.0]
            .attributes
            .insert("result".to_string(), Value::from(text));
    }

    /// Reset a node to "Not Run", dropping its result, error and timings.
    pub fn clear_results(&mut self, id: NodeId) {
        let attrs = &mut self.nodes[id.0].attributes;
        for key in RESULT_KEYS {
            if attrs.contains_key(key) {
                attrs.insert(key.to_string(), Value::from(""));
            }
        }
        attrs.insert("result".to_string(), Value::from(RESULT_NOT_RUN));
        attrs.insert("result_file".to_string(), Value::from(""));
    }

    pub fn clear_all_results(&mut self) {
        for i in 0..self.nodes.len() {
            self.clear_results(NodeId(i));
        }
    }
}
