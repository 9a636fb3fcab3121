//! Sibling weight helpers.
//!
//! Weights among enabled siblings are expected to sum to 1.0. Nothing enforces it; the
//! helpers here assign, clear and report.

use crate::tree::node::{NodeId, NodeRole, NodeStatus};
use crate::tree::ResultTree;

const WEIGHT_TOLERANCE: f64 = 1e-6;

/// A parent whose enabled children's weights do not sum to 1.0.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightIssue {
    pub node_id: NodeId,
    pub id: String,
    pub role: NodeRole,
    pub sum: f64,
}

impl std::fmt::Display for WeightIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} '{}': enabled child weights sum to {:.6}, expected 1.0",
            self.role, self.id, self.sum
        )
    }
}

impl ResultTree {
    /// Children not marked "do not use".
    pub fn enabled_children(&self, id: NodeId) -> Vec<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .filter(|c| self.status(*c) != NodeStatus::Excluded)
            .collect()
    }

    /// Give every enabled child an equal share; excluded children get 0.
    pub fn auto_assign_child_weights(&mut self, id: NodeId) {
        let enabled = self.enabled_children(id);
        let share = if enabled.is_empty() {
            0.0
        } else {
            1.0 / enabled.len() as f64
        };
        for child in self.children(id).to_vec() {
            let weight = if enabled.contains(&child) { share } else { 0.0 };
            self.set_weight(child, weight);
        }
    }

    pub fn clear_child_weights(&mut self, id: NodeId) {
        for child in self.children(id).to_vec() {
            self.set_weight(child, 0.0);
        }
    }

    /// Every parent whose enabled children's weights are off 1.0.
    pub fn weight_sum_issues(&self) -> Vec<WeightIssue> {
        self.preorder()
            .into_iter()
            .filter(|id| self.status(*id) != NodeStatus::Excluded)
            .filter_map(|id| {
                let enabled = self.enabled_children(id);
                if enabled.is_empty() {
                    return None;
                }
                let sum: f64 = enabled.iter().map(|c| self.weight(*c)).sum();
                if (sum - 1.0).abs() <= WEIGHT_TOLERANCE {
                    return None;
                }
                let node = self.node(id);
                Some(WeightIssue {
                    node_id: id,
                    id: node.id(),
                    role: node.role,
                    sum,
                })
            })
            .collect()
    }
}
