//! Maps a node's role and analysis mode onto a workflow.

use crate::error::WorkflowError;
use crate::tree::node::normalize_mode;
use crate::tree::{NodeRole, NodeSnapshot, NodeStatus};
use crate::workflow::aggregation::AggregationProducer;
use crate::workflow::base::Workflow;
use crate::workflow::context::WorkflowContext;
use crate::workflow::indicators::{
    DefaultIndexScore, RasterLayer, DEFAULT_INDEX_SCORE_MODE, RASTER_LAYER_MODE,
};
use crate::workflow::{Production, ProductionMode};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// An indicator implementation selected by analysis mode.
///
/// `build` reads the node and context and returns the production step; the surrounding
/// subset/mask/mosaic loop is supplied by [`Workflow`].
pub trait IndicatorPlugin: Send + Sync {
    /// Workflow name used in result texts, e.g. "Default Index Score".
    fn name(&self) -> &str;

    fn build(
        &self,
        node: &NodeSnapshot,
        context: &WorkflowContext,
    ) -> Result<Production, WorkflowError>;
}

pub struct WorkflowFactory {
    indicators: HashMap<String, Arc<dyn IndicatorPlugin>>,
}

impl Default for WorkflowFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for WorkflowFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut modes: Vec<&String> = self.indicators.keys().collect();
        modes.sort();
        f.debug_struct("WorkflowFactory").field("modes", &modes).finish()
    }
}

impl WorkflowFactory {
    /// Factory with the built-in indicator workflows registered.
    pub fn new() -> Self {
        let mut factory = Self::empty();
        factory.register(DEFAULT_INDEX_SCORE_MODE, Arc::new(DefaultIndexScore));
        factory.register(RASTER_LAYER_MODE, Arc::new(RasterLayer));
        factory
    }

    /// Factory with no indicator workflows; aggregation is always available.
    pub fn empty() -> Self {
        Self {
            indicators: HashMap::new(),
        }
    }

    /// Register `plugin` for an indicator analysis mode, replacing any earlier one.
    pub fn register(&mut self, mode: &str, plugin: Arc<dyn IndicatorPlugin>) {
        self.indicators.insert(normalize_mode(mode), plugin);
    }

    pub fn supports(&self, role: NodeRole, mode: &str) -> bool {
        let mode = normalize_mode(mode);
        match role {
            NodeRole::Indicator => self.indicators.contains_key(&mode),
            _ => aggregation_name(role, &mode).is_some(),
        }
    }

    pub fn create(
        &self,
        node: NodeSnapshot,
        context: WorkflowContext,
    ) -> Result<Workflow, WorkflowError> {
        if node.status == NodeStatus::Excluded {
            return Err(WorkflowError::Configuration(format!(
                "node '{}' is excluded from analysis",
                node.id
            )));
        }
        let mode = normalize_mode(&node.analysis_mode);
        let unknown = || WorkflowError::UnknownMode {
            role: node.role.to_string(),
            mode: node.analysis_mode.clone(),
        };

        let (name, production) = match node.role {
            NodeRole::Indicator => {
                let plugin = self.indicators.get(&mode).ok_or_else(unknown)?;
                (plugin.name().to_string(), plugin.build(&node, &context)?)
            }
            role => {
                let name = aggregation_name(role, &mode).ok_or_else(unknown)?;
                let producer = AggregationProducer::new(&node);
                (
                    name.to_string(),
                    Production::new(ProductionMode::Aggregate, producer),
                )
            }
        };
        debug!(node = %node.id, role = %node.role, mode = %mode, workflow = %name, "Workflow created");
        Workflow::new(node, context, name, production)
    }
}

fn aggregation_name(role: NodeRole, mode: &str) -> Option<&'static str> {
    match (role, mode) {
        (NodeRole::Factor, "" | "factor_aggregation") => Some("Factor Aggregation"),
        (NodeRole::Dimension, "" | "dimension_aggregation") => Some("Dimension Aggregation"),
        (NodeRole::Analysis, "" | "analysis_aggregation") => Some("Analysis Aggregation"),
        _ => None,
    }
}
