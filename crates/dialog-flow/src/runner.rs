//! Flow runner: validation, traversal, and the execution trace
//!
//! A traversal is a single path walk. At each node the runner sends the
//! step's prompt, runs its collection phase, adopts the resulting data, and
//! asks the node to select the next child. The walk ends normally when no
//! child is selected, or with the first fatal condition.
//!
//! # Execution Loop
//!
//! ```text
//! record ─▶ send ─▶ collect ─▶ select_next ─┬─ Some(child) ─▶ record ─▶ send ─▶ ...
//!                      │                    └─ None ─────────▶ done
//!                      └─ exit / inactivity / failure ─▶ error
//! ```
//!
//! Display-only steps skip the collection phase but still take part in
//! branch selection with unchanged data.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use crate::channel::{Channel, CollectorFactory};
use crate::config::FlowConfig;
use crate::error::FlowError;
use crate::node::{select_from, FlowData, FlowNode, NodeId};
use crate::step::{PhaseContext, PhaseOutcome};

/// One visited node in the trace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceEntry {
    pub node: NodeId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub visited_at: DateTime<Utc>,
}

/// Result of a traversal that ran to a dead end
#[derive(Debug, Clone, PartialEq)]
pub struct RunResult<D> {
    /// Data after the last step
    pub data: D,
    /// Nodes visited by this traversal, in order
    pub visited: Vec<NodeId>,
}

/// Drives traversals of flow trees and records what was visited
///
/// The trace accumulates across traversals started on the same runner.
pub struct FlowRunner<D: FlowData> {
    initial: D,
    collectors: Arc<dyn CollectorFactory>,
    config: FlowConfig,
    ran: Vec<TraceEntry>,
}

impl<D: FlowData> FlowRunner<D> {
    /// Create a runner with default configuration
    pub fn new(initial: D, collectors: Arc<dyn CollectorFactory>) -> Self {
        Self::with_config(initial, collectors, FlowConfig::default())
    }

    /// Create a runner with custom configuration
    pub fn with_config(
        initial: D,
        collectors: Arc<dyn CollectorFactory>,
        config: FlowConfig,
    ) -> Self {
        Self {
            initial,
            collectors,
            config,
            ran: Vec::new(),
        }
    }

    pub fn config(&self) -> &FlowConfig {
        &self.config
    }

    pub fn initial_data(&self) -> &D {
        &self.initial
    }

    /// Every node visited so far, in visit order
    pub fn trace(&self) -> &[TraceEntry] {
        &self.ran
    }

    /// Check the structural rule on every node reachable from `root`
    pub fn validate(&self, root: &FlowNode<D>) -> Result<(), FlowError> {
        let mut pending = vec![root];
        while let Some(node) = pending.pop() {
            if !node.has_valid_children() {
                return Err(FlowError::InvalidTree {
                    node: node.id().clone(),
                    children: node.children().len(),
                });
            }
            pending.extend(node.children());
        }
        Ok(())
    }

    /// Whether `root` passes [`validate`](Self::validate)
    pub fn is_valid(&self, root: &FlowNode<D>) -> bool {
        self.validate(root).is_ok()
    }

    /// Validate, then traverse from `root`.
    ///
    /// Nothing is sent when validation fails.
    pub async fn run(
        &mut self,
        root: &FlowNode<D>,
        channel: &dyn Channel,
    ) -> Result<RunResult<D>, FlowError> {
        self.config.validate()?;
        self.validate(root)?;
        self.execute(root, channel).await
    }

    /// Traverse from the first eligible node of `nodes`.
    ///
    /// The candidates are treated as the children of a root that has no step
    /// of its own. Fails with [`FlowError::NoNodeSelected`] before sending
    /// anything when no candidate is eligible.
    pub async fn run_array(
        &mut self,
        nodes: &[FlowNode<D>],
        channel: &dyn Channel,
    ) -> Result<RunResult<D>, FlowError> {
        let start = select_from(nodes, &self.initial)
            .await?
            .ok_or(FlowError::NoNodeSelected)?;
        self.execute(start, channel).await
    }

    /// Traverse from `root` without validating the tree
    pub async fn execute(
        &mut self,
        root: &FlowNode<D>,
        channel: &dyn Channel,
    ) -> Result<RunResult<D>, FlowError> {
        let mut visited = Vec::new();
        let mut data = self.initial.clone();
        let mut node = root;

        info!(node = %node.label(), "Flow started");
        self.visit(node, &mut visited);
        node.step().send(&data, channel).await?;

        loop {
            let ctx = PhaseContext {
                node: node.id(),
                channel,
                collectors: self.collectors.as_ref(),
                config: &self.config,
            };

            data = match node.step().run_collector(data, &ctx).await? {
                PhaseOutcome::Displayed(data) | PhaseOutcome::Accepted { data, .. } => data,
                PhaseOutcome::Terminated { reason, .. } => {
                    info!(node = %node.label(), ?reason, "Flow terminated");
                    return Err(reason.into_error(node.id().clone()));
                }
            };

            match node.select_next(&data).await? {
                Some(next) => {
                    debug!(from = %node.label(), to = %next.label(), "Branch selected");
                    node = next;
                    self.visit(node, &mut visited);
                    node.step().send(&data, channel).await?;
                }
                None => break,
            }
        }

        info!(visited = visited.len(), "Flow completed");
        Ok(RunResult { data, visited })
    }

    fn visit(&mut self, node: &FlowNode<D>, visited: &mut Vec<NodeId>) {
        debug!(node = %node.label(), index = self.ran.len(), "Visiting node");
        self.ran.push(TraceEntry {
            node: node.id().clone(),
            name: node.name().map(str::to_string),
            visited_at: Utc::now(),
        });
        visited.push(node.id().clone());
    }

    /// Position of `node` in the trace, or `None` if it was never visited
    pub fn index_of(&self, node: &FlowNode<D>) -> Option<usize> {
        self.ran.iter().position(|entry| &entry.node == node.id())
    }

    /// [`index_of`](Self::index_of) for each node, in the given order
    pub fn indexes_of(&self, nodes: &[&FlowNode<D>]) -> Vec<Option<usize>> {
        nodes.iter().map(|node| self.index_of(node)).collect()
    }
}
