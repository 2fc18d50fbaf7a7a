//! Flow nodes and branch selection
//!
//! A [`FlowNode`] binds a [`Step`] to a position in the flow tree. Its
//! optional branch condition is evaluated by the *parent* during selection:
//! it decides whether traversal may enter this node.
//!
//! # Structural rule
//!
//! A node with more than one child must give every child a branch condition.
//! Nodes with zero or one child are exempt. The runner checks this over the
//! whole tree before sending anything.
//!
//! # Selection
//!
//! Children are tried in declared order and the first eligible child wins.
//! A child without a condition is always eligible. Conditions after the
//! winner are never evaluated, which matters because conditions may have
//! side effects.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::trace;
use uuid::Uuid;

use crate::error::{BoxError, FlowError};
use crate::step::Step;
use crate::tree::TreeNode;

/// Bound for the data value threaded through a flow
pub trait FlowData: Clone + Send + Sync + 'static {}

impl<T: Clone + Send + Sync + 'static> FlowData for T {}

/// Unique identifier of a node in a flow tree
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub String);

impl NodeId {
    /// Create a NodeId from a string
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh random id
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Predicate over the running data deciding whether a child may be entered
#[async_trait]
pub trait Condition<D>: Send + Sync {
    async fn evaluate(&self, data: &D) -> Result<bool, BoxError>;
}

struct FnCondition<F>(F);

#[async_trait]
impl<D, F> Condition<D> for FnCondition<F>
where
    D: Send + Sync + 'static,
    F: Fn(&D) -> bool + Send + Sync,
{
    async fn evaluate(&self, data: &D) -> Result<bool, BoxError> {
        Ok((self.0)(data))
    }
}

struct TryFnCondition<F>(F);

#[async_trait]
impl<D, F> Condition<D> for TryFnCondition<F>
where
    D: Send + Sync + 'static,
    F: Fn(&D) -> Result<bool, BoxError> + Send + Sync,
{
    async fn evaluate(&self, data: &D) -> Result<bool, BoxError> {
        (self.0)(data)
    }
}

/// Wrap an infallible closure as a branch condition
pub fn condition_fn<D, F>(f: F) -> Arc<dyn Condition<D>>
where
    D: FlowData,
    F: Fn(&D) -> bool + Send + Sync + 'static,
{
    Arc::new(FnCondition(f))
}

/// Wrap a fallible closure as a branch condition
pub fn try_condition_fn<D, F>(f: F) -> Arc<dyn Condition<D>>
where
    D: FlowData,
    F: Fn(&D) -> Result<bool, BoxError> + Send + Sync + 'static,
{
    Arc::new(TryFnCondition(f))
}

/// A node of the flow tree
pub struct FlowNode<D: FlowData> {
    id: NodeId,
    name: Option<String>,
    step: Step<D>,
    condition: Option<Arc<dyn Condition<D>>>,
    tree: TreeNode<FlowNode<D>>,
}

impl<D: FlowData> FlowNode<D> {
    /// Create a leaf node without a condition
    pub fn new(step: Step<D>) -> Self {
        Self {
            id: NodeId::generate(),
            name: None,
            step,
            condition: None,
            tree: TreeNode::new(),
        }
    }

    /// Human-readable name used in logs and diagrams
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_condition(mut self, condition: Arc<dyn Condition<D>>) -> Self {
        self.condition = Some(condition);
        self
    }

    /// Shorthand for `with_condition(condition_fn(f))`
    pub fn when<F>(self, f: F) -> Self
    where
        F: Fn(&D) -> bool + Send + Sync + 'static,
    {
        self.with_condition(condition_fn(f))
    }

    pub fn with_children(mut self, children: Vec<FlowNode<D>>) -> Self {
        self.tree.set_children(children);
        self
    }

    pub fn with_child(mut self, child: FlowNode<D>) -> Self {
        self.tree.add_child(child);
        self
    }

    pub fn set_children(&mut self, children: Vec<FlowNode<D>>) {
        self.tree.set_children(children);
    }

    pub fn add_child(&mut self, child: FlowNode<D>) {
        self.tree.add_child(child);
    }

    pub fn id(&self) -> &NodeId {
        &self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Name if set, otherwise the id
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(self.id.as_str())
    }

    pub fn step(&self) -> &Step<D> {
        &self.step
    }

    pub fn condition(&self) -> Option<&Arc<dyn Condition<D>>> {
        self.condition.as_ref()
    }

    pub fn has_condition(&self) -> bool {
        self.condition.is_some()
    }

    pub fn children(&self) -> &[FlowNode<D>] {
        self.tree.children()
    }

    /// Check the structural rule for this node only (no recursion)
    pub fn has_valid_children(&self) -> bool {
        self.tree.len() <= 1 || self.tree.iter().all(FlowNode::has_condition)
    }

    /// Pick the first eligible child for `data`
    pub async fn select_next(&self, data: &D) -> Result<Option<&FlowNode<D>>, FlowError> {
        select_from(self.children(), data).await
    }

    /// Whether this node may be entered for `data`
    pub(crate) async fn is_eligible(&self, data: &D) -> Result<bool, FlowError> {
        match &self.condition {
            None => Ok(true),
            Some(condition) => condition
                .evaluate(data)
                .await
                .map_err(|source| FlowError::condition(self.id.clone(), source)),
        }
    }
}

impl<D: FlowData> std::fmt::Debug for FlowNode<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlowNode")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("has_condition", &self.has_condition())
            .field("children", &self.tree.len())
            .finish()
    }
}

/// Sequential short-circuit selection over an ordered candidate list
pub(crate) async fn select_from<'a, D: FlowData>(
    candidates: &'a [FlowNode<D>],
    data: &D,
) -> Result<Option<&'a FlowNode<D>>, FlowError> {
    for candidate in candidates {
        let eligible = candidate.is_eligible(data).await?;
        trace!(node = %candidate.label(), eligible, "Evaluated branch");
        if eligible {
            return Ok(Some(candidate));
        }
    }
    Ok(None)
}
