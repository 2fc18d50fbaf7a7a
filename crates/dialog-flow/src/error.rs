//! Error types for the flow engine
//!
//! [`Rejection`] is the only recoverable signal: it is consumed inside a
//! step's collection phase and turned into a retry. Everything else reaches
//! the caller of the runner as a [`FlowError`].

use std::time::Duration;
use thiserror::Error;

use crate::node::NodeId;

/// Boxed error produced by user-supplied collection functions and conditions
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Request for another reply attempt within the same collection phase
///
/// The optional message is sent back to the participant as feedback. When it
/// is absent, the configured default rejection message is used instead.
#[derive(Debug, Clone, Default, PartialEq, Eq, Error)]
#[error("{}", .message.as_deref().unwrap_or("reply rejected"))]
pub struct Rejection {
    pub message: Option<String>,
}

impl Rejection {
    /// Reject with a feedback message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
        }
    }

    /// Reject and let the step fall back to the default feedback
    pub fn silent() -> Self {
        Self::default()
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

/// Failure of a collection function
#[derive(Debug, Error)]
pub enum CollectError {
    /// Retry without terminating
    #[error("{0}")]
    Rejected(Rejection),

    /// Abort the whole run
    #[error(transparent)]
    Failed(BoxError),
}

impl CollectError {
    /// Wrap any error as a run-aborting failure
    pub fn failed(err: impl Into<BoxError>) -> Self {
        Self::Failed(err.into())
    }

    pub fn is_rejection(&self) -> bool {
        matches!(self, CollectError::Rejected(_))
    }
}

impl From<Rejection> for CollectError {
    fn from(rejection: Rejection) -> Self {
        Self::Rejected(rejection)
    }
}

/// Errors raised by a channel or collector implementation
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Channel closed")]
    Closed,

    #[error("A collector is already active on this channel")]
    CollectorBusy,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Top-level error of a flow run
#[derive(Debug, Error)]
pub enum FlowError {
    /// A node with several children has a child without a branch condition
    #[error("Invalid flow tree: node {node} has {children} children but not all of them carry a branch condition")]
    InvalidTree { node: NodeId, children: usize },

    /// No candidate was eligible when starting from an array of roots
    #[error("No node selected")]
    NoNodeSelected,

    /// The participant sent the exit token or the collector reported an exit
    #[error("Participant exited the flow at node {node}")]
    VoluntaryExit { node: NodeId },

    /// The collection deadline elapsed without an accepted reply
    #[error("No accepted reply at node {node} within {after:?}")]
    Inactivity { node: NodeId, after: Duration },

    /// A collection function failed with something other than a rejection
    #[error("Collection failed at node {node}: {source}")]
    Collection {
        node: NodeId,
        #[source]
        source: BoxError,
    },

    /// A branch condition failed while selecting the next node
    #[error("Branch condition failed at node {node}: {source}")]
    Condition {
        node: NodeId,
        #[source]
        source: BoxError,
    },

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl FlowError {
    /// Create a collection error for a node
    pub fn collection(node: impl Into<NodeId>, source: impl Into<BoxError>) -> Self {
        Self::Collection {
            node: node.into(),
            source: source.into(),
        }
    }

    /// Create a condition error for a node
    pub fn condition(node: impl Into<NodeId>, source: impl Into<BoxError>) -> Self {
        Self::Condition {
            node: node.into(),
            source: source.into(),
        }
    }

    /// Create a config error
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Exit or inactivity: the participant ended the run, nothing broke
    pub fn is_terminal_signal(&self) -> bool {
        matches!(
            self,
            FlowError::VoluntaryExit { .. } | FlowError::Inactivity { .. }
        )
    }

    /// Raised before any message was sent because the tree is malformed
    pub fn is_structural(&self) -> bool {
        matches!(self, FlowError::InvalidTree { .. })
    }
}
