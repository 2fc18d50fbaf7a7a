//! dialog-flow: branching conversational flows over a message channel
//!
//! A flow is a tree of [`FlowNode`]s. Each node binds a [`Step`] that sends a
//! prompt and optionally collects a validated reply, plus an optional branch
//! condition that decides whether traversal may enter the node from its parent.
//!
//! - [`TreeNode`]: ordered child container
//! - [`FlowNode`]: step + branch condition + children, sequential short-circuit selection
//! - [`Step`]: render, send, and the collection phase state machine
//! - [`FlowRunner`]: structural validation, traversal, and the execution trace
//! - [`Channel`] / [`CollectorFactory`]: the transport boundary
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use dialog_flow::{FlowNode, FlowRunner, MemoryChannel, Rejection, Step};
//!
//! let root = FlowNode::new(
//!     Step::text("How old are you?").collect_fn(|msg, _age: u32| {
//!         msg.content.trim().parse::<u32>().map_err(|_| Rejection::new("Numbers only").into())
//!     }),
//! )
//! .with_children(vec![
//!     FlowNode::new(Step::text("Welcome!")).when(|age: &u32| *age >= 18),
//!     FlowNode::new(Step::text("Sorry, adults only.")).when(|age: &u32| *age < 18),
//! ]);
//!
//! let (channel, replies) = MemoryChannel::new("alice");
//! let channel = Arc::new(channel);
//! replies.reply("alice", "42");
//!
//! let mut runner = FlowRunner::new(0u32, channel.clone());
//! let result = runner.run(&root, channel.as_ref()).await?;
//! assert_eq!(result.data, 42);
//! ```

pub mod error;
pub mod config;
pub mod message;
pub mod channel;
pub mod tree;
pub mod node;
pub mod step;
pub mod runner;
pub mod visualization;

// Re-exports for convenience
pub use error::{BoxError, ChannelError, CollectError, FlowError, Rejection};
pub use config::FlowConfig;
pub use message::{Author, Message, MessageId, Outbound};
pub use channel::{Channel, Collector, CollectorEvent, CollectorFactory, MemoryChannel, ReplyHandle};
pub use tree::TreeNode;
pub use node::{condition_fn, try_condition_fn, Condition, FlowData, FlowNode, NodeId};
pub use step::{Collect, PhaseContext, PhaseOutcome, Step, Termination};
pub use runner::{FlowRunner, RunResult, TraceEntry};
pub use visualization::{render_mermaid, render_mermaid_with_trace};
