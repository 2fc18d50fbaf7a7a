//! Transport boundary
//!
//! The engine never talks to a concrete transport. It sends rendered content
//! through a [`Channel`] and, for each collection phase, asks a
//! [`CollectorFactory`] for a [`Collector`] that turns channel activity into
//! discrete [`CollectorEvent`]s.
//!
//! Deciding whose replies count (authorship filtering) belongs to the
//! collector, not to the engine.

pub mod memory;

use async_trait::async_trait;

use crate::error::ChannelError;
use crate::message::{Message, Outbound};

pub use memory::{MemoryChannel, ReplyHandle};

/// Outbound side of a conversation
#[async_trait]
pub trait Channel: Send + Sync {
    /// Deliver content and return the message as it was sent
    async fn send(&self, content: Outbound) -> Result<Message, ChannelError>;
}

/// Event produced by a collector while a step is collecting
#[derive(Debug, Clone, PartialEq)]
pub enum CollectorEvent {
    /// A qualifying reply
    Message(Message),
    /// The participant left voluntarily
    Exit,
    /// The event source is gone; no further events will arrive
    Closed,
}

/// Event source scoped to one collection phase
#[async_trait]
pub trait Collector: Send {
    /// Wait for the next event.
    ///
    /// Must be cancel safe: the engine races this call against the phase
    /// deadline and drops it when the deadline wins.
    async fn next_event(&mut self) -> CollectorEvent;

    /// Stop emitting events. Called exactly once when the phase settles.
    fn stop(&mut self);
}

/// Creates a collector for each collection phase
#[async_trait]
pub trait CollectorFactory: Send + Sync {
    /// Create a collector bound to `channel`.
    ///
    /// `seed` is the prompt the step just sent, if any.
    async fn create_collector(
        &self,
        channel: &dyn Channel,
        seed: Option<&Message>,
    ) -> Result<Box<dyn Collector>, ChannelError>;
}
