//! In-process channel
//!
//! Records everything the flow sends and delivers replies injected through a
//! [`ReplyHandle`]. Replies queued before a collection phase starts are kept
//! and delivered in order once a collector is created.
//!
//! Only replies written by the channel's participant are delivered; replies
//! from any other author are dropped by the collector.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, OwnedMutexGuard, RwLock};
use tracing::debug;

use super::{Channel, Collector, CollectorEvent, CollectorFactory};
use crate::error::ChannelError;
use crate::message::{Message, Outbound};

type Inbox = mpsc::UnboundedReceiver<CollectorEvent>;

/// In-memory channel bound to a single participant
pub struct MemoryChannel {
    participant: String,
    sent: RwLock<Vec<Message>>,
    inbox: Arc<Mutex<Inbox>>,
    closed: AtomicBool,
    collectors_created: AtomicUsize,
}

impl MemoryChannel {
    /// Create a channel and the handle used to inject participant activity
    pub fn new(participant: impl Into<String>) -> (Self, ReplyHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let channel = Self {
            participant: participant.into(),
            sent: RwLock::new(Vec::new()),
            inbox: Arc::new(Mutex::new(rx)),
            closed: AtomicBool::new(false),
            collectors_created: AtomicUsize::new(0),
        };
        (channel, ReplyHandle { tx })
    }

    pub fn participant(&self) -> &str {
        &self.participant
    }

    /// Every message sent so far, in order
    pub async fn sent(&self) -> Vec<Message> {
        self.sent.read().await.clone()
    }

    /// Contents of every message sent so far, in order
    pub async fn sent_contents(&self) -> Vec<String> {
        self.sent
            .read()
            .await
            .iter()
            .map(|m| m.content.clone())
            .collect()
    }

    /// Make every subsequent send fail with [`ChannelError::Closed`]
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    /// Number of collectors handed out
    pub fn collectors_created(&self) -> usize {
        self.collectors_created.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Channel for MemoryChannel {
    async fn send(&self, content: Outbound) -> Result<Message, ChannelError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ChannelError::Closed);
        }
        let message = Message::from_flow(content.content);
        self.sent.write().await.push(message.clone());
        Ok(message)
    }
}

#[async_trait]
impl CollectorFactory for MemoryChannel {
    async fn create_collector(
        &self,
        _channel: &dyn Channel,
        seed: Option<&Message>,
    ) -> Result<Box<dyn Collector>, ChannelError> {
        let inbox = self
            .inbox
            .clone()
            .try_lock_owned()
            .map_err(|_| ChannelError::CollectorBusy)?;

        self.collectors_created.fetch_add(1, Ordering::SeqCst);
        debug!(
            participant = %self.participant,
            seed = ?seed.map(|m| m.id.as_str()),
            "Collector created"
        );

        Ok(Box::new(MemoryCollector {
            participant: self.participant.clone(),
            inbox: Some(inbox),
        }))
    }
}

/// Injects participant activity into a [`MemoryChannel`]
///
/// Dropping every handle closes the channel's event source.
#[derive(Debug, Clone)]
pub struct ReplyHandle {
    tx: mpsc::UnboundedSender<CollectorEvent>,
}

impl ReplyHandle {
    /// Queue a reply from `author`. Returns false if the channel is gone.
    pub fn reply(&self, author: impl Into<String>, content: impl Into<String>) -> bool {
        self.tx
            .send(CollectorEvent::Message(Message::from_participant(author, content)))
            .is_ok()
    }

    /// Queue a voluntary exit
    pub fn exit(&self) -> bool {
        self.tx.send(CollectorEvent::Exit).is_ok()
    }

    /// Queue an explicit close of the event source
    pub fn hang_up(&self) -> bool {
        self.tx.send(CollectorEvent::Closed).is_ok()
    }
}

struct MemoryCollector {
    participant: String,
    inbox: Option<OwnedMutexGuard<Inbox>>,
}

#[async_trait]
impl Collector for MemoryCollector {
    async fn next_event(&mut self) -> CollectorEvent {
        let Some(inbox) = self.inbox.as_mut() else {
            return CollectorEvent::Closed;
        };

        loop {
            match inbox.recv().await {
                Some(CollectorEvent::Message(message)) => {
                    if message.is_from(&self.participant) {
                        return CollectorEvent::Message(message);
                    }
                    debug!(author = ?message.author, "Ignoring reply from another author");
                }
                Some(event) => return event,
                None => return CollectorEvent::Closed,
            }
        }
    }

    fn stop(&mut self) {
        // Releases the inbox so the next phase can collect
        self.inbox = None;
    }
}
