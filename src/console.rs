//! # Console Channel
//!
//! Connects a flow to a terminal. Prompts are written to an async writer
//! (stdout in the binary) and every line read from the input counts as a
//! reply from the console participant.
//!
//! Input is read on a dedicated OS thread with blocking IO. A tokio stdin
//! read cannot be cancelled, which would keep the runtime alive after the
//! flow has finished.
//!
//! End of input is reported as a voluntary exit.

use async_trait::async_trait;
use dialog_flow::{
    Channel, ChannelError, Collector, CollectorEvent, CollectorFactory, Message, Outbound,
};
use std::io::BufRead;
use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt, Stdout};
use tokio::sync::{mpsc, Mutex, OwnedMutexGuard};
use tracing::{debug, warn};

type Inbox = mpsc::UnboundedReceiver<CollectorEvent>;

// =============================================================================
// CHANNEL
// =============================================================================
/// Terminal-backed channel for a single participant.
pub struct ConsoleChannel<W> {
    participant: String,
    output: Mutex<W>,
    inbox: Arc<Mutex<Inbox>>,
}

impl ConsoleChannel<Stdout> {
    /// Channel over the process's stdin and stdout
    pub fn stdio(participant: impl Into<String>) -> Result<Self, ChannelError> {
        let stdin = std::io::BufReader::new(std::io::stdin());
        Self::new(participant, stdin, tokio::io::stdout())
    }
}

impl<W> ConsoleChannel<W>
where
    W: AsyncWrite + Send + Unpin,
{
    /// Create a channel reading replies from `input` and writing prompts to `output`.
    ///
    /// Spawns the input thread immediately; lines typed before the first
    /// collection phase are queued.
    pub fn new<R>(
        participant: impl Into<String>,
        input: R,
        output: W,
    ) -> Result<Self, ChannelError>
    where
        R: BufRead + Send + 'static,
    {
        let participant = participant.into();
        let (tx, rx) = mpsc::unbounded_channel();

        let reader_participant = participant.clone();
        std::thread::Builder::new()
            .name("console-input".to_string())
            .spawn(move || read_lines(reader_participant, input, tx))?;

        Ok(Self {
            participant,
            output: Mutex::new(output),
            inbox: Arc::new(Mutex::new(rx)),
        })
    }

    pub fn participant(&self) -> &str {
        &self.participant
    }
}

fn read_lines<R: BufRead>(participant: String, input: R, tx: mpsc::UnboundedSender<CollectorEvent>) {
    for line in input.lines() {
        match line {
            Ok(line) => {
                let content = line.trim_end_matches('\r');
                let event = CollectorEvent::Message(Message::from_participant(&participant, content));
                if tx.send(event).is_err() {
                    return;
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to read console input");
                let _ = tx.send(CollectorEvent::Closed);
                return;
            }
        }
    }

    debug!("Console input closed");
    let _ = tx.send(CollectorEvent::Exit);
}

#[async_trait]
impl<W> Channel for ConsoleChannel<W>
where
    W: AsyncWrite + Send + Unpin,
{
    async fn send(&self, content: Outbound) -> Result<Message, ChannelError> {
        let mut output = self.output.lock().await;
        output.write_all(content.content.as_bytes()).await?;
        output.write_all(b"\n").await?;
        output.flush().await?;
        Ok(Message::from_flow(content.content))
    }
}

#[async_trait]
impl<W> CollectorFactory for ConsoleChannel<W>
where
    W: AsyncWrite + Send + Unpin,
{
    async fn create_collector(
        &self,
        _channel: &dyn Channel,
        _seed: Option<&Message>,
    ) -> Result<Box<dyn Collector>, ChannelError> {
        let inbox = self
            .inbox
            .clone()
            .try_lock_owned()
            .map_err(|_| ChannelError::CollectorBusy)?;

        Ok(Box::new(ConsoleCollector { inbox: Some(inbox) }))
    }
}

// =============================================================================
// COLLECTOR
// =============================================================================
struct ConsoleCollector {
    inbox: Option<OwnedMutexGuard<Inbox>>,
}

#[async_trait]
impl Collector for ConsoleCollector {
    async fn next_event(&mut self) -> CollectorEvent {
        match self.inbox.as_mut() {
            Some(inbox) => inbox.recv().await.unwrap_or(CollectorEvent::Closed),
            None => CollectorEvent::Closed,
        }
    }

    fn stop(&mut self) {
        self.inbox = None;
    }
}
