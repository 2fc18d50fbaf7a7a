//! Step: one conversational unit
//!
//! A step renders a prompt from the current data and, if it declares a
//! collection function, runs a collection phase:
//!
//! ```text
//!              ┌────────── rejected (feedback sent) ──────────┐
//!              ▼                                              │
//!   ──▶ COLLECTING ──reply──▶ exit token? ──no──▶ collect() ──┤
//!        │      │                  │                          ├──ok──▶ ACCEPTED
//!        │      │                  └─yes────────▶ EXITED      └─err─▶ FAILED
//!        │      └──exit event─────────────────▶ EXITED
//!        └──deadline──────────────────────────▶ INACTIVE
//! ```
//!
//! The deadline is armed once when the phase starts and is never reset by a
//! rejection. It races the whole collection loop, so a reply that is still
//! being processed when the deadline passes does not win.
//!
//! EXITED and INACTIVE send their termination message and settle as
//! [`PhaseOutcome::Terminated`]. FAILED settles as an error and sends nothing.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::channel::{Channel, Collector, CollectorEvent, CollectorFactory};
use crate::config::FlowConfig;
use crate::error::{ChannelError, CollectError, FlowError, Rejection};
use crate::message::{Message, Outbound};
use crate::node::{FlowData, NodeId};

/// Collection function: validates a reply and folds it into the data
#[async_trait]
pub trait Collect<D>: Send + Sync {
    /// Return the new data, a [`Rejection`] to ask again, or a failure
    async fn collect(&self, message: &Message, data: D) -> Result<D, CollectError>;
}

struct FnCollect<F>(F);

#[async_trait]
impl<D, F> Collect<D> for FnCollect<F>
where
    D: Send + Sync + 'static,
    F: Fn(&Message, D) -> Result<D, CollectError> + Send + Sync,
{
    async fn collect(&self, message: &Message, data: D) -> Result<D, CollectError> {
        (self.0)(message, data)
    }
}

type FormatFn<D> = Box<dyn Fn(&D) -> Outbound + Send + Sync>;
type RejectionHook<D> = Box<dyn Fn(&Rejection, &D) + Send + Sync>;

/// Everything a collection phase needs from the runner
pub struct PhaseContext<'a> {
    /// Node whose step is collecting
    pub node: &'a NodeId,
    pub channel: &'a dyn Channel,
    pub collectors: &'a dyn CollectorFactory,
    pub config: &'a FlowConfig,
}

/// Why a collection phase ended the run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The exit token or an exit event arrived
    Exit,
    /// The deadline elapsed; carries the phase duration
    Inactivity(Duration),
}

impl Termination {
    /// The run-level error for this termination at `node`
    pub fn into_error(self, node: NodeId) -> FlowError {
        match self {
            Termination::Exit => FlowError::VoluntaryExit { node },
            Termination::Inactivity(after) => FlowError::Inactivity { node, after },
        }
    }
}

/// Result of one visit's collection phase
#[derive(Debug, Clone, PartialEq)]
pub enum PhaseOutcome<D> {
    /// The step has no collection function; data is unchanged
    Displayed(D),
    /// A reply was accepted after `attempts` replies were processed
    Accepted { data: D, attempts: usize },
    /// The run must stop; data is what the phase started with
    Terminated { data: D, reason: Termination },
}

impl<D> PhaseOutcome<D> {
    /// Whether traversal must stop here
    pub fn terminate(&self) -> bool {
        matches!(self, PhaseOutcome::Terminated { .. })
    }

    pub fn data(&self) -> &D {
        match self {
            PhaseOutcome::Displayed(data)
            | PhaseOutcome::Accepted { data, .. }
            | PhaseOutcome::Terminated { data, .. } => data,
        }
    }

    pub fn into_data(self) -> D {
        match self {
            PhaseOutcome::Displayed(data)
            | PhaseOutcome::Accepted { data, .. }
            | PhaseOutcome::Terminated { data, .. } => data,
        }
    }
}

/// How the collection loop settled, before side effects
enum Settled<D> {
    Accepted(D, usize),
    Exited,
    Failed(FlowError),
}

/// A prompt plus optional reply collection
pub struct Step<D: FlowData> {
    format: FormatFn<D>,
    collect: Option<Arc<dyn Collect<D>>>,
    on_rejection: Option<RejectionHook<D>>,
    duration: Option<Duration>,
    messages: RwLock<Vec<Message>>,
}

impl<D: FlowData> Step<D> {
    /// Create a step whose prompt is rendered from the data
    pub fn new<F, O>(format: F) -> Self
    where
        F: Fn(&D) -> O + Send + Sync + 'static,
        O: Into<Outbound>,
    {
        Self {
            format: Box::new(move |data| format(data).into()),
            collect: None,
            on_rejection: None,
            duration: None,
            messages: RwLock::new(Vec::new()),
        }
    }

    /// Create a step with a fixed prompt
    pub fn text(content: impl Into<String>) -> Self {
        let content = content.into();
        Self::new(move |_: &D| content.clone())
    }

    /// Collect replies with a synchronous closure
    pub fn collect_fn<F>(self, f: F) -> Self
    where
        F: Fn(&Message, D) -> Result<D, CollectError> + Send + Sync + 'static,
    {
        self.collect_with(Arc::new(FnCollect(f)))
    }

    /// Collect replies with any [`Collect`] implementation
    pub fn collect_with(mut self, collect: Arc<dyn Collect<D>>) -> Self {
        self.collect = Some(collect);
        self
    }

    /// React to a rejection after its feedback has been sent
    pub fn on_rejection<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Rejection, &D) + Send + Sync + 'static,
    {
        self.on_rejection = Some(Box::new(hook));
        self
    }

    /// Override the collection deadline for this step
    pub fn duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    /// The deadline this step uses under `config`
    pub fn effective_duration(&self, config: &FlowConfig) -> Duration {
        self.duration.unwrap_or(config.collect_timeout)
    }

    /// Whether visiting this step waits for replies
    pub fn should_run_collector(&self) -> bool {
        self.collect.is_some()
    }

    /// Render the prompt for `data` without sending it
    pub fn render(&self, data: &D) -> Outbound {
        (self.format)(data)
    }

    /// Render and send the prompt, recording the sent message
    pub async fn send(&self, data: &D, channel: &dyn Channel) -> Result<Message, FlowError> {
        self.send_outbound(self.render(data), channel).await
    }

    /// Messages this step has sent and received, in order
    pub async fn messages(&self) -> Vec<Message> {
        self.messages.read().await.clone()
    }

    async fn last_message(&self) -> Option<Message> {
        self.messages.read().await.last().cloned()
    }

    async fn record(&self, message: Message) {
        self.messages.write().await.push(message);
    }

    async fn send_outbound(
        &self,
        content: Outbound,
        channel: &dyn Channel,
    ) -> Result<Message, FlowError> {
        let message = channel.send(content).await?;
        self.record(message.clone()).await;
        Ok(message)
    }

    /// Run the collection phase for one visit.
    ///
    /// Without a collection function this returns [`PhaseOutcome::Displayed`]
    /// immediately and never creates a collector.
    pub async fn run_collector(
        &self,
        data: D,
        ctx: &PhaseContext<'_>,
    ) -> Result<PhaseOutcome<D>, FlowError> {
        let Some(collect) = self.collect.as_deref() else {
            return Ok(PhaseOutcome::Displayed(data));
        };

        let timeout = self.effective_duration(ctx.config);
        let seed = self.last_message().await;
        let mut collector = ctx
            .collectors
            .create_collector(ctx.channel, seed.as_ref())
            .await?;

        debug!(node = %ctx.node, ?timeout, "Collection phase started");

        // The deadline is armed once for the whole phase. Whichever side
        // finishes first wins and the other is dropped.
        let settled = tokio::select! {
            settled = self.collect_loop(collect, collector.as_mut(), &data, ctx) => Some(settled),
            _ = tokio::time::sleep(timeout) => None,
        };
        collector.stop();

        match settled {
            Some(Settled::Accepted(data, attempts)) => {
                info!(node = %ctx.node, attempts, "Reply accepted");
                Ok(PhaseOutcome::Accepted { data, attempts })
            }
            Some(Settled::Exited) => {
                info!(node = %ctx.node, "Participant exited");
                self.send_outbound(ctx.config.exit_message.as_str().into(), ctx.channel)
                    .await?;
                Ok(PhaseOutcome::Terminated {
                    data,
                    reason: Termination::Exit,
                })
            }
            Some(Settled::Failed(err)) => {
                warn!(node = %ctx.node, error = %err, "Collection phase failed");
                Err(err)
            }
            None => {
                warn!(node = %ctx.node, ?timeout, "Collection phase timed out");
                self.send_outbound(ctx.config.inactivity_message.as_str().into(), ctx.channel)
                    .await?;
                Ok(PhaseOutcome::Terminated {
                    data,
                    reason: Termination::Inactivity(timeout),
                })
            }
        }
    }

    async fn collect_loop(
        &self,
        collect: &dyn Collect<D>,
        collector: &mut dyn Collector,
        data: &D,
        ctx: &PhaseContext<'_>,
    ) -> Settled<D> {
        let mut attempts = 0;

        loop {
            let message = match collector.next_event().await {
                CollectorEvent::Message(message) => message,
                CollectorEvent::Exit => return Settled::Exited,
                CollectorEvent::Closed => {
                    return Settled::Failed(FlowError::Channel(ChannelError::Closed))
                }
            };

            self.record(message.clone()).await;

            // The exit token never reaches the collection function
            if message.content == ctx.config.exit_token {
                return Settled::Exited;
            }

            attempts += 1;
            match collect.collect(&message, data.clone()).await {
                Ok(next) => return Settled::Accepted(next, attempts),
                Err(CollectError::Rejected(rejection)) => {
                    debug!(node = %ctx.node, attempts, reason = %rejection, "Reply rejected");
                    let feedback = rejection
                        .message()
                        .unwrap_or(ctx.config.rejection_message.as_str());
                    if let Err(err) = self.send_outbound(feedback.into(), ctx.channel).await {
                        return Settled::Failed(err);
                    }
                    if let Some(hook) = &self.on_rejection {
                        hook(&rejection, data);
                    }
                }
                Err(CollectError::Failed(source)) => {
                    return Settled::Failed(FlowError::collection(ctx.node.clone(), source));
                }
            }
        }
    }
}

impl<D: FlowData> std::fmt::Debug for Step<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Step")
            .field("collects", &self.should_run_collector())
            .field("duration", &self.duration)
            .finish()
    }
}
