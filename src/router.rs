//! Event router — feeds received chat messages through
//! normalize → trigger detection → QA dispatch.
//!
//! Every event runs in its own task. A failure or panic inside one event is
//! logged at the task boundary and never stops the stream. Completion order
//! across events is not guaranteed.

use std::sync::Arc;

use futures::StreamExt;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::channels::{EventSource, ReplySender};
use crate::error::Error;
use crate::message::{BotEvent, ConversationKind, IncomingMessage, normalize};
use crate::qa::QaService;
use crate::trigger::{detect_group_trigger, detect_private_trigger};

/// Length of answer previews in logs.
const LOG_PREVIEW_CHARS: usize = 100;

/// Terminal state of one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    /// Echo of the bot's own message; recorded only.
    Observed,
    /// Received, but not addressed to the bot.
    Suppressed,
    /// A question was dispatched and answered (possibly with a fallback).
    Completed { answer: String },
}

/// Per-event pipeline. Cheap to clone; shared by all event tasks.
#[derive(Clone)]
pub struct EventHandler {
    qa: Arc<dyn QaService>,
    reply: Option<Arc<dyn ReplySender>>,
}

impl EventHandler {
    pub fn new(qa: Arc<dyn QaService>) -> Self {
        Self { qa, reply: None }
    }

    pub fn with_reply_sender(mut self, reply: Arc<dyn ReplySender>) -> Self {
        self.reply = Some(reply);
        self
    }

    /// Run one event to its terminal state.
    pub async fn handle_event(&self, event: BotEvent) -> Result<EventOutcome, Error> {
        let name = event.name();
        match event {
            BotEvent::MessageSentGroup(message) | BotEvent::MessageSentPrivate(message) => {
                info!(
                    event = name,
                    message_id = message.message_id,
                    group_id = ?message.group_id,
                    "Observed outgoing message"
                );
                Ok(EventOutcome::Observed)
            }
            BotEvent::GroupMessageReceived(message) | BotEvent::PrivateMessageReceived(message) => {
                self.handle_received(&message).await
            }
        }
    }

    async fn handle_received(&self, message: &IncomingMessage) -> Result<EventOutcome, Error> {
        let text = normalize(&message.segments);
        debug!(
            message_id = message.message_id,
            kind = ?message.kind,
            text = %text,
            "Normalized message"
        );

        let question = match message.kind {
            ConversationKind::Group => detect_group_trigger(&text, message.bot_self_id),
            ConversationKind::Private => detect_private_trigger(&text),
        };
        let Some(question) = question else {
            debug!(message_id = message.message_id, "Not addressed to the bot");
            return Ok(EventOutcome::Suppressed);
        };

        info!(
            message_id = message.message_id,
            sender_id = message.sender_id,
            group_id = ?message.group_id,
            received_at = %message.received_at,
            question = %question,
            "Dispatching question"
        );
        let answer = self.qa.dispatch(&question, None).await;
        info!(
            message_id = message.message_id,
            elapsed_ms = message.age().num_milliseconds(),
            answer = %answer.chars().take(LOG_PREVIEW_CHARS).collect::<String>(),
            "Answer ready"
        );

        if let Some(reply) = &self.reply {
            reply.send_reply(message.reply_target(), &answer).await?;
        }

        Ok(EventOutcome::Completed { answer })
    }

    /// Task body: run the event unless `cancel` fires first, logging any
    /// failure instead of returning it.
    async fn process(self, event: BotEvent, cancel: CancellationToken) -> Option<EventOutcome> {
        let name = event.name();
        let message_id = event.message().message_id;

        tokio::select! {
            _ = cancel.cancelled() => {
                debug!(event = name, message_id, "Abandoning in-flight event");
                None
            }
            result = self.handle_event(event) => match result {
                Ok(outcome) => Some(outcome),
                Err(e) => {
                    error!(event = name, message_id, error = %e, "Event handling failed");
                    None
                }
            },
        }
    }
}

/// Owns an event source for the duration of [`EventRouter::run`].
pub struct EventRouter {
    source: Box<dyn EventSource>,
    handler: EventHandler,
}

impl EventRouter {
    pub fn new(source: Box<dyn EventSource>, qa: Arc<dyn QaService>) -> Self {
        Self {
            source,
            handler: EventHandler::new(qa),
        }
    }

    pub fn with_reply_sender(mut self, reply: Arc<dyn ReplySender>) -> Self {
        self.handler = self.handler.with_reply_sender(reply);
        self
    }

    pub fn handler(&self) -> &EventHandler {
        &self.handler
    }

    /// Subscribe, process events until the stream ends or `shutdown` fires,
    /// then unsubscribe.
    ///
    /// On shutdown, in-flight events are abandoned (their pending HTTP
    /// requests are dropped). When the stream simply ends, in-flight events
    /// run to completion.
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), Error> {
        let mut events = self.source.subscribe().await?;
        let in_flight = shutdown.child_token();
        let mut tasks = JoinSet::new();

        info!(source = self.source.name(), "Event router listening");

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    info!("Shutdown requested, abandoning in-flight events");
                    break;
                }
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => log_join(joined),
                event = events.next() => match event {
                    Some(event) => {
                        tasks.spawn(self.handler.clone().process(event, in_flight.clone()));
                    }
                    None => {
                        info!("Event stream ended");
                        break;
                    }
                },
            }
        }

        while let Some(joined) = tasks.join_next().await {
            log_join(joined);
        }

        self.source.unsubscribe().await?;
        info!(source = self.source.name(), "Event router stopped");
        Ok(())
    }
}

fn log_join(joined: Result<Option<EventOutcome>, JoinError>) {
    match joined {
        Ok(Some(outcome)) => debug!(?outcome, "Event finished"),
        Ok(None) => {}
        Err(e) if e.is_panic() => error!(error = %e, "Event task panicked"),
        Err(e) => debug!(error = %e, "Event task cancelled"),
    }
}
