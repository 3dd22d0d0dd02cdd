//! Bot transport abstraction.
//!
//! The router consumes events from an [`EventSource`] it owns, and may hand
//! answers to a [`ReplySender`] when one is configured.

pub mod onebot;

pub use onebot::OneBotSource;

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::error::ChannelError;
use crate::message::{BotEvent, ConversationTarget};

/// Stream of events delivered by a source.
pub type EventStream = Pin<Box<dyn Stream<Item = BotEvent> + Send>>;

/// A publisher of bot events.
#[async_trait]
pub trait EventSource: Send + Sync {
    fn name(&self) -> &str;

    /// Start delivering events. The stream ends after [`Self::unsubscribe`].
    async fn subscribe(&self) -> Result<EventStream, ChannelError>;

    /// Stop delivering events and release the connection.
    async fn unsubscribe(&self) -> Result<(), ChannelError>;
}

/// Outbound path for answers. Not wired into the binary yet.
#[async_trait]
pub trait ReplySender: Send + Sync {
    async fn send_reply(&self, target: ConversationTarget, answer: &str)
    -> Result<(), ChannelError>;
}
