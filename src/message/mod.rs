//! Inbound chat events and their message payloads.

pub mod normalize;
pub mod segment;

pub use normalize::normalize;
pub use segment::MessageSegment;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which kind of conversation a message belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationKind {
    Group,
    Private,
}

/// A chat message as delivered by the bot transport.
///
/// Built through [`IncomingMessage::group`] or [`IncomingMessage::private`],
/// so `group_id` is present exactly when the conversation is a group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomingMessage {
    pub message_id: i64,
    pub kind: ConversationKind,
    pub sender_id: i64,
    pub group_id: Option<i64>,
    /// Bot's own account id; `0` when the transport did not report one.
    pub bot_self_id: i64,
    pub segments: Vec<MessageSegment>,
    pub received_at: DateTime<Utc>,
}

impl IncomingMessage {
    pub fn group(
        message_id: i64,
        group_id: i64,
        sender_id: i64,
        bot_self_id: i64,
        segments: Vec<MessageSegment>,
    ) -> Self {
        Self {
            message_id,
            kind: ConversationKind::Group,
            sender_id,
            group_id: Some(group_id),
            bot_self_id,
            segments,
            received_at: Utc::now(),
        }
    }

    pub fn private(
        message_id: i64,
        sender_id: i64,
        bot_self_id: i64,
        segments: Vec<MessageSegment>,
    ) -> Self {
        Self {
            message_id,
            kind: ConversationKind::Private,
            sender_id,
            group_id: None,
            bot_self_id,
            segments,
            received_at: Utc::now(),
        }
    }

    /// Time since the transport delivered this message.
    pub fn age(&self) -> chrono::Duration {
        Utc::now().signed_duration_since(self.received_at)
    }

    /// Where a reply to this message would go.
    pub fn reply_target(&self) -> ConversationTarget {
        match (self.kind, self.group_id) {
            (ConversationKind::Group, Some(group_id)) => ConversationTarget::Group(group_id),
            _ => ConversationTarget::Private(self.sender_id),
        }
    }
}

/// Destination of an outbound reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationTarget {
    Group(i64),
    Private(i64),
}

/// The four event classes the bot transport publishes.
#[derive(Debug, Clone)]
pub enum BotEvent {
    /// Echo of a message the bot sent to a group.
    MessageSentGroup(IncomingMessage),
    /// Echo of a message the bot sent in a private chat.
    MessageSentPrivate(IncomingMessage),
    GroupMessageReceived(IncomingMessage),
    PrivateMessageReceived(IncomingMessage),
}

impl BotEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::MessageSentGroup(_) => "sent-group",
            Self::MessageSentPrivate(_) => "sent-private",
            Self::GroupMessageReceived(_) => "received-group",
            Self::PrivateMessageReceived(_) => "received-private",
        }
    }

    pub fn message(&self) -> &IncomingMessage {
        match self {
            Self::MessageSentGroup(m)
            | Self::MessageSentPrivate(m)
            | Self::GroupMessageReceived(m)
            | Self::PrivateMessageReceived(m) => m,
        }
    }
}
