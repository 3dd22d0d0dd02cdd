//! OneBot v11 event source — connects to the bot implementation as a
//! WebSocket client and turns message posts into [`BotEvent`]s.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use secrecy::ExposeSecret;
use serde_json::Value;
use tokio::sync::{Mutex, mpsc};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_util::sync::CancellationToken;

use crate::channels::{EventSource, EventStream};
use crate::config::OneBotConfig;
use crate::error::ChannelError;
use crate::message::{BotEvent, IncomingMessage, MessageSegment};

const SOURCE_NAME: &str = "onebot";

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);

/// OneBot v11 forward-WebSocket event source.
pub struct OneBotSource {
    config: OneBotConfig,
    connection: Mutex<Option<CancellationToken>>,
}

impl OneBotSource {
    pub fn new(config: OneBotConfig) -> Self {
        Self {
            config,
            connection: Mutex::new(None),
        }
    }
}

#[async_trait]
impl EventSource for OneBotSource {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    async fn subscribe(&self) -> Result<EventStream, ChannelError> {
        let mut connection = self.connection.lock().await;
        if connection.is_some() {
            return Err(ChannelError::StartupFailed {
                name: SOURCE_NAME.into(),
                reason: "already subscribed".into(),
            });
        }

        let cancel = CancellationToken::new();
        *connection = Some(cancel.clone());

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(connection_loop(self.config.clone(), tx, cancel));

        let stream = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|event| (event, rx))
        });

        Ok(Box::pin(stream))
    }

    async fn unsubscribe(&self) -> Result<(), ChannelError> {
        if let Some(cancel) = self.connection.lock().await.take() {
            tracing::info!("OneBot source unsubscribing");
            cancel.cancel();
        }
        Ok(())
    }
}

/// Keep a connection open until cancelled, reconnecting with exponential
/// backoff.
async fn connection_loop(
    config: OneBotConfig,
    tx: mpsc::UnboundedSender<BotEvent>,
    cancel: CancellationToken,
) {
    let mut backoff = INITIAL_BACKOFF;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            result = connect_and_read(&config, &tx, &mut backoff) => match result {
                Ok(()) => tracing::info!("OneBot connection closed"),
                Err(e) => tracing::warn!(error = %e, "OneBot connection error"),
            },
        }

        if tx.is_closed() {
            tracing::info!("OneBot event consumer gone, stopping");
            break;
        }

        tracing::info!(delay_ms = backoff.as_millis() as u64, "Reconnecting to OneBot");
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(backoff) => {}
        }
        backoff = (backoff * 2).min(config.max_backoff);
    }
}

async fn connect_and_read(
    config: &OneBotConfig,
    tx: &mpsc::UnboundedSender<BotEvent>,
    backoff: &mut Duration,
) -> Result<(), ChannelError> {
    let mut request = config
        .ws_url
        .as_str()
        .into_client_request()
        .map_err(|e| startup_failed(e.to_string()))?;

    if let Some(token) = &config.access_token {
        let mut value = HeaderValue::from_str(&format!("Bearer {}", token.expose_secret()))
            .map_err(|e| startup_failed(e.to_string()))?;
        value.set_sensitive(true);
        request.headers_mut().insert(AUTHORIZATION, value);
    }

    let (ws, _response) = connect_async(request)
        .await
        .map_err(|e| startup_failed(e.to_string()))?;
    tracing::info!(url = %config.ws_url, "Connected to OneBot");
    *backoff = INITIAL_BACKOFF;

    let (_write, mut read) = ws.split();
    while let Some(frame) = read.next().await {
        let frame = frame.map_err(|e| ChannelError::Disconnected {
            name: SOURCE_NAME.into(),
            reason: e.to_string(),
        })?;

        match frame {
            Message::Text(text) => {
                if !forward_frame(text.as_str(), tx) {
                    return Ok(());
                }
            }
            Message::Close(_) => return Ok(()),
            _ => {}
        }
    }

    Ok(())
}

/// Parse one text frame and forward it. Returns `false` once the receiver
/// is gone.
fn forward_frame(text: &str, tx: &mpsc::UnboundedSender<BotEvent>) -> bool {
    let value: Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(e) => {
            tracing::debug!(error = %e, "Skipping non-JSON OneBot frame");
            return true;
        }
    };

    match parse_event(&value) {
        Ok(Some(event)) => tx.send(event).is_ok(),
        Ok(None) => true,
        Err(e) => {
            tracing::debug!(error = %e, "Skipping malformed OneBot event");
            true
        }
    }
}

/// Map a OneBot v11 post to a [`BotEvent`].
///
/// Returns `Ok(None)` for posts that are not messages (heartbeats, notices,
/// requests) and an error for message posts missing required fields.
pub fn parse_event(value: &Value) -> Result<Option<BotEvent>, ChannelError> {
    let sent = match value.get("post_type").and_then(Value::as_str) {
        Some("message") => false,
        Some("message_sent") => true,
        _ => return Ok(None),
    };

    let message_type = value
        .get("message_type")
        .and_then(Value::as_str)
        .ok_or_else(|| ChannelError::InvalidEvent("missing message_type".into()))?;

    let message_id = int_field(value, "message_id").unwrap_or_default();
    let sender_id = int_field(value, "user_id").unwrap_or_default();
    let bot_self_id = int_field(value, "self_id").unwrap_or_default();
    let segments =
        MessageSegment::list_from_onebot(value.get("message").unwrap_or(&Value::Null));

    let event = match message_type {
        "group" => {
            let group_id = int_field(value, "group_id")
                .ok_or_else(|| ChannelError::InvalidEvent("group message without group_id".into()))?;
            let message =
                IncomingMessage::group(message_id, group_id, sender_id, bot_self_id, segments);
            if sent {
                BotEvent::MessageSentGroup(message)
            } else {
                BotEvent::GroupMessageReceived(message)
            }
        }
        "private" => {
            let message = IncomingMessage::private(message_id, sender_id, bot_self_id, segments);
            if sent {
                BotEvent::MessageSentPrivate(message)
            } else {
                BotEvent::PrivateMessageReceived(message)
            }
        }
        other => {
            return Err(ChannelError::InvalidEvent(format!(
                "unknown message_type {other:?}"
            )));
        }
    };

    Ok(Some(event))
}

fn int_field(value: &Value, key: &str) -> Option<i64> {
    match value.get(key)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn startup_failed(reason: String) -> ChannelError {
    ChannelError::StartupFailed {
        name: SOURCE_NAME.into(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::message::ConversationKind;

    #[test]
    fn parses_group_message() {
        let event = parse_event(&json!({
            "post_type": "message",
            "message_type": "group",
            "message_id": 1001,
            "group_id": 555,
            "user_id": 42,
            "self_id": 123,
            "message": [
                {"type": "at", "data": {"qq": "123"}},
                {"type": "text", "data": {"text": " hi"}}
            ]
        }))
        .unwrap()
        .unwrap();

        let BotEvent::GroupMessageReceived(msg) = event else {
            panic!("expected received group event");
        };
        assert_eq!(msg.kind, ConversationKind::Group);
        assert_eq!(msg.message_id, 1001);
        assert_eq!(msg.group_id, Some(555));
        assert_eq!(msg.sender_id, 42);
        assert_eq!(msg.bot_self_id, 123);
        assert_eq!(
            msg.segments,
            vec![MessageSegment::mention("123"), MessageSegment::text(" hi")]
        );
    }

    #[test]
    fn parses_private_message_with_string_ids() {
        let event = parse_event(&json!({
            "post_type": "message",
            "message_type": "private",
            "message_id": "7",
            "user_id": "42",
            "self_id": "123",
            "message": "#QA hello"
        }))
        .unwrap()
        .unwrap();

        let BotEvent::PrivateMessageReceived(msg) = event else {
            panic!("expected received private event");
        };
        assert_eq!(msg.message_id, 7);
        assert_eq!(msg.sender_id, 42);
        assert_eq!(msg.group_id, None);
        assert_eq!(msg.segments, vec![MessageSegment::text("#QA hello")]);
    }

    #[test]
    fn parses_sent_echoes() {
        let group = parse_event(&json!({
            "post_type": "message_sent",
            "message_type": "group",
            "group_id": 1,
            "message": []
        }))
        .unwrap()
        .unwrap();
        assert_eq!(group.name(), "sent-group");

        let private = parse_event(&json!({
            "post_type": "message_sent",
            "message_type": "private",
            "message": []
        }))
        .unwrap()
        .unwrap();
        assert_eq!(private.name(), "sent-private");
    }

    #[test]
    fn missing_self_id_defaults_to_zero() {
        let event = parse_event(&json!({
            "post_type": "message",
            "message_type": "group",
            "group_id": 1,
            "message": []
        }))
        .unwrap()
        .unwrap();
        assert_eq!(event.message().bot_self_id, 0);
    }

    #[test]
    fn non_message_posts_are_skipped() {
        let heartbeat = json!({"post_type": "meta_event", "meta_event_type": "heartbeat"});
        assert!(parse_event(&heartbeat).unwrap().is_none());

        let notice = json!({"post_type": "notice", "notice_type": "group_increase"});
        assert!(parse_event(&notice).unwrap().is_none());

        assert!(parse_event(&json!({"status": "ok", "retcode": 0})).unwrap().is_none());
    }

    #[test]
    fn group_message_without_group_id_is_invalid() {
        let err = parse_event(&json!({
            "post_type": "message",
            "message_type": "group",
            "message": []
        }))
        .unwrap_err();
        assert!(matches!(err, ChannelError::InvalidEvent(_)));
    }

    #[test]
    fn forward_frame_reports_closed_receiver() {
        let (tx, rx) = mpsc::unbounded_channel();
        let frame = json!({
            "post_type": "message",
            "message_type": "private",
            "message": "hi"
        })
        .to_string();

        assert!(forward_frame(&frame, &tx));
        assert!(forward_frame("not json", &tx));
        drop(rx);
        assert!(!forward_frame(&frame, &tx));
    }

    #[tokio::test]
    async fn double_subscribe_is_rejected_and_unsubscribe_ends_stream() {
        let source = OneBotSource::new(OneBotConfig {
            ws_url: "ws://127.0.0.1:9".into(),
            ..OneBotConfig::default()
        });

        let mut stream = source.subscribe().await.unwrap();
        assert!(source.subscribe().await.is_err());

        source.unsubscribe().await.unwrap();
        let next = tokio::time::timeout(Duration::from_secs(5), stream.next())
            .await
            .unwrap();
        assert!(next.is_none());
    }
}
