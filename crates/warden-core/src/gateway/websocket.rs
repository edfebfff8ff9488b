// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! JSON-over-WebSocket gateway transport.
//!
//! # Framing
//!
//! Every frame is a text message of the form `{"op": "<name>", "d": <payload>}`.
//!
//! | Direction | op | Meaning |
//! |---|---|---|
//! | out | `identify` | login with `{"token": ...}` |
//! | out | `send_message` | post `{"channel_id", "content"}` |
//! | in | `invalid_session` | credentials rejected |
//! | in | `rate_limited` | throttled, `{"retry_after_ms": n}` |
//! | in | any [`GatewayEvent`] op | forwarded to the connection |
//!
//! The first inbound frame after `identify` answers the login.

use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use super::event::GatewayEvent;
use super::transport::{DEFAULT_EVENT_CAPACITY, GatewayTransport};
use crate::error::GatewayError;
use crate::types::{ChannelId, GatewayToken};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

// =============================================================================
// Frames
// =============================================================================

#[derive(Debug, Deserialize)]
struct RawFrame {
    op: String,
    #[serde(default)]
    d: serde_json::Value,
}

#[derive(Debug, Default, Deserialize)]
struct RateLimitPayload {
    #[serde(default)]
    retry_after_ms: u64,
}

/// Outcome of decoding one inbound text frame.
#[derive(Debug)]
enum Inbound {
    Event(GatewayEvent),
    Ignored(String),
}

fn decode_frame(text: &str) -> Result<Inbound, GatewayError> {
    let raw: RawFrame = serde_json::from_str(text)
        .map_err(|e| GatewayError::protocol(format!("malformed frame: {}", e)))?;

    match raw.op.as_str() {
        "invalid_session" => {
            let reason = raw
                .d
                .get("reason")
                .and_then(|r| r.as_str())
                .unwrap_or("invalid session");
            Err(GatewayError::authentication(reason))
        }
        "rate_limited" => {
            let payload: RateLimitPayload = serde_json::from_value(raw.d).unwrap_or_default();
            Err(GatewayError::rate_limited(Duration::from_millis(payload.retry_after_ms)))
        }
        _ => match serde_json::from_str::<GatewayEvent>(text) {
            Ok(event) => Ok(Inbound::Event(event)),
            Err(_) => Ok(Inbound::Ignored(raw.op)),
        },
    }
}

fn classify_connect_error(error: tungstenite::Error) -> GatewayError {
    match error {
        tungstenite::Error::Http(response) => {
            let status = response.status().as_u16();
            match status {
                401 | 403 => GatewayError::authentication(format!("gateway returned HTTP {}", status)),
                429 => {
                    let retry_after = response
                        .headers()
                        .get("retry-after")
                        .and_then(|v| v.to_str().ok())
                        .and_then(|v| v.parse::<u64>().ok())
                        .unwrap_or(1);
                    GatewayError::rate_limited(Duration::from_secs(retry_after))
                }
                _ => GatewayError::connection(format!("gateway returned HTTP {}", status)),
            }
        }
        other => GatewayError::connection(other.to_string()),
    }
}

// =============================================================================
// WebSocketTransport
// =============================================================================

/// Gateway transport speaking JSON frames over a WebSocket.
pub struct WebSocketTransport {
    url: String,
    event_capacity: usize,
    writer: tokio::sync::Mutex<Option<WsSink>>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl WebSocketTransport {
    /// Creates a transport for the gateway at `url` (`ws://` or `wss://`).
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            event_capacity: DEFAULT_EVENT_CAPACITY,
            writer: tokio::sync::Mutex::new(None),
            reader: Mutex::new(None),
        }
    }

    /// Sets the capacity of the event channel handed to the connection.
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }

    /// Returns the gateway URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    async fn send_frame(sink: &mut WsSink, frame: serde_json::Value) -> Result<(), GatewayError> {
        sink.send(Message::text(frame.to_string()))
            .await
            .map_err(|e| GatewayError::connection(e.to_string()))
    }

    /// Reads frames until the login is answered.
    async fn await_login(source: &mut WsSource) -> Result<Option<GatewayEvent>, GatewayError> {
        loop {
            match source.next().await {
                Some(Ok(Message::Text(text))) => match decode_frame(text.as_str())? {
                    Inbound::Event(event) => return Ok(Some(event)),
                    Inbound::Ignored(op) => {
                        tracing::debug!(op = %op, "Ignoring frame during login");
                    }
                },
                Some(Ok(Message::Close(_))) | None => return Err(GatewayError::Closed),
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(GatewayError::connection(e.to_string())),
            }
        }
    }

    fn spawn_reader(mut source: WsSource, events: mpsc::Sender<GatewayEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(message) = source.next().await {
                let text = match message {
                    Ok(Message::Text(text)) => text,
                    Ok(Message::Close(frame)) => {
                        tracing::info!(frame = ?frame, "Gateway closed the session");
                        break;
                    }
                    Ok(_) => continue,
                    Err(e) => {
                        tracing::warn!(error = %e, "Gateway read failed");
                        break;
                    }
                };

                match decode_frame(text.as_str()) {
                    Ok(Inbound::Event(event)) => {
                        if events.send(event).await.is_err() {
                            break;
                        }
                    }
                    Ok(Inbound::Ignored(op)) => tracing::debug!(op = %op, "Ignoring unknown frame"),
                    Err(e) => tracing::warn!(error = %e, "Gateway sent an error frame"),
                }
            }
        })
    }
}

#[async_trait]
impl GatewayTransport for WebSocketTransport {
    fn name(&self) -> &str {
        "websocket"
    }

    async fn open(&self, token: &GatewayToken) -> Result<mpsc::Receiver<GatewayEvent>, GatewayError> {
        let (stream, _response) = connect_async(self.url.as_str())
            .await
            .map_err(classify_connect_error)?;
        let (mut sink, mut source) = stream.split();

        Self::send_frame(&mut sink, json!({"op": "identify", "d": {"token": token.expose()}})).await?;
        let first = Self::await_login(&mut source).await?;

        let (tx, rx) = mpsc::channel(self.event_capacity);
        if let Some(event) = first {
            tx.send(event).await.map_err(|_| GatewayError::Closed)?;
        }

        let reader = Self::spawn_reader(source, tx);
        if let Some(previous) = self.reader.lock().replace(reader) {
            previous.abort();
        }
        *self.writer.lock().await = Some(sink);

        tracing::debug!(url = %self.url, "WebSocket session established");
        Ok(rx)
    }

    async fn send_message(&self, channel: ChannelId, content: &str) -> Result<(), GatewayError> {
        let mut writer = self.writer.lock().await;
        let sink = writer.as_mut().ok_or(GatewayError::Closed)?;
        Self::send_frame(
            sink,
            json!({"op": "send_message", "d": {"channel_id": channel.get(), "content": content}}),
        )
        .await
    }

    async fn close(&self) -> Result<(), GatewayError> {
        let sink = self.writer.lock().await.take();
        let result = match sink {
            Some(mut sink) => {
                let sent = sink.send(Message::Close(None)).await;
                let closed = sink.close().await;
                sent.and(closed)
                    .map_err(|e| GatewayError::connection(e.to_string()))
            }
            None => Ok(()),
        };

        if let Some(reader) = self.reader.lock().take() {
            reader.abort();
        }
        result
    }
}

impl std::fmt::Debug for WebSocketTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketTransport")
            .field("url", &self.url)
            .field("event_capacity", &self.event_capacity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_event_frame() {
        let frame = r#"{"op":"member_left","d":{"user_id":3,"username":"gone"}}"#;
        match decode_frame(frame).unwrap() {
            Inbound::Event(GatewayEvent::MemberLeft(member)) => assert_eq!(member.username, "gone"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_decode_invalid_session() {
        let err = decode_frame(r#"{"op":"invalid_session","d":{"reason":"token revoked"}}"#).unwrap_err();
        assert!(matches!(err, GatewayError::Authentication { ref message } if message == "token revoked"));
    }

    #[test]
    fn test_decode_rate_limited() {
        let err = decode_frame(r#"{"op":"rate_limited","d":{"retry_after_ms":1500}}"#).unwrap_err();
        assert_eq!(err.retry_after(), Some(Duration::from_millis(1500)));
    }

    #[test]
    fn test_decode_unknown_and_malformed() {
        assert!(matches!(
            decode_frame(r#"{"op":"heartbeat_ack"}"#).unwrap(),
            Inbound::Ignored(op) if op == "heartbeat_ack"
        ));
        assert!(matches!(decode_frame("not json"), Err(GatewayError::Protocol { .. })));
    }

    #[tokio::test]
    async fn test_close_without_session_is_noop() {
        let transport = WebSocketTransport::new("ws://127.0.0.1:9");
        transport.close().await.unwrap();
        assert!(transport.send_message(ChannelId::new(1), "x").await.is_err());
    }

    #[tokio::test]
    async fn test_open_unreachable_is_connection_error() {
        let transport = WebSocketTransport::new("ws://127.0.0.1:9");
        let err = transport.open(&GatewayToken::new("t")).await.unwrap_err();
        assert!(matches!(err, GatewayError::Connection { .. }));
    }
}
