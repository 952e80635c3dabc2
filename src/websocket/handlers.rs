//! Message handlers for WebSocket events.
//!
//! Routes incoming messages to the request or subscription waiting on their
//! `req_id` and turns everything else into events.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot, RwLock};

use crate::websocket::error::{WebSocketError, WsResult};
use crate::websocket::types::{MessageType, RawWsMessage, WsEvent};

type ResponseSender = oneshot::Sender<WsResult<Value>>;
type StreamSender = mpsc::Sender<WsResult<Value>>;

/// How long a full stream gets to make room for its final error.
const TERMINAL_DELIVERY_TIMEOUT: Duration = Duration::from_secs(30);

/// Send the last item of a stream, waiting for buffer space if needed.
fn deliver_terminal(tx: StreamSender, error: WebSocketError) {
    match tx.try_send(Err(error)) {
        Ok(()) | Err(mpsc::error::TrySendError::Closed(_)) => {}
        Err(mpsc::error::TrySendError::Full(item)) => {
            tokio::spawn(async move {
                if tokio::time::timeout(TERMINAL_DELIVERY_TIMEOUT, tx.send(item))
                    .await
                    .is_err()
                {
                    tracing::warn!("Subscription consumer did not drain its final error");
                }
            });
        }
    }
}

/// Handles incoming WebSocket messages
#[derive(Debug, Default)]
pub struct MessageHandler {
    /// One-shot requests awaiting their response (req_id -> sender)
    pending: RwLock<HashMap<u64, ResponseSender>>,
    /// Subscription streams (req_id -> sender)
    streams: RwLock<HashMap<u64, StreamSender>>,
    /// Subscriptions that timed out before their first message
    abandoned: RwLock<HashSet<u64>>,
}

impl MessageHandler {
    /// Create a new message handler
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a one-shot request and return the receiver for its response.
    pub async fn register_request(&self, req_id: u64) -> oneshot::Receiver<WsResult<Value>> {
        let (tx, rx) = oneshot::channel();
        self.pending.write().await.insert(req_id, tx);
        rx
    }

    /// Stop waiting for a request (timeout or send failure).
    pub async fn remove_request(&self, req_id: u64) -> bool {
        self.pending.write().await.remove(&req_id).is_some()
    }

    /// Register a subscription stream and return its receiving end.
    pub async fn register_stream(
        &self,
        req_id: u64,
        buffer: usize,
    ) -> mpsc::Receiver<WsResult<Value>> {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        self.streams.write().await.insert(req_id, tx);
        rx
    }

    /// Stop routing messages to a subscription stream.
    pub async fn remove_stream(&self, req_id: u64) -> bool {
        self.streams.write().await.remove(&req_id).is_some()
    }

    /// Stop routing a subscription that never produced its first message.
    ///
    /// If that message shows up later, it is reported as
    /// [`WsEvent::SubscriptionDropped`] so the server stream gets forgotten.
    pub async fn abandon_stream(&self, req_id: u64) {
        self.streams.write().await.remove(&req_id);
        self.abandoned.write().await.insert(req_id);
    }

    /// Number of requests still waiting for a response
    pub async fn pending_count(&self) -> usize {
        self.pending.read().await.len()
    }

    /// Number of routed subscription streams
    pub async fn stream_count(&self) -> usize {
        self.streams.read().await.len()
    }

    /// Handle an incoming message and return events
    pub async fn handle_message(&self, text: &str) -> Vec<WsEvent> {
        let message: Value = match serde_json::from_str(text) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("Failed to parse WebSocket message: {}", e);
                return vec![WsEvent::Error {
                    error: WebSocketError::MessageParseError(e.to_string()),
                }];
            }
        };

        let raw = match RawWsMessage::deserialize(&message) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!("Malformed message envelope: {}", e);
                return vec![WsEvent::Error {
                    error: WebSocketError::MessageParseError(e.to_string()),
                }];
            }
        };

        match raw.req_id {
            Some(req_id) => self.route(req_id, raw, message).await,
            None => self.handle_unrouted(raw, message),
        }
    }

    /// Deliver a message to whoever registered its req_id.
    async fn route(&self, req_id: u64, raw: RawWsMessage, message: Value) -> Vec<WsEvent> {
        if let Some(tx) = self.pending.write().await.remove(&req_id) {
            let result = match raw.error {
                Some(err) => Err(err.into()),
                None => Ok(message),
            };
            if tx.send(result).is_err() {
                tracing::debug!("Requester for req_id {} went away", req_id);
            }
            return vec![];
        }

        let mut streams = self.streams.write().await;
        if !streams.contains_key(&req_id) {
            drop(streams);
            if self.abandoned.write().await.remove(&req_id) {
                return Self::late_subscription(req_id, raw);
            }
            return self.handle_unrouted(raw, message);
        }

        if let Some(err) = raw.error {
            // An error is the last message of a stream
            if let Some(tx) = streams.remove(&req_id) {
                deliver_terminal(tx, err.into());
            }
            return vec![];
        }

        let sent = match streams.get(&req_id) {
            Some(tx) => tx.try_send(Ok(message)),
            None => return vec![],
        };

        match sent {
            Ok(()) => vec![],
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!("Subscription buffer full for req_id {}, dropping message", req_id);
                vec![]
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                streams.remove(&req_id);
                let subscription_id = raw.subscription.map(|s| s.id);
                tracing::debug!(
                    "Subscription consumer for req_id {} dropped (subscription: {:?})",
                    req_id,
                    subscription_id
                );
                vec![WsEvent::SubscriptionDropped {
                    req_id,
                    subscription_id,
                }]
            }
        }
    }

    /// First message of a subscription whose caller already gave up on it.
    fn late_subscription(req_id: u64, raw: RawWsMessage) -> Vec<WsEvent> {
        if let Some(err) = raw.error {
            tracing::debug!("Abandoned subscription {} failed: {}", req_id, err.message);
            return vec![];
        }
        let subscription_id = raw.subscription.map(|s| s.id);
        tracing::debug!(
            "Late reply for abandoned subscription {} (subscription: {:?})",
            req_id,
            subscription_id
        );
        vec![WsEvent::SubscriptionDropped {
            req_id,
            subscription_id,
        }]
    }

    /// Messages nobody is waiting for.
    fn handle_unrouted(&self, raw: RawWsMessage, message: Value) -> Vec<WsEvent> {
        if let Some(err) = raw.error {
            tracing::warn!("Unrouted error from server: {} ({})", err.message, err.code);
            return vec![WsEvent::Error { error: err.into() }];
        }

        match MessageType::from(raw.msg_type.as_str()) {
            MessageType::Ping => vec![WsEvent::Pong],
            MessageType::Forget | MessageType::ForgetAll => {
                tracing::debug!("Forget acknowledged: {}", message);
                vec![]
            }
            MessageType::Other => vec![WsEvent::Unsolicited {
                msg_type: raw.msg_type,
                message,
            }],
        }
    }

    /// Resolve every outstanding request and stream with `error`.
    pub async fn fail_all(&self, error: WebSocketError) {
        let pending: Vec<_> = self.pending.write().await.drain().collect();
        let streams: Vec<_> = self.streams.write().await.drain().collect();

        if !pending.is_empty() || !streams.is_empty() {
            tracing::info!(
                "Failing {} pending request(s) and {} subscription(s): {}",
                pending.len(),
                streams.len(),
                error
            );
        }

        for (_, tx) in pending {
            let _ = tx.send(Err(error.clone()));
        }
        for (_, tx) in streams {
            deliver_terminal(tx, error.clone());
        }
        self.abandoned.write().await.clear();
    }
}
