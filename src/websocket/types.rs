//! Message envelope types for the Deriv WebSocket protocol.
//!
//! Every Deriv call is a JSON object. The client stamps a `req_id` on each
//! outgoing request and the server echoes it back on every response, including
//! each message of a subscription stream.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::websocket::error::{WebSocketError, WsResult};

// ============================================================================
// REQUEST HELPERS (Client → Server)
// ============================================================================

/// Field carrying the client-side correlation id.
pub const REQ_ID_FIELD: &str = "req_id";

/// Field that turns a call into a subscription.
pub const SUBSCRIBE_FIELD: &str = "subscribe";

/// Borrow the request as a JSON object, rejecting anything else.
fn as_object(request: &mut Value) -> WsResult<&mut Map<String, Value>> {
    if !request.is_object() {
        return Err(WebSocketError::InvalidRequest(format!(
            "request must be a JSON object, got: {}",
            request
        )));
    }
    request
        .as_object_mut()
        .ok_or_else(|| WebSocketError::InvalidRequest("request must be a JSON object".into()))
}

/// Stamp a correlation id on a request.
pub fn attach_req_id(request: &mut Value, req_id: u64) -> WsResult<()> {
    as_object(request)?.insert(REQ_ID_FIELD.to_string(), Value::from(req_id));
    Ok(())
}

/// Mark a request as a subscription (`"subscribe": 1`).
pub fn attach_subscribe(request: &mut Value) -> WsResult<()> {
    as_object(request)?.insert(SUBSCRIBE_FIELD.to_string(), Value::from(1));
    Ok(())
}

/// Keepalive ping sent by the connection task. Carries no `req_id`.
pub fn keepalive_ping() -> Value {
    serde_json::json!({ "ping": 1 })
}

/// Fire-and-forget cancellation for a stream nobody listens to anymore.
pub fn forget_message(subscription_id: &str) -> Value {
    serde_json::json!({ "forget": subscription_id })
}

// ============================================================================
// RESPONSE TYPES (Server → Client)
// ============================================================================

/// Decode a full server message into a typed response.
pub fn decode<T: DeserializeOwned>(message: Value) -> WsResult<T> {
    serde_json::from_value(message).map_err(WebSocketError::from)
}

/// Envelope fields shared by every server message.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawWsMessage {
    #[serde(default)]
    pub msg_type: String,
    #[serde(default)]
    pub req_id: Option<u64>,
    #[serde(default)]
    pub error: Option<ApiErrorData>,
    #[serde(default)]
    pub subscription: Option<SubscriptionInfo>,
    #[serde(default)]
    pub echo_req: Value,
}

/// Error object returned by the server instead of a payload.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ApiErrorData {
    pub code: String,
    pub message: String,
    #[serde(default)]
    pub details: Option<Value>,
}

impl From<ApiErrorData> for WebSocketError {
    fn from(err: ApiErrorData) -> Self {
        WebSocketError::Api {
            code: err.code,
            message: err.message,
        }
    }
}

/// Subscription descriptor attached to streamed messages.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct SubscriptionInfo {
    pub id: String,
}

/// Message types the client treats specially.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Ping,
    Forget,
    ForgetAll,
    Other,
}

impl From<&str> for MessageType {
    fn from(s: &str) -> Self {
        match s {
            "ping" => MessageType::Ping,
            "forget" => MessageType::Forget,
            "forget_all" => MessageType::ForgetAll,
            _ => MessageType::Other,
        }
    }
}

// ============================================================================
// CLIENT EVENTS
// ============================================================================

/// Events emitted on the client's event stream.
#[derive(Debug, Clone)]
pub enum WsEvent {
    /// Connection established
    Connected,
    /// Connection closed
    Disconnected { reason: String },
    /// Keepalive answered
    Pong,
    /// A message no request or subscription was waiting for
    Unsolicited { msg_type: String, message: Value },
    /// A subscription's consumer went away; the server stream is being forgotten
    SubscriptionDropped {
        req_id: u64,
        subscription_id: Option<String>,
    },
    /// Error
    Error { error: WebSocketError },
}
