//! WebSocket-specific error types for the Deriv SDK.

use thiserror::Error;

/// WebSocket-specific errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WebSocketError {
    /// Initial connection failure
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Connection closed while work was outstanding
    #[error("Connection closed: code {code}, reason: {reason}")]
    ConnectionClosed { code: u16, reason: String },

    /// Error object returned by the Deriv server
    #[error("API error: {message} (code: {code})")]
    Api { code: String, message: String },

    /// JSON deserialization failure
    #[error("Failed to parse message: {0}")]
    MessageParseError(String),

    /// Keepalive ping not answered
    #[error("Ping timeout: no pong response received")]
    PingTimeout,

    /// WebSocket protocol error
    #[error("WebSocket protocol error: {0}")]
    Protocol(String),

    /// Not connected
    #[error("Not connected to WebSocket server")]
    NotConnected,

    /// Already connected
    #[error("Already connected to WebSocket server")]
    AlreadyConnected,

    /// Send failed
    #[error("Failed to send message: {0}")]
    SendFailed(String),

    /// Channel closed
    #[error("Internal channel closed")]
    ChannelClosed,

    /// Invalid URL
    #[error("Invalid WebSocket URL: {0}")]
    InvalidUrl(String),

    /// Request could not be encoded as a Deriv call
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Configuration rejected before connecting
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Timeout
    #[error("Operation timed out")]
    Timeout,

    /// IO error
    #[error("IO error: {0}")]
    Io(String),
}

impl WebSocketError {
    /// Error code reported by the server, if this is an API error.
    pub fn api_code(&self) -> Option<&str> {
        match self {
            WebSocketError::Api { code, .. } => Some(code.as_str()),
            _ => None,
        }
    }

    pub(crate) fn closed(reason: impl Into<String>) -> Self {
        WebSocketError::ConnectionClosed {
            code: 1000,
            reason: reason.into(),
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for WebSocketError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error;
        match err {
            Error::ConnectionClosed => WebSocketError::closed("Connection closed normally"),
            Error::AlreadyClosed => WebSocketError::NotConnected,
            Error::Io(e) => WebSocketError::Io(e.to_string()),
            Error::Protocol(e) => WebSocketError::Protocol(e.to_string()),
            Error::Url(e) => WebSocketError::InvalidUrl(e.to_string()),
            Error::Http(resp) => {
                WebSocketError::ConnectionFailed(format!("HTTP error: {:?}", resp.status()))
            }
            Error::HttpFormat(e) => WebSocketError::ConnectionFailed(e.to_string()),
            other => WebSocketError::Protocol(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for WebSocketError {
    fn from(err: serde_json::Error) -> Self {
        WebSocketError::MessageParseError(err.to_string())
    }
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for WebSocketError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        WebSocketError::ChannelClosed
    }
}

/// Result type alias for WebSocket operations
pub type WsResult<T> = Result<T, WebSocketError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_display() {
        let err = WebSocketError::Api {
            code: "InvalidSymbol".to_string(),
            message: "Symbol R_999 is invalid.".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "API error: Symbol R_999 is invalid. (code: InvalidSymbol)"
        );
        assert_eq!(err.api_code(), Some("InvalidSymbol"));
        assert_eq!(WebSocketError::Timeout.api_code(), None);
    }

    #[test]
    fn test_from_serde_error() {
        let err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        assert!(matches!(
            WebSocketError::from(err),
            WebSocketError::MessageParseError(_)
        ));
    }

    #[test]
    fn test_from_tungstenite_closed() {
        let err = WebSocketError::from(tokio_tungstenite::tungstenite::Error::ConnectionClosed);
        assert!(matches!(
            err,
            WebSocketError::ConnectionClosed { code: 1000, .. }
        ));
        let err = WebSocketError::from(tokio_tungstenite::tungstenite::Error::AlreadyClosed);
        assert_eq!(err, WebSocketError::NotConnected);
    }
}
