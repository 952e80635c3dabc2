//! Main WebSocket client implementation.
//!
//! One connection, one background task. Requests are correlated with their
//! responses through `req_id`; subscriptions are delivered as streams.

use std::pin::Pin;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, Stream, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::api::types::{
    DerivRequest, ForgetAllRequest, ForgetRequest, PingRequest, TimeRequest, TimeResponse,
};
use crate::websocket::error::{WebSocketError, WsResult};
use crate::websocket::handlers::MessageHandler;
use crate::websocket::subscriptions::{Subscription, SubscriptionHandle};
use crate::websocket::types::{
    attach_req_id, attach_subscribe, decode, forget_message, keepalive_ping, WsEvent,
};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

/// Connection timeout duration for WebSocket connections
const CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

/// How long `disconnect` waits for the connection task to wind down
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// WebSocket client configuration
#[derive(Debug, Clone)]
pub struct WebSocketConfig {
    /// Time to wait for a response before giving up (seconds)
    pub request_timeout_secs: u64,
    /// Interval for keepalive pings (seconds). The server drops idle connections after two minutes.
    pub ping_interval_secs: u64,
    /// Timeout for the keepalive reply (seconds), counted from when the ping is sent
    pub pong_timeout_secs: u64,
    /// Capacity of the event channel. Default: 1000
    pub event_channel_capacity: usize,
    /// Capacity of the command channel. Default: 100
    pub command_channel_capacity: usize,
    /// Messages buffered per subscription before new ones are dropped. Default: 256
    pub subscription_buffer: usize,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
            ping_interval_secs: 30,
            pong_timeout_secs: 60,
            event_channel_capacity: 1000,
            command_channel_capacity: 100,
            subscription_buffer: 256,
        }
    }
}

impl WebSocketConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    Disconnected = 0,
    Connecting = 1,
    Connected = 2,
    Disconnecting = 3,
}

impl From<u8> for ConnectionState {
    fn from(value: u8) -> Self {
        match value {
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Connected,
            3 => ConnectionState::Disconnecting,
            _ => ConnectionState::Disconnected,
        }
    }
}

/// Internal command for the connection task
#[derive(Debug)]
enum ConnectionCommand {
    Send(String),
    Disconnect,
}

// ============================================================================
// REQUEST DISPATCH
// ============================================================================

/// Sends requests to the connection task and waits for their responses.
///
/// Cheap to clone; subscriptions keep one to cancel themselves.
#[derive(Debug, Clone)]
pub(crate) struct RequestDispatcher {
    cmd_tx: mpsc::Sender<ConnectionCommand>,
    handler: Arc<MessageHandler>,
    next_req_id: Arc<AtomicU64>,
    request_timeout: Duration,
    subscription_buffer: usize,
}

impl RequestDispatcher {
    fn new(
        cmd_tx: mpsc::Sender<ConnectionCommand>,
        handler: Arc<MessageHandler>,
        config: &WebSocketConfig,
    ) -> Self {
        Self {
            cmd_tx,
            handler,
            next_req_id: Arc::new(AtomicU64::new(1)),
            request_timeout: config.request_timeout(),
            subscription_buffer: config.subscription_buffer,
        }
    }

    /// A dispatcher with no connection behind it.
    #[cfg(test)]
    pub(crate) fn detached() -> Self {
        let (cmd_tx, _) = mpsc::channel(1);
        Self::new(
            cmd_tx,
            Arc::new(MessageHandler::new()),
            &WebSocketConfig::default(),
        )
    }

    fn next_req_id(&self) -> u64 {
        self.next_req_id.fetch_add(1, Ordering::Relaxed)
    }

    async fn send_value(&self, request: &Value) -> WsResult<()> {
        let text = serde_json::to_string(request)?;
        self.cmd_tx
            .send(ConnectionCommand::Send(text))
            .await
            .map_err(|_| WebSocketError::NotConnected)
    }

    pub(crate) async fn send_raw(&self, mut request: Value) -> WsResult<Value> {
        let req_id = self.next_req_id();
        attach_req_id(&mut request, req_id)?;

        let rx = self.handler.register_request(req_id).await;
        if let Err(e) = self.send_value(&request).await {
            self.handler.remove_request(req_id).await;
            return Err(e);
        }

        match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(WebSocketError::ChannelClosed),
            Err(_) => {
                self.handler.remove_request(req_id).await;
                tracing::warn!("Request {} timed out after {:?}", req_id, self.request_timeout);
                Err(WebSocketError::Timeout)
            }
        }
    }

    pub(crate) async fn send<R: DerivRequest>(&self, request: &R) -> WsResult<R::Response> {
        let response = self.send_raw(serde_json::to_value(request)?).await?;
        check_msg_type(&response, R::MSG_TYPE)?;
        decode(response)
    }

    pub(crate) async fn subscribe_raw(&self, mut request: Value) -> WsResult<Subscription<Value>> {
        let req_id = self.next_req_id();
        attach_subscribe(&mut request)?;
        attach_req_id(&mut request, req_id)?;

        let mut rx = self
            .handler
            .register_stream(req_id, self.subscription_buffer)
            .await;
        if let Err(e) = self.send_value(&request).await {
            self.handler.remove_stream(req_id).await;
            return Err(e);
        }

        let first = match tokio::time::timeout(self.request_timeout, rx.recv()).await {
            Ok(Some(Ok(message))) => message,
            Ok(Some(Err(e))) => {
                self.handler.remove_stream(req_id).await;
                return Err(e);
            }
            Ok(None) => return Err(WebSocketError::ChannelClosed),
            Err(_) => {
                self.handler.abandon_stream(req_id).await;
                tracing::warn!("Subscription {} timed out waiting for its first message", req_id);
                return Err(WebSocketError::Timeout);
            }
        };

        let subscription_id = first
            .get("subscription")
            .and_then(|s| s.get("id"))
            .and_then(Value::as_str)
            .map(str::to_string);
        if subscription_id.is_none() {
            tracing::warn!("Subscription {} opened without a server id", req_id);
        }

        let handle = SubscriptionHandle::new(req_id, subscription_id, self.clone());
        Ok(Subscription::new(handle, first, rx))
    }

    pub(crate) async fn forget(&self, subscription_id: &str) -> WsResult<bool> {
        let response = self.send(&ForgetRequest::new(subscription_id)).await?;
        Ok(response.removed())
    }

    pub(crate) async fn release_stream(&self, req_id: u64) -> bool {
        self.handler.remove_stream(req_id).await
    }
}

/// Reject a reply that answers a different call than the one sent.
fn check_msg_type(response: &Value, expected: &str) -> WsResult<()> {
    match response.get("msg_type").and_then(Value::as_str) {
        Some(actual) if actual == expected => Ok(()),
        actual => Err(WebSocketError::Protocol(format!(
            "expected msg_type {}, got {}",
            expected,
            actual.unwrap_or("none")
        ))),
    }
}

// ============================================================================
// CLIENT
// ============================================================================

/// WebSocket client for the Deriv API
///
/// # Example
///
/// ```ignore
/// use deriv_sdk::websocket::*;
/// use deriv_sdk::api::types::TicksRequest;
/// use futures_util::StreamExt;
///
/// #[tokio::main]
/// async fn main() -> Result<(), WebSocketError> {
///     let client = DerivWebSocketClient::connect("wss://ws.derivws.com/websockets/v3?app_id=1089").await?;
///
///     let mut ticks = client.subscribe(&TicksRequest::new("R_100")).await?;
///     while let Some(tick) = ticks.next().await {
///         println!("{:?}", tick?.tick);
///     }
///     Ok(())
/// }
/// ```
pub struct DerivWebSocketClient {
    url: String,
    config: WebSocketConfig,
    state: Arc<AtomicU8>,
    handler: Arc<MessageHandler>,
    dispatcher: Option<RequestDispatcher>,
    event_rx: mpsc::Receiver<WsEvent>,
    event_tx: mpsc::Sender<WsEvent>,
    connection_task_handle: Option<tokio::task::JoinHandle<()>>,
}

impl DerivWebSocketClient {
    /// Connect to a WebSocket server with default configuration
    pub async fn connect(url: &str) -> WsResult<Self> {
        Self::connect_with_config(url, WebSocketConfig::default()).await
    }

    /// Connect to a WebSocket server with custom configuration
    pub async fn connect_with_config(url: &str, config: WebSocketConfig) -> WsResult<Self> {
        let (event_tx, event_rx) = mpsc::channel(config.event_channel_capacity.max(1));

        let mut client = Self {
            url: url.to_string(),
            config,
            state: Arc::new(AtomicU8::new(ConnectionState::Disconnected as u8)),
            handler: Arc::new(MessageHandler::new()),
            dispatcher: None,
            event_rx,
            event_tx,
            connection_task_handle: None,
        };

        client.establish_connection().await?;
        Ok(client)
    }

    /// Establish the WebSocket connection
    async fn establish_connection(&mut self) -> WsResult<()> {
        if self.dispatcher.is_some() {
            return Err(WebSocketError::AlreadyConnected);
        }
        self.set_state(ConnectionState::Connecting);

        let connected = tokio::time::timeout(CONNECTION_TIMEOUT, connect_async(self.url.as_str()))
            .await
            .map_err(|_| WebSocketError::Timeout)
            .and_then(|result| result.map_err(WebSocketError::from));

        let ws_stream = match connected {
            Ok((stream, _)) => stream,
            Err(e) => {
                self.set_state(ConnectionState::Disconnected);
                tracing::error!("WebSocket connection failed: {}", e);
                return Err(e);
            }
        };

        tracing::info!("Connected to {}", self.url);
        self.set_state(ConnectionState::Connected);

        let (sink, source) = ws_stream.split();
        let (cmd_tx, cmd_rx) = mpsc::channel(self.config.command_channel_capacity.max(1));
        self.dispatcher = Some(RequestDispatcher::new(
            cmd_tx,
            self.handler.clone(),
            &self.config,
        ));

        let ctx = ConnectionContext {
            handler: self.handler.clone(),
            event_tx: self.event_tx.clone(),
            config: self.config.clone(),
            state: self.state.clone(),
        };

        let handle = tokio::spawn(connection_task(sink, source, cmd_rx, ctx));
        self.connection_task_handle = Some(handle);

        let _ = self.event_tx.try_send(WsEvent::Connected);

        Ok(())
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }

    pub(crate) fn dispatcher(&self) -> WsResult<&RequestDispatcher> {
        self.dispatcher.as_ref().ok_or(WebSocketError::NotConnected)
    }

    /// Send an arbitrary JSON request and wait for its response.
    ///
    /// A `req_id` is added to the request. A response carrying an `error`
    /// object resolves as [`WebSocketError::Api`].
    pub async fn send_raw(&self, request: Value) -> WsResult<Value> {
        self.dispatcher()?.send_raw(request).await
    }

    /// Send a typed request and decode its response.
    pub async fn send<R: DerivRequest>(&self, request: &R) -> WsResult<R::Response> {
        self.dispatcher()?.send(request).await
    }

    /// Subscribe with an arbitrary JSON request.
    ///
    /// Resolves once the first message arrives; an error in that message fails
    /// the call.
    pub async fn subscribe_raw(&self, request: Value) -> WsResult<Subscription<Value>> {
        self.dispatcher()?.subscribe_raw(request).await
    }

    /// Subscribe with a typed request.
    pub async fn subscribe<R: DerivRequest>(
        &self,
        request: &R,
    ) -> WsResult<Subscription<R::Response>> {
        let request = serde_json::to_value(request)?;
        let subscription = self.subscribe_raw(request).await?;
        if let Some(first) = subscription.first_message() {
            if let Err(e) = check_msg_type(first, R::MSG_TYPE) {
                let _ = subscription.handle().cancel().await;
                return Err(e);
            }
        }
        Ok(subscription.into_typed())
    }

    /// Round-trip a ping through the server
    pub async fn ping(&self) -> WsResult<()> {
        let response = self.send(&PingRequest::default()).await?;
        if response.ping != "pong" {
            return Err(WebSocketError::Protocol(format!(
                "unexpected ping reply: {}",
                response.ping
            )));
        }
        Ok(())
    }

    /// Current server time
    pub async fn server_time(&self) -> WsResult<TimeResponse> {
        self.send(&TimeRequest::default()).await
    }

    /// Cancel a subscription by server id. Returns whether the server removed one.
    pub async fn forget(&self, subscription_id: &str) -> WsResult<bool> {
        self.dispatcher()?.forget(subscription_id).await
    }

    /// Cancel every subscription of the given stream types (e.g. `ticks`).
    ///
    /// Streams opened through this client end once the server stops sending;
    /// their local routes are released when dropped.
    pub async fn forget_all<I, S>(&self, streams: I) -> WsResult<Vec<String>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let response = self.send(&ForgetAllRequest::new(streams)).await?;
        Ok(response.forget_all)
    }

    /// Disconnect from the server
    pub async fn disconnect(&mut self) -> WsResult<()> {
        self.set_state(ConnectionState::Disconnecting);

        if let Some(dispatcher) = self.dispatcher.take() {
            let _ = dispatcher.cmd_tx.send(ConnectionCommand::Disconnect).await;
        }

        if let Some(handle) = self.connection_task_handle.take() {
            if tokio::time::timeout(SHUTDOWN_TIMEOUT, handle).await.is_err() {
                tracing::warn!("Connection task did not stop within {:?}", SHUTDOWN_TIMEOUT);
            }
        }

        self.set_state(ConnectionState::Disconnected);
        Ok(())
    }

    /// Check if the connection task is still running
    pub fn is_task_running(&self) -> bool {
        self.connection_task_handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Get the current connection state
    pub fn connection_state(&self) -> ConnectionState {
        ConnectionState::from(self.state.load(Ordering::SeqCst))
    }

    /// Check if connected
    pub fn is_connected(&self) -> bool {
        self.connection_state() == ConnectionState::Connected
    }

    /// Get the WebSocket URL
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Get the configuration
    pub fn config(&self) -> &WebSocketConfig {
        &self.config
    }
}

impl Stream for DerivWebSocketClient {
    type Item = WsEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.event_rx.poll_recv(cx)
    }
}

impl Drop for DerivWebSocketClient {
    fn drop(&mut self) {
        if let Some(handle) = self.connection_task_handle.take() {
            handle.abort();
        }
    }
}

// ============================================================================
// CONNECTION TASK
// ============================================================================

/// Shared context for the connection task
struct ConnectionContext {
    handler: Arc<MessageHandler>,
    event_tx: mpsc::Sender<WsEvent>,
    config: WebSocketConfig,
    state: Arc<AtomicU8>,
}

impl ConnectionContext {
    fn emit(&self, event: WsEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(dropped_event)) => {
                tracing::warn!(
                    "Event channel full, dropping event: {:?}",
                    std::mem::discriminant(&dropped_event)
                );
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!("Event receiver dropped");
            }
        }
    }
}

async fn send_json(sink: &mut WsSink, value: &Value) -> WsResult<()> {
    let text = serde_json::to_string(value)?;
    sink.send(Message::Text(text.into()))
        .await
        .map_err(|e| WebSocketError::SendFailed(e.to_string()))
}

/// Extract close code and reason from an optional CloseFrame.
fn extract_close(frame: Option<&CloseFrame>) -> (u16, String) {
    match frame {
        Some(f) => (f.code.into(), f.reason.to_string()),
        None => (1005, "No close frame".into()),
    }
}

/// Connection task that handles the WebSocket connection
async fn connection_task(
    mut sink: WsSink,
    mut source: WsSource,
    mut cmd_rx: mpsc::Receiver<ConnectionCommand>,
    ctx: ConnectionContext,
) {
    let ping_period = Duration::from_secs(ctx.config.ping_interval_secs.max(1));
    let pong_timeout = Duration::from_secs(ctx.config.pong_timeout_secs);
    let mut ping_interval = interval_at(Instant::now() + ping_period, ping_period);
    ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    // Set while a keepalive ping is unanswered
    let mut pong_deadline: Option<Instant> = None;

    let (code, reason) = loop {
        tokio::select! {
            // Handle incoming WebSocket messages
            msg = source.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let text_str: &str = text.as_ref();
                        for event in ctx.handler.handle_message(text_str).await {
                            match &event {
                                WsEvent::Pong => pong_deadline = None,
                                WsEvent::SubscriptionDropped { subscription_id: Some(id), .. } => {
                                    if let Err(e) = send_json(&mut sink, &forget_message(id)).await {
                                        tracing::warn!("Failed to forget dropped subscription {}: {}", id, e);
                                    }
                                }
                                _ => {}
                            }
                            ctx.emit(event);
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if let Err(e) = sink.send(Message::Pong(data)).await {
                            tracing::warn!("Failed to send pong: {}", e);
                        }
                    }
                    Some(Ok(Message::Pong(_))) => {
                        pong_deadline = None;
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let (code, reason) = extract_close(frame.as_ref());
                        tracing::info!("WebSocket closed by server: code {}, reason: {}", code, reason);
                        break (code, reason);
                    }
                    Some(Ok(Message::Binary(_))) => {
                        // Ignore binary messages
                    }
                    Some(Ok(Message::Frame(_))) => {
                        // Ignore raw frames
                    }
                    Some(Err(e)) => {
                        tracing::error!("WebSocket error: {}", e);
                        let error = WebSocketError::from(e);
                        let reason = error.to_string();
                        ctx.emit(WsEvent::Error { error });
                        break (1006, reason);
                    }
                    None => {
                        tracing::info!("WebSocket stream ended");
                        break (1006, "Stream ended".to_string());
                    }
                }
            }

            // Handle commands from the client
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(ConnectionCommand::Send(text)) => {
                        if let Err(e) = sink.send(Message::Text(text.into())).await {
                            tracing::warn!("Failed to send message: {}", e);
                            ctx.emit(WsEvent::Error {
                                error: WebSocketError::SendFailed(e.to_string()),
                            });
                        }
                    }
                    Some(ConnectionCommand::Disconnect) | None => {
                        let _ = sink.send(Message::Close(Some(CloseFrame {
                            code: CloseCode::Normal,
                            reason: "Client disconnect".into(),
                        }))).await;
                        break (1000, "Client disconnect".to_string());
                    }
                }
            }

            // Keepalive
            _ = ping_interval.tick(), if pong_deadline.is_none() => {
                if let Err(e) = send_json(&mut sink, &keepalive_ping()).await {
                    tracing::warn!("Failed to send keepalive ping: {}", e);
                } else {
                    pong_deadline = Some(Instant::now() + pong_timeout);
                }
            }

            // Keepalive reply deadline
            _ = tokio::time::sleep_until(pong_deadline.unwrap_or_else(Instant::now)), if pong_deadline.is_some() => {
                tracing::warn!("Pong timeout: no response received within {:?}", pong_timeout);
                ctx.emit(WsEvent::Error { error: WebSocketError::PingTimeout });
                let _ = sink.close().await;
                break (1006, "Ping timeout".to_string());
            }
        }
    };

    ctx.state
        .store(ConnectionState::Disconnected as u8, Ordering::SeqCst);
    ctx.handler
        .fail_all(WebSocketError::ConnectionClosed {
            code,
            reason: reason.clone(),
        })
        .await;
    ctx.emit(WsEvent::Disconnected { reason });
}
