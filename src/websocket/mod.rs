//! WebSocket client for the Deriv API.
//!
//! This module provides request/response calls and subscription streams over
//! a single connection.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use deriv_sdk::websocket::*;
//! use deriv_sdk::api::types::{ActiveSymbolsRequest, TicksRequest};
//! use futures_util::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), WebSocketError> {
//!     let client = DerivWebSocketClient::connect("wss://ws.derivws.com/websockets/v3?app_id=1089").await?;
//!
//!     let symbols = client.send(&ActiveSymbolsRequest::default()).await?;
//!     println!("{} symbols", symbols.active_symbols.len());
//!
//!     let mut ticks = client.subscribe(&TicksRequest::new("R_100")).await?;
//!     if let Some(tick) = ticks.next().await {
//!         println!("{}", tick?.tick.quote);
//!     }
//!     ticks.unsubscribe().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Events
//!
//! The client itself is a `Stream` of [`WsEvent`]s: connection lifecycle,
//! keepalive replies and messages nothing was waiting for.

pub mod client;
pub mod error;
pub mod handlers;
pub mod subscriptions;
pub mod types;

pub use client::{ConnectionState, DerivWebSocketClient, WebSocketConfig};
pub use error::{WebSocketError, WsResult};
pub use handlers::MessageHandler;
pub use subscriptions::{ActiveSubscription, Subscription, SubscriptionHandle, SubscriptionRegistry};
pub use types::{ApiErrorData, MessageType, RawWsMessage, SubscriptionInfo, WsEvent};
