//! # Deriv Rust SDK
//!
//! An async client for the Deriv trading WebSocket API.
//!
//! ## Modules
//!
//! - [`websocket`]: Connection, request correlation and subscription streams
//! - [`api`]: Typed requests and responses
//! - [`service`]: [`DerivApiService`](service::DerivApiService), a façade that
//!   tracks tick subscriptions by key
//! - [`config`]: Connection settings, with environment loading
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use deriv_sdk::prelude::*;
//! use rust_decimal::Decimal;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), WebSocketError> {
//!     let mut service = DerivApiService::connect(DerivConfig::from_env()?).await?;
//!
//!     let symbols = service.get_active_symbols().await?;
//!     println!("Found {} symbols", symbols.active_symbols.len());
//!
//!     let proposal = service
//!         .get_price_proposal(
//!             &PriceProposalRequest::new("R_100", "CALL", Decimal::from(10), "USD")
//!                 .duration(5, DurationUnit::Ticks),
//!         )
//!         .await?;
//!     let bought = service
//!         .buy_contract(&BuyContractRequest::from_proposal(&proposal.proposal))
//!         .await?;
//!     println!("Contract {}", bought.buy.contract_id);
//!
//!     service.disconnect().await
//! }
//! ```

// ============================================================================
// MODULES
// ============================================================================

/// Network URL constants.
pub mod network;

/// Connection settings.
pub mod config;

/// Typed Deriv API calls.
pub mod api;

/// WebSocket client module.
pub mod websocket;

/// Subscription-tracking façade.
pub mod service;

// ============================================================================
// PRELUDE
// ============================================================================

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use deriv_sdk::prelude::*;
/// ```
pub mod prelude {
    pub use crate::api::types::{
        // Ticks and symbols
        ActiveSymbol, ActiveSymbolsRequest, ActiveSymbolsResponse, SymbolsDetail, Tick,
        TickResponse, TicksRequest,
        // Contracts
        AvailableContract, ContractsFor, ContractsForRequest, ContractsForResponse,
        // Trading
        Basis, BoughtContract, BuyContractRequest, BuyContractResponse, DurationUnit,
        PriceProposalRequest, PriceProposalResponse, Proposal,
        // Account and connection
        Authorization, AuthorizeRequest, DerivRequest, ProductType,
    };

    pub use crate::config::DerivConfig;
    pub use crate::network::DEFAULT_WS_URL;
    pub use crate::service::{tick_key, DerivApiService};

    pub use crate::websocket::{
        ConnectionState, DerivWebSocketClient, Subscription, SubscriptionHandle, WebSocketConfig,
        WebSocketError, WsEvent, WsResult,
    };
}
