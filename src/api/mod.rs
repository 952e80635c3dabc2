//! Typed requests and responses for the Deriv API.
//!
//! Every call is a [`DerivRequest`](types::DerivRequest) paired with the
//! response it decodes into. Send them through
//! [`DerivWebSocketClient`](crate::websocket::DerivWebSocketClient):
//!
//! ```rust,ignore
//! use deriv_sdk::api::{ContractsForRequest, PriceProposalRequest, DurationUnit};
//! use rust_decimal::Decimal;
//!
//! let contracts = client.send(&ContractsForRequest::new("R_100")).await?;
//! println!("{:?}", contracts.contracts_for.contract_types());
//!
//! let proposal = client
//!     .send(&PriceProposalRequest::new("R_100", "CALL", Decimal::from(10), "USD").duration(5, DurationUnit::Ticks))
//!     .await?;
//! println!("Ask {}", proposal.proposal.ask_price);
//! ```

pub mod types;

pub use types::*;
