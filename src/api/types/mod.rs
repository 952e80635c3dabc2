//! Typed Deriv API calls.
//!
//! Each request type implements [`DerivRequest`], which ties it to the
//! response type the server answers with.

pub mod account;
pub mod buy;
pub mod common;
pub mod contracts;
pub mod proposal;
pub mod symbols;
pub mod ticks;

pub use account::*;
pub use buy::*;
pub use common::*;
pub use contracts::*;
pub use proposal::*;
pub use symbols::*;
pub use ticks::*;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A request that can be sent over the Deriv WebSocket API.
pub trait DerivRequest: Serialize {
    /// The `msg_type` the server answers with.
    const MSG_TYPE: &'static str;

    /// Response payload type.
    type Response: DeserializeOwned;
}

/// Product type filter accepted by `active_symbols` and `contracts_for`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProductType {
    #[default]
    Basic,
}

/// Deriv encodes booleans as `0`/`1`.
pub(crate) fn flag(value: u8) -> bool {
    value != 0
}

pub(crate) fn one() -> u8 {
    1
}
