//! Tick stream types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::DerivRequest;
use crate::websocket::types::SubscriptionInfo;

/// Request the latest tick for a symbol. Sent through `subscribe` to stream.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TicksRequest {
    /// Symbol code, e.g. `R_100`
    pub ticks: String,
}

impl TicksRequest {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            ticks: symbol.into(),
        }
    }
}

impl DerivRequest for TicksRequest {
    const MSG_TYPE: &'static str = "tick";
    type Response = TickResponse;
}

/// One message of a tick stream
#[derive(Debug, Clone, Deserialize)]
pub struct TickResponse {
    pub tick: Tick,
    #[serde(default)]
    pub subscription: Option<SubscriptionInfo>,
}

/// Spot price update
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Tick {
    pub symbol: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub quote: Decimal,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub bid: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub ask: Option<Decimal>,
    /// Epoch seconds
    pub epoch: i64,
    #[serde(default)]
    pub pip_size: u32,
    /// Subscription id the tick belongs to
    #[serde(default)]
    pub id: Option<String>,
}

impl Tick {
    /// Tick time as UTC
    pub fn time(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.epoch, 0)
    }

    /// Quote rounded to the symbol's pip size
    pub fn display_quote(&self) -> String {
        format!("{:.*}", self.pip_size as usize, self.quote)
    }
}
