//! Price proposals.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{one, DerivRequest};
use crate::websocket::types::SubscriptionInfo;

/// Whether `amount` is the stake or the payout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Basis {
    #[default]
    Stake,
    Payout,
}

/// Unit of a contract's duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DurationUnit {
    #[serde(rename = "t")]
    Ticks,
    #[serde(rename = "s")]
    Seconds,
    #[serde(rename = "m")]
    Minutes,
    #[serde(rename = "h")]
    Hours,
    #[serde(rename = "d")]
    Days,
}

impl fmt::Display for DurationUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unit = match self {
            DurationUnit::Ticks => "t",
            DurationUnit::Seconds => "s",
            DurationUnit::Minutes => "m",
            DurationUnit::Hours => "h",
            DurationUnit::Days => "d",
        };
        f.write_str(unit)
    }
}

/// Ask the server to price a contract.
///
/// ```rust,ignore
/// let request = PriceProposalRequest::new("R_100", "CALL", Decimal::from(10), "USD")
///     .duration(5, DurationUnit::Ticks);
/// ```
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PriceProposalRequest {
    /// Always `1`
    pub proposal: u8,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub basis: Basis,
    pub contract_type: String,
    pub currency: String,
    pub symbol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_unit: Option<DurationUnit>,
    /// Absolute or relative (`+0.1`) barrier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub barrier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub barrier2: Option<String>,
    /// Fixed expiry (epoch seconds), used instead of a duration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_expiry: Option<i64>,
}

impl PriceProposalRequest {
    pub fn new(
        symbol: impl Into<String>,
        contract_type: impl Into<String>,
        amount: Decimal,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            proposal: one(),
            amount,
            basis: Basis::default(),
            contract_type: contract_type.into(),
            currency: currency.into(),
            symbol: symbol.into(),
            duration: None,
            duration_unit: None,
            barrier: None,
            barrier2: None,
            date_expiry: None,
        }
    }

    pub fn basis(mut self, basis: Basis) -> Self {
        self.basis = basis;
        self
    }

    pub fn duration(mut self, duration: u32, unit: DurationUnit) -> Self {
        self.duration = Some(duration);
        self.duration_unit = Some(unit);
        self
    }

    pub fn barrier(mut self, barrier: impl Into<String>) -> Self {
        self.barrier = Some(barrier.into());
        self
    }

    pub fn barrier2(mut self, barrier2: impl Into<String>) -> Self {
        self.barrier2 = Some(barrier2.into());
        self
    }

    pub fn date_expiry(mut self, epoch: i64) -> Self {
        self.date_expiry = Some(epoch);
        self
    }
}

impl DerivRequest for PriceProposalRequest {
    const MSG_TYPE: &'static str = "proposal";
    type Response = PriceProposalResponse;
}

#[derive(Debug, Clone, Deserialize)]
pub struct PriceProposalResponse {
    pub proposal: Proposal,
    #[serde(default)]
    pub subscription: Option<SubscriptionInfo>,
}

/// A priced contract, valid until bought or superseded.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Proposal {
    /// Proposal id, used to buy the contract
    pub id: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub ask_price: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub payout: Decimal,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub spot: Option<Decimal>,
    #[serde(default)]
    pub spot_time: Option<i64>,
    pub date_start: i64,
    #[serde(default)]
    pub date_expiry: Option<i64>,
    #[serde(default)]
    pub display_value: String,
    pub longcode: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_json() {
        let request = PriceProposalRequest::new("R_100", "CALL", Decimal::from(10), "USD")
            .duration(5, DurationUnit::Ticks);
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "proposal": 1,
                "amount": 10.0,
                "basis": "stake",
                "contract_type": "CALL",
                "currency": "USD",
                "symbol": "R_100",
                "duration": 5,
                "duration_unit": "t"
            })
        );
    }

    #[test]
    fn test_request_with_barrier_and_payout_basis() {
        let request = PriceProposalRequest::new("frxEURUSD", "ONETOUCH", Decimal::from(100), "USD")
            .basis(Basis::Payout)
            .duration(1, DurationUnit::Days)
            .barrier("+0.005");
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["basis"], "payout");
        assert_eq!(json["duration_unit"], "d");
        assert_eq!(json["barrier"], "+0.005");
        assert!(json.get("barrier2").is_none());
    }

    #[test]
    fn test_parse_proposal() {
        let text = r#"{
            "echo_req": {"proposal": 1, "amount": 10},
            "msg_type": "proposal",
            "proposal": {
                "ask_price": 10,
                "date_expiry": 1700000010,
                "date_start": 1700000000,
                "display_value": "10.00",
                "id": "2b88e20f-f976-a380-904d-04db08e10eeb",
                "longcode": "Win payout if Volatility 100 Index after 5 ticks is strictly higher than entry spot.",
                "payout": 19.55,
                "spot": 1234.56,
                "spot_time": 1699999998
            }
        }"#;
        let resp: PriceProposalResponse = serde_json::from_str(text).unwrap();
        let proposal = resp.proposal;
        assert_eq!(proposal.id, "2b88e20f-f976-a380-904d-04db08e10eeb");
        assert_eq!(proposal.ask_price, Decimal::from(10));
        assert_eq!(proposal.payout.round_dp(2), Decimal::new(1955, 2));
        assert_eq!(proposal.display_value, "10.00");
    }

    #[test]
    fn test_duration_unit_display() {
        assert_eq!(DurationUnit::Minutes.to_string(), "m");
        assert_eq!(DurationUnit::Ticks.to_string(), "t");
    }
}
