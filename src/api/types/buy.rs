//! Contract purchase.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{DerivRequest, Proposal};

/// Buy a previously priced contract.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct BuyContractRequest {
    /// Proposal id
    pub buy: String,
    /// Maximum price the caller accepts
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
}

impl BuyContractRequest {
    pub fn new(proposal_id: impl Into<String>, price: Decimal) -> Self {
        Self {
            buy: proposal_id.into(),
            price,
        }
    }

    /// Buy a proposal at its quoted ask price.
    pub fn from_proposal(proposal: &Proposal) -> Self {
        Self::new(proposal.id.clone(), proposal.ask_price)
    }
}

impl DerivRequest for BuyContractRequest {
    const MSG_TYPE: &'static str = "buy";
    type Response = BuyContractResponse;
}

#[derive(Debug, Clone, Deserialize)]
pub struct BuyContractResponse {
    pub buy: BoughtContract,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct BoughtContract {
    pub contract_id: u64,
    pub transaction_id: u64,
    #[serde(with = "rust_decimal::serde::float")]
    pub buy_price: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub payout: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub balance_after: Decimal,
    pub purchase_time: i64,
    pub start_time: i64,
    pub longcode: String,
    pub shortcode: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_proposal() {
        let proposal = Proposal {
            id: "prop-1".to_string(),
            ask_price: Decimal::new(1050, 2),
            payout: Decimal::from(20),
            spot: None,
            spot_time: None,
            date_start: 1_700_000_000,
            date_expiry: None,
            display_value: "10.50".to_string(),
            longcode: "Win payout if ...".to_string(),
        };
        let request = BuyContractRequest::from_proposal(&proposal);
        assert_eq!(request.buy, "prop-1");
        assert_eq!(request.price, Decimal::new(1050, 2));

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json, serde_json::json!({ "buy": "prop-1", "price": 10.5 }));
    }

    #[test]
    fn test_parse_buy_response() {
        let text = r#"{
            "buy": {
                "balance_after": 9990,
                "buy_price": 10,
                "contract_id": 231234567890,
                "longcode": "Win payout if Volatility 100 Index after 5 ticks is strictly higher than entry spot.",
                "payout": 19.55,
                "purchase_time": 1700000001,
                "shortcode": "CALL_R_100_19.55_1700000001_5T_S0P_0",
                "start_time": 1700000001,
                "transaction_id": 461234567890
            },
            "echo_req": {"buy": "2b88e20f-f976-a380-904d-04db08e10eeb", "price": 10},
            "msg_type": "buy"
        }"#;
        let resp: BuyContractResponse = serde_json::from_str(text).unwrap();
        assert_eq!(resp.buy.contract_id, 231_234_567_890);
        assert_eq!(resp.buy.buy_price, Decimal::from(10));
        assert_eq!(resp.buy.balance_after, Decimal::from(9990));
        assert!(resp.buy.shortcode.starts_with("CALL_R_100"));
    }
}
