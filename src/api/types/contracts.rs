//! Contracts available for a symbol.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{DerivRequest, ProductType};

/// List the contract types offered on a symbol.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ContractsForRequest {
    pub contracts_for: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub landing_company: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_type: Option<ProductType>,
}

impl ContractsForRequest {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            contracts_for: symbol.into(),
            currency: None,
            landing_company: None,
            product_type: None,
        }
    }

    pub fn currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = Some(currency.into());
        self
    }

    pub fn landing_company(mut self, landing_company: impl Into<String>) -> Self {
        self.landing_company = Some(landing_company.into());
        self
    }
}

impl DerivRequest for ContractsForRequest {
    const MSG_TYPE: &'static str = "contracts_for";
    type Response = ContractsForResponse;
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContractsForResponse {
    pub contracts_for: ContractsFor,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ContractsFor {
    pub available: Vec<AvailableContract>,
    /// Market close time (epoch seconds)
    #[serde(default)]
    pub close: Option<i64>,
    /// Market open time (epoch seconds)
    #[serde(default)]
    pub open: Option<i64>,
    #[serde(default)]
    pub feed_license: Option<String>,
    #[serde(default)]
    pub hit_count: u32,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub spot: Option<Decimal>,
}

impl ContractsFor {
    /// Contracts of one type, e.g. `CALL`
    pub fn of_type<'a>(
        &'a self,
        contract_type: &'a str,
    ) -> impl Iterator<Item = &'a AvailableContract> + 'a {
        self.available
            .iter()
            .filter(move |c| c.contract_type == contract_type)
    }

    /// Distinct contract types, in listing order
    pub fn contract_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = Vec::new();
        for contract in &self.available {
            if !types.contains(&contract.contract_type.as_str()) {
                types.push(contract.contract_type.as_str());
            }
        }
        types
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct AvailableContract {
    pub contract_type: String,
    pub contract_category: String,
    #[serde(default)]
    pub contract_category_display: Option<String>,
    #[serde(default)]
    pub contract_display: Option<String>,
    pub barrier_category: String,
    #[serde(default)]
    pub barriers: u32,
    pub expiry_type: String,
    pub start_type: String,
    pub market: String,
    pub submarket: String,
    pub underlying_symbol: String,
    #[serde(default)]
    pub exchange_name: Option<String>,
    #[serde(default)]
    pub sentiment: Option<String>,
    pub min_contract_duration: String,
    pub max_contract_duration: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_json() {
        let json = serde_json::to_value(ContractsForRequest::new("R_100")).unwrap();
        assert_eq!(json, serde_json::json!({ "contracts_for": "R_100" }));

        let json = serde_json::to_value(ContractsForRequest::new("R_100").currency("USD")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "contracts_for": "R_100", "currency": "USD" })
        );
    }

    #[test]
    fn test_parse_contracts_for() {
        let text = r#"{
            "contracts_for": {
                "available": [
                    {
                        "barrier_category": "euro_atm",
                        "barriers": 0,
                        "contract_category": "callput",
                        "contract_category_display": "Up/Down",
                        "contract_display": "Higher",
                        "contract_type": "CALL",
                        "exchange_name": "RANDOM",
                        "expiry_type": "tick",
                        "market": "synthetic_index",
                        "max_contract_duration": "10t",
                        "min_contract_duration": "1t",
                        "sentiment": "up",
                        "start_type": "spot",
                        "submarket": "random_index",
                        "underlying_symbol": "R_100"
                    },
                    {
                        "barrier_category": "euro_atm",
                        "barriers": 0,
                        "contract_category": "callput",
                        "contract_type": "PUT",
                        "expiry_type": "tick",
                        "market": "synthetic_index",
                        "max_contract_duration": "10t",
                        "min_contract_duration": "1t",
                        "start_type": "spot",
                        "submarket": "random_index",
                        "underlying_symbol": "R_100"
                    },
                    {
                        "barrier_category": "euro_non_atm",
                        "barriers": 1,
                        "contract_category": "callput",
                        "contract_type": "CALL",
                        "expiry_type": "daily",
                        "market": "synthetic_index",
                        "max_contract_duration": "365d",
                        "min_contract_duration": "1d",
                        "start_type": "spot",
                        "submarket": "random_index",
                        "underlying_symbol": "R_100"
                    }
                ],
                "close": 1700006399,
                "feed_license": "realtime",
                "hit_count": 3,
                "open": 1699920000,
                "spot": 1234.56
            },
            "msg_type": "contracts_for"
        }"#;
        let resp: ContractsForResponse = serde_json::from_str(text).unwrap();
        let contracts = resp.contracts_for;
        assert_eq!(contracts.hit_count, 3);
        assert_eq!(contracts.of_type("CALL").count(), 2);
        assert_eq!(contracts.contract_types(), vec!["CALL", "PUT"]);
        assert_eq!(contracts.feed_license.as_deref(), Some("realtime"));
        assert!(contracts.spot.is_some());
    }
}
