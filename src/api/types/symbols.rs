//! Active symbol listing.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{flag, DerivRequest, ProductType};

/// Level of detail for `active_symbols`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SymbolsDetail {
    #[default]
    Brief,
    Full,
}

/// List the symbols currently offered for trading.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ActiveSymbolsRequest {
    pub active_symbols: SymbolsDetail,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_type: Option<ProductType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub landing_company: Option<String>,
}

impl Default for ActiveSymbolsRequest {
    /// `brief` listing of `basic` products.
    fn default() -> Self {
        Self {
            active_symbols: SymbolsDetail::Brief,
            product_type: Some(ProductType::Basic),
            landing_company: None,
        }
    }
}

impl DerivRequest for ActiveSymbolsRequest {
    const MSG_TYPE: &'static str = "active_symbols";
    type Response = ActiveSymbolsResponse;
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActiveSymbolsResponse {
    pub active_symbols: Vec<ActiveSymbol>,
}

impl ActiveSymbolsResponse {
    /// Look up a symbol by code
    pub fn find(&self, symbol: &str) -> Option<&ActiveSymbol> {
        self.active_symbols.iter().find(|s| s.symbol == symbol)
    }

    /// Symbols that can be traded right now
    pub fn tradable(&self) -> impl Iterator<Item = &ActiveSymbol> {
        self.active_symbols.iter().filter(|s| s.is_tradable())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ActiveSymbol {
    pub symbol: String,
    pub display_name: String,
    pub market: String,
    pub market_display_name: String,
    pub submarket: String,
    pub submarket_display_name: String,
    #[serde(default)]
    pub symbol_type: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub pip: Decimal,
    #[serde(default)]
    pub exchange_is_open: u8,
    #[serde(default)]
    pub is_trading_suspended: u8,
    #[serde(default)]
    pub allow_forward_starting: u8,
    #[serde(default)]
    pub display_order: Option<u32>,
    #[serde(default)]
    pub subgroup: Option<String>,
    #[serde(default)]
    pub subgroup_display_name: Option<String>,
}

impl ActiveSymbol {
    pub fn is_open(&self) -> bool {
        flag(self.exchange_is_open)
    }

    pub fn is_suspended(&self) -> bool {
        flag(self.is_trading_suspended)
    }

    pub fn is_tradable(&self) -> bool {
        self.is_open() && !self.is_suspended()
    }
}
