//! Connection authorization.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{flag, DerivRequest};

/// Authorize the connection with an API token.
#[derive(Clone, Serialize, PartialEq, Eq)]
pub struct AuthorizeRequest {
    pub authorize: String,
}

impl AuthorizeRequest {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            authorize: token.into(),
        }
    }
}

impl fmt::Debug for AuthorizeRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizeRequest")
            .field("authorize", &"<redacted>")
            .finish()
    }
}

impl DerivRequest for AuthorizeRequest {
    const MSG_TYPE: &'static str = "authorize";
    type Response = AuthorizeResponse;
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthorizeResponse {
    pub authorize: Authorization,
}

/// Account the connection is authorized for.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Authorization {
    pub loginid: String,
    #[serde(default)]
    pub currency: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub balance: Decimal,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub fullname: Option<String>,
    #[serde(default)]
    pub landing_company_name: Option<String>,
    #[serde(default)]
    pub is_virtual: u8,
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl Authorization {
    pub fn is_virtual(&self) -> bool {
        flag(self.is_virtual)
    }

    /// Whether the token grants a scope, e.g. `trade`
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s == scope)
    }
}
