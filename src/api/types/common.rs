//! Connection-level calls: ping, server time, forget.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{one, DerivRequest};

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PingRequest {
    pub ping: u8,
}

impl Default for PingRequest {
    fn default() -> Self {
        Self { ping: one() }
    }
}

impl DerivRequest for PingRequest {
    const MSG_TYPE: &'static str = "ping";
    type Response = PingResponse;
}

#[derive(Debug, Clone, Deserialize)]
pub struct PingResponse {
    /// `"pong"`
    pub ping: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TimeRequest {
    pub time: u8,
}

impl Default for TimeRequest {
    fn default() -> Self {
        Self { time: one() }
    }
}

impl DerivRequest for TimeRequest {
    const MSG_TYPE: &'static str = "time";
    type Response = TimeResponse;
}

#[derive(Debug, Clone, Deserialize)]
pub struct TimeResponse {
    /// Server epoch seconds
    pub time: i64,
}

impl TimeResponse {
    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.time, 0)
    }
}

/// Cancel one subscription by id.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ForgetRequest {
    pub forget: String,
}

impl ForgetRequest {
    pub fn new(subscription_id: impl Into<String>) -> Self {
        Self {
            forget: subscription_id.into(),
        }
    }
}

impl DerivRequest for ForgetRequest {
    const MSG_TYPE: &'static str = "forget";
    type Response = ForgetResponse;
}

#[derive(Debug, Clone, Deserialize)]
pub struct ForgetResponse {
    /// `1` if a subscription was removed
    pub forget: u8,
}

impl ForgetResponse {
    pub fn removed(&self) -> bool {
        super::flag(self.forget)
    }
}

/// Cancel every subscription of the given stream types, e.g. `ticks`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ForgetAllRequest {
    pub forget_all: Vec<String>,
}

impl ForgetAllRequest {
    pub fn new<I, S>(streams: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            forget_all: streams.into_iter().map(Into::into).collect(),
        }
    }
}

impl DerivRequest for ForgetAllRequest {
    const MSG_TYPE: &'static str = "forget_all";
    type Response = ForgetAllResponse;
}

#[derive(Debug, Clone, Deserialize)]
pub struct ForgetAllResponse {
    /// Ids of the removed subscriptions
    pub forget_all: Vec<String>,
}
