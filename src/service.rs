//! High-level Deriv trading service.
//!
//! [`DerivApiService`] owns one connection and keeps track of the tick
//! subscriptions it opened, keyed by `ticks_<symbol>`. Ticks from every
//! subscription are fanned out on a broadcast channel.
//!
//! ```rust,ignore
//! use deriv_sdk::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), WebSocketError> {
//!     let mut service = DerivApiService::connect(DerivConfig::new("1089")).await?;
//!     let mut ticks = service.tick_stream();
//!     service.subscribe_ticks("R_100").await?;
//!
//!     while let Ok(tick) = ticks.recv().await {
//!         println!("{} {}", tick.symbol, tick.display_quote());
//!     }
//!
//!     service.disconnect().await
//! }
//! ```

use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::{broadcast, Mutex};

use crate::api::types::{
    ActiveSymbolsRequest, ActiveSymbolsResponse, AuthorizeRequest, Authorization,
    BuyContractRequest, BuyContractResponse, ContractsForRequest, ContractsForResponse,
    PriceProposalRequest, PriceProposalResponse, Tick, TickResponse, TicksRequest,
};
use crate::config::DerivConfig;
use crate::websocket::{
    ActiveSubscription, DerivWebSocketClient, Subscription, SubscriptionHandle,
    SubscriptionRegistry, WsResult,
};

/// Ticks buffered per `tick_stream` receiver before it lags.
const TICK_CHANNEL_CAPACITY: usize = 1024;

/// Registry key for a symbol's tick subscription
pub fn tick_key(symbol: &str) -> String {
    format!("ticks_{}", symbol)
}

/// Façade over one Deriv connection.
pub struct DerivApiService {
    client: DerivWebSocketClient,
    subscriptions: Arc<Mutex<SubscriptionRegistry>>,
    tick_tx: broadcast::Sender<Tick>,
    authorization: Option<Authorization>,
}

impl std::fmt::Debug for DerivApiService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivApiService").finish_non_exhaustive()
    }
}

impl DerivApiService {
    /// Validate `config`, connect, and authorize when a token is configured.
    pub async fn connect(config: DerivConfig) -> WsResult<Self> {
        config.validate()?;
        let url = config.url();
        tracing::info!("Connecting to Deriv API at {}", config.endpoint_or_default());

        let client = DerivWebSocketClient::connect_with_config(&url, config.websocket.clone())
            .await
            .inspect_err(|e| tracing::error!("Error connecting to Deriv API: {}", e))?;

        let (tick_tx, _) = broadcast::channel(TICK_CHANNEL_CAPACITY);
        let mut service = Self {
            client,
            subscriptions: Arc::new(Mutex::new(SubscriptionRegistry::new())),
            tick_tx,
            authorization: None,
        };

        if let Some(token) = config.api_token.as_deref() {
            let authorization = service.authorize(token).await?;
            service.authorization = Some(authorization);
        }

        Ok(service)
    }

    /// Authorize the connection. Required before buying contracts.
    pub async fn authorize(&self, token: &str) -> WsResult<Authorization> {
        let response = self
            .client
            .send(&AuthorizeRequest::new(token))
            .await
            .inspect_err(|e| tracing::error!("Error authorizing: {}", e))?;
        tracing::info!("Authorized as {}", response.authorize.loginid);
        Ok(response.authorize)
    }

    /// Account authorized during `connect`, if any
    pub fn authorization(&self) -> Option<&Authorization> {
        self.authorization.as_ref()
    }

    /// Stream live ticks for `symbol`.
    ///
    /// Ticks are delivered through [`tick_stream`](Self::tick_stream). An
    /// existing subscription for the same symbol is cancelled first.
    pub async fn subscribe_ticks(&self, symbol: &str) -> WsResult<SubscriptionHandle> {
        let key = tick_key(symbol);

        let existing = self.subscriptions.lock().await.remove(&key);
        if let Some(existing) = existing {
            tracing::debug!("Replacing subscription {}", key);
            if let Err(e) = existing.unsubscribe().await {
                tracing::warn!("Failed to cancel previous subscription {}: {}", key, e);
            }
        }

        let subscription: Subscription<TickResponse> = self
            .client
            .subscribe(&TicksRequest::new(symbol))
            .await
            .inspect_err(|e| tracing::error!("Error subscribing to ticks for {}: {}", symbol, e))?;
        let handle = subscription.handle();

        let replaced = {
            let mut registry = self.subscriptions.lock().await;
            let generation = registry.next_generation();
            let task = tokio::spawn(forward_ticks(
                subscription,
                key.clone(),
                generation,
                self.subscriptions.clone(),
                self.tick_tx.clone(),
            ));
            registry.insert(
                key.clone(),
                ActiveSubscription::new(handle.clone(), generation, task),
            )
        };

        // A concurrent call for the same symbol got in between
        if let Some(replaced) = replaced {
            if let Err(e) = replaced.unsubscribe().await {
                tracing::warn!("Failed to cancel previous subscription {}: {}", key, e);
            }
        }

        tracing::info!("Subscribed to ticks for {} ({:?})", symbol, handle.id());
        Ok(handle)
    }

    /// Cancel the tick subscription for `symbol`. Returns whether one existed.
    pub async fn unsubscribe_ticks(&self, symbol: &str) -> WsResult<bool> {
        let key = tick_key(symbol);
        let entry = self.subscriptions.lock().await.remove(&key);
        match entry {
            Some(entry) => {
                entry.unsubscribe().await?;
                tracing::info!("Unsubscribed {}", key);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Receiver for ticks of every active subscription.
    pub fn tick_stream(&self) -> broadcast::Receiver<Tick> {
        self.tick_tx.subscribe()
    }

    pub async fn get_active_symbols(&self) -> WsResult<ActiveSymbolsResponse> {
        self.client
            .send(&ActiveSymbolsRequest::default())
            .await
            .inspect_err(|e| tracing::error!("Error fetching active symbols: {}", e))
    }

    pub async fn get_contracts_for_symbol(&self, symbol: &str) -> WsResult<ContractsForResponse> {
        self.client
            .send(&ContractsForRequest::new(symbol))
            .await
            .inspect_err(|e| tracing::error!("Error fetching contracts for {}: {}", symbol, e))
    }

    pub async fn get_price_proposal(
        &self,
        request: &PriceProposalRequest,
    ) -> WsResult<PriceProposalResponse> {
        self.client
            .send(request)
            .await
            .inspect_err(|e| tracing::error!("Error getting price proposal: {}", e))
    }

    pub async fn buy_contract(&self, request: &BuyContractRequest) -> WsResult<BuyContractResponse> {
        let response = self
            .client
            .send(request)
            .await
            .inspect_err(|e| tracing::error!("Error buying contract: {}", e))?;
        tracing::info!(
            "Bought contract {} for {}",
            response.buy.contract_id,
            response.buy.buy_price
        );
        Ok(response)
    }

    pub async fn ping(&self) -> WsResult<()> {
        self.client.ping().await
    }

    /// Cancel every tracked subscription. Failures are logged, never returned.
    pub async fn unsubscribe_all(&self) {
        let entries = self.subscriptions.lock().await.drain();
        if entries.is_empty() {
            return;
        }

        tracing::info!("Unsubscribing {} subscription(s)", entries.len());
        for (key, entry) in entries {
            if let Err(e) = entry.unsubscribe().await {
                tracing::warn!("Failed to unsubscribe {}: {}", key, e);
            }
        }
    }

    /// Cancel every subscription, then close the connection.
    pub async fn disconnect(&mut self) -> WsResult<()> {
        self.unsubscribe_all().await;
        self.client.disconnect().await?;
        tracing::info!("Disconnected from Deriv API");
        Ok(())
    }

    /// Keys of the active subscriptions, sorted
    pub async fn subscription_keys(&self) -> Vec<String> {
        self.subscriptions.lock().await.keys()
    }

    pub async fn is_subscribed(&self, key: &str) -> bool {
        self.subscriptions.lock().await.contains(key)
    }

    pub fn is_connected(&self) -> bool {
        self.client.is_connected()
    }

    /// The underlying client, for calls the service does not wrap.
    pub fn client(&self) -> &DerivWebSocketClient {
        &self.client
    }
}

impl Drop for DerivApiService {
    fn drop(&mut self) {
        if let Ok(mut registry) = self.subscriptions.try_lock() {
            for (_, entry) in registry.drain() {
                entry.abort();
            }
        }
    }
}

/// Log and broadcast each tick, then drop the registry entry once the stream ends.
async fn forward_ticks(
    mut subscription: Subscription<TickResponse>,
    key: String,
    generation: u64,
    registry: Arc<Mutex<SubscriptionRegistry>>,
    tick_tx: broadcast::Sender<Tick>,
) {
    while let Some(message) = subscription.next().await {
        match message {
            Ok(response) => {
                let tick = response.tick;
                tracing::debug!("Tick {} {} @ {}", tick.symbol, tick.display_quote(), tick.epoch);
                // No receivers is fine
                let _ = tick_tx.send(tick);
            }
            Err(e) => tracing::warn!("Tick stream {} error: {}", key, e),
        }
    }

    if registry.lock().await.remove_if_current(&key, generation) {
        tracing::info!("Tick stream {} ended", key);
    }
}
