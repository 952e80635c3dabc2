//! Subscription streams and their bookkeeping.
//!
//! A [`Subscription`] yields every message the server pushes for one
//! subscribed call. A [`SubscriptionHandle`] cancels it. The
//! [`SubscriptionRegistry`] maps caller-chosen keys (e.g. `ticks_R_100`) to
//! the handle of the subscription currently active under that key.

use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::Stream;
use pin_project_lite::pin_project;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::websocket::client::RequestDispatcher;
use crate::websocket::error::WsResult;
use crate::websocket::types::decode;

/// Cancels one server-side subscription.
#[derive(Debug, Clone)]
pub struct SubscriptionHandle {
    req_id: u64,
    id: Option<String>,
    dispatcher: RequestDispatcher,
}

impl SubscriptionHandle {
    pub(crate) fn new(req_id: u64, id: Option<String>, dispatcher: RequestDispatcher) -> Self {
        Self {
            req_id,
            id,
            dispatcher,
        }
    }

    /// Request id the subscription was opened with
    pub fn req_id(&self) -> u64 {
        self.req_id
    }

    /// Server-assigned subscription id
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Stop routing messages locally and `forget` the subscription on the server.
    pub async fn cancel(&self) -> WsResult<()> {
        self.dispatcher.release_stream(self.req_id).await;

        let Some(id) = self.id.as_deref() else {
            return Ok(());
        };

        let removed = self.dispatcher.forget(id).await?;
        if !removed {
            tracing::debug!("Subscription {} was already gone on the server", id);
        }
        Ok(())
    }
}

pin_project! {
    /// Stream of messages for one subscription.
    ///
    /// Dropping it without calling [`Subscription::unsubscribe`] makes the
    /// connection task forget the subscription when its next message arrives.
    pub struct Subscription<T> {
        handle: SubscriptionHandle,
        first: Option<Value>,
        #[pin]
        rx: mpsc::Receiver<WsResult<Value>>,
        _marker: PhantomData<fn() -> T>,
    }
}

impl<T> Subscription<T> {
    pub(crate) fn new(
        handle: SubscriptionHandle,
        first: Value,
        rx: mpsc::Receiver<WsResult<Value>>,
    ) -> Self {
        Self {
            handle,
            first: Some(first),
            rx,
            _marker: PhantomData,
        }
    }

    /// Server-assigned subscription id
    pub fn id(&self) -> Option<&str> {
        self.handle.id()
    }

    pub fn req_id(&self) -> u64 {
        self.handle.req_id()
    }

    /// A clonable handle that can cancel this subscription from elsewhere.
    pub fn handle(&self) -> SubscriptionHandle {
        self.handle.clone()
    }

    /// The opening message, until the stream yields it.
    pub(crate) fn first_message(&self) -> Option<&Value> {
        self.first.as_ref()
    }

    /// Reinterpret the stream's messages as another response type.
    pub fn into_typed<U>(self) -> Subscription<U> {
        let Subscription { handle, first, rx, .. } = self;
        Subscription {
            handle,
            first,
            rx,
            _marker: PhantomData,
        }
    }

    /// Cancel the subscription.
    pub async fn unsubscribe(self) -> WsResult<()> {
        self.handle.cancel().await
    }
}

impl<T> fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("req_id", &self.handle.req_id)
            .field("id", &self.handle.id)
            .finish()
    }
}

impl<T: DeserializeOwned> Stream for Subscription<T> {
    type Item = WsResult<T>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();
        if let Some(first) = this.first.take() {
            return Poll::Ready(Some(decode(first)));
        }
        match this.rx.poll_recv(cx) {
            Poll::Ready(Some(item)) => Poll::Ready(Some(item.and_then(decode))),
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}

// ============================================================================
// REGISTRY
// ============================================================================

/// A subscription kept alive by a background task.
#[derive(Debug)]
pub struct ActiveSubscription {
    handle: SubscriptionHandle,
    generation: u64,
    task: JoinHandle<()>,
}

impl ActiveSubscription {
    pub fn new(handle: SubscriptionHandle, generation: u64, task: JoinHandle<()>) -> Self {
        Self {
            handle,
            generation,
            task,
        }
    }

    pub fn handle(&self) -> &SubscriptionHandle {
        &self.handle
    }

    /// Stop the consuming task without contacting the server.
    pub fn abort(&self) {
        self.task.abort();
    }

    /// Stop the consuming task and cancel the subscription.
    pub async fn unsubscribe(self) -> WsResult<()> {
        self.task.abort();
        self.handle.cancel().await
    }
}

/// Subscription key -> active subscription.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    entries: HashMap<String, ActiveSubscription>,
    next_generation: u64,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve a generation number for the next insert.
    pub fn next_generation(&mut self) -> u64 {
        self.next_generation += 1;
        self.next_generation
    }

    /// Store a subscription, returning the one it replaces.
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        subscription: ActiveSubscription,
    ) -> Option<ActiveSubscription> {
        self.entries.insert(key.into(), subscription)
    }

    pub fn remove(&mut self, key: &str) -> Option<ActiveSubscription> {
        self.entries.remove(key)
    }

    /// Remove `key` only if it still holds the subscription of `generation`.
    pub fn remove_if_current(&mut self, key: &str, generation: u64) -> bool {
        match self.entries.get(key) {
            Some(entry) if entry.generation == generation => {
                self.entries.remove(key);
                true
            }
            _ => false,
        }
    }

    /// Take every entry, leaving the registry empty.
    pub fn drain(&mut self) -> Vec<(String, ActiveSubscription)> {
        self.entries.drain().collect()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Keys in sorted order
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
