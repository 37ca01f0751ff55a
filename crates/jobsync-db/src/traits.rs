//! Document store abstraction trait

use async_trait::async_trait;
use futures::Stream;
use jobsync_core::models::Document;
use serde_json::Value as JsonValue;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::StoreResult;
use crate::patch::DocumentPatch;
use crate::query::JobQuery;

/// Realtime document store bound to one collection.
///
/// Writes are acknowledged independently of subscriptions: a successful
/// `create` or `update` says nothing about when live queries will reflect it.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Create a document and return the id assigned by the store.
    async fn create(&self, data: JsonValue) -> StoreResult<String>;

    /// Apply a partial update. Fails if the document does not exist.
    async fn update(&self, id: &str, patch: DocumentPatch) -> StoreResult<()>;

    /// Start a live query. The returned stream yields the full result set each
    /// time it changes; a query the store cannot serve yields a single error
    /// and then ends.
    async fn subscribe(&self, query: JobQuery) -> StoreResult<Subscription>;
}

/// A live query. Dropping it unsubscribes.
pub struct Subscription {
    receiver: mpsc::UnboundedReceiver<StoreResult<Vec<Document>>>,
    token: CancellationToken,
}

impl Subscription {
    /// Build a subscription fed by `receiver`. The producer must stop sending
    /// once `token` is cancelled.
    pub fn new(
        receiver: mpsc::UnboundedReceiver<StoreResult<Vec<Document>>>,
        token: CancellationToken,
    ) -> Self {
        Self { receiver, token }
    }

    /// Next result set; `None` once the subscription has ended.
    pub async fn next(&mut self) -> Option<StoreResult<Vec<Document>>> {
        if self.token.is_cancelled() {
            return None;
        }
        self.receiver.recv().await
    }

    pub fn unsubscribe(&self) {
        self.token.cancel();
    }

    pub fn is_active(&self) -> bool {
        !self.token.is_cancelled()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

impl Stream for Subscription {
    type Item = StoreResult<Vec<Document>>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.token.is_cancelled() {
            return Poll::Ready(None);
        }
        this.receiver.poll_recv(cx)
    }
}
