//! In-process document store.
//!
//! Holds one collection in memory and serves live queries by re-evaluating
//! every subscription after each write. Fault injection covers the failure
//! modes the engine has to survive: rejected writes, queries lacking a
//! composite index, and delayed change delivery.

use async_trait::async_trait;
use jobsync_core::models::Document;
use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::patch::DocumentPatch;
use crate::query::{JobQuery, OrderField};
use crate::traits::{DocumentStore, Subscription};

struct Subscriber {
    query: JobQuery,
    tx: mpsc::UnboundedSender<StoreResult<Vec<Document>>>,
    token: CancellationToken,
    last: Option<Vec<Document>>,
}

impl Subscriber {
    fn is_live(&self) -> bool {
        !self.token.is_cancelled() && !self.tx.is_closed()
    }
}

#[derive(Default)]
struct Inner {
    docs: BTreeMap<String, JsonValue>,
    subscribers: Vec<Subscriber>,
    reject_writes: Option<String>,
    missing_indexes: HashSet<OrderField>,
    held: bool,
    write_count: u64,
}

impl Inner {
    fn snapshot(&self) -> Vec<Document> {
        self.docs
            .iter()
            .map(|(id, data)| Document::new(id.clone(), data.clone()))
            .collect()
    }

    fn index_missing(&self, query: &JobQuery) -> bool {
        query.requires_composite_index()
            && query
                .order_by
                .is_some_and(|order| self.missing_indexes.contains(&order.field))
    }

    /// Push fresh results to every subscriber whose result set changed.
    fn notify(&mut self) {
        self.subscribers.retain(Subscriber::is_live);
        if self.held {
            return;
        }
        let docs = self.snapshot();
        for sub in &mut self.subscribers {
            let result = sub.query.evaluate(docs.iter().cloned());
            if sub.last.as_ref() == Some(&result) {
                continue;
            }
            sub.last = Some(result.clone());
            let _ = sub.tx.send(Ok(result));
        }
    }
}

/// In-memory [`DocumentStore`] for one collection.
#[derive(Clone)]
pub struct MemoryDocumentStore {
    collection: Arc<str>,
    inner: Arc<Mutex<Inner>>,
}

impl MemoryDocumentStore {
    pub fn new(collection: impl Into<String>) -> Self {
        let collection: String = collection.into();
        Self {
            collection: Arc::from(collection),
            inner: Arc::new(Mutex::new(Inner::default())),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reject every subsequent write with `reason`; `None` accepts writes again.
    pub fn reject_writes(&self, reason: Option<&str>) {
        self.lock().reject_writes = reason.map(str::to_string);
    }

    /// Make filtered queries ordered by `field` unavailable. Live subscriptions
    /// that depend on the index receive an error and end.
    pub fn drop_index(&self, field: OrderField) {
        let mut inner = self.lock();
        inner.missing_indexes.insert(field);
        let mut kept = Vec::with_capacity(inner.subscribers.len());
        for sub in std::mem::take(&mut inner.subscribers) {
            let needs_index = sub.query.requires_composite_index()
                && sub.query.order_by.is_some_and(|o| o.field == field);
            if needs_index {
                let _ = sub.tx.send(Err(StoreError::QueryUnavailable(format!(
                    "the query requires an index on {}",
                    field.document_key()
                ))));
                // Dropping the sender ends the stream after the error.
            } else {
                kept.push(sub);
            }
        }
        inner.subscribers = kept;
    }

    pub fn restore_index(&self, field: OrderField) {
        self.lock().missing_indexes.remove(&field);
    }

    /// Accept writes but withhold change notifications until
    /// [`release_deliveries`](Self::release_deliveries).
    pub fn hold_deliveries(&self) {
        self.lock().held = true;
    }

    pub fn release_deliveries(&self) {
        let mut inner = self.lock();
        inner.held = false;
        inner.notify();
    }

    /// Insert or replace a document verbatim, bypassing write rejection.
    /// Used to seed data written by other clients.
    pub fn insert_raw(&self, id: impl Into<String>, data: JsonValue) {
        let mut inner = self.lock();
        inner.docs.insert(id.into(), data);
        inner.notify();
    }

    pub fn get(&self, id: &str) -> Option<Document> {
        self.lock()
            .docs
            .get(id)
            .map(|data| Document::new(id, data.clone()))
    }

    pub fn documents(&self) -> Vec<Document> {
        self.lock().snapshot()
    }

    /// Number of accepted `create`/`update` calls.
    pub fn write_count(&self) -> u64 {
        self.lock().write_count
    }

    pub fn subscriber_count(&self) -> usize {
        let mut inner = self.lock();
        inner.subscribers.retain(Subscriber::is_live);
        inner.subscribers.len()
    }
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new(jobsync_core::constants::DEFAULT_COLLECTION)
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn create(&self, data: JsonValue) -> StoreResult<String> {
        let mut inner = self.lock();
        if let Some(reason) = &inner.reject_writes {
            return Err(StoreError::WriteRejected(reason.clone()));
        }
        if !data.is_object() {
            return Err(StoreError::InvalidDocument(
                "document data must be an object".to_string(),
            ));
        }

        let id = Uuid::new_v4().simple().to_string();
        inner.docs.insert(id.clone(), data);
        inner.write_count += 1;
        tracing::debug!(collection = %self.collection, id = %id, "Document created");
        inner.notify();
        Ok(id)
    }

    async fn update(&self, id: &str, patch: DocumentPatch) -> StoreResult<()> {
        let mut inner = self.lock();
        if let Some(reason) = &inner.reject_writes {
            return Err(StoreError::WriteRejected(reason.clone()));
        }
        let Some(data) = inner.docs.get_mut(id) else {
            return Err(StoreError::NotFound(id.to_string()));
        };

        patch.apply_to(data);
        inner.write_count += 1;
        tracing::debug!(
            collection = %self.collection,
            id = %id,
            fields = ?patch.fields().collect::<Vec<_>>(),
            "Document updated"
        );
        inner.notify();
        Ok(())
    }

    async fn subscribe(&self, query: JobQuery) -> StoreResult<Subscription> {
        let (tx, rx) = mpsc::unbounded_channel();
        let token = CancellationToken::new();
        let mut inner = self.lock();

        if inner.index_missing(&query) {
            tracing::debug!(collection = %self.collection, query = ?query, "Query needs a missing index");
            let _ = tx.send(Err(StoreError::QueryUnavailable(
                "the query requires a composite index".to_string(),
            )));
            drop(tx);
            return Ok(Subscription::new(rx, token));
        }

        let mut last = None;
        if !inner.held {
            let result = query.evaluate(inner.snapshot());
            let _ = tx.send(Ok(result.clone()));
            last = Some(result);
        }
        inner.subscribers.push(Subscriber {
            query,
            tx,
            token: token.clone(),
            last,
        });
        Ok(Subscription::new(rx, token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use serde_json::json;

    fn session(user: &str, status: &str, start: &str) -> JsonValue {
        json!({"userId": user, "status": status, "startTime": start})
    }

    #[tokio::test]
    async fn create_assigns_ids_and_notifies_subscribers() {
        let store = MemoryDocumentStore::default();
        let mut sub = store.subscribe(JobQuery::active_session("u1")).await.unwrap();
        assert_eq!(sub.next().await.unwrap().unwrap(), vec![]);

        let id = store
            .create(session("u1", "in_progress", "2024-01-01T08:00:00Z"))
            .await
            .unwrap();
        let docs = sub.next().await.unwrap().unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, id);
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn unchanged_results_are_not_redelivered() {
        let store = MemoryDocumentStore::default();
        let mut sub = store.subscribe(JobQuery::active_session("u1")).await.unwrap();
        sub.next().await.unwrap().unwrap();

        // Another user's write does not change this result set.
        store
            .create(session("u2", "in_progress", "2024-01-01T08:00:00Z"))
            .await
            .unwrap();
        store
            .create(session("u1", "in_progress", "2024-01-01T09:00:00Z"))
            .await
            .unwrap();
        let docs = sub.next().await.unwrap().unwrap();
        assert_eq!(docs[0].data["userId"], "u1");
    }

    #[tokio::test]
    async fn rejected_writes_leave_data_untouched() {
        let store = MemoryDocumentStore::default();
        store.reject_writes(Some("permission denied"));
        let err = store.create(json!({"userId": "u1"})).await.unwrap_err();
        assert_eq!(err, StoreError::WriteRejected("permission denied".into()));
        assert!(store.documents().is_empty());

        store.reject_writes(None);
        assert!(store.create(json!({"userId": "u1"})).await.is_ok());
    }

    #[tokio::test]
    async fn update_missing_document_fails() {
        let store = MemoryDocumentStore::default();
        let err = store
            .update("nope", DocumentPatch::new().set("status", json!("completed")))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn missing_index_fails_ordered_query_only() {
        let store = MemoryDocumentStore::default();
        store.drop_index(OrderField::EndTime);

        let mut ordered = store
            .subscribe(JobQuery::recent_completed("u1", 10))
            .await
            .unwrap();
        assert!(matches!(
            ordered.next().await,
            Some(Err(StoreError::QueryUnavailable(_)))
        ));
        assert!(ordered.next().await.is_none());

        let mut unordered = store
            .subscribe(JobQuery::completed_unordered("u1", 200))
            .await
            .unwrap();
        assert!(unordered.next().await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn dropping_index_ends_live_subscription() {
        let store = MemoryDocumentStore::default();
        let mut sub = store
            .subscribe(JobQuery::recent_completed("u1", 10))
            .await
            .unwrap();
        sub.next().await.unwrap().unwrap();

        store.drop_index(OrderField::EndTime);
        assert!(sub.next().await.unwrap().is_err());
        assert!(sub.next().await.is_none());
    }

    #[tokio::test]
    async fn held_deliveries_arrive_on_release() {
        let store = MemoryDocumentStore::default();
        let mut sub = store.subscribe(JobQuery::active_session("u1")).await.unwrap();
        sub.next().await.unwrap().unwrap();

        store.hold_deliveries();
        store
            .create(session("u1", "in_progress", "2024-01-01T08:00:00Z"))
            .await
            .unwrap();
        assert!(tokio::time::timeout(std::time::Duration::from_millis(20), sub.next())
            .await
            .is_err());

        store.release_deliveries();
        assert_eq!(sub.next().await.unwrap().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn dropped_subscription_is_pruned() {
        let store = MemoryDocumentStore::default();
        let sub = store.subscribe(JobQuery::active_session("u1")).await.unwrap();
        assert_eq!(store.subscriber_count(), 1);
        drop(sub);
        assert_eq!(store.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn subscription_is_a_stream() {
        let store = MemoryDocumentStore::default();
        store.insert_raw("a", session("u1", "completed", "2024-01-01T08:00:00Z"));
        let sub = store
            .subscribe(JobQuery::completed_unordered("u1", 200))
            .await
            .unwrap();
        let first: Vec<_> = sub.take(1).collect().await;
        assert_eq!(first[0].as_ref().unwrap()[0].id, "a");
    }
}
