#![allow(dead_code)]

use bytes::Bytes;
use chrono::{DateTime, Utc};
use jobsync_core::models::Document;
use jobsync_core::SyncConfig;
use jobsync_db::MemoryDocumentStore;
use jobsync_services::{
    ClockActionState, ClockOutcome, FixedGeolocator, Geolocator, MonotonicClock, PhotoFile,
    RecordingNotifier, SyncContext, SyncEngine,
};
use jobsync_storage::MemoryBlobStore;
use std::sync::Arc;

pub const USER: &str = "tech-1";

pub struct Fixture {
    pub store: MemoryDocumentStore,
    pub blobs: MemoryBlobStore,
    pub notifier: RecordingNotifier,
    pub engine: SyncEngine,
}

pub fn anchor() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2024-05-01T08:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

pub async fn fixture() -> Fixture {
    fixture_with(None).await
}

/// Engine over in-process stores. `geolocator` defaults to a fixed position.
pub async fn fixture_with(geolocator: Option<Arc<dyn Geolocator>>) -> Fixture {
    fixture_with_config(SyncConfig::default(), geolocator).await
}

pub async fn fixture_with_config(
    config: SyncConfig,
    geolocator: Option<Arc<dyn Geolocator>>,
) -> Fixture {
    let store = MemoryDocumentStore::default();
    let blobs = MemoryBlobStore::new();
    let notifier = RecordingNotifier::new();
    let clock = Arc::new(MonotonicClock::new(anchor()));
    let geolocator: Arc<dyn Geolocator> = match geolocator {
        Some(geolocator) => geolocator,
        None => Arc::new(FixedGeolocator::new(45.5, -73.6, Some(12.0), clock.clone())),
    };

    let ctx = SyncContext::new(
        USER,
        Arc::new(store.clone()),
        Arc::new(blobs.clone()),
        config,
    )
    .with_clock(clock)
    .with_geolocator(geolocator)
    .with_notifier(Arc::new(notifier.clone()));

    let engine = SyncEngine::start(ctx).await;
    engine
        .sessions()
        .watch()
        .wait_for(|s| s.loaded)
        .await
        .unwrap();

    Fixture {
        store,
        blobs,
        notifier,
        engine,
    }
}

impl Fixture {
    /// Clock in and wait for the subscription to confirm it.
    pub async fn open_session(&self, job_type: &str) -> String {
        let receipt = self.engine.clock_in(job_type).await.unwrap();
        assert_confirmed(&self.engine.clock().settled().await);
        receipt.session_id
    }

    pub fn docs_for_user(&self) -> Vec<Document> {
        self.store
            .documents()
            .into_iter()
            .filter(|d| d.data["userId"] == USER)
            .collect()
    }

    pub fn open_count(&self) -> usize {
        self.docs_for_user()
            .iter()
            .filter(|d| d.data["status"] == "in_progress")
            .count()
    }
}

pub fn assert_confirmed(state: &ClockActionState) {
    assert!(
        matches!(
            state,
            ClockActionState::Resolved {
                outcome: ClockOutcome::Confirmed,
                ..
            }
        ),
        "expected confirmed, got {:?}",
        state
    );
}

pub fn jpeg(name: &str, size: usize) -> PhotoFile {
    PhotoFile::new(name, "image/jpeg", Bytes::from(vec![0xFFu8; size]))
}
