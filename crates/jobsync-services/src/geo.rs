//! Device geolocation seam.
//!
//! Positions are best effort: every failure, including a timeout, collapses
//! to "unknown" and never blocks a clock action beyond the configured bound.

use async_trait::async_trait;
use jobsync_core::models::GeoPoint;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;

use crate::clock::Clock;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GeoError {
    #[error("Location permission denied")]
    PermissionDenied,

    #[error("Position unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait Geolocator: Send + Sync {
    /// Single-shot position request; high accuracy preferred.
    async fn current_position(&self) -> Result<GeoPoint, GeoError>;
}

/// Fetch a position, giving up after `timeout`. Never fails.
pub async fn locate_best_effort(geolocator: &dyn Geolocator, timeout: Duration) -> Option<GeoPoint> {
    match tokio::time::timeout(timeout, geolocator.current_position()).await {
        Ok(Ok(point)) => Some(point),
        Ok(Err(e)) => {
            tracing::debug!(error = %e, "Geolocation failed, continuing without position");
            None
        }
        Err(_) => {
            tracing::debug!(timeout_ms = timeout.as_millis() as u64, "Geolocation timed out");
            None
        }
    }
}

/// Reuses the last fix while it is younger than `max_age`.
pub struct CachedGeolocator {
    inner: Arc<dyn Geolocator>,
    clock: Arc<dyn Clock>,
    max_age: Duration,
    last: Mutex<Option<GeoPoint>>,
}

impl CachedGeolocator {
    pub fn new(inner: Arc<dyn Geolocator>, clock: Arc<dyn Clock>, max_age: Duration) -> Self {
        Self {
            inner,
            clock,
            max_age,
            last: Mutex::new(None),
        }
    }

    fn fresh_cached(&self) -> Option<GeoPoint> {
        let last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        let point = last.as_ref()?;
        let age = (self.clock.now() - point.captured_at).to_std().ok()?;
        (age <= self.max_age).then(|| point.clone())
    }
}

#[async_trait]
impl Geolocator for CachedGeolocator {
    async fn current_position(&self) -> Result<GeoPoint, GeoError> {
        if let Some(point) = self.fresh_cached() {
            return Ok(point);
        }
        let point = self.inner.current_position().await?;
        *self.last.lock().unwrap_or_else(PoisonError::into_inner) = Some(point.clone());
        Ok(point)
    }
}

/// Always reports the same coordinates, stamped with the current time.
pub struct FixedGeolocator {
    lat: f64,
    lng: f64,
    accuracy_meters: Option<f64>,
    clock: Arc<dyn Clock>,
}

impl FixedGeolocator {
    pub fn new(lat: f64, lng: f64, accuracy_meters: Option<f64>, clock: Arc<dyn Clock>) -> Self {
        Self {
            lat,
            lng,
            accuracy_meters,
            clock,
        }
    }
}

#[async_trait]
impl Geolocator for FixedGeolocator {
    async fn current_position(&self) -> Result<GeoPoint, GeoError> {
        Ok(GeoPoint::new(
            self.lat,
            self.lng,
            self.accuracy_meters,
            self.clock.now(),
        ))
    }
}

/// A device without location support.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableGeolocator;

#[async_trait]
impl Geolocator for UnavailableGeolocator {
    async fn current_position(&self) -> Result<GeoPoint, GeoError> {
        Err(GeoError::Unavailable("no location provider".to_string()))
    }
}

/// Never answers; stands in for a request stuck waiting on the device.
#[derive(Debug, Clone, Copy, Default)]
pub struct StalledGeolocator;

#[async_trait]
impl Geolocator for StalledGeolocator {
    async fn current_position(&self) -> Result<GeoPoint, GeoError> {
        std::future::pending().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MonotonicClock;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingGeolocator {
        calls: AtomicUsize,
        clock: Arc<dyn Clock>,
    }

    #[async_trait]
    impl Geolocator for CountingGeolocator {
        async fn current_position(&self) -> Result<GeoPoint, GeoError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(GeoPoint::new(1.0, 2.0, None, self.clock.now()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_lookup_resolves_to_unknown_after_timeout() {
        let started = tokio::time::Instant::now();
        let point = locate_best_effort(&StalledGeolocator, Duration::from_secs(8)).await;
        assert!(point.is_none());
        assert_eq!(started.elapsed(), Duration::from_secs(8));
    }

    #[tokio::test]
    async fn failures_resolve_to_unknown() {
        assert!(locate_best_effort(&UnavailableGeolocator, Duration::from_secs(1))
            .await
            .is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn cache_serves_fixes_younger_than_max_age() {
        let clock: Arc<dyn Clock> = Arc::new(MonotonicClock::new(Utc::now()));
        let inner = Arc::new(CountingGeolocator {
            calls: AtomicUsize::new(0),
            clock: clock.clone(),
        });
        let cached = CachedGeolocator::new(inner.clone(), clock, Duration::from_secs(60));

        cached.current_position().await.unwrap();
        tokio::time::advance(Duration::from_secs(30)).await;
        cached.current_position().await.unwrap();
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(31)).await;
        cached.current_position().await.unwrap();
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
    }
}
