use jobsync_core::{SyncConfig, SyncError, SyncResult};
use jobsync_db::DocumentStore;
use jobsync_storage::BlobStore;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::clock::{Clock, SystemClock};
use crate::geo::{CachedGeolocator, Geolocator, UnavailableGeolocator};
use crate::identity::IdentityProvider;
use crate::notify::{Notifier, TracingNotifier};
use crate::preview::PreviewRegistry;

/// Everything a component needs, scoped to one signed-in user.
///
/// Cloning is cheap. Cancelling [`shutdown`](Self::shutdown) tears down every
/// subscription and timer started from this context.
#[derive(Clone)]
pub struct SyncContext {
    pub user_id: String,
    pub store: Arc<dyn DocumentStore>,
    pub blobs: Arc<dyn BlobStore>,
    pub geolocator: Arc<dyn Geolocator>,
    pub notifier: Arc<dyn Notifier>,
    pub clock: Arc<dyn Clock>,
    pub config: Arc<SyncConfig>,
    pub previews: PreviewRegistry,
    pub shutdown: CancellationToken,
}

impl SyncContext {
    pub fn new(
        user_id: impl Into<String>,
        store: Arc<dyn DocumentStore>,
        blobs: Arc<dyn BlobStore>,
        config: SyncConfig,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            store,
            blobs,
            geolocator: Arc::new(UnavailableGeolocator),
            notifier: Arc::new(TracingNotifier),
            clock: Arc::new(SystemClock),
            config: Arc::new(config),
            previews: PreviewRegistry::new(),
            shutdown: CancellationToken::new(),
        }
    }

    /// Context for whoever is signed in with `identity`.
    pub fn for_signed_in(
        identity: &dyn IdentityProvider,
        store: Arc<dyn DocumentStore>,
        blobs: Arc<dyn BlobStore>,
        config: SyncConfig,
    ) -> SyncResult<Self> {
        let user = identity.current_user().ok_or(SyncError::NotSignedIn)?;
        Ok(Self::new(user.uid, store, blobs, config))
    }

    /// Use `geolocator`, reusing fixes younger than the configured max age.
    pub fn with_geolocator(mut self, geolocator: Arc<dyn Geolocator>) -> Self {
        self.geolocator = Arc::new(CachedGeolocator::new(
            geolocator,
            self.clock.clone(),
            self.config.geolocation_max_age,
        ));
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Set before [`with_geolocator`](Self::with_geolocator) so the position
    /// cache ages fixes against the same clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}
