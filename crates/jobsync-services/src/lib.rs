//! Jobsync services
//!
//! The job-session synchronization engine. Components share a [`SyncContext`]
//! and read the active session from [`SessionStore`], its only writer:
//!
//! - [`ClockActionCoordinator`]: clock-in/out confirmed by the subscription,
//!   bounded by a confirmation deadline and a safety deadline.
//! - [`DetailsAutosaver`]: debounced writes of the editable job details.
//! - [`PhotoUploadPipeline`]: validated queues and sequential uploads.
//! - [`RecentActivityFeed`]: recent completed sessions with query fallback.
//!
//! [`SyncEngine`] wires them together and tears them down.

pub mod autosave;
pub mod clock;
pub mod clock_action;
pub mod context;
pub mod engine;
pub mod geo;
pub mod identity;
pub mod notify;
pub mod photo_pipeline;
pub mod preview;
pub mod recent_activity;
pub mod scope;
pub mod session_store;

pub use autosave::{DetailsAutosaver, SaveStatus};
pub use clock::{Clock, MonotonicClock, SystemClock};
pub use clock_action::{
    ClockActionCoordinator, ClockActionState, ClockDirection, ClockOutcome, ClockReceipt,
};
pub use context::SyncContext;
pub use engine::SyncEngine;
pub use geo::{
    locate_best_effort, CachedGeolocator, FixedGeolocator, GeoError, Geolocator,
    StalledGeolocator, UnavailableGeolocator,
};
pub use identity::{IdentityProvider, LocalIdentityProvider, UserIdentity};
pub use notify::{
    report_error, ChannelNotifier, Notification, NotificationLevel, Notifier, RecordingNotifier,
    TracingNotifier,
};
pub use photo_pipeline::{BatchProgress, PhotoUploadPipeline, SelectionReport, UploadSummary};
pub use preview::{PreviewHandle, PreviewRegistry};
pub use recent_activity::{rank_recent, FeedSource, RecentActivityFeed, RecentEntry, RecentFeed};
pub use scope::{DetailsDraft, PendingView, PhotoFile, SessionScope};
pub use session_store::{ActiveSession, PhotoGroups, SessionSnapshot, SessionStore};
