//! Live view of the user's open session.
//!
//! The store is the only writer of the active session id. Every other
//! component reads it from the [`SessionSnapshot`] watch channel right before
//! acting on it.

use chrono::Duration;
use jobsync_core::{format_hms, log_error, SyncError};
use jobsync_core::models::{Document, JobPhoto, JobSession, PhotoKind};
use jobsync_core::validation::{decode_job_session, extract_job_session, join_issues};
use jobsync_db::{JobQuery, Subscription};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::clock::Clock;
use crate::context::SyncContext;
use crate::scope::SessionScope;

/// Uploaded photos split by kind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PhotoGroups {
    pub before: Vec<JobPhoto>,
    pub after: Vec<JobPhoto>,
    pub unsorted: Vec<JobPhoto>,
}

impl PhotoGroups {
    pub fn from_photos(photos: &[JobPhoto]) -> Self {
        let mut groups = Self::default();
        for photo in photos {
            let group = match photo.kind {
                PhotoKind::Before => &mut groups.before,
                PhotoKind::After => &mut groups.after,
                PhotoKind::Unsorted => &mut groups.unsorted,
            };
            group.push(photo.clone());
        }
        groups
    }

    pub fn total(&self) -> usize {
        self.before.len() + self.after.len() + self.unsorted.len()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActiveSession {
    pub session: JobSession,
    pub photos: PhotoGroups,
}

impl ActiveSession {
    pub fn new(session: JobSession) -> Self {
        let photos = PhotoGroups::from_photos(&session.photos);
        Self { session, photos }
    }

    pub fn id(&self) -> &str {
        &self.session.id
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionSnapshot {
    pub active: Option<ActiveSession>,
    /// Set once the first result set has been applied.
    pub loaded: bool,
    /// Bumped on every applied result set.
    pub generation: u64,
}

impl SessionSnapshot {
    pub fn active_id(&self) -> Option<&str> {
        self.active.as_ref().map(ActiveSession::id)
    }
}

struct ElapsedMark {
    session_id: String,
    high_water: Duration,
}

struct Shared {
    tx: watch::Sender<SessionSnapshot>,
    scope: SessionScope,
}

impl Shared {
    fn apply(&self, doc: Option<Document>) {
        match doc {
            Some(doc) => {
                let session = match decode_job_session(&doc) {
                    Ok(session) => session,
                    Err(issues) => {
                        log_error(&SyncError::Decode {
                            id: doc.id.clone(),
                            issues: join_issues(&issues),
                        });
                        extract_job_session(&doc)
                    }
                };

                let switched = self
                    .tx
                    .borrow()
                    .active_id()
                    .is_some_and(|current| current != session.id);
                if switched {
                    tracing::debug!(session_id = %session.id, "Active session replaced");
                    self.scope.clear_queues();
                }
                self.scope.observe_session(&session.id, &session.details);

                tracing::debug!(
                    session_id = %session.id,
                    photos = session.photos.len(),
                    "Active session updated"
                );
                let active = ActiveSession::new(session);
                self.tx.send_modify(|snapshot| {
                    snapshot.active = Some(active);
                    snapshot.loaded = true;
                    snapshot.generation += 1;
                });
            }
            None => {
                self.scope.reset();
                self.tx.send_modify(|snapshot| {
                    if let Some(previous) = snapshot.active.take() {
                        tracing::debug!(session_id = %previous.id(), "No active session");
                    }
                    snapshot.loaded = true;
                    snapshot.generation += 1;
                });
            }
        }
    }

    /// The subscription is gone. Nothing it reported can be trusted any more,
    /// so the store reads as loaded with no session.
    fn fail(&self) {
        self.apply(None);
    }
}

pub struct SessionStore {
    shared: Arc<Shared>,
    clock: Arc<dyn Clock>,
    token: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
    elapsed: Mutex<Option<ElapsedMark>>,
}

impl SessionStore {
    /// Subscribe to the user's open session. A subscription that cannot be
    /// started is logged and leaves the store empty.
    #[tracing::instrument(skip_all, fields(user_id = %ctx.user_id))]
    pub async fn start(ctx: &SyncContext, scope: SessionScope) -> Self {
        let (tx, _) = watch::channel(SessionSnapshot::default());
        let shared = Arc::new(Shared { tx, scope });
        let token = ctx.shutdown.child_token();

        let task = match ctx
            .store
            .subscribe(JobQuery::active_session(ctx.user_id.clone()))
            .await
        {
            Ok(subscription) => Some(tokio::spawn(run(
                subscription,
                shared.clone(),
                token.clone(),
            ))),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to subscribe to active session");
                shared.fail();
                None
            }
        };

        Self {
            shared,
            clock: ctx.clock.clone(),
            token,
            task: Mutex::new(task),
            elapsed: Mutex::new(None),
        }
    }

    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.shared.tx.subscribe()
    }

    pub fn current(&self) -> SessionSnapshot {
        self.shared.tx.borrow().clone()
    }

    pub fn active_id(&self) -> Option<String> {
        self.shared.tx.borrow().active_id().map(str::to_string)
    }

    pub fn scope(&self) -> &SessionScope {
        &self.shared.scope
    }

    /// Time since the active session started; zero without one.
    ///
    /// Never decreases for a given session, even if the wall clock steps back.
    pub fn elapsed(&self) -> Duration {
        let (id, start) = {
            let snapshot = self.shared.tx.borrow();
            match snapshot.active.as_ref() {
                Some(active) => (active.id().to_string(), active.session.start_time),
                None => {
                    *self.elapsed.lock().unwrap_or_else(PoisonError::into_inner) = None;
                    return Duration::zero();
                }
            }
        };

        let raw = start
            .map(|start| (self.clock.now() - start).max(Duration::zero()))
            .unwrap_or_else(Duration::zero);

        let mut mark = self.elapsed.lock().unwrap_or_else(PoisonError::into_inner);
        match mark.as_mut() {
            Some(m) if m.session_id == id => {
                m.high_water = m.high_water.max(raw);
                m.high_water
            }
            _ => {
                *mark = Some(ElapsedMark {
                    session_id: id,
                    high_water: raw,
                });
                raw
            }
        }
    }

    /// `HH:MM:SS` of [`elapsed`](Self::elapsed).
    pub fn elapsed_display(&self) -> String {
        format_hms(self.elapsed())
    }

    /// Stop the subscription and wait for the listener to exit.
    pub async fn shutdown(&self) {
        self.token.cancel();
        let task = self.task.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Session listener ended abnormally");
            }
        }
    }
}

async fn run(mut subscription: Subscription, shared: Arc<Shared>, token: CancellationToken) {
    loop {
        tokio::select! {
            _ = token.cancelled() => {
                tracing::debug!("Active session subscription cancelled");
                break;
            }
            next = subscription.next() => match next {
                Some(Ok(docs)) => shared.apply(docs.into_iter().next()),
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "Active session subscription error, clearing session");
                    shared.fail();
                }
                None => {
                    tracing::warn!("Active session subscription ended");
                    shared.fail();
                    break;
                }
            }
        }
    }
    subscription.unsubscribe();
}
