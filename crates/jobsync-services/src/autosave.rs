//! Debounced persistence of the session details.

use chrono::{DateTime, Utc};
use jobsync_core::models::{DetailField, JobDetails};
use jobsync_core::{SyncError, SyncResult};
use jobsync_db::DocumentPatch;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::context::SyncContext;
use crate::notify::Notification;
use crate::scope::{DetailsDraft, SessionScope};
use crate::session_store::SessionSnapshot;

const SAVE_FAILED: &str = "Failed to save";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaveStatus {
    pub saving: bool,
    pub last_saved_at: Option<DateTime<Utc>>,
    /// Most recent failure, cleared by the next attempt.
    pub last_error: Option<String>,
}

struct Inner {
    ctx: SyncContext,
    scope: SessionScope,
    sessions: watch::Receiver<SessionSnapshot>,
    status: watch::Sender<SaveStatus>,
    in_flight: tokio::sync::Mutex<()>,
    deadline: Mutex<Option<Instant>>,
    wake: Notify,
}

impl Inner {
    fn lock_deadline(&self) -> MutexGuard<'_, Option<Instant>> {
        self.deadline.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Restart the quiet period.
    fn arm(&self) {
        *self.lock_deadline() = Some(Instant::now() + self.ctx.config.autosave_quiet_period);
        self.wake.notify_one();
    }

    async fn autosave(&self) {
        let Ok(_guard) = self.in_flight.try_lock() else {
            tracing::debug!("Save in flight, deferring autosave");
            self.arm();
            return;
        };
        match self.persist(false).await {
            Ok(()) | Err(SyncError::NoActiveSession) => {}
            Err(e) => tracing::debug!(error = %e, "Autosave failed"),
        }
    }

    /// Write the draft to the active session. Without `force` a clean draft
    /// is not written.
    async fn persist(&self, force: bool) -> SyncResult<()> {
        let active_id = self.sessions.borrow().active_id().map(str::to_string);
        let Some(session_id) = active_id else {
            return Err(SyncError::NoActiveSession);
        };
        let draft = self.scope.draft();
        if draft.session_id.as_deref() != Some(session_id.as_str()) {
            tracing::debug!(session_id = %session_id, "Draft belongs to another session, not saving");
            return Ok(());
        }
        if !force && !draft.is_dirty() {
            return Ok(());
        }

        self.status.send_modify(|s| {
            s.saving = true;
            s.last_error = None;
        });

        let patch = draft
            .details
            .document_entries()
            .into_iter()
            .fold(DocumentPatch::new(), |patch, (key, value)| patch.set(key, value));

        let result = self.ctx.store.update(&session_id, patch).await;
        match result {
            Ok(()) => {
                self.scope.mark_saved(&session_id, draft.revision);
                let saved_at = self.ctx.clock.now();
                self.status.send_modify(|s| {
                    s.saving = false;
                    s.last_saved_at = Some(saved_at);
                });
                tracing::debug!(session_id = %session_id, revision = draft.revision, "Job details saved");
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, session_id = %session_id, "Failed to save job details");
                self.status.send_modify(|s| {
                    s.saving = false;
                    s.last_error = Some(SAVE_FAILED.to_string());
                });
                Err(e.into())
            }
        }
    }
}

pub struct DetailsAutosaver {
    inner: Arc<Inner>,
    token: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl DetailsAutosaver {
    pub fn new(
        ctx: SyncContext,
        scope: SessionScope,
        sessions: watch::Receiver<SessionSnapshot>,
    ) -> Self {
        let token = ctx.shutdown.child_token();
        let (status, _) = watch::channel(SaveStatus::default());
        let inner = Arc::new(Inner {
            ctx,
            scope,
            sessions,
            status,
            in_flight: tokio::sync::Mutex::new(()),
            deadline: Mutex::new(None),
            wake: Notify::new(),
        });
        let task = tokio::spawn(run(inner.clone(), token.clone()));
        Self {
            inner,
            token,
            task: Mutex::new(Some(task)),
        }
    }

    pub fn edit(&self, field: DetailField, value: impl Into<String>) {
        self.inner.scope.edit(field, value);
        self.inner.arm();
    }

    pub fn set_details(&self, details: JobDetails) {
        self.inner.scope.replace_details(details);
        self.inner.arm();
    }

    pub fn draft(&self) -> DetailsDraft {
        self.inner.scope.draft()
    }

    pub fn status(&self) -> SaveStatus {
        self.inner.status.borrow().clone()
    }

    pub fn watch_status(&self) -> watch::Receiver<SaveStatus> {
        self.inner.status.subscribe()
    }

    /// Save immediately with a visible result. Supersedes a pending autosave.
    #[tracing::instrument(skip(self))]
    pub async fn save_now(&self) -> SyncResult<()> {
        let _guard = self
            .inner
            .in_flight
            .try_lock()
            .map_err(|_| SyncError::SaveInFlight)?;
        self.inner.lock_deadline().take();

        let result = self.inner.persist(true).await;
        match &result {
            Ok(()) => self
                .inner
                .ctx
                .notifier
                .notify(Notification::success("Job details saved")),
            Err(SyncError::NoActiveSession) => {}
            Err(e) => self
                .inner
                .ctx
                .notifier
                .notify(Notification::from_error(&SyncError::DetailsNotSaved(e.to_string()))),
        }
        result
    }

    /// Drop any pending autosave and stop the timer task.
    pub async fn shutdown(&self) {
        self.token.cancel();
        self.inner.lock_deadline().take();
        let task = self.task.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Autosave task ended abnormally");
            }
        }
    }
}

async fn sleep_until_due(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

async fn run(inner: Arc<Inner>, token: CancellationToken) {
    loop {
        let deadline = *inner.lock_deadline();
        tokio::select! {
            _ = token.cancelled() => break,
            _ = inner.wake.notified() => continue,
            _ = sleep_until_due(deadline) => {
                let due = {
                    let mut current = inner.lock_deadline();
                    if *current == deadline { current.take() } else { None }
                };
                if due.is_some() {
                    inner.autosave().await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MonotonicClock;
    use crate::notify::RecordingNotifier;
    use crate::preview::PreviewRegistry;
    use crate::session_store::SessionStore;
    use chrono::Utc;
    use jobsync_core::SyncConfig;
    use jobsync_db::MemoryDocumentStore;
    use jobsync_storage::MemoryBlobStore;
    use serde_json::json;
    use std::time::Duration;

    struct Harness {
        store: MemoryDocumentStore,
        notifier: RecordingNotifier,
        sessions: SessionStore,
        saver: DetailsAutosaver,
    }

    async fn harness(open: bool) -> Harness {
        let store = MemoryDocumentStore::default();
        if open {
            store.insert_raw(
                "s1",
                json!({"userId": "u1", "status": "in_progress", "startTime": "2024-05-01T08:00:00Z"}),
            );
        }
        let notifier = RecordingNotifier::new();
        let ctx = SyncContext::new(
            "u1",
            Arc::new(store.clone()),
            Arc::new(MemoryBlobStore::new()),
            SyncConfig::default(),
        )
        .with_clock(Arc::new(MonotonicClock::new(Utc::now())))
        .with_notifier(Arc::new(notifier.clone()));
        let scope = SessionScope::new(PreviewRegistry::new());
        let sessions = SessionStore::start(&ctx, scope.clone()).await;
        sessions.watch().wait_for(|s| s.loaded).await.unwrap();
        let saver = DetailsAutosaver::new(ctx, scope, sessions.watch());
        Harness {
            store,
            notifier,
            sessions,
            saver,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_edits_coalesce_into_one_write() {
        let h = harness(true).await;
        let writes_before = h.store.write_count();

        for text in ["a", "ab", "abc"] {
            h.saver.edit(DetailField::Notes, text);
            tokio::time::sleep(Duration::from_millis(300)).await;
        }
        assert_eq!(h.store.write_count(), writes_before);

        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(h.store.write_count(), writes_before + 1);
        assert_eq!(h.store.get("s1").unwrap().data["notes"], "abc");
        assert!(h.saver.status().last_saved_at.is_some());
        assert!(h.notifier.all().is_empty());
        h.saver.shutdown().await;
        h.sessions.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn no_write_without_active_session() {
        let h = harness(false).await;
        h.saver.edit(DetailField::SiteName, "Depot");
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(h.store.write_count(), 0);

        let err = h.saver.save_now().await.unwrap_err();
        assert!(matches!(err, SyncError::NoActiveSession));
        h.saver.shutdown().await;
        h.sessions.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn failed_save_surfaces_error_without_dropping_edits() {
        let h = harness(true).await;
        h.store.reject_writes(Some("offline"));

        h.saver.edit(DetailField::ContactName, "Dana");
        tokio::time::sleep(Duration::from_millis(1500)).await;
        let status = h.saver.status();
        assert_eq!(status.last_error.as_deref(), Some("Failed to save"));
        assert!(!status.saving);
        assert!(h.saver.draft().is_dirty());
        assert_eq!(h.saver.draft().details.contact_name, "Dana");

        let err = h.saver.save_now().await.unwrap_err();
        assert!(matches!(err, SyncError::WriteRejected(_)));
        assert_eq!(h.notifier.messages(), vec!["Failed to save details"]);

        h.store.reject_writes(None);
        h.saver.save_now().await.unwrap();
        assert_eq!(h.saver.status().last_error, None);
        assert_eq!(h.notifier.messages().last().unwrap(), "Job details saved");
        h.saver.shutdown().await;
        h.sessions.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_cancels_pending_autosave() {
        let h = harness(true).await;
        let writes_before = h.store.write_count();
        h.saver.edit(DetailField::Notes, "never written");
        h.saver.shutdown().await;
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(h.store.write_count(), writes_before);
        h.sessions.shutdown().await;
    }
}
