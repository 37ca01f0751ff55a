use jobsync_core::models::UploadKind;
use jobsync_core::SyncResult;

use crate::autosave::DetailsAutosaver;
use crate::clock_action::{ClockActionCoordinator, ClockReceipt};
use crate::context::SyncContext;
use crate::photo_pipeline::{PhotoUploadPipeline, SelectionReport, UploadSummary};
use crate::recent_activity::{RecentActivityFeed, RecentEntry};
use crate::scope::{PhotoFile, SessionScope};
use crate::session_store::{ActiveSession, SessionStore};

/// All components of one signed-in user's session screen, wired to a shared
/// context.
pub struct SyncEngine {
    ctx: SyncContext,
    sessions: SessionStore,
    clock: ClockActionCoordinator,
    autosaver: DetailsAutosaver,
    photos: PhotoUploadPipeline,
    recent: RecentActivityFeed,
}

impl SyncEngine {
    #[tracing::instrument(skip_all, fields(user_id = %ctx.user_id))]
    pub async fn start(ctx: SyncContext) -> Self {
        let scope = SessionScope::new(ctx.previews.clone());
        let sessions = SessionStore::start(&ctx, scope.clone()).await;
        let clock = ClockActionCoordinator::new(ctx.clone(), sessions.watch());
        let autosaver = DetailsAutosaver::new(ctx.clone(), scope.clone(), sessions.watch());
        let photos = PhotoUploadPipeline::new(ctx.clone(), scope, sessions.watch());
        let recent = RecentActivityFeed::start(&ctx);

        tracing::info!(
            collection = %ctx.config.collection,
            blob_backend = %ctx.blobs.backend_type(),
            "Sync engine started"
        );

        Self {
            ctx,
            sessions,
            clock,
            autosaver,
            photos,
            recent,
        }
    }

    pub fn context(&self) -> &SyncContext {
        &self.ctx
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn clock(&self) -> &ClockActionCoordinator {
        &self.clock
    }

    pub fn autosaver(&self) -> &DetailsAutosaver {
        &self.autosaver
    }

    pub fn photos(&self) -> &PhotoUploadPipeline {
        &self.photos
    }

    pub fn recent(&self) -> &RecentActivityFeed {
        &self.recent
    }

    pub fn active_session(&self) -> Option<ActiveSession> {
        self.sessions.current().active
    }

    pub fn elapsed_display(&self) -> String {
        self.sessions.elapsed_display()
    }

    /// Clock in with the details currently in the draft.
    pub async fn clock_in(&self, job_type: &str) -> SyncResult<ClockReceipt> {
        let details = self.autosaver.draft().details;
        self.clock.clock_in(job_type, details).await
    }

    pub async fn clock_out(&self) -> SyncResult<ClockReceipt> {
        self.clock.clock_out().await
    }

    pub fn select_photos(&self, files: Vec<PhotoFile>, kind: UploadKind) -> SyncResult<SelectionReport> {
        self.photos.select(files, kind)
    }

    pub async fn upload_photos(&self, kind: UploadKind) -> SyncResult<UploadSummary> {
        self.photos.upload(kind).await
    }

    pub fn recent_entries(&self) -> Vec<RecentEntry> {
        self.recent.entries()
    }

    /// Unsubscribe everything, cancel every timer and release all previews.
    pub async fn shutdown(self) {
        self.ctx.shutdown.cancel();
        self.clock.shutdown();
        self.autosaver.shutdown().await;
        self.sessions.shutdown().await;
        self.recent.shutdown().await;
        self.sessions.scope().reset();
        tracing::info!(
            live_previews = self.ctx.previews.live_count(),
            "Sync engine stopped"
        );
    }
}

impl Drop for SyncEngine {
    fn drop(&mut self) {
        self.ctx.shutdown.cancel();
        self.clock.shutdown();
    }
}
