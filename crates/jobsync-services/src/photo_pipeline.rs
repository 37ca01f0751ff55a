//! Photo selection and sequential upload.
//!
//! Uploaded photos reach the UI only through the session subscription; this
//! pipeline never inserts them locally.

use jobsync_core::models::{fields, JobPhoto, UploadKind};
use jobsync_core::validation::{PhotoFileInfo, PhotoValidationError, PhotoValidator};
use jobsync_core::{SyncError, SyncResult};
use jobsync_db::DocumentPatch;
use jobsync_storage::{photo_object_path, UploadProgress};
use std::sync::{Mutex, PoisonError};
use tokio::sync::watch;
use uuid::Uuid;

use crate::context::SyncContext;
use crate::notify::{report_error, Notification};
use crate::scope::{PendingView, PhotoFile, SessionScope};
use crate::session_store::SessionSnapshot;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectionReport {
    pub accepted: Vec<PendingView>,
    pub rejected: Vec<PhotoValidationError>,
}

/// Aggregate progress of the running batch; default when idle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchProgress {
    pub kind: Option<UploadKind>,
    pub total: usize,
    pub processed: usize,
    /// `(processed + current file fraction) / total`, in `[0, 1]`.
    pub fraction: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UploadSummary {
    pub uploaded: Vec<JobPhoto>,
    /// Names of files that were skipped after a failure.
    pub failed: Vec<String>,
    /// Files not attempted because the active session changed mid-batch.
    pub cancelled: usize,
}

pub struct PhotoUploadPipeline {
    ctx: SyncContext,
    scope: SessionScope,
    sessions: watch::Receiver<SessionSnapshot>,
    validator: PhotoValidator,
    in_flight: tokio::sync::Mutex<()>,
    last_stamp: Mutex<i64>,
    progress: watch::Sender<BatchProgress>,
}

impl PhotoUploadPipeline {
    pub fn new(
        ctx: SyncContext,
        scope: SessionScope,
        sessions: watch::Receiver<SessionSnapshot>,
    ) -> Self {
        let validator = PhotoValidator::new(ctx.config.max_photo_size_bytes);
        let (progress, _) = watch::channel(BatchProgress::default());
        Self {
            ctx,
            scope,
            sessions,
            validator,
            in_flight: tokio::sync::Mutex::new(()),
            last_stamp: Mutex::new(0),
            progress,
        }
    }

    fn active_id(&self) -> Option<String> {
        self.sessions.borrow().active_id().map(str::to_string)
    }

    /// Validate and queue files. Each rejected file raises its own
    /// notification; the others are still queued.
    pub fn select(&self, files: Vec<PhotoFile>, kind: UploadKind) -> SyncResult<SelectionReport> {
        if self.active_id().is_none() {
            tracing::debug!(kind = %kind, "Ignoring photo selection without an active session");
            return Err(SyncError::NoActiveSession);
        }

        let mut report = SelectionReport::default();
        for file in files {
            let info = PhotoFileInfo {
                name: &file.name,
                content_type: &file.content_type,
                size: file.size(),
            };
            match self.validator.validate(info) {
                Ok(()) => report.accepted.push(self.scope.enqueue(file, kind)),
                Err(e) => {
                    report_error(self.ctx.notifier.as_ref(), &SyncError::from(e.clone()));
                    report.rejected.push(e);
                }
            }
        }
        Ok(report)
    }

    pub fn pending(&self, kind: UploadKind) -> Vec<PendingView> {
        self.scope.pending(kind)
    }

    pub fn remove(&self, kind: UploadKind, index: usize) -> bool {
        self.scope.remove_at(kind, index)
    }

    pub fn clear(&self, kind: UploadKind) {
        self.scope.clear(kind);
    }

    pub fn progress(&self) -> BatchProgress {
        self.progress.borrow().clone()
    }

    pub fn watch_progress(&self) -> watch::Receiver<BatchProgress> {
        self.progress.subscribe()
    }

    /// Strictly increasing millisecond stamp for object paths.
    fn next_stamp(&self) -> i64 {
        let now = self.ctx.clock.now().timestamp_millis();
        let mut last = self.last_stamp.lock().unwrap_or_else(PoisonError::into_inner);
        let stamp = now.max(*last + 1);
        *last = stamp;
        stamp
    }

    /// Upload everything queued for `kind`, one file at a time.
    ///
    /// A failed file is skipped and reported. The batch stops early if the
    /// active session changes. Every item of the batch leaves the queue.
    #[tracing::instrument(skip(self), fields(user_id = %self.ctx.user_id))]
    pub async fn upload(&self, kind: UploadKind) -> SyncResult<UploadSummary> {
        let _guard = self
            .in_flight
            .try_lock()
            .map_err(|_| SyncError::UploadInFlight)?;
        let session_id = self.active_id().ok_or(SyncError::NoActiveSession)?;

        let batch = self.scope.batch(kind);
        let mut summary = UploadSummary::default();
        if batch.is_empty() {
            return Ok(summary);
        }

        let total = batch.len();
        self.progress.send_replace(BatchProgress {
            kind: Some(kind),
            total,
            processed: 0,
            fraction: 0.0,
        });

        for (index, (_, file)) in batch.iter().enumerate() {
            if self.ctx.shutdown.is_cancelled()
                || self.active_id().as_deref() != Some(session_id.as_str())
            {
                summary.cancelled = total - index;
                tracing::warn!(
                    session_id = %session_id,
                    remaining = summary.cancelled,
                    "Active session changed, abandoning upload batch"
                );
                break;
            }

            match self.upload_one(&session_id, kind, file, index, total).await {
                Ok(photo) => summary.uploaded.push(photo),
                Err(e) => {
                    tracing::debug!(file = %file.name, error = %e, "Skipping photo after failure");
                    summary.failed.push(file.name.clone());
                }
            }

            self.progress.send_modify(|p| {
                p.processed = index + 1;
                p.fraction = (index + 1) as f64 / total as f64;
            });
        }

        let ids: Vec<Uuid> = batch.iter().map(|(id, _)| *id).collect();
        self.scope.remove_ids(kind, &ids);
        self.progress.send_replace(BatchProgress::default());

        match summary.uploaded.len() {
            0 => {}
            1 => self.ctx.notifier.notify(Notification::success("Photo uploaded!")),
            n => self
                .ctx
                .notifier
                .notify(Notification::success(format!("Uploaded {} photos!", n))),
        }
        tracing::info!(
            session_id = %session_id,
            kind = %kind,
            uploaded = summary.uploaded.len(),
            failed = summary.failed.len(),
            cancelled = summary.cancelled,
            "Photo batch finished"
        );
        Ok(summary)
    }

    /// Upload one file and record it on the session. Every failure raises
    /// its own toast before it is returned.
    async fn upload_one(
        &self,
        session_id: &str,
        kind: UploadKind,
        file: &PhotoFile,
        index: usize,
        total: usize,
    ) -> SyncResult<JobPhoto> {
        let result = self.store_and_record(session_id, kind, file, index, total).await;
        if let Err(e) = &result {
            report_error(self.ctx.notifier.as_ref(), e);
        }
        result
    }

    async fn store_and_record(
        &self,
        session_id: &str,
        kind: UploadKind,
        file: &PhotoFile,
        index: usize,
        total: usize,
    ) -> SyncResult<JobPhoto> {
        let not_uploaded = |reason: String| SyncError::PhotoNotUploaded {
            name: file.name.clone(),
            reason,
        };
        let key = photo_object_path(
            &self.ctx.config.photo_prefix,
            session_id,
            kind,
            self.next_stamp(),
            &file.name,
        )
        .map_err(|e| not_uploaded(e.to_string()))?;

        let report = |p: UploadProgress| {
            let overall = (index as f64 + p.fraction()) / total as f64;
            self.progress.send_modify(|s| s.fraction = s.fraction.max(overall));
        };

        let url = self
            .ctx
            .blobs
            .upload(&key, &file.content_type, file.data.clone(), &report)
            .await
            .map_err(|e| not_uploaded(e.to_string()))?;

        let not_recorded = |reason: String| SyncError::PhotoNotRecorded {
            name: file.name.clone(),
            reason,
        };
        if self.active_id().as_deref() != Some(session_id) {
            return Err(not_recorded(format!("session {} is no longer active", session_id)));
        }

        let photo = JobPhoto::new(url, kind.into(), self.ctx.clock.now());
        let patch = DocumentPatch::new().array_union(fields::PHOTOS, vec![photo.to_document_value()]);
        self.ctx
            .store
            .update(session_id, patch)
            .await
            .map_err(|e| not_recorded(e.to_string()))?;

        tracing::debug!(session_id = %session_id, key = %key, "Photo recorded");
        Ok(photo)
    }
}
