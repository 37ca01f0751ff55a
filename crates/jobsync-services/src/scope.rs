//! Session-scoped local state: the editable details draft and the pending
//! photo queues.
//!
//! Nothing here is persisted. The session store resets it whenever the
//! observed active session goes away or changes.

use bytes::Bytes;
use jobsync_core::models::{DetailField, JobDetails, UploadKind};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

use crate::preview::{PreviewHandle, PreviewRegistry};

/// A file picked by the technician.
#[derive(Debug, Clone)]
pub struct PhotoFile {
    pub name: String,
    pub content_type: String,
    pub data: Bytes,
}

impl PhotoFile {
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, data: Bytes) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            data,
        }
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

#[derive(Debug)]
pub struct PendingUpload {
    pub id: Uuid,
    pub file: PhotoFile,
    pub preview: PreviewHandle,
    pub kind: UploadKind,
}

/// Read-only view of a pending upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingView {
    pub id: Uuid,
    pub name: String,
    pub size: u64,
    pub preview_uri: String,
}

/// Local edits of the active session's details.
///
/// `revision` counts edits; `saved_revision` is the newest revision known to
/// be persisted. The draft is dirty while they differ.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetailsDraft {
    pub session_id: Option<String>,
    pub details: JobDetails,
    pub revision: u64,
    pub saved_revision: u64,
}

impl DetailsDraft {
    pub fn is_dirty(&self) -> bool {
        self.revision != self.saved_revision
    }
}

#[derive(Default)]
struct ScopeState {
    draft: DetailsDraft,
    before: Vec<PendingUpload>,
    after: Vec<PendingUpload>,
}

impl ScopeState {
    fn queue_mut(&mut self, kind: UploadKind) -> &mut Vec<PendingUpload> {
        match kind {
            UploadKind::Before => &mut self.before,
            UploadKind::After => &mut self.after,
        }
    }

    fn queue(&self, kind: UploadKind) -> &[PendingUpload] {
        match kind {
            UploadKind::Before => &self.before,
            UploadKind::After => &self.after,
        }
    }
}

#[derive(Clone)]
pub struct SessionScope {
    state: Arc<Mutex<ScopeState>>,
    previews: PreviewRegistry,
}

impl SessionScope {
    pub fn new(previews: PreviewRegistry) -> Self {
        Self {
            state: Arc::new(Mutex::new(ScopeState::default())),
            previews,
        }
    }

    fn lock(&self) -> MutexGuard<'_, ScopeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn previews(&self) -> &PreviewRegistry {
        &self.previews
    }

    pub fn draft(&self) -> DetailsDraft {
        self.lock().draft.clone()
    }

    /// Apply a local edit and return the new revision.
    pub fn edit(&self, field: DetailField, value: impl Into<String>) -> u64 {
        let mut state = self.lock();
        state.draft.details.set(field, value);
        state.draft.revision += 1;
        state.draft.revision
    }

    pub fn replace_details(&self, details: JobDetails) -> u64 {
        let mut state = self.lock();
        state.draft.details = details;
        state.draft.revision += 1;
        state.draft.revision
    }

    /// Record that `revision` of `session_id`'s draft reached the store.
    pub fn mark_saved(&self, session_id: &str, revision: u64) {
        let mut state = self.lock();
        if state.draft.session_id.as_deref() == Some(session_id) {
            state.draft.saved_revision = state.draft.saved_revision.max(revision);
        }
    }

    /// Reconcile the draft with details observed on the active session.
    ///
    /// A different session replaces the draft outright, carrying no edit
    /// state over. The same session only overwrites a clean draft.
    pub fn observe_session(&self, session_id: &str, details: &JobDetails) {
        let mut state = self.lock();
        if state.draft.session_id.as_deref() != Some(session_id) {
            state.draft = DetailsDraft {
                session_id: Some(session_id.to_string()),
                details: details.clone(),
                revision: 0,
                saved_revision: 0,
            };
        } else if !state.draft.is_dirty() {
            state.draft.details = details.clone();
        }
    }

    /// Drop the draft and both queues, releasing every preview.
    pub fn reset(&self) {
        let dropped = {
            let mut state = self.lock();
            state.draft = DetailsDraft::default();
            let mut dropped = std::mem::take(&mut state.before);
            dropped.append(&mut state.after);
            dropped
        };
        if !dropped.is_empty() {
            tracing::debug!(count = dropped.len(), "Discarding pending uploads");
        }
    }

    /// Drop both queues but keep the draft.
    pub fn clear_queues(&self) {
        let mut state = self.lock();
        state.before.clear();
        state.after.clear();
    }

    pub fn enqueue(&self, file: PhotoFile, kind: UploadKind) -> PendingView {
        let preview = self.previews.create(file.data.clone());
        let item = PendingUpload {
            id: Uuid::new_v4(),
            file,
            preview,
            kind,
        };
        let view = view_of(&item);
        self.lock().queue_mut(kind).push(item);
        view
    }

    pub fn pending(&self, kind: UploadKind) -> Vec<PendingView> {
        self.lock().queue(kind).iter().map(view_of).collect()
    }

    /// Ids and files of everything queued for `kind`, in queue order.
    pub fn batch(&self, kind: UploadKind) -> Vec<(Uuid, PhotoFile)> {
        self.lock()
            .queue(kind)
            .iter()
            .map(|p| (p.id, p.file.clone()))
            .collect()
    }

    /// Remove the item at `index`. Returns `false` when out of range.
    pub fn remove_at(&self, kind: UploadKind, index: usize) -> bool {
        let mut state = self.lock();
        let queue = state.queue_mut(kind);
        if index >= queue.len() {
            return false;
        }
        queue.remove(index);
        true
    }

    pub fn remove_ids(&self, kind: UploadKind, ids: &[Uuid]) {
        self.lock()
            .queue_mut(kind)
            .retain(|p| !ids.contains(&p.id));
    }

    pub fn clear(&self, kind: UploadKind) {
        self.lock().queue_mut(kind).clear();
    }
}

fn view_of(item: &PendingUpload) -> PendingView {
    PendingView {
        id: item.id,
        name: item.file.name.clone(),
        size: item.file.size(),
        preview_uri: item.preview.uri(),
    }
}
