//! Recently completed sessions, most recent first.
//!
//! The ordered query needs a composite index. When it is unavailable the feed
//! switches to an unordered query with a larger limit and sorts locally; the
//! switch is logged but never reported to the caller as an error.

use chrono::{DateTime, Utc};
use jobsync_core::constants::UNKNOWN_JOB_TYPE_LABEL;
use jobsync_core::format_hms;
use jobsync_core::models::{Document, JobSession};
use jobsync_core::validation::{decode_job_session, extract_job_session, join_issues};
use jobsync_db::{JobQuery, StoreError, Subscription};
use serde::Serialize;
use std::sync::{Mutex, PoisonError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::context::SyncContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedSource {
    Ordered,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentEntry {
    pub id: String,
    pub job_type: String,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    /// `HH:MM:SS`, or `N/A` when either timestamp is missing.
    pub duration: String,
    pub photo_count: usize,
}

impl RecentEntry {
    pub fn from_session(session: &JobSession) -> Self {
        let job_type = match session.job_type.trim() {
            "" => UNKNOWN_JOB_TYPE_LABEL.to_string(),
            other => other.to_string(),
        };
        Self {
            id: session.id.clone(),
            job_type,
            start_time: session.start_time,
            end_time: session.end_time,
            duration: session
                .duration()
                .map(format_hms)
                .unwrap_or_else(|| "N/A".to_string()),
            photo_count: session.photos.len(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RecentFeed {
    pub entries: Vec<RecentEntry>,
    pub source: Option<FeedSource>,
    pub loaded: bool,
}

/// Sessions with an end time, newest end first, ties broken by descending id
/// to match the ordered query. Truncated to `shown`.
pub fn rank_recent(mut sessions: Vec<JobSession>, shown: usize) -> Vec<JobSession> {
    sessions.retain(|s| s.end_time.is_some());
    sessions.sort_by(|a, b| {
        b.end_time
            .cmp(&a.end_time)
            .then_with(|| b.id.cmp(&a.id))
    });
    sessions.truncate(shown);
    sessions
}

fn decode_lenient(doc: &Document) -> JobSession {
    decode_job_session(doc).unwrap_or_else(|issues| {
        tracing::debug!(
            session_id = %doc.id,
            issues = %join_issues(&issues),
            "Recent session has an invalid shape, using best-effort fields"
        );
        extract_job_session(doc)
    })
}

enum StreamEnd {
    Cancelled,
    Closed,
    Failed(StoreError),
}

struct Feeder {
    ctx: SyncContext,
    tx: watch::Sender<RecentFeed>,
    token: CancellationToken,
}

impl Feeder {
    fn publish(&self, docs: Vec<Document>, source: FeedSource) {
        let sessions = docs.iter().map(decode_lenient).collect();
        let entries = rank_recent(sessions, self.ctx.config.recent_shown)
            .iter()
            .map(RecentEntry::from_session)
            .collect();
        self.tx.send_replace(RecentFeed {
            entries,
            source: Some(source),
            loaded: true,
        });
    }

    async fn follow(&self, mut subscription: Subscription, source: FeedSource) -> StreamEnd {
        let end = loop {
            tokio::select! {
                _ = self.token.cancelled() => break StreamEnd::Cancelled,
                next = subscription.next() => match next {
                    Some(Ok(docs)) => self.publish(docs, source),
                    Some(Err(e)) => break StreamEnd::Failed(e),
                    None => break StreamEnd::Closed,
                }
            }
        };
        subscription.unsubscribe();
        end
    }

    async fn run(self) {
        let user_id = self.ctx.user_id.clone();
        let primary = JobQuery::recent_completed(user_id.clone(), self.ctx.config.recent_primary_limit);

        let failure = match self.ctx.store.subscribe(primary).await {
            Ok(subscription) => match self.follow(subscription, FeedSource::Ordered).await {
                StreamEnd::Failed(e) => e,
                StreamEnd::Cancelled | StreamEnd::Closed => return,
            },
            Err(e) => e,
        };
        tracing::warn!(
            error = %failure,
            fallback_limit = self.ctx.config.recent_fallback_limit,
            "Ordered recent activity query unavailable, falling back to unordered query"
        );

        let fallback = JobQuery::completed_unordered(user_id, self.ctx.config.recent_fallback_limit);
        match self.ctx.store.subscribe(fallback).await {
            Ok(subscription) => {
                if let StreamEnd::Failed(e) = self.follow(subscription, FeedSource::Fallback).await {
                    tracing::warn!(error = %e, "Fallback recent activity query failed");
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Fallback recent activity query unavailable");
            }
        }
    }
}

pub struct RecentActivityFeed {
    rx: watch::Receiver<RecentFeed>,
    token: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl RecentActivityFeed {
    pub fn start(ctx: &SyncContext) -> Self {
        let (tx, rx) = watch::channel(RecentFeed::default());
        let token = ctx.shutdown.child_token();
        let feeder = Feeder {
            ctx: ctx.clone(),
            tx,
            token: token.clone(),
        };
        let task = tokio::spawn(feeder.run());
        Self {
            rx,
            token,
            task: Mutex::new(Some(task)),
        }
    }

    pub fn current(&self) -> RecentFeed {
        self.rx.borrow().clone()
    }

    pub fn entries(&self) -> Vec<RecentEntry> {
        self.rx.borrow().entries.clone()
    }

    pub fn watch(&self) -> watch::Receiver<RecentFeed> {
        self.rx.clone()
    }

    pub async fn shutdown(&self) {
        self.token.cancel();
        let task = self.task.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Recent activity task ended abnormally");
            }
        }
    }
}
