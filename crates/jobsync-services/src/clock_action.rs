//! Clock-in / clock-out state machine.
//!
//! A dispatched action stays `Pending` until the session subscription shows
//! its post-condition, the confirmation deadline passes, or the write fails.
//! A second, longer safety deadline clears `Pending` regardless of cause.

use chrono::{DateTime, Utc};
use jobsync_core::constants::DEFAULT_JOB_TYPE;
use jobsync_core::models::{fields, GeoPoint, JobDetails, NewJobSession, SessionStatus};
use jobsync_core::validation::timestamp_value;
use jobsync_core::{SyncError, SyncResult};
use jobsync_db::DocumentPatch;
use serde_json::Value as JsonValue;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use uuid::Uuid;

use crate::context::SyncContext;
use crate::geo::locate_best_effort;
use crate::notify::{report_error, Notification};
use crate::session_store::SessionSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockDirection {
    In,
    Out,
}

impl ClockDirection {
    fn label(&self) -> &'static str {
        match self {
            ClockDirection::In => "in",
            ClockDirection::Out => "out",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClockOutcome {
    /// The subscription showed the expected session state.
    Confirmed,
    /// The confirmation deadline passed first.
    TimedOut,
    /// The safety deadline cleared a still-pending action. A backstop: only
    /// reached when the confirmation wait has not ended by then.
    SafetyCleared,
    WriteFailed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ClockActionState {
    #[default]
    Idle,
    Pending {
        action_id: u64,
        direction: ClockDirection,
        deadline: Instant,
    },
    Resolved {
        action_id: u64,
        direction: ClockDirection,
        outcome: ClockOutcome,
    },
}

impl ClockActionState {
    pub fn is_pending(&self) -> bool {
        matches!(self, ClockActionState::Pending { .. })
    }

    /// Whether the clock button accepts input.
    pub fn control_enabled(&self) -> bool {
        !self.is_pending()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClockReceipt {
    pub action_id: u64,
    pub direction: ClockDirection,
    pub session_id: String,
}

/// Post-condition a pending action waits for.
#[derive(Debug, Clone)]
enum Expectation {
    /// An open session carrying this write token.
    OpenedWithToken(String),
    /// This session is no longer the open one.
    Closed(String),
}

impl Expectation {
    fn is_met(&self, snapshot: &SessionSnapshot) -> bool {
        match self {
            Expectation::OpenedWithToken(token) => snapshot
                .active
                .as_ref()
                .is_some_and(|a| a.session.client_token.as_deref() == Some(token.as_str())),
            Expectation::Closed(id) => snapshot.active_id() != Some(id.as_str()),
        }
    }
}

#[derive(Default)]
struct Timers {
    next_action_id: u64,
    handles: Vec<JoinHandle<()>>,
}

struct Inner {
    ctx: SyncContext,
    sessions: watch::Receiver<SessionSnapshot>,
    state: watch::Sender<ClockActionState>,
    timers: Mutex<Timers>,
}

#[derive(Clone)]
pub struct ClockActionCoordinator {
    inner: Arc<Inner>,
}

impl ClockActionCoordinator {
    pub fn new(ctx: SyncContext, sessions: watch::Receiver<SessionSnapshot>) -> Self {
        let (state, _) = watch::channel(ClockActionState::Idle);
        Self {
            inner: Arc::new(Inner {
                ctx,
                sessions,
                state,
                timers: Mutex::new(Timers::default()),
            }),
        }
    }

    pub fn state(&self) -> ClockActionState {
        self.inner.state.borrow().clone()
    }

    pub fn watch_state(&self) -> watch::Receiver<ClockActionState> {
        self.inner.state.subscribe()
    }

    /// Wait until no action is pending and return the settled state.
    pub async fn settled(&self) -> ClockActionState {
        let mut rx = self.inner.state.subscribe();
        let settled = match rx.wait_for(|s| !s.is_pending()).await {
            Ok(state) => state.clone(),
            Err(_) => self.state(),
        };
        settled
    }

    /// Open a new session. Refused while a session is observed open or
    /// another action is pending.
    #[tracing::instrument(skip(self, details), fields(user_id = %self.inner.ctx.user_id))]
    pub async fn clock_in(&self, job_type: &str, details: JobDetails) -> SyncResult<ClockReceipt> {
        let client_token = Uuid::new_v4().to_string();
        let expected = Expectation::OpenedWithToken(client_token.clone());
        let (action_id, ()) = self.inner.begin(ClockDirection::In, |snapshot| {
            match snapshot.active_id() {
                Some(id) => Err(SyncError::SessionAlreadyOpen(id.to_string())),
                None => Ok((expected, ())),
            }
        })?;

        let ctx = &self.inner.ctx;
        let location = self.locate().await;
        self.inner.ensure_live(action_id, ClockDirection::In)?;

        let job_type = match job_type.trim() {
            "" => DEFAULT_JOB_TYPE.to_string(),
            other => other.to_string(),
        };
        let new_session = NewJobSession {
            user_id: ctx.user_id.clone(),
            job_type,
            details,
            start_time: ctx.clock.now(),
            start_location: location,
            client_token,
        };

        match ctx.store.create(new_session.to_document()).await {
            Ok(session_id) => {
                tracing::info!(
                    session_id = %session_id,
                    action_id,
                    job_type = %new_session.job_type,
                    "Clock-in written, awaiting confirmation"
                );
                Ok(ClockReceipt {
                    action_id,
                    direction: ClockDirection::In,
                    session_id,
                })
            }
            Err(e) => {
                tracing::error!(error = %e, action_id, "Clock-in write failed");
                self.inner
                    .resolve(action_id, ClockOutcome::WriteFailed(e.to_string()));
                Err(e.into())
            }
        }
    }

    /// Complete the observed open session.
    #[tracing::instrument(skip(self), fields(user_id = %self.inner.ctx.user_id))]
    pub async fn clock_out(&self) -> SyncResult<ClockReceipt> {
        let (action_id, (session_id, start_time)) =
            self.inner.begin(ClockDirection::Out, |snapshot| {
                let active = snapshot.active.as_ref().ok_or(SyncError::NoActiveSession)?;
                let id = active.id().to_string();
                Ok((
                    Expectation::Closed(id.clone()),
                    (id, active.session.start_time),
                ))
            })?;

        let ctx = &self.inner.ctx;
        let location = self.locate().await;
        self.inner.ensure_live(action_id, ClockDirection::Out)?;

        let end_time = clamp_end_time(ctx.clock.now(), start_time);
        let patch = DocumentPatch::new()
            .set(fields::END_TIME, timestamp_value(end_time))
            .set(
                fields::STATUS,
                JsonValue::String(SessionStatus::Completed.as_str().to_string()),
            )
            .set(
                fields::END_LOCATION,
                location
                    .as_ref()
                    .map(GeoPoint::to_document_value)
                    .unwrap_or(JsonValue::Null),
            );

        match ctx.store.update(&session_id, patch).await {
            Ok(()) => {
                tracing::info!(session_id = %session_id, action_id, "Clock-out written, awaiting confirmation");
                Ok(ClockReceipt {
                    action_id,
                    direction: ClockDirection::Out,
                    session_id,
                })
            }
            Err(e) => {
                tracing::error!(error = %e, session_id = %session_id, action_id, "Clock-out write failed");
                self.inner
                    .resolve(action_id, ClockOutcome::WriteFailed(e.to_string()));
                Err(e.into())
            }
        }
    }

    async fn locate(&self) -> Option<GeoPoint> {
        let ctx = &self.inner.ctx;
        locate_best_effort(ctx.geolocator.as_ref(), ctx.config.geolocation_timeout).await
    }

    /// Cancel both deadlines and return to idle.
    pub fn shutdown(&self) {
        let mut timers = self.inner.lock_timers();
        for handle in timers.handles.drain(..) {
            handle.abort();
        }
        self.inner.state.send_replace(ClockActionState::Idle);
    }
}

/// `endTime` is never earlier than `startTime`.
fn clamp_end_time(now: DateTime<Utc>, start: Option<DateTime<Utc>>) -> DateTime<Utc> {
    match start {
        Some(start) if start > now => start,
        _ => now,
    }
}

impl Inner {
    fn lock_timers(&self) -> MutexGuard<'_, Timers> {
        self.timers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Move to `Pending` and arm both deadlines. `check` sees the latest
    /// session snapshot and decides whether the action may start.
    fn begin<T>(
        self: &Arc<Self>,
        direction: ClockDirection,
        check: impl FnOnce(&SessionSnapshot) -> SyncResult<(Expectation, T)>,
    ) -> SyncResult<(u64, T)> {
        let mut timers = self.lock_timers();
        if self.state.borrow().is_pending() {
            return Err(SyncError::ActionInFlight);
        }
        let snapshot = self.sessions.borrow().clone();
        let (expectation, extra) = check(&snapshot)?;

        timers.next_action_id += 1;
        let action_id = timers.next_action_id;
        let dispatched = Instant::now();
        let deadline = dispatched + self.ctx.config.confirm_timeout;
        let safety_deadline = dispatched + self.ctx.config.safety_timeout;

        self.state.send_replace(ClockActionState::Pending {
            action_id,
            direction,
            deadline,
        });
        for stale in timers.handles.drain(..) {
            stale.abort();
        }
        timers.handles.push(tokio::spawn(watch_confirmation(
            self.clone(),
            action_id,
            expectation,
            deadline,
        )));
        timers.handles.push(tokio::spawn(safety_clear(
            self.clone(),
            action_id,
            safety_deadline,
        )));

        tracing::debug!(action_id, direction = direction.label(), "Clock action pending");
        Ok((action_id, extra))
    }

    /// Fail the action if it was torn down or already resolved while waiting
    /// on geolocation, so no write lands against a stale context.
    fn ensure_live(&self, action_id: u64, direction: ClockDirection) -> SyncResult<()> {
        if self.ctx.shutdown.is_cancelled() {
            self.resolve(action_id, ClockOutcome::WriteFailed("shut down".to_string()));
            return Err(SyncError::Internal("sync context shut down".to_string()));
        }
        match &*self.state.borrow() {
            ClockActionState::Pending { action_id: id, .. } if *id == action_id => Ok(()),
            _ => {
                tracing::warn!(action_id, direction = direction.label(), "Clock action expired before its write");
                Err(SyncError::Timeout(self.ctx.config.confirm_timeout))
            }
        }
    }

    /// Resolve `action_id` if it is still the pending action. Returns whether
    /// this call performed the transition.
    fn resolve(&self, action_id: u64, outcome: ClockOutcome) -> bool {
        let direction = {
            let mut timers = self.lock_timers();
            let direction = match &*self.state.borrow() {
                ClockActionState::Pending {
                    action_id: id,
                    direction,
                    ..
                } if *id == action_id => *direction,
                _ => return false,
            };
            self.state.send_replace(ClockActionState::Resolved {
                action_id,
                direction,
                outcome: outcome.clone(),
            });
            for handle in timers.handles.drain(..) {
                handle.abort();
            }
            direction
        };

        let failure = match outcome {
            ClockOutcome::Confirmed => {
                tracing::info!(action_id, direction = direction.label(), "Clock action confirmed");
                let message = match direction {
                    ClockDirection::In => "Successfully Clocked In!",
                    ClockDirection::Out => "Successfully Clocked Out!",
                };
                self.ctx.notifier.notify(Notification::success(message));
                return true;
            }
            ClockOutcome::TimedOut => SyncError::Timeout(self.ctx.config.confirm_timeout),
            ClockOutcome::SafetyCleared => SyncError::Timeout(self.ctx.config.safety_timeout),
            ClockOutcome::WriteFailed(reason) => SyncError::ClockActionFailed {
                direction: direction.label(),
                reason,
            },
        };
        tracing::warn!(action_id, direction = direction.label(), "Clock action not confirmed");
        report_error(self.ctx.notifier.as_ref(), &failure);
        true
    }
}

async fn watch_confirmation(
    inner: Arc<Inner>,
    action_id: u64,
    expectation: Expectation,
    deadline: Instant,
) {
    let mut sessions = inner.sessions.clone();
    let observed = tokio::time::timeout_at(deadline, async move {
        loop {
            let met = expectation.is_met(&sessions.borrow_and_update());
            if met {
                return;
            }
            if sessions.changed().await.is_err() {
                // Session store gone; only the deadline can end this wait.
                std::future::pending::<()>().await;
            }
        }
    })
    .await;

    let outcome = match observed {
        Ok(()) => ClockOutcome::Confirmed,
        Err(_) => ClockOutcome::TimedOut,
    };
    inner.resolve(action_id, outcome);
}

async fn safety_clear(inner: Arc<Inner>, action_id: u64, at: Instant) {
    tokio::time::sleep_until(at).await;
    inner.resolve(action_id, ClockOutcome::SafetyCleared);
}
