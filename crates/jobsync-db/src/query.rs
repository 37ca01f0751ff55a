//! Query shapes against the `job_logs` collection.

use jobsync_core::models::{fields, Document, SessionStatus};
use jobsync_core::validation::parse_timestamp;
use serde_json::Value as JsonValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderField {
    StartTime,
    EndTime,
}

impl OrderField {
    pub fn document_key(&self) -> &'static str {
        match self {
            OrderField::StartTime => fields::START_TIME,
            OrderField::EndTime => fields::END_TIME,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderBy {
    pub field: OrderField,
    pub direction: Direction,
}

/// Equality filters on owner and status, an optional ordering and an optional limit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobQuery {
    pub user_id: Option<String>,
    pub status: Option<SessionStatus>,
    pub order_by: Option<OrderBy>,
    pub limit: Option<usize>,
}

impl JobQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_status(mut self, status: SessionStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn order_by(mut self, field: OrderField, direction: Direction) -> Self {
        self.order_by = Some(OrderBy { field, direction });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// `(userId=?, status='in_progress') order by startTime desc limit 1`
    pub fn active_session(user_id: impl Into<String>) -> Self {
        Self::new()
            .for_user(user_id)
            .with_status(SessionStatus::InProgress)
            .order_by(OrderField::StartTime, Direction::Desc)
            .limit(1)
    }

    /// `(userId=?, status='completed') order by endTime desc limit N`
    pub fn recent_completed(user_id: impl Into<String>, limit: usize) -> Self {
        Self::new()
            .for_user(user_id)
            .with_status(SessionStatus::Completed)
            .order_by(OrderField::EndTime, Direction::Desc)
            .limit(limit)
    }

    /// `(userId=?, status='completed') limit N`, no server-side ordering.
    pub fn completed_unordered(user_id: impl Into<String>, limit: usize) -> Self {
        Self::new()
            .for_user(user_id)
            .with_status(SessionStatus::Completed)
            .limit(limit)
    }

    /// Equality filters combined with an ordering on another field need a
    /// composite index on the backing store.
    pub fn requires_composite_index(&self) -> bool {
        self.order_by.is_some() && (self.user_id.is_some() || self.status.is_some())
    }

    pub fn matches(&self, data: &JsonValue) -> bool {
        let Some(map) = data.as_object() else {
            return false;
        };
        if let Some(user_id) = &self.user_id {
            if map.get(fields::USER_ID).and_then(JsonValue::as_str) != Some(user_id.as_str()) {
                return false;
            }
        }
        if let Some(status) = self.status {
            if map.get(fields::STATUS).and_then(JsonValue::as_str) != Some(status.as_str()) {
                return false;
            }
        }
        true
    }

    /// Evaluate the query over `docs`, which must be in id order.
    ///
    /// Ordered queries exclude documents whose order field is missing or
    /// unreadable, ties are broken by id in the same direction, and the limit is
    /// applied last.
    pub fn evaluate(&self, docs: impl IntoIterator<Item = Document>) -> Vec<Document> {
        let mut matched: Vec<Document> = docs.into_iter().filter(|d| self.matches(&d.data)).collect();

        if let Some(order) = self.order_by {
            let key = order.field.document_key();
            let mut keyed: Vec<_> = matched
                .into_iter()
                .filter_map(|d| {
                    let ts = d.field(key).and_then(parse_timestamp)?;
                    Some((ts, d))
                })
                .collect();
            keyed.sort_by(|(a_ts, a), (b_ts, b)| {
                let ord = a_ts.cmp(b_ts).then_with(|| a.id.cmp(&b.id));
                match order.direction {
                    Direction::Asc => ord,
                    Direction::Desc => ord.reverse(),
                }
            });
            matched = keyed.into_iter().map(|(_, d)| d).collect();
        } else {
            matched.sort_by(|a, b| a.id.cmp(&b.id));
        }

        if let Some(limit) = self.limit {
            matched.truncate(limit);
        }
        matched
    }
}
