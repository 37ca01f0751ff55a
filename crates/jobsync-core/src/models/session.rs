use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use super::fields;
use super::location::GeoPoint;
use super::photo::{JobPhoto, PhotoKind};
use crate::validation::timestamp::timestamp_value;

/// Session lifecycle. Only `InProgress -> Completed` is ever written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    InProgress,
    Completed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::InProgress => "in_progress",
            SessionStatus::Completed => "completed",
        }
    }
}

impl FromStr for SessionStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_progress" => Ok(SessionStatus::InProgress),
            "completed" => Ok(SessionStatus::Completed),
            _ => Err(anyhow::anyhow!("Invalid session status: {}", s)),
        }
    }
}

impl Display for SessionStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}

/// Editable job metadata fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DetailField {
    SiteName,
    Address,
    ContactName,
    ContactPhone,
    Notes,
}

impl DetailField {
    pub const ALL: [DetailField; 5] = [
        DetailField::SiteName,
        DetailField::Address,
        DetailField::ContactName,
        DetailField::ContactPhone,
        DetailField::Notes,
    ];

    pub fn document_key(&self) -> &'static str {
        match self {
            DetailField::SiteName => fields::SITE_NAME,
            DetailField::Address => fields::ADDRESS,
            DetailField::ContactName => fields::CONTACT_NAME,
            DetailField::ContactPhone => fields::CONTACT_PHONE,
            DetailField::Notes => fields::NOTES,
        }
    }
}

/// Free-form metadata, writable only while the session is in progress.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDetails {
    pub site_name: String,
    pub address: String,
    pub contact_name: String,
    pub contact_phone: String,
    pub notes: String,
}

impl JobDetails {
    pub fn get(&self, field: DetailField) -> &str {
        match field {
            DetailField::SiteName => &self.site_name,
            DetailField::Address => &self.address,
            DetailField::ContactName => &self.contact_name,
            DetailField::ContactPhone => &self.contact_phone,
            DetailField::Notes => &self.notes,
        }
    }

    pub fn set(&mut self, field: DetailField, value: impl Into<String>) {
        let value = value.into();
        match field {
            DetailField::SiteName => self.site_name = value,
            DetailField::Address => self.address = value,
            DetailField::ContactName => self.contact_name = value,
            DetailField::ContactPhone => self.contact_phone = value,
            DetailField::Notes => self.notes = value,
        }
    }

    pub fn is_empty(&self) -> bool {
        DetailField::ALL.iter().all(|f| self.get(*f).is_empty())
    }

    /// `(document key, value)` pairs for a full overwrite of the metadata.
    pub fn document_entries(&self) -> Vec<(&'static str, JsonValue)> {
        DetailField::ALL
            .iter()
            .map(|f| (f.document_key(), JsonValue::String(self.get(*f).to_string())))
            .collect()
    }
}

/// A decoded `job_logs` document.
#[derive(Debug, Clone, PartialEq)]
pub struct JobSession {
    pub id: String,
    pub user_id: String,
    pub status: SessionStatus,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub job_type: String,
    pub details: JobDetails,
    pub start_location: Option<GeoPoint>,
    pub end_location: Option<GeoPoint>,
    pub photos: Vec<JobPhoto>,
    /// Token echoed from the clock-in that created the document, if any.
    pub client_token: Option<String>,
}

impl JobSession {
    pub fn is_open(&self) -> bool {
        self.status == SessionStatus::InProgress
    }

    /// `end - start`, clamped at zero. `None` unless both timestamps are known.
    pub fn duration(&self) -> Option<Duration> {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => Some((end - start).max(Duration::zero())),
            _ => None,
        }
    }

    pub fn photos_of(&self, kind: PhotoKind) -> impl Iterator<Item = &JobPhoto> {
        self.photos.iter().filter(move |p| p.kind == kind)
    }
}

/// Payload of a clock-in: becomes a new `in_progress` document.
#[derive(Debug, Clone, PartialEq)]
pub struct NewJobSession {
    pub user_id: String,
    pub job_type: String,
    pub details: JobDetails,
    pub start_time: DateTime<Utc>,
    pub start_location: Option<GeoPoint>,
    pub client_token: String,
}

impl NewJobSession {
    pub fn to_document(&self) -> JsonValue {
        let mut map = Map::new();
        map.insert(fields::USER_ID.into(), JsonValue::String(self.user_id.clone()));
        map.insert(fields::START_TIME.into(), timestamp_value(self.start_time));
        map.insert(
            fields::STATUS.into(),
            JsonValue::String(SessionStatus::InProgress.as_str().to_string()),
        );
        map.insert(fields::JOB_TYPE.into(), JsonValue::String(self.job_type.clone()));
        for (key, value) in self.details.document_entries() {
            map.insert(key.into(), value);
        }
        map.insert(
            fields::START_LOCATION.into(),
            self.start_location
                .as_ref()
                .map(GeoPoint::to_document_value)
                .unwrap_or(JsonValue::Null),
        );
        map.insert(fields::PHOTOS.into(), JsonValue::Array(Vec::new()));
        map.insert(
            fields::CLIENT_TOKEN.into(),
            JsonValue::String(self.client_token.clone()),
        );
        JsonValue::Object(map)
    }
}
