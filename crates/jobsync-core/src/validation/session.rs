//! Boundary decoding of `job_logs` documents.
//!
//! [`decode_job_session`] is strict: it returns a typed session or the list of
//! issues that made the document unacceptable. [`extract_job_session`] never fails
//! and is the fallback for partially written or legacy-shaped documents. Photo
//! entries are normalised the same way on both paths, so an unreadable `kind`
//! never makes a document invalid.

use serde_json::{Map, Value as JsonValue};
use std::fmt::{Display, Formatter, Result as FmtResult};

use super::timestamp::parse_timestamp;
use crate::models::fields;
use crate::models::{Document, GeoPoint, JobDetails, JobPhoto, JobSession, PhotoKind, SessionStatus};

/// A single human-readable problem found while decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// Dotted path to the offending value; empty for the document root.
    pub path: String,
    pub message: String,
}

impl ValidationIssue {
    fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl Display for ValidationIssue {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let path = if self.path.is_empty() {
            "(root)"
        } else {
            &self.path
        };
        write!(f, "{}: {}", path, self.message)
    }
}

/// `a: x | b: y`, the form used in log lines.
pub fn join_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" | ")
}

pub fn decode_job_session(doc: &Document) -> Result<JobSession, Vec<ValidationIssue>> {
    let issues = collect_issues(&doc.data);
    if issues.is_empty() {
        Ok(extract_job_session(doc))
    } else {
        Err(issues)
    }
}

/// Best-effort extraction: non-string text reads as empty, unreadable timestamps
/// and locations as absent, photos are normalised.
pub fn extract_job_session(doc: &Document) -> JobSession {
    let empty = Map::new();
    let map = doc.data.as_object().unwrap_or(&empty);

    let read_str = |key: &str| -> String {
        map.get(key)
            .and_then(JsonValue::as_str)
            .unwrap_or_default()
            .to_string()
    };

    let start_time = map.get(fields::START_TIME).and_then(parse_timestamp);
    let end_time = map.get(fields::END_TIME).and_then(parse_timestamp);
    let status = map
        .get(fields::STATUS)
        .and_then(JsonValue::as_str)
        .and_then(|s| s.parse::<SessionStatus>().ok())
        .unwrap_or(if end_time.is_some() {
            SessionStatus::Completed
        } else {
            SessionStatus::InProgress
        });

    JobSession {
        id: doc.id.clone(),
        user_id: read_str(fields::USER_ID),
        status,
        start_time,
        end_time,
        job_type: read_str(fields::JOB_TYPE),
        details: JobDetails {
            site_name: read_str(fields::SITE_NAME),
            address: read_str(fields::ADDRESS),
            contact_name: read_str(fields::CONTACT_NAME),
            contact_phone: read_str(fields::CONTACT_PHONE),
            notes: read_str(fields::NOTES),
        },
        start_location: map.get(fields::START_LOCATION).and_then(decode_location),
        end_location: map.get(fields::END_LOCATION).and_then(decode_location),
        photos: decode_photos(map.get(fields::PHOTOS)),
        client_token: map
            .get(fields::CLIENT_TOKEN)
            .and_then(JsonValue::as_str)
            .map(str::to_string),
    }
}

/// Normalise one `photos` entry. Bare strings are legacy URLs; objects keep a
/// known kind or fall back to `unsorted`. Entries without a usable URL yield `None`.
pub fn decode_photo_entry(value: &JsonValue) -> Option<JobPhoto> {
    match value {
        JsonValue::String(url) if !url.is_empty() => Some(JobPhoto {
            url: url.clone(),
            kind: PhotoKind::Unsorted,
            uploaded_at: None,
        }),
        JsonValue::Object(obj) => {
            let url = obj.get("url").and_then(JsonValue::as_str)?;
            if url.is_empty() {
                return None;
            }
            let kind = match obj.get("kind").and_then(JsonValue::as_str) {
                Some("before") => PhotoKind::Before,
                Some("after") => PhotoKind::After,
                _ => PhotoKind::Unsorted,
            };
            Some(JobPhoto {
                url: url.to_string(),
                kind,
                uploaded_at: obj.get("uploadedAt").and_then(parse_timestamp),
            })
        }
        _ => None,
    }
}

pub fn decode_photos(value: Option<&JsonValue>) -> Vec<JobPhoto> {
    let Some(JsonValue::Array(entries)) = value else {
        return Vec::new();
    };
    let photos: Vec<JobPhoto> = entries.iter().filter_map(decode_photo_entry).collect();
    if photos.len() < entries.len() {
        tracing::debug!(
            skipped = entries.len() - photos.len(),
            "Skipped photo entries without a usable url"
        );
    }
    photos
}

fn decode_location(value: &JsonValue) -> Option<GeoPoint> {
    let obj = value.as_object()?;
    let lat = obj.get("lat").and_then(JsonValue::as_f64)?;
    let lng = obj.get("lng").and_then(JsonValue::as_f64)?;
    let accuracy = obj
        .get("accuracyMeters")
        .or_else(|| obj.get("accuracyM"))
        .and_then(JsonValue::as_f64);
    let captured_at = obj.get("capturedAt").and_then(parse_timestamp)?;
    Some(GeoPoint::new(lat, lng, accuracy, captured_at))
}

fn collect_issues(data: &JsonValue) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    let Some(map) = data.as_object() else {
        issues.push(ValidationIssue::new("", "expected an object"));
        return issues;
    };

    match map.get(fields::USER_ID) {
        Some(JsonValue::String(s)) if !s.is_empty() => {}
        Some(JsonValue::String(_)) => {
            issues.push(ValidationIssue::new(fields::USER_ID, "must not be empty"))
        }
        Some(_) => issues.push(ValidationIssue::new(fields::USER_ID, "expected a string")),
        None => issues.push(ValidationIssue::new(fields::USER_ID, "required")),
    }

    if let Some(status) = present(map, fields::STATUS) {
        let known = status
            .as_str()
            .map(|s| s.parse::<SessionStatus>().is_ok())
            .unwrap_or(false);
        if !known {
            issues.push(ValidationIssue::new(
                fields::STATUS,
                "expected 'in_progress' or 'completed'",
            ));
        }
    }

    for key in [fields::START_TIME, fields::END_TIME] {
        if let Some(value) = present(map, key) {
            if parse_timestamp(value).is_none() {
                issues.push(ValidationIssue::new(key, "expected a timestamp"));
            }
        }
    }

    for key in [
        fields::JOB_TYPE,
        fields::SITE_NAME,
        fields::ADDRESS,
        fields::CONTACT_NAME,
        fields::CONTACT_PHONE,
        fields::NOTES,
        fields::CLIENT_TOKEN,
    ] {
        if let Some(value) = present(map, key) {
            if !value.is_string() {
                issues.push(ValidationIssue::new(key, "expected a string"));
            }
        }
    }

    for key in [fields::START_LOCATION, fields::END_LOCATION] {
        if let Some(value) = present(map, key) {
            if decode_location(value).is_none() {
                issues.push(ValidationIssue::new(
                    key,
                    "expected {lat, lng, accuracyMeters, capturedAt}",
                ));
            }
        }
    }

    if let Some(photos) = present(map, fields::PHOTOS) {
        match photos.as_array() {
            Some(entries) => {
                for (i, entry) in entries.iter().enumerate() {
                    if !(entry.is_string() || entry.is_object()) {
                        issues.push(ValidationIssue::new(
                            format!("{}.{}", fields::PHOTOS, i),
                            "expected a url string or a photo object",
                        ));
                    }
                }
            }
            None => issues.push(ValidationIssue::new(fields::PHOTOS, "expected an array")),
        }
    }

    issues
}

/// Null is treated as absent.
fn present<'a>(map: &'a Map<String, JsonValue>, key: &str) -> Option<&'a JsonValue> {
    map.get(key).filter(|v| !v.is_null())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn doc(data: JsonValue) -> Document {
        Document::new("job-1", data)
    }

    #[test]
    fn decodes_a_well_formed_session() {
        let session = decode_job_session(&doc(json!({
            "userId": "tech-1",
            "status": "in_progress",
            "startTime": "2024-04-02T08:30:00.000Z",
            "jobType": "Installation",
            "siteName": "Howard County Library",
            "notes": "",
            "startLocation": {"lat": 39.2, "lng": -76.8, "accuracyMeters": null, "capturedAt": "2024-04-02T08:29:58Z"},
            "photos": [{"url": "https://b/1.jpg", "kind": "before", "uploadedAt": "2024-04-02T09:00:00Z"}],
            "clientToken": "tok-1"
        })))
        .unwrap();

        assert_eq!(session.id, "job-1");
        assert_eq!(session.status, SessionStatus::InProgress);
        assert_eq!(
            session.start_time,
            Some(Utc.with_ymd_and_hms(2024, 4, 2, 8, 30, 0).unwrap())
        );
        assert_eq!(session.details.site_name, "Howard County Library");
        assert_eq!(session.start_location.as_ref().unwrap().accuracy_meters, None);
        assert_eq!(session.photos.len(), 1);
        assert_eq!(session.photos[0].kind, PhotoKind::Before);
        assert_eq!(session.client_token.as_deref(), Some("tok-1"));
    }

    #[test]
    fn reports_every_issue_with_its_path() {
        let issues = decode_job_session(&doc(json!({
            "userId": "",
            "status": "paused",
            "startTime": "not a time",
            "notes": 42,
            "photos": ["https://b/ok.jpg", 7]
        })))
        .unwrap_err();

        let rendered = join_issues(&issues);
        assert!(rendered.contains("userId: must not be empty"));
        assert!(rendered.contains("status: expected 'in_progress' or 'completed'"));
        assert!(rendered.contains("startTime: expected a timestamp"));
        assert!(rendered.contains("notes: expected a string"));
        assert!(rendered.contains("photos.1: expected a url string or a photo object"));
        assert_eq!(issues.len(), 5);
    }

    #[test]
    fn non_object_document_is_a_root_issue() {
        let issues = decode_job_session(&doc(json!(["nope"]))).unwrap_err();
        assert_eq!(issues[0].to_string(), "(root): expected an object");
    }

    #[test]
    fn unknown_photo_kinds_become_unsorted() {
        let session = decode_job_session(&doc(json!({
            "userId": "tech-1",
            "photos": [
                "https://b/legacy.jpg",
                {"url": "https://b/odd.jpg", "kind": "sideways"},
                {"url": "https://b/after.jpg", "kind": "after"},
                {"kind": "before"}
            ]
        })))
        .unwrap();

        let kinds: Vec<_> = session.photos.iter().map(|p| p.kind).collect();
        assert_eq!(
            kinds,
            vec![PhotoKind::Unsorted, PhotoKind::Unsorted, PhotoKind::After]
        );
    }

    #[test]
    fn extraction_survives_a_broken_document() {
        let broken = doc(json!({
            "userId": 17,
            "status": "completed",
            "startTime": {"seconds": 1_700_000_000, "nanoseconds": 0},
            "endTime": "garbage",
            "siteName": ["not", "text"],
            "address": "1 Main St",
            "photos": "https://b/not-an-array.jpg"
        }));
        assert!(decode_job_session(&broken).is_err());

        let session = extract_job_session(&broken);
        assert_eq!(session.user_id, "");
        assert_eq!(session.status, SessionStatus::Completed);
        assert_eq!(session.start_time.unwrap().timestamp(), 1_700_000_000);
        assert_eq!(session.end_time, None);
        assert_eq!(session.details.site_name, "");
        assert_eq!(session.details.address, "1 Main St");
        assert!(session.photos.is_empty());
    }

    #[test]
    fn missing_status_is_inferred_from_end_time() {
        let open = extract_job_session(&doc(json!({"userId": "u"})));
        assert_eq!(open.status, SessionStatus::InProgress);

        let closed = extract_job_session(&doc(json!({
            "userId": "u",
            "endTime": "2024-01-01T00:00:00Z"
        })));
        assert_eq!(closed.status, SessionStatus::Completed);
    }

    #[test]
    fn nulls_are_treated_as_absent() {
        let session = decode_job_session(&doc(json!({
            "userId": "u",
            "endTime": null,
            "startLocation": null,
            "notes": null
        })))
        .unwrap();
        assert_eq!(session.end_time, None);
        assert_eq!(session.start_location, None);
        assert_eq!(session.details.notes, "");
    }
}
