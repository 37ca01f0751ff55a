use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value as JsonValue};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use crate::validation::timestamp::timestamp_value;

/// Category of an uploaded photo. `Unsorted` covers legacy entries and
/// anything whose kind could not be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhotoKind {
    Before,
    After,
    Unsorted,
}

impl PhotoKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PhotoKind::Before => "before",
            PhotoKind::After => "after",
            PhotoKind::Unsorted => "unsorted",
        }
    }
}

impl FromStr for PhotoKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "before" => Ok(PhotoKind::Before),
            "after" => Ok(PhotoKind::After),
            "unsorted" => Ok(PhotoKind::Unsorted),
            _ => Err(anyhow::anyhow!("Invalid photo kind: {}", s)),
        }
    }
}

impl Display for PhotoKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}

/// The kinds a technician can queue for upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadKind {
    Before,
    After,
}

impl UploadKind {
    pub const ALL: [UploadKind; 2] = [UploadKind::Before, UploadKind::After];

    pub fn as_str(&self) -> &'static str {
        PhotoKind::from(*self).as_str()
    }
}

impl From<UploadKind> for PhotoKind {
    fn from(kind: UploadKind) -> Self {
        match kind {
            UploadKind::Before => PhotoKind::Before,
            UploadKind::After => PhotoKind::After,
        }
    }
}

impl Display for UploadKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}

/// A photo attached to a session. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobPhoto {
    pub url: String,
    pub kind: PhotoKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploaded_at: Option<DateTime<Utc>>,
}

impl JobPhoto {
    pub fn new(url: impl Into<String>, kind: PhotoKind, uploaded_at: DateTime<Utc>) -> Self {
        Self {
            url: url.into(),
            kind,
            uploaded_at: Some(uploaded_at),
        }
    }

    /// Value appended to the session's `photos` array.
    pub fn to_document_value(&self) -> JsonValue {
        let mut map = Map::new();
        map.insert("url".to_string(), json!(self.url));
        map.insert("kind".to_string(), json!(self.kind.as_str()));
        if let Some(uploaded_at) = self.uploaded_at {
            map.insert("uploadedAt".to_string(), timestamp_value(uploaded_at));
        }
        JsonValue::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn upload_kind_maps_onto_photo_kind() {
        assert_eq!(PhotoKind::from(UploadKind::Before), PhotoKind::Before);
        assert_eq!(PhotoKind::from(UploadKind::After), PhotoKind::After);
        assert_eq!(UploadKind::After.as_str(), "after");
    }

    #[test]
    fn photo_kind_parsing_is_exact() {
        assert_eq!("before".parse::<PhotoKind>().unwrap(), PhotoKind::Before);
        assert!("Before".parse::<PhotoKind>().is_err());
    }

    #[test]
    fn document_value_omits_missing_upload_time() {
        let photo = JobPhoto {
            url: "https://blobs/a.jpg".to_string(),
            kind: PhotoKind::Unsorted,
            uploaded_at: None,
        };
        let value = photo.to_document_value();
        assert_eq!(value, json!({"url": "https://blobs/a.jpg", "kind": "unsorted"}));

        let at = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let value = JobPhoto::new("u", PhotoKind::After, at).to_document_value();
        assert_eq!(value["uploadedAt"], json!("2024-01-02T03:04:05.000Z"));
    }
}
