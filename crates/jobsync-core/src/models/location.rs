use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};

use crate::validation::timestamp::timestamp_value;

/// Best-effort device position captured at clock-in or clock-out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
    /// `None` when the device reports no finite accuracy.
    #[serde(alias = "accuracyM")]
    pub accuracy_meters: Option<f64>,
    pub captured_at: DateTime<Utc>,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64, accuracy_meters: Option<f64>, captured_at: DateTime<Utc>) -> Self {
        Self {
            lat,
            lng,
            accuracy_meters: accuracy_meters.filter(|a| a.is_finite()),
            captured_at,
        }
    }

    pub fn to_document_value(&self) -> JsonValue {
        json!({
            "lat": self.lat,
            "lng": self.lng,
            "accuracyMeters": self.accuracy_meters,
            "capturedAt": timestamp_value(self.captured_at),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn non_finite_accuracy_is_dropped() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        let point = GeoPoint::new(39.2, -76.8, Some(f64::NAN), at);
        assert_eq!(point.accuracy_meters, None);
    }

    #[test]
    fn document_value_uses_camel_case_keys() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        let value = GeoPoint::new(39.2, -76.8, Some(12.5), at).to_document_value();
        assert_eq!(value["accuracyMeters"], json!(12.5));
        assert_eq!(value["capturedAt"], json!("2024-05-01T08:00:00.000Z"));
    }
}
