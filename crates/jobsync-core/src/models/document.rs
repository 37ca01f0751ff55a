use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// A document as delivered by the realtime store: an opaque id assigned by the
/// store plus loosely shaped data that has not been validated yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub data: JsonValue,
}

impl Document {
    pub fn new(id: impl Into<String>, data: JsonValue) -> Self {
        Self {
            id: id.into(),
            data,
        }
    }

    /// Raw field lookup; `None` when the data is not an object or the field is absent.
    pub fn field(&self, name: &str) -> Option<&JsonValue> {
        self.data.as_object().and_then(|map| map.get(name))
    }
}
