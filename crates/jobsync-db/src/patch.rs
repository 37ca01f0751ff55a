//! Partial document updates.

use serde_json::{Map, Value as JsonValue};

#[derive(Debug, Clone, PartialEq)]
pub enum FieldOp {
    /// Overwrite the field.
    Set(JsonValue),
    /// Append each value not already present; never removes or reorders
    /// existing elements.
    ArrayUnion(Vec<JsonValue>),
}

/// An ordered list of field operations applied atomically to one document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentPatch {
    ops: Vec<(String, FieldOp)>,
}

impl DocumentPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, field: impl Into<String>, value: JsonValue) -> Self {
        self.ops.push((field.into(), FieldOp::Set(value)));
        self
    }

    pub fn array_union(mut self, field: impl Into<String>, values: Vec<JsonValue>) -> Self {
        self.ops.push((field.into(), FieldOp::ArrayUnion(values)));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn ops(&self) -> &[(String, FieldOp)] {
        &self.ops
    }

    /// Fields touched by this patch, in order.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.ops.iter().map(|(field, _)| field.as_str())
    }

    /// Apply to `data`, turning it into an object first if it is not one.
    /// A union onto a missing or non-array field starts a new array.
    pub fn apply_to(&self, data: &mut JsonValue) {
        if !data.is_object() {
            *data = JsonValue::Object(Map::new());
        }
        let Some(map) = data.as_object_mut() else {
            return;
        };

        for (field, op) in &self.ops {
            match op {
                FieldOp::Set(value) => {
                    map.insert(field.clone(), value.clone());
                }
                FieldOp::ArrayUnion(values) => {
                    let entry = map
                        .entry(field.clone())
                        .or_insert_with(|| JsonValue::Array(Vec::new()));
                    if !entry.is_array() {
                        *entry = JsonValue::Array(Vec::new());
                    }
                    if let JsonValue::Array(existing) = entry {
                        for value in values {
                            if !existing.contains(value) {
                                existing.push(value.clone());
                            }
                        }
                    }
                }
            }
        }
    }
}
