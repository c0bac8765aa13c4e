//! Content-type independent representation of an inbound payload.

use std::collections::BTreeMap;

use bytes::Bytes;
use serde_json::{Map, Value};

use super::ForwardedFile;

/// Value of one body field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// A single text value (form and multipart fields).
    Text(String),
    /// A key that appeared several times, in arrival order.
    List(Vec<String>),
    /// A typed JSON value, kept as-is so re-encoding does not stringify it.
    Json(Value),
}

impl FieldValue {
    /// Append another occurrence of the same key.
    pub fn push(&mut self, value: String) {
        match self {
            FieldValue::Text(first) => {
                *self = FieldValue::List(vec![std::mem::take(first), value]);
            }
            FieldValue::List(values) => values.push(value),
            FieldValue::Json(existing) => {
                let first = json_to_text(existing);
                *self = FieldValue::List(vec![first, value]);
            }
        }
    }

    /// First textual value of the field, if it has a non-empty one.
    ///
    /// Used to read directive fields regardless of the body's encoding.
    pub fn first_text(&self) -> Option<String> {
        let text = match self {
            FieldValue::Text(s) => Some(s.clone()),
            FieldValue::List(values) => values.first().cloned(),
            FieldValue::Json(Value::Null) => None,
            FieldValue::Json(value) => Some(json_to_text(value)),
        }?;
        let trimmed = text.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }

    /// All values of the field as strings, for encodings without types.
    pub fn texts(&self) -> Vec<String> {
        match self {
            FieldValue::Text(s) => vec![s.clone()],
            FieldValue::List(values) => values.clone(),
            FieldValue::Json(Value::Array(items)) => items.iter().map(json_to_text).collect(),
            FieldValue::Json(value) => vec![json_to_text(value)],
        }
    }

    /// The field as a JSON value.
    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::Text(s) => Value::String(s.clone()),
            FieldValue::List(values) => {
                Value::Array(values.iter().cloned().map(Value::String).collect())
            }
            FieldValue::Json(value) => value.clone(),
        }
    }
}

/// Render a JSON value as plain text: strings without quotes, the rest as JSON.
fn json_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// One binary part of a multipart body.
#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    pub field_name: String,
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Bytes,
}

/// The inbound payload independent of its wire encoding.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CanonicalBody {
    pub fields: BTreeMap<String, FieldValue>,
    pub attachments: Vec<Attachment>,
}

impl CanonicalBody {
    /// Build a body from a parsed JSON object.
    pub fn from_json_object(object: Map<String, Value>) -> Self {
        Self {
            fields: object
                .into_iter()
                .map(|(key, value)| (key, FieldValue::Json(value)))
                .collect(),
            attachments: Vec::new(),
        }
    }

    /// Add a text field, accumulating repeated keys into a list.
    pub fn push_text(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let value = value.into();
        self.fields
            .entry(key.into())
            .and_modify(|existing| existing.push(value.clone()))
            .or_insert(FieldValue::Text(value));
    }

    /// Remove a field and return it.
    pub fn take_field(&mut self, key: &str) -> Option<FieldValue> {
        self.fields.remove(key)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.attachments.is_empty()
    }

    /// Number of text fields, counting every occurrence of a repeated key.
    pub fn field_count(&self) -> usize {
        self.fields
            .values()
            .map(|value| match value {
                FieldValue::List(values) => values.len(),
                _ => 1,
            })
            .sum()
    }

    /// Names of all fields.
    pub fn field_names(&self) -> Vec<String> {
        self.fields.keys().cloned().collect()
    }

    /// Diagnostic summary of the attachments.
    pub fn file_summaries(&self) -> Vec<ForwardedFile> {
        self.attachments
            .iter()
            .map(|a| ForwardedFile {
                name: a.field_name.clone(),
                filename: a.file_name.clone(),
                size: a.bytes.len(),
                mime_type: a.mime_type.clone(),
            })
            .collect()
    }

    /// The JSON document to forward in JSON mode.
    ///
    /// A `payload` field, when present, is forwarded on its own; otherwise
    /// the remaining fields are forwarded as one object.
    pub fn json_document(&self) -> Value {
        if let Some(payload) = self.fields.get(PAYLOAD_FIELD) {
            return payload.to_json();
        }
        Value::Object(
            self.fields
                .iter()
                .map(|(key, value)| (key.clone(), value.to_json()))
                .collect(),
        )
    }
}

/// Body field whose value replaces the whole JSON document on forwarding.
pub const PAYLOAD_FIELD: &str = "payload";
