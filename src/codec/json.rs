use bytes::Bytes;
use serde_json::Value;
use tracing::debug;

use crate::error::AppResult;
use crate::models::CanonicalBody;

/// Parse a JSON body. Anything but a JSON object degrades to an empty body.
pub fn decode(bytes: &[u8]) -> CanonicalBody {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return CanonicalBody::default();
    }

    match serde_json::from_slice::<Value>(bytes) {
        Ok(Value::Object(object)) => CanonicalBody::from_json_object(object),
        Ok(other) => {
            debug!(kind = json_kind(&other), "JSON body is not an object, treating as empty");
            CanonicalBody::default()
        }
        Err(e) => {
            debug!(error = %e, "Malformed JSON body, treating as empty");
            CanonicalBody::default()
        }
    }
}

pub fn encode(body: &CanonicalBody) -> AppResult<Bytes> {
    Ok(Bytes::from(serde_json::to_vec(&body.json_document())?))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
