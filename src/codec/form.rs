use bytes::Bytes;
use url::form_urlencoded;

use crate::models::CanonicalBody;

/// Parse `application/x-www-form-urlencoded` pairs; repeated keys accumulate.
pub fn decode(bytes: &[u8]) -> CanonicalBody {
    let mut body = CanonicalBody::default();
    for (key, value) in form_urlencoded::parse(bytes) {
        if key.is_empty() {
            continue;
        }
        body.push_text(key, value);
    }
    body
}

/// Serialize fields as url-encoded pairs; lists become repeated keys.
pub fn encode(body: &CanonicalBody) -> Bytes {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (key, value) in &body.fields {
        for text in value.texts() {
            serializer.append_pair(key, &text);
        }
    }
    Bytes::from(serializer.finish())
}
