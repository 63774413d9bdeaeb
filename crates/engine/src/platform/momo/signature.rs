//! momo request signing.
//!
//! The signed string is `merchant_id + timestamp_ms + pairs + api_secret`,
//! where `pairs` is the payload's top-level fields as `key=value`, sorted by
//! key and joined with `&`. The digest is SHA-256, upper-case hex.
//!
//! Values are rendered the way momo's reference client renders them:
//! strings raw, numbers without a trailing `.0`, arrays comma-joined,
//! nested objects as `[object Object]`.

use serde_json::Value;
use sha2::{Digest, Sha256};

/// `key=value` pairs of `payload` in key order.
///
/// Anything other than a JSON object signs as the empty string.
#[must_use]
pub fn canonical_pairs(payload: &Value) -> String {
    let Value::Object(fields) = payload else {
        return String::new();
    };
    let mut pairs: Vec<(&String, &Value)> = fields.iter().collect();
    pairs.sort_by(|a, b| a.0.cmp(b.0));
    pairs
        .into_iter()
        .map(|(key, value)| format!("{key}={}", render(value)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Upper-case hex SHA-256 over the signing string.
#[must_use]
pub fn sign(merchant_id: &str, timestamp_ms: i64, payload: &Value, api_secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(merchant_id.as_bytes());
    hasher.update(timestamp_ms.to_string().as_bytes());
    hasher.update(canonical_pairs(payload).as_bytes());
    hasher.update(api_secret.as_bytes());
    hex::encode_upper(hasher.finalize())
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => render_number(n),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Null => String::new(),
                other => render(other),
            })
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}

// serde_json writes whole floats as "450.0"; momo expects "450".
fn render_number(n: &serde_json::Number) -> String {
    let text = n.to_string();
    match text.strip_suffix(".0") {
        Some(whole) => whole.to_string(),
        None => text,
    }
}
