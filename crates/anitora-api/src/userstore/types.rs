//! Wire types for the Firestore REST document format.
//!
//! Firestore tags every field value with its kind, e.g.
//! `{"title": {"stringValue": "Mushishi"}}`, and serializes integers as
//! strings. Decoding is deliberately lenient: a field of an unknown kind is
//! dropped rather than failing the whole document, and a document with no
//! fields at all still decodes (the sync layer decides whether to skip it).

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::json;

use crate::traits::{UserDocument, Value};

#[derive(Debug, Deserialize)]
pub struct ListDocumentsResponse {
    pub documents: Option<Vec<FireDocument>>,
    #[serde(rename = "nextPageToken")]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FireDocument {
    pub name: String,
    pub fields: Option<serde_json::Map<String, serde_json::Value>>,
}

impl FireDocument {
    pub fn into_user_document(self) -> UserDocument {
        let mut fields = BTreeMap::new();
        for (name, raw) in self.fields.unwrap_or_default() {
            if let Some(value) = decode_value(&raw) {
                fields.insert(name, value);
            }
        }
        UserDocument {
            name: self.name,
            fields,
        }
    }
}

/// Encode a field value into Firestore's tagged JSON representation.
pub fn encode_value(value: &Value) -> serde_json::Value {
    match value {
        Value::String(s) => json!({ "stringValue": s }),
        Value::Integer(v) => json!({ "integerValue": v.to_string() }),
        Value::Double(v) => json!({ "doubleValue": v }),
        Value::Bool(v) => json!({ "booleanValue": v }),
        Value::Null => json!({ "nullValue": null }),
    }
}

/// Decode a tagged Firestore value. Unknown kinds (timestamps, maps, arrays)
/// decode to `None` and are dropped by the caller.
pub fn decode_value(raw: &serde_json::Value) -> Option<Value> {
    let obj = raw.as_object()?;
    let (kind, inner) = obj.iter().next()?;
    match kind.as_str() {
        "stringValue" => Some(Value::String(inner.as_str()?.to_owned())),
        "integerValue" => Some(Value::Integer(inner.as_str()?.parse().ok()?)),
        "doubleValue" => Some(Value::Double(inner.as_f64()?)),
        "booleanValue" => Some(Value::Bool(inner.as_bool()?)),
        "nullValue" => Some(Value::Null),
        _ => None,
    }
}
