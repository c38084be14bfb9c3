//! Metadata documents.
//!
//! A [`Document`] maps string keys to [`Value`]s, and a value may itself be a
//! nested document. Keys are kept in a `BTreeMap` so iteration and
//! serialization order are deterministic.

use std::collections::btree_map::{self, BTreeMap};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number};

use crate::error::TypeError;

/// A single metadata value.
///
/// JSON has no blob type, so [`Value::Bytes`] is rendered as an array of byte
/// values and reads back from JSON as a [`Value::List`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "serde_json::Value", into = "serde_json::Value")]
pub enum Value {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Bytes(Vec<u8>),
    List(Vec<Value>),
    Document(Document),
}

impl Value {
    /// Short name of the value's shape, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Bytes(_) => "bytes",
            Self::List(_) => "list",
            Self::Document(_) => "document",
        }
    }

    pub fn is_document(&self) -> bool {
        matches!(self, Self::Document(_))
    }

    pub fn as_document(&self) -> Option<&Document> {
        match self {
            Self::Document(doc) => Some(doc),
            _ => None,
        }
    }

    pub fn as_document_mut(&mut self) -> Option<&mut Document> {
        match self {
            Self::Document(doc) => Some(doc),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Number(n) => n.as_i64(),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Number(n.into())
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Self::Number(n.into())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<Vec<u8>> for Value {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<Document> for Value {
    fn from(doc: Document) -> Self {
        Self::Document(doc)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => Self::Number(n),
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(items) => {
                Self::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => Self::Document(Document::from(map)),
        }
    }
}

impl From<Value> for serde_json::Value {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => Self::Number(n),
            Value::String(s) => Self::String(s),
            Value::Bytes(bytes) => Self::Array(bytes.into_iter().map(Self::from).collect()),
            Value::List(items) => Self::Array(items.into_iter().map(Self::from).collect()),
            Value::Document(doc) => Self::Object(doc.into()),
        }
    }
}

/// String-keyed metadata mapping.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document(BTreeMap<String, Value>);

impl Document {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Parse a document from raw JSON bytes.
    ///
    /// The top-level JSON value must be an object.
    pub fn from_json_slice(raw: &[u8]) -> Result<Self, TypeError> {
        let json: serde_json::Value = serde_json::from_slice(raw)?;
        Self::try_from(json)
    }

    /// Number of top-level fields.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.0.get_mut(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Insert a field, returning the previous value at that key.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn entry(&mut self, key: String) -> btree_map::Entry<'_, String, Value> {
        self.0.entry(key)
    }

    pub fn keys(&self) -> btree_map::Keys<'_, String, Value> {
        self.0.keys()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, Value> {
        self.0.iter()
    }

    /// Render as a JSON object.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(self.clone().into())
    }
}

impl From<BTreeMap<String, Value>> for Document {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Self(map)
    }
}

impl From<Map<String, serde_json::Value>> for Document {
    fn from(map: Map<String, serde_json::Value>) -> Self {
        map.into_iter().map(|(k, v)| (k, Value::from(v))).collect()
    }
}

impl From<Document> for Map<String, serde_json::Value> {
    fn from(doc: Document) -> Self {
        doc.0
            .into_iter()
            .map(|(k, v)| (k, serde_json::Value::from(v)))
            .collect()
    }
}

impl TryFrom<serde_json::Value> for Document {
    type Error = TypeError;

    fn try_from(json: serde_json::Value) -> Result<Self, Self::Error> {
        match json {
            serde_json::Value::Object(map) => Ok(Self::from(map)),
            other => Err(TypeError::NotAnObject(Value::from(other).kind())),
        }
    }
}

impl FromIterator<(String, Value)> for Document {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for Document {
    type Item = (String, Value);
    type IntoIter = btree_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Document {
    type Item = (&'a String, &'a Value);
    type IntoIter = btree_map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn nested_json_converts_to_nested_documents() {
        let doc = Document::try_from(json!({
            "name": "report.pdf",
            "tags": ["a", "b"],
            "owner": { "team": "storage", "size": 3 }
        }))
        .unwrap();

        assert_eq!(doc.len(), 3);
        assert_eq!(doc.get("name").and_then(Value::as_str), Some("report.pdf"));
        assert_eq!(doc.get("tags").map(Value::kind), Some("list"));

        let owner = doc.get("owner").and_then(Value::as_document).unwrap();
        assert_eq!(owner.get("size").and_then(Value::as_i64), Some(3));
    }

    #[test]
    fn json_conversion_is_lossless_for_json_inputs() {
        let input = json!({
            "a": null,
            "b": true,
            "c": 1.5,
            "d": u64::MAX,
            "e": { "f": [1, { "g": "h" }] }
        });
        let doc = Document::try_from(input.clone()).unwrap();
        assert_eq!(doc.to_json(), input);
    }

    #[test]
    fn non_object_json_is_rejected() {
        let err = Document::try_from(json!([1, 2, 3])).unwrap_err();
        assert!(matches!(err, TypeError::NotAnObject("list")));

        let err = Document::from_json_slice(b"\"text\"").unwrap_err();
        assert!(matches!(err, TypeError::NotAnObject("string")));
    }

    #[test]
    fn invalid_json_is_rejected() {
        let err = Document::from_json_slice(b"{ not json").unwrap_err();
        assert!(matches!(err, TypeError::Json(_)));
    }

    #[test]
    fn bytes_render_as_byte_array() {
        let mut doc = Document::new();
        doc.insert("blob", vec![0u8, 255]);
        assert_eq!(doc.to_json(), json!({ "blob": [0, 255] }));
    }

    #[test]
    fn serde_roundtrip_through_json_text() {
        let mut inner = Document::new();
        inner.insert("y", 2i64);
        let mut doc = Document::new();
        doc.insert("a", inner);
        doc.insert("b", "text");

        let text = serde_json::to_string(&doc).unwrap();
        assert_eq!(text, r#"{"a":{"y":2},"b":"text"}"#);

        let back: Document = serde_json::from_str(&text).unwrap();
        assert_eq!(back, doc);
    }

    #[test]
    fn value_kinds() {
        assert_eq!(Value::Null.kind(), "null");
        assert_eq!(Value::from(true).kind(), "bool");
        assert_eq!(Value::from(7i64).kind(), "number");
        assert_eq!(Value::from("s").kind(), "string");
        assert_eq!(Value::from(vec![1u8]).kind(), "bytes");
        assert_eq!(Value::List(vec![]).kind(), "list");
        assert!(Value::from(Document::new()).is_document());
    }
}
