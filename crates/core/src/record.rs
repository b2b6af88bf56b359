//! Extracted values and records.
//!
//! A [`Record`] is what resolving a [`Schema`](crate::Schema) produces: one
//! [`Value`] per declared field, in declaration order. Records own their
//! data, so they outlive the document they were extracted from and can be
//! moved across tasks, persisted, and loaded back as prior output.

use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{GleanError, Result};

/// A single extracted value.
///
/// Serialized untagged: text becomes a JSON string, lists JSON arrays,
/// records JSON objects. [`Value::Json`] only ever holds numbers, booleans
/// and null; strings, arrays and objects are stored as `Text`, `List` and
/// `Record` so a value loaded back from disk equals the one that was saved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Text content, an attribute value, a regex match, or a node's outer HTML.
    Text(String),
    /// One value per matched node, in document order.
    List(Vec<Value>),
    /// A nested record.
    Record(Record),
    /// A JSON scalar other than a string.
    Json(serde_json::Value),
}

impl Value {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Record(record) => Some(record),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Value::Json(json) => Some(json),
            _ => None,
        }
    }

    /// Converts the value into plain JSON.
    /// Rewrites any JSON string, array or object into its canonical variant.
    ///
    /// Values built by hand as `Value::Json(..)` may hold any JSON; this
    /// brings them into the shape they take after a save and load.
    #[must_use]
    pub fn normalized(self) -> Value {
        match self {
            Value::Json(json) => Value::from(json),
            Value::List(items) => Value::List(items.into_iter().map(Value::normalized).collect()),
            Value::Record(record) => Value::Record(record.normalized()),
            text => text,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Text(s) => serde_json::Value::String(s.clone()),
            Value::List(items) => serde_json::Value::Array(items.iter().map(Value::to_json).collect()),
            Value::Record(record) => record.to_json(),
            Value::Json(json) => json.clone(),
        }
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::String(s) => Value::Text(s),
            serde_json::Value::Array(items) => Value::List(items.into_iter().map(Value::from).collect()),
            serde_json::Value::Object(map) => {
                Value::Record(map.into_iter().map(|(name, value)| (name, Value::from(value))).collect())
            }
            scalar => Value::Json(scalar),
        }
    }
}

impl From<Record> for Value {
    fn from(value: Record) -> Self {
        Value::Record(value)
    }
}

/// Ordered field values of one resolved record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Vec<(String, Value)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a field, replacing an existing value in place or appending a new one.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(field, _)| field == name).map(|(_, value)| value)
    }

    /// Text value of a field, if it holds text.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_text)
    }

    /// List value of a field, if it holds a list.
    pub fn list(&self, name: &str) -> Option<&[Value]> {
        self.get(name).and_then(Value::as_list)
    }

    /// Removes a field and returns its value.
    pub fn take(&mut self, name: &str) -> Option<Value> {
        let index = self.fields.iter().position(|(field, _)| field == name)?;
        Some(self.fields.remove(index).1)
    }

    /// Removes a text field.
    ///
    /// # Errors
    ///
    /// Returns [`GleanError::MissingField`] if the field is absent or not text.
    pub fn take_text(&mut self, name: &str) -> Result<String> {
        match self.take(name) {
            Some(Value::Text(s)) => Ok(s),
            _ => Err(GleanError::MissingField(name.to_string())),
        }
    }

    /// Removes a list field.
    pub fn take_list(&mut self, name: &str) -> Result<Vec<Value>> {
        match self.take(name) {
            Some(Value::List(items)) => Ok(items),
            _ => Err(GleanError::MissingField(name.to_string())),
        }
    }

    /// Removes a nested record field.
    pub fn take_record(&mut self, name: &str) -> Result<Record> {
        match self.take(name) {
            Some(Value::Record(record)) => Ok(record),
            _ => Err(GleanError::MissingField(name.to_string())),
        }
    }

    /// Removes a list of nested records.
    pub fn take_records(&mut self, name: &str) -> Result<Vec<Record>> {
        self.take_list(name)?
            .into_iter()
            .map(|value| match value {
                Value::Record(record) => Ok(record),
                _ => Err(GleanError::MissingField(name.to_string())),
            })
            .collect()
    }

    /// Field names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Normalizes every field, see [`Value::normalized`].
    #[must_use]
    pub fn normalized(self) -> Record {
        self.fields.into_iter().map(|(name, value)| (name, value.normalized())).collect()
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(self.fields.iter().map(|(name, value)| (name.clone(), value.to_json())).collect())
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Record {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct RecordVisitor;

        impl<'de> Visitor<'de> for RecordVisitor {
            type Value = Record;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of field names to values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> std::result::Result<Record, A::Error> {
                let mut record = Record::new();
                while let Some((name, value)) = access.next_entry::<String, Value>()? {
                    record.insert(name, value);
                }
                Ok(record)
            }
        }

        deserializer.deserialize_map(RecordVisitor)
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (name, value) in iter {
            record.insert(name, value);
        }
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Record {
        let mut record = Record::new();
        record.insert("title", "Two Sum");
        record.insert("tags", Value::List(vec!["array".into(), "hash".into()]));
        record
    }

    #[test]
    fn test_insert_keeps_order_and_replaces() {
        let mut record = sample();
        record.insert("title", "Three Sum");
        assert_eq!(record.names().collect::<Vec<_>>(), vec!["title", "tags"]);
        assert_eq!(record.text("title"), Some("Three Sum"));
    }

    #[test]
    fn test_take_typed() {
        let mut record = sample();
        assert_eq!(record.take_list("tags").unwrap().len(), 2);
        assert!(matches!(record.take_list("title"), Err(GleanError::MissingField(_))));
        assert!(record.is_empty());
    }

    #[test]
    fn test_json_shape() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json, serde_json::json!({"title": "Two Sum", "tags": ["array", "hash"]}));
    }

    #[test]
    fn test_load_back_preserves_order() {
        let loaded: Record = serde_json::from_str(r#"{"z": "1", "a": ["x"], "n": 3}"#).unwrap();
        assert_eq!(loaded.names().collect::<Vec<_>>(), vec!["z", "a", "n"]);
        assert_eq!(loaded.get("n"), Some(&Value::Json(serde_json::json!(3))));
    }

    #[test]
    fn test_json_converts_to_canonical_variants() {
        let value = Value::from(serde_json::json!({"slug": "two-sum", "likes": 42, "tags": ["array"], "paid": null}));
        let record = value.as_record().unwrap();
        assert_eq!(record.text("slug"), Some("two-sum"));
        assert_eq!(record.get("likes"), Some(&Value::Json(serde_json::json!(42))));
        assert_eq!(record.list("tags"), Some(&[Value::from("array")][..]));
        assert_eq!(record.get("paid"), Some(&Value::Json(serde_json::Value::Null)));
    }

    #[test]
    fn test_normalized_survives_serde() {
        let mut record = Record::new();
        record.insert("description", Value::Json(serde_json::json!("Sum two numbers.")));
        record.insert("meta", Value::List(vec![Value::Json(serde_json::json!({"k": 1}))]));
        let record = Value::Record(record).normalized();

        let body = serde_json::to_string(&record).unwrap();
        let loaded: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(loaded, record);
        assert_eq!(loaded.to_json(), serde_json::json!({"description": "Sum two numbers.", "meta": [{"k": 1}]}));
    }
}
