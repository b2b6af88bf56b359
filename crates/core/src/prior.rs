//! Previously persisted records, used to resume a run.
//!
//! A run's output is a JSON array of records. Loading it back and indexing
//! it by a stable key (an `href`, a slug, a submission id) gives the
//! lookup a [`FallbackCache`](crate::FallbackCache) provider needs, so the
//! next run only fetches what is missing.
//!
//! # Example
//!
//! ```rust
//! use glean_core::{PriorOutput, Record, Value};
//!
//! let mut kata = Record::new();
//! kata.insert("href", "/kata/1");
//! kata.insert("description", "Sum two numbers.");
//!
//! let prior = PriorOutput::from_records(vec![kata]);
//! let index = prior.index("href", "description");
//! assert_eq!(index.get("/kata/1"), Some(&Value::from("Sum two numbers.")));
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::record::{Record, Value};
use crate::{GleanError, Result};

/// Records produced by an earlier run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriorOutput {
    records: Vec<Record>,
}

impl PriorOutput {
    /// Wraps records produced in this run.
    ///
    /// Values are [normalized](Value::normalized), so the records compare
    /// equal to what [`PriorOutput::load`] reads back after a save.
    pub fn from_records(records: Vec<Record>) -> Self {
        Self { records: records.into_iter().map(Record::normalized).collect() }
    }

    /// Loads a JSON array of records from `path`.
    ///
    /// # Errors
    ///
    /// Returns [`GleanError::FileNotFound`] if `path` does not exist and
    /// [`GleanError::Json`] if it is not an array of objects.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(GleanError::FileNotFound(path.to_path_buf()));
        }

        let body = fs::read_to_string(path)?;
        let records: Vec<Record> = serde_json::from_str(&body)?;
        tracing::debug!(path = %path.display(), records = records.len(), "loaded prior output");
        Ok(Self { records })
    }

    /// Loads `path` if it exists, otherwise starts from nothing.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        if path.as_ref().exists() { Self::load(path) } else { Ok(Self::default()) }
    }

    /// Writes the records to `path` as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let body = serde_json::to_string_pretty(&self.records)?;
        fs::write(path, body)?;
        Ok(())
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Maps each record's `key_field` text to its `value_field` value.
    ///
    /// Records lacking either field, or whose key is not text, are skipped.
    /// When two records share a key the first one wins.
    pub fn index(&self, key_field: &str, value_field: &str) -> HashMap<String, Value> {
        let mut index = HashMap::new();
        for record in &self.records {
            if let Some(key) = record.text(key_field)
                && let Some(value) = record.get(value_field)
            {
                index.entry(key.to_string()).or_insert_with(|| value.clone());
            }
        }
        index
    }

    /// Like [`PriorOutput::index`], keeping only text values.
    pub fn text_index(&self, key_field: &str, value_field: &str) -> HashMap<String, String> {
        self.index(key_field, value_field)
            .into_iter()
            .filter_map(|(key, value)| match value {
                Value::Text(text) => Some((key, text)),
                _ => None,
            })
            .collect()
    }

    /// A provider closure serving `value_field` by `key_field`.
    pub fn provider(
        &self, key_field: &str, value_field: &str,
    ) -> impl Fn(&String) -> Option<Value> + Send + Sync + use<> {
        let index = self.index(key_field, value_field);
        move |key: &String| index.get(key).cloned()
    }
}
