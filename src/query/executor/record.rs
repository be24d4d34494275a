//! Record structures for query results
//!
//! Every template returns its raw rows as a [`RecordBatch`] next to the
//! shaped answer, so callers can see exactly what the answer was built from.

use crate::graph::PropertyValue;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A single result row; columns keep insertion order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    bindings: IndexMap<String, PropertyValue>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a column, replacing any previous value
    pub fn bind(&mut self, column: impl Into<String>, value: impl Into<PropertyValue>) {
        self.bindings.insert(column.into(), value.into());
    }

    /// Builder form of [`Record::bind`]
    pub fn with(mut self, column: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.bind(column, value);
        self
    }

    pub fn get(&self, column: &str) -> Option<&PropertyValue> {
        self.bindings.get(column)
    }

    pub fn has(&self, column: &str) -> bool {
        self.bindings.contains_key(column)
    }

    pub fn bindings(&self) -> &IndexMap<String, PropertyValue> {
        &self.bindings
    }

    /// String column, `None` for nulls and non-strings
    pub fn get_str(&self, column: &str) -> Option<&str> {
        self.get(column).and_then(PropertyValue::as_string)
    }
}

/// A batch of records (result set)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordBatch {
    pub records: Vec<Record>,
    pub columns: Vec<String>,
}

impl RecordBatch {
    pub fn new(columns: &[&str]) -> Self {
        Self {
            records: Vec::new(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn push(&mut self, record: Record) {
        self.records.push(record);
    }

    pub fn get(&self, index: usize) -> Option<&Record> {
        self.records.get(index)
    }

    /// Values of one column across all rows, nulls included
    pub fn column(&self, name: &str) -> Vec<&PropertyValue> {
        self.records.iter().filter_map(|r| r.get(name)).collect()
    }
}
