//! Column reconciliation between order records and the training column order.
//!
//! Positional model backends read features by index, so every row handed to
//! them must be laid out exactly the way the model was trained. The training
//! column order ships as a side artifact next to the model.

use crate::models::loader::read_artifact;
use crate::types::order::{FieldValue, OrderRecord};
use anyhow::{bail, Result};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::path::Path;
use tracing::info;

/// Column order used at model training time.
///
/// Loaded once at startup and shared read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnOrder {
    names: Vec<String>,
}

impl ColumnOrder {
    /// Column order from names already in training order
    pub fn new<S: Into<String>>(names: impl IntoIterator<Item = S>) -> Self {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Load a column order artifact (pickled or JSON list of names)
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let order: ColumnOrder = read_artifact(path)?;
        if order.is_empty() {
            bail!("Column order artifact {} is empty", path.display());
        }

        info!(path = %path.display(), columns = order.len(), "Column order loaded");
        Ok(order)
    }

    /// Column names in training order
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Whether the model was trained on `name`
    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    /// Expected columns the record does not provide
    pub fn missing_from<'a>(&'a self, record: &OrderRecord) -> Vec<&'a str> {
        self.names
            .iter()
            .filter(|name| !record.contains(name))
            .map(String::as_str)
            .collect()
    }

    /// Record attributes the model was not trained on
    pub fn unexpected_in<'r>(&self, record: &'r OrderRecord) -> Vec<&'r str> {
        record.keys().filter(|key| !self.contains(key)).collect()
    }
}

/// A single-row table. `None` cells are undefined (missing) values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TabularRow {
    columns: Vec<String>,
    values: Vec<Option<FieldValue>>,
}

impl TabularRow {
    /// Build a row from a record, keeping the record's key order
    pub fn from_record(record: &OrderRecord) -> Self {
        let (columns, values): (Vec<String>, Vec<Option<FieldValue>>) = record
            .iter()
            .map(|(name, value)| (name.to_string(), Some(value.clone())))
            .unzip();
        Self { columns, values }
    }

    /// Reindex the row to exactly `order`.
    ///
    /// Columns missing from the row become undefined, columns outside
    /// `order` are dropped.
    pub fn reindex(&self, order: &ColumnOrder) -> Self {
        let values = order
            .names()
            .iter()
            .map(|name| self.value(name).cloned())
            .collect();

        Self {
            columns: order.names().to_vec(),
            values,
        }
    }

    /// Column names, one per cell
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Defined value of a column. `None` when the column is absent or undefined.
    pub fn value(&self, name: &str) -> Option<&FieldValue> {
        self.columns
            .iter()
            .position(|column| column == name)
            .and_then(|idx| self.values[idx].as_ref())
    }

    /// Cell at a column position
    pub fn cell(&self, idx: usize) -> Option<&FieldValue> {
        self.values.get(idx).and_then(Option::as_ref)
    }

    /// Cells paired with their column names, undefined cells as `None`
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&FieldValue>)> {
        self.columns
            .iter()
            .zip(self.values.iter())
            .map(|(name, value)| (name.as_str(), value.as_ref()))
    }

    /// Convert to a homogeneous float row.
    ///
    /// Undefined cells become NaN. Categorical values must have been encoded
    /// upstream; a string cell is an error.
    pub fn to_f32_vec(&self) -> Result<Vec<f32>> {
        self.iter()
            .map(|(name, value)| match value {
                Some(FieldValue::Number(v)) => Ok(*v as f32),
                Some(FieldValue::Category(v)) => {
                    bail!("Column '{}' holds unencoded categorical value '{}'", name, v)
                }
                None => Ok(f32::NAN),
            })
            .collect()
    }
}

impl Serialize for TabularRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (name, value) in self.iter() {
            map.serialize_entry(name, &value)?;
        }
        map.end()
    }
}
