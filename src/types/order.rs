//! Order data structures for delivery time prediction

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// A single order attribute value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Numeric attribute (distance, minutes, years, hour)
    Number(f64),
    /// Categorical attribute (weather, traffic level, vehicle type, ...)
    Category(String),
}

impl FieldValue {
    /// Numeric value, if this is a number
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(value) => Some(*value),
            FieldValue::Category(_) => None,
        }
    }

    /// Level name, if this is a category
    pub fn as_category(&self) -> Option<&str> {
        match self {
            FieldValue::Number(_) => None,
            FieldValue::Category(value) => Some(value),
        }
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Number(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Number(value as f64)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Category(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Category(value)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Number(value) => write!(f, "{}", value),
            FieldValue::Category(value) => f.write_str(value),
        }
    }
}

/// Named order attributes, kept in insertion order.
///
/// The order of keys is the "natural" column order handed to predictors
/// when no training column order is configured.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderRecord {
    fields: Vec<(String, FieldValue)>,
}

impl OrderRecord {
    /// Empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, name: &str, value: impl Into<FieldValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// Insert an attribute. An existing key keeps its position and gets the new value.
    pub fn insert(&mut self, name: &str, value: impl Into<FieldValue>) {
        let value = value.into();
        match self.fields.iter_mut().find(|(key, _)| key == name) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((name.to_string(), value)),
        }
    }

    /// Value of an attribute
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    /// Whether the attribute is present
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Attribute names in insertion order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(key, _)| key.as_str())
    }

    /// Attributes in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(key, value)| (key.as_str(), value))
    }

    /// Number of attributes
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Serialize for OrderRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (key, value) in &self.fields {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

struct OrderRecordVisitor;

impl<'de> Visitor<'de> for OrderRecordVisitor {
    type Value = OrderRecord;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a map of attribute names to numbers or strings")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut record = OrderRecord::new();
        while let Some((key, value)) = access.next_entry::<String, FieldValue>()? {
            record.insert(&key, value);
        }
        Ok(record)
    }
}

impl<'de> Deserialize<'de> for OrderRecord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(OrderRecordVisitor)
    }
}

fn generate_order_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Incoming prediction request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRequest {
    /// Caller-supplied order identifier
    #[serde(default = "generate_order_id")]
    pub order_id: String,

    /// Order attributes to predict from
    pub attributes: OrderRecord,
}

impl OrderRequest {
    pub fn new(attributes: OrderRecord) -> Self {
        Self {
            order_id: generate_order_id(),
            attributes,
        }
    }
}
