//! Order schemas accepted at the request boundary.
//!
//! Each deployment serves exactly one schema. Field names match the column
//! names the corresponding model was trained on.

use crate::config::ModelBackend;
use crate::types::order::{FieldValue, OrderRecord};
use anyhow::{bail, Result};
use serde::Deserialize;

pub const WEATHER: &[&str] = &["Clear", "Cloudy", "Rainy"];
pub const TRAFFIC_LEVELS: &[&str] = &["Low", "Medium", "High"];
pub const TIMES_OF_DAY: &[&str] = &["Morning", "Afternoon", "Evening", "Night"];
pub const VEHICLES: &[&str] = &["Bike", "Car", "Motor"];
pub const DISTANCE_CATEGORIES: &[&str] = &["Short", "Medium", "Long"];
pub const EXPERIENCE_CATEGORIES: &[&str] = &["Newbie", "Intermediate", "Expert"];

/// Allowed values for one field
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldKind {
    Numeric { min: f64, max: f64, integer: bool },
    Categorical(&'static [&'static str]),
}

/// How categorical fields may be written in a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CategoryInput {
    /// Level names only
    #[default]
    Labels,
    /// Level names or the level's index in the schema enumeration.
    ///
    /// Numeric-only models were trained on encoded levels; the index is
    /// passed through to the model untouched.
    LabelsOrCodes,
}

impl CategoryInput {
    /// Codes are accepted only where the model reads a float row
    pub fn for_backend(backend: ModelBackend) -> Self {
        match backend {
            ModelBackend::Onnx => CategoryInput::LabelsOrCodes,
            ModelBackend::Pickle | ModelBackend::Checkpoint => CategoryInput::Labels,
        }
    }
}

/// One attribute of an order schema
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
}

impl FieldSpec {
    const fn real(name: &'static str, min: f64, max: f64) -> Self {
        Self {
            name,
            kind: FieldKind::Numeric {
                min,
                max,
                integer: false,
            },
        }
    }

    const fn integer(name: &'static str, min: f64, max: f64) -> Self {
        Self {
            name,
            kind: FieldKind::Numeric {
                min,
                max,
                integer: true,
            },
        }
    }

    const fn categorical(name: &'static str, levels: &'static [&'static str]) -> Self {
        Self {
            name,
            kind: FieldKind::Categorical(levels),
        }
    }

    /// Check a single value against this field
    pub fn check(&self, value: &FieldValue, input: CategoryInput) -> Result<()> {
        match (self.kind, value) {
            (FieldKind::Numeric { min, max, integer }, FieldValue::Number(v)) => {
                if !v.is_finite() || *v < min || *v > max {
                    bail!("{} must be within [{}, {}], got {}", self.name, min, max, v);
                }
                if integer && v.fract() != 0.0 {
                    bail!("{} must be a whole number, got {}", self.name, v);
                }
                Ok(())
            }
            (FieldKind::Categorical(levels), FieldValue::Category(v)) => {
                if !levels.contains(&v.as_str()) {
                    bail!("{} must be one of {:?}, got '{}'", self.name, levels, v);
                }
                Ok(())
            }
            (FieldKind::Numeric { .. }, FieldValue::Category(v)) => {
                bail!("{} must be numeric, got '{}'", self.name, v)
            }
            (FieldKind::Categorical(levels), FieldValue::Number(v)) => {
                if input != CategoryInput::LabelsOrCodes {
                    bail!("{} must be a category, got {}", self.name, v);
                }
                let max_code = (levels.len() - 1) as f64;
                if v.fract() != 0.0 || *v < 0.0 || *v > max_code {
                    bail!(
                        "{} code must be a whole number within [0, {}], got {}",
                        self.name,
                        max_code,
                        v
                    );
                }
                Ok(())
            }
        }
    }
}

const DISTANCE: FieldSpec = FieldSpec::real("Distance_km", 0.0, 50.0);
const WEATHER_FIELD: FieldSpec = FieldSpec::categorical("Weather", WEATHER);
const TRAFFIC: FieldSpec = FieldSpec::categorical("Traffic_Level", TRAFFIC_LEVELS);
const TIME_OF_DAY: FieldSpec = FieldSpec::categorical("Time_of_Day", TIMES_OF_DAY);
const VEHICLE: FieldSpec = FieldSpec::categorical("Vehicle_Type", VEHICLES);
const PREPARATION: FieldSpec = FieldSpec::integer("Preparation_Time_min", 0.0, 120.0);
const EXPERIENCE: FieldSpec = FieldSpec::integer("Courier_Experience_yrs", 0.0, 20.0);
const DISTANCE_CATEGORY: FieldSpec =
    FieldSpec::categorical("Distance_category", DISTANCE_CATEGORIES);
const EXPERIENCE_CATEGORY: FieldSpec =
    FieldSpec::categorical("Courier_Experience_category", EXPERIENCE_CATEGORIES);
const HOUR: FieldSpec = FieldSpec::integer("Hour", 0.0, 23.0);
const COURIER: FieldSpec = FieldSpec::categorical("Courier_Type", VEHICLES);

const FULL_FIELDS: &[FieldSpec] = &[
    DISTANCE,
    WEATHER_FIELD,
    TRAFFIC,
    TIME_OF_DAY,
    VEHICLE,
    PREPARATION,
    EXPERIENCE,
    DISTANCE_CATEGORY,
    EXPERIENCE_CATEGORY,
];

const STANDARD_FIELDS: &[FieldSpec] = &[
    DISTANCE,
    WEATHER_FIELD,
    TRAFFIC,
    TIME_OF_DAY,
    VEHICLE,
    PREPARATION,
    EXPERIENCE,
];

const BUCKETED_FIELDS: &[FieldSpec] = &[
    DISTANCE,
    WEATHER_FIELD,
    TRAFFIC,
    TIME_OF_DAY,
    VEHICLE,
    PREPARATION,
    EXPERIENCE_CATEGORY,
];

const HOURLY_FIELDS: &[FieldSpec] = &[DISTANCE, WEATHER_FIELD, HOUR, COURIER, PREPARATION];

/// Order attribute set served by a deployment
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrderSchema {
    /// All attributes including distance and experience buckets
    #[default]
    Full,
    /// Raw attributes with experience in years
    Standard,
    /// Raw attributes with bucketed experience
    Bucketed,
    /// Hour of day and courier type
    Hourly,
}

impl OrderSchema {
    /// Field specs in training column order
    pub fn fields(&self) -> &'static [FieldSpec] {
        match self {
            OrderSchema::Full => FULL_FIELDS,
            OrderSchema::Standard => STANDARD_FIELDS,
            OrderSchema::Bucketed => BUCKETED_FIELDS,
            OrderSchema::Hourly => HOURLY_FIELDS,
        }
    }

    /// Field names in training column order
    pub fn field_names(&self) -> Vec<&'static str> {
        self.fields().iter().map(|f| f.name).collect()
    }

    /// Look up a field by name
    pub fn field(&self, name: &str) -> Option<&'static FieldSpec> {
        self.fields().iter().find(|f| f.name == name)
    }

    /// Validate a record with categorical fields given as level names
    pub fn validate(&self, record: &OrderRecord) -> Result<()> {
        self.validate_with(record, CategoryInput::Labels)
    }

    /// Validate a record: every field present, in bounds, nothing extra
    pub fn validate_with(&self, record: &OrderRecord, input: CategoryInput) -> Result<()> {
        for spec in self.fields() {
            match record.get(spec.name) {
                Some(value) => spec.check(value, input)?,
                None => bail!("Missing attribute {}", spec.name),
            }
        }

        if let Some(unknown) = record.keys().find(|key| self.field(key).is_none()) {
            bail!("Unknown attribute {} for {:?} schema", unknown, self);
        }
        Ok(())
    }
}
