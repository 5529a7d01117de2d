//! @ai:module:intent Tagged value type for flat metric documents
//! @ai:module:layer domain
//! @ai:module:public_api MetricValue
//! @ai:module:stateless true

use serde::{Deserialize, Serialize};

/// @ai:intent One value read from a metric file
///
/// Metric files are flat key/value documents; a value is a number, a
/// boolean, a string, or an ordered list of these. Nested objects are not
/// part of the data model and are dropped at read time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<MetricValue>),
}

impl MetricValue {
    /// @ai:intent Convert a JSON value, rejecting shapes outside the model
    /// @ai:effects pure
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Bool(b) => Some(MetricValue::Bool(*b)),
            serde_json::Value::Number(n) => n.as_f64().map(MetricValue::Number),
            serde_json::Value::String(s) => Some(MetricValue::Text(s.clone())),
            serde_json::Value::Array(items) => {
                let converted: Option<Vec<_>> = items.iter().map(Self::from_json).collect();
                converted.map(MetricValue::List)
            }
            serde_json::Value::Null | serde_json::Value::Object(_) => None,
        }
    }

    /// @ai:intent Numeric view; booleans count as 0/1, text as non-numeric
    /// @ai:effects pure
    pub fn as_number(&self) -> Option<f64> {
        match self {
            MetricValue::Number(n) => Some(*n),
            MetricValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// @ai:intent Truthiness used by boolean-count metrics
    /// @ai:effects pure
    pub fn is_truthy(&self) -> bool {
        match self {
            MetricValue::Bool(b) => *b,
            MetricValue::Number(n) => *n != 0.0,
            MetricValue::Text(s) => !s.is_empty(),
            MetricValue::List(items) => !items.is_empty(),
        }
    }
}
