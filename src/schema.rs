//! @ai:module:intent Declarative schema of metrics to collect
//! @ai:module:layer domain
//! @ai:module:public_api MetricKind, MetricSpec, MetricSchema
//! @ai:module:stateless true

use crate::error::{Error, Result};
use crate::table::Table;
use crate::value::MetricValue;
use std::collections::HashSet;
use std::path::Path;

const SCHEMA_COLS: [&str; 4] = ["metric_name", "metric_type", "default_value", "required"];

/// @ai:intent How values of a metric combine across files within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    /// Numeric values are summed
    Additive,
    /// Truthy values are counted as 0/1
    AdditiveBool,
    /// Values are collected as an ordered list
    Combined,
}

impl MetricKind {
    /// @ai:intent Parse the schema-file spelling of the kind
    /// @ai:effects pure
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "add" => Some(MetricKind::Additive),
            "add_b" => Some(MetricKind::AdditiveBool),
            "append" => Some(MetricKind::Combined),
            _ => None,
        }
    }

    /// @ai:intent Whether this kind contributes to the additive table
    /// @ai:effects pure
    pub fn is_additive(&self) -> bool {
        matches!(self, MetricKind::Additive | MetricKind::AdditiveBool)
    }
}

/// @ai:intent One metric to collect
///
/// Invariant: `required` and `default` are mutually exclusive. A missing
/// required metric excludes the run; a missing optional metric takes the
/// default.
#[derive(Debug, Clone)]
pub struct MetricSpec {
    pub name: String,
    pub kind: MetricKind,
    pub default: Option<MetricValue>,
    pub required: bool,
}

/// @ai:intent The validated set of metrics to collect, in declaration order
#[derive(Debug, Clone)]
pub struct MetricSchema {
    specs: Vec<MetricSpec>,
}

impl MetricSchema {
    /// @ai:intent Build from parsed specs, enforcing schema invariants
    /// @ai:effects pure
    pub fn new(specs: Vec<MetricSpec>) -> Result<Self> {
        if specs.is_empty() {
            return Err(Error::schema("the metrics-to-collect table is empty"));
        }

        let mut seen = HashSet::new();
        for spec in &specs {
            if !seen.insert(spec.name.as_str()) {
                return Err(Error::schema(format!(
                    "duplicate metric name '{}'",
                    spec.name
                )));
            }
            if spec.required && spec.default.is_some() {
                return Err(Error::schema(format!(
                    "metric '{}' is required but has a default value; required metrics must not carry defaults",
                    spec.name
                )));
            }
            if !spec.required && spec.default.is_none() {
                return Err(Error::schema(format!(
                    "metric '{}' is not required but has no default value",
                    spec.name
                )));
            }
            if spec.kind.is_additive() {
                if let Some(default) = &spec.default {
                    if default.as_number().is_none() {
                        return Err(Error::schema(format!(
                            "metric '{}' is additive but its default value is not numeric",
                            spec.name
                        )));
                    }
                }
            }
        }

        Ok(MetricSchema { specs })
    }

    /// @ai:intent Load and validate the schema CSV
    /// @ai:effects fs:read
    pub fn load(path: &Path) -> Result<Self> {
        let table = Table::read_csv(path)?;

        for col in SCHEMA_COLS {
            if table.column_index(col).is_none() {
                return Err(Error::schema(format!(
                    "the metrics-to-collect file must contain the columns {}",
                    SCHEMA_COLS.join(", ")
                )));
            }
        }

        let name_idx = table.column_index("metric_name").unwrap();
        let type_idx = table.column_index("metric_type").unwrap();
        let default_idx = table.column_index("default_value").unwrap();
        let required_idx = table.column_index("required").unwrap();

        let mut specs = Vec::with_capacity(table.rows.len());

        for row in &table.rows {
            let name = row[name_idx].trim().to_string();
            let kind_raw = row[type_idx].trim();
            let kind = MetricKind::parse(kind_raw).ok_or_else(|| {
                Error::schema(format!(
                    "invalid metric type '{}' for metric '{}'; must be 'add', 'add_b' or 'append'",
                    kind_raw, name
                ))
            })?;

            let required_raw = row[required_idx].trim();
            let required = match required_raw.to_ascii_lowercase().as_str() {
                "true" => true,
                "false" => false,
                _ => {
                    return Err(Error::schema(format!(
                        "invalid required value '{}' for metric '{}'; must be true or false",
                        required_raw, name
                    )))
                }
            };

            let default = parse_default(row[default_idx].trim());

            specs.push(MetricSpec {
                name,
                kind,
                default,
                required,
            });
        }

        Self::new(specs)
    }

    /// @ai:intent All specs in declaration order
    /// @ai:effects pure
    pub fn specs(&self) -> &[MetricSpec] {
        &self.specs
    }

    /// @ai:intent Look up the spec for a metric name
    /// @ai:effects pure
    pub fn classify(&self, name: &str) -> Option<&MetricSpec> {
        self.specs.iter().find(|s| s.name == name)
    }

    /// @ai:intent Every declared metric name
    /// @ai:effects pure
    pub fn all_names(&self) -> HashSet<&str> {
        self.specs.iter().map(|s| s.name.as_str()).collect()
    }

    /// @ai:intent Additive metric names, in declaration order
    /// @ai:effects pure
    pub fn additive_names(&self) -> Vec<&str> {
        self.specs
            .iter()
            .filter(|s| s.kind.is_additive())
            .map(|s| s.name.as_str())
            .collect()
    }

    /// @ai:intent Combined metric names, in declaration order
    /// @ai:effects pure
    pub fn combined_names(&self) -> Vec<&str> {
        self.specs
            .iter()
            .filter(|s| s.kind == MetricKind::Combined)
            .map(|s| s.name.as_str())
            .collect()
    }
}

/// @ai:intent Parse a default cell: number, boolean, or raw text; empty is absent
/// @ai:effects pure
fn parse_default(cell: &str) -> Option<MetricValue> {
    if cell.is_empty() {
        return None;
    }
    if let Ok(n) = cell.parse::<f64>() {
        return Some(MetricValue::Number(n));
    }
    match cell.to_ascii_lowercase().as_str() {
        "true" => Some(MetricValue::Bool(true)),
        "false" => Some(MetricValue::Bool(false)),
        _ => Some(MetricValue::Text(cell.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_schema(content: &str) -> (TempDir, std::path::PathBuf) {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("metrics_to_collect.csv");
        std::fs::write(&path, content).unwrap();
        (temp, path)
    }

    #[test]
    fn test_load_valid_schema() {
        let (_temp, path) = write_schema(
            "metric_name,metric_type,default_value,required\n\
             tool_calls,add,,true\n\
             gave_up,add_b,0,false\n\
             model_names,append,unknown,false\n",
        );

        let schema = MetricSchema::load(&path).unwrap();
        assert_eq!(schema.specs().len(), 3);
        assert_eq!(schema.additive_names(), vec!["tool_calls", "gave_up"]);
        assert_eq!(schema.combined_names(), vec!["model_names"]);

        let spec = schema.classify("tool_calls").unwrap();
        assert!(spec.required);
        assert!(spec.default.is_none());

        let spec = schema.classify("gave_up").unwrap();
        assert_eq!(spec.default, Some(MetricValue::Number(0.0)));
    }

    #[test]
    fn test_duplicate_name_is_schema_error() {
        let (_temp, path) = write_schema(
            "metric_name,metric_type,default_value,required\n\
             x,add,,true\n\
             x,add,0,false\n",
        );
        assert!(matches!(
            MetricSchema::load(&path),
            Err(Error::Schema(_))
        ));
    }

    #[test]
    fn test_required_with_default_is_schema_error() {
        let (_temp, path) = write_schema(
            "metric_name,metric_type,default_value,required\n\
             x,add,5,true\n",
        );
        assert!(MetricSchema::load(&path).is_err());
    }

    #[test]
    fn test_optional_without_default_is_schema_error() {
        let (_temp, path) = write_schema(
            "metric_name,metric_type,default_value,required\n\
             x,add,,false\n",
        );
        assert!(MetricSchema::load(&path).is_err());
    }

    #[test]
    fn test_bad_type_and_bad_required() {
        let (_temp, path) = write_schema(
            "metric_name,metric_type,default_value,required\n\
             x,mul,,true\n",
        );
        assert!(MetricSchema::load(&path).is_err());

        let (_temp, path) = write_schema(
            "metric_name,metric_type,default_value,required\n\
             x,add,,maybe\n",
        );
        assert!(MetricSchema::load(&path).is_err());
    }

    #[test]
    fn test_missing_column_is_schema_error() {
        let (_temp, path) = write_schema("metric_name,metric_type,required\nx,add,true\n");
        assert!(MetricSchema::load(&path).is_err());
    }
}
