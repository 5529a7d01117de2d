//! @ai:module:intent Metric file discovery and parsing
//! @ai:module:layer infrastructure
//! @ai:module:public_api find_metric_files, read_metric_file
//! @ai:module:stateless true

use crate::error::{Error, Result};
use crate::value::MetricValue;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// @ai:intent List a run's metric files: prefix match, optional .json suffix
///
/// Results are sorted by file name so aggregation order is deterministic.
/// @ai:effects fs:read
pub fn find_metric_files(run_dir: &Path, prefix: &str, strict: bool) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in std::fs::read_dir(run_dir)? {
        let entry = entry?;
        let path = entry.path();

        if !path.is_file() {
            continue;
        }

        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };

        if name.starts_with(prefix) && (name.ends_with(".json") || !strict) {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}

/// @ai:intent Parse one metric file into a flat name-to-value mapping
///
/// The document must be a JSON object. Keys whose values fall outside the
/// metric value model (null, nested objects) are dropped with a warning.
/// @ai:effects fs:read
pub fn read_metric_file(path: &Path) -> Result<BTreeMap<String, MetricValue>> {
    let content = std::fs::read_to_string(path).map_err(|source| Error::FileRead {
        path: path.to_path_buf(),
        source,
    })?;

    let document: serde_json::Value = serde_json::from_str(&content)?;

    let serde_json::Value::Object(map) = document else {
        return Err(Error::Json(serde::de::Error::custom(format!(
            "metric file {} is not a JSON object",
            path.display()
        ))));
    };

    let mut values = BTreeMap::new();

    for (key, raw) in map {
        match MetricValue::from_json(&raw) {
            Some(value) => {
                values.insert(key, value);
            }
            None => {
                tracing::warn!(
                    "Dropping metric '{}' in {}: value is not a number, boolean, string or list",
                    key,
                    path.display()
                );
            }
        }
    }

    Ok(values)
}
