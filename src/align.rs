//! @ai:module:intent Joins per-metric summary tables into one wide table
//! @ai:module:layer application
//! @ai:module:public_api TableAligner, ColumnRequest
//! @ai:module:stateless true

use crate::error::{Error, Result};
use crate::table::Table;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// @ai:intent One requested output column, "<metric>.<sub_metric>"
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRequest {
    pub metric: String,
    pub sub_metric: String,
}

impl ColumnRequest {
    /// @ai:intent Parse the dotted request form
    /// @ai:effects pure
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.split_once('.') {
            Some((metric, sub_metric))
                if !metric.is_empty() && !sub_metric.is_empty() && !sub_metric.contains('.') =>
            {
                Ok(Self {
                    metric: metric.to_string(),
                    sub_metric: sub_metric.to_string(),
                })
            }
            _ => Err(Error::Alignment(format!(
                "invalid column request '{}'; expected <metric>.<sub_metric>",
                raw
            ))),
        }
    }

    /// @ai:intent Column head in the joined table
    /// @ai:effects pure
    pub fn output_name(&self) -> String {
        format!("{}_{}", self.metric, self.sub_metric)
    }
}

/// @ai:intent Outer-joins columns of per-metric data_<metric>.csv files
///
/// Keys appear in first-seen order; a key absent from one table leaves
/// that cell empty. A requested metric with no file, or a table missing
/// the key or sub-metric column, fails the whole invocation.
pub struct TableAligner {
    key_column: String,
    requests: Vec<ColumnRequest>,
}

impl TableAligner {
    /// @ai:intent Build from raw "<metric>.<sub_metric>" requests
    /// @ai:effects pure
    pub fn new(key_column: impl Into<String>, raw_columns: &[String]) -> Result<Self> {
        let requests = raw_columns
            .iter()
            .map(|raw| ColumnRequest::parse(raw))
            .collect::<Result<Vec<_>>>()?;
        if requests.is_empty() {
            return Err(Error::Alignment("no columns requested".to_string()));
        }
        Ok(Self {
            key_column: key_column.into(),
            requests,
        })
    }

    /// @ai:intent Join the requested columns into one table
    /// @ai:effects fs:read
    pub fn align(&self, work_dir: &Path) -> Result<Table> {
        let files = find_data_files(work_dir);

        let mut keys: Vec<String> = Vec::new();
        let mut key_index: HashMap<String, usize> = HashMap::new();
        // One column of optional cells per request, filled as tables load
        let mut columns: Vec<Vec<Option<String>>> = vec![Vec::new(); self.requests.len()];

        for (slot, request) in self.requests.iter().enumerate() {
            let path = files.get(&request.metric).ok_or_else(|| {
                Error::Alignment(format!(
                    "no data file found for metric '{}' under {}",
                    request.metric,
                    work_dir.display()
                ))
            })?;
            debug!(metric = %request.metric, path = %path.display(), "joining column");

            let table = Table::read_csv(path)?;
            let key_idx = table.column_index(&self.key_column).ok_or_else(|| {
                Error::Alignment(format!(
                    "key column '{}' not found in {}",
                    self.key_column,
                    path.display()
                ))
            })?;
            let value_idx = table.column_index(&request.sub_metric).ok_or_else(|| {
                Error::Alignment(format!(
                    "sub-metric '{}' not found in {}",
                    request.sub_metric,
                    path.display()
                ))
            })?;

            for row in &table.rows {
                let key = &row[key_idx];
                let index = *key_index.entry(key.clone()).or_insert_with(|| {
                    keys.push(key.clone());
                    keys.len() - 1
                });
                for column in columns.iter_mut() {
                    if column.len() <= index {
                        column.resize(index + 1, None);
                    }
                }
                columns[slot][index] = Some(row[value_idx].clone());
            }
        }

        let mut header = vec![self.key_column.clone()];
        header.extend(self.requests.iter().map(ColumnRequest::output_name));

        let rows = keys
            .iter()
            .enumerate()
            .map(|(i, key)| {
                let mut cells = vec![key.clone()];
                cells.extend(
                    columns
                        .iter()
                        .map(|column| column.get(i).cloned().flatten().unwrap_or_default()),
                );
                cells
            })
            .collect();

        Ok(Table {
            columns: header,
            rows,
        })
    }

    /// @ai:intent Join and write <work_dir>/<table_name>.csv
    /// @ai:effects fs:read, fs:write
    pub fn run(&self, work_dir: &Path, table_name: &str) -> Result<PathBuf> {
        let table = self.align(work_dir)?;
        let out_path = work_dir.join(format!("{}.csv", table_name));
        table.write_csv(&out_path)?;
        Ok(out_path)
    }
}

/// @ai:intent Map metric name to its data_<metric>.csv, recursively
///
/// The metric name is the file stem minus its leading "data" segment.
/// The first file found per metric wins.
/// @ai:effects fs:read
fn find_data_files(work_dir: &Path) -> HashMap<String, PathBuf> {
    let mut files = HashMap::new();

    for entry in WalkDir::new(work_dir).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if !name.starts_with("data") || !name.ends_with(".csv") {
            continue;
        }

        let stem = name.trim_end_matches(".csv");
        let metric = match stem.split_once('_') {
            Some((_, metric)) if !metric.is_empty() => metric.to_string(),
            _ => continue,
        };

        if files.contains_key(&metric) {
            warn!(metric, path = %entry.path().display(), "duplicate data file ignored");
            continue;
        }
        files.insert(metric, entry.path().to_path_buf());
    }

    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn write_data(dir: &Path, metric: &str, content: &str) {
        std::fs::write(dir.join(format!("data_{}.csv", metric)), content).unwrap();
    }

    #[test]
    fn test_column_request_parse() {
        let request = ColumnRequest::parse("tool_calls.mean").unwrap();
        assert_eq!(request.metric, "tool_calls");
        assert_eq!(request.sub_metric, "mean");
        assert_eq!(request.output_name(), "tool_calls_mean");

        assert!(ColumnRequest::parse("no_dot").is_err());
        assert!(ColumnRequest::parse("a.b.c").is_err());
        assert!(ColumnRequest::parse(".mean").is_err());
    }

    #[test]
    fn test_join_preserves_request_order_and_key_order() {
        let temp = tempfile::TempDir::new().unwrap();
        write_data(temp.path(), "score", "category,mean,std\nb1,5,1\nb2,6,2\n");
        write_data(temp.path(), "cost", "category,mean,std\nb1,10,3\nb2,20,4\n");

        let aligner = TableAligner::new(
            "category",
            &["cost.mean".to_string(), "score.std".to_string()],
        )
        .unwrap();
        let table = aligner.align(temp.path()).unwrap();

        assert_eq!(table.columns, vec!["category", "cost_mean", "score_std"]);
        assert_eq!(table.rows, vec![
            vec!["b1".to_string(), "10".to_string(), "1".to_string()],
            vec!["b2".to_string(), "20".to_string(), "2".to_string()],
        ]);
    }

    #[test]
    fn test_outer_join_leaves_missing_cells_empty() {
        let temp = tempfile::TempDir::new().unwrap();
        write_data(temp.path(), "score", "category,mean\nb1,5\nb2,6\n");
        write_data(temp.path(), "cost", "category,mean\nb2,20\nb3,30\n");

        let aligner = TableAligner::new(
            "category",
            &["score.mean".to_string(), "cost.mean".to_string()],
        )
        .unwrap();
        let table = aligner.align(temp.path()).unwrap();

        // Keys in first-seen order across tables
        assert_eq!(table.rows, vec![
            vec!["b1".to_string(), "5".to_string(), String::new()],
            vec!["b2".to_string(), "6".to_string(), "20".to_string()],
            vec!["b3".to_string(), String::new(), "30".to_string()],
        ]);
    }

    #[test]
    fn test_missing_metric_file_is_fatal() {
        let temp = tempfile::TempDir::new().unwrap();
        write_data(temp.path(), "score", "category,mean\nb1,5\n");

        let aligner = TableAligner::new("category", &["cost.mean".to_string()]).unwrap();
        assert!(matches!(
            aligner.align(temp.path()),
            Err(Error::Alignment(_))
        ));
    }

    #[test]
    fn test_missing_key_column_is_fatal() {
        let temp = tempfile::TempDir::new().unwrap();
        write_data(temp.path(), "score", "label,mean\nb1,5\n");

        let aligner = TableAligner::new("category", &["score.mean".to_string()]).unwrap();
        assert!(aligner.align(temp.path()).is_err());
    }

    #[test]
    fn test_missing_sub_metric_is_fatal() {
        let temp = tempfile::TempDir::new().unwrap();
        write_data(temp.path(), "score", "category,mean\nb1,5\n");

        let aligner = TableAligner::new("category", &["score.median".to_string()]).unwrap();
        assert!(aligner.align(temp.path()).is_err());
    }

    #[test]
    fn test_nested_directories_are_scanned() {
        let temp = tempfile::TempDir::new().unwrap();
        let nested = temp.path().join("batch_a");
        std::fs::create_dir(&nested).unwrap();
        write_data(&nested, "score", "category,mean\nb1,5\n");

        let aligner = TableAligner::new("category", &["score.mean".to_string()]).unwrap();
        let out_path = aligner.run(temp.path(), "summary").unwrap();
        assert_eq!(out_path, temp.path().join("summary.csv"));

        let table = Table::read_csv(&out_path).unwrap();
        assert_eq!(table.columns, vec!["category", "score_mean"]);
    }
}
