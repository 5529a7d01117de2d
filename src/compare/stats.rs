//! @ai:module:intent Per-metric summary statistics and range ratios across batches
//! @ai:module:layer application
//! @ai:module:public_api BatchComparator, BatchStats
//! @ai:module:stateless true

use crate::config::{RatioDef, ScatterConfig, ScatterParams};
use crate::error::{Error, Result};
use crate::table::{format_number, MetricFrame, Table};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{info, warn};

/// @ai:intent Summary of one metric in one batch
///
/// Statistics run over the filtered population: values dropped by the
/// metric's valid-value bounds (or NaN) are invisible to mean, std, min,
/// max, count and every ratio. Ratios are percentages, parallel to the
/// configured ratio definitions.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchStats {
    pub label: String,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub count: usize,
    pub ratios: Vec<f64>,
}

impl BatchStats {
    /// @ai:intent Compute statistics for one labeled population
    ///
    /// An empty population yields NaN statistics with count 0; ratios with
    /// an empty p-zone yield 0.0. Std is the population standard deviation.
    /// @ai:effects pure
    pub fn compute(label: &str, values: &[f64], ratios: &[RatioDef]) -> Result<Self> {
        let count = values.len();

        let (mean, std, min, max) = if count == 0 {
            (f64::NAN, f64::NAN, f64::NAN, f64::NAN)
        } else {
            let mean = values.iter().sum::<f64>() / count as f64;
            let variance =
                values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / count as f64;
            let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
            let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            (mean, variance.sqrt(), min, max)
        };

        let mut percentages = Vec::with_capacity(ratios.len());
        for ratio in ratios {
            let ((n_min, n_max), (p_min, p_max)) = ratio.ranges()?;
            let n = values.iter().filter(|v| **v >= n_min && **v <= n_max).count();
            let p = values.iter().filter(|v| **v >= p_min && **v <= p_max).count();
            let percentage = if p == 0 {
                0.0
            } else {
                n as f64 / p as f64 * 100.0
            };
            percentages.push(percentage);
        }

        Ok(Self {
            label: label.to_string(),
            mean,
            std,
            min,
            max,
            count,
            ratios: percentages,
        })
    }
}

/// @ai:intent Compares labeled batches of per-run metric tables
pub struct BatchComparator {
    labels: Vec<String>,
    batches: Vec<MetricFrame>,
    config: ScatterConfig,
    key_column: String,
    skip_unconfigured: bool,
}

impl BatchComparator {
    /// @ai:intent Pair batches with labels; counts must match
    /// @ai:effects pure
    pub fn new(batches: Vec<MetricFrame>, labels: Option<Vec<String>>) -> Result<Self> {
        let labels = match labels {
            Some(labels) => {
                if labels.len() != batches.len() {
                    return Err(Error::schema(format!(
                        "number of batches ({}) must match number of labels ({})",
                        batches.len(),
                        labels.len()
                    )));
                }
                labels
            }
            None => (0..batches.len()).map(|i| format!("Batch {}", i + 1)).collect(),
        };

        Ok(Self {
            labels,
            batches,
            config: ScatterConfig::default(),
            key_column: "category".to_string(),
            skip_unconfigured: false,
        })
    }

    /// @ai:intent Attach the advanced plotting configuration
    /// @ai:effects pure
    pub fn with_config(mut self, config: ScatterConfig) -> Self {
        self.config = config;
        self
    }

    /// @ai:intent Only summarize metrics that have a parameter group
    /// @ai:effects pure
    pub fn skip_unconfigured(mut self, skip: bool) -> Self {
        self.skip_unconfigured = skip;
        self
    }

    /// @ai:intent Column head for the label column in summary tables
    /// @ai:effects pure
    pub fn with_key_column(mut self, key_column: impl Into<String>) -> Self {
        self.key_column = key_column.into();
        self
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn config(&self) -> &ScatterConfig {
        &self.config
    }

    pub fn skips_unconfigured(&self) -> bool {
        self.skip_unconfigured
    }

    /// @ai:intent Sorted union of metric names across all batches
    /// @ai:effects pure
    pub fn metrics(&self) -> Vec<String> {
        let mut names = BTreeSet::new();
        for batch in &self.batches {
            for name in batch.column_names() {
                names.insert(name.to_string());
            }
        }
        names.into_iter().collect()
    }

    /// @ai:intent Filtered values of one metric in one batch
    ///
    /// Returns None when the batch has no such column; otherwise the values
    /// inside the metric's valid bounds, NaN dropped.
    /// @ai:effects pure
    pub fn filtered_values(&self, batch: usize, metric: &str) -> Option<Vec<f64>> {
        let values = self.batches[batch].column(metric)?;
        let (min, max) = self.params_for(metric).map(ScatterParams::valid_bounds).unwrap_or((
            f64::NEG_INFINITY,
            f64::INFINITY,
        ));
        Some(
            values
                .iter()
                .filter(|v| !v.is_nan() && **v >= min && **v <= max)
                .cloned()
                .collect(),
        )
    }

    fn params_for(&self, metric: &str) -> Option<&ScatterParams> {
        self.config.params_for(metric)
    }

    /// @ai:intent One summary row per batch for one metric
    ///
    /// Batches missing the metric are skipped with a warning rather than
    /// failing the comparison.
    /// @ai:effects log:warn
    pub fn summarize(&self, metric: &str) -> Result<Vec<BatchStats>> {
        let ratios: &[RatioDef] = self
            .params_for(metric)
            .map(|p| p.display_ratios.as_slice())
            .unwrap_or(&[]);

        let mut rows = Vec::new();
        for (i, label) in self.labels.iter().enumerate() {
            match self.filtered_values(i, metric) {
                Some(values) => rows.push(BatchStats::compute(label, &values, ratios)?),
                None => {
                    warn!(metric, batch = %label, "metric not found in batch, skipping");
                }
            }
        }
        Ok(rows)
    }

    /// @ai:intent Write data_<metric>.csv for every metric
    /// @ai:effects fs:write, log:info
    pub fn write_summaries(&self, out_dir: &Path) -> Result<Vec<String>> {
        std::fs::create_dir_all(out_dir)?;

        let mut written = Vec::new();
        for metric in self.metrics() {
            let params = self.params_for(&metric);
            if self.skip_unconfigured && params.is_none() {
                continue;
            }

            let ratio_titles: Vec<String> = params
                .map(|p| p.display_ratios.iter().map(|r| r.title.clone()).collect())
                .unwrap_or_default();

            let rows = self.summarize(&metric)?;
            let table = summary_table(&self.key_column, &ratio_titles, &rows);

            let file_name = format!("data_{}.csv", metric);
            table.write_csv(&out_dir.join(&file_name))?;
            info!(metric, file = %file_name, "summary table written");
            written.push(file_name);
        }
        Ok(written)
    }
}

/// @ai:intent Lay out summary rows as a CSV table
/// @ai:effects pure
fn summary_table(key_column: &str, ratio_titles: &[String], rows: &[BatchStats]) -> Table {
    let mut columns = vec![
        key_column.to_string(),
        "mean".to_string(),
        "std".to_string(),
        "min".to_string(),
        "max".to_string(),
        "n".to_string(),
    ];
    columns.extend(ratio_titles.iter().cloned());

    let rows = rows
        .iter()
        .map(|row| {
            let mut cells = vec![
                row.label.clone(),
                format_number(row.mean),
                format_number(row.std),
                format_number(row.min),
                format_number(row.max),
                row.count.to_string(),
            ];
            cells.extend(row.ratios.iter().map(|r| format!("{:.2}", r)));
            cells
        })
        .collect();

    Table { columns, rows }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Bound;
    use pretty_assertions::assert_eq;

    fn frame(columns: &[(&str, &[f64])]) -> MetricFrame {
        let mut frame = MetricFrame::new();
        for (name, values) in columns {
            frame.push_column(*name, values.to_vec()).unwrap();
        }
        frame
    }

    fn ratio(title: &str, n: (f64, f64), p: (f64, f64)) -> RatioDef {
        RatioDef {
            title: title.to_string(),
            n_min: Bound::Number(n.0),
            n_max: Bound::Number(n.1),
            p_min: Bound::Number(p.0),
            p_max: Bound::Number(p.1),
            only_table: false,
        }
    }

    #[test]
    fn test_population_std() {
        let stats = BatchStats::compute("a", &[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0], &[])
            .unwrap();
        assert_eq!(stats.mean, 5.0);
        assert_eq!(stats.std, 2.0);
        assert_eq!(stats.min, 2.0);
        assert_eq!(stats.max, 9.0);
        assert_eq!(stats.count, 8);
    }

    #[test]
    fn test_ratio_is_exact_percentage() {
        let stats = BatchStats::compute(
            "a",
            &[1.0, 2.0, 3.0, 4.0, 5.0],
            &[ratio("low", (1.0, 2.0), (1.0, 5.0))],
        )
        .unwrap();
        assert_eq!(stats.ratios, vec![40.0]);
    }

    #[test]
    fn test_ratio_empty_p_zone_is_zero() {
        let stats = BatchStats::compute(
            "a",
            &[1.0, 2.0],
            &[ratio("none", (1.0, 2.0), (10.0, 20.0))],
        )
        .unwrap();
        assert_eq!(stats.ratios, vec![0.0]);
    }

    #[test]
    fn test_empty_population() {
        let stats = BatchStats::compute("a", &[], &[ratio("r", (0.0, 1.0), (0.0, 1.0))]).unwrap();
        assert_eq!(stats.count, 0);
        assert!(stats.mean.is_nan());
        assert!(stats.std.is_nan());
        assert_eq!(stats.ratios, vec![0.0]);
    }

    #[test]
    fn test_label_count_mismatch_is_fatal() {
        let batches = vec![frame(&[("score", &[1.0])])];
        assert!(BatchComparator::new(batches, Some(vec!["a".into(), "b".into()])).is_err());
    }

    #[test]
    fn test_default_labels() {
        let batches = vec![
            frame(&[("score", &[1.0])]),
            frame(&[("score", &[2.0])]),
        ];
        let comparator = BatchComparator::new(batches, None).unwrap();
        assert_eq!(comparator.labels(), &["Batch 1", "Batch 2"]);
    }

    #[test]
    fn test_missing_metric_skipped_per_batch() {
        let batches = vec![
            frame(&[("score", &[1.0, 3.0])]),
            frame(&[("other", &[2.0])]),
        ];
        let comparator = BatchComparator::new(batches, None).unwrap();

        assert_eq!(comparator.metrics(), vec!["other", "score"]);
        let rows = comparator.summarize("score").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].label, "Batch 1");
        assert_eq!(rows[0].mean, 2.0);
    }

    #[test]
    fn test_valid_bounds_filter_statistics_and_ratios() {
        let config: ScatterConfig = serde_json::from_str(
            r#"{
                "list": [{
                    "metrics": ["score"],
                    "parameters": {
                        "valid_values_min": 0,
                        "valid_values_max": 10,
                        "display_ratios": [{
                            "title": "high",
                            "n_min": 5, "n_max": 10,
                            "p_min": 0, "p_max": 10
                        }]
                    }
                }]
            }"#,
        )
        .unwrap();

        // -50 and 99 fall outside the valid bounds
        let batches = vec![frame(&[("score", &[-50.0, 2.0, 6.0, 8.0, 4.0, 99.0])])];
        let comparator = BatchComparator::new(batches, Some(vec!["run".into()]))
            .unwrap()
            .with_config(config);

        let rows = comparator.summarize("score").unwrap();
        assert_eq!(rows[0].count, 4);
        assert_eq!(rows[0].mean, 5.0);
        assert_eq!(rows[0].ratios, vec![50.0]);
    }

    #[test]
    fn test_summary_csv_layout() {
        let temp = tempfile::TempDir::new().unwrap();
        let batches = vec![frame(&[("score", &[1.0, 2.0, 3.0])])];
        let comparator = BatchComparator::new(batches, Some(vec!["baseline".into()])).unwrap();

        let written = comparator.write_summaries(temp.path()).unwrap();
        assert_eq!(written, vec!["data_score.csv"]);

        let table = Table::read_csv(&temp.path().join("data_score.csv")).unwrap();
        assert_eq!(
            table.columns,
            vec!["category", "mean", "std", "min", "max", "n"]
        );
        assert_eq!(table.rows[0][0], "baseline");
        assert_eq!(table.rows[0][1], "2");
        assert_eq!(table.rows[0][5], "3");
    }
}
