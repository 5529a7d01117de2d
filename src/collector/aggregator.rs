//! @ai:module:intent Per-run aggregation and batch-level collection
//! @ai:module:layer application
//! @ai:module:public_api RunRecord, RunAggregator, BatchCollector, CollectionStats
//! @ai:module:stateless true

use crate::collector::reader::{find_metric_files, read_metric_file};
use crate::config::CollectConfig;
use crate::error::Result;
use crate::exclusion::ExclusionEvaluator;
use crate::schema::{MetricKind, MetricSchema};
use crate::table::MetricFrame;
use crate::value::MetricValue;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

/// @ai:intent Aggregate of one run directory
///
/// Additive values are sums across the run's metric files; combined values
/// are their concatenated raw values. An excluded run keeps its reason for
/// auditing but contributes no row to the additive table.
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub run_id: String,
    pub additive: BTreeMap<String, f64>,
    pub combined: BTreeMap<String, Vec<MetricValue>>,
    pub excluded: bool,
    pub exclusion_reason: Option<String>,
}

impl RunRecord {
    fn excluded(run_id: &str, reason: impl Into<String>) -> Self {
        RunRecord {
            run_id: run_id.to_string(),
            additive: BTreeMap::new(),
            combined: BTreeMap::new(),
            excluded: true,
            exclusion_reason: Some(reason.into()),
        }
    }
}

/// @ai:intent Run counters threaded through a collection pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CollectionStats {
    pub total_runs: usize,
    pub skipped_runs: usize,
}

/// @ai:intent Aggregates a single run's metric files per the schema
pub struct RunAggregator {
    schema: MetricSchema,
    exclusions: ExclusionEvaluator,
    file_prefix: String,
    strict: bool,
}

impl RunAggregator {
    /// @ai:intent Create an aggregator with default file discovery settings
    /// @ai:effects pure
    pub fn new(schema: MetricSchema, exclusions: ExclusionEvaluator) -> Self {
        let collect = CollectConfig::default();
        Self::with_config(schema, exclusions, &collect)
    }

    /// @ai:intent Create an aggregator with explicit discovery settings
    /// @ai:effects pure
    pub fn with_config(
        schema: MetricSchema,
        exclusions: ExclusionEvaluator,
        collect: &CollectConfig,
    ) -> Self {
        Self {
            schema,
            exclusions,
            file_prefix: collect.file_prefix.clone(),
            strict: collect.strict,
        }
    }

    /// @ai:intent The schema this aggregator collects against
    /// @ai:effects pure
    pub fn schema(&self) -> &MetricSchema {
        &self.schema
    }

    /// @ai:intent Aggregate one run directory into a record
    ///
    /// A file that fails to read or parse is skipped with a warning; it only
    /// matters if it was the sole carrier of a required metric, in which case
    /// the required-metric check excludes the run.
    /// @ai:effects fs:read
    pub fn aggregate_run(&self, run_dir: &Path, run_id: &str) -> Result<RunRecord> {
        let files = find_metric_files(run_dir, &self.file_prefix, self.strict)?;

        if files.is_empty() {
            tracing::warn!("No metric files found in run: {}", run_id);
            return Ok(RunRecord::excluded(run_id, "no metric files found"));
        }

        let mut additive: BTreeMap<String, f64> = BTreeMap::new();
        let mut combined: BTreeMap<String, Vec<MetricValue>> = BTreeMap::new();

        for file in &files {
            tracing::debug!("Processing file: {}", file.display());

            let data = match read_metric_file(file) {
                Ok(data) => data,
                Err(e) => {
                    tracing::warn!("Skipping unparseable metric file {}: {}", file.display(), e);
                    continue;
                }
            };

            for spec in self.schema.specs() {
                let Some(value) = data.get(&spec.name) else {
                    continue;
                };

                match spec.kind {
                    MetricKind::Additive => match value.as_number() {
                        Some(n) => *additive.entry(spec.name.clone()).or_insert(0.0) += n,
                        None => {
                            tracing::warn!(
                                "Ignoring non-numeric value for additive metric '{}' in {}",
                                spec.name,
                                file.display()
                            );
                        }
                    },
                    MetricKind::AdditiveBool => {
                        let count = if value.is_truthy() { 1.0 } else { 0.0 };
                        *additive.entry(spec.name.clone()).or_insert(0.0) += count;
                    }
                    MetricKind::Combined => {
                        let entry = combined.entry(spec.name.clone()).or_default();
                        match value {
                            MetricValue::List(items) => entry.extend(items.iter().cloned()),
                            other => entry.push(other.clone()),
                        }
                    }
                }
            }
        }

        // Default-fill metrics never seen; a missing required metric ends the run
        for spec in self.schema.specs() {
            let seen = if spec.kind == MetricKind::Combined {
                combined.contains_key(&spec.name)
            } else {
                additive.contains_key(&spec.name)
            };

            if seen {
                continue;
            }

            if spec.required {
                tracing::warn!(
                    "Metric '{}' is required but not found in run '{}'; skipping this run",
                    spec.name,
                    run_id
                );
                return Ok(RunRecord::excluded(
                    run_id,
                    format!("missing required metric `{}`", spec.name),
                ));
            }

            let default = spec
                .default
                .clone()
                .unwrap_or(MetricValue::Number(f64::NAN));
            match spec.kind {
                MetricKind::Combined => {
                    combined.insert(spec.name.clone(), vec![default]);
                }
                _ => {
                    // Schema validation guarantees additive defaults are numeric
                    additive.insert(
                        spec.name.clone(),
                        default.as_number().unwrap_or(f64::NAN),
                    );
                }
            }
        }

        if let Some(reason) = self.exclusions.should_exclude(&additive) {
            tracing::warn!("Run '{}' excluded: {}", run_id, reason);
            return Ok(RunRecord {
                run_id: run_id.to_string(),
                additive,
                combined,
                excluded: true,
                exclusion_reason: Some(reason),
            });
        }

        Ok(RunRecord {
            run_id: run_id.to_string(),
            additive,
            combined,
            excluded: false,
            exclusion_reason: None,
        })
    }
}

/// @ai:intent Combined-metrics document written next to the additive table
#[derive(Debug, Clone, Serialize)]
pub struct CombinedReport {
    pub additive: Vec<BTreeMap<String, f64>>,
    pub append: BTreeMap<String, BTreeMap<String, Vec<MetricValue>>>,
    pub general: CollectionStats,
}

/// @ai:intent Everything a collection pass produces
#[derive(Debug, Clone)]
pub struct CollectionOutput {
    pub additive: MetricFrame,
    pub combined: CombinedReport,
    pub stats: CollectionStats,
    /// Excluded runs, kept for auditing
    pub excluded_runs: Vec<(String, String)>,
}

/// @ai:intent Collects every run under a work directory into batch tables
pub struct BatchCollector {
    aggregator: RunAggregator,
}

impl BatchCollector {
    /// @ai:intent Create a collector around a run aggregator
    /// @ai:effects pure
    pub fn new(aggregator: RunAggregator) -> Self {
        Self { aggregator }
    }

    /// @ai:intent Aggregate every run directory under `work_dir`
    ///
    /// Runs are visited in sorted name order; non-directory entries are
    /// skipped without counting. Invariant: `total_runs` equals
    /// `skipped_runs` plus the rows of the additive table.
    /// @ai:effects fs:read
    pub fn collect(&self, work_dir: &Path) -> Result<CollectionOutput> {
        let mut run_dirs = Vec::new();

        for entry in std::fs::read_dir(work_dir)? {
            let entry = entry?;
            let path = entry.path();

            if !path.is_dir() {
                tracing::debug!("Skipping non-directory item: {}", path.display());
                continue;
            }

            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            run_dirs.push((name.to_string(), path));
        }

        run_dirs.sort_by(|a, b| a.0.cmp(&b.0));

        let mut stats = CollectionStats::default();
        let mut surviving: Vec<RunRecord> = Vec::new();
        let mut excluded_runs = Vec::new();

        for (run_id, run_path) in &run_dirs {
            stats.total_runs += 1;

            let record = self.aggregator.aggregate_run(run_path, run_id)?;

            if record.excluded {
                stats.skipped_runs += 1;
                excluded_runs.push((
                    record.run_id,
                    record
                        .exclusion_reason
                        .unwrap_or_else(|| "unspecified".to_string()),
                ));
            } else {
                surviving.push(record);
            }
        }

        let additive = self.build_additive_frame(&surviving)?;

        let mut append = BTreeMap::new();
        let mut additive_rows = Vec::with_capacity(surviving.len());
        for record in &surviving {
            additive_rows.push(record.additive.clone());
            append.insert(record.run_id.clone(), record.combined.clone());
        }

        let combined = CombinedReport {
            additive: additive_rows,
            append,
            general: stats,
        };

        tracing::info!(
            "Collected {} runs ({} skipped)",
            stats.total_runs,
            stats.skipped_runs
        );

        Ok(CollectionOutput {
            additive,
            combined,
            stats,
            excluded_runs,
        })
    }

    /// @ai:intent One row per surviving run, additive columns in schema order
    /// @ai:effects pure
    fn build_additive_frame(&self, records: &[RunRecord]) -> Result<MetricFrame> {
        let names = self.aggregator.schema().additive_names();
        let mut frame = MetricFrame::new();

        for name in names {
            let values: Vec<f64> = records
                .iter()
                .map(|r| r.additive.get(name).copied().unwrap_or(f64::NAN))
                .collect();
            frame.push_column(name, values)?;
        }

        Ok(frame)
    }
}

/// @ai:intent Write additive_metrics.csv and combined_metrics.json
/// @ai:effects fs:write
pub fn write_outputs(output: &CollectionOutput, work_dir: &Path) -> Result<()> {
    let additive_path = work_dir.join("additive_metrics.csv");
    output.additive.write_csv(&additive_path)?;
    tracing::info!("Additive metrics saved to {}", additive_path.display());

    let combined_path = work_dir.join("combined_metrics.json");
    let json = serde_json::to_string_pretty(&output.combined)?;
    std::fs::write(&combined_path, json)?;
    tracing::info!("Combined metrics saved to {}", combined_path.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{MetricSpec, MetricKind};
    use tempfile::TempDir;

    fn schema() -> MetricSchema {
        MetricSchema::new(vec![
            MetricSpec {
                name: "tool_calls".to_string(),
                kind: MetricKind::Additive,
                default: None,
                required: true,
            },
            MetricSpec {
                name: "gave_up".to_string(),
                kind: MetricKind::AdditiveBool,
                default: Some(MetricValue::Number(0.0)),
                required: false,
            },
            MetricSpec {
                name: "models".to_string(),
                kind: MetricKind::Combined,
                default: Some(MetricValue::Text("unknown".to_string())),
                required: false,
            },
        ])
        .unwrap()
    }

    fn write_run(work_dir: &Path, run: &str, files: &[(&str, &str)]) {
        let run_dir = work_dir.join(run);
        std::fs::create_dir_all(&run_dir).unwrap();
        for (name, content) in files {
            std::fs::write(run_dir.join(name), content).unwrap();
        }
    }

    fn collector() -> BatchCollector {
        BatchCollector::new(RunAggregator::new(schema(), ExclusionEvaluator::empty()))
    }

    #[test]
    fn test_additive_metrics_sum_across_files() {
        let temp = TempDir::new().unwrap();
        write_run(
            temp.path(),
            "run_a",
            &[
                ("metrics_agent1.json", r#"{"tool_calls": 3, "gave_up": true}"#),
                ("metrics_agent2.json", r#"{"tool_calls": 2, "gave_up": false}"#),
            ],
        );

        let output = collector().collect(temp.path()).unwrap();
        assert_eq!(output.additive.column("tool_calls").unwrap(), &[5.0]);
        // true + false counts one file
        assert_eq!(output.additive.column("gave_up").unwrap(), &[1.0]);
    }

    #[test]
    fn test_boolean_metric_counts_true_files() {
        let temp = TempDir::new().unwrap();
        write_run(
            temp.path(),
            "run_a",
            &[
                ("metrics_1.json", r#"{"tool_calls": 1, "gave_up": true}"#),
                ("metrics_2.json", r#"{"tool_calls": 1, "gave_up": true}"#),
            ],
        );

        let output = collector().collect(temp.path()).unwrap();
        assert_eq!(output.additive.column("gave_up").unwrap(), &[2.0]);
    }

    #[test]
    fn test_missing_required_metric_excludes_run() {
        let temp = TempDir::new().unwrap();
        write_run(
            temp.path(),
            "run_a",
            &[("metrics_1.json", r#"{"gave_up": false}"#)],
        );

        let output = collector().collect(temp.path()).unwrap();
        assert_eq!(output.stats.total_runs, 1);
        assert_eq!(output.stats.skipped_runs, 1);
        assert_eq!(output.additive.n_rows(), 0);
        assert_eq!(
            output.excluded_runs[0].1,
            "missing required metric `tool_calls`"
        );
    }

    #[test]
    fn test_missing_optional_metric_takes_default() {
        let temp = TempDir::new().unwrap();
        write_run(
            temp.path(),
            "run_a",
            &[("metrics_1.json", r#"{"tool_calls": 4}"#)],
        );

        let output = collector().collect(temp.path()).unwrap();
        assert_eq!(output.additive.column("gave_up").unwrap(), &[0.0]);
        assert_eq!(
            output.combined.append["run_a"]["models"],
            vec![MetricValue::Text("unknown".to_string())]
        );
    }

    #[test]
    fn test_empty_run_is_excluded_and_counted() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("run_empty")).unwrap();
        write_run(
            temp.path(),
            "run_a",
            &[("metrics_1.json", r#"{"tool_calls": 4}"#)],
        );
        // A stray file at the top level is not a run
        std::fs::write(temp.path().join("notes.txt"), "x").unwrap();

        let output = collector().collect(temp.path()).unwrap();
        assert_eq!(output.stats.total_runs, 2);
        assert_eq!(output.stats.skipped_runs, 1);
        assert_eq!(output.excluded_runs[0].1, "no metric files found");
        // total == skipped + surviving rows
        assert_eq!(
            output.stats.total_runs,
            output.stats.skipped_runs + output.additive.n_rows()
        );
    }

    #[test]
    fn test_unparseable_file_is_skipped_not_fatal() {
        let temp = TempDir::new().unwrap();
        write_run(
            temp.path(),
            "run_a",
            &[
                ("metrics_bad.json", "not json"),
                ("metrics_good.json", r#"{"tool_calls": 7}"#),
            ],
        );

        let output = collector().collect(temp.path()).unwrap();
        assert_eq!(output.stats.skipped_runs, 0);
        assert_eq!(output.additive.column("tool_calls").unwrap(), &[7.0]);
    }

    #[test]
    fn test_exclusion_criterion_drops_but_counts_run() {
        let temp = TempDir::new().unwrap();
        write_run(
            temp.path(),
            "run_a",
            &[("metrics_1.json", r#"{"tool_calls": 100}"#)],
        );
        write_run(
            temp.path(),
            "run_b",
            &[("metrics_1.json", r#"{"tool_calls": 2}"#)],
        );

        let exclusions: Vec<crate::exclusion::ExclusionCriterion> = serde_json::from_str(
            r#"[{"metric": "tool_calls", "type": ">", "value": 50}]"#,
        )
        .unwrap();
        let collector = BatchCollector::new(RunAggregator::new(
            schema(),
            ExclusionEvaluator::new(exclusions),
        ));

        let output = collector.collect(temp.path()).unwrap();
        assert_eq!(output.stats.total_runs, 2);
        assert_eq!(output.stats.skipped_runs, 1);
        assert_eq!(output.additive.column("tool_calls").unwrap(), &[2.0]);
        assert!(output.excluded_runs[0].1.contains("exclusion criterion"));
    }

    #[test]
    fn test_combined_values_append_in_order() {
        let temp = TempDir::new().unwrap();
        write_run(
            temp.path(),
            "run_a",
            &[
                ("metrics_1.json", r#"{"tool_calls": 1, "models": ["a", "b"]}"#),
                ("metrics_2.json", r#"{"tool_calls": 1, "models": "c"}"#),
            ],
        );

        let output = collector().collect(temp.path()).unwrap();
        assert_eq!(
            output.combined.append["run_a"]["models"],
            vec![
                MetricValue::Text("a".to_string()),
                MetricValue::Text("b".to_string()),
                MetricValue::Text("c".to_string()),
            ]
        );
    }

    #[test]
    fn test_collection_is_idempotent() {
        let temp = TempDir::new().unwrap();
        write_run(
            temp.path(),
            "run_b",
            &[("metrics_1.json", r#"{"tool_calls": 2, "models": "m"}"#)],
        );
        write_run(
            temp.path(),
            "run_a",
            &[("metrics_1.json", r#"{"tool_calls": 1}"#)],
        );

        let collector = collector();
        let first = collector.collect(temp.path()).unwrap();
        write_outputs(&first, temp.path()).unwrap();
        let csv_first = std::fs::read(temp.path().join("additive_metrics.csv")).unwrap();
        let json_first = std::fs::read(temp.path().join("combined_metrics.json")).unwrap();

        let second = collector.collect(temp.path()).unwrap();
        write_outputs(&second, temp.path()).unwrap();
        let csv_second = std::fs::read(temp.path().join("additive_metrics.csv")).unwrap();
        let json_second = std::fs::read(temp.path().join("combined_metrics.json")).unwrap();

        assert_eq!(csv_first, csv_second);
        assert_eq!(json_first, json_second);
    }
}
