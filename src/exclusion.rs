//! @ai:module:intent Run exclusion criteria and their evaluation
//! @ai:module:layer domain
//! @ai:module:public_api Comparator, ExclusionCriterion, ExclusionEvaluator
//! @ai:module:stateless true

use crate::error::{Error, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

/// @ai:intent Comparison applied to an aggregated metric value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum Comparator {
    #[serde(rename = ">")]
    Greater,
    #[serde(rename = "==")]
    Equal,
    #[serde(rename = "<")]
    Less,
}

impl Comparator {
    /// @ai:intent Apply the comparison; `==` is exact, `<`/`>` are strict
    /// @ai:effects pure
    pub fn holds(&self, value: f64, threshold: f64) -> bool {
        match self {
            Comparator::Greater => value > threshold,
            Comparator::Equal => value == threshold,
            Comparator::Less => value < threshold,
        }
    }

    /// @ai:intent Spelling used in exclusion files and reasons
    /// @ai:effects pure
    pub fn as_str(&self) -> &'static str {
        match self {
            Comparator::Greater => ">",
            Comparator::Equal => "==",
            Comparator::Less => "<",
        }
    }
}

/// @ai:intent One exclusion rule: drop the run if the comparison holds
#[derive(Debug, Clone, Deserialize)]
pub struct ExclusionCriterion {
    pub metric: String,
    #[serde(rename = "type")]
    pub comparator: Comparator,
    pub value: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ExclusionFile {
    #[serde(default)]
    list: Vec<ExclusionCriterion>,
}

/// @ai:intent Decides whether a run's aggregate triggers any exclusion rule
///
/// Criteria combine with logical OR. A criterion referencing a metric absent
/// from the aggregate never triggers.
#[derive(Debug, Clone, Default)]
pub struct ExclusionEvaluator {
    criteria: Vec<ExclusionCriterion>,
}

impl ExclusionEvaluator {
    /// @ai:intent Evaluator with no criteria; excludes nothing
    /// @ai:effects pure
    pub fn empty() -> Self {
        Self::default()
    }

    /// @ai:intent Build from a criterion list
    /// @ai:effects pure
    pub fn new(criteria: Vec<ExclusionCriterion>) -> Self {
        Self { criteria }
    }

    /// @ai:intent Load criteria from a JSON file (`{"list": [...]}`)
    /// @ai:effects fs:read
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| Error::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        let file: ExclusionFile = serde_json::from_str(&content)?;
        Ok(Self::new(file.list))
    }

    /// @ai:intent The loaded criteria
    /// @ai:effects pure
    pub fn criteria(&self) -> &[ExclusionCriterion] {
        &self.criteria
    }

    /// @ai:intent Reason of the first matching criterion, if any
    /// @ai:effects pure
    pub fn should_exclude(&self, aggregate: &BTreeMap<String, f64>) -> Option<String> {
        for criterion in &self.criteria {
            let Some(&value) = aggregate.get(&criterion.metric) else {
                tracing::debug!(
                    "exclusion metric '{}' not present in run aggregate",
                    criterion.metric
                );
                continue;
            };

            if criterion.comparator.holds(value, criterion.value) {
                return Some(format!(
                    "exclusion criterion met for {}: {} {} {}",
                    criterion.metric,
                    value,
                    criterion.comparator.as_str(),
                    criterion.value
                ));
            }
        }
        None
    }
}
