//! @ai:module:intent Configuration structs for the metrics pipeline
//! @ai:module:layer infrastructure
//! @ai:module:public_api PipelineConfig, ScatterConfig, ScatterParams, RatioDef, MarkerDef
//! @ai:module:stateless true

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// @ai:intent Main configuration for the pipeline
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub collect: CollectConfig,
    #[serde(default)]
    pub compare: CompareConfig,
}

/// @ai:intent Collection configuration: which files qualify per run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectConfig {
    /// Files whose name starts with this prefix are metric files
    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,
    /// Strict mode additionally requires the .json suffix
    #[serde(default)]
    pub strict: bool,
    /// Emit histogram and correlation plots over the surviving population
    #[serde(default)]
    pub histograms: bool,
}

/// @ai:intent Comparison configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompareConfig {
    /// Label column written to per-metric summary tables
    #[serde(default = "default_key_column")]
    pub key_column: String,
    /// Skip metrics that have no advanced-parameter group
    #[serde(default)]
    pub skip_unconfigured: bool,
}

impl Default for CollectConfig {
    fn default() -> Self {
        Self {
            file_prefix: default_file_prefix(),
            strict: false,
            histograms: false,
        }
    }
}

impl Default for CompareConfig {
    fn default() -> Self {
        Self {
            key_column: default_key_column(),
            skip_unconfigured: false,
        }
    }
}

fn default_file_prefix() -> String {
    "metrics_".to_string()
}

fn default_key_column() -> String {
    "category".to_string()
}

impl PipelineConfig {
    /// @ai:intent Load configuration from a TOML file
    /// @ai:pre path exists and is readable
    /// @ai:effects fs:read
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| Error::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|e| Error::schema(format!("invalid config: {}", e)))
    }

    /// @ai:intent Save configuration to a TOML file
    /// @ai:effects fs:write
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::schema(format!("cannot serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// @ai:intent A numeric bound that may be the keyword "inf"
///
/// The keyword resolves directionally: in a minimum position it means
/// negative infinity, in a maximum position positive infinity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Bound {
    Number(f64),
    Keyword(BoundKeyword),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoundKeyword {
    #[serde(rename = "inf")]
    Inf,
    #[serde(rename = "-inf")]
    NegInf,
}

impl Bound {
    /// @ai:intent Resolve as a minimum bound
    /// @ai:effects pure
    pub fn resolve_min(&self) -> f64 {
        match self {
            Bound::Number(v) => *v,
            Bound::Keyword(BoundKeyword::Inf) | Bound::Keyword(BoundKeyword::NegInf) => {
                f64::NEG_INFINITY
            }
        }
    }

    /// @ai:intent Resolve as a maximum bound
    /// @ai:effects pure
    pub fn resolve_max(&self) -> f64 {
        match self {
            Bound::Number(v) => *v,
            Bound::Keyword(BoundKeyword::Inf) => f64::INFINITY,
            Bound::Keyword(BoundKeyword::NegInf) => f64::NEG_INFINITY,
        }
    }
}

fn default_min_bound() -> Bound {
    Bound::Number(f64::NEG_INFINITY)
}

fn default_max_bound() -> Bound {
    Bound::Number(f64::INFINITY)
}

/// @ai:intent Global settings for scatter rendering
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralSettings {
    #[serde(default = "default_font_size")]
    pub font_size: f64,
    #[serde(default = "default_fig_size")]
    pub fig_size: [f64; 2],
    #[serde(default = "default_marker_size")]
    pub marker_size: f64,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            font_size: default_font_size(),
            fig_size: default_fig_size(),
            marker_size: default_marker_size(),
        }
    }
}

fn default_font_size() -> f64 {
    10.0
}

fn default_fig_size() -> [f64; 2] {
    [3.0, 3.0]
}

fn default_marker_size() -> f64 {
    16.0
}

/// @ai:intent A ratio of two value-range populations, reported as a percentage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatioDef {
    pub title: String,
    pub n_min: Bound,
    pub n_max: Bound,
    pub p_min: Bound,
    pub p_max: Bound,
    /// Report in the summary table only, without drawing on the plot
    #[serde(default)]
    pub only_table: bool,
}

impl RatioDef {
    /// @ai:intent Resolve and validate the two closed ranges
    /// @ai:effects pure
    pub fn ranges(&self) -> Result<((f64, f64), (f64, f64))> {
        let n = (self.n_min.resolve_min(), self.n_max.resolve_max());
        let p = (self.p_min.resolve_min(), self.p_max.resolve_max());

        if n.0 > n.1 {
            return Err(Error::schema(format!(
                "ratio '{}': n-zone minimum cannot be greater than maximum",
                self.title
            )));
        }
        if p.0 > p.1 {
            return Err(Error::schema(format!(
                "ratio '{}': p-zone minimum cannot be greater than maximum",
                self.title
            )));
        }

        Ok((n, p))
    }
}

/// @ai:intent A horizontal reference line drawn on the scatter plot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkerDef {
    pub y_pos: f64,
    pub style: Option<String>,
    pub color: Option<String>,
    pub alpha: Option<f64>,
    pub thickness: Option<f64>,
    pub text: Option<String>,
}

/// @ai:intent Per-metric parameters for comparison and rendering
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScatterParams {
    pub unit: Option<String>,
    #[serde(default)]
    pub set_title: bool,
    /// Values outside [valid_values_min, valid_values_max] are dropped
    /// before statistics and ratio computation
    pub valid_values_min: Option<Bound>,
    pub valid_values_max: Option<Bound>,
    pub plot_min: Option<f64>,
    pub plot_max: Option<f64>,
    pub y_mult: Option<f64>,
    #[serde(rename = "y-scale")]
    pub y_scale: Option<String>,
    #[serde(default)]
    pub display_ratios: Vec<RatioDef>,
    #[serde(default)]
    pub markers: Vec<MarkerDef>,
}

impl ScatterParams {
    /// @ai:intent The value filter applied before statistics
    /// @ai:effects pure
    pub fn valid_bounds(&self) -> (f64, f64) {
        let min = self
            .valid_values_min
            .unwrap_or_else(default_min_bound)
            .resolve_min();
        let max = self
            .valid_values_max
            .unwrap_or_else(default_max_bound)
            .resolve_max();
        (min, max)
    }

    /// @ai:intent Plot-only y multiplier; statistics are never scaled
    /// @ai:effects pure
    pub fn y_multiplier(&self) -> f64 {
        self.y_mult.unwrap_or(1.0)
    }
}

/// @ai:intent One group of metrics sharing scatter parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricGroup {
    pub metrics: Vec<String>,
    pub parameters: ScatterParams,
}

/// @ai:intent The advanced plotting configuration document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScatterConfig {
    #[serde(default)]
    pub general_settings: Option<GeneralSettings>,
    #[serde(default)]
    pub list: Vec<MetricGroup>,
}

impl ScatterConfig {
    /// @ai:intent Load the JSON configuration document
    /// @ai:effects fs:read
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| Error::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&content)?;

        // Fail early on inverted ratio ranges
        for group in &config.list {
            for ratio in &group.parameters.display_ratios {
                ratio.ranges()?;
            }
        }

        Ok(config)
    }

    /// @ai:intent Parameters for a metric, from the first group naming it
    /// @ai:effects pure
    pub fn params_for(&self, metric: &str) -> Option<&ScatterParams> {
        self.list
            .iter()
            .find(|group| group.metrics.iter().any(|m| m == metric))
            .map(|group| &group.parameters)
    }
}
