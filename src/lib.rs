//! @ai:module:intent Run metrics pipeline library
//! @ai:module:layer application
//! @ai:module:public_api align, collector, compare, config, derive, error, exclusion, schema, table, value

pub mod align;
pub mod collector;
pub mod compare;
pub mod config;
pub mod derive;
pub mod error;
pub mod exclusion;
pub mod schema;
pub mod table;
pub mod value;

pub use align::TableAligner;
pub use collector::{BatchCollector, CollectionOutput, CollectionStats, RunAggregator, RunRecord};
pub use compare::{scatter_charts, BatchComparator, BatchStats};
pub use config::{PipelineConfig, ScatterConfig};
pub use derive::{DerivationEngine, DerivedSpec};
pub use error::{Error, Result};
pub use exclusion::{ExclusionCriterion, ExclusionEvaluator};
pub use schema::{MetricKind, MetricSchema, MetricSpec};
pub use table::{MetricFrame, Table};
pub use value::MetricValue;
