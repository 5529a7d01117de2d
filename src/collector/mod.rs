//! @ai:module:intent Schema-driven collection of per-run metric files
//! @ai:module:layer application
//! @ai:module:public_api RunAggregator, BatchCollector, RunRecord, CollectionStats

pub mod aggregator;
pub mod charts;
pub mod reader;

pub use aggregator::{
    write_outputs, BatchCollector, CollectionOutput, CollectionStats, CombinedReport,
    RunAggregator, RunRecord,
};
pub use charts::{correlation_chart, histogram_charts};
pub use reader::{find_metric_files, read_metric_file};
