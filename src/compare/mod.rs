//! @ai:module:intent Batch comparison: summary tables and scatter plots
//! @ai:module:layer application
//! @ai:module:public_api BatchComparator, BatchStats, scatter_charts
//! @ai:module:stateless true

pub mod scatter;
pub mod stats;

pub use scatter::scatter_charts;
pub use stats::{BatchComparator, BatchStats};
