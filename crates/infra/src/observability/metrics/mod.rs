//! Metrics collection modules

pub mod sync;

pub use sync::{
    ApiRequestStats, ApiSeries, ApiStatusClass, PassStatus, SyncMetrics, SyncMetricsSnapshot,
};
