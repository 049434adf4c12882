//! `sensor_core`: synthetic sensor readings and deduplicated alerts.
//!
//! No network IO. All randomness via the passed-in Rng, all persistence via
//! the passed-in [`Store`].

mod alert;
mod cycle;
mod memory;
pub mod metrics;
mod reading;
pub mod store;
mod types;

#[cfg(any(test, feature = "test-support"))]
pub mod test_fixtures;

pub use alert::{build_alert, capitalize, maybe_create_alert};
pub use cycle::{run_cycle, AlertCreated, AlertFailure, BandCounts, CycleReport, SkippedSensor};
pub use memory::MemoryStore;
pub use metrics::{compute_metrics, CycleMetrics, MetricsFileWriter};
pub use reading::{
    generate_reading, round_to_cents, Side, ThresholdError, ThresholdRange,
    DEFAULT_THRESHOLD_MAX, DEFAULT_THRESHOLD_MIN,
};
pub use store::{Collection, Filter, Record, Store, StoreError};
pub use types::*;
