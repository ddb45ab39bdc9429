//! Groundwater head anomaly flagging.
//!
//! Loads a head table, flags IQR outliers and significant jumps/drops in the
//! head record, summarizes the head distribution, and emits a report for a
//! chart renderer.

pub mod analysis;
pub mod config;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod report;

pub use analysis::flags::{flag_head_series, HeadAnomalyDetector};
pub use config::{DetectorConfig, DistributionConfig, HeadmonConfig};
pub use model::{
    DifferenceSeries, EmptySeriesError, FlagRow, FlagSet, HeadError, HeadSeries, Observation,
    OutlierBounds,
};
