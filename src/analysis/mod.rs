//! Analysis over a loaded head table.
//!
//! Everything here is a pure function of its inputs. Rendering of the
//! results is left to whatever consumes the report.
//!
//! Submodules:
//! - `quantile`: linear-interpolation sample quantiles.
//! - `flags`: outlier, jump and drop flags on the head record.
//! - `distribution`: histogram and box-plot statistics.

pub mod distribution;
pub mod flags;
pub mod quantile;

pub use distribution::{summarize, DistributionSummary};
pub use flags::{flag_head_series, HeadAnomalyDetector};
