//! Serializable output for the downstream chart renderer.
//!
//! A report bundles both views of a head table: the flagged time series
//! (head plus auxiliary bars over the trimmed domain, and the flagged rows)
//! and the distribution summary.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::analysis::distribution::{self, DistributionSummary};
use crate::analysis::flags::HeadAnomalyDetector;
use crate::config::HeadmonConfig;
use crate::ingest::table::{AuxiliaryColumns, HeadRow, HeadTable};
use crate::model::{FlagCounts, FlagRow, HeadError, OutlierBounds};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlaggedTimeseriesReport {
    pub domain_start: DateTime<Utc>,
    pub domain_end: DateTime<Utc>,
    /// Optional columns present in the source table.
    pub auxiliary: AuxiliaryColumns,
    /// Table rows clipped to the head domain.
    pub series: Vec<HeadRow>,
    pub bounds: OutlierBounds,
    pub counts: FlagCounts,
    /// Rows carrying at least one flag.
    pub markers: Vec<FlagRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeadReport {
    pub generated_at: DateTime<Utc>,
    pub source: String,
    pub derived_differences: bool,
    pub flagged: FlaggedTimeseriesReport,
    pub distribution: DistributionSummary,
}

/// Builds the full report for a loaded table.
///
/// An empty head column surfaces as `HeadError::EmptySeries`.
pub fn build_report(
    table: &HeadTable,
    config: &HeadmonConfig,
    source: &str,
    generated_at: DateTime<Utc>,
) -> Result<HeadReport, HeadError> {
    let head = table.head_series();
    let differences = table.difference_series();

    let flags = HeadAnomalyDetector::new(config.detector.clone()).detect(&head, &differences)?;
    let distribution = distribution::summarize(&head, &config.distribution)?;
    let series = table.clip_to_head_domain()?.to_vec();

    Ok(HeadReport {
        generated_at,
        source: source.to_string(),
        derived_differences: table.derived_differences(),
        flagged: FlaggedTimeseriesReport {
            domain_start: flags.domain.0,
            domain_end: flags.domain.1,
            auxiliary: table.auxiliary(),
            series,
            bounds: flags.bounds,
            counts: flags.counts(),
            markers: flags.rows.iter().filter(|r| r.any()).copied().collect(),
        },
        distribution,
    })
}

/// Pretty-printed JSON.
pub fn to_json(report: &HeadReport) -> Result<String, HeadError> {
    serde_json::to_string_pretty(report).map_err(|e| HeadError::Serialize(e.to_string()))
}
