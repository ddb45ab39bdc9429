//! Core data types for the groundwater head flagging service.
//!
//! This module defines the shared domain model imported by all other modules.
//! It contains no I/O. The only logic here is the ordering check performed
//! when a series is constructed, since every consumer relies on it.

use chrono::{DateTime, Utc};
use serde::Serialize;

// ---------------------------------------------------------------------------
// Column names
// ---------------------------------------------------------------------------

/// Groundwater head, in meters.
pub const COL_HEAD: &str = "head";

/// First difference of head, value[t] - value[t-1], in meters.
pub const COL_HEAD_T1: &str = "head_t1";

/// Auxiliary display columns, in millimeters. Never required.
pub const COL_PRECIPITATION: &str = "Precipitation";
pub const COL_EVAPOTRANSPIRATION: &str = "Evapotranspiration";
pub const COL_RECHARGE: &str = "recharge";

// ---------------------------------------------------------------------------
// Series types
// ---------------------------------------------------------------------------

/// A single timestamped measurement. `value` is `None` for a missing
/// reading; a `NaN` value is treated the same way.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Observation {
    pub timestamp: DateTime<Utc>,
    pub value: Option<f64>,
}

impl Observation {
    pub fn new(timestamp: DateTime<Utc>, value: Option<f64>) -> Self {
        Self { timestamp, value }
    }

    /// The value, if one is present and not `NaN`.
    pub fn present(&self) -> Option<f64> {
        self.value.filter(|v| !v.is_nan())
    }
}

/// Checks that timestamps are strictly increasing. Returns the index of the
/// first offending observation on failure.
fn check_order(points: &[Observation]) -> Result<(), HeadError> {
    match points
        .windows(2)
        .position(|pair| pair[1].timestamp <= pair[0].timestamp)
    {
        Some(i) => Err(HeadError::UnorderedTimestamps { index: i + 1 }),
        None => Ok(()),
    }
}

/// Groundwater head measurements, ordered by timestamp.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HeadSeries {
    points: Vec<Observation>,
}

impl HeadSeries {
    /// Builds a series, rejecting timestamps that are not strictly increasing.
    pub fn new(points: Vec<Observation>) -> Result<Self, HeadError> {
        check_order(&points)?;
        Ok(Self { points })
    }

    pub fn points(&self) -> &[Observation] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Index of the first observation with a present value.
    pub fn first_valid_index(&self) -> Option<usize> {
        self.points.iter().position(|p| p.present().is_some())
    }

    /// Index of the last observation with a present value.
    pub fn last_valid_index(&self) -> Option<usize> {
        self.points.iter().rposition(|p| p.present().is_some())
    }

    /// The closed slice between the first and last present values, or
    /// `EmptySeriesError` when no value is present at all.
    pub fn trimmed(&self) -> Result<&[Observation], EmptySeriesError> {
        match (self.first_valid_index(), self.last_valid_index()) {
            (Some(first), Some(last)) => Ok(&self.points[first..=last]),
            _ => Err(EmptySeriesError),
        }
    }

    /// Present values only, in series order.
    pub fn present_values(&self) -> Vec<f64> {
        self.points.iter().filter_map(Observation::present).collect()
    }
}

/// First-difference series (the `head_t1` column). Shares the head series'
/// timestamp domain but may have its own gaps.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DifferenceSeries {
    points: Vec<Observation>,
}

impl DifferenceSeries {
    pub fn new(points: Vec<Observation>) -> Result<Self, HeadError> {
        check_order(&points)?;
        Ok(Self { points })
    }

    /// Recomputes value[t] - value[t-1] from a head series. The first entry
    /// and any entry touching an absent value is absent.
    pub fn from_head(head: &HeadSeries) -> Self {
        let mut points = Vec::with_capacity(head.len());
        let mut previous: Option<f64> = None;
        for obs in head.points() {
            let current = obs.present();
            let delta = match (previous, current) {
                (Some(prev), Some(cur)) => Some(cur - prev),
                _ => None,
            };
            points.push(Observation::new(obs.timestamp, delta));
            previous = current;
        }
        Self { points }
    }

    pub fn points(&self) -> &[Observation] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Flag types
// ---------------------------------------------------------------------------

/// IQR outlier bounds computed over the trimmed head values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OutlierBounds {
    pub q1: f64,
    pub q3: f64,
    pub iqr: f64,
    pub multiplier: f64,
    pub lower: f64,
    pub upper: f64,
}

impl OutlierBounds {
    pub fn from_quartiles(q1: f64, q3: f64, multiplier: f64) -> Self {
        let iqr = q3 - q1;
        Self {
            q1,
            q3,
            iqr,
            multiplier,
            lower: q1 - multiplier * iqr,
            upper: q3 + multiplier * iqr,
        }
    }

    /// Strictly outside the bounds. A value equal to a bound is not an outlier.
    pub fn is_outside(&self, value: f64) -> bool {
        value < self.lower || value > self.upper
    }
}

/// Flags for a single timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FlagRow {
    pub timestamp: DateTime<Utc>,
    /// Head value at this timestamp inside the trimmed domain, if present.
    pub head: Option<f64>,
    pub is_outlier: bool,
    pub is_jump: bool,
    pub is_drop: bool,
}

impl FlagRow {
    pub fn unflagged(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            head: None,
            is_outlier: false,
            is_jump: false,
            is_drop: false,
        }
    }

    pub fn any(&self) -> bool {
        self.is_outlier || self.is_jump || self.is_drop
    }
}

/// Number of rows carrying each flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct FlagCounts {
    pub outliers: usize,
    pub jumps: usize,
    pub drops: usize,
}

/// Flags over every timestamp in H ∪ D, sorted by timestamp.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlagSet {
    /// First and last timestamps with a present head value.
    pub domain: (DateTime<Utc>, DateTime<Utc>),
    pub bounds: OutlierBounds,
    pub rows: Vec<FlagRow>,
}

impl FlagSet {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, timestamp: DateTime<Utc>) -> Option<&FlagRow> {
        self.rows
            .binary_search_by(|row| row.timestamp.cmp(&timestamp))
            .ok()
            .map(|i| &self.rows[i])
    }

    pub fn outliers(&self) -> impl Iterator<Item = &FlagRow> {
        self.rows.iter().filter(|r| r.is_outlier)
    }

    pub fn jumps(&self) -> impl Iterator<Item = &FlagRow> {
        self.rows.iter().filter(|r| r.is_jump)
    }

    pub fn drops(&self) -> impl Iterator<Item = &FlagRow> {
        self.rows.iter().filter(|r| r.is_drop)
    }

    pub fn counts(&self) -> FlagCounts {
        FlagCounts {
            outliers: self.outliers().count(),
            jumps: self.jumps().count(),
            drops: self.drops().count(),
        }
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// The head series has no present value anywhere, so there is no domain to
/// analyze.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmptySeriesError;

impl std::fmt::Display for EmptySeriesError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "No valid head data")
    }
}

impl std::error::Error for EmptySeriesError {}

/// Errors that can arise when loading, configuring or analyzing a head table.
#[derive(Debug, PartialEq)]
pub enum HeadError {
    /// No head value is present anywhere in the series.
    EmptySeries,
    /// A required column is absent from the table header.
    MissingColumn(String),
    /// A row or cell could not be parsed.
    Parse { line: usize, message: String },
    /// Timestamps are not strictly increasing at this row index.
    UnorderedTimestamps { index: usize },
    /// A configuration value is out of range.
    InvalidConfig(String),
    /// The input or config file could not be read.
    Io(String),
    /// A report could not be serialized.
    Serialize(String),
}

impl std::fmt::Display for HeadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HeadError::EmptySeries => write!(f, "{}", EmptySeriesError),
            HeadError::MissingColumn(name) => write!(f, "Missing required column: {}", name),
            HeadError::Parse { line, message } => {
                write!(f, "Parse error on line {}: {}", line, message)
            }
            HeadError::UnorderedTimestamps { index } => {
                write!(f, "Timestamps not strictly increasing at row {}", index)
            }
            HeadError::InvalidConfig(msg) => write!(f, "Invalid config: {}", msg),
            HeadError::Io(msg) => write!(f, "I/O error: {}", msg),
            HeadError::Serialize(msg) => write!(f, "Serialization error: {}", msg),
        }
    }
}

impl std::error::Error for HeadError {}

impl From<EmptySeriesError> for HeadError {
    fn from(_: EmptySeriesError) -> Self {
        HeadError::EmptySeries
    }
}

impl From<std::io::Error> for HeadError {
    fn from(err: std::io::Error) -> Self {
        HeadError::Io(err.to_string())
    }
}
