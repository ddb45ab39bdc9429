//! Head table loader
//!
//! Parses a comma-separated table with a header row into typed series. The
//! table carries a timestamp column, the required `head` and `head_t1`
//! columns, and optionally `Precipitation`, `Evapotranspiration` and
//! `recharge`. Optional columns that are missing are simply not present.
//!
//! Example:
//!
//! ```text
//! date,head,head_t1,Precipitation,Evapotranspiration,recharge
//! 2020-01-01,12.41,,0.0,0.4,
//! 2020-01-02,12.44,0.03,3.2,0.3,1.1
//! ```

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;
use std::fs;
use std::path::Path;

use crate::config::IngestConfig;
use crate::logging;
use crate::model::{
    DifferenceSeries, HeadError, HeadSeries, Observation, COL_EVAPOTRANSPIRATION, COL_HEAD,
    COL_HEAD_T1, COL_PRECIPITATION, COL_RECHARGE,
};

/// Header names recognized as the timestamp column. The first column is used
/// when none match.
const TIMESTAMP_COLUMNS: &[&str] = &["timestamp", "date", "datetime", "time"];

/// Cell spellings treated as a missing value.
const ABSENT_MARKERS: &[&str] = &["", "null", "nan", "na", "none"];

const NAIVE_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

// ============================================================================
// Table Types
// ============================================================================

/// One row of the table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeadRow {
    pub timestamp: DateTime<Utc>,
    pub head: Option<f64>,
    pub head_t1: Option<f64>,
    pub precipitation: Option<f64>,
    pub evapotranspiration: Option<f64>,
    pub recharge: Option<f64>,
}

/// Which optional columns the source table carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct AuxiliaryColumns {
    pub precipitation: bool,
    pub evapotranspiration: bool,
    pub recharge: bool,
}

/// A loaded table, rows in strictly increasing timestamp order.
#[derive(Debug, Clone, PartialEq)]
pub struct HeadTable {
    rows: Vec<HeadRow>,
    auxiliary: AuxiliaryColumns,
    /// `head_t1` was recomputed from `head` rather than read.
    derived_differences: bool,
}

impl HeadTable {
    pub fn rows(&self) -> &[HeadRow] {
        &self.rows
    }

    pub fn auxiliary(&self) -> AuxiliaryColumns {
        self.auxiliary
    }

    pub fn derived_differences(&self) -> bool {
        self.derived_differences
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    // Row order is checked in `parse_table`, so the series constructors
    // cannot fail here.
    pub fn head_series(&self) -> HeadSeries {
        HeadSeries::new(
            self.rows
                .iter()
                .map(|r| Observation::new(r.timestamp, r.head))
                .collect(),
        )
        .unwrap_or_default()
    }

    /// The `head_t1` column as read (or derived at load time).
    pub fn difference_series(&self) -> DifferenceSeries {
        DifferenceSeries::new(
            self.rows
                .iter()
                .map(|r| Observation::new(r.timestamp, r.head_t1))
                .collect(),
        )
        .unwrap_or_default()
    }

    /// Recomputes value[t] - value[t-1] from the head column.
    pub fn derive_differences(&self) -> DifferenceSeries {
        DifferenceSeries::from_head(&self.head_series())
    }

    /// Rows between the first and last present head values, inclusive.
    pub fn clip_to_head_domain(&self) -> Result<&[HeadRow], HeadError> {
        let present = |r: &HeadRow| r.head.is_some_and(|v| !v.is_nan());
        match (self.rows.iter().position(present), self.rows.iter().rposition(present)) {
            (Some(first), Some(last)) => Ok(&self.rows[first..=last]),
            _ => Err(HeadError::EmptySeries),
        }
    }
}

// ============================================================================
// Loading
// ============================================================================

/// Reads and parses a table from disk.
pub fn load_table(path: impl AsRef<Path>, config: &IngestConfig) -> Result<HeadTable, HeadError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)
        .map_err(|e| HeadError::Io(format!("{}: {}", path.display(), e)))?;
    let table = parse_table(&text, config)?;

    let absent_head = table.rows.iter().filter(|r| r.head.is_none()).count();
    let absent_deltas = table.rows.iter().filter(|r| r.head_t1.is_none()).count();
    logging::log_ingest_summary(&path.display().to_string(), table.len(), absent_head, absent_deltas);
    if table.derived_differences {
        logging::info(
            logging::Component::Ingest,
            Some(&path.display().to_string()),
            "head_t1 column missing; derived from head",
        );
    }
    Ok(table)
}

/// Parses CSV text into a table.
pub fn parse_table(csv: &str, config: &IngestConfig) -> Result<HeadTable, HeadError> {
    let mut lines = csv
        .lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim_end_matches('\r')))
        .filter(|(_, line)| !line.trim().is_empty());

    let (_, header_line) = lines
        .next()
        .ok_or_else(|| HeadError::MissingColumn(COL_HEAD.to_string()))?;
    let header: Vec<String> = header_line.split(',').map(|h| h.trim().to_string()).collect();

    let find = |name: &str| header.iter().position(|h| h.eq_ignore_ascii_case(name));

    let ts_col = TIMESTAMP_COLUMNS.iter().find_map(|name| find(*name)).unwrap_or(0);
    let head_col = find(COL_HEAD).ok_or_else(|| HeadError::MissingColumn(COL_HEAD.to_string()))?;
    let head_t1_col = find(COL_HEAD_T1);
    if head_t1_col.is_none() && !config.derive_missing_differences {
        return Err(HeadError::MissingColumn(COL_HEAD_T1.to_string()));
    }
    let precip_col = find(COL_PRECIPITATION);
    let evap_col = find(COL_EVAPOTRANSPIRATION);
    let recharge_col = find(COL_RECHARGE);

    let mut rows: Vec<HeadRow> = Vec::new();
    for (line_no, line) in lines {
        let fields: Vec<&str> = line.split(',').collect();
        if fields.len() < header.len() {
            return Err(HeadError::Parse {
                line: line_no,
                message: format!("expected {} fields, found {}", header.len(), fields.len()),
            });
        }

        let timestamp = parse_timestamp(fields[ts_col]).ok_or_else(|| HeadError::Parse {
            line: line_no,
            message: format!("unrecognized timestamp '{}'", fields[ts_col].trim()),
        })?;

        // Helper for optional columns; a missing column yields None.
        let cell = |col: Option<usize>, name: &str| -> Result<Option<f64>, HeadError> {
            match col {
                Some(i) => parse_number(fields[i]).map_err(|message| HeadError::Parse {
                    line: line_no,
                    message: format!("{}: {}", name, message),
                }),
                None => Ok(None),
            }
        };

        rows.push(HeadRow {
            timestamp,
            head: cell(Some(head_col), COL_HEAD)?,
            head_t1: cell(head_t1_col, COL_HEAD_T1)?,
            precipitation: cell(precip_col, COL_PRECIPITATION)?,
            evapotranspiration: cell(evap_col, COL_EVAPOTRANSPIRATION)?,
            recharge: cell(recharge_col, COL_RECHARGE)?,
        });
    }

    if let Some(i) = rows
        .windows(2)
        .position(|pair| pair[1].timestamp <= pair[0].timestamp)
    {
        return Err(HeadError::UnorderedTimestamps { index: i + 1 });
    }

    let derived_differences = head_t1_col.is_none();
    if derived_differences {
        let mut previous: Option<f64> = None;
        for row in rows.iter_mut() {
            let current = row.head.filter(|v| !v.is_nan());
            row.head_t1 = match (previous, current) {
                (Some(prev), Some(cur)) => Some(cur - prev),
                _ => None,
            };
            previous = current;
        }
    }

    Ok(HeadTable {
        rows,
        auxiliary: AuxiliaryColumns {
            precipitation: precip_col.is_some(),
            evapotranspiration: evap_col.is_some(),
            recharge: recharge_col.is_some(),
        },
        derived_differences,
    })
}

/// Parses a numeric cell. Missing-value markers yield `Ok(None)`.
fn parse_number(raw: &str) -> Result<Option<f64>, String> {
    let s = raw.trim();
    if ABSENT_MARKERS.iter().any(|m| s.eq_ignore_ascii_case(m)) {
        return Ok(None);
    }
    s.parse::<f64>()
        .map(Some)
        .map_err(|_| format!("not a number: '{}'", s))
}

/// Accepts RFC 3339 or a naive date/datetime interpreted as UTC.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(DateTime::from_naive_utc_and_offset(dt, Utc));
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| DateTime::from_naive_utc_and_offset(dt, Utc))
}

// ============================================================================
// Tests
// ============================================================================
