//! Statistics behind the head distribution view: a horizontal box plot over a
//! histogram of every present head value.

use serde::Serialize;

use crate::analysis::quantile;
use crate::config::DistributionConfig;
use crate::logging::{self, Component};
use crate::model::{EmptySeriesError, HeadSeries};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HistogramBin {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
}

/// Box-plot statistics. Whiskers reach the most extreme values still inside
/// the fences.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoxStats {
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub iqr: f64,
    pub lower_fence: f64,
    pub upper_fence: f64,
    pub lower_whisker: f64,
    pub upper_whisker: f64,
    /// Values strictly outside the fences, in series order.
    pub outliers: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistributionSummary {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub box_stats: BoxStats,
    pub histogram: Vec<HistogramBin>,
}

/// Summarizes the present head values.
pub fn summarize(
    head: &HeadSeries,
    config: &DistributionConfig,
) -> Result<DistributionSummary, EmptySeriesError> {
    let summary = summarize_values(&head.present_values(), config)?;
    logging::debug(
        Component::Distribution,
        None,
        &format!(
            "{} head values, {} box-plot outliers, {} bins",
            summary.count,
            summary.box_stats.outliers.len(),
            summary.histogram.len()
        ),
    );
    Ok(summary)
}

/// Summarizes a sample of present values.
pub fn summarize_values(
    values: &[f64],
    config: &DistributionConfig,
) -> Result<DistributionSummary, EmptySeriesError> {
    let sorted = quantile::sorted(values);
    let (min, max) = match (sorted.first(), sorted.last()) {
        (Some(&min), Some(&max)) => (min, max),
        _ => return Err(EmptySeriesError),
    };
    let mean = values.iter().sum::<f64>() / values.len() as f64;

    Ok(DistributionSummary {
        count: values.len(),
        min,
        max,
        mean,
        box_stats: box_stats(values, &sorted, config.box_whisker_multiplier)?,
        histogram: histogram(values, min, max, config.histogram_bins),
    })
}

fn box_stats(values: &[f64], sorted: &[f64], k: f64) -> Result<BoxStats, EmptySeriesError> {
    let q1 = quantile::quantile_sorted(sorted, 0.25).ok_or(EmptySeriesError)?;
    let median = quantile::quantile_sorted(sorted, 0.5).ok_or(EmptySeriesError)?;
    let q3 = quantile::quantile_sorted(sorted, 0.75).ok_or(EmptySeriesError)?;
    let iqr = q3 - q1;
    let lower_fence = q1 - k * iqr;
    let upper_fence = q3 + k * iqr;

    let inside = |v: &&f64| **v >= lower_fence && **v <= upper_fence;
    // Quartiles always lie within the fences, so at least one value does too.
    let lower_whisker = sorted.iter().find(inside).copied().unwrap_or(q1);
    let upper_whisker = sorted.iter().rev().find(inside).copied().unwrap_or(q3);

    let outliers = values
        .iter()
        .copied()
        .filter(|v| *v < lower_fence || *v > upper_fence)
        .collect();

    Ok(BoxStats {
        q1,
        median,
        q3,
        iqr,
        lower_fence,
        upper_fence,
        lower_whisker,
        upper_whisker,
        outliers,
    })
}

/// Equal-width bins over `[min, max]`. The last bin is closed on the right.
fn histogram(values: &[f64], min: f64, max: f64, bins: usize) -> Vec<HistogramBin> {
    if bins == 0 {
        return Vec::new();
    }
    if max <= min {
        return vec![HistogramBin { lower: min, upper: max, count: values.len() }];
    }

    let width = (max - min) / bins as f64;
    let mut out: Vec<HistogramBin> = (0..bins)
        .map(|i| HistogramBin {
            lower: min + width * i as f64,
            upper: if i + 1 == bins { max } else { min + width * (i + 1) as f64 },
            count: 0,
        })
        .collect();

    for v in values {
        let idx = (((v - min) / width).floor() as usize).min(bins - 1);
        out[idx].count += 1;
    }
    out
}
