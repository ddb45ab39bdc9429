//! Detector, distribution and ingest parameters.
//!
//! Every field has a documented default, so an empty TOML file (or no file at
//! all) yields the standard flagging behavior:
//!
//! ```toml
//! [detector]
//! outlier_multiplier = 1.5
//! jump_threshold = 0.3
//! drop_threshold = -0.05
//! clip_differences_to_head_domain = false
//!
//! [distribution]
//! histogram_bins = 50
//! box_whisker_multiplier = 1.5
//!
//! [ingest]
//! derive_missing_differences = false
//! ```

use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::model::HeadError;

pub const DEFAULT_OUTLIER_MULTIPLIER: f64 = 1.5;
/// Rise in meters between consecutive readings above which a jump is flagged.
pub const DEFAULT_JUMP_THRESHOLD: f64 = 0.3;
/// Change in meters below which a drop is flagged.
pub const DEFAULT_DROP_THRESHOLD: f64 = -0.05;
pub const DEFAULT_HISTOGRAM_BINS: usize = 50;

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// Parameters of the head anomaly detector.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DetectorConfig {
    /// Whisker multiplier `k` in `Q1 - k*IQR` / `Q3 + k*IQR`.
    pub outlier_multiplier: f64,
    /// Deltas strictly greater than this are jumps.
    pub jump_threshold: f64,
    /// Deltas strictly less than this are drops.
    pub drop_threshold: f64,
    /// Restrict jump/drop flags to the trimmed head domain. Off by default:
    /// outliers are clipped to the domain, jumps and drops are not.
    pub clip_differences_to_head_domain: bool,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            outlier_multiplier: DEFAULT_OUTLIER_MULTIPLIER,
            jump_threshold: DEFAULT_JUMP_THRESHOLD,
            drop_threshold: DEFAULT_DROP_THRESHOLD,
            clip_differences_to_head_domain: false,
        }
    }
}

impl DetectorConfig {
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.outlier_multiplier = multiplier;
        self
    }

    pub fn with_thresholds(mut self, jump: f64, drop: f64) -> Self {
        self.jump_threshold = jump;
        self.drop_threshold = drop;
        self
    }

    pub fn validate(&self) -> Result<(), HeadError> {
        check_multiplier("detector.outlier_multiplier", self.outlier_multiplier)?;
        check_finite("detector.jump_threshold", self.jump_threshold)?;
        check_finite("detector.drop_threshold", self.drop_threshold)
    }
}

/// Parameters of the histogram + box-plot summary.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DistributionConfig {
    pub histogram_bins: usize,
    pub box_whisker_multiplier: f64,
}

impl Default for DistributionConfig {
    fn default() -> Self {
        Self {
            histogram_bins: DEFAULT_HISTOGRAM_BINS,
            box_whisker_multiplier: DEFAULT_OUTLIER_MULTIPLIER,
        }
    }
}

impl DistributionConfig {
    pub fn validate(&self) -> Result<(), HeadError> {
        if self.histogram_bins == 0 {
            return Err(HeadError::InvalidConfig(
                "distribution.histogram_bins must be at least 1".to_string(),
            ));
        }
        check_multiplier("distribution.box_whisker_multiplier", self.box_whisker_multiplier)
    }
}

/// Table loading options.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IngestConfig {
    /// Compute `head_t1` from the head column when the table lacks it.
    pub derive_missing_differences: bool,
}

/// Top-level configuration file.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HeadmonConfig {
    pub detector: DetectorConfig,
    pub distribution: DistributionConfig,
    pub ingest: IngestConfig,
}

impl HeadmonConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, HeadError> {
        let config: HeadmonConfig =
            toml::from_str(text).map_err(|e| HeadError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), HeadError> {
        self.detector.validate()?;
        self.distribution.validate()
    }
}

/// Reads and validates a configuration file.
pub fn load_config(path: impl AsRef<Path>) -> Result<HeadmonConfig, HeadError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)
        .map_err(|e| HeadError::Io(format!("{}: {}", path.display(), e)))?;
    HeadmonConfig::from_toml_str(&text)
}

fn check_finite(name: &str, value: f64) -> Result<(), HeadError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(HeadError::InvalidConfig(format!("{} must be finite, got {}", name, value)))
    }
}

fn check_multiplier(name: &str, value: f64) -> Result<(), HeadError> {
    check_finite(name, value)?;
    if value < 0.0 {
        return Err(HeadError::InvalidConfig(format!(
            "{} must not be negative, got {}",
            name, value
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_gives_defaults() {
        let config = HeadmonConfig::from_toml_str("").expect("empty config is valid");
        assert_eq!(config, HeadmonConfig::default());
        assert_eq!(config.detector.outlier_multiplier, 1.5);
        assert_eq!(config.detector.jump_threshold, 0.3);
        assert_eq!(config.detector.drop_threshold, -0.05);
        assert!(!config.detector.clip_differences_to_head_domain);
        assert_eq!(config.distribution.histogram_bins, 50);
        assert!(!config.ingest.derive_missing_differences);
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let config = HeadmonConfig::from_toml_str(
            "[detector]\njump_threshold = 0.5\n\n[distribution]\nhistogram_bins = 20\n",
        )
        .expect("valid config");
        assert_eq!(config.detector.jump_threshold, 0.5);
        assert_eq!(config.detector.drop_threshold, -0.05);
        assert_eq!(config.distribution.histogram_bins, 20);
    }

    #[test]
    fn test_negative_multiplier_rejected() {
        let result = HeadmonConfig::from_toml_str("[detector]\noutlier_multiplier = -1.0\n");
        assert!(
            matches!(result, Err(HeadError::InvalidConfig(_))),
            "negative multiplier should be rejected, got {:?}",
            result
        );
    }

    #[test]
    fn test_zero_bins_rejected() {
        let result = HeadmonConfig::from_toml_str("[distribution]\nhistogram_bins = 0\n");
        assert!(matches!(result, Err(HeadError::InvalidConfig(_))));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let result = HeadmonConfig::from_toml_str("[detector]\njump = 0.3\n");
        assert!(matches!(result, Err(HeadError::InvalidConfig(_))));
    }

    #[test]
    fn test_infinite_threshold_rejected() {
        let config = DetectorConfig::default().with_thresholds(f64::INFINITY, -0.05);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = load_config("/nonexistent/headmon.toml");
        assert!(matches!(result, Err(HeadError::Io(_))));
    }
}
