use crate::writer::VIEWBOX_WIDTH;
use crate::{Result, TrackerError};
use geotrail_geometry::{padded_viewbox, Bounds, LineStyle, ReductionConfig};
use geotrail_protocol::{DEFAULT_MAX_MESSAGE_LEN, DEFAULT_PREFIX_WIDTH};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Placeholder filename of a target's live output file.
pub const ACTIVE_FILENAME: &str = "_active.svg";

/// Extension of archived output files.
pub const ARCHIVE_EXTENSION: &str = "svg";

/// Configuration for the tracker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Root of the per-target output directories
    pub output_dir: PathBuf,

    /// Minimum spacing between flush cycles, in milliseconds
    pub flush_interval_ms: u64,

    /// Width of the channel prefix
    pub prefix_width: usize,

    /// Transport messages longer than this are rejected
    pub max_message_len: usize,

    /// Styles drawn on every flush, in output order
    pub line_styles: Vec<LineStyle>,

    /// Thresholds for the reducers
    pub reduction: ReductionConfig,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(".svg_db"),
            flush_interval_ms: 1 << 14,
            prefix_width: DEFAULT_PREFIX_WIDTH,
            max_message_len: DEFAULT_MAX_MESSAGE_LEN,
            line_styles: LineStyle::ALL.to_vec(),
            reduction: ReductionConfig::default(),
        }
    }
}

impl TrackerConfig {
    /// Load from a TOML file. Missing keys fall back to defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| TrackerError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| TrackerError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    #[must_use]
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    /// Directory holding one target's files.
    #[must_use]
    pub fn target_dir(&self, target: &str) -> PathBuf {
        self.output_dir.join(target)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.flush_interval_ms == 0 {
            return Err(TrackerError::Config(
                "flush_interval_ms must be > 0".to_string(),
            ));
        }
        if self.prefix_width == 0 || self.prefix_width > 18 {
            return Err(TrackerError::Config(
                "prefix_width must be between 1 and 18".to_string(),
            ));
        }
        if self.max_message_len <= self.prefix_width {
            return Err(TrackerError::Config(
                "max_message_len must exceed prefix_width".to_string(),
            ));
        }
        if self.line_styles.is_empty() {
            return Err(TrackerError::Config(
                "line_styles must not be empty".to_string(),
            ));
        }
        let mut seen = self.line_styles.clone();
        seen.sort();
        seen.dedup();
        if seen.len() != self.line_styles.len() {
            return Err(TrackerError::Config(
                "line_styles must not repeat".to_string(),
            ));
        }
        if self.output_dir.as_os_str().is_empty() {
            return Err(TrackerError::Config("output_dir must be set".to_string()));
        }
        self.reduction.validate().map_err(TrackerError::Config)?;

        // Whole-globe bounds give the longest viewbox text at this precision.
        let globe = Bounds {
            min_x: -180.0,
            min_y: -90.0,
            max_x: 180.0,
            max_y: 90.0,
        };
        if padded_viewbox(&globe, self.reduction.precision, VIEWBOX_WIDTH).is_none() {
            return Err(TrackerError::Config(format!(
                "precision {} does not fit a {VIEWBOX_WIDTH}-column viewbox",
                self.reduction.precision
            )));
        }
        Ok(())
    }
}
