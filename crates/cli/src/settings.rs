use anyhow::{Context, Result};
use clap::Args;
use geotrail_engine::TrackerConfig;
use std::path::PathBuf;

/// Tracker configuration sources shared by every subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// TOML file with tracker settings; missing keys use defaults
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Root directory for per-target SVG files
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Minimum spacing between flush cycles (ms)
    #[arg(long)]
    pub flush_interval_ms: Option<u64>,
}

impl ConfigArgs {
    /// File (or defaults), then command-line overrides, then validation.
    pub fn resolve(&self) -> Result<TrackerConfig> {
        let mut config = match &self.config {
            Some(path) => TrackerConfig::load(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => TrackerConfig::default(),
        };
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        if let Some(ms) = self.flush_interval_ms {
            config.flush_interval_ms = ms;
        }
        config.validate().context("Invalid tracker configuration")?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn overrides_win_over_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("geotrail.toml");
        std::fs::write(
            &path,
            "output_dir = \"/var/geotrail\"\nflush_interval_ms = 1000\nline_styles = [\"raw\"]\n",
        )
        .unwrap();

        let args = ConfigArgs {
            config: Some(path),
            output_dir: None,
            flush_interval_ms: Some(250),
        };
        let config = args.resolve().unwrap();
        assert_eq!(config.output_dir, PathBuf::from("/var/geotrail"));
        assert_eq!(config.flush_interval_ms, 250);
        assert_eq!(config.line_styles.len(), 1);
    }

    #[test]
    fn zero_interval_is_rejected() {
        let args = ConfigArgs {
            flush_interval_ms: Some(0),
            ..ConfigArgs::default()
        };
        assert!(args.resolve().is_err());
    }

    #[test]
    fn missing_file_is_an_error() {
        let args = ConfigArgs {
            config: Some(PathBuf::from("/nonexistent/geotrail.toml")),
            ..ConfigArgs::default()
        };
        assert!(args.resolve().is_err());
    }
}
