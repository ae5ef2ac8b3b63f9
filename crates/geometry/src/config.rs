use serde::{Deserialize, Serialize};

/// Thresholds for the path reducers. Distances are in degrees, turn bounds in degrees of arc.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReductionConfig {
    /// Maximum deviation the max-deviation simplifier tolerates before splitting.
    pub tolerance: f64,

    /// Near-field distance: below it the cumulative-angle reducer never anchors.
    pub near_field: f64,

    /// Far-field distance: at and beyond it the far turn bound applies.
    pub far_field: f64,

    /// Turn the cumulative-angle reducer requires just past the near field.
    pub near_turn_degrees: f64,

    /// Turn required at the far field.
    pub far_turn_degrees: f64,

    /// Decimal places written for path coordinates and viewbox numbers.
    pub precision: usize,
}

impl Default for ReductionConfig {
    fn default() -> Self {
        Self {
            tolerance: 0.0001,
            near_field: 0.0001,
            far_field: 0.01,
            near_turn_degrees: 45.0,
            far_turn_degrees: 90.0,
            precision: 5,
        }
    }
}

impl ReductionConfig {
    /// Stroke width used for every path element.
    #[must_use]
    pub fn stroke_width(&self) -> f64 {
        self.near_field / 2.0
    }

    #[must_use]
    pub fn near_field_sq(&self) -> f64 {
        self.near_field * self.near_field
    }

    #[must_use]
    pub fn far_field_sq(&self) -> f64 {
        self.far_field * self.far_field
    }

    /// Turn (radians) required to anchor at squared distance `sq` from the last anchor.
    ///
    /// Linear in squared distance between the near and far bounds, clamped outside them.
    #[must_use]
    pub fn turn_threshold(&self, sq: f64) -> f64 {
        let near = self.near_turn_degrees.to_radians();
        let far = self.far_turn_degrees.to_radians();
        let span = self.far_field_sq() - self.near_field_sq();
        let t = if span > 0.0 {
            ((sq - self.near_field_sq()) / span).clamp(0.0, 1.0)
        } else {
            1.0
        };
        near + (far - near) * t
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        if !(self.tolerance.is_finite() && self.tolerance >= 0.0) {
            return Err("tolerance must be a non-negative number".to_string());
        }
        if !(self.near_field.is_finite() && self.near_field > 0.0) {
            return Err("near_field must be > 0".to_string());
        }
        if !(self.far_field.is_finite() && self.far_field >= self.near_field) {
            return Err("far_field must be >= near_field".to_string());
        }
        if !(0.0..=180.0).contains(&self.near_turn_degrees)
            || !(0.0..=180.0).contains(&self.far_turn_degrees)
        {
            return Err("turn bounds must lie in [0, 180] degrees".to_string());
        }
        if self.precision == 0 || self.precision > 12 {
            return Err("precision must be between 1 and 12".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = ReductionConfig::default();
        assert!(config.validate().is_ok());
        assert!((config.stroke_width() - 0.00005).abs() < 1e-12);
    }

    #[test]
    fn turn_threshold_interpolates_and_clamps() {
        let config = ReductionConfig::default();
        let near = 45f64.to_radians();
        let far = 90f64.to_radians();
        assert!((config.turn_threshold(0.0) - near).abs() < 1e-12);
        assert!((config.turn_threshold(1.0) - far).abs() < 1e-12);
        let mid_sq = (config.near_field_sq() + config.far_field_sq()) / 2.0;
        assert!((config.turn_threshold(mid_sq) - (near + far) / 2.0).abs() < 1e-9);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let mut config = ReductionConfig {
            far_field: 0.00001,
            ..ReductionConfig::default()
        };
        assert!(config.validate().is_err());
        config.far_field = 0.01;
        config.precision = 0;
        assert!(config.validate().is_err());
    }
}
