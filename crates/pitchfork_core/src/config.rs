use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// Absolute slack when turning a floating-point ratio into a count, so that
/// 10.0 / 0.1 or 0.3 / 0.1 land on the intended integer.
pub(crate) const COUNT_TOLERANCE: f64 = 1e-9;

/// Upper bound on grid sizes and integration step counts.
pub const MAX_SAMPLES: usize = 1_000_000;

/// The integer `ratio` rounds to if it lies within [`COUNT_TOLERANCE`] of one.
fn near_integer(ratio: f64) -> Option<f64> {
    let nearest = ratio.round();
    ((ratio - nearest).abs() <= COUNT_TOLERANCE).then_some(nearest)
}

/// ⌊ratio⌋, tolerant of rounding just below an integer. Non-positive and
/// non-finite ratios count as zero.
pub(crate) fn floor_count(ratio: f64) -> usize {
    if !ratio.is_finite() || ratio <= 0.0 {
        return 0;
    }
    near_integer(ratio).unwrap_or_else(|| ratio.floor()) as usize
}

/// ⌈ratio⌉, tolerant of rounding just above an integer. Non-positive and
/// non-finite ratios count as zero.
pub(crate) fn ceil_count(ratio: f64) -> usize {
    if !ratio.is_finite() || ratio <= 0.0 {
        return 0;
    }
    near_integer(ratio).unwrap_or_else(|| ratio.ceil()) as usize
}

/// Rejects spans that would need more than [`MAX_SAMPLES`] steps.
pub(crate) fn check_sample_count(name: &str, span: f64, step: f64) -> Result<()> {
    if ceil_count(span / step) > MAX_SAMPLES {
        bail!("{name} needs more than {MAX_SAMPLES} steps; increase the step.");
    }
    Ok(())
}

/// A bounded, stepped scalar input (the r and x₀ sliders).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParameterRange {
    pub min: f64,
    pub max: f64,
    pub step: f64,
    pub value: f64,
}

impl ParameterRange {
    pub fn new(min: f64, max: f64, step: f64, value: f64) -> Self {
        Self {
            min,
            max,
            step,
            value,
        }
    }

    pub fn validate(&self, name: &str) -> Result<()> {
        if !self.min.is_finite() || !self.max.is_finite() || self.max <= self.min {
            bail!("{name} range must be finite with max > min.");
        }
        if !self.step.is_finite() || self.step <= 0.0 {
            bail!("{name} step must be positive.");
        }
        check_sample_count(name, self.max - self.min, self.step)?;
        if !self.value.is_finite() || self.value < self.min || self.value > self.max {
            bail!(
                "{name} value {} lies outside [{}, {}].",
                self.value,
                self.min,
                self.max
            );
        }
        Ok(())
    }

    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }
}

/// Fixed-step integration settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntegrationSettings {
    pub time_span: f64,
    pub step_size: f64,
}

impl Default for IntegrationSettings {
    fn default() -> Self {
        Self {
            time_span: 10.0,
            step_size: 0.01,
        }
    }
}

impl IntegrationSettings {
    pub fn validate(&self) -> Result<()> {
        if !self.time_span.is_finite() || self.time_span <= 0.0 {
            bail!("time_span must be positive.");
        }
        if !self.step_size.is_finite() || self.step_size <= 0.0 {
            bail!("step_size must be positive.");
        }
        check_sample_count("Integration", self.time_span, self.step_size)
    }

    /// Number of RK4 steps: time_span / step_size truncated toward zero,
    /// never more than [`MAX_SAMPLES`]. A trailing partial step is dropped.
    pub fn step_count(&self) -> usize {
        floor_count(self.time_span / self.step_size).min(MAX_SAMPLES)
    }
}

/// Everything needed to set up an analysis session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub r: ParameterRange,
    pub x0: ParameterRange,
    pub integration: IntegrationSettings,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            r: ParameterRange::new(-5.0, 5.0, 0.1, 1.0),
            x0: ParameterRange::new(-5.0, 5.0, 0.1, 0.5),
            integration: IntegrationSettings::default(),
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<()> {
        self.r.validate("r")?;
        self.x0.validate("x0")?;
        self.integration.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::{ceil_count, floor_count, IntegrationSettings, ParameterRange, SessionConfig};

    fn assert_err_contains<T: std::fmt::Debug>(result: anyhow::Result<T>, needle: &str) {
        let err = result.expect_err("expected error");
        let message = format!("{err}");
        assert!(
            message.contains(needle),
            "expected error to contain \"{needle}\", got \"{message}\""
        );
    }

    #[test]
    fn default_config_is_valid() {
        let config = SessionConfig::default();
        config.validate().expect("defaults validate");
        assert_eq!(config.r.value, 1.0);
        assert_eq!(config.x0.value, 0.5);
        assert_eq!(config.integration.step_count(), 1000);
    }

    #[test]
    fn rejects_invalid_ranges() {
        assert_err_contains(
            ParameterRange::new(1.0, 1.0, 0.1, 1.0).validate("r"),
            "max > min",
        );
        assert_err_contains(
            ParameterRange::new(0.0, 1.0, 0.0, 0.5).validate("r"),
            "step must be positive",
        );
        assert_err_contains(
            ParameterRange::new(0.0, 1.0, 0.1, 2.0).validate("x0"),
            "x0 value 2 lies outside",
        );
        assert_err_contains(
            IntegrationSettings {
                time_span: 10.0,
                step_size: -0.1,
            }
            .validate(),
            "step_size must be positive",
        );
    }

    #[test]
    fn step_count_truncates_toward_zero() {
        let settings = IntegrationSettings {
            time_span: 1.05,
            step_size: 0.1,
        };
        assert_eq!(settings.step_count(), 10);
        let settings = IntegrationSettings {
            time_span: 0.3,
            step_size: 0.1,
        };
        assert_eq!(settings.step_count(), 3);
    }

    #[test]
    fn oversized_step_counts_are_rejected() {
        let settings = IntegrationSettings {
            time_span: 1e13,
            step_size: 1e-6,
        };
        assert_err_contains(settings.validate(), "more than 1000000 steps");
        assert_eq!(settings.step_count(), 1_000_000);
        assert_err_contains(
            ParameterRange::new(-5.0, 5.0, 1e-9, 0.0).validate("r"),
            "r needs more than",
        );
        let settings = IntegrationSettings {
            time_span: 1000.0,
            step_size: 0.001,
        };
        settings.validate().expect("exactly at the cap");
        assert_eq!(settings.step_count(), 1_000_000);
    }

    #[test]
    fn count_tolerance_is_absolute() {
        assert_eq!(floor_count(0.3 / 0.1), 3);
        assert_eq!(ceil_count(0.7 / 0.1), 7);
        assert_eq!(floor_count(1e9 + 0.5), 1_000_000_000);
        assert_eq!(ceil_count(1e9 + 0.5), 1_000_000_001);
        assert_eq!(floor_count(f64::NAN), 0);
        assert_eq!(ceil_count(-2.0), 0);
    }

    #[test]
    fn missing_config_fields_fall_back_to_defaults() {
        let config: SessionConfig =
            serde_json::from_str(r#"{ "integration": { "time_span": 2.0, "step_size": 0.5 } }"#)
                .expect("deserializes");
        assert_eq!(config.r, SessionConfig::default().r);
        assert_eq!(config.integration.step_count(), 4);
    }
}
