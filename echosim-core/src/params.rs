//! Simulation-wide parameter set
//!
//! One `Parameters` value is owned by the `World` and passed by reference (or
//! cheap clone) to the components that need it. It is mutable while a
//! scenario is being loaded and treated as immutable once the run starts.

use serde::{Deserialize, Serialize};

use crate::errors::{ConfigError, Result};

/// Geometric separations at or below this threshold are degenerate
pub const EPSILON: f64 = f64::EPSILON;

/// Default speed of light in m/s
pub const DEFAULT_C: f64 = 299_792_458.0;

/// Coordinate-frame tag carried for external serializers; the engine itself
/// works in plain Cartesian coordinates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinateFrame {
    pub tag: String,
    pub origin: [f64; 3],
}

/// Output export toggles consumed by serializer collaborators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ExportFlags {
    pub xml: bool,
    pub csv: bool,
    pub binary: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameters {
    /// Simulation start time in seconds
    pub start_time: f64,
    /// Simulation end time in seconds
    pub end_time: f64,
    /// Propagation speed in the medium, m/s
    pub c: f64,
    /// Output sampling rate in Hz
    pub rate: f64,
    /// Rate at which the channel model samples pulse responses and at which
    /// CW physics would be interpolated, in Hz
    pub sim_sample_rate: f64,
    /// Number of times receive windows are oversampled before decimation
    pub oversample_ratio: u32,
    /// ADC resolution; 0 disables quantization and normalizes to unit peak
    pub adc_bits: u32,
    /// Master random seed; `None` draws a fresh seed per run
    pub random_seed: Option<u64>,
    /// Tap count of the Kaiser-sinc render kernel
    pub render_filter_length: usize,
    pub export: ExportFlags,
    pub frame: Option<CoordinateFrame>,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            start_time: 0.0,
            end_time: 0.0,
            c: DEFAULT_C,
            rate: 1000.0,
            sim_sample_rate: 1000.0,
            oversample_ratio: 1,
            adc_bits: 0,
            random_seed: None,
            render_filter_length: 33,
            export: ExportFlags::default(),
            frame: None,
        }
    }
}

impl Parameters {
    /// Restore scenario-load defaults
    pub fn reset(&mut self) {
        *self = Parameters::default();
    }

    /// Output rate times the oversample ratio: the rate at which receive
    /// windows are synthesized before decimation
    pub fn oversampled_rate(&self) -> f64 {
        self.rate * self.oversample_ratio as f64
    }

    pub fn validate(&self) -> Result<()> {
        if self.end_time < self.start_time {
            return Err(ConfigError::InvalidParameter {
                reason: format!(
                    "end_time {} precedes start_time {}",
                    self.end_time, self.start_time
                ),
            }
            .into());
        }
        if self.rate <= 0.0 || self.sim_sample_rate <= 0.0 {
            return Err(ConfigError::InvalidParameter {
                reason: "sampling rates must be positive".into(),
            }
            .into());
        }
        if self.oversample_ratio == 0 {
            return Err(ConfigError::InvalidParameter {
                reason: "oversample_ratio must be at least 1".into(),
            }
            .into());
        }
        if self.c <= 0.0 {
            return Err(ConfigError::InvalidParameter {
                reason: "propagation speed must be positive".into(),
            }
            .into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_contract() {
        let p = Parameters::default();
        assert_eq!(p.c, 299_792_458.0);
        assert_eq!(p.sim_sample_rate, 1000.0);
        assert_eq!(p.oversample_ratio, 1);
        assert_eq!(p.adc_bits, 0);
    }

    #[test]
    fn validation_rejects_bad_rates() {
        let mut p = Parameters {
            end_time: 1.0,
            ..Parameters::default()
        };
        assert!(p.validate().is_ok());
        p.rate = 0.0;
        assert!(p.validate().is_err());
    }

    #[test]
    fn reset_restores_defaults() {
        let mut p = Parameters {
            end_time: 10.0,
            adc_bits: 12,
            ..Parameters::default()
        };
        p.reset();
        assert_eq!(p, Parameters::default());
    }
}
