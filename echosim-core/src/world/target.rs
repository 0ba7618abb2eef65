//! Radar targets and their cross-section models

use std::sync::Mutex;

use rand::SeedableRng;
use rand_chacha::ChaCha12Rng;
use rand_distr::{Distribution, Gamma};
use std::sync::Arc;

use crate::geometry::SVec3;
use crate::world::platform::Platform;

/// Sorted angle/value pairs with linear interpolation between samples,
/// clamped at the ends. Backing store for table-driven RCS patterns.
#[derive(Debug, Clone, Default)]
pub struct AngleTable {
    samples: Vec<(f64, f64)>,
}

impl AngleTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_samples(samples: &[(f64, f64)]) -> Self {
        let mut table = Self::new();
        for &(angle, value) in samples {
            table.insert(angle, value);
        }
        table
    }

    pub fn insert(&mut self, angle: f64, value: f64) {
        let index = self.samples.partition_point(|&(a, _)| a < angle);
        self.samples.insert(index, (angle, value));
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Interpolated value at the given angle
    pub fn value(&self, angle: f64) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let upper = self.samples.partition_point(|&(a, _)| a < angle);
        if upper == 0 {
            return self.samples[0].1;
        }
        if upper == self.samples.len() {
            return self.samples[self.samples.len() - 1].1;
        }
        let (x1, y1) = self.samples[upper - 1];
        let (x2, y2) = self.samples[upper];
        if x2 == x1 {
            return y2;
        }
        y2 * (angle - x1) / (x2 - x1) + y1 * (x2 - angle) / (x2 - x1)
    }
}

/// Mean radar cross-section as a function of incidence and scattering angle
#[derive(Debug, Clone)]
pub enum RcsModel {
    /// Angle-independent RCS in square meters
    Isotropic { rcs: f64 },
    /// RCS interpolated from azimuth and elevation sample tables, combined
    /// with the half-angle approximation
    Table {
        azimuth: AngleTable,
        elevation: AngleTable,
    },
}

/// Pulse-to-pulse RCS fluctuation
#[derive(Debug, Clone)]
pub enum FluctuationModel {
    /// No fluctuation: the factor is exactly 1
    Constant,
    /// Chi-square (Swerling family) fluctuation via a Gamma distribution
    /// with shape k and unit mean
    ChiSquare { k: f64 },
}

/// A reflecting object attached to a platform.
///
/// The random engine is sampled from the read-path `rcs()` by the driver
/// thread (pulsed responses) and by finalizer threads (CW interference), so
/// it sits behind a mutex.
#[derive(Debug)]
pub struct Target {
    name: String,
    platform: Arc<Platform>,
    model: RcsModel,
    fluctuation: FluctuationModel,
    rng: Mutex<ChaCha12Rng>,
}

impl Target {
    pub fn new(
        name: impl Into<String>,
        platform: Arc<Platform>,
        model: RcsModel,
        fluctuation: FluctuationModel,
        seed: u64,
    ) -> Self {
        Self {
            name: name.into(),
            platform,
            model,
            fluctuation,
            rng: Mutex::new(ChaCha12Rng::seed_from_u64(seed)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn platform(&self) -> &Arc<Platform> {
        &self.platform
    }

    /// RCS for an incoming and outgoing direction, with the fluctuation
    /// factor applied
    pub fn rcs(&self, in_angle: &SVec3, out_angle: &SVec3) -> f64 {
        let mean = match &self.model {
            RcsModel::Isotropic { rcs } => *rcs,
            RcsModel::Table { azimuth, elevation } => {
                // Half-angle approximation between incidence and scatter.
                let az = (in_angle.azimuth + out_angle.azimuth) / 2.0;
                let el = (in_angle.elevation + out_angle.elevation) / 2.0;
                (azimuth.value(az) * elevation.value(el)).sqrt()
            }
        };
        mean * self.fluctuation_factor()
    }

    fn fluctuation_factor(&self) -> f64 {
        match &self.fluctuation {
            FluctuationModel::Constant => 1.0,
            FluctuationModel::ChiSquare { k } => {
                let gamma = Gamma::new(*k, 1.0 / k).expect("chi-square shape must be positive");
                let mut rng = self.rng.lock().expect("target rng poisoned");
                gamma.sample(&mut *rng)
            }
        }
    }
}
