//! Antenna gain models
//!
//! Gain is polymorphic over a tagged enum rather than trait objects: every
//! pattern's parameters (including pre-loaded 2-D tables) live in the
//! variant, so a scenario snapshot is a plain value.

use std::f64::consts::PI;

use log::warn;
use ndarray::Array2;

use crate::geometry::{SVec3, Vec3};

/// Bessel function of the first kind, order one, via its ascending series
/// for small arguments and the standard asymptotic form beyond.
fn bessel_j1(x: f64) -> f64 {
    let ax = x.abs();
    if ax < 8.0 {
        let y = x * x;
        let num = x
            * (72362614232.0
                + y * (-7895059235.0
                    + y * (242396853.1 + y * (-2972611.439 + y * (15704.48260 + y * -30.16036606)))));
        let den = 144725228442.0
            + y * (2300535178.0 + y * (18583304.74 + y * (99447.43394 + y * (376.9991397 + y))));
        num / den
    } else {
        let z = 8.0 / ax;
        let y = z * z;
        let xx = ax - 2.356194491;
        let p0 = 1.0 + y * (0.183105e-2 + y * (-0.3516396496e-4 + y * (0.2457520174e-5 + y * -0.240337019e-6)));
        let p1 = 0.04687499995
            + y * (-0.2002690873e-3 + y * (0.8449199096e-5 + y * (-0.88228987e-6 + y * 0.105787412e-6)));
        let result = (0.636619772 / ax).sqrt() * (xx.cos() * p0 - z * xx.sin() * p1);
        if x < 0.0 {
            -result
        } else {
            result
        }
    }
}

/// sin(x)/x with the singularity filled in
fn sinc_angle(theta: f64) -> f64 {
    theta.sin() / (theta + f64::EPSILON)
}

/// J1(x)/x with the singularity filled in
fn j1c(x: f64) -> f64 {
    if x == 0.0 {
        1.0
    } else {
        bessel_j1(x) / x
    }
}

/// Gain model parameters per antenna kind
#[derive(Debug, Clone)]
pub enum GainPattern {
    Isotropic,
    /// alpha * sinc(beta * theta)^gamma
    Sinc { alpha: f64, beta: f64, gamma: f64 },
    /// Gaussian beam with independent azimuth/elevation scales
    Gaussian {
        azimuth_scale: f64,
        elevation_scale: f64,
    },
    /// Square horn of the given aperture dimension in meters
    SquareHorn { dimension: f64 },
    /// Parabolic dish of the given diameter in meters
    Parabolic { diameter: f64 },
    /// Pre-loaded 2-D gain table over azimuth (rows) and elevation
    /// (columns) offsets from boresight, both spanning [-pi, pi)
    Pattern { gains: Array2<f64> },
}

#[derive(Debug, Clone)]
pub struct Antenna {
    name: String,
    efficiency: f64,
    pattern: GainPattern,
}

impl Antenna {
    pub fn new(name: impl Into<String>, pattern: GainPattern) -> Self {
        Self {
            name: name.into(),
            efficiency: 1.0,
            pattern,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn efficiency(&self) -> f64 {
        self.efficiency
    }

    pub fn set_efficiency(&mut self, efficiency: f64) {
        if efficiency > 1.0 {
            warn!(
                "antenna '{}' uses efficiency {} > 1; results may be inconsistent with reality",
                self.name, efficiency
            );
        }
        self.efficiency = efficiency;
    }

    /// Angle in radians between a direction and the boresight
    fn angle_off_boresight(direction: &SVec3, boresight: &SVec3) -> f64 {
        let d = Vec3::from(direction.direction());
        let b = Vec3::from(boresight.direction());
        d.dot(&b).clamp(-1.0, 1.0).acos()
    }

    /// Gain toward `direction` given the current boresight and wavelength
    pub fn gain(&self, direction: &SVec3, boresight: &SVec3, wavelength: f64) -> f64 {
        let gain = match &self.pattern {
            GainPattern::Isotropic => 1.0,
            GainPattern::Sinc { alpha, beta, gamma } => {
                let theta = Self::angle_off_boresight(direction, boresight);
                alpha * sinc_angle(beta * theta).powf(*gamma)
            }
            GainPattern::Gaussian {
                azimuth_scale,
                elevation_scale,
            } => {
                let daz = direction.azimuth - boresight.azimuth;
                let del = direction.elevation - boresight.elevation;
                (-(daz * daz / azimuth_scale + del * del / elevation_scale)).exp()
            }
            GainPattern::SquareHorn { dimension } => {
                let ge = 4.0 * PI * dimension * dimension / (wavelength * wavelength);
                let x = PI * dimension * Self::angle_off_boresight(direction, boresight).sin()
                    / wavelength;
                ge * sinc_angle(x).powi(2)
            }
            GainPattern::Parabolic { diameter } => {
                let ge = (PI * diameter / wavelength).powi(2);
                let x = PI * diameter * Self::angle_off_boresight(direction, boresight).sin()
                    / wavelength;
                ge * (2.0 * j1c(x)).powi(2)
            }
            GainPattern::Pattern { gains } => {
                let daz = wrap_pi(direction.azimuth - boresight.azimuth);
                let del = wrap_pi(direction.elevation - boresight.elevation);
                bilinear_lookup(gains, daz, del)
            }
        };
        gain * self.efficiency
    }

    /// Noise temperature seen looking in a direction. The built-in models
    /// are noiseless; the receiver's system temperature dominates.
    pub fn noise_temperature(&self, _direction: &SVec3) -> f64 {
        0.0
    }
}

fn wrap_pi(angle: f64) -> f64 {
    let wrapped = (angle + PI).rem_euclid(2.0 * PI) - PI;
    if wrapped == -PI {
        PI - f64::EPSILON
    } else {
        wrapped
    }
}

/// Bilinear interpolation into a gain grid spanning [-pi, pi) on both axes
fn bilinear_lookup(gains: &Array2<f64>, azimuth: f64, elevation: f64) -> f64 {
    let (rows, cols) = gains.dim();
    if rows == 0 || cols == 0 {
        return 0.0;
    }
    let u = (azimuth + PI) / (2.0 * PI) * (rows - 1) as f64;
    let v = (elevation + PI) / (2.0 * PI) * (cols - 1) as f64;
    let (r0, c0) = (u.floor() as usize, v.floor() as usize);
    let r1 = (r0 + 1).min(rows - 1);
    let c1 = (c0 + 1).min(cols - 1);
    let fu = u - r0 as f64;
    let fv = v - c0 as f64;
    gains[[r0, c0]] * (1.0 - fu) * (1.0 - fv)
        + gains[[r1, c0]] * fu * (1.0 - fv)
        + gains[[r0, c1]] * (1.0 - fu) * fv
        + gains[[r1, c1]] * fu * fv
}
