//! Cartesian and spherical vector types used throughout the simulation
//!
//! Angles are radians, measured counter-clockwise from East. Conversion to
//! compass degrees is the business of serializers, not of this crate.

use std::ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Sub, SubAssign};

/// Three-dimensional Cartesian vector
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn dot(&self, other: &Vec3) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn length(&self) -> f64 {
        self.dot(self).sqrt()
    }

    /// Unit vector in the same direction. Zero-length input returns zero.
    pub fn normalized(&self) -> Vec3 {
        let len = self.length();
        if len == 0.0 {
            Vec3::ZERO
        } else {
            *self / len
        }
    }
}

impl Add for Vec3 {
    type Output = Vec3;
    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl AddAssign for Vec3 {
    fn add_assign(&mut self, rhs: Vec3) {
        *self = *self + rhs;
    }
}

impl Sub for Vec3 {
    type Output = Vec3;
    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl SubAssign for Vec3 {
    fn sub_assign(&mut self, rhs: Vec3) {
        *self = *self - rhs;
    }
}

impl Mul<f64> for Vec3 {
    type Output = Vec3;
    fn mul(self, rhs: f64) -> Vec3 {
        Vec3::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl MulAssign<f64> for Vec3 {
    fn mul_assign(&mut self, rhs: f64) {
        *self = *self * rhs;
    }
}

impl Div<f64> for Vec3 {
    type Output = Vec3;
    fn div(self, rhs: f64) -> Vec3 {
        Vec3::new(self.x / rhs, self.y / rhs, self.z / rhs)
    }
}

impl DivAssign<f64> for Vec3 {
    fn div_assign(&mut self, rhs: f64) {
        *self = *self / rhs;
    }
}

impl Neg for Vec3 {
    type Output = Vec3;
    fn neg(self) -> Vec3 {
        Vec3::new(-self.x, -self.y, -self.z)
    }
}

/// Spherical vector: (length, azimuth, elevation)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SVec3 {
    pub length: f64,
    pub azimuth: f64,
    pub elevation: f64,
}

impl SVec3 {
    pub fn new(length: f64, azimuth: f64, elevation: f64) -> Self {
        Self {
            length,
            azimuth,
            elevation,
        }
    }

    /// Direction with the same angles and unit length
    pub fn direction(&self) -> SVec3 {
        SVec3::new(1.0, self.azimuth, self.elevation)
    }
}

impl From<Vec3> for SVec3 {
    fn from(v: Vec3) -> SVec3 {
        let length = v.length();
        if length == 0.0 {
            return SVec3::new(0.0, 0.0, 0.0);
        }
        SVec3 {
            length,
            azimuth: v.y.atan2(v.x),
            elevation: (v.z / length).asin(),
        }
    }
}

impl From<SVec3> for Vec3 {
    fn from(s: SVec3) -> Vec3 {
        Vec3 {
            x: s.length * s.elevation.cos() * s.azimuth.cos(),
            y: s.length * s.elevation.cos() * s.azimuth.sin(),
            z: s.length * s.elevation.sin(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn dot_product_and_length() {
        let a = Vec3::new(1.0, 2.0, 3.0);
        let b = Vec3::new(-2.0, 0.5, 1.0);
        assert_relative_eq!(a.dot(&b), -2.0 + 1.0 + 3.0);
        assert_relative_eq!(a.length(), 14.0_f64.sqrt());
    }

    #[test]
    fn spherical_roundtrip() {
        let v = Vec3::new(3.0, -4.0, 5.0);
        let s = SVec3::from(v);
        let back = Vec3::from(s);
        assert_relative_eq!(back.x, v.x, epsilon = 1e-12);
        assert_relative_eq!(back.y, v.y, epsilon = 1e-12);
        assert_relative_eq!(back.z, v.z, epsilon = 1e-12);
    }

    #[test]
    fn zenith_elevation() {
        let s = SVec3::from(Vec3::new(0.0, 0.0, 2.0));
        assert_relative_eq!(s.elevation, FRAC_PI_2);
        assert_relative_eq!(s.length, 2.0);
    }

    #[test]
    fn normalized_zero_is_zero() {
        assert_eq!(Vec3::ZERO.normalized(), Vec3::ZERO);
    }
}
