//! Time-interpolated position and rotation tracks
//!
//! A path is a sorted sequence of waypoints plus an interpolation mode. After
//! `finalize()` it can be sampled at any time; sampling outside the waypoint
//! span clamps to the endpoints. Cubic interpolation uses a natural spline
//! whose second-derivative vector is computed once at finalize time.

use std::f64::consts::TAU;

use crate::errors::{InternalError, Result};
use crate::geometry::{SVec3, Vec3};

/// Position waypoint: a point in space at a point in time
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Coord {
    pub pos: Vec3,
    pub t: f64,
}

impl Coord {
    pub fn new(pos: Vec3, t: f64) -> Self {
        Self { pos, t }
    }
}

/// Rotation waypoint: azimuth/elevation angles at a point in time
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RotationCoord {
    pub azimuth: f64,
    pub elevation: f64,
    pub t: f64,
}

impl RotationCoord {
    pub fn new(azimuth: f64, elevation: f64, t: f64) -> Self {
        Self {
            azimuth,
            elevation,
            t,
        }
    }
}

/// Interpolation mode shared by motion and rotation paths
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Interpolation {
    #[default]
    Static,
    Linear,
    Cubic,
}

/// Waypoint value that the generic interpolation routines can blend
trait Keyframe: Copy + Default {
    fn time(&self) -> f64;
    fn set_time(&mut self, t: f64);
    fn scaled(&self, w: f64) -> Self;
    fn plus(&self, other: &Self) -> Self;
    fn minus(&self, other: &Self) -> Self;
}

impl Keyframe for Coord {
    fn time(&self) -> f64 {
        self.t
    }
    fn set_time(&mut self, t: f64) {
        self.t = t;
    }
    fn scaled(&self, w: f64) -> Self {
        Coord::new(self.pos * w, self.t)
    }
    fn plus(&self, other: &Self) -> Self {
        Coord::new(self.pos + other.pos, self.t)
    }
    fn minus(&self, other: &Self) -> Self {
        Coord::new(self.pos - other.pos, self.t)
    }
}

impl Keyframe for RotationCoord {
    fn time(&self) -> f64 {
        self.t
    }
    fn set_time(&mut self, t: f64) {
        self.t = t;
    }
    fn scaled(&self, w: f64) -> Self {
        RotationCoord::new(self.azimuth * w, self.elevation * w, self.t)
    }
    fn plus(&self, other: &Self) -> Self {
        RotationCoord::new(
            self.azimuth + other.azimuth,
            self.elevation + other.elevation,
            self.t,
        )
    }
    fn minus(&self, other: &Self) -> Self {
        RotationCoord::new(
            self.azimuth - other.azimuth,
            self.elevation - other.elevation,
            self.t,
        )
    }
}

/// Insert a waypoint into a time-sorted list, preserving the sort
fn insert_sorted<T: Keyframe>(coords: &mut Vec<T>, coord: T) {
    let index = coords.partition_point(|c| c.time() < coord.time());
    coords.insert(index, coord);
}

fn sample_static<T: Keyframe>(coords: &[T]) -> T {
    coords[0]
}

fn sample_linear<T: Keyframe>(t: f64, coords: &[T]) -> T {
    let upper = coords.partition_point(|c| c.time() <= t);
    let mut result = if upper == 0 {
        coords[0]
    } else if upper == coords.len() {
        coords[coords.len() - 1]
    } else {
        let right = &coords[upper];
        let left = &coords[upper - 1];
        let span = right.time() - left.time();
        let rw = (right.time() - t) / span;
        let lw = 1.0 - rw;
        left.scaled(rw).plus(&right.scaled(lw))
    };
    result.set_time(t);
    result
}

/// Natural cubic spline blend using the precomputed second derivatives.
/// The A/B/C/D weighting is the standard form from Numerical Recipes.
fn sample_cubic<T: Keyframe>(t: f64, coords: &[T], dd: &[T]) -> T {
    let upper = coords.partition_point(|c| c.time() <= t);
    let mut result = if upper == 0 {
        coords[0]
    } else if upper == coords.len() {
        coords[coords.len() - 1]
    } else {
        let xri = upper;
        let xli = upper - 1;
        let span = coords[xri].time() - coords[xli].time();
        let a = (coords[xri].time() - t) / span;
        let b = 1.0 - a;
        let span_sq = span * span / 6.0;
        let c = (a * a * a - a) * span_sq;
        let d = (b * b * b - b) * span_sq;
        coords[xli]
            .scaled(a)
            .plus(&coords[xri].scaled(b))
            .plus(&dd[xli].scaled(c))
            .plus(&dd[xri].scaled(d))
    };
    result.set_time(t);
    result
}

/// Solve the tridiagonal system for natural-spline second derivatives with a
/// forward elimination and back substitution pass. Endpoint second
/// derivatives are zero. The elimination factors depend only on the waypoint
/// times, so they are plain scalars shared by every component.
fn finalize_cubic<T: Keyframe>(coords: &[T]) -> Vec<T> {
    let size = coords.len();
    let mut dd = vec![T::default(); size];
    if size < 3 {
        return dd;
    }
    let mut gamma = vec![0.0f64; size];
    let mut u = vec![T::default(); size];
    for i in 1..size - 1 {
        let xld = coords[i].time() - coords[i - 1].time();
        let xrd = coords[i + 1].time() - coords[i].time();
        let iw = coords[i + 1].time() - coords[i - 1].time();
        let sig = xld / iw;
        let p = sig * gamma[i - 1] + 2.0;
        gamma[i] = (sig - 1.0) / p;
        let yrd = coords[i + 1].minus(&coords[i]).scaled(1.0 / xrd);
        let yld = coords[i].minus(&coords[i - 1]).scaled(1.0 / xld);
        let rhs = yrd.minus(&yld).scaled(6.0 / iw);
        u[i] = rhs.minus(&u[i - 1].scaled(sig)).scaled(1.0 / p);
    }
    for i in (1..size - 1).rev() {
        dd[i] = dd[i + 1].scaled(gamma[i]).plus(&u[i]);
    }
    dd
}

/// Motion path of a platform
#[derive(Debug, Clone, Default)]
pub struct Path {
    coords: Vec<Coord>,
    dd: Vec<Coord>,
    interp: Interpolation,
    finalized: bool,
}

impl Path {
    pub fn new(interp: Interpolation) -> Self {
        Self {
            coords: Vec::new(),
            dd: Vec::new(),
            interp,
            finalized: false,
        }
    }

    /// Path fixed at one position for all time
    pub fn fixed(pos: Vec3) -> Self {
        let mut path = Path::new(Interpolation::Static);
        path.add_coord(Coord::new(pos, 0.0));
        path.finalize();
        path
    }

    pub fn add_coord(&mut self, coord: Coord) {
        insert_sorted(&mut self.coords, coord);
        self.finalized = false;
    }

    pub fn set_interpolation(&mut self, interp: Interpolation) {
        self.interp = interp;
        self.finalized = false;
    }

    pub fn finalize(&mut self) {
        if self.finalized {
            return;
        }
        if self.interp == Interpolation::Cubic {
            self.dd = finalize_cubic(&self.coords);
        }
        self.finalized = true;
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub fn position_at(&self, t: f64) -> Result<Vec3> {
        if !self.finalized || self.coords.is_empty() {
            return Err(InternalError::PathNotFinalized.into());
        }
        let coord = match self.interp {
            Interpolation::Static => sample_static(&self.coords),
            Interpolation::Linear => sample_linear(t, &self.coords),
            Interpolation::Cubic => sample_cubic(t, &self.coords, &self.dd),
        };
        Ok(coord.pos)
    }
}

/// Rotation path: supports the same waypoint modes plus constant-rate motion
#[derive(Debug, Clone, Default)]
pub struct RotationPath {
    coords: Vec<RotationCoord>,
    dd: Vec<RotationCoord>,
    interp: Interpolation,
    constant: Option<(RotationCoord, RotationCoord)>,
    finalized: bool,
}

impl RotationPath {
    pub fn new(interp: Interpolation) -> Self {
        Self {
            coords: Vec::new(),
            dd: Vec::new(),
            interp,
            constant: None,
            finalized: false,
        }
    }

    /// Rotation fixed at one attitude for all time
    pub fn fixed(azimuth: f64, elevation: f64) -> Self {
        let mut path = RotationPath::new(Interpolation::Static);
        path.add_coord(RotationCoord::new(azimuth, elevation, 0.0));
        path.finalize();
        path
    }

    pub fn add_coord(&mut self, coord: RotationCoord) {
        insert_sorted(&mut self.coords, coord);
        self.constant = None;
        self.finalized = false;
    }

    pub fn set_interpolation(&mut self, interp: Interpolation) {
        self.interp = interp;
        self.constant = None;
        self.finalized = false;
    }

    /// Switch to fixed-rate rotation. The path is finalized immediately.
    pub fn set_constant_rate(&mut self, start: RotationCoord, rate: RotationCoord) {
        self.constant = Some((start, rate));
        self.finalized = true;
    }

    pub fn finalize(&mut self) {
        if self.finalized {
            return;
        }
        if self.interp == Interpolation::Cubic {
            self.dd = finalize_cubic(&self.coords);
        }
        self.finalized = true;
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub fn rotation_at(&self, t: f64) -> Result<SVec3> {
        if !self.finalized {
            return Err(InternalError::PathNotFinalized.into());
        }
        if let Some((start, rate)) = self.constant {
            // Azimuth wraps; elevation advances unwrapped.
            let azimuth = (start.azimuth + rate.azimuth * t).rem_euclid(TAU);
            let elevation = start.elevation + rate.elevation * t;
            return Ok(SVec3::new(1.0, azimuth, elevation));
        }
        if self.coords.is_empty() {
            return Err(InternalError::PathNotFinalized.into());
        }
        let coord = match self.interp {
            Interpolation::Static => sample_static(&self.coords),
            Interpolation::Linear => sample_linear(t, &self.coords),
            Interpolation::Cubic => sample_cubic(t, &self.coords, &self.dd),
        };
        Ok(SVec3::new(1.0, coord.azimuth, coord.elevation))
    }
}
