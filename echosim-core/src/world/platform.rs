//! Mobile platforms carrying radar equipment and targets

use crate::errors::Result;
use crate::geometry::{SVec3, Vec3};
use crate::path::{Path, RotationPath};

/// A named platform with a motion path and a rotation path. Radars and
/// targets attach to a platform and take their position and attitude from
/// it; the platform itself is immutable for the lifetime of the simulation.
#[derive(Debug)]
pub struct Platform {
    name: String,
    motion: Path,
    rotation: RotationPath,
}

impl Platform {
    pub fn new(name: impl Into<String>, motion: Path, rotation: RotationPath) -> Self {
        Self {
            name: name.into(),
            motion,
            rotation,
        }
    }

    /// Stationary platform with a fixed attitude, a convenience for tests
    /// and simple scenarios
    pub fn stationary(name: impl Into<String>, position: Vec3) -> Self {
        Self::new(name, Path::fixed(position), RotationPath::fixed(0.0, 0.0))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn motion(&self) -> &Path {
        &self.motion
    }

    pub fn rotation_path(&self) -> &RotationPath {
        &self.rotation
    }

    pub fn position(&self, t: f64) -> Result<Vec3> {
        self.motion.position_at(t)
    }

    pub fn rotation(&self, t: f64) -> Result<SVec3> {
        self.rotation.rotation_at(t)
    }

    pub fn is_finalized(&self) -> bool {
        self.motion.is_finalized() && self.rotation.is_finalized()
    }
}
