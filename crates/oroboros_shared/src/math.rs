//! Mathematical types shared by every simulation owner.
//!
//! The world is Y-up. "Horizontal" means the XZ ground plane, which is what
//! the AOI grid and the AI distance checks work in.

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

/// World-space position or direction. Plain old data, so snapshots can be
/// copied out as bytes.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
pub struct Vec3 {
    /// X component
    pub x: f32,
    /// Y component (up)
    pub y: f32,
    /// Z component
    pub z: f32,
}

impl Vec3 {
    /// Creates a vector.
    #[must_use]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Origin, and the "not moving" direction.
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);

    /// Yaw 90.
    pub const X: Self = Self::new(1.0, 0.0, 0.0);

    /// Up.
    pub const Y: Self = Self::new(0.0, 1.0, 0.0);

    /// Yaw 0.
    pub const Z: Self = Self::new(0.0, 0.0, 1.0);

    /// Squared length.
    #[must_use]
    pub fn length_squared(self) -> f32 {
        self.x * self.x + self.y * self.y + self.z * self.z
    }

    /// Length.
    #[must_use]
    pub fn length(self) -> f32 {
        self.length_squared().sqrt()
    }

    /// Squared distance on the XZ plane, ignoring height.
    #[must_use]
    pub fn horizontal_distance_squared(self, other: Self) -> f32 {
        let dx = self.x - other.x;
        let dz = self.z - other.z;
        dx * dx + dz * dz
    }

    /// Distance on the XZ plane, ignoring height.
    #[must_use]
    pub fn horizontal_distance(self, other: Self) -> f32 {
        self.horizontal_distance_squared(other).sqrt()
    }

    /// Unit vector in the same direction, or zero for a zero vector.
    #[must_use]
    pub fn normalize_or_zero(self) -> Self {
        let len = self.length();
        if len > f32::EPSILON {
            self * (1.0 / len)
        } else {
            Self::ZERO
        }
    }

    /// Same vector with the Y component dropped.
    #[must_use]
    pub const fn flat(self) -> Self {
        Self::new(self.x, 0.0, self.z)
    }
}

impl std::ops::Add for Vec3 {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl std::ops::Sub for Vec3 {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl std::ops::Mul<f32> for Vec3 {
    type Output = Self;
    fn mul(self, rhs: f32) -> Self {
        Self::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

/// Yaw (degrees, 0 = +Z, 90 = +X) that faces from `from` towards `to`.
#[must_use]
pub fn yaw_towards_deg(from: Vec3, to: Vec3) -> f32 {
    let dx = to.x - from.x;
    let dz = to.z - from.z;
    dx.atan2(dz).to_degrees()
}

/// Signed shortest rotation from `from` to `to`, in (-180, 180].
#[must_use]
pub fn angle_delta_deg(from: f32, to: f32) -> f32 {
    let mut diff = (to - from) % 360.0;
    if diff > 180.0 {
        diff -= 360.0;
    } else if diff <= -180.0 {
        diff += 360.0;
    }
    diff
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_along_direction() {
        let start = Vec3::new(1.0, 0.5, 1.0);
        let dir = (Vec3::new(4.0, 9.0, 5.0) - start).flat().normalize_or_zero();
        let next = start + dir * 5.0;
        assert!((next.x - 4.0).abs() < 1e-5);
        assert!((next.z - 5.0).abs() < 1e-5);
        assert_eq!(next.y, 0.5);
    }

    #[test]
    fn test_horizontal_distance_ignores_height() {
        let a = Vec3::new(0.0, 0.0, 0.0);
        let b = Vec3::new(3.0, 100.0, 4.0);
        assert_eq!(a.horizontal_distance_squared(b), 25.0);
        assert_eq!(a.horizontal_distance(b), 5.0);
    }

    #[test]
    fn test_yaw_convention() {
        let origin = Vec3::ZERO;
        assert!((yaw_towards_deg(origin, Vec3::Z) - 0.0).abs() < 1e-4);
        assert!((yaw_towards_deg(origin, Vec3::X) - 90.0).abs() < 1e-4);
    }

    #[test]
    fn test_angle_delta_wraps() {
        assert!((angle_delta_deg(170.0, -170.0) - 20.0).abs() < 1e-4);
        assert!((angle_delta_deg(-170.0, 170.0) + 20.0).abs() < 1e-4);
        assert!((angle_delta_deg(10.0, 10.0)).abs() < 1e-4);
    }

    #[test]
    fn test_normalize_zero_vector() {
        assert_eq!(Vec3::ZERO.normalize_or_zero(), Vec3::ZERO);
        let n = Vec3::new(3.0, 0.0, 4.0).normalize_or_zero();
        assert!((n.length() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_vec3_is_packed_pod() {
        let positions = [Vec3::new(1.0, 2.0, 3.0), Vec3::Z];
        let bytes: &[u8] = bytemuck::cast_slice(&positions);
        assert_eq!(bytes.len(), 24);
        assert_eq!(&bytes[8..12], &3.0f32.to_ne_bytes());
    }
}
