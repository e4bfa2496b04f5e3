//! Pose value type in canonical units (meters, degrees)

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Cartesian pose: position in meters, rotation in degrees
///
/// Poses are values. Corrections build a new pose rather than mutating.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Pose {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub rx: f64,
    pub ry: f64,
    pub rz: f64,
}

impl Pose {
    pub const fn new(x: f64, y: f64, z: f64, rx: f64, ry: f64, rz: f64) -> Self {
        Self { x, y, z, rx, ry, rz }
    }

    /// Position-only pose with zero rotation
    pub const fn xyz(x: f64, y: f64, z: f64) -> Self {
        Self::new(x, y, z, 0.0, 0.0, 0.0)
    }

    /// Same pose shifted vertically
    pub fn raised(&self, dz: f64) -> Self {
        Self { z: self.z + dz, ..*self }
    }

    /// Same pose shifted along x
    pub fn shifted_x(&self, dx: f64) -> Self {
        Self { x: self.x + dx, ..*self }
    }

    /// Same pose shifted along y
    pub fn shifted_y(&self, dy: f64) -> Self {
        Self { y: self.y + dy, ..*self }
    }

    /// Same pose at an absolute height
    pub fn at_z(&self, z: f64) -> Self {
        Self { z, ..*self }
    }

    /// Absolute per-axis position error against a target
    pub fn position_error(&self, target: &Pose) -> AxisError {
        AxisError {
            dx: (self.x - target.x).abs(),
            dy: (self.y - target.y).abs(),
            dz: (self.z - target.z).abs(),
        }
    }

    /// JSON object with x, y, z only
    pub fn position_json(&self) -> Value {
        json!({ "x": self.x, "y": self.y, "z": self.z })
    }

    /// JSON object with all six fields
    pub fn to_json(&self) -> Value {
        json!({
            "x": self.x,
            "y": self.y,
            "z": self.z,
            "rx": self.rx,
            "ry": self.ry,
            "rz": self.rz,
        })
    }

    /// Parse a pose object; missing fields read as zero
    pub fn from_json(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let field = |name: &str| obj.get(name).and_then(Value::as_f64).unwrap_or(0.0);
        if !obj.contains_key("x") || !obj.contains_key("y") || !obj.contains_key("z") {
            return None;
        }
        Some(Self::new(
            field("x"),
            field("y"),
            field("z"),
            field("rx"),
            field("ry"),
            field("rz"),
        ))
    }
}

impl fmt::Display for Pose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "(x={:.4}, y={:.4}, z={:.4}, rx={:.1}, ry={:.1}, rz={:.1})",
            self.x, self.y, self.z, self.rx, self.ry, self.rz
        )
    }
}

/// Absolute error per controlled axis, in meters
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AxisError {
    pub dx: f64,
    pub dy: f64,
    pub dz: f64,
}

impl AxisError {
    /// True when every axis is within tolerance
    pub fn within(&self, tolerance: f64) -> bool {
        self.dx <= tolerance && self.dy <= tolerance && self.dz <= tolerance
    }
}

impl fmt::Display for AxisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(dx={:.4}, dy={:.4}, dz={:.4})", self.dx, self.dy, self.dz)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corrections_produce_new_pose() {
        let pick = Pose::new(1.2, 1.55, 1.08, 0.0, 0.0, 0.0);
        let above = pick.raised(0.1);

        assert!((above.z - 1.18).abs() < 1e-12);
        assert_eq!(pick.z, 1.08);
        assert!((pick.shifted_x(-0.01).x - 1.19).abs() < 1e-12);
        assert_eq!(pick.at_z(1.15).z, 1.15);
    }

    #[test]
    fn test_position_error_within() {
        let target = Pose::xyz(0.1, 0.2, 0.3);
        let current = Pose::xyz(0.115, 0.2, 0.28);
        let err = current.position_error(&target);

        assert!(err.within(0.020));
        assert!(!err.within(0.010));
    }

    #[test]
    fn test_json_round() {
        let pose = Pose::new(0.8, 0.22, 1.15, 90.0, -90.0, 0.0);
        assert_eq!(Pose::from_json(&pose.to_json()), Some(pose));

        let partial = json!({ "x": 1.0, "y": 2.0, "z": 3.0 });
        assert_eq!(Pose::from_json(&partial), Some(Pose::xyz(1.0, 2.0, 3.0)));

        assert_eq!(Pose::from_json(&json!({ "x": 1.0 })), None);
        assert_eq!(Pose::from_json(&json!([1, 2, 3])), None);
    }
}
