//! Unit normalization between device-native and canonical units
//!
//! Canonical units are meters for linear quantities and degrees for
//! angular ones. Devices declare their native unit per field in the Thing
//! Description; tags are matched case-insensitively with common synonyms.
//! An unrecognized tag is treated as already canonical and passes through.

use std::f64::consts::PI;

use thingclient::ThingDescription;

use crate::pose::Pose;

/// A recognized unit tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Meter,
    Centimeter,
    Millimeter,
    Degree,
    Radian,
}

impl Unit {
    /// Parse a unit tag, `None` when unrecognized
    pub fn parse(tag: &str) -> Option<Self> {
        match tag.trim().to_lowercase().as_str() {
            "m" | "meter" | "meters" | "metre" | "metres" => Some(Unit::Meter),
            "cm" | "centimeter" | "centimeters" | "centimetre" | "centimetres" => Some(Unit::Centimeter),
            "mm" | "millimeter" | "millimeters" | "millimetre" | "millimetres" => Some(Unit::Millimeter),
            "deg" | "degree" | "degrees" | "°" => Some(Unit::Degree),
            "rad" | "radian" | "radians" => Some(Unit::Radian),
            _ => None,
        }
    }

    /// Multiplier taking a value in this unit to its canonical unit
    fn canonical_factor(self) -> f64 {
        match self {
            Unit::Meter | Unit::Degree => 1.0,
            Unit::Centimeter => 0.01,
            Unit::Millimeter => 0.001,
            Unit::Radian => 180.0 / PI,
        }
    }
}

/// Convert a device-native value to canonical units
pub fn to_canonical(value: f64, tag: &str) -> f64 {
    match Unit::parse(tag) {
        Some(unit) => value * unit.canonical_factor(),
        None => value,
    }
}

/// Convert a canonical value to device-native units
pub fn from_canonical(value: f64, tag: &str) -> f64 {
    match Unit::parse(tag) {
        Some(unit) => value / unit.canonical_factor(),
        None => value,
    }
}

/// Per-axis unit tags for a pose-shaped field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoseUnits {
    pub x: String,
    pub y: String,
    pub z: String,
    pub rx: String,
    pub ry: String,
    pub rz: String,
}

impl Default for PoseUnits {
    fn default() -> Self {
        Self {
            x: "meter".to_string(),
            y: "meter".to_string(),
            z: "meter".to_string(),
            rx: "degree".to_string(),
            ry: "degree".to_string(),
            rz: "degree".to_string(),
        }
    }
}

impl PoseUnits {
    /// Units declared on the input fields of an action
    pub fn from_action_input(td: &ThingDescription, action: &str) -> Self {
        Self::collect(|field| td.action_input_unit(action, field))
    }

    /// Units declared on the fields of an object-valued property
    pub fn from_property(td: &ThingDescription, property: &str) -> Self {
        Self::collect(|field| td.property_field_unit(property, field))
    }

    fn collect<'a>(lookup: impl Fn(&str) -> Option<&'a str>) -> Self {
        let defaults = Self::default();
        let pick = |field: &str, fallback: String| lookup(field).map(str::to_string).unwrap_or(fallback);
        Self {
            x: pick("x", defaults.x),
            y: pick("y", defaults.y),
            z: pick("z", defaults.z),
            rx: pick("rx", defaults.rx),
            ry: pick("ry", defaults.ry),
            rz: pick("rz", defaults.rz),
        }
    }

    /// Device-native pose to canonical
    pub fn to_canonical(&self, raw: &Pose) -> Pose {
        Pose {
            x: to_canonical(raw.x, &self.x),
            y: to_canonical(raw.y, &self.y),
            z: to_canonical(raw.z, &self.z),
            rx: to_canonical(raw.rx, &self.rx),
            ry: to_canonical(raw.ry, &self.ry),
            rz: to_canonical(raw.rz, &self.rz),
        }
    }

    /// Canonical pose to device-native
    pub fn from_canonical(&self, pose: &Pose) -> Pose {
        Pose {
            x: from_canonical(pose.x, &self.x),
            y: from_canonical(pose.y, &self.y),
            z: from_canonical(pose.z, &self.z),
            rx: from_canonical(pose.rx, &self.rx),
            ry: from_canonical(pose.ry, &self.ry),
            rz: from_canonical(pose.rz, &self.rz),
        }
    }
}
