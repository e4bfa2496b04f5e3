//! Color classification by hard channel thresholds

use std::fmt;

use serde::{Deserialize, Serialize};

/// Default channel threshold on a 0-255 scale
pub const DEFAULT_THRESHOLD: u8 = 100;

/// Discrete cube color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CubeColor {
    Red,
    Blue,
    Green,
    Unknown,
}

impl CubeColor {
    /// Colors that count toward a quota
    pub const SORTED: [CubeColor; 3] = [CubeColor::Red, CubeColor::Blue, CubeColor::Green];

    /// Nominal RGB for a color, used to drive lights and the simulator
    pub fn rgb(&self) -> Rgb {
        match self {
            CubeColor::Red => Rgb::new(255, 0, 0),
            CubeColor::Blue => Rgb::new(0, 0, 255),
            CubeColor::Green => Rgb::new(0, 255, 0),
            CubeColor::Unknown => Rgb::new(255, 255, 255),
        }
    }
}

impl fmt::Display for CubeColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CubeColor::Red => "red",
            CubeColor::Blue => "blue",
            CubeColor::Green => "green",
            CubeColor::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// RGB sample from the color sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse a `[r, g, b]` array, clamping channels to 0-255
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        let arr = value.as_array()?;
        if arr.len() < 3 {
            return None;
        }
        let channel = |v: &serde_json::Value| v.as_f64().map(|c| c.clamp(0.0, 255.0).round() as u8);
        Some(Self::new(channel(&arr[0])?, channel(&arr[1])?, channel(&arr[2])?))
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!([self.r, self.g, self.b])
    }
}

/// Classify with the default threshold
pub fn classify(rgb: Rgb) -> CubeColor {
    classify_with(rgb, DEFAULT_THRESHOLD)
}

/// Assign a color only when exactly one channel exceeds the threshold and
/// the other two stay strictly below it
pub fn classify_with(rgb: Rgb, threshold: u8) -> CubeColor {
    let Rgb { r, g, b } = rgb;
    if r > threshold && g < threshold && b < threshold {
        CubeColor::Red
    } else if b > threshold && r < threshold && g < threshold {
        CubeColor::Blue
    } else if g > threshold && r < threshold && b < threshold {
        CubeColor::Green
    } else {
        CubeColor::Unknown
    }
}
