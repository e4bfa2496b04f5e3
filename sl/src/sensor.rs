//! Sensor monitor - fail-safe reads of presence, distance and color
//!
//! Read failures never propagate. A failed presence read means nothing is
//! there, a failed distance read means no distance.

use serde_json::Value;
use tracing::{debug, warn};

use crate::color::{CubeColor, Rgb, classify};
use crate::device::{ColorSensor, ProximitySensor};
use crate::units::{self, Unit};

/// Raw readings below this, when declared in millimeters, are already meters
///
/// Some sensors declare millimeters but report meters. The stop-distance
/// calibration depends on this rule.
pub const MILLIMETER_SANITY_LIMIT: f64 = 10.0;

/// One combined proximity reading in canonical units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorReading {
    pub presence: bool,
    pub distance: Option<f64>,
}

fn as_presence(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|v| v != 0.0),
        _ => false,
    }
}

/// Normalize a raw distance to meters using the declared unit
pub fn normalize_distance(raw: f64, declared: &str) -> f64 {
    if Unit::parse(declared) == Some(Unit::Millimeter) && raw < MILLIMETER_SANITY_LIMIT {
        return raw;
    }
    units::to_canonical(raw, declared)
}

/// Presence, false on any read failure
pub async fn read_presence(sensor: &ProximitySensor) -> bool {
    match sensor.raw_presence().await {
        Ok(value) => as_presence(&value),
        Err(e) => {
            warn!(sensor = %sensor.title(), error = %e, "Presence read failed, treating as absent");
            false
        }
    }
}

/// Distance in meters, `None` on read failure or a non-numeric value
pub async fn read_distance(sensor: &ProximitySensor) -> Option<f64> {
    match sensor.raw_distance().await {
        Ok(value) => {
            let raw = value.as_f64()?;
            let meters = normalize_distance(raw, sensor.distance_unit());
            debug!(sensor = %sensor.title(), raw, meters, "read_distance: normalized");
            Some(meters)
        }
        Err(e) => {
            warn!(sensor = %sensor.title(), error = %e, "Distance read failed");
            None
        }
    }
}

/// Presence and distance together; the two reads fail independently
pub async fn read(sensor: &ProximitySensor) -> SensorReading {
    SensorReading {
        presence: read_presence(sensor).await,
        distance: read_distance(sensor).await,
    }
}

/// Color sensor presence, false on failure
pub async fn read_color_presence(sensor: &ColorSensor) -> bool {
    match sensor.raw_presence().await {
        Ok(value) => as_presence(&value),
        Err(e) => {
            warn!(sensor = %sensor.title(), error = %e, "Color presence read failed, treating as absent");
            false
        }
    }
}

/// Raw RGB sample, `None` on failure or a malformed value
pub async fn read_rgb(sensor: &ColorSensor) -> Option<Rgb> {
    match sensor.raw_color().await {
        Ok(value) => {
            let rgb = Rgb::from_json(&value);
            if rgb.is_none() {
                warn!(sensor = %sensor.title(), %value, "Malformed color value");
            }
            rgb
        }
        Err(e) => {
            warn!(sensor = %sensor.title(), error = %e, "Color read failed");
            None
        }
    }
}

/// Classified color, `Unknown` when the sample cannot be read
pub async fn read_color(sensor: &ColorSensor) -> CubeColor {
    read_rgb(sensor).await.map(classify).unwrap_or(CubeColor::Unknown)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Arc;
    use thingclient::{PropertyAffordance, Thing, ThingDescription, ThingError};

    /// Sensor returning fixed values, or failing every read
    struct FixedSensor {
        td: ThingDescription,
        presence: Option<Value>,
        distance: Option<Value>,
        color: Option<Value>,
    }

    impl FixedSensor {
        fn new(unit: &str) -> Self {
            let td = ThingDescription::new("VirtualInfraredSensor1").with_property(
                "objectDistance",
                PropertyAffordance {
                    unit: Some(unit.to_string()),
                    ..Default::default()
                },
            );
            Self {
                td,
                presence: None,
                distance: None,
                color: None,
            }
        }
    }

    #[async_trait]
    impl Thing for FixedSensor {
        fn description(&self) -> &ThingDescription {
            &self.td
        }

        async fn invoke_action(&self, name: &str, _input: Option<Value>) -> Result<Value, ThingError> {
            Err(ThingError::MissingAffordance {
                thing: self.td.title.clone(),
                kind: "action",
                name: name.to_string(),
            })
        }

        async fn read_property(&self, name: &str) -> Result<Value, ThingError> {
            let value = match name {
                "objectPresence" => self.presence.clone(),
                "objectDistance" => self.distance.clone(),
                "color" => self.color.clone(),
                _ => None,
            };
            value.ok_or_else(|| ThingError::Status {
                thing: self.td.title.clone(),
                status: 500,
                message: "sensor offline".to_string(),
            })
        }

        async fn write_property(&self, _name: &str, _value: Value) -> Result<(), ThingError> {
            Ok(())
        }
    }

    #[test]
    fn test_millimeter_heuristic() {
        // Declared mm, implausibly small: already meters
        assert_eq!(normalize_distance(0.275, "millimeter"), 0.275);
        assert_eq!(normalize_distance(9.99, "mm"), 9.99);
        // Plausible millimeters convert
        assert!((normalize_distance(275.0, "mm") - 0.275).abs() < 1e-12);
        assert!((normalize_distance(10.0, "mm") - 0.01).abs() < 1e-12);
        // Other units are untouched by the rule
        assert!((normalize_distance(5.0, "cm") - 0.05).abs() < 1e-12);
        assert_eq!(normalize_distance(0.3, "furlong"), 0.3);
    }

    #[tokio::test]
    async fn test_failed_reads_are_fail_safe() {
        let sensor = ProximitySensor::new(Arc::new(FixedSensor::new("mm")));
        assert!(!read_presence(&sensor).await);
        assert_eq!(read_distance(&sensor).await, None);
        assert_eq!(
            read(&sensor).await,
            SensorReading {
                presence: false,
                distance: None
            }
        );

        let color = ColorSensor::new(Arc::new(FixedSensor::new("mm")));
        assert!(!read_color_presence(&color).await);
        assert_eq!(read_color(&color).await, CubeColor::Unknown);
    }

    #[tokio::test]
    async fn test_reads_fail_independently() {
        let mut fixed = FixedSensor::new("millimeter");
        fixed.presence = Some(json!(true));
        let sensor = ProximitySensor::new(Arc::new(fixed));

        let reading = read(&sensor).await;
        assert!(reading.presence);
        assert_eq!(reading.distance, None);
    }

    #[tokio::test]
    async fn test_distance_uses_declared_unit() {
        let mut fixed = FixedSensor::new("millimeter");
        fixed.distance = Some(json!(280.0));
        let sensor = ProximitySensor::new(Arc::new(fixed));
        assert_eq!(sensor.distance_unit(), "millimeter");

        let meters = read_distance(&sensor).await.unwrap();
        assert!((meters - 0.28).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_color_read_classifies() {
        let mut fixed = FixedSensor::new("mm");
        fixed.presence = Some(json!(1));
        fixed.color = Some(json!([10, 20, 230]));
        let sensor = ColorSensor::new(Arc::new(fixed));

        assert!(read_color_presence(&sensor).await);
        assert_eq!(read_color(&sensor).await, CubeColor::Blue);
    }
}
