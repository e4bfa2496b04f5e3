//! Device registry - resolve configured titles into typed handles

use std::collections::HashMap;
use std::sync::Arc;

use thingclient::{Directory, HttpThing, Thing, ThingError};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::{Actuator, ColorSensor, Conveyor, Light, ProximitySensor};
use crate::config::{Config, DevicesConfig};

/// Errors that abort startup
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Missing required devices {missing:?} (required: {required:?}, found: {found:?})")]
    MissingDevices {
        required: Vec<String>,
        missing: Vec<String>,
        found: Vec<String>,
    },

    #[error("Device {title} is not an arm: no goTo or goToPosition action")]
    NotAnActuator { title: String },

    #[error("Device discovery failed: {0}")]
    Discovery(#[from] ThingError),
}

impl StartupError {
    /// Only discovery can succeed on a later attempt
    pub fn is_retryable(&self) -> bool {
        match self {
            StartupError::Discovery(e) => e.is_retryable(),
            StartupError::MissingDevices { .. } | StartupError::NotAnActuator { .. } => false,
        }
    }
}

/// Query the directory once and bind every listed Thing over HTTP
pub async fn discover_things(config: &Config, url: Option<&str>) -> Result<Vec<Arc<dyn Thing>>, StartupError> {
    let url = url.unwrap_or(&config.directory.url);
    let directory = Directory::with_timeout(url, config.directory.timeout())?;
    let descriptions = directory.fetch().await?;
    info!(url, count = descriptions.len(), "Discovered devices");

    let device_timeout = config.directory.device_timeout();
    let mut things: Vec<Arc<dyn Thing>> = Vec::with_capacity(descriptions.len());
    for td in descriptions {
        things.push(Arc::new(HttpThing::with_timeout(td, device_timeout)?));
    }
    Ok(things)
}

fn index(things: Vec<Arc<dyn Thing>>) -> HashMap<String, Arc<dyn Thing>> {
    things.into_iter().map(|t| (t.title().to_string(), t)).collect()
}

fn sorted_titles(by_title: &HashMap<String, Arc<dyn Thing>>) -> Vec<String> {
    let mut titles: Vec<String> = by_title.keys().cloned().collect();
    titles.sort();
    titles
}

fn check_required(by_title: &HashMap<String, Arc<dyn Thing>>, required: &[&str]) -> Result<(), StartupError> {
    let missing: Vec<String> = required
        .iter()
        .filter(|t| !by_title.contains_key(**t))
        .map(|t| t.to_string())
        .collect();
    if missing.is_empty() {
        return Ok(());
    }
    Err(StartupError::MissingDevices {
        required: required.iter().map(|t| t.to_string()).collect(),
        missing,
        found: sorted_titles(by_title),
    })
}

fn actuator(by_title: &HashMap<String, Arc<dyn Thing>>, title: &str) -> Result<Actuator, StartupError> {
    let thing = by_title[title].clone();
    Actuator::new(thing).ok_or_else(|| StartupError::NotAnActuator {
        title: title.to_string(),
    })
}

fn optional_sensor(by_title: &HashMap<String, Arc<dyn Thing>>, title: &str) -> Option<ProximitySensor> {
    match by_title.get(title) {
        Some(thing) => Some(ProximitySensor::new(thing.clone())),
        None => {
            warn!(title, "Optional sensor not found, using fixed delays");
            None
        }
    }
}

/// Every device the three stages use
#[derive(Clone)]
pub struct Devices {
    pub loader_arm: Actuator,
    pub transfer_arm: Actuator,
    pub sorter_arm: Actuator,
    pub belt_a: Conveyor,
    pub belt_b: Conveyor,
    pub color_sensor: ColorSensor,
    pub belt_a_arrival: Option<ProximitySensor>,
    pub belt_a_stop: Option<ProximitySensor>,
    pub belt_b_arrival: Option<ProximitySensor>,
    pub belt_b_stop: Option<ProximitySensor>,
}

impl Devices {
    /// Resolve every role; fails when a required title is absent
    pub fn register(roles: &DevicesConfig, things: Vec<Arc<dyn Thing>>) -> Result<Self, StartupError> {
        debug!(count = things.len(), "Devices::register: called");
        let by_title = index(things);
        check_required(&by_title, &roles.required())?;

        let devices = Self {
            loader_arm: actuator(&by_title, &roles.loader_arm)?,
            transfer_arm: actuator(&by_title, &roles.transfer_arm)?,
            sorter_arm: actuator(&by_title, &roles.sorter_arm)?,
            belt_a: Conveyor::new(by_title[&roles.belt_a].clone()),
            belt_b: Conveyor::new(by_title[&roles.belt_b].clone()),
            color_sensor: ColorSensor::new(by_title[&roles.color_sensor].clone()),
            belt_a_arrival: optional_sensor(&by_title, &roles.belt_a_arrival_sensor),
            belt_a_stop: optional_sensor(&by_title, &roles.belt_a_stop_sensor),
            belt_b_arrival: optional_sensor(&by_title, &roles.belt_b_arrival_sensor),
            belt_b_stop: optional_sensor(&by_title, &roles.belt_b_stop_sensor),
        };
        info!(
            loader = ?devices.loader_arm.kind(),
            transfer = ?devices.transfer_arm.kind(),
            sorter = ?devices.sorter_arm.kind(),
            "Devices registered"
        );
        Ok(devices)
    }
}

/// Devices the light observers use
#[derive(Clone)]
pub struct LightDevices {
    pub color_sensor: ColorSensor,
    pub red: Light,
    pub blue: Light,
}

impl LightDevices {
    pub fn register(roles: &DevicesConfig, things: Vec<Arc<dyn Thing>>) -> Result<Self, StartupError> {
        let by_title = index(things);
        check_required(
            &by_title,
            &[roles.color_sensor.as_str(), roles.red_light.as_str(), roles.blue_light.as_str()],
        )?;
        Ok(Self {
            color_sensor: ColorSensor::new(by_title[&roles.color_sensor].clone()),
            red: Light::new(by_title[&roles.red_light].clone()),
            blue: Light::new(by_title[&roles.blue_light].clone()),
        })
    }
}

/// Report which roles are satisfied by a set of titles
pub fn role_report(roles: &DevicesConfig, titles: &[String]) -> Vec<(String, bool, bool)> {
    let mut rows = Vec::new();
    for title in roles.required() {
        rows.push((title.to_string(), true, titles.iter().any(|t| t == title)));
    }
    for title in roles.optional().into_iter().chain([roles.red_light.as_str(), roles.blue_light.as_str()]) {
        rows.push((title.to_string(), false, titles.iter().any(|t| t == title)));
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::ActuatorKind;
    use async_trait::async_trait;
    use serde_json::Value;
    use thingclient::{ActionAffordance, Form, PropertyAffordance, ThingDescription};

    struct Stub(ThingDescription);

    #[async_trait]
    impl Thing for Stub {
        fn description(&self) -> &ThingDescription {
            &self.0
        }

        async fn invoke_action(&self, _name: &str, _input: Option<Value>) -> Result<Value, ThingError> {
            Ok(Value::Null)
        }

        async fn read_property(&self, _name: &str) -> Result<Value, ThingError> {
            Ok(Value::Null)
        }

        async fn write_property(&self, _name: &str, _value: Value) -> Result<(), ThingError> {
            Ok(())
        }
    }

    fn action() -> ActionAffordance {
        ActionAffordance {
            input: None,
            forms: vec![Form::new("x")],
        }
    }

    fn stub(td: ThingDescription) -> Arc<dyn Thing> {
        Arc::new(Stub(td))
    }

    fn full_line(roles: &DevicesConfig) -> Vec<Arc<dyn Thing>> {
        let uarm = |title: &str| {
            stub(ThingDescription::new(title)
                .with_action("goTo", action())
                .with_property("currentPosition", PropertyAffordance::default()))
        };
        vec![
            uarm(&roles.loader_arm),
            uarm(&roles.transfer_arm),
            stub(ThingDescription::new(&roles.sorter_arm).with_action("goToPosition", action())),
            stub(ThingDescription::new(&roles.belt_a)),
            stub(ThingDescription::new(&roles.belt_b)),
            stub(ThingDescription::new(&roles.color_sensor)),
            stub(ThingDescription::new(&roles.belt_a_stop_sensor)),
        ]
    }

    #[test]
    fn test_register_full_line() {
        let roles = DevicesConfig::default();
        let devices = Devices::register(&roles, full_line(&roles)).unwrap();

        assert_eq!(devices.loader_arm.kind(), ActuatorKind::PositionOnly);
        assert_eq!(devices.sorter_arm.kind(), ActuatorKind::FullPose);
        assert!(devices.belt_a_stop.is_some());
        assert!(devices.belt_a_arrival.is_none());
        assert!(devices.belt_b_stop.is_none());
    }

    #[test]
    fn test_missing_required_lists_required_and_found() {
        let roles = DevicesConfig::default();
        let mut things = full_line(&roles);
        things.retain(|t| t.title() != roles.color_sensor);

        let err = Devices::register(&roles, things).err().unwrap();
        match &err {
            StartupError::MissingDevices { required, missing, found } => {
                assert_eq!(missing, &vec!["VirtualColorSensor".to_string()]);
                assert_eq!(required.len(), 6);
                assert!(found.contains(&"VirtualUR3".to_string()));
                assert!(!found.contains(&"VirtualColorSensor".to_string()));
            }
            other => panic!("unexpected error: {}", other),
        }
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("VirtualColorSensor"));
    }

    #[test]
    fn test_arm_role_must_be_an_arm() {
        let mut roles = DevicesConfig::default();
        roles.sorter_arm = roles.belt_a.clone();
        let err = Devices::register(&roles, full_line(&roles)).err().unwrap();
        assert!(matches!(err, StartupError::NotAnActuator { .. }));
    }

    #[test]
    fn test_role_report() {
        let roles = DevicesConfig::default();
        let titles = vec!["VirtualUR3".to_string(), "virtualLightRed".to_string()];
        let report = role_report(&roles, &titles);

        assert!(report.contains(&("VirtualUR3".to_string(), true, true)));
        assert!(report.contains(&("VirtualUarm1".to_string(), true, false)));
        assert!(report.contains(&("virtualLightRed".to_string(), false, true)));
        assert_eq!(report.len(), 12);
    }
}
