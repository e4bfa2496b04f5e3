//! In-process simulated line
//!
//! Every device of the line is a [`Thing`] backed by one shared scene. The
//! position-only arms take commands and report feedback in millimeters, the
//! full-pose arm blocks until its move finishes, and the proximity sensors
//! declare millimeters while reporting meters.

mod world;

pub use world::{ARRIVAL_AT, ArmRole, BeltId, Released, SENSOR_AT, STOP_RANGE, World};

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::{Value, json};
use thingclient::{ActionAffordance, DataSchema, Form, PropertyAffordance, Thing, ThingDescription, ThingError};
use tokio::time::Instant;
use tracing::debug;

use crate::color::CubeColor;
use crate::config::Config;
use crate::pose::Pose;
use crate::units::PoseUnits;

#[derive(Debug, Clone, Copy)]
enum Device {
    PositionArm(ArmRole),
    FullPoseArm(ArmRole),
    Belt(BeltId),
    ArrivalSensor(BeltId),
    StopSensor(BeltId),
    ColorSensor,
}

fn action(title: &str, name: &str) -> ActionAffordance {
    ActionAffordance {
        input: None,
        forms: vec![Form::new(format!("sim://{}/actions/{}", title, name))],
    }
}

fn property(title: &str, name: &str) -> PropertyAffordance {
    PropertyAffordance {
        forms: vec![Form::new(format!("sim://{}/properties/{}", title, name))],
        ..Default::default()
    }
}

fn describe(title: &str, device: Device) -> ThingDescription {
    let td = ThingDescription::new(title);
    match device {
        Device::PositionArm(_) => {
            let units = [("x", "millimeter"), ("y", "millimeter"), ("z", "millimeter")];
            td.with_action(
                "goTo",
                ActionAffordance {
                    input: Some(DataSchema::object_with_units(&units)),
                    ..action(title, "goTo")
                },
            )
            .with_action("gripOpen", action(title, "gripOpen"))
            .with_action("gripClose", action(title, "gripClose"))
            .with_property(
                "currentPosition",
                PropertyAffordance {
                    properties: DataSchema::object_with_units(&units).properties,
                    ..property(title, "currentPosition")
                },
            )
        }
        Device::FullPoseArm(_) => td
            .with_action("goToPosition", action(title, "goToPosition"))
            .with_action("openGripper", action(title, "openGripper"))
            .with_action("closeGripper", action(title, "closeGripper"))
            .with_property("currentPosition", property(title, "currentPosition")),
        Device::Belt(_) => td
            .with_action("startBeltForward", action(title, "startBeltForward"))
            .with_action("stopBelt", action(title, "stopBelt")),
        Device::ArrivalSensor(_) | Device::StopSensor(_) => td
            .with_property("objectPresence", property(title, "objectPresence"))
            .with_property(
                "objectDistance",
                PropertyAffordance {
                    unit: Some("millimeter".to_string()),
                    ..property(title, "objectDistance")
                },
            ),
        Device::ColorSensor => td
            .with_property("objectPresence", property(title, "objectPresence"))
            .with_property("color", property(title, "color")),
    }
}

struct SimThing {
    td: ThingDescription,
    device: Device,
    units: PoseUnits,
    world: Arc<Mutex<World>>,
}

impl SimThing {
    fn new(title: &str, device: Device, world: Arc<Mutex<World>>) -> Self {
        let td = describe(title, device);
        let units = PoseUnits::from_property(&td, "currentPosition");
        Self {
            td,
            device,
            units,
            world,
        }
    }

    fn world(&self) -> MutexGuard<'_, World> {
        self.world.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn missing(&self, kind: &'static str, name: &str) -> ThingError {
        ThingError::MissingAffordance {
            thing: self.td.title.clone(),
            kind,
            name: name.to_string(),
        }
    }

    fn target(&self, name: &str, input: Option<Value>) -> Result<Pose, ThingError> {
        let value = input.unwrap_or(Value::Null);
        let native = Pose::from_json(&value).ok_or_else(|| ThingError::Rejected {
            thing: self.td.title.clone(),
            name: name.to_string(),
            message: format!("expected a pose, got {}", value),
        })?;
        Ok(self.units.to_canonical(&native))
    }
}

#[async_trait]
impl Thing for SimThing {
    fn description(&self) -> &ThingDescription {
        &self.td
    }

    async fn invoke_action(&self, name: &str, input: Option<Value>) -> Result<Value, ThingError> {
        let now = Instant::now();
        match (self.device, name) {
            (Device::PositionArm(role), "goTo") => {
                let target = self.target(name, input)?;
                self.world().start_move(role, target, now);
            }
            (Device::FullPoseArm(role), "goToPosition") => {
                let target = self.target(name, input)?;
                let duration = self.world().start_move(role, target, now);
                tokio::time::sleep(duration).await;
            }
            (Device::PositionArm(role), "gripOpen") | (Device::FullPoseArm(role), "openGripper") => {
                self.world().open_gripper(role, now);
            }
            (Device::PositionArm(role), "gripClose") | (Device::FullPoseArm(role), "closeGripper") => {
                self.world().close_gripper(role, now);
            }
            (Device::Belt(id), "startBeltForward") => self.world().set_belt(id, true, now),
            (Device::Belt(id), "stopBelt") => self.world().set_belt(id, false, now),
            _ => return Err(self.missing("action", name)),
        }
        Ok(Value::Null)
    }

    async fn read_property(&self, name: &str) -> Result<Value, ThingError> {
        let now = Instant::now();
        let value = match (self.device, name) {
            (Device::PositionArm(role) | Device::FullPoseArm(role), "currentPosition") => {
                let pose = self.world().arm_position(role, now);
                self.units.from_canonical(&pose).to_json()
            }
            (Device::ArrivalSensor(id), "objectPresence") => json!(self.world().arrival_presence(id, now)),
            (Device::ArrivalSensor(_), "objectDistance") => json!(STOP_RANGE),
            (Device::StopSensor(id), "objectPresence") => json!(self.world().stop_reading(id, now).0),
            // Declared millimeters, reported meters
            (Device::StopSensor(id), "objectDistance") => json!(self.world().stop_reading(id, now).1),
            (Device::ColorSensor, "objectPresence") => json!(self.world().color_in_view(now).is_some()),
            (Device::ColorSensor, "color") => {
                let rgb = self.world().color_in_view(now).map(|c| c.rgb());
                rgb.map(|c| c.to_json()).unwrap_or_else(|| json!([0, 0, 0]))
            }
            _ => return Err(self.missing("property", name)),
        };
        debug!(thing = %self.td.title, name, %value, "sim: read");
        Ok(value)
    }

    async fn write_property(&self, name: &str, _value: Value) -> Result<(), ThingError> {
        Err(self.missing("property", name))
    }
}

/// A complete simulated line, one Thing per configured device title
pub struct SimLine {
    world: Arc<Mutex<World>>,
    things: Vec<Arc<dyn Thing>>,
}

impl SimLine {
    pub fn new(config: &Config) -> Self {
        let world = Arc::new(Mutex::new(World::new(config)));
        let roles = &config.devices;
        let layout = [
            (&roles.loader_arm, Device::PositionArm(ArmRole::Loader)),
            (&roles.transfer_arm, Device::PositionArm(ArmRole::Transfer)),
            (&roles.sorter_arm, Device::FullPoseArm(ArmRole::Sorter)),
            (&roles.belt_a, Device::Belt(BeltId::A)),
            (&roles.belt_b, Device::Belt(BeltId::B)),
            (&roles.belt_a_arrival_sensor, Device::ArrivalSensor(BeltId::A)),
            (&roles.belt_a_stop_sensor, Device::StopSensor(BeltId::A)),
            (&roles.belt_b_arrival_sensor, Device::ArrivalSensor(BeltId::B)),
            (&roles.belt_b_stop_sensor, Device::StopSensor(BeltId::B)),
            (&roles.color_sensor, Device::ColorSensor),
        ];
        let things = layout
            .into_iter()
            .map(|(title, device)| Arc::new(SimThing::new(title, device, world.clone())) as Arc<dyn Thing>)
            .collect();
        Self { world, things }
    }

    pub fn things(&self) -> Vec<Arc<dyn Thing>> {
        self.things.clone()
    }

    /// Cubes the sorting arm let go of, in order
    pub fn released(&self) -> Vec<Released> {
        self.world
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .released()
            .to_vec()
    }

    pub fn released_colors(&self) -> Vec<CubeColor> {
        self.released().iter().map(|r| r.color).collect()
    }

    /// Cubes dropped outside a station or off a belt
    pub fn lost(&self) -> u32 {
        self.world.lock().unwrap_or_else(PoisonError::into_inner).lost()
    }
}
