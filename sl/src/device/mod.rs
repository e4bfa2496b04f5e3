//! Typed device handles over consumed Things
//!
//! Each handle wraps a [`Thing`] and resolves everything that depends on
//! its description (actuator kind, unit tags) once, at registration.
//! After that, dispatch is a match on [`ActuatorKind`], never a title check.

mod registry;

pub use registry::{Devices, LightDevices, StartupError, discover_things, role_report};

use std::sync::Arc;

use serde_json::{Value, json};
use thingclient::{Thing, ThingError};
use tracing::debug;

use crate::color::Rgb;
use crate::pose::Pose;
use crate::units::PoseUnits;

/// How an actuator reports motion completion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorKind {
    /// 3-DOF arm; the move call returns at once and completion is polled
    PositionOnly,
    /// 6-DOF arm; the move call resolves when the motion is done
    FullPose,
}

impl ActuatorKind {
    /// Resolve the kind from the shape of a Thing Description
    ///
    /// A `goToPosition` action means a full-pose arm, a `goTo` action with
    /// `currentPosition` feedback means a position-only arm. Descriptions
    /// matching neither fall back to the title.
    pub fn resolve(td: &thingclient::ThingDescription) -> Option<Self> {
        if td.has_action("goToPosition") {
            Some(ActuatorKind::FullPose)
        } else if td.has_action("goTo") && td.has_property("currentPosition") {
            Some(ActuatorKind::PositionOnly)
        } else if td.title.to_lowercase().contains("uarm") {
            Some(ActuatorKind::PositionOnly)
        } else {
            None
        }
    }

    pub fn move_action(&self) -> &'static str {
        match self {
            ActuatorKind::PositionOnly => "goTo",
            ActuatorKind::FullPose => "goToPosition",
        }
    }

    pub fn open_action(&self) -> &'static str {
        match self {
            ActuatorKind::PositionOnly => "gripOpen",
            ActuatorKind::FullPose => "openGripper",
        }
    }

    pub fn close_action(&self) -> &'static str {
        match self {
            ActuatorKind::PositionOnly => "gripClose",
            ActuatorKind::FullPose => "closeGripper",
        }
    }
}

/// Feedback property of position-only arms
pub const CURRENT_POSITION: &str = "currentPosition";

/// A robot arm with a gripper
#[derive(Clone)]
pub struct Actuator {
    thing: Arc<dyn Thing>,
    kind: ActuatorKind,
    command_units: PoseUnits,
    feedback_units: PoseUnits,
}

impl Actuator {
    /// Wrap a Thing, `None` when it does not look like an arm
    pub fn new(thing: Arc<dyn Thing>) -> Option<Self> {
        let td = thing.description();
        let kind = ActuatorKind::resolve(td)?;
        let command_units = PoseUnits::from_action_input(td, kind.move_action());
        let feedback_units = PoseUnits::from_property(td, CURRENT_POSITION);
        debug!(title = %td.title, ?kind, ?command_units, ?feedback_units, "Actuator::new: resolved");
        Some(Self {
            thing,
            kind,
            command_units,
            feedback_units,
        })
    }

    pub fn title(&self) -> &str {
        self.thing.title()
    }

    pub fn kind(&self) -> ActuatorKind {
        self.kind
    }

    /// Issue a move command in device-native units
    ///
    /// Position-only arms receive x, y, z only.
    pub async fn command_move(&self, target: &Pose) -> Result<(), ThingError> {
        let native = self.command_units.from_canonical(target);
        let input = match self.kind {
            ActuatorKind::PositionOnly => native.position_json(),
            ActuatorKind::FullPose => native.to_json(),
        };
        debug!(title = %self.title(), %target, %input, "command_move: called");
        self.thing.invoke_action(self.kind.move_action(), Some(input)).await?;
        Ok(())
    }

    /// Read position feedback in canonical units
    pub async fn read_position(&self) -> Result<Pose, ThingError> {
        let value = self.thing.read_property(CURRENT_POSITION).await?;
        let raw = Pose::from_json(&value).ok_or_else(|| ThingError::InvalidValue {
            thing: self.title().to_string(),
            name: CURRENT_POSITION.to_string(),
            message: format!("expected an object with x, y, z, got {}", value),
        })?;
        Ok(self.feedback_units.to_canonical(&raw))
    }

    pub async fn open_gripper(&self) -> Result<(), ThingError> {
        debug!(title = %self.title(), "open_gripper: called");
        self.thing.invoke_action(self.kind.open_action(), None).await?;
        Ok(())
    }

    pub async fn close_gripper(&self) -> Result<(), ThingError> {
        debug!(title = %self.title(), "close_gripper: called");
        self.thing.invoke_action(self.kind.close_action(), None).await?;
        Ok(())
    }
}

/// A conveyor belt
#[derive(Clone)]
pub struct Conveyor {
    thing: Arc<dyn Thing>,
}

impl Conveyor {
    pub fn new(thing: Arc<dyn Thing>) -> Self {
        Self { thing }
    }

    pub fn title(&self) -> &str {
        self.thing.title()
    }

    pub async fn start(&self) -> Result<(), ThingError> {
        debug!(title = %self.title(), "Conveyor::start: called");
        self.thing.invoke_action("startBeltForward", None).await?;
        Ok(())
    }

    pub async fn stop(&self) -> Result<(), ThingError> {
        debug!(title = %self.title(), "Conveyor::stop: called");
        self.thing.invoke_action("stopBelt", None).await?;
        Ok(())
    }
}

/// A proximity sensor with binary presence and analog distance
#[derive(Clone)]
pub struct ProximitySensor {
    thing: Arc<dyn Thing>,
    distance_unit: String,
}

impl ProximitySensor {
    pub fn new(thing: Arc<dyn Thing>) -> Self {
        let distance_unit = thing
            .description()
            .property_unit("objectDistance")
            .unwrap_or("meter")
            .to_string();
        Self { thing, distance_unit }
    }

    pub fn title(&self) -> &str {
        self.thing.title()
    }

    /// Unit declared for `objectDistance`
    pub fn distance_unit(&self) -> &str {
        &self.distance_unit
    }

    pub(crate) async fn raw_presence(&self) -> Result<Value, ThingError> {
        self.thing.read_property("objectPresence").await
    }

    pub(crate) async fn raw_distance(&self) -> Result<Value, ThingError> {
        self.thing.read_property("objectDistance").await
    }
}

/// The color sensor in front of the sorting arm
#[derive(Clone)]
pub struct ColorSensor {
    thing: Arc<dyn Thing>,
}

impl ColorSensor {
    pub fn new(thing: Arc<dyn Thing>) -> Self {
        Self { thing }
    }

    pub fn title(&self) -> &str {
        self.thing.title()
    }

    pub(crate) async fn raw_presence(&self) -> Result<Value, ThingError> {
        self.thing.read_property("objectPresence").await
    }

    pub(crate) async fn raw_color(&self) -> Result<Value, ThingError> {
        self.thing.read_property("color").await
    }
}

/// A signal light
#[derive(Clone)]
pub struct Light {
    thing: Arc<dyn Thing>,
}

impl Light {
    pub fn new(thing: Arc<dyn Thing>) -> Self {
        Self { thing }
    }

    pub fn title(&self) -> &str {
        self.thing.title()
    }

    pub async fn set_on(&self, on: bool) -> Result<(), ThingError> {
        debug!(title = %self.title(), on, "Light::set_on: called");
        self.thing.write_property("lightState", json!(on)).await
    }

    pub async fn set_color(&self, rgb: Rgb) -> Result<(), ThingError> {
        debug!(title = %self.title(), ?rgb, "Light::set_color: called");
        self.thing.write_property("lightColor", rgb.to_json()).await
    }
}
