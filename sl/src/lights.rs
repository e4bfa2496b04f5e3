//! Light observers
//!
//! Each observer watches the color sensor and switches its light on, once,
//! the first time a cube of its color is presented. Observers take no part
//! in the stage handshakes; they only read the shared sensor.

use std::time::Duration;

use thingclient::ThingError;
use tracing::{debug, info, warn};

use crate::color::{CubeColor, classify};
use crate::coordinator::RunControl;
use crate::device::{ColorSensor, Light, LightDevices};
use crate::sensor;

/// Watches for one color and lights up once
pub struct LightObserver {
    light: Light,
    color: CubeColor,
    sensor: ColorSensor,
    poll: Duration,
    triggered: bool,
}

impl LightObserver {
    pub fn new(light: Light, color: CubeColor, sensor: ColorSensor, poll: Duration) -> Self {
        Self {
            light,
            color,
            sensor,
            poll,
            triggered: false,
        }
    }

    pub fn triggered(&self) -> bool {
        self.triggered
    }

    /// One observation; returns true when the light was switched on
    pub async fn tick(&mut self) -> Result<bool, ThingError> {
        if self.triggered || !sensor::read_color_presence(&self.sensor).await {
            return Ok(false);
        }
        let Some(rgb) = sensor::read_rgb(&self.sensor).await else {
            return Ok(false);
        };
        let seen = classify(rgb);
        debug!(light = %self.light.title(), %seen, ?rgb, "tick: cube present");
        if seen != self.color {
            return Ok(false);
        }

        self.light.set_on(true).await?;
        self.light.set_color(rgb).await?;
        self.triggered = true;
        info!(light = %self.light.title(), color = %self.color, "Light switched on");
        Ok(true)
    }

    /// Observe until the run stops, then switch the light off
    pub async fn run(mut self, run: RunControl) -> Result<(), ThingError> {
        self.light.set_on(false).await?;
        info!(light = %self.light.title(), color = %self.color, "Observing color sensor");

        while run.sleep(self.poll).await {
            if let Err(e) = self.tick().await {
                warn!(light = %self.light.title(), error = %e, "Light observer tick failed");
            }
        }

        self.light.set_on(false).await?;
        info!(light = %self.light.title(), "Light switched off");
        Ok(())
    }
}

/// Run the red and blue observers until the run stops
pub async fn run_observers(devices: LightDevices, poll: Duration, run: RunControl) -> Result<(), ThingError> {
    let observers = [(devices.red, CubeColor::Red), (devices.blue, CubeColor::Blue)]
        .into_iter()
        .map(|(light, color)| LightObserver::new(light, color, devices.color_sensor.clone(), poll).run(run.clone()));
    futures::future::join_all(observers).await.into_iter().collect()
}
