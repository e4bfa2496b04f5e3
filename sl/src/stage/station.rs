//! Belt pickup station: arrival detection and sense-stop

use std::time::Duration;

use thingclient::ThingError;
use tracing::{debug, info, warn};

use crate::config::StationConfig;
use crate::coordinator::RunControl;
use crate::device::{Conveyor, ProximitySensor};
use crate::sensor;

/// What the stop sensor saw before the belt was stopped
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StopObservation {
    /// Last distance read while the cube was present
    pub last_distance: Option<f64>,
    /// True when the last distance fell inside the target window
    pub in_window: bool,
    /// Stop sensor polls performed
    pub checks: u32,
}

impl StopObservation {
    /// Distance accepted inside the target window
    pub fn window_distance(&self) -> Option<f64> {
        if self.in_window { self.last_distance } else { None }
    }
}

/// One belt with its optional arrival and stop sensors
#[derive(Clone)]
pub struct Station {
    belt: Conveyor,
    arrival: Option<ProximitySensor>,
    stop: Option<ProximitySensor>,
    config: StationConfig,
}

impl Station {
    pub fn new(
        belt: Conveyor,
        arrival: Option<ProximitySensor>,
        stop: Option<ProximitySensor>,
        config: StationConfig,
    ) -> Self {
        Self {
            belt,
            arrival,
            stop,
            config,
        }
    }

    pub fn belt(&self) -> &Conveyor {
        &self.belt
    }

    pub fn target_distance(&self) -> f64 {
        self.config.target_distance
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.config.settle_ms)
    }

    fn in_window(&self, distance: f64) -> bool {
        (distance - self.config.target_distance).abs() <= self.config.distance_tolerance
    }

    /// Wait for the arrival sensor to see a cube; false if the run stopped
    ///
    /// Without an arrival sensor this returns at once.
    pub async fn await_arrival(&self, run: &RunControl) -> bool {
        let Some(sensor) = &self.arrival else {
            debug!("await_arrival: no arrival sensor");
            return run.is_running();
        };
        let poll = Duration::from_millis(self.config.arrival_poll_ms);
        while run.is_running() {
            if sensor::read_presence(sensor).await {
                info!(sensor = %sensor.title(), "Cube approaching");
                return run.is_running();
            }
            if !run.sleep(poll).await {
                break;
            }
        }
        false
    }

    /// Poll the stop sensor until the cube is inside the target window,
    /// then stop the belt
    ///
    /// After a bounded number of polls the belt is stopped anyway. Without
    /// a stop sensor, a fixed delay stands in for sensing. The belt is
    /// stopped even when the run stops mid-poll.
    pub async fn sense_and_stop(&self, run: &RunControl) -> Result<StopObservation, ThingError> {
        let mut observation = StopObservation::default();

        match &self.stop {
            Some(sensor) => {
                let poll = Duration::from_millis(self.config.stop_poll_ms);
                while run.is_running() && observation.checks < self.config.max_stop_checks {
                    let reading = sensor::read(sensor).await;
                    observation.checks += 1;
                    match (reading.presence, reading.distance) {
                        (true, Some(distance)) => {
                            observation.last_distance = Some(distance);
                            if self.in_window(distance) {
                                observation.in_window = true;
                                info!(distance, checks = observation.checks, "Cube in pickup window");
                                break;
                            }
                            debug!(distance, target = self.config.target_distance, "sense_and_stop: outside window");
                        }
                        (true, None) => debug!("sense_and_stop: present, distance unavailable"),
                        (false, _) => {}
                    }
                    run.sleep(poll).await;
                }
                if !observation.in_window && run.is_running() {
                    warn!(
                        checks = observation.checks,
                        max = self.config.max_stop_checks,
                        "Cube never entered the pickup window, proceeding anyway"
                    );
                }
            }
            None => {
                info!(delay_ms = self.config.no_sensor_delay_ms, "No stop sensor, using a fixed delay");
                run.sleep(Duration::from_millis(self.config.no_sensor_delay_ms)).await;
            }
        }

        self.belt.stop().await?;
        run.sleep(Duration::from_millis(self.config.stop_delay_ms)).await;
        Ok(observation)
    }
}
