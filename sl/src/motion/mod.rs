//! Closed-loop motion control
//!
//! Full-pose arms complete a move inside the command call. Position-only
//! arms acknowledge at once, so the controller polls their position
//! feedback until every axis is within tolerance or the move times out.

mod pick_place;

pub use pick_place::PickPlace;

use std::fmt;
use std::time::Duration;

use thingclient::ThingError;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::MotionConfig;
use crate::device::{Actuator, ActuatorKind};
use crate::pose::{AxisError, Pose};

fn or_none<T: fmt::Display>(value: &Option<T>) -> String {
    value.as_ref().map_or_else(|| "none".to_string(), ToString::to_string)
}

/// Errors from a single move
#[derive(Debug, Error)]
pub enum MotionError {
    #[error(
        "{device} did not reach {target} within {elapsed:?} (last observed {}, error {})",
        or_none(.last_observed),
        or_none(.error)
    )]
    Timeout {
        device: String,
        target: Pose,
        last_observed: Option<Pose>,
        error: Option<AxisError>,
        elapsed: Duration,
    },

    #[error("Device command failed: {0}")]
    Command(#[from] ThingError),
}

impl MotionError {
    /// Timeouts are retried by the next stage cycle
    pub fn is_retryable(&self) -> bool {
        match self {
            MotionError::Timeout { .. } => true,
            MotionError::Command(e) => e.is_retryable(),
        }
    }
}

/// Drives actuators to target poses
#[derive(Debug, Clone)]
pub struct MotionController {
    tolerance: f64,
    timeout: Duration,
    poll_interval: Duration,
    read_backoff_max: Duration,
}

impl MotionController {
    pub fn new(config: &MotionConfig) -> Self {
        Self {
            tolerance: config.position_tolerance,
            timeout: Duration::from_millis(config.move_timeout_ms),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            read_backoff_max: Duration::from_millis(config.read_backoff_max_ms.max(config.poll_interval_ms)),
        }
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Move with the default tolerance
    pub async fn move_to(&self, arm: &Actuator, target: &Pose) -> Result<(), MotionError> {
        self.move_within(arm, target, self.tolerance).await
    }

    /// Move, declaring convergence within a custom per-axis tolerance
    pub async fn move_within(&self, arm: &Actuator, target: &Pose, tolerance: f64) -> Result<(), MotionError> {
        debug!(arm = %arm.title(), %target, tolerance, "move_within: called");
        match arm.kind() {
            ActuatorKind::FullPose => {
                arm.command_move(target).await?;
                Ok(())
            }
            ActuatorKind::PositionOnly => {
                let start = Instant::now();
                arm.command_move(target).await?;
                self.await_convergence(arm, target, tolerance, start).await
            }
        }
    }

    async fn await_convergence(
        &self,
        arm: &Actuator,
        target: &Pose,
        tolerance: f64,
        start: Instant,
    ) -> Result<(), MotionError> {
        let mut last_observed = None;
        let mut last_error = None;
        let mut read_delay = self.poll_interval;
        let mut polls = 0u32;

        loop {
            polls += 1;
            let delay = match arm.read_position().await {
                Ok(current) => {
                    let error = current.position_error(target);
                    if error.within(tolerance) {
                        debug!(arm = %arm.title(), polls, %error, elapsed = ?start.elapsed(), "move converged");
                        return Ok(());
                    }
                    last_observed = Some(current);
                    last_error = Some(error);
                    read_delay = self.poll_interval;
                    self.poll_interval
                }
                Err(e) => {
                    read_delay = (read_delay * 2).min(self.read_backoff_max);
                    warn!(arm = %arm.title(), error = %e, retry_in = ?read_delay, "Position read failed");
                    read_delay
                }
            };

            let elapsed = start.elapsed();
            if elapsed >= self.timeout {
                return Err(MotionError::Timeout {
                    device: arm.title().to_string(),
                    target: *target,
                    last_observed,
                    error: last_error,
                    elapsed,
                });
            }
            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
pub(crate) mod mock {
    //! Scripted position-only arm for motion tests

    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use serde_json::Value;
    use thingclient::{ActionAffordance, DataSchema, PropertyAffordance, Thing, ThingDescription, ThingError};

    use crate::pose::Pose;

    #[derive(Debug, Default)]
    pub struct ArmState {
        pub current: Pose,
        pub target: Pose,
        pub reads: u32,
        pub failing_reads: u32,
        pub calls: Vec<String>,
    }

    /// Moves `step` meters per axis toward the target on every feedback read
    pub struct StepArm {
        td: ThingDescription,
        step: f64,
        pub state: Arc<Mutex<ArmState>>,
    }

    impl StepArm {
        pub fn new(step: f64) -> Self {
            Self::with_units(step, "meter")
        }

        pub fn with_units(step: f64, unit: &str) -> Self {
            let units = [("x", unit), ("y", unit), ("z", unit)];
            let td = ThingDescription::new("VirtualUarm1")
                .with_action(
                    "goTo",
                    ActionAffordance {
                        input: Some(DataSchema::object_with_units(&units)),
                        forms: vec![],
                    },
                )
                .with_action("gripOpen", ActionAffordance::default())
                .with_action("gripClose", ActionAffordance::default())
                .with_property(
                    "currentPosition",
                    PropertyAffordance {
                        properties: DataSchema::object_with_units(&units).properties,
                        ..Default::default()
                    },
                );
            Self {
                td,
                step,
                state: Arc::new(Mutex::new(ArmState::default())),
            }
        }
    }

    fn approach(current: f64, target: f64, step: f64) -> f64 {
        if (target - current).abs() <= step {
            target
        } else if target > current {
            current + step
        } else {
            current - step
        }
    }

    #[async_trait]
    impl Thing for StepArm {
        fn description(&self) -> &ThingDescription {
            &self.td
        }

        async fn invoke_action(&self, name: &str, input: Option<Value>) -> Result<Value, ThingError> {
            let mut state = self.state.lock().unwrap();
            state.calls.push(name.to_string());
            if name == "goTo" {
                let input = input.unwrap_or_default();
                state.target = Pose::from_json(&input).unwrap();
            }
            Ok(Value::Null)
        }

        async fn read_property(&self, _name: &str) -> Result<Value, ThingError> {
            let mut state = self.state.lock().unwrap();
            state.reads += 1;
            if state.failing_reads > 0 {
                state.failing_reads -= 1;
                return Err(ThingError::Status {
                    thing: self.td.title.clone(),
                    status: 503,
                    message: "busy".to_string(),
                });
            }
            let (current, target) = (state.current, state.target);
            state.current = Pose::xyz(
                approach(current.x, target.x, self.step),
                approach(current.y, target.y, self.step),
                approach(current.z, target.z, self.step),
            );
            Ok(state.current.position_json())
        }

        async fn write_property(&self, _name: &str, _value: Value) -> Result<(), ThingError> {
            Ok(())
        }
    }
}
