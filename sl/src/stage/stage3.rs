//! Stage 3: belt B to color bins

use std::time::Duration;

use async_trait::async_trait;
use eyre::WrapErr;
use tracing::{info, warn};

use super::{ColorQuota, CycleOutcome, Stage, Station};
use crate::color::CubeColor;
use crate::config::Stage3Config;
use crate::coordinator::{Consumer, LineState, RunControl};
use crate::device::{Actuator, ColorSensor};
use crate::motion::PickPlace;
use crate::pose::Pose;
use crate::sensor;

/// Correct the pickup y by the stop-distance deviation, clamped
pub fn corrected_pick(pick: &Pose, distance: Option<f64>, target: f64, gain: f64, max: f64) -> Pose {
    match distance {
        Some(d) => pick.shifted_y(((d - target) * gain).clamp(-max, max)),
        None => *pick,
    }
}

/// Where a held cube is released
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Destination {
    /// Red or blue bin, beside the hold pose
    Bin(Pose),
    /// Green cubes go to the intermediate waypoint
    Waypoint(Pose),
    /// Unknown or over-quota: dropped at the hold pose, not counted
    Reject(Pose),
}

/// Route a classified cube; `claimed` is whether the quota counted it
pub fn destination(color: CubeColor, claimed: bool, config: &Stage3Config) -> Destination {
    match (color, claimed) {
        (CubeColor::Red, true) => Destination::Bin(config.color_hold.shifted_y(config.bin_offset)),
        (CubeColor::Blue, true) => Destination::Bin(config.color_hold.shifted_y(-config.bin_offset)),
        (CubeColor::Green, true) => Destination::Waypoint(config.intermediate),
        _ => Destination::Reject(config.color_hold),
    }
}

/// Picks cubes off belt B, classifies and sorts them
pub struct Sorter {
    arm: Actuator,
    pick_place: PickPlace,
    station: Station,
    color_sensor: ColorSensor,
    from_transfer: Consumer,
    quota: ColorQuota,
    config: Stage3Config,
    dwell: Duration,
}

impl Sorter {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        arm: Actuator,
        pick_place: PickPlace,
        station: Station,
        color_sensor: ColorSensor,
        from_transfer: Consumer,
        quota: ColorQuota,
        config: Stage3Config,
        dwell: Duration,
    ) -> Self {
        Self {
            arm,
            pick_place,
            station,
            color_sensor,
            from_transfer,
            quota,
            config,
            dwell,
        }
    }

    pub fn quota(&self) -> &ColorQuota {
        &self.quota
    }

    async fn ready_arm(&self, above: &Pose) -> eyre::Result<()> {
        self.arm.open_gripper().await?;
        self.pick_place.motion().move_to(&self.arm, above).await?;
        info!("Arm ready above pickup");
        Ok(())
    }

    /// Hold the cube at the sensor until it reports presence, then classify
    ///
    /// A stopped run ends the wait early; the cube is still classified so it
    /// can be released.
    async fn identify(&self, run: &RunControl) -> CubeColor {
        let poll = Duration::from_millis(self.config.color_poll_ms);
        let mut detected = false;
        for _ in 0..self.config.color_attempts {
            if sensor::read_color_presence(&self.color_sensor).await {
                detected = true;
                break;
            }
            if !run.sleep(poll).await {
                break;
            }
        }
        if !detected && run.is_running() {
            warn!(attempts = self.config.color_attempts, "Color sensor saw nothing, classifying anyway");
        }
        sensor::read_color(&self.color_sensor).await
    }

    async fn release(&self, destination: Destination) -> eyre::Result<()> {
        let motion = self.pick_place.motion();
        match destination {
            Destination::Waypoint(pose) => {
                motion.move_to(&self.arm, &pose).await?;
                self.arm.open_gripper().await?;
                tokio::time::sleep(self.dwell).await;
            }
            Destination::Bin(pose) | Destination::Reject(pose) => {
                motion.move_to(&self.arm, &pose).await?;
                self.arm.open_gripper().await?;
                tokio::time::sleep(self.dwell).await;
                motion.move_to(&self.arm, &pose.raised(self.config.release_lift)).await?;
                motion.move_to(&self.arm, &self.config.intermediate).await?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Stage for Sorter {
    fn name(&self) -> &'static str {
        "stage3"
    }

    fn backoff(&self) -> Duration {
        Duration::from_millis(self.config.backoff_ms)
    }

    async fn cycle(&mut self, run: &RunControl) -> eyre::Result<CycleOutcome> {
        self.from_transfer.ready();
        info!("Ready, waiting for a cube from stage 2");
        if !self.from_transfer.wait_item(run).await {
            return Ok(CycleOutcome::Stopped);
        }
        if !self.station.await_arrival(run).await {
            return Ok(CycleOutcome::Stopped);
        }

        let above = self.config.pick_pose.raised(self.config.release_lift);
        let (ready, stopped) = tokio::join!(self.ready_arm(&above), self.station.sense_and_stop(run));
        let observation = stopped.wrap_err("stop belt B")?;
        ready.wrap_err("move to ready pose")?;

        if !run.sleep(self.station.settle_delay()).await {
            return Ok(CycleOutcome::Stopped);
        }

        // Any distance seen with the cube present is used, even outside the window
        let pick = corrected_pick(
            &self.config.pick_pose,
            observation.last_distance,
            self.station.target_distance(),
            self.config.correction_gain,
            self.config.max_correction,
        );
        info!(pose = %pick, distance = ?observation.last_distance, "Picking cube from belt B");
        self.pick_place.pick(&self.arm, &pick).await.wrap_err("pick from belt B")?;

        let motion = self.pick_place.motion();
        motion
            .move_to(&self.arm, &self.config.intermediate)
            .await
            .wrap_err("move to intermediate")?;
        motion
            .move_to(&self.arm, &self.config.color_hold)
            .await
            .wrap_err("move to color sensor")?;

        let color = self.identify(run).await;
        let claimed = self.quota.try_claim(color);
        let destination = destination(color, claimed, &self.config);
        info!(%color, claimed, ?destination, "Cube classified");
        self.release(destination).await.wrap_err("release cube")?;

        if claimed {
            let counts = self.quota.counts();
            info!(?counts, "Cube sorted");
        }
        if self.quota.is_complete() {
            info!("All color quotas met");
            run.stop(LineState::Completed);
            return Ok(CycleOutcome::Stopped);
        }
        Ok(CycleOutcome::Done)
    }

    async fn recover(&mut self) {
        if let Err(e) = self.station.belt().stop().await {
            warn!(error = %e, "Failed to stop belt B after error");
        }
        self.from_transfer.ready();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MotionConfig, PickPlaceConfig, StationConfig};
    use crate::coordinator::{Producer, handshake};
    use crate::device::Conveyor;
    use crate::motion::MotionController;
    use crate::motion::mock::StepArm;
    use crate::stage::mock::{CallLog, IdleBelt, Logged, SteadyColor};
    use std::sync::{Arc, Mutex};

    fn sorter(log: &CallLog, belt_b: Logged) -> (Sorter, Producer) {
        let arm = Actuator::new(Arc::new(Logged::new(Arc::new(StepArm::new(10.0)), log.clone()))).unwrap();
        let pick_place = PickPlace::new(MotionController::new(&MotionConfig::default()), &PickPlaceConfig::default());
        let station = Station::new(Conveyor::new(Arc::new(belt_b)), None, None, StationConfig::default());
        let color_sensor = ColorSensor::new(Arc::new(SteadyColor::new([240, 10, 10])));
        let (to_sorter, from_transfer) = handshake("belt-b", true);
        let sorter = Sorter::new(
            arm,
            pick_place,
            station,
            color_sensor,
            from_transfer,
            ColorQuota::new(1),
            Stage3Config::default(),
            Duration::from_millis(300),
        );
        (sorter, to_sorter)
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_cycle_stops_belt_b_and_frees_stage2() {
        let log: CallLog = Arc::new(Mutex::new(Vec::new()));
        let belt_b = Logged::new(Arc::new(IdleBelt::new("VirtualConveyorBelt2")), log.clone()).failing_once("stopBelt");
        let (mut sorter, to_sorter) = sorter(&log, belt_b);
        let run = RunControl::new();

        to_sorter.item_deposited();
        assert!(sorter.cycle(&run).await.is_err());
        assert!(!to_sorter.is_consumer_ready());

        sorter.recover().await;
        let stops = log
            .lock()
            .unwrap()
            .iter()
            .filter(|c| *c == "VirtualConveyorBelt2:stopBelt")
            .count();
        assert_eq!(stops, 2);
        assert!(to_sorter.is_consumer_ready());

        // The next cube is sorted
        to_sorter.item_deposited();
        assert_eq!(sorter.cycle(&run).await.unwrap(), CycleOutcome::Done);
        assert_eq!(sorter.quota().count(CubeColor::Red), 1);
        assert!(run.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_color_wait_ends_when_run_stops() {
        struct Blind(thingclient::ThingDescription);

        #[async_trait]
        impl thingclient::Thing for Blind {
            fn description(&self) -> &thingclient::ThingDescription {
                &self.0
            }

            async fn invoke_action(
                &self,
                _name: &str,
                _input: Option<serde_json::Value>,
            ) -> Result<serde_json::Value, thingclient::ThingError> {
                Ok(serde_json::Value::Null)
            }

            async fn read_property(&self, _name: &str) -> Result<serde_json::Value, thingclient::ThingError> {
                Ok(serde_json::json!(false))
            }

            async fn write_property(
                &self,
                _name: &str,
                _value: serde_json::Value,
            ) -> Result<(), thingclient::ThingError> {
                Ok(())
            }
        }

        let log: CallLog = Arc::new(Mutex::new(Vec::new()));
        let belt_b = Logged::new(Arc::new(IdleBelt::new("VirtualConveyorBelt2")), log.clone());
        let (mut sorter, _to_sorter) = sorter(&log, belt_b);
        sorter.color_sensor = ColorSensor::new(Arc::new(Blind(thingclient::ThingDescription::new("VirtualColorSensor"))));
        sorter.config.color_attempts = 1_000;

        let run = RunControl::new();
        run.stop(LineState::Interrupted);
        let start = tokio::time::Instant::now();
        assert_eq!(sorter.identify(&run).await, CubeColor::Unknown);
        assert!(start.elapsed() < Duration::from_millis(200));
    }

    #[test]
    fn test_correction_is_clamped() {
        let pick = Pose::xyz(1.475, 0.1, 1.14);

        let small = corrected_pick(&pick, Some(0.295), 0.275, 0.1, 0.05);
        assert!((small.y - 0.102).abs() < 1e-9);

        let huge = corrected_pick(&pick, Some(5.0), 0.275, 0.1, 0.05);
        assert!((huge.y - 0.15).abs() < 1e-9);

        let negative = corrected_pick(&pick, Some(-5.0), 0.275, 0.1, 0.05);
        assert!((negative.y - 0.05).abs() < 1e-9);
        assert_eq!(negative.x, pick.x);
    }

    #[test]
    fn test_routing() {
        let config = Stage3Config::default();
        let hold = config.color_hold;

        assert_eq!(
            destination(CubeColor::Red, true, &config),
            Destination::Bin(hold.shifted_y(0.25))
        );
        assert_eq!(
            destination(CubeColor::Blue, true, &config),
            Destination::Bin(hold.shifted_y(-0.25))
        );
        assert_eq!(
            destination(CubeColor::Green, true, &config),
            Destination::Waypoint(config.intermediate)
        );
        assert_eq!(destination(CubeColor::Unknown, false, &config), Destination::Reject(hold));
        // Over quota
        assert_eq!(destination(CubeColor::Red, false, &config), Destination::Reject(hold));
    }
}
