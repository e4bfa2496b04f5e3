//! Stage 2: belt A to belt B

use std::time::Duration;

use async_trait::async_trait;
use eyre::WrapErr;
use tracing::{info, warn};

use super::{CycleOutcome, Stage, Station};
use crate::config::Stage2Config;
use crate::coordinator::{Consumer, Producer, RunControl};
use crate::device::{Actuator, Conveyor};
use crate::motion::PickPlace;
use crate::pose::Pose;

/// Correct the pickup x by the negated stop-distance deviation
///
/// Not clamped; the workspace geometry bounds it.
pub fn corrected_pick(pick: &Pose, distance: Option<f64>, target: f64, gain: f64) -> Pose {
    match distance {
        Some(d) => pick.shifted_x(-(d - target) * gain),
        None => *pick,
    }
}

/// Takes cubes off belt A and drops them on belt B
pub struct Transfer {
    arm: Actuator,
    pick_place: PickPlace,
    station: Station,
    belt_b: Conveyor,
    from_loader: Consumer,
    to_sorter: Producer,
    config: Stage2Config,
    transfer_tolerance: f64,
}

impl Transfer {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        arm: Actuator,
        pick_place: PickPlace,
        station: Station,
        belt_b: Conveyor,
        from_loader: Consumer,
        to_sorter: Producer,
        config: Stage2Config,
        transfer_tolerance: f64,
    ) -> Self {
        Self {
            arm,
            pick_place,
            station,
            belt_b,
            from_loader,
            to_sorter,
            config,
            transfer_tolerance,
        }
    }

    async fn ready_arm(&self) -> eyre::Result<()> {
        self.arm.open_gripper().await?;
        self.pick_place
            .motion()
            .move_to(&self.arm, &self.config.ready_pose)
            .await?;
        info!("Arm ready above pickup");
        Ok(())
    }
}

#[async_trait]
impl Stage for Transfer {
    fn name(&self) -> &'static str {
        "stage2"
    }

    fn backoff(&self) -> Duration {
        Duration::from_millis(self.config.backoff_ms)
    }

    async fn cycle(&mut self, run: &RunControl) -> eyre::Result<CycleOutcome> {
        info!("Waiting for a cube from stage 1");
        if !self.from_loader.wait_item(run).await {
            return Ok(CycleOutcome::Stopped);
        }

        info!("Cube received, starting belt A");
        self.station.belt().start().await.wrap_err("start belt A")?;
        if !self.station.await_arrival(run).await {
            return Ok(CycleOutcome::Stopped);
        }

        // Travel to the ready pose while the cube runs to the stop point
        let (ready, stopped) = tokio::join!(self.ready_arm(), self.station.sense_and_stop(run));
        let observation = stopped.wrap_err("stop belt A")?;
        ready.wrap_err("move to ready pose")?;

        if !run.sleep(self.station.settle_delay()).await {
            return Ok(CycleOutcome::Stopped);
        }

        let pick = corrected_pick(
            &self.config.pick_pose,
            observation.window_distance(),
            self.station.target_distance(),
            self.config.correction_gain,
        );
        info!(pose = %pick, distance = ?observation.window_distance(), "Picking cube from belt A");
        self.pick_place.pick(&self.arm, &pick).await.wrap_err("pick from belt A")?;

        if self.config.wait_for_sorter {
            info!("Waiting for stage 3 to be ready");
            if !self.to_sorter.wait_ready(run).await {
                return Ok(CycleOutcome::Stopped);
            }
        }

        info!(pose = %self.config.belt_drop, "Placing cube on belt B");
        self.pick_place
            .release_within(&self.arm, &self.config.belt_drop, self.transfer_tolerance)
            .await
            .wrap_err("place on belt B")?;
        self.belt_b.start().await.wrap_err("start belt B")?;
        self.pick_place
            .retreat_within(&self.arm, &self.config.belt_drop, self.transfer_tolerance)
            .await
            .wrap_err("retreat from belt B")?;

        // Belt B now belongs to stage 3, belt A back to stage 1
        self.to_sorter.item_deposited();
        self.from_loader.ready();
        info!("Transfer complete");
        Ok(CycleOutcome::Done)
    }

    async fn recover(&mut self) {
        if let Err(e) = self.station.belt().stop().await {
            warn!(error = %e, "Failed to stop belt A after error");
        }
        self.from_loader.ready();
    }
}
