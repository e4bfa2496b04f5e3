//! Stage 1: spawn point to belt A

use std::time::Duration;

use async_trait::async_trait;
use eyre::WrapErr;
use tracing::info;

use super::{CycleOutcome, Stage};
use crate::config::{PickPlaceConfig, Stage1Config};
use crate::coordinator::{Producer, RunControl};
use crate::device::Actuator;
use crate::motion::PickPlace;

/// Picks cubes at the spawn point and drops them on belt A
pub struct Loader {
    arm: Actuator,
    pick_place: PickPlace,
    to_transfer: Producer,
    config: Stage1Config,
    clearance: f64,
}

impl Loader {
    pub fn new(
        arm: Actuator,
        pick_place: PickPlace,
        to_transfer: Producer,
        config: Stage1Config,
        geometry: &PickPlaceConfig,
    ) -> Self {
        Self {
            arm,
            pick_place,
            to_transfer,
            config,
            clearance: geometry.approach_clearance,
        }
    }
}

#[async_trait]
impl Stage for Loader {
    fn name(&self) -> &'static str {
        "stage1"
    }

    fn backoff(&self) -> Duration {
        Duration::from_millis(self.config.backoff_ms)
    }

    async fn cycle(&mut self, run: &RunControl) -> eyre::Result<CycleOutcome> {
        info!("Waiting for belt A to be free");
        if !self.to_transfer.wait_ready(run).await {
            return Ok(CycleOutcome::Stopped);
        }

        if !run.sleep(Duration::from_millis(self.config.spawn_delay_ms)).await {
            return Ok(CycleOutcome::Stopped);
        }

        info!(pose = %self.config.spawn, "Picking cube at spawn");
        self.pick_place
            .pick(&self.arm, &self.config.spawn)
            .await
            .wrap_err("pick at spawn")?;

        info!(pose = %self.config.belt_drop, "Placing cube on belt A");
        self.pick_place
            .place(&self.arm, &self.config.belt_drop)
            .await
            .wrap_err("place on belt A")?;

        // Belt A now belongs to stage 2
        self.to_transfer.item_deposited();
        info!("Cube on belt A, handed to stage 2");

        let home = self.config.spawn.raised(self.clearance);
        self.pick_place
            .motion()
            .move_to(&self.arm, &home)
            .await
            .wrap_err("return to spawn")?;
        Ok(CycleOutcome::Done)
    }
}
