//! Line supervisor - wires the stages together and runs them to completion

use std::time::Duration;

use eyre::{Result, WrapErr};
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error, info, warn};

use crate::color::CubeColor;
use crate::config::Config;
use crate::coordinator::{LineState, RunControl, handshake};
use crate::device::Devices;
use crate::motion::{MotionController, PickPlace};
use crate::stage::{ColorQuota, Loader, Sorter, StageReport, Station, Transfer, run_stage};

/// Summary of one run
#[derive(Debug, Clone)]
pub struct LineReport {
    pub state: LineState,
    pub stages: Vec<StageReport>,
    pub sorted: Vec<(CubeColor, u32)>,
}

impl LineReport {
    pub fn sorted_count(&self, color: CubeColor) -> u32 {
        self.sorted
            .iter()
            .find(|(c, _)| *c == color)
            .map(|(_, n)| *n)
            .unwrap_or(0)
    }
}

/// Await a stage task; a task that dies stops the rest of the line
async fn supervise<T>(name: &str, task: JoinHandle<T>, run: RunControl) -> std::result::Result<T, JoinError> {
    let result = task.await;
    if let Err(e) = &result {
        error!(stage = name, error = %e, "Stage task died, stopping line");
        run.stop(LineState::Interrupted);
    }
    result
}

/// The three-stage sorting line
pub struct Line {
    devices: Devices,
    config: Config,
    run: RunControl,
}

impl Line {
    pub fn new(devices: Devices, config: Config) -> Self {
        Self {
            devices,
            config,
            run: RunControl::new(),
        }
    }

    /// Handle for stopping the line or watching for completion
    pub fn run_control(&self) -> RunControl {
        self.run.clone()
    }

    /// Run until every quota is met or the line is stopped, then stop both belts
    pub async fn run(self) -> Result<LineReport> {
        debug!("Line::run: called");
        let Self { devices, config, run } = self;

        let motion = MotionController::new(&config.motion);
        let pick_place = PickPlace::new(motion, &config.pick_place);
        let (to_transfer, from_loader) = handshake("belt-a", true);
        let (to_sorter, from_transfer) = handshake("belt-b", true);

        let loader = Loader::new(
            devices.loader_arm.clone(),
            pick_place.clone(),
            to_transfer,
            config.stage1.clone(),
            &config.pick_place,
        );
        let transfer = Transfer::new(
            devices.transfer_arm.clone(),
            pick_place.clone(),
            Station::new(
                devices.belt_a.clone(),
                devices.belt_a_arrival.clone(),
                devices.belt_a_stop.clone(),
                config.stage2.station.clone(),
            ),
            devices.belt_b.clone(),
            from_loader,
            to_sorter,
            config.stage2.clone(),
            config.motion.transfer_tolerance,
        );
        let sorter = Sorter::new(
            devices.sorter_arm.clone(),
            pick_place,
            Station::new(
                devices.belt_b.clone(),
                devices.belt_b_arrival.clone(),
                devices.belt_b_stop.clone(),
                config.stage3.station.clone(),
            ),
            devices.color_sensor.clone(),
            from_transfer,
            ColorQuota::new(config.quota.per_color),
            config.stage3.clone(),
            Duration::from_millis(config.pick_place.gripper_dwell_ms),
        );

        info!(per_color = config.quota.per_color, "Starting line");
        let stage1 = supervise("stage1", tokio::spawn(run_stage(loader, run.clone())), run.clone());
        let stage2 = supervise("stage2", tokio::spawn(run_stage(transfer, run.clone())), run.clone());
        let stage3 = supervise("stage3", tokio::spawn(run_stage(sorter, run.clone())), run.clone());

        let (stage1, stage2, stage3) = tokio::join!(stage1, stage2, stage3);

        // Belts stop even when a stage task died
        for belt in [&devices.belt_a, &devices.belt_b] {
            if let Err(e) = belt.stop().await {
                warn!(belt = %belt.title(), error = %e, "Failed to stop belt");
            }
        }

        let (_, report1) = stage1.wrap_err("stage 1 task failed")?;
        let (_, report2) = stage2.wrap_err("stage 2 task failed")?;
        let (sorter, report3) = stage3.wrap_err("stage 3 task failed")?;

        let report = LineReport {
            state: run.state(),
            stages: vec![report1, report2, report3],
            sorted: sorter.quota().counts(),
        };
        info!(state = %report.state, sorted = ?report.sorted, "Line stopped");
        Ok(report)
    }
}
