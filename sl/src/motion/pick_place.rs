//! Pick and place sequences

use std::time::Duration;

use tracing::debug;

use super::{MotionController, MotionError};
use crate::config::PickPlaceConfig;
use crate::device::Actuator;
use crate::pose::Pose;

/// Grasp and release sequences built on the motion controller
///
/// Grasp success is not sensed. A missed grasp looks like a success until
/// a downstream sensor fails to see the cube.
#[derive(Debug, Clone)]
pub struct PickPlace {
    motion: MotionController,
    approach_clearance: f64,
    grasp_offset: f64,
    release_clearance: f64,
    dwell: Duration,
}

impl PickPlace {
    pub fn new(motion: MotionController, geometry: &PickPlaceConfig) -> Self {
        Self {
            motion,
            approach_clearance: geometry.approach_clearance,
            grasp_offset: geometry.grasp_offset,
            release_clearance: geometry.release_clearance,
            dwell: Duration::from_millis(geometry.gripper_dwell_ms),
        }
    }

    pub fn motion(&self) -> &MotionController {
        &self.motion
    }

    /// Open, approach from above, descend, close, lift
    pub async fn pick(&self, arm: &Actuator, pose: &Pose) -> Result<(), MotionError> {
        self.pick_within(arm, pose, self.motion.tolerance()).await
    }

    pub async fn pick_within(&self, arm: &Actuator, pose: &Pose, tolerance: f64) -> Result<(), MotionError> {
        debug!(arm = %arm.title(), %pose, "pick: called");
        let above = pose.raised(self.approach_clearance);
        let grasp = pose.raised(-self.grasp_offset);

        arm.open_gripper().await?;
        self.motion.move_within(arm, &above, tolerance).await?;
        self.motion.move_within(arm, &grasp, tolerance).await?;
        arm.close_gripper().await?;
        tokio::time::sleep(self.dwell).await;
        self.motion.move_within(arm, &above, tolerance).await
    }

    /// Approach from above, descend, open, retreat higher
    pub async fn place(&self, arm: &Actuator, pose: &Pose) -> Result<(), MotionError> {
        self.place_within(arm, pose, self.motion.tolerance()).await
    }

    pub async fn place_within(&self, arm: &Actuator, pose: &Pose, tolerance: f64) -> Result<(), MotionError> {
        self.release_within(arm, pose, tolerance).await?;
        self.retreat_within(arm, pose, tolerance).await
    }

    /// Approach from above, descend, open; the arm stays at the release point
    pub async fn release_within(&self, arm: &Actuator, pose: &Pose, tolerance: f64) -> Result<(), MotionError> {
        debug!(arm = %arm.title(), %pose, "release: called");
        let above = pose.raised(self.approach_clearance);
        let release = pose.raised(-self.grasp_offset);

        self.motion.move_within(arm, &above, tolerance).await?;
        self.motion.move_within(arm, &release, tolerance).await?;
        arm.open_gripper().await?;
        tokio::time::sleep(self.dwell).await;
        Ok(())
    }

    /// Move clear above a place pose
    pub async fn retreat_within(&self, arm: &Actuator, pose: &Pose, tolerance: f64) -> Result<(), MotionError> {
        let clear = pose.raised(self.release_clearance);
        self.motion.move_within(arm, &clear, tolerance).await
    }
}
