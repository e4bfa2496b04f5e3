//! State of the simulated scene: arms, belts and cubes

use std::time::Duration;

use rand::seq::SliceRandom;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::color::CubeColor;
use crate::config::Config;
use crate::pose::Pose;

/// Belt travel from the drop point to the stop sensor
pub const SENSOR_AT: f64 = 0.775;

/// Belt travel at which the arrival sensor sees a cube
pub const ARRIVAL_AT: f64 = 0.2;

/// Stop sensor detection range
pub const STOP_RANGE: f64 = 0.4;

/// Cubes this far past the stop sensor fall off the belt
const FALL_OFF: f64 = 0.05;

/// A stopped cube is graspable this close to the pickup point
const PICK_ZONE: f64 = 0.05;

/// Horizontal reach around a station
const STATION_RADIUS: f64 = 0.1;

/// Horizontal reach around the belt B drop, which uses a loose tolerance
const TRANSFER_RADIUS: f64 = 0.2;

/// Vertical reach around a station
const STATION_HEIGHT: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmRole {
    Loader,
    Transfer,
    Sorter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeltId {
    A,
    B,
}

/// A cube released by the sorting arm
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Released {
    pub color: CubeColor,
    pub pose: Pose,
}

#[derive(Debug, Clone, Copy)]
struct BeltCube {
    color: CubeColor,
    travel: f64,
}

#[derive(Debug)]
struct Belt {
    running: bool,
    since: Instant,
    speed: f64,
    pick_at: f64,
    cubes: Vec<BeltCube>,
}

impl Belt {
    fn new(speed: f64, target_distance: f64, now: Instant) -> Self {
        Self {
            running: false,
            since: now,
            speed,
            pick_at: SENSOR_AT - target_distance,
            cubes: Vec::new(),
        }
    }

    /// Move cubes forward to `now`; returns how many fell off
    fn advance(&mut self, now: Instant) -> usize {
        if self.running {
            let dt = now.saturating_duration_since(self.since).as_secs_f64();
            for cube in &mut self.cubes {
                cube.travel += self.speed * dt;
            }
        }
        self.since = now;
        let before = self.cubes.len();
        self.cubes.retain(|c| c.travel <= SENSOR_AT + FALL_OFF);
        before - self.cubes.len()
    }

    fn leading(&self) -> Option<&BeltCube> {
        self.cubes.iter().max_by(|a, b| a.travel.total_cmp(&b.travel))
    }

    fn take_at_pickup(&mut self) -> Option<CubeColor> {
        if self.running {
            return None;
        }
        let index = self
            .cubes
            .iter()
            .position(|c| (c.travel - self.pick_at).abs() <= PICK_ZONE)?;
        Some(self.cubes.remove(index).color)
    }
}

#[derive(Debug, Clone, Copy)]
struct Travel {
    from: Pose,
    to: Pose,
    started: Instant,
    duration: Duration,
}

#[derive(Debug)]
struct Arm {
    pose: Pose,
    travel: Option<Travel>,
    held: Option<CubeColor>,
}

impl Arm {
    fn new(pose: Pose) -> Self {
        Self {
            pose,
            travel: None,
            held: None,
        }
    }

    fn position(&self, now: Instant) -> Pose {
        let Some(t) = &self.travel else {
            return self.pose;
        };
        let elapsed = now.saturating_duration_since(t.started);
        if t.duration.is_zero() || elapsed >= t.duration {
            return t.to;
        }
        let f = elapsed.as_secs_f64() / t.duration.as_secs_f64();
        let lerp = |a: f64, b: f64| a + (b - a) * f;
        Pose::new(
            lerp(t.from.x, t.to.x),
            lerp(t.from.y, t.to.y),
            lerp(t.from.z, t.to.z),
            lerp(t.from.rx, t.to.rx),
            lerp(t.from.ry, t.to.ry),
            lerp(t.from.rz, t.to.rz),
        )
    }
}

fn near(pose: &Pose, station: &Pose, radius: f64) -> bool {
    let horizontal = ((pose.x - station.x).powi(2) + (pose.y - station.y).powi(2)).sqrt();
    horizontal <= radius && (pose.z - station.z).abs() <= STATION_HEIGHT
}

/// Scene geometry taken from the configured waypoints
#[derive(Debug, Clone)]
struct Stations {
    spawn: Pose,
    belt_a_drop: Pose,
    belt_a_pick: Pose,
    belt_b_drop: Pose,
    belt_b_pick: Pose,
    color_hold: Pose,
}

/// The whole simulated scene
#[derive(Debug)]
pub struct World {
    colors: Vec<CubeColor>,
    spawned: usize,
    arm_speed: f64,
    arms: [Arm; 3],
    belts: [Belt; 2],
    stations: Stations,
    released: Vec<Released>,
    lost: u32,
}

impl World {
    pub fn new(config: &Config) -> Self {
        let now = Instant::now();
        let sim = &config.simulation;
        let mut colors = sim.spawn_colors.clone();
        if sim.shuffle {
            colors.shuffle(&mut rand::rng());
        }
        info!(?colors, "Simulated spawn sequence");

        Self {
            colors,
            spawned: 0,
            arm_speed: sim.arm_speed,
            arms: [
                Arm::new(config.stage1.spawn.raised(config.pick_place.approach_clearance)),
                Arm::new(config.stage2.ready_pose),
                Arm::new(config.stage3.intermediate),
            ],
            belts: [
                Belt::new(sim.belt_speed, config.stage2.station.target_distance, now),
                Belt::new(sim.belt_speed, config.stage3.station.target_distance, now),
            ],
            stations: Stations {
                spawn: config.stage1.spawn,
                belt_a_drop: config.stage1.belt_drop,
                belt_a_pick: config.stage2.pick_pose,
                belt_b_drop: config.stage2.belt_drop,
                belt_b_pick: config.stage3.pick_pose,
                color_hold: config.stage3.color_hold,
            },
            released: Vec::new(),
            lost: 0,
        }
    }

    fn arm(&self, role: ArmRole) -> &Arm {
        &self.arms[role as usize]
    }

    fn arm_mut(&mut self, role: ArmRole) -> &mut Arm {
        &mut self.arms[role as usize]
    }

    fn belt_mut(&mut self, id: BeltId, now: Instant) -> &mut Belt {
        let belt = &mut self.belts[id as usize];
        let fell = belt.advance(now);
        if fell > 0 {
            warn!(belt = ?id, fell, "Cube fell off the end of the belt");
            self.lost += fell as u32;
        }
        &mut self.belts[id as usize]
    }

    fn next_color(&mut self) -> CubeColor {
        let color = if self.colors.is_empty() {
            CubeColor::Unknown
        } else {
            self.colors[self.spawned % self.colors.len()]
        };
        self.spawned += 1;
        color
    }

    pub fn arm_position(&self, role: ArmRole, now: Instant) -> Pose {
        self.arm(role).position(now)
    }

    /// Start a move; returns its duration at the simulated arm speed
    pub fn start_move(&mut self, role: ArmRole, target: Pose, now: Instant) -> Duration {
        let from = self.arm_position(role, now);
        let distance = ((target.x - from.x).powi(2) + (target.y - from.y).powi(2) + (target.z - from.z).powi(2)).sqrt();
        let duration = if self.arm_speed > 0.0 {
            Duration::from_secs_f64(distance / self.arm_speed)
        } else {
            Duration::ZERO
        };
        let arm = self.arm_mut(role);
        arm.pose = from;
        arm.travel = Some(Travel {
            from,
            to: target,
            started: now,
            duration,
        });
        debug!(arm = ?role, %target, ?duration, "sim: move started");
        duration
    }

    pub fn close_gripper(&mut self, role: ArmRole, now: Instant) {
        let at = self.arm_position(role, now);
        if self.arm(role).held.is_some() {
            return;
        }
        let grabbed = match role {
            ArmRole::Loader if near(&at, &self.stations.spawn, STATION_RADIUS) => Some(self.next_color()),
            ArmRole::Transfer if near(&at, &self.stations.belt_a_pick, STATION_RADIUS) => {
                self.belt_mut(BeltId::A, now).take_at_pickup()
            }
            ArmRole::Sorter if near(&at, &self.stations.belt_b_pick, STATION_RADIUS) => {
                self.belt_mut(BeltId::B, now).take_at_pickup()
            }
            _ => None,
        };
        debug!(arm = ?role, %at, ?grabbed, "sim: gripper closed");
        self.arm_mut(role).held = grabbed;
    }

    pub fn open_gripper(&mut self, role: ArmRole, now: Instant) {
        let at = self.arm_position(role, now);
        let Some(color) = self.arm_mut(role).held.take() else {
            return;
        };
        let target = match role {
            ArmRole::Loader if near(&at, &self.stations.belt_a_drop, STATION_RADIUS) => Some(BeltId::A),
            ArmRole::Transfer if near(&at, &self.stations.belt_b_drop, TRANSFER_RADIUS) => Some(BeltId::B),
            ArmRole::Sorter => {
                info!(%color, pose = %at, "sim: cube released by sorter");
                self.released.push(Released { color, pose: at });
                return;
            }
            _ => None,
        };
        match target {
            Some(id) => {
                debug!(belt = ?id, %color, "sim: cube placed on belt");
                self.belt_mut(id, now).cubes.push(BeltCube { color, travel: 0.0 });
            }
            None => {
                warn!(arm = ?role, %color, pose = %at, "sim: cube dropped outside any station");
                self.lost += 1;
            }
        }
    }

    pub fn set_belt(&mut self, id: BeltId, running: bool, now: Instant) {
        let belt = self.belt_mut(id, now);
        belt.running = running;
        debug!(belt = ?id, running, "sim: belt");
    }

    pub fn arrival_presence(&mut self, id: BeltId, now: Instant) -> bool {
        self.belt_mut(id, now).leading().is_some_and(|c| c.travel >= ARRIVAL_AT)
    }

    /// Presence and distance seen by the stop sensor, in meters
    pub fn stop_reading(&mut self, id: BeltId, now: Instant) -> (bool, f64) {
        match self.belt_mut(id, now).leading() {
            Some(cube) => {
                let distance = SENSOR_AT - cube.travel;
                if (0.0..=STOP_RANGE).contains(&distance) {
                    (true, distance)
                } else {
                    (false, STOP_RANGE)
                }
            }
            None => (false, STOP_RANGE),
        }
    }

    /// Color of the cube held in front of the color sensor
    pub fn color_in_view(&self, now: Instant) -> Option<CubeColor> {
        let sorter = self.arm(ArmRole::Sorter);
        let at = sorter.position(now);
        let hold = &self.stations.color_hold;
        let in_view = (at.x - hold.x).abs() <= 0.05 && (at.y - hold.y).abs() <= 0.05 && (at.z - hold.z).abs() <= 0.05;
        if in_view { sorter.held } else { None }
    }

    pub fn released(&self) -> &[Released] {
        &self.released
    }

    pub fn lost(&self) -> u32 {
        self.lost
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn world() -> World {
        World::new(&Config::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_loader_grabs_only_at_spawn() {
        let config = Config::default();
        let mut world = world();
        let now = Instant::now();

        // Parked above the spawn, out of vertical reach
        world.start_move(ArmRole::Loader, config.stage1.spawn.raised(0.3), now);
        tokio::time::sleep(Duration::from_secs(5)).await;
        world.close_gripper(ArmRole::Loader, Instant::now());
        assert_eq!(world.arm(ArmRole::Loader).held, None);

        world.start_move(ArmRole::Loader, config.stage1.spawn, Instant::now());
        tokio::time::sleep(Duration::from_secs(5)).await;
        world.close_gripper(ArmRole::Loader, Instant::now());
        assert_eq!(world.arm(ArmRole::Loader).held, Some(CubeColor::Red));
    }

    #[tokio::test(start_paused = true)]
    async fn test_belt_carries_cube_to_the_stop_sensor() {
        let mut world = world();
        world.belts[0].cubes.push(BeltCube {
            color: CubeColor::Blue,
            travel: 0.0,
        });
        world.set_belt(BeltId::A, true, Instant::now());
        assert!(!world.arrival_presence(BeltId::A, Instant::now()));

        // 0.1 m/s for 3 s
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(world.arrival_presence(BeltId::A, Instant::now()));
        assert!(!world.stop_reading(BeltId::A, Instant::now()).0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        world.set_belt(BeltId::A, false, Instant::now());
        let (present, distance) = world.stop_reading(BeltId::A, Instant::now());
        assert!(present);
        assert!((distance - 0.275).abs() < 1e-6);

        // Stopped belt: nothing moves
        tokio::time::sleep(Duration::from_secs(10)).await;
        let (_, later) = world.stop_reading(BeltId::A, Instant::now());
        assert!((later - distance).abs() < 1e-12);
        assert_eq!(world.belts[0].take_at_pickup(), Some(CubeColor::Blue));
    }

    #[tokio::test(start_paused = true)]
    async fn test_running_belt_drops_cubes_off_the_end() {
        let mut world = world();
        world.belts[1].cubes.push(BeltCube {
            color: CubeColor::Green,
            travel: 0.0,
        });
        world.set_belt(BeltId::B, true, Instant::now());
        tokio::time::sleep(Duration::from_secs(20)).await;

        assert_eq!(world.stop_reading(BeltId::B, Instant::now()), (false, STOP_RANGE));
        assert_eq!(world.lost(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_arm_interpolates_toward_target() {
        let mut world = world();
        let start = world.arm_position(ArmRole::Transfer, Instant::now());
        let target = start.shifted_x(1.0);

        let duration = world.start_move(ArmRole::Transfer, target, Instant::now());
        assert_eq!(duration, Duration::from_secs(2));

        tokio::time::sleep(Duration::from_secs(1)).await;
        let halfway = world.arm_position(ArmRole::Transfer, Instant::now());
        assert!((halfway.x - (start.x + 0.5)).abs() < 1e-6);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(world.arm_position(ArmRole::Transfer, Instant::now()), target);
    }

    #[test]
    fn test_spawn_colors_cycle() {
        let mut world = world();
        let colors: Vec<CubeColor> = (0..6).map(|_| world.next_color()).collect();
        assert_eq!(
            colors,
            vec![
                CubeColor::Red,
                CubeColor::Unknown,
                CubeColor::Blue,
                CubeColor::Red,
                CubeColor::Green,
                CubeColor::Red
            ]
        );
    }
}
