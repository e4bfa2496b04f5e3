//! SortLine configuration types and loading

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::color::CubeColor;
use crate::pose::Pose;

/// Main SortLine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level", skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    /// Write logs to this file instead of stderr
    #[serde(rename = "log-file", skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,

    /// Thing Directory access
    pub directory: DirectoryConfig,

    /// Device titles per role
    pub devices: DevicesConfig,

    /// Closed-loop motion tuning
    pub motion: MotionConfig,

    /// Pick and place geometry
    #[serde(rename = "pick-place")]
    pub pick_place: PickPlaceConfig,

    /// Stage 1: spawn to belt A
    pub stage1: Stage1Config,

    /// Stage 2: belt A to belt B
    pub stage2: Stage2Config,

    /// Stage 3: belt B to color bins
    pub stage3: Stage3Config,

    /// Per-color quota that ends the run
    pub quota: QuotaConfig,

    /// Light observers
    pub lights: LightsConfig,

    /// Simulated line
    pub simulation: SimulationConfig,
}

/// Environment variable overriding the motion position tolerance (meters)
pub const ENV_POSITION_TOLERANCE: &str = "SORTLINE_POSITION_TOLERANCE";

/// Environment variable overriding the motion timeout (milliseconds)
pub const ENV_MOVE_TIMEOUT_MS: &str = "SORTLINE_MOVE_TIMEOUT_MS";

/// Environment variable overriding the motion poll interval (milliseconds)
pub const ENV_POLL_INTERVAL_MS: &str = "SORTLINE_POLL_INTERVAL_MS";

impl Config {
    /// Validate configuration before use
    pub fn validate(&self) -> Result<()> {
        if self.motion.position_tolerance <= 0.0 || self.motion.transfer_tolerance <= 0.0 {
            return Err(eyre::eyre!("motion tolerances must be positive"));
        }
        if self.motion.move_timeout_ms == 0 || self.motion.poll_interval_ms == 0 {
            return Err(eyre::eyre!("motion.move-timeout-ms and motion.poll-interval-ms must be positive"));
        }
        if self.quota.per_color == 0 {
            return Err(eyre::eyre!("quota.per-color must be at least 1"));
        }
        for (name, station) in [("stage2", &self.stage2.station), ("stage3", &self.stage3.station)] {
            if station.stop_poll_ms == 0 || station.arrival_poll_ms == 0 {
                return Err(eyre::eyre!("{}: sensor poll intervals must be positive", name));
            }
            if station.distance_tolerance < 0.0 {
                return Err(eyre::eyre!("{}: distance-tolerance must not be negative", name));
            }
        }
        if self.stage3.max_correction < 0.0 {
            return Err(eyre::eyre!("stage3.max-correction must not be negative"));
        }
        Ok(())
    }

    /// Load configuration with fallback chain, then apply env overrides
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        let mut config = Self::load_file_chain(config_path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    fn load_file_chain(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .sortline.yml
        let local_config = PathBuf::from(".sortline.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/sortline/sortline.yml
        if let Some(user_config) = Self::user_config_path().filter(|p| p.exists()) {
            match Self::load_from_file(&user_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("sortline").join("sortline.yml"))
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Read only the log level, before logging is initialized
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        let candidates = [
            config_path.cloned(),
            Some(PathBuf::from(".sortline.yml")),
            Self::user_config_path(),
        ];
        candidates
            .into_iter()
            .flatten()
            .find(|p| p.exists())
            .and_then(|p| fs::read_to_string(p).ok())
            .and_then(|content| serde_yaml::from_str::<Self>(&content).ok())
            .and_then(|c| c.log_level)
    }

    /// Apply motion overrides from the environment
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(raw) = lookup(ENV_POSITION_TOLERANCE) {
            match raw.trim().parse::<f64>() {
                Ok(v) if v > 0.0 => self.motion.position_tolerance = v,
                _ => tracing::warn!(key = ENV_POSITION_TOLERANCE, value = %raw, "Ignoring invalid override"),
            }
        }
        if let Some(raw) = lookup(ENV_MOVE_TIMEOUT_MS) {
            match raw.trim().parse::<u64>() {
                Ok(v) if v > 0 => self.motion.move_timeout_ms = v,
                _ => tracing::warn!(key = ENV_MOVE_TIMEOUT_MS, value = %raw, "Ignoring invalid override"),
            }
        }
        if let Some(raw) = lookup(ENV_POLL_INTERVAL_MS) {
            match raw.trim().parse::<u64>() {
                Ok(v) if v > 0 => self.motion.poll_interval_ms = v,
                _ => tracing::warn!(key = ENV_POLL_INTERVAL_MS, value = %raw, "Ignoring invalid override"),
            }
        }
    }
}

/// Thing Directory configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoryConfig {
    /// Listing endpoint returning all Thing Descriptions
    pub url: String,

    /// Directory request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,

    /// Per-device request timeout in milliseconds
    #[serde(rename = "device-timeout-ms")]
    pub device_timeout_ms: u64,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            url: thingclient::DEFAULT_DIRECTORY_URL.to_string(),
            timeout_ms: 10_000,
            device_timeout_ms: 60_000,
        }
    }
}

impl DirectoryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn device_timeout(&self) -> Duration {
        Duration::from_millis(self.device_timeout_ms)
    }
}

/// Device titles for each role on the line
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DevicesConfig {
    #[serde(rename = "loader-arm")]
    pub loader_arm: String,

    #[serde(rename = "transfer-arm")]
    pub transfer_arm: String,

    #[serde(rename = "sorter-arm")]
    pub sorter_arm: String,

    #[serde(rename = "belt-a")]
    pub belt_a: String,

    #[serde(rename = "belt-b")]
    pub belt_b: String,

    #[serde(rename = "color-sensor")]
    pub color_sensor: String,

    /// Early-warning sensor upstream on belt A
    #[serde(rename = "belt-a-arrival-sensor")]
    pub belt_a_arrival_sensor: String,

    /// Distance sensor at the belt A pickup point
    #[serde(rename = "belt-a-stop-sensor")]
    pub belt_a_stop_sensor: String,

    #[serde(rename = "belt-b-arrival-sensor")]
    pub belt_b_arrival_sensor: String,

    #[serde(rename = "belt-b-stop-sensor")]
    pub belt_b_stop_sensor: String,

    #[serde(rename = "red-light")]
    pub red_light: String,

    #[serde(rename = "blue-light")]
    pub blue_light: String,
}

impl Default for DevicesConfig {
    fn default() -> Self {
        Self {
            loader_arm: "VirtualUarm1".to_string(),
            transfer_arm: "VirtualUarm2".to_string(),
            sorter_arm: "VirtualUR3".to_string(),
            belt_a: "VirtualConveyorBelt1".to_string(),
            belt_b: "VirtualConveyorBelt2".to_string(),
            color_sensor: "VirtualColorSensor".to_string(),
            belt_a_arrival_sensor: "VirtualInfraredSensor2".to_string(),
            belt_a_stop_sensor: "VirtualInfraredSensor1".to_string(),
            belt_b_arrival_sensor: "VirtualInfraredSensor4".to_string(),
            belt_b_stop_sensor: "VirtualInfraredSensor3".to_string(),
            red_light: "virtualLightRed".to_string(),
            blue_light: "virtualLightBlue".to_string(),
        }
    }
}

impl DevicesConfig {
    /// Titles the line cannot run without
    pub fn required(&self) -> Vec<&str> {
        vec![
            self.loader_arm.as_str(),
            self.transfer_arm.as_str(),
            self.sorter_arm.as_str(),
            self.belt_a.as_str(),
            self.belt_b.as_str(),
            self.color_sensor.as_str(),
        ]
    }

    /// Sensor titles whose absence falls back to fixed delays
    pub fn optional(&self) -> Vec<&str> {
        vec![
            self.belt_a_arrival_sensor.as_str(),
            self.belt_a_stop_sensor.as_str(),
            self.belt_b_arrival_sensor.as_str(),
            self.belt_b_stop_sensor.as_str(),
        ]
    }
}

/// Closed-loop motion configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    /// Per-axis convergence tolerance in meters
    #[serde(rename = "position-tolerance")]
    pub position_tolerance: f64,

    /// Looser tolerance for moves near the edge of the reachable workspace
    #[serde(rename = "transfer-tolerance")]
    pub transfer_tolerance: f64,

    /// Give up on a move after this long
    #[serde(rename = "move-timeout-ms")]
    pub move_timeout_ms: u64,

    /// Position feedback poll interval
    #[serde(rename = "poll-interval-ms")]
    pub poll_interval_ms: u64,

    /// Upper bound on the backoff after failed feedback reads
    #[serde(rename = "read-backoff-max-ms")]
    pub read_backoff_max_ms: u64,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            position_tolerance: 0.020,
            transfer_tolerance: 0.1,
            move_timeout_ms: 30_000,
            poll_interval_ms: 50,
            read_backoff_max_ms: 1_000,
        }
    }
}

/// Pick and place geometry, tuned per deployment
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PickPlaceConfig {
    /// Height above the target for the approach and lift
    #[serde(rename = "approach-clearance")]
    pub approach_clearance: f64,

    /// Depth below the target for grasp and release
    #[serde(rename = "grasp-offset")]
    pub grasp_offset: f64,

    /// Height above the target after releasing
    #[serde(rename = "release-clearance")]
    pub release_clearance: f64,

    /// Pause after each gripper command
    #[serde(rename = "gripper-dwell-ms")]
    pub gripper_dwell_ms: u64,
}

impl Default for PickPlaceConfig {
    fn default() -> Self {
        Self {
            approach_clearance: 0.10,
            grasp_offset: 0.02,
            release_clearance: 0.15,
            gripper_dwell_ms: 300,
        }
    }
}

/// Stage 1 configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Stage1Config {
    /// Cube center at the spawn point
    pub spawn: Pose,

    /// Release point on belt A
    #[serde(rename = "belt-drop")]
    pub belt_drop: Pose,

    /// Pause before each pick, letting the next cube spawn
    #[serde(rename = "spawn-delay-ms")]
    pub spawn_delay_ms: u64,

    #[serde(rename = "backoff-ms")]
    pub backoff_ms: u64,
}

impl Default for Stage1Config {
    fn default() -> Self {
        Self {
            spawn: Pose::xyz(-0.147, 1.32, 1.036),
            belt_drop: Pose::xyz(0.135, 1.5379, 1.125),
            spawn_delay_ms: 1_000,
            backoff_ms: 2_000,
        }
    }
}

/// Sense-stop timing and calibration for one belt pickup station
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StationConfig {
    /// Arrival sensor poll interval
    #[serde(rename = "arrival-poll-ms")]
    pub arrival_poll_ms: u64,

    /// Stop sensor poll interval
    #[serde(rename = "stop-poll-ms")]
    pub stop_poll_ms: u64,

    /// Stop sensor polls before proceeding anyway
    #[serde(rename = "max-stop-checks")]
    pub max_stop_checks: u32,

    /// Calibrated stop distance in meters
    #[serde(rename = "target-distance")]
    pub target_distance: f64,

    /// Accepted window around the target distance
    #[serde(rename = "distance-tolerance")]
    pub distance_tolerance: f64,

    /// Pause right after the belt stop command
    #[serde(rename = "stop-delay-ms")]
    pub stop_delay_ms: u64,

    /// Settle delay before trusting the cube position
    #[serde(rename = "settle-ms")]
    pub settle_ms: u64,

    /// Fixed wait when the stop sensor is absent
    #[serde(rename = "no-sensor-delay-ms")]
    pub no_sensor_delay_ms: u64,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            arrival_poll_ms: 100,
            stop_poll_ms: 30,
            max_stop_checks: 200,
            target_distance: 0.275,
            distance_tolerance: 0.01,
            stop_delay_ms: 500,
            settle_ms: 1_500,
            no_sensor_delay_ms: 2_000,
        }
    }
}

/// Stage 2 configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Stage2Config {
    /// Ready pose above the pickup zone
    #[serde(rename = "ready-pose")]
    pub ready_pose: Pose,

    /// Expected cube center when stopped at the target distance
    #[serde(rename = "pick-pose")]
    pub pick_pose: Pose,

    /// Release point on belt B
    #[serde(rename = "belt-drop")]
    pub belt_drop: Pose,

    /// Pickup x correction per meter of stop distance deviation
    #[serde(rename = "correction-gain")]
    pub correction_gain: f64,

    /// Wait for stage 3 to be ready before releasing on belt B
    #[serde(rename = "wait-for-sorter")]
    pub wait_for_sorter: bool,

    pub station: StationConfig,

    #[serde(rename = "backoff-ms")]
    pub backoff_ms: u64,
}

impl Default for Stage2Config {
    fn default() -> Self {
        Self {
            ready_pose: Pose::xyz(1.2, 1.55, 1.15),
            pick_pose: Pose::xyz(1.2, 1.55, 1.10),
            belt_drop: Pose::xyz(1.455, 1.28, 1.1),
            correction_gain: 1.0,
            wait_for_sorter: true,
            station: StationConfig::default(),
            backoff_ms: 2_000,
        }
    }
}

/// Stage 3 configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Stage3Config {
    /// Expected cube center when stopped at the target distance
    #[serde(rename = "pick-pose")]
    pub pick_pose: Pose,

    /// Waypoint between belt B and the color sensor, also the green bin
    pub intermediate: Pose,

    /// Pose holding the cube in front of the color sensor, also the reject drop
    #[serde(rename = "color-hold")]
    pub color_hold: Pose,

    /// Lateral offset of the red (+y) and blue (-y) bins from the hold pose
    #[serde(rename = "bin-offset")]
    pub bin_offset: f64,

    /// Lift after releasing in a bin
    #[serde(rename = "release-lift")]
    pub release_lift: f64,

    /// Pickup y correction per meter of stop distance deviation
    #[serde(rename = "correction-gain")]
    pub correction_gain: f64,

    /// Largest allowed pickup y correction in meters
    #[serde(rename = "max-correction")]
    pub max_correction: f64,

    /// Color sensor presence polls before classifying anyway
    #[serde(rename = "color-attempts")]
    pub color_attempts: u32,

    #[serde(rename = "color-poll-ms")]
    pub color_poll_ms: u64,

    pub station: StationConfig,

    #[serde(rename = "backoff-ms")]
    pub backoff_ms: u64,
}

impl Default for Stage3Config {
    fn default() -> Self {
        Self {
            pick_pose: Pose::new(1.475, 0.1, 1.14, 0.0, -90.0, 0.0),
            intermediate: Pose::new(
                1.0537828862689,
                -0.08765775628191,
                1.1744665132727,
                179.19666489927985,
                -89.86710798104652,
                -109.20191005575211,
            ),
            color_hold: Pose::new(0.8, 0.22, 1.15, 90.0, -90.0, 0.0),
            bin_offset: 0.25,
            release_lift: 0.1,
            correction_gain: 0.1,
            max_correction: 0.05,
            color_attempts: 20,
            color_poll_ms: 100,
            station: StationConfig {
                distance_tolerance: 0.02,
                ..StationConfig::default()
            },
            backoff_ms: 2_000,
        }
    }
}

/// Per-color quota configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QuotaConfig {
    /// Cubes to sort per color before the line stops
    #[serde(rename = "per-color")]
    pub per_color: u32,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self { per_color: 1 }
    }
}

/// Light observer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LightsConfig {
    #[serde(rename = "poll-ms")]
    pub poll_ms: u64,
}

impl Default for LightsConfig {
    fn default() -> Self {
        Self { poll_ms: 500 }
    }
}

/// Simulated line configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Colors of spawned cubes, cycled in order
    #[serde(rename = "spawn-colors")]
    pub spawn_colors: Vec<CubeColor>,

    /// Shuffle the spawn order once at startup
    pub shuffle: bool,

    /// Speed of the position-only arm in m/s
    #[serde(rename = "arm-speed")]
    pub arm_speed: f64,

    /// Belt speed in m/s
    #[serde(rename = "belt-speed")]
    pub belt_speed: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            spawn_colors: vec![
                CubeColor::Red,
                CubeColor::Unknown,
                CubeColor::Blue,
                CubeColor::Red,
                CubeColor::Green,
            ],
            shuffle: false,
            arm_speed: 0.5,
            belt_speed: 0.1,
        }
    }
}
