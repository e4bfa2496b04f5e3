//! SortLine - coordinator for a three-stage cube sorting line
//!
//! Three robotic arms and two conveyor belts, all reached as Web of Things
//! devices, move cubes from a spawn point to color bins:
//!
//! - Stage 1 picks a cube at the spawn point and drops it on belt A
//! - Stage 2 stops belt A at its sensor, picks the cube and drops it on belt B
//! - Stage 3 stops belt B, reads the cube's color and sorts it into a bin
//!
//! Adjacent stages hand cubes over through single-slot handshakes, and the
//! run ends once every color quota is met or the operator interrupts it.
//!
//! # Modules
//!
//! - [`units`] - unit normalization to meters and degrees
//! - [`pose`] - canonical 6-DOF poses
//! - [`color`] - RGB threshold classification
//! - [`device`] - role-typed views over discovered Things
//! - [`sensor`] - presence and distance readings
//! - [`motion`] - closed-loop moves and pick/place
//! - [`coordinator`] - run control and stage handshakes
//! - [`stage`] - the three stages and their driver
//! - [`line`] - wires the stages and runs them to completion
//! - [`lights`] - color-triggered light observers
//! - [`sim`] - an in-process simulated line
//! - [`config`] - configuration types and loading
//! - [`cli`] - command-line interface

pub mod cli;
pub mod color;
pub mod config;
pub mod coordinator;
pub mod device;
pub mod lights;
pub mod line;
pub mod motion;
pub mod pose;
pub mod sensor;
pub mod sim;
pub mod stage;
pub mod units;

pub use color::{CubeColor, Rgb, classify};
pub use config::Config;
pub use coordinator::{LineState, RunControl};
pub use line::{Line, LineReport};
pub use pose::Pose;
