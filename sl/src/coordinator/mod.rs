//! Stage coordination primitives
//!
//! Stages never share locks. They coordinate through two kinds of
//! watch-backed state:
//!
//! - [`RunControl`] - the process-wide run state, stopped exactly once
//! - [`handshake`] - a single-slot readiness signal between two adjacent
//!   stages, split into a [`Producer`] and a [`Consumer`] end
//!
//! Every wait on either returns early when the run stops.

mod handshake;
mod run_control;

pub use handshake::{Consumer, Producer, handshake};
pub use run_control::{LineState, RunControl};
