//! Event-driven simulation of rigid spheres under piecewise-constant
//! acceleration, with collision times solved in closed form.

pub mod config;
pub mod core;
pub mod error;

#[cfg(feature = "python")]
mod python;

pub use crate::core::{Axis, Bounds, Domain, Particle, RunStats, SimOptions, Simulation};
pub use crate::error::{Error, Result};
