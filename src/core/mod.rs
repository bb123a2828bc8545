//! Core simulation types for the event-driven sphere engine.
//!
//! Leaves first: the polynomial [`solver`], the [`domain`] walls, the
//! [`particle`] kinematics and collision math, the [`event`] queue with
//! lazy invalidation, and the [`sim`] engine that ties them together.

pub mod domain;
pub mod event;
pub mod particle;
pub mod sim;
pub mod solver;

pub use domain::{Axis, Bounds, Domain};
pub use event::{Event, EventKind, EventQueue, ParticleId};
pub use particle::Particle;
pub use sim::{BodyView, RunState, RunStats, SimOptions, Simulation, SpawnParams};
