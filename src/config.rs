//! Scenario files: domain, engine settings and initial particles, loaded from YAML.
//!
//! ```yaml
//! domain:
//!   x: [0.0, 200.0]       # [lower, upper]; null leaves that side open
//!   y: [0.0, 100.0]
//!   z: [null, null]
//!
//! engine:
//!   duration: 5.0         # run length in seconds
//!   contact_tolerance: 1.0e-3
//!   frame_rate: 200.0     # sampling cadence of the host loop
//!
//! particles:
//!   - position: [0.0, 50.0, 0.0]
//!     velocity: [10.0, 0.0, 0.0]
//!     mass: 1.0
//!     radius: 5.0
//!
//! spawn:                  # optional random population
//!   count: 20
//!   seed: 42
//! ```

use crate::core::particle::{DEFAULT_CONTACT_TOLERANCE, DIM};
use crate::core::{Bounds, Domain, Particle, SimOptions, Simulation, SpawnParams};
use crate::error::{Error, Result};
use serde::Deserialize;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Walls of the domain, one `[lower, upper]` pair per axis.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct DomainConfig {
    #[serde(default)]
    pub x: [Option<f64>; 2],
    #[serde(default)]
    pub y: [Option<f64>; 2],
    #[serde(default)]
    pub z: [Option<f64>; 2],
}

impl DomainConfig {
    pub fn build(&self) -> Result<Domain> {
        let axis = |[lower, upper]: [Option<f64>; 2]| Bounds { lower, upper };
        Domain::new(axis(self.x), axis(self.y), axis(self.z))
    }
}

/// Run length and engine tuning.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    pub duration: f64,
    #[serde(default = "default_contact_tolerance")]
    pub contact_tolerance: f64,
    #[serde(default = "default_frame_rate")]
    pub frame_rate: f64,
}

fn default_contact_tolerance() -> f64 {
    DEFAULT_CONTACT_TOLERANCE
}

fn default_frame_rate() -> f64 {
    200.0
}

impl EngineConfig {
    /// Sampling interval of the host loop.
    pub fn frame_interval(&self) -> f64 {
        1.0 / self.frame_rate
    }

    fn validate(&self) -> Result<()> {
        if !self.duration.is_finite() || self.duration < 0.0 {
            return Err(Error::InvalidConfiguration(
                "engine.duration must be finite and >= 0".into(),
            ));
        }
        if !self.frame_rate.is_finite() || self.frame_rate <= 0.0 {
            return Err(Error::InvalidConfiguration(
                "engine.frame_rate must be finite and > 0".into(),
            ));
        }
        Ok(())
    }
}

/// Initial state of one particle.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct ParticleConfig {
    pub position: [f64; DIM],
    #[serde(default)]
    pub velocity: [f64; DIM],
    #[serde(default)]
    pub acceleration: [f64; DIM],
    pub mass: f64,
    pub radius: f64,
}

/// Random population added after the explicit particles.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct SpawnConfig {
    pub count: usize,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default = "default_spawn_mass")]
    pub mass: f64,
    #[serde(default = "default_spawn_radius")]
    pub radius: f64,
    #[serde(default = "default_spawn_speed")]
    pub max_speed: f64,
    #[serde(default)]
    pub acceleration: [f64; DIM],
}

fn default_spawn_mass() -> f64 {
    SpawnParams::default().mass
}

fn default_spawn_radius() -> f64 {
    SpawnParams::default().radius
}

fn default_spawn_speed() -> f64 {
    SpawnParams::default().max_speed
}

impl SpawnConfig {
    pub fn params(&self) -> SpawnParams {
        SpawnParams {
            mass: self.mass,
            radius: self.radius,
            max_speed: self.max_speed,
            acceleration: self.acceleration,
        }
    }
}

/// Top-level scenario configuration loaded from YAML.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct ScenarioConfig {
    pub domain: DomainConfig,
    pub engine: EngineConfig,
    #[serde(default)]
    pub particles: Vec<ParticleConfig>,
    #[serde(default)]
    pub spawn: Option<SpawnConfig>,
}

impl ScenarioConfig {
    pub fn from_yaml_str(s: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(s)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_yaml::from_reader(reader)?)
    }

    /// Build an idle simulation from this scenario.
    pub fn build(&self) -> Result<Simulation> {
        self.engine.validate()?;
        let domain = self.domain.build()?;
        let particles = self
            .particles
            .iter()
            .map(|p| Particle::new(p.position, p.velocity, p.acceleration, p.mass, p.radius))
            .collect::<Result<Vec<_>>>()?;
        let options = SimOptions {
            contact_tolerance: self.engine.contact_tolerance,
        };
        let mut sim = Simulation::new(domain, particles, options)?;
        if let Some(spawn) = &self.spawn {
            sim.add_random_particles(spawn.count, &spawn.params(), spawn.seed)?;
        }
        Ok(sim)
    }
}
