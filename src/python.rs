use numpy::ndarray::{Array1, Array2};
use numpy::{IntoPyArray, PyArray1, PyArray2};
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::types::PyDict;

use crate::config::ScenarioConfig;
use crate::core::particle::DIM;
use crate::core::{Bounds, Domain, Particle, SimOptions, Simulation, SpawnParams};

fn py_err<E: ToString>(e: E) -> PyErr {
    PyValueError::new_err(e.to_string())
}

fn vec3(name: &str, values: Vec<f64>) -> PyResult<[f64; DIM]> {
    <[f64; DIM]>::try_from(values)
        .map_err(|v| py_err(format!("{name} must have length {DIM}, got {}", v.len())))
}

/// SphereSim Python-facing wrapper around the Rust Simulation core.
///
/// API:
/// - __new__(x_bounds, y_bounds, z_bounds=(None, None), contact_tolerance=1e-3)
/// - add_particle(position, velocity, mass, radius, acceleration=None) -> int
/// - add_random_particles(count, mass=1.0, radius=5.0, max_speed=100.0, seed=None) -> int
/// - run(duration) / start(duration) / advance_to(time) / stop()
/// - get_positions(), get_velocities() -> np.ndarray, shape (N, 3)
/// - get_radii() -> np.ndarray, shape (N,)
#[pyclass]
pub struct SphereSim {
    sim: Simulation,
}

#[pymethods]
impl SphereSim {
    /// Create an empty simulation in an axis-aligned domain.
    ///
    /// Each bounds argument is a `(lower, upper)` pair where `None` leaves that side open.
    ///
    /// Errors: raises ValueError on invalid bounds or tolerance.
    #[new]
    #[pyo3(signature = (x_bounds, y_bounds, z_bounds=(None, None), contact_tolerance=1e-3))]
    fn new(
        x_bounds: (Option<f64>, Option<f64>),
        y_bounds: (Option<f64>, Option<f64>),
        z_bounds: (Option<f64>, Option<f64>),
        contact_tolerance: f64,
    ) -> PyResult<Self> {
        let axis = |(lower, upper): (Option<f64>, Option<f64>)| Bounds { lower, upper };
        let domain = Domain::new(axis(x_bounds), axis(y_bounds), axis(z_bounds)).map_err(py_err)?;
        let sim = Simulation::new(domain, Vec::new(), SimOptions { contact_tolerance })
            .map_err(py_err)?;
        Ok(Self { sim })
    }

    /// Build a simulation from a YAML scenario file.
    #[staticmethod]
    fn from_yaml(path: &str) -> PyResult<Self> {
        let sim = ScenarioConfig::from_path(path)
            .and_then(|cfg| cfg.build())
            .map_err(py_err)?;
        Ok(Self { sim })
    }

    /// Add one particle; returns its index.
    #[pyo3(signature = (position, velocity, mass, radius, acceleration=None))]
    fn add_particle(
        &mut self,
        position: Vec<f64>,
        velocity: Vec<f64>,
        mass: f64,
        radius: f64,
        acceleration: Option<Vec<f64>>,
    ) -> PyResult<usize> {
        let a = match acceleration {
            Some(a) => vec3("acceleration", a)?,
            None => [0.0; DIM],
        };
        let p = Particle::new(
            vec3("position", position)?,
            vec3("velocity", velocity)?,
            a,
            mass,
            radius,
        )
        .map_err(py_err)?;
        self.sim.add_particle(p).map_err(py_err)
    }

    /// Randomly place up to `count` particles; returns how many were placed.
    #[pyo3(signature = (count, mass=1.0, radius=5.0, max_speed=100.0, seed=None))]
    fn add_random_particles(
        &mut self,
        count: usize,
        mass: f64,
        radius: f64,
        max_speed: f64,
        seed: Option<u64>,
    ) -> PyResult<usize> {
        let params = SpawnParams {
            mass,
            radius,
            max_speed,
            acceleration: [0.0; DIM],
        };
        self.sim
            .add_random_particles(count, &params, seed)
            .map_err(py_err)
    }

    /// Begin a run of `duration` seconds; pair with `advance_to`.
    fn start(&mut self, duration: f64) -> PyResult<()> {
        self.sim.start(duration).map_err(py_err)
    }

    /// Advance the running simulation to `target_time` (releases the GIL during computation).
    ///
    /// Returns True while the run is still active.
    fn advance_to(&mut self, py: Python<'_>, target_time: f64) -> PyResult<bool> {
        py.detach(|| self.sim.advance_to(target_time))
            .map_err(py_err)
    }

    /// Abort the active run. Returns whether one was active.
    fn stop(&mut self) -> bool {
        self.sim.stop()
    }

    /// Run for `duration` seconds and return collision counters as a dict.
    fn run(&mut self, py: Python<'_>, duration: f64) -> PyResult<Py<PyDict>> {
        let stats = py.detach(|| self.sim.run(duration)).map_err(py_err)?;
        let out = PyDict::new(py);
        out.set_item("pair_collisions", stats.pair_collisions)?;
        out.set_item("wall_collisions", stats.wall_collisions)?;
        out.set_item("stale_events", stats.stale_events)?;
        out.set_item("scheduled_events", stats.scheduled_events)?;
        Ok(out.unbind())
    }

    /// Current simulation time.
    fn time(&self) -> f64 {
        self.sim.time()
    }

    fn is_running(&self) -> bool {
        self.sim.is_running()
    }

    fn kinetic_energy(&self) -> f64 {
        self.sim.kinetic_energy()
    }

    /// Collision counter of every particle.
    fn collision_counts(&self) -> Vec<u64> {
        self.sim.particles().iter().map(|p| p.collision_count).collect()
    }

    /// Return positions as a NumPy array of shape (N, 3), dtype=float64.
    fn get_positions(&self, py: Python<'_>) -> Py<PyArray2<f64>> {
        rows_to_array(py, self.sim.positions())
    }

    /// Return velocities as a NumPy array of shape (N, 3), dtype=float64.
    fn get_velocities(&self, py: Python<'_>) -> Py<PyArray2<f64>> {
        rows_to_array(py, self.sim.velocities())
    }

    /// Return radii as a NumPy array of shape (N,), dtype=float64.
    fn get_radii(&self, py: Python<'_>) -> Py<PyArray1<f64>> {
        let radii: Array1<f64> = self.sim.bodies().map(|b| b.radius).collect();
        radii.into_pyarray(py).unbind()
    }
}

fn rows_to_array(py: Python<'_>, rows: Vec<[f64; DIM]>) -> Py<PyArray2<f64>> {
    let mut arr = Array2::<f64>::zeros((rows.len(), DIM));
    for (i, row) in rows.iter().enumerate() {
        for (k, x) in row.iter().enumerate() {
            arr[[i, k]] = *x;
        }
    }
    arr.into_pyarray(py).unbind()
}

/// The spheresim Python module entry point.
#[pymodule]
fn spheresim(_py: Python<'_>, m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<SphereSim>()?;
    Ok(())
}
