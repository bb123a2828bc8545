use crate::core::domain::{Axis, Bounds, Domain};
use crate::core::event::{Event, EventKind, EventQueue, ParticleId};
use crate::core::particle::{DEFAULT_CONTACT_TOLERANCE, DIM};
use crate::core::Particle;
use crate::error::{Error, Result};
use rand::{rng, rngs::StdRng, Rng, SeedableRng};

/// Small numeric tolerance for time checks.
const EPS_TIME: f64 = 1e-12;

/// Slack for the post-collision containment diagnostic.
const EPS_CONTAINMENT: f64 = 1e-6;

/// Placement attempts per randomly spawned particle before it is dropped.
const MAX_SPAWN_ATTEMPTS: usize = 100;

/// Engine tuning knobs fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimOptions {
    /// Contact slack: squared-distance tolerance for pairs, distance tolerance for walls.
    pub contact_tolerance: f64,
}

impl Default for SimOptions {
    fn default() -> Self {
        Self {
            contact_tolerance: DEFAULT_CONTACT_TOLERANCE,
        }
    }
}

/// Lifecycle of a run. Only one run may be active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunState {
    #[default]
    Idle,
    Running,
}

/// Counters for the current (or last) run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunStats {
    /// Resolved particle-particle collisions.
    pub pair_collisions: u64,
    /// Resolved particle-wall collisions.
    pub wall_collisions: u64,
    /// Extracted events discarded as stale.
    pub stale_events: u64,
    /// Events inserted into the queue.
    pub scheduled_events: u64,
}

impl RunStats {
    /// All resolved collisions.
    pub fn collisions(&self) -> u64 {
        self.pair_collisions + self.wall_collisions
    }
}

/// What a renderer needs to draw one particle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyView {
    pub position: [f64; DIM],
    pub radius: f64,
}

/// Parameters for randomly populating the domain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpawnParams {
    pub mass: f64,
    pub radius: f64,
    /// Velocity components on bounded axes are drawn from `[0, max_speed)`.
    pub max_speed: f64,
    pub acceleration: [f64; DIM],
}

impl Default for SpawnParams {
    fn default() -> Self {
        Self {
            mass: 1.0,
            radius: 5.0,
            max_speed: 100.0,
            acceleration: [0.0; DIM],
        }
    }
}

/// Event-driven rigid-sphere simulation.
///
/// Owns the particles, the domain, the event queue and the clock. Events are
/// predicted per particle against every other particle and every present
/// wall, then consumed in time order; stale events are dropped on extraction
/// by comparing collision-count snapshots.
///
/// A host drives a run either all at once with [`Simulation::run`] or
/// incrementally with [`Simulation::start`] followed by
/// [`Simulation::advance_to`] / [`Simulation::tick`] (sampling) and
/// [`Simulation::resolve_next`] (one exact collision at a time).
#[derive(Debug)]
pub struct Simulation {
    time_now: f64,
    end_time: Option<f64>,
    domain: Domain,
    particles: Vec<Particle>,
    queue: EventQueue,
    state: RunState,
    options: SimOptions,
    stats: RunStats,
}

impl Simulation {
    /// Create a simulation over `domain` with an initial particle set.
    ///
    /// Errors:
    /// - `Error::InvalidConfiguration` for non-positive mass/radius, a centre outside the
    ///   domain, overlapping particles, a particle resting on a wall under
    ///   acceleration, or a non-positive contact tolerance.
    pub fn new(domain: Domain, particles: Vec<Particle>, options: SimOptions) -> Result<Self> {
        if !options.contact_tolerance.is_finite() || options.contact_tolerance <= 0.0 {
            return Err(Error::InvalidConfiguration(
                "contact_tolerance must be finite and > 0".into(),
            ));
        }
        let mut sim = Self {
            time_now: 0.0,
            end_time: None,
            domain,
            particles: Vec::with_capacity(particles.len()),
            queue: EventQueue::new(),
            state: RunState::Idle,
            options,
            stats: RunStats::default(),
        };
        for p in particles {
            sim.add_particle(p)?;
        }
        Ok(sim)
    }

    /// Returns current simulation time.
    pub fn time(&self) -> f64 {
        self.time_now
    }

    /// End of the active run (the event horizon), if any.
    pub fn end_time(&self) -> Option<f64> {
        self.end_time
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == RunState::Running
    }

    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    pub fn options(&self) -> &SimOptions {
        &self.options
    }

    /// Counters of the current or most recent run.
    pub fn stats(&self) -> RunStats {
        self.stats
    }

    /// Number of particles.
    pub fn num_particles(&self) -> usize {
        self.particles.len()
    }

    /// Read-only particle state.
    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn particle(&self, id: ParticleId) -> Option<&Particle> {
        self.particles.get(id)
    }

    /// Number of queued events, stale ones included.
    pub fn pending_events(&self) -> usize {
        self.queue.len()
    }

    /// Positions as a Vec of fixed-size arrays.
    pub fn positions(&self) -> Vec<[f64; DIM]> {
        self.particles.iter().map(|p| p.r).collect()
    }

    /// Velocities as a Vec of fixed-size arrays.
    pub fn velocities(&self) -> Vec<[f64; DIM]> {
        self.particles.iter().map(|p| p.v).collect()
    }

    /// Position and radius of every particle, for rendering.
    pub fn bodies(&self) -> impl Iterator<Item = BodyView> + '_ {
        self.particles.iter().map(|p| BodyView {
            position: p.r,
            radius: p.radius,
        })
    }

    /// Compute total kinetic energy (diagnostic).
    pub fn kinetic_energy(&self) -> f64 {
        self.particles.iter().map(|p| p.kinetic_energy()).sum()
    }

    /// Total linear momentum (diagnostic).
    pub fn momentum(&self) -> [f64; DIM] {
        let mut total = [0.0; DIM];
        for p in &self.particles {
            for (t, m) in total.iter_mut().zip(p.momentum()) {
                *t += m;
            }
        }
        total
    }

    // ============ Population ============

    /// Add one particle at the current time. Rejected while running.
    pub fn add_particle(&mut self, p: Particle) -> Result<ParticleId> {
        self.ensure_idle()?;
        self.validate_particle(&p)?;
        self.particles.push(p);
        Ok(self.particles.len() - 1)
    }

    /// Remove every particle. Rejected while running.
    pub fn clear_particles(&mut self) -> Result<()> {
        self.ensure_idle()?;
        self.particles.clear();
        self.queue.clear();
        Ok(())
    }

    /// Place up to `count` non-overlapping particles at random.
    ///
    /// Fully bounded axes get a uniform position inside the walls (radius
    /// margin) and a velocity component in `[0, max_speed)`; other axes get a
    /// fixed coordinate and no velocity. A particle that cannot be placed
    /// within a few attempts is skipped. Returns how many were added.
    pub fn add_random_particles(
        &mut self,
        count: usize,
        params: &SpawnParams,
        seed: Option<u64>,
    ) -> Result<usize> {
        self.ensure_idle()?;
        if !params.max_speed.is_finite() || params.max_speed < 0.0 {
            return Err(Error::InvalidConfiguration(
                "max_speed must be finite and >= 0".into(),
            ));
        }
        // Validates mass, radius and acceleration once for the whole batch.
        Particle::new([0.0; DIM], [0.0; DIM], params.acceleration, params.mass, params.radius)?;
        let radius = params.radius;
        for axis in Axis::ALL {
            let b = self.domain.bounds(axis);
            if let (Some(lo), Some(hi)) = (b.lower, b.upper) {
                if hi - lo < 2.0 * radius {
                    return Err(Error::InvalidConfiguration(format!(
                        "{axis:?} extent is smaller than a particle diameter"
                    )));
                }
            }
        }

        let mut rng: StdRng = match seed {
            Some(s) => SeedableRng::seed_from_u64(s),
            None => SeedableRng::seed_from_u64(rng().random()),
        };

        let mut added = 0usize;
        for _ in 0..count {
            let mut placed = false;
            for _ in 0..MAX_SPAWN_ATTEMPTS {
                let mut r = [0.0_f64; DIM];
                let mut v = [0.0_f64; DIM];
                for axis in Axis::ALL {
                    let k = axis.index();
                    let b = self.domain.bounds(axis);
                    match (b.lower, b.upper) {
                        (Some(lo), Some(hi)) => {
                            r[k] = rng.random_range((lo + radius)..=(hi - radius));
                            if params.max_speed > 0.0 {
                                v[k] = rng.random_range(0.0..params.max_speed);
                            }
                        }
                        _ => r[k] = open_axis_coordinate(b, radius),
                    }
                }
                let tol = self.options.contact_tolerance;
                if !overlaps_existing(&self.particles, &r, radius, tol) {
                    let p = Particle::new(r, v, params.acceleration, params.mass, radius)?;
                    if Axis::ALL
                        .into_iter()
                        .any(|axis| p.rests_on_wall(axis, self.domain.bounds(axis), tol))
                    {
                        continue;
                    }
                    self.particles.push(p);
                    added += 1;
                    placed = true;
                    break;
                }
            }
            if !placed {
                log::debug!("no room for another particle after {MAX_SPAWN_ATTEMPTS} attempts");
            }
        }
        if added < count {
            log::warn!("placed {added} of {count} requested particles");
        }
        Ok(added)
    }

    // ============ Run control ============

    /// Begin a run lasting `duration` from the current time and seed the queue.
    ///
    /// Errors:
    /// - `Error::AlreadyRunning` if a run is active.
    /// - `Error::InvalidParam` if `duration` is negative or not finite.
    pub fn start(&mut self, duration: f64) -> Result<()> {
        if self.is_running() {
            return Err(Error::AlreadyRunning);
        }
        if !duration.is_finite() || duration < 0.0 {
            return Err(Error::InvalidParam(
                "duration must be finite and >= 0".into(),
            ));
        }
        if self.particles.is_empty() {
            log::warn!("starting a run without particles");
        }

        let end = self.time_now + duration;
        self.queue.clear();
        self.stats = RunStats::default();
        self.end_time = Some(end);
        self.state = RunState::Running;

        for i in 0..self.particles.len() {
            self.predict(Some(i), self.time_now, end)?;
        }
        log::info!(
            "simulation started: {} particles, t = {} .. {}, {} events scheduled",
            self.particles.len(),
            self.time_now,
            end,
            self.queue.len()
        );
        Ok(())
    }

    /// Abort the active run between events. Returns whether a run was active.
    pub fn stop(&mut self) -> bool {
        if !self.is_running() {
            return false;
        }
        log::info!("simulation stopped at t = {}", self.time_now);
        self.finish();
        true
    }

    /// Run for `duration`, resolving every collision, and return the run's counters.
    pub fn run(&mut self, duration: f64) -> Result<RunStats> {
        self.start(duration)?;
        self.advance_to(self.time_now + duration)?;
        Ok(self.stats)
    }

    /// Advance the clock by `elapsed`, resolving every collision on the way.
    ///
    /// Returns `true` while the run is still active.
    pub fn tick(&mut self, elapsed: f64) -> Result<bool> {
        if !elapsed.is_finite() || elapsed < 0.0 {
            return Err(Error::InvalidParam(
                "elapsed time must be finite and >= 0".into(),
            ));
        }
        self.advance_to(self.time_now + elapsed)
    }

    /// Advance to `target_time` (clamped to the end of the run), resolving every
    /// collision up to it and then moving all particles to that instant.
    ///
    /// Sampling at arbitrary instants does not change which collisions happen
    /// or when. Returns `true` while the run is still active; reaching the end
    /// of the run finishes it.
    pub fn advance_to(&mut self, target_time: f64) -> Result<bool> {
        let end = self.running_end()?;
        if !target_time.is_finite() {
            return Err(Error::InvalidParam("target_time must be finite".into()));
        }
        if target_time < self.time_now - EPS_TIME {
            return Err(Error::InvalidParam(
                "target_time cannot be earlier than current time".into(),
            ));
        }
        let target = target_time.min(end);

        while self.resolve_next(target)?.is_some() {}
        self.drift_all(target);

        if self.time_now >= end - EPS_TIME {
            log::info!(
                "simulation finished at t = {}: {} pair, {} wall collisions, {} stale events",
                self.time_now,
                self.stats.pair_collisions,
                self.stats.wall_collisions,
                self.stats.stale_events
            );
            self.finish();
            return Ok(false);
        }
        Ok(true)
    }

    /// Resolve the earliest valid event scheduled no later than `bound`.
    ///
    /// Stale events met on the way are discarded. On success every particle
    /// has been moved to the event time, the collision response applied and
    /// new events predicted for the participants. Returns `None` when no
    /// valid event is due by `bound` (or by the end of the run).
    pub fn resolve_next(&mut self, bound: f64) -> Result<Option<Event>> {
        let end = self.running_end()?;
        let limit = bound.min(end);

        loop {
            match self.queue.peek() {
                Some(ev) if ev.time_f64() <= limit => {}
                _ => return Ok(None),
            }
            let Some(ev) = self.queue.extract_min() else {
                return Ok(None);
            };

            if !ev.is_valid(&self.particles) {
                self.stats.stale_events += 1;
                log::trace!("discarding stale event {:?}", ev.kind);
                continue;
            }

            let t_ev = ev.time_f64().max(self.time_now);
            self.drift_all(t_ev);
            self.apply(&ev.kind)?;

            self.predict(Some(ev.kind.primary()), t_ev, end)?;
            self.predict(ev.kind.secondary(), t_ev, end)?;
            return Ok(Some(ev));
        }
    }

    /// Predict collisions of particle `id` against every other particle and
    /// every present wall, scheduling those that fall in `[from_time, horizon]`.
    ///
    /// `None` or an unknown id is a no-op. Returns how many events were scheduled.
    pub fn predict(
        &mut self,
        id: Option<ParticleId>,
        from_time: f64,
        horizon: f64,
    ) -> Result<usize> {
        let Some(i) = id else { return Ok(0) };
        let Some(p) = self.particles.get(i) else {
            return Ok(0);
        };
        let tol = self.options.contact_tolerance;
        let mut scheduled = 0usize;

        for (j, q) in self.particles.iter().enumerate() {
            if j == i {
                continue;
            }
            let dt = p.time_to_hit(q, tol);
            if let Some(t) = within_horizon(from_time, dt, horizon) {
                self.queue.insert(Event::new(t, EventKind::pair(i, p, j, q))?);
                scheduled += 1;
            }
        }

        for axis in Axis::ALL {
            let bounds = self.domain.bounds(axis);
            if bounds.is_unbounded() {
                continue;
            }
            let dt = p.time_to_hit_wall(axis, bounds, tol);
            if let Some(t) = within_horizon(from_time, dt, horizon) {
                self.queue.insert(Event::new(t, EventKind::wall(i, p, axis))?);
                scheduled += 1;
            }
        }

        self.stats.scheduled_events += scheduled as u64;
        Ok(scheduled)
    }

    // ============ Internal helpers ============

    fn ensure_idle(&self) -> Result<()> {
        if self.is_running() {
            Err(Error::AlreadyRunning)
        } else {
            Ok(())
        }
    }

    fn running_end(&self) -> Result<f64> {
        match (self.state, self.end_time) {
            (RunState::Running, Some(end)) => Ok(end),
            _ => Err(Error::NotRunning),
        }
    }

    fn finish(&mut self) {
        self.state = RunState::Idle;
        self.end_time = None;
        self.queue.clear();
    }

    fn validate_particle(&self, p: &Particle) -> Result<()> {
        if !p.radius.is_finite() || p.radius <= 0.0 {
            return Err(Error::InvalidConfiguration(
                "radius must be finite and > 0".into(),
            ));
        }
        if !p.mass.is_finite() || p.mass <= 0.0 {
            return Err(Error::InvalidConfiguration(
                "mass must be finite and > 0".into(),
            ));
        }
        if !self.domain.contains(&p.r) {
            return Err(Error::InvalidConfiguration(format!(
                "particle at {:?} lies outside the domain",
                p.r
            )));
        }
        let tol = self.options.contact_tolerance;
        if let Some(axis) = Axis::ALL
            .into_iter()
            .find(|&axis| p.rests_on_wall(axis, self.domain.bounds(axis), tol))
        {
            return Err(Error::InvalidConfiguration(format!(
                "particle at {:?} rests on a {axis:?} wall under acceleration",
                p.r
            )));
        }
        if let Some(k) = self.particles.iter().position(|q| {
            let sigma = p.radius + q.radius;
            p.dist_sq_to(q) < sigma * sigma - tol
        }) {
            return Err(Error::InvalidConfiguration(format!(
                "particle at {:?} overlaps particle {k}",
                p.r
            )));
        }
        Ok(())
    }

    /// Move every particle to absolute time `to_time` by closed-form kinematics.
    fn drift_all(&mut self, to_time: f64) {
        let dt = to_time - self.time_now;
        if dt > 0.0 {
            for p in &mut self.particles {
                p.advance(dt);
            }
            self.time_now = to_time;
        }
    }

    fn apply(&mut self, kind: &EventKind) -> Result<()> {
        match *kind {
            EventKind::Pair { i, j, .. } => {
                let (a, b) = pair_mut(&mut self.particles, i, j)?;
                a.bounce_off(b);
                self.stats.pair_collisions += 1;
                log::debug!("t = {}: particles {i} and {j} collide", self.time_now);
            }
            EventKind::Wall { i, axis, .. } => {
                let p = self.particles.get_mut(i).ok_or_else(|| {
                    Error::InvalidParam(format!("event references unknown particle {i}"))
                })?;
                p.bounce_off_wall(axis);
                self.stats.wall_collisions += 1;
                log::debug!("t = {}: particle {i} bounces off {axis:?} wall", self.time_now);
            }
        }
        for id in [Some(kind.primary()), kind.secondary()].into_iter().flatten() {
            if let Some(p) = self.particles.get(id) {
                if !within_reach(&self.domain, p) {
                    log::warn!("particle {id} left the domain: r = {:?}", p.r);
                }
            }
        }
        Ok(())
    }
}

// ============ Utility helpers ============

#[inline]
fn within_horizon(from_time: f64, dt: f64, horizon: f64) -> Option<f64> {
    if !dt.is_finite() || dt < 0.0 {
        return None;
    }
    let t = from_time + dt;
    (t <= horizon).then_some(t)
}

/// Centre within one radius of every present wall.
fn within_reach(domain: &Domain, p: &Particle) -> bool {
    Axis::ALL.iter().all(|&axis| {
        let x = p.r[axis.index()];
        let b = domain.bounds(axis);
        let slack = p.radius + EPS_CONTAINMENT;
        b.lower.is_none_or(|lo| x >= lo - slack) && b.upper.is_none_or(|hi| x <= hi + slack)
    })
}

/// Coordinate for an axis that is not walled on both sides: the origin, moved
/// just clear of the wall that is present.
fn open_axis_coordinate(b: Bounds, radius: f64) -> f64 {
    match (b.lower, b.upper) {
        (Some(lo), _) => lo.max(-radius) + radius,
        (_, Some(hi)) => hi.min(radius) - radius,
        (None, None) => 0.0,
    }
}

fn pair_mut(
    particles: &mut [Particle],
    i: usize,
    j: usize,
) -> Result<(&mut Particle, &mut Particle)> {
    let n = particles.len();
    if i == j || i >= n || j >= n {
        return Err(Error::InvalidParam(format!(
            "invalid particle pair ({i}, {j}) for {n} particles"
        )));
    }
    if i < j {
        let (lo, hi) = particles.split_at_mut(j);
        Ok((&mut lo[i], &mut hi[0]))
    } else {
        let (lo, hi) = particles.split_at_mut(i);
        Ok((&mut hi[0], &mut lo[j]))
    }
}

fn overlaps_existing(existing: &[Particle], r: &[f64; DIM], radius: f64, tol: f64) -> bool {
    existing.iter().any(|p| {
        let sigma = p.radius + radius;
        let dsq: f64 = p.r.iter().zip(r.iter()).map(|(a, b)| (a - b) * (a - b)).sum();
        dsq < sigma * sigma - tol
    })
}
