use crate::core::domain::{Axis, Bounds};
use crate::core::solver;
use crate::error::{Error, Result};

/// Fixed spatial dimension (3D).
pub const DIM: usize = 3;

/// Default contact tolerance: squared-distance slack for pairs, distance slack for walls.
pub const DEFAULT_CONTACT_TOLERANCE: f64 = 1e-3;

/// Roots at or below this are the contact the particle is already in.
const MIN_TIME: f64 = 1e-12;

/// A rigid sphere under piecewise-constant acceleration.
///
/// Fields:
/// - `r`: position vector [x, y, z]
/// - `v`: velocity vector [vx, vy, vz]
/// - `a`: acceleration [ax, ay, az], constant between collisions
/// - `radius`: sphere radius (> 0)
/// - `mass`: particle mass (> 0)
/// - `collision_count`: incremented once per collision the particle takes part in
#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    /// Position (x, y, z).
    pub r: [f64; DIM],
    /// Velocity (vx, vy, vz).
    pub v: [f64; DIM],
    /// Acceleration (ax, ay, az).
    pub a: [f64; DIM],
    /// Sphere radius (> 0).
    pub radius: f64,
    /// Mass (> 0).
    pub mass: f64,
    /// Collision participation counter (for event invalidation).
    pub collision_count: u64,
}

impl Particle {
    /// Create a new particle after validating invariants.
    ///
    /// Errors:
    /// - `Error::InvalidConfiguration` if `radius` or `mass` is non-positive or any
    ///   component is NaN/inf.
    pub fn new(
        r: [f64; DIM],
        v: [f64; DIM],
        a: [f64; DIM],
        mass: f64,
        radius: f64,
    ) -> Result<Self> {
        if !radius.is_finite() || radius <= 0.0 {
            return Err(Error::InvalidConfiguration(
                "radius must be finite and > 0".into(),
            ));
        }
        if !mass.is_finite() || mass <= 0.0 {
            return Err(Error::InvalidConfiguration(
                "mass must be finite and > 0".into(),
            ));
        }
        for (name, vec) in [("position", &r), ("velocity", &v), ("acceleration", &a)] {
            if !vec.iter().all(|x| x.is_finite()) {
                return Err(Error::InvalidConfiguration(format!("{name} must be finite")));
            }
        }
        Ok(Self {
            r,
            v,
            a,
            radius,
            mass,
            collision_count: 0,
        })
    }

    /// Increment the collision counter (used for event invalidation).
    #[inline]
    pub fn bump_collision_count(&mut self) {
        self.collision_count = self.collision_count.saturating_add(1);
    }

    /// Returns the particle's kinetic energy: 1/2 m |v|^2.
    #[inline]
    pub fn kinetic_energy(&self) -> f64 {
        0.5 * self.mass * dot(&self.v, &self.v)
    }

    /// Linear momentum m v.
    #[inline]
    pub fn momentum(&self) -> [f64; DIM] {
        self.v.map(|c| self.mass * c)
    }

    /// Squared distance between centres.
    #[inline]
    pub fn dist_sq_to(&self, other: &Particle) -> f64 {
        let d = sub(&self.r, &other.r);
        dot(&d, &d)
    }

    /// Advance by `dt` under constant acceleration.
    ///
    /// Advancing by `t1` then `t2` matches a single advance by `t1 + t2`.
    pub fn advance(&mut self, dt: f64) {
        for k in 0..DIM {
            self.r[k] += self.v[k] * dt + 0.5 * self.a[k] * dt * dt;
            self.v[k] += self.a[k] * dt;
        }
    }

    /// Time until this particle and `other` are separated by exactly the sum of radii.
    ///
    /// Solves the quartic
    /// `|da|^2/4 t^4 + (dv.da) t^3 + (dp.da + |dv|^2) t^2 + 2(dp.dv) t + |dp|^2 - sigma^2 = 0`.
    ///
    /// A pair already in contact (within `tolerance` on the squared distance)
    /// only collides at `t = 0` if it is closing in. Otherwise the contact
    /// root is factored out and only a later return under relative
    /// acceleration counts. Returns `f64::INFINITY` when they never touch.
    pub fn time_to_hit(&self, other: &Particle, tolerance: f64) -> f64 {
        let dp = sub(&self.r, &other.r);
        let dv = sub(&self.v, &other.v);
        let da = sub(&self.a, &other.a);
        let sigma = self.radius + other.radius;

        let c4 = 0.25 * dot(&da, &da);
        let c3 = dot(&dv, &da);
        let c2 = dot(&dp, &da) + dot(&dv, &dv);
        let c1 = 2.0 * dot(&dp, &dv);
        let c0 = dot(&dp, &dp) - sigma * sigma;

        let t = if c0.abs() < tolerance {
            if c1 < 0.0 {
                return 0.0;
            }
            solver::solve_cubic(c4, c3, c2, c1)
                .map(|roots| solver::smallest_after(&roots, MIN_TIME))
        } else {
            solver::solve_quartic(c4, c3, c2, c1, c0)
                .map(|roots| solver::smallest_non_negative(&roots))
        };
        resolve_time(t)
    }

    /// Time until this particle touches a wall of `bounds` along `axis`.
    pub fn time_to_hit_wall(&self, axis: Axis, bounds: Bounds, tolerance: f64) -> f64 {
        let k = axis.index();
        time_to_hit_bound(
            self.r[k],
            self.v[k],
            self.a[k],
            self.radius,
            bounds,
            tolerance,
        )
    }

    /// Whether the sphere sits on a wall of `bounds` with its acceleration
    /// pressing it in and too little speed to bounce clear.
    ///
    /// Elastic bounces cannot model resting contact: such a sphere would sink
    /// through the wall.
    pub fn rests_on_wall(&self, axis: Axis, bounds: Bounds, tolerance: f64) -> bool {
        let k = axis.index();
        let (x, v, a) = (self.r[k], self.v[k], self.a[k]);
        [(bounds.lower, -1.0), (bounds.upper, 1.0)]
            .into_iter()
            .any(|(bound, inward)| {
                bound.is_some_and(|b| {
                    let push = inward * a;
                    wall_gap(x, b, inward, self.radius) <= tolerance
                        && push > 0.0
                        && v.abs() <= push * MIN_TIME
                })
            })
    }

    /// Elastic impulse exchange along the line of centres.
    ///
    /// Both collision counters are incremented.
    pub fn bounce_off(&mut self, other: &mut Particle) {
        let dv = sub(&self.v, &other.v);
        let dp = sub(&self.r, &other.r);
        let sigma = self.radius + other.radius;
        let (m1, m2) = (self.mass, other.mass);
        let j = 2.0 * m1 * m2 * dot(&dv, &dp) / (sigma * sigma * (m1 + m2));
        for k in 0..DIM {
            let jk = j * dp[k];
            self.v[k] -= jk / m1;
            other.v[k] += jk / m2;
        }
        self.bump_collision_count();
        other.bump_collision_count();
    }

    /// Specular reflection off a wall normal to `axis`.
    pub fn bounce_off_wall(&mut self, axis: Axis) {
        let k = axis.index();
        self.v[k] = -self.v[k];
        self.bump_collision_count();
    }
}

/// Earliest time at which a sphere moving along one axis touches either wall.
///
/// For each present bound the gap runs from the wall to the near surface of
/// the sphere (negative while overlapping), and `a/2 t^2 + v t - gap = 0` is
/// solved along the inward normal. A sphere in contact (`gap <= tolerance`,
/// overlap included) fires at `t = 0` when it moves into the wall; otherwise
/// only a later root where it is moving into the wall again counts.
/// Missing bounds are never probed.
pub fn time_to_hit_bound(
    x: f64,
    v: f64,
    a: f64,
    radius: f64,
    bounds: Bounds,
    tolerance: f64,
) -> f64 {
    let mut best = f64::INFINITY;
    for (bound, inward) in [(bounds.lower, -1.0), (bounds.upper, 1.0)] {
        let Some(b) = bound else { continue };
        let gap = wall_gap(x, b, inward, radius);
        if gap <= tolerance && v * inward > 0.0 {
            return 0.0;
        }
        let roots = solver::solve_quadratic(0.5 * a, v, -inward * gap);
        let t = if gap <= tolerance {
            roots.map(|roots| {
                roots
                    .into_iter()
                    .find(|&t| t > MIN_TIME && inward * (v + a * t) > 0.0)
            })
        } else {
            roots.map(|roots| solver::smallest_non_negative(&roots))
        };
        best = best.min(resolve_time(t));
    }
    best
}

/// Distance from the wall at `b` to the near surface of a sphere centred at `x`.
///
/// `inward` is the direction of travel into the wall: `-1` for a lower
/// bound, `1` for an upper one.
#[inline]
fn wall_gap(x: f64, b: f64, inward: f64, radius: f64) -> f64 {
    inward * (b - x) - radius
}

// ============ Utility helpers ============

fn resolve_time(t: Result<Option<f64>>) -> f64 {
    match t {
        Ok(Some(t)) => t,
        Ok(None) => f64::INFINITY,
        Err(e) => {
            log::warn!("collision time treated as no collision: {e}");
            f64::INFINITY
        }
    }
}

#[inline]
pub(crate) fn dot(a: &[f64; DIM], b: &[f64; DIM]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

#[inline]
fn sub(a: &[f64; DIM], b: &[f64; DIM]) -> [f64; DIM] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    const ZERO: [f64; DIM] = [0.0; DIM];

    fn ball(r: [f64; DIM], v: [f64; DIM]) -> Particle {
        Particle::new(r, v, ZERO, 1.0, 5.0).unwrap()
    }

    #[test]
    fn new_particle_ok() -> Result<()> {
        let p = Particle::new([0.0, 1.0, 2.0], [2.0, -3.0, 0.5], [0.0, -9.8, 0.0], 2.0, 0.5)?;
        assert_eq!(p.r, [0.0, 1.0, 2.0]);
        assert_eq!(p.v, [2.0, -3.0, 0.5]);
        assert_eq!(p.a, [0.0, -9.8, 0.0]);
        assert_eq!(p.radius, 0.5);
        assert_eq!(p.mass, 2.0);
        assert_eq!(p.collision_count, 0);
        Ok(())
    }

    #[test]
    fn invalid_radius_rejected() {
        let err = Particle::new(ZERO, ZERO, ZERO, 1.0, 0.0).unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration(_)));
        assert!(err.to_string().contains("radius"));
    }

    #[test]
    fn invalid_mass_rejected() {
        let err = Particle::new(ZERO, ZERO, ZERO, -1.0, 1.0).unwrap_err();
        assert!(err.to_string().contains("mass"));
    }

    #[test]
    fn non_finite_acceleration_rejected() {
        let err = Particle::new(ZERO, ZERO, [f64::NAN, 0.0, 0.0], 1.0, 1.0).unwrap_err();
        assert!(err.to_string().contains("acceleration"));
    }

    #[test]
    fn kinetic_energy_computed() -> Result<()> {
        // Acceleration carries no energy of its own.
        let p = Particle::new(ZERO, [1.0, -2.0, 2.0], [0.0, -9.8, 0.0], 4.0, 1.0)?;
        assert_abs_diff_eq!(p.kinetic_energy(), 18.0, epsilon = 1e-12);
        assert_eq!(p.momentum(), [4.0, -8.0, 8.0]);
        Ok(())
    }

    #[test]
    fn advance_is_additive_in_time() -> Result<()> {
        let mut once =
            Particle::new([1.0, 2.0, 3.0], [4.0, -1.0, 0.5], [0.3, -9.8, 1.0], 1.0, 1.0)?;
        let mut twice = once.clone();
        once.advance(1.75);
        twice.advance(0.5);
        twice.advance(1.25);
        for k in 0..DIM {
            assert_abs_diff_eq!(once.r[k], twice.r[k], epsilon = 1e-9);
            assert_abs_diff_eq!(once.v[k], twice.v[k], epsilon = 1e-9);
        }
        Ok(())
    }

    #[test]
    fn head_on_time_to_hit() {
        let p = ball([0.0, 50.0, 0.0], [10.0, 0.0, 0.0]);
        let q = ball([100.0, 50.0, 0.0], [-10.0, 0.0, 0.0]);
        assert_abs_diff_eq!(p.time_to_hit(&q, DEFAULT_CONTACT_TOLERANCE), 4.5, epsilon = 1e-9);
        assert_abs_diff_eq!(q.time_to_hit(&p, DEFAULT_CONTACT_TOLERANCE), 4.5, epsilon = 1e-9);
    }

    #[test]
    fn receding_pair_never_hits() {
        let p = ball([0.0, 0.0, 0.0], [-1.0, 0.0, 0.0]);
        let q = ball([20.0, 0.0, 0.0], [1.0, 0.0, 0.0]);
        assert!(p.time_to_hit(&q, DEFAULT_CONTACT_TOLERANCE).is_infinite());
    }

    #[test]
    fn touching_pair_at_rest_does_not_retrigger() {
        let p = ball([0.0, 0.0, 0.0], ZERO);
        let q = ball([10.0, 0.0, 0.0], ZERO);
        assert!(p.time_to_hit(&q, DEFAULT_CONTACT_TOLERANCE).is_infinite());
    }

    #[test]
    fn touching_pair_closing_in_hits_now() {
        let p = ball([0.0, 0.0, 0.0], [1.0, 0.0, 0.0]);
        let q = ball([10.0, 0.0, 0.0], ZERO);
        assert_eq!(p.time_to_hit(&q, DEFAULT_CONTACT_TOLERANCE), 0.0);
    }

    #[test]
    fn accelerating_pair_uses_quartic() -> Result<()> {
        // Relative acceleration only: gap 10 between surfaces, closes with a_rel = 5 -> t = 2.
        let p = Particle::new([0.0, 0.0, 0.0], ZERO, [2.5, 0.0, 0.0], 1.0, 5.0)?;
        let q = Particle::new([20.0, 0.0, 0.0], ZERO, [-2.5, 0.0, 0.0], 1.0, 5.0)?;
        assert_abs_diff_eq!(p.time_to_hit(&q, DEFAULT_CONTACT_TOLERANCE), 2.0, epsilon = 1e-7);
        Ok(())
    }

    #[test]
    fn separating_pair_returns_under_acceleration() -> Result<()> {
        // Touching, separating at relative speed 2, pulled back at relative 2 -> returns at t = 2.
        let p = Particle::new([0.0, 0.0, 0.0], [-1.0, 0.0, 0.0], [1.0, 0.0, 0.0], 1.0, 5.0)?;
        let q = Particle::new([10.0, 0.0, 0.0], [1.0, 0.0, 0.0], [-1.0, 0.0, 0.0], 1.0, 5.0)?;
        assert_abs_diff_eq!(p.time_to_hit(&q, DEFAULT_CONTACT_TOLERANCE), 2.0, epsilon = 1e-7);
        Ok(())
    }

    #[test]
    fn wall_prediction_basic() {
        // Contact when x reaches radius = 5, starting at 20 moving -5: dt = 3
        let p = ball([20.0, 50.0, 0.0], [-5.0, 0.0, 0.0]);
        let t = p.time_to_hit_wall(Axis::X, Bounds::new(0.0, 200.0), DEFAULT_CONTACT_TOLERANCE);
        assert_abs_diff_eq!(t, 3.0, epsilon = 1e-12);
    }

    #[test]
    fn wall_prediction_upper_bound() {
        let p = ball([20.0, 50.0, 0.0], [0.0, 9.0, 0.0]);
        let t = p.time_to_hit_wall(Axis::Y, Bounds::new(0.0, 100.0), DEFAULT_CONTACT_TOLERANCE);
        assert_abs_diff_eq!(t, 5.0, epsilon = 1e-12);
    }

    #[test]
    fn wall_prediction_under_gravity() {
        // Falls from y = 25 (surface 20 above floor) with g = 10: t = 2
        let mut p = ball([0.0, 25.0, 0.0], ZERO);
        p.a = [0.0, -10.0, 0.0];
        let t = p.time_to_hit_wall(Axis::Y, Bounds::new(0.0, 1.0e6), DEFAULT_CONTACT_TOLERANCE);
        assert_abs_diff_eq!(t, 2.0, epsilon = 1e-9);
    }

    #[test]
    fn unbounded_axis_is_never_hit() {
        let p = ball([0.0, 0.0, 0.0], [0.0, 0.0, -100.0]);
        let t = p.time_to_hit_wall(Axis::Z, Bounds::unbounded(), DEFAULT_CONTACT_TOLERANCE);
        assert!(t.is_infinite());
    }

    #[test]
    fn touching_wall_moving_in_hits_now() {
        let p = ball([5.0, 50.0, 0.0], [-10.0, 0.0, 0.0]);
        let t = p.time_to_hit_wall(Axis::X, Bounds::new(0.0, 200.0), DEFAULT_CONTACT_TOLERANCE);
        assert_eq!(t, 0.0);
    }

    #[test]
    fn touching_wall_moving_away_does_not_retrigger() {
        let mut p = ball([5.0, 50.0, 0.0], [-10.0, 0.0, 0.0]);
        p.bounce_off_wall(Axis::X);
        let t = p.time_to_hit_wall(
            Axis::X,
            Bounds {
                lower: Some(0.0),
                upper: None,
            },
            DEFAULT_CONTACT_TOLERANCE,
        );
        assert!(t.is_infinite());
    }

    #[test]
    fn overlapping_wall_is_contact() {
        // Surface 3 units past the wall.
        let walls = Bounds::new(0.0, 200.0);
        let inbound = ball([2.0, 50.0, 0.0], [-10.0, 0.0, 0.0]);
        assert_eq!(inbound.time_to_hit_wall(Axis::X, walls, DEFAULT_CONTACT_TOLERANCE), 0.0);
        let outbound = ball([2.0, 50.0, 0.0], [10.0, 0.0, 0.0]);
        let t = outbound.time_to_hit_wall(Axis::X, walls, DEFAULT_CONTACT_TOLERANCE);
        assert_abs_diff_eq!(t, 19.3, epsilon = 1e-9);
    }

    #[test]
    fn overlapping_wall_pulled_back_hits_on_return() -> Result<()> {
        // Surface starts 3 below the floor, rises at 10 under g = 10: -3 + 10t - 5t^2 = 0.
        let p = Particle::new([0.0, 2.0, 0.0], [0.0, 10.0, 0.0], [0.0, -10.0, 0.0], 1.0, 5.0)?;
        let t = p.time_to_hit_wall(Axis::Y, Bounds::new(0.0, 1.0e6), DEFAULT_CONTACT_TOLERANCE);
        assert_abs_diff_eq!(t, 1.0 + 0.4_f64.sqrt(), epsilon = 1e-9);
        Ok(())
    }

    #[test]
    fn resting_on_wall_detected() -> Result<()> {
        let floor = Bounds::new(0.0, 100.0);
        let resting = Particle::new([0.0, 5.0, 0.0], ZERO, [0.0, -10.0, 0.0], 1.0, 5.0)?;
        assert!(resting.rests_on_wall(Axis::Y, floor, DEFAULT_CONTACT_TOLERANCE));
        assert!(resting.time_to_hit_wall(Axis::Y, floor, DEFAULT_CONTACT_TOLERANCE).is_infinite());

        let mut hovering = resting.clone();
        hovering.r[1] = 6.0;
        assert!(!hovering.rests_on_wall(Axis::Y, floor, DEFAULT_CONTACT_TOLERANCE));
        let mut launched = resting.clone();
        launched.v[1] = 4.0;
        assert!(!launched.rests_on_wall(Axis::Y, floor, DEFAULT_CONTACT_TOLERANCE));
        let mut ceiling_pull = resting;
        ceiling_pull.a[1] = 10.0;
        assert!(!ceiling_pull.rests_on_wall(Axis::Y, floor, DEFAULT_CONTACT_TOLERANCE));
        Ok(())
    }

    #[test]
    fn bouncing_under_gravity_returns_to_floor() {
        // Leaves the floor at 10 upwards with g = 10: back after 2 s.
        let mut p = ball([0.0, 5.0, 0.0], [0.0, 10.0, 0.0]);
        p.a = [0.0, -10.0, 0.0];
        let t = p.time_to_hit_wall(Axis::Y, Bounds::new(0.0, 1.0e6), DEFAULT_CONTACT_TOLERANCE);
        assert_abs_diff_eq!(t, 2.0, epsilon = 1e-9);
    }

    #[test]
    fn equal_mass_head_on_exchanges_velocities() {
        let mut p = ball([45.0, 50.0, 0.0], [10.0, 0.0, 0.0]);
        let mut q = ball([55.0, 50.0, 0.0], [-10.0, 0.0, 0.0]);
        p.bounce_off(&mut q);
        assert_abs_diff_eq!(p.v[0], -10.0, epsilon = 1e-12);
        assert_abs_diff_eq!(q.v[0], 10.0, epsilon = 1e-12);
        assert_eq!(p.collision_count, 1);
        assert_eq!(q.collision_count, 1);
    }

    #[test]
    fn oblique_bounce_conserves_energy_and_momentum() -> Result<()> {
        let mut p = Particle::new([0.0, 0.0, 0.0], [3.0, 1.0, -0.5], ZERO, 2.0, 1.0)?;
        // Contact at 60 degrees off the x axis.
        let contact = [1.5, 3.0_f64.sqrt() * 1.5, 0.0];
        let mut q = Particle::new(contact, [-1.0, 0.0, 0.2], ZERO, 0.5, 2.0)?;
        let e0 = p.kinetic_energy() + q.kinetic_energy();
        let m0: Vec<f64> = (0..DIM).map(|k| p.momentum()[k] + q.momentum()[k]).collect();
        p.bounce_off(&mut q);
        let e1 = p.kinetic_energy() + q.kinetic_energy();
        assert_abs_diff_eq!(e0, e1, epsilon = 1e-9);
        for k in 0..DIM {
            assert_abs_diff_eq!(m0[k], p.momentum()[k] + q.momentum()[k], epsilon = 1e-9);
        }
        Ok(())
    }

    #[test]
    fn wall_bounce_flips_one_component() {
        let mut p = ball([10.0, 10.0, 10.0], [1.0, -2.0, 3.0]);
        p.bounce_off_wall(Axis::Y);
        assert_eq!(p.v, [1.0, 2.0, 3.0]);
        assert_eq!(p.collision_count, 1);
    }
}
