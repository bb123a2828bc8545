//! Closed-form real-root extraction for polynomials of degree 1 to 4.
//!
//! Coefficients are given highest degree first. Every solver returns the real
//! roots in ascending order; complex roots are omitted. A polynomial without
//! real roots yields `Ok(vec![])`, while non-finite coefficients or a
//! non-finite intermediate yield [`Error::NumericDegeneracy`], so the two
//! outcomes stay distinguishable.

use crate::error::{Error, Result};
use std::f64::consts::PI;

/// A leading coefficient this small relative to the others counts as zero.
const LEADING_EPS: f64 = 1e-14;

/// Negative radicands within this relative distance of zero are rounding noise.
const RADICAND_EPS: f64 = 1e-12;

/// Newton iterations applied to cubic and quartic roots.
const POLISH_STEPS: usize = 2;

/// Solve `a1*x + a0 = 0`.
///
/// A zero slope has no isolated root and returns an empty set.
pub fn solve_linear(a1: f64, a0: f64) -> Result<Vec<f64>> {
    ensure_finite(&[a1, a0])?;
    if a1 == 0.0 {
        return Ok(Vec::new());
    }
    finish(vec![-a0 / a1])
}

/// Solve `a2*x^2 + a1*x + a0 = 0`. Both roots are returned, possibly equal.
pub fn solve_quadratic(a2: f64, a1: f64, a0: f64) -> Result<Vec<f64>> {
    ensure_finite(&[a2, a1, a0])?;
    if negligible(a2, &[a1, a0]) {
        return solve_linear(a1, a0);
    }
    let b = a1 / a2;
    let c = a0 / a2;

    let disc = b * b - 4.0 * c;
    let Some(s) = guarded_sqrt(disc, b * b + 4.0 * c.abs()) else {
        return Ok(Vec::new());
    };

    // q carries the sign of b so that neither root suffers cancellation.
    let q = -0.5 * (b + b.signum() * s);
    if q == 0.0 {
        return finish(vec![0.0, 0.0]);
    }
    finish(vec![q, c / q])
}

/// Solve `a3*x^3 + a2*x^2 + a1*x + a0 = 0`, returning every real root.
///
/// One real root is found with Cardano's formula when the discriminant is
/// positive, three with the trigonometric form otherwise.
pub fn solve_cubic(a3: f64, a2: f64, a1: f64, a0: f64) -> Result<Vec<f64>> {
    ensure_finite(&[a3, a2, a1, a0])?;
    if negligible(a3, &[a2, a1, a0]) {
        return solve_quadratic(a2, a1, a0);
    }
    let a = a2 / a3;
    let b = a1 / a3;
    let c = a0 / a3;

    // Depressed cubic t^3 + 3Q t - 2R = 0 with x = t - a/3.
    let q = (3.0 * b - a * a) / 9.0;
    let r = (9.0 * a * b - 27.0 * c - 2.0 * a * a * a) / 54.0;
    let d = q * q * q + r * r;
    let shift = -a / 3.0;

    let mut roots = if d > 0.0 {
        let sd = d.sqrt();
        vec![(r + sd).cbrt() + (r - sd).cbrt() + shift]
    } else if q == 0.0 {
        // d <= 0 with q == 0 forces r == 0: triple root.
        vec![shift; 3]
    } else {
        // d <= 0 implies q < 0, so -q^3 > 0.
        let Some(m) = guarded_sqrt(-q, q.abs()) else {
            return Ok(Vec::new());
        };
        let cos_arg = (r / (m * m * m)).clamp(-1.0, 1.0);
        let theta = cos_arg.acos();
        (0..3)
            .map(|k| 2.0 * m * ((theta + 2.0 * PI * k as f64) / 3.0).cos() + shift)
            .collect()
    };

    let monic = [1.0, a, b, c];
    for x in &mut roots {
        *x = polish(&monic, *x);
    }
    finish(roots)
}

/// Solve `a4*x^4 + a3*x^3 + a2*x^2 + a1*x + a0 = 0` with Ferrari's method.
///
/// The largest real root of the resolvent cubic is used, which keeps the
/// first radicand non-negative whenever the quartic has real roots. Each of
/// the two inner branches contributes a root pair only when its own radicand
/// is non-negative.
pub fn solve_quartic(a4: f64, a3: f64, a2: f64, a1: f64, a0: f64) -> Result<Vec<f64>> {
    ensure_finite(&[a4, a3, a2, a1, a0])?;
    if negligible(a4, &[a3, a2, a1, a0]) {
        return solve_cubic(a3, a2, a1, a0);
    }
    let a = a3 / a4;
    let b = a2 / a4;
    let c = a1 / a4;
    let d = a0 / a4;

    let resolvent = solve_cubic(1.0, -b, a * c - 4.0 * d, 4.0 * b * d - c * c - a * a * d)?;
    let Some(y) = resolvent.iter().copied().reduce(f64::max) else {
        return Ok(Vec::new());
    };

    let r_sq = 0.25 * a * a - b + y;
    let r_scale = 0.25 * a * a + b.abs() + y.abs();
    let Some(r) = guarded_sqrt(r_sq, r_scale) else {
        return Ok(Vec::new());
    };

    let (d_sq, e_sq, scale) = if r * r <= RADICAND_EPS * r_scale.max(1.0) {
        let y_sq = y * y - 4.0 * d;
        let Some(s) = guarded_sqrt(y_sq, y * y + 4.0 * d.abs()) else {
            return Ok(Vec::new());
        };
        let base = 0.75 * a * a - 2.0 * b;
        (base + 2.0 * s, base - 2.0 * s, base.abs() + 2.0 * s)
    } else {
        let base = 0.75 * a * a - r * r - 2.0 * b;
        let corr = 0.25 * (4.0 * a * b - 8.0 * c - a * a * a) / r;
        (base + corr, base - corr, base.abs() + corr.abs())
    };

    let mut roots = Vec::with_capacity(4);
    if let Some(dd) = guarded_sqrt(d_sq, scale) {
        roots.push(-0.25 * a + 0.5 * r + 0.5 * dd);
        roots.push(-0.25 * a + 0.5 * r - 0.5 * dd);
    }
    if let Some(ee) = guarded_sqrt(e_sq, scale) {
        roots.push(-0.25 * a - 0.5 * r + 0.5 * ee);
        roots.push(-0.25 * a - 0.5 * r - 0.5 * ee);
    }

    let monic = [1.0, a, b, c, d];
    for x in &mut roots {
        *x = polish(&monic, *x);
    }
    finish(roots)
}

/// Smallest root that is a valid future time (finite and `>= 0`).
pub fn smallest_non_negative(roots: &[f64]) -> Option<f64> {
    roots
        .iter()
        .copied()
        .filter(|t| t.is_finite() && *t >= 0.0)
        .reduce(f64::min)
}

/// Smallest root strictly after `after`.
pub fn smallest_after(roots: &[f64], after: f64) -> Option<f64> {
    roots
        .iter()
        .copied()
        .filter(|t| t.is_finite() && *t > after)
        .reduce(f64::min)
}

// ============ Internal helpers ============

fn ensure_finite(coeffs: &[f64]) -> Result<()> {
    if coeffs.iter().all(|c| c.is_finite()) {
        Ok(())
    } else {
        Err(Error::NumericDegeneracy(format!(
            "non-finite polynomial coefficients {coeffs:?}"
        )))
    }
}

#[inline]
fn negligible(lead: f64, rest: &[f64]) -> bool {
    let scale = rest.iter().fold(0.0_f64, |m, c| m.max(c.abs()));
    lead == 0.0 || lead.abs() <= LEADING_EPS * scale
}

/// Square root of a radicand, or `None` when it is genuinely negative.
#[inline]
fn guarded_sqrt(x: f64, scale: f64) -> Option<f64> {
    if x >= 0.0 {
        Some(x.sqrt())
    } else if x >= -RADICAND_EPS * scale.max(1.0) {
        Some(0.0)
    } else {
        None
    }
}

/// Horner evaluation of a polynomial and its derivative.
fn eval(coeffs: &[f64], x: f64) -> (f64, f64) {
    let mut p = 0.0;
    let mut dp = 0.0;
    for &c in coeffs {
        dp = dp * x + p;
        p = p * x + c;
    }
    (p, dp)
}

fn polish(coeffs: &[f64], mut x: f64) -> f64 {
    for _ in 0..POLISH_STEPS {
        let (p, dp) = eval(coeffs, x);
        if p == 0.0 || dp == 0.0 || !dp.is_finite() {
            break;
        }
        let next = x - p / dp;
        if !next.is_finite() || eval(coeffs, next).0.abs() >= p.abs() {
            break;
        }
        x = next;
    }
    x
}

fn finish(mut roots: Vec<f64>) -> Result<Vec<f64>> {
    if let Some(bad) = roots.iter().find(|r| !r.is_finite()) {
        return Err(Error::NumericDegeneracy(format!(
            "root computation produced {bad}"
        )));
    }
    roots.sort_by(f64::total_cmp);
    Ok(roots)
}
