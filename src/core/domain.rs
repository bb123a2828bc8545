use crate::error::{Error, Result};

/// Coordinate axis of the simulation domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    /// All three axes in index order.
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    /// Component index into position/velocity arrays.
    #[inline]
    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }
}

/// Lower and upper wall on one axis. `None` means unbounded on that side.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Bounds {
    pub lower: Option<f64>,
    pub upper: Option<f64>,
}

impl Bounds {
    /// Walls on both sides.
    pub fn new(lower: f64, upper: f64) -> Self {
        Self {
            lower: Some(lower),
            upper: Some(upper),
        }
    }

    /// No walls on this axis.
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// True if neither side has a wall.
    pub fn is_unbounded(&self) -> bool {
        self.lower.is_none() && self.upper.is_none()
    }

    /// Whether coordinate `x` lies between the walls present on this axis.
    pub fn contains(&self, x: f64) -> bool {
        self.lower.is_none_or(|lo| x >= lo) && self.upper.is_none_or(|hi| x <= hi)
    }

    fn validate(&self, axis: Axis) -> Result<()> {
        for b in [self.lower, self.upper].into_iter().flatten() {
            if !b.is_finite() {
                return Err(Error::InvalidConfiguration(format!(
                    "{axis:?} bound must be finite or absent"
                )));
            }
        }
        if let (Some(lo), Some(hi)) = (self.lower, self.upper) {
            if lo >= hi {
                return Err(Error::InvalidConfiguration(format!(
                    "{axis:?} lower bound {lo} must be below upper bound {hi}"
                )));
            }
        }
        Ok(())
    }
}

/// Axis-aligned simulation domain. Fixed for the lifetime of a simulation.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Domain {
    pub x: Bounds,
    pub y: Bounds,
    pub z: Bounds,
}

impl Domain {
    /// Build a domain after checking every bounded axis has `lower < upper`.
    pub fn new(x: Bounds, y: Bounds, z: Bounds) -> Result<Self> {
        let domain = Self { x, y, z };
        for axis in Axis::ALL {
            domain.bounds(axis).validate(axis)?;
        }
        Ok(domain)
    }

    /// Planar box `[0, width] x [0, height]` with an unbounded z axis.
    pub fn planar(width: f64, height: f64) -> Result<Self> {
        Self::new(
            Bounds::new(0.0, width),
            Bounds::new(0.0, height),
            Bounds::unbounded(),
        )
    }

    /// Walls of the given axis.
    #[inline]
    pub fn bounds(&self, axis: Axis) -> Bounds {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
        }
    }

    /// Whether a centre position lies inside every bounded axis.
    pub fn contains(&self, r: &[f64; 3]) -> bool {
        Axis::ALL
            .iter()
            .all(|&axis| self.bounds(axis).contains(r[axis.index()]))
    }
}
