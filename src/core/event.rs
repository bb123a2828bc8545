use crate::core::domain::Axis;
use crate::core::Particle;
use crate::error::{Error, Result};
use ordered_float::NotNan;
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

/// Index of a particle in the simulation's particle arena.
pub type ParticleId = usize;

/// Kinds of events that can occur in the engine, with the collision-count
/// snapshots of every participant.
///
/// Tie-breaking for deterministic ordering prefers `Pair` < `Wall` when times are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// Particle-to-particle collision between particles `i` and `j`.
    Pair {
        i: ParticleId,
        j: ParticleId,
        cc_i: u64,
        cc_j: u64,
    },
    /// Particle-to-wall collision of particle `i` with a wall normal to `axis`.
    Wall { i: ParticleId, axis: Axis, cc_i: u64 },
}

impl EventKind {
    /// Pair event stamped with the current collision counts of `i` and `j`.
    pub fn pair(i: ParticleId, pi: &Particle, j: ParticleId, pj: &Particle) -> Self {
        EventKind::Pair {
            i,
            j,
            cc_i: pi.collision_count,
            cc_j: pj.collision_count,
        }
    }

    /// Wall event stamped with the current collision count of `i`.
    pub fn wall(i: ParticleId, pi: &Particle, axis: Axis) -> Self {
        EventKind::Wall {
            i,
            axis,
            cc_i: pi.collision_count,
        }
    }

    /// Primary participant.
    #[inline]
    pub fn primary(&self) -> ParticleId {
        match *self {
            EventKind::Pair { i, .. } | EventKind::Wall { i, .. } => i,
        }
    }

    /// Secondary participant, absent for wall events.
    #[inline]
    pub fn secondary(&self) -> Option<ParticleId> {
        match *self {
            EventKind::Pair { j, .. } => Some(j),
            EventKind::Wall { .. } => None,
        }
    }

    #[inline]
    fn order_key(&self) -> (u8, usize, usize, u64, u64) {
        match *self {
            EventKind::Pair { i, j, cc_i, cc_j } => (0, i, j, cc_i, cc_j),
            EventKind::Wall { i, axis, cc_i } => (1, i, axis.index(), cc_i, 0),
        }
    }
}

/// A scheduled event in the priority queue with deterministic ordering.
///
/// - `time`: absolute event time (finite, non-NaN).
/// - `kind`: event kind, participants and their collision-count snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    pub time: NotNan<f64>,
    pub kind: EventKind,
}

impl Event {
    /// Create a new event, validating that time is finite and non-NaN.
    pub fn new(time: f64, kind: EventKind) -> Result<Self> {
        if !time.is_finite() {
            return Err(Error::InvalidParam(format!(
                "event time must be finite, got {time}"
            )));
        }
        let time = NotNan::new(time)
            .map_err(|_| Error::InvalidParam("event time cannot be NaN".into()))?;
        Ok(Self { time, kind })
    }

    /// Returns the raw f64 event time.
    #[inline]
    pub fn time_f64(&self) -> f64 {
        self.time.into_inner()
    }

    /// An event is valid iff every participant's current collision count still
    /// equals the snapshot taken when it was predicted. Unknown participants
    /// invalidate the event.
    pub fn is_valid(&self, particles: &[Particle]) -> bool {
        let current = |id: ParticleId| particles.get(id).map(|p| p.collision_count);
        match self.kind {
            EventKind::Pair { i, j, cc_i, cc_j } => {
                current(i) == Some(cc_i) && current(j) == Some(cc_j)
            }
            EventKind::Wall { i, cc_i, .. } => current(i) == Some(cc_i),
        }
    }
}

impl Ord for Event {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.time.cmp(&other.time) {
            Ordering::Equal => self.kind.order_key().cmp(&other.kind.order_key()),
            o => o,
        }
    }
}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Min-priority queue of predicted events.
///
/// Stale entries are never removed eagerly; they are filtered with
/// [`Event::is_valid`] when extracted.
#[derive(Debug, Default)]
pub struct EventQueue {
    heap: BinaryHeap<Reverse<Event>>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// O(log n) insertion.
    #[inline]
    pub fn insert(&mut self, event: Event) {
        self.heap.push(Reverse(event));
    }

    /// Remove and return the earliest event, O(log n).
    #[inline]
    pub fn extract_min(&mut self) -> Option<Event> {
        self.heap.pop().map(|Reverse(e)| e)
    }

    /// Earliest event without removing it.
    #[inline]
    pub fn peek(&self) -> Option<&Event> {
        self.heap.peek().map(|Reverse(e)| e)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn clear(&mut self) {
        self.heap.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn particle() -> Particle {
        Particle::new([0.0; 3], [0.0; 3], [0.0; 3], 1.0, 1.0).unwrap()
    }

    fn pair(i: ParticleId, j: ParticleId, cc_i: u64, cc_j: u64) -> EventKind {
        EventKind::Pair { i, j, cc_i, cc_j }
    }

    fn wall(i: ParticleId, axis: Axis, cc_i: u64) -> EventKind {
        EventKind::Wall { i, axis, cc_i }
    }

    #[test]
    fn new_event_rejects_nan_time() {
        let err = Event::new(f64::NAN, pair(1, 2, 0, 0)).unwrap_err();
        assert!(err.to_string().contains("finite"));
    }

    #[test]
    fn new_event_rejects_infinite_time() {
        assert!(Event::new(f64::INFINITY, wall(0, Axis::X, 0)).is_err());
    }

    #[test]
    fn ordering_by_time() -> Result<()> {
        let e1 = Event::new(1.0, pair(0, 1, 0, 0))?;
        let e2 = Event::new(2.0, wall(0, Axis::X, 0))?;
        assert!(e1 < e2);
        Ok(())
    }

    #[test]
    fn tie_breaker_prefers_pair_over_wall() -> Result<()> {
        let t = 5.0;
        let a = Event::new(t, pair(0, 1, 3, 4))?;
        let b = Event::new(t, wall(0, Axis::Y, 3))?;
        assert!(a < b);
        Ok(())
    }

    #[test]
    fn is_valid_checks_collision_counts() -> Result<()> {
        let mut particles = vec![particle(), particle(), particle()];
        let e_pp = Event::new(1.0, EventKind::pair(1, &particles[1], 2, &particles[2]))?;
        let e_pw = Event::new(1.0, EventKind::wall(0, &particles[0], Axis::Z))?;
        assert!(e_pp.is_valid(&particles));
        assert!(e_pw.is_valid(&particles));

        particles[2].bump_collision_count();
        assert!(!e_pp.is_valid(&particles));
        // A collision of an unrelated particle leaves the wall event intact.
        assert!(e_pw.is_valid(&particles));

        particles[0].bump_collision_count();
        assert!(!e_pw.is_valid(&particles));
        Ok(())
    }

    #[test]
    fn unknown_participant_is_invalid() -> Result<()> {
        let particles = vec![particle()];
        let e = Event::new(1.0, pair(0, 7, 0, 0))?;
        assert!(!e.is_valid(&particles));
        Ok(())
    }

    #[test]
    fn queue_extracts_in_time_order() -> Result<()> {
        let mut q = EventQueue::new();
        for t in [3.0, 0.5, 2.0, 0.5, 9.0] {
            q.insert(Event::new(t, wall(0, Axis::X, 0))?);
        }
        assert_eq!(q.len(), 5);
        assert_eq!(q.peek().map(Event::time_f64), Some(0.5));
        let mut times = Vec::new();
        while let Some(e) = q.extract_min() {
            times.push(e.time_f64());
        }
        assert_eq!(times, vec![0.5, 0.5, 2.0, 3.0, 9.0]);
        assert!(q.is_empty());
        Ok(())
    }

    #[test]
    fn participants() {
        let k = pair(3, 4, 0, 0);
        assert_eq!(k.primary(), 3);
        assert_eq!(k.secondary(), Some(4));
        let w = wall(2, Axis::Z, 1);
        assert_eq!(w.primary(), 2);
        assert_eq!(w.secondary(), None);
    }
}
