//! The parts shared by all our sweeps: a frame telling us which way is "up",
//! the current sweep coordinate, and the event queue.

use std::{cmp::Reverse, collections::BinaryHeap};

use ordered_float::OrderedFloat;

use crate::{
    geom::{Direction, Point},
    num::TOLERANCE,
};

/// The sweep direction, and the direction perpendicular to it.
///
/// Imagine that `direction` points up. Then `perp` points to the right, and
/// "left of" and "right of" mean what you'd expect.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SweepFrame {
    pub direction: Point,
    pub perp: Point,
}

impl SweepFrame {
    pub fn new(direction: Point) -> Self {
        SweepFrame {
            direction,
            perp: direction.rotate(-std::f64::consts::FRAC_PI_2),
        }
    }

    /// An axis-aligned frame, with an exact perpendicular.
    pub fn axis(direction: Direction) -> Self {
        SweepFrame {
            direction: direction.to_point(),
            perp: direction.right().to_point(),
        }
    }

    pub fn z(&self, p: Point) -> f64 {
        self.direction.dot(p)
    }

    pub fn x(&self, p: Point) -> f64 {
        self.perp.dot(p)
    }

    pub fn is_not_horizontal(&self, a: Point, b: Point) -> bool {
        (a - b).dot(self.direction).abs() > crate::num::DISTANCE_EPSILON
    }

    /// Lower points come first; at the same height, points to the left come first.
    pub fn cmp_points(&self, a: Point, b: Point) -> std::cmp::Ordering {
        OrderedFloat(self.z(a))
            .cmp(&OrderedFloat(self.z(b)))
            .then(OrderedFloat(self.x(a)).cmp(&OrderedFloat(self.x(b))))
    }
}

/// Where the sweep line is, and where it was before its last real move.
#[derive(Clone, Copy, Debug)]
pub struct SweepPosition {
    pub z: f64,
    pub previous_z: f64,
}

impl Default for SweepPosition {
    fn default() -> Self {
        SweepPosition {
            z: f64::NEG_INFINITY,
            previous_z: f64::NEG_INFINITY,
        }
    }
}

impl SweepPosition {
    pub fn set(&mut self, z: f64) {
        if z > self.z + TOLERANCE {
            self.previous_z = self.z;
        }
        self.z = z;
    }
}

/// An event at `site`. Events are ordered by sweep coordinate, then by
/// perpendicular coordinate, then by kind.
#[derive(Clone, Copy, Debug)]
pub struct SweepEvent<K> {
    z: OrderedFloat<f64>,
    x: OrderedFloat<f64>,
    pub site: Point,
    pub kind: K,
}

impl<K: Ord> SweepEvent<K> {
    pub fn new(frame: &SweepFrame, site: Point, kind: K) -> Self {
        SweepEvent {
            z: OrderedFloat(frame.z(site)),
            x: OrderedFloat(frame.x(site)),
            site,
            kind,
        }
    }

    pub fn z(&self) -> f64 {
        self.z.0
    }

    fn key(&self) -> (OrderedFloat<f64>, OrderedFloat<f64>, &K) {
        (self.z, self.x, &self.kind)
    }
}

impl<K: Ord> PartialEq for SweepEvent<K> {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl<K: Ord> Eq for SweepEvent<K> {}

impl<K: Ord> PartialOrd for SweepEvent<K> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<K: Ord> Ord for SweepEvent<K> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.key().cmp(&other.key())
    }
}

#[derive(Clone, Debug)]
pub struct EventQueue<K: Ord> {
    inner: BinaryHeap<Reverse<SweepEvent<K>>>,
}

impl<K: Ord> Default for EventQueue<K> {
    fn default() -> Self {
        Self {
            inner: BinaryHeap::new(),
        }
    }
}

impl<K: Ord> EventQueue<K> {
    pub fn push(&mut self, ev: SweepEvent<K>) {
        self.inner.push(Reverse(ev));
    }

    pub fn pop(&mut self) -> Option<SweepEvent<K>> {
        self.inner.pop().map(|x| x.0)
    }

    #[cfg(test)]
    pub fn next_z(&self) -> Option<f64> {
        self.inner.peek().map(|Reverse(x)| x.z())
    }
}
