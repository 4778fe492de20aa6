//! Edges of the path graph, and the corridors around them.

use std::collections::BTreeSet;

use super::segment::SegIdx;
use crate::{geom::Direction, visibility::EdgeIdx};

/// A horizontal or vertical piece of the union of all paths.
///
/// Axis edges always point north or east. While nudging in some direction,
/// the edges parallel to it carry the bounds of the free corridor they can
/// slide in, as coordinates along the sweep frame's `x` axis.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct AxisEdge {
    pub direction: Direction,
    pub left_bound: f64,
    pub right_bound: f64,
    /// Edges that have to stay to the right of this one.
    pub right_neighbors: BTreeSet<EdgeIdx>,
    /// The longest segments passing along this edge.
    pub segments: BTreeSet<SegIdx>,
}

impl AxisEdge {
    pub fn new(direction: Direction) -> Self {
        debug_assert!(direction.is_canonical());
        AxisEdge {
            direction,
            left_bound: f64::NEG_INFINITY,
            right_bound: f64::INFINITY,
            right_neighbors: BTreeSet::new(),
            segments: BTreeSet::new(),
        }
    }

    /// Raises the left bound. The bounds never cross: a bound past the right
    /// one pins the corridor at the right bound.
    pub fn bound_from_left(&mut self, bound: f64) {
        let bound = bound.min(self.right_bound);
        self.left_bound = self.left_bound.max(bound);
    }

    pub fn bound_from_right(&mut self, bound: f64) {
        let bound = bound.max(self.left_bound);
        self.right_bound = self.right_bound.min(bound);
    }

    pub fn add_right_neighbor(&mut self, e: EdgeIdx) {
        self.right_neighbors.insert(e);
    }
}
