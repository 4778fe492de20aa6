//! Longest nudged segments: maximal runs of path edges that move together.

use super::combinatorial::{PathEdgeIdx, PathGraph};
use crate::{geom::Point, sweep::SweepFrame};

#[derive(Clone, Copy, PartialOrd, Ord, PartialEq, Eq, Hash)]
pub(crate) struct SegIdx(pub usize);

impl std::fmt::Debug for SegIdx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "seg_{}", self.0)
    }
}

/// A straight, maximal run of consecutive path edges of one path, parallel to
/// the nudging direction. All of its edges get shifted by the same amount.
#[derive(Clone, Debug, Default)]
pub(crate) struct LongestSegment {
    pub edges: Vec<PathEdgeIdx>,
    /// Where the segment would like to be, along the frame's `x` axis.
    pub ideal: f64,
    /// The solver variable, once there is one.
    pub var: Option<usize>,
}

impl LongestSegment {
    pub fn start(&self, graph: &PathGraph) -> Option<Point> {
        self.edges.first().map(|&e| graph.source_point(e))
    }

    /// The current position of the segment, along the frame's `x` axis.
    pub fn position(&self, graph: &PathGraph, frame: &SweepFrame) -> f64 {
        self.start(graph).map_or(0.0, |p| frame.x(p))
    }

    pub fn left_bound(&self, graph: &PathGraph) -> f64 {
        self.edges
            .iter()
            .map(|&e| graph.axis_edge(e).left_bound)
            .fold(f64::NEG_INFINITY, f64::max)
    }

    pub fn right_bound(&self, graph: &PathGraph) -> f64 {
        self.edges
            .iter()
            .map(|&e| graph.axis_edge(e).right_bound)
            .fold(f64::INFINITY, f64::min)
    }

    pub fn width(&self, graph: &PathGraph) -> f64 {
        self.edges
            .iter()
            .map(|&e| graph.edge(e).width)
            .fold(0.0, f64::max)
    }
}
