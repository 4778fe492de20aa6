//! Obstacle boundaries as seen by a sweep line.
//!
//! Every obstacle has a left silhouette and a right silhouette. A left side
//! runs from a vertex to its clockwise successor, a right side from a vertex
//! to its clockwise predecessor; both point "up" while they're active.

use std::cmp::Ordering;

use log::warn;

use crate::{
    geom::{orientation, right_of_line_or_on, Point, TriangleOrientation},
    obstacle::{Obstacles, VertIdx},
    order::{ActiveOrder, SweepOrdering},
    sweep::SweepFrame,
};

#[derive(Clone, Copy, Debug)]
pub struct ObstacleSide {
    pub start: Point,
    pub end: Point,
    pub start_vertex: VertIdx,
    pub end_vertex: VertIdx,
}

impl PartialEq for ObstacleSide {
    fn eq(&self, other: &Self) -> bool {
        self.start_vertex == other.start_vertex && self.end_vertex == other.end_vertex
    }
}

impl ObstacleSide {
    pub fn left(obstacles: &Obstacles, v: VertIdx) -> Self {
        let end_vertex = obstacles.next(v);
        ObstacleSide {
            start: obstacles.point(v),
            end: obstacles.point(end_vertex),
            start_vertex: v,
            end_vertex,
        }
    }

    pub fn right(obstacles: &Obstacles, v: VertIdx) -> Self {
        let end_vertex = obstacles.prev(v);
        ObstacleSide {
            start: obstacles.point(v),
            end: obstacles.point(end_vertex),
            start_vertex: v,
            end_vertex,
        }
    }

    /// Where this side crosses the horizontal line at height `z`.
    pub fn at_z(&self, frame: &SweepFrame, z: f64) -> Point {
        let d = self.end - self.start;
        let den = d.dot(frame.direction);
        if den.abs() < crate::num::TOLERANCE {
            return self.start;
        }
        let t = (z - frame.z(self.start)) / den;
        self.start + d * t
    }
}

/// Orders obstacle sides by where they cross the sweep line at `z`.
#[derive(Clone, Copy, Debug)]
pub struct ObstacleSideOrder {
    pub frame: SweepFrame,
    pub z: f64,
}

impl SweepOrdering<ObstacleSide> for ObstacleSideOrder {
    fn cmp(&self, item: &ObstacleSide, other: &ObstacleSide) -> Ordering {
        let x = item.at_z(&self.frame, self.z);
        match orientation(other.start, other.end, x) {
            TriangleOrientation::Collinear => Ordering::Equal,
            TriangleOrientation::Clockwise => Ordering::Greater,
            TriangleOrientation::Counterclockwise => Ordering::Less,
        }
    }
}

/// The left and right obstacle sides crossing the sweep line.
#[derive(Clone, Debug, Default)]
pub struct ObstacleSides {
    pub left: ActiveOrder<ObstacleSide>,
    pub right: ActiveOrder<ObstacleSide>,
    /// How many removals needed the rewound retry or a scan.
    pub repaired: usize,
}

impl ObstacleSides {
    pub fn insert_left(&mut self, frame: &SweepFrame, z: f64, side: ObstacleSide) {
        self.left.insert(&ObstacleSideOrder { frame: *frame, z }, side);
    }

    pub fn insert_right(&mut self, frame: &SweepFrame, z: f64, side: ObstacleSide) {
        self.right.insert(&ObstacleSideOrder { frame: *frame, z }, side);
    }

    pub fn remove_left(&mut self, frame: &SweepFrame, z: f64, side: ObstacleSide) {
        Self::remove(&mut self.left, &mut self.repaired, frame, z, side);
    }

    pub fn remove_right(&mut self, frame: &SweepFrame, z: f64, side: ObstacleSide) {
        Self::remove(&mut self.right, &mut self.repaired, frame, z, side);
    }

    fn remove(
        tree: &mut ActiveOrder<ObstacleSide>,
        repaired: &mut usize,
        frame: &SweepFrame,
        z: f64,
        side: ObstacleSide,
    ) {
        let ctx = ObstacleSideOrder { frame: *frame, z };
        let rewound = || ObstacleSideOrder {
            frame: *frame,
            z: frame.z(side.start).max(z - 0.01),
        };
        match tree.locate(&ctx, rewound, side) {
            Some(found) => {
                if found.was_repaired() {
                    *repaired += 1;
                }
                tree.remove_at(found.index());
            }
            None => warn!("obstacle side {:?} is not in the active set", side),
        }
    }

    /// The nearest right obstacle side to the left of `p`.
    pub fn first_side_left_of(&self, p: Point) -> Option<ObstacleSide> {
        self.right
            .find_last(|s| right_of_line_or_on(p, s.start, s.end))
            .and_then(|i| self.right.get(i))
    }

    /// The nearest left obstacle side to the right of `p`.
    pub fn first_side_right_of(&self, p: Point) -> Option<ObstacleSide> {
        self.left
            .find_first(|s| !right_of_line_or_on(p, s.start, s.end))
            .and_then(|i| self.left.get(i))
    }
}
