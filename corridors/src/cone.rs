//! Cones and their sides.
//!
//! A cone has an apex and two sides. Initially both sides are rays, in the
//! cone directions of the current sweep. When an obstacle boundary cuts into
//! the cone, the side it cuts is replaced by a *broken* side, which follows
//! the obstacle boundary to one of its vertices.

use std::cmp::Ordering;

use crate::{
    geom::{orientation, Point, TriangleOrientation},
    obstacle::VertIdx,
    order::SweepOrdering,
    sweep::SweepFrame,
};

#[derive(Clone, Copy, PartialOrd, Ord, PartialEq, Eq, Hash)]
pub struct ConeIdx(pub usize);

impl std::fmt::Debug for ConeIdx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "c_{}", self.0)
    }
}

#[derive(Clone, Copy, PartialOrd, Ord, PartialEq, Eq, Hash)]
pub struct SideIdx(pub usize);

impl std::fmt::Debug for SideIdx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "cs_{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ConeSideKind {
    Left,
    Right,
    Broken {
        end_vertex: VertIdx,
        end: Point,
        /// The ray this side replaced.
        original: SideIdx,
    },
}

#[derive(Clone, Copy, Debug)]
pub struct ConeSide {
    pub start: Point,
    pub direction: Point,
    pub cone: ConeIdx,
    pub kind: ConeSideKind,
    pub removed: bool,
}

impl ConeSide {
    pub fn is_pure_left(&self) -> bool {
        self.kind == ConeSideKind::Left
    }

    pub fn is_pure_right(&self) -> bool {
        self.kind == ConeSideKind::Right
    }

    /// A second point on the line of this side.
    pub fn ahead(&self) -> Point {
        self.start + self.direction
    }

    /// Where this side crosses the horizontal line at height `z`.
    pub fn at_z(&self, frame: &SweepFrame, z: f64) -> Point {
        let den = self.direction.dot(frame.direction);
        if den.abs() < crate::num::TOLERANCE {
            return self.start;
        }
        let t = (z - frame.z(self.start)) / den;
        self.start + self.direction * t
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Cone {
    pub apex: Point,
    pub left: SideIdx,
    pub right: SideIdx,
    pub removed: bool,
}

/// The arena of cones and cone sides for one sweep.
#[derive(Clone, Debug, Default)]
pub struct Cones {
    cones: Vec<Cone>,
    sides: Vec<ConeSide>,
}

impl Cones {
    /// Creates a cone at `apex` with two ray sides.
    pub fn add(&mut self, apex: Point, left_dir: Point, right_dir: Point) -> ConeIdx {
        let c = ConeIdx(self.cones.len());
        let left = self.push_side(ConeSide {
            start: apex,
            direction: left_dir,
            cone: c,
            kind: ConeSideKind::Left,
            removed: false,
        });
        let right = self.push_side(ConeSide {
            start: apex,
            direction: right_dir,
            cone: c,
            kind: ConeSideKind::Right,
            removed: false,
        });
        self.cones.push(Cone {
            apex,
            left,
            right,
            removed: false,
        });
        c
    }

    /// Creates a broken side from `start` to the obstacle vertex `end_vertex`,
    /// standing in for `original`. The caller decides which side of the cone
    /// it replaces.
    pub fn add_broken(
        &mut self,
        start: Point,
        end_vertex: VertIdx,
        end: Point,
        original: SideIdx,
    ) -> SideIdx {
        let cone = self.sides[original.0].cone;
        self.push_side(ConeSide {
            start,
            direction: end - start,
            cone,
            kind: ConeSideKind::Broken {
                end_vertex,
                end,
                original,
            },
            removed: false,
        })
    }

    fn push_side(&mut self, side: ConeSide) -> SideIdx {
        let s = SideIdx(self.sides.len());
        self.sides.push(side);
        s
    }

    pub fn cone(&self, c: ConeIdx) -> &Cone {
        &self.cones[c.0]
    }

    pub fn cone_mut(&mut self, c: ConeIdx) -> &mut Cone {
        &mut self.cones[c.0]
    }

    pub fn side(&self, s: SideIdx) -> &ConeSide {
        &self.sides[s.0]
    }

    pub fn side_mut(&mut self, s: SideIdx) -> &mut ConeSide {
        &mut self.sides[s.0]
    }

    pub fn len(&self) -> usize {
        self.cones.len()
    }
}

/// Orders cone sides by where they cross the sweep line at `z`.
///
/// Collinear ties between a broken side and a ray are broken in favor of
/// putting left sides first, so that the order is total at every height.
pub struct ConeSideOrder<'a> {
    pub frame: SweepFrame,
    pub z: f64,
    pub cones: &'a Cones,
}

impl SweepOrdering<SideIdx> for ConeSideOrder<'_> {
    fn cmp(&self, item: &SideIdx, other: &SideIdx) -> Ordering {
        let a = self.cones.side(*item);
        let b = self.cones.side(*other);
        let from_orientation = |o: TriangleOrientation, tie: Ordering| match o {
            TriangleOrientation::Counterclockwise => Ordering::Less,
            TriangleOrientation::Clockwise => Ordering::Greater,
            TriangleOrientation::Collinear => tie,
        };

        match (a.kind, b.kind) {
            (
                ConeSideKind::Broken {
                    end_vertex: ea,
                    original: oa,
                    ..
                },
                ConeSideKind::Broken {
                    end_vertex: eb,
                    original: ob,
                    end,
                },
            ) => {
                if ea == eb {
                    self.cmp(&oa, &ob)
                } else {
                    let x = a.at_z(&self.frame, self.z);
                    from_orientation(orientation(x, b.start, end), Ordering::Greater)
                }
            }
            (ConeSideKind::Broken { .. }, _) => {
                let x = a.at_z(&self.frame, self.z);
                let tie = if b.is_pure_left() {
                    Ordering::Less
                } else {
                    Ordering::Greater
                };
                from_orientation(orientation(x, b.start, b.ahead()), tie)
            }
            (_, ConeSideKind::Broken { end, .. }) => {
                let x = a.at_z(&self.frame, self.z);
                let tie = if a.is_pure_left() {
                    Ordering::Greater
                } else {
                    Ordering::Less
                };
                from_orientation(orientation(x, b.start, end), tie)
            }
            _ => from_orientation(orientation(a.start, b.start, b.ahead()), Ordering::Equal),
        }
    }
}
