//! The obstacle arena.
//!
//! Obstacles are closed polygons. All of their vertices live in one arena so
//! that sweep events and obstacle sides can refer to a vertex by index, and
//! walk to its neighbors on the ring without chasing pointers.

use crate::{
    error::{Error, Result},
    geom::{signed_area, Point, Rect},
    num::DISTANCE_EPSILON,
};

/// An index into our obstacle arena.
#[derive(Clone, Copy, PartialOrd, Ord, PartialEq, Eq, Hash)]
pub struct ObstacleIdx(pub usize);

impl std::fmt::Debug for ObstacleIdx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "o_{}", self.0)
    }
}

/// An index of a vertex of some obstacle.
#[derive(Clone, Copy, PartialOrd, Ord, PartialEq, Eq, Hash)]
pub struct VertIdx(pub usize);

impl std::fmt::Debug for VertIdx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v_{}", self.0)
    }
}

/// A collection of obstacle polygons, each stored as a clockwise ring.
#[derive(Clone, Debug, Default)]
pub struct Obstacles {
    points: Vec<Point>,
    next: Vec<VertIdx>,
    prev: Vec<VertIdx>,
    owner: Vec<ObstacleIdx>,
    // Per obstacle: the first vertex, the vertex count and the bounding box.
    first: Vec<VertIdx>,
    len: Vec<usize>,
    bbox: Vec<Rect>,
}

pub(crate) fn cyclic_pairs<T>(xs: &[T]) -> impl Iterator<Item = (&T, &T)> {
    xs.windows(2)
        .map(|pair| (&pair[0], &pair[1]))
        .chain(xs.last().zip(xs.first()))
}

/// Twice the signed area of a ring; positive for counterclockwise rings.
pub(crate) fn ring_area(ps: &[Point]) -> f64 {
    cyclic_pairs(ps).map(|(p, q)| p.cross(*q)).sum()
}

impl Obstacles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rings<R, P>(rings: impl IntoIterator<Item = R>) -> Result<Self>
    where
        R: IntoIterator<Item = P>,
        P: Into<Point>,
    {
        let mut ret = Self::new();
        for ring in rings {
            ret.add(ring.into_iter().map(Into::into))?;
        }
        Ok(ret)
    }

    /// Adds an obstacle. Counterclockwise rings are reversed, so holes can be
    /// passed without reorienting them first.
    pub fn add(&mut self, ring: impl IntoIterator<Item = Point>) -> Result<ObstacleIdx> {
        let index = self.first.len();
        let mut ps: Vec<Point> = Vec::new();
        for p in ring {
            if !p.is_finite() {
                return Err(Error::NonFinite);
            }
            if ps.last().map_or(true, |q: &Point| !q.close_to(p)) {
                ps.push(p);
            }
        }
        while ps.len() > 1 && ps[0].close_to(ps[ps.len() - 1]) {
            ps.pop();
        }
        if ps.len() < 3 {
            return Err(Error::InvalidObstacle {
                index,
                reason: "fewer than three distinct vertices",
            });
        }
        let area = ring_area(&ps);
        if area.abs() <= DISTANCE_EPSILON {
            return Err(Error::InvalidObstacle {
                index,
                reason: "zero area",
            });
        }
        if area > 0.0 {
            ps.reverse();
        }

        let o = ObstacleIdx(index);
        let base = self.points.len();
        let n = ps.len();
        self.first.push(VertIdx(base));
        self.len.push(n);
        self.bbox.push(Rect::from_points(ps.iter().copied()));
        for (i, p) in ps.into_iter().enumerate() {
            self.points.push(p);
            self.next.push(VertIdx(base + (i + 1) % n));
            self.prev.push(VertIdx(base + (i + n - 1) % n));
            self.owner.push(o);
        }
        Ok(o)
    }

    pub fn len(&self) -> usize {
        self.first.len()
    }

    pub fn is_empty(&self) -> bool {
        self.first.is_empty()
    }

    pub fn indices(&self) -> impl Iterator<Item = ObstacleIdx> {
        (0..self.first.len()).map(ObstacleIdx)
    }

    pub fn point(&self, v: VertIdx) -> Point {
        self.points[v.0]
    }

    /// The next vertex in clockwise order.
    pub fn next(&self, v: VertIdx) -> VertIdx {
        self.next[v.0]
    }

    pub fn prev(&self, v: VertIdx) -> VertIdx {
        self.prev[v.0]
    }

    pub fn owner(&self, v: VertIdx) -> ObstacleIdx {
        self.owner[v.0]
    }

    pub fn vertices(&self, o: ObstacleIdx) -> impl Iterator<Item = VertIdx> {
        let start = self.first[o.0].0;
        (start..start + self.len[o.0]).map(VertIdx)
    }

    pub fn ring(&self, o: ObstacleIdx) -> impl Iterator<Item = Point> + '_ {
        self.vertices(o).map(|v| self.point(v))
    }

    pub fn bbox(&self, o: ObstacleIdx) -> Rect {
        self.bbox[o.0]
    }

    pub fn bounding_box(&self) -> Rect {
        let mut ret = Rect::empty();
        for b in &self.bbox {
            ret.add(b.left_bottom());
            ret.add(b.right_top());
        }
        ret
    }

    fn sides(&self, o: ObstacleIdx) -> impl Iterator<Item = (Point, Point)> + '_ {
        self.vertices(o)
            .map(|v| (self.point(v), self.point(self.next(v))))
    }

    fn on_boundary(&self, o: ObstacleIdx, p: Point) -> bool {
        self.sides(o).any(|(a, b)| {
            let len = (b - a).length();
            signed_area(a, b, p).abs() <= DISTANCE_EPSILON * len.max(1.0)
                && (p - a).dot(b - a) >= -DISTANCE_EPSILON
                && (p - b).dot(a - b) >= -DISTANCE_EPSILON
        })
    }

    fn winds_around(&self, o: ObstacleIdx, p: Point) -> bool {
        let mut inside = false;
        for (a, b) in self.sides(o) {
            if (a.y > p.y) != (b.y > p.y) {
                let x = a.x + (p.y - a.y) / (b.y - a.y) * (b.x - a.x);
                if p.x < x {
                    inside = !inside;
                }
            }
        }
        inside
    }

    /// Is `p` inside the obstacle, or on its boundary?
    pub fn contains_point(&self, o: ObstacleIdx, p: Point) -> bool {
        self.bbox(o).contains(p) && (self.on_boundary(o, p) || self.winds_around(o, p))
    }

    /// Is `p` strictly inside the obstacle, away from its boundary?
    pub fn strictly_contains(&self, o: ObstacleIdx, p: Point) -> bool {
        self.bbox(o).contains(p) && !self.on_boundary(o, p) && self.winds_around(o, p)
    }

    /// Does the closed segment `a -- b` touch the boundary of the obstacle?
    pub fn segment_touches_boundary(&self, o: ObstacleIdx, a: Point, b: Point) -> bool {
        Rect::from_corners(a, b).intersects(&self.bbox(o))
            && self
                .sides(o)
                .any(|(c, d)| crate::geom::segments_intersect(a, b, c, d))
    }
}
