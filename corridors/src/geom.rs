//! Points, directions and the orientation predicates the sweeps are built on.

use serde::{Deserialize, Serialize};

use crate::num::{DISTANCE_EPSILON, SQUARE_OF_DISTANCE_EPSILON};

#[derive(Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl std::fmt::Debug for Point {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:?}, {:?})", self.x, self.y)
    }
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Point { x, y }
    }

    pub fn dot(self, other: Point) -> f64 {
        self.x * other.x + self.y * other.y
    }

    pub fn cross(self, other: Point) -> f64 {
        self.x * other.y - self.y * other.x
    }

    pub fn length(self) -> f64 {
        self.dot(self).sqrt()
    }

    pub fn l1(self) -> f64 {
        self.x.abs() + self.y.abs()
    }

    /// Rotates counterclockwise by `angle` radians.
    pub fn rotate(self, angle: f64) -> Point {
        let (s, c) = angle.sin_cos();
        Point::new(c * self.x - s * self.y, s * self.x + c * self.y)
    }

    pub fn close_to(self, other: Point) -> bool {
        (self - other).length() <= DISTANCE_EPSILON
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    pub fn rounded(self) -> Point {
        Point::new(crate::num::round(self.x), crate::num::round(self.y))
    }

    pub fn mid(self, other: Point) -> Point {
        (self + other) * 0.5
    }

    pub(crate) fn coord(self) -> robust::Coord<f64> {
        robust::Coord {
            x: self.x,
            y: self.y,
        }
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Point { x, y }
    }
}

impl std::ops::Add for Point {
    type Output = Point;

    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl std::ops::Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl std::ops::Mul<f64> for Point {
    type Output = Point;

    fn mul(self, rhs: f64) -> Point {
        Point::new(self.x * rhs, self.y * rhs)
    }
}

impl std::ops::Neg for Point {
    type Output = Point;

    fn neg(self) -> Point {
        Point::new(-self.x, -self.y)
    }
}

/// An axis-aligned rectangle. Empty rectangles have `left > right`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub left: f64,
    pub bottom: f64,
    pub right: f64,
    pub top: f64,
}

impl Rect {
    pub fn empty() -> Self {
        Rect {
            left: f64::INFINITY,
            bottom: f64::INFINITY,
            right: f64::NEG_INFINITY,
            top: f64::NEG_INFINITY,
        }
    }

    pub fn from_corners(a: Point, b: Point) -> Self {
        let mut ret = Rect::empty();
        ret.add(a);
        ret.add(b);
        ret
    }

    pub fn from_points(points: impl IntoIterator<Item = Point>) -> Self {
        let mut ret = Rect::empty();
        for p in points {
            ret.add(p);
        }
        ret
    }

    pub fn add(&mut self, p: Point) {
        self.left = self.left.min(p.x);
        self.right = self.right.max(p.x);
        self.bottom = self.bottom.min(p.y);
        self.top = self.top.max(p.y);
    }

    pub fn is_empty(&self) -> bool {
        self.left > self.right || self.bottom > self.top
    }

    pub fn padded(&self, pad: f64) -> Rect {
        Rect {
            left: self.left - pad,
            bottom: self.bottom - pad,
            right: self.right + pad,
            top: self.top + pad,
        }
    }

    /// Containment, with the boundary counting as inside.
    pub fn contains(&self, p: Point) -> bool {
        self.left - DISTANCE_EPSILON <= p.x
            && p.x <= self.right + DISTANCE_EPSILON
            && self.bottom - DISTANCE_EPSILON <= p.y
            && p.y <= self.top + DISTANCE_EPSILON
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        self.left <= other.right
            && other.left <= self.right
            && self.bottom <= other.top
            && other.bottom <= self.top
    }

    pub fn left_bottom(&self) -> Point {
        Point::new(self.left, self.bottom)
    }

    pub fn right_top(&self) -> Point {
        Point::new(self.right, self.top)
    }

    /// The corners in clockwise order, starting from the bottom left.
    pub fn corners(&self) -> [Point; 4] {
        [
            Point::new(self.left, self.bottom),
            Point::new(self.left, self.top),
            Point::new(self.right, self.top),
            Point::new(self.right, self.bottom),
        ]
    }
}

/// One of the four axis directions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Direction {
    North,
    East,
    South,
    West,
}

impl Direction {
    pub fn opposite(self) -> Direction {
        match self {
            Direction::North => Direction::South,
            Direction::East => Direction::West,
            Direction::South => Direction::North,
            Direction::West => Direction::East,
        }
    }

    /// The direction 90 degrees clockwise of this one.
    pub fn right(self) -> Direction {
        match self {
            Direction::North => Direction::East,
            Direction::East => Direction::South,
            Direction::South => Direction::West,
            Direction::West => Direction::North,
        }
    }

    pub fn to_point(self) -> Point {
        match self {
            Direction::North => Point::new(0.0, 1.0),
            Direction::East => Point::new(1.0, 0.0),
            Direction::South => Point::new(0.0, -1.0),
            Direction::West => Point::new(-1.0, 0.0),
        }
    }

    /// North and East are the directions in which axis edges are stored.
    pub fn is_canonical(self) -> bool {
        matches!(self, Direction::North | Direction::East)
    }

    pub fn is_vertical(self) -> bool {
        matches!(self, Direction::North | Direction::South)
    }

    pub fn parallel(self, other: Direction) -> bool {
        self == other || self == other.opposite()
    }

    /// The pure direction from `a` to `b`, if the two points are axis aligned and distinct.
    pub fn between(a: Point, b: Point) -> Option<Direction> {
        Compass::between(a, b).pure()
    }
}

/// A combination of compass directions, as you get for the vector between two
/// arbitrary points. Diagonal vectors have two bits set.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Compass(u8);

impl Compass {
    pub const NONE: Compass = Compass(0);
    pub const NORTH: Compass = Compass(1);
    pub const EAST: Compass = Compass(2);
    pub const SOUTH: Compass = Compass(4);
    pub const WEST: Compass = Compass(8);

    pub fn of(v: Point) -> Compass {
        let mut bits = 0;
        if v.x > DISTANCE_EPSILON {
            bits |= Compass::EAST.0;
        } else if v.x < -DISTANCE_EPSILON {
            bits |= Compass::WEST.0;
        }
        if v.y > DISTANCE_EPSILON {
            bits |= Compass::NORTH.0;
        } else if v.y < -DISTANCE_EPSILON {
            bits |= Compass::SOUTH.0;
        }
        Compass(bits)
    }

    pub fn between(a: Point, b: Point) -> Compass {
        Compass::of(b - a)
    }

    pub fn contains(self, other: Compass) -> bool {
        self.0 & other.0 == other.0 && other.0 != 0
    }

    pub fn pure(self) -> Option<Direction> {
        match self {
            Compass::NORTH => Some(Direction::North),
            Compass::EAST => Some(Direction::East),
            Compass::SOUTH => Some(Direction::South),
            Compass::WEST => Some(Direction::West),
            _ => None,
        }
    }

    pub fn opposite(self) -> Compass {
        let mut bits = 0;
        if self.contains(Compass::NORTH) {
            bits |= Compass::SOUTH.0;
        }
        if self.contains(Compass::SOUTH) {
            bits |= Compass::NORTH.0;
        }
        if self.contains(Compass::EAST) {
            bits |= Compass::WEST.0;
        }
        if self.contains(Compass::WEST) {
            bits |= Compass::EAST.0;
        }
        Compass(bits)
    }
}

impl From<Direction> for Compass {
    fn from(d: Direction) -> Self {
        match d {
            Direction::North => Compass::NORTH,
            Direction::East => Compass::EAST,
            Direction::South => Compass::SOUTH,
            Direction::West => Compass::WEST,
        }
    }
}

impl std::ops::BitOr for Compass {
    type Output = Compass;

    fn bitor(self, rhs: Compass) -> Compass {
        Compass(self.0 | rhs.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TriangleOrientation {
    Clockwise,
    Counterclockwise,
    Collinear,
}

/// Twice the signed area of the triangle `abc`: positive when `abc` is counterclockwise.
pub fn signed_area(a: Point, b: Point, c: Point) -> f64 {
    robust::orient2d(a.coord(), b.coord(), c.coord())
}

pub fn orientation(a: Point, b: Point, c: Point) -> TriangleOrientation {
    let area = signed_area(a, b, c);
    if area > DISTANCE_EPSILON {
        TriangleOrientation::Counterclockwise
    } else if area < -DISTANCE_EPSILON {
        TriangleOrientation::Clockwise
    } else {
        TriangleOrientation::Collinear
    }
}

pub fn left_of_line_or_on(p: Point, a: Point, b: Point) -> bool {
    signed_area(p, a, b) >= 0.0
}

pub fn left_of_line(p: Point, a: Point, b: Point) -> bool {
    signed_area(p, a, b) > 0.0
}

pub fn right_of_line_or_on(p: Point, a: Point, b: Point) -> bool {
    signed_area(a, b, p) <= 0.0
}

pub fn right_of_line(p: Point, a: Point, b: Point) -> bool {
    signed_area(a, b, p) < 0.0
}

/// Is `p` in the closed wedge at `apex` bounded by the rays through
/// `left_point` and `right_point`?
pub fn inside_cone(p: Point, apex: Point, left_point: Point, right_point: Point) -> bool {
    right_of_line_or_on(p, apex, left_point) && left_of_line_or_on(p, apex, right_point)
}

/// Intersects the line through `a` and `b` with the line through `c` and `d`.
pub fn line_line_intersection(a: Point, b: Point, c: Point, d: Point) -> Option<Point> {
    // Solve a + u (b - a) = c + v (d - c).
    let ba = b - a;
    let cd = c - d;
    let ca = c - a;
    let det = ba.x * cd.y - cd.x * ba.y;
    if det.abs() < 1e-8 {
        return None;
    }
    let u = (ca.x * cd.y - cd.x * ca.y) / det;
    Some(a + ba * u)
}

/// Where the ray from `origin` along `dir` crosses the interior of the segment `start -- end`.
pub fn interval_intersects_ray(start: Point, end: Point, origin: Point, dir: Point) -> Option<Point> {
    let x = line_line_intersection(start, end, origin, origin + dir)?;
    let ds = start - x;
    let de = x - end;
    if ds.dot(de) <= 0.0 {
        return None;
    }
    if (x - origin).dot(dir) < 0.0 {
        return None;
    }
    (ds.dot(ds) > SQUARE_OF_DISTANCE_EPSILON && de.dot(de) >= SQUARE_OF_DISTANCE_EPSILON)
        .then_some(x)
}

/// The intersection of two rays, if it lies strictly past both origins.
pub fn ray_intersects_ray_interiors(
    a_orig: Point,
    a_dir: Point,
    b_orig: Point,
    b_dir: Point,
) -> Option<Point> {
    let x = line_line_intersection(a_orig, a_orig + a_dir, b_orig, b_orig + b_dir)?;
    let past_a = (x - a_orig).dot(a_dir) / a_dir.l1() > DISTANCE_EPSILON;
    let past_b = (x - b_orig).dot(b_dir) / b_dir.l1() > DISTANCE_EPSILON;
    (past_a && past_b).then_some(x)
}

/// Closed-segment intersection test, touching counts.
pub fn segments_intersect(a: Point, b: Point, c: Point, d: Point) -> bool {
    let o1 = signed_area(a, b, c);
    let o2 = signed_area(a, b, d);
    let o3 = signed_area(c, d, a);
    let o4 = signed_area(c, d, b);
    if ((o1 > 0.0 && o2 < 0.0) || (o1 < 0.0 && o2 > 0.0))
        && ((o3 > 0.0 && o4 < 0.0) || (o3 < 0.0 && o4 > 0.0))
    {
        return true;
    }
    let on = |p: Point, q: Point, r: Point, area: f64| {
        area == 0.0
            && r.x >= p.x.min(q.x)
            && r.x <= p.x.max(q.x)
            && r.y >= p.y.min(q.y)
            && r.y <= p.y.max(q.y)
    };
    on(a, b, c, o1) || on(a, b, d, o2) || on(c, d, a, o3) || on(c, d, b, o4)
}
