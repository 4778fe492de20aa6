//! Finding the free space around axis edges.
//!
//! We sweep the obstacles in the nudging direction, together with the axis
//! edges parallel to it. Edges at the same perpendicular coordinate share a
//! container; the containers are kept sorted along the sweep line. Every
//! obstacle vertex the sweep passes bounds the containers next to it, and
//! every edge end is bounded by the nearest obstacle sides on both sides.
//! Edges in neighboring containers whose extents overlap become right
//! neighbors, so that the solver keeps them apart.

use std::collections::{BTreeSet, HashMap};

use log::{debug, trace, warn};

use super::axis_edge::AxisEdge;
use crate::{
    geom::{signed_area, Direction, Point},
    num::{DISTANCE_EPSILON, INTERSECTION_EPSILON},
    obstacle::{ObstacleIdx, Obstacles, VertIdx},
    obstacle_side::{ObstacleSide, ObstacleSides},
    sweep::{EventQueue, SweepEvent, SweepFrame, SweepPosition},
    visibility::{EdgeIdx, VisibilityGraph},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum EventKind {
    LowestVertex(VertIdx),
    LeftVertex(VertIdx),
    RightVertex(VertIdx),
    EdgeLow(EdgeIdx),
    EdgeHigh(EdgeIdx),
}

type Event = SweepEvent<EventKind>;

/// The active axis edges at one perpendicular coordinate.
#[derive(Clone, Debug)]
struct Container {
    x: f64,
    edges: BTreeSet<EdgeIdx>,
}

pub(crate) struct FreeSpaceFinder<'a> {
    obstacles: &'a Obstacles,
    graph: &'a mut VisibilityGraph<AxisEdge>,
    /// Edges that start or end on an obstacle aren't bounded by it.
    origins: &'a HashMap<EdgeIdx, ObstacleIdx>,
    direction: Direction,
    frame: SweepFrame,
    pos: SweepPosition,
    queue: EventQueue<EventKind>,
    sides: ObstacleSides,
    /// Sorted by `x`.
    containers: Vec<Container>,
}

impl<'a> FreeSpaceFinder<'a> {
    pub fn new(
        direction: Direction,
        obstacles: &'a Obstacles,
        graph: &'a mut VisibilityGraph<AxisEdge>,
        origins: &'a HashMap<EdgeIdx, ObstacleIdx>,
    ) -> Self {
        FreeSpaceFinder {
            obstacles,
            graph,
            origins,
            direction,
            frame: SweepFrame::axis(direction),
            pos: SweepPosition::default(),
            queue: EventQueue::default(),
            sides: ObstacleSides::default(),
            containers: Vec::new(),
        }
    }

    /// Sets the bounds and right neighbors of every axis edge parallel to the
    /// sweep direction.
    pub fn find_free_space(mut self) {
        self.init_queue();
        let mut events = 0;
        while let Some(ev) = self.queue.pop() {
            events += 1;
            self.process_event(ev);
        }
        debug!(
            "free space {:?}: {} events, {} repaired side lookups",
            self.direction, events, self.sides.repaired
        );
    }

    fn point(&self, v: VertIdx) -> Point {
        self.obstacles.point(v)
    }

    fn enqueue(&mut self, site: Point, kind: EventKind) {
        self.queue.push(SweepEvent::new(&self.frame, site, kind));
    }

    fn init_queue(&mut self) {
        let obstacles = self.obstacles;
        for o in obstacles.indices() {
            let lowest = obstacles.vertices(o).min_by(|&a, &b| {
                self.frame
                    .cmp_points(obstacles.point(a), obstacles.point(b))
            });
            if let Some(v) = lowest {
                self.enqueue(obstacles.point(v), EventKind::LowestVertex(v));
            }
        }
        let parallel: Vec<EdgeIdx> = self
            .graph
            .edges()
            .filter(|&e| self.graph.edge(e).data.direction == self.direction)
            .collect();
        for e in parallel {
            self.enqueue(self.graph.source_point(e), EventKind::EdgeLow(e));
            self.enqueue(self.graph.target_point(e), EventKind::EdgeHigh(e));
        }
    }

    fn process_event(&mut self, ev: Event) {
        trace!("{:?} at {:?}", ev.kind, ev.site);
        self.pos.set(ev.z());
        match ev.kind {
            EventKind::LowestVertex(v) => {
                self.process_left_vertex(v, self.obstacles.next(v));
                self.process_right_vertex(v, self.obstacles.prev(v));
            }
            EventKind::LeftVertex(v) => self.process_left_vertex(v, self.obstacles.next(v)),
            EventKind::RightVertex(v) => self.process_right_vertex(v, self.obstacles.prev(v)),
            EventKind::EdgeLow(e) => self.process_low_edge(e),
            EventKind::EdgeHigh(e) => self.process_high_edge(e),
        }
    }

    fn process_left_vertex(&mut self, v: VertIdx, next_v: VertIdx) {
        let site = self.point(v);
        let prev_v = self.obstacles.prev(v);
        if self.frame.z(site - self.point(prev_v)) > DISTANCE_EPSILON {
            let side = ObstacleSide::left(self.obstacles, prev_v);
            self.sides.remove_left(&self.frame, self.pos.z, side);
        }

        let next_site = self.point(next_v);
        let delta = next_site - site;
        let (dx, dz) = (self.frame.x(delta), self.frame.z(delta));
        if dz <= DISTANCE_EPSILON {
            if dx < 0.0 && dz >= 0.0 {
                self.enqueue(next_site, EventKind::LeftVertex(next_v));
            }
        } else {
            let side = ObstacleSide::left(self.obstacles, v);
            self.sides.insert_left(&self.frame, self.pos.z, side);
            self.enqueue(next_site, EventKind::LeftVertex(next_v));
        }
        self.restrict_container_left_of(v);
    }

    fn process_right_vertex(&mut self, v: VertIdx, next_v: VertIdx) {
        let site = self.point(v);
        let prev_v = self.obstacles.next(v);
        if self.frame.z(site - self.point(prev_v)) > DISTANCE_EPSILON {
            let side = ObstacleSide::right(self.obstacles, prev_v);
            self.sides.remove_right(&self.frame, self.pos.z, side);
        }

        let next_site = self.point(next_v);
        let delta = next_site - site;
        let (dx, dz) = (self.frame.x(delta), self.frame.z(delta));
        if dz <= DISTANCE_EPSILON {
            if dx > 0.0 && dz >= 0.0 {
                self.enqueue(next_site, EventKind::RightVertex(next_v));
            } else {
                self.restrict_container_right_of(v);
            }
        } else {
            let side = ObstacleSide::right(self.obstacles, v);
            self.sides.insert_right(&self.frame, self.pos.z, side);
            self.enqueue(next_site, EventKind::RightVertex(next_v));
            self.restrict_container_right_of(v);
        }
    }

    fn restricts(&self, e: EdgeIdx, o: ObstacleIdx) -> bool {
        self.origins.get(&e) != Some(&o)
    }

    /// The vertex `v` bounds the nearest container on its left from the right.
    fn restrict_container_left_of(&mut self, v: VertIdx) {
        let site_x = self.frame.x(self.point(v));
        let owner = self.obstacles.owner(v);
        let Some(i) = self
            .containers
            .partition_point(|c| c.x <= site_x)
            .checked_sub(1)
        else {
            return;
        };
        for e in self.containers[i].edges.clone() {
            if self.restricts(e, owner) {
                self.graph.edge_mut(e).data.bound_from_right(site_x);
            }
        }
    }

    /// The vertex `v` bounds the nearest container on its right from the left.
    fn restrict_container_right_of(&mut self, v: VertIdx) {
        let site_x = self.frame.x(self.point(v));
        let owner = self.obstacles.owner(v);
        let i = self.containers.partition_point(|c| c.x < site_x);
        let Some(container) = self.containers.get(i) else {
            return;
        };
        for e in container.edges.clone() {
            if self.restricts(e, owner) {
                self.graph.edge_mut(e).data.bound_from_left(site_x);
            }
        }
    }

    fn find_container(&self, x: f64) -> Option<usize> {
        let i = self
            .containers
            .partition_point(|c| c.x < x - DISTANCE_EPSILON / 2.0);
        self.containers
            .get(i)
            .filter(|c| c.x <= x + DISTANCE_EPSILON / 2.0)
            .map(|_| i)
    }

    fn find_or_insert_container(&mut self, x: f64) -> usize {
        if let Some(i) = self.find_container(x) {
            return i;
        }
        let i = self.containers.partition_point(|c| c.x < x);
        self.containers.insert(
            i,
            Container {
                x,
                edges: BTreeSet::new(),
            },
        );
        i
    }

    fn process_low_edge(&mut self, e: EdgeIdx) {
        let source = self.graph.source_point(e);
        let i = self.find_or_insert_container(self.frame.x(source));
        self.containers[i].edges.insert(e);

        let mut pairs = Vec::new();
        if let Some(prev) = i.checked_sub(1).map(|j| &self.containers[j]) {
            for &l in &prev.edges {
                for &r in &self.containers[i].edges {
                    pairs.push((l, r));
                }
            }
        }
        if let Some(next) = self.containers.get(i + 1) {
            for &l in &self.containers[i].edges {
                for &r in &next.edges {
                    pairs.push((l, r));
                }
            }
        }
        for (l, r) in pairs {
            self.try_add_right_neighbor(l, r);
        }

        self.constrain_with_obstacles(e, source);
    }

    fn process_high_edge(&mut self, e: EdgeIdx) {
        let source = self.graph.source_point(e);
        match self.find_container(self.frame.x(source)) {
            Some(i) => {
                self.containers[i].edges.remove(&e);
                if self.containers[i].edges.is_empty() {
                    self.containers.remove(i);
                }
            }
            None => warn!("axis edge {e:?} has no container"),
        }
        let target = self.graph.target_point(e);
        self.constrain_with_obstacles(e, target);
    }

    fn try_add_right_neighbor(&mut self, left: EdgeIdx, right: EdgeIdx) {
        let z = |p: Point| self.frame.z(p);
        let (l_low, l_high) = (z(self.graph.source_point(left)), z(self.graph.target_point(left)));
        let (r_low, r_high) = (
            z(self.graph.source_point(right)),
            z(self.graph.target_point(right)),
        );
        // Edges that only touch end to end, like the consecutive segments of
        // a staircase, have nothing to keep apart.
        let overlap = l_high.min(r_high) - l_low.max(r_low);
        if overlap > DISTANCE_EPSILON {
            self.graph.edge_mut(left).data.add_right_neighbor(right);
        }
    }

    /// Bounds the edge `e` by the obstacle sides to the left and right of
    /// `p`, which is one of its ends.
    fn constrain_with_obstacles(&mut self, e: EdgeIdx, p: Point) {
        let z = self.pos.z;

        let from_left = self
            .sides
            .right
            .find_last(|s| signed_area(s.start, s.end, p) < INTERSECTION_EPSILON)
            .and_then(|i| self.sides.right.get(i));
        if let Some(side) = from_left {
            if self.restricts(e, self.obstacles.owner(side.start_vertex)) {
                let x = self.frame.x(side.at_z(&self.frame, z));
                self.graph.edge_mut(e).data.bound_from_left(x);
            }
        }

        let from_right = self
            .sides
            .left
            .find_first(|s| signed_area(p, s.start, s.end) > -INTERSECTION_EPSILON)
            .and_then(|i| self.sides.left.get(i));
        if let Some(side) = from_right {
            if self.restricts(e, self.obstacles.owner(side.start_vertex)) {
                let x = self.frame.x(side.at_z(&self.frame, z));
                self.graph.edge_mut(e).data.bound_from_right(x);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::Rect;
    use proptest::prelude::*;

    fn p(x: f64, y: f64) -> Point {
        Point::new(x, y)
    }

    fn rects(rs: &[Rect]) -> Obstacles {
        Obstacles::from_rings(rs.iter().map(|r| r.corners())).unwrap()
    }

    fn edge(g: &mut VisibilityGraph<AxisEdge>, a: Point, b: Point, dir: Direction) -> EdgeIdx {
        g.add_edge_with(a, b, |_, _| AxisEdge::new(dir)).unwrap()
    }

    fn bounds(g: &VisibilityGraph<AxisEdge>, e: EdgeIdx) -> (f64, f64) {
        let data = &g.edge(e).data;
        (data.left_bound, data.right_bound)
    }

    fn corridor() -> Obstacles {
        rects(&[
            Rect::from_corners(p(-15.0, 0.0), p(-5.0, 20.0)),
            Rect::from_corners(p(5.0, 0.0), p(15.0, 20.0)),
        ])
    }

    #[test]
    fn vertical_corridor() {
        let obs = corridor();
        let mut g = VisibilityGraph::new();
        let e = edge(&mut g, p(0.0, -5.0), p(0.0, 25.0), Direction::North);
        let origins = HashMap::new();
        FreeSpaceFinder::new(Direction::North, &obs, &mut g, &origins).find_free_space();
        assert_eq!(bounds(&g, e), (-5.0, 5.0));
    }

    #[test]
    fn edges_end_inside_the_corridor() {
        let obs = corridor();
        let mut g = VisibilityGraph::new();
        let e = edge(&mut g, p(1.0, 5.0), p(1.0, 15.0), Direction::North);
        let origins = HashMap::new();
        FreeSpaceFinder::new(Direction::North, &obs, &mut g, &origins).find_free_space();
        assert_eq!(bounds(&g, e), (-5.0, 5.0));
    }

    #[test]
    fn horizontal_corridor() {
        let obs = rects(&[
            Rect::from_corners(p(0.0, 5.0), p(20.0, 15.0)),
            Rect::from_corners(p(0.0, -15.0), p(20.0, -5.0)),
        ]);
        let mut g = VisibilityGraph::new();
        let e = edge(&mut g, p(-5.0, 0.0), p(25.0, 0.0), Direction::East);
        let origins = HashMap::new();
        FreeSpaceFinder::new(Direction::East, &obs, &mut g, &origins).find_free_space();
        // Along the east frame, x is minus y: the upper obstacle is on the left.
        assert_eq!(bounds(&g, e), (-5.0, 5.0));
    }

    #[test]
    fn edges_dont_get_bounded_by_their_own_obstacle() {
        let obs = corridor();
        let mut g = VisibilityGraph::new();
        let e = edge(&mut g, p(0.0, -5.0), p(0.0, 25.0), Direction::North);
        let origins = HashMap::from([(e, ObstacleIdx(0))]);
        FreeSpaceFinder::new(Direction::North, &obs, &mut g, &origins).find_free_space();
        assert_eq!(bounds(&g, e), (f64::NEG_INFINITY, 5.0));
    }

    #[test]
    fn perpendicular_edges_are_ignored() {
        let obs = corridor();
        let mut g = VisibilityGraph::new();
        let e = edge(&mut g, p(-3.0, 10.0), p(3.0, 10.0), Direction::East);
        let origins = HashMap::new();
        FreeSpaceFinder::new(Direction::North, &obs, &mut g, &origins).find_free_space();
        assert_eq!(bounds(&g, e), (f64::NEG_INFINITY, f64::INFINITY));
    }

    #[test]
    fn overlapping_neighbors() {
        let obs = Obstacles::new();
        let mut g = VisibilityGraph::new();
        let a = edge(&mut g, p(0.0, 0.0), p(0.0, 10.0), Direction::North);
        let b = edge(&mut g, p(2.0, 5.0), p(2.0, 15.0), Direction::North);
        let c = edge(&mut g, p(4.0, 100.0), p(4.0, 110.0), Direction::North);
        let origins = HashMap::new();
        FreeSpaceFinder::new(Direction::North, &obs, &mut g, &origins).find_free_space();
        assert_eq!(g.edge(a).data.right_neighbors, BTreeSet::from([b]));
        assert!(g.edge(b).data.right_neighbors.is_empty());
        assert!(g.edge(c).data.right_neighbors.is_empty());
    }

    #[test]
    fn steps_of_a_staircase_arent_neighbors() {
        let obs = Obstacles::new();
        let mut g = VisibilityGraph::new();
        let lower = edge(&mut g, p(0.0, 0.0), p(2.0, 0.0), Direction::East);
        let upper = edge(&mut g, p(2.0, 2.0), p(4.0, 2.0), Direction::East);
        let origins = HashMap::new();
        FreeSpaceFinder::new(Direction::East, &obs, &mut g, &origins).find_free_space();
        assert!(g.edge(lower).data.right_neighbors.is_empty());
        assert!(g.edge(upper).data.right_neighbors.is_empty());
    }

    #[test]
    fn triangle_bounds_at_the_edge_ends() {
        // A triangle pointing up, to the left of the edge. Its slanted right
        // side bounds the edge where the edge starts.
        let obs = Obstacles::from_rings([vec![p(-10.0, 0.0), p(0.0, 0.0), p(-10.0, 10.0)]]).unwrap();
        let mut g = VisibilityGraph::new();
        let e = edge(&mut g, p(1.0, 5.0), p(1.0, 20.0), Direction::North);
        let origins = HashMap::new();
        FreeSpaceFinder::new(Direction::North, &obs, &mut g, &origins).find_free_space();
        let (left, right) = bounds(&g, e);
        assert!((left + 5.0).abs() < 1e-9, "left bound {left}");
        assert_eq!(right, f64::INFINITY);
    }

    proptest! {
        #[test]
        fn bounds_never_cross(
            cells in prop::collection::vec((any::<bool>(), 2i32..18, 2i32..18), 16),
            edges in prop::collection::vec((-10i32..90, -10i32..90, 1i32..40), 1..8),
            east in any::<bool>(),
        ) {
            // At most one obstacle per cell of a 4x4 grid, so they don't overlap.
            let rs: Vec<Rect> = cells
                .iter()
                .enumerate()
                .filter(|(_, (used, ..))| *used)
                .map(|(i, &(_, w, h))| {
                    let x = (i % 4) as f64 * 20.0 + 1.0;
                    let y = (i / 4) as f64 * 20.0 + 1.0;
                    Rect::from_corners(p(x, y), p(x + w as f64, y + h as f64))
                })
                .collect();
            let obs = rects(&rs);
            let dir = if east { Direction::East } else { Direction::North };
            let mut g = VisibilityGraph::new();
            for (a, b, len) in edges {
                let (a, b, len) = (a as f64 + 0.5, b as f64 + 0.5, len as f64);
                let (from, to) = if east {
                    (p(a, b), p(a + len, b))
                } else {
                    (p(a, b), p(a, b + len))
                };
                edge(&mut g, from, to, dir);
            }
            let origins = HashMap::new();
            FreeSpaceFinder::new(dir, &obs, &mut g, &origins).find_free_space();
            for e in g.edges() {
                let (left, right) = bounds(&g, e);
                prop_assert!(left <= right, "{:?}: {} > {}", e, left, right);
            }
        }
    }
}
