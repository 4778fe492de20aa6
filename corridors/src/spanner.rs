//! The cone spanner: a visibility graph built by sweeping cones.
//!
//! One [`LineSweeper`] pass sweeps a line across the plane in a single
//! direction. Every obstacle vertex and every port it passes opens a cone,
//! a narrow wedge pointing in the sweep direction. As the line moves up, a
//! cone is eventually either cut off by obstacles or reaches a vertex it can
//! see; in the second case we add an edge from the cone's apex to that
//! vertex and close the cone.
//!
//! [`ConeSpanner`] runs one sweep per direction, with the directions spaced
//! so that the cones cover the whole turn, and merges the results.

use std::collections::HashSet;

use log::{debug, trace, warn};

use crate::{
    config::RoutingSettings,
    cone::{ConeIdx, ConeSideKind, ConeSideOrder, Cones, SideIdx},
    geom::{
        inside_cone, interval_intersects_ray, left_of_line, left_of_line_or_on, orientation,
        ray_intersects_ray_interiors, right_of_line_or_on, signed_area, Point,
        TriangleOrientation,
    },
    num::{close, DISTANCE_EPSILON, TOLERANCE},
    obstacle::{Obstacles, VertIdx},
    obstacle_side::{ObstacleSide, ObstacleSides},
    order::{ActiveOrder, Located},
    sweep::{EventQueue, SweepEvent, SweepFrame, SweepPosition},
    visibility::{PointKey, VisibilityGraph},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum EventKind {
    LowestVertex(VertIdx),
    LeftVertex(VertIdx),
    RightVertex(VertIdx),
    Port,
    LeftIntersection { side: SideIdx, end_vertex: VertIdx },
    RightIntersection { side: SideIdx, end_vertex: VertIdx },
    ConeClosure(ConeIdx),
}

type Event = SweepEvent<EventKind>;

/// Counters describing one sweep.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SweepStats {
    pub events: usize,
    pub cones: usize,
    /// Active-set lookups that needed the rewound retry or a scan.
    pub repaired_lookups: usize,
    /// Active-set lookups that failed altogether, and were skipped.
    pub missed_lookups: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Tree {
    Left,
    Right,
}

pub struct LineSweeper<'a> {
    obstacles: &'a Obstacles,
    frame: SweepFrame,
    cone_left_dir: Point,
    cone_right_dir: Point,
    pos: SweepPosition,
    queue: EventQueue<EventKind>,
    cones: Cones,
    left_sides: ActiveOrder<SideIdx>,
    right_sides: ActiveOrder<SideIdx>,
    obstacle_sides: ObstacleSides,
    ports: HashSet<PointKey>,
    port_list: Vec<Point>,
    border: Option<Vec<Point>>,
    graph: VisibilityGraph,
    port_graph: VisibilityGraph,
    stats: SweepStats,
}

impl<'a> LineSweeper<'a> {
    pub fn new(
        obstacles: &'a Obstacles,
        direction: Point,
        cone_angle: f64,
        ports: &[Point],
        border: Option<&[Point]>,
    ) -> Self {
        LineSweeper {
            obstacles,
            frame: SweepFrame::new(direction),
            cone_left_dir: direction.rotate(cone_angle / 2.0),
            cone_right_dir: direction.rotate(-cone_angle / 2.0),
            pos: SweepPosition::default(),
            queue: EventQueue::default(),
            cones: Cones::default(),
            left_sides: ActiveOrder::new(),
            right_sides: ActiveOrder::new(),
            obstacle_sides: ObstacleSides::default(),
            ports: ports.iter().map(|&p| PointKey::from(p)).collect(),
            port_list: ports.to_vec(),
            border: border.map(<[Point]>::to_vec),
            graph: VisibilityGraph::new(),
            port_graph: VisibilityGraph::new(),
            stats: SweepStats::default(),
        }
    }

    /// Sweeps in one direction, returning the edges found.
    pub fn sweep(
        obstacles: &'a Obstacles,
        direction: Point,
        cone_angle: f64,
        ports: &[Point],
        border: Option<&[Point]>,
    ) -> (VisibilityGraph, SweepStats) {
        let mut sweeper = LineSweeper::new(obstacles, direction, cone_angle, ports, border);
        sweeper.run();
        (sweeper.graph, sweeper.stats)
    }

    fn run(&mut self) {
        self.init_queue();
        while let Some(ev) = self.queue.pop() {
            self.stats.events += 1;
            self.process_event(ev);
        }
        if self.border.is_some() {
            self.close_remaining_cones();
        }
        self.graph.extend_from(&self.port_graph);
        self.stats.cones = self.cones.len();
        self.stats.repaired_lookups += self.obstacle_sides.repaired;
        debug!(
            "sweep {:?}: {} events, {} cones, {} edges, {} repaired lookups, {} missed",
            self.frame.direction,
            self.stats.events,
            self.stats.cones,
            self.graph.edge_count(),
            self.stats.repaired_lookups,
            self.stats.missed_lookups,
        );
    }

    fn z(&self, p: Point) -> f64 {
        self.frame.z(p)
    }

    fn point(&self, v: VertIdx) -> Point {
        self.obstacles.point(v)
    }

    fn enqueue(&mut self, site: Point, kind: EventKind) {
        self.queue.push(SweepEvent::new(&self.frame, site, kind));
    }

    fn enqueue_right_vertex(&mut self, v: VertIdx) {
        let site = self.point(v);
        let prev = self.point(self.obstacles.prev(v));
        // Otherwise the vertex is enqueued twice, once as a left vertex and
        // once as a right vertex.
        if self.frame.direction.dot(site - prev) > TOLERANCE {
            return;
        }
        self.enqueue(site, EventKind::RightVertex(v));
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
        for p in std::mem::take(&mut self.port_list) {
            self.enqueue(p, EventKind::Port);
        }
    }

    fn process_event(&mut self, ev: Event) {
        trace!("{:?} at {:?}", ev.kind, ev.site);
        match ev.kind {
            EventKind::LowestVertex(v) | EventKind::LeftVertex(v) | EventKind::RightVertex(v) => {
                self.pos.set(self.z(ev.site));
                self.go_over_cones_seeing(ev.site);
                match ev.kind {
                    EventKind::LeftVertex(_) => {
                        self.close_cones_add_cone_at_left_vertex(v, self.obstacles.next(v))
                    }
                    EventKind::RightVertex(_) => {
                        self.close_cones_add_cone_at_right_vertex(v, self.obstacles.prev(v))
                    }
                    _ => {
                        self.close_cones_add_cone_at_left_vertex(v, self.obstacles.next(v));
                        self.close_cones_add_cone_at_right_vertex(v, self.obstacles.prev(v));
                    }
                }
            }
            EventKind::LeftIntersection { side, end_vertex } => {
                self.process_left_intersection(ev.site, side, end_vertex)
            }
            EventKind::RightIntersection { side, end_vertex } => {
                self.process_right_intersection(ev.site, side, end_vertex)
            }
            EventKind::ConeClosure(c) => {
                if !self.cones.cone(c).removed {
                    self.remove_cone(c);
                }
                self.pos.set(self.z(ev.site));
            }
            EventKind::Port => {
                self.pos.set(self.z(ev.site));
                self.go_over_cones_seeing(ev.site);
                self.create_cone_on_vertex(ev.site);
            }
        }
    }

    fn side_order(&self, z: f64) -> ConeSideOrder<'_> {
        ConeSideOrder {
            frame: self.frame,
            z,
            cones: &self.cones,
        }
    }

    fn tree(&self, tree: Tree) -> &ActiveOrder<SideIdx> {
        match tree {
            Tree::Left => &self.left_sides,
            Tree::Right => &self.right_sides,
        }
    }

    fn insert_side(&mut self, tree: Tree, side: SideIdx) -> usize {
        let ctx = ConeSideOrder {
            frame: self.frame,
            z: self.pos.z,
            cones: &self.cones,
        };
        match tree {
            Tree::Left => self.left_sides.insert(&ctx, side),
            Tree::Right => self.right_sides.insert(&ctx, side),
        }
    }

    /// Finds `side` in one of the cone side trees. If the ordered search
    /// misses, it is retried with the sweep line at `rewound_z`, where the
    /// order was still correct.
    fn locate_side(&mut self, tree: Tree, side: SideIdx, rewound_z: f64) -> Option<usize> {
        let ctx = self.side_order(self.pos.z);
        let found = self
            .tree(tree)
            .locate(&ctx, || self.side_order(rewound_z), side);
        match found {
            Some(Located::Exact(i)) => Some(i),
            Some(repaired) => {
                debug!("cone side {side:?} found by {repaired:?}");
                self.stats.repaired_lookups += 1;
                Some(repaired.index())
            }
            None => {
                warn!("cone side {side:?} is not in the {tree:?} tree");
                self.stats.missed_lookups += 1;
                None
            }
        }
    }

    fn remove_side(&mut self, tree: Tree, side: SideIdx) {
        if self.cones.side(side).removed {
            return;
        }
        self.cones.side_mut(side).removed = true;
        let rewound_z = self
            .z(self.cones.side(side).start)
            .max(self.pos.z - 0.01);
        if let Some(i) = self.locate_side(tree, side, rewound_z) {
            match tree {
                Tree::Left => self.left_sides.remove_at(i),
                Tree::Right => self.right_sides.remove_at(i),
            };
        }
    }

    fn remove_cone(&mut self, c: ConeIdx) {
        let cone = *self.cones.cone(c);
        self.cones.cone_mut(c).removed = true;
        self.remove_side(Tree::Left, cone.left);
        self.remove_side(Tree::Right, cone.right);
    }

    fn insert_left_obstacle_side(&mut self, v: VertIdx) {
        let side = ObstacleSide::left(self.obstacles, v);
        self.obstacle_sides.insert_left(&self.frame, self.pos.z, side);
    }

    fn insert_right_obstacle_side(&mut self, v: VertIdx) {
        let side = ObstacleSide::right(self.obstacles, v);
        self.obstacle_sides.insert_right(&self.frame, self.pos.z, side);
    }

    fn remove_left_obstacle_side(&mut self, v: VertIdx) {
        let side = ObstacleSide::left(self.obstacles, v);
        self.obstacle_sides.remove_left(&self.frame, self.pos.z, side);
    }

    fn remove_right_obstacle_side(&mut self, v: VertIdx) {
        let side = ObstacleSide::right(self.obstacles, v);
        self.obstacle_sides.remove_right(&self.frame, self.pos.z, side);
    }

    fn close_cones_add_cone_at_left_vertex(&mut self, v: VertIdx, next_v: VertIdx) {
        let site = self.point(v);
        let prev_v = self.obstacles.prev(v);
        let prev_site = self.point(prev_v);
        if close(self.z(prev_site), self.pos.z) && (prev_site - site).dot(self.frame.perp) > 0.0 {
            self.remove_cones_closed_by_segment(site, prev_site);
        }

        let cone_lp = site + self.cone_left_dir;
        let cone_rp = site + self.cone_right_dir;
        let next_site = self.point(next_v);

        if (site - prev_site).dot(self.frame.direction) > DISTANCE_EPSILON {
            self.remove_left_obstacle_side(prev_v);
        }

        let next_del_z = self.z(next_site) - self.pos.z;
        if next_del_z < -DISTANCE_EPSILON {
            self.remove_right_obstacle_side(next_v);
        }

        if next_del_z < -DISTANCE_EPSILON
            || (close(next_del_z, 0.0) && (next_site - site).dot(self.frame.perp) > 0.0)
        {
            // This is the last left vertex of the obstacle.
            self.create_cone_on_vertex(site);
        } else if !left_of_line_or_on(next_site, site, cone_rp) {
            self.create_cone_on_vertex(site);
            self.enqueue(next_site, EventKind::LeftVertex(next_v));
        } else if !left_of_line_or_on(next_site, site, cone_lp) {
            // The obstacle side is inside the cone: it replaces the cone's right side.
            self.enqueue(next_site, EventKind::LeftVertex(next_v));
            let c = self.cones.add(site, self.cone_left_dir, self.cone_right_dir);
            let original = self.cones.cone(c).right;
            let right = self.cones.add_broken(site, next_v, next_site, original);
            self.cones.cone_mut(c).right = right;
            let left = self.cones.cone(c).left;
            let li = self.insert_side(Tree::Left, left);
            self.look_for_intersection_with_cone_left_side(li);
            let ri = self.insert_side(Tree::Right, right);
            self.fix_cone_right_side_intersections(right, ri);
            if (next_site - site).dot(self.frame.direction) > DISTANCE_EPSILON {
                self.insert_left_obstacle_side(v);
            }
        } else {
            self.enqueue(next_site, EventKind::LeftVertex(next_v));
            if (next_site - site).dot(self.frame.direction) > DISTANCE_EPSILON {
                self.look_for_intersection_of_obstacle_side_and_right_cone_side(site, next_v);
                self.insert_left_obstacle_side(v);
            }
        }
    }

    fn close_cones_add_cone_at_right_vertex(&mut self, v: VertIdx, next_v: VertIdx) {
        let site = self.point(v);
        let prev_v = self.obstacles.next(v);
        let prev_site = self.point(prev_v);
        if close(self.z(prev_site), self.pos.z) {
            self.remove_cones_closed_by_segment(prev_site, site);
        }

        let cone_lp = site + self.cone_left_dir;
        let cone_rp = site + self.cone_right_dir;
        let next_site = self.point(next_v);

        if (site - prev_site).dot(self.frame.direction) > DISTANCE_EPSILON {
            self.remove_right_obstacle_side(prev_v);
        }
        if (site - next_site).dot(self.frame.direction) > DISTANCE_EPSILON {
            self.remove_left_obstacle_side(next_v);
        }

        if self.z(next_site) + DISTANCE_EPSILON < self.z(site) {
            self.create_cone_on_vertex(site);
        }
        if !right_of_line_or_on(next_site, site, cone_lp) {
            self.create_cone_on_vertex(site);
            if left_of_line_or_on(next_site + self.frame.perp, next_site, site) {
                self.enqueue_right_vertex(next_v);
            }
        } else if left_of_line_or_on(next_site, site, cone_rp) {
            self.obstacle_side_inside_cone_on_the_right(v, next_v);
        } else {
            if (next_site - site).dot(self.frame.direction) > DISTANCE_EPSILON {
                self.look_for_intersection_of_obstacle_side_and_left_cone_side(site, next_v);
                self.insert_right_obstacle_side(v);
            }
            self.enqueue_right_vertex(next_v);
        }
    }

    // The obstacle side from `v` to `next_v` is inside the cone at `v`: it
    // replaces the cone's left side.
    fn obstacle_side_inside_cone_on_the_right(&mut self, v: VertIdx, next_v: VertIdx) {
        self.enqueue_right_vertex(next_v);
        let site = self.point(v);
        let next_site = self.point(next_v);
        let c = self.cones.add(site, self.cone_left_dir, self.cone_right_dir);
        let original = self.cones.cone(c).left;
        let left = self.cones.add_broken(site, next_v, next_site, original);
        self.cones.cone_mut(c).left = left;
        let right = self.cones.cone(c).right;
        let ri = self.insert_side(Tree::Right, right);
        self.look_for_intersection_with_cone_right_side(ri);
        let li = self.insert_side(Tree::Left, left);
        self.fix_cone_left_side_intersections(left, li);
        if (next_site - site).dot(self.frame.direction) > DISTANCE_EPSILON {
            self.insert_right_obstacle_side(v);
        }
    }

    fn look_for_intersection_of_obstacle_side_and_right_cone_side(
        &mut self,
        start: Point,
        vertex: VertIdx,
    ) {
        let idx = self.right_sides.find_last(|&s| {
            let s = self.cones.side(s);
            orientation(s.start, s.ahead(), start) == TriangleOrientation::Clockwise
        });
        let Some(side) = idx.and_then(|i| self.right_sides.get(i)) else {
            return;
        };
        let s = *self.cones.side(side);
        if !s.is_pure_right() {
            return;
        }
        let end = self.point(vertex);
        if let Some(x) = interval_intersects_ray(start, end, s.start, self.cone_right_dir) {
            if self.frame.is_not_horizontal(x, end) {
                self.enqueue(
                    x,
                    EventKind::RightIntersection {
                        side,
                        end_vertex: vertex,
                    },
                );
            }
        }
    }

    fn look_for_intersection_of_obstacle_side_and_left_cone_side(
        &mut self,
        start: Point,
        vertex: VertIdx,
    ) {
        let idx = self.left_sides.find_first(|&s| {
            let s = self.cones.side(s);
            orientation(s.start, s.ahead(), start) == TriangleOrientation::Counterclockwise
        });
        let Some(side) = idx.and_then(|i| self.left_sides.get(i)) else {
            return;
        };
        let s = *self.cones.side(side);
        if !s.is_pure_left() {
            return;
        }
        let end = self.point(vertex);
        if let Some(x) = interval_intersects_ray(start, end, s.start, self.cone_left_dir) {
            self.enqueue(
                x,
                EventKind::LeftIntersection {
                    side,
                    end_vertex: vertex,
                },
            );
        }
    }

    fn broken_parts(&self, side: SideIdx) -> Option<(Point, Point, VertIdx)> {
        let s = self.cones.side(side);
        match s.kind {
            ConeSideKind::Broken {
                end, end_vertex, ..
            } => Some((s.start, end, end_vertex)),
            _ => None,
        }
    }

    // The first intersection of a new broken left side can only be with its successors.
    fn fix_cone_left_side_intersections(&mut self, broken: SideIdx, mut idx: usize) {
        let Some((start, end, end_vertex)) = self.broken_parts(broken) else {
            return;
        };
        idx += 1;
        while let Some(s) = self.left_sides.get(idx) {
            let s = self.cones.side(s);
            if !right_of_line_or_on(start, s.start, s.ahead()) {
                break;
            }
            idx += 1;
        }
        let Some(side) = self.left_sides.get(idx) else {
            return;
        };
        let s = *self.cones.side(side);
        if s.is_pure_left() {
            if let Some(x) = interval_intersects_ray(start, end, s.start, s.direction) {
                self.enqueue(x, EventKind::LeftIntersection { side, end_vertex });
            }
        }
    }

    // The first intersection of a new broken right side can only be with its predecessors.
    fn fix_cone_right_side_intersections(&mut self, broken: SideIdx, mut idx: usize) {
        let Some((start, end, end_vertex)) = self.broken_parts(broken) else {
            return;
        };
        let side = loop {
            if idx == 0 {
                return;
            }
            idx -= 1;
            let Some(s) = self.right_sides.get(idx) else {
                return;
            };
            let side = self.cones.side(s);
            if !left_of_line_or_on(start, side.start, side.ahead()) {
                break s;
            }
        };
        let s = *self.cones.side(side);
        if s.is_pure_right() {
            if let Some(x) = interval_intersects_ray(start, end, s.start, s.direction) {
                self.enqueue(x, EventKind::RightIntersection { side, end_vertex });
            }
        }
    }

    fn create_cone_on_vertex(&mut self, site: Point) {
        let c = self.cones.add(site, self.cone_left_dir, self.cone_right_dir);
        let cone = *self.cones.cone(c);
        let li = self.insert_side(Tree::Left, cone.left);
        let ri = self.insert_side(Tree::Right, cone.right);
        self.look_for_intersection_with_cone_right_side(ri);
        self.look_for_intersection_with_cone_left_side(li);
    }

    fn look_for_intersection_with_cone_left_side(&mut self, idx: usize) {
        let Some(side) = self.left_sides.get(idx) else {
            return;
        };
        let s = *self.cones.side(side);
        match s.kind {
            ConeSideKind::Broken {
                end, end_vertex, ..
            } => {
                let Some(next) = self.left_sides.get(idx + 1) else {
                    return;
                };
                let n = *self.cones.side(next);
                if n.is_pure_left() {
                    if let Some(x) = interval_intersects_ray(s.start, end, n.start, n.direction) {
                        self.enqueue(
                            x,
                            EventKind::LeftIntersection {
                                side: next,
                                end_vertex,
                            },
                        );
                    }
                }
            }
            _ => {
                if let Some(obs) = self.obstacle_sides.first_side_left_of(s.start) {
                    if let Some(x) = interval_intersects_ray(obs.start, obs.end, s.start, s.direction)
                    {
                        self.enqueue(
                            x,
                            EventKind::LeftIntersection {
                                side,
                                end_vertex: obs.end_vertex,
                            },
                        );
                    }
                }
            }
        }
    }

    fn look_for_intersection_with_cone_right_side(&mut self, idx: usize) {
        let Some(side) = self.right_sides.get(idx) else {
            return;
        };
        let s = *self.cones.side(side);
        match s.kind {
            ConeSideKind::Broken {
                end, end_vertex, ..
            } => {
                let Some(prev) = idx.checked_sub(1).and_then(|i| self.right_sides.get(i)) else {
                    return;
                };
                let p = *self.cones.side(prev);
                if p.is_pure_right() {
                    if let Some(x) = interval_intersects_ray(s.start, end, p.start, p.direction) {
                        self.enqueue(
                            x,
                            EventKind::RightIntersection {
                                side: prev,
                                end_vertex,
                            },
                        );
                    }
                }
            }
            _ => {
                if let Some(obs) = self.obstacle_sides.first_side_right_of(s.start) {
                    if let Some(x) = interval_intersects_ray(obs.start, obs.end, s.start, s.direction)
                    {
                        self.enqueue(
                            x,
                            EventKind::RightIntersection {
                                side,
                                end_vertex: obs.end_vertex,
                            },
                        );
                    }
                }
            }
        }
    }

    fn process_left_intersection(&mut self, site: Point, side: SideIdx, end_vertex: VertIdx) {
        let s = *self.cones.side(side);
        if s.removed {
            self.pos.set(self.z(site));
            return;
        }
        let end = self.point(end_vertex);
        if (end - site).dot(self.frame.direction).abs() < DISTANCE_EPSILON {
            // The cone is covered by a horizontal obstacle side.
            self.remove_cone(s.cone);
            return;
        }
        self.remove_side(Tree::Left, side);
        self.pos.set(self.z(site));
        let broken = self.cones.add_broken(site, end_vertex, end, side);
        self.insert_side(Tree::Left, broken);
        self.cones.cone_mut(s.cone).left = broken;
        self.look_for_intersection_of_obstacle_side_and_left_cone_side(site, end_vertex);

        let right = *self.cones.side(self.cones.cone(s.cone).right);
        if right.is_pure_right()
            && orientation(right.start, right.ahead(), end) == TriangleOrientation::Clockwise
        {
            self.create_cone_closure_event(broken, right.start, right.direction);
        }
    }

    fn process_right_intersection(&mut self, site: Point, side: SideIdx, end_vertex: VertIdx) {
        let s = *self.cones.side(side);
        if s.removed {
            self.pos.set(self.z(site));
            return;
        }
        let end = self.point(end_vertex);
        self.remove_side(Tree::Right, side);
        self.pos.set(self.z(site));
        let broken = self.cones.add_broken(site, end_vertex, end, side);
        self.insert_side(Tree::Right, broken);
        self.cones.cone_mut(s.cone).right = broken;
        self.look_for_intersection_of_obstacle_side_and_right_cone_side(site, end_vertex);

        let left = *self.cones.side(self.cones.cone(s.cone).left);
        if left.is_pure_left()
            && orientation(left.start, left.ahead(), end) == TriangleOrientation::Counterclockwise
        {
            self.create_cone_closure_event(broken, left.start, left.direction);
        }
    }

    fn create_cone_closure_event(&mut self, broken: SideIdx, other_start: Point, other_dir: Point) {
        let b = *self.cones.side(broken);
        match ray_intersects_ray_interiors(b.start, b.direction, other_start, other_dir) {
            Some(x) => self.enqueue(x, EventKind::ConeClosure(b.cone)),
            None => debug!("cone {:?} has sides that don't meet", b.cone),
        }
    }

    fn remove_cones_closed_by_segment(&mut self, left_point: Point, right_point: Point) {
        let tree = if self.z(left_point) > self.z(right_point) {
            Tree::Left
        } else {
            Tree::Right
        };
        let sides = self.tree(tree);
        let Some(mut idx) = sides.find_first(|&s| {
            let s = self.cones.side(s);
            orientation(s.start, s.ahead(), left_point) == TriangleOrientation::Counterclockwise
        }) else {
            return;
        };

        let mut to_remove = Vec::new();
        while let Some(s) = sides.get(idx) {
            let side = self.cones.side(s);
            if interval_intersects_ray(left_point, right_point, side.start, side.direction).is_none()
            {
                break;
            }
            to_remove.push(side.cone);
            idx += 1;
        }
        for c in to_remove {
            if !self.cones.cone(c).removed {
                self.remove_cone(c);
            }
        }
    }

    fn go_over_cones_seeing(&mut self, site: Point) {
        let Some(idx) = self.right_sides.find_first(|&s| {
            let s = self.cones.side(s);
            orientation(s.start, s.ahead(), site) != TriangleOrientation::Clockwise
        }) else {
            return;
        };
        let Some(right) = self.right_sides.get(idx) else {
            return;
        };
        let c = self.cones.side(right).cone;
        let left = self.cones.cone(c).left;
        if self.is_left_of_side(site, left) {
            return;
        }

        let rewound_z = self
            .z(self.cones.side(left).start)
            .max(self.pos.previous_z);
        let Some(mut idx) = self.locate_side(Tree::Left, left, rewound_z) else {
            return;
        };
        let mut visible = vec![c];
        idx += 1;
        while let Some(s) = self.left_sides.get(idx) {
            if self.is_left_of_side(site, s) {
                break;
            }
            visible.push(self.cones.side(s).cone);
            idx += 1;
        }

        for c in visible {
            self.add_edge_and_remove_cone(c, site);
        }
    }

    fn is_left_of_side(&self, p: Point, side: SideIdx) -> bool {
        let s = self.cones.side(side);
        orientation(s.start, s.ahead(), p) == TriangleOrientation::Counterclockwise
    }

    fn add_edge_and_remove_cone(&mut self, c: ConeIdx, p: Point) {
        let apex = self.cones.cone(c).apex;
        if self.ports.contains(&PointKey::from(apex)) {
            self.create_port_edge(apex, p);
        } else {
            self.graph.add_edge(apex, p);
        }
        self.remove_cone(c);
    }

    // A port keeps at most one edge per removal chain: everything that was
    // attached to it gets redirected to `p`.
    fn create_port_edge(&mut self, apex: Point, p: Point) {
        if let Some(v) = self.port_graph.find_vertex(apex) {
            let to_fix: Vec<_> = self.port_graph.incident_edges(v).collect();
            for e in to_fix {
                let edge = self.port_graph.edge(e);
                let other = if edge.target == v {
                    edge.source
                } else {
                    edge.target
                };
                let other = self.port_graph.point(other);
                self.port_graph.remove_edge(e);
                self.port_graph.add_edge(other, p);
            }
        }
        self.port_graph.add_edge(apex, p);
    }

    fn close_remaining_cones(&mut self) {
        if self.left_sides.is_empty() {
            return;
        }
        debug_assert_eq!(self.left_sides.len(), self.right_sides.len());
        let mut p = 0;
        // Each step removes at least one cone.
        let mut steps = self.left_sides.len();
        loop {
            let Some(first) = self.left_sides.first() else {
                break;
            };
            let c = self.cones.side(first).cone;
            match self.find_border_side_crossing_cone_right_side(p, c) {
                Some(q) => p = q,
                None => {
                    warn!("cone {c:?} never leaves the border");
                    break;
                }
            }
            p = self.border_point_inside_cone_and_remove_cones(p, c);
            steps -= 1;
            if self.left_sides.is_empty() || steps == 0 {
                break;
            }
        }
    }

    fn border(&self) -> &[Point] {
        self.border.as_deref().unwrap_or(&[])
    }

    fn find_border_side_crossing_cone_right_side(&self, start: usize, c: ConeIdx) -> Option<usize> {
        let border = self.border();
        let n = border.len();
        if n == 0 {
            return None;
        }
        let a = self.cones.cone(c).apex;
        let b = a + self.cone_right_dir;
        let sign = |q: Point| {
            let d = signed_area(a, b, q);
            if d < 0.0 {
                1
            } else if d > 0.0 {
                -1
            } else {
                0
            }
        };
        let mut p = start % n;
        let mut p_sign = sign(border[p]);
        loop {
            let pn = (p + 1) % n;
            let pn_sign = sign(border[pn]);
            if pn_sign - p_sign > 0 {
                return Some(p);
            }
            p = pn;
            p_sign = pn_sign;
            if p == start % n {
                return None;
            }
        }
    }

    fn border_point_inside_cone_and_remove_cones(&mut self, p: usize, c: ConeIdx) -> usize {
        let Some(border) = self.border.as_mut() else {
            return p;
        };
        let n = border.len();
        let pn = (p + 1) % n;
        let (bp, bpn) = (border[p], border[pn]);
        let cone = *self.cones.cone(c);
        let inside = find_inside_point(
            bp,
            bpn,
            cone.apex,
            cone.apex + self.cone_left_dir,
            cone.apex + self.cone_right_dir,
        );

        let (ret, q) = if inside.close_to(bp) {
            // We don't move forward here: the next round crosses [p, pn] with
            // the new leftmost cone.
            (p, bp)
        } else if inside.close_to(bpn) {
            (pn, bpn)
        } else {
            border.insert(p + 1, inside);
            (p + 1, inside)
        };
        self.add_edge_and_remove_cone(c, q);
        self.add_edges_and_remove_remaining_cones_by_point(q);
        ret
    }

    fn add_edges_and_remove_remaining_cones_by_point(&mut self, point: Point) {
        let to_remove: Vec<_> = self
            .left_sides
            .iter()
            .map(|s| self.cones.side(s))
            .take_while(|s| right_of_line_or_on(point, s.start, s.ahead()))
            .map(|s| s.cone)
            .collect();
        for c in to_remove {
            self.add_edge_and_remove_cone(c, point);
        }
    }
}

// Bisects the segment `left -- right` for a point inside the cone.
fn find_inside_point(
    mut left: Point,
    mut right: Point,
    apex: Point,
    left_side_point: Point,
    right_side_point: Point,
) -> Point {
    for _ in 0..64 {
        if left.close_to(right) {
            return left;
        }
        if inside_cone(left, apex, left_side_point, right_side_point) {
            return left;
        }
        if inside_cone(right, apex, left_side_point, right_side_point) {
            return right;
        }
        let m = left.mid(right);
        if left_of_line(m, apex, left_side_point) {
            left = m;
        } else {
            right = m;
        }
    }
    left.mid(right)
}

/// Builds a visibility graph by sweeping cones in every direction.
pub struct ConeSpanner<'a> {
    obstacles: &'a Obstacles,
    ports: Vec<Point>,
    cone_angle: f64,
    border_padding: f64,
    border: Option<Vec<Point>>,
}

impl<'a> ConeSpanner<'a> {
    pub fn new(obstacles: &'a Obstacles, settings: &RoutingSettings) -> Self {
        ConeSpanner {
            obstacles,
            ports: Vec::new(),
            cone_angle: settings.cone_angle_radians(),
            border_padding: settings.border_padding,
            border: None,
        }
    }

    pub fn with_ports(mut self, ports: impl IntoIterator<Item = Point>) -> Self {
        self.ports.extend(ports);
        self
    }

    /// Closes cones against a clockwise border ring instead of leaving them open.
    ///
    /// Without an explicit ring, a positive `border_padding` in the settings
    /// puts a border around the obstacles and the ports.
    pub fn with_border(mut self, ring: Vec<Point>) -> Self {
        self.border = Some(ring);
        self
    }

    fn border(&self) -> Option<Vec<Point>> {
        if let Some(ring) = &self.border {
            return Some(ring.clone());
        }
        if self.border_padding <= 0.0 {
            return None;
        }
        let mut bbox = self.obstacles.bounding_box();
        for &p in &self.ports {
            bbox.add(p);
        }
        (!bbox.is_empty()).then(|| bbox.padded(self.border_padding).corners().to_vec())
    }

    pub fn build(&self) -> VisibilityGraph {
        let n = (std::f64::consts::TAU / self.cone_angle).ceil().max(1.0) as usize;
        let step = std::f64::consts::TAU / n as f64;
        let border = self.border();
        let mut graph = VisibilityGraph::new();
        let mut total = SweepStats::default();
        for i in 0..n {
            let direction = Point::new(0.0, 1.0).rotate(i as f64 * step);
            let (g, stats) = LineSweeper::sweep(
                self.obstacles,
                direction,
                self.cone_angle,
                &self.ports,
                border.as_deref(),
            );
            graph.extend_from(&g);
            total.events += stats.events;
            total.cones += stats.cones;
            total.repaired_lookups += stats.repaired_lookups;
            total.missed_lookups += stats.missed_lookups;
        }
        debug!(
            "cone spanner: {} directions, {} vertices, {} edges, {:?}",
            n,
            graph.vertex_count(),
            graph.edge_count(),
            total
        );
        graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::Rect;

    fn p(x: f64, y: f64) -> Point {
        Point::new(x, y)
    }

    fn has_edge(g: &VisibilityGraph, a: Point, b: Point) -> bool {
        match (g.find_vertex(a), g.find_vertex(b)) {
            (Some(a), Some(b)) => g.find_edge(a, b).is_some(),
            _ => false,
        }
    }

    #[test]
    fn two_ports_see_each_other() {
        let obs = Obstacles::new();
        let angle = 30f64.to_radians();
        let (g, stats) =
            LineSweeper::sweep(&obs, p(0.0, 1.0), angle, &[p(0.0, 0.0), p(0.0, 5.0)], None);
        assert!(has_edge(&g, p(0.0, 0.0), p(0.0, 5.0)));
        assert_eq!(g.edge_count(), 1);
        assert_eq!(stats.missed_lookups, 0);
    }

    #[test]
    fn ports_outside_the_cone_dont_connect() {
        let obs = Obstacles::new();
        let angle = 30f64.to_radians();
        let (g, _) =
            LineSweeper::sweep(&obs, p(0.0, 1.0), angle, &[p(0.0, 0.0), p(5.0, 1.0)], None);
        assert_eq!(g.edge_count(), 0);
    }

    #[test]
    fn obstacle_blocks_the_view() {
        let obs = Obstacles::from_rings([vec![
            p(-2.0, 2.0),
            p(-2.0, 3.0),
            p(2.0, 3.0),
            p(2.0, 2.0),
        ]])
        .unwrap();
        let angle = 30f64.to_radians();
        let (g, stats) =
            LineSweeper::sweep(&obs, p(0.0, 1.0), angle, &[p(0.0, 0.0), p(0.0, 5.0)], None);
        assert!(!has_edge(&g, p(0.0, 0.0), p(0.0, 5.0)));
        assert_eq!(stats.missed_lookups, 0);
    }

    #[test]
    fn border_closes_open_cones() {
        let obs = Obstacles::new();
        let angle = 30f64.to_radians();
        let border = Rect::from_corners(p(-10.0, -10.0), p(10.0, 10.0)).corners();
        let (g, _) = LineSweeper::sweep(&obs, p(0.0, 1.0), angle, &[p(0.0, 0.0)], Some(&border[..]));
        // The port's cone ends on the top side of the border.
        let v = g.find_vertex(p(0.0, 0.0)).unwrap();
        assert_eq!(g.degree(v), 1);
        let e = g.incident_edges(v).next().unwrap();
        let other = if g.edge(e).source == v {
            g.target_point(e)
        } else {
            g.source_point(e)
        };
        assert!((other.y - 10.0).abs() < 1e-6);
    }

    #[test]
    fn find_inside_point_bisects() {
        let apex = p(0.0, 0.0);
        let l = p(-1.0, 1.0);
        let r = p(1.0, 1.0);
        let x = find_inside_point(p(-10.0, 5.0), p(-5.0, 5.0), apex, l, r);
        assert!(inside_cone(x, apex, l, r) || x.close_to(p(-5.0, 5.0)));
        assert!((x.x + 5.0).abs() < 1e-3);
    }
}
