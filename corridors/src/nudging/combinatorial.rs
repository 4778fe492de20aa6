//! Ordering paths along the edges they share.
//!
//! All paths are laid over one graph of axis edges. Where several paths run
//! along the same axis edge, we decide which one goes to the left of which by
//! following them (forwards, and then backwards) until they split, and
//! comparing the directions they split off in. Edges are ordered in
//! topological order, so that where two paths run along several edges in a
//! row, the order found on the first edge is reused on the others.

use std::{cmp::Ordering, collections::VecDeque};

use log::trace;

use super::{axis_edge::AxisEdge, segment::SegIdx};
use crate::{
    error::{Error, Result},
    geom::{Compass, Direction, Point},
    visibility::{EdgeIdx, VertexIdx, VisibilityGraph},
};

#[derive(Clone, Copy, PartialOrd, Ord, PartialEq, Eq, Hash)]
pub(crate) struct PathEdgeIdx(pub usize);

impl std::fmt::Debug for PathEdgeIdx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "pe_{}", self.0)
    }
}

/// One step of a path, lying on an axis edge.
#[derive(Clone, Debug)]
pub(crate) struct PathEdge {
    pub axis: EdgeIdx,
    /// True if the path runs against the direction of its axis edge.
    pub reversed: bool,
    pub width: f64,
    pub prev: Option<PathEdgeIdx>,
    pub next: Option<PathEdgeIdx>,
    /// The position of this edge among the path edges sharing its axis edge,
    /// counted from the left.
    pub index: Option<usize>,
    pub segment: Option<SegIdx>,
}

#[derive(Clone, Debug, Default)]
pub(crate) struct PathGraph {
    pub graph: VisibilityGraph<AxisEdge>,
    edges: Vec<PathEdge>,
    /// The first and last edge of every path, unless the path is a single point.
    ends: Vec<Option<(PathEdgeIdx, PathEdgeIdx)>>,
    /// For every axis edge, the path edges along it from left to right.
    orders: Vec<Vec<PathEdgeIdx>>,
}

impl PathGraph {
    /// Lays the paths over a graph of axis edges, and orders them.
    pub fn new(paths: &[Vec<Point>], widths: &[f64]) -> Result<Self> {
        let mut ret = PathGraph::default();
        for (path, points) in paths.iter().enumerate() {
            let width = widths.get(path).copied().unwrap_or(0.0);
            ret.add_path(points, width)?;
        }
        ret.orders = vec![Vec::new(); ret.graph.edges().count()];
        for (i, e) in ret.edges.iter().enumerate() {
            ret.orders[e.axis.0].push(PathEdgeIdx(i));
        }
        ret.order_paths();
        Ok(ret)
    }

    fn add_path(&mut self, points: &[Point], width: f64) -> Result<()> {
        let mut ends: Option<(PathEdgeIdx, PathEdgeIdx)> = None;
        let Some(&first) = points.first() else {
            self.ends.push(None);
            return Ok(());
        };
        let mut p0 = first;
        for &p1 in &points[1..] {
            let compass = Compass::between(p0, p1);
            if compass == Compass::NONE {
                continue;
            }
            let (from, to, dir, reversed) = match compass.pure() {
                Some(d) if d.is_canonical() => (p0, p1, d, false),
                Some(d) => (p1, p0, d.opposite(), true),
                None => return Err(Error::NotRectilinear { from: p0, to: p1 }),
            };
            let Some(axis) = self
                .graph
                .add_edge_with(from, to, |_, _| AxisEdge::new(dir))
            else {
                continue;
            };

            let idx = PathEdgeIdx(self.edges.len());
            let prev = ends.map(|(_, last)| last);
            self.edges.push(PathEdge {
                axis,
                reversed,
                width,
                prev,
                next: None,
                index: None,
                segment: None,
            });
            if let Some(prev) = prev {
                self.edges[prev.0].next = Some(idx);
            }
            ends = Some((ends.map_or(idx, |(first, _)| first), idx));
            p0 = p1;
        }
        self.ends.push(ends);
        Ok(())
    }

    pub fn edge(&self, e: PathEdgeIdx) -> &PathEdge {
        &self.edges[e.0]
    }

    pub fn edge_mut(&mut self, e: PathEdgeIdx) -> &mut PathEdge {
        &mut self.edges[e.0]
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn axis_edge(&self, e: PathEdgeIdx) -> &AxisEdge {
        &self.graph.edge(self.edges[e.0].axis).data
    }

    pub fn axis_edge_mut(&mut self, e: PathEdgeIdx) -> &mut AxisEdge {
        let axis = self.edges[e.0].axis;
        &mut self.graph.edge_mut(axis).data
    }

    /// The direction of the path along this edge.
    pub fn direction(&self, e: PathEdgeIdx) -> Direction {
        let d = self.axis_edge(e).direction;
        if self.edges[e.0].reversed {
            d.opposite()
        } else {
            d
        }
    }

    pub fn source_point(&self, e: PathEdgeIdx) -> Point {
        let edge = &self.edges[e.0];
        if edge.reversed {
            self.graph.target_point(edge.axis)
        } else {
            self.graph.source_point(edge.axis)
        }
    }

    pub fn target_point(&self, e: PathEdgeIdx) -> Point {
        let edge = &self.edges[e.0];
        if edge.reversed {
            self.graph.source_point(edge.axis)
        } else {
            self.graph.target_point(edge.axis)
        }
    }

    pub fn path_count(&self) -> usize {
        self.ends.len()
    }

    pub fn first_edge(&self, path: usize) -> Option<PathEdgeIdx> {
        self.ends.get(path).copied().flatten().map(|(first, _)| first)
    }

    pub fn last_edge(&self, path: usize) -> Option<PathEdgeIdx> {
        self.ends.get(path).copied().flatten().map(|(_, last)| last)
    }

    pub fn path_edges(&self, path: usize) -> impl Iterator<Item = PathEdgeIdx> + '_ {
        std::iter::successors(self.first_edge(path), |&e| self.edges[e.0].next)
    }

    pub fn path_edges_rev(&self, path: usize) -> impl Iterator<Item = PathEdgeIdx> + '_ {
        std::iter::successors(self.last_edge(path), |&e| self.edges[e.0].prev)
    }

    /// The path edges along `axis`, from left to right.
    pub fn order(&self, axis: EdgeIdx) -> &[PathEdgeIdx] {
        self.orders.get(axis.0).map_or(&[], Vec::as_slice)
    }

    /// The axis edges, sources first where the graph allows it.
    ///
    /// Axis edges only point north or east, so the graph is acyclic and every
    /// edge comes out.
    pub fn edges_in_topological_order(&self) -> Vec<EdgeIdx> {
        let g = &self.graph;
        let mut in_degree: Vec<usize> = g.vertices().map(|v| g.in_edges(v).len()).collect();
        let mut queue: VecDeque<VertexIdx> =
            g.vertices().filter(|v| in_degree[v.0] == 0).collect();
        let mut ret = Vec::with_capacity(g.edge_count());
        while let Some(v) = queue.pop_front() {
            for &e in g.out_edges(v) {
                let t = g.edge(e).target;
                in_degree[t.0] -= 1;
                if in_degree[t.0] == 0 {
                    queue.push_back(t);
                }
                ret.push(e);
            }
        }
        ret
    }

    fn order_paths(&mut self) {
        for axis in self.edges_in_topological_order() {
            let mut order = std::mem::take(&mut self.orders[axis.0]);
            insertion_sort(&mut order, |&x, &y| self.compare(x, y));
            for (i, &e) in order.iter().enumerate() {
                self.edges[e.0].index = Some(i);
            }
            if order.len() > 1 {
                trace!("order on {axis:?}: {order:?}");
            }
            self.orders[axis.0] = order;
        }
    }

    /// Compares two path edges on the same axis edge: `Less` means that `x`
    /// goes to the left of `y`, looking along the axis edge.
    pub fn compare(&self, x: PathEdgeIdx, y: PathEdgeIdx) -> Ordering {
        if x == y {
            return Ordering::Equal;
        }
        let axis = self.edges[x.0].axis;
        let dir = self.graph.edge(axis).data.direction;
        match self.compare_in_direction(x, y, axis, dir) {
            Ordering::Equal => self
                .compare_in_direction(x, y, axis, dir.opposite())
                .reverse(),
            r => r,
        }
    }

    fn compare_in_direction(
        &self,
        mut x: PathEdgeIdx,
        mut y: PathEdgeIdx,
        mut axis: EdgeIdx,
        mut direction: Direction,
    ) -> Ordering {
        loop {
            let Some(next_x) = self.next_in_direction(x, axis, direction) else {
                return Ordering::Equal;
            };
            let Some(next_y) = self.next_in_direction(y, axis, direction) else {
                return Ordering::Equal;
            };
            x = next_x;
            y = next_y;
            let (x_axis, y_axis) = (self.edges[x.0].axis, self.edges[y.0].axis);

            if x_axis == y_axis {
                direction = self.continued_direction(axis, direction, x_axis);
                axis = x_axis;
                let (Some(xi), Some(yi)) = (self.edges[x.0].index, self.edges[y.0].index) else {
                    continue;
                };
                let r = xi.cmp(&yi);
                return if direction == self.graph.edge(axis).data.direction {
                    r
                } else {
                    r.reverse()
                };
            }

            // The paths fork.
            let edge = self.graph.edge(axis);
            let forward = direction == edge.data.direction;
            let fork = if forward { edge.target } else { edge.source };
            let x_other = self.graph.point(self.other_vertex(x_axis, fork));
            let y_other = self.graph.point(self.other_vertex(y_axis, fork));
            let project = |p: Point| match (edge.data.direction, forward) {
                (Direction::North, true) => p.x,
                (Direction::North, false) => -p.x,
                (_, true) => -p.y,
                (_, false) => p.y,
            };
            return project(x_other).total_cmp(&project(y_other));
        }
    }

    fn next_in_direction(
        &self,
        e: PathEdgeIdx,
        axis: EdgeIdx,
        direction: Direction,
    ) -> Option<PathEdgeIdx> {
        let edge = &self.edges[e.0];
        debug_assert_eq!(edge.axis, axis);
        let forward = self.graph.edge(axis).data.direction == direction;
        if forward != edge.reversed {
            edge.next
        } else {
            edge.prev
        }
    }

    /// Moving along `axis` in `direction`, we step onto `next`. Which way are
    /// we going on `next`?
    fn continued_direction(&self, axis: EdgeIdx, direction: Direction, next: EdgeIdx) -> Direction {
        let edge = self.graph.edge(axis);
        let next_edge = self.graph.edge(next);
        let joint = if edge.data.direction == direction {
            edge.target
        } else {
            edge.source
        };
        if next_edge.source == joint {
            next_edge.data.direction
        } else {
            next_edge.data.direction.opposite()
        }
    }

    fn other_vertex(&self, e: EdgeIdx, v: VertexIdx) -> VertexIdx {
        let edge = self.graph.edge(e);
        if edge.source == v {
            edge.target
        } else {
            edge.source
        }
    }
}

/// A stable sort that only ever compares neighbors, and so terminates even
/// for comparisons that aren't quite a total order.
fn insertion_sort<T: Copy>(xs: &mut [T], mut cmp: impl FnMut(&T, &T) -> Ordering) {
    for i in 1..xs.len() {
        let mut j = i;
        while j > 0 && cmp(&xs[j - 1], &xs[j]) == Ordering::Greater {
            xs.swap(j - 1, j);
            j -= 1;
        }
    }
}
