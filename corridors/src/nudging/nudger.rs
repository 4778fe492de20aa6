//! Spreading apart the paths that share corridors.
//!
//! A pass fixes a direction, North or East. The paths get refined and
//! ordered on the axis edges they share, and the runs of path edges parallel
//! to the direction become [`LongestSegment`]s. Each segment gets an ideal
//! position and a corridor it may move in; the uniform solver then places
//! the segments so that neighbors are at least one separation apart, and the
//! paths are rebuilt from the new positions.

use std::collections::{BTreeSet, HashMap};

use log::{debug, trace};
use rstar::{
    primitives::{GeomWithData, Rectangle},
    RTree, AABB,
};

use super::{
    combinatorial::{PathEdgeIdx, PathGraph},
    free_space::FreeSpaceFinder,
    groups::{Groups, Port},
    refine::refine_paths,
    segment::{LongestSegment, SegIdx},
    Path,
};
use crate::{
    error::Result,
    geom::{Compass, Direction, Point, Rect},
    num::{close, DISTANCE_EPSILON},
    obstacle::{ObstacleIdx, Obstacles},
    solver::UniformSolver,
    sweep::SweepFrame,
    visibility::EdgeIdx,
};

pub(crate) type ObstacleTree = RTree<GeomWithData<Rectangle<[f64; 2]>, ObstacleIdx>>;

pub(crate) fn obstacle_tree(obstacles: &Obstacles) -> ObstacleTree {
    RTree::bulk_load(
        obstacles
            .indices()
            .map(|o| {
                let b = obstacles.bbox(o);
                GeomWithData::new(Rectangle::from_corners([b.left, b.bottom], [b.right, b.top]), o)
            })
            .collect(),
    )
}

pub(crate) fn envelope(r: &Rect) -> AABB<[f64; 2]> {
    AABB::from_corners([r.left, r.bottom], [r.right, r.top])
}

/// The lowest-numbered obstacle containing `p`, boundary included.
fn obstacle_at(tree: &ObstacleTree, obstacles: &Obstacles, p: Point) -> Option<ObstacleIdx> {
    let around = Rect::from_corners(p, p).padded(DISTANCE_EPSILON);
    tree.locate_in_envelope_intersecting(&envelope(&around))
        .map(|entry| entry.data)
        .filter(|&o| obstacles.contains_point(o, p))
        .min()
}

pub(crate) struct Nudger<'a> {
    paths: &'a mut [Path],
    obstacles: &'a Obstacles,
    groups: &'a Groups,
    separation: f64,
    /// The obstacles each path starts and ends in. Paths that start or end in
    /// the open have none.
    path_obstacles: Vec<Option<(ObstacleIdx, ObstacleIdx)>>,
}

impl<'a> Nudger<'a> {
    pub fn new(
        paths: &'a mut [Path],
        obstacles: &'a Obstacles,
        groups: &'a Groups,
        separation: f64,
    ) -> Self {
        let tree = obstacle_tree(obstacles);
        let path_obstacles = paths
            .iter()
            .map(|path| {
                let start = obstacle_at(&tree, obstacles, *path.points.first()?)?;
                let end = obstacle_at(&tree, obstacles, *path.points.last()?)?;
                Some((start, end))
            })
            .collect();
        Nudger {
            paths,
            obstacles,
            groups,
            separation,
            path_obstacles,
        }
    }

    /// Runs one nudging pass, moving the path segments parallel to `direction`.
    pub fn calculate(&mut self, direction: Direction, merge: bool) -> Result<()> {
        let mut points: Vec<Vec<Point>> = self.paths.iter().map(|p| p.points.clone()).collect();
        refine_paths(&mut points, merge);
        let widths: Vec<f64> = self.paths.iter().map(|p| p.width).collect();

        let mut pass = Pass {
            direction,
            frame: SweepFrame::axis(direction),
            graph: PathGraph::new(&points, &widths)?,
            segments: Vec::new(),
        };
        let origins = pass.map_axis_edges_to_obstacles(&self.path_obstacles);
        pass.set_arrowhead_widths(&*self.paths);
        pass.create_segments();
        pass.bound_by_known_rects(&*self.paths, self.groups);
        FreeSpaceFinder::new(direction, self.obstacles, &mut pass.graph.graph, &origins)
            .find_free_space();
        pass.clamp_ideal_positions();
        let solver = pass.solve(self.separation);

        for (i, (path, refined)) in self.paths.iter_mut().zip(points).enumerate() {
            path.points = match pass.shifted_points(i, &solver) {
                Some(shifted) => remove_switchbacks_and_middle_points(&shifted),
                None => refined,
            };
        }
        debug!(
            "nudged {:?}: {} axis edges, {} path edges, {} segments",
            direction,
            pass.graph.graph.edge_count(),
            pass.graph.edge_count(),
            pass.segments.len()
        );
        Ok(())
    }
}

struct Pass {
    direction: Direction,
    frame: SweepFrame,
    graph: PathGraph,
    segments: Vec<LongestSegment>,
}

impl Pass {
    fn perp(&self, p: Point) -> f64 {
        self.frame.x(p)
    }

    /// The extent of `r` across the nudging direction.
    fn extent(&self, r: &Rect) -> (f64, f64) {
        match self.direction {
            Direction::North | Direction::South => (r.left, r.right),
            Direction::East | Direction::West => (-r.top, -r.bottom),
        }
    }

    fn path_edges(&self, path: usize) -> Vec<PathEdgeIdx> {
        self.graph.path_edges(path).collect()
    }

    fn is_parallel(&self, e: PathEdgeIdx) -> bool {
        self.graph.direction(e).parallel(self.direction)
    }

    /// Edges that leave an obstacle, or run into one, shouldn't be pushed out
    /// of it by the free space finder.
    fn map_axis_edges_to_obstacles(
        &self,
        path_obstacles: &[Option<(ObstacleIdx, ObstacleIdx)>],
    ) -> HashMap<EdgeIdx, ObstacleIdx> {
        let g = &self.graph;
        let mut origins = HashMap::new();
        for (path, ends) in path_obstacles.iter().enumerate() {
            let Some((start, end)) = *ends else {
                continue;
            };
            for e in g.path_edges(path).take_while(|&e| self.is_parallel(e)) {
                origins.insert(g.edge(e).axis, start);
            }
            for e in g.path_edges_rev(path).take_while(|&e| self.is_parallel(e)) {
                origins.insert(g.edge(e).axis, end);
            }
        }

        // The above is too greedy: the interior of some other path may run
        // along the same edges.
        for path in 0..g.path_count() {
            let crosses = |e: &PathEdgeIdx| g.axis_edge(*e).direction != self.direction;
            let Some(first) = g.path_edges(path).find(crosses) else {
                continue;
            };
            let last = g.path_edges_rev(path).find(crosses);
            for e in std::iter::successors(Some(first), |&e| g.edge(e).next)
                .take_while(|&e| Some(e) != last)
            {
                origins.remove(&g.edge(e).axis);
            }
        }
        origins
    }

    fn set_arrowhead_widths(&mut self, paths: &[Path]) {
        for (i, path) in paths.iter().enumerate() {
            if let (Some(w), Some(e)) = (path.target_arrowhead, self.graph.last_edge(i)) {
                let edge = self.graph.edge_mut(e);
                edge.width = edge.width.max(w);
            }
            if let (Some(w), Some(e)) = (path.source_arrowhead, self.graph.first_edge(i)) {
                let edge = self.graph.edge_mut(e);
                edge.width = edge.width.max(w);
            }
        }
    }

    fn create_segments(&mut self) {
        for path in 0..self.graph.path_count() {
            let mut current: Option<SegIdx> = None;
            for e in self.path_edges(path) {
                if !self.is_parallel(e) {
                    current = None;
                    continue;
                }
                let seg = match current {
                    Some(seg) => seg,
                    None => {
                        self.segments.push(LongestSegment::default());
                        SegIdx(self.segments.len() - 1)
                    }
                };
                current = Some(seg);
                self.segments[seg.0].edges.push(e);
                self.graph.edge_mut(e).segment = Some(seg);
                self.graph.axis_edge_mut(e).segments.insert(seg);
            }
            self.set_ideal_positions(path);
        }
    }

    fn segment_position(&self, seg: SegIdx) -> f64 {
        self.segments[seg.0].position(&self.graph, &self.frame)
    }

    /// A segment wants to sit halfway between the segments before and after
    /// it along the path, if it's between them already.
    fn set_ideal_positions(&mut self, path: usize) {
        let (Some(first), Some(last)) = (self.graph.first_edge(path), self.graph.last_edge(path))
        else {
            return;
        };
        let mut prev_offset = self.perp(self.graph.source_point(first));
        let mut current: Option<SegIdx> = None;
        let mut pending: Option<SegIdx> = None;
        for e in self.path_edges(path) {
            match self.graph.edge(e).segment {
                Some(seg) => {
                    current = Some(seg);
                    if let Some(p) = pending.take() {
                        let position = self.segment_position(p);
                        let next = self.segment_position(seg);
                        self.segments[p.0].ideal = ideal_between(position, prev_offset, next);
                        prev_offset = position;
                    }
                }
                None => {
                    if let Some(c) = current.take() {
                        pending = Some(c);
                    }
                }
            }
        }
        if let Some(p) = pending {
            let end = self.perp(self.graph.target_point(last));
            self.segments[p.0].ideal = ideal_between(self.segment_position(p), prev_offset, end);
        } else if let Some(c) = current {
            self.segments[c.0].ideal = self.segment_position(c);
        }
    }

    fn bound_by_rect(&mut self, e: PathEdgeIdx, rect: &Rect) {
        if self.graph.axis_edge(e).direction != self.direction {
            return;
        }
        let (left, right) = self.extent(rect);
        let axis = self.graph.axis_edge_mut(e);
        axis.bound_from_left(left);
        axis.bound_from_right(right);
    }

    fn bound_by_port(&mut self, e: PathEdgeIdx, port: &Port) {
        match port.shape {
            None => {
                let p = Rect::from_corners(port.location, port.location);
                self.bound_by_rect(e, &p);
            }
            Some(shape) if shape.bbox.contains(port.location) => {
                self.bound_by_rect(e, &shape.bbox);
            }
            Some(_) => {}
        }
    }

    /// Bounds that don't need a sweep: ports pin the ends of their paths, and
    /// paths stay inside the innermost groups holding both of their ends.
    fn bound_by_known_rects(&mut self, paths: &[Path], groups: &Groups) {
        for (i, path) in paths.iter().enumerate() {
            if !groups.is_empty() {
                for g in groups.min_common_ancestors(&path.source, &path.target) {
                    let rect = groups.rect(g);
                    for e in self.path_edges(i) {
                        self.bound_by_rect(e, &rect);
                    }
                }
            }
            if let Some(e) = self.graph.first_edge(i) {
                self.bound_by_port(e, &path.source);
            }
            if let Some(e) = self.graph.last_edge(i) {
                self.bound_by_port(e, &path.target);
            }
        }
    }

    fn bounds(&self, seg: &LongestSegment) -> (f64, f64) {
        (seg.left_bound(&self.graph), seg.right_bound(&self.graph))
    }

    fn clamp_ideal_positions(&mut self) {
        for i in 0..self.segments.len() {
            let (left, right) = self.bounds(&self.segments[i]);
            if left >= right {
                continue;
            }
            let seg = &mut self.segments[i];
            if seg.ideal < left {
                seg.ideal = left;
            } else if seg.ideal > right {
                seg.ideal = right;
            }
        }
    }

    fn solve(&mut self, separation: f64) -> UniformSolver {
        let mut solver = UniformSolver::new(separation);
        let mut fixed = Vec::with_capacity(self.segments.len());
        for i in 0..self.segments.len() {
            let seg = &self.segments[i];
            let (left, right) = self.bounds(seg);
            let position = seg.position(&self.graph, &self.frame);
            // A segment with no room to move stays where it was routed.
            let var = if left >= right {
                fixed.push(true);
                solver.add_fixed_variable(position)
            } else {
                fixed.push(false);
                let var = solver.add_variable(position, seg.ideal, seg.width(&self.graph));
                if left.is_finite() {
                    solver.set_low_bound(var, left);
                }
                if right.is_finite() {
                    solver.set_upper_bound(var, right);
                }
                var
            };
            self.segments[i].var = Some(var);
        }

        let mut pairs: BTreeSet<(SegIdx, SegIdx)> = BTreeSet::new();
        for axis in self.graph.graph.edges() {
            if self.graph.graph.edge(axis).data.direction != self.direction {
                continue;
            }
            let mut prev: Option<SegIdx> = None;
            for &pe in self.graph.order(axis) {
                let Some(seg) = self.graph.edge(pe).segment else {
                    continue;
                };
                if let Some(prev) = prev {
                    pairs.insert((prev, seg));
                }
                prev = Some(seg);
            }
        }
        for (i, seg) in self.segments.iter().enumerate() {
            for &e in &seg.edges {
                for &n in &self.graph.axis_edge(e).right_neighbors {
                    for &right in &self.graph.graph.edge(n).data.segments {
                        pairs.insert((SegIdx(i), right));
                    }
                }
            }
        }

        for (left, right) in pairs {
            if fixed[left.0] && fixed[right.0] {
                continue;
            }
            if let (Some(l), Some(r)) = (self.segments[left.0].var, self.segments[right.0].var) {
                solver.add_constraint(l, r);
            }
        }
        solver.solve();
        solver
    }

    fn shift(&self, p: Point, seg: Option<SegIdx>, solver: &UniformSolver) -> Point {
        let Some(var) = seg.and_then(|s| self.segments[s.0].var) else {
            return p;
        };
        let t = solver.position(var);
        match self.direction {
            Direction::North | Direction::South => Point::new(t, p.y),
            // Not `-t`, which would turn a zero into a negative zero.
            Direction::East | Direction::West => Point::new(p.x, 0.0 - t),
        }
    }

    /// The path's points after the solve, or `None` for paths without edges.
    fn shifted_points(&self, path: usize, solver: &UniformSolver) -> Option<Vec<Point>> {
        let g = &self.graph;
        let first = g.first_edge(path)?;
        let mut ret = vec![self.shift(g.source_point(first), g.edge(first).segment, solver)];
        for e in g.path_edges(path) {
            let edge = g.edge(e);
            let p = match (edge.segment, edge.next) {
                // A perpendicular edge ends where the next segment starts.
                (None, Some(next)) => self.shift(g.source_point(next), g.edge(next).segment, solver),
                (seg, _) => self.shift(g.target_point(e), seg, solver),
            };
            ret.push(p);
        }
        trace!("path {path} shifted to {ret:?}");
        Some(ret)
    }
}

fn ideal_between(position: f64, a: f64, b: f64) -> f64 {
    let (min, max) = (a.min(b), a.max(b));
    if min + DISTANCE_EPSILON < position {
        if position < max {
            (min + max) / 2.0
        } else {
            max
        }
    } else {
        min
    }
}

/// Moves `b` so that it's axis-aligned with `a`, changing the coordinate
/// that's off by less.
fn rectilinearise(a: Point, mut b: Point) -> Point {
    if a.x != b.x && a.y != b.y {
        if (a.x - b.x).abs() < (a.y - b.y).abs() {
            b.x = a.x;
        } else {
            b.y = a.y;
        }
    }
    b
}

/// Keeps only the corners of a rectilinear path. Going back along the same
/// line isn't a corner.
pub(crate) fn remove_switchbacks_and_middle_points(points: &[Point]) -> Vec<Point> {
    let &[a, b, ref rest @ ..] = points else {
        return points.to_vec();
    };
    let (mut a, mut b) = (a, b);
    let mut ret = vec![a];
    let mut prev_dir = Compass::between(a, b);
    for &c in rest {
        let dir = Compass::between(b, c);
        if dir != prev_dir && dir.opposite() != prev_dir && dir != Compass::NONE {
            if !a.close_to(b) {
                a = rectilinearise(a, b);
                ret.push(a);
            }
            prev_dir = dir;
        }
        b = c;
    }
    if !a.close_to(b) {
        ret.push(rectilinearise(a, b));
    }
    ret
}

fn runs_horizontally(a: Point, b: Point) -> bool {
    matches!(Direction::between(a, b), Some(Direction::East | Direction::West))
}

fn projections_close(a: Point, horizontal: bool, b: Point) -> bool {
    if horizontal {
        close(a.x, b.x)
    } else {
        close(a.y, b.y)
    }
}

/// The final polyline of a path, with its ends moved onto the ports.
pub(crate) fn build_polyline(points: &[Point], source: Point, target: Point) -> Vec<Point> {
    let mut points = points.to_vec();
    if points.len() >= 2 {
        let horizontal = runs_horizontally(points[0], points[1]);
        if projections_close(points[1], horizontal, source) {
            points.remove(0);
        } else if horizontal {
            points[0].x = source.x;
        } else {
            points[0].y = source.y;
        }
    }
    if points.len() >= 2 {
        let n = points.len() - 1;
        let horizontal = runs_horizontally(points[n - 1], points[n]);
        if projections_close(points[n - 1], horizontal, target) {
            points.pop();
        } else if horizontal {
            points[n].x = target.x;
        } else {
            points[n].y = target.y;
        }
    }
    if points.len() < 2 {
        return vec![source, target];
    }
    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RoutingSettings;

    fn p(x: f64, y: f64) -> Point {
        Point::new(x, y)
    }

    fn path(points: Vec<Point>) -> Path {
        let (s, t) = (points[0], points[points.len() - 1]);
        Path::new(points, s, t)
    }

    fn rects(rs: &[Rect]) -> Obstacles {
        Obstacles::from_rings(rs.iter().map(|r| r.corners())).unwrap()
    }

    fn pass(paths: &mut [Path], obstacles: &Obstacles, direction: Direction) {
        let groups = Groups::new();
        let sep = RoutingSettings::default().edge_separation();
        Nudger::new(paths, obstacles, &groups, sep)
            .calculate(direction, false)
            .unwrap();
    }

    #[test]
    fn ideals_sit_between_the_neighbors() {
        assert_eq!(ideal_between(5.0, 0.0, 10.0), 5.0);
        assert_eq!(ideal_between(3.0, 0.0, 10.0), 5.0);
        assert_eq!(ideal_between(12.0, 0.0, 10.0), 10.0);
        assert_eq!(ideal_between(-2.0, 10.0, 0.0), 0.0);
    }

    #[test]
    fn switchbacks_are_straightened() {
        let ps = [p(0.0, 0.0), p(5.0, 0.0), p(3.0, 0.0), p(3.0, 4.0), p(3.0, 8.0)];
        assert_eq!(
            remove_switchbacks_and_middle_points(&ps),
            vec![p(0.0, 0.0), p(3.0, 0.0), p(3.0, 8.0)]
        );
    }

    #[test]
    fn nearly_aligned_corners_get_aligned() {
        let ps = [p(0.0, 0.0), p(5.0, 1e-9), p(5.0, 5.0)];
        assert_eq!(
            remove_switchbacks_and_middle_points(&ps),
            vec![p(0.0, 0.0), p(5.0, 0.0), p(5.0, 5.0)]
        );
    }

    #[test]
    fn polylines_reach_their_ports() {
        let ps = [p(0.0, 1.0), p(0.0, 5.0), p(4.0, 5.0)];
        assert_eq!(
            build_polyline(&ps, p(0.0, 0.0), p(6.0, 5.0)),
            vec![p(0.0, 0.0), p(0.0, 5.0), p(6.0, 5.0)]
        );
        assert_eq!(
            build_polyline(&[], p(0.0, 0.0), p(3.0, 3.0)),
            vec![p(0.0, 0.0), p(3.0, 3.0)]
        );
        // The corner is already level with the target.
        let ps = [p(0.0, 0.0), p(0.0, 5.0), p(0.0, 5.0 + 1e-9)];
        assert_eq!(
            build_polyline(&ps, p(0.0, 0.0), p(0.0, 5.0)),
            vec![p(0.0, 0.0), p(0.0, 5.0)]
        );
    }

    #[test]
    fn shared_corridors_get_spread() {
        let mut paths = vec![
            path(vec![p(-20.0, -5.0), p(0.0, -5.0), p(0.0, 25.0), p(20.0, 25.0)]),
            path(vec![p(20.0, -5.0), p(0.0, -5.0), p(0.0, 25.0), p(-20.0, 25.0)]),
        ];
        pass(&mut paths, &Obstacles::new(), Direction::North);
        let xs: Vec<f64> = paths.iter().map(|path| path.points[1].x).collect();
        assert!((xs[0] - xs[1]).abs() >= 6.0 - 1e-6, "{xs:?}");
    }

    #[test]
    fn free_ports_pin_their_segment() {
        let mut paths = vec![
            path(vec![p(0.0, 0.0), p(0.0, 10.0)]),
            path(vec![p(0.0, 0.0), p(0.0, 10.0)]),
        ];
        pass(&mut paths, &Obstacles::new(), Direction::North);
        for path in &paths {
            assert_eq!(path.points, vec![p(0.0, 0.0), p(0.0, 10.0)]);
        }
    }

    #[test]
    fn path_ends_are_mapped_to_their_obstacles() {
        let obstacles = rects(&[
            Rect::from_corners(p(-2.0, -2.0), p(2.0, 2.0)),
            Rect::from_corners(p(8.0, 8.0), p(12.0, 12.0)),
        ]);
        let mut paths = vec![path(vec![p(0.0, 0.0), p(0.0, 10.0), p(10.0, 10.0)])];
        let points = vec![paths[0].points.clone()];
        let groups = Groups::new();
        let nudger = Nudger::new(&mut paths, &obstacles, &groups, 6.0);
        assert_eq!(
            nudger.path_obstacles,
            vec![Some((ObstacleIdx(0), ObstacleIdx(1)))]
        );

        let expected = [
            (Direction::North, (p(0.0, 0.0), p(0.0, 10.0), ObstacleIdx(0))),
            (Direction::East, (p(0.0, 10.0), p(10.0, 10.0), ObstacleIdx(1))),
        ];
        for (direction, edge) in expected {
            let pass = Pass {
                direction,
                frame: SweepFrame::axis(direction),
                graph: PathGraph::new(&points, &[0.0]).unwrap(),
                segments: Vec::new(),
            };
            let g = &pass.graph.graph;
            let origins: Vec<_> = pass
                .map_axis_edges_to_obstacles(&nudger.path_obstacles)
                .into_iter()
                .map(|(e, o)| (g.source_point(e), g.target_point(e), o))
                .collect();
            assert_eq!(origins, vec![edge]);
        }
    }

    #[test]
    fn obstacle_lookup_picks_the_lowest_index() {
        let obstacles = rects(&[
            Rect::from_corners(p(0.0, 0.0), p(10.0, 10.0)),
            Rect::from_corners(p(5.0, 5.0), p(15.0, 15.0)),
        ]);
        let tree = obstacle_tree(&obstacles);
        assert_eq!(obstacle_at(&tree, &obstacles, p(7.0, 7.0)), Some(ObstacleIdx(0)));
        assert_eq!(obstacle_at(&tree, &obstacles, p(12.0, 12.0)), Some(ObstacleIdx(1)));
        assert_eq!(obstacle_at(&tree, &obstacles, p(10.0, 0.0)), Some(ObstacleIdx(0)));
        assert_eq!(obstacle_at(&tree, &obstacles, p(20.0, 0.0)), None);
    }
}
