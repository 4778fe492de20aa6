//! Straightening staircases.
//!
//! Nudging can leave a path zig-zagging through `a, b, c, d, e`, where `a -> b`
//! goes the same way as `c -> d`, and `b -> c` the same way as `d -> e`. If
//! nothing is in the way, the middle three points can be replaced by a
//! single corner.

use std::collections::BTreeSet;

use log::{debug, trace};
use rstar::{
    primitives::{GeomWithData, Line},
    RTree,
};

use super::{
    nudger::{envelope, obstacle_tree, ObstacleTree},
    Path,
};
use crate::{
    geom::{Compass, Point, Rect},
    num::close,
    obstacle::Obstacles,
};

/// A segment of some path, tagged with the path and the index of its start.
type PathSegment = GeomWithData<Line<[f64; 2]>, (usize, usize)>;

fn path_segment(points: &[Point], path: usize, i: usize) -> PathSegment {
    let (a, b) = (points[i], points[i + 1]);
    GeomWithData::new(Line::new([a.x, a.y], [b.x, b.y]), (path, i))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Window {
    /// Not shaped like a staircase, or blocked by an obstacle.
    Plain,
    /// A staircase, but some other path is in the way for now.
    Blocked,
    Staircase,
}

pub(crate) struct StaircaseRemover<'a> {
    paths: &'a mut [Path],
    obstacles: &'a Obstacles,
    obstacle_tree: ObstacleTree,
    segments: RTree<PathSegment>,
    /// Paths that won't ever have a removable staircase.
    crossed_out: BTreeSet<usize>,
}

impl<'a> StaircaseRemover<'a> {
    pub fn new(paths: &'a mut [Path], obstacles: &'a Obstacles) -> Self {
        let segments = paths
            .iter()
            .enumerate()
            .flat_map(|(path, p)| {
                (0..p.points.len().saturating_sub(1)).map(move |i| path_segment(&p.points, path, i))
            })
            .collect();
        StaircaseRemover {
            paths,
            obstacles,
            obstacle_tree: obstacle_tree(obstacles),
            segments: RTree::bulk_load(segments),
            crossed_out: BTreeSet::new(),
        }
    }

    /// Removes staircases until there are none left to remove, and returns how
    /// many were removed.
    pub fn remove_staircases(mut self) -> usize {
        let mut removed = 0;
        loop {
            let mut progress = false;
            for path in 0..self.paths.len() {
                if !self.crossed_out.contains(&path) && self.process_path(path) {
                    removed += 1;
                    progress = true;
                }
            }
            if !progress {
                break;
            }
        }
        debug!("removed {removed} staircases");
        removed
    }

    fn process_path(&mut self, path: usize) -> bool {
        let n = self.paths[path].points.len();
        let mut can_have_staircase = false;
        for i in 0..n.saturating_sub(4) {
            match self.window(path, i) {
                Window::Staircase => {
                    self.remove_staircase(path, i);
                    return true;
                }
                Window::Blocked => can_have_staircase = true,
                Window::Plain => {}
            }
        }
        if !can_have_staircase {
            self.crossed_out.insert(path);
        }
        false
    }

    fn window(&self, path: usize, i: usize) -> Window {
        let pts = &self.paths[path].points;
        let (a, b, c, d, e) = (pts[i], pts[i + 1], pts[i + 2], pts[i + 3], pts[i + 4]);
        if Compass::between(a, b) != Compass::between(c, d)
            || Compass::between(b, c) != Compass::between(d, e)
        {
            return Window::Plain;
        }
        let flipped = if close(a.y, b.y) {
            Point::new(e.x, a.y)
        } else {
            Point::new(a.x, e.y)
        };
        if self.hits_obstacle(b, flipped) || self.hits_obstacle(flipped, d) {
            return Window::Plain;
        }
        if self.hits_other_segment(b, flipped, path, i) || self.hits_other_segment(flipped, d, path, i) {
            return Window::Blocked;
        }
        Window::Staircase
    }

    fn hits_obstacle(&self, from: Point, to: Point) -> bool {
        self.obstacle_tree
            .locate_in_envelope_intersecting(&envelope(&Rect::from_corners(from, to)))
            .any(|entry| self.obstacles.segment_touches_boundary(entry.data, from, to))
    }

    /// Does the bounding box of `from -> to` meet any segment outside the
    /// window starting at point `start` of `path`?
    fn hits_other_segment(&self, from: Point, to: Point, path: usize, start: usize) -> bool {
        self.segments
            .locate_in_envelope_intersecting(&envelope(&Rect::from_corners(from, to)))
            .any(|entry| {
                let (p, i) = entry.data;
                p != path || !(start..start + 4).contains(&i)
            })
    }

    fn remove_staircase(&mut self, path: usize, start: usize) {
        let pts = &self.paths[path].points;
        for i in 0..pts.len() - 1 {
            self.segments.remove(&path_segment(pts, path, i));
        }

        let (b, d) = (pts[start + 1], pts[start + 3]);
        let corner = if close(pts[start].y, b.y) {
            Point::new(d.x, b.y)
        } else {
            Point::new(b.x, d.y)
        };
        let mut new_points = pts[..=start].to_vec();
        new_points.push(corner);
        new_points.extend_from_slice(&pts[start + 4..]);
        trace!("path {path}: staircase at {start} becomes a corner at {corner:?}");

        for i in 0..new_points.len() - 1 {
            self.segments.insert(path_segment(&new_points, path, i));
        }
        self.paths[path].points = new_points;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: f64, y: f64) -> Point {
        Point::new(x, y)
    }

    fn path(points: Vec<Point>) -> Path {
        let (s, t) = (points[0], points[points.len() - 1]);
        Path::new(points, s, t)
    }

    fn remove(paths: &mut [Path], obstacles: &Obstacles) -> usize {
        StaircaseRemover::new(paths, obstacles).remove_staircases()
    }

    #[test]
    fn simple_staircase() {
        let mut paths = vec![path(vec![
            p(0.0, 0.0),
            p(2.0, 0.0),
            p(2.0, 2.0),
            p(4.0, 2.0),
            p(4.0, 4.0),
        ])];
        assert_eq!(remove(&mut paths, &Obstacles::new()), 1);
        assert_eq!(paths[0].points, vec![p(0.0, 0.0), p(4.0, 0.0), p(4.0, 4.0)]);
    }

    #[test]
    fn long_staircases_collapse_step_by_step() {
        let mut paths = vec![path(vec![
            p(0.0, 0.0),
            p(0.0, 1.0),
            p(1.0, 1.0),
            p(1.0, 2.0),
            p(2.0, 2.0),
            p(2.0, 3.0),
            p(3.0, 3.0),
        ])];
        assert_eq!(remove(&mut paths, &Obstacles::new()), 2);
        assert_eq!(paths[0].points, vec![p(0.0, 0.0), p(0.0, 3.0), p(3.0, 3.0)]);
    }

    #[test]
    fn obstacles_block_the_corner() {
        let obstacles =
            Obstacles::from_rings([Rect::from_corners(p(3.0, -1.0), p(3.5, 1.0)).corners()]).unwrap();
        let original = vec![p(0.0, 0.0), p(2.0, 0.0), p(2.0, 2.0), p(4.0, 2.0), p(4.0, 4.0)];
        let mut paths = vec![path(original.clone())];
        assert_eq!(remove(&mut paths, &obstacles), 0);
        assert_eq!(paths[0].points, original);
    }

    #[test]
    fn other_paths_block_the_corner() {
        let original = vec![p(0.0, 0.0), p(2.0, 0.0), p(2.0, 2.0), p(4.0, 2.0), p(4.0, 4.0)];
        let mut paths = vec![
            path(original.clone()),
            path(vec![p(3.0, -3.0), p(3.0, 1.0)]),
        ];
        assert_eq!(remove(&mut paths, &Obstacles::new()), 0);
        assert_eq!(paths[0].points, original);
    }

    #[test]
    fn second_pass_changes_nothing() {
        let mut paths = vec![
            path(vec![
                p(0.0, 0.0),
                p(2.0, 0.0),
                p(2.0, 2.0),
                p(4.0, 2.0),
                p(4.0, 4.0),
                p(6.0, 4.0),
            ]),
            path(vec![p(10.0, 0.0), p(10.0, 5.0), p(12.0, 5.0), p(12.0, 7.0), p(14.0, 7.0)]),
        ];
        let obstacles = Obstacles::new();
        remove(&mut paths, &obstacles);
        let once: Vec<_> = paths.iter().map(|p| p.points.clone()).collect();
        assert_eq!(remove(&mut paths, &obstacles), 0);
        let twice: Vec<_> = paths.iter().map(|p| p.points.clone()).collect();
        assert_eq!(once, twice);
    }
}
