//! Refining paths before they're ordered.
//!
//! The combinatorial ordering needs paths that share a corridor to share the
//! vertices along it. Here we make that true: points are snapped to a grid of
//! `1e-6` so that nearly-equal coordinates become equal, overlapping collinear
//! segments get each other's endpoints, and crossing segments get their
//! crossing point. Optionally, paths that wrap around each other are merged.

use std::collections::BTreeMap;

use log::trace;
use ordered_float::OrderedFloat;

use super::{
    linked::{LinkIdx, LinkedPoints},
    merge::PathMerger,
    splitter::LinkedPointSplitter,
};
use crate::{
    geom::{Direction, Point},
    num::close,
};

/// Rounds the points and drops consecutive duplicates.
pub(crate) fn adjust_points(points: &[Point]) -> Vec<Point> {
    let mut ret: Vec<Point> = Vec::with_capacity(points.len());
    for p in points {
        let p = p.rounded();
        if ret.last() != Some(&p) {
            ret.push(p);
        }
    }
    ret
}

pub(crate) fn refine_paths(paths: &mut [Vec<Point>], merge: bool) {
    for ps in paths.iter_mut() {
        *ps = adjust_points(ps);
    }

    let mut links = LinkedPoints::new();
    let heads: Vec<_> = paths.iter().map(|ps| links.chain(ps)).collect();

    refine_in_direction(&mut links, &heads, Direction::North);
    refine_in_direction(&mut links, &heads, Direction::East);
    let crossings = LinkedPointSplitter::new(&mut links, &heads).split_points();
    trace!("inserted {crossings} crossing points");

    if merge {
        PathMerger::new(&mut links, &heads).merge_paths();
    }

    for (ps, &head) in paths.iter_mut().zip(&heads) {
        *ps = links.points_from(head);
    }
}

// The coordinate that's constant along segments parallel to `dir`, and the one
// that varies.
fn projections(dir: Direction) -> (fn(Point) -> f64, fn(Point) -> f64) {
    if dir == Direction::East {
        (|p| p.y, |p| p.x)
    } else {
        (|p| p.x, |p| p.y)
    }
}

/// Makes collinear segments parallel to `dir` share their vertices.
fn refine_in_direction(links: &mut LinkedPoints, heads: &[Option<LinkIdx>], dir: Direction) {
    let (perp, along) = projections(dir);

    let mut buckets: BTreeMap<OrderedFloat<f64>, Vec<LinkIdx>> = BTreeMap::new();
    for &head in heads {
        for l in links.iter(head) {
            if let Some(n) = links.next(l) {
                if close(perp(links.point(l)), perp(links.point(n))) {
                    buckets
                        .entry(OrderedFloat(perp(links.point(l))))
                        .or_default()
                        .push(l);
                }
            }
        }
    }

    for bucket in buckets.values() {
        refine_collinear_bucket(links, bucket, along);
    }
}

fn refine_collinear_bucket(links: &mut LinkedPoints, bucket: &[LinkIdx], along: fn(Point) -> f64) {
    // Points are identified by their coordinate along the line.
    let mut sorted: BTreeMap<OrderedFloat<f64>, Point> = BTreeMap::new();
    let mut segs = Vec::with_capacity(bucket.len());
    for &l in bucket {
        let Some(n) = links.next(l) else {
            continue;
        };
        let (a, b) = (links.point(l), links.point(n));
        sorted.entry(OrderedFloat(along(a))).or_insert(a);
        sorted.entry(OrderedFloat(along(b))).or_insert(b);
        segs.push((l, a, b));
    }
    let points: Vec<Point> = sorted.values().copied().collect();
    let index: BTreeMap<OrderedFloat<f64>, usize> = sorted
        .keys()
        .enumerate()
        .map(|(i, &k)| (k, i))
        .collect();

    for (l, a, b) in segs {
        let i = index[&OrderedFloat(along(a))];
        let j = index[&OrderedFloat(along(b))];
        if i + 1 < j {
            links.insert_all_after(l, points[i + 1..j].iter().copied());
        } else if j + 1 < i {
            links.insert_all_after(l, points[j + 1..i].iter().rev().copied());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: f64, y: f64) -> Point {
        Point::new(x, y)
    }

    #[test]
    fn adjusting_rounds_and_dedups() {
        let ps = adjust_points(&[p(0.0, 0.0), p(1e-8, 0.0), p(1.0000004, 2.0)]);
        assert_eq!(ps, vec![p(0.0, 0.0), p(1.0, 2.0)]);
    }

    #[test]
    fn overlapping_segments_share_vertices() {
        let mut paths = vec![
            vec![p(0.0, 0.0), p(0.0, 10.0)],
            vec![p(5.0, 3.0), p(0.0, 3.0), p(0.0, 7.0), p(5.0, 7.0)],
        ];
        refine_paths(&mut paths, false);
        assert_eq!(
            paths[0],
            vec![p(0.0, 0.0), p(0.0, 3.0), p(0.0, 7.0), p(0.0, 10.0)]
        );
        assert_eq!(paths[1], vec![p(5.0, 3.0), p(0.0, 3.0), p(0.0, 7.0), p(5.0, 7.0)]);
    }

    #[test]
    fn reversed_segments_get_points_in_reverse() {
        let mut paths = vec![
            vec![p(10.0, 0.0), p(0.0, 0.0)],
            vec![p(2.0, 0.0), p(4.0, 0.0), p(4.0, 5.0)],
        ];
        refine_paths(&mut paths, false);
        assert_eq!(
            paths[0],
            vec![p(10.0, 0.0), p(4.0, 0.0), p(2.0, 0.0), p(0.0, 0.0)]
        );
    }

    #[test]
    fn crossings_are_inserted() {
        let mut paths = vec![
            vec![p(-5.0, 0.0), p(5.0, 0.0)],
            vec![p(0.0, -5.0), p(0.0, 5.0)],
        ];
        refine_paths(&mut paths, false);
        assert_eq!(paths[0], vec![p(-5.0, 0.0), p(0.0, 0.0), p(5.0, 0.0)]);
        assert_eq!(paths[1], vec![p(0.0, -5.0), p(0.0, 0.0), p(0.0, 5.0)]);
    }

    #[test]
    fn short_paths() {
        let mut paths = vec![vec![], vec![p(1.0, 1.0)]];
        refine_paths(&mut paths, true);
        assert!(paths[0].is_empty());
        assert_eq!(paths[1], vec![p(1.0, 1.0)]);
    }
}
