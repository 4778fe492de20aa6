//! Merging paths that separate and then meet again.
//!
//! If two paths share a vertex, split up and later share another vertex, the
//! nudger would have to order them one way at the first vertex and possibly
//! the other way at the second. We avoid that by rerouting the "looping" path
//! along the other one in between. Paths that visit a vertex twice get the
//! loop cut out.

use std::collections::{BTreeMap, HashMap};

use log::{trace, warn};

use super::linked::{LinkIdx, LinkedPoints};
use crate::visibility::PointKey;

/// For every point, the paths through it and the link where they pass it.
type Offsets = BTreeMap<usize, LinkIdx>;

pub(crate) struct PathMerger<'a> {
    links: &'a mut LinkedPoints,
    heads: &'a [Option<LinkIdx>],
    offsets: HashMap<PointKey, Offsets>,
}

impl<'a> PathMerger<'a> {
    pub fn new(links: &'a mut LinkedPoints, heads: &'a [Option<LinkIdx>]) -> Self {
        PathMerger {
            links,
            heads,
            offsets: HashMap::new(),
        }
    }

    pub fn merge_paths(mut self) {
        self.init_offsets_and_remove_self_loops();
        for path in 0..self.heads.len() {
            self.process_path(path);
        }
    }

    fn key(&self, l: LinkIdx) -> PointKey {
        PointKey::from(self.links.point(l))
    }

    fn init_offsets_and_remove_self_loops(&mut self) {
        for (path, &head) in self.heads.iter().enumerate() {
            let mut cur = head;
            while let Some(l) = cur {
                let key = self.key(l);
                let loop_point = self.offsets.entry(key).or_default().get(&path).copied();
                match loop_point {
                    Some(loop_point) => {
                        trace!("cutting a loop out of path {path}");
                        self.clean_piece(loop_point, l, path);
                        self.links.set_next(loop_point, self.links.next(l));
                    }
                    None => {
                        self.offsets.entry(key).or_default().insert(path, l);
                    }
                }
                cur = self.links.next(l);
            }
        }
    }

    fn process_path(&mut self, stem: usize) {
        let mut departed: BTreeMap<usize, LinkIdx> = BTreeMap::new();
        let mut prev: Option<PointKey> = None;
        let mut cur = self.heads[stem];
        while let Some(l) = cur {
            let key = self.key(l);
            let here = self.offsets.get(&key).cloned().unwrap_or_default();
            if let Some(prev_key) = prev {
                if !departed.is_empty() {
                    for (&path0, &arrival) in &here {
                        if let Some(departure) = departed.remove(&path0) {
                            self.collapse_looping_path(path0, departure, arrival, stem, l);
                        }
                    }
                }

                // Collapsing may have rerouted paths through the previous point.
                if let Some(before) = self.offsets.get(&prev_key) {
                    for (&path0, &lp) in before {
                        if !here.contains_key(&path0) {
                            departed.insert(path0, lp);
                        }
                    }
                }
            }
            prev = Some(key);
            cur = self.links.next(l);
        }
    }

    fn collapse_looping_path(
        &mut self,
        looping: usize,
        departure: LinkIdx,
        arrival: LinkIdx,
        stem: usize,
        arrival_to_stem: LinkIdx,
    ) {
        let departure_point = self.links.point(departure);
        let Some(departure_on_stem) = self
            .links
            .iter(self.heads[stem])
            .find(|&l| self.links.point(l) == departure_point)
        else {
            warn!("path {looping} left path {stem} at a point that isn't on it");
            return;
        };
        trace!("merging path {looping} into path {stem}");
        let between: Vec<LinkIdx> = self.between(departure_on_stem, arrival_to_stem);
        let points: Vec<_> = between.into_iter().map(|l| self.links.point(l)).collect();

        if self.before(departure, arrival) {
            self.clean_piece(departure, arrival, looping);
            self.replace_piece(departure, arrival, points.into_iter(), looping);
        } else {
            self.clean_piece(arrival, departure, looping);
            self.replace_piece(arrival, departure, points.into_iter().rev(), looping);
        }
    }

    /// The links strictly between `a` and `b`.
    fn between(&self, a: LinkIdx, b: LinkIdx) -> Vec<LinkIdx> {
        self.links
            .iter(self.links.next(a))
            .take_while(|&l| l != b)
            .collect()
    }

    fn before(&self, a: LinkIdx, b: LinkIdx) -> bool {
        self.links.iter(self.links.next(a)).any(|l| l == b)
    }

    /// Forgets that `path` visits the points strictly between `a` and `b`.
    fn clean_piece(&mut self, a: LinkIdx, b: LinkIdx, path: usize) {
        for l in self.between(a, b) {
            let key = self.key(l);
            if let Some(offsets) = self.offsets.get_mut(&key) {
                offsets.remove(&path);
            }
        }
    }

    /// Replaces everything strictly between `a` and `b` by new links at `points`.
    fn replace_piece(
        &mut self,
        a: LinkIdx,
        b: LinkIdx,
        points: impl Iterator<Item = crate::geom::Point>,
        path: usize,
    ) {
        let mut prev = a;
        for p in points {
            let lp = self.links.push(p);
            self.links.set_next(prev, Some(lp));
            prev = lp;
            self.offsets
                .entry(PointKey::from(p))
                .or_default()
                .insert(path, lp);
        }
        self.links.set_next(prev, Some(b));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::Point;

    fn p(x: f64, y: f64) -> Point {
        Point::new(x, y)
    }

    fn merge(paths: &[Vec<Point>]) -> Vec<Vec<Point>> {
        let mut links = LinkedPoints::new();
        let heads: Vec<_> = paths.iter().map(|ps| links.chain(ps)).collect();
        PathMerger::new(&mut links, &heads).merge_paths();
        heads.iter().map(|&h| links.points_from(h)).collect()
    }

    #[test]
    fn self_loops_are_cut() {
        let out = merge(&[vec![
            p(0.0, 0.0),
            p(5.0, 0.0),
            p(5.0, 5.0),
            p(3.0, 5.0),
            p(3.0, 0.0),
            p(5.0, 0.0),
            p(10.0, 0.0),
        ]]);
        assert_eq!(out[0], vec![p(0.0, 0.0), p(5.0, 0.0), p(10.0, 0.0)]);
    }

    #[test]
    fn paths_meeting_twice_are_merged() {
        // The second path leaves the first one at (2, 0) and comes back at
        // (8, 0), going around by y = 3.
        let stem = vec![p(0.0, 0.0), p(2.0, 0.0), p(5.0, 0.0), p(8.0, 0.0), p(10.0, 0.0)];
        let looping = vec![
            p(0.0, -4.0),
            p(2.0, -4.0),
            p(2.0, 0.0),
            p(2.0, 3.0),
            p(8.0, 3.0),
            p(8.0, 0.0),
            p(8.0, -4.0),
        ];
        let out = merge(&[stem.clone(), looping]);
        assert_eq!(out[0], stem);
        assert_eq!(
            out[1],
            vec![
                p(0.0, -4.0),
                p(2.0, -4.0),
                p(2.0, 0.0),
                p(5.0, 0.0),
                p(8.0, 0.0),
                p(8.0, -4.0)
            ]
        );
    }

    #[test]
    fn reversed_looping_paths_get_the_stem_reversed() {
        let stem = vec![p(0.0, 0.0), p(2.0, 0.0), p(5.0, 0.0), p(8.0, 0.0), p(10.0, 0.0)];
        let looping = vec![
            p(8.0, -4.0),
            p(8.0, 0.0),
            p(8.0, 3.0),
            p(2.0, 3.0),
            p(2.0, 0.0),
            p(2.0, -4.0),
        ];
        let out = merge(&[stem, looping]);
        assert_eq!(
            out[1],
            vec![p(8.0, -4.0), p(8.0, 0.0), p(5.0, 0.0), p(2.0, 0.0), p(2.0, -4.0)]
        );
    }

    #[test]
    fn paths_that_cross_once_are_left_alone() {
        let a = vec![p(0.0, 0.0), p(5.0, 0.0), p(10.0, 0.0)];
        let b = vec![p(5.0, -5.0), p(5.0, 0.0), p(5.0, 5.0)];
        let out = merge(&[a.clone(), b.clone()]);
        assert_eq!(out, vec![a, b]);
    }
}
