//! Splitting crossing horizontal and vertical path segments.
//!
//! Wherever a horizontal segment of one path crosses a vertical segment of
//! another (or of the same path), the crossing point is inserted into both,
//! so that the two paths share a vertex there. This is a sweep from bottom to
//! top: vertical segments are active between their low and high ends, and
//! each horizontal segment is intersected with the active verticals.

use std::{
    cmp::Reverse,
    collections::{BTreeSet, BinaryHeap},
};

use ordered_float::OrderedFloat;

use super::linked::{LinkIdx, LinkedPoints};
use crate::{
    geom::Point,
    num::{close, DISTANCE_EPSILON},
};

// At the same height, verticals start before horizontals are intersected,
// and end after.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Event {
    Low(usize),
    Horizontal(LinkIdx),
    High(usize),
}

struct Vertical {
    x: OrderedFloat<f64>,
    /// The link whose segment is the part of this vertical that's still above
    /// the sweep line.
    link: LinkIdx,
}

pub(crate) struct LinkedPointSplitter<'a> {
    links: &'a mut LinkedPoints,
    verticals: Vec<Vertical>,
    horizontals: Vec<LinkIdx>,
    /// Active verticals, by x coordinate.
    active: BTreeSet<(OrderedFloat<f64>, usize)>,
}

impl<'a> LinkedPointSplitter<'a> {
    pub fn new(links: &'a mut LinkedPoints, heads: &[Option<LinkIdx>]) -> Self {
        let mut verticals = Vec::new();
        let mut horizontals = Vec::new();
        for &head in heads {
            let segs: Vec<_> = links
                .iter(head)
                .filter_map(|l| links.next(l).map(|n| (l, n)))
                .collect();
            for (l, n) in segs {
                if close(links.point(l).x, links.point(n).x) {
                    verticals.push(Vertical {
                        x: OrderedFloat(links.point(l).x),
                        link: l,
                    });
                } else {
                    horizontals.push(l);
                }
            }
        }
        LinkedPointSplitter {
            links,
            verticals,
            horizontals,
            active: BTreeSet::new(),
        }
    }

    fn low_high(&self, l: LinkIdx) -> (f64, f64) {
        let a = self.links.point(l).y;
        let b = self.next_point(l).y;
        (a.min(b), a.max(b))
    }

    fn next_point(&self, l: LinkIdx) -> Point {
        self.links
            .next(l)
            .map_or(self.links.point(l), |n| self.links.point(n))
    }

    /// Returns the number of points inserted.
    pub fn split_points(mut self) -> usize {
        if self.verticals.is_empty() || self.horizontals.is_empty() {
            return 0;
        }
        let mut queue = BinaryHeap::new();
        for (i, v) in self.verticals.iter().enumerate() {
            let (low, high) = self.low_high(v.link);
            queue.push(Reverse((OrderedFloat(low), Event::Low(i))));
            queue.push(Reverse((OrderedFloat(high), Event::High(i))));
        }
        for &h in &self.horizontals {
            let y = self.links.point(h).y;
            queue.push(Reverse((OrderedFloat(y), Event::Horizontal(h))));
        }

        let mut inserted = 0;
        while let Some(Reverse((_, ev))) = queue.pop() {
            match ev {
                Event::Low(i) => {
                    self.active.insert((self.verticals[i].x, i));
                }
                Event::High(i) => {
                    self.active.remove(&(self.verticals[i].x, i));
                }
                Event::Horizontal(h) => inserted += self.intersect_with_active(h),
            }
        }
        inserted
    }

    fn intersect_with_active(&mut self, mut h: LinkIdx) -> usize {
        let start = self.links.point(h);
        let end = self.next_point(h);
        let y = start.y;
        let ascending = start.x < end.x;
        let (left, right) = if ascending {
            (start.x, end.x)
        } else {
            (end.x, start.x)
        };

        let mut crossing: Vec<usize> = self
            .active
            .range((OrderedFloat(left), 0)..=(OrderedFloat(right), usize::MAX))
            .map(|&(_, i)| i)
            .collect();
        if !ascending {
            crossing.reverse();
        }

        let mut inserted = 0;
        for i in crossing {
            let p = Point::new(self.verticals[i].x.0, y);
            let split = self.try_split_horizontal(h, p, ascending);
            if split != h {
                inserted += 1;
                h = split;
            }
            if self.try_split_vertical(i, p) {
                inserted += 1;
            }
        }
        inserted
    }

    fn try_split_horizontal(&mut self, h: LinkIdx, p: Point, ascending: bool) -> LinkIdx {
        let x0 = self.links.point(h).x;
        let x1 = self.next_point(h).x;
        let inside = if ascending {
            x0 + DISTANCE_EPSILON < p.x && p.x + DISTANCE_EPSILON < x1
        } else {
            x1 + DISTANCE_EPSILON < p.x && p.x + DISTANCE_EPSILON < x0
        };
        if inside {
            self.links.insert_after(h, p)
        } else {
            h
        }
    }

    fn try_split_vertical(&mut self, i: usize, p: Point) -> bool {
        let v = self.verticals[i].link;
        let (low, high) = self.low_high(v);
        if !(low + DISTANCE_EPSILON < p.y && p.y + DISTANCE_EPSILON < high) {
            return false;
        }
        let going_up = self.links.point(v).y < p.y;
        let new = self.links.insert_after(v, p);
        // Later horizontals are higher up, so they can only cross the upper half.
        if going_up {
            self.verticals[i].link = new;
        }
        true
    }
}
