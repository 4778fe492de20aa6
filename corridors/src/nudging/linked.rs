//! Paths as singly linked point lists, for cheap insertion during refinement.

use crate::geom::Point;

#[derive(Clone, Copy, PartialOrd, Ord, PartialEq, Eq, Hash)]
pub(crate) struct LinkIdx(pub usize);

impl std::fmt::Debug for LinkIdx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "l_{}", self.0)
    }
}

/// An arena of linked points. Every path is a chain starting at some head.
#[derive(Clone, Debug, Default)]
pub(crate) struct LinkedPoints {
    points: Vec<Point>,
    next: Vec<Option<LinkIdx>>,
}

impl LinkedPoints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, p: Point) -> LinkIdx {
        let idx = LinkIdx(self.points.len());
        self.points.push(p);
        self.next.push(None);
        idx
    }

    /// Links up `points`, returning the head of the new chain.
    pub fn chain(&mut self, points: &[Point]) -> Option<LinkIdx> {
        let mut head = None;
        let mut last: Option<LinkIdx> = None;
        for &p in points {
            let l = self.push(p);
            match last {
                Some(prev) => self.next[prev.0] = Some(l),
                None => head = Some(l),
            }
            last = Some(l);
        }
        head
    }

    pub fn point(&self, l: LinkIdx) -> Point {
        self.points[l.0]
    }

    pub fn next(&self, l: LinkIdx) -> Option<LinkIdx> {
        self.next[l.0]
    }

    pub fn set_next(&mut self, l: LinkIdx, next: Option<LinkIdx>) {
        self.next[l.0] = next;
    }

    /// Inserts `p` right after `l`, returning the new link.
    pub fn insert_after(&mut self, l: LinkIdx, p: Point) -> LinkIdx {
        let new = self.push(p);
        self.next[new.0] = self.next[l.0];
        self.next[l.0] = Some(new);
        new
    }

    /// Inserts `points`, in order, between `l` and its successor.
    pub fn insert_all_after(&mut self, l: LinkIdx, points: impl IntoIterator<Item = Point>) {
        let mut cur = l;
        for p in points {
            cur = self.insert_after(cur, p);
        }
    }

    pub fn iter(&self, head: Option<LinkIdx>) -> impl Iterator<Item = LinkIdx> + '_ {
        std::iter::successors(head, |&l| self.next(l))
    }

    pub fn points_from(&self, head: Option<LinkIdx>) -> Vec<Point> {
        self.iter(head).map(|l| self.point(l)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: f64, y: f64) -> Point {
        Point::new(x, y)
    }

    #[test]
    fn insertion() {
        let mut links = LinkedPoints::new();
        let head = links.chain(&[p(0.0, 0.0), p(4.0, 0.0)]);
        let h = head.unwrap();
        links.insert_all_after(h, [p(1.0, 0.0), p(2.0, 0.0)]);
        let mid = links.next(h).unwrap();
        links.insert_after(mid, p(1.5, 0.0));
        assert_eq!(
            links.points_from(head),
            vec![p(0.0, 0.0), p(1.0, 0.0), p(1.5, 0.0), p(2.0, 0.0), p(4.0, 0.0)]
        );
        assert!(links.chain(&[]).is_none());
    }
}
