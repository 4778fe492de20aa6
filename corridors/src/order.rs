//! Ordered active sets for the sweeps.
//!
//! The sweeps keep their active items (cone sides, obstacle sides) in a `Vec`
//! sorted by the position at which each item crosses the sweep line. The
//! position depends on where the sweep line currently is, so there is no
//! fixed `Ord` for the items: every operation takes an ordering context that
//! knows the current sweep coordinate. Nothing in the context is mutated by
//! the comparisons.
//!
//! Items only ever swap order at events, and we process the events in order,
//! so the vec stays sorted with respect to the current context. Floating-point
//! error can break that a little: an item can be located a hair outside the
//! band where the context thinks it should be. [`ActiveOrder::locate`] deals
//! with that by retrying against a context that is slightly in the past (when
//! the order was still correct), and finally by a linear scan.

use std::cmp::Ordering;

/// Something that knows how to order `T`s at the current position of a sweep line.
pub trait SweepOrdering<T> {
    /// Compares `item` (the one being inserted or searched for) against `other`
    /// (one already in the set).
    fn cmp(&self, item: &T, other: &T) -> Ordering;
}

/// How an item was found by [`ActiveOrder::locate`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Located {
    /// By ordered search with the current context.
    Exact(usize),
    /// By ordered search with the rewound context.
    Rewound(usize),
    /// Only by a linear scan.
    Scanned(usize),
}

impl Located {
    pub fn index(self) -> usize {
        match self {
            Located::Exact(i) | Located::Rewound(i) | Located::Scanned(i) => i,
        }
    }

    pub fn was_repaired(self) -> bool {
        !matches!(self, Located::Exact(_))
    }
}

#[derive(Clone, Debug)]
pub struct ActiveOrder<T> {
    items: Vec<T>,
}

impl<T> Default for ActiveOrder<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T: Copy + PartialEq + std::fmt::Debug> ActiveOrder<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<T> {
        self.items.get(idx).copied()
    }

    pub fn first(&self) -> Option<T> {
        self.items.first().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        self.items.iter().copied()
    }

    /// Inserts `item` after everything that isn't bigger than it, returning its position.
    pub fn insert(&mut self, ctx: &impl SweepOrdering<T>, item: T) -> usize {
        let pos = self
            .items
            .partition_point(|other| ctx.cmp(&item, other) != Ordering::Less);
        self.items.insert(pos, item);
        pos
    }

    /// Finds `item` by ordered search, checking identity among the items that
    /// compare equal to it.
    pub fn position(&self, ctx: &impl SweepOrdering<T>, item: T) -> Option<usize> {
        let lo = self
            .items
            .partition_point(|other| ctx.cmp(&item, other) == Ordering::Greater);
        let hi = self
            .items
            .partition_point(|other| ctx.cmp(&item, other) != Ordering::Less);
        if lo < hi {
            if let Some(i) = self.items[lo..hi].iter().position(|x| *x == item) {
                return Some(lo + i);
            }
        }
        // Items that compare unequal to themselves (or whose neighbors disagree
        // about where the equal band is) can still sit right next to where the
        // search ended up.
        let start = lo.saturating_sub(1);
        let end = (hi + 1).min(self.items.len());
        self.items[start..end]
            .iter()
            .position(|x| *x == item)
            .map(|i| start + i)
    }

    /// Finds `item`, first at the current position and then at the rewound
    /// one, falling back to a scan.
    pub fn locate<C: SweepOrdering<T>>(
        &self,
        ctx: &C,
        rewound: impl FnOnce() -> C,
        item: T,
    ) -> Option<Located> {
        if let Some(i) = self.position(ctx, item) {
            return Some(Located::Exact(i));
        }
        if let Some(i) = self.position(&rewound(), item) {
            return Some(Located::Rewound(i));
        }
        self.items
            .iter()
            .position(|x| *x == item)
            .map(Located::Scanned)
    }

    pub fn remove_at(&mut self, idx: usize) -> T {
        self.items.remove(idx)
    }

    /// The first item satisfying `pred`, assuming that `pred` is false for a
    /// prefix of the set and true afterwards.
    pub fn find_first(&self, mut pred: impl FnMut(&T) -> bool) -> Option<usize> {
        let i = self.items.partition_point(|x| !pred(x));
        (i < self.items.len()).then_some(i)
    }

    /// The last item satisfying `pred`, assuming that `pred` is true for a
    /// prefix of the set and false afterwards.
    pub fn find_last(&self, pred: impl FnMut(&T) -> bool) -> Option<usize> {
        self.items.partition_point(pred).checked_sub(1)
    }

    /// Asserts that the set is sorted with respect to `ctx`.
    #[cfg(test)]
    pub fn check_invariants(&self, ctx: &impl SweepOrdering<T>) {
        for w in self.items.windows(2) {
            assert!(
                ctx.cmp(&w[1], &w[0]) != Ordering::Less,
                "active set out of order: {:?} before {:?}",
                w[0],
                w[1]
            );
        }
    }
}
