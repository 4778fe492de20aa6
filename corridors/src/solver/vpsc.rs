//! Separation constraints solved by incremental block projection.
//!
//! We minimize `sum w_i (x_i - d_i)^2` subject to constraints of the form
//! `x_l + gap <= x_r`. Variables are grouped into blocks: within a block, the
//! variables are held at fixed offsets from each other by a tree of active
//! (tight) constraints, and the block as a whole sits at the weighted average
//! of where its variables want to be.
//!
//! [`Solver::solve`] first satisfies every constraint by merging blocks, then
//! refines the solution by splitting blocks wherever an active constraint has
//! a negative Lagrange multiplier, i.e. wherever the two halves of the block
//! would rather be further apart.

use log::{trace, warn};
use petgraph::graph::{DiGraph, NodeIndex};

#[derive(Clone, Copy, PartialOrd, Ord, PartialEq, Eq, Hash)]
pub struct VarIdx(pub usize);

impl std::fmt::Debug for VarIdx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "x_{}", self.0)
    }
}

/// Violations smaller than this are ignored.
const VIOLATION_EPSILON: f64 = 1e-7;

/// Active constraints whose multiplier is more negative than this get split.
const MULTIPLIER_EPSILON: f64 = 1e-5;

#[derive(Clone, Debug)]
struct Variable {
    desired: f64,
    weight: f64,
    offset: f64,
    block: usize,
    ins: Vec<usize>,
    outs: Vec<usize>,
}

#[derive(Clone, Debug)]
struct Constraint {
    left: VarIdx,
    right: VarIdx,
    gap: f64,
    active: bool,
    lm: f64,
}

#[derive(Clone, Debug, Default)]
struct Block {
    vars: Vec<usize>,
    weighted_position: f64,
    weight: f64,
}

impl Block {
    fn position(&self) -> f64 {
        self.weighted_position / self.weight
    }
}

/// Counters describing one solve.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SolveStats {
    pub merges: usize,
    pub splits: usize,
}

#[derive(Clone, Debug, Default)]
pub struct Solver {
    vars: Vec<Variable>,
    constraints: Vec<Constraint>,
    blocks: Vec<Block>,
}

impl Solver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_variable(&mut self, desired: f64, weight: f64) -> VarIdx {
        debug_assert!(weight > 0.0);
        let v = VarIdx(self.vars.len());
        self.vars.push(Variable {
            desired,
            weight,
            offset: 0.0,
            block: 0,
            ins: Vec::new(),
            outs: Vec::new(),
        });
        v
    }

    /// Requires `left + gap <= right`.
    pub fn add_constraint(&mut self, left: VarIdx, right: VarIdx, gap: f64) {
        let c = self.constraints.len();
        self.constraints.push(Constraint {
            left,
            right,
            gap,
            active: false,
            lm: 0.0,
        });
        self.vars[left.0].outs.push(c);
        self.vars[right.0].ins.push(c);
    }

    pub fn position(&self, v: VarIdx) -> f64 {
        let var = &self.vars[v.0];
        self.blocks[var.block].position() + var.offset
    }

    fn violation(&self, c: usize) -> f64 {
        let c = &self.constraints[c];
        self.position(c.left) + c.gap - self.position(c.right)
    }

    pub fn solve(&mut self) -> SolveStats {
        self.init_blocks();
        let mut stats = SolveStats::default();
        self.satisfy(&mut stats);

        let max_splits = 100 + 10 * self.constraints.len();
        loop {
            self.compute_multipliers();
            let Some(c) = self.most_negative_multiplier() else {
                break;
            };
            if stats.splits >= max_splits {
                warn!("giving up refining after {} splits", stats.splits);
                break;
            }
            self.split(c);
            stats.splits += 1;
            self.merge_violated(&mut stats);
        }
        trace!("solved {} variables: {:?}", self.vars.len(), stats);
        stats
    }

    fn init_blocks(&mut self) {
        self.blocks.clear();
        for (i, v) in self.vars.iter_mut().enumerate() {
            v.offset = 0.0;
            v.block = i;
            self.blocks.push(Block {
                vars: vec![i],
                weighted_position: v.weight * v.desired,
                weight: v.weight,
            });
        }
        for c in &mut self.constraints {
            c.active = false;
            c.lm = 0.0;
        }
    }

    // Falls back to index order if the constraints have a cycle.
    fn topological_order(&self) -> Vec<usize> {
        let mut g = DiGraph::<(), ()>::with_capacity(self.vars.len(), self.constraints.len());
        for _ in &self.vars {
            g.add_node(());
        }
        for c in &self.constraints {
            g.add_edge(NodeIndex::new(c.left.0), NodeIndex::new(c.right.0), ());
        }
        match petgraph::algo::toposort(&g, None) {
            Ok(order) => order.into_iter().map(|n| n.index()).collect(),
            Err(_) => {
                warn!("separation constraints have a cycle");
                (0..self.vars.len()).collect()
            }
        }
    }

    fn satisfy(&mut self, stats: &mut SolveStats) {
        for v in self.topological_order() {
            let mut b = self.vars[v].block;
            while let Some(c) = self.most_violated_into(b) {
                let left = self.vars[self.constraints[c].left.0].block;
                b = self.merge(left, b, c);
                stats.merges += 1;
            }
        }
        self.merge_violated(stats);
    }

    /// The most violated constraint coming into block `b` from another block.
    fn most_violated_into(&self, b: usize) -> Option<usize> {
        self.blocks[b]
            .vars
            .iter()
            .flat_map(|&v| self.vars[v].ins.iter().copied())
            .filter(|&c| self.vars[self.constraints[c].left.0].block != b)
            .map(|c| (c, self.violation(c)))
            .filter(|&(_, viol)| viol > VIOLATION_EPSILON)
            .max_by(|x, y| x.1.total_cmp(&y.1))
            .map(|(c, _)| c)
    }

    fn merge_violated(&mut self, stats: &mut SolveStats) {
        loop {
            let worst = (0..self.constraints.len())
                .filter(|&c| {
                    let c = &self.constraints[c];
                    self.vars[c.left.0].block != self.vars[c.right.0].block
                })
                .map(|c| (c, self.violation(c)))
                .filter(|&(_, viol)| viol > VIOLATION_EPSILON)
                .max_by(|a, b| a.1.total_cmp(&b.1));
            let Some((c, _)) = worst else {
                break;
            };
            let left = self.vars[self.constraints[c].left.0].block;
            let right = self.vars[self.constraints[c].right.0].block;
            self.merge(left, right, c);
            stats.merges += 1;
        }
    }

    /// Merges two blocks, making `c` tight and active. Returns the surviving block.
    fn merge(&mut self, left: usize, right: usize, c: usize) -> usize {
        debug_assert_ne!(left, right);
        let con = &self.constraints[c];
        // The shift of the right block's offsets that puts `c` exactly at its gap.
        let dist = self.vars[con.left.0].offset + con.gap - self.vars[con.right.0].offset;
        self.constraints[c].active = true;

        let (keep, gone, shift) = if self.blocks[left].vars.len() >= self.blocks[right].vars.len()
        {
            (left, right, dist)
        } else {
            (right, left, -dist)
        };
        let moved = std::mem::take(&mut self.blocks[gone].vars);
        for &v in &moved {
            self.vars[v].offset += shift;
            self.vars[v].block = keep;
        }
        self.blocks[keep].vars.extend(moved);
        self.blocks[gone].weight = 0.0;
        self.blocks[gone].weighted_position = 0.0;
        self.recompute(keep);
        keep
    }

    fn recompute(&mut self, b: usize) {
        let (wp, w) = self.blocks[b]
            .vars
            .iter()
            .map(|&v| &self.vars[v])
            .fold((0.0, 0.0), |(wp, w), v| {
                (wp + v.weight * (v.desired - v.offset), w + v.weight)
            });
        self.blocks[b].weighted_position = wp;
        self.blocks[b].weight = w;
    }

    fn compute_multipliers(&mut self) {
        for b in 0..self.blocks.len() {
            if let Some(&root) = self.blocks[b].vars.first() {
                self.dfdv(root, None);
            }
        }
    }

    // The derivative of the objective with respect to `v`, summed over the
    // subtree of active constraints hanging off `v`. Records the multipliers
    // on the way.
    fn dfdv(&mut self, v: usize, parent: Option<usize>) -> f64 {
        let var = &self.vars[v];
        let mut dfdv = var.weight * (self.position(VarIdx(v)) - var.desired);
        for i in 0..self.vars[v].outs.len() {
            let c = self.vars[v].outs[i];
            if !self.constraints[c].active || Some(c) == parent {
                continue;
            }
            let lm = self.dfdv(self.constraints[c].right.0, Some(c));
            self.constraints[c].lm = lm;
            dfdv += lm;
        }
        for i in 0..self.vars[v].ins.len() {
            let c = self.vars[v].ins[i];
            if !self.constraints[c].active || Some(c) == parent {
                continue;
            }
            let lm = -self.dfdv(self.constraints[c].left.0, Some(c));
            self.constraints[c].lm = lm;
            dfdv -= lm;
        }
        dfdv
    }

    fn most_negative_multiplier(&self) -> Option<usize> {
        self.constraints
            .iter()
            .enumerate()
            .filter(|(_, c)| c.active && c.lm < -MULTIPLIER_EPSILON)
            .min_by(|a, b| a.1.lm.total_cmp(&b.1.lm))
            .map(|(i, _)| i)
    }

    /// Deactivates `c`, splitting its block in two.
    fn split(&mut self, c: usize) {
        self.constraints[c].active = false;
        let old = self.vars[self.constraints[c].left.0].block;
        let new = self.blocks.len();
        self.blocks.push(Block::default());

        let mut stack = vec![self.constraints[c].right.0];
        let mut moved = Vec::new();
        while let Some(v) = stack.pop() {
            if self.vars[v].block == new {
                continue;
            }
            self.vars[v].block = new;
            moved.push(v);
            let var = &self.vars[v];
            for &c in var.outs.iter().chain(&var.ins) {
                let con = &self.constraints[c];
                if con.active {
                    let other = if con.left.0 == v { con.right.0 } else { con.left.0 };
                    if self.vars[other].block != new {
                        stack.push(other);
                    }
                }
            }
        }
        self.blocks[old].vars.retain(|&v| self.vars[v].block == old);
        self.blocks[new].vars = moved;
        self.recompute(old);
        self.recompute(new);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn separates_two_variables() {
        let mut s = Solver::new();
        let a = s.add_variable(0.0, 1.0);
        let b = s.add_variable(0.0, 1.0);
        s.add_constraint(a, b, 3.0);
        s.solve();
        assert!((s.position(a) + 1.5).abs() < 1e-9);
        assert!((s.position(b) - 1.5).abs() < 1e-9);
    }

    #[test]
    fn satisfied_constraints_dont_move_anything() {
        let mut s = Solver::new();
        let a = s.add_variable(0.0, 1.0);
        let b = s.add_variable(10.0, 1.0);
        s.add_constraint(a, b, 3.0);
        let stats = s.solve();
        assert_eq!(stats, SolveStats::default());
        assert_eq!(s.position(a), 0.0);
        assert_eq!(s.position(b), 10.0);
    }

    #[test]
    fn heavy_variables_barely_move() {
        let mut s = Solver::new();
        let fixed = s.add_variable(0.0, 1e9);
        let a = s.add_variable(-1.0, 1.0);
        s.add_constraint(fixed, a, 2.0);
        s.solve();
        assert!(s.position(fixed).abs() < 1e-6);
        assert!((s.position(a) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn refinement_splits_blocks() {
        // a and b get merged first, and then pulled apart again by refinement.
        let mut s = Solver::new();
        let a = s.add_variable(0.0, 1.0);
        let b = s.add_variable(0.0, 1.0);
        let c = s.add_variable(20.0, 1.0);
        s.add_constraint(a, b, 1.0);
        s.add_constraint(b, c, 1.0);
        s.add_constraint(a, c, 25.0);
        s.solve();
        assert!(s.position(c) - s.position(a) >= 25.0 - 1e-6);
        assert!(s.position(b) - s.position(a) >= 1.0 - 1e-6);
        assert!(s.position(c) - s.position(b) >= 1.0 - 1e-6);
        // Pushing c away leaves b free to sit where it wants.
        assert!(s.position(b).abs() < 1e-6);
    }

    proptest! {
        #[test]
        fn chains_are_feasible(
            desired in proptest::collection::vec(-50.0..50.0f64, 1..20),
            gaps in proptest::collection::vec(0.0..5.0f64, 20),
        ) {
            let mut s = Solver::new();
            let vars: Vec<_> = desired.iter().map(|&d| s.add_variable(d, 1.0)).collect();
            for (w, gap) in vars.windows(2).zip(&gaps) {
                s.add_constraint(w[0], w[1], *gap);
            }
            s.solve();
            for (w, gap) in vars.windows(2).zip(&gaps) {
                prop_assert!(s.position(w[1]) - s.position(w[0]) >= gap - 1e-6);
            }
        }
    }
}
