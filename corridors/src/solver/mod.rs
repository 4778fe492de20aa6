//! One-dimensional separation solving for the nudger.
//!
//! [`UniformSolver`] is the interface the nudger talks to: variables with an
//! ideal position, a width and optional bounds, ordering constraints between
//! them, and one uniform separation. It turns bounds into fixed pseudo
//! variables, breaks cycles in the ordering, and hands the result to the
//! projection [`vpsc::Solver`].

use std::collections::{BTreeSet, HashMap};

use log::debug;
use ordered_float::OrderedFloat;
use petgraph::graph::DiGraph;

pub mod vpsc;

use vpsc::VarIdx;

/// How hard fixed variables resist moving, relative to free ones.
const FIXED_WEIGHT: f64 = 1e9;

#[derive(Clone, Debug)]
struct UniformVar {
    position: f64,
    ideal: f64,
    width: f64,
    low: f64,
    high: f64,
    fixed: bool,
}

#[derive(Clone, Debug)]
pub struct UniformSolver {
    separation: f64,
    vars: Vec<UniformVar>,
    constraints: BTreeSet<(usize, usize)>,
}

impl UniformSolver {
    pub fn new(separation: f64) -> Self {
        UniformSolver {
            separation,
            vars: Vec::new(),
            constraints: BTreeSet::new(),
        }
    }

    pub fn add_variable(&mut self, position: f64, ideal: f64, width: f64) -> usize {
        self.push(UniformVar {
            position,
            ideal,
            width,
            low: f64::NEG_INFINITY,
            high: f64::INFINITY,
            fixed: false,
        })
    }

    pub fn add_fixed_variable(&mut self, position: f64) -> usize {
        self.push(UniformVar {
            position,
            ideal: position,
            width: 0.0,
            low: f64::NEG_INFINITY,
            high: f64::INFINITY,
            fixed: true,
        })
    }

    fn push(&mut self, var: UniformVar) -> usize {
        self.vars.push(var);
        self.vars.len() - 1
    }

    pub fn set_low_bound(&mut self, id: usize, bound: f64) {
        let v = &mut self.vars[id];
        v.low = v.low.max(bound);
    }

    pub fn set_upper_bound(&mut self, id: usize, bound: f64) {
        let v = &mut self.vars[id];
        v.high = v.high.min(bound);
    }

    /// Requires variable `left` to end up at least one separation to the left of `right`.
    pub fn add_constraint(&mut self, left: usize, right: usize) {
        if left != right {
            self.constraints.insert((left, right));
        }
    }

    pub fn position(&self, id: usize) -> f64 {
        self.vars[id].position
    }

    pub fn solve(&mut self) {
        let n = self.vars.len();

        // One fixed pseudo variable per distinct bound.
        let mut bound_ids: HashMap<OrderedFloat<f64>, usize> = HashMap::new();
        let mut bounds = Vec::new();
        let mut bound_id = |b: f64| {
            *bound_ids.entry(OrderedFloat(b)).or_insert_with(|| {
                bounds.push(b);
                n + bounds.len() - 1
            })
        };
        let mut constraints = self.constraints.clone();
        for (i, v) in self.vars.iter().enumerate() {
            if v.fixed {
                continue;
            }
            if v.low.is_finite() {
                constraints.insert((bound_id(v.low), i));
            }
            if v.high.is_finite() {
                constraints.insert((i, bound_id(v.high)));
            }
        }

        let constraints = remove_cycles(n + bounds.len(), constraints);

        let mut solver = vpsc::Solver::new();
        for v in &self.vars {
            if v.fixed {
                solver.add_variable(v.position, FIXED_WEIGHT);
            } else {
                solver.add_variable(v.ideal, 1.0);
            }
        }
        for &b in &bounds {
            solver.add_variable(b, FIXED_WEIGHT);
        }
        let width = |i: usize| self.vars.get(i).map_or(0.0, |v| v.width);
        for &(a, b) in &constraints {
            let gap = self.separation + (width(a) + width(b)) / 2.0;
            solver.add_constraint(VarIdx(a), VarIdx(b), gap);
        }
        let stats = solver.solve();
        debug!(
            "uniform solver: {} variables, {} bounds, {} constraints, {:?}",
            n,
            bounds.len(),
            constraints.len(),
            stats
        );

        for (i, v) in self.vars.iter_mut().enumerate() {
            v.position = solver.position(VarIdx(i));
        }
    }
}

/// Drops a feedback arc set, leaving the constraint graph acyclic.
fn remove_cycles(node_count: usize, constraints: BTreeSet<(usize, usize)>) -> Vec<(usize, usize)> {
    let mut g = DiGraph::<(), (usize, usize)>::with_capacity(node_count, constraints.len());
    let nodes: Vec<_> = (0..node_count).map(|_| g.add_node(())).collect();
    for &(a, b) in &constraints {
        g.add_edge(nodes[a], nodes[b], (a, b));
    }
    let feedback: BTreeSet<_> = petgraph::algo::greedy_feedback_arc_set(&g)
        .map(|e| *e.weight())
        .collect();
    if !feedback.is_empty() {
        debug!("dropping {} cyclic constraints", feedback.len());
    }
    constraints
        .into_iter()
        .filter(|c| !feedback.contains(c))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounded_pair() {
        let mut s = UniformSolver::new(2.0);
        let a = s.add_variable(0.0, 0.0, 1.0);
        let b = s.add_variable(0.0, 0.0, 1.0);
        for v in [a, b] {
            s.set_low_bound(v, -5.0);
            s.set_upper_bound(v, 5.0);
        }
        s.add_constraint(a, b);
        s.solve();
        assert!((s.position(a) + 1.5).abs() < 1e-6);
        assert!((s.position(b) - 1.5).abs() < 1e-6);
    }

    #[test]
    fn bounds_keep_their_distance() {
        let mut s = UniformSolver::new(2.0);
        let a = s.add_variable(0.0, 10.0, 0.0);
        s.set_upper_bound(a, 5.0);
        s.set_upper_bound(a, 7.0);
        s.solve();
        assert!((s.position(a) - 3.0).abs() < 1e-6);
    }

    #[test]
    fn fixed_variables_stay() {
        let mut s = UniformSolver::new(2.0);
        let f = s.add_fixed_variable(1.0);
        let a = s.add_variable(0.0, 0.0, 0.0);
        s.add_constraint(f, a);
        s.solve();
        assert!((s.position(f) - 1.0).abs() < 1e-6);
        assert!((s.position(a) - 3.0).abs() < 1e-6);
    }

    #[test]
    fn cycles_are_broken() {
        let mut s = UniformSolver::new(1.0);
        let a = s.add_variable(0.0, 0.0, 0.0);
        let b = s.add_variable(0.0, 0.0, 0.0);
        let c = s.add_variable(0.0, 0.0, 0.0);
        s.add_constraint(a, b);
        s.add_constraint(b, c);
        s.add_constraint(c, a);
        s.solve();
        let mut xs = [s.position(a), s.position(b), s.position(c)];
        xs.sort_by(f64::total_cmp);
        assert!(xs[1] - xs[0] >= 1.0 - 1e-6);
        assert!(xs[2] - xs[1] >= 1.0 - 1e-6);
    }
}
