//! A graph over planar points, with edges between mutually visible points.
//!
//! Vertices are identified by their exact coordinates. The graph is generic
//! over a per-edge payload: the spanner uses it bare, while the nudger hangs
//! corridor bounds off every edge.

use std::collections::HashMap;

use ordered_float::OrderedFloat;

use crate::geom::Point;

/// Exact-coordinate key for point lookups.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct PointKey(OrderedFloat<f64>, OrderedFloat<f64>);

impl From<Point> for PointKey {
    fn from(p: Point) -> Self {
        PointKey(OrderedFloat(p.x), OrderedFloat(p.y))
    }
}

#[derive(Clone, Copy, PartialOrd, Ord, PartialEq, Eq, Hash)]
pub struct VertexIdx(pub usize);

impl std::fmt::Debug for VertexIdx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "p_{}", self.0)
    }
}

#[derive(Clone, Copy, PartialOrd, Ord, PartialEq, Eq, Hash)]
pub struct EdgeIdx(pub usize);

impl std::fmt::Debug for EdgeIdx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "e_{}", self.0)
    }
}

#[derive(Clone, Debug)]
pub struct Edge<E> {
    pub source: VertexIdx,
    pub target: VertexIdx,
    pub data: E,
    removed: bool,
}

#[derive(Clone, Debug)]
pub struct VisibilityGraph<E = ()> {
    points: Vec<Point>,
    index: HashMap<PointKey, VertexIdx>,
    out_edges: Vec<Vec<EdgeIdx>>,
    in_edges: Vec<Vec<EdgeIdx>>,
    edges: Vec<Edge<E>>,
}

impl<E> Default for VisibilityGraph<E> {
    fn default() -> Self {
        Self {
            points: Vec::new(),
            index: HashMap::new(),
            out_edges: Vec::new(),
            in_edges: Vec::new(),
            edges: Vec::new(),
        }
    }
}

impl<E> VisibilityGraph<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn find_vertex(&self, p: Point) -> Option<VertexIdx> {
        self.index.get(&PointKey::from(p)).copied()
    }

    pub fn add_vertex(&mut self, p: Point) -> VertexIdx {
        if let Some(v) = self.find_vertex(p) {
            return v;
        }
        let v = VertexIdx(self.points.len());
        self.points.push(p);
        self.out_edges.push(Vec::new());
        self.in_edges.push(Vec::new());
        self.index.insert(PointKey::from(p), v);
        v
    }

    pub fn point(&self, v: VertexIdx) -> Point {
        self.points[v.0]
    }

    pub fn vertices(&self) -> impl Iterator<Item = VertexIdx> {
        (0..self.points.len()).map(VertexIdx)
    }

    pub fn vertex_count(&self) -> usize {
        self.points.len()
    }

    /// Finds a live edge between the two vertices, in either orientation.
    pub fn find_edge(&self, a: VertexIdx, b: VertexIdx) -> Option<EdgeIdx> {
        self.out_edges[a.0]
            .iter()
            .copied()
            .find(|&e| self.edges[e.0].target == b)
            .or_else(|| {
                self.in_edges[a.0]
                    .iter()
                    .copied()
                    .find(|&e| self.edges[e.0].source == b)
            })
    }

    /// Adds an edge from `a` to `b`, or returns the existing edge between them.
    ///
    /// Returns `None` if `a` and `b` are the same point.
    pub fn add_edge_with(
        &mut self,
        a: Point,
        b: Point,
        data: impl FnOnce(Point, Point) -> E,
    ) -> Option<EdgeIdx> {
        let va = self.add_vertex(a);
        let vb = self.add_vertex(b);
        if va == vb {
            return None;
        }
        if let Some(e) = self.find_edge(va, vb) {
            return Some(e);
        }
        let e = EdgeIdx(self.edges.len());
        self.edges.push(Edge {
            source: va,
            target: vb,
            data: data(a, b),
            removed: false,
        });
        self.out_edges[va.0].push(e);
        self.in_edges[vb.0].push(e);
        Some(e)
    }

    pub fn remove_edge(&mut self, e: EdgeIdx) {
        let edge = &mut self.edges[e.0];
        if edge.removed {
            return;
        }
        edge.removed = true;
        let (s, t) = (edge.source, edge.target);
        self.out_edges[s.0].retain(|&x| x != e);
        self.in_edges[t.0].retain(|&x| x != e);
    }

    pub fn edge(&self, e: EdgeIdx) -> &Edge<E> {
        &self.edges[e.0]
    }

    pub fn edge_mut(&mut self, e: EdgeIdx) -> &mut Edge<E> {
        &mut self.edges[e.0]
    }

    pub fn source_point(&self, e: EdgeIdx) -> Point {
        self.point(self.edges[e.0].source)
    }

    pub fn target_point(&self, e: EdgeIdx) -> Point {
        self.point(self.edges[e.0].target)
    }

    /// All edges that haven't been removed.
    pub fn edges(&self) -> impl Iterator<Item = EdgeIdx> + '_ {
        self.edges
            .iter()
            .enumerate()
            .filter(|(_, e)| !e.removed)
            .map(|(i, _)| EdgeIdx(i))
    }

    pub fn edge_count(&self) -> usize {
        self.edges.iter().filter(|e| !e.removed).count()
    }

    pub fn out_edges(&self, v: VertexIdx) -> &[EdgeIdx] {
        &self.out_edges[v.0]
    }

    pub fn in_edges(&self, v: VertexIdx) -> &[EdgeIdx] {
        &self.in_edges[v.0]
    }

    /// Edges touching `v`, in either orientation.
    pub fn incident_edges(&self, v: VertexIdx) -> impl Iterator<Item = EdgeIdx> + '_ {
        self.in_edges[v.0]
            .iter()
            .chain(self.out_edges[v.0].iter())
            .copied()
    }

    pub fn degree(&self, v: VertexIdx) -> usize {
        self.in_edges[v.0].len() + self.out_edges[v.0].len()
    }
}

impl VisibilityGraph<()> {
    pub fn add_edge(&mut self, a: Point, b: Point) -> Option<EdgeIdx> {
        self.add_edge_with(a, b, |_, _| ())
    }

    /// Copies every edge of `other` into `self`.
    pub fn extend_from(&mut self, other: &VisibilityGraph<()>) {
        for e in other.edges() {
            self.add_edge(other.source_point(e), other.target_point(e));
        }
    }
}
