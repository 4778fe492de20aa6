//! Ports, and the group hierarchy that paths have to respect.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::geom::{Point, Rect};

#[derive(Clone, Copy, PartialOrd, Ord, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupIdx(pub usize);

impl std::fmt::Debug for GroupIdx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "g_{}", self.0)
    }
}

/// The shape a port is attached to.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PortShape {
    pub bbox: Rect,
    /// The innermost group containing the shape.
    pub group: Option<GroupIdx>,
}

/// Where a path starts or ends.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Port {
    pub location: Point,
    pub shape: Option<PortShape>,
}

impl Port {
    /// A port that isn't attached to anything.
    pub fn free(location: Point) -> Self {
        Port {
            location,
            shape: None,
        }
    }

    pub fn on_shape(location: Point, bbox: Rect) -> Self {
        Port {
            location,
            shape: Some(PortShape { bbox, group: None }),
        }
    }

    /// Puts the port's shape into a group. Does nothing for free ports.
    pub fn in_group(mut self, group: GroupIdx) -> Self {
        if let Some(shape) = &mut self.shape {
            shape.group = Some(group);
        }
        self
    }
}

impl From<Point> for Port {
    fn from(location: Point) -> Self {
        Port::free(location)
    }
}

/// A forest of nested rectangular groups.
#[derive(Clone, Debug, Default)]
pub struct Groups {
    rects: Vec<Rect>,
    parents: Vec<Option<GroupIdx>>,
}

impl Groups {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, rect: Rect, parent: Option<GroupIdx>) -> GroupIdx {
        debug_assert!(parent.map_or(true, |p| p.0 < self.rects.len()));
        self.rects.push(rect);
        self.parents.push(parent);
        GroupIdx(self.rects.len() - 1)
    }

    pub fn len(&self) -> usize {
        self.rects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }

    pub fn rect(&self, g: GroupIdx) -> Rect {
        self.rects[g.0]
    }

    pub fn parent(&self, g: GroupIdx) -> Option<GroupIdx> {
        self.parents[g.0]
    }

    /// The group and everything above it.
    pub fn ancestors(&self, g: GroupIdx) -> BTreeSet<GroupIdx> {
        std::iter::successors(Some(g), |&g| self.parent(g)).collect()
    }

    fn hit_by(&self, p: Point) -> BTreeSet<GroupIdx> {
        (0..self.rects.len())
            .map(GroupIdx)
            .filter(|&g| self.rect(g).contains(p))
            .collect()
    }

    /// The groups a path ending at `port` lives in. A free port lives in
    /// every group it lies inside.
    fn port_ancestors(&self, port: &Port) -> BTreeSet<GroupIdx> {
        match port.shape {
            Some(shape) => shape.group.map(|g| self.ancestors(g)).unwrap_or_default(),
            None => self.hit_by(port.location),
        }
    }

    /// The innermost groups that contain both ports.
    pub fn min_common_ancestors(&self, source: &Port, target: &Port) -> Vec<GroupIdx> {
        let common: BTreeSet<GroupIdx> = self
            .port_ancestors(source)
            .intersection(&self.port_ancestors(target))
            .copied()
            .collect();
        common
            .iter()
            .copied()
            .filter(|&g| !common.iter().any(|&h| self.parent(h) == Some(g)))
            .collect()
    }
}
