//! Nudging: separating rectilinear paths that share corridors.
//!
//! The paths coming out of a shortest-path search over the visibility graph
//! happily run on top of each other. [`nudge_paths`] rewrites them so that
//! parallel segments sharing a corridor are spread apart, obstacles are
//! still avoided, and paths that needn't cross don't.

use log::info;
use serde::{Deserialize, Serialize};

use crate::{
    config::RoutingSettings,
    error::{Error, Result},
    geom::{Direction, Point},
    obstacle::Obstacles,
};

mod axis_edge;
mod combinatorial;
mod free_space;
mod groups;
mod linked;
mod merge;
mod nudger;
mod refine;
mod segment;
mod splitter;
mod staircase;

pub use groups::{GroupIdx, Groups, Port, PortShape};

use nudger::{build_polyline, Nudger};
use staircase::StaircaseRemover;

/// A rectilinear path between two ports.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Path {
    pub points: Vec<Point>,
    pub source: Port,
    pub target: Port,
    /// The width of the line drawing the path.
    #[serde(default)]
    pub width: f64,
    #[serde(default)]
    pub source_arrowhead: Option<f64>,
    #[serde(default)]
    pub target_arrowhead: Option<f64>,
}

impl Path {
    pub fn new(points: Vec<Point>, source: impl Into<Port>, target: impl Into<Port>) -> Self {
        Path {
            points,
            source: source.into(),
            target: target.into(),
            width: 0.0,
            source_arrowhead: None,
            target_arrowhead: None,
        }
    }

    pub fn with_width(mut self, width: f64) -> Self {
        self.width = width;
        self
    }

    /// Arrowheads don't get drawn here, but their widths need room.
    pub fn with_arrowheads(mut self, source: Option<f64>, target: Option<f64>) -> Self {
        self.source_arrowhead = source;
        self.target_arrowhead = target;
        self
    }

    fn is_finite(&self) -> bool {
        self.points.iter().all(|p| p.is_finite())
            && self.source.location.is_finite()
            && self.target.location.is_finite()
            && self.width.is_finite()
    }
}

/// Nudges the paths apart, in place.
///
/// The paths must be rectilinear. Paths that end up with fewer than two
/// points become the straight segment between their ports.
pub fn nudge_paths(
    paths: &mut [Path],
    obstacles: &Obstacles,
    groups: &Groups,
    settings: &RoutingSettings,
) -> Result<()> {
    settings.validate()?;
    if paths.is_empty() {
        return Ok(());
    }
    if !paths.iter().all(Path::is_finite) {
        return Err(Error::NonFinite);
    }
    info!(
        "nudging {} paths around {} obstacles",
        paths.len(),
        obstacles.len()
    );

    let mut nudger = Nudger::new(paths, obstacles, groups, settings.edge_separation());
    nudger.calculate(Direction::North, true)?;
    nudger.calculate(Direction::East, false)?;
    nudger.calculate(Direction::North, false)?;

    if settings.remove_staircases {
        StaircaseRemover::new(paths, obstacles).remove_staircases();
    }
    for path in paths.iter_mut() {
        path.points = build_polyline(&path.points, path.source.location, path.target.location);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn p(x: f64, y: f64) -> Point {
        Point::new(x, y)
    }

    #[test]
    fn no_paths() {
        let mut paths: Vec<Path> = Vec::new();
        nudge_paths(&mut paths, &Obstacles::new(), &Groups::new(), &RoutingSettings::default())
            .unwrap();
    }

    #[test]
    fn bad_input() {
        let settings = RoutingSettings::default();
        let (obstacles, groups) = (Obstacles::new(), Groups::new());

        let mut paths = vec![Path::new(
            vec![p(0.0, 0.0), p(f64::NAN, 1.0)],
            p(0.0, 0.0),
            p(0.0, 1.0),
        )];
        assert_matches!(
            nudge_paths(&mut paths, &obstacles, &groups, &settings),
            Err(Error::NonFinite)
        );

        let mut paths = vec![Path::new(
            vec![p(0.0, 0.0), p(3.0, 0.0), p(5.0, 2.0)],
            p(0.0, 0.0),
            p(5.0, 2.0),
        )];
        assert_matches!(
            nudge_paths(&mut paths, &obstacles, &groups, &settings),
            Err(Error::NotRectilinear { .. })
        );

        let bad = RoutingSettings {
            corner_fit_radius: 0.0,
            ..RoutingSettings::default()
        };
        assert_matches!(
            nudge_paths(&mut paths, &obstacles, &groups, &bad),
            Err(Error::InvalidSettings(_))
        );
    }

    #[test]
    fn paths_get_their_ports_back() {
        let mut paths = vec![Path::new(
            vec![p(0.0, 1.0), p(0.0, 5.0), p(4.0, 5.0)],
            p(0.0, 0.0),
            p(6.0, 5.0),
        )];
        nudge_paths(&mut paths, &Obstacles::new(), &Groups::new(), &RoutingSettings::default())
            .unwrap();
        insta::assert_debug_snapshot!(paths[0].points, @r"
        [
            (0.0, 0.0),
            (0.0, 5.0),
            (6.0, 5.0),
        ]
        ");
    }
}
