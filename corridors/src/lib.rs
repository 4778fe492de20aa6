//! Rectilinear edge routing around polygonal obstacles.
//!
//! Routing happens in two stages. The [`ConeSpanner`] sweeps narrow cones
//! across the plane to build a sparse [`VisibilityGraph`] between obstacle
//! vertices and ports, in which shortest paths can be searched. Once the
//! shortest paths have been made rectilinear, [`nudge_paths`] spreads apart
//! the ones that share corridors, keeping them clear of the obstacles, and
//! straightens the staircases that nudging leaves behind.

mod cone;
mod config;
mod error;
pub mod geom;
mod nudging;
mod num;
mod obstacle;
mod obstacle_side;
mod order;
mod solver;
mod spanner;
mod sweep;
mod visibility;

pub use config::RoutingSettings;
pub use error::{Error, Result};
pub use geom::{Direction, Point, Rect};
pub use nudging::{nudge_paths, GroupIdx, Groups, Path, Port, PortShape};
pub use num::{DISTANCE_EPSILON, INTERSECTION_EPSILON};
pub use obstacle::{ObstacleIdx, Obstacles, VertIdx};
pub use spanner::{ConeSpanner, SweepStats};
pub use visibility::{Edge, EdgeIdx, VertexIdx, VisibilityGraph};
