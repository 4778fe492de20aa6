use crate::geom::Point;

/// The ways a routing call can fail.
///
/// Numerical trouble inside the sweeps is never reported here: it is repaired
/// locally. These are all problems with the input.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum Error {
    /// A path edge is neither horizontal nor vertical.
    #[error("path edge {from:?} -> {to:?} is not rectilinear")]
    NotRectilinear { from: Point, to: Point },

    #[error("obstacle {index} is invalid: {reason}")]
    InvalidObstacle { index: usize, reason: &'static str },

    /// At least one input coordinate was infinite or NaN.
    #[error("input coordinates must be finite")]
    NonFinite,

    #[error("invalid routing settings: {0}")]
    InvalidSettings(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
