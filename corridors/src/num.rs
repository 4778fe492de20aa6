//! Tolerances, and the approximate comparisons built on them.
//!
//! Everything in this crate works on plain `f64`s; comparisons that decide
//! combinatorial questions (is this point on that line, are these two events
//! simultaneous) go through the helpers here so that they all agree on what
//! "close" means.

/// Two coordinates closer than this are considered equal.
pub const DISTANCE_EPSILON: f64 = 1e-6;

pub const SQUARE_OF_DISTANCE_EPSILON: f64 = DISTANCE_EPSILON * DISTANCE_EPSILON;

/// How many decimal digits we keep when rounding path points.
pub const DISTANCE_EPSILON_PRECISION: i32 = 6;

/// Slack used when deciding which side of an obstacle boundary a corridor is on.
pub const INTERSECTION_EPSILON: f64 = 1e-4;

/// Events whose sweep coordinates differ by less than this are "at the same Z".
pub const TOLERANCE: f64 = 1e-8;

pub fn close(a: f64, b: f64) -> bool {
    (a - b).abs() <= DISTANCE_EPSILON
}

pub fn round(x: f64) -> f64 {
    let scale = 10f64.powi(DISTANCE_EPSILON_PRECISION);
    (x * scale).round() / scale
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use proptest::prelude::*;

    // Kind of like Arbitrary, but
    // - it's a local trait, so we can impl it for whatever we want, and
    // - it only returns "reasonable" values.
    pub trait Reasonable {
        type Strategy: Strategy<Value = Self>;
        fn reasonable() -> Self::Strategy;
    }

    impl<S: Reasonable, T: Reasonable> Reasonable for (S, T) {
        type Strategy = (S::Strategy, T::Strategy);

        fn reasonable() -> Self::Strategy {
            (S::reasonable(), T::reasonable())
        }
    }

    impl Reasonable for f64 {
        type Strategy = BoxedStrategy<f64>;

        fn reasonable() -> Self::Strategy {
            (-1e4..1e4).boxed()
        }
    }

    proptest! {
        #[test]
        fn rounding_is_idempotent(x in f64::reasonable()) {
            let r = round(x);
            assert_eq!(round(r), r);
            assert!(close(r, x));
        }
    }
}
