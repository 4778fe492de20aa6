use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Knobs for the spanner and the nudger.
///
/// Deserializing fills any missing field from [`RoutingSettings::default`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingSettings {
    /// Nudged parallel paths end up at least twice this far apart.
    pub corner_fit_radius: f64,
    /// Aperture of the visibility cones, in degrees.
    pub cone_angle: f64,
    pub remove_staircases: bool,
    /// If positive, the spanner closes cones against the bounding box of the
    /// obstacles grown by this much, instead of leaving them open.
    pub border_padding: f64,
}

impl Default for RoutingSettings {
    fn default() -> Self {
        RoutingSettings {
            corner_fit_radius: 3.0,
            cone_angle: 30.0,
            remove_staircases: true,
            border_padding: 0.0,
        }
    }
}

impl RoutingSettings {
    pub fn edge_separation(&self) -> f64 {
        2.0 * self.corner_fit_radius
    }

    pub fn cone_angle_radians(&self) -> f64 {
        self.cone_angle.to_radians()
    }

    pub fn validate(&self) -> Result<()> {
        if !self.corner_fit_radius.is_finite() || self.corner_fit_radius <= 0.0 {
            return Err(Error::InvalidSettings(format!(
                "corner fit radius must be positive, got {}",
                self.corner_fit_radius
            )));
        }
        if !(self.cone_angle > 0.0 && self.cone_angle < 180.0) {
            return Err(Error::InvalidSettings(format!(
                "cone angle must be strictly between 0 and 180 degrees, got {}",
                self.cone_angle
            )));
        }
        if !self.border_padding.is_finite() {
            return Err(Error::InvalidSettings("border padding must be finite".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn defaults_are_valid() {
        let s = RoutingSettings::default();
        s.validate().unwrap();
        assert_eq!(s.edge_separation(), 6.0);
        assert!((s.cone_angle_radians() - std::f64::consts::PI / 6.0).abs() < 1e-12);
    }

    #[test]
    fn rejects_bad_values() {
        let s = RoutingSettings {
            corner_fit_radius: 0.0,
            ..Default::default()
        };
        assert_matches!(s.validate(), Err(Error::InvalidSettings(_)));

        let s = RoutingSettings {
            cone_angle: 180.0,
            ..Default::default()
        };
        assert_matches!(s.validate(), Err(Error::InvalidSettings(_)));
    }

    #[test]
    fn partial_settings_fill_from_default() {
        let s: RoutingSettings = serde_json::from_str(r#"{"corner_fit_radius": 1.5}"#).unwrap();
        assert_eq!(s.corner_fit_radius, 1.5);
        assert_eq!(s.cone_angle, 30.0);
        assert!(s.remove_staircases);
    }
}
