//! Event search area computation.
//!
//! For every event the engine selects the stations lying inside a circular
//! search region. The region is either fixed or scaled with the event
//! magnitude by linear interpolation between two configured radii.

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// Search radius specification, in degrees.
///
/// The two forms mirror the accepted configuration shapes: a fixed
/// `{min, max}` pair, or a magnitude-scaled 4-tuple.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SearchRadius {
    MagnitudeScaled {
        minmag: f64,
        maxmag: f64,
        minmag_radius: f64,
        maxmag_radius: f64,
    },
    Fixed {
        #[serde(default)]
        min: f64,
        max: f64,
    },
}

impl SearchRadius {
    /// Validate the specification. Must be called once at configuration time,
    /// before any network activity.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match *self {
            SearchRadius::Fixed { min, max } => {
                if max <= 0.0 || min < 0.0 || max < min {
                    return Err(ConfigError::Validation(format!(
                        "search_radius: invalid fixed radii (min={min}, max={max})"
                    )));
                }
            }
            SearchRadius::MagnitudeScaled {
                minmag,
                maxmag,
                minmag_radius,
                maxmag_radius,
            } => {
                if maxmag < minmag {
                    return Err(ConfigError::Validation(format!(
                        "search_radius: maxmag ({maxmag}) < minmag ({minmag})"
                    )));
                }
                if maxmag_radius < minmag_radius {
                    return Err(ConfigError::Validation(format!(
                        "search_radius: maxmag_radius ({maxmag_radius}) < minmag_radius ({minmag_radius})"
                    )));
                }
                if minmag_radius <= 0.0 {
                    return Err(ConfigError::Validation(
                        "search_radius: radii must be positive".into(),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Radii `(min, max)` in degrees for an event of magnitude `magnitude`.
    ///
    /// Magnitude-scaled form: below `minmag` the radius is `minmag_radius`,
    /// above `maxmag` it is `maxmag_radius`, in between it is linearly
    /// interpolated. When `minmag == maxmag` the function degenerates to a
    /// step: `maxmag_radius` for `M >= minmag`, `minmag_radius` otherwise.
    /// The minimum radius defaults to 0 unless the fixed form sets it.
    pub fn radii(&self, magnitude: f64) -> (f64, f64) {
        match *self {
            SearchRadius::Fixed { min, max } => (min, max),
            SearchRadius::MagnitudeScaled {
                minmag,
                maxmag,
                minmag_radius,
                maxmag_radius,
            } => {
                let max = if minmag == maxmag {
                    if magnitude >= minmag {
                        maxmag_radius
                    } else {
                        minmag_radius
                    }
                } else if magnitude <= minmag {
                    minmag_radius
                } else if magnitude >= maxmag {
                    maxmag_radius
                } else {
                    minmag_radius
                        + (maxmag_radius - minmag_radius) * (magnitude - minmag)
                            / (maxmag - minmag)
                };
                (0.0, max)
            }
        }
    }
}

/// Great-circle distance between two points, in degrees of arc.
///
/// Spherical law of cosines is accurate enough here: radii are configured in
/// whole degrees and the comparison tolerance is far above the ~1e-9 error.
pub fn locations2degrees(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (la1, lo1, la2, lo2) = (
        lat1.to_radians(),
        lon1.to_radians(),
        lat2.to_radians(),
        lon2.to_radians(),
    );
    let cos_d = la1.sin() * la2.sin() + la1.cos() * la2.cos() * (lo1 - lo2).cos();
    cos_d.clamp(-1.0, 1.0).acos().to_degrees()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scaled(minmag: f64, maxmag: f64, rmin: f64, rmax: f64) -> SearchRadius {
        SearchRadius::MagnitudeScaled {
            minmag,
            maxmag,
            minmag_radius: rmin,
            maxmag_radius: rmax,
        }
    }

    #[test]
    fn test_below_minmag_clamps_to_min_radius() {
        let sr = scaled(3.0, 7.0, 1.0, 5.0);
        assert_eq!(sr.radii(1.0).1, 1.0);
        assert_eq!(sr.radii(3.0).1, 1.0);
    }

    #[test]
    fn test_above_maxmag_clamps_to_max_radius() {
        let sr = scaled(3.0, 7.0, 1.0, 5.0);
        assert_eq!(sr.radii(7.0).1, 5.0);
        assert_eq!(sr.radii(9.5).1, 5.0);
    }

    #[test]
    fn test_interpolation_is_strictly_between_and_monotonic() {
        let sr = scaled(3.0, 7.0, 1.0, 5.0);
        let mut last = sr.radii(3.0).1;
        for i in 1..40 {
            let m = 3.0 + 4.0 * (i as f64) / 40.0;
            let r = sr.radii(m).1;
            assert!(r > 1.0 && r < 5.0, "radius {r} out of bounds at M={m}");
            assert!(r >= last, "radius not monotonic at M={m}");
            last = r;
        }
        assert_eq!(sr.radii(5.0).1, 3.0); // midpoint
    }

    #[test]
    fn test_equal_magnitudes_step_tie_break() {
        let sr = scaled(6.0, 6.0, 2.0, 4.0);
        assert_eq!(sr.radii(5.999).1, 2.0);
        assert_eq!(sr.radii(6.0).1, 4.0);
        assert_eq!(sr.radii(8.0).1, 4.0);
    }

    #[test]
    fn test_equal_radii_are_constant() {
        // minmag_radius == maxmag_radius: every magnitude maps to 3 degrees.
        let sr = scaled(6.0, 7.0, 3.0, 3.0);
        for m in [0.0, 4.0, 6.0, 6.5, 7.0, 9.0] {
            assert_eq!(sr.radii(m).1, 3.0);
        }
    }

    #[test]
    fn test_min_radius_defaults_to_zero() {
        let sr = scaled(3.0, 7.0, 1.0, 5.0);
        assert_eq!(sr.radii(5.0).0, 0.0);
        let fixed = SearchRadius::Fixed { min: 0.5, max: 2.0 };
        assert_eq!(fixed.radii(5.0), (0.5, 2.0));
    }

    #[test]
    fn test_validate_rejects_inverted_radii() {
        assert!(scaled(3.0, 7.0, 5.0, 1.0).validate().is_err());
        assert!(scaled(7.0, 3.0, 1.0, 5.0).validate().is_err());
        assert!(scaled(3.0, 7.0, 1.0, 5.0).validate().is_ok());
    }

    #[test]
    fn test_locations2degrees_known_values() {
        assert!(locations2degrees(0.0, 0.0, 0.0, 0.0).abs() < 1e-9);
        assert!((locations2degrees(0.0, 0.0, 0.0, 90.0) - 90.0).abs() < 1e-6);
        assert!((locations2degrees(0.0, 0.0, 90.0, 0.0) - 90.0).abs() < 1e-6);
        // symmetric
        let d1 = locations2degrees(45.2, 7.6, 51.0, 13.4);
        let d2 = locations2degrees(51.0, 13.4, 45.2, 7.6);
        assert!((d1 - d2).abs() < 1e-9);
    }

    #[test]
    fn test_serde_untagged_forms() {
        let scaled: SearchRadius =
            serde_json::from_str(r#"{"minmag":6,"maxmag":7,"minmag_radius":3,"maxmag_radius":3}"#)
                .unwrap();
        assert!(matches!(scaled, SearchRadius::MagnitudeScaled { .. }));
        let fixed: SearchRadius = serde_json::from_str(r#"{"min":1.0,"max":5.0}"#).unwrap();
        assert_eq!(fixed, SearchRadius::Fixed { min: 1.0, max: 5.0 });
    }
}
