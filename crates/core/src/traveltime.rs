//! Travel time models.
//!
//! A model maps (source depth, source-receiver distance) to the travel time
//! of the first arriving phase, with the receiver fixed at the surface. Two
//! variants share one trait: precomputed built-in grids and user-supplied
//! tables loaded from a JSON file. Grid lookups interpolate bilinearly; the
//! built-in grids are coarse by design (absolute error tolerance ~0.5 s).

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    /// The queried point falls outside the table domain. Recoverable: the
    /// orchestrator skips the event-station pair.
    #[error("travel time lookup outside table domain: {distance_deg} deg, {depth_km} km")]
    OutOfRange { distance_deg: f64, depth_km: f64 },

    #[error("unknown travel time model: {0}")]
    UnknownModel(String),

    #[error("invalid travel time table: {0}")]
    InvalidTable(String),

    #[error("failed to load travel time table {path}: {reason}")]
    Load { path: String, reason: String },
}

/// The single lookup capability shared by all model variants.
pub trait TravelTimes: Send + Sync {
    fn name(&self) -> &str;

    /// Travel time in seconds for the first arrival.
    fn travel_time(&self, distance_deg: f64, depth_km: f64) -> Result<f64, ModelError>;
}

/// A rectangular travel time grid over (depth, distance).
pub struct TravelTimeTable {
    name: String,
    /// Strictly increasing distances, degrees.
    distances: Vec<f64>,
    /// Strictly increasing source depths, km.
    depths: Vec<f64>,
    /// `times[depth_idx][distance_idx]`, seconds.
    times: Vec<Vec<f64>>,
}

/// On-disk representation of a custom table.
#[derive(Deserialize)]
struct RawTable {
    #[serde(default)]
    name: Option<String>,
    distances_deg: Vec<f64>,
    depths_km: Vec<f64>,
    travel_times_sec: Vec<Vec<f64>>,
}

impl TravelTimeTable {
    fn build(
        name: String,
        distances: Vec<f64>,
        depths: Vec<f64>,
        times: Vec<Vec<f64>>,
    ) -> Result<Self, ModelError> {
        if distances.len() < 2 || depths.is_empty() {
            return Err(ModelError::InvalidTable(
                "need at least 2 distances and 1 depth".into(),
            ));
        }
        if !distances.windows(2).all(|w| w[0] < w[1]) {
            return Err(ModelError::InvalidTable(
                "distances must be strictly increasing".into(),
            ));
        }
        if !depths.windows(2).all(|w| w[0] < w[1]) {
            return Err(ModelError::InvalidTable(
                "depths must be strictly increasing".into(),
            ));
        }
        if times.len() != depths.len() || times.iter().any(|row| row.len() != distances.len()) {
            return Err(ModelError::InvalidTable(format!(
                "times shape must be {}x{}",
                depths.len(),
                distances.len()
            )));
        }
        Ok(Self {
            name,
            distances,
            depths,
            times,
        })
    }

    /// Load one of the built-in first-P-arrival grids.
    ///
    /// Recognized names: `iasp91_ttp`, `ak135_ttp` (the `+` suffix of the
    /// original table files is accepted and ignored).
    pub fn builtin(model: &str) -> Result<Self, ModelError> {
        let key = model.trim().trim_end_matches('+');
        let offset = match key {
            "ak135_ttp" => 0.0,
            "iasp91_ttp" => 0.9,
            _ => return Err(ModelError::UnknownModel(model.to_string())),
        };
        let distances: Vec<f64> = (0..=18).map(|i| (i * 10) as f64).collect();
        // Coarse first-arrival times at the surface, seconds.
        let surface: [f64; 19] = [
            0.0, 143.0, 273.0, 372.0, 446.0, 530.0, 603.0, 660.0, 722.0, 780.0, 830.0, 870.0,
            903.0, 935.0, 963.0, 990.0, 1010.0, 1025.0, 1032.0,
        ];
        let depths = vec![0.0, 100.0, 300.0, 700.0];
        // Deeper sources arrive earlier; the reduction shrinks with distance 0.
        let reductions = [0.0, 12.0, 33.0, 65.0];
        let times = reductions
            .iter()
            .map(|red| {
                surface
                    .iter()
                    .map(|t| (t - red + offset).max(0.0))
                    .collect::<Vec<_>>()
            })
            .collect();
        Self::build(key.to_string(), distances, depths, times)
    }

    /// Load a custom table from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ModelError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ModelError::Load {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let raw: RawTable = serde_json::from_str(&contents).map_err(|e| ModelError::Load {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let name = raw.name.unwrap_or_else(|| {
            path.file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "custom".to_string())
        });
        Self::build(name, raw.distances_deg, raw.depths_km, raw.travel_times_sec)
    }

    /// Resolve a configured model: a built-in name or a file path.
    pub fn resolve(spec: &str) -> Result<Self, ModelError> {
        match Self::builtin(spec) {
            Err(ModelError::UnknownModel(_)) => Self::from_file(Path::new(spec)),
            other => other,
        }
    }

    /// Index of the grid cell containing `value`, or None outside the axis.
    fn bracket(axis: &[f64], value: f64) -> Option<(usize, f64)> {
        let first = *axis.first()?;
        let last = *axis.last()?;
        if value < first || value > last {
            return None;
        }
        if value == last {
            // top edge collapses to the last cell with weight 1
            return Some((axis.len() - 2, 1.0));
        }
        let hi = axis.partition_point(|&x| x <= value);
        let lo = hi - 1;
        let frac = (value - axis[lo]) / (axis[hi] - axis[lo]);
        Some((lo, frac))
    }
}

impl TravelTimes for TravelTimeTable {
    fn name(&self) -> &str {
        &self.name
    }

    fn travel_time(&self, distance_deg: f64, depth_km: f64) -> Result<f64, ModelError> {
        let out_of_range = || ModelError::OutOfRange {
            distance_deg,
            depth_km,
        };
        let (di, dfrac) = Self::bracket(&self.distances, distance_deg).ok_or_else(out_of_range)?;
        if self.depths.len() == 1 {
            if depth_km != self.depths[0] {
                return Err(out_of_range());
            }
            let row = &self.times[0];
            return Ok(row[di] + dfrac * (row[di + 1] - row[di]));
        }
        let (zi, zfrac) = Self::bracket(&self.depths, depth_km).ok_or_else(out_of_range)?;
        let interp_row = |row: &[f64]| row[di] + dfrac * (row[di + 1] - row[di]);
        let t0 = interp_row(&self.times[zi]);
        let t1 = interp_row(&self.times[zi + 1]);
        Ok(t0 + zfrac * (t1 - t0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> TravelTimeTable {
        TravelTimeTable::build(
            "test".into(),
            vec![0.0, 10.0, 20.0],
            vec![0.0, 100.0],
            vec![vec![0.0, 100.0, 200.0], vec![0.0, 90.0, 180.0]],
        )
        .unwrap()
    }

    #[test]
    fn test_exact_grid_points() {
        let t = table();
        assert_eq!(t.travel_time(10.0, 0.0).unwrap(), 100.0);
        assert_eq!(t.travel_time(20.0, 100.0).unwrap(), 180.0);
        assert_eq!(t.travel_time(0.0, 0.0).unwrap(), 0.0);
    }

    #[test]
    fn test_bilinear_interpolation() {
        let t = table();
        // midway on both axes: mean of 100, 200, 90, 180
        let v = t.travel_time(15.0, 50.0).unwrap();
        assert!((v - 142.5).abs() < 1e-9);
    }

    #[test]
    fn test_domain_miss_is_recoverable_error() {
        let t = table();
        assert!(matches!(
            t.travel_time(25.0, 0.0),
            Err(ModelError::OutOfRange { .. })
        ));
        assert!(matches!(
            t.travel_time(10.0, 150.0),
            Err(ModelError::OutOfRange { .. })
        ));
        assert!(matches!(
            t.travel_time(-1.0, 0.0),
            Err(ModelError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_builtin_models() {
        let ak = TravelTimeTable::builtin("ak135_ttp+").unwrap();
        assert_eq!(ak.name(), "ak135_ttp");
        // deeper source arrives earlier at the same distance
        let shallow = ak.travel_time(40.0, 0.0).unwrap();
        let deep = ak.travel_time(40.0, 300.0).unwrap();
        assert!(deep < shallow);
        // monotonic with distance
        let near = ak.travel_time(20.0, 50.0).unwrap();
        let far = ak.travel_time(60.0, 50.0).unwrap();
        assert!(near < far);

        assert!(TravelTimeTable::builtin("iasp91_ttp").is_ok());
        assert!(matches!(
            TravelTimeTable::builtin("prem_xyz"),
            Err(ModelError::UnknownModel(_))
        ));
    }

    #[test]
    fn test_invalid_tables_rejected() {
        assert!(TravelTimeTable::build(
            "bad".into(),
            vec![0.0, 10.0],
            vec![0.0],
            vec![vec![0.0]], // wrong row width
        )
        .is_err());
        assert!(TravelTimeTable::build(
            "bad".into(),
            vec![10.0, 0.0], // not increasing
            vec![0.0],
            vec![vec![0.0, 1.0]],
        )
        .is_err());
    }

    #[test]
    fn test_from_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.json");
        std::fs::write(
            &path,
            r#"{
                "distances_deg": [0.0, 5.0, 10.0],
                "depths_km": [0.0, 50.0],
                "travel_times_sec": [[0.0, 70.0, 140.0], [0.0, 65.0, 130.0]]
            }"#,
        )
        .unwrap();
        let t = TravelTimeTable::from_file(&path).unwrap();
        assert_eq!(t.name(), "custom");
        assert_eq!(t.travel_time(5.0, 0.0).unwrap(), 70.0);

        let missing = TravelTimeTable::from_file(Path::new("/nonexistent/tt.json"));
        assert!(matches!(missing, Err(ModelError::Load { .. })));
    }

    #[test]
    fn test_resolve_prefers_builtin() {
        assert!(TravelTimeTable::resolve("ak135_ttp").is_ok());
        assert!(TravelTimeTable::resolve("/nope/nothing.json").is_err());
    }
}
