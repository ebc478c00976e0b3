//! Frozen standard-scaler artifact.

use crate::types::patient::{FEATURE_COUNT, FEATURE_NAMES};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Per-feature affine transform `(x - mean) / scale`, fitted offline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    /// Column order the scaler was fitted with
    #[serde(default)]
    pub feature_names: Vec<String>,
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl StandardScaler {
    /// Fit mean and population standard deviation over rows.
    ///
    /// Constant columns get a scale of 1, matching scikit-learn.
    pub fn fit(rows: &[[f64; FEATURE_COUNT]]) -> Result<Self> {
        if rows.is_empty() {
            anyhow::bail!("Cannot fit a scaler on an empty dataset");
        }

        let n = rows.len() as f64;
        let mut mean = vec![0.0; FEATURE_COUNT];
        for row in rows {
            for (m, v) in mean.iter_mut().zip(row) {
                *m += v;
            }
        }
        mean.iter_mut().for_each(|m| *m /= n);

        let mut scale = vec![0.0; FEATURE_COUNT];
        for row in rows {
            for (i, v) in row.iter().enumerate() {
                scale[i] += (v - mean[i]).powi(2);
            }
        }
        for s in scale.iter_mut() {
            let std = (*s / n).sqrt();
            *s = if std > f64::EPSILON { std } else { 1.0 };
        }

        Ok(Self {
            feature_names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
            mean,
            scale,
        })
    }

    /// Load a scaler artifact from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scaler from {:?}", path))?;
        let scaler: StandardScaler = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse scaler {:?}", path))?;
        scaler.validate()?;
        Ok(scaler)
    }

    /// Write the scaler artifact as pretty JSON.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).with_context(|| format!("Failed to write scaler to {:?}", path))
    }

    /// Check parameter shapes and the fitted column order.
    pub fn validate(&self) -> Result<()> {
        if self.mean.len() != FEATURE_COUNT || self.scale.len() != FEATURE_COUNT {
            anyhow::bail!(
                "Scaler expects {} features, got mean={} scale={}",
                FEATURE_COUNT,
                self.mean.len(),
                self.scale.len()
            );
        }
        if !self.feature_names.is_empty() && self.feature_names != FEATURE_NAMES {
            anyhow::bail!(
                "Scaler was fitted with columns {:?}, expected {:?}",
                self.feature_names,
                FEATURE_NAMES
            );
        }
        if self.mean.iter().chain(&self.scale).any(|v| !v.is_finite()) {
            anyhow::bail!("Scaler parameters must be finite");
        }
        if self.scale.iter().any(|&s| s < 0.0) {
            anyhow::bail!("Scaler scale values must not be negative");
        }
        Ok(())
    }

    /// Apply the frozen transform. A zero scale divides by 1.
    pub fn transform(&self, features: &[f64]) -> Result<Vec<f64>> {
        if features.len() != self.mean.len() {
            anyhow::bail!(
                "Feature count mismatch: got {}, expected {}",
                features.len(),
                self.mean.len()
            );
        }

        Ok(features
            .iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(x, (mean, &scale))| {
                let scale = if scale == 0.0 { 1.0 } else { scale };
                (x - mean) / scale
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> StandardScaler {
        StandardScaler {
            feature_names: Vec::new(),
            mean: vec![0.0; FEATURE_COUNT],
            scale: vec![1.0; FEATURE_COUNT],
        }
    }

    #[test]
    fn test_transform() {
        let mut scaler = identity();
        scaler.mean[0] = 50.0;
        scaler.scale[0] = 10.0;

        let mut x = vec![0.0; FEATURE_COUNT];
        x[0] = 70.0;
        x[1] = 3.0;

        let scaled = scaler.transform(&x).unwrap();
        assert!((scaled[0] - 2.0).abs() < 1e-12);
        assert!((scaled[1] - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_zero_scale_treated_as_one() {
        let mut scaler = identity();
        scaler.mean[2] = 1.0;
        scaler.scale[2] = 0.0;
        assert!(scaler.validate().is_ok());

        let mut x = vec![0.0; FEATURE_COUNT];
        x[2] = 3.0;
        assert_eq!(scaler.transform(&x).unwrap()[2], 2.0);
    }

    #[test]
    fn test_transform_rejects_wrong_length() {
        assert!(identity().transform(&[1.0, 2.0]).is_err());
    }

    #[test]
    fn test_fit() {
        let mut a = [0.0; FEATURE_COUNT];
        let mut b = [0.0; FEATURE_COUNT];
        a[0] = 40.0;
        b[0] = 60.0;
        a[1] = 1.0;
        b[1] = 1.0;

        let scaler = StandardScaler::fit(&[a, b]).unwrap();
        assert!((scaler.mean[0] - 50.0).abs() < 1e-12);
        assert!((scaler.scale[0] - 10.0).abs() < 1e-12);
        // constant column
        assert_eq!(scaler.scale[1], 1.0);
        assert!(scaler.validate().is_ok());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scaler.json");

        let mut row = [1.0; FEATURE_COUNT];
        row[4] = 200.0;
        let scaler = StandardScaler::fit(&[row, [2.0; FEATURE_COUNT]]).unwrap();
        scaler.save(&path).unwrap();

        let loaded = StandardScaler::load(&path).unwrap();
        assert_eq!(loaded, scaler);
    }

    #[test]
    fn test_load_rejects_column_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scaler.json");

        let mut scaler = identity();
        scaler.feature_names = FEATURE_NAMES.iter().rev().map(|s| s.to_string()).collect();
        scaler.save(&path).unwrap();

        assert!(StandardScaler::load(&path).is_err());
    }

    #[test]
    fn test_load_missing_file() {
        assert!(StandardScaler::load("/nonexistent/scaler.json").is_err());
    }
}
