//! Patient record types for the UCI heart-disease schema.
//!
//! The 13 clinical features are kept in the exact column order used when the
//! scaler and the models were fitted.

use serde::{Deserialize, Serialize};

/// Number of model input features.
pub const FEATURE_COUNT: usize = 13;

/// Canonical feature order (must match the training column order).
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "age", "sex", "cp", "trestbps", "chol", "fbs", "restecg", "thalach", "exang", "oldpeak",
    "slope", "ca", "thal",
];

/// Static metadata for one input feature.
#[derive(Debug, Clone, Copy)]
pub struct FeatureSpec {
    pub name: &'static str,
    pub description: &'static str,
    /// Smallest plausible value (inclusive)
    pub min: f64,
    /// Largest plausible value (inclusive)
    pub max: f64,
}

/// Feature metadata in canonical order.
pub const FEATURE_SPECS: [FeatureSpec; FEATURE_COUNT] = [
    FeatureSpec { name: "age", description: "Age in years", min: 20.0, max: 100.0 },
    FeatureSpec { name: "sex", description: "Sex (1 = male, 0 = female)", min: 0.0, max: 1.0 },
    FeatureSpec { name: "cp", description: "Chest pain type (0-3)", min: 0.0, max: 3.0 },
    FeatureSpec {
        name: "trestbps",
        description: "Resting blood pressure (mm Hg)",
        min: 50.0,
        max: 250.0,
    },
    FeatureSpec { name: "chol", description: "Serum cholesterol (mg/dl)", min: 80.0, max: 700.0 },
    FeatureSpec {
        name: "fbs",
        description: "Fasting blood sugar > 120 mg/dl (1 = true, 0 = false)",
        min: 0.0,
        max: 1.0,
    },
    FeatureSpec {
        name: "restecg",
        description: "Resting electrocardiographic results (0-2)",
        min: 0.0,
        max: 2.0,
    },
    FeatureSpec {
        name: "thalach",
        description: "Maximum heart rate achieved",
        min: 50.0,
        max: 250.0,
    },
    FeatureSpec {
        name: "exang",
        description: "Exercise induced angina (1 = yes, 0 = no)",
        min: 0.0,
        max: 1.0,
    },
    FeatureSpec {
        name: "oldpeak",
        description: "ST depression induced by exercise relative to rest",
        min: 0.0,
        max: 10.0,
    },
    FeatureSpec {
        name: "slope",
        description: "Slope of the peak exercise ST segment (0-2)",
        min: 0.0,
        max: 2.0,
    },
    FeatureSpec {
        name: "ca",
        description: "Number of major vessels colored by fluoroscopy (0-4)",
        min: 0.0,
        max: 4.0,
    },
    FeatureSpec { name: "thal", description: "Thalassemia (0-3)", min: 0.0, max: 3.0 },
];

/// Human-readable description of a feature, empty for unknown names.
pub fn feature_description(name: &str) -> &'static str {
    FEATURE_SPECS
        .iter()
        .find(|spec| spec.name == name)
        .map(|spec| spec.description)
        .unwrap_or("")
}

/// Clinical features of one patient, in canonical order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct PatientFeatures {
    /// Age in years
    pub age: f64,
    /// Sex (1 = male, 0 = female)
    pub sex: f64,
    /// Chest pain type (0-3)
    pub cp: f64,
    /// Resting blood pressure in mm Hg
    pub trestbps: f64,
    /// Serum cholesterol in mg/dl
    pub chol: f64,
    /// Fasting blood sugar > 120 mg/dl
    pub fbs: f64,
    /// Resting ECG result (0-2)
    pub restecg: f64,
    /// Maximum heart rate achieved
    pub thalach: f64,
    /// Exercise induced angina
    pub exang: f64,
    /// ST depression induced by exercise relative to rest
    pub oldpeak: f64,
    /// Slope of the peak exercise ST segment (0-2)
    pub slope: f64,
    /// Major vessels colored by fluoroscopy
    pub ca: f64,
    /// Thalassemia
    pub thal: f64,
}

impl PatientFeatures {
    /// Values in canonical order.
    #[must_use]
    pub fn to_array(&self) -> [f64; FEATURE_COUNT] {
        [
            self.age,
            self.sex,
            self.cp,
            self.trestbps,
            self.chol,
            self.fbs,
            self.restecg,
            self.thalach,
            self.exang,
            self.oldpeak,
            self.slope,
            self.ca,
            self.thal,
        ]
    }

    /// Build from values in canonical order.
    #[must_use]
    pub fn from_array(v: [f64; FEATURE_COUNT]) -> Self {
        Self {
            age: v[0],
            sex: v[1],
            cp: v[2],
            trestbps: v[3],
            chol: v[4],
            fbs: v[5],
            restecg: v[6],
            thalach: v[7],
            exang: v[8],
            oldpeak: v[9],
            slope: v[10],
            ca: v[11],
            thal: v[12],
        }
    }
}

/// Range check for a single feature value.
pub(crate) fn check_range(spec: &FeatureSpec, value: f64) -> Result<(), (&'static str, String)> {
    if !value.is_finite() {
        return Err((spec.name, "must be a finite number".to_string()));
    }
    if !(spec.min..=spec.max).contains(&value) {
        return Err((
            spec.name,
            format!("{} is out of range [{}, {}]", value, spec.min, spec.max),
        ));
    }
    Ok(())
}
