//! Static content served by the informational endpoints.
//!
//! Everything here is fixed demo data: comparison metrics are not computed
//! from the loaded models and history is not persisted.

use serde::Serialize;
use serde_json::{Map, Value};

pub const SERVICE_MESSAGE: &str = "Heart Disease Prediction API is running";

/// Route → description pairs listed by `GET /`.
pub const ENDPOINTS: [(&str, &str); 7] = [
    ("/predict", "POST - Make a heart disease prediction"),
    ("/predict/ensemble", "POST - Get ensemble prediction"),
    ("/predict/explain", "POST - Get prediction with feature contributions"),
    ("/history", "GET - Get prediction history, POST - Save prediction"),
    ("/models/feature-importance", "GET - Get feature importance data"),
    ("/models/comparison", "GET - Get model comparison data"),
    ("/health-info", "GET - Get health information"),
];

#[derive(Debug, Clone, Serialize)]
pub struct ServiceDescriptor {
    pub message: &'static str,
    pub endpoints: Map<String, Value>,
}

pub fn service_descriptor() -> ServiceDescriptor {
    ServiceDescriptor {
        message: SERVICE_MESSAGE,
        endpoints: ENDPOINTS
            .iter()
            .map(|(route, desc)| (route.to_string(), Value::from(*desc)))
            .collect(),
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct ModelMetrics {
    pub name: &'static str,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub auc: f64,
}

const fn metrics(
    name: &'static str,
    accuracy: f64,
    precision: f64,
    recall: f64,
    f1_score: f64,
    auc: f64,
) -> ModelMetrics {
    ModelMetrics {
        name,
        accuracy,
        precision,
        recall,
        f1_score,
        auc,
    }
}

pub const MODEL_COMPARISON: [ModelMetrics; 4] = [
    metrics("Random Forest", 0.85, 0.83, 0.82, 0.82, 0.90),
    metrics("Logistic Regression", 0.80, 0.79, 0.75, 0.77, 0.85),
    metrics("Support Vector Machine", 0.82, 0.81, 0.78, 0.79, 0.87),
    metrics("Neural Network", 0.84, 0.82, 0.81, 0.81, 0.89),
];

#[derive(Debug, Clone, Serialize)]
pub struct RiskFactor {
    pub name: &'static str,
    pub description: &'static str,
    pub recommendations: &'static [&'static str],
}

#[derive(Debug, Clone, Serialize)]
pub struct Resource {
    pub name: &'static str,
    pub url: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthInfo {
    pub risk_factors: &'static [RiskFactor],
    pub prevention_tips: &'static [&'static str],
    pub resources: &'static [Resource],
}

pub const HEALTH_INFO: HealthInfo = HealthInfo {
    risk_factors: &[
        RiskFactor {
            name: "Age",
            description: "Risk increases with age, especially after 45 for men and 55 for women.",
            recommendations: &["Regular check-ups", "Stay physically active"],
        },
        RiskFactor {
            name: "High Blood Pressure",
            description: "Damages arteries and can lead to heart disease.",
            recommendations: &[
                "Limit salt intake",
                "Regular exercise",
                "Medication if prescribed",
            ],
        },
        RiskFactor {
            name: "High Cholesterol",
            description: "Builds up in arteries and increases heart disease risk.",
            recommendations: &[
                "Eat heart-healthy diet",
                "Exercise regularly",
                "Medication if prescribed",
            ],
        },
        RiskFactor {
            name: "Smoking",
            description: "Damages blood vessels and reduces oxygen in blood.",
            recommendations: &[
                "Quit smoking",
                "Seek support programs",
                "Avoid secondhand smoke",
            ],
        },
        RiskFactor {
            name: "Diabetes",
            description: "Increases risk of heart disease and stroke.",
            recommendations: &["Monitor blood sugar", "Follow treatment plan", "Healthy diet"],
        },
    ],
    prevention_tips: &[
        "Maintain a healthy diet rich in fruits, vegetables, and whole grains",
        "Exercise regularly (at least 150 minutes of moderate activity per week)",
        "Maintain a healthy weight",
        "Quit smoking and avoid secondhand smoke",
        "Limit alcohol consumption",
        "Manage stress through relaxation techniques",
        "Get regular health screenings",
        "Control conditions like high blood pressure, diabetes, and high cholesterol",
    ],
    resources: &[
        Resource {
            name: "American Heart Association",
            url: "https://www.heart.org/",
        },
        Resource {
            name: "Centers for Disease Control and Prevention",
            url: "https://www.cdc.gov/heartdisease/",
        },
        Resource {
            name: "World Heart Federation",
            url: "https://world-heart-federation.org/",
        },
    ],
};

/// One stored prediction as returned by `GET /history`.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryRecord {
    pub id: &'static str,
    pub date: &'static str,
    pub prediction: u8,
    pub probability: f64,
    pub risk_level: &'static str,
    pub inputs: Map<String, Value>,
}

/// Build an ordered input map from canonical-order values.
fn sample_inputs(values: [Value; 13]) -> Map<String, Value> {
    crate::types::patient::FEATURE_NAMES
        .iter()
        .map(|name| name.to_string())
        .zip(values)
        .collect()
}

pub fn sample_history() -> Vec<HistoryRecord> {
    use serde_json::json;

    vec![
        HistoryRecord {
            id: "1",
            date: "2023-03-31T10:30:00",
            prediction: 1,
            probability: 0.85,
            risk_level: "High Risk",
            inputs: sample_inputs([
                json!(65),
                json!(1),
                json!(3),
                json!(140),
                json!(250),
                json!(1),
                json!(0),
                json!(120),
                json!(1),
                json!(2.5),
                json!(0),
                json!(2),
                json!(2),
            ]),
        },
        HistoryRecord {
            id: "2",
            date: "2023-03-30T15:45:00",
            prediction: 0,
            probability: 0.25,
            risk_level: "Low Risk",
            inputs: sample_inputs([
                json!(42),
                json!(0),
                json!(0),
                json!(120),
                json!(180),
                json!(0),
                json!(0),
                json!(160),
                json!(0),
                json!(0.5),
                json!(1),
                json!(0),
                json!(1),
            ]),
        },
    ]
}

/// `{success, message}` acknowledgement of the history stubs.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Ack {
    pub success: bool,
    pub message: String,
}

impl Ack {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_lists_routes_in_order() {
        let descriptor = service_descriptor();
        let routes: Vec<&str> = descriptor.endpoints.keys().map(String::as_str).collect();
        assert_eq!(routes[0], "/predict");
        assert_eq!(routes.len(), ENDPOINTS.len());
    }

    #[test]
    fn test_comparison_values() {
        let json = serde_json::to_value(MODEL_COMPARISON).unwrap();
        assert_eq!(json[0]["name"], "Random Forest");
        assert_eq!(json[0]["auc"], 0.90);
        assert_eq!(json[3]["f1_score"], 0.81);
    }

    #[test]
    fn test_health_info_shape() {
        assert_eq!(HEALTH_INFO.risk_factors.len(), 5);
        assert_eq!(HEALTH_INFO.prevention_tips.len(), 8);
        assert_eq!(HEALTH_INFO.resources.len(), 3);
    }

    #[test]
    fn test_sample_history() {
        let history = sample_history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].inputs["oldpeak"], 2.5);
        assert_eq!(history[1].inputs["thalach"], 160);
        assert_eq!(history[1].risk_level, "Low Risk");
    }
}
