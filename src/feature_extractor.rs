//! Feature extraction from JSON request bodies.
//!
//! Turns an arbitrary JSON object into the 13-value feature vector in the
//! exact column order the scaler and models were fitted with.

use crate::config::MissingFieldPolicy;
use crate::error::{ApiError, ApiResult};
use crate::types::patient::{check_range, PatientFeatures, FEATURE_COUNT, FEATURE_SPECS};
use serde_json::{Map, Number, Value};

/// Features assembled from one request.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedFeatures {
    pub features: PatientFeatures,
    /// Assembled values keyed by feature name, echoed back to the client
    pub inputs: Map<String, Value>,
    /// Fields that were absent and defaulted to 0
    pub defaulted: Vec<&'static str>,
}

/// Feature extractor that maps request bodies onto model input features.
#[derive(Debug, Clone, Default)]
pub struct FeatureExtractor {
    policy: MissingFieldPolicy,
}

impl FeatureExtractor {
    /// Create a new feature extractor.
    pub fn new(policy: MissingFieldPolicy) -> Self {
        Self { policy }
    }

    /// Extract features from a raw JSON body.
    pub fn extract_bytes(&self, body: &[u8]) -> ApiResult<ExtractedFeatures> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Err(ApiError::InvalidBody("request body is empty".to_string()));
        }
        let value: Value =
            serde_json::from_slice(body).map_err(|e| ApiError::InvalidBody(e.to_string()))?;
        self.extract(&value)
    }

    /// Extract features from a JSON value.
    ///
    /// Values are taken in canonical order. Numbers and numeric strings are
    /// accepted; `null` counts as absent. Every supplied value is range
    /// checked; defaulted values are not.
    pub fn extract(&self, body: &Value) -> ApiResult<ExtractedFeatures> {
        let object = body
            .as_object()
            .ok_or_else(|| ApiError::InvalidBody("expected a JSON object".to_string()))?;

        let mut values = [0.0; FEATURE_COUNT];
        let mut inputs = Map::new();
        let mut defaulted = Vec::new();

        for (i, spec) in FEATURE_SPECS.iter().enumerate() {
            match object.get(spec.name).filter(|v| !v.is_null()) {
                Some(raw) => {
                    let value = parse_number(spec.name, raw)?;
                    check_range(spec, value).map_err(|(field, reason)| {
                        ApiError::InvalidField {
                            field: field.to_string(),
                            reason,
                        }
                    })?;
                    values[i] = value;
                    inputs.insert(spec.name.to_string(), echo_value(raw, value));
                }
                None => match self.policy {
                    MissingFieldPolicy::Reject => {
                        return Err(ApiError::MissingField(spec.name.to_string()));
                    }
                    MissingFieldPolicy::DefaultZero => {
                        defaulted.push(spec.name);
                        inputs.insert(spec.name.to_string(), Value::from(0));
                    }
                },
            }
        }

        if !defaulted.is_empty() {
            tracing::debug!(fields = ?defaulted, "Defaulted missing fields to 0");
        }

        Ok(ExtractedFeatures {
            features: PatientFeatures::from_array(values),
            inputs,
            defaulted,
        })
    }
}

fn parse_number(field: &str, raw: &Value) -> ApiResult<f64> {
    let invalid = |reason: &str| ApiError::InvalidField {
        field: field.to_string(),
        reason: reason.to_string(),
    };

    let value = match raw {
        Value::Number(n) => n.as_f64().ok_or_else(|| invalid("not representable as a number"))?,
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| invalid("must be a number"))?,
        _ => return Err(invalid("must be a number")),
    };

    if !value.is_finite() {
        return Err(invalid("must be a finite number"));
    }
    Ok(value)
}

/// Numbers are echoed as sent; numeric strings are echoed as numbers.
fn echo_value(raw: &Value, parsed: f64) -> Value {
    match raw {
        Value::Number(_) => raw.clone(),
        _ => Number::from_f64(parsed).map(Value::Number).unwrap_or(Value::Null),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::patient::FEATURE_NAMES;
    use serde_json::json;

    fn sample_body() -> Value {
        json!({
            "age": 63, "sex": 1, "cp": 3, "trestbps": 145, "chol": 233, "fbs": 1,
            "restecg": 0, "thalach": 150, "exang": 0, "oldpeak": 2.3, "slope": 0,
            "ca": 0, "thal": 1
        })
    }

    #[test]
    fn test_feature_extraction() {
        let extractor = FeatureExtractor::new(MissingFieldPolicy::Reject);
        let extracted = extractor.extract(&sample_body()).unwrap();

        assert_eq!(extracted.features.age, 63.0);
        assert_eq!(extracted.features.oldpeak, 2.3);
        assert_eq!(extracted.inputs.len(), FEATURE_COUNT);
        assert_eq!(extracted.inputs["age"], json!(63));
        assert!(extracted.defaulted.is_empty());
    }

    #[test]
    fn test_inputs_follow_canonical_order() {
        let extractor = FeatureExtractor::default();
        let extracted = extractor.extract(&sample_body()).unwrap();
        let keys: Vec<&str> = extracted.inputs.keys().map(String::as_str).collect();
        assert_eq!(keys, FEATURE_NAMES.to_vec());
    }

    #[test]
    fn test_missing_field_rejected() {
        let extractor = FeatureExtractor::new(MissingFieldPolicy::Reject);
        let mut body = sample_body();
        body.as_object_mut().unwrap().remove("age");

        let err = extractor.extract(&body).unwrap_err();
        assert_eq!(err, ApiError::MissingField("age".to_string()));
        assert!(err.to_string().contains("age"));
    }

    #[test]
    fn test_missing_field_defaulted() {
        let extractor = FeatureExtractor::new(MissingFieldPolicy::DefaultZero);
        let mut body = sample_body();
        body.as_object_mut().unwrap().remove("age");
        body.as_object_mut().unwrap().insert("thal".to_string(), Value::Null);

        let extracted = extractor.extract(&body).unwrap();
        assert_eq!(extracted.features.age, 0.0);
        assert_eq!(extracted.features.thal, 0.0);
        assert_eq!(extracted.defaulted, vec!["age", "thal"]);
        assert_eq!(extracted.inputs["age"], json!(0));
    }

    #[test]
    fn test_numeric_strings_accepted() {
        let extractor = FeatureExtractor::default();
        let mut body = sample_body();
        body["chol"] = json!(" 240 ");

        let extracted = extractor.extract(&body).unwrap();
        assert_eq!(extracted.features.chol, 240.0);
        assert_eq!(extracted.inputs["chol"], json!(240.0));
    }

    #[test]
    fn test_non_numeric_rejected() {
        let extractor = FeatureExtractor::default();
        let mut body = sample_body();
        body["cp"] = json!("typical");

        let err = extractor.extract(&body).unwrap_err();
        assert_eq!(err.field(), Some("cp"));
        assert!(err.is_client_error());

        body["cp"] = json!(true);
        assert_eq!(extractor.extract(&body).unwrap_err().field(), Some("cp"));

        body["cp"] = json!("NaN");
        assert_eq!(extractor.extract(&body).unwrap_err().field(), Some("cp"));
    }

    #[test]
    fn test_out_of_range_rejected() {
        let extractor = FeatureExtractor::default();
        let mut body = sample_body();
        body["age"] = json!(250);

        let err = extractor.extract(&body).unwrap_err();
        assert_eq!(err.field(), Some("age"));
    }

    #[test]
    fn test_extra_fields_ignored() {
        let extractor = FeatureExtractor::default();
        let mut body = sample_body();
        body["patient_name"] = json!("Jane");

        let extracted = extractor.extract(&body).unwrap();
        assert!(!extracted.inputs.contains_key("patient_name"));
    }

    #[test]
    fn test_invalid_bodies() {
        let extractor = FeatureExtractor::default();
        assert!(matches!(
            extractor.extract_bytes(b""),
            Err(ApiError::InvalidBody(_))
        ));
        assert!(matches!(
            extractor.extract_bytes(b"{not json"),
            Err(ApiError::InvalidBody(_))
        ));
        assert!(matches!(
            extractor.extract_bytes(b"[1, 2, 3]"),
            Err(ApiError::InvalidBody(_))
        ));
    }
}
