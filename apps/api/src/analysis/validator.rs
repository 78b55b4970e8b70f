//! Shape Validator: shallow structural check on extracted documents.
//!
//! Only the per-kind required top-level fields are checked; a field that is
//! absent or null is missing. Everything else in the document, including all
//! nested content, passes through untouched so the model's format can evolve
//! without code changes here.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::analysis::envelope::{AnalysisKind, NormalizedResult};

const SINGLE_REQUIRED_FIELDS: &[&str] = &["overallScore", "summary"];
const COMPARE_REQUIRED_FIELDS: &[&str] = &["overallChange", "summary"];

#[derive(Debug, Error, PartialEq)]
#[error("result document missing required fields: {}", .missing_fields.join(", "))]
pub struct ShapeError {
    pub missing_fields: Vec<&'static str>,
}

pub fn required_fields(kind: AnalysisKind) -> &'static [&'static str] {
    match kind {
        AnalysisKind::Single => SINGLE_REQUIRED_FIELDS,
        AnalysisKind::Compare => COMPARE_REQUIRED_FIELDS,
    }
}

/// Checks the required fields for `kind` and wraps the document unchanged.
pub fn validate_shape(
    kind: AnalysisKind,
    document: Map<String, Value>,
) -> Result<NormalizedResult, ShapeError> {
    let missing_fields: Vec<&'static str> = required_fields(kind)
        .iter()
        .copied()
        .filter(|field| matches!(document.get(*field), None | Some(Value::Null)))
        .collect();

    if missing_fields.is_empty() {
        Ok(NormalizedResult::new(Value::Object(document)))
    } else {
        Err(ShapeError { missing_fields })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn make_document(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("test document must be an object"),
        }
    }

    #[test]
    fn test_single_document_with_required_fields_passes() {
        let document = make_document(json!({
            "overallScore": 82,
            "summary": "Strong upper body development.",
        }));
        assert!(validate_shape(AnalysisKind::Single, document).is_ok());
    }

    #[test]
    fn test_document_passes_through_unchanged() {
        let document = make_document(json!({
            "overallScore": 75,
            "summary": "ok",
            "measurements": {"bmi": 22.4, "bodyFatPercentage": 17.0},
            "someFutureField": [1, 2, 3],
        }));
        let result = validate_shape(AnalysisKind::Single, document).unwrap();
        assert_eq!(result.get("measurements").unwrap()["bmi"], json!(22.4));
        assert_eq!(result.get("someFutureField").unwrap(), &json!([1, 2, 3]));
    }

    #[test]
    fn test_missing_field_is_reported_by_name() {
        let document = make_document(json!({"overallScore": 80}));
        let err = validate_shape(AnalysisKind::Single, document).unwrap_err();
        assert_eq!(err.missing_fields, vec!["summary"]);
        assert!(err.to_string().contains("summary"));
    }

    #[test]
    fn test_null_required_field_counts_as_missing() {
        let document = make_document(json!({"overallScore": null, "summary": "ok"}));
        let err = validate_shape(AnalysisKind::Single, document).unwrap_err();
        assert_eq!(err.missing_fields, vec!["overallScore"]);
    }

    #[test]
    fn test_all_missing_fields_are_listed() {
        let document = make_document(json!({"bodyType": "mesomorph"}));
        let err = validate_shape(AnalysisKind::Single, document).unwrap_err();
        assert_eq!(err.missing_fields, vec!["overallScore", "summary"]);
    }

    #[test]
    fn test_compare_requires_overall_change() {
        let document = make_document(json!({"overallScore": 80, "summary": "ok"}));
        let err = validate_shape(AnalysisKind::Compare, document).unwrap_err();
        assert_eq!(err.missing_fields, vec!["overallChange"]);
    }

    #[test]
    fn test_compare_document_with_required_fields_passes() {
        let document = make_document(json!({
            "overallChange": "improved",
            "summary": "Visible reduction around the waist.",
        }));
        assert!(validate_shape(AnalysisKind::Compare, document).is_ok());
    }

    #[test]
    fn test_check_is_shallow_types_are_not_enforced() {
        // Presence is the contract; a string score still passes.
        let document = make_document(json!({"overallScore": "high", "summary": "ok"}));
        assert!(validate_shape(AnalysisKind::Single, document).is_ok());
    }
}
