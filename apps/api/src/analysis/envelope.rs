//! Core data types for the analysis pipeline.
//!
//! Every pipeline run for an `AnalysisRequest` ends in exactly one
//! `ResultEnvelope`. A `NormalizedResult` exists only once a document has
//! passed the shape check or been synthesized by the fallback; nothing else
//! constructs one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::vision_client::UpstreamError;

/// Which analysis pipeline a request runs through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisKind {
    Single,
    Compare,
}

impl AnalysisKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisKind::Single => "single",
            AnalysisKind::Compare => "compare",
        }
    }
}

/// The photo, or ordered photo pair, an analysis runs against.
#[derive(Debug, Clone, Copy)]
pub enum Subject {
    Single { photo_id: Uuid },
    /// `before` is the earlier photo; the result is recorded on `after`.
    Pair { before: Uuid, after: Uuid },
}

impl Subject {
    /// The photo row that owns the persisted result.
    pub fn record_photo_id(&self) -> Uuid {
        match self {
            Subject::Single { photo_id } => *photo_id,
            Subject::Pair { after, .. } => *after,
        }
    }
}

/// One run of the pipeline, bound to its owner.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub user_id: Uuid,
    pub kind: AnalysisKind,
    pub subject: Subject,
    pub requested_at: DateTime<Utc>,
}

/// Terminal status of a pipeline run.
///
/// `Failed` is reached only when the upstream model itself fails; unusable
/// model output degrades instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvelopeStatus {
    Ok,
    Degraded,
    Failed,
}

impl EnvelopeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvelopeStatus::Ok => "ok",
            EnvelopeStatus::Degraded => "degraded",
            EnvelopeStatus::Failed => "failed",
        }
    }
}

/// A result document that passed the shape check or came from the fallback
/// synthesizer. Beyond the required top-level fields the content is opaque.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NormalizedResult(Value);

impl NormalizedResult {
    /// Construction is confined to the shape validator and the fallback
    /// synthesizer.
    pub(in crate::analysis) fn new(document: Value) -> Self {
        Self(document)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// True for fallback-synthesized documents.
    pub fn is_degraded(&self) -> bool {
        self.get("degraded").and_then(Value::as_bool).unwrap_or(false)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

/// Terminal outcome of one pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct ResultEnvelope {
    pub status: EnvelopeStatus,
    /// Present for `ok` and `degraded`; absent for `failed`.
    pub result: Option<NormalizedResult>,
    /// Diagnostic cause for `degraded` and `failed` envelopes.
    pub reason: Option<String>,
    /// Typed upstream failure, kept for HTTP status mapping.
    #[serde(skip)]
    pub failure: Option<UpstreamError>,
}

impl ResultEnvelope {
    pub fn ok(result: NormalizedResult) -> Self {
        Self {
            status: EnvelopeStatus::Ok,
            result: Some(result),
            reason: None,
            failure: None,
        }
    }

    pub fn degraded(result: NormalizedResult, reason: String) -> Self {
        Self {
            status: EnvelopeStatus::Degraded,
            result: Some(result),
            reason: Some(reason),
            failure: None,
        }
    }

    pub fn failed(failure: UpstreamError) -> Self {
        Self {
            status: EnvelopeStatus::Failed,
            result: None,
            reason: Some(failure.to_string()),
            failure: Some(failure),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_kind_and_status_serialize_lowercase() {
        assert_eq!(
            serde_json::to_value(AnalysisKind::Compare).unwrap(),
            json!("compare")
        );
        assert_eq!(
            serde_json::to_value(EnvelopeStatus::Degraded).unwrap(),
            json!("degraded")
        );
    }

    #[test]
    fn test_pair_subject_records_on_later_photo() {
        let before = Uuid::new_v4();
        let after = Uuid::new_v4();
        let subject = Subject::Pair { before, after };
        assert_eq!(subject.record_photo_id(), after);
    }

    #[test]
    fn test_failed_envelope_carries_no_result() {
        let envelope =
            ResultEnvelope::failed(UpstreamError::Unavailable("timeout".to_string()));
        assert_eq!(envelope.status, EnvelopeStatus::Failed);
        assert!(envelope.result.is_none());
        assert!(envelope.failure.is_some());
        assert!(envelope.reason.is_some());
    }

    #[test]
    fn test_normalized_result_serializes_transparently() {
        let result = NormalizedResult::new(json!({"overallScore": 70, "summary": "ok"}));
        let serialized = serde_json::to_value(&result).unwrap();
        assert_eq!(serialized, json!({"overallScore": 70, "summary": "ok"}));
    }
}
