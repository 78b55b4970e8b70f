//! Result-Normalizing Gateway.
//!
//! Flow: UpstreamModel::generate → extract_document → validate_shape, with
//! synthesize_fallback covering both post-upstream failure points. Only a
//! failure of the upstream call itself produces a `failed` envelope; once
//! the model has answered, the caller always gets a result document.

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::analysis::envelope::{AnalysisRequest, ResultEnvelope};
use crate::analysis::extractor::extract_document;
use crate::analysis::fallback::synthesize_fallback;
use crate::analysis::validator::validate_shape;
use crate::vision_client::{ImagePayload, UpstreamModel, UpstreamRequest};

/// Runs one request through the full normalization pipeline.
pub async fn normalize_analysis(
    upstream: &dyn UpstreamModel,
    request: &AnalysisRequest,
    images: Vec<ImagePayload>,
    subject_context: Option<String>,
) -> ResultEnvelope {
    let upstream_request = UpstreamRequest {
        kind: request.kind,
        images,
        subject_context,
    };

    let raw = match upstream.generate(&upstream_request).await {
        Ok(raw) => {
            debug!(
                model = %raw.model,
                temperature = raw.temperature,
                latency_ms = (Utc::now() - raw.requested_at).num_milliseconds(),
                "Raw model output received"
            );
            raw
        }
        Err(failure) => {
            warn!(
                user_id = %request.user_id,
                kind = request.kind.as_str(),
                error = %failure,
                "Upstream model call failed"
            );
            return ResultEnvelope::failed(failure);
        }
    };

    let document = match extract_document(&raw.text) {
        Ok(document) => document,
        Err(e) => {
            warn!(
                user_id = %request.user_id,
                kind = request.kind.as_str(),
                error = %e,
                "Model output was not extractable JSON; synthesizing fallback"
            );
            return ResultEnvelope::degraded(
                synthesize_fallback(request.kind, "extraction_failed"),
                e.to_string(),
            );
        }
    };

    match validate_shape(request.kind, document) {
        Ok(result) => {
            info!(
                user_id = %request.user_id,
                kind = request.kind.as_str(),
                model = %raw.model,
                "Analysis result normalized"
            );
            ResultEnvelope::ok(result)
        }
        Err(e) => {
            warn!(
                user_id = %request.user_id,
                kind = request.kind.as_str(),
                error = %e,
                "Extracted document failed shape check; synthesizing fallback"
            );
            ResultEnvelope::degraded(
                synthesize_fallback(request.kind, "shape_validation_failed"),
                e.to_string(),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::envelope::{AnalysisKind, EnvelopeStatus, Subject};
    use crate::vision_client::{RawModelResponse, UpstreamError};
    use async_trait::async_trait;
    use chrono::Utc;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use uuid::Uuid;

    struct ScriptedUpstream {
        script: Mutex<VecDeque<Result<String, UpstreamError>>>,
        calls: AtomicUsize,
    }

    impl ScriptedUpstream {
        fn new(script: Vec<Result<String, UpstreamError>>) -> Self {
            Self {
                script: Mutex::new(script.into_iter().collect()),
                calls: AtomicUsize::new(0),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl UpstreamModel for ScriptedUpstream {
        async fn generate(
            &self,
            _request: &UpstreamRequest,
        ) -> Result<RawModelResponse, UpstreamError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self
                .script
                .lock()
                .unwrap()
                .pop_front()
                .expect("scripted upstream exhausted");
            next.map(|text| RawModelResponse {
                text,
                model: "scripted".to_string(),
                temperature: 0.0,
                requested_at: Utc::now(),
            })
        }
    }

    fn make_request(kind: AnalysisKind) -> AnalysisRequest {
        let subject = match kind {
            AnalysisKind::Single => Subject::Single {
                photo_id: Uuid::new_v4(),
            },
            AnalysisKind::Compare => Subject::Pair {
                before: Uuid::new_v4(),
                after: Uuid::new_v4(),
            },
        };
        AnalysisRequest {
            user_id: Uuid::new_v4(),
            kind,
            subject,
            requested_at: Utc::now(),
        }
    }

    async fn run(
        kind: AnalysisKind,
        script: Vec<Result<String, UpstreamError>>,
    ) -> (ResultEnvelope, usize) {
        let upstream = ScriptedUpstream::new(script);
        let request = make_request(kind);
        let envelope = normalize_analysis(&upstream, &request, Vec::new(), None).await;
        (envelope, upstream.call_count())
    }

    #[tokio::test]
    async fn test_well_formed_output_yields_ok() {
        let text = r#"{"overallScore": 82, "summary": "Solid definition.", "bodyType": "mesomorph"}"#;
        let (envelope, calls) = run(AnalysisKind::Single, vec![Ok(text.to_string())]).await;

        assert_eq!(envelope.status, EnvelopeStatus::Ok);
        assert_eq!(calls, 1);
        let result = envelope.result.expect("ok envelope carries a result");
        assert!(!result.is_degraded());
        assert_eq!(result.get("overallScore"), Some(&json!(82)));
        assert_eq!(result.get("bodyType"), Some(&json!("mesomorph")));
    }

    #[tokio::test]
    async fn test_fenced_output_is_repaired() {
        let text = "```json\n{\"overallScore\": 70, \"summary\": \"ok\"}\n```";
        let (envelope, _) = run(AnalysisKind::Single, vec![Ok(text.to_string())]).await;

        assert_eq!(envelope.status, EnvelopeStatus::Ok);
        let result = envelope.result.unwrap();
        assert_eq!(result.get("overallScore"), Some(&json!(70)));
    }

    #[tokio::test]
    async fn test_prose_wrapped_output_is_repaired() {
        let text = "Here is the analysis you asked for:\n\
                    {\"overallScore\": 64, \"summary\": \"ok\"}\n\
                    Let me know if you need anything else.";
        let (envelope, _) = run(AnalysisKind::Single, vec![Ok(text.to_string())]).await;

        assert_eq!(envelope.status, EnvelopeStatus::Ok);
    }

    #[tokio::test]
    async fn test_unextractable_output_degrades_rather_than_fails() {
        let text = "I'm sorry, I can't analyze this image.";
        let (envelope, _) = run(AnalysisKind::Single, vec![Ok(text.to_string())]).await;

        assert_eq!(envelope.status, EnvelopeStatus::Degraded);
        assert!(envelope.reason.is_some());
        let result = envelope.result.expect("degraded envelope carries a fallback");
        assert!(result.is_degraded());
    }

    #[tokio::test]
    async fn test_missing_required_field_degrades_with_valid_fallback() {
        let text = r#"{"overallScore": 80, "bodyType": "ectomorph"}"#;
        let (envelope, _) = run(AnalysisKind::Single, vec![Ok(text.to_string())]).await;

        assert_eq!(envelope.status, EnvelopeStatus::Degraded);
        assert!(envelope.reason.unwrap().contains("summary"));
        let result = envelope.result.unwrap();
        assert_eq!(result.get("overallScore"), Some(&json!(50)));
        assert!(result.get("summary").is_some());
    }

    #[tokio::test]
    async fn test_empty_output_degrades() {
        let (envelope, _) = run(AnalysisKind::Single, vec![Ok(String::new())]).await;

        assert_eq!(envelope.status, EnvelopeStatus::Degraded);
        assert!(envelope.result.unwrap().is_degraded());
    }

    #[tokio::test]
    async fn test_upstream_unavailability_yields_failed_without_result() {
        let failure = UpstreamError::Unavailable("connection refused".to_string());
        let (envelope, _) = run(AnalysisKind::Single, vec![Err(failure)]).await;

        assert_eq!(envelope.status, EnvelopeStatus::Failed);
        assert!(envelope.result.is_none());
        assert!(matches!(
            envelope.failure,
            Some(UpstreamError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_rejection_is_surfaced_after_a_single_call() {
        let failure = UpstreamError::Rejected {
            status: 429,
            message: "rate limit exceeded".to_string(),
        };
        let (envelope, calls) = run(AnalysisKind::Single, vec![Err(failure)]).await;

        assert_eq!(envelope.status, EnvelopeStatus::Failed);
        assert_eq!(calls, 1);
        assert!(envelope.reason.unwrap().contains("429"));
    }

    #[tokio::test]
    async fn test_compare_fallback_reports_no_change() {
        let (envelope, _) = run(AnalysisKind::Compare, vec![Ok("garbage".to_string())]).await;

        assert_eq!(envelope.status, EnvelopeStatus::Degraded);
        let result = envelope.result.unwrap();
        assert_eq!(result.get("overallChange"), Some(&json!("unchanged")));
    }

    #[tokio::test]
    async fn test_compare_output_with_its_own_fields_is_ok() {
        let text = r#"{"overallChange": "improved", "summary": "Leaner waist.", "changes": {}}"#;
        let (envelope, _) = run(AnalysisKind::Compare, vec![Ok(text.to_string())]).await;

        assert_eq!(envelope.status, EnvelopeStatus::Ok);
    }
}
