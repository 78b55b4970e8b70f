//! HTTP surface of the analysis pipeline.
//!
//! Flow: ownership check → photo bytes from storage → pipeline task →
//! response. The pipeline and persistence run on a spawned task that is
//! awaited here, so a client disconnect cannot abandon a result the model
//! already produced.

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::PgPool;
use uuid::Uuid;

use crate::analysis::envelope::{
    AnalysisKind, AnalysisRequest, EnvelopeStatus, NormalizedResult, ResultEnvelope, Subject,
};
use crate::analysis::gateway::normalize_analysis;
use crate::analysis::store::persist_outcome;
use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::models::history::AnalysisHistoryRow;
use crate::models::photo::PhotoRow;
use crate::models::user::User;
use crate::photos::find_owned_photo;
use crate::state::AppState;
use crate::vision_client::ImagePayload;

const DEFAULT_HISTORY_LIMIT: i64 = 10;
const MAX_HISTORY_LIMIT: i64 = 100;

// ────────────────────────────────────────────────────────────────────────────
// Request / response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub photo_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct CompareRequest {
    /// The earlier photo.
    pub photo_id_1: Uuid,
    /// The later photo; the comparison is recorded on this one.
    pub photo_id_2: Uuid,
}

#[derive(Debug, Serialize)]
pub struct AnalysisResponse {
    pub success: bool,
    pub status: EnvelopeStatus,
    pub analysis: NormalizedResult,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub history: Vec<HistoryEntrySummary>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Serialize)]
pub struct HistoryEntrySummary {
    pub id: Uuid,
    pub kind: String,
    pub photo_id: Uuid,
    pub compare_photo_id: Option<Uuid>,
    pub status: String,
    pub summary: String,
    pub degraded: bool,
    pub created_at: DateTime<Utc>,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/analysis/analyze
pub async fn handle_analyze(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<AnalyzeRequest>,
) -> Result<Json<AnalysisResponse>, AppError> {
    let photo = find_owned_photo(&state.db, payload.photo_id, auth.user_id).await?;
    let image = fetch_image(&state, &photo).await?;
    let subject_context = load_subject_context(&state.db, auth.user_id).await?;

    let request = AnalysisRequest {
        user_id: auth.user_id,
        kind: AnalysisKind::Single,
        subject: Subject::Single { photo_id: photo.id },
        requested_at: Utc::now(),
    };

    let envelope = run_pipeline(state, request, vec![image], subject_context).await?;
    envelope_to_response(envelope)
}

/// POST /api/v1/analysis/compare
pub async fn handle_compare(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<CompareRequest>,
) -> Result<Json<AnalysisResponse>, AppError> {
    if payload.photo_id_1 == payload.photo_id_2 {
        return Err(AppError::Validation(
            "Comparison requires two distinct photos".to_string(),
        ));
    }

    let before = find_owned_photo(&state.db, payload.photo_id_1, auth.user_id).await?;
    let after = find_owned_photo(&state.db, payload.photo_id_2, auth.user_id).await?;
    let (before_image, after_image) =
        tokio::try_join!(fetch_image(&state, &before), fetch_image(&state, &after))?;
    let subject_context = load_subject_context(&state.db, auth.user_id).await?;

    let request = AnalysisRequest {
        user_id: auth.user_id,
        kind: AnalysisKind::Compare,
        subject: Subject::Pair {
            before: before.id,
            after: after.id,
        },
        requested_at: Utc::now(),
    };

    let envelope = run_pipeline(
        state,
        request,
        vec![before_image, after_image],
        subject_context,
    )
    .await?;
    envelope_to_response(envelope)
}

/// GET /api/v1/analysis/history
pub async fn handle_history(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, AppError> {
    let limit = clamp_limit(query.limit);
    let offset = query.offset.unwrap_or(0).max(0);

    let total =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM analysis_history WHERE user_id = $1")
            .bind(auth.user_id)
            .fetch_one(&state.db)
            .await?;

    let rows = sqlx::query_as::<_, AnalysisHistoryRow>(
        "SELECT * FROM analysis_history WHERE user_id = $1 \
         ORDER BY created_at DESC LIMIT $2 OFFSET $3",
    )
    .bind(auth.user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(HistoryResponse {
        history: rows.into_iter().map(summarize_entry).collect(),
        total,
        limit,
        offset,
    }))
}

/// GET /api/v1/analysis/result/:photo_id
pub async fn handle_get_result(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(photo_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let photo = find_owned_photo(&state.db, photo_id, auth.user_id).await?;
    let analysis = photo
        .analysis_data
        .ok_or_else(|| AppError::NotFound(format!("Photo {photo_id} has no analysis yet")))?;

    Ok(Json(json!({
        "photo_id": photo.id,
        "analysis": analysis,
        "analyzed_at": photo.analyzed_at,
    })))
}

/// GET /api/v1/analysis/comparison/:photo_id
pub async fn handle_get_comparison(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(photo_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let photo = find_owned_photo(&state.db, photo_id, auth.user_id).await?;
    let comparison = photo
        .comparison_data
        .ok_or_else(|| AppError::NotFound(format!("Photo {photo_id} has no comparison yet")))?;

    Ok(Json(json!({
        "photo_id": photo.id,
        "comparison": comparison,
        "compared_with": photo.compared_with,
        "compared_at": photo.compared_at,
    })))
}

// ────────────────────────────────────────────────────────────────────────────
// Pipeline plumbing
// ────────────────────────────────────────────────────────────────────────────

async fn fetch_image(state: &AppState, photo: &PhotoRow) -> Result<ImagePayload, AppError> {
    let data = state.storage.fetch_photo_bytes(&photo.s3_key).await?;
    Ok(ImagePayload {
        media_type: photo.content_type.clone(),
        data,
    })
}

/// Spawns the gateway plus persistence as one task and awaits it. The task
/// owns everything it needs, so it runs to completion even if this handler's
/// connection goes away first.
async fn run_pipeline(
    state: AppState,
    request: AnalysisRequest,
    images: Vec<ImagePayload>,
    subject_context: Option<String>,
) -> Result<ResultEnvelope, AppError> {
    let handle = tokio::spawn(async move {
        let envelope =
            normalize_analysis(state.upstream.as_ref(), &request, images, subject_context).await;
        let persisted = persist_outcome(&state.db, &request, &envelope).await;
        (envelope, persisted)
    });

    let (envelope, persisted) = handle
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Analysis task panicked: {e}")))?;
    persisted?;
    Ok(envelope)
}

fn envelope_to_response(envelope: ResultEnvelope) -> Result<Json<AnalysisResponse>, AppError> {
    if let Some(failure) = envelope.failure {
        return Err(failure.into());
    }
    let analysis = envelope.result.ok_or_else(|| {
        AppError::Internal(anyhow::anyhow!("Envelope carried neither result nor failure"))
    })?;

    Ok(Json(AnalysisResponse {
        success: true,
        status: envelope.status,
        analysis,
    }))
}

fn clamp_limit(limit: Option<i64>) -> i64 {
    limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT)
}

fn summarize_entry(row: AnalysisHistoryRow) -> HistoryEntrySummary {
    let summary = row
        .result
        .get("summary")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();
    let degraded = row
        .result
        .get("degraded")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    HistoryEntrySummary {
        id: row.id,
        kind: row.kind,
        photo_id: row.photo_id,
        compare_photo_id: row.compare_photo_id,
        status: row.status,
        summary,
        degraded,
        created_at: row.created_at,
    }
}

/// One compact profile line for the prompt, e.g.
/// "height 180 cm, weight 82.5 kg, age 34, male". None when the profile
/// carries no physical attributes.
fn subject_context_line(user: &User) -> Option<String> {
    let mut parts = Vec::new();
    if let Some(height) = user.height_cm {
        parts.push(format!("height {height:.0} cm"));
    }
    if let Some(weight) = user.weight_kg {
        parts.push(format!("weight {weight:.1} kg"));
    }
    if let Some(age) = user.age {
        parts.push(format!("age {age}"));
    }
    if let Some(gender) = &user.gender {
        parts.push(gender.clone());
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join(", "))
    }
}

async fn load_subject_context(pool: &PgPool, user_id: Uuid) -> Result<Option<String>, AppError> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
    Ok(user.as_ref().and_then(subject_context_line))
}
