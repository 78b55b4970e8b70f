//! Photo upload, listing, and deletion handlers.
//!
//! Uploads land in S3 under `photos/{user_id}/{photo_id}.{ext}` and get a
//! row in `photos`. Responses carry a presigned GET URL instead of the raw
//! key, so the bucket never has to be public.

use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::models::photo::PhotoRow;
use crate::photos::find_owned_photo;
use crate::photos::imaging::process_upload;
use crate::state::AppState;
use crate::storage::PhotoStorage;

const BODY_PARTS: &[&str] = &["full", "upper", "lower"];
const DEFAULT_LIST_LIMIT: i64 = 20;
const MAX_LIST_LIMIT: i64 = 100;

#[derive(Debug, Serialize)]
pub struct PhotoResponse {
    pub id: Uuid,
    pub url: String,
    pub body_part: String,
    pub taken_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub analyzed: bool,
    pub compared: bool,
}

impl PhotoResponse {
    fn from_row(row: PhotoRow, url: String) -> Self {
        Self {
            id: row.id,
            url,
            body_part: row.body_part,
            taken_at: row.taken_at,
            created_at: row.created_at,
            analyzed: row.analysis_data.is_some(),
            compared: row.comparison_data.is_some(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct PhotoListResponse {
    pub photos: Vec<PhotoResponse>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// POST /api/v1/photos (multipart)
///
/// Fields: `photo` (required), `body_part` (full | upper | lower, defaults
/// to full), `taken_at` (RFC 3339, defaults to now). Unknown fields are
/// ignored.
pub async fn handle_upload_photo(
    State(state): State<AppState>,
    auth: AuthUser,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<PhotoResponse>), AppError> {
    let mut photo_bytes = None;
    let mut body_part = "full".to_string();
    let mut taken_at = Utc::now();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "photo" => {
                photo_bytes = Some(field.bytes().await.map_err(|e| {
                    AppError::Validation(format!("Could not read photo field: {e}"))
                })?);
            }
            "body_part" => {
                let value = field.text().await.map_err(|e| {
                    AppError::Validation(format!("Could not read body_part field: {e}"))
                })?;
                body_part = parse_body_part(&value)?;
            }
            "taken_at" => {
                let value = field.text().await.map_err(|e| {
                    AppError::Validation(format!("Could not read taken_at field: {e}"))
                })?;
                taken_at = DateTime::parse_from_rfc3339(value.trim())
                    .map_err(|_| {
                        AppError::Validation(format!("taken_at must be RFC 3339, got {value:?}"))
                    })?
                    .with_timezone(&Utc);
            }
            _ => {}
        }
    }

    let data = photo_bytes
        .filter(|b| !b.is_empty())
        .ok_or_else(|| AppError::Validation("A photo field is required".to_string()))?;

    let processed = process_upload(&data)?;
    let photo_id = Uuid::new_v4();
    let s3_key = format!("photos/{}/{}.{}", auth.user_id, photo_id, processed.extension);

    state
        .storage
        .put_photo(&s3_key, processed.bytes, processed.content_type)
        .await?;

    let inserted = sqlx::query_as::<_, PhotoRow>(
        "INSERT INTO photos (id, user_id, s3_key, content_type, body_part, taken_at) \
         VALUES ($1, $2, $3, $4, $5, $6) RETURNING *",
    )
    .bind(photo_id)
    .bind(auth.user_id)
    .bind(&s3_key)
    .bind(processed.content_type)
    .bind(&body_part)
    .bind(taken_at)
    .fetch_one(&state.db)
    .await;

    let row = match inserted {
        Ok(row) => row,
        Err(e) => return Err(discard_orphan(&state.storage, &s3_key, e).await),
    };

    info!(user_id = %auth.user_id, photo_id = %photo_id, "Photo uploaded");

    let url = state.storage.presign_get(&s3_key).await?;
    Ok((StatusCode::CREATED, Json(PhotoResponse::from_row(row, url))))
}

/// GET /api/v1/photos
pub async fn handle_list_photos(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<PhotoListResponse>, AppError> {
    let limit = clamp_limit(query.limit);
    let offset = query.offset.unwrap_or(0).max(0);

    let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM photos WHERE user_id = $1")
        .bind(auth.user_id)
        .fetch_one(&state.db)
        .await?;

    let rows = sqlx::query_as::<_, PhotoRow>(
        "SELECT * FROM photos WHERE user_id = $1 ORDER BY taken_at DESC LIMIT $2 OFFSET $3",
    )
    .bind(auth.user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(&state.db)
    .await?;

    let mut photos = Vec::with_capacity(rows.len());
    for row in rows {
        let url = state.storage.presign_get(&row.s3_key).await?;
        photos.push(PhotoResponse::from_row(row, url));
    }

    Ok(Json(PhotoListResponse {
        photos,
        total,
        limit,
        offset,
    }))
}

/// DELETE /api/v1/photos/:photo_id
///
/// Removes the object from storage first, then the row. History entries
/// referencing the photo are kept.
pub async fn handle_delete_photo(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(photo_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let photo = find_owned_photo(&state.db, photo_id, auth.user_id).await?;

    state.storage.delete_photo(&photo.s3_key).await?;

    sqlx::query("DELETE FROM photos WHERE id = $1 AND user_id = $2")
        .bind(photo_id)
        .bind(auth.user_id)
        .execute(&state.db)
        .await?;

    info!(user_id = %auth.user_id, photo_id = %photo_id, "Photo deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Best-effort removal of an object whose row insert failed, so the bucket
/// does not accumulate orphans. The insert error passes through unchanged.
async fn discard_orphan(storage: &PhotoStorage, s3_key: &str, cause: sqlx::Error) -> AppError {
    if let Err(cleanup) = storage.delete_photo(s3_key).await {
        warn!(s3_key = %s3_key, error = %cleanup, "Orphaned photo object could not be removed");
    }
    cause.into()
}

fn parse_body_part(value: &str) -> Result<String, AppError> {
    let normalized = value.trim().to_ascii_lowercase();
    if BODY_PARTS.contains(&normalized.as_str()) {
        Ok(normalized)
    } else {
        Err(AppError::Validation(format!(
            "body_part must be one of full, upper, lower; got {value:?}"
        )))
    }
}

fn clamp_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_s3::config::retry::RetryConfig;
    use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};

    fn make_unreachable_storage() -> PhotoStorage {
        let config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .endpoint_url("http://127.0.0.1:1")
            .credentials_provider(Credentials::new("test", "test", None, None, "test"))
            .retry_config(RetryConfig::disabled())
            .build();
        PhotoStorage::new(
            aws_sdk_s3::Client::from_conf(config),
            "photos-test".to_string(),
        )
    }

    #[tokio::test]
    async fn test_discard_orphan_returns_the_insert_error() {
        // Storage pointing nowhere: the cleanup delete fails and is
        // swallowed, while the original database error reaches the caller.
        let storage = make_unreachable_storage();
        let err = discard_orphan(&storage, "photos/nobody/lost.jpg", sqlx::Error::PoolClosed).await;

        assert!(matches!(err, AppError::Database(sqlx::Error::PoolClosed)));
    }

    #[test]
    fn test_parse_body_part_accepts_known_values() {
        assert_eq!(parse_body_part("full").unwrap(), "full");
        assert_eq!(parse_body_part(" Upper ").unwrap(), "upper");
        assert_eq!(parse_body_part("LOWER").unwrap(), "lower");
    }

    #[test]
    fn test_parse_body_part_rejects_unknown_values() {
        assert!(matches!(
            parse_body_part("torso"),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_list_limit_defaults_and_clamps() {
        assert_eq!(clamp_limit(None), 20);
        assert_eq!(clamp_limit(Some(0)), 1);
        assert_eq!(clamp_limit(Some(1000)), 100);
    }
}
