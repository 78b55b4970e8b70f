//! Session exchange and revocation.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::auth::{mint_token, token_digest, AuthUser, SESSION_TTL_DAYS};
use crate::errors::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SessionRequest {
    pub external_id: String,
    pub email: String,
    pub display_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub token: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

/// POST /api/v1/auth/sessions
///
/// Exchanges an external identity for a bearer token. The user row is
/// created on first sight and refreshed on every later exchange.
pub async fn handle_create_session(
    State(state): State<AppState>,
    Json(payload): Json<SessionRequest>,
) -> Result<(StatusCode, Json<SessionResponse>), AppError> {
    if payload.external_id.trim().is_empty() || payload.email.trim().is_empty() {
        return Err(AppError::Validation(
            "external_id and email are required".to_string(),
        ));
    }

    let user_id = sqlx::query_scalar::<_, Uuid>(
        "INSERT INTO users (id, external_id, email, display_name) VALUES ($1, $2, $3, $4) \
         ON CONFLICT (external_id) DO UPDATE SET \
             email = EXCLUDED.email, \
             display_name = COALESCE(EXCLUDED.display_name, users.display_name), \
             updated_at = NOW() \
         RETURNING id",
    )
    .bind(Uuid::new_v4())
    .bind(payload.external_id.trim())
    .bind(payload.email.trim())
    .bind(&payload.display_name)
    .fetch_one(&state.db)
    .await?;

    let token = mint_token();
    let expires_at = Utc::now() + Duration::days(SESSION_TTL_DAYS);

    sqlx::query(
        "INSERT INTO sessions (id, user_id, token_digest, expires_at) VALUES ($1, $2, $3, $4)",
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(token_digest(&token))
    .bind(expires_at)
    .execute(&state.db)
    .await?;

    info!(user_id = %user_id, "Session created");

    Ok((
        StatusCode::CREATED,
        Json(SessionResponse {
            token,
            user_id,
            expires_at,
        }),
    ))
}

/// DELETE /api/v1/auth/sessions
///
/// Revokes the session presented in the Authorization header.
pub async fn handle_delete_session(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<StatusCode, AppError> {
    sqlx::query("DELETE FROM sessions WHERE id = $1 AND user_id = $2")
        .bind(auth.session_id)
        .bind(auth.user_id)
        .execute(&state.db)
        .await?;

    info!(user_id = %auth.user_id, "Session revoked");
    Ok(StatusCode::NO_CONTENT)
}
