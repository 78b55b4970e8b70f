//! GET and PATCH for the caller's own profile.
//!
//! The physical attributes set here feed the subject context line that
//! accompanies analysis requests.

use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::models::user::User;
use crate::state::AppState;

/// GET /api/v1/users/me
pub async fn handle_get_profile(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<User>, AppError> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(auth.user_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    Ok(Json(user))
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateProfileRequest {
    pub display_name: Option<String>,
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
    pub age: Option<i32>,
    pub gender: Option<String>,
}

/// PATCH /api/v1/users/me
///
/// Absent fields keep their current values.
pub async fn handle_update_profile(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<User>, AppError> {
    validate_profile_update(&payload)?;

    let user = sqlx::query_as::<_, User>(
        "UPDATE users SET \
             display_name = COALESCE($1, display_name), \
             height_cm = COALESCE($2, height_cm), \
             weight_kg = COALESCE($3, weight_kg), \
             age = COALESCE($4, age), \
             gender = COALESCE($5, gender), \
             updated_at = NOW() \
         WHERE id = $6 RETURNING *",
    )
    .bind(&payload.display_name)
    .bind(payload.height_cm)
    .bind(payload.weight_kg)
    .bind(payload.age)
    .bind(&payload.gender)
    .bind(auth.user_id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    Ok(Json(user))
}

fn validate_profile_update(payload: &UpdateProfileRequest) -> Result<(), AppError> {
    if let Some(height) = payload.height_cm {
        if !(50.0..=300.0).contains(&height) {
            return Err(AppError::Validation(
                "height_cm must be between 50 and 300".to_string(),
            ));
        }
    }
    if let Some(weight) = payload.weight_kg {
        if !(20.0..=500.0).contains(&weight) {
            return Err(AppError::Validation(
                "weight_kg must be between 20 and 500".to_string(),
            ));
        }
    }
    if let Some(age) = payload.age {
        if !(13..=120).contains(&age) {
            return Err(AppError::Validation(
                "age must be between 13 and 120".to_string(),
            ));
        }
    }
    if let Some(gender) = &payload.gender {
        if !["male", "female", "other"].contains(&gender.as_str()) {
            return Err(AppError::Validation(
                "gender must be one of male, female, other".to_string(),
            ));
        }
    }
    Ok(())
}
