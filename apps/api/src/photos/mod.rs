//! Photo upload, listing, and deletion, plus the shared ownership lookup.

pub mod handlers;
pub mod imaging;

use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::photo::PhotoRow;

/// Fetches a photo only if `user_id` owns it. A photo that exists but
/// belongs to someone else is reported as not found, so responses reveal
/// nothing about other users' libraries.
pub async fn find_owned_photo(
    pool: &PgPool,
    photo_id: Uuid,
    user_id: Uuid,
) -> Result<PhotoRow, AppError> {
    sqlx::query_as::<_, PhotoRow>("SELECT * FROM photos WHERE id = $1 AND user_id = $2")
        .bind(photo_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Photo {photo_id} not found")))
}
