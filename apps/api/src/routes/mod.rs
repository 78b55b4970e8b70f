pub mod health;

use axum::extract::DefaultBodyLimit;
use axum::{
    routing::{delete, get, post},
    Router,
};

use crate::analysis::handlers as analysis;
use crate::auth::handlers as auth;
use crate::photos::handlers as photos;
use crate::state::AppState;
use crate::support::handlers as support;
use crate::users::handlers as users;

/// Multipart uploads are capped at 10 MiB.
const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Sessions
        .route(
            "/api/v1/auth/sessions",
            post(auth::handle_create_session).delete(auth::handle_delete_session),
        )
        // Profile
        .route(
            "/api/v1/users/me",
            get(users::handle_get_profile).patch(users::handle_update_profile),
        )
        // Photos
        .route(
            "/api/v1/photos",
            post(photos::handle_upload_photo).get(photos::handle_list_photos),
        )
        .route(
            "/api/v1/photos/:photo_id",
            delete(photos::handle_delete_photo),
        )
        // Analysis
        .route("/api/v1/analysis/analyze", post(analysis::handle_analyze))
        .route("/api/v1/analysis/compare", post(analysis::handle_compare))
        .route("/api/v1/analysis/history", get(analysis::handle_history))
        .route(
            "/api/v1/analysis/result/:photo_id",
            get(analysis::handle_get_result),
        )
        .route(
            "/api/v1/analysis/comparison/:photo_id",
            get(analysis::handle_get_comparison),
        )
        // Support
        .route(
            "/api/v1/support/inquiries",
            post(support::handle_create_inquiry),
        )
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}
