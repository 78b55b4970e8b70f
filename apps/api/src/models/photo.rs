#![allow(dead_code)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

/// A stored body photo. `analysis_data` holds the latest single-photo
/// result; the `comparison_*` columns hold the latest comparison in which
/// this photo was the later subject.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PhotoRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub s3_key: String,
    pub content_type: String,
    pub body_part: String,
    pub taken_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub analysis_data: Option<Value>,
    pub analyzed_at: Option<DateTime<Utc>>,
    pub comparison_data: Option<Value>,
    pub compared_with: Option<Uuid>,
    pub compared_at: Option<DateTime<Utc>>,
}
