#![allow(dead_code)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

/// An append-only record of one completed analysis.
///
/// `photo_id` carries no foreign key: history entries outlive photo
/// deletion and are removed only when the owning user is deleted.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AnalysisHistoryRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: String,
    pub photo_id: Uuid,
    pub compare_photo_id: Option<Uuid>,
    pub status: String,
    pub result: Value,
    pub created_at: DateTime<Utc>,
}
