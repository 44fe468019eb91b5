use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::ProcessingStatus;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub user_id: String,
    pub stored_filename: String,
    pub original_filename: String,
    pub mime_type: String,
    pub size_bytes: u64,
    /// Storage reference for the uploaded bytes. Written once at upload,
    /// never updated afterwards.
    pub file_path: String,
    pub upload_status: ProcessingStatus,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}
