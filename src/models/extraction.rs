use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::ProcessingStatus;

/// One extraction result per document (1:1). Recreated wholesale on reprocess.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub id: Uuid,
    pub document_id: Uuid,
    /// Empty string until the extraction completes.
    pub extracted_text: String,
    /// Short AI-generated summary. Absent when the text was empty or the
    /// assistant was unavailable at extraction time.
    pub summary: Option<String>,
    /// Engine confidence in [0, 100]. Text-layer PDF extraction reports 100.
    pub confidence: Option<f32>,
    pub processing_time_ms: Option<u64>,
    pub status: ProcessingStatus,
    pub error_message: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}
