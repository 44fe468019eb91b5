use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::InteractionType;

/// One AI exchange attached to a document. Append-only: never mutated after
/// insert, deleted only when the owning document is deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interaction {
    pub id: Uuid,
    pub document_id: Uuid,
    pub interaction_type: InteractionType,
    /// The literal question for queries; the generated instruction for
    /// explanations.
    pub prompt: String,
    pub response: String,
    pub tokens_used: Option<u32>,
    pub model_id: Option<String>,
    pub created_at: NaiveDateTime,
}
