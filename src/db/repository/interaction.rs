use std::str::FromStr;

use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::enums::InteractionType;
use crate::models::Interaction;

use super::{format_timestamp, parse_timestamp};

const INTERACTION_COLUMNS: &str =
    "id, document_id, interaction_type, prompt, response, tokens_used, model_id, created_at";

pub fn insert_interaction(conn: &Connection, interaction: &Interaction) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO interactions (id, document_id, interaction_type, prompt, response,
         tokens_used, model_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            interaction.id.to_string(),
            interaction.document_id.to_string(),
            interaction.interaction_type.as_str(),
            interaction.prompt,
            interaction.response,
            interaction.tokens_used,
            interaction.model_id,
            format_timestamp(&interaction.created_at),
        ],
    )?;
    Ok(())
}

/// All interactions for a document, newest-first. rowid breaks same-timestamp
/// ties so insertion order is preserved.
pub fn list_interactions(
    conn: &Connection,
    document_id: &Uuid,
) -> Result<Vec<Interaction>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {INTERACTION_COLUMNS} FROM interactions
         WHERE document_id = ?1
         ORDER BY created_at DESC, rowid DESC"
    ))?;
    collect_interactions(&mut stmt, params![document_id.to_string()])
}

/// The `limit` most recent interactions, newest-first.
pub fn recent_interactions(
    conn: &Connection,
    document_id: &Uuid,
    limit: u32,
) -> Result<Vec<Interaction>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {INTERACTION_COLUMNS} FROM interactions
         WHERE document_id = ?1
         ORDER BY created_at DESC, rowid DESC
         LIMIT ?2"
    ))?;
    collect_interactions(&mut stmt, params![document_id.to_string(), limit])
}

pub fn count_interactions(conn: &Connection, document_id: &Uuid) -> Result<u32, DatabaseError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM interactions WHERE document_id = ?1",
        params![document_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(count as u32)
}

fn collect_interactions(
    stmt: &mut rusqlite::Statement<'_>,
    params: impl rusqlite::Params,
) -> Result<Vec<Interaction>, DatabaseError> {
    let rows = stmt.query_map(params, |row| {
        Ok(InteractionRow {
            id: row.get::<_, String>(0)?,
            document_id: row.get::<_, String>(1)?,
            interaction_type: row.get::<_, String>(2)?,
            prompt: row.get::<_, String>(3)?,
            response: row.get::<_, String>(4)?,
            tokens_used: row.get::<_, Option<u32>>(5)?,
            model_id: row.get::<_, Option<String>>(6)?,
            created_at: row.get::<_, String>(7)?,
        })
    })?;

    let mut interactions = Vec::new();
    for row in rows {
        interactions.push(interaction_from_row(row?)?);
    }
    Ok(interactions)
}

struct InteractionRow {
    id: String,
    document_id: String,
    interaction_type: String,
    prompt: String,
    response: String,
    tokens_used: Option<u32>,
    model_id: Option<String>,
    created_at: String,
}

fn interaction_from_row(row: InteractionRow) -> Result<Interaction, DatabaseError> {
    Ok(Interaction {
        id: Uuid::parse_str(&row.id)
            .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
        document_id: Uuid::parse_str(&row.document_id)
            .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
        interaction_type: InteractionType::from_str(&row.interaction_type)?,
        prompt: row.prompt,
        response: row.response,
        tokens_used: row.tokens_used,
        model_id: row.model_id,
        created_at: parse_timestamp(&row.created_at),
    })
}
