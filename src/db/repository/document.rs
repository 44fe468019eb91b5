use std::str::FromStr;

use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::enums::ProcessingStatus;
use crate::models::Document;

use super::{format_timestamp, now, parse_timestamp};

const DOCUMENT_COLUMNS: &str = "id, user_id, stored_filename, original_filename, mime_type,
         size_bytes, file_path, upload_status, created_at, updated_at";

pub fn insert_document(conn: &Connection, doc: &Document) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO documents (id, user_id, stored_filename, original_filename, mime_type,
         size_bytes, file_path, upload_status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            doc.id.to_string(),
            doc.user_id,
            doc.stored_filename,
            doc.original_filename,
            doc.mime_type,
            doc.size_bytes as i64,
            doc.file_path,
            doc.upload_status.as_str(),
            format_timestamp(&doc.created_at),
            format_timestamp(&doc.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_document(conn: &Connection, id: &Uuid) -> Result<Option<Document>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = ?1"
    ))?;

    let result = stmt.query_row(params![id.to_string()], map_document_row);

    match result {
        Ok(row) => Ok(Some(document_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Update only the upload_status of a document, touching updated_at.
pub fn update_upload_status(
    conn: &Connection,
    document_id: &Uuid,
    status: &ProcessingStatus,
) -> Result<(), DatabaseError> {
    let rows = conn.execute(
        "UPDATE documents SET upload_status = ?2, updated_at = ?3 WHERE id = ?1",
        params![
            document_id.to_string(),
            status.as_str(),
            format_timestamp(&now()),
        ],
    )?;
    if rows == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Document".into(),
            id: document_id.to_string(),
        });
    }
    Ok(())
}

/// Listing entry for a user's document feed: the document annotated with its
/// extraction summary fields and interaction count. Derived via JOIN.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentListing {
    pub document: Document,
    pub extraction_status: Option<ProcessingStatus>,
    pub summary: Option<String>,
    pub confidence: Option<f32>,
    pub interaction_count: u32,
}

/// All documents for a user, newest-first.
pub fn list_documents_for_user(
    conn: &Connection,
    user_id: &str,
) -> Result<Vec<DocumentListing>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT d.id, d.user_id, d.stored_filename, d.original_filename, d.mime_type,
                d.size_bytes, d.file_path, d.upload_status, d.created_at, d.updated_at,
                e.status, e.summary, e.confidence,
                (SELECT COUNT(*) FROM interactions i WHERE i.document_id = d.id)
         FROM documents d
         LEFT JOIN extraction_results e ON e.document_id = d.id
         WHERE d.user_id = ?1
         ORDER BY d.created_at DESC, d.rowid DESC",
    )?;

    let rows = stmt.query_map(params![user_id], |row| {
        Ok((
            map_document_row(row)?,
            row.get::<_, Option<String>>(10)?,
            row.get::<_, Option<String>>(11)?,
            row.get::<_, Option<f32>>(12)?,
            row.get::<_, i64>(13)?,
        ))
    })?;

    let mut listings = Vec::new();
    for row in rows {
        let (doc_row, extraction_status, summary, confidence, interaction_count) = row?;
        listings.push(DocumentListing {
            document: document_from_row(doc_row)?,
            extraction_status: extraction_status
                .as_deref()
                .and_then(|s| ProcessingStatus::from_str(s).ok()),
            summary,
            confidence,
            interaction_count: interaction_count as u32,
        });
    }
    Ok(listings)
}

/// Delete a document and all its child rows.
///
/// extraction_results and interactions carry ON DELETE CASCADE, but we delete
/// them explicitly for logging. Removal of the backing file is coordinated by
/// the caller, not here.
pub fn delete_document_cascade(conn: &Connection, document_id: &Uuid) -> Result<(), DatabaseError> {
    let doc_id_str = document_id.to_string();

    let deleted_extractions = conn.execute(
        "DELETE FROM extraction_results WHERE document_id = ?1",
        params![doc_id_str],
    )?;
    let deleted_interactions = conn.execute(
        "DELETE FROM interactions WHERE document_id = ?1",
        params![doc_id_str],
    )?;

    let deleted = conn.execute("DELETE FROM documents WHERE id = ?1", params![doc_id_str])?;
    if deleted == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Document".into(),
            id: doc_id_str,
        });
    }

    tracing::info!(
        document_id = %document_id,
        extraction_results = deleted_extractions,
        interactions = deleted_interactions,
        "Document cascade-deleted with all child rows"
    );

    Ok(())
}

// Internal row type for Document mapping
struct DocumentRow {
    id: String,
    user_id: String,
    stored_filename: String,
    original_filename: String,
    mime_type: String,
    size_bytes: i64,
    file_path: String,
    upload_status: String,
    created_at: String,
    updated_at: String,
}

fn map_document_row(row: &rusqlite::Row<'_>) -> Result<DocumentRow, rusqlite::Error> {
    Ok(DocumentRow {
        id: row.get::<_, String>(0)?,
        user_id: row.get::<_, String>(1)?,
        stored_filename: row.get::<_, String>(2)?,
        original_filename: row.get::<_, String>(3)?,
        mime_type: row.get::<_, String>(4)?,
        size_bytes: row.get::<_, i64>(5)?,
        file_path: row.get::<_, String>(6)?,
        upload_status: row.get::<_, String>(7)?,
        created_at: row.get::<_, String>(8)?,
        updated_at: row.get::<_, String>(9)?,
    })
}

fn document_from_row(row: DocumentRow) -> Result<Document, DatabaseError> {
    Ok(Document {
        id: Uuid::parse_str(&row.id)
            .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
        user_id: row.user_id,
        stored_filename: row.stored_filename,
        original_filename: row.original_filename,
        mime_type: row.mime_type,
        size_bytes: row.size_bytes as u64,
        file_path: row.file_path,
        upload_status: ProcessingStatus::from_str(&row.upload_status)?,
        created_at: parse_timestamp(&row.created_at),
        updated_at: parse_timestamp(&row.updated_at),
    })
}

#[cfg(test)]
pub(crate) fn test_document(user_id: &str, original_filename: &str) -> Document {
    Document {
        id: Uuid::new_v4(),
        user_id: user_id.to_string(),
        stored_filename: format!("{}_{original_filename}", Uuid::new_v4()),
        original_filename: original_filename.to_string(),
        mime_type: "application/pdf".into(),
        size_bytes: 1024,
        file_path: format!("/tmp/store/{original_filename}"),
        upload_status: ProcessingStatus::Pending,
        created_at: now(),
        updated_at: now(),
    }
}
