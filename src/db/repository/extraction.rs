use std::str::FromStr;

use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::enums::ProcessingStatus;
use crate::models::ExtractionResult;

use super::{format_timestamp, now, parse_timestamp};

/// Insert or replace the extraction result for a document, keyed by the 1:1
/// document_id. An existing row keeps its id and created_at.
pub fn upsert_extraction_result(
    conn: &Connection,
    result: &ExtractionResult,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO extraction_results (id, document_id, extracted_text, summary, confidence,
         processing_time_ms, status, error_message, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
         ON CONFLICT(document_id) DO UPDATE SET
             extracted_text = excluded.extracted_text,
             summary = excluded.summary,
             confidence = excluded.confidence,
             processing_time_ms = excluded.processing_time_ms,
             status = excluded.status,
             error_message = excluded.error_message,
             updated_at = excluded.updated_at",
        params![
            result.id.to_string(),
            result.document_id.to_string(),
            result.extracted_text,
            result.summary,
            result.confidence,
            result.processing_time_ms.map(|ms| ms as i64),
            result.status.as_str(),
            result.error_message,
            format_timestamp(&result.created_at),
            format_timestamp(&result.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_extraction_result(
    conn: &Connection,
    document_id: &Uuid,
) -> Result<Option<ExtractionResult>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, document_id, extracted_text, summary, confidence, processing_time_ms,
                status, error_message, created_at, updated_at
         FROM extraction_results WHERE document_id = ?1",
    )?;

    let result = stmt.query_row(params![document_id.to_string()], |row| {
        Ok(ExtractionRow {
            id: row.get::<_, String>(0)?,
            document_id: row.get::<_, String>(1)?,
            extracted_text: row.get::<_, String>(2)?,
            summary: row.get::<_, Option<String>>(3)?,
            confidence: row.get::<_, Option<f32>>(4)?,
            processing_time_ms: row.get::<_, Option<i64>>(5)?,
            status: row.get::<_, String>(6)?,
            error_message: row.get::<_, Option<String>>(7)?,
            created_at: row.get::<_, String>(8)?,
            updated_at: row.get::<_, String>(9)?,
        })
    });

    match result {
        Ok(row) => Ok(Some(extraction_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Mark the extraction FAILED with an error message, creating the row if the
/// pipeline failed before one existed (the error must not be lost).
pub fn mark_extraction_failed(
    conn: &Connection,
    document_id: &Uuid,
    error_message: &str,
) -> Result<(), DatabaseError> {
    let rows = conn.execute(
        "UPDATE extraction_results SET status = ?2, error_message = ?3, updated_at = ?4
         WHERE document_id = ?1",
        params![
            document_id.to_string(),
            ProcessingStatus::Failed.as_str(),
            error_message,
            format_timestamp(&now()),
        ],
    )?;
    if rows == 0 {
        let ts = now();
        upsert_extraction_result(
            conn,
            &ExtractionResult {
                id: Uuid::new_v4(),
                document_id: *document_id,
                extracted_text: String::new(),
                summary: None,
                confidence: None,
                processing_time_ms: None,
                status: ProcessingStatus::Failed,
                error_message: Some(error_message.to_string()),
                created_at: ts,
                updated_at: ts,
            },
        )?;
    }
    Ok(())
}

/// Delete any extraction rows for a document (reprocess recreates them).
pub fn delete_extraction_results(
    conn: &Connection,
    document_id: &Uuid,
) -> Result<usize, DatabaseError> {
    let deleted = conn.execute(
        "DELETE FROM extraction_results WHERE document_id = ?1",
        params![document_id.to_string()],
    )?;
    Ok(deleted)
}

struct ExtractionRow {
    id: String,
    document_id: String,
    extracted_text: String,
    summary: Option<String>,
    confidence: Option<f32>,
    processing_time_ms: Option<i64>,
    status: String,
    error_message: Option<String>,
    created_at: String,
    updated_at: String,
}

fn extraction_from_row(row: ExtractionRow) -> Result<ExtractionResult, DatabaseError> {
    Ok(ExtractionResult {
        id: Uuid::parse_str(&row.id)
            .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
        document_id: Uuid::parse_str(&row.document_id)
            .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
        extracted_text: row.extracted_text,
        summary: row.summary,
        confidence: row.confidence,
        processing_time_ms: row.processing_time_ms.map(|ms| ms as u64),
        status: ProcessingStatus::from_str(&row.status)?,
        error_message: row.error_message,
        created_at: parse_timestamp(&row.created_at),
        updated_at: parse_timestamp(&row.updated_at),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::document::{insert_document, test_document};
    use crate::db::sqlite::open_memory_database;

    fn processing_placeholder(document_id: Uuid) -> ExtractionResult {
        let ts = now();
        ExtractionResult {
            id: Uuid::new_v4(),
            document_id,
            extracted_text: String::new(),
            summary: None,
            confidence: None,
            processing_time_ms: None,
            status: ProcessingStatus::Processing,
            error_message: None,
            created_at: ts,
            updated_at: ts,
        }
    }

    #[test]
    fn upsert_creates_then_updates_single_row() {
        let conn = open_memory_database().unwrap();
        let doc = test_document("user-1", "scan.png");
        insert_document(&conn, &doc).unwrap();

        let placeholder = processing_placeholder(doc.id);
        upsert_extraction_result(&conn, &placeholder).unwrap();

        let mut completed = placeholder.clone();
        completed.id = Uuid::new_v4(); // ignored on conflict
        completed.extracted_text = "Invoice total 99.00".into();
        completed.confidence = Some(88.0);
        completed.processing_time_ms = Some(1234);
        completed.status = ProcessingStatus::Completed;
        upsert_extraction_result(&conn, &completed).unwrap();

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM extraction_results WHERE document_id = ?1",
                params![doc.id.to_string()],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);

        let loaded = get_extraction_result(&conn, &doc.id).unwrap().unwrap();
        // Original identity survives the upsert
        assert_eq!(loaded.id, placeholder.id);
        assert_eq!(loaded.extracted_text, "Invoice total 99.00");
        assert_eq!(loaded.status, ProcessingStatus::Completed);
        assert_eq!(loaded.processing_time_ms, Some(1234));
    }

    #[test]
    fn mark_failed_updates_existing_row() {
        let conn = open_memory_database().unwrap();
        let doc = test_document("user-1", "scan.png");
        insert_document(&conn, &doc).unwrap();

        let mut placeholder = processing_placeholder(doc.id);
        placeholder.extracted_text = "partial".into();
        upsert_extraction_result(&conn, &placeholder).unwrap();

        mark_extraction_failed(&conn, &doc.id, "engine crashed").unwrap();

        let loaded = get_extraction_result(&conn, &doc.id).unwrap().unwrap();
        assert_eq!(loaded.status, ProcessingStatus::Failed);
        assert_eq!(loaded.error_message.as_deref(), Some("engine crashed"));
        // Text from before the failure is preserved
        assert_eq!(loaded.extracted_text, "partial");
    }

    #[test]
    fn mark_failed_creates_row_when_absent() {
        let conn = open_memory_database().unwrap();
        let doc = test_document("user-1", "broken.pdf");
        insert_document(&conn, &doc).unwrap();

        mark_extraction_failed(&conn, &doc.id, "document not found").unwrap();

        let loaded = get_extraction_result(&conn, &doc.id).unwrap().unwrap();
        assert_eq!(loaded.status, ProcessingStatus::Failed);
        assert_eq!(loaded.error_message.as_deref(), Some("document not found"));
        assert_eq!(loaded.extracted_text, "");
    }

    #[test]
    fn delete_removes_rows() {
        let conn = open_memory_database().unwrap();
        let doc = test_document("user-1", "scan.png");
        insert_document(&conn, &doc).unwrap();
        upsert_extraction_result(&conn, &processing_placeholder(doc.id)).unwrap();

        assert_eq!(delete_extraction_results(&conn, &doc.id).unwrap(), 1);
        assert!(get_extraction_result(&conn, &doc.id).unwrap().is_none());
        assert_eq!(delete_extraction_results(&conn, &doc.id).unwrap(), 0);
    }

    #[test]
    fn extraction_requires_existing_document() {
        let conn = open_memory_database().unwrap();
        let result = upsert_extraction_result(&conn, &processing_placeholder(Uuid::new_v4()));
        assert!(result.is_err(), "FK violation expected");
    }
}
