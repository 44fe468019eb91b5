//! Archive/export builder.
//!
//! Assembles a two-entry zip bundle: the original file under its original
//! filename, plus a generated plain-text report of the extraction and the
//! interaction history.

use std::io::{Cursor, Write};
use std::path::Path;

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::db::repository;
use crate::models::enums::{InteractionType, ProcessingStatus};
use crate::models::{Document, ExtractionResult, Interaction};
use crate::storage::{FileStore, StorageError};

use super::ServiceError;

/// Fixed name of the report entry inside the bundle.
pub const REPORT_ENTRY_NAME: &str = "extraction_report.txt";

const FILENAME_SUFFIX: &str = "_with_extracted_data.zip";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadBundle {
    pub bytes: Vec<u8>,
    pub filename: String,
}

/// Build the download bundle for a document the caller already owns.
pub fn build_export(
    conn: &Connection,
    store: &dyn FileStore,
    document: &Document,
) -> Result<DownloadBundle, ServiceError> {
    let extraction = repository::get_extraction_result(conn, &document.id)?;
    let interactions = repository::list_interactions(conn, &document.id)?;

    let file_bytes = store.read(&document.file_path).map_err(|e| match e {
        StorageError::NotFound(path) => ServiceError::FileMissing(path),
        other => ServiceError::Storage(other),
    })?;

    let report = build_report(document, extraction.as_ref(), &interactions);

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(9));

    writer.start_file(document.original_filename.as_str(), options)?;
    writer.write_all(&file_bytes).map_err(StorageError::Io)?;
    writer.start_file(REPORT_ENTRY_NAME, options)?;
    writer.write_all(report.as_bytes()).map_err(StorageError::Io)?;

    let bytes = writer.finish()?.into_inner();

    tracing::info!(
        document_id = %document.id,
        bundle_bytes = bytes.len(),
        interactions = interactions.len(),
        "Export bundle assembled"
    );

    Ok(DownloadBundle {
        bytes,
        filename: suggested_filename(&document.original_filename),
    })
}

/// Original filename without its extension, plus the fixed suffix.
pub(crate) fn suggested_filename(original_filename: &str) -> String {
    let stem = Path::new(original_filename)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| original_filename.to_string());
    format!("{stem}{FILENAME_SUFFIX}")
}

/// Plain-text report: metadata header, extraction section (only once the
/// extraction reached a terminal state), then interactions newest-first.
pub(crate) fn build_report(
    document: &Document,
    extraction: Option<&ExtractionResult>,
    interactions: &[Interaction],
) -> String {
    let mut report = String::new();

    report.push_str("DOCUMENT REPORT\n===============\n\n");
    report.push_str(&format!("File name: {}\n", document.original_filename));
    report.push_str(&format!(
        "File size: {:.2} KB\n",
        document.size_bytes as f64 / 1024.0
    ));
    report.push_str(&format!("MIME type: {}\n", document.mime_type));
    report.push_str(&format!(
        "Uploaded:  {}\n",
        document.created_at.format("%Y-%m-%d %H:%M:%S")
    ));
    report.push_str(&format!("Status:    {}\n", document.upload_status.as_str()));

    match extraction {
        Some(extraction) if extraction.status == ProcessingStatus::Completed => {
            report.push_str("\nEXTRACTION\n----------\n");
            if let Some(confidence) = extraction.confidence {
                report.push_str(&format!("Confidence: {confidence:.1}%\n"));
            }
            if let Some(ms) = extraction.processing_time_ms {
                report.push_str(&format!("Processing time: {:.2} s\n", ms as f64 / 1000.0));
            }
            if let Some(summary) = &extraction.summary {
                report.push_str(&format!("Summary: {summary}\n"));
            }
            report.push_str(&format!(
                "Extracted text:\n{}\n",
                extraction.extracted_text
            ));
        }
        Some(extraction) if extraction.status == ProcessingStatus::Failed => {
            report.push_str("\nEXTRACTION\n----------\n");
            report.push_str(&format!(
                "Extraction failed: {}\n",
                extraction.error_message.as_deref().unwrap_or("unknown error")
            ));
        }
        // Pending or processing: no extraction section yet.
        _ => {}
    }

    report.push_str("\nINTERACTIONS\n------------\n");
    if interactions.is_empty() {
        report.push_str("No interactions recorded yet.\n");
    } else {
        for (n, interaction) in interactions.iter().enumerate() {
            report.push_str(&format!(
                "#{} [{}] {} (model {}, {} tokens)\n",
                n + 1,
                interaction.interaction_type.as_str(),
                interaction.created_at.format("%Y-%m-%d %H:%M:%S"),
                interaction.model_id.as_deref().unwrap_or("unknown"),
                interaction
                    .tokens_used
                    .map(|t| t.to_string())
                    .unwrap_or_else(|| "?".to_string()),
            ));
            if interaction.interaction_type == InteractionType::Query {
                report.push_str(&format!("Question: {}\n", interaction.prompt));
            }
            report.push_str(&format!("Response: {}\n\n", interaction.response));
        }
    }

    report
}
