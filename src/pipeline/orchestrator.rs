//! Document lifecycle orchestrator.
//!
//! Drives a document from upload through extraction to a terminal status:
//! PENDING → PROCESSING → COMPLETED | FAILED. `submit` and `reprocess` return
//! to the caller immediately; extraction runs on a detached worker thread and
//! its outcome is only observable through the persisted statuses.
//!
//! A per-document in-flight guard keeps one extraction running per document:
//! a reprocess issued while a run is active is rejected with
//! `AlreadyProcessing` rather than racing on the extraction row.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use rusqlite::Connection;
use thiserror::Error;
use uuid::Uuid;

use crate::db::repository;
use crate::db::sqlite::open_database;
use crate::db::DatabaseError;
use crate::models::enums::ProcessingStatus;
use crate::models::{Document, ExtractionResult};
use crate::pipeline::assistant::{AssistantClient, ChatTurn};
use crate::pipeline::extraction::{ExtractionError, TextExtraction};
use crate::storage::{FileStore, StorageError};

/// Upper bound on the stored summary length.
const SUMMARY_MAX_CHARS: usize = 150;
/// Leading slice of the extracted text fed to summary generation.
const SUMMARY_SOURCE_CHARS: usize = 3000;

const SUMMARY_SYSTEM_PROMPT: &str = "\
You summarize documents. Respond with a single plain sentence of at most 150 \
characters describing what the document is. No quotes, no preamble.";

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("document not found: {0}")]
    DocumentMissing(Uuid),

    #[error("an extraction for document {0} is already running")]
    AlreadyProcessing(Uuid),

    #[error("{0}")]
    Database(#[from] DatabaseError),

    #[error("{0}")]
    Storage(#[from] StorageError),

    #[error("{0}")]
    Extraction(#[from] ExtractionError),
}

/// Upload handed over by the boundary layer.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub original_filename: String,
    /// Declared MIME type; guessed from the filename when absent.
    pub mime_type: Option<String>,
    pub bytes: Vec<u8>,
}

pub struct DocumentPipeline {
    core: Arc<PipelineCore>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

struct PipelineCore {
    db_path: PathBuf,
    store: Arc<dyn FileStore>,
    extractor: TextExtraction,
    assistant: Arc<dyn AssistantClient>,
    in_flight: Mutex<HashSet<Uuid>>,
}

impl DocumentPipeline {
    pub fn new(
        db_path: PathBuf,
        store: Arc<dyn FileStore>,
        extractor: TextExtraction,
        assistant: Arc<dyn AssistantClient>,
    ) -> Self {
        Self {
            core: Arc::new(PipelineCore {
                db_path,
                store,
                extractor,
                assistant,
                in_flight: Mutex::new(HashSet::new()),
            }),
            workers: Mutex::new(Vec::new()),
        }
    }

    /// Persist a PENDING document and schedule its extraction. Returns the
    /// document immediately; the caller never awaits the pipeline.
    pub fn submit(&self, user_id: &str, upload: UploadedFile) -> Result<Document, PipelineError> {
        let conn = open_database(&self.core.db_path)?;

        let id = Uuid::new_v4();
        let mime_type = upload
            .mime_type
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| {
                mime_guess::from_path(&upload.original_filename)
                    .first_or_octet_stream()
                    .essence_str()
                    .to_string()
            });
        let stored_filename = format!("{id}_{}", sanitize_filename(&upload.original_filename));
        let file_path = self.core.store.write(&stored_filename, &upload.bytes)?;

        let ts = repository::now();
        let document = Document {
            id,
            user_id: user_id.to_string(),
            stored_filename,
            original_filename: upload.original_filename,
            mime_type,
            size_bytes: upload.bytes.len() as u64,
            file_path,
            upload_status: ProcessingStatus::Pending,
            created_at: ts,
            updated_at: ts,
        };
        repository::insert_document(&conn, &document)?;

        tracing::info!(
            document_id = %id,
            user_id = %user_id,
            file = %document.original_filename,
            mime_type = %document.mime_type,
            size_bytes = document.size_bytes,
            "Document submitted"
        );

        match self.core.begin(id) {
            Some(guard) => self.spawn_worker(id, guard),
            // Fresh uuid; cannot already be in flight.
            None => tracing::error!(document_id = %id, "Freshly submitted document already in flight"),
        }

        Ok(document)
    }

    /// Delete prior extraction results and run the pipeline again for an
    /// existing document. Rejected while a prior run is still in flight.
    /// The upload status is not reset synchronously; the caller observes
    /// PROCESSING once the scheduled task begins.
    pub fn reprocess(&self, document_id: &Uuid) -> Result<(), PipelineError> {
        let conn = open_database(&self.core.db_path)?;
        let document = repository::get_document(&conn, document_id)?
            .ok_or(PipelineError::DocumentMissing(*document_id))?;

        let guard = self
            .core
            .begin(*document_id)
            .ok_or(PipelineError::AlreadyProcessing(*document_id))?;

        let deleted = repository::delete_extraction_results(&conn, document_id)?;
        tracing::info!(
            document_id = %document_id,
            file = %document.original_filename,
            cleared_results = deleted,
            "Reprocess requested"
        );

        self.spawn_worker(*document_id, guard);
        Ok(())
    }

    /// Is an extraction currently running for this document?
    pub fn is_in_flight(&self, document_id: &Uuid) -> bool {
        self.core
            .in_flight
            .lock()
            .map(|set| set.contains(document_id))
            .unwrap_or(false)
    }

    /// Join all outstanding extraction workers. Used by tests and shutdown;
    /// clients observe completion by polling document state.
    pub fn wait_for_idle(&self) {
        let handles: Vec<_> = match self.workers.lock() {
            Ok(mut workers) => workers.drain(..).collect(),
            Err(_) => return,
        };
        for handle in handles {
            let _ = handle.join();
        }
    }

    fn spawn_worker(&self, document_id: Uuid, guard: InFlightGuard) {
        let core = Arc::clone(&self.core);
        let handle = std::thread::spawn(move || {
            let _guard = guard;
            core.run_extraction(document_id);
        });
        if let Ok(mut workers) = self.workers.lock() {
            workers.retain(|h| !h.is_finished());
            workers.push(handle);
        }
    }
}

impl Drop for DocumentPipeline {
    fn drop(&mut self) {
        self.wait_for_idle();
    }
}

impl PipelineCore {
    fn begin(self: &Arc<Self>, document_id: Uuid) -> Option<InFlightGuard> {
        let mut set = self.in_flight.lock().ok()?;
        if !set.insert(document_id) {
            return None;
        }
        Some(InFlightGuard {
            core: Arc::clone(self),
            document_id,
        })
    }

    /// The core state transition sequence. Never panics the worker and never
    /// surfaces errors to any caller: failures are recorded as terminal
    /// FAILED state on both the document and its extraction result.
    fn run_extraction(&self, document_id: Uuid) {
        let conn = match open_database(&self.db_path) {
            Ok(conn) => conn,
            Err(e) => {
                tracing::error!(document_id = %document_id, error = %e, "Extraction task could not open database");
                return;
            }
        };

        if let Err(e) =
            repository::update_upload_status(&conn, &document_id, &ProcessingStatus::Processing)
        {
            tracing::warn!(document_id = %document_id, error = %e, "Extraction task could not enter PROCESSING");
            self.mark_failed(&conn, &document_id, &e.to_string());
            return;
        }

        match self.execute(&conn, document_id) {
            Ok(()) => {
                tracing::info!(document_id = %document_id, "Extraction pipeline completed");
            }
            Err(e) => {
                tracing::warn!(document_id = %document_id, error = %e, "Extraction pipeline failed");
                self.mark_failed(&conn, &document_id, &e.to_string());
            }
        }
    }

    fn execute(&self, conn: &Connection, document_id: Uuid) -> Result<(), PipelineError> {
        let document = repository::get_document(conn, &document_id)?
            .ok_or(PipelineError::DocumentMissing(document_id))?;

        let ts = repository::now();
        let placeholder = ExtractionResult {
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
        };
        repository::upsert_extraction_result(conn, &placeholder)?;

        // A missing backing file is a real failure, reported now, not
        // deferred into an engine error.
        let file_bytes = self.store.read(&document.file_path)?;

        let outcome = self.extractor.extract(
            &file_bytes,
            &document.mime_type,
            &document.original_filename,
        )?;

        let summary = if outcome.text.is_empty() {
            None
        } else {
            self.generate_summary(&outcome.text)
        };

        let ts = repository::now();
        repository::upsert_extraction_result(
            conn,
            &ExtractionResult {
                id: Uuid::new_v4(),
                document_id,
                extracted_text: outcome.text,
                summary,
                confidence: Some(outcome.confidence),
                processing_time_ms: Some(outcome.processing_time_ms),
                status: ProcessingStatus::Completed,
                error_message: None,
                created_at: ts,
                updated_at: ts,
            },
        )?;
        repository::update_upload_status(conn, &document_id, &ProcessingStatus::Completed)?;

        Ok(())
    }

    /// Summary generation is best-effort: any assistant failure is logged
    /// and the extraction completes without a summary.
    fn generate_summary(&self, text: &str) -> Option<String> {
        let excerpt: String = text.chars().take(SUMMARY_SOURCE_CHARS).collect();
        let turns = [ChatTurn::user(format!(
            "Summarize this document:\n\n{excerpt}"
        ))];

        match self.assistant.complete(SUMMARY_SYSTEM_PROMPT, &turns) {
            Ok(completion) => {
                let summary = clean_summary(&completion.text);
                if summary.is_empty() {
                    None
                } else {
                    Some(summary)
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Summary generation failed; continuing without summary");
                None
            }
        }
    }

    /// Terminal failure branch: both statuses reach FAILED together, and the
    /// error text is preserved on the extraction result (created if absent).
    fn mark_failed(&self, conn: &Connection, document_id: &Uuid, error_message: &str) {
        if let Err(e) =
            repository::update_upload_status(conn, document_id, &ProcessingStatus::Failed)
        {
            tracing::error!(document_id = %document_id, error = %e, "Could not mark document FAILED");
        }
        if let Err(e) = repository::mark_extraction_failed(conn, document_id, error_message) {
            tracing::error!(document_id = %document_id, error = %e, "Could not record extraction failure");
        }
    }
}

struct InFlightGuard {
    core: Arc<PipelineCore>,
    document_id: Uuid,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if let Ok(mut set) = self.core.in_flight.lock() {
            set.remove(&self.document_id);
        }
    }
}

/// Strip surrounding quotes, collapse to one line, and cap the length.
fn clean_summary(raw: &str) -> String {
    let mut cleaned = raw
        .trim()
        .trim_matches(|c| c == '"' || c == '\'' || c == '\u{201c}' || c == '\u{201d}')
        .replace('\n', " ")
        .trim()
        .to_string();

    if cleaned.chars().count() > SUMMARY_MAX_CHARS {
        cleaned = cleaned.chars().take(SUMMARY_MAX_CHARS).collect();
    }
    cleaned
}

/// Reduce an uploaded filename to its final path component.
fn sanitize_filename(original: &str) -> String {
    Path::new(original)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string())
}
