//! Service facade: the boundary operations exposed to the (external)
//! routing layer.
//!
//! Every operation takes the caller's identity together with a document id
//! and verifies ownership before touching anything. Synchronous failures
//! surface as typed `ServiceError`s; asynchronous extraction failures are
//! only visible through the persisted FAILED state.

pub mod export;
pub mod interactions;

pub use export::{DownloadBundle, REPORT_ENTRY_NAME};

use std::path::PathBuf;
use std::sync::Arc;

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::db::repository::{self, DocumentListing};
use crate::db::sqlite::open_database;
use crate::db::DatabaseError;
use crate::models::{Document, ExtractionResult, Interaction};
use crate::pipeline::assistant::{AssistantClient, AssistantError};
use crate::pipeline::extraction::{ExtractionError, TextExtraction};
use crate::pipeline::{DocumentPipeline, PipelineError, UploadedFile};
use crate::storage::{FileStore, StorageError};

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Document not found: {0}")]
    NotFound(Uuid),

    #[error("Document {0} does not belong to the requesting user")]
    Forbidden(Uuid),

    #[error("Document text extraction has not completed yet")]
    NotReady,

    #[error("Backing file is missing from storage: {0}")]
    FileMissing(String),

    #[error("An extraction for document {0} is already running")]
    AlreadyProcessing(Uuid),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Assistant(#[from] AssistantError),

    #[error("Archive assembly failed: {0}")]
    Archive(#[from] zip::result::ZipError),
}

impl From<PipelineError> for ServiceError {
    fn from(e: PipelineError) -> Self {
        match e {
            PipelineError::DocumentMissing(id) => Self::NotFound(id),
            PipelineError::AlreadyProcessing(id) => Self::AlreadyProcessing(id),
            PipelineError::Database(e) => Self::Database(e),
            PipelineError::Storage(e) => Self::Storage(e),
            PipelineError::Extraction(e) => Self::Extraction(e),
        }
    }
}

/// A document with its extraction result and full interaction history
/// (newest-first).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentDetail {
    pub document: Document,
    pub extraction: Option<ExtractionResult>,
    pub interactions: Vec<Interaction>,
}

pub struct DocumentService {
    db_path: PathBuf,
    store: Arc<dyn FileStore>,
    assistant: Arc<dyn AssistantClient>,
    pipeline: DocumentPipeline,
}

impl DocumentService {
    /// All collaborators are passed in explicitly so tests can substitute
    /// fakes without touching process state.
    pub fn new(
        db_path: PathBuf,
        store: Arc<dyn FileStore>,
        extractor: TextExtraction,
        assistant: Arc<dyn AssistantClient>,
    ) -> Self {
        let pipeline = DocumentPipeline::new(
            db_path.clone(),
            store.clone(),
            extractor,
            assistant.clone(),
        );
        Self {
            db_path,
            store,
            assistant,
            pipeline,
        }
    }

    /// Store the upload, create the PENDING document, and schedule the
    /// extraction. Returns before the pipeline runs.
    pub fn submit_document(
        &self,
        user_id: &str,
        upload: UploadedFile,
    ) -> Result<Document, ServiceError> {
        Ok(self.pipeline.submit(user_id, upload)?)
    }

    /// The caller's documents, newest-first, annotated with extraction
    /// summary fields and interaction counts.
    pub fn list_documents(&self, user_id: &str) -> Result<Vec<DocumentListing>, ServiceError> {
        let conn = self.connect()?;
        Ok(repository::list_documents_for_user(&conn, user_id)?)
    }

    pub fn get_document(
        &self,
        document_id: &Uuid,
        user_id: &str,
    ) -> Result<DocumentDetail, ServiceError> {
        let conn = self.connect()?;
        let document = self.owned_document(&conn, document_id, user_id)?;
        let extraction = repository::get_extraction_result(&conn, document_id)?;
        let interactions = repository::list_interactions(&conn, document_id)?;
        Ok(DocumentDetail {
            document,
            extraction,
            interactions,
        })
    }

    pub fn explain_document(
        &self,
        document_id: &Uuid,
        user_id: &str,
        context: Option<&str>,
    ) -> Result<Interaction, ServiceError> {
        let conn = self.connect()?;
        let document = self.owned_document(&conn, document_id, user_id)?;
        interactions::explain(&conn, self.assistant.as_ref(), &document, context)
    }

    pub fn query_document(
        &self,
        document_id: &Uuid,
        user_id: &str,
        question: &str,
    ) -> Result<Interaction, ServiceError> {
        let conn = self.connect()?;
        let document = self.owned_document(&conn, document_id, user_id)?;
        interactions::query(&conn, self.assistant.as_ref(), &document, question)
    }

    pub fn build_download(
        &self,
        document_id: &Uuid,
        user_id: &str,
    ) -> Result<DownloadBundle, ServiceError> {
        let conn = self.connect()?;
        let document = self.owned_document(&conn, document_id, user_id)?;
        export::build_export(&conn, self.store.as_ref(), &document)
    }

    /// Delete the document with its extraction result and interactions.
    /// Removal of the backing file is best-effort: a failure is logged, not
    /// surfaced.
    pub fn delete_document(&self, document_id: &Uuid, user_id: &str) -> Result<(), ServiceError> {
        let conn = self.connect()?;
        let document = self.owned_document(&conn, document_id, user_id)?;
        repository::delete_document_cascade(&conn, document_id)?;

        if let Err(e) = self.store.delete(&document.file_path) {
            tracing::warn!(
                document_id = %document_id,
                error = %e,
                "Backing file removal failed after delete"
            );
        }
        Ok(())
    }

    /// Run the extraction pipeline again for this document. Rejected while a
    /// prior run is still in flight.
    pub fn reprocess_document(&self, document_id: &Uuid, user_id: &str) -> Result<(), ServiceError> {
        let conn = self.connect()?;
        self.owned_document(&conn, document_id, user_id)?;
        Ok(self.pipeline.reprocess(document_id)?)
    }

    /// Join outstanding extraction workers (tests and shutdown).
    pub fn wait_for_idle(&self) {
        self.pipeline.wait_for_idle();
    }

    fn connect(&self) -> Result<Connection, ServiceError> {
        Ok(open_database(&self.db_path)?)
    }

    fn owned_document(
        &self,
        conn: &Connection,
        document_id: &Uuid,
        user_id: &str,
    ) -> Result<Document, ServiceError> {
        let document = repository::get_document(conn, document_id)?
            .ok_or(ServiceError::NotFound(*document_id))?;
        if document.user_id != user_id {
            tracing::warn!(
                document_id = %document_id,
                user_id = %user_id,
                "Ownership check failed"
            );
            return Err(ServiceError::Forbidden(*document_id));
        }
        Ok(document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::models::enums::{InteractionType, ProcessingStatus};
    use crate::pipeline::assistant::{MockAssistant, UnconfiguredAssistant};
    use crate::pipeline::extraction::{MockOcrEngine, PdfTextExtractor};
    use crate::storage::LocalFileStore;

    struct ServiceEnv {
        _dir: tempfile::TempDir,
        service: DocumentService,
        store: Arc<LocalFileStore>,
    }

    fn service_with_assistant(assistant: Arc<dyn AssistantClient>) -> ServiceEnv {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("docuvault.db");
        open_database(&db_path).unwrap();
        let store = Arc::new(LocalFileStore::new(dir.path().join("documents")).unwrap());
        let extractor = TextExtraction::new(
            Box::new(MockOcrEngine::new("Receipt\nTotal: 42.00", Some(88.0))),
            Box::new(PdfTextExtractor),
        );
        let service = DocumentService::new(db_path, store.clone(), extractor, assistant);
        ServiceEnv {
            _dir: dir,
            service,
            store,
        }
    }

    fn test_env() -> ServiceEnv {
        service_with_assistant(Arc::new(MockAssistant::new("The total is 42.00.")))
    }

    fn png_upload() -> UploadedFile {
        UploadedFile {
            original_filename: "receipt.png".into(),
            mime_type: Some("image/png".into()),
            bytes: vec![0u8; 500],
        }
    }

    fn submit_and_settle(env: &ServiceEnv) -> Document {
        let document = env.service.submit_document("user-1", png_upload()).unwrap();
        env.service.wait_for_idle();
        document
    }

    #[test]
    fn get_document_enforces_existence_and_ownership() {
        let env = test_env();
        let document = submit_and_settle(&env);

        let missing = env.service.get_document(&Uuid::new_v4(), "user-1");
        assert!(matches!(missing, Err(ServiceError::NotFound(_))));

        let foreign = env.service.get_document(&document.id, "user-2");
        assert!(matches!(foreign, Err(ServiceError::Forbidden(_))));

        let detail = env.service.get_document(&document.id, "user-1").unwrap();
        assert_eq!(detail.document.id, document.id);
        assert_eq!(
            detail.extraction.unwrap().status,
            ProcessingStatus::Completed
        );
    }

    #[test]
    fn ai_operations_before_completion_fail_not_ready_and_persist_nothing() {
        let env = test_env();
        // Insert a document directly, with no extraction run at all
        let conn = open_database(&env.service.db_path).unwrap();
        let doc = crate::db::repository::document::test_document("user-1", "fresh.png");
        repository::insert_document(&conn, &doc).unwrap();

        let explain = env.service.explain_document(&doc.id, "user-1", None);
        assert!(matches!(explain, Err(ServiceError::NotReady)));
        let query = env.service.query_document(&doc.id, "user-1", "total?");
        assert!(matches!(query, Err(ServiceError::NotReady)));

        let detail = env.service.get_document(&doc.id, "user-1").unwrap();
        assert!(detail.interactions.is_empty());
    }

    #[test]
    fn query_scenario_round_trip() {
        let env = test_env();
        let document = submit_and_settle(&env);

        let interaction = env
            .service
            .query_document(&document.id, "user-1", "What is the total?")
            .unwrap();
        assert_eq!(interaction.interaction_type, InteractionType::Query);
        assert_eq!(interaction.prompt, "What is the total?");
        assert!(!interaction.response.is_empty());

        let detail = env.service.get_document(&document.id, "user-1").unwrap();
        assert_eq!(detail.interactions.len(), 1);
        assert_eq!(detail.interactions[0].prompt, "What is the total?");
    }

    #[test]
    fn listing_counts_match_detail_lists() {
        let env = test_env();
        let document = submit_and_settle(&env);

        env.service
            .explain_document(&document.id, "user-1", None)
            .unwrap();
        env.service
            .query_document(&document.id, "user-1", "and the date?")
            .unwrap();

        let listings = env.service.list_documents("user-1").unwrap();
        assert_eq!(listings.len(), 1);
        let detail = env.service.get_document(&document.id, "user-1").unwrap();
        assert_eq!(
            listings[0].interaction_count as usize,
            detail.interactions.len()
        );
        // Newest-first: the query came after the explanation
        assert_eq!(detail.interactions[0].prompt, "and the date?");
        assert_eq!(
            detail.interactions[1].interaction_type,
            InteractionType::Explanation
        );
    }

    #[test]
    fn delete_document_removes_rows_and_backing_file() {
        let env = test_env();
        let document = submit_and_settle(&env);
        env.service
            .explain_document(&document.id, "user-1", None)
            .unwrap();
        for question in ["a?", "b?", "c?"] {
            env.service
                .query_document(&document.id, "user-1", question)
                .unwrap();
        }

        env.service.delete_document(&document.id, "user-1").unwrap();

        let result = env.service.get_document(&document.id, "user-1");
        assert!(matches!(result, Err(ServiceError::NotFound(_))));
        assert!(env.store.read(&document.file_path).is_err());

        let conn = open_database(&env.service.db_path).unwrap();
        assert!(repository::get_extraction_result(&conn, &document.id)
            .unwrap()
            .is_none());
        assert_eq!(
            repository::count_interactions(&conn, &document.id).unwrap(),
            0
        );
    }

    #[test]
    fn delete_tolerates_already_missing_backing_file() {
        let env = test_env();
        let document = submit_and_settle(&env);
        env.store.delete(&document.file_path).unwrap();

        env.service.delete_document(&document.id, "user-1").unwrap();
        assert!(matches!(
            env.service.get_document(&document.id, "user-1"),
            Err(ServiceError::NotFound(_))
        ));
    }

    #[test]
    fn download_bundle_for_completed_document() {
        let env = test_env();
        let document = submit_and_settle(&env);
        env.service
            .query_document(&document.id, "user-1", "What is the total?")
            .unwrap();

        let bundle = env.service.build_download(&document.id, "user-1").unwrap();
        assert_eq!(bundle.filename, "receipt_with_extracted_data.zip");

        let mut archive =
            zip::ZipArchive::new(std::io::Cursor::new(&bundle.bytes[..])).unwrap();
        assert_eq!(archive.len(), 2);
    }

    #[test]
    fn unconfigured_assistant_yields_actionable_error() {
        let env = service_with_assistant(Arc::new(UnconfiguredAssistant));
        let document = submit_and_settle(&env);

        let err = env
            .service
            .query_document(&document.id, "user-1", "total?")
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Assistant(AssistantError::Unavailable(_))
        ));
        assert!(err.to_string().contains("not configured"));

        // Nothing persisted for the failed call
        let detail = env.service.get_document(&document.id, "user-1").unwrap();
        assert!(detail.interactions.is_empty());
    }

    #[test]
    fn reprocess_checks_ownership_before_running() {
        let env = test_env();
        let document = submit_and_settle(&env);

        let foreign = env.service.reprocess_document(&document.id, "user-2");
        assert!(matches!(foreign, Err(ServiceError::Forbidden(_))));

        env.service
            .reprocess_document(&document.id, "user-1")
            .unwrap();
        env.service.wait_for_idle();

        let detail = env.service.get_document(&document.id, "user-1").unwrap();
        assert_eq!(
            detail.document.upload_status,
            ProcessingStatus::Completed
        );
    }

    #[test]
    fn submit_guesses_mime_type_when_absent() {
        let env = test_env();
        let document = env
            .service
            .submit_document(
                "user-1",
                UploadedFile {
                    original_filename: "scan.jpg".into(),
                    mime_type: None,
                    bytes: vec![1, 2, 3],
                },
            )
            .unwrap();
        env.service.wait_for_idle();
        assert_eq!(document.mime_type, "image/jpeg");
    }
}
