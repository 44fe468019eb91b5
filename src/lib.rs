//! DocuVault: a private document vault.
//!
//! Upload an image or PDF, let the asynchronous pipeline extract its text
//! (OCR for images, text-layer parsing for PDFs) and generate a short AI
//! summary, then ask questions about the content, download an export bundle,
//! or reprocess the document.
//!
//! The HTTP routing layer and authentication are external collaborators;
//! [`service::DocumentService`] is the boundary this crate exposes to them.

pub mod config;
pub mod db;
pub mod models;
pub mod pipeline;
pub mod service;
pub mod storage;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

/// Initialize tracing with RUST_LOG, falling back to the crate default.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();
}

/// Build a production [`service::DocumentService`] wired from configuration:
/// local file store, Ollama-backed OCR and assistant, SQLite at the default
/// path.
pub fn build_service() -> Result<service::DocumentService, service::ServiceError> {
    let store = Arc::new(storage::LocalFileStore::new(config::documents_dir())?);
    let extractor = pipeline::extraction::TextExtraction::new(
        Box::new(pipeline::extraction::OllamaVisionOcr::from_env()),
        Box::new(pipeline::extraction::PdfTextExtractor),
    );
    let assistant = pipeline::assistant::assistant_from_env();

    tracing::info!(version = config::APP_VERSION, "{} starting", config::APP_NAME);

    Ok(service::DocumentService::new(
        config::database_path(),
        store,
        extractor,
        assistant,
    ))
}
