use std::path::PathBuf;

/// Application-level constants
pub const APP_NAME: &str = "DocuVault";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Environment variable overriding the Ollama base URL.
pub const OLLAMA_URL_ENV: &str = "DOCUVAULT_OLLAMA_URL";
/// Environment variable naming the chat model used for summaries and Q&A.
/// When unset, the assistant is treated as unconfigured and AI features
/// fail fast with a "not configured" error.
pub const ASSISTANT_MODEL_ENV: &str = "DOCUVAULT_ASSISTANT_MODEL";
/// Environment variable naming the vision model used for image OCR.
pub const OCR_MODEL_ENV: &str = "DOCUVAULT_OCR_MODEL";

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_OCR_MODEL: &str = "llama3.2-vision:latest";

/// Get the application data directory
/// ~/DocuVault/ on all platforms (user-visible, per design requirement)
pub fn app_data_dir() -> PathBuf {
    let home = dirs::home_dir().expect("Cannot determine home directory");
    home.join("DocuVault")
}

/// Get the directory holding uploaded document files
pub fn documents_dir() -> PathBuf {
    app_data_dir().join("documents")
}

/// Get the default SQLite database path
pub fn database_path() -> PathBuf {
    app_data_dir().join("docuvault.db")
}

/// Default log filter when RUST_LOG is unset
pub fn default_log_filter() -> &'static str {
    "docuvault=info"
}
