pub mod adapter;
pub mod ocr;
pub mod pdf;
pub mod types;

pub use adapter::*;
pub use ocr::*;
pub use pdf::*;
pub use types::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("OCR processing failed: {0}")]
    OcrProcessing(String),

    #[error("PDF parsing failed: {0}")]
    PdfParsing(String),

    #[error("Unsupported format for extraction: {0}")]
    UnsupportedFormat(String),
}
