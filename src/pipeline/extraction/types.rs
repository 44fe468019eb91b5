use serde::{Deserialize, Serialize};

use super::ExtractionError;

/// What a single extraction produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionOutcome {
    pub text: String,
    /// Mean engine confidence in [0, 100]. Text-layer PDF extraction is exact
    /// and reports 100; OCR engines that report nothing default to 0.
    pub confidence: f32,
    /// Wall-clock duration of the extraction call.
    pub processing_time_ms: u64,
}

/// How a file is extracted, resolved once at adapter entry from the MIME type
/// (with a `.pdf` filename fallback for misdeclared uploads).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Pdf,
    Image,
}

impl FileKind {
    pub fn detect(mime_type: &str, filename: &str) -> Result<Self, ExtractionError> {
        let mime = mime_type.trim().to_ascii_lowercase();
        if mime == "application/pdf" || filename.to_ascii_lowercase().ends_with(".pdf") {
            Ok(Self::Pdf)
        } else if mime.starts_with("image/") {
            Ok(Self::Image)
        } else {
            Err(ExtractionError::UnsupportedFormat(mime_type.to_string()))
        }
    }
}

/// Raw OCR result from the engine.
#[derive(Debug, Clone)]
pub struct OcrOutput {
    pub text: String,
    /// Mean confidence in [0, 100] when the engine reports one.
    pub mean_confidence: Option<f32>,
}

/// OCR engine abstraction (allows mocking for tests)
pub trait OcrEngine: Send + Sync {
    fn ocr_image(&self, image_bytes: &[u8]) -> Result<OcrOutput, ExtractionError>;
}

/// PDF text-layer extraction abstraction
pub trait PdfExtractor: Send + Sync {
    fn extract_text(&self, pdf_bytes: &[u8]) -> Result<String, ExtractionError>;
}
