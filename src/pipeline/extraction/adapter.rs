use std::time::Instant;

use super::types::{ExtractionOutcome, FileKind, OcrEngine, PdfExtractor};
use super::ExtractionError;

/// Text-layer extraction is exact, not probabilistic.
const PDF_TEXT_LAYER_CONFIDENCE: f32 = 100.0;

/// Text extraction adapter: one entry point over the two extraction
/// strategies, selected by a tagged `FileKind` resolved at entry.
pub struct TextExtraction {
    ocr: Box<dyn OcrEngine>,
    pdf: Box<dyn PdfExtractor>,
}

impl TextExtraction {
    pub fn new(ocr: Box<dyn OcrEngine>, pdf: Box<dyn PdfExtractor>) -> Self {
        Self { ocr, pdf }
    }

    /// Extract text from file bytes.
    ///
    /// PDFs read their embedded text layer (empty text is valid: a scanned
    /// PDF has no layer). Images run an OCR pass; the result is trimmed and
    /// a missing engine confidence defaults to 0.
    pub fn extract(
        &self,
        file_bytes: &[u8],
        mime_type: &str,
        filename: &str,
    ) -> Result<ExtractionOutcome, ExtractionError> {
        let started = Instant::now();
        let kind = FileKind::detect(mime_type, filename)?;

        let (text, confidence) = match kind {
            FileKind::Pdf => (
                self.pdf.extract_text(file_bytes)?,
                PDF_TEXT_LAYER_CONFIDENCE,
            ),
            FileKind::Image => {
                let out = self.ocr.ocr_image(file_bytes)?;
                let confidence = out.mean_confidence.unwrap_or(0.0).clamp(0.0, 100.0);
                (out.text.trim().to_string(), confidence)
            }
        };

        let processing_time_ms = started.elapsed().as_millis() as u64;
        tracing::debug!(
            ?kind,
            text_len = text.len(),
            confidence,
            processing_time_ms,
            "Extraction finished"
        );

        Ok(ExtractionOutcome {
            text,
            confidence,
            processing_time_ms,
        })
    }
}
