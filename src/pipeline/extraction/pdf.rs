use super::types::PdfExtractor;
use super::ExtractionError;

/// PDF text extractor using the pdf-extract crate.
/// Reads the embedded text layer of digital PDFs.
pub struct PdfTextExtractor;

impl PdfExtractor for PdfTextExtractor {
    fn extract_text(&self, pdf_bytes: &[u8]) -> Result<String, ExtractionError> {
        let text = pdf_extract::extract_text_from_mem(pdf_bytes)
            .map_err(|e| ExtractionError::PdfParsing(e.to_string()))?;

        // A scanned PDF with no text layer yields only layout whitespace.
        // Normalize that to the empty string; it is a valid outcome, not an
        // error.
        if text.trim().is_empty() {
            Ok(String::new())
        } else {
            Ok(text)
        }
    }
}
