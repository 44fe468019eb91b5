//! Vision OCR engine: extracts text from document images via Ollama.
//!
//! Encodes the image as base64 and asks a vision-capable model to transcribe
//! it. Vision models report no per-word confidences, so `mean_confidence`
//! stays `None` and the adapter applies the documented default.

use base64::Engine as _;

use crate::config;
use crate::pipeline::assistant::{ChatTurn, OllamaClient};

use super::types::{OcrEngine, OcrOutput};
use super::ExtractionError;

const OCR_SYSTEM_PROMPT: &str = "\
You are a document text extractor. Extract ALL visible text from the provided \
document image exactly as written. Preserve line breaks and reading order. \
Output only the transcribed text, with no commentary.";

const OCR_USER_PROMPT: &str = "Extract all visible text from this document image.";

/// Production OCR engine backed by an Ollama vision model.
pub struct OllamaVisionOcr {
    client: OllamaClient,
    model: String,
}

impl OllamaVisionOcr {
    pub fn new(client: OllamaClient, model: String) -> Self {
        Self { client, model }
    }

    /// Engine configured from the environment, with the stock vision model
    /// as fallback.
    pub fn from_env() -> Self {
        let model = std::env::var(config::OCR_MODEL_ENV)
            .unwrap_or_else(|_| config::DEFAULT_OCR_MODEL.to_string());
        Self::new(OllamaClient::from_env(), model)
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

impl OcrEngine for OllamaVisionOcr {
    fn ocr_image(&self, image_bytes: &[u8]) -> Result<OcrOutput, ExtractionError> {
        let _span = tracing::info_span!(
            "vision_ocr",
            model = %self.model,
            image_size = image_bytes.len(),
        )
        .entered();

        let base64_image = base64::engine::general_purpose::STANDARD.encode(image_bytes);
        let images = vec![base64_image];

        let turns = [ChatTurn::user(OCR_USER_PROMPT)];
        let exchange = self
            .client
            .chat(&self.model, Some(OCR_SYSTEM_PROMPT), &turns, Some(&images))
            .map_err(|e| ExtractionError::OcrProcessing(e.to_string()))?;

        tracing::info!(text_len = exchange.text.len(), "Vision OCR completed");

        Ok(OcrOutput {
            text: exchange.text,
            mean_confidence: None,
        })
    }
}

/// Mock OCR engine for tests: returns fixed text and confidence.
pub struct MockOcrEngine {
    text: String,
    mean_confidence: Option<f32>,
}

impl MockOcrEngine {
    pub fn new(text: &str, mean_confidence: Option<f32>) -> Self {
        Self {
            text: text.to_string(),
            mean_confidence,
        }
    }
}

impl OcrEngine for MockOcrEngine {
    fn ocr_image(&self, _image_bytes: &[u8]) -> Result<OcrOutput, ExtractionError> {
        Ok(OcrOutput {
            text: self.text.clone(),
            mean_confidence: self.mean_confidence,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_engine_returns_configured_output() {
        let engine = MockOcrEngine::new("Receipt total 12.50", Some(87.5));
        let out = engine.ocr_image(b"png bytes").unwrap();
        assert_eq!(out.text, "Receipt total 12.50");
        assert_eq!(out.mean_confidence, Some(87.5));
    }

    #[test]
    fn ocr_prompt_demands_text_only_output() {
        assert!(OCR_SYSTEM_PROMPT.contains("Extract ALL visible text"));
        assert!(OCR_SYSTEM_PROMPT.contains("no commentary"));
    }
}
