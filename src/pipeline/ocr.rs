use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use crate::data_model::{DocumentStatus, DocumentUpdate};
use crate::error::Result;
use crate::executor::{IngestionContext, ProcessingStep, StepReport};
use crate::providers::OcrProvider;

/// Extracts text from the document's file through the configured provider.
///
/// On provider failure the context keeps empty text at zero confidence so the
/// following steps still run.
pub struct OcrStep {
    provider: Arc<dyn OcrProvider>,
}

impl OcrStep {
    pub fn new(provider: Arc<dyn OcrProvider>) -> Self {
        OcrStep { provider }
    }
}

#[async_trait]
impl ProcessingStep for OcrStep {
    fn name(&self) -> &'static str {
        "ocr"
    }

    async fn process(&self, context: &mut IngestionContext) -> Result<StepReport> {
        let output = match self.provider.recognize(&context.file_url).await {
            Ok(output) => output,
            Err(e) => {
                context.ocr_text.clear();
                context.ocr_confidence = 0.0;
                return Err(e);
            }
        };

        debug!(
            provider = self.provider.name(),
            text_length = output.text.len(),
            "Text recognised"
        );
        context.ocr_text = output.text.clone();
        context.ocr_confidence = output.confidence;

        Ok(StepReport {
            details: json!({
                "confidence": output.confidence,
                "text_length": output.text.chars().count(),
            }),
            update: DocumentUpdate {
                status: Some(DocumentStatus::OcrComplete),
                ocr_text: Some(output.text),
                ocr_confidence: Some(output.confidence),
                ..Default::default()
            },
            tasks: Vec::new(),
        })
    }
}
