use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use crate::data_model::{DocumentStatus, DocumentUpdate};
use crate::error::Result;
use crate::executor::{IngestionContext, ProcessingStep, StepReport};
use crate::providers::Classifier;
use crate::store::DocumentStore;

/// Labels the extracted text and resolves the label to a reference row.
pub struct ClassificationStep {
    classifier: Arc<dyn Classifier>,
    store: Arc<dyn DocumentStore>,
}

impl ClassificationStep {
    pub fn new(classifier: Arc<dyn Classifier>, store: Arc<dyn DocumentStore>) -> Self {
        ClassificationStep { classifier, store }
    }
}

#[async_trait]
impl ProcessingStep for ClassificationStep {
    fn name(&self) -> &'static str {
        "classification"
    }

    async fn process(&self, context: &mut IngestionContext) -> Result<StepReport> {
        let label = self.classifier.classify(&context.ocr_text);
        // A missing reference row is not an error: the label is still reported.
        let classification_id = self
            .store
            .find_classification_by_name(&label.label)
            .await?
            .map(|row| row.id);

        debug!(label = %label.label, confidence = label.confidence, ?classification_id, "Document classified");
        context.classification = Some(label.clone());
        context.classification_id = classification_id.clone();

        Ok(StepReport {
            update: DocumentUpdate {
                status: Some(DocumentStatus::Classified),
                classification_id,
                classification_confidence: Some(label.confidence),
                ..Default::default()
            },
            details: json!({
                "classification": label.label,
                "confidence": label.confidence,
            }),
            tasks: Vec::new(),
        })
    }
}
