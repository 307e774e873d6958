// src/processor.rs

use crate::config::AppConfig;
use crate::data_model::{DocumentStatus, DocumentUpdate};
use crate::error::{DocFlowError, Result};
use crate::executor::{IngestionContext, PipelineExecutor, ProcessingStep};
use crate::pipeline::{ClassificationStep, DepartmentAssignmentStep, MetadataExtractionStep, OcrStep};
use crate::providers::classifier::DEFAULT_LABEL;
use crate::providers::{Classifier, OcrProvider};
use crate::store::DocumentStore;
use crate::utils::prometheus_metrics::*;
use futures::stream::{FuturesUnordered, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// Builds the fixed four-step ingestion pipeline.
pub fn build_pipeline(
    ocr: Arc<dyn OcrProvider>,
    classifier: Arc<dyn Classifier>,
    store: Arc<dyn DocumentStore>,
) -> Vec<Box<dyn ProcessingStep>> {
    let steps: Vec<Box<dyn ProcessingStep>> = vec![
        Box::new(OcrStep::new(ocr)),
        Box::new(ClassificationStep::new(classifier, store.clone())),
        Box::new(MetadataExtractionStep::new()),
        Box::new(DepartmentAssignmentStep::new(store)),
    ];
    info!(
        steps = ?steps.iter().map(|s| s.name()).collect::<Vec<_>>(),
        "Pipeline built"
    );
    steps
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessRequest {
    pub document_id: Option<String>,
    pub file_url: Option<String>,
}

impl ProcessRequest {
    pub fn new(document_id: impl Into<String>, file_url: impl Into<String>) -> Self {
        ProcessRequest {
            document_id: Some(document_id.into()),
            file_url: Some(file_url.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessResponse {
    pub success: bool,
    pub message: String,
    pub document_id: String,
    pub ocr_text: String,
    pub classification: String,
    pub status: DocumentStatus,
}

fn required(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Entry point of the ingestion trigger.
pub struct DocumentProcessor {
    executor: PipelineExecutor,
    store: Arc<dyn DocumentStore>,
}

impl DocumentProcessor {
    pub fn new(executor: PipelineExecutor, store: Arc<dyn DocumentStore>) -> Self {
        DocumentProcessor { executor, store }
    }

    /// Wires the default pipeline with the degraded policy from `config`.
    pub fn from_config(
        config: &AppConfig,
        ocr: Arc<dyn OcrProvider>,
        classifier: Arc<dyn Classifier>,
        store: Arc<dyn DocumentStore>,
    ) -> Self {
        let steps = build_pipeline(ocr, classifier, store.clone());
        let executor = PipelineExecutor::new(steps, store.clone())
            .with_degraded_policy(config.pipeline.degrade_on_step_failure);
        DocumentProcessor::new(executor, store)
    }

    /// Validates the request and runs the pipeline for one document.
    ///
    /// Nothing is written when an input is missing or the document is unknown.
    #[instrument(skip(self, request), fields(document_id))]
    pub async fn process(&self, request: ProcessRequest) -> Result<ProcessResponse> {
        let (Some(document_id), Some(file_url)) =
            (required(request.document_id), required(request.file_url))
        else {
            return Err(DocFlowError::MissingInput(
                "Document ID and file URL are required".to_string(),
            ));
        };
        tracing::Span::current().record("document_id", document_id.as_str());

        if self.store.get_document(&document_id).await?.is_none() {
            return Err(DocFlowError::not_found("document", document_id));
        }

        ACTIVE_PIPELINE_RUNS.inc();
        let timer = PIPELINE_RUN_DURATION_SECONDS.start_timer();
        let result = self
            .executor
            .run_single_async(IngestionContext::new(&document_id, file_url))
            .await;
        timer.observe_duration();
        ACTIVE_PIPELINE_RUNS.dec();

        match result {
            Ok(run) => {
                DOCUMENTS_PROCESSED_TOTAL.inc();
                if !run.failed_steps.is_empty() {
                    DOCUMENTS_DEGRADED_TOTAL.inc();
                }
                info!(
                    status = %run.final_status,
                    failed_steps = ?run.failed_steps,
                    "Document processed"
                );
                let classification = run
                    .context
                    .classification
                    .map(|c| c.label)
                    .unwrap_or_else(|| DEFAULT_LABEL.to_string());
                Ok(ProcessResponse {
                    success: true,
                    message: "Document processed successfully".to_string(),
                    document_id,
                    ocr_text: run.context.ocr_text,
                    classification,
                    status: run.final_status,
                })
            }
            Err(e) => {
                PIPELINE_RUN_ERRORS_TOTAL.inc();
                error!(error = %e, "Error processing document");
                self.mark_failed(&document_id).await;
                Err(e)
            }
        }
    }

    /// One attempt; if the write fails the document keeps its partial status.
    async fn mark_failed(&self, document_id: &str) {
        let current = match self.store.get_document(document_id).await {
            Ok(Some(doc)) => doc.status,
            Ok(None) => return,
            Err(e) => {
                warn!(error = %e, "Could not read document to mark it failed");
                return;
            }
        };
        if !current.can_advance_to(DocumentStatus::Failed) {
            return;
        }
        if let Err(e) = self
            .store
            .update_document(document_id, DocumentUpdate::status(DocumentStatus::Failed))
            .await
        {
            warn!(error = %e, "Could not mark document failed");
        }
    }

    /// Runs several documents concurrently; each run stays sequential.
    pub async fn process_many(&self, requests: Vec<ProcessRequest>) -> Vec<Result<ProcessResponse>> {
        requests
            .into_iter()
            .map(|request| self.process(request))
            .collect::<FuturesUnordered<_>>()
            .collect()
            .await
    }
}
