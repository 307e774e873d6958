use crate::data_model::{DocumentStatus, DocumentUpdate, LogStatus, ProcessingLog, Task};
use crate::error::{DocFlowError, Result};
use crate::providers::ClassificationLabel;
use crate::store::DocumentStore;
use crate::utils::prometheus_metrics::PIPELINE_STEP_FAILURES_TOTAL;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info_span, warn, Instrument};

/// State threaded through the steps of a single run.
#[derive(Debug, Clone, Default)]
pub struct IngestionContext {
    pub document_id: String,
    pub file_url: String,
    pub ocr_text: String,
    pub ocr_confidence: f64,
    pub classification: Option<ClassificationLabel>,
    pub classification_id: Option<String>,
}

impl IngestionContext {
    pub fn new(document_id: impl Into<String>, file_url: impl Into<String>) -> Self {
        IngestionContext {
            document_id: document_id.into(),
            file_url: file_url.into(),
            ..Default::default()
        }
    }
}

/// What a successful step wants persisted.
#[derive(Debug, Clone, Default)]
pub struct StepReport {
    pub update: DocumentUpdate,
    pub tasks: Vec<Task>,
    /// Detail payload of the step's processing-log row.
    pub details: Value,
}

#[async_trait]
pub trait ProcessingStep: Send + Sync {
    /// Also used as the `process_type` of the step's log rows.
    fn name(&self) -> &'static str;

    async fn process(&self, context: &mut IngestionContext) -> Result<StepReport>;
}

/// Outcome of a run that reached its final status.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub context: IngestionContext,
    pub final_status: DocumentStatus,
    pub failed_steps: Vec<String>,
}

pub const RUN_PROCESS_TYPE: &str = "document_processing";

pub struct PipelineExecutor {
    steps: Vec<Box<dyn ProcessingStep>>, // Holds the ordered steps
    store: Arc<dyn DocumentStore>,
    degrade_on_step_failure: bool,
}

impl PipelineExecutor {
    pub fn new(steps: Vec<Box<dyn ProcessingStep>>, store: Arc<dyn DocumentStore>) -> Self {
        if steps.is_empty() {
            warn!("Pipeline created with no steps.");
        }
        PipelineExecutor {
            steps,
            store,
            degrade_on_step_failure: false,
        }
    }

    /// Finish runs with a failed step at `degraded` instead of `completed`.
    pub fn with_degraded_policy(mut self, enabled: bool) -> Self {
        self.degrade_on_step_failure = enabled;
        self
    }

    pub fn step_names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    /// Runs every step in order. A step error is logged and the run moves on;
    /// only storage failures abort the run.
    pub async fn run_single_async(&self, initial_context: IngestionContext) -> Result<PipelineRun> {
        let mut context = initial_context;
        let document_id = context.document_id.clone();
        let mut status = DocumentStatus::Processing;

        self.store
            .update_document(&document_id, DocumentUpdate::status(status))
            .await?;
        self.append_log(
            &document_id,
            RUN_PROCESS_TYPE,
            LogStatus::Started,
            json!({ "file_url": context.file_url }),
        )
        .await?;

        let mut failed_steps = Vec::new();
        for step in &self.steps {
            let span = info_span!("pipeline_step", step = step.name(), document_id = %document_id);
            let outcome = step.process(&mut context).instrument(span).await;

            match outcome {
                Ok(report) => {
                    debug!(step = step.name(), "Step completed");
                    self.persist_report(step.name(), &document_id, &mut status, report)
                        .await?;
                }
                Err(e) => {
                    let err = DocFlowError::StepError {
                        step_name: step.name().to_string(),
                        source: Box::new(e),
                    };
                    warn!(%document_id, error = %err, "Pipeline step failed, continuing");
                    PIPELINE_STEP_FAILURES_TOTAL
                        .with_label_values(&[step.name()])
                        .inc();
                    self.append_log(
                        &document_id,
                        step.name(),
                        LogStatus::Failed,
                        json!({ "error": err.to_string() }),
                    )
                    .await?;
                    failed_steps.push(step.name().to_string());
                }
            }
        }

        let final_status = if self.degrade_on_step_failure && !failed_steps.is_empty() {
            DocumentStatus::Degraded
        } else {
            DocumentStatus::Completed
        };
        self.store
            .update_document(&document_id, DocumentUpdate::status(final_status))
            .await?;
        self.append_log(
            &document_id,
            RUN_PROCESS_TYPE,
            LogStatus::Completed,
            json!({
                "processing_steps": self.step_names(),
                "failed_steps": failed_steps,
                "final_status": final_status,
            }),
        )
        .await?;

        Ok(PipelineRun {
            context,
            final_status,
            failed_steps,
        })
    }

    async fn persist_report(
        &self,
        step_name: &str,
        document_id: &str,
        status: &mut DocumentStatus,
        report: StepReport,
    ) -> Result<()> {
        let mut update = report.update;
        if let Some(next) = update.status {
            if status.can_advance_to(next) {
                *status = next;
            } else {
                warn!(%document_id, current = %status, requested = %next, "Ignoring status regression");
                update.status = None;
            }
        }

        if !update.is_empty() {
            self.store.update_document(document_id, update).await?;
        }
        if !report.tasks.is_empty() {
            self.store.insert_tasks(report.tasks).await?;
        }
        self.append_log(document_id, step_name, LogStatus::Completed, report.details)
            .await
    }

    async fn append_log(
        &self,
        document_id: &str,
        process_type: &str,
        status: LogStatus,
        details: Value,
    ) -> Result<()> {
        self.store
            .append_log(ProcessingLog::new(document_id, process_type, status, details))
            .await
    }
}
