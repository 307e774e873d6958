use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::data_model::DocumentUpdate;
use crate::error::Result;
use crate::executor::{IngestionContext, ProcessingStep, StepReport};
use crate::store::DocumentStore;

/// Copies the classification's auto-assign department onto the document.
///
/// The assignment replaces any existing department list.
pub struct DepartmentAssignmentStep {
    store: Arc<dyn DocumentStore>,
}

impl DepartmentAssignmentStep {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        DepartmentAssignmentStep { store }
    }
}

#[async_trait]
impl ProcessingStep for DepartmentAssignmentStep {
    fn name(&self) -> &'static str {
        "department_assignment"
    }

    async fn process(&self, context: &mut IngestionContext) -> Result<StepReport> {
        let department = match &context.classification_id {
            Some(id) => self
                .store
                .get_classification(id)
                .await?
                .and_then(|row| row.auto_assign_department),
            None => None,
        };

        Ok(StepReport {
            details: json!({ "department": department }),
            update: DocumentUpdate {
                assigned_departments: department.map(|d| vec![d]),
                ..Default::default()
            },
            tasks: Vec::new(),
        })
    }
}
