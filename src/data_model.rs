use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::error::DocFlowError;

/// Lifecycle of a document as it moves through the ingestion pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    #[default]
    Uploaded,
    Processing,
    OcrComplete,
    Classified,
    Completed,
    /// A run finished but at least one step reported failure.
    Degraded,
    Failed,
}

impl DocumentStatus {
    fn stage(self) -> u8 {
        match self {
            DocumentStatus::Uploaded => 0,
            DocumentStatus::Processing => 1,
            DocumentStatus::OcrComplete => 2,
            DocumentStatus::Classified => 3,
            DocumentStatus::Completed | DocumentStatus::Degraded => 4,
            DocumentStatus::Failed => 5,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            DocumentStatus::Completed | DocumentStatus::Degraded | DocumentStatus::Failed
        )
    }

    /// Whether a run currently at `self` may move to `next`.
    ///
    /// Status only moves forward. `Failed` is reachable from any non-terminal
    /// status; terminal statuses accept nothing.
    pub fn can_advance_to(self, next: DocumentStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        if next == DocumentStatus::Failed {
            return true;
        }
        next.stage() > self.stage()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DocumentStatus::Uploaded => "uploaded",
            DocumentStatus::Processing => "processing",
            DocumentStatus::OcrComplete => "ocr_complete",
            DocumentStatus::Classified => "classified",
            DocumentStatus::Completed => "completed",
            DocumentStatus::Degraded => "degraded",
            DocumentStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Document {
    pub id: String,
    pub filename: String,
    pub original_filename: Option<String>,
    pub file_path: String,
    pub mime_type: Option<String>,
    pub file_size: Option<u64>,
    pub uploaded_by: Option<String>,
    pub status: DocumentStatus,
    pub ocr_text: Option<String>,
    pub ocr_confidence: Option<f64>,
    pub classification_id: Option<String>,
    pub classification_confidence: Option<f64>,
    #[serde(default)]
    pub extracted_metadata: Map<String, Value>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub assigned_departments: Vec<String>,
    pub priority: i32,
    pub deadline: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Document {
    pub fn new(id: impl Into<String>, filename: impl Into<String>, file_path: impl Into<String>) -> Self {
        Document {
            id: id.into(),
            filename: filename.into(),
            file_path: file_path.into(),
            priority: 1,
            created_at: Utc::now(),
            ..Default::default()
        }
    }
}

/// Partial update applied to a stored document. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentUpdate {
    pub status: Option<DocumentStatus>,
    pub ocr_text: Option<String>,
    pub ocr_confidence: Option<f64>,
    pub classification_id: Option<String>,
    pub classification_confidence: Option<f64>,
    /// Keys are merged over the existing metadata map.
    pub extracted_metadata: Option<Map<String, Value>>,
    /// `Some(None)` clears the stored deadline.
    pub deadline: Option<Option<DateTime<Utc>>>,
    /// Replaces the whole list.
    pub assigned_departments: Option<Vec<String>>,
}

impl DocumentUpdate {
    pub fn status(status: DocumentStatus) -> Self {
        DocumentUpdate {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == DocumentUpdate::default()
    }

    pub fn apply_to(self, document: &mut Document) {
        if let Some(status) = self.status {
            document.status = status;
        }
        if let Some(text) = self.ocr_text {
            document.ocr_text = Some(text);
        }
        if let Some(confidence) = self.ocr_confidence {
            document.ocr_confidence = Some(confidence);
        }
        if let Some(id) = self.classification_id {
            document.classification_id = Some(id);
        }
        if let Some(confidence) = self.classification_confidence {
            document.classification_confidence = Some(confidence);
        }
        if let Some(metadata) = self.extracted_metadata {
            document.extracted_metadata.extend(metadata);
        }
        if let Some(deadline) = self.deadline {
            document.deadline = deadline;
        }
        if let Some(departments) = self.assigned_departments {
            document.assigned_departments = departments;
        }
    }
}

/// Static reference row describing a document category.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Classification {
    pub id: String,
    pub name: String,
    pub auto_assign_department: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Review,
    Deadline,
    Custom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Cancelled => "cancelled",
        }
    }
}

impl FromStr for TaskStatus {
    type Err = DocFlowError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(TaskStatus::Pending),
            "in_progress" => Ok(TaskStatus::InProgress),
            "completed" => Ok(TaskStatus::Completed),
            "cancelled" => Ok(TaskStatus::Cancelled),
            other => Err(DocFlowError::InvalidValue(format!(
                "unknown task status '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: String,
    pub task_type: TaskType,
    pub priority: i32,
    pub status: TaskStatus,
    pub document_id: Option<String>,
    pub assigned_to: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Task {
    pub fn new(title: impl Into<String>, description: impl Into<String>, task_type: TaskType, priority: i32) -> Self {
        Task {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.into(),
            description: description.into(),
            task_type,
            priority,
            status: TaskStatus::Pending,
            document_id: None,
            assigned_to: None,
            due_date: None,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogStatus {
    Started,
    Completed,
    Failed,
}

/// Append-only audit row, one per step transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingLog {
    pub document_id: String,
    pub process_type: String,
    pub status: LogStatus,
    pub details: Value,
    pub created_at: DateTime<Utc>,
}

impl ProcessingLog {
    pub fn new(document_id: &str, process_type: &str, status: LogStatus, details: Value) -> Self {
        ProcessingLog {
            document_id: document_id.to_string(),
            process_type: process_type.to_string(),
            status,
            details,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSession {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub session_id: String,
    pub role: ChatRole,
    pub content: String,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub document_id: Option<String>,
    pub task_id: Option<String>,
    pub sent_via_email: bool,
    pub sent_via_whatsapp: bool,
    pub created_at: DateTime<Utc>,
}

/// Contact details used by the notification relays.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Profile {
    pub id: String,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub phone_number: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_moves_forward_only() {
        assert!(DocumentStatus::Uploaded.can_advance_to(DocumentStatus::Processing));
        assert!(DocumentStatus::Processing.can_advance_to(DocumentStatus::Classified));
        assert!(!DocumentStatus::Classified.can_advance_to(DocumentStatus::OcrComplete));
        assert!(!DocumentStatus::Completed.can_advance_to(DocumentStatus::Failed));
        assert!(DocumentStatus::OcrComplete.can_advance_to(DocumentStatus::Failed));
        assert!(DocumentStatus::Classified.can_advance_to(DocumentStatus::Degraded));
    }

    #[test]
    fn update_merges_metadata_and_replaces_departments() {
        let mut doc = Document::new("d1", "a.pdf", "uploads/a.pdf");
        doc.extracted_metadata
            .insert("source".into(), Value::String("email".into()));
        doc.assigned_departments = vec!["Legal".into(), "Finance".into()];

        let mut metadata = Map::new();
        metadata.insert("extracted_dates".into(), Value::Array(vec![]));
        DocumentUpdate {
            extracted_metadata: Some(metadata),
            assigned_departments: Some(vec!["HR".into()]),
            ..Default::default()
        }
        .apply_to(&mut doc);

        assert_eq!(doc.extracted_metadata.len(), 2);
        assert_eq!(doc.assigned_departments, vec!["HR".to_string()]);
        assert_eq!(doc.status, DocumentStatus::Uploaded);
    }

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_string(&DocumentStatus::OcrComplete).unwrap();
        assert_eq!(json, "\"ocr_complete\"");
        assert_eq!("in_progress".parse::<TaskStatus>().unwrap(), TaskStatus::InProgress);
        assert!("done".parse::<TaskStatus>().is_err());
    }
}
