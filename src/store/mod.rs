//! Persistence boundary.
//!
//! The hosted database and object storage are external collaborators; the
//! service only talks to them through these traits. `memory` provides the
//! in-process implementation used by the server binary and the tests.

use async_trait::async_trait;

use crate::data_model::{
    ChatMessage, ChatSession, Classification, Document, DocumentUpdate, Notification,
    ProcessingLog, Profile, Task, TaskStatus,
};
use crate::error::Result;

pub mod memory;

pub use memory::{InMemoryBlobStore, InMemoryStore};

/// Documents, reference classifications, tasks and the processing log.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get_document(&self, id: &str) -> Result<Option<Document>>;

    async fn insert_document(&self, document: Document) -> Result<Document>;

    /// Applies `update` and returns the stored row. Unknown ids are `NotFound`.
    async fn update_document(&self, id: &str, update: DocumentUpdate) -> Result<Document>;

    /// Most recent documents uploaded by `user_id`, newest first.
    async fn documents_for_user(&self, user_id: &str, limit: usize) -> Result<Vec<Document>>;

    async fn find_classification_by_name(&self, name: &str) -> Result<Option<Classification>>;

    async fn get_classification(&self, id: &str) -> Result<Option<Classification>>;

    async fn insert_tasks(&self, tasks: Vec<Task>) -> Result<()>;

    async fn get_task(&self, id: &str) -> Result<Option<Task>>;

    async fn update_task_status(&self, id: &str, status: TaskStatus) -> Result<Task>;

    async fn tasks_for_document(&self, document_id: &str) -> Result<Vec<Task>>;

    /// Most recent tasks assigned to `user_id`, newest first.
    async fn tasks_assigned_to(&self, user_id: &str, limit: usize) -> Result<Vec<Task>>;

    async fn append_log(&self, entry: ProcessingLog) -> Result<()>;

    async fn logs_for_document(&self, document_id: &str) -> Result<Vec<ProcessingLog>>;
}

/// Chat history, notifications and user profiles.
#[async_trait]
pub trait CollaborationStore: Send + Sync {
    async fn create_chat_session(&self, user_id: &str, title: &str) -> Result<ChatSession>;

    async fn append_chat_message(&self, message: ChatMessage) -> Result<()>;

    async fn chat_messages(&self, session_id: &str) -> Result<Vec<ChatMessage>>;

    async fn insert_notification(&self, notification: Notification) -> Result<Notification>;

    /// Records per-channel delivery flags. `None` leaves the flag untouched.
    async fn update_notification_channels(
        &self,
        id: &str,
        sent_via_email: Option<bool>,
        sent_via_whatsapp: Option<bool>,
    ) -> Result<Notification>;

    async fn get_notification(&self, id: &str) -> Result<Option<Notification>>;

    async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredObject {
    pub path: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Object storage for uploaded files.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Stores `bytes` under `path` and returns the stored path.
    async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<String>;

    async fn get(&self, path: &str) -> Result<Option<StoredObject>>;

    /// Publicly resolvable URL for a stored path.
    fn public_url(&self, path: &str) -> String;
}
