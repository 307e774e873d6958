use async_trait::async_trait;
use docflow::data_model::{
    ChatMessage, ChatSession, Classification, Document, DocumentUpdate, Notification,
    ProcessingLog, Profile, Task, TaskStatus,
};
use docflow::error::{DocFlowError, Result};
use docflow::store::{CollaborationStore, DocumentStore, InMemoryStore};
use std::sync::atomic::{AtomicUsize, Ordering};

/// In-memory store whose processing-log writes start failing after
/// `healthy_appends` successful ones.
pub struct FlakyLogStore {
    inner: InMemoryStore,
    healthy_appends: usize,
    appends: AtomicUsize,
}

impl FlakyLogStore {
    pub fn new(inner: InMemoryStore, healthy_appends: usize) -> Self {
        FlakyLogStore {
            inner,
            healthy_appends,
            appends: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl DocumentStore for FlakyLogStore {
    async fn get_document(&self, id: &str) -> Result<Option<Document>> {
        self.inner.get_document(id).await
    }

    async fn insert_document(&self, document: Document) -> Result<Document> {
        self.inner.insert_document(document).await
    }

    async fn update_document(&self, id: &str, update: DocumentUpdate) -> Result<Document> {
        self.inner.update_document(id, update).await
    }

    async fn documents_for_user(&self, user_id: &str, limit: usize) -> Result<Vec<Document>> {
        self.inner.documents_for_user(user_id, limit).await
    }

    async fn find_classification_by_name(&self, name: &str) -> Result<Option<Classification>> {
        self.inner.find_classification_by_name(name).await
    }

    async fn get_classification(&self, id: &str) -> Result<Option<Classification>> {
        self.inner.get_classification(id).await
    }

    async fn insert_tasks(&self, tasks: Vec<Task>) -> Result<()> {
        self.inner.insert_tasks(tasks).await
    }

    async fn get_task(&self, id: &str) -> Result<Option<Task>> {
        self.inner.get_task(id).await
    }

    async fn update_task_status(&self, id: &str, status: TaskStatus) -> Result<Task> {
        self.inner.update_task_status(id, status).await
    }

    async fn tasks_for_document(&self, document_id: &str) -> Result<Vec<Task>> {
        self.inner.tasks_for_document(document_id).await
    }

    async fn tasks_assigned_to(&self, user_id: &str, limit: usize) -> Result<Vec<Task>> {
        self.inner.tasks_assigned_to(user_id, limit).await
    }

    async fn append_log(&self, entry: ProcessingLog) -> Result<()> {
        if self.appends.fetch_add(1, Ordering::SeqCst) >= self.healthy_appends {
            return Err(DocFlowError::StorageError("log table unavailable".to_string()));
        }
        self.inner.append_log(entry).await
    }

    async fn logs_for_document(&self, document_id: &str) -> Result<Vec<ProcessingLog>> {
        self.inner.logs_for_document(document_id).await
    }
}

#[async_trait]
impl CollaborationStore for FlakyLogStore {
    async fn create_chat_session(&self, user_id: &str, title: &str) -> Result<ChatSession> {
        self.inner.create_chat_session(user_id, title).await
    }

    async fn append_chat_message(&self, message: ChatMessage) -> Result<()> {
        self.inner.append_chat_message(message).await
    }

    async fn chat_messages(&self, session_id: &str) -> Result<Vec<ChatMessage>> {
        self.inner.chat_messages(session_id).await
    }

    async fn insert_notification(&self, notification: Notification) -> Result<Notification> {
        self.inner.insert_notification(notification).await
    }

    async fn update_notification_channels(
        &self,
        id: &str,
        sent_via_email: Option<bool>,
        sent_via_whatsapp: Option<bool>,
    ) -> Result<Notification> {
        self.inner
            .update_notification_channels(id, sent_via_email, sent_via_whatsapp)
            .await
    }

    async fn get_notification(&self, id: &str) -> Result<Option<Notification>> {
        self.inner.get_notification(id).await
    }

    async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>> {
        self.inner.get_profile(user_id).await
    }
}
