use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{BlobStore, CollaborationStore, DocumentStore, StoredObject};
use crate::config::app::{ClassificationSeeds, StorageConfig};
use crate::data_model::{
    ChatMessage, ChatSession, Classification, Document, DocumentUpdate, Notification,
    ProcessingLog, Profile, Task, TaskStatus,
};
use crate::error::{DocFlowError, Result};

/// In-process tables guarded by `RwLock`s. Every write is an independent
/// update; concurrent writers to the same row race and the last one wins.
#[derive(Default)]
pub struct InMemoryStore {
    documents: RwLock<HashMap<String, Document>>,
    classifications: RwLock<Vec<Classification>>,
    tasks: RwLock<Vec<Task>>,
    logs: RwLock<Vec<ProcessingLog>>,
    sessions: RwLock<HashMap<String, ChatSession>>,
    messages: RwLock<Vec<ChatMessage>>,
    notifications: RwLock<HashMap<String, Notification>>,
    profiles: RwLock<HashMap<String, Profile>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with one classification row per seed.
    pub fn with_classifications(seeds: &ClassificationSeeds) -> Self {
        let rows = seeds
            .0
            .iter()
            .map(|seed| Classification {
                id: Uuid::new_v4().to_string(),
                name: seed.name.clone(),
                auto_assign_department: seed.auto_assign_department.clone(),
            })
            .collect();
        InMemoryStore {
            classifications: RwLock::new(rows),
            ..Default::default()
        }
    }

    pub async fn insert_profile(&self, profile: Profile) {
        self.profiles
            .write()
            .await
            .insert(profile.id.clone(), profile);
    }

    pub async fn all_logs(&self) -> Vec<ProcessingLog> {
        self.logs.read().await.clone()
    }

    pub async fn chat_session(&self, id: &str) -> Option<ChatSession> {
        self.sessions.read().await.get(id).cloned()
    }

    pub async fn document_count(&self) -> usize {
        self.documents.read().await.len()
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn get_document(&self, id: &str) -> Result<Option<Document>> {
        Ok(self.documents.read().await.get(id).cloned())
    }

    async fn insert_document(&self, document: Document) -> Result<Document> {
        let mut documents = self.documents.write().await;
        if documents.contains_key(&document.id) {
            return Err(DocFlowError::StorageError(format!(
                "document '{}' already exists",
                document.id
            )));
        }
        documents.insert(document.id.clone(), document.clone());
        Ok(document)
    }

    async fn update_document(&self, id: &str, update: DocumentUpdate) -> Result<Document> {
        let mut documents = self.documents.write().await;
        let document = documents
            .get_mut(id)
            .ok_or_else(|| DocFlowError::not_found("document", id))?;
        update.apply_to(document);
        Ok(document.clone())
    }

    async fn documents_for_user(&self, user_id: &str, limit: usize) -> Result<Vec<Document>> {
        let documents = self.documents.read().await;
        let mut owned: Vec<Document> = documents
            .values()
            .filter(|d| d.uploaded_by.as_deref() == Some(user_id))
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        owned.truncate(limit);
        Ok(owned)
    }

    async fn find_classification_by_name(&self, name: &str) -> Result<Option<Classification>> {
        Ok(self
            .classifications
            .read()
            .await
            .iter()
            .find(|c| c.name == name)
            .cloned())
    }

    async fn get_classification(&self, id: &str) -> Result<Option<Classification>> {
        Ok(self
            .classifications
            .read()
            .await
            .iter()
            .find(|c| c.id == id)
            .cloned())
    }

    async fn insert_tasks(&self, tasks: Vec<Task>) -> Result<()> {
        self.tasks.write().await.extend(tasks);
        Ok(())
    }

    async fn get_task(&self, id: &str) -> Result<Option<Task>> {
        Ok(self.tasks.read().await.iter().find(|t| t.id == id).cloned())
    }

    async fn update_task_status(&self, id: &str, status: TaskStatus) -> Result<Task> {
        let mut tasks = self.tasks.write().await;
        let task = tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| DocFlowError::not_found("task", id))?;
        task.status = status;
        Ok(task.clone())
    }

    async fn tasks_for_document(&self, document_id: &str) -> Result<Vec<Task>> {
        Ok(self
            .tasks
            .read()
            .await
            .iter()
            .filter(|t| t.document_id.as_deref() == Some(document_id))
            .cloned()
            .collect())
    }

    async fn tasks_assigned_to(&self, user_id: &str, limit: usize) -> Result<Vec<Task>> {
        let mut assigned: Vec<Task> = self
            .tasks
            .read()
            .await
            .iter()
            .filter(|t| t.assigned_to.as_deref() == Some(user_id))
            .cloned()
            .collect();
        assigned.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        assigned.truncate(limit);
        Ok(assigned)
    }

    async fn append_log(&self, entry: ProcessingLog) -> Result<()> {
        self.logs.write().await.push(entry);
        Ok(())
    }

    async fn logs_for_document(&self, document_id: &str) -> Result<Vec<ProcessingLog>> {
        Ok(self
            .logs
            .read()
            .await
            .iter()
            .filter(|l| l.document_id == document_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl CollaborationStore for InMemoryStore {
    async fn create_chat_session(&self, user_id: &str, title: &str) -> Result<ChatSession> {
        let session = ChatSession {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            title: title.to_string(),
            created_at: Utc::now(),
        };
        self.sessions
            .write()
            .await
            .insert(session.id.clone(), session.clone());
        Ok(session)
    }

    async fn append_chat_message(&self, message: ChatMessage) -> Result<()> {
        self.messages.write().await.push(message);
        Ok(())
    }

    async fn chat_messages(&self, session_id: &str) -> Result<Vec<ChatMessage>> {
        Ok(self
            .messages
            .read()
            .await
            .iter()
            .filter(|m| m.session_id == session_id)
            .cloned()
            .collect())
    }

    async fn insert_notification(&self, notification: Notification) -> Result<Notification> {
        self.notifications
            .write()
            .await
            .insert(notification.id.clone(), notification.clone());
        Ok(notification)
    }

    async fn update_notification_channels(
        &self,
        id: &str,
        sent_via_email: Option<bool>,
        sent_via_whatsapp: Option<bool>,
    ) -> Result<Notification> {
        let mut notifications = self.notifications.write().await;
        let notification = notifications
            .get_mut(id)
            .ok_or_else(|| DocFlowError::not_found("notification", id))?;
        if let Some(sent) = sent_via_email {
            notification.sent_via_email = sent;
        }
        if let Some(sent) = sent_via_whatsapp {
            notification.sent_via_whatsapp = sent;
        }
        Ok(notification.clone())
    }

    async fn get_notification(&self, id: &str) -> Result<Option<Notification>> {
        Ok(self.notifications.read().await.get(id).cloned())
    }

    async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>> {
        Ok(self.profiles.read().await.get(user_id).cloned())
    }
}

/// Object storage held in memory, keyed by path inside a single bucket.
pub struct InMemoryBlobStore {
    bucket: String,
    public_base_url: String,
    objects: RwLock<HashMap<String, StoredObject>>,
}

impl InMemoryBlobStore {
    pub fn new(config: &StorageConfig) -> Self {
        InMemoryBlobStore {
            bucket: config.bucket.clone(),
            public_base_url: config.public_base_url.trim_end_matches('/').to_string(),
            objects: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<String> {
        let mut objects = self.objects.write().await;
        if objects.contains_key(path) {
            return Err(DocFlowError::StorageError(format!(
                "object '{}' already exists in bucket '{}'",
                path, self.bucket
            )));
        }
        objects.insert(
            path.to_string(),
            StoredObject {
                path: path.to_string(),
                content_type: content_type.to_string(),
                bytes,
            },
        );
        Ok(path.to_string())
    }

    async fn get(&self, path: &str) -> Result<Option<StoredObject>> {
        Ok(self.objects.read().await.get(path).cloned())
    }

    fn public_url(&self, path: &str) -> String {
        format!("{}/{}/{}", self.public_base_url, self.bucket, path)
    }
}
