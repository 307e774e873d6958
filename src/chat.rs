// src/chat.rs

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, instrument, warn};

use crate::data_model::{ChatMessage, ChatRole, Document, Task, TaskStatus};
use crate::error::{DocFlowError, Result};
use crate::providers::ChatModel;
use crate::store::{CollaborationStore, DocumentStore};
use crate::utils::prometheus_metrics::CHAT_REQUESTS_TOTAL;
use crate::utils::text::{contains_any, truncate_chars};

const CONTEXT_DOCUMENTS: usize = 10;
const CONTEXT_TASKS: usize = 5;
const SESSION_TITLE_CHARS: usize = 50;
const EXCERPT_CHARS: usize = 200;
const HIGH_PRIORITY: i32 = 4;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: Option<String>,
    pub session_id: Option<String>,
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub response: String,
    pub session_id: String,
}

/// A document together with the name of its classification, if any.
#[derive(Debug, Clone)]
pub struct DocumentContext {
    pub document: Document,
    pub classification: Option<String>,
}

impl DocumentContext {
    fn type_name(&self) -> &str {
        self.classification.as_deref().unwrap_or("unknown type")
    }
}

/// Recent documents and tasks of the caller, used to ground the reply.
#[derive(Debug, Clone, Default)]
pub struct ChatContext {
    pub documents: Vec<DocumentContext>,
    pub tasks: Vec<Task>,
}

impl ChatContext {
    pub fn system_prompt(&self) -> String {
        let documents = self
            .documents
            .iter()
            .map(|d| {
                format!(
                    "Document: {} (Type: {}) - {}...",
                    d.document.filename,
                    d.type_name(),
                    truncate_chars(d.document.ocr_text.as_deref().unwrap_or_default(), EXCERPT_CHARS)
                )
            })
            .collect::<Vec<_>>()
            .join("\n");
        let tasks = self
            .tasks
            .iter()
            .map(|t| {
                format!(
                    "Task: {} - Status: {}, Priority: {}, Due: {}",
                    t.title,
                    t.status.as_str(),
                    t.priority,
                    t.due_date
                        .map(|d| d.to_rfc3339())
                        .unwrap_or_else(|| "none".to_string())
                )
            })
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            "You are DocFlow Pro AI Assistant, specialized in document management and workflow automation.\n\n\
             User's Documents:\n{documents}\n\n\
             User's Tasks:\n{tasks}\n\n\
             You can help with:\n\
             - Summarizing documents\n\
             - Extracting information from documents\n\
             - Managing tasks and deadlines\n\
             - Document classification insights\n\
             - Workflow optimization\n\
             - Progress tracking\n\n\
             Be helpful, concise, and focused on document management workflows."
        )
    }
}

/// Keyword-driven reply used when no language model is configured or the
/// model call fails.
pub fn canned_response(message: &str, context: &ChatContext) -> String {
    let documents = &context.documents;
    let tasks = &context.tasks;

    if contains_any(message, &["summary", "summarize"]) {
        return match documents.first() {
            Some(recent) => format!(
                "Based on your recent documents, I can see you have {} documents including {}. \
                 The most recent document \"{}\" appears to be a {} that was uploaded recently. \
                 Would you like me to provide a detailed summary of any specific document?",
                documents.len(),
                documents
                    .iter()
                    .map(DocumentContext::type_name)
                    .collect::<Vec<_>>()
                    .join(", "),
                recent.document.filename,
                recent.classification.as_deref().unwrap_or("document"),
            ),
            None => "I can help you summarize documents once you upload them. You can drag and drop \
                     files in the upload zone and I'll process them for you."
                .to_string(),
        };
    }

    if contains_any(message, &["task", "deadline"]) {
        if tasks.is_empty() {
            return "You don't have any active tasks at the moment. Tasks are automatically created \
                    when documents are processed, or you can create them manually."
                .to_string();
        }
        let pending = tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Pending)
            .count();
        let high_priority = tasks.iter().filter(|t| t.priority >= HIGH_PRIORITY).count();
        let high_priority_note = if high_priority > 0 {
            format!(", including {} high-priority items", high_priority)
        } else {
            String::new()
        };
        let deadline_note = if tasks.iter().any(|t| t.due_date.is_some()) {
            "Some tasks have upcoming deadlines - would you like me to prioritize them for you?"
        } else {
            "Most tasks don't have specific deadlines set."
        };
        return format!(
            "You have {} tasks total. {} are still pending{}. {}",
            tasks.len(),
            pending,
            high_priority_note,
            deadline_note
        );
    }

    if contains_any(message, &["document", "file"]) {
        return match documents.first() {
            Some(recent) => format!(
                "Your most recent document is \"{}\" classified as {}. You have {} documents total. \
                 I can help you search through them, extract specific information, or create \
                 summaries. What would you like to know?",
                recent.document.filename,
                recent.type_name(),
                documents.len()
            ),
            None => "You haven't uploaded any documents yet. Use the upload zone to add documents \
                     and I'll automatically process them with OCR and classification."
                .to_string(),
        };
    }

    if contains_any(message, &["help", "what can you do"]) {
        return format!(
            "I'm your DocFlow Pro AI assistant! I can help you with:\n\n\
             - **Document Analysis**: Summarize content, extract key information\n\
             - **Task Management**: Review deadlines, prioritize work, track progress\n\
             - **Search & Insights**: Find specific documents or information\n\
             - **Workflow Optimization**: Suggest improvements to your document processes\n\
             - **Classification**: Help identify and categorize documents\n\n\
             You have {} documents and {} tasks in your system. What would you like to explore?",
            documents.len(),
            tasks.len()
        );
    }

    format!(
        "I understand you're asking about \"{}\". As your DocFlow Pro AI assistant, I can help you \
         manage your documents, tasks, and workflows. You currently have {} documents and {} tasks.\n\n\
         Could you please be more specific about what you'd like me to help you with? I can:\n\
         - Analyze and summarize your documents\n\
         - Help prioritize your tasks\n\
         - Extract specific information\n\
         - Provide workflow insights",
        message,
        documents.len(),
        tasks.len()
    )
}

pub struct ChatService {
    documents: Arc<dyn DocumentStore>,
    collaboration: Arc<dyn CollaborationStore>,
    model: Option<Arc<dyn ChatModel>>,
}

impl ChatService {
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        collaboration: Arc<dyn CollaborationStore>,
        model: Option<Arc<dyn ChatModel>>,
    ) -> Self {
        ChatService {
            documents,
            collaboration,
            model,
        }
    }

    #[instrument(skip(self, request), fields(user_id))]
    pub async fn handle(&self, request: ChatRequest) -> Result<ChatResponse> {
        let (Some(message), Some(user_id)) = (
            request.message.filter(|m| !m.trim().is_empty()),
            request.user_id.filter(|u| !u.trim().is_empty()),
        ) else {
            return Err(DocFlowError::MissingInput(
                "Message and user ID are required".to_string(),
            ));
        };
        tracing::Span::current().record("user_id", user_id.as_str());

        let session_id = match request.session_id.filter(|s| !s.is_empty()) {
            Some(id) => id,
            None => {
                let title = format!("{}...", truncate_chars(&message, SESSION_TITLE_CHARS));
                let session = self
                    .collaboration
                    .create_chat_session(&user_id, &title)
                    .await?;
                info!(session_id = %session.id, "Chat session created");
                session.id
            }
        };

        self.collaboration
            .append_chat_message(new_message(&session_id, ChatRole::User, &message, json!({})))
            .await?;

        let context = self.gather_context(&user_id).await?;
        let reply = self.generate_reply(&message, &context).await;

        let metadata = json!({
            "documents_referenced": context.documents.len(),
            "tasks_referenced": context.tasks.len(),
        });
        self.collaboration
            .append_chat_message(new_message(&session_id, ChatRole::Assistant, &reply, metadata))
            .await?;

        Ok(ChatResponse {
            response: reply,
            session_id,
        })
    }

    pub async fn gather_context(&self, user_id: &str) -> Result<ChatContext> {
        let recent = self
            .documents
            .documents_for_user(user_id, CONTEXT_DOCUMENTS)
            .await?;
        let mut documents = Vec::with_capacity(recent.len());
        for document in recent {
            let classification = match &document.classification_id {
                Some(id) => self
                    .documents
                    .get_classification(id)
                    .await?
                    .map(|c| c.name),
                None => None,
            };
            documents.push(DocumentContext {
                document,
                classification,
            });
        }
        let tasks = self
            .documents
            .tasks_assigned_to(user_id, CONTEXT_TASKS)
            .await?;
        Ok(ChatContext { documents, tasks })
    }

    async fn generate_reply(&self, message: &str, context: &ChatContext) -> String {
        if let Some(model) = &self.model {
            match model.complete(&context.system_prompt(), message).await {
                Ok(reply) => {
                    CHAT_REQUESTS_TOTAL.with_label_values(&["model"]).inc();
                    return reply;
                }
                Err(e) => warn!(error = %e, "Language model call failed, using canned response"),
            }
        }
        CHAT_REQUESTS_TOTAL.with_label_values(&["canned"]).inc();
        canned_response(message, context)
    }
}

fn new_message(
    session_id: &str,
    role: ChatRole,
    content: &str,
    metadata: serde_json::Value,
) -> ChatMessage {
    ChatMessage {
        id: uuid::Uuid::new_v4().to_string(),
        session_id: session_id.to_string(),
        role,
        content: content.to_string(),
        metadata,
        created_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_model::TaskType;

    fn doc(filename: &str, classification: Option<&str>) -> DocumentContext {
        DocumentContext {
            document: Document::new("d", filename, format!("uploads/{}", filename)),
            classification: classification.map(str::to_string),
        }
    }

    #[test]
    fn summary_reply_lists_types() {
        let context = ChatContext {
            documents: vec![doc("lease.pdf", Some("Contract")), doc("scan.png", None)],
            tasks: vec![],
        };
        let reply = canned_response("Can you SUMMARIZE things?", &context);
        assert!(reply.contains("you have 2 documents including Contract, unknown type"));
        assert!(reply.contains("\"lease.pdf\" appears to be a Contract"));
    }

    #[test]
    fn task_reply_counts_pending_and_high_priority() {
        let mut urgent = Task::new("Pay", "", TaskType::Custom, 5);
        urgent.due_date = Some(Utc::now());
        let mut done = Task::new("Read", "", TaskType::Review, 2);
        done.status = TaskStatus::Completed;
        let context = ChatContext {
            documents: vec![],
            tasks: vec![urgent, done],
        };
        let reply = canned_response("any deadlines?", &context);
        assert!(reply.starts_with(
            "You have 2 tasks total. 1 are still pending, including 1 high-priority items."
        ));
        assert!(reply.contains("Some tasks have upcoming deadlines"));
    }

    #[test]
    fn keyword_precedence_and_default() {
        let empty = ChatContext::default();
        // "summary" outranks "document"
        assert!(canned_response("document summary", &empty).starts_with("I can help you summarize"));
        assert!(canned_response("which file?", &empty).starts_with("You haven't uploaded"));
        assert!(canned_response("help me", &empty).contains("You have 0 documents and 0 tasks"));
        assert!(canned_response("hello there", &empty)
            .starts_with("I understand you're asking about \"hello there\"."));
    }

    #[test]
    fn system_prompt_truncates_excerpts() {
        let mut d = doc("long.txt", Some("Report"));
        d.document.ocr_text = Some("x".repeat(500));
        let context = ChatContext {
            documents: vec![d],
            tasks: vec![],
        };
        let prompt = context.system_prompt();
        let expected = format!("Document: long.txt (Type: Report) - {}...", "x".repeat(200));
        assert!(prompt.contains(&expected));
        assert!(!prompt.contains(&"x".repeat(201)));
    }
}
