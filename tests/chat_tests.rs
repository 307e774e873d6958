use async_trait::async_trait;
use docflow::chat::{ChatRequest, ChatService};
use docflow::config::AppConfig;
use docflow::data_model::{ChatRole, Document, Task, TaskType};
use docflow::error::{DocFlowError, Result};
use docflow::providers::ChatModel;
use docflow::store::{CollaborationStore, DocumentStore, InMemoryStore};
use std::sync::{Arc, Mutex};

// Records the prompts it receives and answers with a fixed reply
struct RecordingModel {
    prompts: Mutex<Vec<(String, String)>>,
    fail: bool,
}

impl RecordingModel {
    fn new(fail: bool) -> Self {
        RecordingModel {
            prompts: Mutex::new(Vec::new()),
            fail,
        }
    }
}

#[async_trait]
impl ChatModel for RecordingModel {
    async fn complete(&self, system_prompt: &str, user_message: &str) -> Result<String> {
        self.prompts
            .lock()
            .unwrap()
            .push((system_prompt.to_string(), user_message.to_string()));
        if self.fail {
            Err(DocFlowError::provider("mistral", "rate limited"))
        } else {
            Ok("Model reply".to_string())
        }
    }
}

async fn store_with_history(user: &str) -> Arc<InMemoryStore> {
    let store = Arc::new(InMemoryStore::with_classifications(
        &AppConfig::default().classifications,
    ));
    let invoice = store.find_classification_by_name("Invoice").await.unwrap().unwrap();

    let mut document = Document::new("doc-1", "march_invoice.pdf", "uploads/march_invoice.pdf");
    document.uploaded_by = Some(user.to_string());
    document.classification_id = Some(invoice.id);
    document.ocr_text = Some("Invoice total $120.00".to_string());
    store.insert_document(document).await.unwrap();

    let mut foreign = Document::new("doc-2", "other.pdf", "uploads/other.pdf");
    foreign.uploaded_by = Some("someone-else".to_string());
    store.insert_document(foreign).await.unwrap();

    let mut task = Task::new("Pay invoice", "Pay it", TaskType::Custom, 4);
    task.assigned_to = Some(user.to_string());
    store.insert_tasks(vec![task]).await.unwrap();
    store
}

fn request(message: &str, user: &str, session: Option<&str>) -> ChatRequest {
    ChatRequest {
        message: Some(message.to_string()),
        session_id: session.map(str::to_string),
        user_id: Some(user.to_string()),
    }
}

#[tokio::test]
async fn test_new_session_and_canned_reply() {
    let store = store_with_history("u1").await;
    let service = ChatService::new(store.clone(), store.clone(), None);

    let message = "Please summarize my uploads from the last quarter, especially invoices";
    let response = service.handle(request(message, "u1", None)).await.unwrap();

    assert!(response
        .response
        .starts_with("Based on your recent documents, I can see you have 1 documents including Invoice."));
    let session = store.chat_session(&response.session_id).await.unwrap();
    assert_eq!(session.user_id, "u1");
    assert_eq!(
        session.title,
        "Please summarize my uploads from the last quarter,..."
    );

    let messages = store.chat_messages(&response.session_id).await.unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, ChatRole::User);
    assert_eq!(messages[0].content, message);
    assert_eq!(messages[1].role, ChatRole::Assistant);
    assert_eq!(messages[1].content, response.response);
    assert_eq!(messages[1].metadata["documents_referenced"], 1);
    assert_eq!(messages[1].metadata["tasks_referenced"], 1);
}

#[tokio::test]
async fn test_existing_session_is_reused() {
    let store = store_with_history("u1").await;
    let service = ChatService::new(store.clone(), store.clone(), None);

    let first = service.handle(request("help", "u1", None)).await.unwrap();
    let second = service
        .handle(request("what are my tasks?", "u1", Some(&first.session_id)))
        .await
        .unwrap();
    assert_eq!(first.session_id, second.session_id);
    assert!(second
        .response
        .starts_with("You have 1 tasks total. 1 are still pending, including 1 high-priority items."));
    assert_eq!(store.chat_messages(&first.session_id).await.unwrap().len(), 4);
}

#[tokio::test]
async fn test_model_receives_context() {
    let store = store_with_history("u1").await;
    let model = Arc::new(RecordingModel::new(false));
    let service = ChatService::new(store.clone(), store.clone(), Some(model.clone() as Arc<dyn ChatModel>));

    let response = service.handle(request("hello", "u1", None)).await.unwrap();
    assert_eq!(response.response, "Model reply");

    let prompts = model.prompts.lock().unwrap();
    let (system, user) = &prompts[0];
    assert_eq!(user, "hello");
    assert!(system.starts_with("You are DocFlow Pro AI Assistant"));
    assert!(system.contains("Document: march_invoice.pdf (Type: Invoice) - Invoice total $120.00..."));
    assert!(system.contains("Task: Pay invoice - Status: pending, Priority: 4, Due: none"));
    assert!(!system.contains("other.pdf"));
}

#[tokio::test]
async fn test_model_failure_falls_back_to_canned_reply() {
    let store = store_with_history("u1").await;
    let model = Arc::new(RecordingModel::new(true));
    let service = ChatService::new(store.clone(), store.clone(), Some(model as Arc<dyn ChatModel>));

    let response = service.handle(request("show my files", "u1", None)).await.unwrap();
    assert!(response
        .response
        .starts_with("Your most recent document is \"march_invoice.pdf\" classified as Invoice."));
}

#[tokio::test]
async fn test_missing_fields_are_rejected() {
    let store = Arc::new(InMemoryStore::new());
    let service = ChatService::new(store.clone(), store.clone(), None);

    let err = service
        .handle(ChatRequest {
            message: Some("hi".to_string()),
            session_id: None,
            user_id: None,
        })
        .await
        .unwrap_err();
    assert!(err.is_client_error());
    assert_eq!(err.to_string(), "Message and user ID are required");

    let err = service.handle(request("", "u1", None)).await.unwrap_err();
    assert!(err.is_client_error());
}
