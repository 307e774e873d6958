use crate::chat::{ChatRequest, ChatResponse, ChatService};
use crate::config::AppConfig;
use crate::data_model::{Document, ProcessingLog, Task, TaskStatus};
use crate::error::{DocFlowError, Result};
use crate::ingestion::{IngestionRequest, IngestionResponse, IngestionService, SourceCredentials};
use crate::notifications::{NotificationRequest, NotificationResponse, NotificationService};
use crate::processor::{DocumentProcessor, ProcessRequest, ProcessResponse};
use crate::providers::{
    build_chat_model, build_email_channel, build_http_client, build_ocr_provider,
    build_whatsapp_channel, HttpFetcher, KeywordClassifier,
};
use crate::store::{BlobStore, CollaborationStore, DocumentStore, InMemoryBlobStore, InMemoryStore};
use crate::utils::prometheus_metrics::render_metrics;
use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, patch, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

/// Maps crate errors onto HTTP responses with an `{error}` body.
#[derive(Debug)]
pub struct ApiError(pub DocFlowError);

impl From<DocFlowError> for ApiError {
    fn from(e: DocFlowError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            e if e.is_client_error() => StatusCode::BAD_REQUEST,
            DocFlowError::NotFound { .. } => StatusCode::NOT_FOUND,
            e => {
                error!(error = %e, "Request failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError(DocFlowError::InvalidValue(rejection.body_text()))
    }
}

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

/// Request body, with extractor rejections reported as `{error}` like every other failure.
type JsonBody<T> = std::result::Result<Json<T>, JsonRejection>;

// The application state, shared across all handlers
pub struct AppState {
    pub config: AppConfig,
    pub documents: Arc<dyn DocumentStore>,
    pub blobs: Arc<dyn BlobStore>,
    pub processor: Arc<DocumentProcessor>,
    pub ingestion: IngestionService,
    pub chat: ChatService,
    pub notifications: NotificationService,
}

/// Builds the state over a fresh in-memory store seeded with the configured
/// classifications.
pub fn build_app_state(config: &AppConfig) -> Result<Arc<AppState>> {
    let store = Arc::new(InMemoryStore::with_classifications(&config.classifications));
    build_app_state_with(config, store)
}

/// Builds the state over `store`; providers are chosen from the configured
/// credentials.
pub fn build_app_state_with<S>(config: &AppConfig, store: Arc<S>) -> Result<Arc<AppState>>
where
    S: DocumentStore + CollaborationStore + 'static,
{
    let client = build_http_client(&config.providers)?;
    let documents: Arc<dyn DocumentStore> = store.clone();
    let collaboration: Arc<dyn CollaborationStore> = store;
    let blobs: Arc<dyn BlobStore> = Arc::new(InMemoryBlobStore::new(&config.storage));

    let processor = Arc::new(DocumentProcessor::from_config(
        config,
        build_ocr_provider(config, client.clone()),
        Arc::new(KeywordClassifier),
        documents.clone(),
    ));
    let ingestion = IngestionService::new(
        documents.clone(),
        blobs.clone(),
        Arc::new(HttpFetcher::new(client.clone())),
        processor.clone(),
        SourceCredentials::from_config(config),
    );
    let chat = ChatService::new(
        documents.clone(),
        collaboration.clone(),
        build_chat_model(&config.providers.mistral, client.clone()),
    );
    let notifications = NotificationService::new(
        collaboration,
        build_email_channel(&config.providers.email, client.clone()),
        build_whatsapp_channel(&config.providers.whatsapp, client),
    );

    Ok(Arc::new(AppState {
        config: config.clone(),
        documents,
        blobs,
        processor,
        ingestion,
        chat,
        notifications,
    }))
}

async fn process_document_handler(
    State(state): State<Arc<AppState>>,
    payload: JsonBody<ProcessRequest>,
) -> ApiResult<ProcessResponse> {
    let Json(payload) = payload?;
    Ok(Json(state.processor.process(payload).await?))
}

async fn external_ingestion_handler(
    State(state): State<Arc<AppState>>,
    payload: JsonBody<IngestionRequest>,
) -> ApiResult<IngestionResponse> {
    let Json(payload) = payload?;
    Ok(Json(state.ingestion.ingest(payload).await?))
}

async fn chat_handler(
    State(state): State<Arc<AppState>>,
    payload: JsonBody<ChatRequest>,
) -> ApiResult<ChatResponse> {
    let Json(payload) = payload?;
    Ok(Json(state.chat.handle(payload).await?))
}

async fn notification_handler(
    State(state): State<Arc<AppState>>,
    payload: JsonBody<NotificationRequest>,
) -> ApiResult<NotificationResponse> {
    let Json(payload) = payload?;
    Ok(Json(state.notifications.send(payload).await?))
}

#[derive(Serialize)]
pub struct DocumentView {
    pub document: Document,
    pub tasks: Vec<Task>,
}

async fn document_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<DocumentView> {
    let document = state
        .documents
        .get_document(&id)
        .await?
        .ok_or_else(|| DocFlowError::not_found("document", id.as_str()))?;
    let tasks = state.documents.tasks_for_document(&id).await?;
    Ok(Json(DocumentView { document, tasks }))
}

async fn document_logs_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Vec<ProcessingLog>> {
    if state.documents.get_document(&id).await?.is_none() {
        return Err(DocFlowError::not_found("document", id).into());
    }
    Ok(Json(state.documents.logs_for_document(&id).await?))
}

#[derive(Deserialize)]
pub struct TaskStatusRequest {
    pub status: Option<String>,
}

async fn task_status_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    payload: JsonBody<TaskStatusRequest>,
) -> ApiResult<Task> {
    let Json(payload) = payload?;
    let status: TaskStatus = payload
        .status
        .ok_or_else(|| DocFlowError::MissingInput("Status is required".to_string()))?
        .parse()?;
    let task = state.documents.update_task_status(&id, status).await?;
    info!(task_id = %task.id, status = status.as_str(), "Task status updated");
    Ok(Json(task))
}

async fn blob_handler(
    State(state): State<Arc<AppState>>,
    Path((bucket, path)): Path<(String, String)>,
) -> Response {
    if bucket != state.config.storage.bucket {
        return (StatusCode::NOT_FOUND, "Object not found").into_response();
    }
    match state.blobs.get(&path).await {
        Ok(Some(object)) => (
            [(header::CONTENT_TYPE, object.content_type)],
            object.bytes,
        )
            .into_response(),
        Ok(None) => (StatusCode::NOT_FOUND, "Object not found").into_response(),
        Err(e) => ApiError(e).into_response(),
    }
}

// Axum handler for /metrics
async fn metrics_handler() -> (StatusCode, String) {
    match render_metrics() {
        Ok(body) => (StatusCode::OK, body),
        Err(e) => {
            error!("{}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e)
        }
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let body_limit = state.config.server.body_limit_bytes;

    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/metrics", get(metrics_handler))
        .route("/functions/v1/process-document", post(process_document_handler))
        .route("/functions/v1/external-ingestion", post(external_ingestion_handler))
        .route("/functions/v1/ai-chat", post(chat_handler))
        .route("/functions/v1/send-notification", post(notification_handler))
        .route("/documents/:id", get(document_handler))
        .route("/documents/:id/logs", get(document_logs_handler))
        .route("/tasks/:id/status", patch(task_status_handler))
        .route("/storage/v1/object/public/:bucket/*path", get(blob_handler))
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
}

// The main function to run the server
pub async fn run_server(state: Arc<AppState>, bind_addr: &str) -> Result<()> {
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!("listening on {}", bind_addr);
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn status_and_body(err: DocFlowError) -> (StatusCode, serde_json::Value) {
        let response = ApiError(err).into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn errors_map_to_status_codes() {
        let (status, body) =
            status_and_body(DocFlowError::MissingInput("Source and data are required".into())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Source and data are required");

        let (status, _) = status_and_body(DocFlowError::not_found("task", "t1")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = status_and_body(DocFlowError::StorageError("disk full".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Storage error: disk full");
    }
}
