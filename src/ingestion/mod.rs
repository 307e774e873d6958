//! External ingestion: files arriving from SharePoint, email, WhatsApp or a
//! generic API payload are stored, registered as documents and handed to the
//! processing pipeline.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::config::AppConfig;
use crate::data_model::Document;
use crate::error::{DocFlowError, Result};
use crate::processor::{DocumentProcessor, ProcessRequest};
use crate::providers::RemoteFetcher;
use crate::store::{BlobStore, DocumentStore};
use crate::utils::prometheus_metrics::INGESTED_DOCUMENTS_TOTAL;

pub mod sources;

pub use sources::{SourceContext, StagedDocument};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestionSource {
    SharePoint,
    Email,
    WhatsApp,
    Api,
}

impl IngestionSource {
    pub fn as_str(self) -> &'static str {
        match self {
            IngestionSource::SharePoint => "sharepoint",
            IngestionSource::Email => "email",
            IngestionSource::WhatsApp => "whatsapp",
            IngestionSource::Api => "api",
        }
    }
}

impl fmt::Display for IngestionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IngestionSource {
    type Err = DocFlowError;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "sharepoint" => Ok(IngestionSource::SharePoint),
            "email" => Ok(IngestionSource::Email),
            "whatsapp" => Ok(IngestionSource::WhatsApp),
            "api" => Ok(IngestionSource::Api),
            other => Err(DocFlowError::UnsupportedSource(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IngestionRequest {
    pub source: Option<String>,
    pub data: Option<Value>,
    pub metadata: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionResult {
    pub source: IngestionSource,
    pub processed_count: usize,
    pub documents: Vec<Document>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionResponse {
    pub success: bool,
    pub result: IngestionResult,
}

/// Credentials the remote sources need.
#[derive(Debug, Clone, Default)]
pub struct SourceCredentials {
    pub graph_api_key: Option<String>,
    pub whatsapp_api_key: Option<String>,
    pub whatsapp_graph_base_url: String,
}

impl SourceCredentials {
    pub fn from_config(config: &AppConfig) -> Self {
        SourceCredentials {
            graph_api_key: config.providers.microsoft_graph.api_key.clone(),
            whatsapp_api_key: config.providers.whatsapp.api_key.clone(),
            whatsapp_graph_base_url: config.providers.whatsapp.graph_base_url.clone(),
        }
    }
}

pub struct IngestionService {
    store: Arc<dyn DocumentStore>,
    blobs: Arc<dyn BlobStore>,
    fetcher: Arc<dyn RemoteFetcher>,
    processor: Arc<DocumentProcessor>,
    credentials: SourceCredentials,
}

impl IngestionService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        blobs: Arc<dyn BlobStore>,
        fetcher: Arc<dyn RemoteFetcher>,
        processor: Arc<DocumentProcessor>,
        credentials: SourceCredentials,
    ) -> Self {
        IngestionService {
            store,
            blobs,
            fetcher,
            processor,
            credentials,
        }
    }

    #[instrument(skip(self, request), fields(source))]
    pub async fn ingest(&self, request: IngestionRequest) -> Result<IngestionResponse> {
        let (Some(source), Some(data)) = (request.source.filter(|s| !s.is_empty()), request.data)
        else {
            return Err(DocFlowError::MissingInput(
                "Source and data are required".to_string(),
            ));
        };
        let source: IngestionSource = source.parse()?;
        tracing::Span::current().record("source", source.as_str());

        let request_metadata = request.metadata.unwrap_or(Value::Null);
        let uploaded_by = request_metadata
            .get("userId")
            .and_then(Value::as_str)
            .map(str::to_string);

        let ctx = SourceContext {
            fetcher: self.fetcher.as_ref(),
            graph_api_key: self.credentials.graph_api_key.as_deref(),
            whatsapp_api_key: self.credentials.whatsapp_api_key.as_deref(),
            whatsapp_graph_base_url: &self.credentials.whatsapp_graph_base_url,
            request_metadata: &request_metadata,
        };
        let staged = match source {
            IngestionSource::SharePoint => sources::sharepoint(&data, &ctx).await?,
            IngestionSource::Email => sources::email(&data, &ctx).await?,
            IngestionSource::WhatsApp => sources::whatsapp(&data, &ctx).await?,
            IngestionSource::Api => sources::api(&data, &ctx).await?,
        };
        info!(staged = staged.len(), "Payload normalized");

        let mut documents = Vec::with_capacity(staged.len());
        let mut submissions = Vec::new();
        for item in staged {
            if let Some(document) = self.persist(item, uploaded_by.as_deref(), &mut submissions).await? {
                documents.push(document);
            }
        }
        INGESTED_DOCUMENTS_TOTAL
            .with_label_values(&[source.as_str()])
            .inc_by(documents.len() as f64);

        for outcome in self.processor.process_many(submissions).await {
            if let Err(e) = outcome {
                warn!(error = %e, "Processing of an ingested document failed");
            }
        }

        Ok(IngestionResponse {
            success: true,
            result: IngestionResult {
                source,
                processed_count: documents.len(),
                documents,
            },
        })
    }

    /// Uploads the blob and inserts the row. A failed upload skips the item;
    /// a failed insert aborts the request.
    async fn persist(
        &self,
        item: StagedDocument,
        uploaded_by: Option<&str>,
        submissions: &mut Vec<ProcessRequest>,
    ) -> Result<Option<Document>> {
        let StagedDocument {
            path,
            bytes,
            content_type,
            mut document,
            submit,
        } = item;

        let stored_path = match self.blobs.upload(&path, bytes, &content_type).await {
            Ok(p) => p,
            Err(e) => {
                warn!(%path, error = %e, "Upload failed, skipping item");
                return Ok(None);
            }
        };
        document.file_path = stored_path.clone();
        document.uploaded_by = uploaded_by.map(str::to_string);

        let document = self.store.insert_document(document).await?;
        if submit {
            submissions.push(ProcessRequest::new(
                document.id.clone(),
                self.blobs.public_url(&stored_path),
            ));
        }
        Ok(Some(document))
    }
}
