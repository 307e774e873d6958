use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use crate::config::AppConfig;
use crate::error::{DocFlowError, Result};

/// Placeholder text returned when no text-recognition key is configured.
pub const MOCK_OCR_TEXT: &str = "Mock OCR text extracted from document. This would contain the actual text content extracted from the uploaded document using Google Cloud Vision API.";

#[derive(Debug, Clone, PartialEq)]
pub struct OcrOutput {
    pub text: String,
    pub confidence: f64,
}

#[async_trait]
pub trait OcrProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn recognize(&self, file_url: &str) -> Result<OcrOutput>;
}

/// Returns a canned string without touching the file.
pub struct MockOcrProvider {
    text: String,
    confidence: f64,
}

impl MockOcrProvider {
    pub fn new(confidence: f64) -> Self {
        MockOcrProvider {
            text: MOCK_OCR_TEXT.to_string(),
            confidence,
        }
    }

    pub fn with_text(text: impl Into<String>, confidence: f64) -> Self {
        MockOcrProvider {
            text: text.into(),
            confidence,
        }
    }
}

#[async_trait]
impl OcrProvider for MockOcrProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn recognize(&self, file_url: &str) -> Result<OcrOutput> {
        debug!(%file_url, "Returning mock OCR text");
        Ok(OcrOutput {
            text: self.text.clone(),
            confidence: self.confidence,
        })
    }
}

/// Google Cloud Vision `images:annotate` with a single TEXT_DETECTION feature.
pub struct VisionOcrProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    confidence: f64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnnotateBatchResponse {
    #[serde(default)]
    responses: Vec<AnnotateResponse>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnnotateResponse {
    full_text_annotation: Option<TextAnnotation>,
}

#[derive(Deserialize)]
struct TextAnnotation {
    text: String,
}

impl VisionOcrProvider {
    pub fn new(
        client: reqwest::Client,
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        confidence: f64,
    ) -> Self {
        VisionOcrProvider {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            confidence,
        }
    }

    async fn download(&self, file_url: &str) -> Result<Vec<u8>> {
        let response = self.client.get(file_url).send().await?.error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }
}

#[async_trait]
impl OcrProvider for VisionOcrProvider {
    fn name(&self) -> &'static str {
        "vision"
    }

    async fn recognize(&self, file_url: &str) -> Result<OcrOutput> {
        let bytes = self.download(file_url).await?;
        debug!(%file_url, size = bytes.len(), "Sending file to text detection");

        let body = json!({
            "requests": [{
                "image": { "content": STANDARD.encode(&bytes) },
                "features": [{ "type": "TEXT_DETECTION", "maxResults": 1 }],
            }]
        });

        let response: AnnotateBatchResponse = self
            .client
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await?
            .json()
            .await?;

        response
            .responses
            .into_iter()
            .next()
            .and_then(|r| r.full_text_annotation)
            .map(|annotation| OcrOutput {
                text: annotation.text,
                confidence: self.confidence,
            })
            .ok_or_else(|| {
                DocFlowError::provider("vision", "response did not contain fullTextAnnotation")
            })
    }
}

pub fn build_ocr_provider(config: &AppConfig, client: reqwest::Client) -> Arc<dyn OcrProvider> {
    let confidence = config.pipeline.ocr_confidence;
    match &config.providers.vision.api_key {
        Some(key) => Arc::new(VisionOcrProvider::new(
            client,
            config.providers.vision.endpoint.clone(),
            key.clone(),
            confidence,
        )),
        None => {
            info!("Text-recognition API key not found, using mock OCR");
            Arc::new(MockOcrProvider::new(confidence))
        }
    }
}
