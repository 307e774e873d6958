//! External integrations.
//!
//! Each integration is a trait with a real HTTP implementation and a mock
//! implementation. The `build_*` functions pick one from the configured
//! credentials, so a missing key degrades the integration instead of failing
//! requests.

use std::time::Duration;

use crate::config::app::ProvidersConfig;
use crate::error::Result;

pub mod chat_model;
pub mod classifier;
pub mod fetch;
pub mod notify;
pub mod ocr;

pub use chat_model::{build_chat_model, ChatModel, MistralChatModel};
pub use classifier::{ClassificationLabel, Classifier, KeywordClassifier};
pub use fetch::{FetchedFile, HttpFetcher, RemoteFetcher};
pub use notify::{
    build_email_channel, build_whatsapp_channel, DisabledChannel, NotificationChannel, Recipient,
};
pub use ocr::{build_ocr_provider, MockOcrProvider, OcrOutput, OcrProvider, VisionOcrProvider};

/// Shared outbound HTTP client carrying the configured request timeout.
pub fn build_http_client(config: &ProvidersConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .user_agent(concat!("docflow/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(client)
}
