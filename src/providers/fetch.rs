use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

#[derive(Debug, Clone)]
pub struct FetchedFile {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

/// Downloads third-party content for external ingestion.
#[async_trait]
pub trait RemoteFetcher: Send + Sync {
    async fn download(&self, url: &str, bearer: Option<&str>) -> Result<FetchedFile>;

    async fn get_json(&self, url: &str, bearer: Option<&str>) -> Result<Value>;
}

pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        HttpFetcher { client }
    }

    fn request(&self, url: &str, bearer: Option<&str>) -> reqwest::RequestBuilder {
        let request = self.client.get(url);
        match bearer {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[async_trait]
impl RemoteFetcher for HttpFetcher {
    async fn download(&self, url: &str, bearer: Option<&str>) -> Result<FetchedFile> {
        let response = self.request(url, bearer).send().await?.error_for_status()?;
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes().await?.to_vec();
        Ok(FetchedFile {
            bytes,
            content_type,
        })
    }

    async fn get_json(&self, url: &str, bearer: Option<&str>) -> Result<Value> {
        let value = self
            .request(url, bearer)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(value)
    }
}
