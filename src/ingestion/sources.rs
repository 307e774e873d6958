//! Normalizers turning third-party payloads into staged documents.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::warn;

use crate::data_model::Document;
use crate::error::{DocFlowError, Result};
use crate::providers::RemoteFetcher;
use crate::utils::text::{sanitize_filename, truncate_chars};

const OCTET_STREAM: &str = "application/octet-stream";
const TEXT_PLAIN: &str = "text/plain";
const MIN_EMAIL_BODY_CHARS: usize = 100;
const EMAIL_SUBJECT_CHARS: usize = 50;

/// Blob and row for one incoming file, not yet persisted.
#[derive(Debug, Clone)]
pub struct StagedDocument {
    pub path: String,
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub document: Document,
    /// Whether the created document is handed to the processing pipeline.
    pub submit: bool,
}

impl StagedDocument {
    fn new(
        path: String,
        bytes: Vec<u8>,
        content_type: String,
        filename: String,
        original_filename: String,
        file_size: Option<u64>,
        metadata: Value,
    ) -> Self {
        let mut document = Document::new(uuid::Uuid::new_v4().to_string(), filename, path.clone());
        document.original_filename = Some(original_filename);
        document.mime_type = Some(content_type.clone());
        document.file_size = file_size.or(Some(bytes.len() as u64));
        document.extracted_metadata = into_map(metadata);
        StagedDocument {
            path,
            bytes,
            content_type,
            document,
            submit: true,
        }
    }
}

fn into_map(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map.into_iter().filter(|(_, v)| !v.is_null()).collect(),
        _ => Map::new(),
    }
}

/// Credentials and collaborators shared by the normalizers.
pub struct SourceContext<'a> {
    pub fetcher: &'a dyn RemoteFetcher,
    pub graph_api_key: Option<&'a str>,
    pub whatsapp_api_key: Option<&'a str>,
    pub whatsapp_graph_base_url: &'a str,
    pub request_metadata: &'a Value,
}

fn parse_payload<T: DeserializeOwned>(source: &str, data: &Value) -> Result<T> {
    serde_json::from_value(data.clone())
        .map_err(|e| DocFlowError::InvalidValue(format!("Malformed {} payload: {}", source, e)))
}

// SharePoint

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SharePointPayload {
    items: Vec<SharePointItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SharePointItem {
    id: String,
    name: String,
    file: Option<SharePointFile>,
    download_url: Option<String>,
    web_url: Option<String>,
    size: Option<u64>,
    created_by: Option<Value>,
    last_modified_date_time: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SharePointFile {
    mime_type: Option<String>,
}

pub async fn sharepoint(data: &Value, ctx: &SourceContext<'_>) -> Result<Vec<StagedDocument>> {
    let payload: SharePointPayload = parse_payload("sharepoint", data)?;
    let Some(token) = ctx.graph_api_key else {
        warn!(
            items = payload.items.len(),
            "Microsoft Graph API key not configured, skipping SharePoint items"
        );
        return Ok(Vec::new());
    };

    let mut staged = Vec::new();
    for item in payload.items {
        let (Some(file), Some(url)) = (item.file, item.download_url.as_deref()) else {
            continue;
        };
        let fetched = match ctx.fetcher.download(url, Some(token)).await {
            Ok(f) => f,
            Err(e) => {
                warn!(item_id = %item.id, error = %e, "SharePoint download failed, skipping item");
                continue;
            }
        };
        let content_type = file
            .mime_type
            .or(fetched.content_type)
            .unwrap_or_else(|| OCTET_STREAM.to_string());
        let created_by = item
            .created_by
            .as_ref()
            .and_then(|c| c.pointer("/user/displayName"))
            .cloned();
        staged.push(StagedDocument::new(
            format!("sharepoint/{}_{}", item.id, sanitize_filename(&item.name)),
            fetched.bytes,
            content_type,
            format!("sharepoint_{}", item.name),
            item.name,
            item.size,
            json!({
                "source": "sharepoint",
                "sharepoint_id": item.id,
                "sharepoint_url": item.web_url,
                "created_by_sharepoint": created_by,
                "modified_date_sharepoint": item.last_modified_date_time,
            }),
        ));
    }
    Ok(staged)
}

// Email

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct EmailPayload {
    emails: Vec<EmailMessage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EmailMessage {
    id: String,
    subject: Option<String>,
    from: Option<EmailFrom>,
    received_date_time: Option<String>,
    #[serde(default)]
    has_attachments: bool,
    #[serde(default)]
    attachments: Vec<EmailAttachment>,
    body: Option<EmailBody>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EmailFrom {
    email_address: Option<EmailAddress>,
}

#[derive(Debug, Deserialize)]
struct EmailAddress {
    address: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EmailAttachment {
    name: String,
    content_type: Option<String>,
    content_bytes: Option<String>,
    size: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct EmailBody {
    content: Option<String>,
}

impl EmailMessage {
    fn sender(&self) -> Option<&str> {
        self.from
            .as_ref()
            .and_then(|f| f.email_address.as_ref())
            .and_then(|a| a.address.as_deref())
    }

    fn provenance(&self) -> Value {
        json!({
            "source": "email",
            "email_id": self.id,
            "email_subject": self.subject,
            "email_sender": self.sender(),
            "email_received": self.received_date_time,
        })
    }
}

/// Attachments and bodies arrive inline, so no credential is needed here.
pub async fn email(data: &Value, _ctx: &SourceContext<'_>) -> Result<Vec<StagedDocument>> {
    let payload: EmailPayload = parse_payload("email", data)?;

    let mut staged = Vec::new();
    for message in &payload.emails {
        if message.has_attachments {
            for attachment in &message.attachments {
                let Some(encoded) = attachment.content_bytes.as_deref() else {
                    continue;
                };
                let bytes = match STANDARD.decode(encoded) {
                    Ok(b) => b,
                    Err(e) => {
                        warn!(email_id = %message.id, attachment = %attachment.name, error = %e,
                            "Attachment is not valid base64, skipping");
                        continue;
                    }
                };
                staged.push(StagedDocument::new(
                    format!("email/{}_{}", message.id, sanitize_filename(&attachment.name)),
                    bytes,
                    attachment
                        .content_type
                        .clone()
                        .unwrap_or_else(|| OCTET_STREAM.to_string()),
                    format!("email_{}", attachment.name),
                    attachment.name.clone(),
                    attachment.size,
                    message.provenance(),
                ));
            }
        }

        let Some(body) = message.body.as_ref().and_then(|b| b.content.as_deref()) else {
            continue;
        };
        if body.chars().count() <= MIN_EMAIL_BODY_CHARS {
            continue;
        }
        let subject = message.subject.as_deref().filter(|s| !s.is_empty());
        let content = format!(
            "Subject: {}\nFrom: {}\nDate: {}\n\n{}",
            subject.unwrap_or_default(),
            message.sender().unwrap_or_default(),
            message.received_date_time.as_deref().unwrap_or_default(),
            body
        );
        let mut metadata = message.provenance();
        metadata["type"] = json!("email_content");
        let mut body_document = StagedDocument::new(
            format!("email/{}_content.txt", message.id),
            content.into_bytes(),
            TEXT_PLAIN.to_string(),
            format!(
                "email_content_{}.txt",
                subject.map_or("no_subject", |s| truncate_chars(s, EMAIL_SUBJECT_CHARS))
            ),
            format!("{}.txt", subject.unwrap_or("Email Content")),
            None,
            metadata,
        );
        body_document.submit = false;
        staged.push(body_document);
    }
    Ok(staged)
}

// WhatsApp

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WhatsAppPayload {
    messages: Vec<WhatsAppMessage>,
}

#[derive(Debug, Deserialize)]
struct WhatsAppMessage {
    id: String,
    from: Option<String>,
    timestamp: Option<Value>,
    #[serde(rename = "type")]
    kind: String,
    document: Option<WhatsAppMedia>,
    image: Option<WhatsAppMedia>,
}

#[derive(Debug, Deserialize)]
struct WhatsAppMedia {
    id: Option<String>,
    filename: Option<String>,
    mime_type: Option<String>,
    caption: Option<String>,
}

impl WhatsAppMessage {
    fn media(&self) -> Option<&WhatsAppMedia> {
        match self.kind.as_str() {
            "document" => self.document.as_ref(),
            "image" => self.image.as_ref(),
            _ => None,
        }
    }
}

/// `file_size` arrives either as a number or a numeric string.
fn media_file_size(info: &Value) -> Option<u64> {
    match info.get("file_size")? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

pub async fn whatsapp(data: &Value, ctx: &SourceContext<'_>) -> Result<Vec<StagedDocument>> {
    let payload: WhatsAppPayload = parse_payload("whatsapp", data)?;
    let Some(token) = ctx.whatsapp_api_key else {
        warn!(
            messages = payload.messages.len(),
            "WhatsApp Business API key not configured, skipping media messages"
        );
        return Ok(Vec::new());
    };

    let mut staged = Vec::new();
    for message in &payload.messages {
        let Some(media) = message.media() else {
            continue;
        };
        let Some(media_id) = media.id.as_deref() else {
            continue;
        };

        let info_url = format!(
            "{}/{}",
            ctx.whatsapp_graph_base_url.trim_end_matches('/'),
            media_id
        );
        let info = match ctx.fetcher.get_json(&info_url, Some(token)).await {
            Ok(v) => v,
            Err(e) => {
                warn!(message_id = %message.id, error = %e, "WhatsApp media lookup failed, skipping");
                continue;
            }
        };
        let Some(media_url) = info.get("url").and_then(Value::as_str) else {
            warn!(message_id = %message.id, "WhatsApp media lookup returned no url, skipping");
            continue;
        };
        let fetched = match ctx.fetcher.download(media_url, Some(token)).await {
            Ok(f) => f,
            Err(e) => {
                warn!(message_id = %message.id, error = %e, "WhatsApp media download failed, skipping");
                continue;
            }
        };

        let filename = media
            .filename
            .clone()
            .unwrap_or_else(|| format!("whatsapp_{}", message.id));
        let content_type = media
            .mime_type
            .clone()
            .unwrap_or_else(|| OCTET_STREAM.to_string());
        staged.push(StagedDocument::new(
            format!("whatsapp/{}_{}", message.id, sanitize_filename(&filename)),
            fetched.bytes,
            content_type,
            format!("whatsapp_{}", filename),
            filename,
            media_file_size(&info),
            json!({
                "source": "whatsapp",
                "message_id": message.id,
                "sender_phone": message.from,
                "timestamp": message.timestamp,
                "caption": media.caption,
            }),
        ));
    }
    Ok(staged)
}

// Generic API

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ApiPayload {
    items: Vec<Value>,
}

pub async fn api(data: &Value, ctx: &SourceContext<'_>) -> Result<Vec<StagedDocument>> {
    let payload: ApiPayload = parse_payload("api", data)?;
    let api_source = ctx
        .request_metadata
        .get("apiSource")
        .and_then(Value::as_str)
        .unwrap_or("external");
    let received_at = Utc::now().timestamp_millis();

    let mut staged = Vec::new();
    for (index, item) in payload.items.iter().enumerate() {
        let filename_field = item.get("filename").and_then(Value::as_str);
        let (bytes, filename, content_type) =
            if let Some(url) = item.get("fileUrl").and_then(Value::as_str) {
                match ctx.fetcher.download(url, None).await {
                    Ok(fetched) => (
                        fetched.bytes,
                        filename_field.unwrap_or("api_document").to_string(),
                        fetched
                            .content_type
                            .unwrap_or_else(|| OCTET_STREAM.to_string()),
                    ),
                    Err(e) => {
                        warn!(%url, error = %e, "API item download failed, skipping");
                        continue;
                    }
                }
            } else if let Some(content) = item.get("content").and_then(Value::as_str) {
                (
                    content.as_bytes().to_vec(),
                    filename_field.unwrap_or("api_content.txt").to_string(),
                    TEXT_PLAIN.to_string(),
                )
            } else {
                continue;
            };

        staged.push(StagedDocument::new(
            format!("api/{}-{}_{}", received_at, index, sanitize_filename(&filename)),
            bytes,
            content_type,
            format!("api_{}", filename),
            filename,
            None,
            json!({
                "source": "api",
                "api_source": api_source,
                "original_data": item,
            }),
        ));
    }
    Ok(staged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::FetchedFile;
    use async_trait::async_trait;

    struct NoFetch;

    #[async_trait]
    impl RemoteFetcher for NoFetch {
        async fn download(&self, url: &str, _bearer: Option<&str>) -> Result<FetchedFile> {
            Err(DocFlowError::provider("fetch", format!("unexpected download of {}", url)))
        }

        async fn get_json(&self, url: &str, _bearer: Option<&str>) -> Result<Value> {
            Err(DocFlowError::provider("fetch", format!("unexpected lookup of {}", url)))
        }
    }

    fn context<'a>(fetcher: &'a NoFetch, metadata: &'a Value) -> SourceContext<'a> {
        SourceContext {
            fetcher,
            graph_api_key: None,
            whatsapp_api_key: None,
            whatsapp_graph_base_url: "https://graph.example/v18.0",
            request_metadata: metadata,
        }
    }

    #[tokio::test]
    async fn email_attachment_and_long_body() {
        let metadata = json!({});
        let data = json!({
            "emails": [{
                "id": "m1",
                "subject": "Quarterly invoice",
                "from": { "emailAddress": { "address": "billing@acme.com" } },
                "receivedDateTime": "2024-03-01T10:00:00Z",
                "hasAttachments": true,
                "attachments": [
                    { "name": "inv.pdf", "contentType": "application/pdf", "contentBytes": "SGVsbG8=" },
                    { "name": "link.url" }
                ],
                "body": { "content": "x".repeat(150) }
            }]
        });
        let staged = email(&data, &context(&NoFetch, &metadata)).await.unwrap();
        assert_eq!(staged.len(), 2);

        let attachment = &staged[0];
        assert_eq!(attachment.path, "email/m1_inv.pdf");
        assert_eq!(attachment.bytes, b"Hello");
        assert_eq!(attachment.document.filename, "email_inv.pdf");
        assert_eq!(attachment.document.extracted_metadata["email_sender"], "billing@acme.com");
        assert!(attachment.submit);

        let body = &staged[1];
        assert_eq!(body.path, "email/m1_content.txt");
        assert_eq!(body.content_type, "text/plain");
        assert_eq!(body.document.filename, "email_content_Quarterly invoice.txt");
        assert_eq!(body.document.extracted_metadata["type"], "email_content");
        assert!(String::from_utf8_lossy(&body.bytes).starts_with("Subject: Quarterly invoice\nFrom: billing@acme.com\n"));
        assert!(!body.submit);
    }

    #[tokio::test]
    async fn short_email_body_is_ignored() {
        let metadata = json!({});
        let data = json!({ "emails": [{ "id": "m2", "body": { "content": "short note" } }] });
        let staged = email(&data, &context(&NoFetch, &metadata)).await.unwrap();
        assert!(staged.is_empty());
    }

    #[tokio::test]
    async fn missing_credentials_skip_remote_sources() {
        let metadata = json!({});
        let ctx = context(&NoFetch, &metadata);
        let sharepoint_data = json!({ "items": [{ "id": "1", "name": "a.pdf", "file": {}, "downloadUrl": "https://sp/a" }] });
        assert!(sharepoint(&sharepoint_data, &ctx).await.unwrap().is_empty());
        let whatsapp_data = json!({ "messages": [{ "id": "w1", "type": "document", "document": { "id": "media-1" } }] });
        assert!(whatsapp(&whatsapp_data, &ctx).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn api_inline_content_defaults() {
        let metadata = json!({ "apiSource": "crm" });
        let data = json!({ "items": [{ "content": "hello" }, { "note": "nothing to ingest" }] });
        let staged = api(&data, &context(&NoFetch, &metadata)).await.unwrap();
        assert_eq!(staged.len(), 1);
        let item = &staged[0];
        assert!(item.path.starts_with("api/"));
        assert!(item.path.ends_with("_api_content.txt"));
        assert_eq!(item.document.filename, "api_api_content.txt");
        assert_eq!(item.document.file_size, Some(5));
        assert_eq!(item.document.extracted_metadata["api_source"], "crm");
        assert_eq!(item.document.extracted_metadata["original_data"]["content"], "hello");
    }

    #[tokio::test]
    async fn malformed_payload_is_rejected() {
        let metadata = json!({});
        let data = json!({ "emails": "not a list" });
        let err = email(&data, &context(&NoFetch, &metadata)).await.unwrap_err();
        assert!(err.is_client_error());
    }

    #[test]
    fn media_size_accepts_strings_and_numbers() {
        assert_eq!(media_file_size(&json!({ "file_size": "2048" })), Some(2048));
        assert_eq!(media_file_size(&json!({ "file_size": 10 })), Some(10));
        assert_eq!(media_file_size(&json!({})), None);
    }
}
