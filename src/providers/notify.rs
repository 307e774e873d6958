use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::{error, info};

use crate::config::app::{EmailConfig, WhatsAppConfig};
use crate::error::Result;
use crate::utils::text::escape_html;

/// Who a notification is relayed to.
#[derive(Debug, Clone, Default)]
pub struct Recipient {
    pub user_id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
}

/// A delivery channel. `Ok(false)` means the channel declined or the provider
/// rejected the message; `Err` is reserved for transport failures.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    fn name(&self) -> &'static str;

    async fn send(&self, recipient: &Recipient, title: &str, message: &str) -> Result<bool>;
}

/// Channel with no credentials configured; never delivers.
pub struct DisabledChannel {
    name: &'static str,
}

impl DisabledChannel {
    pub fn new(name: &'static str) -> Self {
        DisabledChannel { name }
    }
}

#[async_trait]
impl NotificationChannel for DisabledChannel {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn send(&self, recipient: &Recipient, _title: &str, _message: &str) -> Result<bool> {
        info!(channel = self.name, user_id = %recipient.user_id, "Channel not configured, skipping send");
        Ok(false)
    }
}

/// Logs the message instead of sending it. Used when an email key is set
/// without a supported service.
pub struct LoggingEmailChannel;

#[async_trait]
impl NotificationChannel for LoggingEmailChannel {
    fn name(&self) -> &'static str {
        "email"
    }

    async fn send(&self, recipient: &Recipient, title: &str, message: &str) -> Result<bool> {
        match &recipient.email {
            Some(email) => {
                info!(%email, %title, %message, "Mock email sent");
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

pub struct SendGridChannel {
    client: reqwest::Client,
    api_key: String,
    config: EmailConfig,
}

impl SendGridChannel {
    pub fn new(client: reqwest::Client, api_key: impl Into<String>, config: EmailConfig) -> Self {
        SendGridChannel {
            client,
            api_key: api_key.into(),
            config,
        }
    }

    fn html_body(name: &str, title: &str, message: &str) -> String {
        let (name, title, message) = (escape_html(name), escape_html(title), escape_html(message));
        format!(
            "<h2>{title}</h2>\n<p>Hello {name},</p>\n<p>{message}</p>\n<br>\n<p>Best regards,<br>DocFlow Pro Team</p>\n<hr>\n<small>This is an automated notification from your DocFlow Pro system.</small>"
        )
    }
}

#[async_trait]
impl NotificationChannel for SendGridChannel {
    fn name(&self) -> &'static str {
        "email"
    }

    async fn send(&self, recipient: &Recipient, title: &str, message: &str) -> Result<bool> {
        let Some(email) = recipient.email.as_deref() else {
            return Ok(false);
        };
        let name = recipient.name.as_deref().unwrap_or_default();

        let body = json!({
            "personalizations": [{
                "to": [{ "email": email, "name": name }],
                "subject": format!("DocFlow Pro: {}", title),
            }],
            "from": {
                "email": self.config.from_address,
                "name": self.config.from_name,
            },
            "content": [{
                "type": "text/html",
                "value": Self::html_body(name, title, message),
            }],
        });

        let response = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if response.status().is_success() {
            Ok(true)
        } else {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            error!(%status, %detail, "SendGrid rejected email");
            Ok(false)
        }
    }
}

/// WhatsApp Business template message through the Graph API.
pub struct WhatsAppChannel {
    client: reqwest::Client,
    api_key: String,
    business_number: String,
    config: WhatsAppConfig,
}

impl WhatsAppChannel {
    pub fn new(
        client: reqwest::Client,
        api_key: impl Into<String>,
        business_number: impl Into<String>,
        config: WhatsAppConfig,
    ) -> Self {
        WhatsAppChannel {
            client,
            api_key: api_key.into(),
            business_number: business_number.into(),
            config,
        }
    }
}

#[async_trait]
impl NotificationChannel for WhatsAppChannel {
    fn name(&self) -> &'static str {
        "whatsapp"
    }

    async fn send(&self, recipient: &Recipient, title: &str, message: &str) -> Result<bool> {
        let Some(phone) = recipient.phone_number.as_deref() else {
            info!(user_id = %recipient.user_id, "User phone number not found, skipping WhatsApp send");
            return Ok(false);
        };

        let body = json!({
            "messaging_product": "whatsapp",
            "to": phone,
            "type": "template",
            "template": {
                "name": self.config.template_name,
                "language": { "code": "en" },
                "components": [{
                    "type": "body",
                    "parameters": [
                        { "type": "text", "text": title },
                        { "type": "text", "text": message },
                    ],
                }],
            },
        });

        let url = format!(
            "{}/{}/messages",
            self.config.graph_base_url.trim_end_matches('/'),
            self.business_number
        );
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if response.status().is_success() {
            Ok(true)
        } else {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            error!(%status, %detail, "WhatsApp API rejected message");
            Ok(false)
        }
    }
}

pub fn build_email_channel(
    config: &EmailConfig,
    client: reqwest::Client,
) -> Arc<dyn NotificationChannel> {
    match (&config.api_key, config.service.as_deref()) {
        (None, _) => Arc::new(DisabledChannel::new("email")),
        (Some(key), Some("sendgrid")) => {
            Arc::new(SendGridChannel::new(client, key.clone(), config.clone()))
        }
        (Some(_), _) => Arc::new(LoggingEmailChannel),
    }
}

pub fn build_whatsapp_channel(
    config: &WhatsAppConfig,
    client: reqwest::Client,
) -> Arc<dyn NotificationChannel> {
    match (&config.api_key, &config.business_number) {
        (Some(key), Some(number)) => Arc::new(WhatsAppChannel::new(
            client,
            key.clone(),
            number.clone(),
            config.clone(),
        )),
        _ => Arc::new(DisabledChannel::new("whatsapp")),
    }
}
