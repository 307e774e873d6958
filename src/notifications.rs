// src/notifications.rs

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

use crate::data_model::{Notification, Profile};
use crate::error::{DocFlowError, Result};
use crate::providers::{NotificationChannel, Recipient};
use crate::store::CollaborationStore;
use crate::utils::prometheus_metrics::NOTIFICATIONS_RELAYED_TOTAL;

const DEFAULT_KIND: &str = "info";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRequest {
    pub user_id: Option<String>,
    pub title: Option<String>,
    pub message: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub document_id: Option<String>,
    pub task_id: Option<String>,
    #[serde(default)]
    pub send_email: bool,
    #[serde(default, rename = "sendWhatsApp")]
    pub send_whatsapp: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NotificationResponse {
    pub success: bool,
    pub notification_id: String,
    pub email_sent: bool,
    pub whatsapp_sent: bool,
}

/// Writes notification rows and relays them to the configured channels.
pub struct NotificationService {
    store: Arc<dyn CollaborationStore>,
    email: Arc<dyn NotificationChannel>,
    whatsapp: Arc<dyn NotificationChannel>,
}

impl NotificationService {
    pub fn new(
        store: Arc<dyn CollaborationStore>,
        email: Arc<dyn NotificationChannel>,
        whatsapp: Arc<dyn NotificationChannel>,
    ) -> Self {
        NotificationService {
            store,
            email,
            whatsapp,
        }
    }

    #[instrument(skip(self, request), fields(user_id))]
    pub async fn send(&self, request: NotificationRequest) -> Result<NotificationResponse> {
        let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        let (Some(user_id), Some(title), Some(message)) = (
            non_empty(request.user_id),
            non_empty(request.title),
            non_empty(request.message),
        ) else {
            return Err(DocFlowError::MissingInput(
                "User ID, title, and message are required".to_string(),
            ));
        };
        tracing::Span::current().record("user_id", user_id.as_str());

        let notification = self
            .store
            .insert_notification(Notification {
                id: uuid::Uuid::new_v4().to_string(),
                user_id: user_id.clone(),
                title: title.clone(),
                message: message.clone(),
                kind: request.kind.unwrap_or_else(|| DEFAULT_KIND.to_string()),
                document_id: request.document_id,
                task_id: request.task_id,
                sent_via_email: false,
                sent_via_whatsapp: false,
                created_at: Utc::now(),
            })
            .await?;
        info!(notification_id = %notification.id, "Notification stored");

        let profile = self.store.get_profile(&user_id).await?;
        let recipient = recipient_for(&user_id, profile);

        let mut response = NotificationResponse {
            success: true,
            notification_id: notification.id.clone(),
            email_sent: false,
            whatsapp_sent: false,
        };

        if request.send_email && recipient.email.is_some() {
            if let Some(sent) = self.relay(self.email.as_ref(), &recipient, &title, &message).await {
                response.email_sent = sent;
                self.store
                    .update_notification_channels(&notification.id, Some(sent), None)
                    .await?;
            }
        }

        if request.send_whatsapp {
            if let Some(sent) = self
                .relay(self.whatsapp.as_ref(), &recipient, &title, &message)
                .await
            {
                response.whatsapp_sent = sent;
                self.store
                    .update_notification_channels(&notification.id, None, Some(sent))
                    .await?;
            }
        }

        Ok(response)
    }

    /// `None` when the channel errored; the flag on the row is then left as is.
    async fn relay(
        &self,
        channel: &dyn NotificationChannel,
        recipient: &Recipient,
        title: &str,
        message: &str,
    ) -> Option<bool> {
        match channel.send(recipient, title, message).await {
            Ok(sent) => {
                let result = if sent { "sent" } else { "skipped" };
                NOTIFICATIONS_RELAYED_TOTAL
                    .with_label_values(&[channel.name(), result])
                    .inc();
                Some(sent)
            }
            Err(e) => {
                NOTIFICATIONS_RELAYED_TOTAL
                    .with_label_values(&[channel.name(), "error"])
                    .inc();
                error!(channel = channel.name(), error = %e, "Notification relay failed");
                None
            }
        }
    }
}

fn recipient_for(user_id: &str, profile: Option<Profile>) -> Recipient {
    let profile = profile.unwrap_or_default();
    Recipient {
        user_id: user_id.to_string(),
        name: profile.full_name,
        email: profile.email,
        phone_number: profile.phone_number,
    }
}
