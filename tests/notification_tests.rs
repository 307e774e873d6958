use async_trait::async_trait;
use docflow::data_model::Profile;
use docflow::error::{DocFlowError, Result};
use docflow::notifications::{NotificationRequest, NotificationService};
use docflow::providers::{DisabledChannel, NotificationChannel, Recipient};
use docflow::store::{CollaborationStore, InMemoryStore};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// Channel double with a fixed outcome that counts its calls
struct StubChannel {
    name: &'static str,
    outcome: std::result::Result<bool, &'static str>,
    calls: AtomicUsize,
}

impl StubChannel {
    fn new(name: &'static str, outcome: std::result::Result<bool, &'static str>) -> Arc<Self> {
        Arc::new(StubChannel {
            name,
            outcome,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl NotificationChannel for StubChannel {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn send(&self, _recipient: &Recipient, _title: &str, _message: &str) -> Result<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcome
            .map_err(|message| DocFlowError::provider("stub", message))
    }
}

async fn store_with_profile(email: Option<&str>, phone: Option<&str>) -> Arc<InMemoryStore> {
    let store = Arc::new(InMemoryStore::new());
    store
        .insert_profile(Profile {
            id: "u1".to_string(),
            email: email.map(str::to_string),
            full_name: Some("Dana Doe".to_string()),
            phone_number: phone.map(str::to_string),
        })
        .await;
    store
}

fn request(send_email: bool, send_whatsapp: bool) -> NotificationRequest {
    NotificationRequest {
        user_id: Some("u1".to_string()),
        title: Some("Deadline".to_string()),
        message: Some("Contract due Friday".to_string()),
        document_id: Some("doc-1".to_string()),
        send_email,
        send_whatsapp,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_row_written_without_relays() {
    let store = store_with_profile(Some("dana@example.com"), None).await;
    let email = StubChannel::new("email", Ok(true));
    let service = NotificationService::new(
        store.clone(),
        email.clone(),
        Arc::new(DisabledChannel::new("whatsapp")),
    );

    let response = service.send(request(false, false)).await.unwrap();
    assert!(response.success);
    assert!(!response.email_sent);
    assert!(!response.whatsapp_sent);
    assert_eq!(email.calls.load(Ordering::SeqCst), 0);

    let row = store
        .get_notification(&response.notification_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.kind, "info");
    assert_eq!(row.document_id.as_deref(), Some("doc-1"));
    assert!(!row.sent_via_email);
}

#[tokio::test]
async fn test_both_channels_record_flags() {
    let store = store_with_profile(Some("dana@example.com"), Some("+4512345678")).await;
    let service = NotificationService::new(
        store.clone(),
        StubChannel::new("email", Ok(true)),
        StubChannel::new("whatsapp", Ok(true)),
    );

    let mut req = request(true, true);
    req.kind = Some("warning".to_string());
    let response = service.send(req).await.unwrap();
    assert!(response.email_sent);
    assert!(response.whatsapp_sent);

    let row = store
        .get_notification(&response.notification_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.kind, "warning");
    assert!(row.sent_via_email);
    assert!(row.sent_via_whatsapp);
}

#[tokio::test]
async fn test_email_needs_profile_address() {
    let store = store_with_profile(None, None).await;
    let email = StubChannel::new("email", Ok(true));
    let service = NotificationService::new(
        store.clone(),
        email.clone(),
        Arc::new(DisabledChannel::new("whatsapp")),
    );

    let response = service.send(request(true, false)).await.unwrap();
    assert!(!response.email_sent);
    assert_eq!(email.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_channel_errors_leave_flags_unset() {
    let store = store_with_profile(Some("dana@example.com"), Some("+4512345678")).await;
    let service = NotificationService::new(
        store.clone(),
        StubChannel::new("email", Err("smtp down")),
        StubChannel::new("whatsapp", Ok(false)),
    );

    let response = service.send(request(true, true)).await.unwrap();
    assert!(response.success);
    assert!(!response.email_sent);
    assert!(!response.whatsapp_sent);
}

#[tokio::test]
async fn test_unknown_user_still_gets_row() {
    let store = Arc::new(InMemoryStore::new());
    let whatsapp = StubChannel::new("whatsapp", Ok(false));
    let service = NotificationService::new(
        store.clone(),
        Arc::new(DisabledChannel::new("email")),
        whatsapp.clone(),
    );

    let response = service.send(request(true, true)).await.unwrap();
    assert!(store
        .get_notification(&response.notification_id)
        .await
        .unwrap()
        .is_some());
    // whatsapp is asked and declines for lack of a phone number
    assert_eq!(whatsapp.calls.load(Ordering::SeqCst), 1);
    assert!(!response.whatsapp_sent);
}

#[tokio::test]
async fn test_required_fields() {
    let store = Arc::new(InMemoryStore::new());
    let service = NotificationService::new(
        store.clone(),
        Arc::new(DisabledChannel::new("email")),
        Arc::new(DisabledChannel::new("whatsapp")),
    );
    let mut req = request(false, false);
    req.title = None;
    let err = service.send(req).await.unwrap_err();
    assert!(err.is_client_error());
    assert_eq!(err.to_string(), "User ID, title, and message are required");
}

#[test]
fn test_request_field_names() {
    let req: NotificationRequest = serde_json::from_value(serde_json::json!({
        "userId": "u1",
        "title": "t",
        "message": "m",
        "type": "success",
        "sendEmail": true,
        "sendWhatsApp": true
    }))
    .unwrap();
    assert_eq!(req.kind.as_deref(), Some("success"));
    assert!(req.send_email);
    assert!(req.send_whatsapp);
}
