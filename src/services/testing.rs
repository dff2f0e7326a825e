//! In-process collaborator doubles shared by the unit tests

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::notifications::{NotificationError, NotificationGateway, StatusNotification};
use super::user_client::{
    ClientContact, ClientDirectory, UserServiceError, VerificationRequest, VerificationSink,
};

#[derive(Default)]
pub struct StaticClientDirectory {
    clients: HashMap<i64, ClientContact>,
}

impl StaticClientDirectory {
    pub fn with_client(client_id: i64, email: &str) -> Self {
        Self::default().and(client_id, email)
    }

    pub fn and(mut self, client_id: i64, email: &str) -> Self {
        self.clients.insert(
            client_id,
            ClientContact {
                id: client_id,
                first_name: format!("Client{client_id}"),
                last_name: "Test".to_string(),
                email: email.to_string(),
            },
        );
        self
    }
}

#[async_trait]
impl ClientDirectory for StaticClientDirectory {
    async fn client(&self, client_id: i64) -> Result<ClientContact, UserServiceError> {
        self.clients
            .get(&client_id)
            .cloned()
            .ok_or(UserServiceError::ClientNotFound(client_id))
    }
}

#[derive(Default)]
pub struct RecordingVerificationSink {
    submitted: Mutex<Vec<VerificationRequest>>,
    fail: bool,
}

impl RecordingVerificationSink {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn submitted(&self) -> Vec<VerificationRequest> {
        self.submitted.lock().unwrap().clone()
    }
}

#[async_trait]
impl VerificationSink for RecordingVerificationSink {
    async fn submit(&self, request: VerificationRequest) -> Result<(), UserServiceError> {
        if self.fail {
            return Err(UserServiceError::ApiError("Status 503: unavailable".to_string()));
        }
        self.submitted.lock().unwrap().push(request);
        Ok(())
    }
}

/// Forwards every notification to a channel the test can await on
pub struct RecordingNotifier {
    sent: Option<mpsc::UnboundedSender<(String, StatusNotification)>>,
}

impl RecordingNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<(String, StatusNotification)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { sent: Some(tx) }, rx)
    }

    pub fn failing() -> Self {
        Self { sent: None }
    }
}

#[async_trait]
impl NotificationGateway for RecordingNotifier {
    async fn send(&self, topic: &str, message: &StatusNotification) -> Result<(), NotificationError> {
        let sender = self
            .sent
            .as_ref()
            .ok_or_else(|| NotificationError::Rejected("Status 503 Service Unavailable".to_string()))?;
        let _ = sender.send((topic.to_string(), message.clone()));
        Ok(())
    }
}
