use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use url::Url;

use crate::services::{user_client::ClientDirectory, with_trailing_slash};

/// Code sent when a client blocks their own card
pub const CARD_BLOCKED_CODE: &str = "CARD_BLOCKED";

#[derive(thiserror::Error, Debug)]
pub enum NotificationError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Notification rejected: {0}")]
    Rejected(String),

    #[error("Invalid notification URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusNotification {
    pub code: String,
    pub destination: String,
}

#[async_trait]
pub trait NotificationGateway: Send + Sync {
    async fn send(&self, topic: &str, message: &StatusNotification) -> Result<(), NotificationError>;
}

/// Publishes to `{base}/topics/{topic}` on the notification service
#[derive(Clone)]
pub struct HttpNotificationGateway {
    http: Client,
    base_url: Url,
}

impl HttpNotificationGateway {
    pub fn new(base_url: Url) -> Self {
        Self {
            http: Client::new(),
            base_url: with_trailing_slash(base_url),
        }
    }
}

#[async_trait]
impl NotificationGateway for HttpNotificationGateway {
    async fn send(&self, topic: &str, message: &StatusNotification) -> Result<(), NotificationError> {
        let url = self.base_url.join(&format!("topics/{topic}"))?;

        let response = self.http.post(url).json(message).send().await?;

        if !response.status().is_success() {
            return Err(NotificationError::Rejected(format!(
                "Status {}",
                response.status()
            )));
        }

        Ok(())
    }
}

/// Fire-and-forget delivery of a card status notification.
///
/// The owner's contact address is resolved on the spawned task, so neither
/// the lookup nor the delivery can fail the caller. Failures are logged.
pub fn dispatch_status_change(
    clients: Arc<dyn ClientDirectory>,
    gateway: Arc<dyn NotificationGateway>,
    topic: String,
    client_id: i64,
    code: String,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let owner = match clients.client(client_id).await {
            Ok(owner) => owner,
            Err(e) => {
                tracing::warn!(client_id, error = %e, "Could not resolve card owner for notification");
                return;
            }
        };

        let message = StatusNotification {
            code,
            destination: owner.email,
        };

        match gateway.send(&topic, &message).await {
            Ok(()) => tracing::debug!(client_id, code = %message.code, "Card status notification sent"),
            Err(e) => tracing::warn!(
                client_id,
                code = %message.code,
                error = %e,
                "Card status notification failed"
            ),
        }
    })
}
