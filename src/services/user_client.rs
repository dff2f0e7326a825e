//! Client for the user service: owner contact lookup and verification
//! requests for self-service card applications.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use crate::models::{CardBrand, CardType};
use crate::services::with_trailing_slash;

#[derive(thiserror::Error, Debug)]
pub enum UserServiceError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("User service error: {0}")]
    ApiError(String),

    #[error("Client {0} not found")]
    ClientNotFound(i64),

    #[error("Invalid user service URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Failed to serialize verification details: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientContact {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationType {
    CardRequest,
}

/// Snapshot of the requested card shown to the reviewer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardVerificationDetails {
    pub account_number: String,
    #[serde(rename = "type")]
    pub card_type: CardType,
    pub issuer: CardBrand,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationRequest {
    pub user_id: i64,
    pub target_id: Uuid,
    pub verification_type: VerificationType,
    /// JSON-encoded `CardVerificationDetails`
    pub details: String,
}

impl VerificationRequest {
    pub fn card_request(
        user_id: i64,
        target_id: Uuid,
        details: &CardVerificationDetails,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            user_id,
            target_id,
            verification_type: VerificationType::CardRequest,
            details: serde_json::to_string(details)?,
        })
    }
}

#[async_trait]
pub trait ClientDirectory: Send + Sync {
    async fn client(&self, client_id: i64) -> Result<ClientContact, UserServiceError>;
}

/// Receives out-of-band review tickets
#[async_trait]
pub trait VerificationSink: Send + Sync {
    async fn submit(&self, request: VerificationRequest) -> Result<(), UserServiceError>;
}

#[derive(Clone)]
pub struct UserServiceClient {
    http: Client,
    base_url: Url,
}

impl UserServiceClient {
    pub fn new(base_url: Url) -> Self {
        Self {
            http: Client::new(),
            base_url: with_trailing_slash(base_url),
        }
    }

    fn endpoint(&self, path: &str) -> Result<Url, UserServiceError> {
        Ok(self.base_url.join(path)?)
    }
}

async fn api_error(response: reqwest::Response) -> UserServiceError {
    let status = response.status();
    let error_text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    tracing::error!(
        status = %status,
        error = %error_text,
        "User service request failed"
    );
    UserServiceError::ApiError(format!("Status {}: {}", status, error_text))
}

#[async_trait]
impl ClientDirectory for UserServiceClient {
    #[tracing::instrument(skip(self))]
    async fn client(&self, client_id: i64) -> Result<ClientContact, UserServiceError> {
        let url = self.endpoint(&format!("api/client/{client_id}"))?;

        let response = self.http.get(url).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(UserServiceError::ClientNotFound(client_id));
        }
        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let contact: ClientContact = response
            .json()
            .await
            .map_err(|e| UserServiceError::ApiError(format!("Failed to parse response: {}", e)))?;

        Ok(contact)
    }
}

#[async_trait]
impl VerificationSink for UserServiceClient {
    #[tracing::instrument(skip(self, request), fields(user_id = request.user_id, target_id = %request.target_id))]
    async fn submit(&self, request: VerificationRequest) -> Result<(), UserServiceError> {
        let url = self.endpoint("api/verification/request")?;

        let response = self.http.post(url).json(&request).send().await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        tracing::debug!("Verification request accepted");

        Ok(())
    }
}
