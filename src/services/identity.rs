use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};

/// Role claim value granting the administrative surface
pub const ADMIN_ROLE: &str = "ADMIN";

#[derive(thiserror::Error, Debug)]
pub enum IdentityError {
    #[error("Missing credential")]
    MissingCredential,

    #[error("Invalid credential: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),

    #[error("Credential does not identify a client")]
    MissingClientId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Client,
    Admin,
}

/// Who is calling. Administrators need not carry a client id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub client_id: Option<i64>,
    pub role: Role,
}

/// Resolves an opaque caller credential to the client it belongs to
pub trait IdentityResolver: Send + Sync {
    fn resolve(&self, credential: &str) -> Result<Caller, IdentityError>;

    fn resolve_client_id(&self, credential: &str) -> Result<i64, IdentityError> {
        self.resolve(credential)?
            .client_id
            .ok_or(IdentityError::MissingClientId)
    }
}

/// Claims issued by the user service
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(rename = "userId", default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub exp: i64,
}

impl Claims {
    fn client_id(&self) -> Option<i64> {
        self.user_id
            .or_else(|| self.sub.as_deref().and_then(|s| s.parse().ok()))
    }

    fn role(&self) -> Role {
        match self.role.as_deref() {
            Some(role) if role.eq_ignore_ascii_case(ADMIN_ROLE) => Role::Admin,
            _ => Role::Client,
        }
    }
}

/// Validates HS256 bearer tokens shared with the user service
pub struct JwtIdentityResolver {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtIdentityResolver {
    pub fn new(secret: &Secret<String>) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.expose_secret().as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }
}

impl IdentityResolver for JwtIdentityResolver {
    fn resolve(&self, credential: &str) -> Result<Caller, IdentityError> {
        let token = credential.trim();
        let token = token.strip_prefix("Bearer ").unwrap_or(token).trim();
        if token.is_empty() {
            return Err(IdentityError::MissingCredential);
        }

        let claims = decode::<Claims>(token, &self.decoding_key, &self.validation)?.claims;

        Ok(Caller {
            client_id: claims.client_id(),
            role: claims.role(),
        })
    }
}
