use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};

use crate::api::AppState;
use crate::error::AppError;

/// Raw bearer credential from the `Authorization` header.
///
/// Only presence is checked here; the identity resolver validates it.
#[derive(Debug, Clone)]
pub struct BearerCredential(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for BearerCredential
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or(AppError::MissingCredential)?;

        Ok(BearerCredential(value.to_string()))
    }
}

/// Middleware that admits only administrator credentials
pub async fn require_admin(
    State(state): State<AppState>,
    BearerCredential(credential): BearerCredential,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    state.issuance.authorize_admin(&credential)?;

    Ok(next.run(request).await)
}
