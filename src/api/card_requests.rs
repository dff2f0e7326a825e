use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use uuid::Uuid;

use crate::api::{cards::CardDetailsBody, middleware::auth::BearerCredential, AppState};
use crate::error::Result;
use crate::models::{CardRequest, CardView};

/// Client-facing: records a request and returns it in PENDING state
async fn submit_request(
    State(state): State<AppState>,
    BearerCredential(credential): BearerCredential,
    Json(body): Json<CardDetailsBody>,
) -> Result<(StatusCode, Json<CardRequest>)> {
    let request = state
        .issuance
        .request_card(&credential, body.try_into()?)
        .await?;

    Ok((StatusCode::ACCEPTED, Json(request)))
}

async fn approve_request(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<CardView>)> {
    let card = state.issuance.approve_request(id).await?;

    Ok((StatusCode::CREATED, Json(card)))
}

async fn reject_request(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<CardRequest>> {
    Ok(Json(state.issuance.reject_request(id).await?))
}

/// Review decisions; mounted behind the administrator check
pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/card-requests/:id/approve", post(approve_request))
        .route("/card-requests/:id/reject", post(reject_request))
}

pub fn client_router() -> Router<AppState> {
    Router::new().route("/card-requests", post(submit_request))
}
