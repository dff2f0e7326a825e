use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::api::{middleware::auth::BearerCredential, AppState};
use crate::error::Result;
use crate::models::{CardBrand, CardStatus, CardType, CardView, CardWithOwner};
use crate::services::card_issuer::{CardDetails, CardIssuanceError};

/// Card fields as submitted by clients. Brand and type arrive as free text
/// and are parsed so unknown values map to domain errors.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardDetailsBody {
    pub account_number: String,
    pub issuer: String,
    #[serde(rename = "type")]
    pub card_type: String,
    pub name: String,
    #[serde(default)]
    pub card_limit: Option<Decimal>,
}

impl TryFrom<CardDetailsBody> for CardDetails {
    type Error = CardIssuanceError;

    fn try_from(body: CardDetailsBody) -> std::result::Result<Self, Self::Error> {
        let issuer = body
            .issuer
            .parse::<CardBrand>()
            .map_err(|e| CardIssuanceError::UnsupportedBrand(e.0))?;
        let card_type = body
            .card_type
            .parse::<CardType>()
            .map_err(|e| CardIssuanceError::UnsupportedCardType(e.0))?;

        Ok(CardDetails {
            account_number: body.account_number,
            issuer,
            card_type,
            name: body.name,
            card_limit: body.card_limit,
        })
    }
}

#[derive(Debug, Deserialize)]
struct StatusChange {
    status: CardStatus,
}

async fn issue_card(
    State(state): State<AppState>,
    Json(body): Json<CardDetailsBody>,
) -> Result<(StatusCode, Json<CardView>)> {
    let card = state.issuance.issue_card(body.try_into()?).await?;

    Ok((StatusCode::CREATED, Json(card)))
}

async fn cards_for_account(
    State(state): State<AppState>,
    Path(account_number): Path<String>,
) -> Result<Json<Vec<CardWithOwner>>> {
    Ok(Json(state.issuance.cards_for_account(&account_number).await?))
}

async fn change_status(
    State(state): State<AppState>,
    Path(card_number): Path<String>,
    Json(body): Json<StatusChange>,
) -> Result<StatusCode> {
    state
        .issuance
        .change_status(&card_number, body.status)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

async fn my_cards(
    State(state): State<AppState>,
    BearerCredential(credential): BearerCredential,
) -> Result<Json<Vec<CardWithOwner>>> {
    Ok(Json(state.issuance.cards_for_caller(&credential).await?))
}

async fn my_account_cards(
    State(state): State<AppState>,
    BearerCredential(credential): BearerCredential,
    Path(account_number): Path<String>,
) -> Result<Json<Vec<CardWithOwner>>> {
    Ok(Json(
        state
            .issuance
            .cards_for_caller_account(&credential, &account_number)
            .await?,
    ))
}

async fn block_my_card(
    State(state): State<AppState>,
    BearerCredential(credential): BearerCredential,
    Path(card_number): Path<String>,
) -> Result<StatusCode> {
    state
        .issuance
        .block_own_card(&credential, &card_number)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Bank-employee routes; mounted behind the administrator check
pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/cards", post(issue_card))
        .route("/cards/account/:account_number", get(cards_for_account))
        .route("/cards/:card_number/status", post(change_status))
}

pub fn client_router() -> Router<AppState> {
    Router::new()
        .route("/cards/mine", get(my_cards))
        .route("/cards/mine/:account_number", get(my_account_cards))
        .route("/cards/:card_number/block", post(block_my_card))
}

#[cfg(test)]
mod tests {
    use crate::api::test_support::*;
    use crate::models::CardStatus;
    use crate::services::identity::tests::{admin_bearer, bearer_for};
    use crate::store::CardStore;
    use axum::http::StatusCode;
    use serde_json::json;

    fn issue_body(account_number: &str, issuer: &str) -> serde_json::Value {
        json!({
            "accountNumber": account_number,
            "issuer": issuer,
            "type": "DEBIT",
            "name": "Everyday",
            "cardLimit": 1500
        })
    }

    #[tokio::test]
    async fn test_issue_card() {
        let app = test_app().await;

        let response = app
            .send(json_request("POST", "/cards", Some(&admin_bearer()), issue_body(PERSONAL_ACCOUNT, "mastercard")))
            .await;

        assert_eq!(response.status(), StatusCode::CREATED);
        let card = body_json(response).await;
        assert_eq!(card["issuer"], "MASTERCARD");
        assert_eq!(card["type"], "DEBIT");
        assert_eq!(card["status"], "ACTIVE");
        assert_eq!(card["accountNumber"], PERSONAL_ACCOUNT);
        assert_eq!(card["cardNumber"].as_str().unwrap().len(), 16);
    }

    #[tokio::test]
    async fn test_issue_card_errors() {
        let app = test_app().await;

        let response = app
            .send(json_request("POST", "/cards", Some(&admin_bearer()), issue_body(PERSONAL_ACCOUNT, "DISCOVER")))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "UNSUPPORTED_BRAND");

        let mut body = issue_body(PERSONAL_ACCOUNT, "VISA");
        body["cardLimit"] = json!(0);
        let response = app.send(json_request("POST", "/cards", Some(&admin_bearer()), body)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "INVALID_LIMIT");

        let response = app
            .send(json_request("POST", "/cards", Some(&admin_bearer()), issue_body("000", "VISA")))
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        app.send(json_request("POST", "/cards", Some(&admin_bearer()), issue_body(COMPANY_ACCOUNT, "DINA")))
            .await;
        let response = app
            .send(json_request("POST", "/cards", Some(&admin_bearer()), issue_body(COMPANY_ACCOUNT, "DINA")))
            .await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(body_json(response).await["error"], "LIMIT_EXCEEDED");
    }

    #[tokio::test]
    async fn test_listing_endpoints() {
        let app = test_app().await;
        app.send(json_request("POST", "/cards", Some(&admin_bearer()), issue_body(PERSONAL_ACCOUNT, "VISA")))
            .await;

        let response = app
            .send(empty_request(
                "GET",
                &format!("/cards/account/{PERSONAL_ACCOUNT}"),
                Some(&admin_bearer()),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let cards = body_json(response).await;
        assert_eq!(cards.as_array().unwrap().len(), 1);
        assert_eq!(cards[0]["owner"]["email"], "owner@example.com");
        assert_eq!(cards[0]["issuer"], "VISA");

        let response = app
            .send(empty_request("GET", "/cards/mine", Some(&bearer_for(OWNER))))
            .await;
        assert_eq!(body_json(response).await.as_array().unwrap().len(), 1);

        let response = app
            .send(empty_request(
                "GET",
                &format!("/cards/mine/{PERSONAL_ACCOUNT}"),
                Some(&bearer_for(STRANGER)),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app.send(empty_request("GET", "/cards/mine", None)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_status_and_block() {
        let app = test_app().await;
        let response = app
            .send(json_request("POST", "/cards", Some(&admin_bearer()), issue_body(PERSONAL_ACCOUNT, "AMEX")))
            .await;
        let card_number = body_json(response).await["cardNumber"]
            .as_str()
            .unwrap()
            .to_string();

        let response = app
            .send(empty_request(
                "POST",
                &format!("/cards/{card_number}/block"),
                Some(&bearer_for(STRANGER)),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = app
            .send(empty_request(
                "POST",
                &format!("/cards/{card_number}/block"),
                Some(&bearer_for(OWNER)),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        let stored = app.store.find_card_by_number(&card_number).await.unwrap().unwrap();
        assert_eq!(stored.status, CardStatus::Blocked);

        let response = app
            .send(json_request(
                "POST",
                &format!("/cards/{card_number}/status"),
                Some(&admin_bearer()),
                json!({"status": "ACTIVE"}),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        let stored = app.store.find_card_by_number(&card_number).await.unwrap().unwrap();
        assert_eq!(stored.status, CardStatus::Active);
    }

    #[tokio::test]
    async fn test_admin_routes_require_administrator() {
        let app = test_app().await;

        let response = app
            .send(json_request("POST", "/cards", None, issue_body(PERSONAL_ACCOUNT, "VISA")))
            .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["error"], "UNAUTHENTICATED");

        let response = app
            .send(json_request(
                "POST",
                "/cards",
                Some("Bearer forged"),
                issue_body(PERSONAL_ACCOUNT, "VISA"),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        // A valid client token is not enough, even for the client's own account
        let response = app
            .send(json_request(
                "POST",
                "/cards",
                Some(&bearer_for(OWNER)),
                issue_body(PERSONAL_ACCOUNT, "VISA"),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(body_json(response).await["error"], "UNAUTHORIZED");

        let response = app
            .send(empty_request(
                "GET",
                &format!("/cards/account/{PERSONAL_ACCOUNT}"),
                Some(&bearer_for(OWNER)),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = app
            .send(json_request(
                "POST",
                "/cards/4333330000000001/status",
                None,
                json!({"status": "BLOCKED"}),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        assert!(app.store.cards().await.is_empty());
    }
}
