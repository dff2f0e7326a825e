// API module - HTTP endpoints

pub mod card_requests;
pub mod cards;
pub mod health;
pub mod middleware;

use std::sync::Arc;

use axum::{middleware::from_fn_with_state, routing::get, Router};
use sqlx::PgPool;
use tower_http::trace::TraceLayer;

use crate::services::card_issuer::CardIssuanceService;

#[derive(Clone)]
pub struct AppState {
    pub issuance: Arc<CardIssuanceService>,
    /// Absent when running against the in-memory store
    pub pool: Option<PgPool>,
}

pub fn router(state: AppState) -> Router {
    let admin = Router::new()
        .merge(cards::admin_router())
        .merge(card_requests::admin_router())
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware::auth::require_admin,
        ));

    Router::new()
        .route("/health", get(health::health_check))
        .merge(cards::client_router())
        .merge(card_requests::client_router())
        .merge(admin)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::models::{Account, OwnershipType};
    use crate::services::card_issuer::Collaborators;
    use crate::services::identity::tests::resolver;
    use crate::services::testing::{
        RecordingNotifier, RecordingVerificationSink, StaticClientDirectory,
    };
    use crate::store::MemoryStore;
    use axum::{body::Body, http::Request, response::Response};
    use chrono::Utc;
    use tower::ServiceExt;
    use uuid::Uuid;

    pub const PERSONAL_ACCOUNT: &str = "265000000000000111";
    pub const COMPANY_ACCOUNT: &str = "265000000000000222";
    pub const OWNER: i64 = 10;
    pub const COMPANY: i64 = 20;
    pub const STRANGER: i64 = 30;

    pub struct TestApp {
        pub router: Router,
        pub store: Arc<MemoryStore>,
    }

    pub async fn test_app() -> TestApp {
        let store = Arc::new(MemoryStore::new());
        for (number, client_id, ownership_type) in [
            (PERSONAL_ACCOUNT, OWNER, OwnershipType::Personal),
            (COMPANY_ACCOUNT, COMPANY, OwnershipType::Organizational),
        ] {
            store
                .add_account(Account {
                    id: Uuid::new_v4(),
                    account_number: number.to_string(),
                    client_id,
                    ownership_type,
                    created_at: Utc::now(),
                })
                .await;
        }

        let (notifier, _sent) = RecordingNotifier::new();
        let service = CardIssuanceService::new(
            Collaborators {
                cards: store.clone(),
                accounts: store.clone(),
                identity: Arc::new(resolver()),
                clients: Arc::new(
                    StaticClientDirectory::with_client(OWNER, "owner@example.com")
                        .and(COMPANY, "billing@company.example.com")
                        .and(STRANGER, "stranger@example.com"),
                ),
                verifications: Arc::new(RecordingVerificationSink::default()),
                notifications: Arc::new(notifier),
            },
            "card-status-change",
        );

        let router = router(AppState {
            issuance: Arc::new(service),
            pool: None,
        });

        TestApp { router, store }
    }

    impl TestApp {
        pub async fn send(&self, request: Request<Body>) -> Response {
            self.router.clone().oneshot(request).await.unwrap()
        }
    }

    pub fn json_request(
        method: &str,
        uri: &str,
        bearer: Option<&str>,
        body: serde_json::Value,
    ) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        if let Some(bearer) = bearer {
            builder = builder.header("authorization", bearer);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    pub fn empty_request(method: &str, uri: &str, bearer: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(bearer) = bearer {
            builder = builder.header("authorization", bearer);
        }
        builder.body(Body::empty()).unwrap()
    }

    pub async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }
}
