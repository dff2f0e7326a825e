use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::card::{Card, CardBrand, CardType, NewCard};

/// PENDING is the only non-terminal state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "request_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

/// How a transactional approval ended
#[derive(Debug)]
pub enum ApprovalOutcome {
    Approved(Card),
    /// Another decision got there first
    NotPending,
    /// The account reached its card ceiling; the request stays pending
    LimitReached,
}

/// Self-service application for a new card, waiting on verification
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CardRequest {
    pub id: Uuid,
    pub client_id: i64,
    pub account_number: String,
    pub card_type: CardType,
    pub card_issuer: CardBrand,
    pub name: String,
    pub card_limit: Option<Decimal>,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewCardRequest {
    pub client_id: i64,
    pub account_number: String,
    pub card_type: CardType,
    pub card_issuer: CardBrand,
    pub name: String,
    pub card_limit: Option<Decimal>,
}

impl CardRequest {
    pub async fn create(pool: &PgPool, data: NewCardRequest) -> Result<Self, sqlx::Error> {
        let request = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO card_requests (
                client_id, account_number, card_type, card_issuer, name, card_limit, status
            )
            VALUES ($1, $2, $3, $4, $5, $6, 'PENDING')
            RETURNING *
            "#,
        )
        .bind(data.client_id)
        .bind(&data.account_number)
        .bind(data.card_type)
        .bind(data.card_issuer)
        .bind(&data.name)
        .bind(data.card_limit)
        .fetch_one(pool)
        .await?;

        Ok(request)
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let request = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM card_requests WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(request)
    }

    /// Marks the request approved and inserts its card in one transaction.
    ///
    /// The request is only touched while still pending, and the card is only
    /// inserted while the account is under `max_cards`. Either failure rolls
    /// the whole unit back.
    pub async fn approve_with_card(
        pool: &PgPool,
        id: Uuid,
        card: NewCard,
        max_cards: i64,
    ) -> Result<ApprovalOutcome, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE card_requests
            SET status = 'APPROVED', decided_at = NOW()
            WHERE id = $1 AND status = 'PENDING'
            "#,
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(ApprovalOutcome::NotPending);
        }

        match Card::create_within_limit(&mut *tx, card, max_cards).await? {
            Some(card) => {
                tx.commit().await?;
                Ok(ApprovalOutcome::Approved(card))
            }
            None => {
                tx.rollback().await?;
                Ok(ApprovalOutcome::LimitReached)
            }
        }
    }

    /// Returns `None` when the request is no longer pending
    pub async fn mark_rejected(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let request = sqlx::query_as::<_, Self>(
            r#"
            UPDATE card_requests
            SET status = 'REJECTED', decided_at = NOW()
            WHERE id = $1 AND status = 'PENDING'
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(request)
    }

    pub fn is_pending(&self) -> bool {
        self.status == RequestStatus::Pending
    }
}
