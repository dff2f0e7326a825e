use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// Who owns the account. Organizational accounts get fewer cards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "ownership_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OwnershipType {
    Personal,
    Organizational,
}

/// Read-only view of a bank account. Accounts are managed elsewhere.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Account {
    pub id: Uuid,
    pub account_number: String,
    pub client_id: i64,
    pub ownership_type: OwnershipType,
    pub created_at: DateTime<Utc>,
}

impl Account {
    pub async fn find_by_account_number(
        pool: &PgPool,
        account_number: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let account = sqlx::query_as::<_, Self>(
            r#"
            SELECT id, account_number, client_id, ownership_type, created_at
            FROM accounts
            WHERE account_number = $1
            "#,
        )
        .bind(account_number)
        .fetch_optional(pool)
        .await?;

        Ok(account)
    }

    /// Finds the account only when it belongs to the given client
    pub async fn find_by_account_number_and_client(
        pool: &PgPool,
        account_number: &str,
        client_id: i64,
    ) -> Result<Option<Self>, sqlx::Error> {
        let account = sqlx::query_as::<_, Self>(
            r#"
            SELECT id, account_number, client_id, ownership_type, created_at
            FROM accounts
            WHERE account_number = $1 AND client_id = $2
            "#,
        )
        .bind(account_number)
        .bind(client_id)
        .fetch_optional(pool)
        .await?;

        Ok(account)
    }
}
