use std::{fmt, str::FromStr};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection, PgPool, Postgres};
use uuid::Uuid;

use crate::services::user_client::ClientContact;

/// Card network. Decides the issuer identification prefix of the number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "card_brand", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CardBrand {
    Visa,
    Mastercard,
    Dina,
    AmericanExpress,
}

impl CardBrand {
    pub fn as_str(&self) -> &'static str {
        match self {
            CardBrand::Visa => "VISA",
            CardBrand::Mastercard => "MASTERCARD",
            CardBrand::Dina => "DINA",
            CardBrand::AmericanExpress => "AMERICAN_EXPRESS",
        }
    }
}

impl FromStr for CardBrand {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "VISA" => Ok(CardBrand::Visa),
            "MASTERCARD" => Ok(CardBrand::Mastercard),
            "DINA" => Ok(CardBrand::Dina),
            "AMERICAN_EXPRESS" | "AMEX" => Ok(CardBrand::AmericanExpress),
            _ => Err(UnknownVariant(s.to_string())),
        }
    }
}

impl fmt::Display for CardBrand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "card_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CardType {
    Debit,
    Credit,
    Prepaid,
}

impl FromStr for CardType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DEBIT" => Ok(CardType::Debit),
            "CREDIT" => Ok(CardType::Credit),
            "PREPAID" => Ok(CardType::Prepaid),
            _ => Err(UnknownVariant(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "card_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CardStatus {
    Active,
    Blocked,
}

impl CardStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CardStatus::Active => "ACTIVE",
            CardStatus::Blocked => "BLOCKED",
        }
    }
}

impl fmt::Display for CardStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown value: {0}")]
pub struct UnknownVariant(pub String);

/// An issued card joined with the account that owns it.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Card {
    pub id: Uuid,
    pub card_number: String,
    pub cvv: String,
    pub issuer: CardBrand,
    pub card_type: CardType,
    pub name: String,
    pub account_id: Uuid,
    pub account_number: String, // joined from accounts
    pub client_id: i64,         // joined from accounts
    pub status: CardStatus,
    pub card_limit: Option<Decimal>,
    pub creation_date: NaiveDate,
    pub expiration_date: NaiveDate,
}

#[derive(Debug, Clone)]
pub struct NewCard {
    pub card_number: String,
    pub cvv: String,
    pub issuer: CardBrand,
    pub card_type: CardType,
    pub name: String,
    pub account_id: Uuid,
    pub status: CardStatus,
    pub card_limit: Option<Decimal>,
    pub creation_date: NaiveDate,
    pub expiration_date: NaiveDate,
}

/// Card representation that leaves the owner implicit in the account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardView {
    pub id: Uuid,
    pub card_number: String,
    pub cvv: String,
    pub issuer: CardBrand,
    #[serde(rename = "type")]
    pub card_type: CardType,
    pub name: String,
    pub account_number: String,
    pub status: CardStatus,
    pub card_limit: Option<Decimal>,
    pub creation_date: NaiveDate,
    pub expiration_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardWithOwner {
    #[serde(flatten)]
    pub card: CardView,
    pub owner: ClientContact,
}

const SELECT_CARDS: &str = r#"
    SELECT c.id, c.card_number, c.cvv, c.issuer, c.card_type, c.name, c.account_id,
           a.account_number, a.client_id, c.status, c.card_limit,
           c.creation_date, c.expiration_date
    FROM cards c
    JOIN accounts a ON a.id = c.account_id
"#;

impl Card {
    /// Inserts a card. Accepts a pool or an open transaction.
    pub async fn create<'e, E>(executor: E, data: NewCard) -> Result<Self, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Postgres>,
    {
        let card = sqlx::query_as::<_, Self>(
            r#"
            WITH inserted AS (
                INSERT INTO cards (
                    card_number, cvv, issuer, card_type, name, account_id,
                    status, card_limit, creation_date, expiration_date
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                RETURNING *
            )
            SELECT i.id, i.card_number, i.cvv, i.issuer, i.card_type, i.name, i.account_id,
                   a.account_number, a.client_id, i.status, i.card_limit,
                   i.creation_date, i.expiration_date
            FROM inserted i
            JOIN accounts a ON a.id = i.account_id
            "#,
        )
        .bind(&data.card_number)
        .bind(&data.cvv)
        .bind(data.issuer)
        .bind(data.card_type)
        .bind(&data.name)
        .bind(data.account_id)
        .bind(data.status)
        .bind(data.card_limit)
        .bind(data.creation_date)
        .bind(data.expiration_date)
        .fetch_one(executor)
        .await?;

        Ok(card)
    }

    /// Inserts the card unless the account already holds `max_cards`.
    ///
    /// Locks the account row for the rest of the transaction, so concurrent
    /// issuance against one account is serialized and the count is exact.
    /// `None` means the ceiling was reached and nothing was written.
    pub async fn create_within_limit(
        conn: &mut PgConnection,
        data: NewCard,
        max_cards: i64,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query("SELECT id FROM accounts WHERE id = $1 FOR UPDATE")
            .bind(data.account_id)
            .execute(&mut *conn)
            .await?;

        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM cards WHERE account_id = $1")
            .bind(data.account_id)
            .fetch_one(&mut *conn)
            .await?;

        if count >= max_cards {
            return Ok(None);
        }

        Self::create(&mut *conn, data).await.map(Some)
    }

    pub async fn find_by_card_number(
        pool: &PgPool,
        card_number: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let card = sqlx::query_as::<_, Self>(&format!("{SELECT_CARDS} WHERE c.card_number = $1"))
            .bind(card_number)
            .fetch_optional(pool)
            .await?;

        Ok(card)
    }

    pub async fn exists_by_card_number(pool: &PgPool, card_number: &str) -> Result<bool, sqlx::Error> {
        let exists = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (SELECT 1 FROM cards WHERE card_number = $1)
            "#,
        )
        .bind(card_number)
        .fetch_one(pool)
        .await?;

        Ok(exists)
    }

    pub async fn list_by_account_number(
        pool: &PgPool,
        account_number: &str,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let cards = sqlx::query_as::<_, Self>(&format!(
            "{SELECT_CARDS} WHERE a.account_number = $1 ORDER BY c.creation_date, c.id"
        ))
        .bind(account_number)
        .fetch_all(pool)
        .await?;

        Ok(cards)
    }

    /// Lists the cards of every account owned by the client
    pub async fn list_by_client(pool: &PgPool, client_id: i64) -> Result<Vec<Self>, sqlx::Error> {
        let cards = sqlx::query_as::<_, Self>(&format!(
            "{SELECT_CARDS} WHERE a.client_id = $1 ORDER BY a.account_number, c.creation_date, c.id"
        ))
        .bind(client_id)
        .fetch_all(pool)
        .await?;

        Ok(cards)
    }

    pub async fn count_by_account(pool: &PgPool, account_id: Uuid) -> Result<i64, sqlx::Error> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM cards WHERE account_id = $1
            "#,
        )
        .bind(account_id)
        .fetch_one(pool)
        .await?;

        Ok(count)
    }

    pub async fn set_status(pool: &PgPool, id: Uuid, status: CardStatus) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE cards
            SET status = $2
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(status)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Last four digits, the only part of the number that goes into logs
    pub fn last_four(&self) -> &str {
        mask_tail(&self.card_number)
    }

    pub fn to_view(&self) -> CardView {
        CardView {
            id: self.id,
            card_number: self.card_number.clone(),
            cvv: self.cvv.clone(),
            issuer: self.issuer,
            card_type: self.card_type,
            name: self.name.clone(),
            account_number: self.account_number.clone(),
            status: self.status,
            card_limit: self.card_limit,
            creation_date: self.creation_date,
            expiration_date: self.expiration_date,
        }
    }

    pub fn with_owner(&self, owner: ClientContact) -> CardWithOwner {
        CardWithOwner {
            card: self.to_view(),
            owner,
        }
    }
}

pub(crate) fn mask_tail(card_number: &str) -> &str {
    let start = card_number.len().saturating_sub(4);
    card_number.get(start..).unwrap_or(card_number)
}
