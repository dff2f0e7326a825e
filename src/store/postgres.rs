use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::{AccountDirectory, ApprovalOutcome, CardStore, StoreError};
use crate::models::{Account, Card, CardRequest, CardStatus, NewCard, NewCardRequest};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn map_insert_error(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            return StoreError::DuplicateCardNumber;
        }
    }
    StoreError::Database(err)
}

#[async_trait]
impl AccountDirectory for PgStore {
    async fn find_by_account_number(
        &self,
        account_number: &str,
    ) -> Result<Option<Account>, StoreError> {
        Ok(Account::find_by_account_number(&self.pool, account_number).await?)
    }

    async fn find_by_account_number_and_client(
        &self,
        account_number: &str,
        client_id: i64,
    ) -> Result<Option<Account>, StoreError> {
        Ok(Account::find_by_account_number_and_client(&self.pool, account_number, client_id).await?)
    }

    async fn count_cards_for_account(&self, account: &Account) -> Result<i64, StoreError> {
        Ok(Card::count_by_account(&self.pool, account.id).await?)
    }
}

#[async_trait]
impl CardStore for PgStore {
    async fn insert_card(&self, card: NewCard, max_cards: i64) -> Result<Option<Card>, StoreError> {
        let mut tx = self.pool.begin().await?;

        let created = Card::create_within_limit(&mut *tx, card, max_cards)
            .await
            .map_err(map_insert_error)?;

        tx.commit().await?;
        Ok(created)
    }

    async fn card_number_exists(&self, card_number: &str) -> Result<bool, StoreError> {
        Ok(Card::exists_by_card_number(&self.pool, card_number).await?)
    }

    async fn find_card_by_number(&self, card_number: &str) -> Result<Option<Card>, StoreError> {
        Ok(Card::find_by_card_number(&self.pool, card_number).await?)
    }

    async fn update_card_status(&self, card_id: Uuid, status: CardStatus) -> Result<(), StoreError> {
        Ok(Card::set_status(&self.pool, card_id, status).await?)
    }

    async fn list_cards_by_account_number(
        &self,
        account_number: &str,
    ) -> Result<Vec<Card>, StoreError> {
        Ok(Card::list_by_account_number(&self.pool, account_number).await?)
    }

    async fn list_cards_by_client(&self, client_id: i64) -> Result<Vec<Card>, StoreError> {
        Ok(Card::list_by_client(&self.pool, client_id).await?)
    }

    async fn insert_request(&self, request: NewCardRequest) -> Result<CardRequest, StoreError> {
        Ok(CardRequest::create(&self.pool, request).await?)
    }

    async fn find_request(&self, id: Uuid) -> Result<Option<CardRequest>, StoreError> {
        Ok(CardRequest::find_by_id(&self.pool, id).await?)
    }

    async fn approve_request(
        &self,
        id: Uuid,
        card: NewCard,
        max_cards: i64,
    ) -> Result<ApprovalOutcome, StoreError> {
        CardRequest::approve_with_card(&self.pool, id, card, max_cards)
            .await
            .map_err(map_insert_error)
    }

    async fn reject_request(&self, id: Uuid) -> Result<Option<CardRequest>, StoreError> {
        Ok(CardRequest::mark_rejected(&self.pool, id).await?)
    }
}
