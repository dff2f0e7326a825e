//! Persistence seams used by the issuance workflow.
//!
//! `PgStore` is the production implementation; `MemoryStore` backs tests
//! and local runs without a database.

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{Account, Card, CardRequest, CardStatus, NewCard, NewCardRequest};

pub use crate::models::ApprovalOutcome;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Card number is already issued")]
    DuplicateCardNumber,

    #[error("Account {0} does not exist")]
    UnknownAccount(Uuid),
}

/// Read access to accounts owned by account management
#[async_trait]
pub trait AccountDirectory: Send + Sync {
    async fn find_by_account_number(&self, account_number: &str)
        -> Result<Option<Account>, StoreError>;

    async fn find_by_account_number_and_client(
        &self,
        account_number: &str,
        client_id: i64,
    ) -> Result<Option<Account>, StoreError>;

    /// Counts persisted cards only; pending requests are not included
    async fn count_cards_for_account(&self, account: &Account) -> Result<i64, StoreError>;
}

#[async_trait]
pub trait CardStore: Send + Sync {
    /// Inserts the card while its account holds fewer than `max_cards`.
    /// The count and the insert are atomic; `None` means the ceiling was hit.
    async fn insert_card(&self, card: NewCard, max_cards: i64) -> Result<Option<Card>, StoreError>;

    async fn card_number_exists(&self, card_number: &str) -> Result<bool, StoreError>;

    async fn find_card_by_number(&self, card_number: &str) -> Result<Option<Card>, StoreError>;

    async fn update_card_status(&self, card_id: Uuid, status: CardStatus) -> Result<(), StoreError>;

    async fn list_cards_by_account_number(&self, account_number: &str)
        -> Result<Vec<Card>, StoreError>;

    async fn list_cards_by_client(&self, client_id: i64) -> Result<Vec<Card>, StoreError>;

    async fn insert_request(&self, request: NewCardRequest) -> Result<CardRequest, StoreError>;

    async fn find_request(&self, id: Uuid) -> Result<Option<CardRequest>, StoreError>;

    /// Moves a pending request to APPROVED and persists its card as one unit,
    /// re-counting the account's cards against `max_cards` inside that unit.
    /// Nothing is written unless the outcome is `Approved`.
    async fn approve_request(
        &self,
        id: Uuid,
        card: NewCard,
        max_cards: i64,
    ) -> Result<ApprovalOutcome, StoreError>;

    /// `None` means the request was no longer pending
    async fn reject_request(&self, id: Uuid) -> Result<Option<CardRequest>, StoreError>;
}
