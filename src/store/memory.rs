use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{AccountDirectory, ApprovalOutcome, CardStore, StoreError};
use crate::models::{
    Account, Card, CardRequest, CardStatus, NewCard, NewCardRequest, RequestStatus,
};

#[derive(Default)]
struct MemoryState {
    accounts: Vec<Account>,
    cards: Vec<Card>,
    requests: HashMap<Uuid, CardRequest>,
}

/// Process-local store. A single lock guards every table so approval is
/// as atomic as the Postgres transaction.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_account(&self, account: Account) {
        self.state.write().await.accounts.push(account);
    }

    pub async fn cards(&self) -> Vec<Card> {
        self.state.read().await.cards.clone()
    }

    /// Hands an account over to another client, as account management would
    pub async fn transfer_account(&self, account_number: &str, client_id: i64) {
        let mut state = self.state.write().await;
        if let Some(account) = state
            .accounts
            .iter_mut()
            .find(|a| a.account_number == account_number)
        {
            account.client_id = client_id;
        }
    }
}

impl MemoryState {
    fn build_card(&self, data: NewCard) -> Result<Card, StoreError> {
        if self.cards.iter().any(|c| c.card_number == data.card_number) {
            return Err(StoreError::DuplicateCardNumber);
        }

        let account = self
            .accounts
            .iter()
            .find(|a| a.id == data.account_id)
            .ok_or(StoreError::UnknownAccount(data.account_id))?;

        Ok(Card {
            id: Uuid::new_v4(),
            card_number: data.card_number,
            cvv: data.cvv,
            issuer: data.issuer,
            card_type: data.card_type,
            name: data.name,
            account_id: account.id,
            account_number: account.account_number.clone(),
            client_id: account.client_id,
            status: data.status,
            card_limit: data.card_limit,
            creation_date: data.creation_date,
            expiration_date: data.expiration_date,
        })
    }

    fn card_count(&self, account_id: Uuid) -> i64 {
        self.cards.iter().filter(|c| c.account_id == account_id).count() as i64
    }

    fn decide(&mut self, id: Uuid, status: RequestStatus) -> Option<CardRequest> {
        let request = self.requests.get_mut(&id).filter(|r| r.is_pending())?;
        request.status = status;
        request.decided_at = Some(Utc::now());
        Some(request.clone())
    }
}

#[async_trait]
impl AccountDirectory for MemoryStore {
    async fn find_by_account_number(
        &self,
        account_number: &str,
    ) -> Result<Option<Account>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .accounts
            .iter()
            .find(|a| a.account_number == account_number)
            .cloned())
    }

    async fn find_by_account_number_and_client(
        &self,
        account_number: &str,
        client_id: i64,
    ) -> Result<Option<Account>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .accounts
            .iter()
            .find(|a| a.account_number == account_number && a.client_id == client_id)
            .cloned())
    }

    async fn count_cards_for_account(&self, account: &Account) -> Result<i64, StoreError> {
        let state = self.state.read().await;
        Ok(state.card_count(account.id))
    }
}

#[async_trait]
impl CardStore for MemoryStore {
    async fn insert_card(&self, data: NewCard, max_cards: i64) -> Result<Option<Card>, StoreError> {
        let mut state = self.state.write().await;
        if state.card_count(data.account_id) >= max_cards {
            return Ok(None);
        }

        let card = state.build_card(data)?;
        state.cards.push(card.clone());
        Ok(Some(card))
    }

    async fn card_number_exists(&self, card_number: &str) -> Result<bool, StoreError> {
        let state = self.state.read().await;
        Ok(state.cards.iter().any(|c| c.card_number == card_number))
    }

    async fn find_card_by_number(&self, card_number: &str) -> Result<Option<Card>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .cards
            .iter()
            .find(|c| c.card_number == card_number)
            .cloned())
    }

    async fn update_card_status(&self, card_id: Uuid, status: CardStatus) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        if let Some(card) = state.cards.iter_mut().find(|c| c.id == card_id) {
            card.status = status;
        }
        Ok(())
    }

    async fn list_cards_by_account_number(
        &self,
        account_number: &str,
    ) -> Result<Vec<Card>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .cards
            .iter()
            .filter(|c| c.account_number == account_number)
            .cloned()
            .collect())
    }

    async fn list_cards_by_client(&self, client_id: i64) -> Result<Vec<Card>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .cards
            .iter()
            .filter(|c| c.client_id == client_id)
            .cloned()
            .collect())
    }

    async fn insert_request(&self, data: NewCardRequest) -> Result<CardRequest, StoreError> {
        let request = CardRequest {
            id: Uuid::new_v4(),
            client_id: data.client_id,
            account_number: data.account_number,
            card_type: data.card_type,
            card_issuer: data.card_issuer,
            name: data.name,
            card_limit: data.card_limit,
            status: RequestStatus::Pending,
            created_at: Utc::now(),
            decided_at: None,
        };

        self.state
            .write()
            .await
            .requests
            .insert(request.id, request.clone());

        Ok(request)
    }

    async fn find_request(&self, id: Uuid) -> Result<Option<CardRequest>, StoreError> {
        Ok(self.state.read().await.requests.get(&id).cloned())
    }

    async fn approve_request(
        &self,
        id: Uuid,
        data: NewCard,
        max_cards: i64,
    ) -> Result<ApprovalOutcome, StoreError> {
        let mut state = self.state.write().await;

        if !state.requests.get(&id).is_some_and(|r| r.is_pending()) {
            return Ok(ApprovalOutcome::NotPending);
        }
        // Recounted under the write lock; earlier reads may be stale
        if state.card_count(data.account_id) >= max_cards {
            return Ok(ApprovalOutcome::LimitReached);
        }

        // Build the card first so a failure leaves the request pending
        let card = state.build_card(data)?;
        state.decide(id, RequestStatus::Approved);
        state.cards.push(card.clone());

        Ok(ApprovalOutcome::Approved(card))
    }

    async fn reject_request(&self, id: Uuid) -> Result<Option<CardRequest>, StoreError> {
        Ok(self.state.write().await.decide(id, RequestStatus::Rejected))
    }
}
