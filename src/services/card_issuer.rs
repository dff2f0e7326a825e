use std::sync::Arc;

use chrono::{Months, NaiveDate, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::models::{
    card::mask_tail, Account, Card, CardBrand, CardRequest, CardStatus, CardType, CardView,
    CardWithOwner, NewCard, NewCardRequest,
};
use crate::services::{
    card_limits,
    card_number::{self, entropy_rng_factory, CardMaterial, RngFactory},
    identity::{IdentityError, IdentityResolver, Role},
    notifications::{dispatch_status_change, NotificationGateway, CARD_BLOCKED_CODE},
    user_client::{
        CardVerificationDetails, ClientDirectory, UserServiceError, VerificationRequest,
        VerificationSink,
    },
};
use crate::store::{AccountDirectory, ApprovalOutcome, CardStore, StoreError};

/// Validity of cards issued directly by an administrator
pub const DIRECT_ISSUANCE_VALIDITY: Months = Months::new(60);
/// Validity of cards issued by approving a self-service request
pub const REQUEST_ISSUANCE_VALIDITY: Months = Months::new(48);

const MAX_NUMBER_ATTEMPTS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Unauthenticated,
    Unauthorized,
    LimitExceeded,
    InvalidLimit,
    StateConflict,
    UnsupportedBrand,
    InvalidInput,
    Unavailable,
    Internal,
}

#[derive(thiserror::Error, Debug)]
pub enum CardIssuanceError {
    #[error("Account {0} not found")]
    AccountNotFound(String),

    #[error("Card {0} not found")]
    CardNotFound(String),

    #[error("Card request {0} not found")]
    RequestNotFound(Uuid),

    #[error("Unauthorized: {0}")]
    Unauthorized(&'static str),

    #[error("Card limit exceeded for account {0}")]
    LimitExceeded(String),

    #[error("Card limit must be greater than zero")]
    InvalidLimit,

    #[error("Card request {0} is no longer pending")]
    StateConflict(Uuid),

    #[error("Only pending card requests can be rejected")]
    RejectNonPending(Uuid),

    #[error("Unsupported card brand: {0}")]
    UnsupportedBrand(String),

    #[error("Unsupported card type: {0}")]
    UnsupportedCardType(String),

    #[error("Invalid credential: {0}")]
    Identity(#[from] IdentityError),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("User service error: {0}")]
    UserService(#[from] UserServiceError),

    #[error("Could not generate an unused card number")]
    CardNumberSpaceExhausted,
}

impl CardIssuanceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CardIssuanceError::AccountNotFound(_)
            | CardIssuanceError::CardNotFound(_)
            | CardIssuanceError::RequestNotFound(_)
            | CardIssuanceError::UserService(UserServiceError::ClientNotFound(_)) => {
                ErrorKind::NotFound
            }
            CardIssuanceError::Identity(_) => ErrorKind::Unauthenticated,
            CardIssuanceError::Unauthorized(_) => ErrorKind::Unauthorized,
            CardIssuanceError::LimitExceeded(_) => ErrorKind::LimitExceeded,
            CardIssuanceError::InvalidLimit => ErrorKind::InvalidLimit,
            CardIssuanceError::StateConflict(_) | CardIssuanceError::RejectNonPending(_) => {
                ErrorKind::StateConflict
            }
            CardIssuanceError::UnsupportedBrand(_) => ErrorKind::UnsupportedBrand,
            CardIssuanceError::UnsupportedCardType(_) => ErrorKind::InvalidInput,
            CardIssuanceError::UserService(_) => ErrorKind::Unavailable,
            CardIssuanceError::Store(_) | CardIssuanceError::CardNumberSpaceExhausted => {
                ErrorKind::Internal
            }
        }
    }
}

/// What the caller wants on the new card
#[derive(Debug, Clone)]
pub struct CardDetails {
    pub account_number: String,
    pub issuer: CardBrand,
    pub card_type: CardType,
    pub name: String,
    pub card_limit: Option<Decimal>,
}

/// External collaborators the workflow talks to
#[derive(Clone)]
pub struct Collaborators {
    pub cards: Arc<dyn CardStore>,
    pub accounts: Arc<dyn AccountDirectory>,
    pub identity: Arc<dyn IdentityResolver>,
    pub clients: Arc<dyn ClientDirectory>,
    pub verifications: Arc<dyn VerificationSink>,
    pub notifications: Arc<dyn NotificationGateway>,
}

/// Card issuance and the request-approval workflow.
///
/// Administrators issue cards directly. Clients submit a request that goes
/// out for verification and is later approved or rejected in a separate
/// call. The card limit is re-checked at approval, which is the
/// authoritative enforcement point.
pub struct CardIssuanceService {
    cards: Arc<dyn CardStore>,
    accounts: Arc<dyn AccountDirectory>,
    identity: Arc<dyn IdentityResolver>,
    clients: Arc<dyn ClientDirectory>,
    verifications: Arc<dyn VerificationSink>,
    notifications: Arc<dyn NotificationGateway>,
    status_topic: String,
    rng_factory: RngFactory,
}

impl CardIssuanceService {
    pub fn new(collaborators: Collaborators, status_topic: impl Into<String>) -> Self {
        Self {
            cards: collaborators.cards,
            accounts: collaborators.accounts,
            identity: collaborators.identity,
            clients: collaborators.clients,
            verifications: collaborators.verifications,
            notifications: collaborators.notifications,
            status_topic: status_topic.into(),
            rng_factory: entropy_rng_factory(),
        }
    }

    /// Replaces the random source used for card material
    pub fn with_rng_factory(mut self, rng_factory: RngFactory) -> Self {
        self.rng_factory = rng_factory;
        self
    }

    /// Admits bank employees to the administrative surface
    pub fn authorize_admin(&self, credential: &str) -> Result<(), CardIssuanceError> {
        let caller = self.identity.resolve(credential)?;

        if caller.role != Role::Admin {
            tracing::warn!(client_id = ?caller.client_id, "Non-administrator called an administrative operation");
            return Err(CardIssuanceError::Unauthorized("Administrator role required"));
        }

        Ok(())
    }

    /// Issues a card immediately (administrative path)
    #[tracing::instrument(skip(self, details), fields(account_number = %details.account_number, issuer = %details.issuer))]
    pub async fn issue_card(&self, details: CardDetails) -> Result<CardView, CardIssuanceError> {
        ensure_valid_limit(details.card_limit)?;

        let account = self
            .accounts
            .find_by_account_number(&details.account_number)
            .await?
            .ok_or_else(|| CardIssuanceError::AccountNotFound(details.account_number.clone()))?;

        self.ensure_capacity(&account).await?;

        let material = self.fresh_material(details.issuer).await?;
        let card = self
            .cards
            .insert_card(
                new_active_card(&account, &details, material, DIRECT_ISSUANCE_VALIDITY),
                card_limits::max_cards(account.ownership_type),
            )
            .await?
            .ok_or_else(|| CardIssuanceError::LimitExceeded(account.account_number.clone()))?;

        tracing::info!(
            card_id = %card.id,
            last_four = %card.last_four(),
            expires = %card.expiration_date,
            "Card issued"
        );

        Ok(card.to_view())
    }

    /// Records a self-service request and sends it out for verification.
    /// No card is created here.
    #[tracing::instrument(skip(self, credential, details), fields(account_number = %details.account_number, issuer = %details.issuer))]
    pub async fn request_card(
        &self,
        credential: &str,
        details: CardDetails,
    ) -> Result<CardRequest, CardIssuanceError> {
        let client_id = self.identity.resolve_client_id(credential)?;

        ensure_valid_limit(details.card_limit)?;

        // Scoped lookup: clients can only apply against their own accounts
        let account = self
            .accounts
            .find_by_account_number_and_client(&details.account_number, client_id)
            .await?
            .ok_or_else(|| CardIssuanceError::AccountNotFound(details.account_number.clone()))?;

        // Fail fast; approval repeats the check
        self.ensure_capacity(&account).await?;

        let request = self
            .cards
            .insert_request(NewCardRequest {
                client_id,
                account_number: account.account_number.clone(),
                card_type: details.card_type,
                card_issuer: details.issuer,
                name: details.name.clone(),
                card_limit: details.card_limit,
            })
            .await?;

        let snapshot = CardVerificationDetails {
            account_number: account.account_number.clone(),
            card_type: details.card_type,
            issuer: details.issuer,
            name: details.name,
        };
        let verification = VerificationRequest::card_request(client_id, request.id, &snapshot)
            .map_err(UserServiceError::from)?;

        if let Err(e) = self.verifications.submit(verification).await {
            tracing::error!(
                request_id = %request.id,
                error = %e,
                "Card request stored but verification submission failed"
            );
            return Err(e.into());
        }

        tracing::info!(
            client_id,
            request_id = %request.id,
            "Card request sent for verification"
        );

        Ok(request)
    }

    /// Approves a pending request and issues its card.
    ///
    /// 1. Loads the request and checks it is still pending
    /// 2. Re-resolves the account recorded on the request
    /// 3. Re-checks the card limit against persisted cards (fail fast)
    /// 4. Marks the request approved and inserts the card in one unit of work;
    ///    the store recounts inside that unit, which is the check that holds
    ///    under concurrent approvals
    #[tracing::instrument(skip(self))]
    pub async fn approve_request(&self, request_id: Uuid) -> Result<CardView, CardIssuanceError> {
        let request = self
            .cards
            .find_request(request_id)
            .await?
            .ok_or(CardIssuanceError::RequestNotFound(request_id))?;

        if !request.is_pending() {
            tracing::info!(status = ?request.status, "Card request is not pending");
            return Err(CardIssuanceError::StateConflict(request_id));
        }

        let account = self
            .accounts
            .find_by_account_number_and_client(&request.account_number, request.client_id)
            .await?
            .ok_or_else(|| CardIssuanceError::AccountNotFound(request.account_number.clone()))?;

        self.ensure_capacity(&account).await?;

        let details = CardDetails {
            account_number: request.account_number.clone(),
            issuer: request.card_issuer,
            card_type: request.card_type,
            name: request.name.clone(),
            card_limit: request.card_limit,
        };
        let material = self.fresh_material(details.issuer).await?;
        let new_card = new_active_card(&account, &details, material, REQUEST_ISSUANCE_VALIDITY);

        let max_cards = card_limits::max_cards(account.ownership_type);
        let card = match self
            .cards
            .approve_request(request_id, new_card, max_cards)
            .await?
        {
            ApprovalOutcome::Approved(card) => card,
            ApprovalOutcome::NotPending => {
                tracing::info!("Card request was decided concurrently");
                return Err(CardIssuanceError::StateConflict(request_id));
            }
            ApprovalOutcome::LimitReached => {
                tracing::info!(
                    account_number = %account.account_number,
                    max_cards,
                    "Account reached its card limit before approval committed"
                );
                return Err(CardIssuanceError::LimitExceeded(account.account_number));
            }
        };

        tracing::info!(
            client_id = request.client_id,
            card_id = %card.id,
            last_four = %card.last_four(),
            "Card created for approved request"
        );

        Ok(card.to_view())
    }

    #[tracing::instrument(skip(self))]
    pub async fn reject_request(&self, request_id: Uuid) -> Result<CardRequest, CardIssuanceError> {
        let request = self
            .cards
            .find_request(request_id)
            .await?
            .ok_or_else(|| CardIssuanceError::CardNotFound(request_id.to_string()))?;

        if !request.is_pending() {
            return Err(CardIssuanceError::RejectNonPending(request_id));
        }

        let rejected = self
            .cards
            .reject_request(request_id)
            .await?
            .ok_or(CardIssuanceError::RejectNonPending(request_id))?;

        tracing::info!(client_id = rejected.client_id, "Card request rejected");

        Ok(rejected)
    }

    /// Sets a card's status (administrative block/unblock) and notifies the owner
    #[tracing::instrument(skip(self, card_number), fields(last_four = %mask_tail(card_number)))]
    pub async fn change_status(
        &self,
        card_number: &str,
        status: CardStatus,
    ) -> Result<(), CardIssuanceError> {
        let card = self.find_card(card_number).await?;

        self.cards.update_card_status(card.id, status).await?;
        tracing::info!(card_id = %card.id, %status, "Card status changed");

        self.notify(card.client_id, status.as_str());

        Ok(())
    }

    /// Blocks one of the caller's own cards
    #[tracing::instrument(skip(self, credential, card_number), fields(last_four = %mask_tail(card_number)))]
    pub async fn block_own_card(
        &self,
        credential: &str,
        card_number: &str,
    ) -> Result<(), CardIssuanceError> {
        let client_id = self.identity.resolve_client_id(credential)?;
        let card = self.find_card(card_number).await?;

        if card.client_id != client_id {
            tracing::warn!(client_id, card_id = %card.id, "Attempt to block a card owned by another client");
            return Err(CardIssuanceError::Unauthorized("You can only block your own cards"));
        }

        self.cards
            .update_card_status(card.id, CardStatus::Blocked)
            .await?;
        tracing::info!(client_id, card_id = %card.id, "Card blocked by owner");

        self.notify(card.client_id, CARD_BLOCKED_CODE);

        Ok(())
    }

    /// All cards on an account, with the owner's contact details
    #[tracing::instrument(skip(self))]
    pub async fn cards_for_account(
        &self,
        account_number: &str,
    ) -> Result<Vec<CardWithOwner>, CardIssuanceError> {
        let cards = self.cards.list_cards_by_account_number(account_number).await?;
        self.attach_owner(cards).await
    }

    /// All cards across every account the caller owns
    #[tracing::instrument(skip(self, credential))]
    pub async fn cards_for_caller(
        &self,
        credential: &str,
    ) -> Result<Vec<CardWithOwner>, CardIssuanceError> {
        let client_id = self.identity.resolve_client_id(credential)?;
        let cards = self.cards.list_cards_by_client(client_id).await?;
        self.attach_owner(cards).await
    }

    /// Cards on one of the caller's accounts
    #[tracing::instrument(skip(self, credential))]
    pub async fn cards_for_caller_account(
        &self,
        credential: &str,
        account_number: &str,
    ) -> Result<Vec<CardWithOwner>, CardIssuanceError> {
        let client_id = self.identity.resolve_client_id(credential)?;

        self.accounts
            .find_by_account_number_and_client(account_number, client_id)
            .await?
            .ok_or_else(|| CardIssuanceError::AccountNotFound(account_number.to_string()))?;

        let cards = self.cards.list_cards_by_account_number(account_number).await?;
        self.attach_owner(cards).await
    }

    async fn ensure_capacity(&self, account: &Account) -> Result<(), CardIssuanceError> {
        let count = self.accounts.count_cards_for_account(account).await?;

        if !card_limits::may_issue(account.ownership_type, count) {
            tracing::info!(
                account_number = %account.account_number,
                ownership = ?account.ownership_type,
                count,
                "Account is at its card limit"
            );
            return Err(CardIssuanceError::LimitExceeded(account.account_number.clone()));
        }

        Ok(())
    }

    async fn find_card(&self, card_number: &str) -> Result<Card, CardIssuanceError> {
        self.cards
            .find_card_by_number(card_number)
            .await?
            .ok_or_else(|| CardIssuanceError::CardNotFound(format!("ending in {}", mask_tail(card_number))))
    }

    /// Generates material whose number is not issued yet
    async fn fresh_material(&self, issuer: CardBrand) -> Result<CardMaterial, CardIssuanceError> {
        let mut rng = (self.rng_factory)();

        for attempt in 1..=MAX_NUMBER_ATTEMPTS {
            let material = card_number::generate(issuer, &mut rng);
            if !self.cards.card_number_exists(&material.card_number).await? {
                return Ok(material);
            }
            tracing::warn!(attempt, "Generated card number is already issued, retrying");
        }

        Err(CardIssuanceError::CardNumberSpaceExhausted)
    }

    // Every card in the batch belongs to the same client
    async fn attach_owner(&self, cards: Vec<Card>) -> Result<Vec<CardWithOwner>, CardIssuanceError> {
        let Some(first) = cards.first() else {
            return Ok(Vec::new());
        };

        let owner = self.clients.client(first.client_id).await?;

        Ok(cards
            .iter()
            .map(|card| card.with_owner(owner.clone()))
            .collect())
    }

    fn notify(&self, client_id: i64, code: &str) {
        dispatch_status_change(
            self.clients.clone(),
            self.notifications.clone(),
            self.status_topic.clone(),
            client_id,
            code.to_string(),
        );
    }
}

fn ensure_valid_limit(limit: Option<Decimal>) -> Result<(), CardIssuanceError> {
    if card_limits::is_valid_spending_limit(limit) {
        Ok(())
    } else {
        Err(CardIssuanceError::InvalidLimit)
    }
}

fn expiration_after(created: NaiveDate, validity: Months) -> NaiveDate {
    created.checked_add_months(validity).unwrap_or(NaiveDate::MAX)
}

fn new_active_card(
    account: &Account,
    details: &CardDetails,
    material: CardMaterial,
    validity: Months,
) -> NewCard {
    let today = Utc::now().date_naive();

    NewCard {
        card_number: material.card_number,
        cvv: material.cvv,
        issuer: details.issuer,
        card_type: details.card_type,
        name: details.name.clone(),
        account_id: account.id,
        status: CardStatus::Active,
        card_limit: details.card_limit,
        creation_date: today,
        expiration_date: expiration_after(today, validity),
    }
}
