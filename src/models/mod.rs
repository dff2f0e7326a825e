// Models module - Database entity representations

pub mod account;
pub mod card;
pub mod card_request;

pub use account::{Account, OwnershipType};
pub use card::{Card, CardBrand, CardStatus, CardType, CardView, CardWithOwner, NewCard};
pub use card_request::{ApprovalOutcome, CardRequest, NewCardRequest, RequestStatus};
