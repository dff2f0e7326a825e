use rust_decimal::Decimal;

use crate::models::OwnershipType;

pub const ORGANIZATIONAL_MAX_CARDS: i64 = 1;
pub const PERSONAL_MAX_CARDS: i64 = 3;

pub fn max_cards(ownership: OwnershipType) -> i64 {
    match ownership {
        OwnershipType::Organizational => ORGANIZATIONAL_MAX_CARDS,
        OwnershipType::Personal => PERSONAL_MAX_CARDS,
    }
}

/// Whether an account holding `current_card_count` cards may receive another
pub fn may_issue(ownership: OwnershipType, current_card_count: i64) -> bool {
    current_card_count < max_cards(ownership)
}

/// An absent spending limit is allowed; a present one must be positive
pub fn is_valid_spending_limit(limit: Option<Decimal>) -> bool {
    limit.map_or(true, |l| l > Decimal::ZERO)
}
