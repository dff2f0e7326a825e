//! Card number and security code generation.
//!
//! A number is the 6-digit issuer prefix for the brand, 9 random digits
//! and a trailing mod-10 check digit computed over the first 15.

use std::sync::Arc;

use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::models::CardBrand;

pub const CARD_NUMBER_LEN: usize = 16;

const VISA_PREFIX: &str = "433333";
const DINA_PREFIX: &str = "989133";
const AMEX_PREFIXES: [&str; 2] = ["343333", "373333"];

/// Builds a fresh random source for one generation call
pub type RngFactory = Arc<dyn Fn() -> StdRng + Send + Sync>;

pub fn entropy_rng_factory() -> RngFactory {
    Arc::new(StdRng::from_entropy)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardMaterial {
    pub card_number: String,
    pub cvv: String,
}

pub fn generate<R: Rng + ?Sized>(brand: CardBrand, rng: &mut R) -> CardMaterial {
    let first_fifteen = format!("{}{}", issuer_prefix(brand, rng), account_segment(rng));
    let check = checksum(first_fifteen.chars().filter_map(|c| c.to_digit(10)));

    CardMaterial {
        card_number: format!("{first_fifteen}{check}"),
        cvv: generate_cvv(rng),
    }
}

/// Industry identifier and issuer digits for the brand
pub fn issuer_prefix<R: Rng + ?Sized>(brand: CardBrand, rng: &mut R) -> String {
    match brand {
        CardBrand::Visa => VISA_PREFIX.to_string(),
        CardBrand::Mastercard => {
            // 51-55 series or the 2221-2720 series
            if rng.gen_bool(0.5) {
                format!("{}3333", rng.gen_range(51..=55))
            } else {
                format!("{}33", rng.gen_range(2221..=2720))
            }
        }
        CardBrand::Dina => DINA_PREFIX.to_string(),
        CardBrand::AmericanExpress => AMEX_PREFIXES[usize::from(rng.gen_bool(0.5))].to_string(),
    }
}

fn account_segment<R: Rng + ?Sized>(rng: &mut R) -> String {
    format!("{:09}", rng.gen_range(0..1_000_000_000u32))
}

pub fn generate_cvv<R: Rng + ?Sized>(rng: &mut R) -> String {
    rng.gen_range(100..=999u16).to_string()
}

/// Check digit for a digit-only payload, or `None` if it contains anything else
pub fn luhn_digit(payload: &str) -> Option<u32> {
    let digits = payload
        .chars()
        .map(|c| c.to_digit(10))
        .collect::<Option<Vec<_>>>()?;

    Some(checksum(digits.into_iter()))
}

pub fn is_valid_card_number(card_number: &str) -> bool {
    if card_number.len() != CARD_NUMBER_LEN || !card_number.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }

    let (payload, check) = card_number.split_at(CARD_NUMBER_LEN - 1);
    match (luhn_digit(payload), check.chars().next().and_then(|c| c.to_digit(10))) {
        (Some(expected), Some(actual)) => expected == actual,
        _ => false,
    }
}

// Rightmost payload digit is doubled first
fn checksum<I>(digits: I) -> u32
where
    I: DoubleEndedIterator<Item = u32>,
{
    let sum: u32 = digits
        .rev()
        .enumerate()
        .map(|(i, digit)| {
            if i % 2 == 0 {
                let doubled = digit * 2;
                if doubled > 9 {
                    doubled - 9
                } else {
                    doubled
                }
            } else {
                digit
            }
        })
        .sum();

    (10 - (sum % 10)) % 10
}
