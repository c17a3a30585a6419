//! # atlas-royalty
//!
//! Royalty calculation for partner agreements.
//!
//! Turns an [`Agreement`](atlas_types::agreement::Agreement) and one
//! reporting period's financial facts into a payable amount, keeping every
//! intermediate value for the partner statement. All functions are pure and
//! synchronous; callers may evaluate independent agreements in parallel.
//!
//! ## Modules
//!
//! - [`revenue`] - Net revenue and deduction resolution
//! - [`marketing`] - Marketing attribution cap
//! - [`models`] - Payment model evaluation
//! - [`tiers`] - Tier selection and minimum guarantee
//! - [`engine`] - Calculation pipeline
//! - [`recoupment`] - Advance recoupment ledger
//! - [`schedule`] - Initiation fee due dates

pub mod engine;
pub mod marketing;
pub mod models;
pub mod recoupment;
pub mod revenue;
pub mod schedule;
pub mod tiers;

use atlas_types::ParseError;
use rust_decimal::Decimal;

/// Error types for royalty calculation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoyaltyError {
    /// Negative or otherwise unusable financial input.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Malformed tiers, or a field the payment model needs is missing.
    #[error("invalid agreement configuration: {0}")]
    InvalidAgreementConfiguration(String),

    /// Payment model name is not one of the supported models.
    #[error("unsupported payment model: {0}")]
    UnsupportedPaymentModel(String),

    /// Arithmetic overflow.
    #[error("arithmetic overflow in royalty calculation")]
    Overflow,
}

impl From<ParseError> for RoyaltyError {
    fn from(err: ParseError) -> Self {
        match err {
            ParseError::UnknownPaymentModel(name) => RoyaltyError::UnsupportedPaymentModel(name),
            other => RoyaltyError::InvalidAgreementConfiguration(other.to_string()),
        }
    }
}

/// Convenience result type for royalty operations.
pub type Result<T> = std::result::Result<T, RoyaltyError>;

/// `amount * percent / 100` with overflow checks.
pub(crate) fn percent_of(amount: Decimal, percent: Decimal) -> Result<Decimal> {
    amount
        .checked_mul(percent)
        .ok_or(RoyaltyError::Overflow)?
        .checked_div(Decimal::from(atlas_types::PERCENT_SCALE))
        .ok_or(RoyaltyError::Overflow)
}

/// Reject percentages outside `[0, 100]`.
pub(crate) fn check_percent(value: Decimal, field: &str) -> Result<Decimal> {
    if value < Decimal::ZERO || value > Decimal::ONE_HUNDRED {
        return Err(RoyaltyError::InvalidAgreementConfiguration(format!(
            "{field} must be within [0, 100], got {value}"
        )));
    }
    Ok(value)
}
