//! # atlas-types
//!
//! Shared domain types used across the Atlas workspace: partner agreements,
//! period financials and the calculation breakdown handed to statement
//! rendering. Every type is serde-serializable and exportable as TypeScript
//! for the admin UI.

pub mod agreement;
pub mod financials;
pub mod statement;

/// Database identifier of a partner.
pub type PartnerId = i64;

/// Database identifier of an agreement.
pub type AgreementId = i64;

/// Seconds per day, used for fee due offsets.
pub const SECONDS_PER_DAY: u64 = 86_400;

/// Percentages are expressed out of this value.
pub const PERCENT_SCALE: u32 = 100;

/// Error returned when a textual enum value is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// Payment model name not in the supported set.
    #[error("unknown payment model: {0}")]
    UnknownPaymentModel(String),

    /// Revenue deduction category not in the supported set.
    #[error("unknown deduction category: {0}")]
    UnknownDeductionCategory(String),

    /// Tier basis metric not in the supported set.
    #[error("unknown tier basis: {0}")]
    UnknownTierBasis(String),
}
