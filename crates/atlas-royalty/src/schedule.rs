//! Initiation fee schedule.
//!
//! The initiation fee is a one-time charge due `initiation_fee_due_days`
//! after the agreement's effective date. It is billed separately from
//! recurring royalties.

use atlas_types::agreement::Agreement;
use atlas_types::SECONDS_PER_DAY;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{Result, RoyaltyError};

/// Billing state of an agreement's initiation fee.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitiationFeeStatus {
    pub amount: Decimal,
    /// Unix seconds.
    pub due_at: u64,
    /// Not yet billed.
    pub outstanding: bool,
    /// Outstanding and past its due date.
    pub overdue: bool,
}

/// Unix timestamp at which the fee falls due.
///
/// # Errors
///
/// - [`RoyaltyError::Overflow`] if the date does not fit in a `u64`
pub fn due_at(effective_at: u64, due_days: u32) -> Result<u64> {
    u64::from(due_days)
        .checked_mul(SECONDS_PER_DAY)
        .and_then(|offset| effective_at.checked_add(offset))
        .ok_or(RoyaltyError::Overflow)
}

/// Initiation fee status of `agreement` at `now`, or `None` if it has no fee.
///
/// # Errors
///
/// - [`RoyaltyError::InvalidAgreementConfiguration`] if the fee is negative or
///   has no due offset
/// - [`RoyaltyError::Overflow`] if the due date overflows
pub fn fee_status(
    agreement: &Agreement,
    billed: bool,
    now: u64,
) -> Result<Option<InitiationFeeStatus>> {
    let Some(amount) = agreement.initiation_fee else {
        return Ok(None);
    };
    if amount < Decimal::ZERO {
        return Err(RoyaltyError::InvalidAgreementConfiguration(format!(
            "initiation_fee must be non-negative, got {amount}"
        )));
    }
    let due_days = agreement.initiation_fee_due_days.ok_or_else(|| {
        RoyaltyError::InvalidAgreementConfiguration(
            "initiation_fee_due_days is required when an initiation fee is set".to_string(),
        )
    })?;

    let due_at = due_at(agreement.effective_at, due_days)?;
    let outstanding = !billed && !amount.is_zero();
    Ok(Some(InitiationFeeStatus {
        amount,
        due_at,
        outstanding,
        overdue: outstanding && now > due_at,
    }))
}
