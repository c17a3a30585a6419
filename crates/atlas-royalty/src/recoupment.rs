//! Advance recoupment ledger.
//!
//! An advance is paid to the partner up front and paid back out of later
//! revenue. The engine only computes one period's recoupable amount; the
//! running balance lives here and is persisted by the caller between
//! periods.
//!
//! ```text
//! remaining = advance_amount - recouped
//! ```

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{Result, RoyaltyError};

/// Running recoupment state of one advance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvanceLedger {
    /// Amount originally advanced.
    pub advance_amount: Decimal,
    /// Total recouped so far.
    pub recouped: Decimal,
}

impl AdvanceLedger {
    /// Open a ledger with nothing recouped yet.
    ///
    /// # Errors
    ///
    /// - [`RoyaltyError::InvalidAgreementConfiguration`] if the advance is negative
    pub fn new(advance_amount: Decimal) -> Result<Self> {
        if advance_amount < Decimal::ZERO {
            return Err(RoyaltyError::InvalidAgreementConfiguration(format!(
                "advance_amount must be non-negative, got {advance_amount}"
            )));
        }
        Ok(Self {
            advance_amount,
            recouped: Decimal::ZERO,
        })
    }

    /// Amount still to be recouped.
    pub fn remaining(&self) -> Decimal {
        (self.advance_amount - self.recouped).max(Decimal::ZERO)
    }

    /// Whether the advance has been paid back in full.
    pub fn is_recouped(&self) -> bool {
        self.remaining().is_zero()
    }

    /// Record a period's recoupment.
    ///
    /// # Errors
    ///
    /// - [`RoyaltyError::InvalidInput`] if `amount` is negative or exceeds the
    ///   remaining balance
    /// - [`RoyaltyError::Overflow`] on arithmetic overflow
    pub fn record(&mut self, amount: Decimal) -> Result<()> {
        if amount < Decimal::ZERO {
            return Err(RoyaltyError::InvalidInput(format!(
                "recoupment must be non-negative, got {amount}"
            )));
        }
        let remaining = self.remaining();
        if amount > remaining {
            return Err(RoyaltyError::InvalidInput(format!(
                "recoupment {amount} exceeds remaining balance {remaining}"
            )));
        }

        self.recouped = self
            .recouped
            .checked_add(amount)
            .ok_or(RoyaltyError::Overflow)?;

        tracing::info!(
            %amount,
            recouped = %self.recouped,
            remaining = %self.remaining(),
            "advance recoupment recorded"
        );

        Ok(())
    }
}
