//! Payment model evaluation.
//!
//! One branch per [`PaymentModel`]:
//!
//! | Model             | Raw payment                                              |
//! |-------------------|----------------------------------------------------------|
//! | `royalty_profit`  | `final_profit * rate / 100`                              |
//! | `royalty_revenue` | `net_revenue * rate / 100`                               |
//! | `flat_fee`        | `flat_fee_amount`                                        |
//! | `advance`         | `min(net_revenue * recoupment_rate / 100, balance)`      |
//! | `tiered_royalty`  | `net_revenue * tier_rate / 100`, tier chosen on basis    |
//!
//! A term the selected model needs but the agreement lacks is an error,
//! never an implicit zero.

use atlas_types::agreement::{Agreement, PaymentModel};
use rust_decimal::Decimal;

use crate::tiers::resolve_tier;
use crate::{check_percent, percent_of, Result, RoyaltyError};

/// Period values the evaluator reads, already resolved by the pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EvaluationInput {
    pub net_revenue: Decimal,
    pub final_profit: Decimal,
    /// Value compared against royalty group thresholds. Resolved only for
    /// `tiered_royalty`.
    pub tier_basis_value: Option<Decimal>,
    /// Advance still to recoup, tracked by the caller across periods.
    pub remaining_advance_balance: Option<Decimal>,
}

/// Result of evaluating the payment model.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelPayment {
    pub raw_payment: Decimal,
    /// Set only for `tiered_royalty`.
    pub applied_tier_name: Option<String>,
    /// Set only for `advance`.
    pub advance_recouped: Decimal,
}

impl ModelPayment {
    fn plain(raw_payment: Decimal) -> Self {
        Self {
            raw_payment,
            applied_tier_name: None,
            advance_recouped: Decimal::ZERO,
        }
    }
}

/// Compute the raw payment for the agreement's payment model.
///
/// # Errors
///
/// - [`RoyaltyError::InvalidAgreementConfiguration`] if a term the model
///   needs is missing, negative or out of range, or tiers are malformed
/// - [`RoyaltyError::InvalidInput`] if the advance balance is missing,
///   negative or larger than the advance
/// - [`RoyaltyError::Overflow`] on arithmetic overflow
pub fn evaluate(agreement: &Agreement, input: &EvaluationInput) -> Result<ModelPayment> {
    match agreement.payment_model {
        PaymentModel::RoyaltyProfit => {
            let rate = required_rate(agreement.royalty_rate_percent, "royalty_rate_percent")?;
            Ok(ModelPayment::plain(percent_of(input.final_profit, rate)?))
        }
        PaymentModel::RoyaltyRevenue => {
            let rate = required_rate(agreement.royalty_rate_percent, "royalty_rate_percent")?;
            Ok(ModelPayment::plain(percent_of(input.net_revenue, rate)?))
        }
        PaymentModel::FlatFee => {
            let fee = required_amount(agreement.flat_fee_amount, "flat_fee_amount")?;
            Ok(ModelPayment::plain(fee))
        }
        PaymentModel::Advance => evaluate_advance(agreement, input),
        PaymentModel::TieredRoyalty => {
            let basis = input.tier_basis_value.ok_or_else(|| {
                RoyaltyError::InvalidInput("tier basis value required for tiered royalty".to_string())
            })?;
            let tier = resolve_tier(&agreement.royalty_groups, basis)?;
            let raw_payment = percent_of(input.net_revenue, tier.rate)?;
            Ok(ModelPayment {
                raw_payment,
                applied_tier_name: Some(tier.tier_name),
                advance_recouped: Decimal::ZERO,
            })
        }
    }
}

fn evaluate_advance(agreement: &Agreement, input: &EvaluationInput) -> Result<ModelPayment> {
    let advance = required_amount(agreement.advance_amount, "advance_amount")?;
    let rate = required_rate(
        agreement.advance_recoupment_rate_percent,
        "advance_recoupment_rate_percent",
    )?;
    let balance = input.remaining_advance_balance.ok_or_else(|| {
        RoyaltyError::InvalidInput("remaining advance balance required".to_string())
    })?;
    if balance < Decimal::ZERO {
        return Err(RoyaltyError::InvalidInput(format!(
            "remaining advance balance is negative: {balance}"
        )));
    }
    if balance > advance {
        return Err(RoyaltyError::InvalidInput(format!(
            "remaining advance balance {balance} exceeds advance {advance}"
        )));
    }

    let recoupable = percent_of(input.net_revenue, rate)?.min(balance);
    Ok(ModelPayment {
        raw_payment: recoupable,
        applied_tier_name: None,
        advance_recouped: recoupable,
    })
}

fn required_amount(value: Option<Decimal>, field: &str) -> Result<Decimal> {
    let value = value.ok_or_else(|| {
        RoyaltyError::InvalidAgreementConfiguration(format!("{field} is required"))
    })?;
    if value < Decimal::ZERO {
        return Err(RoyaltyError::InvalidAgreementConfiguration(format!(
            "{field} must be non-negative, got {value}"
        )));
    }
    Ok(value)
}

fn required_rate(value: Option<Decimal>, field: &str) -> Result<Decimal> {
    let value = value.ok_or_else(|| {
        RoyaltyError::InvalidAgreementConfiguration(format!("{field} is required"))
    })?;
    check_percent(value, field)
}
