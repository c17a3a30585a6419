//! Tiered royalty resolution and the minimum guarantee floor.
//!
//! Royalty groups are half-open bands `[threshold_from, threshold_to)`,
//! stored in ascending order. A group without `threshold_to` extends to the
//! next group's `threshold_from`, or without bound when it is the last one.
//!
//! Groups are never sorted here: an unsorted or overlapping schedule is a
//! data-integrity problem in the stored agreement and is reported as
//! [`RoyaltyError::InvalidAgreementConfiguration`].

use atlas_types::agreement::{Agreement, RoyaltyGroup};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{check_percent, Result, RoyaltyError};

/// The group a basis value falls into.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierSelection {
    /// Royalty rate in percent.
    pub rate: Decimal,
    pub tier_name: String,
}

/// Check that groups form an ascending, non-overlapping schedule.
///
/// # Errors
///
/// - [`RoyaltyError::InvalidAgreementConfiguration`] if the list is empty,
///   unsorted, overlapping, has an empty bound or name, or a rate outside `[0, 100]`
pub fn validate_groups(groups: &[RoyaltyGroup]) -> Result<()> {
    if groups.is_empty() {
        return Err(config("tiered royalty requires at least one royalty group"));
    }

    for group in groups {
        if group.name.trim().is_empty() {
            return Err(config("royalty group name is empty"));
        }
        check_percent(group.rate, "royalty group rate")?;
        if group.threshold_from < Decimal::ZERO {
            return Err(config(&format!(
                "royalty group '{}' starts below zero",
                group.name
            )));
        }
        if let Some(to) = group.threshold_to {
            if to <= group.threshold_from {
                return Err(config(&format!(
                    "royalty group '{}' has empty range [{}, {})",
                    group.name, group.threshold_from, to
                )));
            }
        }
    }

    for pair in groups.windows(2) {
        let (lower, upper) = (&pair[0], &pair[1]);
        if upper.threshold_from <= lower.threshold_from {
            return Err(config(&format!(
                "royalty groups not in ascending order: '{}' then '{}'",
                lower.name, upper.name
            )));
        }
        if let Some(to) = lower.threshold_to {
            if to > upper.threshold_from {
                return Err(config(&format!(
                    "royalty groups '{}' and '{}' overlap",
                    lower.name, upper.name
                )));
            }
        }
    }

    Ok(())
}

/// Select the royalty group for `basis`.
///
/// Picks the last group whose `threshold_from <= basis`; a basis exactly on
/// a boundary belongs to the upper group.
///
/// # Errors
///
/// - [`RoyaltyError::InvalidAgreementConfiguration`] if the groups are invalid
///   or no group covers `basis`
/// - [`RoyaltyError::InvalidInput`] if `basis` is negative
pub fn resolve_tier(groups: &[RoyaltyGroup], basis: Decimal) -> Result<TierSelection> {
    validate_groups(groups)?;
    if basis < Decimal::ZERO {
        return Err(RoyaltyError::InvalidInput(format!(
            "tier basis must be non-negative, got {basis}"
        )));
    }

    let group = groups
        .iter()
        .rev()
        .find(|g| g.threshold_from <= basis)
        .ok_or_else(|| config(&format!("no royalty group covers {basis}")))?;

    if let Some(to) = group.threshold_to {
        if basis >= to {
            return Err(config(&format!(
                "{basis} falls in a gap after royalty group '{}'",
                group.name
            )));
        }
    }

    Ok(TierSelection {
        rate: group.rate,
        tier_name: group.name.clone(),
    })
}

/// Floor payment that replaces the computed royalty once active.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinimumGuarantee {
    pub amount: Decimal,
    /// First period month (1-indexed) the floor applies.
    pub start_month: u32,
}

impl MinimumGuarantee {
    /// Read the guarantee terms of an agreement, if any.
    ///
    /// # Errors
    ///
    /// - [`RoyaltyError::InvalidAgreementConfiguration`] if only one of amount
    ///   and start month is set, the amount is negative or the month is zero
    pub fn from_agreement(agreement: &Agreement) -> Result<Option<Self>> {
        match (
            agreement.minimum_guarantee_amount,
            agreement.minimum_guarantee_start_month,
        ) {
            (None, None) => Ok(None),
            (Some(amount), Some(start_month)) => {
                if amount < Decimal::ZERO {
                    return Err(config("minimum guarantee amount is negative"));
                }
                if start_month == 0 {
                    return Err(config("minimum guarantee start month is 1-indexed"));
                }
                Ok(Some(Self {
                    amount,
                    start_month,
                }))
            }
            (Some(_), None) => Err(config("minimum guarantee has no start month")),
            (None, Some(_)) => Err(config("minimum guarantee start month set without amount")),
        }
    }

    /// Whether the floor is in force for `period_month_index`.
    pub fn is_active(&self, period_month_index: u32) -> bool {
        period_month_index >= self.start_month
    }
}

/// Payment after the minimum guarantee has been considered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GuaranteeOutcome {
    pub payment: Decimal,
    pub floor_applied: bool,
}

/// Replace `payment` with the guarantee amount when the guarantee is active
/// and the payment falls short of it.
pub fn apply_minimum_guarantee(
    payment: Decimal,
    guarantee: Option<&MinimumGuarantee>,
    period_month_index: u32,
) -> GuaranteeOutcome {
    match guarantee {
        Some(g) if g.is_active(period_month_index) && payment < g.amount => {
            tracing::trace!(%payment, floor = %g.amount, "minimum guarantee applied");
            GuaranteeOutcome {
                payment: g.amount,
                floor_applied: true,
            }
        }
        _ => GuaranteeOutcome {
            payment,
            floor_applied: false,
        },
    }
}

fn config(msg: &str) -> RoyaltyError {
    RoyaltyError::InvalidAgreementConfiguration(msg.to_string())
}
