//! Net revenue and deduction resolution.
//!
//! Which deductions count against gross revenue is decided per agreement by
//! its [`RevenueDefinition`]. Categories the definition does not mention fall
//! back to [`DeductionCategory::deducted_by_default`]: returns are only
//! deducted on explicit opt-in, COGS, platform fees and marketing always are.

use atlas_types::agreement::{DeductionCategory, RevenueDefinition, TierBasis};
use atlas_types::financials::PeriodFinancials;
use rust_decimal::Decimal;

use crate::{Result, RoyaltyError};

/// Reject negative amounts and a zero month index.
///
/// # Errors
///
/// - [`RoyaltyError::InvalidInput`] naming the first offending field
pub fn validate_financials(financials: &PeriodFinancials) -> Result<()> {
    let amounts = [
        ("gross_revenue", financials.gross_revenue),
        ("cogs", financials.cogs),
        ("platform_fees", financials.platform_fees),
        ("returns", financials.returns),
        ("marketing_spend", financials.marketing_spend),
    ];
    for (field, value) in amounts {
        if value < Decimal::ZERO {
            return Err(RoyaltyError::InvalidInput(format!(
                "{field} must be non-negative, got {value}"
            )));
        }
    }
    if financials.period_month_index == 0 {
        return Err(RoyaltyError::InvalidInput(
            "period_month_index is 1-indexed".to_string(),
        ));
    }
    Ok(())
}

/// Resolve the period's net revenue.
///
/// Gross revenue verbatim, less returns when the definition deducts them.
///
/// # Errors
///
/// - [`RoyaltyError::InvalidInput`] if gross revenue or returns are negative
/// - [`RoyaltyError::InvalidInput`] if returns exceed gross revenue
pub fn resolve_net_revenue(
    financials: &PeriodFinancials,
    definition: &RevenueDefinition,
) -> Result<Decimal> {
    let gross = financials.gross_revenue;
    if gross < Decimal::ZERO {
        return Err(RoyaltyError::InvalidInput(format!(
            "gross_revenue must be non-negative, got {gross}"
        )));
    }
    if !definition.deducts(DeductionCategory::Returns) {
        return Ok(gross);
    }

    let returns = financials.returns;
    if returns < Decimal::ZERO {
        return Err(RoyaltyError::InvalidInput(format!(
            "returns must be non-negative, got {returns}"
        )));
    }
    let net = gross.checked_sub(returns).ok_or(RoyaltyError::Overflow)?;
    if net < Decimal::ZERO {
        return Err(RoyaltyError::InvalidInput(format!(
            "returns {returns} exceed gross revenue {gross}"
        )));
    }
    Ok(net)
}

/// COGS plus platform fees, each only if the definition deducts it.
pub fn resolve_direct_costs(
    financials: &PeriodFinancials,
    definition: &RevenueDefinition,
) -> Result<Decimal> {
    let mut costs = Decimal::ZERO;
    if definition.deducts(DeductionCategory::Cogs) {
        costs = costs
            .checked_add(financials.cogs)
            .ok_or(RoyaltyError::Overflow)?;
    }
    if definition.deducts(DeductionCategory::PlatformFees) {
        costs = costs
            .checked_add(financials.platform_fees)
            .ok_or(RoyaltyError::Overflow)?;
    }
    Ok(costs)
}

/// Value tier thresholds are compared against.
///
/// # Errors
///
/// - [`RoyaltyError::InvalidInput`] if the basis is units and the period
///   carries no unit count
pub fn resolve_tier_basis(
    basis: TierBasis,
    financials: &PeriodFinancials,
    net_revenue: Decimal,
) -> Result<Decimal> {
    match basis {
        TierBasis::NetRevenue => Ok(net_revenue),
        TierBasis::GrossRevenue => Ok(financials.gross_revenue),
        TierBasis::UnitsSold => financials.units_sold.map(Decimal::from).ok_or_else(|| {
            RoyaltyError::InvalidInput("units_sold required for unit-based tiers".to_string())
        }),
    }
}
