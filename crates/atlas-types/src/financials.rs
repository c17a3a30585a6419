//! Reporting-period financial facts and caller-owned calculation state.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Financial snapshot for one reporting period of one agreement.
///
/// Supplied by the persistence layer; all amounts must be non-negative.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ts_rs::TS)]
#[ts(export)]
pub struct PeriodFinancials {
    #[ts(type = "string")]
    pub gross_revenue: Decimal,
    #[ts(type = "string")]
    pub cogs: Decimal,
    #[ts(type = "string")]
    pub platform_fees: Decimal,
    #[ts(type = "string")]
    pub returns: Decimal,
    #[ts(type = "string")]
    pub marketing_spend: Decimal,
    /// Only required for agreements whose tiers are measured in units.
    #[serde(default)]
    pub units_sold: Option<u64>,
    /// Months elapsed since the agreement effective date, starting at 1.
    pub period_month_index: u32,
}

/// State carried across periods that the engine reads but never owns.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ts_rs::TS)]
#[ts(export)]
pub struct CalculationContext {
    /// Advance still to recoup. Required for `advance` agreements.
    #[ts(type = "string | null")]
    pub remaining_advance_balance: Option<Decimal>,
    /// Whether the one-time initiation fee has not been billed yet.
    #[serde(default)]
    pub initiation_fee_outstanding: bool,
}
