//! Partner agreement configuration.
//!
//! An [`Agreement`] is created and edited by an operator in the admin UI and
//! is read-only input to royalty calculation. Only the fields selected by
//! [`PaymentModel`] are meaningful for a given agreement.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{AgreementId, ParseError, PartnerId};

/// How a partner is paid under an agreement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ts_rs::TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentModel {
    /// Rate depends on the revenue/volume band of the period.
    TieredRoyalty,
    /// Percentage of profit after capped marketing.
    RoyaltyProfit,
    /// Percentage of net revenue.
    RoyaltyRevenue,
    /// Fixed amount per period.
    FlatFee,
    /// Advance paid up front, recouped from revenue.
    Advance,
}

impl PaymentModel {
    /// All supported models, in declaration order.
    pub const ALL: [PaymentModel; 5] = [
        PaymentModel::TieredRoyalty,
        PaymentModel::RoyaltyProfit,
        PaymentModel::RoyaltyRevenue,
        PaymentModel::FlatFee,
        PaymentModel::Advance,
    ];

    /// Wire name, as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentModel::TieredRoyalty => "tiered_royalty",
            PaymentModel::RoyaltyProfit => "royalty_profit",
            PaymentModel::RoyaltyRevenue => "royalty_revenue",
            PaymentModel::FlatFee => "flat_fee",
            PaymentModel::Advance => "advance",
        }
    }

    /// Whether the minimum guarantee floor applies to this model.
    pub fn is_royalty(&self) -> bool {
        matches!(
            self,
            PaymentModel::TieredRoyalty | PaymentModel::RoyaltyProfit | PaymentModel::RoyaltyRevenue
        )
    }
}

impl fmt::Display for PaymentModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentModel {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PaymentModel::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| ParseError::UnknownPaymentModel(s.to_string()))
    }
}

/// Revenue deduction categories an agreement can include or exclude.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ts_rs::TS,
)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum DeductionCategory {
    Cogs,
    PlatformFees,
    Returns,
    Marketing,
}

impl DeductionCategory {
    pub const ALL: [DeductionCategory; 4] = [
        DeductionCategory::Cogs,
        DeductionCategory::PlatformFees,
        DeductionCategory::Returns,
        DeductionCategory::Marketing,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DeductionCategory::Cogs => "cogs",
            DeductionCategory::PlatformFees => "platform_fees",
            DeductionCategory::Returns => "returns",
            DeductionCategory::Marketing => "marketing",
        }
    }

    /// Whether the category is deducted when the agreement does not mention it.
    ///
    /// Returns are only deducted on explicit opt-in; direct costs and
    /// marketing are part of the standard profit pipeline.
    pub fn deducted_by_default(&self) -> bool {
        !matches!(self, DeductionCategory::Returns)
    }
}

impl FromStr for DeductionCategory {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DeductionCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| ParseError::UnknownDeductionCategory(s.to_string()))
    }
}

/// Which deductions count against gross revenue for an agreement.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ts_rs::TS)]
#[ts(export)]
pub struct RevenueDefinition {
    /// `true` = deducted, `false` = explicitly not deducted.
    #[serde(default)]
    pub deductions: BTreeMap<DeductionCategory, bool>,
}

impl RevenueDefinition {
    /// Build a definition from explicit category flags.
    pub fn from_flags<I>(flags: I) -> Self
    where
        I: IntoIterator<Item = (DeductionCategory, bool)>,
    {
        Self {
            deductions: flags.into_iter().collect(),
        }
    }

    /// Whether `category` is deducted, falling back to the category default.
    pub fn deducts(&self, category: DeductionCategory) -> bool {
        self.deductions
            .get(&category)
            .copied()
            .unwrap_or_else(|| category.deducted_by_default())
    }
}

/// Metric tier thresholds are measured against.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ts_rs::TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum TierBasis {
    #[default]
    NetRevenue,
    GrossRevenue,
    UnitsSold,
}

impl TierBasis {
    pub fn as_str(&self) -> &'static str {
        match self {
            TierBasis::NetRevenue => "net_revenue",
            TierBasis::GrossRevenue => "gross_revenue",
            TierBasis::UnitsSold => "units_sold",
        }
    }
}

impl FromStr for TierBasis {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [TierBasis::NetRevenue, TierBasis::GrossRevenue, TierBasis::UnitsSold]
            .into_iter()
            .find(|b| b.as_str() == s)
            .ok_or_else(|| ParseError::UnknownTierBasis(s.to_string()))
    }
}

/// One band of a tiered royalty schedule: `[threshold_from, threshold_to)`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ts_rs::TS)]
#[ts(export)]
pub struct RoyaltyGroup {
    pub name: String,
    /// Royalty rate in percent.
    #[ts(type = "string")]
    pub rate: Decimal,
    #[ts(type = "string")]
    pub threshold_from: Decimal,
    /// Exclusive upper bound. `None` = up to the next group, or unbounded
    /// for the last group.
    #[ts(type = "string | null")]
    pub threshold_to: Option<Decimal>,
}

/// Contractual configuration of a partner agreement.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ts_rs::TS)]
#[ts(export)]
pub struct Agreement {
    pub id: AgreementId,
    pub partner_id: PartnerId,
    pub name: String,
    pub payment_model: PaymentModel,
    /// Used by `royalty_profit` and `royalty_revenue`.
    #[ts(type = "string | null")]
    pub royalty_rate_percent: Option<Decimal>,
    /// Used by `flat_fee`.
    #[ts(type = "string | null")]
    pub flat_fee_amount: Option<Decimal>,
    /// Used by `advance`.
    #[ts(type = "string | null")]
    pub advance_amount: Option<Decimal>,
    #[ts(type = "string | null")]
    pub advance_recoupment_rate_percent: Option<Decimal>,
    /// In [0, 100]. Ignored for `tiered_royalty`.
    #[ts(type = "string | null")]
    pub marketing_attribution_cap_percent: Option<Decimal>,
    #[ts(type = "string | null")]
    pub initiation_fee: Option<Decimal>,
    pub initiation_fee_due_days: Option<u32>,
    #[ts(type = "string | null")]
    pub minimum_guarantee_amount: Option<Decimal>,
    /// First month (1-indexed from `effective_at`) the guarantee applies.
    pub minimum_guarantee_start_month: Option<u32>,
    /// Ascending, non-overlapping. Only used by `tiered_royalty`.
    #[serde(default)]
    pub royalty_groups: Vec<RoyaltyGroup>,
    #[serde(default)]
    pub tier_basis: TierBasis,
    #[serde(default)]
    pub revenue_definition: RevenueDefinition,
    /// Unix seconds.
    pub effective_at: u64,
}

impl Agreement {
    /// A blank agreement for `model` with every optional term unset.
    pub fn new(id: AgreementId, partner_id: PartnerId, name: &str, model: PaymentModel) -> Self {
        Self {
            id,
            partner_id,
            name: name.to_string(),
            payment_model: model,
            royalty_rate_percent: None,
            flat_fee_amount: None,
            advance_amount: None,
            advance_recoupment_rate_percent: None,
            marketing_attribution_cap_percent: None,
            initiation_fee: None,
            initiation_fee_due_days: None,
            minimum_guarantee_amount: None,
            minimum_guarantee_start_month: None,
            royalty_groups: Vec::new(),
            tier_basis: TierBasis::default(),
            revenue_definition: RevenueDefinition::default(),
            effective_at: 0,
        }
    }
}
