//! Calculation breakdown and persisted statement records.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::agreement::PaymentModel;
use crate::AgreementId;

/// Full audit breakdown of one agreement for one period.
///
/// Every intermediate is populated, including for models that do not use
/// it, so partner statements can always show the complete derivation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ts_rs::TS)]
#[ts(export)]
pub struct CalculationResult {
    pub payment_model: PaymentModel,
    #[ts(type = "string")]
    pub net_revenue: Decimal,
    /// COGS plus platform fees.
    #[ts(type = "string")]
    pub direct_costs: Decimal,
    #[ts(type = "string")]
    pub profit_before_marketing: Decimal,
    #[ts(type = "string")]
    pub marketing_cap: Decimal,
    #[ts(type = "string")]
    pub attributed_marketing: Decimal,
    /// Absorbed by the paying party, never charged to the shared pool.
    #[ts(type = "string")]
    pub unattributed_marketing: Decimal,
    #[ts(type = "string")]
    pub final_profit: Decimal,
    #[ts(type = "string")]
    pub raw_payment: Decimal,
    pub applied_tier_name: Option<String>,
    pub guaranteed_floor_applied: bool,
    #[ts(type = "string")]
    pub final_payment: Decimal,
    /// Billed separately; not part of `final_payment`.
    #[ts(type = "string")]
    pub initiation_fee_due: Decimal,
    /// Advance recouped this period. Zero for other models.
    #[ts(type = "string")]
    pub advance_recouped: Decimal,
}

impl CalculationResult {
    /// Copy with every amount rounded half away from zero to `dp` places.
    pub fn rounded(&self, dp: u32) -> Self {
        let r = |d: Decimal| {
            d.round_dp_with_strategy(dp, rust_decimal::RoundingStrategy::MidpointAwayFromZero)
        };
        Self {
            payment_model: self.payment_model,
            net_revenue: r(self.net_revenue),
            direct_costs: r(self.direct_costs),
            profit_before_marketing: r(self.profit_before_marketing),
            marketing_cap: r(self.marketing_cap),
            attributed_marketing: r(self.attributed_marketing),
            unattributed_marketing: r(self.unattributed_marketing),
            final_profit: r(self.final_profit),
            raw_payment: r(self.raw_payment),
            applied_tier_name: self.applied_tier_name.clone(),
            guaranteed_floor_applied: self.guaranteed_floor_applied,
            final_payment: r(self.final_payment),
            initiation_fee_due: r(self.initiation_fee_due),
            advance_recouped: r(self.advance_recouped),
        }
    }
}

/// Outcome of a statement run for one agreement.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ts_rs::TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum StatementStatus {
    Computed,
    Failed,
}

impl StatementStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatementStatus::Computed => "computed",
            StatementStatus::Failed => "failed",
        }
    }
}

/// A stored statement: the result of one agreement in one period.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ts_rs::TS)]
#[ts(export)]
pub struct StatementRecord {
    pub agreement_id: AgreementId,
    /// Reporting period label, e.g. `2026-09`.
    pub period: String,
    pub status: StatementStatus,
    /// Present when `status = computed`.
    pub result: Option<CalculationResult>,
    /// Present when `status = failed`.
    pub error: Option<String>,
    /// Unix seconds.
    pub created_at: u64,
}
