//! Agreement calculation pipeline.
//!
//! ```text
//! validate financials
//!   -> net revenue            (revenue)
//!   -> direct costs           (revenue)
//!   -> marketing attribution  (marketing, skipped for tiered)
//!   -> profit before / after marketing
//!   -> raw payment            (models, tiers)
//!   -> minimum guarantee      (royalty models only)
//!   -> initiation fee
//! ```
//!
//! Any error aborts the whole calculation. A malformed agreement never
//! produces a partial or zero result.

use atlas_types::agreement::{Agreement, DeductionCategory, PaymentModel};
use atlas_types::financials::{CalculationContext, PeriodFinancials};
use atlas_types::statement::CalculationResult;
use atlas_types::AgreementId;
use rust_decimal::Decimal;

use crate::marketing::{cap_marketing, MarketingAttribution};
use crate::models::{evaluate, EvaluationInput};
use crate::revenue::{
    resolve_direct_costs, resolve_net_revenue, resolve_tier_basis, validate_financials,
};
use crate::tiers::{apply_minimum_guarantee, MinimumGuarantee};
use crate::{Result, RoyaltyError};

/// Compute what the partner is owed for one period.
///
/// # Errors
///
/// Propagates every component error unchanged; see [`RoyaltyError`].
pub fn calculate(
    agreement: &Agreement,
    financials: &PeriodFinancials,
    context: &CalculationContext,
) -> Result<CalculationResult> {
    validate_financials(financials)?;
    let guarantee = MinimumGuarantee::from_agreement(agreement)?;
    let definition = &agreement.revenue_definition;

    let net_revenue = resolve_net_revenue(financials, definition)?;
    let direct_costs = resolve_direct_costs(financials, definition)?;
    let marketing = attribute_marketing(agreement, net_revenue, financials.marketing_spend)?;

    let profit_before_marketing = net_revenue
        .checked_sub(direct_costs)
        .ok_or(RoyaltyError::Overflow)?;
    let final_profit = profit_before_marketing
        .checked_sub(marketing.attributed)
        .ok_or(RoyaltyError::Overflow)?;

    let tier_basis_value = match agreement.payment_model {
        PaymentModel::TieredRoyalty => Some(resolve_tier_basis(
            agreement.tier_basis,
            financials,
            net_revenue,
        )?),
        _ => None,
    };
    let payment = evaluate(
        agreement,
        &EvaluationInput {
            net_revenue,
            final_profit,
            tier_basis_value,
            remaining_advance_balance: context.remaining_advance_balance,
        },
    )?;

    let (guaranteed, guaranteed_floor_applied) = if agreement.payment_model.is_royalty() {
        let outcome = apply_minimum_guarantee(
            payment.raw_payment,
            guarantee.as_ref(),
            financials.period_month_index,
        );
        (outcome.payment, outcome.floor_applied)
    } else {
        (payment.raw_payment, false)
    };
    // Loss periods on profit share pay nothing rather than a negative amount.
    let final_payment = guaranteed.max(Decimal::ZERO);

    let initiation_fee_due = initiation_fee_due(agreement, context)?;

    tracing::debug!(
        agreement_id = agreement.id,
        model = %agreement.payment_model,
        %net_revenue,
        %final_profit,
        %final_payment,
        floor = guaranteed_floor_applied,
        "royalty calculated"
    );

    Ok(CalculationResult {
        payment_model: agreement.payment_model,
        net_revenue,
        direct_costs,
        profit_before_marketing,
        marketing_cap: marketing.cap,
        attributed_marketing: marketing.attributed,
        unattributed_marketing: marketing.unattributed,
        final_profit,
        raw_payment: payment.raw_payment,
        applied_tier_name: payment.applied_tier_name,
        guaranteed_floor_applied,
        final_payment,
        initiation_fee_due,
        advance_recouped: payment.advance_recouped,
    })
}

/// Run [`calculate`] for many agreements, one result per agreement.
///
/// A failing agreement does not affect the others.
pub fn calculate_batch<'a, I>(items: I) -> Vec<(AgreementId, Result<CalculationResult>)>
where
    I: IntoIterator<Item = (&'a Agreement, &'a PeriodFinancials, &'a CalculationContext)>,
{
    items
        .into_iter()
        .map(|(agreement, financials, context)| {
            let result = calculate(agreement, financials, context);
            if let Err(e) = &result {
                tracing::warn!(agreement_id = agreement.id, error = %e, "royalty calculation failed");
            }
            (agreement.id, result)
        })
        .collect()
}

fn attribute_marketing(
    agreement: &Agreement,
    net_revenue: Decimal,
    marketing_spend: Decimal,
) -> Result<MarketingAttribution> {
    if agreement.payment_model == PaymentModel::TieredRoyalty
        || !agreement
            .revenue_definition
            .deducts(DeductionCategory::Marketing)
    {
        return Ok(MarketingAttribution::skipped(marketing_spend));
    }

    match agreement.marketing_attribution_cap_percent {
        Some(cap) => cap_marketing(net_revenue, marketing_spend, cap),
        None if agreement.payment_model == PaymentModel::RoyaltyProfit => {
            Err(RoyaltyError::InvalidAgreementConfiguration(
                "marketing_attribution_cap_percent is required for royalty_profit".to_string(),
            ))
        }
        None => Ok(MarketingAttribution::skipped(marketing_spend)),
    }
}

fn initiation_fee_due(agreement: &Agreement, context: &CalculationContext) -> Result<Decimal> {
    match agreement.initiation_fee {
        Some(fee) if fee < Decimal::ZERO => Err(RoyaltyError::InvalidAgreementConfiguration(
            format!("initiation_fee must be non-negative, got {fee}"),
        )),
        Some(fee) if context.initiation_fee_outstanding => Ok(fee),
        _ => Ok(Decimal::ZERO),
    }
}

#[cfg(test)]
mod tests {
    use atlas_types::agreement::{RevenueDefinition, RoyaltyGroup, TierBasis};
    use rust_decimal_macros::dec;

    use super::*;

    fn scenario_financials() -> PeriodFinancials {
        PeriodFinancials {
            gross_revenue: dec!(40000),
            cogs: dec!(20000),
            platform_fees: dec!(1600),
            returns: dec!(0),
            marketing_spend: dec!(8000),
            units_sold: None,
            period_month_index: 1,
        }
    }

    fn profit_share() -> Agreement {
        let mut a = Agreement::new(1, 10, "Studio profit share", PaymentModel::RoyaltyProfit);
        a.royalty_rate_percent = Some(dec!(50));
        a.marketing_attribution_cap_percent = Some(dec!(25));
        a
    }

    fn tiered(month: u32, basis: Decimal) -> (Agreement, PeriodFinancials) {
        let mut a = Agreement::new(3, 10, "Tiered prints", PaymentModel::TieredRoyalty);
        a.royalty_groups = vec![
            RoyaltyGroup {
                name: "Base".into(),
                rate: dec!(10),
                threshold_from: dec!(0),
                threshold_to: Some(dec!(5000)),
            },
            RoyaltyGroup {
                name: "Premium".into(),
                rate: dec!(15),
                threshold_from: dec!(5000),
                threshold_to: None,
            },
        ];
        a.minimum_guarantee_amount = Some(dec!(1000));
        a.minimum_guarantee_start_month = Some(3);
        let f = PeriodFinancials {
            gross_revenue: basis,
            cogs: dec!(0),
            platform_fees: dec!(0),
            returns: dec!(0),
            marketing_spend: dec!(400),
            units_sold: None,
            period_month_index: month,
        };
        (a, f)
    }

    #[test]
    fn test_scenario_royalty_profit() {
        let r = calculate(&profit_share(), &scenario_financials(), &CalculationContext::default())
            .expect("calculate");
        assert_eq!(r.net_revenue, dec!(40000));
        assert_eq!(r.direct_costs, dec!(21600));
        assert_eq!(r.profit_before_marketing, dec!(18400));
        assert_eq!(r.marketing_cap, dec!(10000));
        assert_eq!(r.attributed_marketing, dec!(8000));
        assert_eq!(r.unattributed_marketing, dec!(0));
        assert_eq!(r.final_profit, dec!(10400));
        assert_eq!(r.raw_payment, dec!(5200));
        assert_eq!(r.final_payment, dec!(5200));
        assert!(!r.guaranteed_floor_applied);
        assert_eq!(r.applied_tier_name, None);
    }

    #[test]
    fn test_scenario_royalty_revenue() {
        let mut a = profit_share();
        a.payment_model = PaymentModel::RoyaltyRevenue;
        let r = calculate(&a, &scenario_financials(), &CalculationContext::default())
            .expect("calculate");
        assert_eq!(r.raw_payment, dec!(20000));
        assert_eq!(r.final_payment, dec!(20000));
    }

    #[test]
    fn test_scenario_tiered_guarantee_inactive() {
        let (a, f) = tiered(1, dec!(7000));
        let r = calculate(&a, &f, &CalculationContext::default()).expect("calculate");
        assert_eq!(r.applied_tier_name.as_deref(), Some("Premium"));
        assert_eq!(r.raw_payment, dec!(1050));
        assert_eq!(r.final_payment, dec!(1050));
        assert!(!r.guaranteed_floor_applied);
        // Marketing is not part of the tiered calculation.
        assert_eq!(r.attributed_marketing, dec!(0));
        assert_eq!(r.unattributed_marketing, dec!(400));
    }

    #[test]
    fn test_scenario_tiered_guarantee_floor() {
        let (a, f) = tiered(4, dec!(2000));
        let r = calculate(&a, &f, &CalculationContext::default()).expect("calculate");
        assert_eq!(r.applied_tier_name.as_deref(), Some("Base"));
        assert_eq!(r.raw_payment, dec!(200));
        assert_eq!(r.final_payment, dec!(1000));
        assert!(r.guaranteed_floor_applied);
    }

    #[test]
    fn test_scenario_flat_fee() {
        let mut a = Agreement::new(5, 10, "Flat licence", PaymentModel::FlatFee);
        a.flat_fee_amount = Some(dec!(5000));
        for f in [scenario_financials(), PeriodFinancials {
            period_month_index: 9,
            ..PeriodFinancials::default()
        }] {
            let r = calculate(&a, &f, &CalculationContext::default()).expect("calculate");
            assert_eq!(r.raw_payment, dec!(5000));
            assert_eq!(r.final_payment, dec!(5000));
        }
    }

    #[test]
    fn test_missing_cap_on_profit_share_fails() {
        let mut a = profit_share();
        a.marketing_attribution_cap_percent = None;
        let result = calculate(&a, &scenario_financials(), &CalculationContext::default());
        assert!(matches!(
            result,
            Err(RoyaltyError::InvalidAgreementConfiguration(_))
        ));
    }

    #[test]
    fn test_marketing_excluded_by_definition() {
        let mut a = profit_share();
        a.marketing_attribution_cap_percent = None;
        a.revenue_definition =
            RevenueDefinition::from_flags([(DeductionCategory::Marketing, false)]);
        let r = calculate(&a, &scenario_financials(), &CalculationContext::default())
            .expect("calculate");
        assert_eq!(r.attributed_marketing, dec!(0));
        assert_eq!(r.unattributed_marketing, dec!(8000));
        assert_eq!(r.final_profit, dec!(18400));
        assert_eq!(r.raw_payment, dec!(9200));
    }

    #[test]
    fn test_loss_period_pays_zero() {
        let mut f = scenario_financials();
        f.cogs = dec!(45000);
        let r = calculate(&profit_share(), &f, &CalculationContext::default()).expect("calculate");
        assert!(r.raw_payment < Decimal::ZERO);
        assert_eq!(r.final_payment, dec!(0));
    }

    #[test]
    fn test_floor_invariant_with_active_guarantee() {
        let mut a = profit_share();
        a.minimum_guarantee_amount = Some(dec!(250));
        a.minimum_guarantee_start_month = Some(1);
        let mut f = scenario_financials();
        f.cogs = dec!(45000);
        let r = calculate(&a, &f, &CalculationContext::default()).expect("calculate");
        assert!(r.final_payment >= Decimal::ZERO);
        assert_eq!(r.final_payment, dec!(250));
        assert!(r.guaranteed_floor_applied);
    }

    #[test]
    fn test_guarantee_ignored_for_flat_fee() {
        let mut a = Agreement::new(5, 10, "Flat licence", PaymentModel::FlatFee);
        a.flat_fee_amount = Some(dec!(100));
        a.minimum_guarantee_amount = Some(dec!(1000));
        a.minimum_guarantee_start_month = Some(1);
        let r = calculate(&a, &scenario_financials(), &CalculationContext::default())
            .expect("calculate");
        assert_eq!(r.final_payment, dec!(100));
        assert!(!r.guaranteed_floor_applied);
    }

    #[test]
    fn test_initiation_fee_reported_separately() {
        let mut a = profit_share();
        a.initiation_fee = Some(dec!(250));
        a.initiation_fee_due_days = Some(30);
        let outstanding = CalculationContext {
            remaining_advance_balance: None,
            initiation_fee_outstanding: true,
        };
        let r = calculate(&a, &scenario_financials(), &outstanding).expect("calculate");
        assert_eq!(r.initiation_fee_due, dec!(250));
        assert_eq!(r.final_payment, dec!(5200));

        let r = calculate(&a, &scenario_financials(), &CalculationContext::default())
            .expect("calculate");
        assert_eq!(r.initiation_fee_due, dec!(0));
    }

    #[test]
    fn test_advance_recoupment() {
        let mut a = Agreement::new(6, 10, "Advance deal", PaymentModel::Advance);
        a.advance_amount = Some(dec!(10000));
        a.advance_recoupment_rate_percent = Some(dec!(25));
        let ctx = CalculationContext {
            remaining_advance_balance: Some(dec!(6000)),
            initiation_fee_outstanding: false,
        };
        let r = calculate(&a, &scenario_financials(), &ctx).expect("calculate");
        assert_eq!(r.advance_recouped, dec!(6000));
        assert_eq!(r.final_payment, dec!(6000));
    }

    #[test]
    fn test_units_basis_requires_units() {
        let (mut a, mut f) = tiered(1, dec!(7000));
        a.tier_basis = TierBasis::UnitsSold;
        assert!(matches!(
            calculate(&a, &f, &CalculationContext::default()),
            Err(RoyaltyError::InvalidInput(_))
        ));
        f.units_sold = Some(120);
        let r = calculate(&a, &f, &CalculationContext::default()).expect("calculate");
        assert_eq!(r.applied_tier_name.as_deref(), Some("Base"));
        assert_eq!(r.raw_payment, dec!(700));
    }

    #[test]
    fn test_tier_basis_ignored_outside_tiered() {
        let mut revenue = profit_share();
        revenue.payment_model = PaymentModel::RoyaltyRevenue;
        revenue.tier_basis = TierBasis::UnitsSold;
        let f = scenario_financials();
        assert_eq!(f.units_sold, None);

        let r = calculate(&revenue, &f, &CalculationContext::default()).expect("calculate");
        assert_eq!(r.raw_payment, dec!(20000));
        assert_eq!(r.applied_tier_name, None);

        let mut flat = Agreement::new(7, 10, "Flat licence", PaymentModel::FlatFee);
        flat.flat_fee_amount = Some(dec!(5000));
        flat.tier_basis = TierBasis::UnitsSold;
        let r = calculate(&flat, &f, &CalculationContext::default()).expect("calculate");
        assert_eq!(r.final_payment, dec!(5000));
    }

    #[test]
    fn test_negative_input_fails_whole_calculation() {
        let mut f = scenario_financials();
        f.platform_fees = dec!(-1);
        assert!(matches!(
            calculate(&profit_share(), &f, &CalculationContext::default()),
            Err(RoyaltyError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_batch_isolates_failures() {
        let good = profit_share();
        let mut bad = profit_share();
        bad.id = 2;
        bad.royalty_rate_percent = None;
        let f = scenario_financials();
        let ctx = CalculationContext::default();

        let results = calculate_batch([(&good, &f, &ctx), (&bad, &f, &ctx)]);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, 1);
        assert_eq!(
            results[0].1.as_ref().expect("good agreement").final_payment,
            dec!(5200)
        );
        assert_eq!(results[1].0, 2);
        assert!(results[1].1.is_err());
    }
}
