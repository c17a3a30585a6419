//! Marketing attribution cap.
//!
//! Only part of a period's marketing spend may be charged against the shared
//! profit pool:
//!
//! ```text
//! cap          = net_revenue * cap_percent / 100
//! attributed   = min(marketing_spend, cap)
//! unattributed = marketing_spend - attributed
//! ```
//!
//! The unattributed remainder is absorbed by the paying party.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{check_percent, percent_of, Result, RoyaltyError};

/// Split of marketing spend into attributed and absorbed parts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketingAttribution {
    pub cap: Decimal,
    pub attributed: Decimal,
    pub unattributed: Decimal,
}

impl MarketingAttribution {
    /// No marketing deducted; the whole spend is absorbed.
    pub fn skipped(marketing_spend: Decimal) -> Self {
        Self {
            cap: Decimal::ZERO,
            attributed: Decimal::ZERO,
            unattributed: marketing_spend,
        }
    }
}

/// Cap marketing spend at a percentage of net revenue.
///
/// # Errors
///
/// - [`RoyaltyError::InvalidAgreementConfiguration`] if `cap_percent` is outside `[0, 100]`
/// - [`RoyaltyError::InvalidInput`] if `marketing_spend` or `net_revenue` is negative
pub fn cap_marketing(
    net_revenue: Decimal,
    marketing_spend: Decimal,
    cap_percent: Decimal,
) -> Result<MarketingAttribution> {
    check_percent(cap_percent, "marketing_attribution_cap_percent")?;
    if marketing_spend < Decimal::ZERO || net_revenue < Decimal::ZERO {
        return Err(RoyaltyError::InvalidInput(
            "marketing spend and net revenue must be non-negative".to_string(),
        ));
    }

    let cap = percent_of(net_revenue, cap_percent)?;
    let attributed = marketing_spend.min(cap);
    let unattributed = marketing_spend
        .checked_sub(attributed)
        .ok_or(RoyaltyError::Overflow)?;

    Ok(MarketingAttribution {
        cap,
        attributed,
        unattributed,
    })
}
