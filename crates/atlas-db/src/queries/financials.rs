//! Period financials query functions.

use rusqlite::{Connection, OptionalExtension};

use atlas_types::financials::PeriodFinancials;
use atlas_types::AgreementId;

use crate::{from_sql_int, parse_decimal, to_sql_int, Result};

/// Insert or replace the financials of one agreement for one period.
pub fn upsert(
    conn: &Connection,
    agreement_id: AgreementId,
    period: &str,
    financials: &PeriodFinancials,
    recorded_at: u64,
) -> Result<()> {
    let units_sold = financials
        .units_sold
        .map(|u| to_sql_int("units_sold", u))
        .transpose()?;
    conn.execute(
        "INSERT OR REPLACE INTO period_financials
         (agreement_id, period, gross_revenue, cogs, platform_fees, returns,
          marketing_spend, units_sold, period_month_index, recorded_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        rusqlite::params![
            agreement_id,
            period,
            financials.gross_revenue.to_string(),
            financials.cogs.to_string(),
            financials.platform_fees.to_string(),
            financials.returns.to_string(),
            financials.marketing_spend.to_string(),
            units_sold,
            financials.period_month_index,
            to_sql_int("recorded_at", recorded_at)?,
        ],
    )?;
    Ok(())
}

/// Financials of an agreement for a period, if recorded.
pub fn get(
    conn: &Connection,
    agreement_id: AgreementId,
    period: &str,
) -> Result<Option<PeriodFinancials>> {
    let raw = conn
        .query_row(
            "SELECT gross_revenue, cogs, platform_fees, returns, marketing_spend,
                    units_sold, period_month_index
             FROM period_financials WHERE agreement_id = ?1 AND period = ?2",
            rusqlite::params![agreement_id, period],
            |row| {
                Ok((
                    [
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                    ],
                    row.get::<_, Option<i64>>(5)?,
                    row.get::<_, u32>(6)?,
                ))
            },
        )
        .optional()?;

    let Some(([gross, cogs, fees, returns, marketing], units_sold, period_month_index)) = raw
    else {
        return Ok(None);
    };

    Ok(Some(PeriodFinancials {
        gross_revenue: parse_decimal("gross_revenue", &gross)?,
        cogs: parse_decimal("cogs", &cogs)?,
        platform_fees: parse_decimal("platform_fees", &fees)?,
        returns: parse_decimal("returns", &returns)?,
        marketing_spend: parse_decimal("marketing_spend", &marketing)?,
        units_sold: units_sold.map(|u| from_sql_int("units_sold", u)).transpose()?,
        period_month_index,
    }))
}
