//! Agreement query functions.
//!
//! An agreement spans three tables: the `agreements` row, its ordered
//! `royalty_groups` and its `revenue_definitions` flags. Inserts write all
//! three in one transaction; reads reassemble an [`Agreement`].

use std::str::FromStr;

use rusqlite::Connection;

use atlas_types::agreement::{
    Agreement, DeductionCategory, PaymentModel, RevenueDefinition, RoyaltyGroup, TierBasis,
};
use atlas_types::AgreementId;

use crate::{from_sql_int, parse_decimal, parse_opt_decimal, to_sql_int, DbError, Result};

/// Insert an agreement with its groups and revenue definition.
///
/// The database assigns the id; `agreement.id` is ignored.
pub fn insert(conn: &Connection, agreement: &Agreement, created_at: u64) -> Result<AgreementId> {
    let effective_at = to_sql_int("effective_at", agreement.effective_at)?;
    let created_at = to_sql_int("created_at", created_at)?;
    let tx = conn.unchecked_transaction()?;

    tx.execute(
        "INSERT INTO agreements
         (partner_id, name, payment_model, royalty_rate_percent, flat_fee_amount,
          advance_amount, advance_recoupment_rate_percent, marketing_attribution_cap_percent,
          initiation_fee, initiation_fee_due_days, minimum_guarantee_amount,
          minimum_guarantee_start_month, tier_basis, effective_at, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
        rusqlite::params![
            agreement.partner_id,
            agreement.name,
            agreement.payment_model.as_str(),
            agreement.royalty_rate_percent.map(|d| d.to_string()),
            agreement.flat_fee_amount.map(|d| d.to_string()),
            agreement.advance_amount.map(|d| d.to_string()),
            agreement.advance_recoupment_rate_percent.map(|d| d.to_string()),
            agreement.marketing_attribution_cap_percent.map(|d| d.to_string()),
            agreement.initiation_fee.map(|d| d.to_string()),
            agreement.initiation_fee_due_days,
            agreement.minimum_guarantee_amount.map(|d| d.to_string()),
            agreement.minimum_guarantee_start_month,
            agreement.tier_basis.as_str(),
            effective_at,
            created_at,
        ],
    )?;
    let agreement_id = tx.last_insert_rowid();

    {
        let mut stmt = tx.prepare(
            "INSERT INTO royalty_groups
             (agreement_id, position, name, rate, threshold_from, threshold_to)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;
        for (position, group) in agreement.royalty_groups.iter().enumerate() {
            stmt.execute(rusqlite::params![
                agreement_id,
                i64::try_from(position).map_err(|_| {
                    DbError::Constraint(format!("royalty group position {position} out of range"))
                })?,
                group.name,
                group.rate.to_string(),
                group.threshold_from.to_string(),
                group.threshold_to.map(|d| d.to_string()),
            ])?;
        }

        let mut stmt = tx.prepare(
            "INSERT INTO revenue_definitions (agreement_id, category, included)
             VALUES (?1, ?2, ?3)",
        )?;
        for (category, included) in &agreement.revenue_definition.deductions {
            stmt.execute(rusqlite::params![agreement_id, category.as_str(), included])?;
        }
    }

    tx.commit()?;
    tracing::debug!(agreement_id, model = %agreement.payment_model, "agreement stored");
    Ok(agreement_id)
}

/// Raw `agreements` row, before decimal and enum parsing.
struct AgreementRow {
    agreement_id: AgreementId,
    partner_id: i64,
    name: String,
    payment_model: String,
    royalty_rate_percent: Option<String>,
    flat_fee_amount: Option<String>,
    advance_amount: Option<String>,
    advance_recoupment_rate_percent: Option<String>,
    marketing_attribution_cap_percent: Option<String>,
    initiation_fee: Option<String>,
    initiation_fee_due_days: Option<u32>,
    minimum_guarantee_amount: Option<String>,
    minimum_guarantee_start_month: Option<u32>,
    tier_basis: String,
    effective_at: i64,
}

/// Load an agreement by id.
///
/// # Errors
///
/// - [`DbError::NotFound`] if no agreement has this id
/// - [`DbError::Parse`] if a stored payment model, tier basis or deduction
///   category is not recognised
pub fn get(conn: &Connection, agreement_id: AgreementId) -> Result<Agreement> {
    let row = conn
        .query_row(
            "SELECT agreement_id, partner_id, name, payment_model, royalty_rate_percent,
                    flat_fee_amount, advance_amount, advance_recoupment_rate_percent,
                    marketing_attribution_cap_percent, initiation_fee, initiation_fee_due_days,
                    minimum_guarantee_amount, minimum_guarantee_start_month, tier_basis,
                    effective_at
             FROM agreements WHERE agreement_id = ?1",
            [agreement_id],
            |row| {
                Ok(AgreementRow {
                    agreement_id: row.get(0)?,
                    partner_id: row.get(1)?,
                    name: row.get(2)?,
                    payment_model: row.get(3)?,
                    royalty_rate_percent: row.get(4)?,
                    flat_fee_amount: row.get(5)?,
                    advance_amount: row.get(6)?,
                    advance_recoupment_rate_percent: row.get(7)?,
                    marketing_attribution_cap_percent: row.get(8)?,
                    initiation_fee: row.get(9)?,
                    initiation_fee_due_days: row.get(10)?,
                    minimum_guarantee_amount: row.get(11)?,
                    minimum_guarantee_start_month: row.get(12)?,
                    tier_basis: row.get(13)?,
                    effective_at: row.get(14)?,
                })
            },
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => {
                DbError::NotFound(format!("agreement {agreement_id}"))
            }
            other => DbError::Sqlite(other),
        })?;

    Ok(Agreement {
        id: row.agreement_id,
        partner_id: row.partner_id,
        name: row.name,
        payment_model: PaymentModel::from_str(&row.payment_model)?,
        royalty_rate_percent: parse_opt_decimal("royalty_rate_percent", row.royalty_rate_percent)?,
        flat_fee_amount: parse_opt_decimal("flat_fee_amount", row.flat_fee_amount)?,
        advance_amount: parse_opt_decimal("advance_amount", row.advance_amount)?,
        advance_recoupment_rate_percent: parse_opt_decimal(
            "advance_recoupment_rate_percent",
            row.advance_recoupment_rate_percent,
        )?,
        marketing_attribution_cap_percent: parse_opt_decimal(
            "marketing_attribution_cap_percent",
            row.marketing_attribution_cap_percent,
        )?,
        initiation_fee: parse_opt_decimal("initiation_fee", row.initiation_fee)?,
        initiation_fee_due_days: row.initiation_fee_due_days,
        minimum_guarantee_amount: parse_opt_decimal(
            "minimum_guarantee_amount",
            row.minimum_guarantee_amount,
        )?,
        minimum_guarantee_start_month: row.minimum_guarantee_start_month,
        royalty_groups: royalty_groups(conn, agreement_id)?,
        tier_basis: TierBasis::from_str(&row.tier_basis)?,
        revenue_definition: revenue_definition(conn, agreement_id)?,
        effective_at: from_sql_int("effective_at", row.effective_at)?,
    })
}

/// Royalty groups of an agreement, in stored order.
pub fn royalty_groups(conn: &Connection, agreement_id: AgreementId) -> Result<Vec<RoyaltyGroup>> {
    let mut stmt = conn.prepare(
        "SELECT name, rate, threshold_from, threshold_to
         FROM royalty_groups WHERE agreement_id = ?1 ORDER BY position",
    )?;

    let raw = stmt
        .query_map([agreement_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<String>>(3)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    raw.into_iter()
        .map(|(name, rate, from, to)| {
            Ok(RoyaltyGroup {
                name,
                rate: parse_decimal("rate", &rate)?,
                threshold_from: parse_decimal("threshold_from", &from)?,
                threshold_to: parse_opt_decimal("threshold_to", to)?,
            })
        })
        .collect()
}

/// Explicit deduction flags of an agreement.
pub fn revenue_definition(
    conn: &Connection,
    agreement_id: AgreementId,
) -> Result<RevenueDefinition> {
    let mut stmt = conn.prepare(
        "SELECT category, included FROM revenue_definitions WHERE agreement_id = ?1",
    )?;

    let raw = stmt
        .query_map([agreement_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, bool>(1)?))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let flags = raw
        .into_iter()
        .map(|(category, included)| Ok((DeductionCategory::from_str(&category)?, included)))
        .collect::<Result<Vec<_>>>()?;

    Ok(RevenueDefinition::from_flags(flags))
}

/// Ids of agreements that have financials recorded for `period`.
pub fn ids_with_financials(conn: &Connection, period: &str) -> Result<Vec<AgreementId>> {
    let mut stmt = conn.prepare(
        "SELECT a.agreement_id FROM agreements a
         JOIN period_financials f ON f.agreement_id = a.agreement_id
         WHERE f.period = ?1
         ORDER BY a.agreement_id",
    )?;

    let ids = stmt
        .query_map([period], |row| row.get(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(ids)
}

/// Ids of all agreements of a partner.
pub fn ids_for_partner(conn: &Connection, partner_id: i64) -> Result<Vec<AgreementId>> {
    let mut stmt = conn.prepare(
        "SELECT agreement_id FROM agreements WHERE partner_id = ?1 ORDER BY agreement_id",
    )?;

    let ids = stmt
        .query_map([partner_id], |row| row.get(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(ids)
}

/// Whether the agreement's initiation fee has been billed.
pub fn initiation_fee_billed(conn: &Connection, agreement_id: AgreementId) -> Result<bool> {
    let billed_at: Option<i64> = conn
        .query_row(
            "SELECT initiation_fee_billed_at FROM agreements WHERE agreement_id = ?1",
            [agreement_id],
            |row| row.get(0),
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => {
                DbError::NotFound(format!("agreement {agreement_id}"))
            }
            other => DbError::Sqlite(other),
        })?;
    Ok(billed_at.is_some())
}

/// Record that the initiation fee was billed.
pub fn mark_initiation_fee_billed(
    conn: &Connection,
    agreement_id: AgreementId,
    billed_at: u64,
) -> Result<()> {
    let updated = conn.execute(
        "UPDATE agreements SET initiation_fee_billed_at = ?1
         WHERE agreement_id = ?2 AND initiation_fee_billed_at IS NULL",
        rusqlite::params![to_sql_int("initiation_fee_billed_at", billed_at)?, agreement_id],
    )?;
    if updated == 0 {
        return Err(DbError::NotFound(format!(
            "agreement {agreement_id} missing or fee already billed"
        )));
    }
    Ok(())
}
