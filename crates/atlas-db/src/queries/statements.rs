//! Statement query functions.
//!
//! A statement is the stored outcome of one agreement for one period. The
//! full [`CalculationResult`] is kept as JSON; `final_payment` is duplicated
//! into its own column for period totals.

use rusqlite::{Connection, OptionalExtension};
use rust_decimal::Decimal;

use atlas_types::statement::{CalculationResult, StatementRecord, StatementStatus};
use atlas_types::AgreementId;

use crate::{from_sql_int, parse_decimal, to_sql_int, DbError, Result};

/// Insert or replace a statement.
pub fn upsert(conn: &Connection, record: &StatementRecord) -> Result<()> {
    let result_json = record
        .result
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| DbError::Serialization(e.to_string()))?;
    let final_payment = record.result.as_ref().map(|r| r.final_payment.to_string());

    conn.execute(
        "INSERT OR REPLACE INTO statements
         (agreement_id, period, status, result, final_payment, error, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        rusqlite::params![
            record.agreement_id,
            record.period,
            record.status.as_str(),
            result_json,
            final_payment,
            record.error,
            to_sql_int("created_at", record.created_at)?,
        ],
    )?;
    Ok(())
}

struct StatementRow {
    agreement_id: AgreementId,
    period: String,
    status: String,
    result: Option<String>,
    error: Option<String>,
    created_at: i64,
}

impl StatementRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            agreement_id: row.get(0)?,
            period: row.get(1)?,
            status: row.get(2)?,
            result: row.get(3)?,
            error: row.get(4)?,
            created_at: row.get(5)?,
        })
    }

    fn into_record(self) -> Result<StatementRecord> {
        let status = match self.status.as_str() {
            "computed" => StatementStatus::Computed,
            "failed" => StatementStatus::Failed,
            other => {
                return Err(DbError::Serialization(format!(
                    "unknown statement status '{other}'"
                )))
            }
        };
        let result = self
            .result
            .map(|json| serde_json::from_str::<CalculationResult>(&json))
            .transpose()
            .map_err(|e| DbError::Serialization(e.to_string()))?;

        Ok(StatementRecord {
            agreement_id: self.agreement_id,
            period: self.period,
            status,
            result,
            error: self.error,
            created_at: from_sql_int("created_at", self.created_at)?,
        })
    }
}

/// Statement of one agreement for one period, if any.
pub fn get(
    conn: &Connection,
    agreement_id: AgreementId,
    period: &str,
) -> Result<Option<StatementRecord>> {
    conn.query_row(
        "SELECT agreement_id, period, status, result, error, created_at
         FROM statements WHERE agreement_id = ?1 AND period = ?2",
        rusqlite::params![agreement_id, period],
        StatementRow::from_row,
    )
    .optional()?
    .map(StatementRow::into_record)
    .transpose()
}

/// All statements of a period, by agreement id.
pub fn list_by_period(conn: &Connection, period: &str) -> Result<Vec<StatementRecord>> {
    let mut stmt = conn.prepare(
        "SELECT agreement_id, period, status, result, error, created_at
         FROM statements WHERE period = ?1 ORDER BY agreement_id",
    )?;

    let rows = stmt
        .query_map([period], StatementRow::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    rows.into_iter().map(StatementRow::into_record).collect()
}

/// Whether a computed statement already exists.
pub fn is_computed(conn: &Connection, agreement_id: AgreementId, period: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM statements
         WHERE agreement_id = ?1 AND period = ?2 AND status = 'computed'",
        rusqlite::params![agreement_id, period],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Sum of final payments of computed statements in a period.
pub fn period_total(conn: &Connection, period: &str) -> Result<Decimal> {
    let mut stmt = conn.prepare(
        "SELECT final_payment FROM statements
         WHERE period = ?1 AND status = 'computed' AND final_payment IS NOT NULL",
    )?;

    let amounts = stmt
        .query_map([period], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    amounts.iter().try_fold(Decimal::ZERO, |total, text| {
        let amount = parse_decimal("final_payment", text)?;
        total
            .checked_add(amount)
            .ok_or_else(|| DbError::Serialization("period total overflow".into()))
    })
}
