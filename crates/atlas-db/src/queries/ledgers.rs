//! Advance ledger query functions.

use rusqlite::{Connection, OptionalExtension};
use rust_decimal::Decimal;

use atlas_types::AgreementId;

use crate::{from_sql_int, parse_decimal, to_sql_int, DbError, Result};

/// Stored recoupment state of one advance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerRow {
    pub agreement_id: AgreementId,
    pub advance_amount: Decimal,
    pub recouped: Decimal,
    pub updated_at: u64,
}

/// Open a ledger for an advance. No-op if one already exists.
pub fn open(
    conn: &Connection,
    agreement_id: AgreementId,
    advance_amount: Decimal,
    opened_at: u64,
) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO advance_ledgers (agreement_id, advance_amount, recouped, updated_at)
         VALUES (?1, ?2, '0', ?3)",
        rusqlite::params![
            agreement_id,
            advance_amount.to_string(),
            to_sql_int("updated_at", opened_at)?
        ],
    )?;
    Ok(())
}

/// Ledger of an agreement, if one has been opened.
pub fn get(conn: &Connection, agreement_id: AgreementId) -> Result<Option<LedgerRow>> {
    let raw = conn
        .query_row(
            "SELECT advance_amount, recouped, updated_at
             FROM advance_ledgers WHERE agreement_id = ?1",
            [agreement_id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            },
        )
        .optional()?;

    raw.map(|(advance, recouped, updated_at)| {
        Ok(LedgerRow {
            agreement_id,
            advance_amount: parse_decimal("advance_amount", &advance)?,
            recouped: parse_decimal("recouped", &recouped)?,
            updated_at: from_sql_int("updated_at", updated_at)?,
        })
    })
    .transpose()
}

/// Overwrite the recouped total.
pub fn set_recouped(
    conn: &Connection,
    agreement_id: AgreementId,
    recouped: Decimal,
    updated_at: u64,
) -> Result<()> {
    let updated = conn.execute(
        "UPDATE advance_ledgers SET recouped = ?1, updated_at = ?2 WHERE agreement_id = ?3",
        rusqlite::params![
            recouped.to_string(),
            to_sql_int("updated_at", updated_at)?,
            agreement_id
        ],
    )?;
    if updated == 0 {
        return Err(DbError::NotFound(format!(
            "advance ledger for agreement {agreement_id}"
        )));
    }
    Ok(())
}
