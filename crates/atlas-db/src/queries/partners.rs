//! Partner query functions.

use rusqlite::Connection;

use atlas_types::PartnerId;

use crate::{from_sql_int, to_sql_int, DbError, Result};

/// A raw partner row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartnerRow {
    pub partner_id: PartnerId,
    pub name: String,
    pub contact_email: Option<String>,
    pub created_at: u64,
}

/// Insert a partner and return its id.
pub fn insert(
    conn: &Connection,
    name: &str,
    contact_email: Option<&str>,
    created_at: u64,
) -> Result<PartnerId> {
    if name.trim().is_empty() {
        return Err(DbError::Constraint("partner name is empty".into()));
    }
    conn.execute(
        "INSERT INTO partners (name, contact_email, created_at) VALUES (?1, ?2, ?3)",
        rusqlite::params![name, contact_email, to_sql_int("created_at", created_at)?],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Partner columns with the timestamp still in SQLite form.
type RawPartner = (PartnerId, String, Option<String>, i64);

fn raw_partner(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawPartner> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn into_partner((partner_id, name, contact_email, created_at): RawPartner) -> Result<PartnerRow> {
    Ok(PartnerRow {
        partner_id,
        name,
        contact_email,
        created_at: from_sql_int("created_at", created_at)?,
    })
}

/// Get a partner by id.
pub fn get(conn: &Connection, partner_id: PartnerId) -> Result<PartnerRow> {
    let raw = conn
        .query_row(
            "SELECT partner_id, name, contact_email, created_at FROM partners WHERE partner_id = ?1",
            [partner_id],
            raw_partner,
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => {
                DbError::NotFound(format!("partner {partner_id}"))
            }
            other => DbError::Sqlite(other),
        })?;
    into_partner(raw)
}

/// List all partners by name.
pub fn list(conn: &Connection) -> Result<Vec<PartnerRow>> {
    let mut stmt = conn.prepare(
        "SELECT partner_id, name, contact_email, created_at FROM partners ORDER BY name",
    )?;

    let rows = stmt
        .query_map([], raw_partner)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    rows.into_iter().map(into_partner).collect()
}
