//! # atlas-db
//!
//! Database access layer for Atlas royalty statements.
//! Manages the single SQLite database at `$ATLAS_DATA_DIR/atlas.db`.
//!
//! ## Schema
//!
//! - WAL mode mandatory
//! - Foreign keys enforced
//! - All timestamps are Unix epoch seconds (u64)
//! - Money, rates and thresholds stored as decimal TEXT, never REAL
//! - Schema version stored in `PRAGMA user_version`

pub mod migrations;
pub mod queries;
pub mod schema;

use std::path::Path;
use std::str::FromStr;

use rusqlite::Connection;
use rust_decimal::Decimal;

/// Current schema version.
pub const SCHEMA_VERSION: u32 = 1;

/// Database error types.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("migration failed: {0}")]
    Migration(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("constraint violation: {0}")]
    Constraint(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    /// A stored enum value is not recognised.
    #[error(transparent)]
    Parse(#[from] atlas_types::ParseError),
}

pub type Result<T> = std::result::Result<T, DbError>;

/// Open or create the Atlas database at the given path.
///
/// Configures WAL mode, foreign keys, and runs any pending migrations.
pub fn open(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    configure(&conn)?;
    migrations::run(&conn)?;
    Ok(conn)
}

/// Open an in-memory database (for testing).
pub fn open_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    configure(&conn)?;
    migrations::run(&conn)?;
    Ok(conn)
}

/// Configure SQLite pragmas.
fn configure(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = 5000;
         PRAGMA synchronous = NORMAL;",
    )?;
    Ok(())
}

/// Parse a decimal TEXT column.
pub(crate) fn parse_decimal(column: &str, text: &str) -> Result<Decimal> {
    Decimal::from_str(text)
        .map_err(|e| DbError::Serialization(format!("{column}: invalid decimal '{text}': {e}")))
}

/// Convert an unsigned value to SQLite INTEGER.
pub(crate) fn to_sql_int(column: &str, value: u64) -> Result<i64> {
    i64::try_from(value).map_err(|_| {
        DbError::Constraint(format!("{column}: {value} does not fit in an INTEGER column"))
    })
}

/// Read back an unsigned value stored as INTEGER.
pub(crate) fn from_sql_int(column: &str, value: i64) -> Result<u64> {
    u64::try_from(value)
        .map_err(|_| DbError::Serialization(format!("{column}: negative value {value}")))
}

/// Parse a nullable decimal TEXT column.
pub(crate) fn parse_opt_decimal(column: &str, text: Option<String>) -> Result<Option<Decimal>> {
    text.map(|t| parse_decimal(column, &t)).transpose()
}
