//! atlas-statements: periodic partner statement generation.
//!
//! Loads every agreement with financials for a reporting period, runs the
//! royalty engine over them in parallel and stores one statement per
//! agreement. A failing agreement is recorded as a failed statement and
//! never stops the run.

pub mod batch;
pub mod config;

/// Current Unix time in seconds.
pub fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
