//! Statement run for one reporting period.
//!
//! 1. Load agreements with financials for the period (skipping those that
//!    already have a computed statement), together with their advance
//!    ledger and initiation-fee state. An agreement whose stored data cannot
//!    be read becomes a failed statement.
//! 2. Calculate every agreement on the blocking pool, at most
//!    `max_parallel` at a time
//! 3. Record recoupment and fee billing for successful calculations and
//!    store one statement per agreement, in a single transaction
//!
//! Reruns of a period are idempotent: computed statements are never
//! recalculated, so advances are not recouped twice.
//!
//! The initiation fee is billed on the first statement produced on or after
//! its due date.

use std::sync::Arc;

use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tracing::{info, warn};

use atlas_db::queries::{agreements, financials, ledgers, settings, statements};
use atlas_db::DbError;
use atlas_royalty::recoupment::AdvanceLedger;
use atlas_royalty::{engine, schedule, RoyaltyError};
use atlas_types::agreement::{Agreement, PaymentModel};
use atlas_types::financials::{CalculationContext, PeriodFinancials};
use atlas_types::statement::{CalculationResult, StatementRecord, StatementStatus};
use atlas_types::AgreementId;

/// Errors that abort a whole run. Per-agreement problems never do.
#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error("database error: {0}")]
    Db(#[from] DbError),

    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("royalty error: {0}")]
    Royalty(#[from] RoyaltyError),

    #[error("calculation task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("invalid run options: {0}")]
    Options(String),
}

pub type Result<T> = std::result::Result<T, BatchError>;

/// Run parameters.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Currency precision for report amounts.
    pub decimal_places: u32,
    /// Maximum concurrent calculations.
    pub max_parallel: usize,
    /// Unix seconds recorded on statements and ledgers.
    pub now: u64,
}

/// Outcome of one agreement in a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgreementOutcome {
    pub agreement_id: AgreementId,
    pub status: StatementStatus,
    pub final_payment: Option<Decimal>,
    pub error: Option<String>,
}

/// Summary of a statement run, written as the JSON report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub period: String,
    /// Currency of all amounts, from the `currency` setting.
    pub currency: String,
    pub computed: usize,
    pub failed: usize,
    /// Already computed by an earlier run.
    pub skipped: usize,
    pub total_payable: Decimal,
    pub initiation_fees_billed: Decimal,
    pub outcomes: Vec<AgreementOutcome>,
}

/// Everything one calculation needs, detached from the database.
#[derive(Debug, Clone)]
struct Job {
    agreement: Agreement,
    financials: PeriodFinancials,
    context: CalculationContext,
}

enum Loaded {
    Ready(Box<Job>),
    Invalid(AgreementId, String),
}

/// Generate statements for `period`.
///
/// # Errors
///
/// Only infrastructure failures (database, task join) abort the run; an
/// agreement that cannot be loaded or calculated becomes a failed statement.
pub async fn run_period(
    db: Arc<Mutex<Connection>>,
    period: &str,
    opts: &RunOptions,
) -> Result<RunReport> {
    if period.trim().is_empty() {
        return Err(BatchError::Options("period is empty".to_string()));
    }
    if opts.max_parallel == 0 {
        return Err(BatchError::Options("max_parallel must be at least 1".to_string()));
    }

    let (loaded, skipped) = {
        let conn = db.lock().await;
        load_jobs(&conn, period, opts.now)?
    };
    info!(period, jobs = loaded.len(), skipped, "statement run started");

    let mut jobs = Vec::new();
    let mut outcomes: Vec<(AgreementId, std::result::Result<CalculationResult, String>)> =
        Vec::new();
    for item in loaded {
        match item {
            Loaded::Ready(job) => jobs.push(*job),
            Loaded::Invalid(id, error) => outcomes.push((id, Err(error))),
        }
    }

    outcomes.extend(calculate_all(jobs, opts.max_parallel).await?);
    outcomes.sort_by_key(|(id, _)| *id);

    let conn = db.lock().await;
    let report = store_outcomes(&conn, period, outcomes, skipped, opts)?;

    info!(
        period,
        computed = report.computed,
        failed = report.failed,
        skipped = report.skipped,
        total = %report.total_payable,
        "statement run complete"
    );
    Ok(report)
}

fn load_jobs(conn: &Connection, period: &str, now: u64) -> Result<(Vec<Loaded>, usize)> {
    let mut loaded = Vec::new();
    let mut skipped = 0;

    for agreement_id in agreements::ids_with_financials(conn, period)? {
        if statements::is_computed(conn, agreement_id, period)? {
            skipped += 1;
            continue;
        }

        match load_job(conn, agreement_id, period, now) {
            Ok(Some(job)) => loaded.push(Loaded::Ready(Box::new(job))),
            Ok(None) => {}
            Err(e) => {
                let error = agreement_error(e)?;
                warn!(agreement_id, period, %error, "agreement could not be loaded");
                loaded.push(Loaded::Invalid(agreement_id, error));
            }
        }
    }

    Ok((loaded, skipped))
}

fn load_job(
    conn: &Connection,
    agreement_id: AgreementId,
    period: &str,
    now: u64,
) -> Result<Option<Job>> {
    let agreement = agreements::get(conn, agreement_id)?;
    let Some(financials) = financials::get(conn, agreement_id, period)? else {
        return Ok(None);
    };

    let billed = agreements::initiation_fee_billed(conn, agreement_id)?;
    let fee_due = schedule::fee_status(&agreement, billed, now)?
        .is_some_and(|status| status.outstanding && now >= status.due_at);

    let context = CalculationContext {
        remaining_advance_balance: remaining_advance(conn, &agreement, now)?,
        initiation_fee_outstanding: fee_due,
    };

    Ok(Some(Job {
        agreement,
        financials,
        context,
    }))
}

/// Error text for a failure confined to one agreement's stored data.
///
/// Connection and SQL errors are returned unchanged and end the run.
fn agreement_error(err: BatchError) -> Result<String> {
    match err {
        BatchError::Royalty(e) => Ok(e.to_string()),
        BatchError::Db(DbError::Parse(e)) => Ok(RoyaltyError::from(e).to_string()),
        BatchError::Db(
            e @ (DbError::Serialization(_) | DbError::NotFound(_) | DbError::Constraint(_)),
        ) => Ok(e.to_string()),
        BatchError::Db(DbError::Sqlite(e)) if is_row_conversion(&e) => Ok(e.to_string()),
        other => Err(other),
    }
}

/// A stored value that does not convert to its Rust type.
fn is_row_conversion(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::FromSqlConversionFailure(..)
            | rusqlite::Error::IntegralValueOutOfRange(..)
            | rusqlite::Error::InvalidColumnType(..)
    )
}

/// Remaining advance balance, opening the ledger on first use.
fn remaining_advance(conn: &Connection, agreement: &Agreement, now: u64) -> Result<Option<Decimal>> {
    if agreement.payment_model != PaymentModel::Advance {
        return Ok(None);
    }
    let Some(advance_amount) = agreement.advance_amount else {
        // The engine reports the missing advance as a configuration error.
        return Ok(None);
    };
    ledgers::open(conn, agreement.id, advance_amount, now)?;
    Ok(ledgers::get(conn, agreement.id)?.map(|row| {
        AdvanceLedger {
            advance_amount: row.advance_amount,
            recouped: row.recouped,
        }
        .remaining()
    }))
}

async fn calculate_all(
    jobs: Vec<Job>,
    max_parallel: usize,
) -> Result<Vec<(AgreementId, std::result::Result<CalculationResult, String>)>> {
    let permits = Arc::new(Semaphore::new(max_parallel));
    let mut set = JoinSet::new();

    for job in jobs {
        let permit = permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| BatchError::Options(e.to_string()))?;
        set.spawn_blocking(move || {
            let _permit = permit;
            let result = engine::calculate(&job.agreement, &job.financials, &job.context);
            (job.agreement.id, result.map_err(|e| e.to_string()))
        });
    }

    let mut results = Vec::new();
    while let Some(joined) = set.join_next().await {
        results.push(joined?);
    }
    Ok(results)
}

fn store_outcomes(
    conn: &Connection,
    period: &str,
    outcomes: Vec<(AgreementId, std::result::Result<CalculationResult, String>)>,
    skipped: usize,
    opts: &RunOptions,
) -> Result<RunReport> {
    let tx = conn.unchecked_transaction()?;

    let mut report = RunReport {
        period: period.to_string(),
        currency: settings::get(&tx, "currency")?,
        computed: 0,
        failed: 0,
        skipped,
        total_payable: Decimal::ZERO,
        initiation_fees_billed: Decimal::ZERO,
        outcomes: Vec::with_capacity(outcomes.len()),
    };

    for (agreement_id, outcome) in outcomes {
        let record = match outcome {
            Ok(result) => {
                if !result.advance_recouped.is_zero() {
                    record_recoupment(&tx, agreement_id, result.advance_recouped, opts.now)?;
                }
                if !result.initiation_fee_due.is_zero() {
                    agreements::mark_initiation_fee_billed(&tx, agreement_id, opts.now)?;
                    report.initiation_fees_billed += result.initiation_fee_due;
                }

                let rounded = result.rounded(opts.decimal_places);
                report.computed += 1;
                report.total_payable += rounded.final_payment;
                report.outcomes.push(AgreementOutcome {
                    agreement_id,
                    status: StatementStatus::Computed,
                    final_payment: Some(rounded.final_payment),
                    error: None,
                });

                StatementRecord {
                    agreement_id,
                    period: period.to_string(),
                    status: StatementStatus::Computed,
                    result: Some(result),
                    error: None,
                    created_at: opts.now,
                }
            }
            Err(error) => {
                warn!(agreement_id, period, %error, "statement failed");
                report.failed += 1;
                report.outcomes.push(AgreementOutcome {
                    agreement_id,
                    status: StatementStatus::Failed,
                    final_payment: None,
                    error: Some(error.clone()),
                });

                StatementRecord {
                    agreement_id,
                    period: period.to_string(),
                    status: StatementStatus::Failed,
                    result: None,
                    error: Some(error),
                    created_at: opts.now,
                }
            }
        };
        statements::upsert(&tx, &record)?;
    }

    settings::set(&tx, "last_statement_period", period)?;
    tx.commit()?;
    Ok(report)
}

fn record_recoupment(
    conn: &Connection,
    agreement_id: AgreementId,
    amount: Decimal,
    now: u64,
) -> Result<()> {
    let row = ledgers::get(conn, agreement_id)?
        .ok_or_else(|| DbError::NotFound(format!("advance ledger for agreement {agreement_id}")))?;
    let mut ledger = AdvanceLedger {
        advance_amount: row.advance_amount,
        recouped: row.recouped,
    };
    ledger.record(amount)?;
    ledgers::set_recouped(conn, agreement_id, ledger.recouped, now)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use atlas_db::queries::partners;
    use rust_decimal_macros::dec;

    use super::*;

    const PERIOD: &str = "2026-09";

    fn opts() -> RunOptions {
        RunOptions {
            decimal_places: 2,
            max_parallel: 2,
            now: 1_790_000_000,
        }
    }

    fn financials(gross: Decimal) -> PeriodFinancials {
        PeriodFinancials {
            gross_revenue: gross,
            cogs: dec!(0),
            platform_fees: dec!(0),
            returns: dec!(0),
            marketing_spend: dec!(0),
            units_sold: None,
            period_month_index: 2,
        }
    }

    fn seed(conn: &Connection, agreement: &Agreement, gross: Decimal) -> AgreementId {
        let id = agreements::insert(conn, agreement, 100).expect("agreement");
        financials::upsert(conn, id, PERIOD, &financials(gross), 100).expect("financials");
        id
    }

    fn db() -> (Arc<Mutex<Connection>>, i64) {
        let conn = atlas_db::open_memory().expect("open test db");
        let partner_id = partners::insert(&conn, "Northlight Studio", None, 100).expect("partner");
        (Arc::new(Mutex::new(conn)), partner_id)
    }

    #[tokio::test]
    async fn test_run_isolates_failures() {
        let (db, partner_id) = db();
        let (good, bad) = {
            let conn = db.lock().await;
            let mut revenue = Agreement::new(0, partner_id, "Revenue", PaymentModel::RoyaltyRevenue);
            revenue.royalty_rate_percent = Some(dec!(10));
            let broken = Agreement::new(0, partner_id, "Broken", PaymentModel::FlatFee);
            (
                seed(&conn, &revenue, dec!(12345.67)),
                seed(&conn, &broken, dec!(100)),
            )
        };

        let report = run_period(db.clone(), PERIOD, &opts()).await.expect("run");
        assert_eq!(report.computed, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.total_payable, dec!(1234.57));
        assert_eq!(report.currency, "GBP");
        assert_eq!(report.outcomes[0].agreement_id, good);
        assert_eq!(report.outcomes[1].agreement_id, bad);
        assert!(report.outcomes[1]
            .error
            .as_deref()
            .is_some_and(|e| e.contains("flat_fee_amount")));

        let conn = db.lock().await;
        let stored = statements::get(&conn, bad, PERIOD).expect("get").expect("present");
        assert_eq!(stored.status, StatementStatus::Failed);
        assert_eq!(
            settings::get(&conn, "last_statement_period").expect("setting"),
            PERIOD
        );
    }

    #[tokio::test]
    async fn test_rerun_skips_computed() {
        let (db, partner_id) = db();
        {
            let conn = db.lock().await;
            let mut flat = Agreement::new(0, partner_id, "Flat", PaymentModel::FlatFee);
            flat.flat_fee_amount = Some(dec!(5000));
            seed(&conn, &flat, dec!(0));
        }

        let first = run_period(db.clone(), PERIOD, &opts()).await.expect("first run");
        assert_eq!(first.computed, 1);
        let second = run_period(db.clone(), PERIOD, &opts()).await.expect("second run");
        assert_eq!(second.computed, 0);
        assert_eq!(second.skipped, 1);
    }

    #[tokio::test]
    async fn test_advance_ledger_advances() {
        let (db, partner_id) = db();
        let id = {
            let conn = db.lock().await;
            let mut advance = Agreement::new(0, partner_id, "Advance", PaymentModel::Advance);
            advance.advance_amount = Some(dec!(3000));
            advance.advance_recoupment_rate_percent = Some(dec!(50));
            seed(&conn, &advance, dec!(4000))
        };

        let report = run_period(db.clone(), PERIOD, &opts()).await.expect("run");
        assert_eq!(report.total_payable, dec!(2000));

        let conn = db.lock().await;
        let ledger = ledgers::get(&conn, id).expect("ledger").expect("present");
        assert_eq!(ledger.recouped, dec!(2000));
    }

    #[tokio::test]
    async fn test_initiation_fee_billed_once() {
        let (db, partner_id) = db();
        let id = {
            let conn = db.lock().await;
            let mut flat = Agreement::new(0, partner_id, "Flat", PaymentModel::FlatFee);
            flat.flat_fee_amount = Some(dec!(100));
            flat.initiation_fee = Some(dec!(250));
            flat.initiation_fee_due_days = Some(30);
            let id = seed(&conn, &flat, dec!(0));
            financials::upsert(&conn, id, "2026-10", &financials(dec!(0)), 100)
                .expect("next period");
            id
        };

        let first = run_period(db.clone(), PERIOD, &opts()).await.expect("run");
        assert_eq!(first.initiation_fees_billed, dec!(250));
        let second = run_period(db.clone(), "2026-10", &opts()).await.expect("run");
        assert_eq!(second.initiation_fees_billed, dec!(0));

        let conn = db.lock().await;
        assert!(agreements::initiation_fee_billed(&conn, id).expect("billed"));
    }

    #[tokio::test]
    async fn test_corrupt_rows_fail_alone() {
        let (db, partner_id) = db();
        let (good, bad_financials, bad_month, bad_ledger) = {
            let conn = db.lock().await;
            let mut flat = Agreement::new(0, partner_id, "Flat", PaymentModel::FlatFee);
            flat.flat_fee_amount = Some(dec!(5000));
            let mut guaranteed = Agreement::new(0, partner_id, "Guaranteed", PaymentModel::FlatFee);
            guaranteed.flat_fee_amount = Some(dec!(100));
            let mut advance = Agreement::new(0, partner_id, "Advance", PaymentModel::Advance);
            advance.advance_amount = Some(dec!(3000));
            advance.advance_recoupment_rate_percent = Some(dec!(50));

            let good = seed(&conn, &flat, dec!(0));
            let bad_financials = seed(&conn, &flat, dec!(0));
            let bad_month = seed(&conn, &guaranteed, dec!(0));
            let bad_ledger = seed(&conn, &advance, dec!(4000));

            conn.execute(
                "UPDATE period_financials SET gross_revenue = 'n/a' WHERE agreement_id = ?1",
                [bad_financials],
            )
            .expect("corrupt financials");
            conn.execute(
                "UPDATE agreements SET minimum_guarantee_start_month = -1 WHERE agreement_id = ?1",
                [bad_month],
            )
            .expect("corrupt start month");
            ledgers::open(&conn, bad_ledger, dec!(3000), 100).expect("open ledger");
            conn.execute(
                "UPDATE advance_ledgers SET recouped = 'lots' WHERE agreement_id = ?1",
                [bad_ledger],
            )
            .expect("corrupt ledger");
            (good, bad_financials, bad_month, bad_ledger)
        };

        let report = run_period(db.clone(), PERIOD, &opts())
            .await
            .expect("run should not abort");
        assert_eq!(report.computed, 1);
        assert_eq!(report.failed, 3);
        assert_eq!(report.total_payable, dec!(5000));
        assert_eq!(report.outcomes[0].agreement_id, good);
        assert_eq!(report.outcomes[0].status, StatementStatus::Computed);

        let conn = db.lock().await;
        for (id, column) in [
            (bad_financials, "gross_revenue"),
            (bad_ledger, "recouped"),
        ] {
            let stored = statements::get(&conn, id, PERIOD).expect("get").expect("present");
            assert_eq!(stored.status, StatementStatus::Failed);
            assert!(stored.error.as_deref().is_some_and(|e| e.contains(column)));
        }
        let stored = statements::get(&conn, bad_month, PERIOD).expect("get").expect("present");
        assert_eq!(stored.status, StatementStatus::Failed);
        assert!(stored.error.is_some());
    }

    #[tokio::test]
    async fn test_initiation_fee_waits_for_due_date() {
        let (db, partner_id) = db();
        let id = {
            let conn = db.lock().await;
            let mut flat = Agreement::new(0, partner_id, "Flat", PaymentModel::FlatFee);
            flat.flat_fee_amount = Some(dec!(100));
            flat.initiation_fee = Some(dec!(250));
            flat.initiation_fee_due_days = Some(30);
            flat.effective_at = opts().now;
            let id = seed(&conn, &flat, dec!(0));
            financials::upsert(&conn, id, "2026-10", &financials(dec!(0)), 100)
                .expect("next period");
            id
        };

        let first = run_period(db.clone(), PERIOD, &opts()).await.expect("run");
        assert_eq!(first.computed, 1);
        assert_eq!(first.initiation_fees_billed, dec!(0));
        {
            let conn = db.lock().await;
            assert!(!agreements::initiation_fee_billed(&conn, id).expect("billed"));
        }

        let later = RunOptions {
            now: opts().now + 31 * atlas_types::SECONDS_PER_DAY,
            ..opts()
        };
        let second = run_period(db.clone(), "2026-10", &later).await.expect("run");
        assert_eq!(second.initiation_fees_billed, dec!(250));

        let conn = db.lock().await;
        assert!(agreements::initiation_fee_billed(&conn, id).expect("billed"));
    }

    #[tokio::test]
    async fn test_empty_period_rejected() {
        let (db, _) = db();
        assert!(matches!(
            run_period(db, " ", &opts()).await,
            Err(BatchError::Options(_))
        ));
    }
}
