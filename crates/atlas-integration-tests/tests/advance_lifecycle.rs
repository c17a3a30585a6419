//! Integration test: multi-period advance recoupment and initiation fee.
//!
//! 1. Store an advance agreement with an initiation fee
//! 2. Run consecutive periods and verify the ledger balance after each
//! 3. Verify recoupment stops at the advance amount
//! 4. Verify the initiation fee is billed in the first run only and that
//!    its schedule reflects the billing

use std::sync::Arc;

use atlas_db::queries::{agreements, financials, ledgers, partners, statements};
use atlas_royalty::schedule;
use atlas_statements::batch::{self, RunOptions};
use atlas_types::agreement::{Agreement, PaymentModel};
use atlas_types::financials::PeriodFinancials;
use atlas_types::SECONDS_PER_DAY;
use rust_decimal_macros::dec;
use tokio::sync::Mutex;

/// Agreement start date.
const EFFECTIVE_AT: u64 = 1_780_000_000;

const PERIODS: [&str; 4] = ["2026-07", "2026-08", "2026-09", "2026-10"];

fn sales(month: u32) -> PeriodFinancials {
    PeriodFinancials {
        gross_revenue: dec!(16000),
        cogs: dec!(5000),
        platform_fees: dec!(640),
        returns: dec!(0),
        marketing_spend: dec!(1000),
        units_sold: Some(1200),
        period_month_index: month,
    }
}

#[tokio::test]
async fn advance_recouped_across_periods() {
    // =========================================================
    // Setup: 10,000 advance recouped at 25% of net revenue
    // =========================================================
    let conn = atlas_db::open_memory().expect("open DB");
    let partner = partners::insert(&conn, "Meridian Archive", None, EFFECTIVE_AT)
        .expect("partner insert");

    let mut advance = Agreement::new(0, partner, "Archive advance", PaymentModel::Advance);
    advance.advance_amount = Some(dec!(10000));
    advance.advance_recoupment_rate_percent = Some(dec!(25));
    advance.initiation_fee = Some(dec!(750));
    advance.initiation_fee_due_days = Some(14);
    advance.effective_at = EFFECTIVE_AT;
    let id = agreements::insert(&conn, &advance, EFFECTIVE_AT).expect("agreement insert");

    for (i, period) in PERIODS.iter().enumerate() {
        let month = u32::try_from(i + 1).expect("month index");
        financials::upsert(&conn, id, period, &sales(month), EFFECTIVE_AT)
            .expect("financials upsert");
    }

    // Fee is outstanding and overdue before the first run.
    let now = EFFECTIVE_AT + 30 * SECONDS_PER_DAY;
    let status = schedule::fee_status(&advance, false, now)
        .expect("fee status")
        .expect("agreement has a fee");
    assert_eq!(status.due_at, EFFECTIVE_AT + 14 * SECONDS_PER_DAY);
    assert!(status.outstanding);
    assert!(status.overdue);

    let db = Arc::new(Mutex::new(conn));

    // =========================================================
    // Run each period in order
    // =========================================================
    let expected = [
        (dec!(4000), dec!(4000), dec!(750)),
        (dec!(4000), dec!(8000), dec!(0)),
        (dec!(2000), dec!(10000), dec!(0)),
        (dec!(0), dec!(10000), dec!(0)),
    ];

    for (period, (payment, recouped, fee)) in PERIODS.iter().zip(expected) {
        let opts = RunOptions {
            decimal_places: 2,
            max_parallel: 1,
            now,
        };
        let report = batch::run_period(db.clone(), period, &opts)
            .await
            .expect("statement run");
        assert_eq!(report.computed, 1, "period {period}");
        assert_eq!(report.total_payable, payment, "period {period}");
        assert_eq!(report.initiation_fees_billed, fee, "period {period}");

        let conn = db.lock().await;
        let ledger = ledgers::get(&conn, id)
            .expect("ledger query")
            .expect("ledger opened");
        assert_eq!(ledger.recouped, recouped, "period {period}");
        assert!(ledger.recouped <= ledger.advance_amount);

        let result = statements::get(&conn, id, period)
            .expect("statement query")
            .expect("statement stored")
            .result
            .expect("computed result");
        assert_eq!(result.advance_recouped, payment);
        assert_eq!(result.net_revenue, dec!(16000));
    }

    // =========================================================
    // Fee schedule after billing
    // =========================================================
    let conn = db.lock().await;
    let billed = agreements::initiation_fee_billed(&conn, id).expect("billed flag");
    assert!(billed);
    let status = schedule::fee_status(&advance, billed, now)
        .expect("fee status")
        .expect("agreement has a fee");
    assert!(!status.outstanding);
    assert!(!status.overdue);
}

#[tokio::test]
async fn rerun_does_not_recoup_twice() {
    let conn = atlas_db::open_memory().expect("open DB");
    let partner = partners::insert(&conn, "Meridian Archive", None, EFFECTIVE_AT)
        .expect("partner insert");
    let mut advance = Agreement::new(0, partner, "Archive advance", PaymentModel::Advance);
    advance.advance_amount = Some(dec!(10000));
    advance.advance_recoupment_rate_percent = Some(dec!(25));
    let id = agreements::insert(&conn, &advance, EFFECTIVE_AT).expect("agreement insert");
    financials::upsert(&conn, id, PERIODS[0], &sales(1), EFFECTIVE_AT).expect("financials");
    let db = Arc::new(Mutex::new(conn));

    let opts = RunOptions {
        decimal_places: 2,
        max_parallel: 4,
        now: EFFECTIVE_AT,
    };
    for _ in 0..3 {
        batch::run_period(db.clone(), PERIODS[0], &opts)
            .await
            .expect("statement run");
    }

    let conn = db.lock().await;
    let ledger = ledgers::get(&conn, id).expect("ledger").expect("opened");
    assert_eq!(ledger.recouped, dec!(4000));
}
