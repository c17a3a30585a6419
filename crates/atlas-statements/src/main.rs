//! atlas-statements: monthly royalty statement runner.
//!
//! Usage: `atlas-statements [PERIOD]`. Without an argument the period comes
//! from `[statements] period` in the config file.

use std::sync::Arc;

use tracing::{info, warn};

use atlas_statements::batch::{self, RunOptions};
use atlas_statements::config::StatementsConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Load config
    let config = StatementsConfig::load()?;

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("atlas={}", config.logging.level).parse()?),
        )
        .init();

    let period = std::env::args()
        .nth(1)
        .unwrap_or_else(|| config.statements.period.clone());
    if period.trim().is_empty() {
        anyhow::bail!("no period given; pass one as the first argument or set [statements] period");
    }

    // 2. Open database
    let data_dir = config.data_dir();
    std::fs::create_dir_all(&data_dir)?;
    let conn = atlas_db::open(&config.db_path())?;
    let db = Arc::new(tokio::sync::Mutex::new(conn));
    info!(period = %period, db = %config.db_path().display(), "atlas statements starting");

    // 3. Run
    let opts = RunOptions {
        decimal_places: config.statements.decimal_places,
        max_parallel: config.statements.max_parallel,
        now: atlas_statements::unix_now(),
    };
    let report = batch::run_period(db, &period, &opts).await?;

    info!(
        currency = %report.currency,
        total = %report.total_payable,
        fees = %report.initiation_fees_billed,
        "period totals"
    );
    if report.failed > 0 {
        warn!(failed = report.failed, "some agreements have no statement this period");
    }

    // 4. Report
    if !config.statements.report_path.is_empty() {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(&config.statements.report_path, json)?;
        info!(path = %config.statements.report_path, "run report written");
    }

    Ok(())
}
