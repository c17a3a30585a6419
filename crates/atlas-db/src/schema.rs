//! SQL schema definitions.

/// Complete schema for Atlas v1 database.
pub const SCHEMA_V1: &str = r#"
-- ============================================================
-- Partners & Agreements
-- ============================================================

CREATE TABLE IF NOT EXISTS partners (
    partner_id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    contact_email TEXT,
    created_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS agreements (
    agreement_id INTEGER PRIMARY KEY,
    partner_id INTEGER NOT NULL REFERENCES partners(partner_id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    payment_model TEXT NOT NULL,
    royalty_rate_percent TEXT,
    flat_fee_amount TEXT,
    advance_amount TEXT,
    advance_recoupment_rate_percent TEXT,
    marketing_attribution_cap_percent TEXT,
    initiation_fee TEXT,
    initiation_fee_due_days INTEGER,
    initiation_fee_billed_at INTEGER,
    minimum_guarantee_amount TEXT,
    minimum_guarantee_start_month INTEGER,
    tier_basis TEXT NOT NULL DEFAULT 'net_revenue',
    effective_at INTEGER NOT NULL,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_agreements_partner ON agreements(partner_id);

-- Stored in ascending threshold order; `position` preserves that order.
CREATE TABLE IF NOT EXISTS royalty_groups (
    agreement_id INTEGER NOT NULL REFERENCES agreements(agreement_id) ON DELETE CASCADE,
    position INTEGER NOT NULL,
    name TEXT NOT NULL,
    rate TEXT NOT NULL,
    threshold_from TEXT NOT NULL,
    threshold_to TEXT,
    PRIMARY KEY (agreement_id, position)
);

CREATE TABLE IF NOT EXISTS revenue_definitions (
    agreement_id INTEGER NOT NULL REFERENCES agreements(agreement_id) ON DELETE CASCADE,
    category TEXT NOT NULL,
    included INTEGER NOT NULL,
    PRIMARY KEY (agreement_id, category)
);

-- ============================================================
-- Reporting
-- ============================================================

CREATE TABLE IF NOT EXISTS period_financials (
    agreement_id INTEGER NOT NULL REFERENCES agreements(agreement_id) ON DELETE CASCADE,
    period TEXT NOT NULL,
    gross_revenue TEXT NOT NULL,
    cogs TEXT NOT NULL,
    platform_fees TEXT NOT NULL,
    returns TEXT NOT NULL,
    marketing_spend TEXT NOT NULL,
    units_sold INTEGER,
    period_month_index INTEGER NOT NULL,
    recorded_at INTEGER NOT NULL,
    PRIMARY KEY (agreement_id, period)
);

CREATE INDEX IF NOT EXISTS idx_financials_period ON period_financials(period);

CREATE TABLE IF NOT EXISTS advance_ledgers (
    agreement_id INTEGER PRIMARY KEY REFERENCES agreements(agreement_id) ON DELETE CASCADE,
    advance_amount TEXT NOT NULL,
    recouped TEXT NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS statements (
    agreement_id INTEGER NOT NULL REFERENCES agreements(agreement_id) ON DELETE CASCADE,
    period TEXT NOT NULL,
    status TEXT NOT NULL,
    result TEXT,
    final_payment TEXT,
    error TEXT,
    created_at INTEGER NOT NULL,
    PRIMARY KEY (agreement_id, period)
);

CREATE INDEX IF NOT EXISTS idx_statements_period ON statements(period);

-- ============================================================
-- Settings
-- ============================================================

CREATE TABLE IF NOT EXISTS settings (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;
