//! Demo sales dataset used by tests and the `sqlite::memory:` quick-start.

use sqlx::Executor;

use crate::connection::DbPool;

const DEMO_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS customers (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    region TEXT
);

CREATE TABLE IF NOT EXISTS sales_leads (
    id INTEGER PRIMARY KEY,
    lead_id TEXT NOT NULL UNIQUE,
    contact_name TEXT NOT NULL,
    status TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS opportunities (
    id INTEGER PRIMARY KEY,
    opportunity_id TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    status TEXT NOT NULL,
    estimated_value REAL,
    customer_id INTEGER REFERENCES customers(id)
);
"#;

const DEMO_ROWS: &str = r#"
INSERT INTO customers (id, name, region) VALUES
    (1, 'Acme Corp', 'EMEA'),
    (2, 'Globex Industries', 'AMER'),
    (3, 'Initech LLC', 'APAC');

INSERT INTO sales_leads (id, lead_id, contact_name, status) VALUES
    (1, 'LD001', 'Dana Cole', 'New'),
    (2, 'LD002', 'Sam Reyes', 'Qualified'),
    (3, 'LD003', 'Ira Novak', 'Contacted');

INSERT INTO opportunities (id, opportunity_id, name, status, estimated_value, customer_id) VALUES
    (1, 'OPP001', 'Acme - New License', 'Open', 42000.0, 1),
    (2, 'OPP002', 'Globex - Renewal', 'Open', 18500.0, 2),
    (3, 'OPP003', 'Initech - Expansion', 'Closed Won', 9900.0, 3),
    (4, 'OPP004', 'Acme - Support Upgrade', 'Closed Lost', 4100.0, 1);
"#;

/// Creates the demo tables and seeds them. Idempotent on the schema; rows
/// are only inserted into an empty database.
pub async fn apply_demo_dataset(pool: &DbPool) -> Result<(), sqlx::Error> {
    pool.execute(DEMO_SCHEMA).await?;

    let existing =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM customers").fetch_one(pool).await?;
    if existing == 0 {
        pool.execute(DEMO_ROWS).await?;
    }

    Ok(())
}
