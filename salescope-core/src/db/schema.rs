//! Database schema and migrations
//!
//! Uses SQLite with embedded migrations managed via PRAGMA user_version.
//!
//! The schema is a fixed sales star: one fact table with foreign keys into
//! four dimension tables, plus a denormalized convenience view.

use rusqlite::Connection;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// SQL migrations, indexed by version number
const MIGRATIONS: &[&str] = &[
    // Version 1: Star schema
    r#"
    -- ============================================
    -- Dimension tables
    -- ============================================

    CREATE TABLE IF NOT EXISTS dim_date (
        date_key     INTEGER PRIMARY KEY,
        full_date    TEXT NOT NULL,
        year         INTEGER NOT NULL,
        quarter      TEXT NOT NULL,
        quarter_num  INTEGER NOT NULL,
        month        INTEGER NOT NULL,
        month_name   TEXT NOT NULL,
        week_of_year INTEGER NOT NULL,
        day_of_week  INTEGER NOT NULL,
        is_weekend   INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS dim_geography (
        geo_key INTEGER PRIMARY KEY,
        region  TEXT NOT NULL,
        country TEXT NOT NULL,
        UNIQUE(region, country)
    );

    CREATE TABLE IF NOT EXISTS dim_product (
        product_key INTEGER PRIMARY KEY,
        category    TEXT NOT NULL,
        subcategory TEXT NOT NULL,
        UNIQUE(category, subcategory)
    );

    CREATE TABLE IF NOT EXISTS dim_customer (
        customer_key     INTEGER PRIMARY KEY,
        customer_segment TEXT NOT NULL UNIQUE
    );

    -- ============================================
    -- Fact table
    -- ============================================

    CREATE TABLE IF NOT EXISTS fact_sales (
        sale_id       INTEGER PRIMARY KEY,
        order_id      TEXT NOT NULL,
        date_key      INTEGER NOT NULL REFERENCES dim_date(date_key),
        geo_key       INTEGER NOT NULL REFERENCES dim_geography(geo_key),
        product_key   INTEGER NOT NULL REFERENCES dim_product(product_key),
        customer_key  INTEGER NOT NULL REFERENCES dim_customer(customer_key),
        quantity      INTEGER NOT NULL,
        unit_price    REAL NOT NULL,
        revenue       REAL NOT NULL,
        cost          REAL NOT NULL,
        profit        REAL NOT NULL,
        profit_margin REAL NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_fact_date     ON fact_sales(date_key);
    CREATE INDEX IF NOT EXISTS idx_fact_geo      ON fact_sales(geo_key);
    CREATE INDEX IF NOT EXISTS idx_fact_product  ON fact_sales(product_key);
    CREATE INDEX IF NOT EXISTS idx_fact_customer ON fact_sales(customer_key);

    -- Denormalized view for ad-hoc inspection
    CREATE VIEW IF NOT EXISTS v_sales_full AS
    SELECT
        f.order_id,
        d.full_date   AS order_date,
        d.year,
        d.quarter,
        d.quarter_num,
        d.month,
        d.month_name,
        g.region,
        g.country,
        p.category,
        p.subcategory,
        c.customer_segment,
        f.quantity,
        f.unit_price,
        f.revenue,
        f.cost,
        f.profit,
        f.profit_margin
    FROM fact_sales f
    JOIN dim_date      d ON f.date_key     = d.date_key
    JOIN dim_geography g ON f.geo_key      = g.geo_key
    JOIN dim_product   p ON f.product_key  = p.product_key
    JOIN dim_customer  c ON f.customer_key = c.customer_key;
    "#,
];

/// Run all pending migrations
pub fn run_migrations(conn: &Connection) -> crate::error::Result<()> {
    let current_version: i32 = conn
        .query_row("PRAGMA user_version", [], |r| r.get(0))
        .unwrap_or(0);

    tracing::info!(
        current_version,
        target_version = SCHEMA_VERSION,
        "Checking database migrations"
    );

    for (i, migration) in MIGRATIONS.iter().enumerate() {
        let version = (i + 1) as i32;
        if version > current_version {
            tracing::info!(version, "Running migration");
            conn.execute_batch(migration)?;
            conn.execute(&format!("PRAGMA user_version = {}", version), [])?;
        }
    }

    if current_version < SCHEMA_VERSION {
        tracing::info!(
            from = current_version,
            to = SCHEMA_VERSION,
            "Migrations complete"
        );
    }

    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> crate::error::Result<i32> {
    let version: i32 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
    Ok(version)
}
