//! Integration tests for the salescope analytics engine
//!
//! These tests seed an in-memory star schema with a small, hand-computed
//! dataset and verify the end-to-end agent behavior: aggregates, growth
//! math, hierarchy navigation, anomaly flagging, and plan execution.

use salescope_core::agents::{
    Agent, AgentInput, AnomalyDetectionAgent, CubeOperationsAgent, DimensionNavigatorAgent,
    KpiCalculatorAgent,
};
use salescope_core::db::Database;
use salescope_core::types::{AgentOutput, Cell};
use salescope_core::Orchestrator;

/// Seeded yearly revenue totals: 2022 = 100, 2023 = 150, 2024 = 120.
/// Europe carries 260 across all years, North America 110.
fn seeded_db() -> Database {
    let db = Database::open_in_memory().unwrap();
    db.migrate().unwrap();

    let conn = db.connection();
    conn.execute_batch(
        r#"
        INSERT INTO dim_date
            (date_key, full_date, year, quarter, quarter_num, month, month_name, week_of_year, day_of_week, is_weekend)
        VALUES
            (20220115, '2022-01-15', 2022, 'Q1', 1, 1, 'January', 2, 6, 1),
            (20220715, '2022-07-15', 2022, 'Q3', 3, 7, 'July',    28, 5, 0),
            (20230115, '2023-01-15', 2023, 'Q1', 1, 1, 'January', 2, 7, 1),
            (20230415, '2023-04-15', 2023, 'Q2', 2, 4, 'April',   15, 6, 1),
            (20240115, '2024-01-15', 2024, 'Q1', 1, 1, 'January', 3, 1, 0),
            (20240815, '2024-08-15', 2024, 'Q3', 3, 8, 'August',  33, 4, 0);

        INSERT INTO dim_geography (geo_key, region, country) VALUES
            (1, 'Europe', 'Germany'),
            (2, 'Europe', 'France'),
            (3, 'North America', 'USA'),
            (4, 'Asia Pacific', 'Japan');

        INSERT INTO dim_product (product_key, category, subcategory) VALUES
            (1, 'Electronics', 'Laptops'),
            (2, 'Electronics', 'Phones'),
            (3, 'Furniture', 'Chairs');

        INSERT INTO dim_customer (customer_key, customer_segment) VALUES
            (1, 'Consumer'),
            (2, 'Corporate');

        INSERT INTO fact_sales
            (sale_id, order_id, date_key, geo_key, product_key, customer_key,
             quantity, unit_price, revenue, cost, profit, profit_margin)
        VALUES
            (1, 'ORD-1', 20220115, 1, 1, 1, 2, 50.0, 100.0, 60.0, 40.0, 40.0),
            (2, 'ORD-2', 20230115, 1, 1, 1, 3, 30.0, 90.0,  54.0, 36.0, 40.0),
            (3, 'ORD-3', 20230415, 3, 2, 2, 1, 60.0, 60.0,  36.0, 24.0, 40.0),
            (4, 'ORD-4', 20240115, 2, 1, 1, 1, 70.0, 70.0,  42.0, 28.0, 40.0),
            (5, 'ORD-5', 20240815, 3, 3, 2, 2, 25.0, 50.0,  30.0, 20.0, 40.0);
        "#,
    )
    .unwrap();
    drop(conn);

    db
}

fn run_agent(
    agent: &dyn Agent,
    db: &Database,
    operation: &str,
    parameters: serde_json::Value,
) -> AgentOutput {
    let input = AgentInput {
        operation,
        parameters: &parameters,
        context: Some("test"),
    };
    agent.run(&input, db).unwrap()
}

// ============================================
// Storage
// ============================================

#[test]
fn test_open_on_disk_creates_parent_dirs() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("nested/salescope.db");

    let db = Database::open(&path).unwrap();
    db.migrate().unwrap();
    assert!(path.exists());

    let table = db
        .query("SELECT COUNT(*) AS n FROM fact_sales", &[])
        .unwrap();
    assert_eq!(table.get(0, "n"), Some(&Cell::Int(0)));
}

// ============================================
// KPI calculations
// ============================================

#[test]
fn test_yoy_growth_series() {
    let db = seeded_db();
    let output = run_agent(&KpiCalculatorAgent, &db, "yoy_growth", serde_json::json!({}));
    let data = output.data.unwrap();

    assert_eq!(data.columns, vec!["year", "total_revenue", "yoy_growth_pct"]);
    assert_eq!(data.len(), 3);

    // 100 -> 150 -> 120: first year has no growth figure
    assert_eq!(data.get(0, "yoy_growth_pct"), Some(&Cell::Null));
    assert_eq!(data.f64_at(1, "yoy_growth_pct"), Some(50.0));
    assert_eq!(data.f64_at(2, "yoy_growth_pct"), Some(-20.0));
    assert!(output.summary.contains("-20.00%"));
}

#[test]
fn test_mom_change_within_year() {
    let db = seeded_db();
    let output = run_agent(
        &KpiCalculatorAgent,
        &db,
        "mom_change",
        serde_json::json!({"year": 2023}),
    );
    let data = output.data.unwrap();

    assert_eq!(data.len(), 2);
    assert_eq!(data.get(0, "mom_change_pct"), Some(&Cell::Null));
    // January 90 -> April 60
    assert_eq!(data.f64_at(1, "mom_change_pct"), Some(-33.33));
}

#[test]
fn test_compare_periods_grouped_by_region() {
    let db = seeded_db();
    let output = run_agent(
        &KpiCalculatorAgent,
        &db,
        "compare_periods",
        serde_json::json!({
            "period_a": {"year": 2023},
            "period_b": {"year": 2024},
            "group_by": "region",
        }),
    );
    let data = output.data.unwrap();

    // Both regions sold in both years
    assert_eq!(data.len(), 2);
    let europe = data
        .rows
        .iter()
        .position(|r| r[0].as_str() == Some("Europe"))
        .unwrap();
    assert_eq!(data.f64_at(europe, "revenue_year2023"), Some(90.0));
    assert_eq!(data.f64_at(europe, "revenue_year2024"), Some(70.0));
    assert_eq!(data.f64_at(europe, "revenue_change"), Some(-20.0));
    assert_eq!(data.f64_at(europe, "revenue_change_pct"), Some(-22.22));
}

#[test]
fn test_top_n_ranks_and_truncates() {
    let db = seeded_db();
    let output = run_agent(
        &KpiCalculatorAgent,
        &db,
        "top_n",
        serde_json::json!({"n": 2, "dimension": "region", "measure": "revenue"}),
    );
    let data = output.data.unwrap();

    assert_eq!(data.len(), 2);
    assert_eq!(data.get(0, "rank"), Some(&Cell::Int(1)));
    assert_eq!(data.get(1, "rank"), Some(&Cell::Int(2)));
    assert_eq!(data.get(0, "dimension").unwrap().as_str(), Some("Europe"));
    assert_eq!(data.f64_at(0, "metric"), Some(260.0));
}

#[test]
fn test_top_n_measure_ties_rank_in_dimension_order() {
    let db = Database::open_in_memory().unwrap();
    db.migrate().unwrap();

    // Two countries with identical revenue: rank order must come from the
    // dimension tie-break, not storage order.
    let conn = db.connection();
    conn.execute_batch(
        r#"
        INSERT INTO dim_date
            (date_key, full_date, year, quarter, quarter_num, month, month_name, week_of_year, day_of_week, is_weekend)
        VALUES (20240101, '2024-01-01', 2024, 'Q1', 1, 1, 'January', 1, 1, 0);
        INSERT INTO dim_geography (geo_key, region, country) VALUES
            (1, 'Europe', 'Germany'),
            (2, 'Europe', 'France');
        INSERT INTO dim_product (product_key, category, subcategory) VALUES (1, 'Electronics', 'Laptops');
        INSERT INTO dim_customer (customer_key, customer_segment) VALUES (1, 'Consumer');
        INSERT INTO fact_sales
            (sale_id, order_id, date_key, geo_key, product_key, customer_key,
             quantity, unit_price, revenue, cost, profit, profit_margin)
        VALUES
            (1, 'ORD-1', 20240101, 1, 1, 1, 1, 100.0, 100.0, 60.0, 40.0, 40.0),
            (2, 'ORD-2', 20240101, 2, 1, 1, 1, 100.0, 100.0, 60.0, 40.0, 40.0);
        "#,
    )
    .unwrap();
    drop(conn);

    let output = run_agent(
        &KpiCalculatorAgent,
        &db,
        "top_n",
        serde_json::json!({"n": 2, "dimension": "country", "measure": "revenue"}),
    );
    let data = output.data.unwrap();

    assert_eq!(data.len(), 2);
    assert_eq!(data.f64_at(0, "metric"), data.f64_at(1, "metric"));
    assert_eq!(data.get(0, "rank"), Some(&Cell::Int(1)));
    assert_eq!(data.get(0, "dimension").unwrap().as_str(), Some("France"));
    assert_eq!(data.get(1, "rank"), Some(&Cell::Int(2)));
    assert_eq!(data.get(1, "dimension").unwrap().as_str(), Some("Germany"));
}

#[test]
fn test_unknown_measure_is_an_error() {
    let db = seeded_db();
    let parameters = serde_json::json!({"measure": "velocity"});
    let input = AgentInput {
        operation: "top_n",
        parameters: &parameters,
        context: None,
    };
    assert!(KpiCalculatorAgent.run(&input, &db).is_err());
}

// ============================================
// Hierarchy navigation
// ============================================

#[test]
fn test_drill_down_unknown_level_goes_finest() {
    let db = seeded_db();
    let output = run_agent(
        &DimensionNavigatorAgent,
        &db,
        "drill_down",
        serde_json::json!({"hierarchy": "time", "to_level": "decade"}),
    );
    let data = output.data.unwrap();

    // Finest time level is month: five distinct (year, quarter, month)
    assert_eq!(output.metadata["level"], "month");
    assert_eq!(data.len(), 5);
    assert_eq!(
        data.columns,
        vec!["year", "quarter", "month", "total_revenue", "total_profit", "avg_margin", "total_qty", "transactions"]
    );
}

#[test]
fn test_roll_up_to_year_preserves_totals() {
    let db = seeded_db();
    let output = run_agent(
        &DimensionNavigatorAgent,
        &db,
        "roll_up",
        serde_json::json!({"hierarchy": "time", "to_level": "year"}),
    );
    let data = output.data.unwrap();

    assert_eq!(data.len(), 3);
    assert_eq!(data.column_sum("total_revenue"), 370.0);
    // ordered by revenue descending
    assert_eq!(data.f64_at(0, "total_revenue"), Some(150.0));
}

#[test]
fn test_group_by_region_matches_raw_totals() {
    let db = seeded_db();
    let output = run_agent(
        &DimensionNavigatorAgent,
        &db,
        "group",
        serde_json::json!({"dimensions": ["region"]}),
    );
    let data = output.data.unwrap();

    assert_eq!(data.len(), 2);
    assert_eq!(data.get(0, "region").unwrap().as_str(), Some("Europe"));
    assert_eq!(data.f64_at(0, "total_revenue"), Some(260.0));
    assert_eq!(data.f64_at(1, "total_revenue"), Some(110.0));
}

// ============================================
// Cube operations
// ============================================

#[test]
fn test_slice_by_year() {
    let db = seeded_db();
    let output = run_agent(
        &CubeOperationsAgent,
        &db,
        "slice",
        serde_json::json!({"filter": {"year": 2023}, "group_by": ["region"]}),
    );
    let data = output.data.unwrap();

    assert_eq!(data.column_sum("total_revenue"), 150.0);
    assert!(output.summary.contains("year=2023"));
}

#[test]
fn test_dice_drops_unknown_filter_dimension() {
    let db = seeded_db();
    let output = run_agent(
        &CubeOperationsAgent,
        &db,
        "dice",
        serde_json::json!({
            "filters": {"year": 2024, "galaxy": "Andromeda"},
            "group_by": ["country"],
        }),
    );
    let data = output.data.unwrap();

    // unknown dimension silently ignored, year filter still applied
    assert_eq!(data.column_sum("total_revenue"), 120.0);
}

#[test]
fn test_pivot_missing_cell_is_null() {
    let db = seeded_db();
    let output = run_agent(
        &CubeOperationsAgent,
        &db,
        "pivot",
        serde_json::json!({"row_dim": "region", "col_dim": "year", "measure": "revenue"}),
    );
    let data = output.data.unwrap();

    assert_eq!(data.columns[0], "region");
    let na = data
        .rows
        .iter()
        .position(|r| r[0].as_str() == Some("North America"))
        .unwrap();
    // North America sold nothing in 2022: absent, not zero
    assert_eq!(data.get(na, "2022"), Some(&Cell::Null));
    assert_eq!(data.f64_at(na, "2023"), Some(60.0));
}

#[test]
fn test_drill_through_respects_limit() {
    let db = seeded_db();
    let output = run_agent(
        &CubeOperationsAgent,
        &db,
        "drill_through",
        serde_json::json!({"filters": {}, "limit": 2}),
    );
    assert_eq!(output.data.unwrap().len(), 2);
}

// ============================================
// Anomaly detection
// ============================================

#[test]
fn test_monthly_anomaly_flags_revenue_spike() {
    let db = seeded_db();
    // One massive month on top of the calm baseline
    db.connection()
        .execute(
            "INSERT INTO fact_sales
                (sale_id, order_id, date_key, geo_key, product_key, customer_key,
                 quantity, unit_price, revenue, cost, profit, profit_margin)
             VALUES (99, 'ORD-99', 20220715, 1, 1, 1, 10, 100.0, 1000.0, 600.0, 400.0, 40.0)",
            [],
        )
        .unwrap();

    let output = run_agent(&AnomalyDetectionAgent, &db, "monthly_anomaly", serde_json::json!({}));
    let data = output.data.unwrap();

    let flagged: Vec<usize> = data
        .rows
        .iter()
        .enumerate()
        .filter(|(_, r)| {
            let idx = data.column_index("anomaly").unwrap();
            r[idx] == Cell::Int(1)
        })
        .map(|(i, _)| i)
        .collect();
    assert_eq!(flagged.len(), 1);
    assert_eq!(
        data.get(flagged[0], "anomaly_type"),
        Some(&Cell::Text("High".to_string()))
    );
    assert_eq!(data.get(flagged[0], "month_name").unwrap().as_str(), Some("July"));
    assert_eq!(output.metadata["anomaly_count"], 1);
}

#[test]
fn test_monthly_anomaly_constant_series_flags_nothing() {
    let db = Database::open_in_memory().unwrap();
    db.migrate().unwrap();

    // Identical revenue every month: zero variance, so no Z-score can
    // cross the threshold.
    let conn = db.connection();
    conn.execute_batch(
        r#"
        INSERT INTO dim_date
            (date_key, full_date, year, quarter, quarter_num, month, month_name, week_of_year, day_of_week, is_weekend)
        VALUES
            (20240115, '2024-01-15', 2024, 'Q1', 1, 1, 'January',  3, 1, 0),
            (20240215, '2024-02-15', 2024, 'Q1', 1, 2, 'February', 7, 4, 0),
            (20240315, '2024-03-15', 2024, 'Q1', 1, 3, 'March',   11, 5, 0);
        INSERT INTO dim_geography (geo_key, region, country) VALUES (1, 'Europe', 'Germany');
        INSERT INTO dim_product (product_key, category, subcategory) VALUES (1, 'Electronics', 'Laptops');
        INSERT INTO dim_customer (customer_key, customer_segment) VALUES (1, 'Consumer');
        INSERT INTO fact_sales
            (sale_id, order_id, date_key, geo_key, product_key, customer_key,
             quantity, unit_price, revenue, cost, profit, profit_margin)
        VALUES
            (1, 'ORD-1', 20240115, 1, 1, 1, 1, 100.0, 100.0, 60.0, 40.0, 40.0),
            (2, 'ORD-2', 20240215, 1, 1, 1, 1, 100.0, 100.0, 60.0, 40.0, 40.0),
            (3, 'ORD-3', 20240315, 1, 1, 1, 1, 100.0, 100.0, 60.0, 40.0, 40.0);
        "#,
    )
    .unwrap();
    drop(conn);

    let output = run_agent(&AnomalyDetectionAgent, &db, "monthly_anomaly", serde_json::json!({}));
    let data = output.data.unwrap();

    assert_eq!(data.len(), 3);
    let anomaly_idx = data.column_index("anomaly").unwrap();
    assert!(data.rows.iter().all(|r| r[anomaly_idx] == Cell::Int(0)));
    assert!(data.column_values("z_score").iter().all(|z| *z == 0.0));
    assert_eq!(output.metadata["anomaly_count"], 0);
}

#[test]
fn test_product_anomaly_iqr_fence() {
    let db = Database::open_in_memory().unwrap();
    db.migrate().unwrap();

    // Five subcategories with avg margins [10, 12, 11, 13, 90]:
    // Q1=11, Q3=13, fence = [8, 16], only 90 is outside.
    let conn = db.connection();
    conn.execute_batch(
        r#"
        INSERT INTO dim_date
            (date_key, full_date, year, quarter, quarter_num, month, month_name, week_of_year, day_of_week, is_weekend)
        VALUES (20240101, '2024-01-01', 2024, 'Q1', 1, 1, 'January', 1, 1, 0);
        INSERT INTO dim_geography (geo_key, region, country) VALUES (1, 'Europe', 'Germany');
        INSERT INTO dim_customer (customer_key, customer_segment) VALUES (1, 'Consumer');
        INSERT INTO dim_product (product_key, category, subcategory) VALUES
            (1, 'Electronics', 'Laptops'),
            (2, 'Electronics', 'Phones'),
            (3, 'Electronics', 'Tablets'),
            (4, 'Furniture', 'Chairs'),
            (5, 'Furniture', 'Desks');
        INSERT INTO fact_sales
            (sale_id, order_id, date_key, geo_key, product_key, customer_key,
             quantity, unit_price, revenue, cost, profit, profit_margin)
        VALUES
            (1, 'A', 20240101, 1, 1, 1, 1, 10.0, 10.0, 9.0, 1.0, 10.0),
            (2, 'B', 20240101, 1, 2, 1, 1, 10.0, 10.0, 8.8, 1.2, 12.0),
            (3, 'C', 20240101, 1, 3, 1, 1, 10.0, 10.0, 8.9, 1.1, 11.0),
            (4, 'D', 20240101, 1, 4, 1, 1, 10.0, 10.0, 8.7, 1.3, 13.0),
            (5, 'E', 20240101, 1, 5, 1, 1, 10.0, 10.0, 1.0, 9.0, 90.0);
        "#,
    )
    .unwrap();
    drop(conn);

    let output = run_agent(&AnomalyDetectionAgent, &db, "product_anomaly", serde_json::json!({}));
    let data = output.data.unwrap();

    let anomaly_idx = data.column_index("anomaly").unwrap();
    let flagged: Vec<&Vec<Cell>> = data
        .rows
        .iter()
        .filter(|r| r[anomaly_idx] == Cell::Int(1))
        .collect();
    assert_eq!(flagged.len(), 1);

    let type_idx = data.column_index("anomaly_type").unwrap();
    assert_eq!(flagged[0][type_idx], Cell::Text("High margin".to_string()));
    let sub_idx = data.column_index("subcategory").unwrap();
    assert_eq!(flagged[0][sub_idx], Cell::Text("Desks".to_string()));
}

// ============================================
// End-to-end plan execution
// ============================================

#[tokio::test]
async fn test_process_comparison_query() {
    let db = seeded_db();
    let mut session = Orchestrator::rules_only(db);

    let result = session.process("compare 2023 and 2024 by region").await;

    assert!(result.intent.contains("compare 2023 and 2024 by region"));
    assert_eq!(result.steps_executed.len(), 2);
    assert_eq!(result.steps_executed[0].operation, "compare_periods");
    assert_eq!(result.steps_executed[1].operation, "executive_summary");
    assert!(result.steps_executed.iter().all(|s| s.success));
    assert!(result.narrative.contains("Comparison: year2023 vs year2024"));
    assert_eq!(result.suggested_followups.len(), 3);
}

#[tokio::test]
async fn test_process_records_and_resets_history() {
    let db = seeded_db();
    let mut session = Orchestrator::rules_only(db);

    session.process("show revenue by region").await;
    assert_eq!(session.history_len(), 2);

    session.reset_context();
    assert_eq!(session.history_len(), 0);
}

#[tokio::test]
async fn test_vague_query_falls_back_to_overall_summary() {
    let db = seeded_db();
    let mut session = Orchestrator::rules_only(db);

    let result = session.process("tell me something interesting").await;
    assert_eq!(result.steps_executed[0].operation, "summary");
    assert!(result.narrative.contains("Overall:"));
}

#[tokio::test]
async fn test_process_is_idempotent_per_query() {
    let db = seeded_db();
    let mut session = Orchestrator::rules_only(db);

    let first = session.process("top 2 regions by revenue").await;
    let second = session.process("top 2 regions by revenue").await;
    assert_eq!(first.narrative, second.narrative);
    assert_eq!(first.steps_executed.len(), second.steps_executed.len());
}
