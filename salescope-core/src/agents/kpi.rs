//! KPI calculator agent
//!
//! Business KPIs: year-over-year growth, month-over-month change, period
//! comparisons, Top-N rankings, profit margin analysis, and the overall
//! summary.
//!
//! Growth math happens in Rust on top of time-ordered SQL series. Two
//! guards matter throughout: "no prior period" and "zero base" both yield
//! an absent growth value, never a zero and never a division error.

use crate::agents::{normalize_op, parse_params, Agent, AgentInput};
use crate::db::Database;
use crate::error::{Error, Result};
use crate::format::{format_count, format_currency, format_number, format_pct, format_signed_pct};
use crate::query::builder::{measure_expr, BoundQuery, BASE_FROM};
use crate::query::filter::{build_where, dimension_column};
use crate::types::{AgentOutput, Cell, FilterSet, FilterValue, ResultTable, Scalar};
use serde::Deserialize;
use serde_json::json;

/// Agent 3: calculates business KPIs.
pub struct KpiCalculatorAgent;

pub const AGENT_NAME: &str = "KPICalculator";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KpiOp {
    YoyGrowth,
    MomChange,
    ComparePeriods,
    TopN,
    ProfitMargins,
    Summary,
}

impl KpiOp {
    fn parse(op: &str) -> Result<Self> {
        match normalize_op(op).as_str() {
            "yoy" | "yoy_growth" => Ok(KpiOp::YoyGrowth),
            "mom" | "mom_change" => Ok(KpiOp::MomChange),
            "compare" | "compare_periods" => Ok(KpiOp::ComparePeriods),
            "top_n" | "ranking" => Ok(KpiOp::TopN),
            "margins" | "profit_margins" => Ok(KpiOp::ProfitMargins),
            "summary" => Ok(KpiOp::Summary),
            _ => Err(Error::UnknownOperation {
                agent: AGENT_NAME.to_string(),
                operation: op.to_string(),
            }),
        }
    }
}

/// Growth of `current` over `prev` in percent, rounded to 2 decimals.
///
/// Absent when there is no prior period or the base is zero; both are
/// distinct from an observed 0% growth.
fn growth_pct(prev: Option<f64>, current: f64) -> Option<f64> {
    match prev {
        Some(p) if p != 0.0 => Some(round2((current - p) / p * 100.0)),
        _ => None,
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[derive(Debug, Deserialize)]
struct YoyParams {
    #[serde(default)]
    dimension: Option<String>,
    #[serde(default)]
    filters: FilterSet,
}

#[derive(Debug, Deserialize)]
struct MomParams {
    #[serde(default)]
    year: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct CompareParams {
    #[serde(default = "default_period_a")]
    period_a: FilterSet,
    #[serde(default = "default_period_b")]
    period_b: FilterSet,
    #[serde(default)]
    group_by: Option<String>,
}

fn year_period(year: i64) -> FilterSet {
    let mut f = FilterSet::new();
    f.insert("year".to_string(), FilterValue::Scalar(Scalar::Int(year)));
    f
}

fn default_period_a() -> FilterSet {
    year_period(2023)
}

fn default_period_b() -> FilterSet {
    year_period(2024)
}

#[derive(Debug, Deserialize)]
struct TopNParams {
    #[serde(default = "default_n")]
    n: i64,
    #[serde(default = "default_top_dimension")]
    dimension: String,
    #[serde(default = "default_measure")]
    measure: String,
    #[serde(default)]
    filters: FilterSet,
}

fn default_n() -> i64 {
    5
}

fn default_top_dimension() -> String {
    "country".to_string()
}

fn default_measure() -> String {
    "revenue".to_string()
}

#[derive(Debug, Deserialize)]
struct MarginParams {
    #[serde(default = "default_margin_dimension")]
    dimension: String,
    #[serde(default)]
    filters: FilterSet,
}

fn default_margin_dimension() -> String {
    "category".to_string()
}

impl Agent for KpiCalculatorAgent {
    fn name(&self) -> &'static str {
        AGENT_NAME
    }

    fn run(&self, input: &AgentInput, db: &Database) -> Result<AgentOutput> {
        match KpiOp::parse(input.operation)? {
            KpiOp::YoyGrowth => self.yoy_growth(input, db),
            KpiOp::MomChange => self.mom_change(input, db),
            KpiOp::ComparePeriods => self.compare_periods(input, db),
            KpiOp::TopN => self.top_n(input, db),
            KpiOp::ProfitMargins => self.profit_margins(input, db),
            KpiOp::Summary => self.overall_summary(db),
        }
    }
}

impl KpiCalculatorAgent {
    /// Year-over-year revenue growth, optionally partitioned by one
    /// dimension. Each partition restarts its "previous" pointer.
    fn yoy_growth(&self, input: &AgentInput, db: &Database) -> Result<AgentOutput> {
        let params: YoyParams = parse_params(input.parameters)?;

        let dim_col = match params.dimension.as_deref() {
            Some(d) => {
                Some(dimension_column(d).ok_or_else(|| Error::UnknownDimension(d.to_string()))?)
            }
            None => None,
        };

        let (where_clause, sql_params) = build_where(&params.filters);
        let sql = match dim_col {
            Some(col) => format!(
                "SELECT {} AS dim_label,
       d.year AS year,
       ROUND(SUM(f.revenue), 2) AS total_revenue
{}
{}
GROUP BY {}, d.year
ORDER BY {}, d.year",
                col, BASE_FROM, where_clause, col, col,
            ),
            None => format!(
                "SELECT d.year AS year,
       ROUND(SUM(f.revenue), 2) AS total_revenue
{}
{}
GROUP BY d.year
ORDER BY d.year",
                BASE_FROM, where_clause,
            ),
        };

        let raw = db.query(&sql, &sql_params)?;
        if raw.is_empty() {
            return Ok(AgentOutput::ok(
                AGENT_NAME,
                "yoy_growth",
                sql,
                raw,
                "No data returned.".to_string(),
                json!({"dimension": params.dimension}),
            ));
        }

        let mut columns = Vec::new();
        if dim_col.is_some() {
            columns.push("dimension".to_string());
        }
        columns.extend(["year".to_string(), "total_revenue".to_string(), "yoy_growth_pct".to_string()]);
        let mut data = ResultTable::new(columns);

        let mut prev: Option<f64> = None;
        let mut prev_label: Option<String> = None;
        let mut last_growth: Option<f64> = None;
        for row in &raw.rows {
            let (label, year, revenue) = if dim_col.is_some() {
                (
                    Some(row[0].to_string()),
                    row[1].clone(),
                    row[2].as_f64().unwrap_or(0.0),
                )
            } else {
                (None, row[0].clone(), row[1].as_f64().unwrap_or(0.0))
            };

            // Partition boundary: reset the previous pointer.
            if label != prev_label {
                prev = None;
                prev_label = label.clone();
            }

            let growth = growth_pct(prev, revenue);
            if growth.is_some() {
                last_growth = growth;
            }
            prev = Some(revenue);

            let mut out_row = Vec::new();
            if let Some(l) = label {
                out_row.push(Cell::Text(l));
            }
            out_row.push(year);
            out_row.push(Cell::float(revenue));
            out_row.push(Cell::opt_float(growth));
            data.push_row(out_row);
        }

        let mut summary = String::from("Year-over-year growth");
        if let Some(d) = &params.dimension {
            summary.push_str(&format!(" by {}", d));
        }
        match last_growth {
            Some(g) => summary.push_str(&format!(". Most recent YoY: {}", format_signed_pct(g))),
            None => summary.push('.'),
        }

        Ok(AgentOutput::ok(
            AGENT_NAME,
            "yoy_growth",
            sql,
            data,
            summary,
            json!({"dimension": params.dimension}),
        ))
    }

    /// Month-over-month revenue change, optionally restricted to a year.
    fn mom_change(&self, input: &AgentInput, db: &Database) -> Result<AgentOutput> {
        let params: MomParams = parse_params(input.parameters)?;
        let filters = match params.year {
            Some(y) => year_period(y),
            None => FilterSet::new(),
        };

        let (where_clause, sql_params) = build_where(&filters);
        let sql = format!(
            "SELECT d.year AS year, d.month AS month, d.month_name AS month_name,
       ROUND(SUM(f.revenue), 2) AS total_revenue
{}
{}
GROUP BY d.year, d.month, d.month_name
ORDER BY d.year, d.month",
            BASE_FROM, where_clause,
        );

        let raw = db.query(&sql, &sql_params)?;
        if raw.is_empty() {
            return Ok(AgentOutput::ok(
                AGENT_NAME,
                "mom_change",
                sql,
                raw,
                "No data.".to_string(),
                json!({"year": params.year}),
            ));
        }

        let mut columns = raw.columns.clone();
        columns.push("mom_change_pct".to_string());
        let mut data = ResultTable::new(columns);

        let mut prev: Option<f64> = None;
        for row in &raw.rows {
            let revenue = row[3].as_f64().unwrap_or(0.0);
            let change = growth_pct(prev, revenue);
            prev = Some(revenue);

            let mut out_row = row.clone();
            out_row.push(Cell::opt_float(change));
            data.push_row(out_row);
        }

        let year_label = params
            .year
            .map(|y| y.to_string())
            .unwrap_or_else(|| "all years".to_string());
        let summary = format!(
            "Month-over-month change ({}). {} months.",
            year_label,
            data.len()
        );

        Ok(AgentOutput::ok(
            AGENT_NAME,
            "mom_change",
            sql,
            data,
            summary,
            json!({"year": params.year}),
        ))
    }

    /// Compare two periods, each defined by its own filter set, with an
    /// optional grouping dimension. Grouped comparisons join the two
    /// periods on the grouping key with inner-join semantics.
    fn compare_periods(&self, input: &AgentInput, db: &Database) -> Result<AgentOutput> {
        let params: CompareParams = parse_params(input.parameters)?;

        let dim_col = match params.group_by.as_deref() {
            Some(d) => {
                Some(dimension_column(d).ok_or_else(|| Error::UnknownDimension(d.to_string()))?)
            }
            None => None,
        };

        let label_a = period_label(&params.period_a);
        let label_b = period_label(&params.period_b);

        let (query_a, table_a) = period_data(db, &params.period_a, dim_col)?;
        let (_, table_b) = period_data(db, &params.period_b, dim_col)?;

        let data = if dim_col.is_some() {
            merge_grouped_periods(&table_a, &table_b, &label_a, &label_b)
        } else {
            scalar_comparison(&table_a, &table_b, &label_a, &label_b)
        };

        let mut summary = format!("Comparison: {} vs {}", label_a, label_b);
        if let Some(g) = &params.group_by {
            summary.push_str(&format!(" by {}", g));
        }
        summary.push_str(&format!(". {} rows.", data.len()));

        Ok(AgentOutput::ok(
            AGENT_NAME,
            "compare_periods",
            query_a.sql,
            data,
            summary,
            json!({
                "period_a": params.period_a,
                "period_b": params.period_b,
                "group_by": params.group_by,
            }),
        ))
    }

    /// Top-N groups by one measure. Dense 1-based rank in output order;
    /// ties break on the dimension value ascending, so rank order is
    /// stable across runs.
    fn top_n(&self, input: &AgentInput, db: &Database) -> Result<AgentOutput> {
        let params: TopNParams = parse_params(input.parameters)?;
        let dim_col = dimension_column(&params.dimension)
            .ok_or_else(|| Error::UnknownDimension(params.dimension.clone()))?;
        let agg = measure_expr(&params.measure)?;

        let (where_clause, mut sql_params) = build_where(&params.filters);
        let sql = format!(
            "SELECT {} AS dimension,
       ROUND({}, 2) AS metric,
       ROUND(SUM(f.revenue), 2) AS total_revenue,
       ROUND(SUM(f.profit), 2)  AS total_profit,
       COUNT(*)                 AS transactions
{}
{}
GROUP BY {}
ORDER BY metric DESC, dimension ASC
LIMIT ?",
            dim_col, agg, BASE_FROM, where_clause, dim_col,
        );
        sql_params.push(Scalar::Int(params.n.max(0)));

        let raw = db.query(&sql, &sql_params)?;

        let mut columns = vec!["rank".to_string()];
        columns.extend(raw.columns.iter().cloned());
        let mut data = ResultTable::new(columns);
        for (i, row) in raw.rows.iter().enumerate() {
            let mut out_row = vec![Cell::Int(i as i64 + 1)];
            out_row.extend(row.iter().cloned());
            data.push_row(out_row);
        }

        let summary = if data.is_empty() {
            "No data.".to_string()
        } else {
            format!(
                "Top {} {}s by {}. #1: {} ({})",
                params.n,
                params.dimension,
                params.measure,
                data.get(0, "dimension").map(|c| c.to_string()).unwrap_or_default(),
                format_number(data.f64_at(0, "metric").unwrap_or(0.0)),
            )
        };

        Ok(AgentOutput::ok(
            AGENT_NAME,
            "top_n",
            sql,
            data,
            summary,
            json!({"n": params.n, "dimension": params.dimension, "measure": params.measure}),
        ))
    }

    /// Profit margin analysis by one dimension. Reports both the average
    /// per-row margin and the blended margin (sum profit / sum revenue);
    /// the two answer different questions whenever row revenue varies.
    fn profit_margins(&self, input: &AgentInput, db: &Database) -> Result<AgentOutput> {
        let params: MarginParams = parse_params(input.parameters)?;
        let dim_col = dimension_column(&params.dimension)
            .ok_or_else(|| Error::UnknownDimension(params.dimension.clone()))?;

        let (where_clause, sql_params) = build_where(&params.filters);
        let sql = format!(
            "SELECT {} AS dimension,
       ROUND(SUM(f.revenue), 2)       AS total_revenue,
       ROUND(SUM(f.profit), 2)        AS total_profit,
       ROUND(AVG(f.profit_margin), 2) AS avg_margin_pct,
       ROUND(SUM(f.profit) / SUM(f.revenue) * 100, 2) AS blended_margin_pct
{}
{}
GROUP BY {}
ORDER BY avg_margin_pct DESC",
            dim_col, BASE_FROM, where_clause, dim_col,
        );

        let data = db.query(&sql, &sql_params)?;
        let summary = if data.is_empty() {
            String::new()
        } else {
            format!(
                "Profit margins by {}. Best: {} at {}",
                params.dimension,
                data.get(0, "dimension").map(|c| c.to_string()).unwrap_or_default(),
                format_pct(data.f64_at(0, "avg_margin_pct").unwrap_or(0.0)),
            )
        };

        Ok(AgentOutput::ok(
            AGENT_NAME,
            "profit_margins",
            sql,
            data,
            summary,
            json!({"dimension": params.dimension}),
        ))
    }

    /// Single-row aggregate across the entire fact table.
    fn overall_summary(&self, db: &Database) -> Result<AgentOutput> {
        let sql = "SELECT
    COUNT(*)                        AS total_transactions,
    ROUND(SUM(f.revenue), 2)        AS total_revenue,
    ROUND(SUM(f.profit), 2)         AS total_profit,
    ROUND(AVG(f.profit_margin), 2)  AS avg_margin_pct,
    ROUND(AVG(f.revenue), 2)        AS avg_order_value,
    MIN(d.full_date)                AS earliest_date,
    MAX(d.full_date)                AS latest_date
FROM fact_sales f
JOIN dim_date d ON f.date_key = d.date_key"
            .to_string();

        let data = db.query(&sql, &[])?;
        let transactions = data.get(0, "total_transactions").and_then(Cell::as_i64).unwrap_or(0);
        let summary = format!(
            "Overall: {} transactions, {} revenue, {} profit, {} avg margin.",
            format_count(transactions),
            format_currency(data.f64_at(0, "total_revenue").unwrap_or(0.0)),
            format_currency(data.f64_at(0, "total_profit").unwrap_or(0.0)),
            format_pct(data.f64_at(0, "avg_margin_pct").unwrap_or(0.0)),
        );

        Ok(AgentOutput::ok(
            AGENT_NAME,
            "summary",
            sql,
            data,
            summary,
            serde_json::Value::Null,
        ))
    }
}

/// Compact label for a period filter set, e.g. `year2023` or
/// `quarterQ1_year2024`.
fn period_label(period: &FilterSet) -> String {
    period
        .iter()
        .map(|(k, v)| match v {
            FilterValue::Scalar(s) => format!("{}{}", k, s),
            FilterValue::List(items) => format!(
                "{}{}",
                k,
                items.iter().map(|s| s.to_string()).collect::<Vec<_>>().join("+")
            ),
            FilterValue::Range(_) => format!("{}range", k),
        })
        .collect::<Vec<_>>()
        .join("_")
}

/// Aggregate one period's revenue/profit/quantity, grouped when a
/// dimension column is given.
fn period_data(
    db: &Database,
    period: &FilterSet,
    dim_col: Option<&'static str>,
) -> Result<(BoundQuery, ResultTable)> {
    let (where_clause, params) = build_where(period);
    let sql = match dim_col {
        Some(col) => format!(
            "SELECT {} AS dimension,
       ROUND(SUM(f.revenue), 2) AS revenue,
       ROUND(SUM(f.profit), 2)  AS profit,
       SUM(f.quantity)          AS quantity
{}
{}
GROUP BY {}
ORDER BY {}",
            col, BASE_FROM, where_clause, col, col,
        ),
        None => format!(
            "SELECT ROUND(SUM(f.revenue), 2) AS revenue,
       ROUND(SUM(f.profit), 2)  AS profit,
       SUM(f.quantity)          AS quantity
{}
{}",
            BASE_FROM, where_clause,
        ),
    };

    let table = db.query(&sql, &params)?;
    Ok((BoundQuery { sql, params }, table))
}

/// Inner-join the two grouped period tables on the grouping key and
/// attach absolute and percentage revenue deltas. Groups present in only
/// one period are excluded.
fn merge_grouped_periods(
    table_a: &ResultTable,
    table_b: &ResultTable,
    label_a: &str,
    label_b: &str,
) -> ResultTable {
    let mut data = ResultTable::new(vec![
        "dimension".to_string(),
        format!("revenue_{}", label_a),
        format!("profit_{}", label_a),
        format!("quantity_{}", label_a),
        format!("revenue_{}", label_b),
        format!("profit_{}", label_b),
        format!("quantity_{}", label_b),
        "revenue_change".to_string(),
        "revenue_change_pct".to_string(),
    ]);

    for row_a in &table_a.rows {
        let key = row_a[0].to_string();
        let Some(row_b) = table_b.rows.iter().find(|r| r[0].to_string() == key) else {
            continue;
        };

        let rev_a = row_a[1].as_f64().unwrap_or(0.0);
        let rev_b = row_b[1].as_f64().unwrap_or(0.0);
        let change = round2(rev_b - rev_a);
        let change_pct = growth_pct(Some(rev_a), rev_b);

        data.push_row(vec![
            row_a[0].clone(),
            row_a[1].clone(),
            row_a[2].clone(),
            row_a[3].clone(),
            row_b[1].clone(),
            row_b[2].clone(),
            row_b[3].clone(),
            Cell::float(change),
            Cell::opt_float(change_pct),
        ]);
    }

    data
}

/// Ungrouped comparison: one scalar delta pair. A zero base yields an
/// absent percentage delta.
fn scalar_comparison(
    table_a: &ResultTable,
    table_b: &ResultTable,
    label_a: &str,
    label_b: &str,
) -> ResultTable {
    let rev_a = table_a.f64_at(0, "revenue").unwrap_or(0.0);
    let rev_b = table_b.f64_at(0, "revenue").unwrap_or(0.0);
    let change = round2(rev_b - rev_a);
    let change_pct = growth_pct(Some(rev_a), rev_b);

    let mut data = ResultTable::new(vec![
        "period_a".to_string(),
        "revenue_a".to_string(),
        "period_b".to_string(),
        "revenue_b".to_string(),
        "change".to_string(),
        "change_pct".to_string(),
    ]);
    data.push_row(vec![
        Cell::Text(label_a.to_string()),
        Cell::float(rev_a),
        Cell::Text(label_b.to_string()),
        Cell::float(rev_b),
        Cell::float(change),
        Cell::opt_float(change_pct),
    ]);
    data
}
