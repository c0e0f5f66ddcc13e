//! Report generator agent
//!
//! Turns query results into polished output: formatted tables with totals
//! rows, markdown executive summaries, and monthly trend reports.

use crate::agents::{normalize_op, parse_params, Agent, AgentInput};
use crate::db::Database;
use crate::error::{Error, Result};
use crate::format::{format_count, format_currency};
use crate::types::{AgentOutput, Cell, ResultTable, Scalar};
use serde::Deserialize;
use serde_json::json;

/// Agent 4: formats results into reports.
pub struct ReportGeneratorAgent;

pub const AGENT_NAME: &str = "ReportGenerator";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReportOp {
    FormatTable,
    ExecutiveSummary,
    TrendReport,
}

impl ReportOp {
    fn parse(op: &str) -> Result<Self> {
        match normalize_op(op).as_str() {
            "table" | "format_table" => Ok(ReportOp::FormatTable),
            "summary" | "narrative" | "executive_summary" => Ok(ReportOp::ExecutiveSummary),
            "trend" | "trend_report" => Ok(ReportOp::TrendReport),
            _ => Err(Error::UnknownOperation {
                agent: AGENT_NAME.to_string(),
                operation: op.to_string(),
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct FormatTableParams {
    /// Row data carried in the plan (from a prior step's output)
    #[serde(default)]
    data: Vec<Vec<serde_json::Value>>,
    #[serde(default)]
    columns: Vec<String>,
    #[serde(default = "default_true")]
    add_total: bool,
    #[serde(default)]
    add_rank: bool,
    #[serde(default = "default_currency_cols")]
    currency_cols: Vec<String>,
}

fn default_true() -> bool {
    true
}

fn default_currency_cols() -> Vec<String> {
    ["total_revenue", "total_profit", "revenue", "profit"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

#[derive(Debug, Deserialize)]
struct SummaryParams {
    #[serde(default = "default_focus")]
    focus: String,
    #[serde(default)]
    year: Option<i64>,
}

fn default_focus() -> String {
    "overall".to_string()
}

#[derive(Debug, Deserialize)]
struct TrendParams {
    #[serde(default = "default_trend_year")]
    year: i64,
    #[serde(default)]
    dimension: Option<String>,
}

fn default_trend_year() -> i64 {
    2024
}

impl Agent for ReportGeneratorAgent {
    fn name(&self) -> &'static str {
        AGENT_NAME
    }

    fn run(&self, input: &AgentInput, db: &Database) -> Result<AgentOutput> {
        match ReportOp::parse(input.operation)? {
            ReportOp::FormatTable => self.format_table(input, db),
            ReportOp::ExecutiveSummary => self.executive_summary(input, db),
            ReportOp::TrendReport => self.trend_report(input, db),
        }
    }
}

impl ReportGeneratorAgent {
    /// Produce a display-ready table: optional rank column, a TOTAL row
    /// (numeric columns summed, percentage columns averaged), and
    /// currency-column hints in the metadata for downstream styling.
    fn format_table(&self, input: &AgentInput, db: &Database) -> Result<AgentOutput> {
        let params: FormatTableParams = parse_params(input.parameters)?;

        let (sql, mut table) = if params.data.is_empty() {
            // No data carried in the plan: default regional report.
            let sql = "SELECT g.region AS region,
       ROUND(SUM(f.revenue), 2)       AS total_revenue,
       ROUND(SUM(f.profit), 2)        AS total_profit,
       ROUND(AVG(f.profit_margin), 2) AS avg_margin_pct,
       SUM(f.quantity)                AS total_qty,
       COUNT(*)                       AS transactions
FROM fact_sales f
JOIN dim_geography g ON f.geo_key = g.geo_key
GROUP BY g.region
ORDER BY total_revenue DESC"
                .to_string();
            let table = db.query(&sql, &[])?;
            (sql, table)
        } else {
            let sql = "-- Data provided externally (formatted from prior agent output)".to_string();
            (sql, table_from_json(&params.columns, &params.data))
        };

        if params.add_rank && table.column_index("rank").is_none() {
            table = with_rank_column(&table);
        }

        let data_rows = table.len();
        if params.add_total && !table.is_empty() {
            let totals = totals_row(&table);
            table.push_row(totals);
        }

        let numeric_cols: Vec<String> = table
            .columns
            .iter()
            .enumerate()
            .filter(|(i, _)| column_is_numeric(&table, *i))
            .map(|(_, c)| c.clone())
            .collect();
        let summary = format!("Formatted table with {} rows + totals.", data_rows);

        Ok(AgentOutput::ok(
            AGENT_NAME,
            "format_table",
            sql,
            table,
            summary,
            json!({
                "currency_cols": params.currency_cols,
                "numeric_cols": numeric_cols,
                "has_totals_row": params.add_total,
            }),
        ))
    }

    /// Markdown executive summary: top-line metrics, best region and
    /// category, and a year-over-year callout when no year filter is set.
    fn executive_summary(&self, input: &AgentInput, db: &Database) -> Result<AgentOutput> {
        let params: SummaryParams = parse_params(input.parameters)?;

        let (where_clause, sql_params): (&str, Vec<Scalar>) = match params.year {
            Some(y) => ("WHERE d.year = ?", vec![Scalar::Int(y)]),
            None => ("", Vec::new()),
        };
        let year_label = params
            .year
            .map(|y| y.to_string())
            .unwrap_or_else(|| "All Years".to_string());

        let sql_topline = format!(
            "SELECT ROUND(SUM(f.revenue), 2)       AS total_revenue,
       ROUND(SUM(f.profit), 2)        AS total_profit,
       ROUND(AVG(f.profit_margin), 2) AS avg_margin,
       COUNT(*)                       AS transactions,
       ROUND(AVG(f.revenue), 2)       AS avg_order
FROM fact_sales f
JOIN dim_date d ON f.date_key = d.date_key
{}",
            where_clause,
        );
        let topline = db.query(&sql_topline, &sql_params)?;

        let sql_region = format!(
            "SELECT g.region AS region, ROUND(SUM(f.revenue), 2) AS rev
FROM fact_sales f
JOIN dim_date d ON f.date_key = d.date_key
JOIN dim_geography g ON f.geo_key = g.geo_key
{}
GROUP BY g.region ORDER BY rev DESC LIMIT 1",
            where_clause,
        );
        let top_region = db.query(&sql_region, &sql_params)?;

        let sql_category = format!(
            "SELECT p.category AS category, ROUND(SUM(f.revenue), 2) AS rev,
       ROUND(AVG(f.profit_margin), 2) AS margin
FROM fact_sales f
JOIN dim_date d ON f.date_key = d.date_key
JOIN dim_product p ON f.product_key = p.product_key
{}
GROUP BY p.category ORDER BY rev DESC LIMIT 1",
            where_clause,
        );
        let top_category = db.query(&sql_category, &sql_params)?;

        // YoY callout only makes sense across years.
        let mut yoy_insight = String::new();
        if params.year.is_none() {
            let sql_yoy = "SELECT d.year AS year, ROUND(SUM(f.revenue), 2) AS rev
FROM fact_sales f
JOIN dim_date d ON f.date_key = d.date_key
GROUP BY d.year ORDER BY d.year";
            let yearly = db.query(sql_yoy, &[])?;
            if yearly.len() >= 2 {
                let last = yearly.len() - 1;
                let prev_rev = yearly.f64_at(last - 1, "rev").unwrap_or(0.0);
                let last_rev = yearly.f64_at(last, "rev").unwrap_or(0.0);
                if prev_rev != 0.0 {
                    let growth = (last_rev - prev_rev) / prev_rev * 100.0;
                    yoy_insight = format!(
                        " Revenue grew {:+.1}% from {} (${}) to {} (${}).",
                        growth,
                        yearly.get(last - 1, "year").map(|c| c.to_string()).unwrap_or_default(),
                        format_count(prev_rev.round() as i64),
                        yearly.get(last, "year").map(|c| c.to_string()).unwrap_or_default(),
                        format_count(last_rev.round() as i64),
                    );
                }
            }
        }

        let revenue = format_currency(topline.f64_at(0, "total_revenue").unwrap_or(0.0));
        let profit = format_currency(topline.f64_at(0, "total_profit").unwrap_or(0.0));
        let margin = format!(
            "{}%",
            topline.get(0, "avg_margin").map(|c| c.to_string()).unwrap_or_default()
        );
        let transactions = format_count(
            topline.get(0, "transactions").and_then(Cell::as_i64).unwrap_or(0),
        );
        let avg_order = format_currency(topline.f64_at(0, "avg_order").unwrap_or(0.0));
        let region_name = top_region
            .get(0, "region")
            .map(|c| c.to_string())
            .unwrap_or_else(|| "N/A".to_string());
        let region_rev = format_currency(top_region.f64_at(0, "rev").unwrap_or(0.0));
        let category_name = top_category
            .get(0, "category")
            .map(|c| c.to_string())
            .unwrap_or_else(|| "N/A".to_string());
        let category_rev = format_currency(top_category.f64_at(0, "rev").unwrap_or(0.0));
        let category_margin = top_category
            .get(0, "margin")
            .map(|c| c.to_string())
            .unwrap_or_default();

        let narrative = format!(
            "## Executive Summary — {}\n\n\
             **Revenue:** {} across {} transactions.\n\
             **Profit:** {} | **Avg Margin:** {} | **Avg Order Value:** {}\n\
             {}\n\n\
             **Top Region:** {} ({})\n\
             **Top Category:** {} ({}, {}% margin)\n",
            year_label,
            revenue,
            transactions,
            profit,
            margin,
            avg_order,
            yoy_insight,
            region_name,
            region_rev,
            category_name,
            category_rev,
            category_margin,
        );

        let mut data = ResultTable::new(vec!["metric".to_string(), "value".to_string()]);
        for (metric, value) in [
            ("Total Revenue", revenue),
            ("Total Profit", profit),
            ("Avg Margin", margin),
            ("Total Transactions", transactions),
            ("Avg Order Value", avg_order),
            ("Top Region", region_name),
            ("Top Category", category_name),
        ] {
            data.push_row(vec![Cell::Text(metric.to_string()), Cell::Text(value)]);
        }

        Ok(AgentOutput::ok(
            AGENT_NAME,
            "executive_summary",
            sql_topline,
            data,
            narrative.clone(),
            json!({"focus": params.focus, "year": params.year, "narrative": narrative}),
        ))
    }

    /// Monthly revenue trend for one year, optionally broken down by a
    /// single dimension.
    fn trend_report(&self, input: &AgentInput, db: &Database) -> Result<AgentOutput> {
        let params: TrendParams = parse_params(input.parameters)?;

        // Breakdown is limited to the dimensions that make a readable
        // month-by-month trend; anything else means no breakdown.
        let dim_col = match params.dimension.as_deref() {
            Some("region") => Some("g.region"),
            Some("category") => Some("p.category"),
            Some("customer_segment") => Some("c.customer_segment"),
            _ => None,
        };
        let (select_extra, group_extra) = match dim_col {
            Some(col) => (format!("{} AS dimension,\n       ", col), format!("{}, ", col)),
            None => (String::new(), String::new()),
        };

        let sql = format!(
            "SELECT {}d.month AS month, d.month_name AS month_name,
       ROUND(SUM(f.revenue), 2) AS total_revenue,
       ROUND(SUM(f.profit), 2)  AS total_profit,
       COUNT(*)                 AS transactions
FROM fact_sales f
JOIN dim_date d ON f.date_key = d.date_key
JOIN dim_geography g ON f.geo_key = g.geo_key
JOIN dim_product p ON f.product_key = p.product_key
JOIN dim_customer c ON f.customer_key = c.customer_key
WHERE d.year = ?
GROUP BY {}d.month, d.month_name
ORDER BY {}d.month",
            select_extra, group_extra, group_extra,
        );
        let data = db.query(&sql, &[Scalar::Int(params.year)])?;

        let summary = if !data.is_empty() && dim_col.is_none() {
            let (peak, low) = peak_and_low(&data);
            format!(
                "Monthly trend for {}. Peak: {} ({}). Slowest: {} ({}).",
                params.year,
                peak.0,
                format_currency(peak.1),
                low.0,
                format_currency(low.1),
            )
        } else {
            let by = params
                .dimension
                .as_deref()
                .map(|d| format!(" by {}", d))
                .unwrap_or_default();
            format!("Monthly trend for {}{}. {} rows.", params.year, by, data.len())
        };

        Ok(AgentOutput::ok(
            AGENT_NAME,
            "trend_report",
            sql,
            data,
            summary,
            json!({"year": params.year, "dimension": params.dimension}),
        ))
    }
}

/// Highest- and lowest-revenue months as `(month_name, revenue)` pairs.
/// Ties resolve to the earliest month.
fn peak_and_low(data: &ResultTable) -> ((String, f64), (String, f64)) {
    let mut peak = (String::new(), f64::NEG_INFINITY);
    let mut low = (String::new(), f64::INFINITY);
    for i in 0..data.len() {
        let name = data
            .get(i, "month_name")
            .map(|c| c.to_string())
            .unwrap_or_default();
        let revenue = data.f64_at(i, "total_revenue").unwrap_or(0.0);
        if revenue > peak.1 {
            peak = (name.clone(), revenue);
        }
        if revenue < low.1 {
            low = (name, revenue);
        }
    }
    (peak, low)
}

/// Build a table from plan-carried JSON rows.
fn table_from_json(columns: &[String], rows: &[Vec<serde_json::Value>]) -> ResultTable {
    let mut table = ResultTable::new(columns.to_vec());
    for row in rows {
        let cells = row
            .iter()
            .map(|v| match v {
                serde_json::Value::Null => Cell::Null,
                serde_json::Value::Number(n) => {
                    if let Some(i) = n.as_i64() {
                        Cell::Int(i)
                    } else {
                        Cell::float(n.as_f64().unwrap_or(f64::NAN))
                    }
                }
                serde_json::Value::String(s) => Cell::Text(s.clone()),
                other => Cell::Text(other.to_string()),
            })
            .collect();
        table.rows.push(cells);
    }
    table
}

/// Copy of the table with a 1-based rank column prepended.
fn with_rank_column(table: &ResultTable) -> ResultTable {
    let mut columns = vec!["rank".to_string()];
    columns.extend(table.columns.iter().cloned());
    let mut out = ResultTable::new(columns);
    for (i, row) in table.rows.iter().enumerate() {
        let mut new_row = vec![Cell::Int(i as i64 + 1)];
        new_row.extend(row.iter().cloned());
        out.rows.push(new_row);
    }
    out
}

/// True when every non-null cell of the column is numeric and at least
/// one value is present.
fn column_is_numeric(table: &ResultTable, idx: usize) -> bool {
    let mut any = false;
    for row in &table.rows {
        match row.get(idx) {
            Some(Cell::Int(_)) | Some(Cell::Float(_)) => any = true,
            Some(Cell::Null) | None => {}
            Some(_) => return false,
        }
    }
    any
}

/// TOTAL row: numeric columns summed (percentage and margin columns
/// averaged instead), the first label column carries "TOTAL", other text
/// columns a dash.
fn totals_row(table: &ResultTable) -> Vec<Cell> {
    let has_rank = table.column_index("rank").is_some();
    let label_idx = if has_rank { 1 } else { 0 };

    table
        .columns
        .iter()
        .enumerate()
        .map(|(i, name)| {
            if name == "rank" {
                return Cell::Text("—".to_string());
            }
            if column_is_numeric(table, i) {
                let values: Vec<f64> = table
                    .rows
                    .iter()
                    .filter_map(|r| r.get(i).and_then(Cell::as_f64))
                    .collect();
                let lower = name.to_lowercase();
                let total = if lower.contains("pct") || lower.contains("margin") {
                    values.iter().sum::<f64>() / values.len().max(1) as f64
                } else {
                    values.iter().sum()
                };
                Cell::float((total * 100.0).round() / 100.0)
            } else if i == label_idx {
                Cell::Text("TOTAL".to_string())
            } else {
                Cell::Text("—".to_string())
            }
        })
        .collect()
}
