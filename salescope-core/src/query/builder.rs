//! Dimensional query builder
//!
//! Composes deterministic aggregate queries over the full star-schema
//! join. Every query here is read-only and fully parameterized; dimension
//! and measure names are validated against closed catalogs before any SQL
//! text is assembled.
//!
//! Grouping dimensions are strict (unknown name is a validation error),
//! unlike filter dimensions which are permissive. A plan step that asks to
//! group by a nonexistent dimension is a caller bug and must surface.

use crate::error::{Error, Result};
use crate::query::filter::{build_where, dimension_column};
use crate::types::{Cell, FilterSet, ResultTable, Scalar};

/// Canonical join of the fact table to all four dimension tables.
pub const BASE_FROM: &str = "FROM fact_sales f
JOIN dim_date      d ON f.date_key     = d.date_key
JOIN dim_geography g ON f.geo_key      = g.geo_key
JOIN dim_product   p ON f.product_key  = p.product_key
JOIN dim_customer  c ON f.customer_key = c.customer_key";

/// Standard aggregate measure columns selected by grouped queries.
const MEASURE_SELECT: &str = "ROUND(SUM(f.revenue), 2)       AS total_revenue,
       ROUND(SUM(f.profit), 2)        AS total_profit,
       ROUND(AVG(f.profit_margin), 2) AS avg_margin,
       SUM(f.quantity)                AS total_qty,
       COUNT(*)                       AS transactions";

/// A SQL query together with its positional bind values.
#[derive(Debug, Clone)]
pub struct BoundQuery {
    /// SQL text
    pub sql: String,
    /// Bind values, in placeholder order
    pub params: Vec<Scalar>,
}

/// How a measure aggregates across rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeasureAgg {
    /// Additive measure: SUM
    Sum,
    /// Intensive measure: AVG
    Avg,
}

impl MeasureAgg {
    fn sql_fn(&self) -> &'static str {
        match self {
            MeasureAgg::Sum => "SUM",
            MeasureAgg::Avg => "AVG",
        }
    }
}

/// Resolve a measure name to its fact column and aggregation.
///
/// Additive measures (revenue, profit, quantity, cost) sum; the rest
/// (margin, unit price) average.
pub fn measure_aggregate(measure: &str) -> Result<(&'static str, MeasureAgg)> {
    let column = match measure {
        "revenue" => "f.revenue",
        "profit" => "f.profit",
        "quantity" => "f.quantity",
        "cost" => "f.cost",
        "profit_margin" => "f.profit_margin",
        "unit_price" => "f.unit_price",
        _ => return Err(Error::UnknownMeasure(measure.to_string())),
    };
    let agg = match measure {
        "revenue" | "profit" | "quantity" | "cost" => MeasureAgg::Sum,
        _ => MeasureAgg::Avg,
    };
    Ok((column, agg))
}

/// Aggregate expression for a measure, e.g. `SUM(f.revenue)`.
pub fn measure_expr(measure: &str) -> Result<String> {
    let (column, agg) = measure_aggregate(measure)?;
    Ok(format!("{}({})", agg.sql_fn(), column))
}

/// Build a grouped aggregate query from logical dimension names.
///
/// Rejects any dimension that is not in the catalog. Rows are ordered by
/// total revenue descending, with the group columns ascending as the
/// deterministic tie-break.
pub fn group_query(dimensions: &[String], filters: &FilterSet) -> Result<BoundQuery> {
    let mut columns = Vec::with_capacity(dimensions.len());
    for dim in dimensions {
        let col = dimension_column(dim).ok_or_else(|| Error::UnknownDimension(dim.clone()))?;
        columns.push((dim.as_str(), col));
    }
    group_query_columns(&columns, filters)
}

/// Build a grouped aggregate query from pre-resolved `(alias, column)`
/// pairs. Used by the hierarchy navigator, whose levels already carry
/// their physical columns.
pub fn group_query_columns(columns: &[(&str, &str)], filters: &FilterSet) -> Result<BoundQuery> {
    if columns.is_empty() {
        return Err(Error::UnknownDimension("<empty group-by>".to_string()));
    }

    let select_cols: Vec<String> = columns
        .iter()
        .map(|(alias, col)| format!("{} AS {}", col, alias))
        .collect();
    let group_cols: Vec<&str> = columns.iter().map(|(_, col)| *col).collect();
    let tiebreak: Vec<String> = columns
        .iter()
        .map(|(alias, _)| format!("{} ASC", alias))
        .collect();

    let (where_clause, params) = build_where(filters);
    let sql = format!(
        "SELECT {},
       {}
{}
{}
GROUP BY {}
ORDER BY total_revenue DESC, {}",
        select_cols.join(", "),
        MEASURE_SELECT,
        BASE_FROM,
        where_clause,
        group_cols.join(", "),
        tiebreak.join(", "),
    );

    Ok(BoundQuery { sql, params })
}

/// Build the long-form query behind a pivot: two grouping dimensions and
/// one aggregated measure, ordered row label then column label.
pub fn pivot_query(
    row_dim: &str,
    col_dim: &str,
    measure: &str,
    filters: &FilterSet,
) -> Result<BoundQuery> {
    let row_col =
        dimension_column(row_dim).ok_or_else(|| Error::UnknownDimension(row_dim.to_string()))?;
    let col_col =
        dimension_column(col_dim).ok_or_else(|| Error::UnknownDimension(col_dim.to_string()))?;
    let agg = measure_expr(measure)?;

    let (where_clause, params) = build_where(filters);
    let sql = format!(
        "SELECT {} AS row_label,
       {} AS col_label,
       ROUND({}, 2) AS metric
{}
{}
GROUP BY {}, {}
ORDER BY {}, {}",
        row_col, col_col, agg, BASE_FROM, where_clause, row_col, col_col, row_col, col_col,
    );

    Ok(BoundQuery { sql, params })
}

/// Reshape a long-form `(row_label, col_label, metric)` table so that the
/// column dimension's distinct values become columns.
///
/// Combinations with no contributing rows stay absent (null cells), never
/// zero: an empty group is not an observed zero.
pub fn pivot_reshape(long: &ResultTable, row_dim: &str) -> ResultTable {
    let mut col_labels: Vec<String> = Vec::new();
    let mut row_labels: Vec<Cell> = Vec::new();
    let mut cells: Vec<(usize, usize, Cell)> = Vec::new();

    for row in &long.rows {
        let (Some(row_label), Some(col_label), Some(metric)) =
            (row.first(), row.get(1), row.get(2))
        else {
            continue;
        };
        let col_name = col_label.to_string();

        let col_idx = match col_labels.iter().position(|c| *c == col_name) {
            Some(i) => i,
            None => {
                col_labels.push(col_name);
                col_labels.len() - 1
            }
        };
        let row_idx = match row_labels.iter().position(|r| r == row_label) {
            Some(i) => i,
            None => {
                row_labels.push(row_label.clone());
                row_labels.len() - 1
            }
        };
        cells.push((row_idx, col_idx, metric.clone()));
    }

    let mut columns = vec![row_dim.to_string()];
    columns.extend(col_labels.iter().cloned());
    let mut table = ResultTable::new(columns);

    for (row_idx, label) in row_labels.into_iter().enumerate() {
        let mut row = vec![Cell::Null; col_labels.len() + 1];
        row[0] = label;
        for (r, c, metric) in &cells {
            if *r == row_idx {
                row[c + 1] = metric.clone();
            }
        }
        table.push_row(row);
    }

    table
}

/// Build a drill-through query: ungrouped transaction-level rows, newest
/// first, capped at `limit` rows (bound, not interpolated).
pub fn drill_through_query(filters: &FilterSet, limit: i64) -> BoundQuery {
    let (where_clause, mut params) = build_where(filters);
    let sql = format!(
        "SELECT f.order_id, d.full_date AS order_date,
       g.region, g.country,
       p.category, p.subcategory,
       c.customer_segment,
       f.quantity, f.unit_price,
       ROUND(f.revenue, 2) AS revenue,
       ROUND(f.profit, 2) AS profit,
       ROUND(f.profit_margin, 2) AS profit_margin
{}
{}
ORDER BY d.full_date DESC
LIMIT ?",
        BASE_FROM, where_clause,
    );
    params.push(Scalar::Int(limit));
    BoundQuery { sql, params }
}
