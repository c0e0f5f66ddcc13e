//! Filter compiler
//!
//! Maps logical dimension names to physical columns of the star-schema
//! join and compiles a filter set into a WHERE clause with positional
//! binds.
//!
//! Unknown dimension keys are dropped without error. This is deliberate:
//! filters mostly originate from a best-effort planner that may
//! over-specify, and a speculative key must not sink the whole query.
//! (Grouping dimensions are the strict counterpart; see `builder`.)

use crate::types::{FilterSet, FilterValue, Scalar};

/// Physical column for a logical dimension name, or `None` if the
/// dimension is not part of the catalog.
///
/// Aliases refer to the canonical join in [`super::builder::BASE_FROM`].
pub fn dimension_column(name: &str) -> Option<&'static str> {
    Some(match name {
        "year" => "d.year",
        "quarter" => "d.quarter",
        "month" => "d.month_name",
        "month_num" => "d.month",
        "region" => "g.region",
        "country" => "g.country",
        "category" => "p.category",
        "subcategory" => "p.subcategory",
        "customer_segment" => "c.customer_segment",
        _ => return None,
    })
}

/// Compile a filter set into a WHERE clause and its bind values.
///
/// Returns an empty string when no filter entry maps to a known
/// dimension. Predicate order follows the filter set's key order, so the
/// produced SQL is deterministic for a given set.
pub fn build_where(filters: &FilterSet) -> (String, Vec<Scalar>) {
    let mut conditions: Vec<String> = Vec::new();
    let mut params: Vec<Scalar> = Vec::new();

    for (key, value) in filters {
        let Some(col) = dimension_column(key) else {
            tracing::debug!(dimension = %key, "Dropping unknown filter dimension");
            continue;
        };

        match value {
            FilterValue::List(items) => {
                if items.is_empty() {
                    continue;
                }
                let placeholders = vec!["?"; items.len()].join(",");
                conditions.push(format!("{} IN ({})", col, placeholders));
                params.extend(items.iter().cloned());
            }
            FilterValue::Range(range) => {
                // One side per entry; gte wins when both are present.
                if let Some(gte) = &range.gte {
                    conditions.push(format!("{} >= ?", col));
                    params.push(gte.clone());
                } else if let Some(lte) = &range.lte {
                    conditions.push(format!("{} <= ?", col));
                    params.push(lte.clone());
                }
            }
            FilterValue::Scalar(scalar) => {
                conditions.push(format!("{} = ?", col));
                params.push(scalar.clone());
            }
        }
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };
    (where_clause, params)
}
