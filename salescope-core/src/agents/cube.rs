//! Cube operations agent
//!
//! OLAP cube manipulations: slice (single-dimension filter), dice
//! (multi-dimension filter), pivot (reshape one dimension into columns),
//! and drill-through (raw transaction rows).

use crate::agents::{normalize_op, parse_params, Agent, AgentInput};
use crate::db::Database;
use crate::error::{Error, Result};
use crate::format::format_currency;
use crate::query::builder::{drill_through_query, group_query, pivot_query, pivot_reshape};
use crate::types::{describe_filters, AgentOutput, FilterSet};
use serde::Deserialize;
use serde_json::json;

/// Agent 2: performs OLAP cube manipulations.
pub struct CubeOperationsAgent;

pub const AGENT_NAME: &str = "CubeOperations";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CubeOp {
    Slice,
    Dice,
    Pivot,
    DrillThrough,
}

impl CubeOp {
    fn parse(op: &str) -> Result<Self> {
        match normalize_op(op).as_str() {
            "slice" => Ok(CubeOp::Slice),
            "dice" => Ok(CubeOp::Dice),
            "pivot" => Ok(CubeOp::Pivot),
            "drill_through" => Ok(CubeOp::DrillThrough),
            _ => Err(Error::UnknownOperation {
                agent: AGENT_NAME.to_string(),
                operation: op.to_string(),
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SliceParams {
    /// Single-dimension filter ("filter", singular, in plan JSON)
    #[serde(default)]
    filter: FilterSet,
    #[serde(default = "default_slice_group")]
    group_by: Vec<String>,
}

fn default_slice_group() -> Vec<String> {
    vec!["region".to_string()]
}

#[derive(Debug, Deserialize)]
struct DiceParams {
    #[serde(default)]
    filters: FilterSet,
    #[serde(default = "default_dice_group")]
    group_by: Vec<String>,
}

fn default_dice_group() -> Vec<String> {
    vec!["country".to_string()]
}

#[derive(Debug, Deserialize)]
struct PivotParams {
    #[serde(default = "default_row_dim")]
    row_dim: String,
    #[serde(default = "default_col_dim")]
    col_dim: String,
    #[serde(default = "default_measure")]
    measure: String,
    #[serde(default)]
    filters: FilterSet,
}

fn default_row_dim() -> String {
    "region".to_string()
}

fn default_col_dim() -> String {
    "year".to_string()
}

fn default_measure() -> String {
    "revenue".to_string()
}

#[derive(Debug, Deserialize)]
struct DrillThroughParams {
    #[serde(default)]
    filters: FilterSet,
    #[serde(default = "default_limit")]
    limit: i64,
}

fn default_limit() -> i64 {
    50
}

impl Agent for CubeOperationsAgent {
    fn name(&self) -> &'static str {
        AGENT_NAME
    }

    fn run(&self, input: &AgentInput, db: &Database) -> Result<AgentOutput> {
        match CubeOp::parse(input.operation)? {
            CubeOp::Slice => self.slice(input, db),
            CubeOp::Dice => self.dice(input, db),
            CubeOp::Pivot => self.pivot(input, db),
            CubeOp::DrillThrough => self.drill_through(input, db),
        }
    }
}

impl CubeOperationsAgent {
    /// Slice: fix one dimension value, aggregate by another.
    fn slice(&self, input: &AgentInput, db: &Database) -> Result<AgentOutput> {
        let params: SliceParams = parse_params(input.parameters)?;
        let query = group_query(&params.group_by, &params.filter)?;
        let data = db.query(&query.sql, &query.params)?;

        let summary = format!(
            "Slice on [{}], grouped by [{}]. {} results. Revenue total: {}",
            describe_filters(&params.filter),
            params.group_by.join(", "),
            data.len(),
            format_currency(data.column_sum("total_revenue"))
        );

        Ok(AgentOutput::ok(
            AGENT_NAME,
            "slice",
            query.sql,
            data,
            summary,
            json!({"filters": params.filter, "group_by": params.group_by}),
        ))
    }

    /// Dice: filter on multiple dimensions, aggregate by one or more.
    fn dice(&self, input: &AgentInput, db: &Database) -> Result<AgentOutput> {
        let params: DiceParams = parse_params(input.parameters)?;
        let query = group_query(&params.group_by, &params.filters)?;
        let data = db.query(&query.sql, &query.params)?;

        let mut summary = format!(
            "Dice with filters [{}], grouped by [{}]. {} results.",
            describe_filters(&params.filters),
            params.group_by.join(", "),
            data.len(),
        );
        if !data.is_empty() {
            if let (Some(leader), Some(revenue)) =
                (data.rows[0].first(), data.f64_at(0, "total_revenue"))
            {
                summary.push_str(&format!(
                    " Leader: {} ({})",
                    leader,
                    format_currency(revenue)
                ));
            }
        }

        Ok(AgentOutput::ok(
            AGENT_NAME,
            "dice",
            query.sql,
            data,
            summary,
            json!({"filters": params.filters, "group_by": params.group_by}),
        ))
    }

    /// Pivot: reshape so the column dimension's values become headers.
    fn pivot(&self, input: &AgentInput, db: &Database) -> Result<AgentOutput> {
        let params: PivotParams = parse_params(input.parameters)?;
        let query = pivot_query(
            &params.row_dim,
            &params.col_dim,
            &params.measure,
            &params.filters,
        )?;
        let long = db.query(&query.sql, &query.params)?;
        let data = pivot_reshape(&long, &params.row_dim);

        let summary = format!(
            "Pivot: {} (rows) x {} (columns) measuring {}. {} row-groups.",
            params.row_dim,
            params.col_dim,
            params.measure,
            data.len(),
        );

        Ok(AgentOutput::ok(
            AGENT_NAME,
            "pivot",
            query.sql,
            data,
            summary,
            json!({
                "row_dim": params.row_dim,
                "col_dim": params.col_dim,
                "measure": params.measure,
            }),
        ))
    }

    /// Drill-through: actual transaction records, not aggregated.
    fn drill_through(&self, input: &AgentInput, db: &Database) -> Result<AgentOutput> {
        let params: DrillThroughParams = parse_params(input.parameters)?;
        let query = drill_through_query(&params.filters, params.limit);
        let data = db.query(&query.sql, &query.params)?;

        let summary = format!(
            "Drill-through on [{}]. Showing {} transactions.",
            describe_filters(&params.filters),
            data.len(),
        );

        Ok(AgentOutput::ok(
            AGENT_NAME,
            "drill_through",
            query.sql,
            data,
            summary,
            json!({"filters": params.filters, "limit": params.limit}),
        ))
    }
}
