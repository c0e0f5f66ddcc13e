//! Dimension navigator agent
//!
//! Hierarchical navigation: drill-down (go deeper) and roll-up (aggregate
//! higher) across the Time, Geography, and Product hierarchies, plus a
//! generic group-by over any catalog dimensions.

use crate::agents::{normalize_op, parse_params, Agent, AgentInput};
use crate::db::Database;
use crate::error::{Error, Result};
use crate::format::format_currency;
use crate::query::builder::group_query;
use crate::query::hierarchy::{hierarchy, LevelEdge};
use crate::types::{AgentOutput, FilterSet, ResultTable};
use serde::Deserialize;
use serde_json::json;

/// Agent 1: navigates OLAP hierarchies.
pub struct DimensionNavigatorAgent;

pub const AGENT_NAME: &str = "DimensionNavigator";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NavigatorOp {
    DrillDown,
    RollUp,
    Group,
}

impl NavigatorOp {
    fn parse(op: &str) -> Result<Self> {
        match normalize_op(op).as_str() {
            "drill_down" => Ok(NavigatorOp::DrillDown),
            "roll_up" => Ok(NavigatorOp::RollUp),
            "group" => Ok(NavigatorOp::Group),
            _ => Err(Error::UnknownOperation {
                agent: AGENT_NAME.to_string(),
                operation: op.to_string(),
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct NavigateParams {
    #[serde(default = "default_hierarchy")]
    hierarchy: String,
    #[serde(default)]
    to_level: Option<String>,
    #[serde(default)]
    filters: FilterSet,
}

fn default_hierarchy() -> String {
    "time".to_string()
}

#[derive(Debug, Deserialize)]
struct GroupParams {
    #[serde(default = "default_dimensions")]
    dimensions: Vec<String>,
    #[serde(default)]
    filters: FilterSet,
}

fn default_dimensions() -> Vec<String> {
    vec!["region".to_string()]
}

impl Agent for DimensionNavigatorAgent {
    fn name(&self) -> &'static str {
        AGENT_NAME
    }

    fn run(&self, input: &AgentInput, db: &Database) -> Result<AgentOutput> {
        match NavigatorOp::parse(input.operation)? {
            NavigatorOp::DrillDown => self.navigate(input, db, LevelEdge::Finest, "drill_down"),
            NavigatorOp::RollUp => self.navigate(input, db, LevelEdge::Coarsest, "roll_up"),
            NavigatorOp::Group => self.group_by(input, db),
        }
    }
}

impl DimensionNavigatorAgent {
    /// Drill-down and roll-up share one resolution; they differ only in
    /// which hierarchy edge an unspecified or unknown level defaults to.
    fn navigate(
        &self,
        input: &AgentInput,
        db: &Database,
        default_edge: LevelEdge,
        op_name: &str,
    ) -> Result<AgentOutput> {
        let params: NavigateParams = parse_params(input.parameters)?;
        let h = hierarchy(&params.hierarchy);
        let level_idx = h.resolve_level(params.to_level.as_deref(), default_edge);
        let level = h.level_name(level_idx);

        let query = h.prefix_query(level_idx, &params.filters)?;
        let data = db.query(&query.sql, &query.params)?;

        tracing::debug!(
            hierarchy = h.name,
            level,
            rows = data.len(),
            context = input.context.unwrap_or(""),
            "Hierarchy navigation"
        );

        let label = h.label_path(level_idx);
        let mut summary = match default_edge {
            LevelEdge::Finest => format!(
                "Drill-down on {} hierarchy to '{}' level ({}). {} rows returned.",
                h.name,
                level,
                label,
                data.len()
            ),
            LevelEdge::Coarsest => format!(
                "Roll-up on {} to '{}' level ({}). {} rows. Total revenue: {}",
                h.name,
                level,
                label,
                data.len(),
                format_currency(data.column_sum("total_revenue"))
            ),
        };
        if default_edge == LevelEdge::Finest {
            if let Some(top) = top_performer(&data) {
                summary.push_str(&top);
            }
        }

        Ok(AgentOutput::ok(
            AGENT_NAME,
            op_name,
            query.sql,
            data,
            summary,
            json!({"hierarchy": h.name, "level": level}),
        ))
    }

    /// Generic group-by on any combination of catalog dimensions.
    fn group_by(&self, input: &AgentInput, db: &Database) -> Result<AgentOutput> {
        let params: GroupParams = parse_params(input.parameters)?;
        let query = group_query(&params.dimensions, &params.filters)?;
        let data = db.query(&query.sql, &query.params)?;

        let dims = params.dimensions.join(", ");
        let summary = format!(
            "Grouped by [{}]. {} groups. Total revenue: {}",
            dims,
            data.len(),
            format_currency(data.column_sum("total_revenue"))
        );

        Ok(AgentOutput::ok(
            AGENT_NAME,
            "group",
            query.sql,
            data,
            summary,
            json!({"dimensions": params.dimensions}),
        ))
    }
}

/// Leader callout for a grouped result, using the first row's first
/// column value and its total revenue.
fn top_performer(data: &ResultTable) -> Option<String> {
    if data.is_empty() {
        return None;
    }
    let leader = data.rows[0].first()?;
    let revenue = data.f64_at(0, "total_revenue")?;
    Some(format!(
        " Top performer: {} with {} revenue.",
        leader,
        format_currency(revenue)
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_op_parsing() {
        assert_eq!(NavigatorOp::parse("drill-down").unwrap(), NavigatorOp::DrillDown);
        assert_eq!(NavigatorOp::parse("Roll_Up").unwrap(), NavigatorOp::RollUp);
        assert!(matches!(
            NavigatorOp::parse("teleport"),
            Err(Error::UnknownOperation { .. })
        ));
    }
}
