//! Domain types for salescope
//!
//! Covers the three kinds of data that flow through the engine:
//! - **Filters**: declarative per-dimension predicates supplied by a planner
//! - **Result tables**: ordered tabular results from the storage layer
//! - **Plans and agent outputs**: the execution plan produced per user turn
//!   and the structured output each executed step yields

use rusqlite::types::{ToSql, ToSqlOutput};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ============================================
// Filter values
// ============================================

/// A single bindable value in a filter or query parameter list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    /// Integer value (years, quantities, keys)
    Int(i64),
    /// Floating point value (revenue thresholds etc.)
    Float(f64),
    /// Text value (names of regions, categories, months, quarters)
    Text(String),
}

impl Scalar {
    /// Numeric view of the scalar, if it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Int(i) => Some(*i as f64),
            Scalar::Float(f) => Some(*f),
            Scalar::Text(_) => None,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Int(i) => write!(f, "{}", i),
            Scalar::Float(v) => write!(f, "{}", v),
            Scalar::Text(s) => write!(f, "{}", s),
        }
    }
}

impl ToSql for Scalar {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        match self {
            Scalar::Int(i) => i.to_sql(),
            Scalar::Float(f) => f.to_sql(),
            Scalar::Text(s) => s.to_sql(),
        }
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Scalar::Int(v)
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Scalar::Text(v.to_string())
    }
}

/// Half-open range bound for a filter entry.
///
/// Only one side is honored per entry (`gte` wins when both are present);
/// a compound range needs two filter entries, one per side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RangeFilter {
    /// Greater-than-or-equal bound
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gte: Option<Scalar>,
    /// Less-than-or-equal bound
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lte: Option<Scalar>,
}

/// Value side of one filter entry.
///
/// Deserializes straight from plan JSON: an array becomes a membership
/// test, an object with `gte`/`lte` becomes a range bound, anything else
/// an equality test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    /// Membership: `dimension IN (...)`
    List(Vec<Scalar>),
    /// One-sided range: `dimension >= ?` or `dimension <= ?`
    Range(RangeFilter),
    /// Equality: `dimension = ?`
    Scalar(Scalar),
}

/// A set of per-dimension filters keyed by logical dimension name.
///
/// `BTreeMap` keeps predicate order deterministic regardless of the JSON
/// key order the planner happened to emit.
pub type FilterSet = BTreeMap<String, FilterValue>;

/// Render a filter set as `key=value, key=value` for summaries.
pub fn describe_filters(filters: &FilterSet) -> String {
    filters
        .iter()
        .map(|(k, v)| match v {
            FilterValue::Scalar(s) => format!("{}={}", k, s),
            FilterValue::List(items) => {
                let vals: Vec<String> = items.iter().map(|s| s.to_string()).collect();
                format!("{}=[{}]", k, vals.join(", "))
            }
            FilterValue::Range(r) => match (&r.gte, &r.lte) {
                (Some(g), _) => format!("{}>={}", k, g),
                (None, Some(l)) => format!("{}<={}", k, l),
                (None, None) => format!("{}=?", k),
            },
        })
        .collect::<Vec<_>>()
        .join(", ")
}

// ============================================
// Result tables
// ============================================

/// One cell of a result table.
///
/// Non-finite floats are normalized to `Null` at construction so division
/// artifacts never leak into serialized output.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    /// Absent value (no data, guarded division, missing pivot cell)
    Null,
    /// Integer value
    Int(i64),
    /// Floating point value (always finite)
    Float(f64),
    /// Text value
    Text(String),
}

impl Cell {
    /// Construct a float cell, mapping NaN/infinity to `Null`.
    pub fn float(v: f64) -> Self {
        if v.is_finite() {
            Cell::Float(v)
        } else {
            Cell::Null
        }
    }

    /// Construct a float cell from an optional value.
    pub fn opt_float(v: Option<f64>) -> Self {
        v.map(Cell::float).unwrap_or(Cell::Null)
    }

    /// Numeric view of the cell, if it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Int(i) => Some(*i as f64),
            Cell::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Integer view of the cell, if it has one.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Cell::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Text view of the cell, if it is text.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }

    /// True for `Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => write!(f, ""),
            Cell::Int(i) => write!(f, "{}", i),
            Cell::Float(v) => write!(f, "{}", v),
            Cell::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Ordered tabular result: fixed column set, ordered rows.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct ResultTable {
    /// Column names, in output order
    pub columns: Vec<String>,
    /// Row-major cell data; every row has `columns.len()` cells
    pub rows: Vec<Vec<Cell>>,
}

impl ResultTable {
    /// Create an empty table with the given columns.
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True when the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of a column by name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Cell at `(row, column name)`, if both exist.
    pub fn get(&self, row: usize, column: &str) -> Option<&Cell> {
        let idx = self.column_index(column)?;
        self.rows.get(row)?.get(idx)
    }

    /// Numeric value at `(row, column name)`, if present.
    pub fn f64_at(&self, row: usize, column: &str) -> Option<f64> {
        self.get(row, column).and_then(Cell::as_f64)
    }

    /// Sum of a numeric column, treating nulls as zero.
    pub fn column_sum(&self, column: &str) -> f64 {
        let Some(idx) = self.column_index(column) else {
            return 0.0;
        };
        self.rows
            .iter()
            .filter_map(|r| r.get(idx).and_then(Cell::as_f64))
            .sum()
    }

    /// All numeric values of a column, skipping nulls.
    pub fn column_values(&self, column: &str) -> Vec<f64> {
        let Some(idx) = self.column_index(column) else {
            return Vec::new();
        };
        self.rows
            .iter()
            .filter_map(|r| r.get(idx).and_then(Cell::as_f64))
            .collect()
    }

    /// Append a row. Panics in debug builds if the width is wrong.
    pub fn push_row(&mut self, row: Vec<Cell>) {
        debug_assert_eq!(row.len(), self.columns.len());
        self.rows.push(row);
    }
}

// ============================================
// Plans
// ============================================

/// One step of an execution plan: which agent, which operation, with
/// what parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanStep {
    /// Agent identifier (e.g. "KPICalculator")
    pub agent: String,
    /// Operation name (e.g. "top_n")
    pub operation: String,
    /// Operation parameter bag; `null` means no parameters
    #[serde(default)]
    pub parameters: serde_json::Value,
}

/// An execution plan for one user turn.
///
/// Produced once by the planner, consumed exactly once by the executor,
/// never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    /// One-sentence description of what the user wants
    #[serde(default)]
    pub intent: String,
    /// Ordered steps to execute
    #[serde(default)]
    pub steps: Vec<PlanStep>,
    /// Follow-up questions to suggest to the user
    #[serde(default)]
    pub suggested_followups: Vec<String>,
}

// ============================================
// Agent outputs
// ============================================

/// Structured output of one executed plan step. Immutable once produced.
#[derive(Debug, Clone, Serialize)]
pub struct AgentOutput {
    /// Source agent name
    pub agent: String,
    /// Operation that was executed
    pub operation: String,
    /// SQL text that was issued (empty for failed or non-query steps)
    pub sql: String,
    /// Result table, when the step produced one
    pub data: Option<ResultTable>,
    /// Human-readable summary for the narrative
    pub summary: String,
    /// Error message when the step failed
    pub error: Option<String>,
    /// Operation-specific metadata bag
    pub metadata: serde_json::Value,
}

impl AgentOutput {
    /// Successful output with a result table.
    pub fn ok(
        agent: &str,
        operation: &str,
        sql: String,
        data: ResultTable,
        summary: String,
        metadata: serde_json::Value,
    ) -> Self {
        Self {
            agent: agent.to_string(),
            operation: operation.to_string(),
            sql,
            data: Some(data),
            summary,
            error: None,
            metadata,
        }
    }

    /// Failed output for a step whose execution raised an error.
    pub fn failed(agent: &str, operation: &str, error: String) -> Self {
        Self {
            agent: agent.to_string(),
            operation: operation.to_string(),
            sql: String::new(),
            data: None,
            summary: String::new(),
            error: Some(error),
            metadata: serde_json::Value::Null,
        }
    }

    /// Row count of the result table, zero when absent.
    pub fn row_count(&self) -> usize {
        self.data.as_ref().map(|d| d.len()).unwrap_or(0)
    }
}

/// Ledger entry for one executed plan step.
#[derive(Debug, Clone, Serialize)]
pub struct StepRecord {
    /// Agent that ran the step
    pub agent: String,
    /// Operation name
    pub operation: String,
    /// Whether the step succeeded
    pub success: bool,
    /// Rows in the step's result table
    pub row_count: usize,
}

/// Result of processing one user turn.
#[derive(Debug, Clone, Serialize)]
pub struct OrchestratorResult {
    /// Planner's interpretation of the query
    pub intent: String,
    /// Per-step success/failure ledger, in plan order
    pub steps_executed: Vec<StepRecord>,
    /// Agent outputs, one per executed step, in plan order
    pub outputs: Vec<AgentOutput>,
    /// Narrative assembled from succeeding steps' summaries
    pub narrative: String,
    /// Follow-up questions to suggest
    pub suggested_followups: Vec<String>,
    /// Turn-level error, if any
    pub error: Option<String>,
}
