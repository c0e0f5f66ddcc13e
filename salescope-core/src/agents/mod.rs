//! Analytical agents
//!
//! Each agent encapsulates one OLAP capability and exposes a closed set of
//! operations. Operation names arrive as strings from a plan; each agent
//! parses them into its own operation enum and rejects anything unknown.
//! (Filters are the permissive side of that asymmetry; operations are the
//! strict side, so caller bugs surface.)
//!
//! Agents are stateless: every call receives the database handle and
//! returns a structured [`AgentOutput`]. Errors are returned, not
//! swallowed; the plan executor converts them into failed outputs.

pub mod anomaly;
pub mod cube;
pub mod kpi;
pub mod navigator;
pub mod report;

use crate::db::Database;
use crate::error::Result;
use crate::types::AgentOutput;
use serde::de::DeserializeOwned;

pub use anomaly::AnomalyDetectionAgent;
pub use cube::CubeOperationsAgent;
pub use kpi::KpiCalculatorAgent;
pub use navigator::DimensionNavigatorAgent;
pub use report::ReportGeneratorAgent;

/// Structured input passed to an agent.
#[derive(Debug, Clone, Copy)]
pub struct AgentInput<'a> {
    /// Operation name as it appeared in the plan
    pub operation: &'a str,
    /// Operation parameter bag (JSON object or null)
    pub parameters: &'a serde_json::Value,
    /// The user's original query text, for logging context
    pub context: Option<&'a str>,
}

/// Trait implemented by every analytical agent.
pub trait Agent: Send + Sync {
    /// Agent identifier used in plans (e.g. "KPICalculator")
    fn name(&self) -> &'static str;

    /// Execute one operation and return its structured output.
    fn run(&self, input: &AgentInput, db: &Database) -> Result<AgentOutput>;
}

/// Normalize an operation name: lower-case, hyphens to underscores.
pub fn normalize_op(op: &str) -> String {
    op.to_lowercase().replace('-', "_")
}

/// Deserialize an operation's parameter bag into a typed struct.
///
/// `null` (a step with no parameters) behaves like an empty object so
/// every field takes its serde default.
pub fn parse_params<T: DeserializeOwned>(value: &serde_json::Value) -> Result<T> {
    let value = if value.is_null() {
        serde_json::Value::Object(serde_json::Map::new())
    } else {
        value.clone()
    };
    Ok(serde_json::from_value(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct TestParams {
        #[serde(default = "default_n")]
        n: i64,
    }

    fn default_n() -> i64 {
        5
    }

    #[test]
    fn test_normalize_op() {
        assert_eq!(normalize_op("Drill-Down"), "drill_down");
        assert_eq!(normalize_op("top_n"), "top_n");
    }

    #[test]
    fn test_parse_params_null_uses_defaults() {
        let p: TestParams = parse_params(&serde_json::Value::Null).unwrap();
        assert_eq!(p.n, 5);

        let p: TestParams = parse_params(&serde_json::json!({"n": 3})).unwrap();
        assert_eq!(p.n, 3);
    }
}
