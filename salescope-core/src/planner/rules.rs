//! Deterministic keyword planner
//!
//! Fallback used when no LLM planner is configured or the LLM call fails.
//! Classification is a fixed priority order of keyword checks over the
//! lower-cased query; the first matching pattern wins. Dimension values
//! mentioned in the query become filters on the planned step.
//!
//! Every plan ends with an executive-summary step so the user always gets
//! a narrative.

use crate::types::{Plan, PlanStep};
use serde_json::json;

const YEARS: [i64; 3] = [2022, 2023, 2024];
const QUARTERS: [&str; 4] = ["Q1", "Q2", "Q3", "Q4"];
const REGIONS: [(&str, &str); 4] = [
    ("north america", "North America"),
    ("europe", "Europe"),
    ("asia pacific", "Asia Pacific"),
    ("latin america", "Latin America"),
];
const CATEGORIES: [(&str, &str); 4] = [
    ("electronics", "Electronics"),
    ("furniture", "Furniture"),
    ("office supplies", "Office Supplies"),
    ("clothing", "Clothing"),
];

/// Build a plan for a query by keyword classification.
///
/// `fallback_error` is the LLM failure reason when this planner is acting
/// as a degraded path; it is surfaced in the plan intent.
pub fn rule_based_plan(query: &str, fallback_error: Option<&str>) -> Plan {
    let q = query.to_lowercase();

    let years: Vec<i64> = YEARS
        .iter()
        .copied()
        .filter(|y| q.contains(&y.to_string()))
        .collect();
    let quarter = QUARTERS.iter().find(|qt| q.contains(&qt.to_lowercase()));
    let region = REGIONS.iter().find(|(k, _)| q.contains(k)).map(|(_, v)| *v);
    let category = CATEGORIES
        .iter()
        .find(|(k, _)| q.contains(k))
        .map(|(_, v)| *v);

    let mut filters = serde_json::Map::new();
    if years.len() == 1 {
        filters.insert("year".to_string(), json!(years[0]));
    }
    if let Some(qt) = quarter {
        filters.insert("quarter".to_string(), json!(qt));
    }
    if let Some(r) = region {
        filters.insert("region".to_string(), json!(r));
    }
    if let Some(c) = category {
        filters.insert("category".to_string(), json!(c));
    }
    let filters = serde_json::Value::Object(filters);
    let filter_count = filters.as_object().map(|m| m.len()).unwrap_or(0);

    let mut steps: Vec<PlanStep> = Vec::new();

    if q.contains("compare") || q.contains("vs") || q.contains("versus") || q.contains("growth") {
        if years.len() >= 2 {
            let min_year = years.iter().min().copied().unwrap_or(YEARS[0]);
            let max_year = years.iter().max().copied().unwrap_or(YEARS[2]);
            let group_by = if q.contains("region") {
                json!("region")
            } else if q.contains("categor") {
                json!("category")
            } else {
                json!(null)
            };
            steps.push(step(
                "KPICalculator",
                "compare_periods",
                json!({
                    "period_a": {"year": min_year},
                    "period_b": {"year": max_year},
                    "group_by": group_by,
                }),
            ));
        } else {
            let dimension = if q.contains("region") {
                json!("region")
            } else {
                json!(null)
            };
            steps.push(step(
                "KPICalculator",
                "yoy_growth",
                json!({"dimension": dimension}),
            ));
        }
    } else if q.contains("drill") && (q.contains("down") || q.contains("into") || q.contains("break"))
    {
        let mut hierarchy = "time";
        let mut to_level = "quarter";
        if q.contains("month") {
            to_level = "month";
        }
        if q.contains("countr") {
            hierarchy = "geography";
            to_level = "country";
        }
        if q.contains("subcategor") {
            hierarchy = "product";
            to_level = "subcategory";
        }
        steps.push(step(
            "DimensionNavigator",
            "drill_down",
            json!({"hierarchy": hierarchy, "to_level": to_level, "filters": filters}),
        ));
    } else if q.contains("top") {
        let n = q
            .split_whitespace()
            .find_map(|w| w.parse::<i64>().ok())
            .unwrap_or(5);
        let dimension = if q.contains("countr") {
            "country"
        } else if q.contains("sub") {
            "subcategory"
        } else if q.contains("categor") {
            "category"
        } else {
            "region"
        };
        let measure = if q.contains("profit") {
            "profit"
        } else {
            "revenue"
        };
        steps.push(step(
            "KPICalculator",
            "top_n",
            json!({"n": n, "dimension": dimension, "measure": measure, "filters": filters}),
        ));
    } else if q.contains("trend") || q.contains("month") {
        let year = years.first().copied().unwrap_or(2024);
        steps.push(step("ReportGenerator", "trend_report", json!({"year": year})));
    } else if q.contains("slice") || filter_count == 1 {
        let group_by = if q.contains("category") || q.contains("product") {
            "category"
        } else {
            "region"
        };
        steps.push(step(
            "CubeOperations",
            "slice",
            json!({"filter": filters, "group_by": [group_by]}),
        ));
    } else if q.contains("dice") || filter_count >= 2 {
        let group_by = if q.contains("countr") {
            "country"
        } else if q.contains("sub") {
            "subcategory"
        } else {
            "region"
        };
        steps.push(step(
            "CubeOperations",
            "dice",
            json!({"filters": filters, "group_by": [group_by]}),
        ));
    } else if q.contains("pivot") {
        steps.push(step(
            "CubeOperations",
            "pivot",
            json!({"row_dim": "region", "col_dim": "year", "measure": "revenue"}),
        ));
    } else if q.contains("anomal") || q.contains("unusual") || q.contains("outlier") {
        steps.push(step("AnomalyDetection", "monthly_anomaly", json!({})));
    } else if q.contains("margin") || q.contains("profit") {
        let dimension = if q.contains("categor") {
            "category"
        } else {
            "region"
        };
        steps.push(step(
            "KPICalculator",
            "profit_margins",
            json!({"dimension": dimension, "filters": filters}),
        ));
    } else if q.contains("region") || q.contains("revenue by") {
        steps.push(step(
            "DimensionNavigator",
            "group",
            json!({"dimensions": ["region"], "filters": filters}),
        ));
    }

    if steps.is_empty() {
        steps.push(step("KPICalculator", "summary", json!({})));
    }

    // Every plan ends with a narrative.
    steps.push(step("ReportGenerator", "executive_summary", json!({})));

    let intent = match fallback_error {
        Some(e) => format!("Answering: '{}' [rule-based fallback: {}]", query, e),
        None => format!("Answering: '{}'", query),
    };

    Plan {
        intent,
        steps,
        suggested_followups: vec![
            "Which region has the highest growth?".to_string(),
            "Show me the top 5 subcategories by profit".to_string(),
            "Compare 2023 vs 2024 by category".to_string(),
        ],
    }
}

fn step(agent: &str, operation: &str, parameters: serde_json::Value) -> PlanStep {
    PlanStep {
        agent: agent.to_string(),
        operation: operation.to_string(),
        parameters,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comparison_with_two_years() {
        let plan = rule_based_plan("compare 2023 and 2024 by region", None);
        assert_eq!(plan.steps.len(), 2);

        let first = &plan.steps[0];
        assert_eq!(first.agent, "KPICalculator");
        assert_eq!(first.operation, "compare_periods");
        assert_eq!(first.parameters["period_a"]["year"], 2023);
        assert_eq!(first.parameters["period_b"]["year"], 2024);
        assert_eq!(first.parameters["group_by"], "region");

        let last = plan.steps.last().unwrap();
        assert_eq!(last.agent, "ReportGenerator");
        assert_eq!(last.operation, "executive_summary");
    }

    #[test]
    fn test_growth_without_years_is_yoy() {
        let plan = rule_based_plan("show revenue growth", None);
        assert_eq!(plan.steps[0].operation, "yoy_growth");
        assert!(plan.steps[0].parameters["dimension"].is_null());
    }

    #[test]
    fn test_drill_down_to_country() {
        let plan = rule_based_plan("drill down into countries in Europe", None);
        let first = &plan.steps[0];
        assert_eq!(first.operation, "drill_down");
        assert_eq!(first.parameters["hierarchy"], "geography");
        assert_eq!(first.parameters["to_level"], "country");
        assert_eq!(first.parameters["filters"]["region"], "Europe");
    }

    #[test]
    fn test_top_n_parses_count_and_measure() {
        let plan = rule_based_plan("top 3 subcategories by profit", None);
        let first = &plan.steps[0];
        assert_eq!(first.operation, "top_n");
        assert_eq!(first.parameters["n"], 3);
        assert_eq!(first.parameters["dimension"], "subcategory");
        assert_eq!(first.parameters["measure"], "profit");
    }

    #[test]
    fn test_anomaly_keywords() {
        let plan = rule_based_plan("any unusual sales patterns?", None);
        assert_eq!(plan.steps[0].agent, "AnomalyDetection");
        assert_eq!(plan.steps[0].operation, "monthly_anomaly");
    }

    #[test]
    fn test_vague_query_falls_back_to_summary() {
        let plan = rule_based_plan("how are we doing?", None);
        assert_eq!(plan.steps[0].agent, "KPICalculator");
        assert_eq!(plan.steps[0].operation, "summary");
        assert_eq!(plan.steps.len(), 2);
        assert_eq!(plan.suggested_followups.len(), 3);
    }

    #[test]
    fn test_fallback_error_lands_in_intent() {
        let plan = rule_based_plan("summary", Some("connection refused"));
        assert!(plan.intent.contains("rule-based fallback: connection refused"));
    }

    #[test]
    fn test_single_filter_becomes_slice() {
        let plan = rule_based_plan("sales in Europe", None);
        let first = &plan.steps[0];
        assert_eq!(first.agent, "CubeOperations");
        assert_eq!(first.operation, "slice");
        assert_eq!(first.parameters["filter"]["region"], "Europe");
    }
}
