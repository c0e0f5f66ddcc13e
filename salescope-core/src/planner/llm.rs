//! LLM planner client
//!
//! Calls the Anthropic Messages API to turn a natural-language question
//! into an execution plan. Transient failures (5xx, timeouts, overload)
//! are retried with exponential backoff; anything else surfaces
//! immediately so the caller can fall back to the rule-based planner.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

use crate::config::PlannerConfig;
use crate::error::{Error, Result};
use crate::planner::ChatMessage;
use crate::types::Plan;

const ANTHROPIC_VERSION: &str = "2023-06-01";

const SYSTEM_PROMPT: &str = r#"You are an OLAP query planner for a Business Intelligence system.
Your job is to parse natural language business questions and output a JSON execution plan.

Available agents and their operations:
1. DimensionNavigator: drill_down, roll_up, group
2. CubeOperations: slice, dice, pivot, drill_through
3. KPICalculator: yoy_growth, mom_change, compare_periods, top_n, profit_margins, summary
4. ReportGenerator: executive_summary, trend_report, format_table
5. AnomalyDetection: monthly_anomaly, product_anomaly

Dimension values (use EXACT values):
- year: 2022, 2023, 2024
- quarter: "Q1", "Q2", "Q3", "Q4"
- month_name: "January", "February", ..., "December"
- region: "North America", "Europe", "Asia Pacific", "Latin America"
- category: "Electronics", "Furniture", "Office Supplies", "Clothing"
- customer_segment: "Consumer", "Corporate", "Home Office"

Output a JSON object with this structure:
{
  "intent": "one sentence description of what the user wants",
  "steps": [
    {
      "agent": "AgentName",
      "operation": "operation_name",
      "parameters": { ... }
    }
  ],
  "suggested_followups": ["follow-up question 1", "follow-up question 2"]
}

Rules:
- Always include a ReportGenerator step at the end unless the user only asks for raw data.
- For comparisons, always use KPICalculator with compare_periods.
- For drill-down requests, use DimensionNavigator with drill_down.
- For "top N" questions, use KPICalculator with top_n.
- Infer year = 2024 when user says "this year" or "current year".
- Infer year = 2023 when user says "last year".
- For "overall summary" or vague questions, use KPICalculator summary + ReportGenerator executive_summary.
- Output ONLY the JSON, no explanation, no markdown code fences."#;

/// Request body for POST /v1/messages
#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: &'a [ChatMessage],
}

/// Response from POST /v1/messages
#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

/// HTTP client for the Anthropic Messages API.
pub struct PlannerClient {
    config: PlannerConfig,
    http_client: reqwest::Client,
    base_url: String,
}

impl PlannerClient {
    /// Create a new planner client from configuration.
    ///
    /// Returns an error when no API key can be resolved.
    pub fn new(config: PlannerConfig) -> Result<Self> {
        let api_key = config
            .resolved_api_key()
            .ok_or_else(|| Error::Config("planner.api_key is required".to_string()))?;

        let base_url = config.endpoint().trim_end_matches('/').to_string();

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            "anthropic-version",
            HeaderValue::from_static(ANTHROPIC_VERSION),
        );
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(&api_key)
                .map_err(|e| Error::Config(format!("invalid api_key: {}", e)))?,
        );

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            config,
            http_client,
            base_url,
        })
    }

    /// Produce a plan for a user query, carrying recent history.
    ///
    /// Retries transient failures with exponential backoff before giving
    /// up.
    pub async fn plan(&self, user_query: &str, history: &[ChatMessage]) -> Result<Plan> {
        let mut messages: Vec<ChatMessage> = history.to_vec();
        messages.push(ChatMessage {
            role: "user",
            content: user_query.to_string(),
        });

        let mut last_error = None;
        let mut delay = Duration::from_millis(500);

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                tracing::debug!(
                    "Retrying plan request (attempt {}/{}), waiting {:?}",
                    attempt + 1,
                    self.config.max_retries + 1,
                    delay
                );
                tokio::time::sleep(delay).await;
                delay = std::cmp::min(delay * 2, Duration::from_secs(30));
            }

            match self.request_plan(&messages).await {
                Ok(plan) => return Ok(plan),
                Err(e) => {
                    if is_retryable_error(&e) {
                        tracing::warn!("Transient planner error: {}", e);
                        last_error = Some(e);
                        continue;
                    } else {
                        return Err(e);
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| Error::Planner("max retries exceeded".to_string())))
    }

    async fn request_plan(&self, messages: &[ChatMessage]) -> Result<Plan> {
        let url = format!("{}/v1/messages", self.base_url);

        let request_body = MessagesRequest {
            model: &self.config.model,
            max_tokens: self.config.max_tokens,
            system: SYSTEM_PROMPT,
            messages,
        };

        let response = self
            .http_client
            .post(&url)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| Error::Planner(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown".to_string());
            return Err(Error::Planner(format!(
                "API error ({}): {}",
                status, error_text
            )));
        }

        let result: MessagesResponse = response
            .json()
            .await
            .map_err(|e| Error::Planner(format!("failed to parse response: {}", e)))?;

        let raw = result
            .content
            .first()
            .map(|b| b.text.as_str())
            .unwrap_or_default();
        parse_plan_json(raw)
    }
}

/// Parse plan JSON out of the model's text, tolerating markdown code
/// fences the model sometimes emits despite instructions.
fn parse_plan_json(raw: &str) -> Result<Plan> {
    let stripped = strip_code_fences(raw.trim());
    serde_json::from_str(stripped)
        .map_err(|e| Error::Planner(format!("unusable plan JSON: {}", e)))
}

fn strip_code_fences(s: &str) -> &str {
    let s = s
        .strip_prefix("```json")
        .or_else(|| s.strip_prefix("```"))
        .unwrap_or(s);
    let s = s.strip_suffix("```").unwrap_or(s);
    s.trim()
}

/// Check if an error is retryable (transient)
fn is_retryable_error(error: &Error) -> bool {
    match error {
        Error::Planner(msg) => {
            msg.contains("API error (5")
                || msg.contains("API error (429")
                || msg.contains("timeout")
                || msg.contains("connection")
                || msg.contains("request failed")
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_requires_api_key() {
        let config = PlannerConfig::default();
        if std::env::var("ANTHROPIC_API_KEY").is_err() {
            assert!(PlannerClient::new(config).is_err());
        }
    }

    #[test]
    fn test_parse_plan_with_fences() {
        let raw = "```json\n{\"intent\": \"x\", \"steps\": [], \"suggested_followups\": []}\n```";
        let plan = parse_plan_json(raw).unwrap();
        assert_eq!(plan.intent, "x");
        assert!(plan.steps.is_empty());
    }

    #[test]
    fn test_parse_plan_without_fences() {
        let raw = r#"{"intent": "compare", "steps": [{"agent": "KPICalculator", "operation": "compare_periods"}]}"#;
        let plan = parse_plan_json(raw).unwrap();
        assert_eq!(plan.steps.len(), 1);
        assert!(plan.steps[0].parameters.is_null());
    }

    #[test]
    fn test_parse_plan_rejects_garbage() {
        assert!(matches!(
            parse_plan_json("I cannot help with that."),
            Err(Error::Planner(_))
        ));
    }

    #[test]
    fn test_is_retryable_error() {
        assert!(is_retryable_error(&Error::Planner(
            "API error (500 Internal Server Error): overloaded".to_string()
        )));
        assert!(is_retryable_error(&Error::Planner(
            "HTTP request failed: timeout".to_string()
        )));
        assert!(!is_retryable_error(&Error::Planner(
            "API error (400 Bad Request): bad request".to_string()
        )));
        assert!(!is_retryable_error(&Error::Planner(
            "unusable plan JSON: expected value".to_string()
        )));
    }
}
