//! Query planning
//!
//! Turns a natural-language question into an execution [`Plan`]. The
//! primary planner asks an LLM; when no planner is configured or the call
//! fails, the deterministic keyword planner in [`rules`] takes over, so a
//! plan is always produced.
//!
//! Conversation history is session-scoped: each session carries its own
//! window of recent turns into the LLM call, and clearing one session
//! never affects another.

pub mod llm;
pub mod rules;

use crate::config::PlannerConfig;
use crate::error::Result;
use crate::types::Plan;

pub use llm::PlannerClient;

/// Most recent turns carried into an LLM planning call.
const HISTORY_WINDOW: usize = 6;

/// Assistant turns are stored truncated to this many characters.
const HISTORY_TRUNCATE: usize = 500;

/// One prior conversation turn.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ChatMessage {
    /// "user" or "assistant"
    pub role: &'static str,
    /// Turn content (assistant turns truncated at storage time)
    pub content: String,
}

/// Session-scoped conversation history.
#[derive(Debug, Default)]
pub struct ConversationHistory {
    messages: Vec<ChatMessage>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one completed turn: the user's query and the narrative that
    /// answered it.
    pub fn record_turn(&mut self, user_query: &str, narrative: &str) {
        self.messages.push(ChatMessage {
            role: "user",
            content: user_query.to_string(),
        });
        self.messages.push(ChatMessage {
            role: "assistant",
            content: truncate_chars(narrative, HISTORY_TRUNCATE),
        });
    }

    /// The most recent turns, oldest first.
    pub fn window(&self) -> &[ChatMessage] {
        let start = self.messages.len().saturating_sub(HISTORY_WINDOW);
        &self.messages[start..]
    }

    /// Forget everything.
    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Truncate to at most `max` characters on a char boundary.
fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// The planner facade: LLM when configured, keyword rules otherwise.
pub struct Planner {
    client: Option<PlannerClient>,
}

impl Planner {
    /// Build a planner from optional configuration. `None`, or a config
    /// without a resolvable API key, yields a rules-only planner.
    pub fn new(config: Option<&PlannerConfig>) -> Result<Self> {
        let client = match config {
            Some(cfg) if cfg.resolved_api_key().is_some() => Some(PlannerClient::new(cfg.clone())?),
            _ => None,
        };
        Ok(Self { client })
    }

    /// Planner that never calls out, for tests and offline use.
    pub fn rules_only() -> Self {
        Self { client: None }
    }

    /// Produce a plan for one user query.
    ///
    /// Never fails: an LLM error degrades to the keyword planner with the
    /// failure reason noted in the plan intent.
    pub async fn plan(&self, user_query: &str, history: &ConversationHistory) -> Plan {
        let Some(client) = &self.client else {
            return rules::rule_based_plan(user_query, None);
        };

        match client.plan(user_query, history.window()).await {
            Ok(plan) => plan,
            Err(e) => {
                tracing::warn!(error = %e, "LLM planning failed, using rule-based fallback");
                rules::rule_based_plan(user_query, Some(&e.to_string()))
            }
        }
    }
}
