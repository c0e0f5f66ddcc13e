//! Orchestrator
//!
//! One orchestrator per conversation session: it plans each user turn,
//! executes the plan step by step, and assembles the narrative. Step
//! failures are isolated: a failing step becomes a failed output in the
//! ledger and execution continues with the next step.

use crate::agents::{
    Agent, AgentInput, AnomalyDetectionAgent, CubeOperationsAgent, DimensionNavigatorAgent,
    KpiCalculatorAgent, ReportGeneratorAgent,
};
use crate::config::PlannerConfig;
use crate::db::Database;
use crate::error::Result;
use crate::planner::{ConversationHistory, Planner};
use crate::types::{AgentOutput, OrchestratorResult, Plan, StepRecord};

/// Plans, executes, and narrates one conversation session.
pub struct Orchestrator {
    db: Database,
    planner: Planner,
    agents: Vec<Box<dyn Agent>>,
    history: ConversationHistory,
}

impl Orchestrator {
    /// Create a session orchestrator over an open database.
    pub fn new(db: Database, planner_config: Option<&PlannerConfig>) -> Result<Self> {
        Ok(Self {
            db,
            planner: Planner::new(planner_config)?,
            agents: agent_registry(),
            history: ConversationHistory::new(),
        })
    }

    /// Session orchestrator that never calls out to an LLM.
    pub fn rules_only(db: Database) -> Self {
        Self {
            db,
            planner: Planner::rules_only(),
            agents: agent_registry(),
            history: ConversationHistory::new(),
        }
    }

    /// Main entry point: plan one user turn, execute it, and record the
    /// turn in the session history.
    pub async fn process(&mut self, user_query: &str) -> OrchestratorResult {
        let plan = self.planner.plan(user_query, &self.history).await;
        tracing::info!(
            intent = %plan.intent,
            steps = plan.steps.len(),
            "Executing plan"
        );

        let (outputs, steps_executed) =
            execute_plan(&self.db, &self.agents, &plan, user_query);

        let summaries: Vec<&str> = outputs
            .iter()
            .filter(|o| o.error.is_none() && !o.summary.is_empty())
            .map(|o| o.summary.as_str())
            .collect();
        let narrative = if summaries.is_empty() {
            "No results generated.".to_string()
        } else {
            summaries.join("\n\n")
        };

        self.history.record_turn(user_query, &narrative);

        OrchestratorResult {
            intent: plan.intent,
            steps_executed,
            outputs,
            narrative,
            suggested_followups: plan.suggested_followups,
            error: None,
        }
    }

    /// Clear this session's conversation history.
    pub fn reset_context(&mut self) {
        self.history.clear();
    }

    /// Number of stored history messages, for status display.
    pub fn history_len(&self) -> usize {
        self.history.len()
    }
}

/// All agents a plan can address.
fn agent_registry() -> Vec<Box<dyn Agent>> {
    vec![
        Box::new(DimensionNavigatorAgent),
        Box::new(CubeOperationsAgent),
        Box::new(KpiCalculatorAgent),
        Box::new(ReportGeneratorAgent),
        Box::new(AnomalyDetectionAgent),
    ]
}

/// Execute a plan's steps in order.
///
/// Steps naming an unknown agent are skipped without a ledger entry;
/// a step whose agent returns an error becomes a failed output and
/// execution continues.
pub fn execute_plan(
    db: &Database,
    agents: &[Box<dyn Agent>],
    plan: &Plan,
    user_query: &str,
) -> (Vec<AgentOutput>, Vec<StepRecord>) {
    let mut outputs = Vec::with_capacity(plan.steps.len());
    let mut records = Vec::with_capacity(plan.steps.len());

    for plan_step in &plan.steps {
        let Some(agent) = agents.iter().find(|a| a.name() == plan_step.agent) else {
            tracing::debug!(agent = %plan_step.agent, "Skipping step for unknown agent");
            continue;
        };

        let input = AgentInput {
            operation: &plan_step.operation,
            parameters: &plan_step.parameters,
            context: Some(user_query),
        };

        let output = match agent.run(&input, db) {
            Ok(output) => output,
            Err(e) => {
                tracing::warn!(
                    agent = %plan_step.agent,
                    operation = %plan_step.operation,
                    error = %e,
                    "Plan step failed"
                );
                AgentOutput::failed(&plan_step.agent, &plan_step.operation, e.to_string())
            }
        };

        records.push(StepRecord {
            agent: plan_step.agent.clone(),
            operation: plan_step.operation.clone(),
            success: output.error.is_none(),
            row_count: output.row_count(),
        });
        outputs.push(output);
    }

    (outputs, records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PlanStep;

    fn empty_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();
        db
    }

    #[test]
    fn test_unknown_agent_is_skipped() {
        let db = empty_db();
        let agents = agent_registry();
        let plan = Plan {
            intent: String::new(),
            steps: vec![
                PlanStep {
                    agent: "Visualization".to_string(),
                    operation: "visualize".to_string(),
                    parameters: serde_json::Value::Null,
                },
                PlanStep {
                    agent: "KPICalculator".to_string(),
                    operation: "summary".to_string(),
                    parameters: serde_json::Value::Null,
                },
            ],
            suggested_followups: Vec::new(),
        };

        let (outputs, records) = execute_plan(&db, &agents, &plan, "test");
        assert_eq!(outputs.len(), 1);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].agent, "KPICalculator");
    }

    #[test]
    fn test_failing_step_does_not_stop_execution() {
        let db = empty_db();
        let agents = agent_registry();
        let plan = Plan {
            intent: String::new(),
            steps: vec![
                PlanStep {
                    agent: "KPICalculator".to_string(),
                    operation: "launch_rockets".to_string(),
                    parameters: serde_json::Value::Null,
                },
                PlanStep {
                    agent: "KPICalculator".to_string(),
                    operation: "summary".to_string(),
                    parameters: serde_json::Value::Null,
                },
            ],
            suggested_followups: Vec::new(),
        };

        let (outputs, records) = execute_plan(&db, &agents, &plan, "test");
        assert_eq!(outputs.len(), 2);
        assert!(outputs[0].error.is_some());
        assert!(outputs[1].error.is_none());
        assert!(!records[0].success);
        assert!(records[1].success);
    }
}
