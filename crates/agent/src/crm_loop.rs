//! Bounded tool-calling conversation with the model for CRM questions.
//!
//! Each model turn is parsed into a tagged [`AgentStep`]; there is no
//! free-text type sniffing downstream. The loop runs at most `max_steps`
//! turns before giving up with a polite failure answer, which the workflow's
//! failure markers then treat as a CRM miss (and fall back to SQL when the
//! routing decision allows it).

use std::sync::Arc;

use anyhow::Result;
use askdb_core::routing::{strip_code_fences, ToolDescriptor};
use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use crate::llm::{ChatTurn, LlmClient};
use crate::prompts;

/// One parsed model turn.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AgentStep {
    /// The model answered the question.
    FinalAnswer(String),
    /// The model wants a tool call before answering.
    Action { tool: String, input: Value },
}

/// Parses a model reply into a step. A JSON object with `action` is a tool
/// call, one with `final` is an answer; anything else is taken verbatim as a
/// direct answer.
pub fn parse_step(raw: &str) -> AgentStep {
    let stripped = strip_code_fences(raw);
    let Ok(value) = serde_json::from_str::<Value>(&stripped) else {
        return AgentStep::FinalAnswer(stripped);
    };

    let Some(object) = value.as_object() else {
        return AgentStep::FinalAnswer(stripped);
    };

    if let Some(tool) = object.get("action").and_then(Value::as_str) {
        let input = object.get("input").cloned().unwrap_or(Value::Null);
        return AgentStep::Action { tool: tool.trim().to_string(), input };
    }

    if let Some(answer) = object.get("final").and_then(Value::as_str) {
        return AgentStep::FinalAnswer(answer.to_string());
    }

    AgentStep::FinalAnswer(stripped)
}

/// What a tool call produced, as fed back into the next model turn. Failures
/// are observations too; the model decides how to proceed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Observation {
    pub tool: String,
    pub content: String,
}

/// Executes named CRM tools against whatever backs them. The workflow tests
/// substitute a scripted implementation.
#[async_trait]
pub trait CrmToolExecutor: Send + Sync {
    fn catalog(&self) -> &[ToolDescriptor];
    async fn execute(&self, tool: &str, input: &Value) -> Observation;
}

const GAVE_UP_ANSWER: &str =
    "I am sorry, I could not complete the CRM lookup within the allowed number of steps.";

pub struct CrmConversation<E> {
    llm: Arc<dyn LlmClient>,
    executor: E,
    max_steps: u32,
}

impl<E: CrmToolExecutor> CrmConversation<E> {
    pub fn new(llm: Arc<dyn LlmClient>, executor: E, max_steps: u32) -> Self {
        Self { llm, executor, max_steps: max_steps.max(1) }
    }

    /// Runs the conversation to a final answer. Model transport errors
    /// propagate; tool failures do not, they become observations.
    pub async fn run(&self, question: &str, history: &[ChatTurn]) -> Result<String> {
        let system = prompts::crm_conversation_system(self.executor.catalog());
        let mut observations: Vec<Observation> = Vec::new();

        for step in 0..self.max_steps {
            let user = prompts::crm_conversation_user(question, history, &observations);
            let raw = self.llm.complete(&system, &user).await?;

            match parse_step(&raw) {
                AgentStep::FinalAnswer(answer) => {
                    debug!(event_name = "crm.final_answer", step, "crm conversation finished");
                    return Ok(answer);
                }
                AgentStep::Action { tool, input } => {
                    debug!(event_name = "crm.tool_call", step, tool = %tool, "executing crm tool");
                    observations.push(self.executor.execute(&tool, &input).await);
                }
            }
        }

        warn!(
            event_name = "crm.step_budget_exhausted",
            max_steps = self.max_steps,
            "crm conversation gave up"
        );
        Ok(GAVE_UP_ANSWER.to_string())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use anyhow::Result;
    use askdb_core::routing::ToolDescriptor;
    use async_trait::async_trait;
    use serde_json::{json, Value};

    use super::{parse_step, AgentStep, CrmConversation, CrmToolExecutor, Observation};
    use crate::llm::LlmClient;

    struct ScriptedLlm {
        replies: Mutex<Vec<String>>,
    }

    impl ScriptedLlm {
        fn new(replies: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.iter().rev().map(|r| r.to_string()).collect()),
            })
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn complete(&self, _system: &str, _user: &str) -> Result<String> {
            let mut replies = self.replies.lock().expect("lock");
            Ok(replies.pop().unwrap_or_else(|| "{\"final\": \"out of script\"}".to_string()))
        }
    }

    struct RecordingExecutor {
        catalog: Vec<ToolDescriptor>,
        calls: Mutex<Vec<(String, Value)>>,
    }

    impl RecordingExecutor {
        fn new() -> Self {
            Self {
                catalog: vec![ToolDescriptor::new("get_lead_info", "Lead by id.")],
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl CrmToolExecutor for RecordingExecutor {
        fn catalog(&self) -> &[ToolDescriptor] {
            &self.catalog
        }

        async fn execute(&self, tool: &str, input: &Value) -> Observation {
            self.calls.lock().expect("lock").push((tool.to_string(), input.clone()));
            Observation { tool: tool.to_string(), content: "{\"status\": \"New\"}".to_string() }
        }
    }

    #[test]
    fn parse_recognizes_action_and_final() {
        let action = parse_step(r#"{"action": "get_lead_info", "input": {"id": 7}}"#);
        assert_eq!(
            action,
            AgentStep::Action { tool: "get_lead_info".to_string(), input: json!({"id": 7}) }
        );

        let answer = parse_step("```json\n{\"final\": \"Lead LD001 is New.\"}\n```");
        assert_eq!(answer, AgentStep::FinalAnswer("Lead LD001 is New.".to_string()));
    }

    #[test]
    fn plain_text_reply_is_a_final_answer() {
        assert_eq!(
            parse_step("Lead LD001 is currently in the New stage."),
            AgentStep::FinalAnswer("Lead LD001 is currently in the New stage.".to_string())
        );
    }

    #[tokio::test]
    async fn loop_feeds_observation_back_then_returns_answer() {
        let llm = ScriptedLlm::new(&[
            r#"{"action": "get_lead_info", "input": {"id": 1}}"#,
            r#"{"final": "Lead LD001 is in status New."}"#,
        ]);
        let executor = RecordingExecutor::new();
        let conversation = CrmConversation::new(llm, executor, 6);

        let answer = conversation.run("What is the status of lead 1?", &[]).await.expect("run");
        assert_eq!(answer, "Lead LD001 is in status New.");
        assert_eq!(conversation.executor.calls.lock().expect("lock").len(), 1);
    }

    #[tokio::test]
    async fn loop_gives_up_after_step_budget() {
        let llm = ScriptedLlm::new(&[
            r#"{"action": "get_lead_info", "input": {"id": 1}}"#,
            r#"{"action": "get_lead_info", "input": {"id": 1}}"#,
            r#"{"action": "get_lead_info", "input": {"id": 1}}"#,
        ]);
        let conversation = CrmConversation::new(llm, RecordingExecutor::new(), 3);

        let answer = conversation.run("status?", &[]).await.expect("run");
        assert!(answer.starts_with("I am sorry"));
    }
}
