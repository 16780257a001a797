//! The question-routing state machine.
//!
//! A request walks a fixed node graph: classify, dispatch to exactly one
//! primary path (CRM, SQL, clarification, or general), optionally chart the
//! result, and always funnel into a final response. Nodes never let errors
//! escape; failures accumulate as text on the request state and drain
//! through the terminal HandleError node. The only cycle is the single
//! CRM-to-SQL fallback, bounded by a flag so a second failure terminates.

use std::sync::Arc;

use anyhow::Result as AnyResult;
use askdb_core::config::WorkflowConfig;
use askdb_core::errors::{format_user_error, WorkflowError};
use askdb_core::routing::{QueryTool, RoutingDecision, SqlRoutingHints, ToolDescriptor};
use askdb_core::safety::check_read_only;
use askdb_core::tabulate::{rows_to_markdown, ResultRow};
use askdb_core::{SchemaMap, SchemaSnapshot};
use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::chart::{self, ChartSpec, Visualization};
use crate::crm_loop::{CrmConversation, CrmToolExecutor};
use crate::llm::{ChatTurn, LlmClient};
use crate::prompts;
use crate::router;
use crate::sqlgen;

// Longest legal path: route, crm, fallback to sql, generate, execute,
// visualize, respond. A budget well above that guards against a bug ever
// looping the graph.
const MAX_TRANSITIONS: u32 = 16;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkflowNode {
    PrimaryRoute,
    SqlRoute,
    GenerateSql,
    ExecuteSql,
    CallCrm,
    Visualization,
    GeneralResponse,
    Clarify,
    FinalResponse,
    HandleError,
    Done,
}

impl WorkflowNode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PrimaryRoute => "primary_route",
            Self::SqlRoute => "sql_route",
            Self::GenerateSql => "generate_sql",
            Self::ExecuteSql => "execute_sql",
            Self::CallCrm => "call_crm",
            Self::Visualization => "visualization",
            Self::GeneralResponse => "general_response",
            Self::Clarify => "clarify",
            Self::FinalResponse => "final_response",
            Self::HandleError => "handle_error",
            Self::Done => "done",
        }
    }
}

/// Everything accumulated while one question walks the graph.
#[derive(Clone, Debug, Default)]
pub struct RequestState {
    pub question: String,
    pub history: Vec<ChatTurn>,
    pub decision: Option<RoutingDecision>,
    pub hints: Option<SqlRoutingHints>,
    pub sql: Option<String>,
    pub rows: Vec<ResultRow>,
    pub error: String,
    pub visualization: Option<Visualization>,
    pub response: Option<String>,
    pub crm_fallback_used: bool,
}

impl RequestState {
    fn new(question: &str, history: &[ChatTurn]) -> Self {
        Self {
            question: question.to_string(),
            history: history.to_vec(),
            ..Self::default()
        }
    }

    pub fn succeeded(&self) -> bool {
        self.error.is_empty() && self.response.is_some()
    }

    fn fail(&mut self, error: WorkflowError) -> WorkflowNode {
        self.error = error.to_string();
        WorkflowNode::HandleError
    }
}

/// Executes generated SQL. The production implementation wraps the database
/// pool; tests substitute scripted rows.
#[async_trait]
pub trait SqlBackend: Send + Sync {
    async fn fetch(&self, sql: &str) -> Result<Vec<ResultRow>, WorkflowError>;
}

/// Answers a CRM question end to end (tool conversation included).
#[async_trait]
pub trait CrmBackend: Send + Sync {
    async fn answer(&self, question: &str, history: &[ChatTurn]) -> AnyResult<String>;
}

#[async_trait]
impl<E: CrmToolExecutor> CrmBackend for CrmConversation<E> {
    async fn answer(&self, question: &str, history: &[ChatTurn]) -> AnyResult<String> {
        self.run(question, history).await
    }
}

pub struct Workflow {
    llm: Arc<dyn LlmClient>,
    sql: Arc<dyn SqlBackend>,
    crm: Option<Arc<dyn CrmBackend>>,
    crm_catalog: Vec<ToolDescriptor>,
    snapshot: Arc<SchemaSnapshot>,
    schema_map: Arc<SchemaMap>,
    failure_markers: Vec<String>,
}

impl Workflow {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        sql: Arc<dyn SqlBackend>,
        crm: Option<Arc<dyn CrmBackend>>,
        crm_catalog: Vec<ToolDescriptor>,
        snapshot: Arc<SchemaSnapshot>,
        schema_map: Arc<SchemaMap>,
        config: &WorkflowConfig,
    ) -> Self {
        Self {
            llm,
            sql,
            crm,
            crm_catalog,
            snapshot,
            schema_map,
            failure_markers: config.crm_failure_markers.clone(),
        }
    }

    /// Drives one question through the graph to a terminal state. Never
    /// returns an error: every failure ends as a polite response with the
    /// error text recorded on the state.
    pub async fn run(&self, question: &str, history: &[ChatTurn]) -> RequestState {
        let mut state = RequestState::new(question, history);
        let mut node = WorkflowNode::PrimaryRoute;

        for _ in 0..MAX_TRANSITIONS {
            if node == WorkflowNode::Done {
                break;
            }
            let next = self.step(node, &mut state).await;
            debug!(
                event_name = "workflow.transition",
                from = node.as_str(),
                to = next.as_str(),
                "workflow transition"
            );
            node = next;
        }

        if node != WorkflowNode::Done {
            warn!(event_name = "workflow.budget_exceeded", "workflow exceeded transition budget");
            state.error = "workflow exceeded its transition budget".to_string();
            self.handle_error(&mut state);
        }

        state
    }

    async fn step(&self, node: WorkflowNode, state: &mut RequestState) -> WorkflowNode {
        match node {
            WorkflowNode::PrimaryRoute => self.primary_route(state).await,
            WorkflowNode::SqlRoute => self.sql_route(state).await,
            WorkflowNode::GenerateSql => self.generate_sql(state).await,
            WorkflowNode::ExecuteSql => self.execute_sql(state).await,
            WorkflowNode::CallCrm => self.call_crm(state).await,
            WorkflowNode::Visualization => self.visualization(state),
            WorkflowNode::GeneralResponse => self.general_response(state).await,
            WorkflowNode::Clarify => self.clarify(state).await,
            WorkflowNode::FinalResponse => self.final_response(state).await,
            WorkflowNode::HandleError => {
                self.handle_error(state);
                WorkflowNode::Done
            }
            WorkflowNode::Done => WorkflowNode::Done,
        }
    }

    async fn primary_route(&self, state: &mut RequestState) -> WorkflowNode {
        match router::route_primary(self.llm.as_ref(), &state.question, &self.crm_catalog).await {
            Ok(decision) => {
                let next = dispatch_decision(&decision);
                state.decision = Some(decision);
                match next {
                    Some(node) => node,
                    None => state.fail(WorkflowError::Routing(
                        "visualization cannot be the primary tool".into(),
                    )),
                }
            }
            Err(error) => state.fail(error),
        }
    }

    async fn sql_route(&self, state: &mut RequestState) -> WorkflowNode {
        match router::route_sql_hints(self.llm.as_ref(), &state.question, &self.schema_map).await {
            Ok(hints) => {
                debug!(
                    event_name = "workflow.schema_selected",
                    tables = hints.relevant_tables.join(","),
                    reasoning = %hints.reasoning,
                    "schema hints chosen"
                );
                state.hints = Some(hints);
                WorkflowNode::GenerateSql
            }
            Err(error) => state.fail(error),
        }
    }

    async fn generate_sql(&self, state: &mut RequestState) -> WorkflowNode {
        let Some(hints) = state.hints.clone() else {
            return state
                .fail(WorkflowError::Schema("sql generation reached without hints".into()));
        };

        match sqlgen::generate_sql(self.llm.as_ref(), &state.question, &self.snapshot, &hints)
            .await
        {
            Ok(sql) => {
                state.sql = Some(sql);
                WorkflowNode::ExecuteSql
            }
            Err(error) => state.fail(error),
        }
    }

    async fn execute_sql(&self, state: &mut RequestState) -> WorkflowNode {
        let sql = match state.sql.as_deref() {
            Some(sql) if !sql.trim().is_empty() => sql.to_string(),
            _ => {
                return state
                    .fail(WorkflowError::Generation("no SQL statement to execute".into()))
            }
        };

        // Checked here before the backend is ever consulted; the backend
        // checks again on its own.
        if let Err(error) = check_read_only(&sql) {
            return state.fail(error);
        }

        match self.sql.fetch(&sql).await {
            Ok(rows) => {
                info!(
                    event_name = "workflow.sql_executed",
                    row_count = rows.len(),
                    "sql execution complete"
                );
                state.rows = rows;
                WorkflowNode::Visualization
            }
            Err(error) => state.fail(error),
        }
    }

    async fn call_crm(&self, state: &mut RequestState) -> WorkflowNode {
        let Some(crm) = &self.crm else {
            state.error =
                WorkflowError::RemoteCall("crm backend is not available".into()).to_string();
            return self.crm_failure_transition(state);
        };

        match crm.answer(&state.question, &state.history).await {
            Ok(answer) => {
                if contains_failure_marker(&answer, &self.failure_markers) {
                    info!(event_name = "workflow.crm_soft_failure", "crm answered with failure text");
                    state.error = answer;
                    self.crm_failure_transition(state)
                } else {
                    state.response = Some(answer);
                    WorkflowNode::Visualization
                }
            }
            Err(error) => {
                state.error = WorkflowError::RemoteCall(error.to_string()).to_string();
                self.crm_failure_transition(state)
            }
        }
    }

    /// CRM failed, hard or soft. When the routing decision offered the SQL
    /// path as fallback and it has not been taken yet, mutate the decision
    /// and re-enter the SQL path fresh; otherwise surface the error.
    fn crm_failure_transition(&self, state: &mut RequestState) -> WorkflowNode {
        let fallback_available = state
            .decision
            .as_ref()
            .is_some_and(|decision| decision.fallback_tool == Some(QueryTool::SqlRouterAgent));

        if fallback_available && !state.crm_fallback_used {
            info!(event_name = "workflow.crm_fallback", "rerouting failed crm question to sql");
            if let Some(decision) = state.decision.as_mut() {
                decision.tool = QueryTool::SqlRouterAgent;
                decision.fallback_tool = None;
                decision.reasoning = "crm lookup failed; falling back to database".to_string();
            }
            state.crm_fallback_used = true;
            state.error.clear();
            WorkflowNode::SqlRoute
        } else {
            WorkflowNode::HandleError
        }
    }

    fn visualization(&self, state: &mut RequestState) -> WorkflowNode {
        if !chart::wants_visualization(&state.question) || state.rows.is_empty() {
            return WorkflowNode::FinalResponse;
        }

        match ChartSpec::prepare(&state.question, &state.rows) {
            Ok(spec) => match chart::render(&spec) {
                Ok(visualization) => {
                    info!(
                        event_name = "workflow.chart_rendered",
                        kind = ?visualization.kind,
                        "chart rendered"
                    );
                    state.visualization = Some(visualization);
                }
                Err(error) => {
                    // Renderer problems downgrade to "no chart".
                    warn!(event_name = "workflow.chart_failed", error = %error, "chart skipped");
                }
            },
            Err(error) => {
                debug!(event_name = "workflow.chart_skipped", error = %error, "no chart");
            }
        }

        WorkflowNode::FinalResponse
    }

    async fn general_response(&self, state: &mut RequestState) -> WorkflowNode {
        let system = prompts::general_answer_system();
        match self.llm.complete(&system, &state.question).await {
            Ok(answer) => state.response = Some(answer),
            Err(error) => {
                state.error = WorkflowError::Formatting(error.to_string()).to_string();
                state.response = Some(format_user_error(&state.error));
            }
        }
        WorkflowNode::FinalResponse
    }

    async fn clarify(&self, state: &mut RequestState) -> WorkflowNode {
        let reasoning = state
            .decision
            .as_ref()
            .map(|decision| decision.reasoning.clone())
            .unwrap_or_default();
        let system = prompts::clarification_system(&reasoning);

        match self.llm.complete(&system, &state.question).await {
            Ok(question) => state.response = Some(question),
            Err(error) => {
                state.error = WorkflowError::Formatting(error.to_string()).to_string();
                state.response = Some(format_user_error(&state.error));
            }
        }
        WorkflowNode::Done
    }

    async fn final_response(&self, state: &mut RequestState) -> WorkflowNode {
        // CRM, clarification, and general answers arrive pre-formed.
        if state.response.is_some() {
            return WorkflowNode::Done;
        }

        let table = rows_to_markdown(&state.rows);
        let system = prompts::final_narration_system(state.sql.as_deref(), &table, &state.error);

        match self.llm.complete(&system, &state.question).await {
            Ok(answer) => state.response = Some(answer),
            Err(error) => {
                state.error = WorkflowError::Formatting(error.to_string()).to_string();
                state.response = Some(format_user_error(&state.error));
            }
        }
        WorkflowNode::Done
    }

    fn handle_error(&self, state: &mut RequestState) {
        if state.error.is_empty() {
            state.error = "unknown workflow failure".to_string();
        }
        state.response = Some(format_user_error(&state.error));
    }
}

/// Maps a routing decision to its entry node. `None` marks the one decision
/// that cannot lead anywhere (visualization as the primary tool).
fn dispatch_decision(decision: &RoutingDecision) -> Option<WorkflowNode> {
    match decision.tool {
        QueryTool::CrmAgent => Some(WorkflowNode::CallCrm),
        QueryTool::SqlRouterAgent => Some(WorkflowNode::SqlRoute),
        QueryTool::ClarifyQuery => Some(WorkflowNode::Clarify),
        QueryTool::GeneralQuery => Some(WorkflowNode::GeneralResponse),
        QueryTool::VisualizationAgent => None,
    }
}

fn contains_failure_marker(text: &str, markers: &[String]) -> bool {
    let lowered = text.to_lowercase();
    markers.iter().any(|marker| lowered.contains(&marker.to_lowercase()))
}
