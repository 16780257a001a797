//! The question endpoint.
//!
//! `POST /query` takes a natural-language question plus optional chat
//! history and returns the workflow's answer. Workflow failures are still
//! HTTP 200 with `success: false`; only malformed requests get a 4xx.

use std::sync::Arc;

use askdb_agent::chart::Visualization;
use askdb_agent::llm::ChatTurn;
use askdb_agent::workflow::Workflow;
use askdb_core::tabulate::ResultRow;
use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

#[derive(Clone)]
pub struct ApiState {
    pub workflow: Arc<Workflow>,
}

fn enabled() -> bool {
    true
}

#[derive(Clone, Debug, Deserialize)]
pub struct QueryRequest {
    pub question: String,
    #[serde(default)]
    pub history: Vec<ChatTurn>,
    /// Echo the generated SQL back in the response.
    #[serde(default = "enabled")]
    pub include_sql: bool,
    /// Echo the raw result rows back in the response.
    #[serde(default = "enabled")]
    pub include_rows: bool,
    /// Include the rendered chart, when one was produced.
    #[serde(default = "enabled")]
    pub include_chart: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct QueryResponse {
    pub response: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql_query: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql_results: Option<Vec<ResultRow>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chart: Option<Visualization>,
}

pub fn router(state: ApiState) -> Router {
    Router::new().route("/query", post(query)).with_state(state)
}

pub async fn query(
    State(state): State<ApiState>,
    Json(request): Json<QueryRequest>,
) -> (StatusCode, Json<QueryResponse>) {
    if request.question.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(QueryResponse {
                response: String::new(),
                success: false,
                error: Some("question must not be empty".to_string()),
                sql_query: None,
                sql_results: None,
                chart: None,
            }),
        );
    }

    let correlation_id = Uuid::new_v4();
    info!(
        event_name = "api.query.received",
        correlation_id = %correlation_id,
        history_len = request.history.len(),
        "query received"
    );

    let result = state.workflow.run(&request.question, &request.history).await;
    let success = result.succeeded();

    info!(
        event_name = "api.query.answered",
        correlation_id = %correlation_id,
        success,
        row_count = result.rows.len(),
        chart = result.visualization.is_some(),
        "query answered"
    );

    let payload = QueryResponse {
        response: result.response.unwrap_or_default(),
        success,
        error: if result.error.is_empty() { None } else { Some(result.error) },
        sql_query: if request.include_sql { result.sql } else { None },
        sql_results: if request.include_rows && !result.rows.is_empty() {
            Some(result.rows)
        } else {
            None
        },
        chart: if request.include_chart { result.visualization } else { None },
    };

    (StatusCode::OK, Json(payload))
}
