//! LLM-driven question answering over the database and the CRM.
//!
//! The crate owns everything between an incoming natural-language question
//! and a finished answer: routing the question to one of the tools, the
//! schema-grounded SQL generation path, the step-bounded CRM tool
//! conversation, chart rendering, and the state machine in [`workflow`]
//! that ties them together. Transport to the model providers lives in
//! [`llm`]; all prompt text lives in [`prompts`] so the rest of the crate
//! stays string-free.

pub mod chart;
pub mod crm_loop;
pub mod llm;
pub mod prompts;
pub mod router;
pub mod sqlgen;
pub mod workflow;

pub use chart::{ChartKind, ChartSpec, Visualization};
pub use crm_loop::{CrmConversation, CrmToolExecutor, Observation};
pub use llm::{ChatRole, ChatTurn, HttpLlmClient, LlmClient};
pub use workflow::{CrmBackend, RequestState, SqlBackend, Workflow, WorkflowNode};
