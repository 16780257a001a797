use thiserror::Error;

/// Failure taxonomy for a single question's trip through the workflow.
///
/// Every variant carries operator-facing detail; `user_message` renders the
/// single apologetic template shown to the person who asked the question.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("query routing failed: {0}")]
    Routing(String),
    #[error("schema selection failed: {0}")]
    Schema(String),
    #[error("sql generation failed: {0}")]
    Generation(String),
    #[error("forbidden sql verb `{0}` detected")]
    SafetyRejection(String),
    #[error("sql execution failed: {0}")]
    Execution(String),
    #[error("remote call failed: {0}")]
    RemoteCall(String),
    #[error("response formatting failed: {0}")]
    Formatting(String),
}

impl WorkflowError {
    pub fn user_message(&self) -> String {
        format_user_error(&self.to_string())
    }
}

/// Renders the standard user-facing failure template around an error detail.
pub fn format_user_error(detail: &str) -> String {
    format!(
        "I encountered an issue while trying to answer your question. Details: {detail}\n\
         Please try rephrasing your question or contact support if the problem persists."
    )
}
