pub mod config;
pub mod errors;
pub mod routing;
pub mod safety;
pub mod schema;
pub mod tabulate;

pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat, LlmProvider};
pub use errors::{format_user_error, WorkflowError};
pub use routing::{QueryTool, RoutingDecision, SqlRoutingHints, ToolDescriptor};
pub use schema::annotations::{SchemaMap, SchemaMapEntry, SchemaMapError};
pub use schema::{ColumnDescriptor, KeyRole, SchemaSnapshot};
pub use tabulate::{rows_to_markdown, ResultRow};
