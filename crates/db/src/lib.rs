pub mod connection;
pub mod executor;
pub mod fixtures;
pub mod introspect;

pub use connection::{connect, connect_with_settings, DbPool};
pub use executor::run_read_query;
pub use fixtures::apply_demo_dataset;
pub use introspect::capture_snapshot;
