//! CRM integration: the REST client, the tool catalog shown to the model,
//! and the executor that runs tool calls during a CRM conversation.

pub mod args;
pub mod catalog;
pub mod client;
pub mod tools;

pub use client::{CrmClient, CrmError};
pub use tools::CrmToolRunner;
