// crates/noesis-engine/src/lib.rs
// Noesis - a cognitive-tool orchestration engine: tool registry, dispatcher,
// session store, and DAG workflow engine, exposed over MCP.

#![allow(clippy::collapsible_if)]
#![allow(clippy::type_complexity)]
#![allow(clippy::too_many_arguments)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

pub mod analyzers;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod mcp;
pub mod registry;
pub mod schema;
pub mod store;
pub mod tools;
pub mod workflow;

pub use error::{EngineError, Result};
