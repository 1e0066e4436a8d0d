// crates/noesis-types/src/lib.rs

//! Shared data contracts between the Noesis orchestration engine and its
//! clients.
//!
//! This crate provides the core domain model for:
//! - **Schema & Value**: structural description and runtime values for tool
//!   input/output (§4.A)
//! - **Tool descriptors**: the handler-free view of a registered tool
//! - **Workflow definitions and runs**: the declarative DAG format and its
//!   run-time state
//! - **Session steps**: the append-only progressive-state log
//!
//! These types are designed to work across native and WASM builds, with no
//! native-only dependencies allowed — everything here is `serde` data, no
//! I/O, no async, no handler closures.

mod error_kind;
mod event;
mod run;
mod schema;
mod session;
mod tool;
mod value;
mod workflow_def;

pub use error_kind::ErrorKind;
pub use event::{WorkflowEvent, WorkflowEventKind};
pub use run::{NodeState, NodeStatus, RunStatus, ToolResult, ToolResultStatus, WorkflowRun};
pub use schema::{Field, Schema, ValidationError};
pub use session::{SessionStep, StepKind};
pub use tool::ToolDescriptor;
pub use value::{canonical_string, upstream_failed_sentinel, Value, UPSTREAM_FAILED_MARKER};
pub use workflow_def::{Edge, Node, OnError, RetryPolicy, WorkflowDefinition};
