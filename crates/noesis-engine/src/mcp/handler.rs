// crates/noesis-engine/src/mcp/handler.rs
// ServerHandler implementation: protocol lifecycle plus `tools/list` and
// `tools/call` built dynamically from whatever `ToolRegistry` currently
// holds, instead of the `#[tool_router]` macro's compile-time dispatch
// table (§4.C "tools register and deregister at runtime").

use std::time::Duration;

use chrono::Utc;
use noesis_types::{SessionStep, StepKind};
use rmcp::model::{
    CallToolRequestParams, CallToolResult, Content, ErrorData, Implementation, ListToolsResult,
    PaginatedRequestParams, ServerCapabilities, ServerInfo, Tool,
};
use rmcp::service::{RequestContext, RoleServer};
use rmcp::ServerHandler;
use serde_json::Value;

use crate::dispatcher::ToolCall;
use crate::error::EngineError;

use super::jsonschema::render_as_object;
use super::workflow_tools::{self, CancelArgs, RunArgs, StatusArgs};
use super::{is_reserved, NoesisServer, WORKFLOW_CANCEL_TOOL, WORKFLOW_RUN_TOOL, WORKFLOW_STATUS_TOOL};

fn json_result(value: Value) -> CallToolResult {
    CallToolResult {
        content: vec![Content::text(
            serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string()),
        )],
        structured_content: Some(value),
        is_error: Some(false),
        meta: None,
    }
}

fn error_result(message: impl Into<String>) -> CallToolResult {
    CallToolResult {
        content: vec![Content::text(message.into())],
        structured_content: None,
        is_error: Some(true),
        meta: None,
    }
}

impl ServerHandler for NoesisServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: Default::default(),
            capabilities: ServerCapabilities::builder().enable_tools().enable_tool_list_changed().build(),
            server_info: Implementation {
                name: "noesis".into(),
                title: Some("Noesis cognitive-tool orchestration engine".into()),
                version: env!("CARGO_PKG_VERSION").into(),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Noesis runs registered tools through a validating dispatcher and orchestrates \
                 them as DAG workflows. Call `tools/list` for registered tools plus the \
                 workflow_run/workflow_status/workflow_cancel meta-tools."
                    .into(),
            ),
        }
    }

    fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListToolsResult, ErrorData>> + Send + '_ {
        async move {
            let mut tools: Vec<Tool> = self
                .registry
                .list()
                .into_iter()
                .filter(|d| !is_reserved(&d.name))
                .map(|d| Tool::new(d.name.clone(), d.description.clone(), render_as_object(&d.input_schema)))
                .collect();
            tools.extend(workflow_tools::meta_tools());
            Ok(ListToolsResult { tools, next_cursor: None, meta: None })
        }
    }

    #[allow(clippy::manual_async_fn)]
    fn call_tool(
        &self,
        request: CallToolRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = Result<CallToolResult, ErrorData>> + Send + '_ {
        async move {
            match request.name.as_ref() {
                WORKFLOW_RUN_TOOL => self.handle_workflow_run(request.arguments.as_ref()).await,
                WORKFLOW_STATUS_TOOL => self.handle_workflow_status(request.arguments.as_ref()).await,
                WORKFLOW_CANCEL_TOOL => self.handle_workflow_cancel(request.arguments.as_ref()).await,
                name => self.handle_tool_call(name, request.arguments.as_ref()).await,
            }
        }
    }
}

impl NoesisServer {
    async fn handle_workflow_run(&self, args: Option<&serde_json::Map<String, Value>>) -> Result<CallToolResult, ErrorData> {
        let args: RunArgs = workflow_tools::parse_args(args)?;
        if args.r#async {
            match self.workflow.start(args.definition, args.input).await {
                Ok(run_id) => Ok(json_result(serde_json::json!({"runId": run_id, "status": "pending"}))),
                Err(err) => Ok(error_result(run_start_error_message(&err))),
            }
        } else {
            match self.workflow.run_to_completion(args.definition, args.input).await {
                Ok(run) => Ok(json_result(workflow_tools::run_status_value(&run))),
                Err(err) => Ok(error_result(run_start_error_message(&err))),
            }
        }
    }

    async fn handle_workflow_status(&self, args: Option<&serde_json::Map<String, Value>>) -> Result<CallToolResult, ErrorData> {
        let args: StatusArgs = workflow_tools::parse_args(args)?;
        match self.workflow.status(args.run_id).await {
            Ok(Some(run)) => Ok(json_result(workflow_tools::run_status_value(&run))),
            Ok(None) => Ok(error_result(format!("no such run: {}", args.run_id))),
            Err(err) => Ok(error_result(err.to_user_string())),
        }
    }

    async fn handle_workflow_cancel(&self, args: Option<&serde_json::Map<String, Value>>) -> Result<CallToolResult, ErrorData> {
        let args: CancelArgs = workflow_tools::parse_args(args)?;
        match self.workflow.cancel(args.run_id).await {
            Ok(accepted) => Ok(json_result(serde_json::json!({"accepted": accepted}))),
            Err(err) => Ok(error_result(err.to_user_string())),
        }
    }

    /// `tools/call {name, arguments, sessionID?, deadlineMillis?}` (§4.F),
    /// plus `revisesStep`/`branchId`/`branchFromStep` for the session-log
    /// fields `AppendStep` needs (§4.B, §8 Scenario 6) — these ride as
    /// reserved keys alongside the tool's own arguments, since the `rmcp`
    /// wire shape carries only one flat arguments map per call.
    async fn handle_tool_call(
        &self,
        name: &str,
        args: Option<&serde_json::Map<String, Value>>,
    ) -> Result<CallToolResult, ErrorData> {
        if is_reserved(name) || !self.registry.contains(name) {
            return Err(ErrorData::invalid_params(format!("unknown tool '{name}'"), None));
        }
        let mut fields = args.cloned().unwrap_or_default();
        let session_id = take_string(&mut fields, "sessionId");
        let deadline_millis = take_u64(&mut fields, "deadlineMillis");
        let revises_step = take_u64(&mut fields, "revisesStep");
        let branch_id = take_string(&mut fields, "branchId");
        let branch_from_step = take_u64(&mut fields, "branchFromStep");

        let arguments = Value::Object(fields);
        let mut call = ToolCall::new(name, arguments.clone());
        if let Some(sid) = &session_id {
            call = call.with_session(sid.clone());
        }
        call = call.with_deadline(deadline_millis.map(Duration::from_millis).unwrap_or(self.default_call_timeout));

        let result = self.dispatcher.dispatch(call).await;

        // Append to the session log in completion order (§5), after the
        // call has actually finished — never before it's known to succeed
        // or fail.
        if let Some(session_id) = session_id {
            let step = SessionStep {
                session_id,
                step_number: 0,
                kind: if revises_step.is_some() {
                    StepKind::Revision
                } else if branch_from_step.is_some() {
                    StepKind::Branch
                } else {
                    StepKind::AnalyzerStep
                },
                branch_id,
                revises_step,
                branch_from_step,
                payload: serde_json::json!({"tool": name, "arguments": arguments, "result": &result}),
                created_at: Utc::now(),
                vector_embedding: None,
            };
            if let Err(err) = self.store.append_step(step).await {
                tracing::warn!(tool = name, error = %err, "failed to append session step");
            }
        }

        Ok(json_result(serde_json::to_value(&result).unwrap_or(Value::Null)))
    }
}

fn take_string(fields: &mut serde_json::Map<String, Value>, key: &str) -> Option<String> {
    fields.remove(key).and_then(|v| v.as_str().map(String::from))
}

fn take_u64(fields: &mut serde_json::Map<String, Value>, key: &str) -> Option<u64> {
    fields.remove(key).and_then(|v| v.as_u64())
}

fn run_start_error_message(err: &EngineError) -> String {
    match err {
        EngineError::CyclicDependency(node) => format!("cyclic dependency involving node '{node}'"),
        EngineError::UnknownTool(tool) => format!("workflow references unknown tool '{tool}'"),
        other => other.to_user_string(),
    }
}
