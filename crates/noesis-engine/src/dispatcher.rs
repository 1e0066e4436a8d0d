// crates/noesis-engine/src/dispatcher.rs
// The single funnel through which every tool invocation passes (§4.D).
// Validates arguments, invokes the handler under a scoped context, classifies
// the outcome, and validates the output. Performs exactly one attempt —
// retries are the workflow engine's job (§4.D "Retry policy is NOT applied
// here").

use std::time::{Duration, Instant};

use noesis_types::{ErrorKind, ToolResult, ToolResultStatus, Value};
use tokio_util::sync::CancellationToken;

use crate::registry::ToolRegistry;
use crate::schema::{coerce, validate};

/// One tool invocation, as the caller submitted it (§3 `ToolCall`).
pub struct ToolCall {
    pub tool: String,
    pub arguments: Value,
    pub deadline: Option<Duration>,
    pub session_id: Option<String>,
    pub cancellation: CancellationToken,
}

impl ToolCall {
    pub fn new(tool: impl Into<String>, arguments: Value) -> Self {
        ToolCall {
            tool: tool.into(),
            arguments,
            deadline: None,
            session_id: None,
            cancellation: CancellationToken::new(),
        }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }
}

pub struct Dispatcher {
    registry: ToolRegistry,
    /// Default per-tool timeout used when neither the caller nor a workflow
    /// node supplies one (§4.D step 3 `min(callerDeadline, toolDefaultTimeout,
    /// nodeTimeout)`).
    default_timeout: Duration,
}

impl Dispatcher {
    pub fn new(registry: ToolRegistry) -> Self {
        Dispatcher {
            registry,
            default_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Runs the six-step protocol in §4.D for one call. Never panics the
    /// caller: a handler panic is caught and classified as `handlerError`
    /// (§7 "the process must never crash because a handler misbehaved").
    pub async fn dispatch(&self, call: ToolCall) -> ToolResult {
        let start = Instant::now();

        // Step 1: look up the tool.
        let Some(spec) = self.registry.get(&call.tool) else {
            return failed(
                ToolResultStatus::HandlerError,
                ErrorKind::UnknownTool,
                format!("unknown tool '{}'", call.tool),
                Vec::new(),
                start,
            );
        };

        // Step 2: validate (with best-effort coercion first).
        let coerced = coerce(&spec.input_schema, &call.arguments);
        let (normalized, errors) = validate(&spec.input_schema, &coerced);
        if !errors.is_empty() {
            return failed(
                ToolResultStatus::ValidationError,
                ErrorKind::ValidationError,
                "argument validation failed",
                errors,
                start,
            );
        }

        // Step 3: scoped context with per-call deadline.
        let timeout = call.deadline.unwrap_or(self.default_timeout);
        let deadline = Instant::now() + timeout;
        let ctx = crate::handler::HandlerContext::new(
            deadline,
            call.cancellation.clone(),
            call.session_id.clone(),
        );

        // Step 4/5: invoke the handler, racing it against the deadline and
        // cancellation, catching panics via `tokio::spawn`'s `JoinHandle`.
        let handler = spec.handler.clone();
        let input = normalized;
        let join = tokio::spawn(async move { handler(ctx, input).await });

        let outcome = tokio::select! {
            biased;
            _ = call.cancellation.cancelled() => Outcome::Cancelled,
            _ = tokio::time::sleep(timeout) => Outcome::TimedOut,
            joined = join => Outcome::Joined(joined),
        };

        match outcome {
            Outcome::Cancelled => failed(
                ToolResultStatus::Cancelled,
                ErrorKind::Cancelled,
                "call cancelled",
                Vec::new(),
                start,
            ),
            Outcome::TimedOut => failed(
                ToolResultStatus::Timeout,
                ErrorKind::Timeout,
                format!("call exceeded deadline of {}ms", timeout.as_millis()),
                Vec::new(),
                start,
            ),
            Outcome::Joined(Err(join_err)) => {
                if join_err.is_cancelled() {
                    failed(
                        ToolResultStatus::Cancelled,
                        ErrorKind::Cancelled,
                        "call cancelled",
                        Vec::new(),
                        start,
                    )
                } else {
                    failed(
                        ToolResultStatus::HandlerError,
                        ErrorKind::HandlerError,
                        format!("handler panicked: {join_err}"),
                        Vec::new(),
                        start,
                    )
                }
            }
            Outcome::Joined(Ok(Err(handler_failure))) => failed(
                ToolResultStatus::HandlerError,
                handler_failure.kind.unwrap_or(ErrorKind::HandlerError),
                handler_failure.message,
                Vec::new(),
                start,
            ),
            Outcome::Joined(Ok(Ok(output))) => {
                // Step 5 tail: validate the output schema before returning.
                let (normalized_output, out_errors) = validate(&spec.output_schema, &output);
                if out_errors.is_empty() {
                    ToolResult::ok(normalized_output, start.elapsed().as_millis() as u64)
                } else {
                    failed(
                        ToolResultStatus::HandlerError,
                        ErrorKind::HandlerError,
                        "handler output failed schema validation",
                        out_errors,
                        start,
                    )
                }
            }
        }
    }
}

enum Outcome {
    Cancelled,
    TimedOut,
    Joined(
        std::result::Result<
            std::result::Result<Value, crate::registry::HandlerFailure>,
            tokio::task::JoinError,
        >,
    ),
}

fn failed(
    status: ToolResultStatus,
    kind: ErrorKind,
    message: impl Into<String>,
    details: Vec<noesis_types::ValidationError>,
    start: Instant,
) -> ToolResult {
    ToolResult::failed(
        status,
        kind,
        message,
        details,
        start.elapsed().as_millis() as u64,
    )
}
