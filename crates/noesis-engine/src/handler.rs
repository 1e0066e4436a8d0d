// crates/noesis-engine/src/handler.rs
// The scoped context passed to every handler invocation (§4.D step 3):
// cancellation, deadline, the optional session handle, and a logger span.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::Span;

/// Per-call scoped context. Handlers receive this by value; it is cheap to
/// clone (an `Arc`-backed cancellation token plus a few `Copy` fields) so a
/// handler that fans out internally can hand copies to sub-tasks.
#[derive(Clone)]
pub struct HandlerContext {
    pub cancellation: CancellationToken,
    pub deadline: Instant,
    pub session_id: Option<String>,
    pub span: Span,
}

impl HandlerContext {
    pub fn new(deadline: Instant, cancellation: CancellationToken, session_id: Option<String>) -> Self {
        HandlerContext {
            cancellation,
            deadline,
            session_id,
            span: Span::current(),
        }
    }

    /// Milliseconds remaining until `deadline`, floored at zero. Handlers
    /// doing their own I/O with timeouts should use this rather than
    /// re-deriving a deadline of their own (§5 "handlers MUST check their
    /// cancellation signal at each I/O boundary").
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// A future that resolves once this call is cancelled — suitable for
    /// `tokio::select!` against a handler's own I/O future.
    pub fn cancelled(&self) -> tokio_util::sync::WaitForCancellationFuture<'_> {
        self.cancellation.cancelled()
    }

    pub fn child_token(&self) -> CancellationToken {
        self.cancellation.child_token()
    }
}

/// Convenience constructor used by tests and the dispatcher: a context with
/// a deadline far enough out that it never fires during the call.
pub fn detached_context(session_id: Option<String>) -> HandlerContext {
    HandlerContext::new(
        Instant::now() + Duration::from_secs(3600),
        CancellationToken::new(),
        session_id,
    )
}

pub type SharedCancellation = Arc<CancellationToken>;
