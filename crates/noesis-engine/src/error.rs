// crates/noesis-engine/src/error.rs
// Standardized error types for the Noesis engine

use noesis_types::ErrorKind;
use thiserror::Error;

/// Main internal error type for the engine. Distinct from [`ErrorKind`]:
/// `EngineError` is the Rust-side error any internal function can return;
/// `ErrorKind` is the small, stable, wire-visible vocabulary a `ToolResult`
/// or RPC error is classified into (§7 of the design notes). `EngineError::kind`
/// is the single place that mapping happens, so the taxonomy can't drift.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("validation failed")]
    Validation(Vec<noesis_types::ValidationError>),

    #[error("handler error: {0}")]
    Handler(String),

    #[error("operation timed out")]
    Timeout,

    #[error("operation cancelled")]
    Cancelled,

    #[error("reference error: {0}")]
    Reference(String),

    #[error("cyclic dependency involving node {0}")]
    CyclicDependency(String),

    #[error("session store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("invalid params: {0}")]
    InvalidParams(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("connection pool error: {0}")]
    Pool(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

/// Convenience type alias for Result using EngineError
pub type Result<T> = std::result::Result<T, EngineError>;

impl EngineError {
    /// Maps this internal error onto the stable wire taxonomy (§6/§7 error
    /// kinds). This is the one place the mapping is made, by design.
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::UnknownTool(_) => ErrorKind::UnknownTool,
            EngineError::Validation(_) => ErrorKind::ValidationError,
            EngineError::Handler(_) => ErrorKind::HandlerError,
            EngineError::Timeout => ErrorKind::Timeout,
            EngineError::Cancelled => ErrorKind::Cancelled,
            EngineError::Reference(_) => ErrorKind::ReferenceError,
            EngineError::CyclicDependency(_) => ErrorKind::CyclicDependency,
            EngineError::StoreUnavailable(_) => ErrorKind::StoreUnavailable,
            EngineError::InvalidParams(_) => ErrorKind::InvalidParams,
            EngineError::NotFound(_) => ErrorKind::NotFound,
            EngineError::Db(_)
            | EngineError::Pool(_)
            | EngineError::Io(_)
            | EngineError::Json(_)
            | EngineError::Config(_)
            | EngineError::Anyhow(_) => ErrorKind::HandlerError,
        }
    }

    /// Convert to user-facing string for MCP tool boundaries
    pub fn to_user_string(&self) -> String {
        self.to_string()
    }
}

impl From<String> for EngineError {
    fn from(s: String) -> Self {
        EngineError::Handler(s)
    }
}

impl From<tokio::task::JoinError> for EngineError {
    fn from(err: tokio::task::JoinError) -> Self {
        if err.is_cancelled() {
            EngineError::Cancelled
        } else {
            EngineError::Handler(format!("handler panicked: {err}"))
        }
    }
}

impl From<deadpool_sqlite::PoolError> for EngineError {
    fn from(err: deadpool_sqlite::PoolError) -> Self {
        EngineError::Pool(err.to_string())
    }
}

impl From<deadpool_sqlite::InteractError> for EngineError {
    fn from(err: deadpool_sqlite::InteractError) -> Self {
        EngineError::StoreUnavailable(err.to_string())
    }
}

impl From<EngineError> for String {
    fn from(err: EngineError) -> Self {
        err.to_string()
    }
}
