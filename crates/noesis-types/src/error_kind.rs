//! The stable error-kind vocabulary (§6, §7). These strings are part of the
//! external contract — do not rename variants without a wire migration.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    UnknownTool,
    ValidationError,
    HandlerError,
    Timeout,
    Cancelled,
    ReferenceError,
    CyclicDependency,
    StoreUnavailable,
    InvalidParams,
    NotFound,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::UnknownTool => "unknownTool",
            ErrorKind::ValidationError => "validationError",
            ErrorKind::HandlerError => "handlerError",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::ReferenceError => "referenceError",
            ErrorKind::CyclicDependency => "cyclicDependency",
            ErrorKind::StoreUnavailable => "storeUnavailable",
            ErrorKind::InvalidParams => "invalidParams",
            ErrorKind::NotFound => "notFound",
        }
    }

    /// §4.E.4 default `retryableKinds`: `[timeout, handlerError, storeUnavailable]`.
    /// `validationError`, `referenceError`, `cancelled` and `unknownTool` are
    /// never retryable regardless of policy (§4.E.4).
    pub fn is_ever_retryable(&self) -> bool {
        matches!(
            self,
            ErrorKind::Timeout | ErrorKind::HandlerError | ErrorKind::StoreUnavailable
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
