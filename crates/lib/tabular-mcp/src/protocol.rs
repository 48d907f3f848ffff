//! Request and response envelopes shared by every transport.

use std::{error::Error, fmt};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tabular_core::control::ControlError;
use tabular_core::reader::ReadError;
use tabular_core::source::SourceError;

/// Tool arguments keyed by parameter name.
pub type ToolArguments = Map<String, Value>;

/// Failure classes reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    UnknownTool,
    InvalidArguments,
    ExecutionError,
    InternalError,
    NotFound,
    AccessDenied,
    TransientError,
    ParseError,
}

impl ErrorKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UnknownTool => "UnknownTool",
            Self::InvalidArguments => "InvalidArguments",
            Self::ExecutionError => "ExecutionError",
            Self::InternalError => "InternalError",
            Self::NotFound => "NotFound",
            Self::AccessDenied => "AccessDenied",
            Self::TransientError => "TransientError",
            Self::ParseError => "ParseError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single tool invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolRequest {
    pub tool_name: String,
    #[serde(default)]
    pub arguments: ToolArguments,
}

impl ToolRequest {
    #[must_use]
    pub fn new(tool_name: impl Into<String>, arguments: ToolArguments) -> Self {
        Self {
            tool_name: tool_name.into(),
            arguments,
        }
    }
}

/// Outcome of a tool invocation, serialized as the protocol response body.
///
/// `{"status":"ok","result":..}` or
/// `{"status":"error","error_kind":..,"message":..}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum ToolResult {
    #[serde(rename = "ok")]
    Success { result: Value },
    #[serde(rename = "error")]
    Failure { error_kind: ErrorKind, message: String },
}

impl ToolResult {
    #[must_use]
    pub const fn success(result: Value) -> Self {
        Self::Success { result }
    }

    #[must_use]
    pub fn failure(error_kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::Failure {
            error_kind,
            message: message.into(),
        }
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    #[must_use]
    pub const fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { error_kind, .. } => Some(*error_kind),
        }
    }
}

/// Error returned by a tool handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ToolError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn invalid_arguments(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArguments, message)
    }

    #[must_use]
    pub fn execution(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ExecutionError, message)
    }
}

impl fmt::Display for ToolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl Error for ToolError {}

impl From<SourceError> for ToolError {
    fn from(err: SourceError) -> Self {
        let kind = match &err {
            SourceError::NotFound(_) => ErrorKind::NotFound,
            SourceError::AccessDenied(_) => ErrorKind::AccessDenied,
            SourceError::Transient(_) => ErrorKind::TransientError,
            SourceError::Invalid(_) => ErrorKind::InvalidArguments,
            SourceError::TooLarge { .. }
            | SourceError::Unavailable(_)
            | SourceError::Backend(_) => ErrorKind::ExecutionError,
        };
        Self::new(kind, err.to_string())
    }
}

impl From<ReadError> for ToolError {
    fn from(err: ReadError) -> Self {
        let kind = if err.is_malformed_content() {
            ErrorKind::ParseError
        } else {
            ErrorKind::ExecutionError
        };
        Self::new(kind, err.to_string())
    }
}

impl From<ControlError> for ToolError {
    fn from(err: ControlError) -> Self {
        match err {
            ControlError::Source(err) => err.into(),
            ControlError::Read(err) => err.into(),
            ControlError::Invalid(message) => Self::invalid_arguments(message),
        }
    }
}

impl From<serde_json::Error> for ToolError {
    fn from(err: serde_json::Error) -> Self {
        Self::execution(format!("failed to encode result: {err}"))
    }
}
