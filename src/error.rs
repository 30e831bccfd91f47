//! Error types for the property engine and heap

use crate::prelude::*;
use crate::value::Value;
use thiserror::Error;

/// Error class of a [`JsError`], as seen by script code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Type,
    Range,
    Alloc,
    Internal,
    Thrown,
    DoubleFault,
}

impl ErrorKind {
    /// Constructor name used when the error is materialized as an object.
    pub fn name(self) -> &'static str {
        match self {
            ErrorKind::Type => "TypeError",
            ErrorKind::Range => "RangeError",
            ErrorKind::Alloc | ErrorKind::Thrown => "Error",
            ErrorKind::Internal => "InternalError",
            ErrorKind::DoubleFault => "DoubleError",
        }
    }
}

/// Main error type for heap and property operations
#[derive(Debug, Error)]
pub enum JsError {
    #[error("TypeError: {message}")]
    TypeError { message: String },

    #[error("RangeError: {message}")]
    RangeError { message: String },

    /// Out of memory after the GC retry loop gave up. Script sees a plain Error.
    #[error("Error: {message}")]
    AllocError { message: String },

    #[error("InternalError: {0}")]
    Internal(String),

    /// A script value thrown by user code (trap, accessor, finalizer).
    #[error("Thrown")]
    Thrown(Value),

    /// Secondary failure while an error was being created.
    #[error("DoubleError: error in error handling")]
    DoubleFault,
}

impl JsError {
    pub fn type_error(message: impl Into<String>) -> Self {
        JsError::TypeError {
            message: message.into(),
        }
    }

    pub fn range_error(message: impl Into<String>) -> Self {
        JsError::RangeError {
            message: message.into(),
        }
    }

    pub fn alloc_error(message: impl Into<String>) -> Self {
        JsError::AllocError {
            message: message.into(),
        }
    }

    /// Create an internal error for states that should never happen.
    /// Release builds degrade to this instead of panicking.
    pub fn internal_error(message: impl Into<String>) -> Self {
        JsError::Internal(message.into())
    }

    pub fn thrown(value: Value) -> Self {
        JsError::Thrown(value)
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            JsError::TypeError { .. } => ErrorKind::Type,
            JsError::RangeError { .. } => ErrorKind::Range,
            JsError::AllocError { .. } => ErrorKind::Alloc,
            JsError::Internal(_) => ErrorKind::Internal,
            JsError::Thrown(_) => ErrorKind::Thrown,
            JsError::DoubleFault => ErrorKind::DoubleFault,
        }
    }

    /// Message text without the class prefix.
    pub fn message(&self) -> String {
        match self {
            JsError::TypeError { message }
            | JsError::RangeError { message }
            | JsError::AllocError { message } => message.clone(),
            JsError::Internal(message) => message.clone(),
            JsError::Thrown(value) => value.to_display_string(),
            JsError::DoubleFault => String::from("error in error handling"),
        }
    }
}

/// Message used when a non-configurable property refuses deletion.
pub(crate) const MSG_NOT_CONFIGURABLE: &str = "property not configurable";
/// Message used when a define fails its validation.
pub(crate) const MSG_DEFINE_REJECTED: &str = "not configurable";
pub(crate) const MSG_NOT_EXTENSIBLE: &str = "not extensible";
/// Message used when a write hits a read-only property.
pub(crate) const MSG_NOT_WRITABLE: &str = "not writable";
pub(crate) const MSG_SETTER_UNDEFINED: &str = "setter undefined";
pub(crate) const MSG_INVALID_ARRAY_LENGTH: &str = "invalid array length";
pub(crate) const MSG_INVALID_TRAP_RESULT: &str = "invalid trap result";
pub(crate) const MSG_PROXY_REJECTED: &str = "proxy rejected";
pub(crate) const MSG_PROXY_REVOKED: &str = "proxy revoked";
pub(crate) const MSG_ALLOC_FAILED: &str = "alloc failed";
