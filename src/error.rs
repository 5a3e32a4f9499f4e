/*
 * ==========================================================================
 * RELAY - runtime core
 * ==========================================================================
 *
 * Author:   Sam Wilcox
 * Github:   https://github.com/samwilcox/pawx
 *
 * License: dual MIT / Apache-2.0, see LICENSE files.
 * ==========================================================================
 */

//! The error taxonomy.
//!
//! Every fallible runtime operation returns `Result<_, RelayError>`. The
//! variants below mirror the taxonomy buckets verbatim (Binding, Type,
//! Runtime, Actor, Transport) so that a caller can match on the bucket
//! without parsing the message string.

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum RelayError {
    // ---- Binding ---------------------------------------------------------
    #[error("undefined variable '{0}'")]
    UndefinedVariable(String),

    #[error("undefined function '{0}'")]
    UndefinedFunction(String),

    #[error("function '{name}' expects {expected} argument(s), got {got}")]
    ArityMismatch {
        name: String,
        expected: usize,
        got: usize,
    },

    #[error("cannot assign to undefined binding '{0}'")]
    UndefinedAssignment(String),

    // ---- Type --------------------------------------------------------------
    #[error("invalid operand(s) for unary '{op}': {operand}")]
    UnaryTypeMismatch { op: &'static str, operand: &'static str },

    #[error("invalid operand(s) for binary '{op}': {left} {op} {right}")]
    BinaryTypeMismatch {
        op: &'static str,
        left: &'static str,
        right: &'static str,
    },

    #[error("'{method}' is not a method on {target}")]
    NoSuchMethod { target: &'static str, method: String },

    #[error("value of type {0} is not callable")]
    NotCallable(&'static str),

    #[error("field access requires an object or struct, got {0}")]
    NotFieldAccessible(&'static str),

    #[error("array index must be a number, got {0}")]
    NonNumberIndex(&'static str),

    // ---- Runtime -------------------------------------------------------
    #[error("division by zero")]
    DivisionByZero,

    #[error("array index {index} out of bounds (length {length})")]
    IndexOutOfBounds { index: f64, length: usize },

    #[error("field '{field}' not found on struct {struct_name}")]
    StructFieldNotFound { struct_name: String, field: String },

    #[error("missing required field '{field}' for struct {struct_name}")]
    MissingStructField { struct_name: String, field: String },

    #[error("unknown field '{field}' for struct {struct_name}")]
    UnknownStructField { struct_name: String, field: String },

    #[error("undefined struct type '{0}'")]
    UndefinedStruct(String),

    #[error("reduce of empty array without initial value")]
    ReduceEmptyArray,

    // ---- Actor -----------------------------------------------------------
    #[error("server '{0}' is not running")]
    ServerNotRunning(String),

    #[error("server '{0}' not found")]
    ServerNotFound(String),

    #[error("channel full")]
    MailboxFull,

    #[error("timed out waiting for reply")]
    ReplyTimeout,

    // ---- Transport ---------------------------------------------------
    #[error("parse error: {0}")]
    TransportParseError(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("method not found: {0}")]
    MethodNotFound(String),

    #[error("invalid params: {0}")]
    InvalidParams(String),

    #[error("peer '{0}' not found or not connected")]
    PeerUnavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl RelayError {
    pub fn bucket(&self) -> &'static str {
        use RelayError::*;
        match self {
            UndefinedVariable(_) | UndefinedFunction(_) | ArityMismatch { .. } | UndefinedAssignment(_) => {
                "binding"
            }
            UnaryTypeMismatch { .. }
            | BinaryTypeMismatch { .. }
            | NoSuchMethod { .. }
            | NotCallable(_)
            | NotFieldAccessible(_)
            | NonNumberIndex(_) => "type",
            DivisionByZero
            | IndexOutOfBounds { .. }
            | StructFieldNotFound { .. }
            | MissingStructField { .. }
            | UnknownStructField { .. }
            | UndefinedStruct(_)
            | ReduceEmptyArray => "runtime",
            ServerNotRunning(_) | ServerNotFound(_) | MailboxFull | ReplyTimeout => "actor",
            TransportParseError(_)
            | InvalidRequest(_)
            | MethodNotFound(_)
            | InvalidParams(_)
            | PeerUnavailable(_)
            | Internal(_) => "transport",
        }
    }
}
