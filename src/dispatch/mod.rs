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

//! The method dispatcher.
//!
//! `CallMethod(target, methodName, args) -> Value | Error`, keyed on the
//! target's type tag. Each type owns a handler with a name -> implementation
//! table, installed once at startup, with a fixed inventory of method
//! names per type.

pub mod array;
pub mod object;
pub mod server_state;
pub mod string;
pub mod struct_instance;

use crate::error::RelayError;
use crate::value::Value;

/// Abstraction the dispatcher calls through for higher-order array methods
/// (`map`/`filter`/`reduce`) so it needs no evaluator pointer.
pub trait FunctionExecutor {
    fn call(&self, f: &Value, args: Vec<Value>) -> Result<Value, RelayError>;
}

/// Dispatches a method call by the target's runtime type tag.
pub fn call_method(
    target: &Value,
    method: &str,
    args: Vec<Value>,
    exec: &dyn FunctionExecutor,
) -> Result<Value, RelayError> {
    match target {
        Value::Array(cell) => array::dispatch(cell, method, args, exec),
        Value::Object(fields) => object::dispatch(fields, method, args),
        Value::Struct(instance) => struct_instance::dispatch(instance, method, args),
        Value::String(s) => string::dispatch(s, method, args),
        Value::ServerState(handle) => server_state::dispatch(handle, method, args),
        other => Err(RelayError::NoSuchMethod {
            target: other.type_name(),
            method: method.to_string(),
        }),
    }
}

/// Shared arity-mismatch-as-arity-probe helper: tries invoking `f` with
/// `primary`, and on an arity mismatch falls back to `secondary`. Used by
/// `map`/`filter`/`reduce` to try a callback with `(item)` first and, on
/// arity error, with `(item, index)`.
pub(crate) fn call_with_fallback(
    exec: &dyn FunctionExecutor,
    f: &Value,
    primary: Vec<Value>,
    secondary: Vec<Value>,
) -> Result<Value, RelayError> {
    match exec.call(f, primary) {
        Err(RelayError::ArityMismatch { .. }) => exec.call(f, secondary),
        other => other,
    }
}
