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

//! Function invocation and receive-method invocation — the two places a
//! `Block` gets a fresh call frame and runs to a `Value`.

use std::sync::Arc;

use crate::environment::Environment;
use crate::error::RelayError;
use crate::value::{FunctionValue, ServerStateHandle, Value};

use super::Evaluator;

/// `CallMethod`'s `FunctionExecutor::call` and a bare `FuncCall` accessor
/// both land here: dispatch on native vs. user-defined, then run it.
pub fn call_value(evaluator: &Evaluator, f: &Value, args: Vec<Value>) -> Result<Value, RelayError> {
    let Value::Function(func) = f else {
        return Err(RelayError::NotCallable(f.type_name()));
    };

    if func.is_native() {
        call_native(func, args)
    } else {
        call_user(evaluator, func, args)
    }
}

fn call_native(func: &Arc<FunctionValue>, args: Vec<Value>) -> Result<Value, RelayError> {
    let native = func.native.as_ref().expect("call_native only called on native functions");
    native(args)
}

/// Binds `args` into a fresh frame parented on the closure's captured
/// environment.
fn call_user(evaluator: &Evaluator, func: &Arc<FunctionValue>, args: Vec<Value>) -> Result<Value, RelayError> {
    let body = func.body.as_ref().expect("non-native functions always carry a body");
    let parent = func.captured_env.clone().unwrap_or_else(|| evaluator.global_env.clone());
    let frame = parent.child();

    bind_params(evaluator, &frame, func, args)?;

    evaluator.eval_block(body, &frame).map(super::Signal::into_value)
}

/// Binds positional arguments to parameter names, filling any trailing
/// parameters that carry a default when the caller supplied fewer
/// arguments than the function declares.
/// Too few arguments with no default to cover the gap, or too many
/// arguments outright, is an arity error.
fn bind_params(evaluator: &Evaluator, frame: &Environment, func: &Arc<FunctionValue>, args: Vec<Value>) -> Result<(), RelayError> {
    let provided = args.len();
    if provided > func.params.len() {
        return Err(arity_mismatch(func, provided));
    }

    let mut args = args.into_iter();
    for param in &func.params {
        let value = match args.next() {
            Some(v) => v,
            None => match &param.default {
                Some(default_expr) => evaluator.eval(default_expr, frame)?,
                None => return Err(arity_mismatch(func, provided)),
            },
        };
        frame.define(param.name.clone(), value);
    }
    Ok(())
}

fn arity_mismatch(func: &Arc<FunctionValue>, got: usize) -> RelayError {
    RelayError::ArityMismatch {
        name: func.name.clone().unwrap_or_else(|| "<anonymous>".to_string()),
        expected: func.params.len(),
        got,
    }
}

/// Invokes a `receive` body with `state` bound to the live state handle.
/// The frame's parent is the server's declared environment, exactly like a
/// user function call, plus the one extra binding a plain function call
/// never gets.
pub fn invoke_receive(
    evaluator: &Evaluator,
    func: &Arc<FunctionValue>,
    state: ServerStateHandle,
    args: Vec<Value>,
) -> Result<Value, RelayError> {
    let body = func.body.as_ref().expect("receive methods always carry a body");
    let parent = func.captured_env.clone().unwrap_or_else(|| evaluator.global_env.clone());
    let frame = parent.child();
    frame.define("state", Value::ServerState(state));

    bind_params(evaluator, &frame, func, args)?;

    evaluator.eval_block(body, &frame).map(super::Signal::into_value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::router::{Router, ServerRegistry};
    use crate::ast::{Block, Expr, Literal, Param};

    /// These tests call user functions directly and never touch a server
    /// or the router's dispatch loop, so a bare handle (no spawned recv
    /// loop) is enough — and keeps these plain `#[test]`s runnable outside
    /// a tokio runtime, unlike `Router::start`'s `tokio::spawn`.
    fn test_evaluator() -> Evaluator {
        let router = Router::new(ServerRegistry::new()).handle();
        Evaluator::new(router)
    }

    fn number_literal(n: f64) -> Expr {
        Expr::Literal(Literal::Number(n))
    }

    #[test]
    fn missing_default_argument_is_arity_error() {
        let evaluator = test_evaluator();
        let func = Arc::new(FunctionValue {
            name: Some("needs_two".to_string()),
            params: vec![
                Param { name: "a".to_string(), default: None },
                Param { name: "b".to_string(), default: None },
            ],
            body: Some(Block::new(vec![Expr::Identifier("a".to_string())])),
            native: None,
            captured_env: Some(evaluator.global_env.clone()),
        });

        let err = call_user(&evaluator, &func, vec![Value::Number(1.0)]).unwrap_err();
        assert!(matches!(err, RelayError::ArityMismatch { .. }));
    }

    #[test]
    fn default_parameter_fills_missing_trailing_argument() {
        let evaluator = test_evaluator();
        let func = Arc::new(FunctionValue {
            name: Some("with_default".to_string()),
            params: vec![Param {
                name: "a".to_string(),
                default: Some(number_literal(9.0)),
            }],
            body: Some(Block::new(vec![Expr::Identifier("a".to_string())])),
            native: None,
            captured_env: Some(evaluator.global_env.clone()),
        });

        let v = call_user(&evaluator, &func, vec![]).unwrap();
        assert_eq!(v.as_number(), Some(9.0));
    }
}
