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

//! The evaluator: `Evaluate(expr, env) -> Value | Error`.
//!
//! Evaluation is synchronous top to bottom, matching the dispatcher's own
//! `FunctionExecutor` contract and the actor subsystem's
//! `ReceiveInvoker` contract so neither needs futures. The one
//! control-flow wrinkle is `return`: rather than unwinding via an
//! exception-like mechanism, a block's evaluation loop watches for an
//! explicit `Signal::Return` and stops at the first one it sees. The signal is
//! always unwrapped back to a plain `Value` by the time a function call
//! returns, so it never crosses a function boundary.

pub mod calls;
pub mod expressions;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::actor::router::RouterHandle;
use crate::actor::server::ReceiveInvoker;
use crate::ast::{Block, Expr};
use crate::dispatch::FunctionExecutor;
use crate::environment::Environment;
use crate::error::RelayError;
use crate::value::{FunctionValue, ServerStateHandle, StructDef, Value};

/// What a single evaluation step produced: either a plain value, or a
/// `return` that should unwind the enclosing block without running its
/// remaining expressions.
#[derive(Debug, Clone)]
pub enum Signal {
    Value(Value),
    Return(Value),
}

impl Signal {
    pub fn into_value(self) -> Value {
        match self {
            Signal::Value(v) | Signal::Return(v) => v,
        }
    }

    fn is_return(&self) -> bool {
        matches!(self, Signal::Return(_))
    }
}

/// The struct-definition table, shared the
/// same way the server registry is: by cheap `Arc<Mutex<_>>` clone rather
/// than by threading a `&mut` evaluator through every call.
#[derive(Clone, Default)]
pub struct StructRegistry(Arc<Mutex<HashMap<String, StructDef>>>);

impl StructRegistry {
    pub fn define(&self, def: StructDef) {
        self.0.lock().unwrap().insert(def.name.clone(), def);
    }

    pub fn get(&self, name: &str) -> Option<StructDef> {
        self.0.lock().unwrap().get(name).cloned()
    }
}

/// The evaluator. Cloning is cheap: every field is itself a handle around
/// shared state (an `Environment` frame, a struct table, a router front).
#[derive(Clone)]
pub struct Evaluator {
    pub global_env: Environment,
    pub structs: StructRegistry,
    pub router: RouterHandle,
}

impl Evaluator {
    pub fn new(router: RouterHandle) -> Self {
        let global_env = Environment::root();
        crate::builtins::install(&global_env, router.clone());
        Evaluator {
            global_env,
            structs: StructRegistry::default(),
            router,
        }
    }

    /// The public entry point: evaluates `expr` in `env` to a plain value,
    /// collapsing any `return` signal that escaped to this call site (which
    /// only happens if `expr` is a bare `return` evaluated outside of a
    /// block — a degenerate case, not a supported program shape).
    pub fn eval(&self, expr: &Expr, env: &Environment) -> Result<Value, RelayError> {
        self.eval_signal(expr, env).map(Signal::into_value)
    }

    /// Evaluates a block in a fresh child scope, stopping at the first
    /// `return` encountered among its expressions.
    pub fn eval_block(&self, block: &Block, env: &Environment) -> Result<Signal, RelayError> {
        let scope = env.child();
        let mut last = Signal::Value(Value::Nil);
        for expr in &block.expressions {
            last = self.eval_signal(expr, &scope)?;
            if last.is_return() {
                return Ok(last);
            }
        }
        Ok(last)
    }

    /// Evaluates `expr`, propagating `return`/block/if forms as a `Signal`
    /// so a `return` nested inside an `if` branch still unwinds the
    /// enclosing block. Every other expression form is collapsed to a
    /// plain value immediately (`expressions::eval_plain`).
    pub fn eval_signal(&self, expr: &Expr, env: &Environment) -> Result<Signal, RelayError> {
        match expr {
            Expr::Return(r) => {
                let value = match &r.value {
                    Some(inner) => self.eval(inner, env)?,
                    None => Value::Nil,
                };
                Ok(Signal::Return(value))
            }
            Expr::Block(block) => self.eval_block(block, env),
            Expr::If(if_expr) => expressions::eval_if(self, if_expr, env),
            other => Ok(Signal::Value(expressions::eval_plain(self, other, env)?)),
        }
    }
}

impl FunctionExecutor for Evaluator {
    fn call(&self, f: &Value, args: Vec<Value>) -> Result<Value, RelayError> {
        calls::call_value(self, f, args)
    }
}

impl ReceiveInvoker for Evaluator {
    fn invoke(&self, f: &Arc<FunctionValue>, state: ServerStateHandle, args: Vec<Value>) -> Result<Value, RelayError> {
        calls::invoke_receive(self, f, state, args)
    }
}
