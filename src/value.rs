/*
 * ==========================================================================
 * RELAY - runtime core
 * ==========================================================================
 *
 * Author:   Sam Wilcox
 * Email:    sam@pawx-lang.com
 * Website:  https://www.pawx-lang.com
 * Github:   https://github.com/samwilcox/pawx
 *
 * License:
 * This file is part of the Relay language runtime.
 *
 * Relay is dual-licensed under the terms of:
 *   - The MIT license
 *   - The Apache License, Version 2.0
 *
 * You may choose either license to govern your use of this software.
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under these licenses is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *
 * ==========================================================================
 */

//! The runtime value representation.
//!
//! `Value` is a tagged sum. Every expression the evaluator touches ultimately
//! produces one of these. Unlike the host language's own value type, `Value`
//! must be `Send + Sync`: it crosses actor mailbox boundaries and is read by
//! the HTTP gateway from a different tokio task than the one that produced
//! it. Arrays and server state are the only variants that mutate in place,
//! so they alone carry interior mutability (`Arc<Mutex<_>>`); everything
//! else is immutable once constructed and shares structure through a bare
//! `Arc`.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use crate::ast::{Block, Param};
use crate::environment::Environment;
use crate::error::RelayError;

/// A native (built-in) function thunk. Receives fully evaluated arguments.
pub type NativeFn = Arc<dyn Fn(Vec<Value>) -> Result<Value, RelayError> + Send + Sync>;

/// A user-defined or built-in function value.
#[derive(Clone)]
pub struct FunctionValue {
    pub name: Option<String>,
    pub params: Vec<Param>,
    pub body: Option<Block>,
    pub native: Option<NativeFn>,
    /// Scope captured at the point of definition; `None` for free-standing
    /// built-ins that do not close over Relay source.
    pub captured_env: Option<Environment>,
}

impl FunctionValue {
    pub fn is_native(&self) -> bool {
        self.native.is_some()
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

impl fmt::Debug for FunctionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "FunctionValue {{ name: {:?}, arity: {}, native: {} }}",
            self.name,
            self.params.len(),
            self.native.is_some()
        )
    }
}

/// A struct *definition*: an ordered set of (field name, declared type).
#[derive(Debug, Clone)]
pub struct StructDef {
    pub name: String,
    pub fields: Vec<(String, String)>,
}

/// A struct *instance*: the name of the defining struct plus a field map.
///
/// Instances are immutable after construction, so the field map is shared
/// via a bare `Arc` rather than a `Mutex`.
#[derive(Debug, Clone)]
pub struct StructInstance {
    pub name: String,
    pub fields: Arc<HashMap<String, Value>>,
}

/// A first-class handle to a running server actor.
///
/// Equality is by identity: two handles are equal only if they
/// name the same running actor, tracked here via `id`.
#[derive(Clone)]
pub struct ServerHandle {
    pub id: u64,
    pub name: String,
    pub mailbox: crate::actor::server::MailboxSender,
}

impl fmt::Debug for ServerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ServerHandle({}#{})", self.name, self.id)
    }
}

impl PartialEq for ServerHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

/// A handle to a server's live state map, exposed inside receive bodies as
/// the identifier `state`. Not safe to retain outside the receive body that
/// received it — nothing in this type enforces that statically; it is a
/// documented calling convention, scope-local like a `this` binding rather
/// than enforced by the type system.
#[derive(Clone)]
pub struct ServerStateHandle {
    pub server_name: String,
    pub state: Arc<Mutex<HashMap<String, Value>>>,
}

impl fmt::Debug for ServerStateHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ServerStateHandle({})", self.server_name)
    }
}

/// The runtime value representation.
#[derive(Clone)]
pub enum Value {
    Nil,
    Number(f64),
    String(String),
    Bool(bool),
    Array(Arc<Mutex<Vec<Value>>>),
    Object(Arc<HashMap<String, Value>>),
    Function(Arc<FunctionValue>),
    Struct(Arc<StructInstance>),
    Server(ServerHandle),
    ServerState(ServerStateHandle),
}

impl Value {
    pub fn array(values: Vec<Value>) -> Value {
        Value::Array(Arc::new(Mutex::new(values)))
    }

    pub fn object(fields: HashMap<String, Value>) -> Value {
        Value::Object(Arc::new(fields))
    }

    pub fn native_fn(name: impl Into<String>, arity_params: &[&str], f: NativeFn) -> Value {
        Value::Function(Arc::new(FunctionValue {
            name: Some(name.into()),
            params: arity_params
                .iter()
                .map(|n| Param {
                    name: n.to_string(),
                    default: None,
                })
                .collect(),
            body: None,
            native: Some(f),
            captured_env: None,
        }))
    }

    /// Stable discriminant name, used in type-error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Bool(_) => "bool",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Function(_) => "function",
            Value::Struct(_) => "struct",
            Value::Server(_) => "server",
            Value::ServerState(_) => "server-state",
        }
    }

    /// Truthiness: nil/false/0/""/[]/{} are falsy, else truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Nil => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::Array(a) => !a.lock().unwrap_or_else(|e| e.into_inner()).is_empty(),
            Value::Object(o) => !o.is_empty(),
            Value::Function(_) => true,
            Value::Struct(_) => true,
            Value::Server(_) => true,
            Value::ServerState(_) => true,
        }
    }

    /// Structural equality: numbers/strings/bools/nil by value,
    /// structs by name+field set, servers by identity, everything else by
    /// identity/unequal-by-default.
    pub fn structural_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => {
                let a = a.lock().unwrap_or_else(|e| e.into_inner());
                let b = b.lock().unwrap_or_else(|e| e.into_inner());
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.structural_eq(y))
            }
            (Value::Object(a), Value::Object(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, v)| b.get(k).map_or(false, |bv| v.structural_eq(bv)))
            }
            (Value::Struct(a), Value::Struct(b)) => {
                a.name == b.name
                    && a.fields.len() == b.fields.len()
                    && a.fields.iter().all(|(k, v)| {
                        b.fields.get(k).map_or(false, |bv| v.structural_eq(bv))
                    })
            }
            (Value::Server(a), Value::Server(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Human-readable rendering used by `print`, error messages, and the
    /// `string` built-in.
    pub fn stringify(&self) -> String {
        match self {
            Value::Nil => "nil".to_string(),
            Value::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    n.to_string()
                }
            }
            Value::String(s) => s.clone(),
            Value::Bool(b) => b.to_string(),
            Value::Array(a) => {
                let a = a.lock().unwrap_or_else(|e| e.into_inner());
                let inner = a.iter().map(Value::stringify).collect::<Vec<_>>().join(", ");
                format!("[{}]", inner)
            }
            Value::Object(o) => {
                let inner = o
                    .iter()
                    .map(|(k, v)| format!("{}: {}", k, v.stringify()))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{{{}}}", inner)
            }
            Value::Function(f) => format!("<function {}>", f.name.as_deref().unwrap_or("anonymous")),
            Value::Struct(s) => {
                let inner = s
                    .fields
                    .iter()
                    .map(|(k, v)| format!("{}: {}", k, v.stringify()))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{} {{{}}}", s.name, inner)
            }
            Value::Server(h) => format!("<server {}>", h.name),
            Value::ServerState(h) => format!("<state of {}>", h.server_name),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.stringify())
    }
}
