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

//! Every expression form except the three that can carry a `return` signal
//! up through nested blocks (`Return`, `Block`, `If` — handled directly in
//! `Evaluator::eval_signal`). This module produces plain `Value`s.

use std::collections::HashMap;
use std::sync::Arc;

use crate::actor::server;
use crate::ast::{
    Accessor, BinOp, Expr, FunctionExpr, IfExpr, Literal, ObjectLiteralExpr, PrimaryExpr, SendExpr, ServerDefExpr,
    SetExpr, StructConstructorExpr, StructDefExpr, UnOp, UnaryExpr,
};
use crate::dispatch;
use crate::environment::Environment;
use crate::error::RelayError;
use crate::rt;
use crate::value::{FunctionValue, StructDef, StructInstance, Value};

use super::{Evaluator, Signal};

/// Evaluates any expression form other than `Return`/`Block`/`If`.
pub fn eval_plain(evaluator: &Evaluator, expr: &Expr, env: &Environment) -> Result<Value, RelayError> {
    match expr {
        Expr::Return(_) | Expr::Block(_) | Expr::If(_) => evaluator.eval_signal(expr, env).map(Signal::into_value),

        Expr::Literal(lit) => eval_literal(evaluator, lit, env),
        Expr::Identifier(name) => env.get(name).ok_or_else(|| RelayError::UndefinedVariable(name.clone())),
        Expr::Binary(b) => eval_binary(evaluator, b, env),
        Expr::Unary(u) => eval_unary(evaluator, u, env),
        Expr::Primary(p) => eval_primary(evaluator, p, env),
        Expr::Function(f) => Ok(eval_function_expr(f, env)),
        Expr::StructDef(s) => eval_struct_def(evaluator, s),
        Expr::ServerDef(s) => eval_server_def(evaluator, s, env),
        Expr::StructConstructor(s) => eval_struct_constructor(evaluator, s, env),
        Expr::ObjectLiteral(o) => eval_object_literal(evaluator, o, env),
        Expr::Set(s) => eval_set(evaluator, s, env),
        Expr::Send(s) => eval_send(evaluator, s, env),
        Expr::Grouping(inner) => evaluator.eval(inner, env),
    }
}

fn eval_literal(evaluator: &Evaluator, lit: &Literal, env: &Environment) -> Result<Value, RelayError> {
    match lit {
        Literal::Number(n) => Ok(Value::Number(*n)),
        Literal::String(s) => Ok(Value::String(s.clone())),
        Literal::Bool(b) => Ok(Value::Bool(*b)),
        Literal::Nil => Ok(Value::Nil),
        Literal::Array(items) => {
            let values = items.iter().map(|e| evaluator.eval(e, env)).collect::<Result<Vec<_>, _>>()?;
            Ok(Value::array(values))
        }
    }
}

/// Left-to-right evaluation with no precedence beyond what short-circuit
/// and null-coalescing require.
fn eval_binary(evaluator: &Evaluator, b: &crate::ast::BinaryExpr, env: &Environment) -> Result<Value, RelayError> {
    let mut acc = evaluator.eval(&b.left, env)?;
    for (op, rhs) in &b.rest {
        acc = apply_binop(evaluator, op, acc, rhs, env)?;
    }
    Ok(acc)
}

fn apply_binop(evaluator: &Evaluator, op: &BinOp, left: Value, rhs_expr: &Expr, env: &Environment) -> Result<Value, RelayError> {
    match op {
        BinOp::And => {
            if !left.is_truthy() {
                return Ok(Value::Bool(false));
            }
            Ok(Value::Bool(evaluator.eval(rhs_expr, env)?.is_truthy()))
        }
        BinOp::Or => {
            if left.is_truthy() {
                return Ok(Value::Bool(true));
            }
            Ok(Value::Bool(evaluator.eval(rhs_expr, env)?.is_truthy()))
        }
        BinOp::Coalesce => {
            if !matches!(left, Value::Nil) {
                Ok(left)
            } else {
                evaluator.eval(rhs_expr, env)
            }
        }
        strict_op => {
            let right = evaluator.eval(rhs_expr, env)?;
            eval_strict_binop(strict_op, left, right)
        }
    }
}

fn eval_strict_binop(op: &BinOp, left: Value, right: Value) -> Result<Value, RelayError> {
    match op {
        BinOp::Add => match (&left, &right) {
            (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
            (Value::String(a), Value::String(b)) => Ok(Value::String(format!("{}{}", a, b))),
            _ => Err(binary_mismatch("+", &left, &right)),
        },
        BinOp::Sub => numeric_binop("-", left, right, |a, b| a - b),
        BinOp::Mul => numeric_binop("*", left, right, |a, b| a * b),
        BinOp::Div => match (&left, &right) {
            (Value::Number(_), Value::Number(b)) if *b == 0.0 => Err(RelayError::DivisionByZero),
            (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a / b)),
            _ => Err(binary_mismatch("/", &left, &right)),
        },
        BinOp::Eq => Ok(Value::Bool(left.structural_eq(&right))),
        BinOp::NotEq => Ok(Value::Bool(!left.structural_eq(&right))),
        BinOp::Lt => compare("<", left, right, |a, b| a < b),
        BinOp::Lte => compare("<=", left, right, |a, b| a <= b),
        BinOp::Gt => compare(">", left, right, |a, b| a > b),
        BinOp::Gte => compare(">=", left, right, |a, b| a >= b),
        BinOp::And | BinOp::Or | BinOp::Coalesce => unreachable!("short-circuit operators handled in apply_binop"),
    }
}

fn numeric_binop(op: &'static str, left: Value, right: Value, f: impl Fn(f64, f64) -> f64) -> Result<Value, RelayError> {
    match (&left, &right) {
        (Value::Number(a), Value::Number(b)) => Ok(Value::Number(f(*a, *b))),
        _ => Err(binary_mismatch(op, &left, &right)),
    }
}

fn compare(op: &'static str, left: Value, right: Value, f: impl Fn(f64, f64) -> bool) -> Result<Value, RelayError> {
    match (&left, &right) {
        (Value::Number(a), Value::Number(b)) => Ok(Value::Bool(f(*a, *b))),
        _ => Err(binary_mismatch(op, &left, &right)),
    }
}

fn binary_mismatch(op: &'static str, left: &Value, right: &Value) -> RelayError {
    RelayError::BinaryTypeMismatch {
        op,
        left: left.type_name(),
        right: right.type_name(),
    }
}

fn eval_unary(evaluator: &Evaluator, u: &UnaryExpr, env: &Environment) -> Result<Value, RelayError> {
    let value = evaluator.eval(&u.primary, env)?;
    match u.op {
        None => Ok(value),
        Some(UnOp::Not) => Ok(Value::Bool(!value.is_truthy())),
        Some(UnOp::Neg) => match value {
            Value::Number(n) => Ok(Value::Number(-n)),
            other => Err(RelayError::UnaryTypeMismatch { op: "-", operand: other.type_name() }),
        },
    }
}

/// Fuses a base value through its access chain: `a.b(c).d` runs `FieldAccess(b)`, then `FuncCall(c)`, then
/// `FieldAccess(d)`, strictly left to right.
fn eval_primary(evaluator: &Evaluator, p: &PrimaryExpr, env: &Environment) -> Result<Value, RelayError> {
    let mut current = evaluator.eval(&p.base, env)?;
    for accessor in &p.chain {
        current = apply_accessor(evaluator, current, accessor, env)?;
    }
    Ok(current)
}

fn apply_accessor(evaluator: &Evaluator, base: Value, accessor: &Accessor, env: &Environment) -> Result<Value, RelayError> {
    match accessor {
        Accessor::FieldAccess { name } => field_access(&base, name),

        Accessor::MethodCall { name, args } => {
            let evaluated = eval_args(evaluator, args, env)?;
            call_method_with_object_fallback(evaluator, &base, name, evaluated)
        }

        Accessor::FuncCall { args } => {
            let evaluated = eval_args(evaluator, args, env)?;
            super::calls::call_value(evaluator, &base, evaluated)
        }
    }
}

fn eval_args(evaluator: &Evaluator, args: &[Expr], env: &Environment) -> Result<Vec<Value>, RelayError> {
    args.iter().map(|a| evaluator.eval(a, env)).collect()
}

/// Field access on an object returns nil for a missing key; on a struct it
/// is a hard error; anything else is a type error.
fn field_access(base: &Value, name: &str) -> Result<Value, RelayError> {
    match base {
        Value::Object(fields) => Ok(fields.get(name).cloned().unwrap_or(Value::Nil)),
        Value::Struct(instance) => instance.fields.get(name).cloned().ok_or_else(|| RelayError::StructFieldNotFound {
            struct_name: instance.name.clone(),
            field: name.to_string(),
        }),
        other => Err(RelayError::NotFieldAccessible(other.type_name())),
    }
}

/// Tries the dispatcher's built-in method table first; only when it reports
/// `NoSuchMethod` on an object whose field of the same name holds a
/// function does this fall back to calling that field.
fn call_method_with_object_fallback(evaluator: &Evaluator, base: &Value, name: &str, args: Vec<Value>) -> Result<Value, RelayError> {
    match dispatch::call_method(base, name, args.clone(), evaluator) {
        Err(RelayError::NoSuchMethod { .. }) => {
            if let Value::Object(fields) = base {
                if let Some(field_fn @ Value::Function(_)) = fields.get(name) {
                    return super::calls::call_value(evaluator, field_fn, args);
                }
            }
            Err(RelayError::NoSuchMethod { target: base.type_name(), method: name.to_string() })
        }
        other => other,
    }
}

fn eval_function_expr(f: &FunctionExpr, env: &Environment) -> Value {
    Value::Function(Arc::new(FunctionValue {
        name: f.name.clone(),
        params: f.params.clone(),
        body: Some(f.body.clone()),
        native: None,
        captured_env: Some(env.clone()),
    }))
}

fn eval_struct_def(evaluator: &Evaluator, s: &StructDefExpr) -> Result<Value, RelayError> {
    evaluator.structs.define(StructDef {
        name: s.name.clone(),
        fields: s.fields.iter().map(|f| (f.name.clone(), f.type_name.clone())).collect(),
    });
    Ok(Value::Nil)
}

/// Builds state, receives, spawns, and registers the actor, returning the
/// handle as the expression's value. Spawning the mailbox and registering
/// with the router are both async (tokio primitives), so this bridges
/// through `rt::block_on` the same way `send`/`message` do.
fn eval_server_def(evaluator: &Evaluator, s: &ServerDefExpr, env: &Environment) -> Result<Value, RelayError> {
    let mut initial_state = HashMap::new();
    for field in &s.state {
        let value = match &field.default {
            Some(expr) => evaluator.eval(expr, env)?,
            None => Value::Nil,
        };
        initial_state.insert(field.name.clone(), value);
    }

    let mut receives = HashMap::new();
    for r in &s.receives {
        receives.insert(
            r.name.clone(),
            Arc::new(FunctionValue {
                name: Some(r.name.clone()),
                params: r.params.clone(),
                body: Some(r.body.clone()),
                native: None,
                captured_env: Some(env.clone()),
            }),
        );
    }

    let invoker = Arc::new(evaluator.clone());
    let (handle, running) = server::spawn(s.name.clone(), initial_state, receives, invoker);
    rt::block_on(evaluator.router.register_server(s.name.clone(), handle.clone(), running));

    Ok(Value::Server(handle))
}

/// Missing required fields fail construction; unknown fields are rejected
/// outright.
fn eval_struct_constructor(evaluator: &Evaluator, s: &StructConstructorExpr, env: &Environment) -> Result<Value, RelayError> {
    let def = evaluator.structs.get(&s.name).ok_or_else(|| RelayError::UndefinedStruct(s.name.clone()))?;

    let mut values = HashMap::with_capacity(s.fields.len());
    for (key, expr) in &s.fields {
        if !def.fields.iter().any(|(n, _)| n == key) {
            return Err(RelayError::UnknownStructField { struct_name: s.name.clone(), field: key.clone() });
        }
        values.insert(key.clone(), evaluator.eval(expr, env)?);
    }

    for (field_name, _) in &def.fields {
        if !values.contains_key(field_name) {
            return Err(RelayError::MissingStructField { struct_name: s.name.clone(), field: field_name.clone() });
        }
    }

    Ok(Value::Struct(Arc::new(StructInstance {
        name: s.name.clone(),
        fields: Arc::new(values),
    })))
}

fn eval_object_literal(evaluator: &Evaluator, o: &ObjectLiteralExpr, env: &Environment) -> Result<Value, RelayError> {
    let mut fields = HashMap::with_capacity(o.fields.len());
    for (key, expr) in &o.fields {
        fields.insert(key.clone(), evaluator.eval(expr, env)?);
    }
    Ok(Value::object(fields))
}

/// `set x = v` rebinds `x` in the current frame, never a parent's.
fn eval_set(evaluator: &Evaluator, s: &SetExpr, env: &Environment) -> Result<Value, RelayError> {
    let value = evaluator.eval(&s.value, env)?;
    env.define(s.variable.clone(), value.clone());
    Ok(value)
}

/// `send "NAME" method { k: v, ... }`. The object literal's values, in
/// declaration order, become a positional argument vector; the grammar
/// carries no node id, so a `send` expression only ever targets a locally
/// registered server. Goes straight to the
/// actor rather than through a `RouteRequest` round trip so mailbox-full
/// and reply-timeout errors keep their exact wording ("channel full",
/// a timeout) instead of being re-wrapped as a generic router string.
fn eval_send(evaluator: &Evaluator, s: &SendExpr, env: &Environment) -> Result<Value, RelayError> {
    let args = match &s.args {
        Some(obj) => eval_object_literal_values(evaluator, obj, env)?,
        None => vec![],
    };

    match evaluator.router.registry.get_mailbox(&s.target) {
        None => Err(RelayError::ServerNotFound(s.target.clone())),
        Some((mailbox, running)) => rt::block_on(server::send_sync(&s.target, &running, &mailbox, s.method.clone(), args)),
    }
}

fn eval_object_literal_values(evaluator: &Evaluator, o: &ObjectLiteralExpr, env: &Environment) -> Result<Vec<Value>, RelayError> {
    o.fields.iter().map(|(_, expr)| evaluator.eval(expr, env)).collect()
}

pub fn eval_if(evaluator: &Evaluator, if_expr: &IfExpr, env: &Environment) -> Result<Signal, RelayError> {
    let condition = evaluator.eval(&if_expr.condition, env)?;
    if condition.is_truthy() {
        evaluator.eval_block(&if_expr.then_block, env)
    } else if let Some(else_block) = &if_expr.else_block {
        evaluator.eval_block(else_block, env)
    } else {
        Ok(Signal::Value(Value::Nil))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::router::{Router, ServerRegistry};
    use crate::ast::{BinaryExpr, Block, Param, UnaryExpr};

    /// None of these tests declare a `server` or dispatch through the
    /// router, so a bare handle (no spawned recv loop) is enough — and
    /// keeps these plain `#[test]`s runnable outside a tokio runtime,
    /// unlike `Router::start`'s `tokio::spawn`.
    fn evaluator() -> Evaluator {
        let router = Router::new(ServerRegistry::new()).handle();
        Evaluator::new(router)
    }

    fn num(n: f64) -> Expr {
        Expr::Literal(Literal::Number(n))
    }

    fn binary(left: Expr, op: BinOp, right: Expr) -> Expr {
        Expr::Binary(BinaryExpr { left: Box::new(left), rest: vec![(op, right)] })
    }

    /// `make(x) = fn (y) { x + y }`; `make(a)(c)` and `make(b)(c)` must
    /// yield `a+c`/`b+c` independently — each call to the factory captures
    /// its own frame, not a shared one.
    #[test]
    fn closures_from_the_same_factory_are_independent() {
        let ev = evaluator();
        let env = ev.global_env.clone();

        let make = Expr::Function(FunctionExpr {
            name: Some("make".to_string()),
            params: vec![Param { name: "x".to_string(), default: None }],
            body: Block::new(vec![Expr::Function(FunctionExpr {
                name: None,
                params: vec![Param { name: "y".to_string(), default: None }],
                body: Block::new(vec![binary(Expr::Identifier("x".to_string()), BinOp::Add, Expr::Identifier("y".to_string()))]),
            })]),
        });
        env.define("make", ev.eval(&make, &env).unwrap());

        let call = |factory_arg: f64, call_arg: f64| {
            let inner = Expr::Primary(PrimaryExpr {
                base: Box::new(Expr::Identifier("make".to_string())),
                chain: vec![
                    Accessor::FuncCall { args: vec![num(factory_arg)] },
                    Accessor::FuncCall { args: vec![num(call_arg)] },
                ],
            });
            ev.eval(&inner, &env).unwrap().as_number().unwrap()
        };

        assert_eq!(call(10.0, 1.0), 11.0);
        assert_eq!(call(100.0, 1.0), 101.0);
    }

    #[test]
    fn division_by_zero_is_a_fatal_error() {
        let ev = evaluator();
        let env = ev.global_env.clone();
        let err = ev.eval(&binary(num(10.0), BinOp::Div, num(0.0)), &env).unwrap_err();
        assert!(matches!(err, RelayError::DivisionByZero));
    }

    #[test]
    fn null_coalescing_prefers_non_nil_left_even_when_falsy() {
        let ev = evaluator();
        let env = ev.global_env.clone();

        let empty_string_coalesce = binary(Expr::Literal(Literal::String(String::new())), BinOp::Coalesce, Expr::Literal(Literal::String("x".to_string())));
        assert_eq!(ev.eval(&empty_string_coalesce, &env).unwrap().as_str(), Some(""));

        let nil_coalesce = binary(Expr::Literal(Literal::Nil), BinOp::Coalesce, Expr::Literal(Literal::String("x".to_string())));
        assert_eq!(ev.eval(&nil_coalesce, &env).unwrap().as_str(), Some("x"));
    }

    #[test]
    fn short_circuit_and_or_follow_truthiness_not_value_passthrough() {
        let ev = evaluator();
        let env = ev.global_env.clone();

        let and_expr = binary(Expr::Literal(Literal::Bool(true)), BinOp::And, num(0.0));
        assert_eq!(ev.eval(&and_expr, &env).unwrap().is_truthy(), false);

        let or_expr = binary(num(0.0), BinOp::Or, Expr::Literal(Literal::String("a".to_string())));
        assert_eq!(ev.eval(&or_expr, &env).unwrap().is_truthy(), true);
    }

    #[test]
    fn unary_not_negates_truthiness_and_unary_neg_requires_number() {
        let ev = evaluator();
        let env = ev.global_env.clone();

        let not_expr = Expr::Unary(UnaryExpr { op: Some(UnOp::Not), primary: Box::new(num(0.0)) });
        assert_eq!(ev.eval(&not_expr, &env).unwrap().is_truthy(), true);

        let neg_on_string = Expr::Unary(UnaryExpr {
            op: Some(UnOp::Neg),
            primary: Box::new(Expr::Literal(Literal::String("x".to_string()))),
        });
        assert!(matches!(ev.eval(&neg_on_string, &env).unwrap_err(), RelayError::UnaryTypeMismatch { .. }));
    }

    /// Struct equality is structural over name and field set: field
    /// declaration order must not matter.
    #[test]
    fn struct_equality_is_structural_regardless_of_field_order() {
        let ev = evaluator();
        let env = ev.global_env.clone();

        ev.structs.define(StructDef {
            name: "User".to_string(),
            fields: vec![("name".to_string(), "string".to_string()), ("age".to_string(), "number".to_string())],
        });

        let a = StructConstructorExpr {
            name: "User".to_string(),
            fields: vec![
                ("name".to_string(), Expr::Literal(Literal::String("John".to_string()))),
                ("age".to_string(), num(30.0)),
            ],
        };
        let b = StructConstructorExpr {
            name: "User".to_string(),
            fields: vec![
                ("age".to_string(), num(30.0)),
                ("name".to_string(), Expr::Literal(Literal::String("John".to_string()))),
            ],
        };

        let eq = binary(Expr::StructConstructor(a), BinOp::Eq, Expr::StructConstructor(b));
        assert_eq!(ev.eval(&eq, &env).unwrap().is_truthy(), true);
    }

    #[test]
    fn struct_construction_fails_on_missing_required_field() {
        let ev = evaluator();
        let env = ev.global_env.clone();

        ev.structs.define(StructDef {
            name: "User".to_string(),
            fields: vec![("name".to_string(), "string".to_string()), ("age".to_string(), "number".to_string())],
        });

        let missing_age = Expr::StructConstructor(StructConstructorExpr {
            name: "User".to_string(),
            fields: vec![("name".to_string(), Expr::Literal(Literal::String("John".to_string())))],
        });

        let err = ev.eval(&missing_age, &env).unwrap_err();
        assert!(matches!(err, RelayError::MissingStructField { .. }));
    }

    #[test]
    fn struct_construction_rejects_unknown_field() {
        let ev = evaluator();
        let env = ev.global_env.clone();

        ev.structs.define(StructDef {
            name: "Point".to_string(),
            fields: vec![("x".to_string(), "number".to_string())],
        });

        let with_extra = Expr::StructConstructor(StructConstructorExpr {
            name: "Point".to_string(),
            fields: vec![("x".to_string(), num(1.0)), ("y".to_string(), num(2.0))],
        });

        let err = ev.eval(&with_extra, &env).unwrap_err();
        assert!(matches!(err, RelayError::UnknownStructField { .. }));
    }
}
