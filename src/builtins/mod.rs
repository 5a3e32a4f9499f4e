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

//! The global built-in functions: `print`, `len`,
//! `string`, `message`, `send`.
//!
//! `send` and `message` need the shared server registry to locate a target
//! actor, so they are installed by `install` rather than constructed as
//! free-standing `Value::native_fn` calls like `print`/`len`/`string`.

use crate::actor::router::RouterHandle;
use crate::actor::server;
use crate::environment::Environment;
use crate::error::RelayError;
use crate::rt;
use crate::value::Value;

/// Binds every built-in into `env` (expected to be the global environment).
pub fn install(env: &Environment, router: RouterHandle) {
    env.define("print".to_string(), print_fn());
    env.define("len".to_string(), len_fn());
    env.define("string".to_string(), string_fn());
    env.define("send".to_string(), send_fn(router.clone()));
    env.define("message".to_string(), message_fn(router));
}

fn print_fn() -> Value {
    Value::native_fn("print", &["value"], std::sync::Arc::new(|args| {
        let rendered = args.iter().map(Value::stringify).collect::<Vec<_>>().join(" ");
        println!("{}", rendered);
        Ok(Value::Nil)
    }))
}

fn len_fn() -> Value {
    Value::native_fn("len", &["value"], std::sync::Arc::new(|args| {
        let value = args.get(0).ok_or_else(|| RelayError::ArityMismatch {
            name: "len".to_string(),
            expected: 1,
            got: args.len(),
        })?;
        match value {
            Value::Array(a) => Ok(Value::Number(a.lock().unwrap_or_else(|e| e.into_inner()).len() as f64)),
            Value::String(s) => Ok(Value::Number(s.chars().count() as f64)),
            Value::Object(o) => Ok(Value::Number(o.len() as f64)),
            other => Err(RelayError::NotFieldAccessible(other.type_name())),
        }
    }))
}

fn string_fn() -> Value {
    Value::native_fn("string", &["value"], std::sync::Arc::new(|args| {
        Ok(Value::String(args.get(0).map(Value::stringify).unwrap_or_default()))
    }))
}

/// `send` is the built-in form of the same synchronous call the `send`
/// expression makes, exposed as a plain function so host code and
/// array-method callbacks can invoke a server without the dedicated grammar
/// form. Blocking here means running this from inside another actor's
/// receive body risks the same 5s ceiling the `send` expression has.
fn send_fn(router: RouterHandle) -> Value {
    Value::native_fn(
        "send",
        &["server_name", "method", "args"],
        std::sync::Arc::new(move |args| {
            let router = router.clone();
            let server_name = args
                .get(0)
                .and_then(Value::as_str)
                .ok_or_else(|| RelayError::InvalidParams("send(server_name, method, args) requires a string server name".into()))?
                .to_string();
            let method = args
                .get(1)
                .and_then(Value::as_str)
                .ok_or_else(|| RelayError::InvalidParams("send(server_name, method, args) requires a string method".into()))?
                .to_string();
            let call_args = match args.get(2) {
                Some(Value::Object(fields)) => fields.values().cloned().collect(),
                Some(Value::Array(items)) => items.lock().unwrap_or_else(|e| e.into_inner()).clone(),
                Some(other) => vec![other.clone()],
                None => vec![],
            };

            match router.registry.get_mailbox(&server_name) {
                None => Err(RelayError::ServerNotFound(server_name)),
                Some((mailbox, running)) => {
                    rt::block_on(server::send_sync(&server_name, &running, &mailbox, method, call_args))
                }
            }
        }),
    )
}

/// `message` is `send`'s fire-and-forget sibling: enqueue and return nil
/// immediately without waiting on a reply. `send` is the grammar form;
/// `message` is exposed as a built-in so host code and receive bodies can
/// reach for the async counterpart without paying the 5s reply ceiling.
fn message_fn(router: RouterHandle) -> Value {
    Value::native_fn(
        "message",
        &["server_name", "method", "args"],
        std::sync::Arc::new(move |args| {
            let router = router.clone();
            let server_name = args
                .get(0)
                .and_then(Value::as_str)
                .ok_or_else(|| RelayError::InvalidParams("message(server_name, method, args) requires a string server name".into()))?
                .to_string();
            let method = args
                .get(1)
                .and_then(Value::as_str)
                .ok_or_else(|| RelayError::InvalidParams("message(server_name, method, args) requires a string method".into()))?
                .to_string();
            let call_args = match args.get(2) {
                Some(Value::Object(fields)) => fields.values().cloned().collect(),
                Some(Value::Array(items)) => items.lock().unwrap_or_else(|e| e.into_inner()).clone(),
                Some(other) => vec![other.clone()],
                None => vec![],
            };

            match router.registry.get_mailbox(&server_name) {
                None => Err(RelayError::ServerNotFound(server_name)),
                Some((mailbox, running)) => {
                    rt::block_on(server::send_async(&server_name, &running, &mailbox, method, call_args))?;
                    Ok(Value::Nil)
                }
            }
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn len_reports_array_length() {
        let f = len_fn();
        if let Value::Function(f) = f {
            let native = f.native.clone().unwrap();
            let v = native(vec![Value::array(vec![Value::Nil, Value::Nil])]).unwrap();
            assert_eq!(v.as_number(), Some(2.0));
        } else {
            panic!("expected function");
        }
    }

    #[test]
    fn string_renders_number_without_trailing_zeroes() {
        let f = string_fn();
        if let Value::Function(f) = f {
            let native = f.native.clone().unwrap();
            let v = native(vec![Value::Number(3.0)]).unwrap();
            assert_eq!(v.as_str(), Some("3"));
        } else {
            panic!("expected function");
        }
    }
}
