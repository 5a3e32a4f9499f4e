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

//! Server-state method handler: `get`/`set`, where `set`
//! mutates the live state map in place and returns the value for chaining.

use crate::error::RelayError;
use crate::value::{ServerStateHandle, Value};

pub fn dispatch(handle: &ServerStateHandle, method: &str, args: Vec<Value>) -> Result<Value, RelayError> {
    match method {
        "get" => {
            let key = args.get(0).and_then(Value::as_str).unwrap_or_default();
            Ok(handle.state.lock().unwrap().get(key).cloned().unwrap_or(Value::Nil))
        }

        "set" => {
            let key = args
                .get(0)
                .and_then(Value::as_str)
                .ok_or_else(|| RelayError::InvalidParams("set(key, value) requires a string key".into()))?
                .to_string();
            let value = args.into_iter().nth(1).unwrap_or(Value::Nil);
            handle.state.lock().unwrap().insert(key, value.clone());
            Ok(value)
        }

        other => Err(RelayError::NoSuchMethod {
            target: "server-state",
            method: other.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    #[test]
    fn set_then_get_round_trips() {
        let handle = ServerStateHandle {
            server_name: "counter".into(),
            state: Arc::new(Mutex::new(HashMap::new())),
        };
        dispatch(&handle, "set", vec![Value::String("count".into()), Value::Number(1.0)]).unwrap();
        let v = dispatch(&handle, "get", vec![Value::String("count".into())]).unwrap();
        assert_eq!(v.as_number(), Some(1.0));
    }
}
