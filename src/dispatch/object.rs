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

//! Object method handler.
//!
//! Objects are immutable: `set` returns a new object with the field
//! added/replaced rather than mutating in place.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::RelayError;
use crate::value::Value;

pub fn dispatch(fields: &Arc<HashMap<String, Value>>, method: &str, args: Vec<Value>) -> Result<Value, RelayError> {
    match method {
        "get" => {
            let key = args.get(0).and_then(Value::as_str).unwrap_or_default();
            Ok(fields.get(key).cloned().unwrap_or(Value::Nil))
        }

        "set" => {
            let key = args
                .get(0)
                .and_then(Value::as_str)
                .ok_or_else(|| RelayError::InvalidParams("set(key, value) requires a string key".into()))?
                .to_string();
            let value = args.into_iter().nth(1).unwrap_or(Value::Nil);
            let mut next = (**fields).clone();
            next.insert(key, value);
            Ok(Value::object(next))
        }

        other => Err(RelayError::NoSuchMethod {
            target: "object",
            method: other.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_missing_key_yields_nil() {
        let obj: Arc<HashMap<String, Value>> = Arc::new(HashMap::new());
        let result = dispatch(&obj, "get", vec![Value::String("missing".into())]).unwrap();
        assert!(matches!(result, Value::Nil));
    }

    #[test]
    fn set_returns_new_object_without_mutating_original() {
        let mut fields = HashMap::new();
        fields.insert("a".to_string(), Value::Number(1.0));
        let obj = Arc::new(fields);
        let result = dispatch(&obj, "set", vec![Value::String("b".into()), Value::Number(2.0)]).unwrap();
        assert_eq!(obj.len(), 1);
        match result {
            Value::Object(next) => assert_eq!(next.len(), 2),
            _ => panic!("expected object"),
        }
    }
}
