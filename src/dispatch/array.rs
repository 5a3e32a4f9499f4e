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

//! Array method handler.
//!
//! Arrays are the one value kind that mutates through its own methods
//! (`push`/`pop`/`set`); everything else returns a new value. Index bounds
//! are checked rather than wrapped; `pop` on an empty array is a documented
//! convenience exception that returns an empty array instead of erroring.

use std::sync::{Arc, Mutex};

use crate::dispatch::{call_with_fallback, FunctionExecutor};
use crate::error::RelayError;
use crate::value::Value;

fn index_to_usize(v: &Value, len: usize) -> Result<usize, RelayError> {
    let n = v
        .as_number()
        .ok_or_else(|| RelayError::NonNumberIndex(v.type_name()))?;
    if n < 0.0 || n.fract() != 0.0 || (n as usize) >= len {
        return Err(RelayError::IndexOutOfBounds { index: n, length: len });
    }
    Ok(n as usize)
}

pub fn dispatch(
    cell: &Arc<Mutex<Vec<Value>>>,
    method: &str,
    mut args: Vec<Value>,
    exec: &dyn FunctionExecutor,
) -> Result<Value, RelayError> {
    match method {
        "length" => Ok(Value::Number(cell.lock().unwrap().len() as f64)),

        "get" => {
            let arr = cell.lock().unwrap();
            let idx = index_to_usize(args.get(0).unwrap_or(&Value::Nil), arr.len())?;
            Ok(arr[idx].clone())
        }

        "set" => {
            let mut arr = cell.lock().unwrap();
            let idx = index_to_usize(args.get(0).unwrap_or(&Value::Nil), arr.len())?;
            let value = args.into_iter().nth(1).unwrap_or(Value::Nil);
            arr[idx] = value.clone();
            Ok(value)
        }

        "push" => {
            let mut arr = cell.lock().unwrap();
            let value = args.into_iter().next().unwrap_or(Value::Nil);
            arr.push(value);
            Ok(Value::Number(arr.len() as f64))
        }

        "pop" => {
            let mut arr = cell.lock().unwrap();
            match arr.pop() {
                Some(v) => Ok(v),
                None => Ok(Value::array(Vec::new())),
            }
        }

        "includes" => {
            let arr = cell.lock().unwrap();
            let needle = args.into_iter().next().unwrap_or(Value::Nil);
            Ok(Value::Bool(arr.iter().any(|v| v.structural_eq(&needle))))
        }

        "map" => {
            let f = args.into_iter().next().ok_or_else(|| RelayError::ArityMismatch {
                name: "map".to_string(),
                expected: 1,
                got: 0,
            })?;
            let items = cell.lock().unwrap().clone();
            let mut out = Vec::with_capacity(items.len());
            for (i, item) in items.into_iter().enumerate() {
                out.push(call_with_fallback(
                    exec,
                    &f,
                    vec![item.clone()],
                    vec![item, Value::Number(i as f64)],
                )?);
            }
            Ok(Value::array(out))
        }

        "filter" => {
            let f = args.into_iter().next().ok_or_else(|| RelayError::ArityMismatch {
                name: "filter".to_string(),
                expected: 1,
                got: 0,
            })?;
            let items = cell.lock().unwrap().clone();
            let mut out = Vec::new();
            for (i, item) in items.into_iter().enumerate() {
                let keep = call_with_fallback(
                    exec,
                    &f,
                    vec![item.clone()],
                    vec![item.clone(), Value::Number(i as f64)],
                )?;
                if keep.is_truthy() {
                    out.push(item);
                }
            }
            Ok(Value::array(out))
        }

        "reduce" => {
            if args.is_empty() {
                return Err(RelayError::ArityMismatch {
                    name: "reduce".to_string(),
                    expected: 1,
                    got: 0,
                });
            }
            let f = args.remove(0);
            let items = cell.lock().unwrap().clone();
            let mut iter = items.into_iter().enumerate();
            let mut acc = match args.into_iter().next() {
                Some(init) => init,
                None => match iter.next() {
                    Some((_, first)) => first,
                    None => return Err(RelayError::ReduceEmptyArray),
                },
            };
            for (i, item) in iter {
                acc = call_with_fallback(
                    exec,
                    &f,
                    vec![acc.clone(), item.clone(), Value::Number(i as f64)],
                    vec![acc.clone(), item],
                )?;
            }
            Ok(acc)
        }

        other => Err(RelayError::NoSuchMethod {
            target: "array",
            method: other.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopExec;
    impl FunctionExecutor for NoopExec {
        fn call(&self, _f: &Value, _args: Vec<Value>) -> Result<Value, RelayError> {
            unreachable!("not exercised by these tests")
        }
    }

    fn arr(values: Vec<Value>) -> Arc<Mutex<Vec<Value>>> {
        Arc::new(Mutex::new(values))
    }

    #[test]
    fn get_out_of_bounds_errors() {
        let a = arr(vec![Value::Number(1.0), Value::Number(2.0), Value::Number(3.0)]);
        let err = dispatch(&a, "get", vec![Value::Number(3.0)], &NoopExec).unwrap_err();
        assert!(matches!(err, RelayError::IndexOutOfBounds { .. }));
        let err = dispatch(&a, "get", vec![Value::Number(-1.0)], &NoopExec).unwrap_err();
        assert!(matches!(err, RelayError::IndexOutOfBounds { .. }));
    }

    #[test]
    fn pop_empty_returns_empty_array() {
        let a: Arc<Mutex<Vec<Value>>> = arr(vec![]);
        let result = dispatch(&a, "pop", vec![], &NoopExec).unwrap();
        match result {
            Value::Array(cell) => assert!(cell.lock().unwrap().is_empty()),
            _ => panic!("expected array"),
        }
    }

    #[test]
    fn push_returns_new_length() {
        let a = arr(vec![Value::Number(1.0)]);
        let result = dispatch(&a, "push", vec![Value::Number(2.0)], &NoopExec).unwrap();
        assert_eq!(result.as_number(), Some(2.0));
        assert_eq!(a.lock().unwrap().len(), 2);
    }

    #[test]
    fn reduce_without_initial_on_empty_errors() {
        let a: Arc<Mutex<Vec<Value>>> = arr(vec![]);
        let f = Value::native_fn("f", &["a", "b"], Arc::new(|_| Ok(Value::Nil)));
        let err = dispatch(&a, "reduce", vec![f], &NoopExec).unwrap_err();
        assert!(matches!(err, RelayError::ReduceEmptyArray));
    }

    #[test]
    fn reduce_without_a_callback_is_an_arity_error_not_a_panic() {
        let a = arr(vec![Value::Number(1.0), Value::Number(2.0)]);
        let err = dispatch(&a, "reduce", vec![], &NoopExec).unwrap_err();
        assert!(matches!(err, RelayError::ArityMismatch { expected: 1, got: 0, .. }));
    }
}
