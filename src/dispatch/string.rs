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

//! String method handler: `length()` only.

use crate::error::RelayError;
use crate::value::Value;

pub fn dispatch(s: &str, method: &str, _args: Vec<Value>) -> Result<Value, RelayError> {
    match method {
        "length" => Ok(Value::Number(s.chars().count() as f64)),
        other => Err(RelayError::NoSuchMethod {
            target: "string",
            method: other.to_string(),
        }),
    }
}
