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

//! Struct instance method handler: `get(fieldName)` only,
//! erroring (not nil) on a missing field — unlike objects, whose `get`
//! returns nil on miss.

use std::sync::Arc;

use crate::error::RelayError;
use crate::value::{StructInstance, Value};

pub fn dispatch(instance: &Arc<StructInstance>, method: &str, args: Vec<Value>) -> Result<Value, RelayError> {
    match method {
        "get" => {
            let field = args
                .get(0)
                .and_then(Value::as_str)
                .ok_or_else(|| RelayError::InvalidParams("get(fieldName) requires a string".into()))?;
            instance
                .fields
                .get(field)
                .cloned()
                .ok_or_else(|| RelayError::StructFieldNotFound {
                    struct_name: instance.name.clone(),
                    field: field.to_string(),
                })
        }

        other => Err(RelayError::NoSuchMethod {
            target: "struct",
            method: other.to_string(),
        }),
    }
}
