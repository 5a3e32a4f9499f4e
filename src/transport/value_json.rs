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

//! `Value` <-> JSON conversion for the wire.
//!
//! Every transport — JSON-RPC params/result, WS `server_call`/`server_response`
//! payloads — shares this single encoding so a caller sees the same shape of
//! a struct or a server handle no matter which door it came in through.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{json, Map, Value as Json};

use crate::value::{StructInstance, Value};

/// Encodes a `Value` for transport. Functions and servers have no faithful
/// JSON form, so they cross the wire as opaque descriptor strings; callers
/// on the far side cannot invoke them directly, only display or log them.
pub fn to_json(value: &Value) -> Json {
    match value {
        Value::Nil => Json::Null,
        Value::Number(n) => json!(n),
        Value::String(s) => json!(s),
        Value::Bool(b) => json!(b),
        Value::Array(a) => {
            let a = a.lock().unwrap_or_else(|e| e.into_inner());
            Json::Array(a.iter().map(to_json).collect())
        }
        Value::Object(o) => {
            let mut map = Map::new();
            for (k, v) in o.iter() {
                map.insert(k.clone(), to_json(v));
            }
            Json::Object(map)
        }
        Value::Struct(s) => {
            let mut map = Map::new();
            map.insert("_type".to_string(), json!(s.name));
            for (k, v) in s.fields.iter() {
                map.insert(k.clone(), to_json(v));
            }
            Json::Object(map)
        }
        Value::Function(f) => json!(format!("<function {}>", f.name.as_deref().unwrap_or("anonymous"))),
        Value::Server(h) => json!(format!("<server {}>", h.name)),
        Value::ServerState(h) => {
            let map = h.state.lock().unwrap_or_else(|e| e.into_inner());
            let mut out = Map::new();
            for (k, v) in map.iter() {
                out.insert(k.clone(), to_json(v));
            }
            Json::Object(out)
        }
    }
}

/// Decodes JSON into a `Value`. Objects carrying a `_type` key decode back
/// into a `Struct` so a struct instance survives a gateway round trip when
/// the caller provides the same `_type` tag this module produced; any other
/// object decodes as a plain `Object`.
pub fn from_json(json: &Json) -> Value {
    match json {
        Json::Null => Value::Nil,
        Json::Bool(b) => Value::Bool(*b),
        Json::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
        Json::String(s) => Value::String(s.clone()),
        Json::Array(items) => Value::array(items.iter().map(from_json).collect()),
        Json::Object(map) => {
            if let Some(Json::String(type_name)) = map.get("_type") {
                let fields: HashMap<String, Value> = map
                    .iter()
                    .filter(|(k, _)| k.as_str() != "_type")
                    .map(|(k, v)| (k.clone(), from_json(v)))
                    .collect();
                return Value::Struct(Arc::new(StructInstance {
                    name: type_name.clone(),
                    fields: Arc::new(fields),
                }));
            }
            let fields: HashMap<String, Value> =
                map.iter().map(|(k, v)| (k.clone(), from_json(v))).collect();
            Value::object(fields)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn struct_round_trips_through_type_tag() {
        let mut fields = HashMap::new();
        fields.insert("x".to_string(), Value::Number(1.0));
        let original = Value::Struct(Arc::new(StructInstance {
            name: "Point".to_string(),
            fields: Arc::new(fields),
        }));

        let json = to_json(&original);
        assert_eq!(json["_type"], json!("Point"));

        let decoded = from_json(&json);
        assert!(decoded.structural_eq(&original));
    }

    #[test]
    fn plain_object_has_no_type_tag() {
        let mut fields = HashMap::new();
        fields.insert("a".to_string(), Value::Bool(true));
        let original = Value::object(fields);
        let json = to_json(&original);
        assert!(json.get("_type").is_none());
    }
}
