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

//! HTTP JSON-RPC 2.0 adapter.
//!
//! `/rpc` accepts a single JSON-RPC 2.0 request and replies with a single
//! JSON-RPC 2.0 response, mapping every router outcome onto the standard
//! JSON-RPC error codes. The body is parsed here, not via an axum JSON
//! extractor, so a malformed body can be answered with a well-formed
//! `-32700` instead of a framework-level rejection.

use std::time::Duration;

use serde::Serialize;
use serde_json::Value as Json;

use crate::actor::router::{RouteRequest, RouterHandle};
use crate::transport::value_json::{from_json, to_json};

pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;

#[derive(Serialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Json>,
}

#[derive(Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Json>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    pub id: Json,
}

impl JsonRpcResponse {
    fn ok(id: Json, result: Json) -> Self {
        JsonRpcResponse { jsonrpc: "2.0", result: Some(result), error: None, id }
    }

    fn err(id: Json, code: i32, message: impl Into<String>, data: Option<Json>) -> Self {
        JsonRpcResponse {
            jsonrpc: "2.0",
            result: None,
            error: Some(JsonRpcError { code, message: message.into(), data }),
            id,
        }
    }
}

/// Handles one already-read request body against `router`, returning the
/// response to serialize. `from` identifies the caller (the gateway's own
/// node id) for correlation on the router side; `next_id` mints the
/// correlation id carried on the resulting `RouteRequest`.
pub async fn handle(body: &str, router: &RouterHandle, from: &str, next_id: impl FnOnce() -> String) -> JsonRpcResponse {
    let parsed: Json = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(_) => return JsonRpcResponse::err(Json::Null, PARSE_ERROR, "Parse error", None),
    };

    let id = parsed.get("id").cloned().unwrap_or(Json::Null);

    let version_ok = parsed.get("jsonrpc").and_then(Json::as_str) == Some("2.0");
    let method = match parsed.get("method").and_then(Json::as_str) {
        Some(m) => m.to_string(),
        None => return JsonRpcResponse::err(id, INVALID_REQUEST, "Invalid request", None),
    };
    if !version_ok {
        return JsonRpcResponse::err(id, INVALID_REQUEST, "Invalid request", None);
    }

    let params = parsed.get("params").cloned();

    let req = if method == "remote_call" {
        match build_remote_call(&id, params, from, next_id()) {
            Ok(req) => req,
            Err(resp) => return resp,
        }
    } else {
        match build_local_call(&id, &method, params, from, next_id()) {
            Ok(req) => req,
            Err(resp) => return resp,
        }
    };

    let resp = router.route(req).await;
    if resp.success {
        JsonRpcResponse::ok(id, to_json(&resp.result))
    } else {
        let message = resp.error.unwrap_or_else(|| "internal error".to_string());
        if message == "server not found" {
            JsonRpcResponse::err(id, METHOD_NOT_FOUND, "Method not found", Some(Json::String(message)))
        } else {
            JsonRpcResponse::err(id, INTERNAL_ERROR, "Internal error", Some(Json::String(message)))
        }
    }
}

fn build_local_call(
    id: &Json,
    method: &str,
    params: Option<Json>,
    from: &str,
    request_id: String,
) -> Result<RouteRequest, JsonRpcResponse> {
    let Some((server_name, receive_method)) = method.split_once('.') else {
        return Err(JsonRpcResponse::err(id.clone(), METHOD_NOT_FOUND, "Method not found", None));
    };
    if server_name.is_empty() || receive_method.is_empty() {
        return Err(JsonRpcResponse::err(id.clone(), METHOD_NOT_FOUND, "Method not found", None));
    }

    Ok(RouteRequest {
        id: request_id,
        from: from.to_string(),
        node_id: String::new(),
        server_name: server_name.to_string(),
        method: receive_method.to_string(),
        args: fold_params(params),
        timeout: Duration::from_secs(0),
    })
}

fn build_remote_call(
    id: &Json,
    params: Option<Json>,
    from: &str,
    request_id: String,
) -> Result<RouteRequest, JsonRpcResponse> {
    let Some(params) = params.as_ref().and_then(Json::as_object) else {
        return Err(JsonRpcResponse::err(id.clone(), INVALID_PARAMS, "Invalid params", None));
    };

    let node_id = params.get("node_id").and_then(Json::as_str);
    let server_name = params.get("server_name").and_then(Json::as_str);
    let method = params.get("method").and_then(Json::as_str);
    let (Some(node_id), Some(server_name), Some(method)) = (node_id, server_name, method) else {
        return Err(JsonRpcResponse::err(id.clone(), INVALID_PARAMS, "Invalid params", None));
    };

    let args = match params.get("args") {
        Some(Json::Array(items)) => items.iter().map(from_json).collect(),
        Some(other) => vec![from_json(other)],
        None => vec![],
    };

    let timeout = params
        .get("timeout")
        .and_then(Json::as_u64)
        .map(Duration::from_secs)
        .unwrap_or(Duration::from_secs(0));

    Ok(RouteRequest {
        id: request_id,
        from: from.to_string(),
        node_id: node_id.to_string(),
        server_name: server_name.to_string(),
        method: method.to_string(),
        args,
        timeout,
    })
}

/// Folds JSON-RPC `params` into a positional argument vector:
/// an object becomes a single object-valued argument, an array becomes the
/// positional list itself, a bare scalar becomes a one-element list, and
/// absence becomes no arguments at all.
fn fold_params(params: Option<Json>) -> Vec<crate::value::Value> {
    match params {
        None | Some(Json::Null) => vec![],
        Some(Json::Array(items)) => items.iter().map(from_json).collect(),
        Some(other) => vec![from_json(&other)],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fold_params_object_becomes_single_argument() {
        let params = serde_json::json!({"a": 1, "b": 2});
        let args = fold_params(Some(params));
        assert_eq!(args.len(), 1);
        assert_eq!(args[0].type_name(), "object");
    }

    #[test]
    fn fold_params_array_becomes_positional_list() {
        let params = serde_json::json!([1, 2, 3]);
        let args = fold_params(Some(params));
        assert_eq!(args.len(), 3);
    }

    #[test]
    fn fold_params_absent_is_empty() {
        assert!(fold_params(None).is_empty());
    }
}
