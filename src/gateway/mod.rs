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

//! The HTTP gateway: `/rpc`, `/ws/p2p`, `/health`, `/info`,
//! `/registry`, `/registry/servers`, `/registry/peers`, wrapped in
//! CORS (outermost, if enabled) -> request logging -> custom headers
//! (innermost). The gateway never bypasses the router — every call,
//! local or remote, goes through it.

pub mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Query, State};
use axum::http::{HeaderName, HeaderValue, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::actor::router::RouterHandle;
use crate::transport::{jsonrpc, ws};
use config::GatewayConfig;

#[derive(Clone)]
pub struct GatewayState {
    pub router: RouterHandle,
    pub config: Arc<GatewayConfig>,
}

pub fn build_router(state: GatewayState) -> Router {
    let mut app = Router::new()
        .route("/rpc", any(rpc_handler))
        .route("/ws/p2p", get(ws_handler))
        .route("/health", get(health_handler))
        .route("/info", get(info_handler))
        .route("/registry", get(registry_handler))
        .route("/registry/servers", get(registry_servers_handler))
        .route("/registry/peers", get(registry_peers_handler))
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(state.clone(), custom_headers_mw))
        .layer(TraceLayer::new_for_http());

    if state.config.enable_cors {
        app = app.layer(middleware::from_fn(cors_mw));
    }
    app
}

/// Binds and serves until a ctrl-c/SIGTERM shutdown signal arrives. The
/// 30s graceful-shutdown deadline is the caller binary's
/// responsibility to enforce (e.g. `tokio::time::timeout` around this
/// future) since `axum::serve` itself waits unboundedly for connections
/// to drain once told to stop accepting new ones.
pub async fn serve(config: GatewayConfig, router: RouterHandle) -> std::io::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .expect("GatewayConfig::host/port must form a valid socket address");
    let node_id = config.node_id.clone();
    let state = GatewayState { router, config: Arc::new(config) };
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, node_id = %node_id, "gateway listening");
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received, draining connections");
}

async fn custom_headers_mw(State(state): State<GatewayState>, req: axum::extract::Request, next: Next) -> Response {
    let mut res = next.run(req).await;
    for (key, value) in state.config.custom_headers.iter() {
        if let (Ok(name), Ok(value)) = (HeaderName::from_bytes(key.as_bytes()), HeaderValue::from_str(value)) {
            res.headers_mut().insert(name, value);
        }
    }
    res
}

async fn cors_mw(req: axum::extract::Request, next: Next) -> Response {
    if req.method() == Method::OPTIONS {
        let mut res = StatusCode::OK.into_response();
        apply_cors_headers(&mut res);
        return res;
    }
    let mut res = next.run(req).await;
    apply_cors_headers(&mut res);
    res
}

fn apply_cors_headers(res: &mut Response) {
    let headers = res.headers_mut();
    headers.insert("access-control-allow-origin", HeaderValue::from_static("*"));
    headers.insert("access-control-allow-methods", HeaderValue::from_static("GET,POST,PUT,DELETE,OPTIONS"));
    headers.insert("access-control-allow-headers", HeaderValue::from_static("Content-Type, Authorization"));
}

async fn rpc_handler(State(state): State<GatewayState>, method: Method, body: String) -> Json<jsonrpc::JsonRpcResponse> {
    if method != Method::POST {
        return Json(jsonrpc::JsonRpcResponse {
            jsonrpc: "2.0",
            result: None,
            error: Some(jsonrpc::JsonRpcError {
                code: jsonrpc::INVALID_REQUEST,
                message: "Invalid request".to_string(),
                data: Some(json!("only POST is accepted")),
            }),
            id: serde_json::Value::Null,
        });
    }

    let from = state.config.node_id.clone();
    let resp = jsonrpc::handle(&body, &state.router, &from, || uuid::Uuid::new_v4().to_string()).await;
    Json(resp)
}

#[derive(Deserialize)]
struct WsQuery {
    node_id: Option<String>,
}

async fn ws_handler(State(state): State<GatewayState>, Query(q): Query<WsQuery>, upgrade: WebSocketUpgrade) -> Response {
    let Some(node_id) = q.node_id.filter(|id| !id.is_empty()) else {
        return (StatusCode::BAD_REQUEST, "missing required query parameter 'node_id'").into_response();
    };
    let router = state.router.clone();
    upgrade.on_upgrade(move |socket| ws::handle_socket(socket, node_id, router))
}

async fn health_handler(State(state): State<GatewayState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "node_id": state.config.node_id,
        "servers": state.router.registry.snapshot_names(),
    }))
}

async fn info_handler(State(state): State<GatewayState>) -> Json<serde_json::Value> {
    Json(json!({
        "name": "relay-gateway",
        "version": env!("CARGO_PKG_VERSION"),
        "node_id": state.config.node_id,
    }))
}

async fn registry_handler(State(state): State<GatewayState>) -> Json<serde_json::Value> {
    Json(json!({
        "servers": state.router.registry.snapshot_names(),
        "peers": peers_json(&state),
    }))
}

async fn registry_servers_handler(State(state): State<GatewayState>) -> Json<serde_json::Value> {
    Json(json!({ "servers": state.router.registry.snapshot_names() }))
}

async fn registry_peers_handler(State(state): State<GatewayState>) -> Json<serde_json::Value> {
    Json(json!({ "peers": peers_json(&state) }))
}

fn peers_json(state: &GatewayState) -> serde_json::Value {
    json!(state
        .router
        .snapshot_peers()
        .into_iter()
        .map(|(node_id, healthy)| json!({ "node_id": node_id, "healthy": healthy }))
        .collect::<Vec<_>>())
}
