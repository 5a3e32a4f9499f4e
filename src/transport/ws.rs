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

//! WebSocket P2P adapter.
//!
//! Each accepted connection becomes a peer registered with the router. A
//! reader loop decodes envelopes and reacts by kind; a separate writer task
//! drains an outbound channel so a slow socket write never blocks message
//! handling. A ticker pings the peer every 30s and the router separately
//! treats 60s of silence as unhealthy.

use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as Json};
use tokio::sync::mpsc;

use crate::actor::router::{PeerHandle, RouteRequest, RouteResponse, RouterHandle};
use crate::transport::value_json::{from_json, to_json};

const PING_INTERVAL: Duration = Duration::from_secs(30);
const OUTBOUND_CAPACITY: usize = 100;
const DEFAULT_ROUTE_TTL: u32 = 8;

/// The wire envelope every P2P message shares.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub data: Json,
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u32>,
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Drives one accepted `/ws/p2p?node_id=` connection to completion.
pub async fn handle_socket(socket: WebSocket, node_id: String, router: RouterHandle) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (out_tx, mut out_rx) = mpsc::channel::<Json>(OUTBOUND_CAPACITY);

    let peer = PeerHandle {
        node_id: node_id.clone(),
        outbound: out_tx.clone(),
        last_seen: Arc::new(Mutex::new(Instant::now())),
        healthy: Arc::new(AtomicBool::new(true)),
    };
    router.register_peer(peer.clone()).await;
    tracing::info!(node_id = %node_id, "peer connected");

    let writer = tokio::spawn(async move {
        while let Some(envelope) = out_rx.recv().await {
            if ws_tx.send(Message::Text(envelope.to_string())).await.is_err() {
                break;
            }
        }
    });

    let ping_tx = out_tx.clone();
    let ping_node = node_id.clone();
    let pinger = tokio::spawn(async move {
        let mut tick = tokio::time::interval(PING_INTERVAL);
        loop {
            tick.tick().await;
            let ping = serde_json::to_value(Envelope {
                kind: "ping".to_string(),
                id: uuid::Uuid::new_v4().to_string(),
                from: ping_node.clone(),
                to: String::new(),
                data: Json::Null,
                timestamp: now_ms(),
                reply_to: None,
                route: None,
                ttl: None,
            })
            .expect("Envelope always serializes");
            if ping_tx.send(ping).await.is_err() {
                break;
            }
        }
    });

    while let Some(msg) = ws_rx.next().await {
        let msg = match msg {
            Ok(m) => m,
            Err(_) => break,
        };
        match msg {
            Message::Text(text) => {
                peer.touch();
                match serde_json::from_str::<Envelope>(&text) {
                    Ok(env) => handle_envelope(env, &node_id, &router, &out_tx).await,
                    Err(err) => tracing::debug!(node_id = %node_id, error = %err, "ignoring malformed envelope"),
                }
            }
            Message::Close(_) => break,
            Message::Ping(_) | Message::Pong(_) | Message::Binary(_) => peer.touch(),
        }
    }

    pinger.abort();
    writer.abort();
    router.remove_peer(node_id.clone()).await;
    tracing::info!(node_id = %node_id, "peer disconnected");
}

async fn handle_envelope(env: Envelope, node_id: &str, router: &RouterHandle, out_tx: &mpsc::Sender<Json>) {
    match env.kind.as_str() {
        "ping" => {
            let pong = Envelope {
                kind: "pong".to_string(),
                id: uuid::Uuid::new_v4().to_string(),
                from: node_id.to_string(),
                to: env.from.clone(),
                data: Json::Null,
                timestamp: env.timestamp,
                reply_to: Some(env.id.clone()),
                route: None,
                ttl: None,
            };
            let _ = out_tx.send(serde_json::to_value(pong).expect("Envelope always serializes")).await;
        }

        "pong" => {
            // Liveness is tracked via `peer.touch()` on every inbound frame;
            // nothing further to do for a pong specifically.
        }

        "server_call" => {
            let Some(call) = env.data.get("call") else {
                tracing::debug!(id = %env.id, "server_call missing data.call");
                return;
            };
            let server_name = call.get("server_name").and_then(Json::as_str).unwrap_or_default().to_string();
            let method = call.get("method").and_then(Json::as_str).unwrap_or_default().to_string();
            let args = match call.get("args") {
                Some(Json::Array(items)) => items.iter().map(from_json).collect(),
                _ => vec![],
            };

            let req = RouteRequest {
                id: env.id.clone(),
                from: env.from.clone(),
                node_id: String::new(),
                server_name,
                method,
                args,
                timeout: Duration::from_secs(0),
            };
            let resp = router.route(req).await;

            let reply = Envelope {
                kind: "server_response".to_string(),
                id: uuid::Uuid::new_v4().to_string(),
                from: node_id.to_string(),
                to: env.from.clone(),
                data: json!({
                    "success": resp.success,
                    "result": to_json(&resp.result),
                    "error": resp.error,
                }),
                timestamp: now_ms(),
                reply_to: Some(env.id.clone()),
                route: None,
                ttl: None,
            };
            let _ = out_tx.send(serde_json::to_value(reply).expect("Envelope always serializes")).await;
        }

        "server_response" => {
            let correlation_id = env.reply_to.clone().unwrap_or_else(|| env.id.clone());
            let success = env.data.get("success").and_then(Json::as_bool).unwrap_or(false);
            let result = env.data.get("result").map(from_json).unwrap_or(crate::value::Value::Nil);
            let error = env.data.get("error").and_then(Json::as_str).map(str::to_string);
            router.deliver_response(RouteResponse { id: correlation_id, success, result, error });
        }

        "route_message" => {
            let ttl = env.ttl.unwrap_or(DEFAULT_ROUTE_TTL);
            if ttl == 0 {
                tracing::debug!(id = %env.id, "route_message ttl expired");
                return;
            }
            let mut route = env.route.clone().unwrap_or_default();
            if route.iter().any(|hop| hop == node_id) {
                tracing::debug!(id = %env.id, "route_message loop detected");
                return;
            }
            route.push(node_id.to_string());

            if env.to == node_id {
                if let Some(inner) = env.data.get("message").cloned() {
                    if let Ok(inner_env) = serde_json::from_value::<Envelope>(inner) {
                        Box::pin(handle_envelope(inner_env, node_id, router, out_tx)).await;
                    }
                }
                return;
            }

            let next_hop = router.peers.lock().unwrap().get(&env.to).cloned();
            match next_hop {
                Some(peer) => {
                    let mut forwarded = env.clone();
                    forwarded.route = Some(route);
                    forwarded.ttl = Some(ttl - 1);
                    let _ = peer
                        .outbound
                        .send(serde_json::to_value(forwarded).expect("Envelope always serializes"))
                        .await;
                }
                None => tracing::debug!(to = %env.to, "route_message target peer not connected"),
            }
        }

        other => tracing::debug!(kind = %other, "unknown envelope type, ignoring"),
    }
}
