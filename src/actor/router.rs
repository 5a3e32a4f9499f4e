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

//! The unified message router.
//!
//! The router is itself an actor: one inbound channel for route requests,
//! one for registrations. Local dispatch calls straight into the target
//! actor's `send_sync`; remote dispatch correlates a request id against a
//! peer's outbound connection and waits on a pending-response map. Every
//! route request is handled on its own spawned task so a slow remote peer
//! never blocks the router's own recv loop.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde_json::json;
use tokio::sync::{mpsc, oneshot};

use crate::actor::server::{self, MailboxSender};
use crate::error::RelayError;
use crate::value::{ServerHandle, Value};

const DIRECT_PEER_FORWARD_TIMEOUT: Duration = Duration::from_secs(2);
const DEFAULT_REMOTE_TIMEOUT: Duration = Duration::from_secs(30);
const ROUTE_CHANNEL_CAPACITY: usize = 1000;
const REGISTRATION_CHANNEL_CAPACITY: usize = 100;
const PEER_UNHEALTHY_AFTER: Duration = Duration::from_secs(60);

/// A transport-agnostic invocation request.
#[derive(Debug, Clone)]
pub struct RouteRequest {
    pub id: String,
    pub from: String,
    /// Empty or `"local"` for local dispatch; otherwise a target peer's node id.
    pub node_id: String,
    pub server_name: String,
    pub method: String,
    pub args: Vec<Value>,
    pub timeout: Duration,
}

impl RouteRequest {
    pub fn is_local(&self) -> bool {
        self.node_id.is_empty() || self.node_id == "local"
    }
}

/// The router's uniform reply shape.
#[derive(Debug, Clone)]
pub struct RouteResponse {
    pub id: String,
    pub success: bool,
    pub result: Value,
    pub error: Option<String>,
}

impl RouteResponse {
    fn ok(id: String, result: Value) -> Self {
        RouteResponse { id, success: true, result, error: None }
    }

    fn err(id: String, error: impl Into<String>) -> Self {
        RouteResponse { id, success: false, result: Value::Nil, error: Some(error.into()) }
    }
}

#[derive(Clone)]
struct RegisteredServer {
    handle: ServerHandle,
    running: Arc<AtomicBool>,
}

/// The local server name -> handle mapping the evaluator consults directly
/// and the router dispatches through; shared between the two so a single
/// `server` declaration registers once and is visible from both places.
#[derive(Clone, Default)]
pub struct ServerRegistry(Arc<Mutex<HashMap<String, RegisteredServer>>>);

impl ServerRegistry {
    pub fn new() -> Self {
        ServerRegistry::default()
    }

    /// Registers `name`, replacing and stopping any prior actor under the
    /// same name.
    fn register(&self, name: String, handle: ServerHandle, running: Arc<AtomicBool>) {
        let prev = self
            .0
            .lock()
            .unwrap()
            .insert(name.clone(), RegisteredServer { handle, running });
        if let Some(prev) = prev {
            server::stop(&prev.running);
            tracing::info!(server = %name, "re-registration replaced and stopped the previous actor");
        }
    }

    pub fn get_mailbox(&self, name: &str) -> Option<(MailboxSender, Arc<AtomicBool>)> {
        self.0
            .lock()
            .unwrap()
            .get(name)
            .map(|r| (r.handle.mailbox.clone(), r.running.clone()))
    }

    pub fn lookup(&self, name: &str) -> Option<ServerHandle> {
        self.0.lock().unwrap().get(name).map(|r| r.handle.clone())
    }

    /// A read-only snapshot for registry views.
    pub fn snapshot_names(&self) -> Vec<String> {
        self.0.lock().unwrap().keys().cloned().collect()
    }
}

/// An outbound connection to a peer node. The envelope payload is kept as
/// `serde_json::Value` here (rather than a WebSocket-specific type) so the
/// router stays agnostic of any one transport's framing; `transport::ws`
/// is responsible for serializing it onto the wire.
#[derive(Clone)]
pub struct PeerHandle {
    pub node_id: String,
    pub outbound: mpsc::Sender<serde_json::Value>,
    pub last_seen: Arc<Mutex<Instant>>,
    pub healthy: Arc<AtomicBool>,
}

impl PeerHandle {
    pub fn touch(&self) {
        *self.last_seen.lock().unwrap() = Instant::now();
        self.healthy.store(true, Ordering::SeqCst);
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::SeqCst)
            && self.last_seen.lock().unwrap().elapsed() < PEER_UNHEALTHY_AFTER
    }
}

enum RegistrationCmd {
    RegisterServer(String, ServerHandle, Arc<AtomicBool>),
    RegisterPeer(PeerHandle),
    RemovePeer(String),
}

/// A cheaply-cloneable front for the router actor.
#[derive(Clone)]
pub struct RouterHandle {
    pub registry: ServerRegistry,
    pub peers: Arc<Mutex<HashMap<String, PeerHandle>>>,
    pending: Arc<Mutex<HashMap<String, oneshot::Sender<RouteResponse>>>>,
    route_tx: mpsc::Sender<(RouteRequest, oneshot::Sender<RouteResponse>)>,
    reg_tx: mpsc::Sender<RegistrationCmd>,
}

impl RouterHandle {
    pub async fn route(&self, req: RouteRequest) -> RouteResponse {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.route_tx.send((req.clone(), reply_tx)).await.is_err() {
            return RouteResponse::err(req.id, "router is not running");
        }
        reply_rx
            .await
            .unwrap_or_else(|_| RouteResponse::err(req.id, "router dropped the request"))
    }

    pub async fn register_server(&self, name: String, handle: ServerHandle, running: Arc<AtomicBool>) {
        let _ = self
            .reg_tx
            .send(RegistrationCmd::RegisterServer(name, handle, running))
            .await;
    }

    pub async fn register_peer(&self, peer: PeerHandle) {
        let _ = self.reg_tx.send(RegistrationCmd::RegisterPeer(peer)).await;
    }

    pub async fn remove_peer(&self, node_id: String) {
        let _ = self.reg_tx.send(RegistrationCmd::RemovePeer(node_id)).await;
    }

    /// Delivers a `server_response` envelope's decoded `RouteResponse` to
    /// whoever is awaiting that correlation id.
    pub fn deliver_response(&self, resp: RouteResponse) {
        if let Some(tx) = self.pending.lock().unwrap().remove(&resp.id) {
            let _ = tx.send(resp);
        }
    }

    pub fn snapshot_peers(&self) -> Vec<(String, bool)> {
        self.peers
            .lock()
            .unwrap()
            .values()
            .map(|p| (p.node_id.clone(), p.is_healthy()))
            .collect()
    }
}

/// The router actor. `start` consumes `self`, so the type system — not a
/// runtime flag — enforces "must refuse to start twice".
pub struct Router {
    registry: ServerRegistry,
    peers: Arc<Mutex<HashMap<String, PeerHandle>>>,
    pending: Arc<Mutex<HashMap<String, oneshot::Sender<RouteResponse>>>>,
    route_rx: mpsc::Receiver<(RouteRequest, oneshot::Sender<RouteResponse>)>,
    reg_rx: mpsc::Receiver<RegistrationCmd>,
    route_tx: mpsc::Sender<(RouteRequest, oneshot::Sender<RouteResponse>)>,
    reg_tx: mpsc::Sender<RegistrationCmd>,
}

impl Router {
    pub fn new(registry: ServerRegistry) -> Self {
        let (route_tx, route_rx) = mpsc::channel(ROUTE_CHANNEL_CAPACITY);
        let (reg_tx, reg_rx) = mpsc::channel(REGISTRATION_CHANNEL_CAPACITY);
        Router {
            registry,
            peers: Arc::new(Mutex::new(HashMap::new())),
            pending: Arc::new(Mutex::new(HashMap::new())),
            route_rx,
            reg_rx,
            route_tx,
            reg_tx,
        }
    }

    pub fn handle(&self) -> RouterHandle {
        RouterHandle {
            registry: self.registry.clone(),
            peers: self.peers.clone(),
            pending: self.pending.clone(),
            route_tx: self.route_tx.clone(),
            reg_tx: self.reg_tx.clone(),
        }
    }

    /// Spawns the router's recv loop and returns a handle to it. Consuming
    /// `self` is what prevents a second `start()` on the same router.
    pub fn start(mut self) -> RouterHandle {
        let handle = self.handle();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    cmd = self.reg_rx.recv() => {
                        match cmd {
                            Some(cmd) => self.handle_registration(cmd),
                            None => break,
                        }
                    }
                    req = self.route_rx.recv() => {
                        match req {
                            Some((req, reply)) => {
                                let registry = self.registry.clone();
                                let peers = self.peers.clone();
                                let pending = self.pending.clone();
                                tokio::spawn(async move {
                                    let resp = dispatch(registry, peers, pending, req).await;
                                    let _ = reply.send(resp);
                                });
                            }
                            None => break,
                        }
                    }
                }
            }
            tracing::info!("router drained its inbound channels, stopping");
        });
        handle
    }

    fn handle_registration(&mut self, cmd: RegistrationCmd) {
        match cmd {
            RegistrationCmd::RegisterServer(name, handle, running) => {
                self.registry.register(name, handle, running);
            }
            RegistrationCmd::RegisterPeer(peer) => {
                self.peers.lock().unwrap().insert(peer.node_id.clone(), peer);
            }
            RegistrationCmd::RemovePeer(node_id) => {
                self.peers.lock().unwrap().remove(&node_id);
            }
        }
    }
}

async fn dispatch(
    registry: ServerRegistry,
    peers: Arc<Mutex<HashMap<String, PeerHandle>>>,
    pending: Arc<Mutex<HashMap<String, oneshot::Sender<RouteResponse>>>>,
    req: RouteRequest,
) -> RouteResponse {
    if req.is_local() {
        return dispatch_local(&registry, req).await;
    }
    dispatch_remote(peers, pending, req).await
}

async fn dispatch_local(registry: &ServerRegistry, req: RouteRequest) -> RouteResponse {
    match registry.get_mailbox(&req.server_name) {
        None => RouteResponse::err(req.id, "server not found"),
        Some((mailbox, running)) => {
            let id = req.id.clone();
            let result = server::send_sync(&req.server_name, &running, &mailbox, req.method, req.args).await;
            match result {
                Ok(v) => RouteResponse::ok(id, v),
                Err(e) => RouteResponse::err(id, e.to_string()),
            }
        }
    }
}

async fn dispatch_remote(
    peers: Arc<Mutex<HashMap<String, PeerHandle>>>,
    pending: Arc<Mutex<HashMap<String, oneshot::Sender<RouteResponse>>>>,
    req: RouteRequest,
) -> RouteResponse {
    let peer = peers.lock().unwrap().get(&req.node_id).cloned();
    let peer = match peer {
        Some(p) => p,
        None => {
            return RouteResponse::err(
                req.id,
                format!("peer '{}' not found or not connected", req.node_id),
            )
        }
    };

    let (tx, rx) = oneshot::channel();
    pending.lock().unwrap().insert(req.id.clone(), tx);

    let envelope = json!({
        "type": "server_call",
        "id": req.id,
        "from": req.from,
        "to": req.node_id,
        "data": {
            "call": {
                "server_name": req.server_name,
                "method": req.method,
                "args": req.args.iter().map(crate::transport::value_json::to_json).collect::<Vec<_>>(),
            }
        },
    });

    let enqueue = tokio::time::timeout(DIRECT_PEER_FORWARD_TIMEOUT, peer.outbound.send(envelope)).await;
    if !matches!(enqueue, Ok(Ok(()))) {
        pending.lock().unwrap().remove(&req.id);
        return RouteResponse::err(
            req.id,
            format!("peer '{}' not found or not connected", req.node_id),
        );
    }

    let overall_timeout = if req.timeout.is_zero() { DEFAULT_REMOTE_TIMEOUT } else { req.timeout };
    match tokio::time::timeout(overall_timeout, rx).await {
        Ok(Ok(resp)) => resp,
        _ => {
            pending.lock().unwrap().remove(&req.id);
            RouteResponse::err(req.id, "timed out waiting for peer reply")
        }
    }
}
