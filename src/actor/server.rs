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

//! The server actor.
//!
//! A server is a long-lived tokio task owning a private state map and a
//! bounded mailbox. Messages are processed strictly one at a time, in
//! arrival order, so a receive body never needs to lock against a sibling
//! message — only against code outside the actor that might still be
//! holding a `ServerStateHandle` past its receive body, which is a calling
//! convention violation, not something the type system stops.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};

use crate::error::RelayError;
use crate::value::{FunctionValue, ServerHandle, ServerStateHandle, Value};

pub const MAILBOX_CAPACITY: usize = 100;
const ENQUEUE_TIMEOUT: Duration = Duration::from_secs(1);
const REPLY_TIMEOUT: Duration = Duration::from_secs(5);

static NEXT_SERVER_ID: AtomicU64 = AtomicU64::new(1);

/// A mailbox message: `(method, args, optional reply channel)`.
pub struct Message {
    pub method: String,
    pub args: Vec<Value>,
    pub reply: Option<oneshot::Sender<Value>>,
}

pub type MailboxSender = mpsc::Sender<Message>;

/// Invokes a receive-method body with the `state` identifier bound to the
/// live state handle. Implemented by the evaluator so this module stays
/// decoupled from evaluation internals, the same separation the dispatcher
/// uses for higher-order array methods through `FunctionExecutor`.
pub trait ReceiveInvoker: Send + Sync {
    fn invoke(
        &self,
        f: &Arc<FunctionValue>,
        state: ServerStateHandle,
        args: Vec<Value>,
    ) -> Result<Value, RelayError>;
}

/// Builds the initial state map, spawns the actor's execution loop, and
/// returns its handle. Registration with the
/// evaluator's registry and the router happens in the caller, since both
/// are shared state this module has no opinion about.
pub fn spawn(
    name: String,
    initial_state: HashMap<String, Value>,
    receives: HashMap<String, Arc<FunctionValue>>,
    invoker: Arc<dyn ReceiveInvoker>,
) -> (ServerHandle, Arc<AtomicBool>) {
    let (tx, mut rx) = mpsc::channel::<Message>(MAILBOX_CAPACITY);
    let running = Arc::new(AtomicBool::new(true));
    let state = Arc::new(Mutex::new(initial_state));
    let id = NEXT_SERVER_ID.fetch_add(1, Ordering::Relaxed);

    let loop_name = name.clone();
    let loop_state = state.clone();
    let loop_running = running.clone();

    tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let state_handle = ServerStateHandle {
                server_name: loop_name.clone(),
                state: loop_state.clone(),
            };

            let result = match receives.get(&msg.method) {
                Some(f) => invoker.invoke(f, state_handle, msg.args),
                None => {
                    tracing::debug!(server = %loop_name, method = %msg.method, "no such receive method");
                    Ok(Value::Nil)
                }
            };

            // Errors from a receive body are contained: the actor keeps
            // running and the reply channel (if any) gets nil.
            let reply_value = match result {
                Ok(v) => v,
                Err(err) => {
                    tracing::warn!(
                        server = %loop_name,
                        method = %msg.method,
                        error = %err,
                        "receive body failed; replying nil"
                    );
                    Value::Nil
                }
            };

            if let Some(reply) = msg.reply {
                let _ = reply.send(reply_value);
            }
        }
        loop_running.store(false, Ordering::SeqCst);
        tracing::info!(server = %loop_name, "actor mailbox drained, stopping");
    });

    (
        ServerHandle {
            id,
            name,
            mailbox: tx,
        },
        running,
    )
}

/// Marks the actor stopped and drops the caller's sender half so the
/// mailbox closes once every outstanding sender (including this one) is
/// gone; messages already queued are still processed to completion.
pub fn stop(running: &Arc<AtomicBool>) {
    running.store(false, Ordering::SeqCst);
}

/// Synchronous request-reply against a running actor's mailbox:
/// 1s to enqueue, 5s to await a reply.
pub async fn send_sync(
    server_name: &str,
    running: &AtomicBool,
    mailbox: &MailboxSender,
    method: String,
    args: Vec<Value>,
) -> Result<Value, RelayError> {
    if !running.load(Ordering::SeqCst) {
        return Err(RelayError::ServerNotRunning(server_name.to_string()));
    }

    let (reply_tx, reply_rx) = oneshot::channel();
    let msg = Message {
        method,
        args,
        reply: Some(reply_tx),
    };

    tokio::time::timeout(ENQUEUE_TIMEOUT, mailbox.send(msg))
        .await
        .map_err(|_| RelayError::MailboxFull)?
        .map_err(|_| RelayError::ServerNotRunning(server_name.to_string()))?;

    tokio::time::timeout(REPLY_TIMEOUT, reply_rx)
        .await
        .map_err(|_| RelayError::ReplyTimeout)?
        .map_err(|_| RelayError::ReplyTimeout)
}

/// Asynchronous fire-and-forget send: returns as soon as the message is
/// enqueued, with no reply channel.
pub async fn send_async(
    server_name: &str,
    running: &AtomicBool,
    mailbox: &MailboxSender,
    method: String,
    args: Vec<Value>,
) -> Result<(), RelayError> {
    if !running.load(Ordering::SeqCst) {
        return Err(RelayError::ServerNotRunning(server_name.to_string()));
    }

    let msg = Message {
        method,
        args,
        reply: None,
    };

    tokio::time::timeout(ENQUEUE_TIMEOUT, mailbox.send(msg))
        .await
        .map_err(|_| RelayError::MailboxFull)?
        .map_err(|_| RelayError::ServerNotRunning(server_name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::FunctionValue;

    struct EchoInvoker;
    impl ReceiveInvoker for EchoInvoker {
        fn invoke(
            &self,
            _f: &Arc<FunctionValue>,
            state: ServerStateHandle,
            args: Vec<Value>,
        ) -> Result<Value, RelayError> {
            let mut map = state.state.lock().unwrap();
            let count = map.get("count").and_then(Value::as_number).unwrap_or(0.0);
            let next = count + 1.0;
            map.insert("count".to_string(), Value::Number(next));
            let _ = args;
            Ok(Value::Number(next))
        }
    }

    fn dummy_fn() -> Arc<FunctionValue> {
        Arc::new(FunctionValue {
            name: Some("increment".to_string()),
            params: vec![],
            body: None,
            native: None,
            captured_env: None,
        })
    }

    #[tokio::test]
    async fn fifo_delivery_and_state_isolation() {
        let mut receives = HashMap::new();
        receives.insert("increment".to_string(), dummy_fn());
        let mut initial = HashMap::new();
        initial.insert("count".to_string(), Value::Number(0.0));

        let (handle, running) = spawn("counter".to_string(), initial, receives, Arc::new(EchoInvoker));

        let a = send_sync("counter", &running, &handle.mailbox, "increment".to_string(), vec![])
            .await
            .unwrap();
        let b = send_sync("counter", &running, &handle.mailbox, "increment".to_string(), vec![])
            .await
            .unwrap();
        let c = send_sync("counter", &running, &handle.mailbox, "increment".to_string(), vec![])
            .await
            .unwrap();

        assert_eq!(a.as_number(), Some(1.0));
        assert_eq!(b.as_number(), Some(2.0));
        assert_eq!(c.as_number(), Some(3.0));
    }

    #[tokio::test]
    async fn unknown_method_replies_nil_and_keeps_running() {
        let (handle, running) = spawn(
            "empty".to_string(),
            HashMap::new(),
            HashMap::new(),
            Arc::new(EchoInvoker),
        );
        let reply = send_sync("empty", &running, &handle.mailbox, "nope".to_string(), vec![])
            .await
            .unwrap();
        assert!(matches!(reply, Value::Nil));
        assert!(running.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn stopped_server_rejects_new_sends() {
        let (handle, running) = spawn(
            "stoppable".to_string(),
            HashMap::new(),
            HashMap::new(),
            Arc::new(EchoInvoker),
        );
        stop(&running);
        let err = send_sync("stoppable", &running, &handle.mailbox, "x".to_string(), vec![])
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::ServerNotRunning(_)));
    }
}
