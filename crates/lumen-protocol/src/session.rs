//! Command/response correlation and event fan-out over one transport.
//!
//! A [`Session`] spawns a single I/O task that owns the transport. Callers
//! send commands through an outbound queue (preserving issuance order) and
//! suspend on a oneshot until the response bearing their id arrives or the
//! per-command timeout fires. Incoming frames without an id are events,
//! dispatched to every subscriber registered for that method name, in
//! registration order.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use crate::error::ProtocolError;
use crate::transport::{Transport, WsTransport};

/// Outcome of one command: the result payload or the remote error.
type CommandOutcome = Result<Value, RemoteError>;

#[derive(Debug, Clone)]
struct RemoteError {
    code: i64,
    message: String,
}

/// An event subscriber. Errors are logged by the I/O task and never
/// propagate to the read loop; a failing handler does not disturb other
/// subscribers.
pub type EventHandler = Arc<dyn Fn(&Value) -> anyhow::Result<()> + Send + Sync>;

/// A command frame on the wire.
#[derive(serde::Serialize)]
struct Command<'a> {
    id: u64,
    method: &'a str,
    params: &'a Value,
}

enum Outbound {
    Frame(String),
    Shutdown,
}

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<CommandOutcome>>>>;
type SubscriberMap = Arc<Mutex<HashMap<String, Vec<EventHandler>>>>;

/// A live connection to one remote browser session.
pub struct Session {
    next_id: AtomicU64,
    pending: PendingMap,
    subscribers: SubscriberMap,
    outbound: mpsc::UnboundedSender<Outbound>,
    io_handle: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl Session {
    /// Connect to a DevTools WebSocket endpoint.
    pub async fn connect(endpoint: &str) -> Result<Self, ProtocolError> {
        let transport = WsTransport::connect(endpoint).await?;
        Ok(Self::with_transport(transport))
    }

    /// Build a session over an already-established transport. This is the
    /// seam the test harness uses.
    pub fn with_transport(transport: impl Transport) -> Self {
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let subscribers: SubscriberMap = Arc::new(Mutex::new(HashMap::new()));
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        let io_handle = tokio::spawn(io_loop(
            Box::new(transport),
            outbound_rx,
            Arc::clone(&pending),
            Arc::clone(&subscribers),
        ));

        Self {
            next_id: AtomicU64::new(1),
            pending,
            subscribers,
            outbound: outbound_tx,
            io_handle: Mutex::new(Some(io_handle)),
        }
    }

    /// Send a command and wait for its response.
    ///
    /// A fresh id is allocated and a pending entry registered before the
    /// frame is queued, so a fast response can never race past its waiter.
    /// If the timeout elapses first the entry is discarded and the call
    /// fails with [`ProtocolError::CommandTimeout`]; a response arriving
    /// afterwards is dropped by the read loop with a debug log.
    pub async fn send(
        &self,
        method: &str,
        params: Value,
        timeout: Duration,
    ) -> Result<Value, ProtocolError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);

        let frame = serde_json::to_string(&Command {
            id,
            method,
            params: &params,
        })
        .map_err(|e| ProtocolError::Malformed {
            detail: format!("failed to serialize command: {e}"),
        })?;

        tracing::debug!(id, method, "sending command");

        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock().expect("pending map lock poisoned");
            pending.insert(id, tx);
        }

        if self.outbound.send(Outbound::Frame(frame)).is_err() {
            // I/O task already gone.
            self.forget_pending(id);
            return Err(ProtocolError::ConnectionClosed);
        }

        match tokio::time::timeout(timeout, rx).await {
            Err(_) => {
                self.forget_pending(id);
                Err(ProtocolError::CommandTimeout {
                    method: method.to_string(),
                    duration: timeout,
                })
            }
            // Sender dropped: the I/O task drained pending on close.
            Ok(Err(_)) => Err(ProtocolError::ConnectionClosed),
            Ok(Ok(Err(remote))) => Err(ProtocolError::Remote {
                code: remote.code,
                message: remote.message,
            }),
            Ok(Ok(Ok(result))) => Ok(result),
        }
    }

    /// Register a subscriber for an event name. Every subscriber for a name
    /// is invoked, in registration order, on each matching event.
    pub fn on(&self, event: &str, handler: EventHandler) {
        let mut subscribers = self.subscribers.lock().expect("subscriber lock poisoned");
        subscribers.entry(event.to_string()).or_default().push(handler);
    }

    /// Register a one-shot waiter for the next occurrence of an event.
    ///
    /// Registration happens immediately, so callers can arm the waiter
    /// before issuing the command that will trigger the event, then await
    /// the returned receiver afterwards.
    pub fn event_waiter(&self, event: &str) -> oneshot::Receiver<Value> {
        let (tx, rx) = oneshot::channel();
        let slot = Mutex::new(Some(tx));
        self.on(
            event,
            Arc::new(move |params: &Value| {
                if let Some(tx) = slot.lock().expect("event waiter lock poisoned").take() {
                    let _ = tx.send(params.clone());
                }
                Ok(())
            }),
        );
        rx
    }

    /// Wait for the next occurrence of an event, with a maximum wait.
    /// Returns the event's parameter bag.
    pub async fn wait_for_event(
        &self,
        event: &str,
        timeout: Duration,
    ) -> Result<Value, ProtocolError> {
        let rx = self.event_waiter(event);
        match tokio::time::timeout(timeout, rx).await {
            Err(_) => Err(ProtocolError::EventTimeout {
                event: event.to_string(),
                duration: timeout,
            }),
            Ok(Err(_)) => Err(ProtocolError::ConnectionClosed),
            Ok(Ok(params)) => Ok(params),
        }
    }

    /// Close the channel. Every pending command fails with
    /// [`ProtocolError::ConnectionClosed`] and all subscriptions are
    /// cleared.
    pub async fn disconnect(&self) {
        let _ = self.outbound.send(Outbound::Shutdown);
        let handle = {
            let mut guard = self.io_handle.lock().expect("io handle lock poisoned");
            guard.take()
        };
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    fn forget_pending(&self, id: u64) {
        let mut pending = self.pending.lock().expect("pending map lock poisoned");
        pending.remove(&id);
    }
}

/// The single task that owns the transport: writes queued frames in
/// issuance order, classifies incoming frames, and cleans up on close.
async fn io_loop(
    mut transport: Box<dyn Transport>,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
    pending: PendingMap,
    subscribers: SubscriberMap,
) {
    loop {
        tokio::select! {
            out = outbound.recv() => match out {
                Some(Outbound::Frame(frame)) => {
                    if let Err(e) = transport.send(&frame).await {
                        tracing::warn!(error = %e, "transport write failed, closing session");
                        break;
                    }
                }
                Some(Outbound::Shutdown) | None => break,
            },
            frame = transport.recv() => match frame {
                Some(text) => dispatch(&text, &pending, &subscribers),
                None => break,
            },
        }
    }

    transport.close().await;

    // Fail everything still in flight and drop all subscriptions.
    {
        let mut pending = pending.lock().expect("pending map lock poisoned");
        let drained = pending.len();
        pending.clear();
        if drained > 0 {
            tracing::info!(count = drained, "failed pending commands on close");
        }
    }
    subscribers
        .lock()
        .expect("subscriber lock poisoned")
        .clear();
}

/// Classify one incoming frame: a response (has `id`), an event (has
/// `method`), or malformed (dropped with a log, never a crash).
fn dispatch(text: &str, pending: &PendingMap, subscribers: &SubscriberMap) {
    let json: Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %e, "dropping unparseable frame");
            return;
        }
    };

    if let Some(id) = json.get("id").and_then(Value::as_u64) {
        let waiter = {
            let mut pending = pending.lock().expect("pending map lock poisoned");
            pending.remove(&id)
        };
        match waiter {
            Some(tx) => {
                let outcome = match json.get("error") {
                    Some(err) => Err(RemoteError {
                        code: err.get("code").and_then(Value::as_i64).unwrap_or(-1),
                        message: err
                            .get("message")
                            .and_then(Value::as_str)
                            .unwrap_or("unknown remote error")
                            .to_string(),
                    }),
                    None => Ok(json.get("result").cloned().unwrap_or(Value::Null)),
                };
                let _ = tx.send(outcome);
            }
            // Timed out or never ours: drop silently.
            None => tracing::debug!(id, "dropping response for unknown command id"),
        }
    } else if let Some(method) = json.get("method").and_then(Value::as_str) {
        let params = json.get("params").cloned().unwrap_or(Value::Null);
        // Clone the handler list out so a handler can register further
        // subscriptions without deadlocking.
        let handlers: Vec<EventHandler> = {
            let subscribers = subscribers.lock().expect("subscriber lock poisoned");
            subscribers.get(method).cloned().unwrap_or_default()
        };
        for handler in handlers {
            if let Err(e) = handler(&params) {
                tracing::warn!(event = method, error = %e, "event handler failed");
            }
        }
    } else {
        tracing::warn!("dropping frame with neither id nor method");
    }
}
