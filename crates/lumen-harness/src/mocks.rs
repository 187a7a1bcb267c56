//! Scripted transport standing in for a live browser session.
//!
//! The transport auto-answers every command with an empty result unless
//! told otherwise: specific methods can return canned results, error
//! payloads, or nothing at all (for timeout tests), and each method can
//! trigger a scripted burst of events right after its response. The
//! [`MockBrowser`] handle stays with the test to inspect sent commands and
//! inject frames at any time.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use lumen_protocol::{ProtocolError, Transport};

/// Sentinel frame that makes the transport report a remote hang-up.
const HANG_UP_FRAME: &str = "\u{0}hang-up";

#[derive(Debug, Default)]
struct Inner {
    /// Every command frame the session sent, in order.
    sent: Vec<Value>,
    /// Methods that never get a response.
    unanswered: HashSet<String>,
    /// Method -> canned result payload. Everything else gets `{}`.
    results: HashMap<String, Value>,
    /// Method -> error payload `(code, message)`.
    errors: HashMap<String, (i64, String)>,
    /// Method -> events emitted right after its response.
    events_after: HashMap<String, Vec<(String, Value)>>,
}

/// Builder for the scripted transport.
///
/// # Example
///
/// ```
/// use lumen_harness::MockBrowserBuilder;
///
/// let (_transport, browser) = MockBrowserBuilder::new()
///     .with_result("Page.navigate", serde_json::json!({"frameId": "F"}))
///     .with_unanswered("Page.getAppManifest")
///     .build();
///
/// assert!(browser.sent_commands().is_empty());
/// ```
#[derive(Debug, Default)]
pub struct MockBrowserBuilder {
    inner: Inner,
}

impl MockBrowserBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Canned result for a method.
    #[must_use]
    pub fn with_result(mut self, method: &str, result: Value) -> Self {
        self.inner.results.insert(method.to_string(), result);
        self
    }

    /// Error payload for a method.
    #[must_use]
    pub fn with_error(mut self, method: &str, code: i64, message: &str) -> Self {
        self.inner
            .errors
            .insert(method.to_string(), (code, message.to_string()));
        self
    }

    /// A method that never receives a response.
    #[must_use]
    pub fn with_unanswered(mut self, method: &str) -> Self {
        self.inner.unanswered.insert(method.to_string());
        self
    }

    /// Events emitted immediately after a method's response.
    #[must_use]
    pub fn with_event_after(mut self, method: &str, event: &str, params: Value) -> Self {
        self.inner
            .events_after
            .entry(method.to_string())
            .or_default()
            .push((event.to_string(), params));
        self
    }

    pub fn build(self) -> (MockTransport, MockBrowser) {
        let inner = Arc::new(Mutex::new(self.inner));
        let (tx, rx) = mpsc::unbounded_channel();
        let transport = MockTransport {
            inner: Arc::clone(&inner),
            tx: tx.clone(),
            rx,
        };
        let browser = MockBrowser { inner, tx };
        (transport, browser)
    }
}

/// The transport half, handed to `Session::with_transport`.
pub struct MockTransport {
    inner: Arc<Mutex<Inner>>,
    tx: mpsc::UnboundedSender<String>,
    rx: mpsc::UnboundedReceiver<String>,
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, text: &str) -> Result<(), ProtocolError> {
        let frame: Value = serde_json::from_str(text).map_err(|e| ProtocolError::Malformed {
            detail: format!("mock received unparseable frame: {e}"),
        })?;

        let (response, events) = {
            let mut inner = self.inner.lock().expect("mock browser lock poisoned");
            inner.sent.push(frame.clone());

            let method = frame
                .get("method")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let id = frame.get("id").and_then(Value::as_u64);

            if inner.unanswered.contains(&method) {
                (None, Vec::new())
            } else {
                let response = id.map(|id| match inner.errors.get(&method) {
                    Some((code, message)) => serde_json::json!({
                        "id": id,
                        "error": { "code": code, "message": message },
                    }),
                    None => serde_json::json!({
                        "id": id,
                        "result": inner.results.get(&method).cloned()
                            .unwrap_or_else(|| serde_json::json!({})),
                    }),
                });
                let events = inner.events_after.get(&method).cloned().unwrap_or_default();
                (response, events)
            }
        };

        if let Some(response) = response {
            let _ = self.tx.send(response.to_string());
        }
        for (event, params) in events {
            let frame = serde_json::json!({ "method": event, "params": params });
            let _ = self.tx.send(frame.to_string());
        }
        Ok(())
    }

    async fn recv(&mut self) -> Option<String> {
        match self.rx.recv().await {
            Some(frame) if frame == HANG_UP_FRAME => None,
            other => other,
        }
    }

    async fn close(&mut self) {
        self.rx.close();
    }
}

/// The test-side handle: inspects traffic and injects frames.
#[derive(Clone)]
pub struct MockBrowser {
    inner: Arc<Mutex<Inner>>,
    tx: mpsc::UnboundedSender<String>,
}

impl MockBrowser {
    /// Every command frame the session has sent so far, in order.
    pub fn sent_commands(&self) -> Vec<Value> {
        self.inner
            .lock()
            .expect("mock browser lock poisoned")
            .sent
            .clone()
    }

    /// Command frames for one method.
    pub fn commands_named(&self, method: &str) -> Vec<Value> {
        self.sent_commands()
            .into_iter()
            .filter(|frame| frame.get("method").and_then(Value::as_str) == Some(method))
            .collect()
    }

    /// Emit an unsolicited event.
    pub fn emit_event(&self, method: &str, params: Value) {
        let frame = serde_json::json!({ "method": method, "params": params });
        let _ = self.tx.send(frame.to_string());
    }

    /// Send a response for a specific command id (e.g. a late response
    /// after the caller already timed out).
    pub fn respond(&self, id: u64, result: Value) {
        let frame = serde_json::json!({ "id": id, "result": result });
        let _ = self.tx.send(frame.to_string());
    }

    /// Send a raw, possibly malformed frame.
    pub fn inject_raw(&self, text: &str) {
        let _ = self.tx.send(text.to_string());
    }

    /// Simulate the remote end dropping the connection.
    pub fn hang_up(&self) {
        let _ = self.tx.send(HANG_UP_FRAME.to_string());
    }
}
