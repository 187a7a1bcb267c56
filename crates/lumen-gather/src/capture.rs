//! Network and trace capture during a pass.
//!
//! Recorders subscribe to the session's event stream before navigation and
//! assemble the raw capture handed to `after_pass` and published into the
//! artifact store. Event payloads arrive as untyped JSON; the fold functions
//! here are pure so they can be tested against captured payload fixtures.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;

use lumen_protocol::{ProtocolError, Session};
use lumen_types::network::url_scheme;
use lumen_types::{NetworkRecord, ResourcePriority, ResourceType, TraceCapture, TraceEvent};

const DRIVER_CALL_TIMEOUT: Duration = Duration::from_secs(10);
const TRACE_COMPLETE_TIMEOUT: Duration = Duration::from_secs(30);

/// Trace categories recorded during a pass. Kept narrow: page lifecycle,
/// user timing, and the devtools timeline.
const TRACE_CATEGORIES: &str =
    "-*,toplevel,blink.console,blink.user_timing,devtools.timeline,loading";

// ---------------------------------------------------------------------------
// Network recording
// ---------------------------------------------------------------------------

/// In-flight network log: request id -> record under construction, plus
/// first-seen order.
#[derive(Debug, Default)]
pub struct NetworkLog {
    records: HashMap<String, NetworkRecord>,
    order: Vec<String>,
}

/// Fold a `Network.requestWillBeSent` payload into the log.
pub fn on_request_will_be_sent(log: &mut NetworkLog, params: &Value) {
    let Some(request_id) = params.get("requestId").and_then(Value::as_str) else {
        return;
    };
    let request = params.get("request").cloned().unwrap_or(Value::Null);
    let url = request
        .get("url")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let record = NetworkRecord {
        request_id: request_id.to_string(),
        scheme: url_scheme(&url).to_string(),
        url,
        resource_type: ResourceType::from_protocol(
            params.get("type").and_then(Value::as_str).unwrap_or(""),
        ),
        priority: ResourcePriority::from_protocol(
            request
                .get("initialPriority")
                .and_then(Value::as_str)
                .unwrap_or(""),
        ),
        mime_type: None,
        status_code: None,
        transfer_size: 0,
        start_time: params
            .get("timestamp")
            .and_then(Value::as_f64)
            .unwrap_or(0.0),
        response_received_time: None,
        end_time: None,
        finished: false,
        failed: false,
        from_cache: false,
        initiator_id: params
            .pointer("/initiator/requestId")
            .and_then(Value::as_str)
            .map(str::to_string),
    };

    if !log.records.contains_key(request_id) {
        log.order.push(request_id.to_string());
    }
    // A redirect re-sends the same request id; the newest request wins.
    log.records.insert(request_id.to_string(), record);
}

/// Fold a `Network.responseReceived` payload into the log.
pub fn on_response_received(log: &mut NetworkLog, params: &Value) {
    let Some(record) = lookup(log, params) else {
        return;
    };
    record.response_received_time = params.get("timestamp").and_then(Value::as_f64);
    if let Some(response) = params.get("response") {
        record.status_code = response
            .get("status")
            .and_then(Value::as_u64)
            .map(|code| code as u16);
        record.mime_type = response
            .get("mimeType")
            .and_then(Value::as_str)
            .map(str::to_string);
        if response
            .get("fromDiskCache")
            .and_then(Value::as_bool)
            .unwrap_or(false)
        {
            record.from_cache = true;
        }
    }
}

/// Fold a `Network.loadingFinished` payload into the log.
pub fn on_loading_finished(log: &mut NetworkLog, params: &Value) {
    let Some(record) = lookup(log, params) else {
        return;
    };
    record.finished = true;
    record.end_time = params.get("timestamp").and_then(Value::as_f64);
    record.transfer_size = params
        .get("encodedDataLength")
        .and_then(Value::as_u64)
        .unwrap_or(0);
}

/// Fold a `Network.loadingFailed` payload into the log.
pub fn on_loading_failed(log: &mut NetworkLog, params: &Value) {
    let Some(record) = lookup(log, params) else {
        return;
    };
    record.failed = true;
    record.end_time = params.get("timestamp").and_then(Value::as_f64);
}

/// Fold a `Network.requestServedFromCache` payload into the log.
pub fn on_served_from_cache(log: &mut NetworkLog, params: &Value) {
    if let Some(record) = lookup(log, params) {
        record.from_cache = true;
    }
}

fn lookup<'a>(log: &'a mut NetworkLog, params: &Value) -> Option<&'a mut NetworkRecord> {
    let request_id = params.get("requestId")?.as_str()?;
    log.records.get_mut(request_id)
}

/// Records the pass's network log from the session's event stream.
pub struct NetworkRecorder {
    log: Arc<Mutex<NetworkLog>>,
}

impl NetworkRecorder {
    /// Enable the network domain and subscribe to its event stream.
    pub async fn attach(session: &Session) -> Result<Self, ProtocolError> {
        session
            .send("Network.enable", serde_json::json!({}), DRIVER_CALL_TIMEOUT)
            .await?;

        let log = Arc::new(Mutex::new(NetworkLog::default()));
        let events: [(&str, fn(&mut NetworkLog, &Value)); 5] = [
            ("Network.requestWillBeSent", on_request_will_be_sent),
            ("Network.responseReceived", on_response_received),
            ("Network.loadingFinished", on_loading_finished),
            ("Network.loadingFailed", on_loading_failed),
            ("Network.requestServedFromCache", on_served_from_cache),
        ];
        for (event, fold) in events {
            let log = Arc::clone(&log);
            session.on(
                event,
                Arc::new(move |params: &Value| {
                    let mut log = log.lock().expect("network log lock poisoned");
                    fold(&mut log, params);
                    Ok(())
                }),
            );
        }

        Ok(Self { log })
    }

    /// Snapshot the recorded log in first-seen order.
    pub fn collect(&self) -> Vec<NetworkRecord> {
        let log = self.log.lock().expect("network log lock poisoned");
        log.order
            .iter()
            .filter_map(|id| log.records.get(id).cloned())
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Trace recording
// ---------------------------------------------------------------------------

/// Records the pass's trace buffer.
pub struct TraceRecorder {
    events: Arc<Mutex<Vec<TraceEvent>>>,
}

impl TraceRecorder {
    /// Start tracing and subscribe to the collected-data stream.
    pub async fn start(session: &Session) -> Result<Self, ProtocolError> {
        let events: Arc<Mutex<Vec<TraceEvent>>> = Arc::new(Mutex::new(Vec::new()));
        {
            let events = Arc::clone(&events);
            session.on(
                "Tracing.dataCollected",
                Arc::new(move |params: &Value| {
                    let chunk = params.get("value").and_then(Value::as_array);
                    if let Some(chunk) = chunk {
                        let mut events = events.lock().expect("trace buffer lock poisoned");
                        for raw in chunk {
                            match serde_json::from_value::<TraceEvent>(raw.clone()) {
                                Ok(event) => events.push(event),
                                Err(e) => {
                                    tracing::debug!(error = %e, "skipping unparseable trace event");
                                }
                            }
                        }
                    }
                    Ok(())
                }),
            );
        }

        session
            .send(
                "Tracing.start",
                serde_json::json!({
                    "categories": TRACE_CATEGORIES,
                    "transferMode": "ReportEvents",
                }),
                DRIVER_CALL_TIMEOUT,
            )
            .await?;

        Ok(Self { events })
    }

    /// Stop tracing and return the buffered capture. Waits for the
    /// remote's completion signal so late chunks are included.
    pub async fn stop(self, session: &Session) -> Result<TraceCapture, ProtocolError> {
        let complete = session.event_waiter("Tracing.tracingComplete");
        session
            .send("Tracing.end", serde_json::json!({}), DRIVER_CALL_TIMEOUT)
            .await?;

        match tokio::time::timeout(TRACE_COMPLETE_TIMEOUT, complete).await {
            Ok(Ok(_)) => {}
            Ok(Err(_)) => return Err(ProtocolError::ConnectionClosed),
            Err(_) => {
                return Err(ProtocolError::EventTimeout {
                    event: "Tracing.tracingComplete".to_string(),
                    duration: TRACE_COMPLETE_TIMEOUT,
                })
            }
        }

        let events = std::mem::take(&mut *self.events.lock().expect("trace buffer lock poisoned"));
        Ok(TraceCapture { events })
    }
}
