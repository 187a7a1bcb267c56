//! Ready-made capture fixtures and event scripts.

use serde_json::Value;

use lumen_types::{NetworkRecord, ResourcePriority, ResourceType, TraceCapture, TraceEvent};

/// A finished, secure, measurable network record.
pub fn network_record(id: &str, url: &str) -> NetworkRecord {
    NetworkRecord {
        request_id: id.to_string(),
        url: url.to_string(),
        scheme: lumen_types::network::url_scheme(url).to_string(),
        resource_type: ResourceType::Document,
        priority: ResourcePriority::VeryHigh,
        mime_type: Some("text/html".into()),
        status_code: Some(200),
        transfer_size: 1024,
        start_time: 1.0,
        response_received_time: Some(1.1),
        end_time: Some(1.4),
        finished: true,
        failed: false,
        from_cache: false,
        initiator_id: None,
    }
}

/// A trace with navigation start plus paint and load marks at the given
/// millisecond offsets.
pub fn trace_with_timings(first_paint_ms: u64, load_ms: u64) -> TraceCapture {
    let navigation_start: u64 = 10_000_000;
    let event = |name: &str, offset_ms: u64| TraceEvent {
        name: name.to_string(),
        cat: "blink.user_timing".into(),
        ts: navigation_start + offset_ms * 1000,
        pid: 1,
        tid: 1,
        args: Value::Null,
    };
    TraceCapture {
        events: vec![
            event("navigationStart", 0),
            event("firstPaint", first_paint_ms),
            event("loadEventEnd", load_ms),
        ],
    }
}

/// The event burst a loading page produces, for scripting after
/// `Page.navigate`: one document request lifecycle and the load signal.
pub fn page_load_events(url: &str) -> Vec<(&'static str, Value)> {
    vec![
        (
            "Network.requestWillBeSent",
            serde_json::json!({
                "requestId": "DOC",
                "timestamp": 1.0,
                "type": "Document",
                "request": { "url": url, "initialPriority": "VeryHigh" },
            }),
        ),
        (
            "Network.responseReceived",
            serde_json::json!({
                "requestId": "DOC",
                "timestamp": 1.2,
                "response": { "status": 200, "mimeType": "text/html" },
            }),
        ),
        (
            "Network.loadingFinished",
            serde_json::json!({ "requestId": "DOC", "timestamp": 1.5, "encodedDataLength": 4096 }),
        ),
        ("Page.loadEventFired", serde_json::json!({ "timestamp": 1.6 })),
    ]
}

/// Trace chunks for scripting after `Tracing.end`.
pub fn trace_events_chunk(first_paint_ms: u64, load_ms: u64) -> Value {
    let capture = trace_with_timings(first_paint_ms, load_ms);
    serde_json::json!({ "value": capture.events })
}
