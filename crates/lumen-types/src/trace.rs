//! Trace capture model.
//!
//! Trace events stream in through `Tracing.dataCollected` while a pass
//! records. The capture is kept raw here; the compute graph derives the
//! hierarchical page-timing model from it on demand.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One trace event as emitted by the browser's tracing infrastructure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEvent {
    pub name: String,
    /// Comma-separated category list.
    #[serde(default)]
    pub cat: String,
    /// Microsecond timestamp on the trace clock.
    pub ts: u64,
    #[serde(default)]
    pub pid: u64,
    #[serde(default)]
    pub tid: u64,
    #[serde(default)]
    pub args: Value,
}

/// The full trace buffer recorded during one pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TraceCapture {
    pub events: Vec<TraceEvent>,
}

impl TraceCapture {
    /// Find the first event with the given name, in timestamp order.
    pub fn first_named(&self, name: &str) -> Option<&TraceEvent> {
        self.events
            .iter()
            .filter(|e| e.name == name)
            .min_by_key(|e| e.ts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(name: &str, ts: u64) -> TraceEvent {
        TraceEvent {
            name: name.into(),
            cat: "blink.user_timing".into(),
            ts,
            pid: 1,
            tid: 1,
            args: Value::Null,
        }
    }

    #[test]
    fn test_first_named_picks_earliest() {
        let capture = TraceCapture {
            events: vec![
                event("firstPaint", 300),
                event("navigationStart", 100),
                event("firstPaint", 200),
            ],
        };
        assert_eq!(capture.first_named("firstPaint").unwrap().ts, 200);
        assert!(capture.first_named("loadEventEnd").is_none());
    }

    #[test]
    fn test_event_deserializes_with_defaults() {
        let e: TraceEvent =
            serde_json::from_value(serde_json::json!({"name": "navigationStart", "ts": 5}))
                .unwrap();
        assert_eq!(e.name, "navigationStart");
        assert_eq!(e.ts, 5);
        assert_eq!(e.cat, "");
    }
}
