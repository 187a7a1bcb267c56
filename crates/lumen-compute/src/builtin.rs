//! Built-in derivations: the network timeline, the critical-request chain
//! tree, and the trace model.
//!
//! Each consumes the raw capture artifacts published by the gather
//! scheduler and produces a structured value for checks to consume.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use lumen_types::{NetworkRecord, ResourcePriority, ResourceType, TraceCapture};

use crate::error::DerivationError;
use crate::graph::{Derivation, InputSet};

/// Every built-in derivation, ready to register on a graph.
pub fn builtin_derivations() -> Vec<Arc<dyn Derivation>> {
    vec![
        Arc::new(NetworkTimeline),
        Arc::new(CriticalRequestChains),
        Arc::new(TraceModel),
    ]
}

// ---------------------------------------------------------------------------
// NetworkTimeline
// ---------------------------------------------------------------------------

/// Per-request spans plus aggregate transfer statistics.
///
/// Throughput is measured over the union of intervals where at least one
/// measurable request was between response and completion, so idle gaps
/// don't dilute the figure. Data URIs, failures, redirects, and cache hits
/// are excluded.
pub struct NetworkTimeline;

#[async_trait]
impl Derivation for NetworkTimeline {
    fn name(&self) -> &str {
        "NetworkTimeline"
    }

    fn inputs(&self) -> Vec<String> {
        vec!["NetworkRecords".to_string()]
    }

    async fn derive(&self, inputs: &InputSet) -> Result<Value, DerivationError> {
        let records: Vec<NetworkRecord> = inputs.decode("NetworkRecords")?;

        let spans: Vec<Value> = records
            .iter()
            .map(|r| {
                serde_json::json!({
                    "url": r.url,
                    "start_time": r.start_time,
                    "end_time": r.end_time,
                    "transfer_size": r.transfer_size,
                    "finished": r.finished,
                })
            })
            .collect();

        let total_transfer_size: u64 = records
            .iter()
            .filter(|r| r.is_measurable())
            .map(|r| r.transfer_size)
            .sum();

        Ok(serde_json::json!({
            "request_count": records.len(),
            "total_transfer_size": total_transfer_size,
            "throughput_bytes_per_sec": observed_throughput(&records),
            "spans": spans,
        }))
    }
}

/// Average bytes/second across the busy intervals of measurable records.
/// `None` when nothing was measurable.
pub fn observed_throughput(records: &[NetworkRecord]) -> Option<f64> {
    let mut total_bytes = 0u64;
    let mut boundaries: Vec<(f64, bool)> = Vec::new();
    for record in records.iter().filter(|r| r.is_measurable() && !r.from_cache) {
        let (Some(response_at), Some(end)) = (record.response_received_time, record.end_time)
        else {
            continue;
        };
        total_bytes += record.transfer_size;
        boundaries.push((response_at, true));
        boundaries.push((end, false));
    }
    if boundaries.is_empty() {
        return None;
    }
    boundaries.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

    let mut in_flight = 0u32;
    let mut busy_started = 0.0;
    let mut busy_duration = 0.0;
    for (time, is_start) in boundaries {
        if is_start {
            if in_flight == 0 {
                busy_started = time;
            }
            in_flight += 1;
        } else {
            in_flight = in_flight.saturating_sub(1);
            if in_flight == 0 {
                busy_duration += time - busy_started;
            }
        }
    }

    if busy_duration <= 0.0 {
        return None;
    }
    Some(total_bytes as f64 / busy_duration)
}

// ---------------------------------------------------------------------------
// CriticalRequestChains
// ---------------------------------------------------------------------------

/// Tree of render-critical requests linked by initiator.
///
/// Priority is the proxy for criticality; images and XHR are excluded even
/// when fetched at high priority. Chains are broken at non-critical
/// ancestors and at repeats, so a circular initiator reference cannot loop.
pub struct CriticalRequestChains;

pub fn is_critical(record: &NetworkRecord) -> bool {
    if matches!(record.resource_type, ResourceType::Image | ResourceType::Xhr) {
        return false;
    }
    if record
        .mime_type
        .as_deref()
        .is_some_and(|mime| mime.starts_with("image/"))
    {
        return false;
    }
    matches!(
        record.priority,
        ResourcePriority::Medium | ResourcePriority::High | ResourcePriority::VeryHigh
    )
}

fn flatten(record: &NetworkRecord) -> Value {
    serde_json::json!({
        "url": record.url,
        "start_time": record.start_time,
        "end_time": record.end_time,
        "response_received_time": record.response_received_time,
        "transfer_size": record.transfer_size,
    })
}

#[derive(serde::Serialize)]
struct ChainNode {
    request: Value,
    children: BTreeMap<String, ChainNode>,
}

/// Build the chain tree as nested JSON keyed by request id.
pub fn build_chains(records: &[NetworkRecord]) -> Value {
    let finished: Vec<&NetworkRecord> = records.iter().filter(|r| r.finished).collect();
    let by_id: HashMap<&str, &NetworkRecord> = finished
        .iter()
        .map(|r| (r.request_id.as_str(), *r))
        .collect();

    let mut root: BTreeMap<String, ChainNode> = BTreeMap::new();
    for record in finished.iter().filter(|r| is_critical(r)) {
        // Walk back to the chain root, collecting critical ancestors.
        let mut ancestors: Vec<&NetworkRecord> = Vec::new();
        let mut seen: HashSet<&str> = HashSet::new();
        seen.insert(record.request_id.as_str());
        let mut cursor = record
            .initiator_id
            .as_deref()
            .and_then(|id| by_id.get(id).copied());
        while let Some(ancestor) = cursor {
            if !is_critical(ancestor) || seen.contains(ancestor.request_id.as_str()) {
                break;
            }
            seen.insert(ancestor.request_id.as_str());
            ancestors.push(ancestor);
            cursor = ancestor
                .initiator_id
                .as_deref()
                .and_then(|id| by_id.get(id).copied());
        }

        // Descend root -> ... -> record, creating nodes as needed.
        let mut level = &mut root;
        for link in ancestors.iter().rev().chain(std::iter::once(record)) {
            let node = level
                .entry(link.request_id.clone())
                .or_insert_with(|| ChainNode {
                    request: flatten(link),
                    children: BTreeMap::new(),
                });
            level = &mut node.children;
        }
    }

    serde_json::to_value(root).unwrap_or(Value::Null)
}

#[async_trait]
impl Derivation for CriticalRequestChains {
    fn name(&self) -> &str {
        "CriticalRequestChains"
    }

    fn inputs(&self) -> Vec<String> {
        vec!["NetworkRecords".to_string()]
    }

    async fn derive(&self, inputs: &InputSet) -> Result<Value, DerivationError> {
        let records: Vec<NetworkRecord> = inputs.decode("NetworkRecords")?;
        let chains = build_chains(&records);
        Ok(serde_json::json!({
            "longest_depth": longest_depth(&chains),
            "chains": chains,
        }))
    }
}

/// Depth of the deepest chain in a tree produced by [`build_chains`].
pub fn longest_depth(chains: &Value) -> u64 {
    match chains.as_object() {
        None => 0,
        Some(nodes) => nodes
            .values()
            .map(|node| 1 + node.get("children").map_or(0, longest_depth))
            .max()
            .unwrap_or(0),
    }
}

// ---------------------------------------------------------------------------
// TraceModel
// ---------------------------------------------------------------------------

/// Page timings extracted from the trace, relative to navigation start.
pub struct TraceModel;

#[async_trait]
impl Derivation for TraceModel {
    fn name(&self) -> &str {
        "TraceModel"
    }

    fn inputs(&self) -> Vec<String> {
        vec!["Trace".to_string()]
    }

    async fn derive(&self, inputs: &InputSet) -> Result<Value, DerivationError> {
        let trace: TraceCapture = inputs.decode("Trace")?;

        let navigation_start = trace
            .first_named("navigationStart")
            .ok_or_else(|| DerivationError::new("trace has no navigationStart event"))?
            .ts;

        let relative_ms = |name: &str| -> Option<f64> {
            trace
                .first_named(name)
                .map(|e| (e.ts.saturating_sub(navigation_start)) as f64 / 1000.0)
        };

        Ok(serde_json::json!({
            "navigation_start_ts": navigation_start,
            "event_count": trace.events.len(),
            "timings": {
                "first_paint": relative_ms("firstPaint"),
                "first_contentful_paint": relative_ms("firstContentfulPaint"),
                "dom_content_loaded": relative_ms("domContentLoadedEventEnd"),
                "load": relative_ms("loadEventEnd"),
            },
        }))
    }
}
