//! Built-in checks.
//!
//! The full check catalog belongs to the embedding tool; these three ship
//! with the engine because the default configuration references them. One
//! numeric check over the trace model, one boolean check over the network
//! log, one numeric check over the critical-chain tree.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use lumen_types::NetworkRecord;

use crate::check::{ArtifactBundle, AuditError, Check, RawResult};
use crate::statistics::ScoreCurve;

/// Every built-in check, keyed by name at configuration time.
pub fn builtin_checks() -> Vec<Arc<dyn Check>> {
    vec![
        Arc::new(FirstPaintLatency),
        Arc::new(AllRequestsSecure),
        Arc::new(CriticalChainDepth),
    ]
}

// ---------------------------------------------------------------------------
// first-paint-latency
// ---------------------------------------------------------------------------

/// Time from navigation start to first paint, in milliseconds.
pub struct FirstPaintLatency;

impl FirstPaintLatency {
    const SCORING_MEDIAN: f64 = 4000.0;
    const SCORING_FALLOFF: f64 = 1600.0;
}

#[async_trait]
impl Check for FirstPaintLatency {
    fn name(&self) -> &str {
        "first-paint-latency"
    }

    fn required_artifacts(&self) -> Vec<String> {
        vec!["TraceModel".to_string()]
    }

    fn curve(&self) -> Option<ScoreCurve> {
        ScoreCurve::new(Self::SCORING_MEDIAN, Self::SCORING_FALLOFF).ok()
    }

    async fn audit(&self, artifacts: &ArtifactBundle) -> Result<RawResult, AuditError> {
        let model = artifacts
            .get("TraceModel")
            .ok_or_else(|| AuditError::new("TraceModel missing from bundle"))?;

        let first_paint = model
            .pointer("/timings/first_paint")
            .and_then(Value::as_f64)
            .or_else(|| {
                model
                    .pointer("/timings/first_contentful_paint")
                    .and_then(Value::as_f64)
            })
            .ok_or_else(|| AuditError::new("trace recorded no paint event"))?;

        Ok(RawResult::numeric(first_paint)
            .with_debug(format!("first paint at {first_paint:.0} ms")))
    }
}

// ---------------------------------------------------------------------------
// all-requests-secure
// ---------------------------------------------------------------------------

/// Whether every finished request used a secure transport.
pub struct AllRequestsSecure;

#[async_trait]
impl Check for AllRequestsSecure {
    fn name(&self) -> &str {
        "all-requests-secure"
    }

    fn required_artifacts(&self) -> Vec<String> {
        vec!["NetworkRecords".to_string()]
    }

    async fn audit(&self, artifacts: &ArtifactBundle) -> Result<RawResult, AuditError> {
        let records: Vec<NetworkRecord> = artifacts
            .get("NetworkRecords")
            .cloned()
            .ok_or_else(|| AuditError::new("NetworkRecords missing from bundle"))
            .and_then(|value| {
                serde_json::from_value(value)
                    .map_err(|e| AuditError::new(format!("network log is malformed: {e}")))
            })?;

        let insecure: Vec<&str> = records
            .iter()
            .filter(|r| r.finished && !r.is_secure())
            .map(|r| r.url.as_str())
            .collect();

        let result = RawResult::boolean(insecure.is_empty());
        if insecure.is_empty() {
            Ok(result)
        } else {
            Ok(result.with_debug(format!(
                "{} insecure request(s): {}",
                insecure.len(),
                insecure.join(", ")
            )))
        }
    }
}

// ---------------------------------------------------------------------------
// critical-chain-depth
// ---------------------------------------------------------------------------

/// Depth of the longest critical request chain. Deep chains serialize the
/// critical path and delay first render.
pub struct CriticalChainDepth;

impl CriticalChainDepth {
    const SCORING_MEDIAN: f64 = 8.0;
    const SCORING_FALLOFF: f64 = 4.0;
}

#[async_trait]
impl Check for CriticalChainDepth {
    fn name(&self) -> &str {
        "critical-chain-depth"
    }

    fn required_artifacts(&self) -> Vec<String> {
        vec!["CriticalRequestChains".to_string()]
    }

    fn curve(&self) -> Option<ScoreCurve> {
        ScoreCurve::new(Self::SCORING_MEDIAN, Self::SCORING_FALLOFF).ok()
    }

    async fn audit(&self, artifacts: &ArtifactBundle) -> Result<RawResult, AuditError> {
        let depth = artifacts
            .get("CriticalRequestChains")
            .and_then(|chains| chains.get("longest_depth"))
            .and_then(Value::as_u64)
            .ok_or_else(|| AuditError::new("chain tree carries no longest_depth"))?;

        Ok(RawResult::numeric(depth as f64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn bundle(name: &str, value: Value) -> ArtifactBundle {
        let mut values = HashMap::new();
        values.insert(name.to_string(), Arc::new(value));
        ArtifactBundle::from_values(values)
    }

    #[tokio::test]
    async fn test_first_paint_latency_reads_trace_model() {
        let model = serde_json::json!({
            "timings": { "first_paint": 1234.0, "load": 4000.0 }
        });
        let result = FirstPaintLatency
            .audit(&bundle("TraceModel", model))
            .await
            .unwrap();
        assert_eq!(result.raw_value, crate::check::RawValue::Number(1234.0));
    }

    #[tokio::test]
    async fn test_first_paint_falls_back_to_contentful_paint() {
        let model = serde_json::json!({
            "timings": { "first_paint": null, "first_contentful_paint": 900.0 }
        });
        let result = FirstPaintLatency
            .audit(&bundle("TraceModel", model))
            .await
            .unwrap();
        assert_eq!(result.raw_value, crate::check::RawValue::Number(900.0));
    }

    #[tokio::test]
    async fn test_first_paint_errors_without_paint_events() {
        let model = serde_json::json!({ "timings": {} });
        let err = FirstPaintLatency
            .audit(&bundle("TraceModel", model))
            .await
            .unwrap_err();
        assert!(err.detail.contains("no paint event"));
    }

    #[tokio::test]
    async fn test_all_requests_secure_flags_http() {
        let records = serde_json::json!([
            {
                "request_id": "A", "url": "https://example.com/", "scheme": "https",
                "resource_type": "Document", "priority": "VeryHigh",
                "transfer_size": 100, "start_time": 0.0,
                "finished": true, "failed": false, "from_cache": false
            },
            {
                "request_id": "B", "url": "http://example.com/tracker.js", "scheme": "http",
                "resource_type": "Script", "priority": "High",
                "transfer_size": 50, "start_time": 0.1,
                "finished": true, "failed": false, "from_cache": false
            }
        ]);
        let result = AllRequestsSecure
            .audit(&bundle("NetworkRecords", records))
            .await
            .unwrap();
        assert_eq!(result.raw_value, crate::check::RawValue::Bool(false));
        assert!(result.debug.unwrap().contains("tracker.js"));
    }

    #[tokio::test]
    async fn test_all_requests_secure_passes_clean_log() {
        let records = serde_json::json!([
            {
                "request_id": "A", "url": "https://example.com/", "scheme": "https",
                "resource_type": "Document", "priority": "VeryHigh",
                "transfer_size": 100, "start_time": 0.0,
                "finished": true, "failed": false, "from_cache": false
            }
        ]);
        let result = AllRequestsSecure
            .audit(&bundle("NetworkRecords", records))
            .await
            .unwrap();
        assert_eq!(result.raw_value, crate::check::RawValue::Bool(true));
        assert!(result.debug.is_none());
    }

    #[tokio::test]
    async fn test_critical_chain_depth_reads_tree() {
        let chains = serde_json::json!({ "longest_depth": 3, "chains": {} });
        let result = CriticalChainDepth
            .audit(&bundle("CriticalRequestChains", chains))
            .await
            .unwrap();
        assert_eq!(result.raw_value, crate::check::RawValue::Number(3.0));
    }

    #[test]
    fn test_builtin_curves_are_valid() {
        assert!(FirstPaintLatency.curve().is_some());
        assert!(CriticalChainDepth.curve().is_some());
        assert!(AllRequestsSecure.curve().is_none());
    }

    #[test]
    fn test_builtin_names_match_default_config() {
        let names: Vec<String> = builtin_checks()
            .iter()
            .map(|c| c.name().to_string())
            .collect();
        assert!(names.contains(&"first-paint-latency".to_string()));
        assert!(names.contains(&"all-requests-secure".to_string()));
        assert!(names.contains(&"critical-chain-depth".to_string()));
    }
}
