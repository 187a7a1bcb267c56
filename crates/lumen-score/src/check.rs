//! The check contract and check execution.
//!
//! A check declares the artifacts it needs, audits them into a raw boolean
//! or numeric value, and optionally carries a score curve for numeric
//! results. Required artifacts are resolved through the computed-artifact
//! graph before the audit runs; if any of them is unavailable the check is
//! skipped as `NotApplicable` rather than failing the run.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use lumen_compute::Graph;

use crate::statistics::ScoreCurve;

/// Raw output of an audit: a boolean verdict or a numeric measurement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RawValue {
    Bool(bool),
    Number(f64),
}

/// What an audit returns: the raw value plus an optional explanation.
#[derive(Debug, Clone, Serialize)]
pub struct RawResult {
    pub raw_value: RawValue,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<String>,
}

impl RawResult {
    pub fn boolean(value: bool) -> Self {
        RawResult {
            raw_value: RawValue::Bool(value),
            debug: None,
        }
    }

    pub fn numeric(value: f64) -> Self {
        RawResult {
            raw_value: RawValue::Number(value),
            debug: None,
        }
    }

    #[must_use]
    pub fn with_debug(mut self, debug: impl Into<String>) -> Self {
        self.debug = Some(debug.into());
        self
    }
}

/// The artifacts a check asked for, resolved.
pub struct ArtifactBundle {
    values: HashMap<String, Arc<Value>>,
}

impl ArtifactBundle {
    pub fn from_values(values: HashMap<String, Arc<Value>>) -> Self {
        ArtifactBundle { values }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name).map(Arc::as_ref)
    }
}

/// Why an audit could not produce a result.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{detail}")]
pub struct AuditError {
    pub detail: String,
}

impl AuditError {
    pub fn new(detail: impl Into<String>) -> Self {
        AuditError {
            detail: detail.into(),
        }
    }
}

/// A unit that converts artifacts into a raw result.
#[async_trait]
pub trait Check: Send + Sync {
    fn name(&self) -> &str;

    /// Artifact names resolved before `audit` runs. Raw or computed.
    fn required_artifacts(&self) -> Vec<String>;

    /// Curve for numeric results. Boolean checks return `None`.
    fn curve(&self) -> Option<ScoreCurve> {
        None
    }

    async fn audit(&self, artifacts: &ArtifactBundle) -> Result<RawResult, AuditError>;
}

/// Terminal state of one check within a run.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CheckOutcome {
    /// The audit ran and its value was scored.
    Scored {
        raw_value: RawValue,
        /// Normalized score in `[0, 1]`.
        score: f64,
        #[serde(skip_serializing_if = "Option::is_none")]
        debug: Option<String>,
    },
    /// A required artifact was unavailable or the audit itself failed; the
    /// underlying reason is carried as debug text. Not an error state.
    NotApplicable { debug: String },
}

/// Map a raw value to a normalized score.
///
/// Booleans score 1.0 or 0.0 directly. Numerics use the check's curve;
/// smaller is better, so "bigger is better" audits must invert their raw
/// value before returning it. A numeric check without a curve scores by
/// truthiness of the value being non-zero -- that is almost always a check
/// authoring mistake, so it is logged.
pub fn score_value(check_name: &str, value: RawValue, curve: Option<&ScoreCurve>) -> f64 {
    match (value, curve) {
        (RawValue::Bool(true), _) => 1.0,
        (RawValue::Bool(false), _) => 0.0,
        (RawValue::Number(n), Some(curve)) => curve.score(n),
        (RawValue::Number(n), None) => {
            tracing::warn!(check = check_name, "numeric check has no curve, scoring by truthiness");
            if n != 0.0 {
                1.0
            } else {
                0.0
            }
        }
    }
}

/// Resolve a check's artifacts, run its audit, and score the result.
pub async fn run_check(check: &dyn Check, graph: &Graph) -> CheckOutcome {
    let mut values = HashMap::new();
    for name in check.required_artifacts() {
        match graph.request(&name).await {
            Ok(value) => {
                values.insert(name, value);
            }
            Err(e) => {
                tracing::debug!(check = check.name(), artifact = %name, error = %e,
                    "required artifact unavailable, skipping check");
                return CheckOutcome::NotApplicable {
                    debug: format!("required artifact '{name}' unavailable: {e}"),
                };
            }
        }
    }

    let bundle = ArtifactBundle { values };
    match check.audit(&bundle).await {
        Ok(result) => {
            let score = score_value(check.name(), result.raw_value, check.curve().as_ref());
            CheckOutcome::Scored {
                raw_value: result.raw_value,
                score,
                debug: result.debug,
            }
        }
        Err(e) => {
            tracing::warn!(check = check.name(), error = %e, "audit failed");
            CheckOutcome::NotApplicable {
                debug: format!("audit failed: {e}"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_types::{ArtifactEntry, ArtifactStore};

    struct Identity {
        required: &'static str,
    }

    #[async_trait]
    impl Check for Identity {
        fn name(&self) -> &str {
            "identity"
        }

        fn required_artifacts(&self) -> Vec<String> {
            vec![self.required.to_string()]
        }

        async fn audit(&self, artifacts: &ArtifactBundle) -> Result<RawResult, AuditError> {
            let value = artifacts
                .get(self.required)
                .and_then(Value::as_f64)
                .ok_or_else(|| AuditError::new("artifact is not numeric"))?;
            Ok(RawResult::numeric(value))
        }
    }

    fn graph_with_raw(name: &str, entry: ArtifactEntry) -> Graph {
        let mut store = ArtifactStore::new();
        store.insert(name, entry).unwrap();
        Graph::new(Arc::new(store))
    }

    #[test]
    fn test_boolean_scores_directly() {
        assert_eq!(score_value("t", RawValue::Bool(true), None), 1.0);
        assert_eq!(score_value("t", RawValue::Bool(false), None), 0.0);
    }

    #[test]
    fn test_numeric_scores_through_curve() {
        let curve = ScoreCurve::new(5000.0, 3500.0).unwrap();
        let score = score_value("t", RawValue::Number(5000.0), Some(&curve));
        assert!((score - 0.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_missing_artifact_skips_check() {
        let graph = graph_with_raw("Other", ArtifactEntry::present(Value::from(1)));
        let outcome = run_check(&Identity { required: "X" }, &graph).await;
        match outcome {
            CheckOutcome::NotApplicable { debug } => assert!(debug.contains("'X'")),
            other => panic!("expected NotApplicable, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unavailable_artifact_carries_reason() {
        let graph = graph_with_raw("X", ArtifactEntry::unavailable("collector broke"));
        let outcome = run_check(&Identity { required: "X" }, &graph).await;
        assert!(matches!(outcome, CheckOutcome::NotApplicable { .. }));
    }

    #[tokio::test]
    async fn test_audit_failure_degrades_to_not_applicable() {
        let graph = graph_with_raw("X", ArtifactEntry::present(Value::from("not a number")));
        let outcome = run_check(&Identity { required: "X" }, &graph).await;
        match outcome {
            CheckOutcome::NotApplicable { debug } => assert!(debug.contains("audit failed")),
            other => panic!("expected NotApplicable, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_successful_audit_is_scored() {
        let graph = graph_with_raw("X", ArtifactEntry::present(Value::from(42.0)));
        let outcome = run_check(&Identity { required: "X" }, &graph).await;
        match outcome {
            CheckOutcome::Scored { raw_value, score, .. } => {
                assert_eq!(raw_value, RawValue::Number(42.0));
                // No curve: non-zero numeric scores 1.0 by truthiness.
                assert_eq!(score, 1.0);
            }
            other => panic!("expected Scored, got {other:?}"),
        }
    }
}
