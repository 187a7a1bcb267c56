//! End-to-end runs over the scripted transport: the full
//! gather -> graph -> check -> category pipeline.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use lumen_compute::{builtin_derivations, Derivation, DerivationError, InputSet};
use lumen_gather::Collector;
use lumen_harness::{fixtures, MockBrowser, MockBrowserBuilder, StubCollector};
use lumen_protocol::Session;
use lumen_runner::{run, Catalog, RunError};
use lumen_score::{
    builtin_checks, ArtifactBundle, AuditError, CategoryScore, Check, CheckOutcome, RawResult,
    RawValue,
};
use lumen_types::{
    CategoryConfig, CategoryMemberConfig, CheckConfig, NetworkCondition, PassConfig, RunConfig,
};

const URL: &str = "https://example.com/";

fn loading_browser() -> (Session, MockBrowser) {
    let mut builder = MockBrowserBuilder::new();
    for (event, params) in fixtures::page_load_events(URL) {
        builder = builder.with_event_after("Page.navigate", event, params);
    }
    let (transport, browser) = builder
        .with_event_after(
            "Tracing.end",
            "Tracing.dataCollected",
            fixtures::trace_events_chunk(1234, 2500),
        )
        .with_event_after("Tracing.end", "Tracing.tracingComplete", Value::Null)
        .with_result(
            "Runtime.evaluate",
            serde_json::json!({"result": {"type": "string", "value": URL}}),
        )
        .build();
    (Session::with_transport(transport), browser)
}

fn pass_config(name: &str, collectors: &[&str]) -> PassConfig {
    PassConfig {
        name: name.to_string(),
        network: NetworkCondition::None,
        disable_cache: false,
        record_trace: false,
        record_network: false,
        navigate: true,
        load_timeout_ms: 1_000,
        settle_delay_ms: 0,
        collectors: collectors.iter().map(|s| s.to_string()).collect(),
    }
}

// ---------------------------------------------------------------------------
// X = 200, Y = X / 2, check on Y
// ---------------------------------------------------------------------------

struct Halve;

#[async_trait]
impl Derivation for Halve {
    fn name(&self) -> &str {
        "Y"
    }

    fn inputs(&self) -> Vec<String> {
        vec!["X".to_string()]
    }

    async fn derive(&self, inputs: &InputSet) -> Result<Value, DerivationError> {
        let x = inputs
            .get("X")
            .and_then(Value::as_f64)
            .ok_or_else(|| DerivationError::new("X is not numeric"))?;
        Ok(Value::from(x / 2.0))
    }
}

struct IdentityOnY;

#[async_trait]
impl Check for IdentityOnY {
    fn name(&self) -> &str {
        "y-identity"
    }

    fn required_artifacts(&self) -> Vec<String> {
        vec!["Y".to_string()]
    }

    async fn audit(&self, artifacts: &ArtifactBundle) -> Result<RawResult, AuditError> {
        let y = artifacts
            .get("Y")
            .and_then(Value::as_f64)
            .ok_or_else(|| AuditError::new("Y is not numeric"))?;
        Ok(RawResult::numeric(y))
    }
}

fn x_catalog(log: Arc<Mutex<Vec<String>>>) -> Catalog {
    Catalog {
        checks: vec![Arc::new(IdentityOnY)],
        derivations: vec![Arc::new(Halve)],
        collectors: Box::new(move |name| match name {
            "X" => Some(Box::new(StubCollector::new(
                "X",
                Value::from(200.0),
                Arc::clone(&log),
            )) as Box<dyn Collector>),
            _ => None,
        }),
    }
}

fn x_config() -> RunConfig {
    RunConfig {
        url: URL.to_string(),
        passes: vec![pass_config("default", &["X"])],
        checks: vec![CheckConfig {
            name: "y-identity".into(),
            weight: None,
        }],
        categories: vec![CategoryConfig {
            name: "derived".into(),
            members: vec![CategoryMemberConfig {
                check: "y-identity".into(),
                weight: 1.0,
            }],
        }],
    }
}

#[tokio::test]
async fn test_end_to_end_derived_artifact_flows_into_check() {
    let (session, _browser) = loading_browser();
    let log = Arc::new(Mutex::new(Vec::new()));

    let result = run(&session, &x_config(), &x_catalog(log)).await.unwrap();

    // The raw artifact, the derived artifact, and the check all line up.
    let raw_x = result.artifacts.raw.get("X").unwrap().value().unwrap();
    assert_eq!(raw_x.as_f64(), Some(200.0));
    assert_eq!(result.artifacts.computed["Y"].as_f64(), Some(100.0));

    match &result.checks["y-identity"] {
        CheckOutcome::Scored { raw_value, score, .. } => {
            assert_eq!(*raw_value, RawValue::Number(100.0));
            assert!(*score >= 0.0 && *score <= 1.0);
        }
        other => panic!("expected Scored, got {other:?}"),
    }
    assert!(matches!(
        result.categories["derived"].score,
        CategoryScore::Scored { .. }
    ));
}

#[tokio::test]
async fn test_aborted_run_still_reports_partial_results() {
    let (session, _browser) = loading_browser();
    let log: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));

    let mut config = x_config();
    config.passes.push(pass_config("second", &["Doomed"]));

    let log_for_catalog = Arc::clone(&log);
    let mut catalog = x_catalog(log_for_catalog);
    let doomed_log = Arc::clone(&log);
    let base = std::mem::replace(&mut catalog.collectors, Box::new(|_| None));
    catalog.collectors = Box::new(move |name| match name {
        "Doomed" => Some(Box::new(
            StubCollector::new("Doomed", Value::Null, Arc::clone(&doomed_log)).failing_before(),
        ) as Box<dyn Collector>),
        other => base(other),
    });

    let err = run(&session, &config, &catalog).await.unwrap_err();
    match err {
        RunError::Aborted { result, .. } => {
            // Pass one finished, so its artifacts and derived values are
            // there for diagnosis.
            assert!(result.artifacts.raw.contains("X"));
            assert_eq!(result.artifacts.computed["Y"].as_f64(), Some(100.0));
            assert!(matches!(
                result.checks["y-identity"],
                CheckOutcome::Scored { .. }
            ));
        }
        other => panic!("expected Aborted, got {other:?}"),
    }
}

#[tokio::test]
async fn test_unknown_collector_is_a_config_error() {
    let (session, browser) = loading_browser();
    let log = Arc::new(Mutex::new(Vec::new()));

    let mut config = x_config();
    config.passes[0].collectors.push("NoSuchCollector".into());

    let err = run(&session, &config, &x_catalog(log)).await.unwrap_err();
    assert!(matches!(err, RunError::UnknownCollector { .. }));
    assert!(browser.sent_commands().is_empty());
}

#[tokio::test]
async fn test_unknown_check_is_a_config_error() {
    let (session, _browser) = loading_browser();
    let log = Arc::new(Mutex::new(Vec::new()));

    let mut config = x_config();
    config.checks[0].name = "y-identity".into();
    config.checks.push(CheckConfig {
        name: "not-in-catalog".into(),
        weight: None,
    });
    config.categories.clear();

    let err = run(&session, &config, &x_catalog(log)).await.unwrap_err();
    assert!(matches!(err, RunError::UnknownCheck { .. }));
}

// ---------------------------------------------------------------------------
// Default catalog over a recorded pass
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_default_catalog_scores_a_recorded_pass() {
    let (session, _browser) = loading_browser();

    let mut pass = pass_config("default", &["FinalUrl", "ConsoleMessages"]);
    pass.record_network = true;
    pass.record_trace = true;
    pass.disable_cache = true;

    let config = RunConfig {
        url: URL.to_string(),
        passes: vec![pass],
        ..RunConfig::default()
    };

    let result = run(&session, &config, &Catalog::default()).await.unwrap();

    // Collectors.
    let final_url = result.artifacts.raw.get("FinalUrl").unwrap().value().unwrap();
    assert_eq!(final_url.as_str(), Some(URL));

    // Derived artifacts materialized on demand; raw names stay raw.
    assert!(result.artifacts.computed.contains_key("TraceModel"));
    assert!(!result.artifacts.computed.contains_key("NetworkRecords"));

    // first-paint-latency: 1234 ms against the 4000/1600 curve.
    match &result.checks["first-paint-latency"] {
        CheckOutcome::Scored { raw_value, score, .. } => {
            assert_eq!(*raw_value, RawValue::Number(1234.0));
            assert!(*score > 0.9, "1234ms should score high, got {score}");
        }
        other => panic!("expected Scored, got {other:?}"),
    }

    // all-requests-secure: the single https document passes.
    match &result.checks["all-requests-secure"] {
        CheckOutcome::Scored { raw_value, score, .. } => {
            assert_eq!(*raw_value, RawValue::Bool(true));
            assert_eq!(*score, 1.0);
        }
        other => panic!("expected Scored, got {other:?}"),
    }

    // critical-chain-depth: one document chain.
    match &result.checks["critical-chain-depth"] {
        CheckOutcome::Scored { raw_value, .. } => {
            assert_eq!(*raw_value, RawValue::Number(1.0));
        }
        other => panic!("expected Scored, got {other:?}"),
    }

    match result.categories["performance"].score {
        CategoryScore::Scored { score } => assert!(score > 0.9, "got {score}"),
        CategoryScore::Unscored => panic!("category should be scored"),
    }
}

#[tokio::test]
async fn test_unscored_category_when_nothing_recorded() {
    // No recording: every builtin check misses its artifact.
    let (session, _browser) = loading_browser();

    let config = RunConfig {
        url: URL.to_string(),
        passes: vec![pass_config("default", &["FinalUrl"])],
        ..RunConfig::default()
    };

    let result = run(&session, &config, &Catalog::default()).await.unwrap();

    for name in ["first-paint-latency", "all-requests-secure", "critical-chain-depth"] {
        assert!(
            matches!(result.checks[name], CheckOutcome::NotApplicable { .. }),
            "{name} should be skipped"
        );
    }
    assert_eq!(result.categories["performance"].score, CategoryScore::Unscored);
    // Sanity: builtin catalog really carries these checks.
    assert_eq!(builtin_checks().len(), 3);
    assert_eq!(builtin_derivations().len(), 3);
}
