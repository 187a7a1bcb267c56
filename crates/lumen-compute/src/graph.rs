//! The memoized computation graph.
//!
//! One cell per computed-artifact name, holding either the terminal outcome
//! or the waiter list of an in-flight computation. The cell map is the only
//! shared state and is never held across an await.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::oneshot;

use lumen_types::{ArtifactEntry, ArtifactStore};

use crate::error::{ComputeError, DerivationError};

/// The resolved inputs handed to a derivation: input name -> value.
#[derive(Debug, Default)]
pub struct InputSet {
    values: HashMap<String, Arc<Value>>,
}

impl InputSet {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name).map(Arc::as_ref)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Arc<Value>) {
        self.values.insert(name.into(), value);
    }

    /// Deserialize an input into a typed model. Malformed data is a
    /// derivation failure, not a panic.
    pub fn decode<T: DeserializeOwned>(&self, name: &str) -> Result<T, DerivationError> {
        let value = self
            .values
            .get(name)
            .ok_or_else(|| DerivationError::new(format!("input '{name}' was not resolved")))?;
        serde_json::from_value(Value::clone(value))
            .map_err(|e| DerivationError::new(format!("input '{name}' is malformed: {e}")))
    }
}

/// A named function of other artifacts.
///
/// Derivations must be pure with respect to the run's artifact set: given
/// the same inputs they produce equivalent output. The memoization contract
/// depends on it.
#[async_trait]
pub trait Derivation: Send + Sync {
    fn name(&self) -> &str;

    /// Input artifact names, raw or computed.
    fn inputs(&self) -> Vec<String>;

    async fn derive(&self, inputs: &InputSet) -> Result<Value, DerivationError>;
}

type Outcome = Result<Arc<Value>, ComputeError>;

enum Cell {
    InProgress(Vec<oneshot::Sender<Outcome>>),
    Terminal(Outcome),
}

/// The per-run artifact graph: the raw store plus memoized derivations.
pub struct Graph {
    raw: Arc<ArtifactStore>,
    derivations: HashMap<String, Arc<dyn Derivation>>,
    cells: Mutex<HashMap<String, Cell>>,
}

impl Graph {
    pub fn new(raw: Arc<ArtifactStore>) -> Self {
        Self {
            raw,
            derivations: HashMap::new(),
            cells: Mutex::new(HashMap::new()),
        }
    }

    /// Register a derivation. Re-registering a name replaces the earlier
    /// definition and is almost certainly a configuration mistake, so it
    /// is logged.
    pub fn register(&mut self, derivation: Arc<dyn Derivation>) -> &mut Self {
        let name = derivation.name().to_string();
        if self.derivations.insert(name.clone(), derivation).is_some() {
            tracing::warn!(artifact = %name, "derivation re-registered, replacing earlier definition");
        }
        self
    }

    pub fn with_derivations(mut self, derivations: Vec<Arc<dyn Derivation>>) -> Self {
        for derivation in derivations {
            self.register(derivation);
        }
        self
    }

    /// Resolve an artifact name: raw artifacts are returned directly,
    /// computed artifacts are derived at most once per run.
    pub async fn request(&self, name: &str) -> Result<Arc<Value>, ComputeError> {
        self.request_chained(name, &[]).await
    }

    /// Snapshot of every successfully materialized computed artifact.
    pub fn computed_snapshot(&self) -> BTreeMap<String, Value> {
        let cells = self.cells.lock().expect("cell map lock poisoned");
        cells
            .iter()
            .filter_map(|(name, cell)| match cell {
                Cell::Terminal(Ok(value)) => Some((name.clone(), Value::clone(value))),
                _ => None,
            })
            .collect()
    }

    fn request_chained<'a>(
        &'a self,
        name: &'a str,
        chain: &'a [String],
    ) -> BoxFuture<'a, Outcome> {
        Box::pin(async move {
            // Raw artifacts short-circuit the graph entirely.
            if let Some(entry) = self.raw.get(name) {
                return match entry {
                    ArtifactEntry::Present { value } => Ok(Arc::clone(value)),
                    ArtifactEntry::Unavailable { debug } => Err(ComputeError::MissingArtifact {
                        name: name.to_string(),
                        debug: Some(debug.clone()),
                    }),
                };
            }

            let Some(derivation) = self.derivations.get(name) else {
                return Err(ComputeError::MissingArtifact {
                    name: name.to_string(),
                    debug: None,
                });
            };

            // Cycle check before touching the cell: a name already on the
            // chain is in-flight further up this very request, and joining
            // its waiter list would deadlock.
            if chain.iter().any(|ancestor| ancestor == name) {
                let mut cycle = chain.to_vec();
                cycle.push(name.to_string());
                return Err(ComputeError::CyclicDependency { chain: cycle });
            }

            enum Role {
                Compute,
                Wait(oneshot::Receiver<Outcome>),
                Done(Outcome),
            }

            let role = {
                let mut cells = self.cells.lock().expect("cell map lock poisoned");
                match cells.get_mut(name) {
                    Some(Cell::Terminal(outcome)) => Role::Done(outcome.clone()),
                    Some(Cell::InProgress(waiters)) => {
                        let (tx, rx) = oneshot::channel();
                        waiters.push(tx);
                        Role::Wait(rx)
                    }
                    None => {
                        cells.insert(name.to_string(), Cell::InProgress(Vec::new()));
                        Role::Compute
                    }
                }
            };

            match role {
                Role::Done(outcome) => outcome,
                Role::Wait(rx) => match rx.await {
                    Ok(outcome) => outcome,
                    Err(_) => Err(ComputeError::Derivation {
                        name: name.to_string(),
                        detail: "computation was abandoned".to_string(),
                    }),
                },
                Role::Compute => {
                    tracing::debug!(artifact = %name, "computing artifact");
                    let outcome = self.compute(name, Arc::clone(derivation), chain).await;

                    let waiters = {
                        let mut cells = self.cells.lock().expect("cell map lock poisoned");
                        match cells.insert(name.to_string(), Cell::Terminal(outcome.clone())) {
                            Some(Cell::InProgress(waiters)) => waiters,
                            _ => Vec::new(),
                        }
                    };
                    for waiter in waiters {
                        let _ = waiter.send(outcome.clone());
                    }
                    outcome
                }
            }
        })
    }

    async fn compute(
        &self,
        name: &str,
        derivation: Arc<dyn Derivation>,
        chain: &[String],
    ) -> Outcome {
        let mut extended = chain.to_vec();
        extended.push(name.to_string());

        let mut inputs = InputSet::default();
        for input in derivation.inputs() {
            let value = self.request_chained(&input, &extended).await?;
            inputs.insert(input, value);
        }

        derivation
            .derive(&inputs)
            .await
            .map(Arc::new)
            .map_err(|e| ComputeError::Derivation {
                name: name.to_string(),
                detail: e.detail,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Test derivation with a call counter and configurable behavior.
    struct Counting {
        name: &'static str,
        inputs: Vec<String>,
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl Derivation for Counting {
        fn name(&self) -> &str {
            self.name
        }

        fn inputs(&self) -> Vec<String> {
            self.inputs.clone()
        }

        async fn derive(&self, inputs: &InputSet) -> Result<Value, DerivationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            // Yield so concurrent requesters genuinely overlap.
            tokio::task::yield_now().await;
            if self.fail {
                return Err(DerivationError::new("synthetic failure"));
            }
            let sum: i64 = self
                .inputs
                .iter()
                .filter_map(|name| inputs.get(name))
                .filter_map(Value::as_i64)
                .sum();
            Ok(Value::from(sum / 2))
        }
    }

    fn graph_with(derivations: Vec<Counting>) -> Graph {
        let mut raw = ArtifactStore::new();
        raw.insert("X", ArtifactEntry::present(Value::from(200)))
            .unwrap();
        raw.insert("Broken", ArtifactEntry::unavailable("collector exploded"))
            .unwrap();
        Graph::new(Arc::new(raw)).with_derivations(
            derivations
                .into_iter()
                .map(|d| Arc::new(d) as Arc<dyn Derivation>)
                .collect(),
        )
    }

    fn halver(name: &'static str, inputs: &[&str], calls: &Arc<AtomicUsize>) -> Counting {
        Counting {
            name,
            inputs: inputs.iter().map(|s| s.to_string()).collect(),
            calls: Arc::clone(calls),
            fail: false,
        }
    }

    #[tokio::test]
    async fn test_raw_artifact_returned_directly() {
        let graph = graph_with(vec![]);
        let value = graph.request("X").await.unwrap();
        assert_eq!(value.as_i64(), Some(200));
    }

    #[tokio::test]
    async fn test_unknown_name_is_missing() {
        let graph = graph_with(vec![]);
        let err = graph.request("Nope").await.unwrap_err();
        assert!(matches!(err, ComputeError::MissingArtifact { debug: None, .. }));
    }

    #[tokio::test]
    async fn test_unavailable_raw_carries_debug() {
        let graph = graph_with(vec![]);
        let err = graph.request("Broken").await.unwrap_err();
        match err {
            ComputeError::MissingArtifact { debug, .. } => {
                assert_eq!(debug.as_deref(), Some("collector exploded"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_derivation_runs_once_for_sequential_requests() {
        let calls = Arc::new(AtomicUsize::new(0));
        let graph = graph_with(vec![halver("Y", &["X"], &calls)]);

        for _ in 0..3 {
            let value = graph.request("Y").await.unwrap();
            assert_eq!(value.as_i64(), Some(100));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_derivation_runs_once_under_concurrent_requests() {
        let calls = Arc::new(AtomicUsize::new(0));
        let graph = Arc::new(graph_with(vec![halver("Y", &["X"], &calls)]));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let graph = Arc::clone(&graph);
            handles.push(tokio::spawn(async move {
                graph.request("Y").await.unwrap().as_i64().unwrap()
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap(), 100);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_deep_chains_resolve() {
        let calls = Arc::new(AtomicUsize::new(0));
        // Z = Y/2 = X/4
        let graph = graph_with(vec![
            halver("Y", &["X"], &calls),
            halver("Z", &["Y"], &calls),
        ]);
        let value = graph.request("Z").await.unwrap();
        assert_eq!(value.as_i64(), Some(50));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failures_are_cached() {
        let calls = Arc::new(AtomicUsize::new(0));
        let graph = graph_with(vec![Counting {
            name: "Flaky",
            inputs: vec!["X".into()],
            calls: Arc::clone(&calls),
            fail: true,
        }]);

        for _ in 0..3 {
            let err = graph.request("Flaky").await.unwrap_err();
            assert!(matches!(err, ComputeError::Derivation { .. }));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1, "failure must not recompute");
    }

    #[tokio::test]
    async fn test_failure_propagates_to_dependents() {
        let calls = Arc::new(AtomicUsize::new(0));
        let graph = graph_with(vec![
            Counting {
                name: "Flaky",
                inputs: vec!["X".into()],
                calls: Arc::clone(&calls),
                fail: true,
            },
            halver("OnFlaky", &["Flaky"], &calls),
        ]);
        let err = graph.request("OnFlaky").await.unwrap_err();
        assert!(matches!(err, ComputeError::Derivation { ref name, .. } if name == "Flaky"));
    }

    #[tokio::test]
    async fn test_cycle_fails_in_bounded_time() {
        let calls = Arc::new(AtomicUsize::new(0));
        let graph = graph_with(vec![
            halver("A", &["B"], &calls),
            halver("B", &["A"], &calls),
        ]);

        let outcome = tokio::time::timeout(Duration::from_secs(2), graph.request("A"))
            .await
            .expect("cycle detection must not hang");
        match outcome.unwrap_err() {
            ComputeError::Derivation { name, detail } => {
                assert_eq!(name, "A");
                assert!(detail.contains("cyclic"), "unexpected detail: {detail}");
            }
            ComputeError::CyclicDependency { chain } => {
                assert_eq!(chain.first().map(String::as_str), Some("A"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_self_cycle_fails() {
        let calls = Arc::new(AtomicUsize::new(0));
        let graph = graph_with(vec![halver("Selfish", &["Selfish"], &calls)]);
        let outcome = tokio::time::timeout(Duration::from_secs(2), graph.request("Selfish"))
            .await
            .expect("self-cycle must not hang");
        assert!(outcome.is_err());
    }

    #[tokio::test]
    async fn test_computed_snapshot_contains_only_successes() {
        let calls = Arc::new(AtomicUsize::new(0));
        let graph = graph_with(vec![
            halver("Y", &["X"], &calls),
            Counting {
                name: "Flaky",
                inputs: vec!["X".into()],
                calls: Arc::clone(&calls),
                fail: true,
            },
        ]);
        graph.request("Y").await.unwrap();
        let _ = graph.request("Flaky").await;

        let snapshot = graph.computed_snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot["Y"].as_i64(), Some(100));
    }
}
