//! The run pipeline: gather -> graph -> checks -> categories.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use lumen_compute::{builtin_derivations, Derivation, Graph};
use lumen_gather::{run_passes, Collector, GatherError, PassPlan};
use lumen_protocol::Session;
use lumen_score::{aggregate, builtin_checks, run_check, CategoryResult, Check, CheckOutcome};
use lumen_types::{ArtifactStore, ConfigError, RunConfig, RunId};

/// Resolver from configured collector name to instance.
pub type CollectorResolver = Box<dyn Fn(&str) -> Option<Box<dyn Collector>> + Send + Sync>;

/// The plugin catalogs a run draws from. Embedding tools extend the
/// defaults with their own collectors, derivations, and checks.
pub struct Catalog {
    pub checks: Vec<Arc<dyn Check>>,
    pub derivations: Vec<Arc<dyn Derivation>>,
    pub collectors: CollectorResolver,
}

impl Default for Catalog {
    fn default() -> Self {
        Catalog {
            checks: builtin_checks(),
            derivations: builtin_derivations(),
            collectors: Box::new(lumen_gather::collectors::resolve),
        }
    }
}

impl Catalog {
    fn check_named(&self, name: &str) -> Option<Arc<dyn Check>> {
        self.checks.iter().find(|c| c.name() == name).cloned()
    }
}

/// Raw and computed artifacts, as reported to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct ArtifactsReport {
    pub raw: ArtifactStore,
    pub computed: BTreeMap<String, Value>,
}

/// Everything one run produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub run_id: RunId,
    pub url: String,
    pub fetched_at: DateTime<Utc>,
    pub artifacts: ArtifactsReport,
    pub checks: BTreeMap<String, CheckOutcome>,
    pub categories: BTreeMap<String, CategoryResult>,
}

/// Errors surfaced to the operator.
///
/// `Aborted` still carries a best-effort result: checks were executed over
/// whatever artifacts materialized before the failure.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("pass '{pass}' references unknown collector '{name}'")]
    UnknownCollector { pass: String, name: String },

    #[error("configured check '{name}' is not in the catalog")]
    UnknownCheck { name: String },

    #[error("run aborted: {error}")]
    Aborted {
        error: GatherError,
        result: Box<RunResult>,
    },
}

/// Execute one full run against a connected session.
pub async fn run(
    session: &Session,
    config: &RunConfig,
    catalog: &Catalog,
) -> Result<RunResult, RunError> {
    config.validate()?;

    // Resolve configured names against the catalogs up front, so a bad
    // config fails before any browser work.
    let mut plans = Vec::with_capacity(config.passes.len());
    for pass in &config.passes {
        let mut collectors = Vec::with_capacity(pass.collectors.len());
        for name in &pass.collectors {
            let collector =
                (catalog.collectors)(name).ok_or_else(|| RunError::UnknownCollector {
                    pass: pass.name.clone(),
                    name: name.clone(),
                })?;
            collectors.push(collector);
        }
        plans.push(PassPlan {
            config: pass.clone(),
            collectors,
        });
    }
    for check in &config.checks {
        if catalog.check_named(&check.name).is_none() {
            return Err(RunError::UnknownCheck {
                name: check.name.clone(),
            });
        }
    }

    let run_id = RunId::new();
    tracing::info!(%run_id, url = %config.url, passes = config.passes.len(), "starting run");

    let gathered = run_passes(session, &config.url, plans).await;
    let (raw, abort) = match gathered {
        Ok(store) => (store, None),
        Err(failure) => {
            tracing::warn!(error = %failure.error, "gather aborted, scoring partial artifacts");
            (failure.partial, Some(failure.error))
        }
    };

    let result = score_artifacts(run_id, config, catalog, raw).await;

    match abort {
        None => Ok(result),
        Some(error) => Err(RunError::Aborted {
            error,
            result: Box::new(result),
        }),
    }
}

/// Build the graph over the raw store, execute every configured check, and
/// aggregate categories. Used for complete and partial stores alike.
async fn score_artifacts(
    run_id: RunId,
    config: &RunConfig,
    catalog: &Catalog,
    raw: ArtifactStore,
) -> RunResult {
    let raw = Arc::new(raw);
    let graph = Graph::new(Arc::clone(&raw)).with_derivations(catalog.derivations.clone());

    let mut checks = BTreeMap::new();
    for check_config in &config.checks {
        // Presence was validated before the run started.
        let Some(check) = catalog.check_named(&check_config.name) else {
            continue;
        };
        let outcome = run_check(check.as_ref(), &graph).await;
        checks.insert(check_config.name.clone(), outcome);
    }

    // A check-level weight override takes precedence over the weight its
    // category members declare.
    let overrides: BTreeMap<&str, f64> = config
        .checks
        .iter()
        .filter_map(|c| c.weight.map(|w| (c.name.as_str(), w)))
        .collect();

    let mut categories = BTreeMap::new();
    for category in &config.categories {
        let members: Vec<(String, f64, &CheckOutcome)> = category
            .members
            .iter()
            .filter_map(|member| {
                let weight = overrides
                    .get(member.check.as_str())
                    .copied()
                    .unwrap_or(member.weight);
                checks
                    .get(&member.check)
                    .map(|outcome| (member.check.clone(), weight, outcome))
            })
            .collect();
        categories.insert(category.name.clone(), aggregate(&members));
    }

    RunResult {
        run_id,
        url: config.url.clone(),
        fetched_at: Utc::now(),
        artifacts: ArtifactsReport {
            raw: ArtifactStore::clone(&raw),
            computed: graph.computed_snapshot(),
        },
        checks,
        categories,
    }
}
