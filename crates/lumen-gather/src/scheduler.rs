//! Pass execution.
//!
//! [`run_passes`] drives each configured pass through its lifecycle against
//! one session: environment, before hooks, recording, navigation, pass
//! hooks, settle, after hooks. Passes never run concurrently and never
//! retry; a fatal failure returns immediately with the partial store.

use std::time::Duration;

use serde_json::Value;

use lumen_protocol::Session;
use lumen_types::{ArtifactEntry, ArtifactStore, NetworkCondition, PassConfig, DEFAULT_PASS};

use crate::capture::{NetworkRecorder, TraceRecorder};
use crate::collector::{Collector, PassCapture, PassContext};
use crate::error::{GatherError, GatherFailure};
use crate::pass::PassState;

const DRIVER_CALL_TIMEOUT: Duration = Duration::from_secs(10);

/// One pass plus its instantiated collectors, in invocation order.
pub struct PassPlan {
    pub config: PassConfig,
    pub collectors: Vec<Box<dyn Collector>>,
}

/// Run every pass in order, producing the run's raw artifact store.
///
/// Collector artifact names must be unique across the whole run; a
/// collision is a configuration error reported before anything executes.
pub async fn run_passes(
    session: &Session,
    url: &str,
    mut passes: Vec<PassPlan>,
) -> Result<ArtifactStore, GatherFailure> {
    let mut store = ArtifactStore::new();
    match run_inner(session, url, &mut passes, &mut store).await {
        Ok(()) => Ok(store),
        Err(error) => Err(GatherFailure {
            error,
            partial: store,
        }),
    }
}

async fn run_inner(
    session: &Session,
    url: &str,
    passes: &mut [PassPlan],
    store: &mut ArtifactStore,
) -> Result<(), GatherError> {
    check_collector_names(passes)?;

    for plan in passes.iter_mut() {
        tracing::info!(pass = %plan.config.name, "starting pass");
        run_pass(session, url, plan, store).await?;
        tracing::info!(pass = %plan.config.name, "pass complete");
    }
    Ok(())
}

/// Reject runs where two collectors claim the same artifact name, before
/// any browser work happens.
fn check_collector_names(passes: &[PassPlan]) -> Result<(), GatherError> {
    let mut seen = std::collections::HashSet::new();
    for plan in passes {
        for collector in &plan.collectors {
            if !seen.insert(collector.name().to_string()) {
                return Err(GatherError::DuplicateArtifact(
                    lumen_types::DuplicateArtifact {
                        name: collector.name().to_string(),
                    },
                ));
            }
        }
    }
    Ok(())
}

async fn run_pass(
    session: &Session,
    url: &str,
    plan: &mut PassPlan,
    store: &mut ArtifactStore,
) -> Result<(), GatherError> {
    let config = plan.config.clone();
    let pass_name = config.name.clone();
    let mut state = PassState::Idle;

    // 1. Environment: throttling, cache policy. Fatal on failure.
    setup_environment(session, &config)
        .await
        .map_err(|source| GatherError::EnvironmentSetup {
            pass: pass_name.clone(),
            source,
        })?;
    state.advance(PassState::EnvironmentConfigured);

    let ctx = PassContext {
        session,
        url,
        pass: &config,
    };

    // 2. before_pass hooks, sequentially, in declared order.
    for collector in plan.collectors.iter_mut() {
        let name = collector.name().to_string();
        collector
            .before_pass(&ctx)
            .await
            .map_err(|source| GatherError::CollectorHook {
                pass: pass_name.clone(),
                collector: name,
                hook: "before_pass",
                source,
            })?;
    }
    state.advance(PassState::BeforeHooksRun);

    // 3. Recording starts before navigation so the capture covers the
    // whole load. A recorder that fails to start invalidates the pass's
    // environment.
    let network_recorder = if config.record_network {
        Some(NetworkRecorder::attach(session).await.map_err(|source| {
            GatherError::EnvironmentSetup {
                pass: pass_name.clone(),
                source,
            }
        })?)
    } else {
        None
    };
    let trace_recorder = if config.record_trace {
        Some(TraceRecorder::start(session).await.map_err(|source| {
            GatherError::EnvironmentSetup {
                pass: pass_name.clone(),
                source,
            }
        })?)
    } else {
        None
    };

    // 4. Navigate, gated on the load-complete signal with a maximum wait.
    // The waiter is armed before the command so a fast load can't be missed.
    if config.navigate {
        let load_fired = session.event_waiter("Page.loadEventFired");
        let result = session
            .send(
                "Page.navigate",
                serde_json::json!({ "url": url }),
                DRIVER_CALL_TIMEOUT,
            )
            .await
            .map_err(|e| GatherError::Navigation {
                pass: pass_name.clone(),
                detail: e.to_string(),
            })?;
        if let Some(error_text) = result.get("errorText").and_then(Value::as_str) {
            if !error_text.is_empty() {
                return Err(GatherError::Navigation {
                    pass: pass_name.clone(),
                    detail: error_text.to_string(),
                });
            }
        }

        match tokio::time::timeout(config.load_timeout(), load_fired).await {
            Ok(Ok(_)) => {}
            Ok(Err(_)) => return Err(lumen_protocol::ProtocolError::ConnectionClosed.into()),
            Err(_) => {
                // Not fatal: keep whatever loaded within the window.
                tracing::warn!(
                    pass = %pass_name,
                    timeout_ms = config.load_timeout_ms,
                    "load event did not fire in time, continuing with partial capture"
                );
            }
        }
    }
    state.advance(PassState::Navigated);

    // 5. pass hooks, sequentially, after every before_pass completed.
    for collector in plan.collectors.iter_mut() {
        let name = collector.name().to_string();
        collector
            .pass(&ctx)
            .await
            .map_err(|source| GatherError::CollectorHook {
                pass: pass_name.clone(),
                collector: name,
                hook: "pass",
                source,
            })?;
    }

    // 6. Let post-load asynchronous work land, then stop recording and
    // publish the capture artifacts.
    let mut network_records = Vec::new();
    let mut trace_capture = lumen_types::TraceCapture::default();
    if network_recorder.is_some() || trace_recorder.is_some() {
        state.advance(PassState::Recording);
        if config.settle_delay_ms > 0 {
            tokio::time::sleep(config.settle_delay()).await;
        }

        if let Some(recorder) = network_recorder {
            network_records = recorder.collect();
            store.insert(
                capture_artifact_name("NetworkRecords", &pass_name),
                to_artifact(&network_records),
            )?;
        }
        if let Some(recorder) = trace_recorder {
            let name = capture_artifact_name("Trace", &pass_name);
            match recorder.stop(session).await {
                Ok(capture) => {
                    trace_capture = capture;
                    store.insert(name, to_artifact(&trace_capture))?;
                }
                Err(e) => {
                    tracing::warn!(pass = %pass_name, error = %e, "trace retrieval failed");
                    store.insert(name, ArtifactEntry::unavailable(e.to_string()))?;
                }
            }
        }
    }

    // 7. after_pass hooks, sequentially. Failures degrade to unavailable
    // markers; the run continues.
    for collector in plan.collectors.iter_mut() {
        let outcome = {
            let capture = PassCapture {
                network: &network_records,
                trace: &trace_capture,
                prior: &*store,
            };
            collector.after_pass(&ctx, &capture).await
        };
        let name = collector.name().to_string();
        let entry = match outcome {
            Ok(value) => ArtifactEntry::present(value),
            Err(e) => {
                tracing::warn!(pass = %pass_name, collector = %name, error = %e,
                    "after_pass failed, artifact unavailable");
                ArtifactEntry::unavailable(e.to_string())
            }
        };
        store.insert(name, entry)?;
    }
    state.advance(PassState::AfterHooksRun);

    state.advance(PassState::Complete);
    Ok(())
}

/// The pass named `default` publishes under the plain capture names; other
/// recording passes qualify them.
fn capture_artifact_name(base: &str, pass: &str) -> String {
    if pass == DEFAULT_PASS {
        base.to_string()
    } else {
        format!("{base}:{pass}")
    }
}

fn to_artifact(value: &impl serde::Serialize) -> ArtifactEntry {
    match serde_json::to_value(value) {
        Ok(value) => ArtifactEntry::present(value),
        Err(e) => ArtifactEntry::unavailable(format!("capture serialization failed: {e}")),
    }
}

/// Apply the pass's network condition and cache policy via driver commands.
async fn setup_environment(
    session: &Session,
    config: &PassConfig,
) -> Result<(), lumen_protocol::ProtocolError> {
    session
        .send("Page.enable", serde_json::json!({}), DRIVER_CALL_TIMEOUT)
        .await?;

    let needs_network_domain =
        config.disable_cache || !matches!(config.network, NetworkCondition::None);
    if needs_network_domain {
        session
            .send("Network.enable", serde_json::json!({}), DRIVER_CALL_TIMEOUT)
            .await?;
    }

    match &config.network {
        NetworkCondition::None => {}
        NetworkCondition::Offline => {
            session
                .send(
                    "Network.emulateNetworkConditions",
                    serde_json::json!({
                        "offline": true,
                        "latency": 0,
                        "downloadThroughput": 0,
                        "uploadThroughput": 0,
                    }),
                    DRIVER_CALL_TIMEOUT,
                )
                .await?;
        }
        NetworkCondition::Throttled {
            latency_ms,
            download_kbps,
            upload_kbps,
        } => {
            session
                .send(
                    "Network.emulateNetworkConditions",
                    serde_json::json!({
                        "offline": false,
                        "latency": latency_ms,
                        // kbit/s on the config surface, bytes/s on the wire.
                        "downloadThroughput": download_kbps * 1024 / 8,
                        "uploadThroughput": upload_kbps * 1024 / 8,
                    }),
                    DRIVER_CALL_TIMEOUT,
                )
                .await?;
        }
    }

    if config.disable_cache {
        session
            .send(
                "Network.setCacheDisabled",
                serde_json::json!({ "cacheDisabled": true }),
                DRIVER_CALL_TIMEOUT,
            )
            .await?;
    }

    Ok(())
}
