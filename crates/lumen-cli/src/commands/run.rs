//! `lumen run` -- execute a full instrumentation run and emit the result
//! as JSON on stdout.

use std::path::PathBuf;

use anyhow::Context;

use lumen_protocol::Session;
use lumen_runner::{Catalog, RunError, RunResult};
use lumen_types::ConfigLoader;

pub async fn execute(
    endpoint: &str,
    url: Option<String>,
    config_path: Option<PathBuf>,
) -> anyhow::Result<()> {
    let mut loader = ConfigLoader::new();
    if let Some(path) = config_path {
        loader = loader.with_path(path);
    }
    let mut config = loader
        .load_unchecked()
        .context("failed to load run config")?;
    if let Some(url) = url {
        config.url = url;
    }
    // Validation runs inside lumen_runner::run once overrides are applied.

    // A connection failure before any pass is the one hard failure with no
    // result object.
    let session = Session::connect(endpoint)
        .await
        .context("could not reach the browser session")?;

    let outcome = lumen_runner::run(&session, &config, &Catalog::default()).await;
    session.disconnect().await;

    match outcome {
        Ok(result) => {
            emit(&result)?;
            Ok(())
        }
        Err(RunError::Aborted { error, result }) => {
            // Best effort: the partial result still goes to stdout.
            emit(&result)?;
            Err(anyhow::anyhow!(error)).context("run aborted; partial results were emitted")
        }
        Err(e) => Err(e.into()),
    }
}

fn emit(result: &RunResult) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(result).context("failed to serialize run result")?;
    println!("{json}");
    Ok(())
}
