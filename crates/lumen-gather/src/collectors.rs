//! Built-in collectors.
//!
//! The full collector catalog lives with the embedding tool; these two ship
//! with the scheduler because the default pass uses them and they exercise
//! both halves of the lifecycle contract: `FinalUrl` is a pure `after_pass`
//! collector, `ConsoleMessages` installs its page-level listener in
//! `before_pass`.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use lumen_protocol::Session;

use crate::collector::{Collector, CollectorError, PassCapture, PassContext};

const EVALUATE_TIMEOUT: Duration = Duration::from_secs(10);

/// Evaluate a JavaScript expression in the page and return its value.
async fn evaluate(session: &Session, expression: &str) -> Result<Value, CollectorError> {
    let result = session
        .send(
            "Runtime.evaluate",
            serde_json::json!({
                "expression": expression,
                "returnByValue": true,
            }),
            EVALUATE_TIMEOUT,
        )
        .await?;

    if let Some(exception) = result.get("exceptionDetails") {
        let message = exception
            .pointer("/exception/description")
            .or_else(|| exception.get("text"))
            .and_then(Value::as_str)
            .unwrap_or("unknown exception");
        return Err(CollectorError::failed(format!(
            "page evaluation threw: {message}"
        )));
    }

    Ok(result
        .pointer("/result/value")
        .cloned()
        .unwrap_or(Value::Null))
}

/// Captures the URL the page actually landed on after redirects.
#[derive(Debug, Default)]
pub struct FinalUrlCollector;

#[async_trait]
impl Collector for FinalUrlCollector {
    fn name(&self) -> &str {
        "FinalUrl"
    }

    async fn after_pass(
        &mut self,
        ctx: &PassContext<'_>,
        _capture: &PassCapture<'_>,
    ) -> Result<Value, CollectorError> {
        let value = evaluate(ctx.session, "window.location.href").await?;
        match value {
            Value::String(_) => Ok(value),
            other => Err(CollectorError::failed(format!(
                "location.href evaluated to non-string: {other}"
            ))),
        }
    }
}

/// Captures console output emitted while the page loads.
///
/// The listener is installed in `before_pass` so messages logged during
/// navigation are not missed.
#[derive(Debug, Default)]
pub struct ConsoleMessagesCollector {
    messages: Arc<Mutex<Vec<Value>>>,
}

#[async_trait]
impl Collector for ConsoleMessagesCollector {
    fn name(&self) -> &str {
        "ConsoleMessages"
    }

    async fn before_pass(&mut self, ctx: &PassContext<'_>) -> Result<(), CollectorError> {
        ctx.session
            .send("Runtime.enable", serde_json::json!({}), EVALUATE_TIMEOUT)
            .await?;

        let messages = Arc::clone(&self.messages);
        ctx.session.on(
            "Runtime.consoleAPICalled",
            Arc::new(move |params: &Value| {
                let kind = params
                    .get("type")
                    .and_then(Value::as_str)
                    .unwrap_or("log")
                    .to_string();
                let text = params
                    .get("args")
                    .and_then(Value::as_array)
                    .map(|args| {
                        args.iter()
                            .filter_map(|arg| arg.get("value"))
                            .map(|v| match v {
                                Value::String(s) => s.clone(),
                                other => other.to_string(),
                            })
                            .collect::<Vec<_>>()
                            .join(" ")
                    })
                    .unwrap_or_default();
                messages
                    .lock()
                    .expect("console buffer lock poisoned")
                    .push(serde_json::json!({ "type": kind, "text": text }));
                Ok(())
            }),
        );
        Ok(())
    }

    async fn after_pass(
        &mut self,
        _ctx: &PassContext<'_>,
        _capture: &PassCapture<'_>,
    ) -> Result<Value, CollectorError> {
        let messages = self
            .messages
            .lock()
            .expect("console buffer lock poisoned")
            .clone();
        Ok(Value::Array(messages))
    }
}

/// Resolve a configured collector name to an instance. Unknown names are a
/// configuration error surfaced by the caller.
pub fn resolve(name: &str) -> Option<Box<dyn Collector>> {
    match name {
        "FinalUrl" => Some(Box::new(FinalUrlCollector)),
        "ConsoleMessages" => Some(Box::new(ConsoleMessagesCollector::default())),
        _ => None,
    }
}
