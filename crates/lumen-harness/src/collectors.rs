//! Collector test doubles.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use lumen_gather::{Collector, CollectorError, PassCapture, PassContext};

/// A collector that records the order its hooks run in and returns a
/// canned artifact value.
pub struct StubCollector {
    name: String,
    value: Value,
    log: Arc<Mutex<Vec<String>>>,
    fail_before: bool,
    fail_after: bool,
}

impl StubCollector {
    /// `log` is shared across stubs so a test can assert global hook order.
    pub fn new(name: &str, value: Value, log: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            name: name.to_string(),
            value,
            log,
            fail_before: false,
            fail_after: false,
        }
    }

    /// Make `before_pass` fail (a fatal setup error).
    #[must_use]
    pub fn failing_before(mut self) -> Self {
        self.fail_before = true;
        self
    }

    /// Make `after_pass` fail (degrades to an unavailable artifact).
    #[must_use]
    pub fn failing_after(mut self) -> Self {
        self.fail_after = true;
        self
    }

    fn record(&self, hook: &str) {
        self.log
            .lock()
            .expect("stub log lock poisoned")
            .push(format!("{hook}:{}", self.name));
    }
}

#[async_trait]
impl Collector for StubCollector {
    fn name(&self) -> &str {
        &self.name
    }

    async fn before_pass(&mut self, _ctx: &PassContext<'_>) -> Result<(), CollectorError> {
        self.record("before");
        // Yield so sequencing bugs can't hide behind immediate readiness.
        tokio::task::yield_now().await;
        if self.fail_before {
            return Err(CollectorError::failed("stub before_pass failure"));
        }
        Ok(())
    }

    async fn pass(&mut self, _ctx: &PassContext<'_>) -> Result<(), CollectorError> {
        self.record("pass");
        tokio::task::yield_now().await;
        Ok(())
    }

    async fn after_pass(
        &mut self,
        _ctx: &PassContext<'_>,
        _capture: &PassCapture<'_>,
    ) -> Result<Value, CollectorError> {
        self.record("after");
        if self.fail_after {
            return Err(CollectorError::failed("stub after_pass failure"));
        }
        Ok(self.value.clone())
    }
}
