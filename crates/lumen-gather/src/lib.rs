//! The gather scheduler: runs a configured sequence of passes against one
//! session, producing the run's raw artifact store.
//!
//! Each pass applies its network/cache environment, walks every collector
//! through the `before_pass` / `pass` / `after_pass` lifecycle in declared
//! order, navigates to the target, and records the network log and trace
//! buffer while the page loads. Passes are strictly sequential: they share
//! and mutate live browser state.
//!
//! Failure policy: environment setup, `before_pass` hooks, and the
//! navigation command are fatal to the run (subsequent measurements would be
//! invalid); `after_pass` hooks degrade to "artifact unavailable" markers. A
//! fatal error carries the partial artifact store so callers can inspect
//! what succeeded.

pub mod capture;
pub mod collector;
pub mod collectors;
pub mod error;
pub mod pass;
pub mod scheduler;

pub use collector::{Collector, CollectorError, PassCapture, PassContext};
pub use error::{GatherError, GatherFailure};
pub use pass::PassState;
pub use scheduler::{run_passes, PassPlan};
