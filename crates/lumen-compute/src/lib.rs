//! The computed-artifact graph: derives named values from the raw artifact
//! store on demand, memoized per run.
//!
//! Each computed artifact declares its input names (raw or computed) and a
//! derivation function. The first request for a name starts its
//! computation; concurrent requests for the same name join the in-flight
//! computation instead of recomputing, and a derivation failure is cached
//! and re-surfaced just like a success. Cyclic declarations are detected by
//! tracking the request chain and fail fast rather than deadlocking.

pub mod builtin;
pub mod error;
pub mod graph;

pub use builtin::builtin_derivations;
pub use error::{ComputeError, DerivationError};
pub use graph::{Derivation, Graph, InputSet};
