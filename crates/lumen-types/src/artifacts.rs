//! The run-scoped artifact store.
//!
//! Raw artifacts are produced by collectors during gather passes and read by
//! the computed-artifact graph and the scoring engine. The store is
//! append-only within a run: a name, once written, is immutable, and writing
//! it again is an error rather than an overwrite. This keeps runs isolated
//! and makes partially-failed runs inspectable.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Attempt to write an artifact name that already holds a value.
#[derive(Debug, Clone, Error)]
#[error("artifact '{name}' was already written this run")]
pub struct DuplicateArtifact {
    pub name: String,
}

/// One entry in the artifact store.
///
/// A collector either produced a value, or failed in a non-fatal way and
/// left an explanation behind. Downstream consumers treat `Unavailable` the
/// same as an absent artifact, except that the debug text is surfaced in
/// check outcomes.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ArtifactEntry {
    Present { value: Arc<Value> },
    Unavailable { debug: String },
}

impl ArtifactEntry {
    pub fn present(value: Value) -> Self {
        ArtifactEntry::Present {
            value: Arc::new(value),
        }
    }

    pub fn unavailable(debug: impl Into<String>) -> Self {
        ArtifactEntry::Unavailable {
            debug: debug.into(),
        }
    }

    /// The stored value, if the artifact materialized.
    pub fn value(&self) -> Option<&Arc<Value>> {
        match self {
            ArtifactEntry::Present { value } => Some(value),
            ArtifactEntry::Unavailable { .. } => None,
        }
    }
}

/// Append-only mapping from artifact name to entry.
///
/// Owned by the gather scheduler while passes run, then shared read-only
/// with the compute graph and scoring engine. `BTreeMap` keeps serialized
/// output in a stable order.
#[derive(Debug, Default, Clone, Serialize)]
pub struct ArtifactStore {
    entries: BTreeMap<String, ArtifactEntry>,
}

impl ArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write an artifact. Fails if the name was already written.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        entry: ArtifactEntry,
    ) -> Result<(), DuplicateArtifact> {
        let name = name.into();
        if self.entries.contains_key(&name) {
            return Err(DuplicateArtifact { name });
        }
        self.entries.insert(name, entry);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ArtifactEntry> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ArtifactEntry)> {
        self.entries.iter()
    }
}
