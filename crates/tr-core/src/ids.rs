//! Injected identifier generation.
//!
//! Ids only need to be unique within one import run; they are not sortable
//! and not stable across repeated imports of the same file. The generator is
//! passed in by the caller so tests can assert deterministic ids.

use uuid::Uuid;

/// Source of run-unique identifiers for newly created entities.
pub trait IdGenerator {
    /// Returns the next identifier. Must never repeat within one run.
    fn next_id(&mut self) -> String;
}

/// Random v4 UUIDs. The default for production callers.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidIds;

impl IdGenerator for UuidIds {
    fn next_id(&mut self) -> String {
        Uuid::new_v4().to_string()
    }
}

/// Deterministic `prefix-N` identifiers for tests and reproducible runs.
#[derive(Debug, Clone)]
pub struct SequenceIds {
    prefix: String,
    next: u64,
}

impl SequenceIds {
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: 1,
        }
    }
}

impl Default for SequenceIds {
    fn default() -> Self {
        Self::new("id")
    }
}

impl IdGenerator for SequenceIds {
    fn next_id(&mut self) -> String {
        let id = format!("{}-{}", self.prefix, self.next);
        self.next += 1;
        id
    }
}
