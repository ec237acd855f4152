//! Per-environment validity cache.
//!
//! The tracker remembers which environments are explicitly known bad. An
//! environment with no record is treated as usable — valid until proven
//! otherwise. Records live for the process lifetime only.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use crate::registry::EnvironmentId;

/// Tracks which environments are currently known invalid.
///
/// The only state shared across concurrent checks. Reads may run
/// concurrently; writes take the lock exclusively.
#[derive(Debug, Default)]
pub struct ValidityTracker {
    invalid: RwLock<HashMap<EnvironmentId, DateTime<Utc>>>,
}

impl ValidityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether an environment is usable.
    ///
    /// `false` only for an explicit invalid record; unknown environments
    /// are usable. No side effects.
    pub fn is_valid(&self, id: &EnvironmentId) -> bool {
        !self.invalid.read().unwrap().contains_key(id)
    }

    /// Record an environment as invalid. Idempotent.
    pub fn mark_invalid(&self, id: &EnvironmentId) {
        self.invalid
            .write()
            .unwrap()
            .entry(id.clone())
            .or_insert_with(Utc::now);
    }

    /// Clear an environment's invalid record. Idempotent.
    pub fn mark_valid(&self, id: &EnvironmentId) {
        self.invalid.write().unwrap().remove(id);
    }

    /// When an environment was marked invalid, if it is.
    pub fn invalid_since(&self, id: &EnvironmentId) -> Option<DateTime<Utc>> {
        self.invalid.read().unwrap().get(id).copied()
    }

    /// All currently-invalid environments, sorted by identity.
    pub fn snapshot(&self) -> Vec<(EnvironmentId, DateTime<Utc>)> {
        let mut entries: Vec<_> = self
            .invalid
            .read()
            .unwrap()
            .iter()
            .map(|(id, since)| (id.clone(), *since))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }
}
