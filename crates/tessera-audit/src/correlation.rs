//! Secondary index from correlation id to event positions.
//!
//! The index is derived data.  The store is always authoritative, and the
//! index can be rebuilt from it at any time with `CorrelationIndex::rebuild`.

use std::collections::HashMap;

use tessera_contracts::event::AuditEvent;

/// Maps each correlation id to the sequence numbers of its events, in
/// insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CorrelationIndex {
    positions: HashMap<String, Vec<u64>>,
}

impl CorrelationIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index by a full pass over `events` (position = sequence).
    pub fn rebuild(events: &[AuditEvent]) -> Self {
        let mut index = Self::new();
        for (sequence, event) in events.iter().enumerate() {
            index.insert(&event.correlation_id, sequence as u64);
        }
        index
    }

    /// Record that the event at `sequence` carries `correlation_id`.
    ///
    /// Sequences arrive in increasing order, so each list stays sorted.
    pub fn insert(&mut self, correlation_id: &str, sequence: u64) {
        self.positions
            .entry(correlation_id.to_string())
            .or_default()
            .push(sequence);
    }

    /// Positions of every event sharing `correlation_id`; empty if unseen.
    pub fn positions(&self, correlation_id: &str) -> &[u64] {
        self.positions
            .get(correlation_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Number of distinct correlation ids indexed.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}
