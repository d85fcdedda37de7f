//! Chain verification outcome types.
//!
//! A broken chain is a finding, not an error: the verifier always returns a
//! `VerificationOutcome`, and callers decide what to do with a break.

use serde::{Deserialize, Serialize};

/// Which check failed at the first broken link.
///
/// The distinction matters operationally.  `LinkageBroken` points to
/// deletion, insertion or reordering; `ContentTampered` points to an
/// in-place edit of the event at that position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BreakReason {
    /// `previous_hash` does not equal the preceding event's `current_hash`.
    LinkageBroken,
    /// `current_hash` does not match the hash recomputed from the event.
    ContentTampered,
    /// The event reuses an `event_id` seen earlier in the chain.
    DuplicateEventId,
}

/// Location and kind of the first broken link in a chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainBreak {
    /// Zero-based position of the offending event in insertion order.
    pub index: u64,
    /// `event_id` of the offending event as stored.
    pub event_id: String,
    pub reason: BreakReason,
}

/// Result of one verification pass over a snapshot of the chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationOutcome {
    /// True only when every event in the snapshot passed every check.
    pub valid: bool,
    /// The first break found; `None` when `valid` is true.
    pub detail: Option<ChainBreak>,
    /// Number of events examined (stops at the first break).
    pub events_checked: u64,
    /// `current_hash` of the last event that verified, or the genesis hash
    /// when none did.  For a valid chain this commits to the whole snapshot.
    pub terminal_hash: String,
}

impl VerificationOutcome {
    pub fn is_valid(&self) -> bool {
        self.valid
    }
}
