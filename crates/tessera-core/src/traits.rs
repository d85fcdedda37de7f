//! Trait seams between the chain logic and its environment.
//!
//! - `EventStore`: the ordered, append-only persistence backend
//! - `Clock`: the source of acceptance timestamps
//!
//! The recorder, verifier and report generator only ever talk to these
//! traits, so the same chain logic runs over memory, a JSONL file, or any
//! other insert-only backend.

use chrono::{DateTime, SubsecRound, Utc};

use tessera_contracts::{error::TesseraResult, event::AuditEvent};

/// An ordered, append-only store of committed audit events.
///
/// Implementations must never reorder, update or delete events.  Position
/// `n` (zero-based) is the event's sequence number.  An event becomes
/// visible to readers only once `append` has returned `Ok`, and only in its
/// final, fully hashed form.
pub trait EventStore: Send + Sync {
    /// Durably commit `event` at the end of the log and return its sequence
    /// number.
    ///
    /// On `Err` the store must be unchanged.  Implementations report
    /// failures as `TesseraError::StorageWrite`.
    fn append(&self, event: &AuditEvent) -> TesseraResult<u64>;

    /// Every committed event in insertion order.
    ///
    /// The returned vector is a stable snapshot: appends that complete after
    /// this call are not included.
    fn snapshot(&self) -> TesseraResult<Vec<AuditEvent>>;

    /// The event at `sequence`, if one has been committed.
    fn get(&self, sequence: u64) -> TesseraResult<Option<AuditEvent>>;

    /// The most recently committed event.
    fn last(&self) -> TesseraResult<Option<AuditEvent>>;

    /// Number of committed events.
    fn len(&self) -> TesseraResult<u64>;

    fn is_empty(&self) -> TesseraResult<bool> {
        Ok(self.len()? == 0)
    }
}

/// Source of the instant at which an event is accepted.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time, truncated to microseconds.
///
/// The canonical form serializes timestamps with microsecond precision, so
/// truncating here keeps the stored value identical to the hashed value.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now().trunc_subsecs(6)
    }
}
