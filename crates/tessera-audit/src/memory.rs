//! In-memory implementation of `EventStore`.
//!
//! `InMemoryEventStore` keeps committed events in a `Vec` behind an
//! `RwLock`.  Appends take the write lock for the duration of one `push`;
//! readers clone a snapshot under the read lock, so they never observe a
//! partially committed event and never block each other.

use std::sync::RwLock;

use tessera_contracts::{
    error::{TesseraError, TesseraResult},
    event::AuditEvent,
};
use tessera_core::traits::EventStore;

/// An append-only event store that lives for the life of the process.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    pub(crate) events: RwLock<Vec<AuditEvent>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> TesseraResult<std::sync::RwLockReadGuard<'_, Vec<AuditEvent>>> {
        self.events.read().map_err(|e| TesseraError::StorageRead {
            reason: format!("event store lock poisoned: {}", e),
        })
    }
}

impl EventStore for InMemoryEventStore {
    fn append(&self, event: &AuditEvent) -> TesseraResult<u64> {
        let mut events = self.events.write().map_err(|e| TesseraError::StorageWrite {
            reason: format!("event store lock poisoned: {}", e),
        })?;
        events.push(event.clone());
        Ok(events.len() as u64 - 1)
    }

    fn snapshot(&self) -> TesseraResult<Vec<AuditEvent>> {
        Ok(self.read()?.clone())
    }

    fn get(&self, sequence: u64) -> TesseraResult<Option<AuditEvent>> {
        Ok(self.read()?.get(sequence as usize).cloned())
    }

    fn last(&self) -> TesseraResult<Option<AuditEvent>> {
        Ok(self.read()?.last().cloned())
    }

    fn len(&self) -> TesseraResult<u64> {
        Ok(self.read()?.len() as u64)
    }
}
