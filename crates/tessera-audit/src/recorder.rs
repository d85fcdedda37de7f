//! The append path of a hash chain.
//!
//! `EventRecorder` owns one chain: its store, its tail hash, and its
//! correlation index.  Every `log_event` call runs the same sequence:
//!
//!   validate → [lock tail] → stamp id/time/correlation → hash → append
//!   → update index → advance tail → [unlock]
//!
//! The tail lock is held from reading `previous_hash` until the tail has
//! advanced, so two concurrent callers can never link to the same
//! predecessor.  The tail is private to the recorder instance; separate
//! recorders (one per tenant, say) never contend with each other.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::SubsecRound;
use tracing::{debug, info, warn};

use tessera_contracts::{
    error::{TesseraError, TesseraResult},
    event::{generate_correlation_id, generate_event_id, AuditEvent, EventType, GENESIS_HASH},
    metadata::Metadata,
};
use tessera_core::{
    chain::{compute_hash, HashInput},
    traits::{Clock, EventStore, SystemClock},
};

use crate::correlation::CorrelationIndex;

/// Caller-supplied content of a new event.
///
/// Everything else (`event_id`, `timestamp`, hashes, and the correlation id
/// when omitted) is assigned by the recorder.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRequest {
    pub event_type: EventType,
    pub user_id: String,
    pub resource_id: String,
    pub action: String,
    pub metadata: Metadata,
    pub correlation_id: Option<String>,
}

impl EventRequest {
    pub fn new(
        event_type: EventType,
        user_id: impl Into<String>,
        resource_id: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            event_type,
            user_id: user_id.into(),
            resource_id: resource_id.into(),
            action: action.into(),
            metadata: Metadata::new(),
            correlation_id: None,
        }
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }
}

/// Records events onto one hash chain.
pub struct EventRecorder {
    store: Arc<dyn EventStore>,
    clock: Arc<dyn Clock>,
    custom_types: BTreeSet<EventType>,
    /// `current_hash` of the last committed event, or `GENESIS_HASH`.
    tail: Mutex<String>,
    index: RwLock<CorrelationIndex>,
}

impl EventRecorder {
    /// Attach a recorder to `store`, using the system clock.
    ///
    /// An empty store starts the chain at `GENESIS_HASH`.  A non-empty store
    /// resumes from its last event's `current_hash` and the correlation
    /// index is rebuilt from the committed log.
    pub fn open(store: Arc<dyn EventStore>) -> TesseraResult<Self> {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    /// Like `open`, with an explicit timestamp source.
    pub fn with_clock(store: Arc<dyn EventStore>, clock: Arc<dyn Clock>) -> TesseraResult<Self> {
        let events = store.snapshot()?;
        let tail = events
            .last()
            .map(|e| e.current_hash.clone())
            .unwrap_or_else(|| GENESIS_HASH.to_string());
        let index = CorrelationIndex::rebuild(&events);

        info!(
            events = events.len(),
            correlations = index.len(),
            tail = %tail,
            "event recorder attached to store"
        );

        Ok(Self {
            store,
            clock,
            custom_types: BTreeSet::new(),
            tail: Mutex::new(tail),
            index: RwLock::new(index),
        })
    }

    /// Accept `event_type` (which must be `EventType::Custom`) from now on.
    pub fn register_custom_type(&mut self, event_type: EventType) -> TesseraResult<()> {
        if !event_type.is_custom() {
            return Err(TesseraError::validation(
                "event_type",
                format!("'{}' is a built-in type and needs no registration", event_type),
            ));
        }
        self.custom_types.insert(event_type);
        Ok(())
    }

    /// Whether `log_event` accepts `event_type`.
    pub fn accepts(&self, event_type: &EventType) -> bool {
        !event_type.is_custom() || self.custom_types.contains(event_type)
    }

    pub fn store(&self) -> &Arc<dyn EventStore> {
        &self.store
    }

    /// `current_hash` of the last committed event, or `GENESIS_HASH`.
    pub fn tail_hash(&self) -> TesseraResult<String> {
        let tail = self.tail.lock().map_err(|e| TesseraError::StorageRead {
            reason: format!("chain tail lock poisoned: {}", e),
        })?;
        Ok(tail.clone())
    }

    /// Validate, stamp, hash, and commit one event.
    ///
    /// # Errors
    ///
    /// - `Validation` / `Serialization` for bad input; nothing is appended.
    /// - `StorageWrite` if the store rejects the append; the tail and the
    ///   index are unchanged and the call can be retried as-is.
    pub fn log_event(&self, request: EventRequest) -> TesseraResult<AuditEvent> {
        if let Err(e) = self.validate(&request) {
            warn!(
                event_type = %request.event_type,
                user_id = %request.user_id,
                error = %e,
                "rejected audit event"
            );
            return Err(e);
        }

        let EventRequest {
            event_type,
            user_id,
            resource_id,
            action,
            metadata,
            correlation_id,
        } = request;

        let mut tail = self.tail.lock().map_err(|e| TesseraError::StorageWrite {
            reason: format!("chain tail lock poisoned: {}", e),
        })?;

        // Fixed before hashing: all three are part of the canonical form.
        let event_id = generate_event_id();
        // The canonical form hashes microseconds; store exactly that.
        let timestamp = self.clock.now().trunc_subsecs(6);
        let correlation_id = correlation_id.unwrap_or_else(generate_correlation_id);

        let current_hash = compute_hash(
            &HashInput {
                event_id: &event_id,
                event_type: &event_type,
                timestamp: &timestamp,
                user_id: &user_id,
                resource_id: &resource_id,
                action: &action,
                metadata: &metadata,
                correlation_id: &correlation_id,
            },
            &tail,
        )?;

        let event = AuditEvent {
            event_id,
            event_type,
            timestamp,
            user_id,
            resource_id,
            action,
            metadata,
            correlation_id,
            previous_hash: tail.clone(),
            current_hash,
        };

        let sequence = match self.store.append(&event) {
            Ok(sequence) => sequence,
            Err(e) => {
                warn!(
                    event_id = %event.event_id,
                    error = %e,
                    "audit event could not be committed; chain tail unchanged"
                );
                return Err(e);
            }
        };

        // The index is derived data; a poisoned lock still holds a usable map.
        self.index
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(&event.correlation_id, sequence);
        *tail = event.current_hash.clone();

        debug!(
            sequence,
            event_id = %event.event_id,
            event_type = %event.event_type,
            correlation_id = %event.correlation_id,
            current_hash = %event.current_hash,
            "audit event recorded"
        );

        Ok(event)
    }

    /// Every event sharing `correlation_id`, in insertion order.
    ///
    /// Positions come from the index; events come from the store, and only
    /// those whose stored `correlation_id` still matches are returned.
    pub fn events_for(&self, correlation_id: &str) -> TesseraResult<Vec<AuditEvent>> {
        let positions: Vec<u64> = self
            .index
            .read()
            .map_err(|e| TesseraError::StorageRead {
                reason: format!("correlation index lock poisoned: {}", e),
            })?
            .positions(correlation_id)
            .to_vec();

        let mut events = Vec::with_capacity(positions.len());
        for sequence in positions {
            if let Some(event) = self.store.get(sequence)? {
                if event.correlation_id == correlation_id {
                    events.push(event);
                }
            }
        }
        Ok(events)
    }

    /// Rebuild the correlation index from a full pass over the store.
    ///
    /// Holds the tail lock so no append interleaves with the rebuild.
    /// Returns the number of distinct correlation ids indexed.
    pub fn rebuild_index(&self) -> TesseraResult<usize> {
        let _tail = self.tail.lock().map_err(|e| TesseraError::StorageWrite {
            reason: format!("chain tail lock poisoned: {}", e),
        })?;
        let rebuilt = CorrelationIndex::rebuild(&self.store.snapshot()?);
        let count = rebuilt.len();
        *self.index.write().unwrap_or_else(PoisonError::into_inner) = rebuilt;

        info!(correlations = count, "correlation index rebuilt");
        Ok(count)
    }

    fn validate(&self, request: &EventRequest) -> TesseraResult<()> {
        if !self.accepts(&request.event_type) {
            return Err(TesseraError::validation(
                "event_type",
                format!("'{}' is not a registered event type", request.event_type),
            ));
        }
        for (field, value) in [
            ("user_id", &request.user_id),
            ("resource_id", &request.resource_id),
            ("action", &request.action),
        ] {
            if value.trim().is_empty() {
                return Err(TesseraError::validation(field, "must not be empty"));
            }
        }
        if let Some(correlation_id) = &request.correlation_id {
            if correlation_id.trim().is_empty() {
                return Err(TesseraError::validation(
                    "correlation_id",
                    "must not be empty when supplied",
                ));
            }
        }
        request.metadata.validate()
    }
}
