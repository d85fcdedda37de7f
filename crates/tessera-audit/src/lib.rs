//! # tessera-audit
//!
//! Immutable, append-only, SHA-256 hash-chained audit trail.
//!
//! ## Overview
//!
//! [`EventRecorder`] validates and stamps each event, links it to the
//! previous one through its hash, commits it to an [`EventStore`], and keeps
//! the [`CorrelationIndex`] current.  [`ChainVerifier`] replays a snapshot
//! and reports the first broken link.  [`AuditTrail`] bundles both with the
//! report generator behind the operations collaborators call, and
//! [`TrailRegistry`] keeps one independent trail per tenant.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tessera_audit::AuditTrail;
//! use tessera_contracts::{EventType, Metadata};
//!
//! let trail = AuditTrail::in_memory()?;
//! let event = trail.log_event(
//!     EventType::AccessDenied, "alice", "doc-42", "read", Metadata::new(), None,
//! )?;
//!
//! assert!(trail.verify()?.valid);
//! let related = trail.events_for_correlation(&event.correlation_id)?;
//! ```
//!
//! [`EventStore`]: tessera_core::traits::EventStore

pub mod config;
pub mod correlation;
pub mod file;
pub mod memory;
pub mod recorder;
pub mod registry;
pub mod trail;
pub mod verifier;

pub use config::TrailConfig;
pub use correlation::CorrelationIndex;
pub use file::JsonlEventStore;
pub use memory::InMemoryEventStore;
pub use recorder::{EventRecorder, EventRequest};
pub use registry::TrailRegistry;
pub use trail::AuditTrail;
pub use verifier::ChainVerifier;

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};
    use std::thread;

    use chrono::{DateTime, Duration, TimeZone, Utc};
    use serde_json::json;

    use tessera_contracts::{
        error::{TesseraError, TesseraResult},
        event::{AuditEvent, EventType, GENESIS_HASH},
        metadata::Metadata,
        report::ReportQuery,
        verify::BreakReason,
    };
    use tessera_core::traits::{Clock, EventStore};

    use super::{AuditTrail, EventRequest, InMemoryEventStore, TrailConfig};

    // ── Helpers ───────────────────────────────────────────────────────────────

    /// A clock that advances one hour per reading, from a fixed start.
    struct StepClock(Mutex<DateTime<Utc>>);

    impl StepClock {
        fn starting(start: DateTime<Utc>) -> Arc<Self> {
            Arc::new(Self(Mutex::new(start)))
        }
    }

    impl Clock for StepClock {
        fn now(&self) -> DateTime<Utc> {
            let mut now = self.0.lock().unwrap();
            let current = *now;
            *now = current + Duration::hours(1);
            current
        }
    }

    /// Wraps a store and fails every append while `failing` is set.
    struct FlakyStore {
        inner: InMemoryEventStore,
        failing: AtomicBool,
    }

    impl EventStore for FlakyStore {
        fn append(&self, event: &AuditEvent) -> TesseraResult<u64> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(TesseraError::StorageWrite {
                    reason: "simulated disk failure".to_string(),
                });
            }
            self.inner.append(event)
        }

        fn snapshot(&self) -> TesseraResult<Vec<AuditEvent>> {
            self.inner.snapshot()
        }

        fn get(&self, sequence: u64) -> TesseraResult<Option<AuditEvent>> {
            self.inner.get(sequence)
        }

        fn last(&self) -> TesseraResult<Option<AuditEvent>> {
            self.inner.last()
        }

        fn len(&self) -> TesseraResult<u64> {
            self.inner.len()
        }
    }

    /// A clock with digits below the microsecond.
    struct NanoClock;

    impl Clock for NanoClock {
        fn now(&self) -> DateTime<Utc> {
            start() + Duration::nanoseconds(123_456_789)
        }
    }

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, 1, 8, 0, 0).unwrap()
    }

    /// A trail over an in-memory store the test can still reach into.
    fn trail_with_store() -> (AuditTrail, Arc<InMemoryEventStore>) {
        let store = Arc::new(InMemoryEventStore::new());
        let trail =
            AuditTrail::with_clock(store.clone(), StepClock::starting(start()), &TrailConfig::default())
                .unwrap();
        (trail, store)
    }

    fn log(trail: &AuditTrail, event_type: EventType, user: &str, cid: Option<&str>) -> AuditEvent {
        trail
            .log_event(event_type, user, "doc-1", "read", Metadata::new(), cid)
            .unwrap()
    }

    // ── Chain construction ────────────────────────────────────────────────────

    #[test]
    fn test_sequential_logs_verify() {
        let (trail, _) = trail_with_store();
        for i in 0..10 {
            trail
                .log_event(
                    EventType::QueryExecuted,
                    "alice",
                    &format!("index-{}", i),
                    "search",
                    Metadata::new().with("hits", i as i64),
                    None,
                )
                .unwrap();
        }

        let outcome = trail.verify().unwrap();
        assert!(outcome.valid, "untampered chain must verify");
        assert!(outcome.detail.is_none());
        assert_eq!(outcome.events_checked, 10);
        assert_eq!(outcome.terminal_hash, trail.tail_hash().unwrap());
    }

    #[test]
    fn test_first_event_links_to_genesis() {
        let (trail, _) = trail_with_store();
        assert_eq!(trail.tail_hash().unwrap(), GENESIS_HASH);

        let first = log(&trail, EventType::UserLogin, "alice", None);
        let second = log(&trail, EventType::UserLogout, "alice", None);

        assert_eq!(first.previous_hash, GENESIS_HASH);
        assert_eq!(second.previous_hash, first.current_hash);
        assert_ne!(first.current_hash, GENESIS_HASH);
        assert_eq!(GENESIS_HASH.len(), first.current_hash.len());
    }

    #[test]
    fn test_recorder_assigns_ids_time_and_correlation() {
        let (trail, _) = trail_with_store();
        let a = log(&trail, EventType::DocumentIngested, "alice", None);
        let b = log(&trail, EventType::DocumentIngested, "alice", Some("req-1"));

        assert_ne!(a.event_id, b.event_id);
        assert!(!a.correlation_id.is_empty());
        assert_eq!(b.correlation_id, "req-1");
        assert_eq!(a.timestamp, start());
        assert_eq!(b.timestamp, start() + Duration::hours(1));
    }

    #[test]
    fn test_recorder_truncates_clock_to_microseconds() {
        let store = Arc::new(InMemoryEventStore::new());
        let trail =
            AuditTrail::with_clock(store, Arc::new(NanoClock), &TrailConfig::default()).unwrap();

        let event = log(&trail, EventType::UserLogin, "alice", None);
        assert_eq!(event.timestamp, start() + Duration::microseconds(123_456));
        assert!(trail.verify().unwrap().valid);
    }

    #[test]
    fn test_empty_trail_verifies() {
        let trail = AuditTrail::in_memory().unwrap();
        let outcome = trail.verify().unwrap();
        assert!(outcome.valid);
        assert_eq!(outcome.events_checked, 0);
        assert!(trail.is_empty().unwrap());
    }

    // ── Tamper detection ──────────────────────────────────────────────────────

    /// Log A, B, C; alter B's action in the store; the break is at B and a
    /// report filtered to A's type still finds exactly A.
    #[test]
    fn test_tamper_scenario() {
        let (trail, store) = trail_with_store();
        let a = log(&trail, EventType::DocumentIngested, "alice", None);
        log(&trail, EventType::AccessDenied, "bob", None);
        log(&trail, EventType::PiiDetected, "carol", None);

        assert!(trail.verify().unwrap().valid);

        store.events.write().unwrap()[1].action = "write".to_string();

        let outcome = trail.verify().unwrap();
        assert!(!outcome.valid, "tampered chain must fail verification");
        let detail = outcome.detail.unwrap();
        assert_eq!(detail.index, 1);
        assert_eq!(detail.reason, BreakReason::ContentTampered);

        let report = trail
            .generate_report(
                start() - Duration::days(1),
                start() + Duration::days(1),
                Some(vec![EventType::DocumentIngested]),
                None,
            )
            .unwrap();
        assert_eq!(report.summary.total_events, 1);
        assert_eq!(report.matched_events[0].event_id, a.event_id);
    }

    #[test]
    fn test_deleted_event_is_linkage_break() {
        let (trail, store) = trail_with_store();
        for _ in 0..4 {
            log(&trail, EventType::DocumentAccessed, "alice", None);
        }
        store.events.write().unwrap().remove(2);

        let detail = trail.verify().unwrap().detail.unwrap();
        assert_eq!(detail.index, 2);
        assert_eq!(detail.reason, BreakReason::LinkageBroken);
    }

    /// A known-broken chain keeps accepting appends.
    #[test]
    fn test_appends_continue_after_break() {
        let (trail, store) = trail_with_store();
        log(&trail, EventType::UserLogin, "alice", None);
        log(&trail, EventType::UserLogin, "bob", None);
        store.events.write().unwrap()[0].user_id = "mallory".to_string();

        log(&trail, EventType::IncidentReported, "secops", None);
        assert_eq!(trail.len().unwrap(), 3);
        assert_eq!(trail.verify().unwrap().detail.unwrap().index, 0);
    }

    // ── Validation ────────────────────────────────────────────────────────────

    #[test]
    fn test_empty_identifying_fields_rejected() {
        let (trail, _) = trail_with_store();

        for (user, resource, action) in [("", "doc", "read"), ("u", " ", "read"), ("u", "doc", "")] {
            let err = trail
                .log_event(EventType::AccessGranted, user, resource, action, Metadata::new(), None)
                .unwrap_err();
            assert!(err.is_validation(), "expected validation error, got {err}");
        }

        let err = trail
            .log_event(EventType::AccessGranted, "u", "doc", "read", Metadata::new(), Some(""))
            .unwrap_err();
        assert!(matches!(err, TesseraError::Validation { ref field, .. } if field == "correlation_id"));

        assert!(trail.is_empty().unwrap(), "rejected events must not be appended");
        assert_eq!(trail.tail_hash().unwrap(), GENESIS_HASH);
    }

    #[test]
    fn test_unregistered_custom_type_rejected() {
        let (trail, _) = trail_with_store();
        let err = trail
            .log_event(
                EventType::custom("model-retrained").unwrap(),
                "ml-bot",
                "model-7",
                "retrain",
                Metadata::new(),
                None,
            )
            .unwrap_err();
        assert!(matches!(err, TesseraError::Validation { ref field, .. } if field == "event_type"));
        assert!(trail.is_empty().unwrap());
    }

    #[test]
    fn test_configured_custom_type_accepted() {
        let config = TrailConfig::from_toml_str(
            r#"
            [chain]
            custom_event_types = ["model-retrained"]
            "#,
        )
        .unwrap();
        let trail = AuditTrail::from_config(&config).unwrap();

        let event = trail
            .log_event(
                EventType::custom("model-retrained").unwrap(),
                "ml-bot",
                "model-7",
                "retrain",
                Metadata::new(),
                None,
            )
            .unwrap();
        assert_eq!(event.event_type.to_string(), "custom:model-retrained");
        assert!(trail.verify().unwrap().valid);
    }

    #[test]
    fn test_non_canonical_metadata_rejected_before_append() {
        let (trail, _) = trail_with_store();

        let err = trail
            .log_event(
                EventType::PiiDetected,
                "scanner",
                "doc-9",
                "scan",
                Metadata::new().with("confidence", f64::NAN),
                None,
            )
            .unwrap_err();
        assert!(matches!(err, TesseraError::Serialization { .. }));

        // Nested JSON never makes it into a `Metadata` in the first place.
        assert!(Metadata::try_from(json!({ "spans": [[1, 4]] })).is_err());
        assert!(trail.is_empty().unwrap());
    }

    // ── Storage failures ──────────────────────────────────────────────────────

    #[test]
    fn test_storage_failure_leaves_tail_and_index_unchanged() {
        let store = Arc::new(FlakyStore {
            inner: InMemoryEventStore::new(),
            failing: AtomicBool::new(false),
        });
        let trail = AuditTrail::open(store.clone(), &TrailConfig::default()).unwrap();

        let first = log(&trail, EventType::DocumentIngested, "alice", Some("req"));

        store.failing.store(true, Ordering::SeqCst);
        let err = trail
            .record(
                EventRequest::new(EventType::DocumentAccessed, "alice", "doc-1", "read")
                    .with_correlation_id("req"),
            )
            .unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(trail.tail_hash().unwrap(), first.current_hash);
        assert_eq!(trail.events_for_correlation("req").unwrap().len(), 1);

        store.failing.store(false, Ordering::SeqCst);
        let retried = trail
            .record(
                EventRequest::new(EventType::DocumentAccessed, "alice", "doc-1", "read")
                    .with_correlation_id("req"),
            )
            .unwrap();
        assert_eq!(retried.previous_hash, first.current_hash);
        assert_eq!(trail.events_for_correlation("req").unwrap().len(), 2);
        assert!(trail.verify().unwrap().valid);
    }

    // ── Correlation ───────────────────────────────────────────────────────────

    #[test]
    fn test_events_for_correlation_in_log_order() {
        let (trail, _) = trail_with_store();
        let shared = AuditTrail::generate_correlation_id();

        let first = log(&trail, EventType::QueryExecuted, "alice", Some(&shared));
        log(&trail, EventType::QueryExecuted, "bob", None);
        let third = log(&trail, EventType::PiiRedacted, "alice", Some(&shared));

        let related = trail.events_for_correlation(&shared).unwrap();
        let ids: Vec<&str> = related.iter().map(|e| e.event_id.as_str()).collect();
        assert_eq!(ids, vec![first.event_id.as_str(), third.event_id.as_str()]);
        assert!(trail.events_for_correlation("never-used").unwrap().is_empty());
    }

    #[test]
    fn test_rebuilt_index_matches_incremental() {
        let (trail, _) = trail_with_store();
        for i in 0..9 {
            let cid = format!("req-{}", i % 3);
            log(&trail, EventType::DocumentAccessed, "alice", Some(&cid));
        }
        let before: Vec<Vec<AuditEvent>> = (0..3)
            .map(|i| trail.events_for_correlation(&format!("req-{}", i)).unwrap())
            .collect();

        assert_eq!(trail.rebuild_correlation_index().unwrap(), 3);

        for (i, expected) in before.iter().enumerate() {
            let after = trail.events_for_correlation(&format!("req-{}", i)).unwrap();
            assert_eq!(&after, expected);
            assert_eq!(after.len(), 3);
        }
    }

    /// An index entry whose stored event no longer carries the id is skipped.
    #[test]
    fn test_correlation_lookup_trusts_store() {
        let (trail, store) = trail_with_store();
        log(&trail, EventType::UserLogin, "alice", Some("req"));
        log(&trail, EventType::UserLogout, "alice", Some("req"));
        store.events.write().unwrap()[0].correlation_id = "other".to_string();

        assert_eq!(trail.events_for_correlation("req").unwrap().len(), 1);
    }

    // ── Concurrency ───────────────────────────────────────────────────────────

    #[test]
    fn test_concurrent_appends_stay_linked() {
        let trail = Arc::new(AuditTrail::in_memory().unwrap());

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let trail = trail.clone();
                thread::spawn(move || {
                    for i in 0..25 {
                        trail
                            .log_event(
                                EventType::DocumentAccessed,
                                &format!("worker-{}", t),
                                &format!("doc-{}", i),
                                "read",
                                Metadata::new(),
                                Some(&format!("worker-{}", t)),
                            )
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(trail.len().unwrap(), 200);
        let outcome = trail.verify().unwrap();
        assert!(outcome.valid, "concurrent appends must never fork the chain");

        let events = trail.recorder().store().snapshot().unwrap();
        let prevs: HashSet<&str> = events.iter().map(|e| e.previous_hash.as_str()).collect();
        assert_eq!(prevs.len(), 200, "no two events may share a predecessor");

        for t in 0..8 {
            assert_eq!(
                trail.events_for_correlation(&format!("worker-{}", t)).unwrap().len(),
                25
            );
        }
    }

    // ── Reports and exports ───────────────────────────────────────────────────

    #[test]
    fn test_report_matches_independent_filter() {
        let (trail, store) = trail_with_store();
        let users = ["alice", "bob", "carol"];
        for i in 0..30 {
            log(&trail, EventType::KNOWN[i % 4].clone(), users[i % 3], None);
        }

        let (t1, t2) = (start() + Duration::hours(5), start() + Duration::hours(17));
        let report = trail.generate_report(t1, t2, None, Some("bob")).unwrap();

        let expected: Vec<AuditEvent> = store
            .snapshot()
            .unwrap()
            .into_iter()
            .filter(|e| e.timestamp >= t1 && e.timestamp <= t2 && e.user_id == "bob")
            .collect();
        assert_eq!(report.summary.total_events, expected.len() as u64);
        assert_eq!(report.matched_events, expected);
    }

    #[test]
    fn test_export_flags_tampered_chain() {
        let (trail, store) = trail_with_store();
        log(&trail, EventType::DataExported, "alice", None);
        log(&trail, EventType::DataExported, "bob", None);

        let query = ReportQuery::between(start(), start() + Duration::days(1));
        assert!(trail.export(&query).unwrap().audit_ready);

        store.events.write().unwrap()[1].resource_id = "doc-2".to_string();
        let export = trail.export(&query).unwrap();
        assert!(!export.audit_ready);
        assert_eq!(export.verification.detail.unwrap().index, 1);
        assert_eq!(export.event_count, 2);
    }
}
