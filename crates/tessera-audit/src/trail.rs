//! `AuditTrail`: one hash chain and every operation collaborators need.
//!
//! The trail wires an `EventRecorder`, a `ChainVerifier` and a
//! `ReportGenerator` to the same store.  Appends go through the recorder;
//! verification and reporting are independent read paths over snapshots of
//! that store.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use tessera_contracts::{
    error::TesseraResult,
    event::{self, AuditEvent, EventType},
    metadata::Metadata,
    report::{AuditExport, ComplianceReport, ReportQuery},
    verify::VerificationOutcome,
};
use tessera_core::traits::{Clock, EventStore, SystemClock};
use tessera_report::ReportGenerator;

use crate::{
    config::TrailConfig,
    file::JsonlEventStore,
    memory::InMemoryEventStore,
    recorder::{EventRecorder, EventRequest},
    verifier::ChainVerifier,
};

/// A single-authority, append-only audit trail.
pub struct AuditTrail {
    recorder: EventRecorder,
    verifier: ChainVerifier,
    reports: ReportGenerator,
    clock: Arc<dyn Clock>,
}

impl AuditTrail {
    /// An empty in-memory trail with default configuration.
    pub fn in_memory() -> TesseraResult<Self> {
        Self::open(Arc::new(InMemoryEventStore::new()), &TrailConfig::default())
    }

    /// Build the trail described by `config`, opening its file store when a
    /// path is configured.
    pub fn from_config(config: &TrailConfig) -> TesseraResult<Self> {
        let store: Arc<dyn EventStore> = match &config.store.path {
            Some(path) => Arc::new(JsonlEventStore::open(path)?),
            None => Arc::new(InMemoryEventStore::new()),
        };
        Self::open(store, config)
    }

    /// Attach a trail to `store` using the system clock.
    pub fn open(store: Arc<dyn EventStore>, config: &TrailConfig) -> TesseraResult<Self> {
        Self::with_clock(store, Arc::new(SystemClock), config)
    }

    /// Attach a trail to `store` with an explicit timestamp source.
    pub fn with_clock(
        store: Arc<dyn EventStore>,
        clock: Arc<dyn Clock>,
        config: &TrailConfig,
    ) -> TesseraResult<Self> {
        let mut recorder = EventRecorder::with_clock(store.clone(), clock.clone())?;
        for custom in config.custom_event_types()? {
            recorder.register_custom_type(custom)?;
        }

        info!(
            custom_types = config.chain.custom_event_types.len(),
            bucket = ?config.report.bucket,
            "audit trail ready"
        );

        Ok(Self {
            recorder,
            verifier: ChainVerifier::new(store.clone()),
            reports: ReportGenerator::new(store, config.report.bucket),
            clock,
        })
    }

    // ── Append ────────────────────────────────────────────────────────────────

    /// Record one event.  A `None` correlation id gets a fresh one.
    pub fn log_event(
        &self,
        event_type: EventType,
        user_id: &str,
        resource_id: &str,
        action: &str,
        metadata: Metadata,
        correlation_id: Option<&str>,
    ) -> TesseraResult<AuditEvent> {
        let mut request =
            EventRequest::new(event_type, user_id, resource_id, action).with_metadata(metadata);
        if let Some(correlation_id) = correlation_id {
            request = request.with_correlation_id(correlation_id);
        }
        self.recorder.log_event(request)
    }

    /// Record one event from a prepared request.
    pub fn record(&self, request: EventRequest) -> TesseraResult<AuditEvent> {
        self.recorder.log_event(request)
    }

    // ── Read paths ────────────────────────────────────────────────────────────

    /// Verify every event committed so far.
    pub fn verify(&self) -> TesseraResult<VerificationOutcome> {
        self.verifier.verify()
    }

    /// Report over `[start_time, end_time]`, optionally narrowed by event
    /// types and user.
    pub fn generate_report(
        &self,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        event_types: Option<Vec<EventType>>,
        user_id: Option<&str>,
    ) -> TesseraResult<ComplianceReport> {
        let query = ReportQuery {
            start_time,
            end_time,
            event_types,
            user_id: user_id.map(str::to_string),
        };
        self.reports.generate(&query)
    }

    pub fn report(&self, query: &ReportQuery) -> TesseraResult<ComplianceReport> {
        self.reports.generate(query)
    }

    /// Verification and report over one snapshot, stamped with the trail's
    /// clock.
    pub fn export(&self, query: &ReportQuery) -> TesseraResult<AuditExport> {
        self.reports.export(query, self.clock.now())
    }

    /// Every event sharing `correlation_id`, in log order.
    pub fn events_for_correlation(&self, correlation_id: &str) -> TesseraResult<Vec<AuditEvent>> {
        self.recorder.events_for(correlation_id)
    }

    /// A fresh, unique correlation id.
    pub fn generate_correlation_id() -> String {
        event::generate_correlation_id()
    }

    // ── Maintenance ───────────────────────────────────────────────────────────

    pub fn rebuild_correlation_index(&self) -> TesseraResult<usize> {
        self.recorder.rebuild_index()
    }

    pub fn tail_hash(&self) -> TesseraResult<String> {
        self.recorder.tail_hash()
    }

    pub fn len(&self) -> TesseraResult<u64> {
        self.recorder.store().len()
    }

    pub fn is_empty(&self) -> TesseraResult<bool> {
        self.recorder.store().is_empty()
    }

    pub fn recorder(&self) -> &EventRecorder {
        &self.recorder
    }
}
